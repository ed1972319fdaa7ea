//! Analysis thresholds and policy switches.

/// Tuning knobs shared by the analyzers. Every field has a documented
/// default; callers only override what they care about.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Dwell duration at or above which a visit is flagged as a long stop.
    pub long_stop_threshold_sec: f64,
    /// Direction reversals slower than this are treated as end-of-service
    /// re-entry rather than an operational turnaround and dropped.
    pub turnaround_max_sec: f64,
    /// Express-behind-local gaps below this are flagged as interference.
    pub interference_proximity_sec: f64,
    /// Maximum number of snapshots considered per batch.
    pub batch_limit: usize,
    /// Whether ENTERING-only visits count as arrivals for headway purposes.
    /// The upstream feeds disagree on this; off by default, only ARRIVED
    /// is authoritative.
    pub count_entering_as_arrival: bool,
    /// A train unseen for longer than this (relative to an explicit `as_of`
    /// instant) is reported as stale.
    pub stale_after_sec: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            long_stop_threshold_sec: 120.0,
            turnaround_max_sec: 1800.0,
            interference_proximity_sec: 120.0,
            batch_limit: 5000,
            count_entering_as_arrival: false,
            stale_after_sec: 300.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AnalysisConfig::default();
        assert_eq!(cfg.long_stop_threshold_sec, 120.0);
        assert_eq!(cfg.turnaround_max_sec, 1800.0);
        assert_eq!(cfg.interference_proximity_sec, 120.0);
        assert_eq!(cfg.batch_limit, 5000);
        assert!(!cfg.count_entering_as_arrival);
    }
}
