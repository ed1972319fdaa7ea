//! CLI entry point for the subway snapshot analyzer.
//!
//! Provides subcommands for running the full derived-metrics report over a
//! collected batch and for dumping the reconstructed visit table.

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use subway_rater::{
    config::AnalysisConfig,
    loader::load_batch,
    output::{to_json_pretty, write_report_tables},
    reconstruct::reconstruct,
    report::run_report,
};
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "subway_rater")]
#[command(about = "Derives operational metrics from subway position snapshots", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all analyzers over a batch and print the JSON report
    Report {
        /// Snapshot batch: a collector CSV export or a realtime-position JSON payload
        #[arg(value_name = "FILE")]
        source: PathBuf,

        /// Directory to append per-table CSV output to
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Dwell duration (seconds) at or above which a visit is a long stop
        #[arg(long, default_value_t = 120.0)]
        long_stop_sec: f64,

        /// Reversals slower than this (seconds) are end-of-service re-entries
        #[arg(long, default_value_t = 1800.0)]
        turnaround_max_sec: f64,

        /// Express-behind-local gap (seconds) below which a pair is flagged
        #[arg(long, default_value_t = 120.0)]
        proximity_sec: f64,

        /// Maximum number of snapshots considered
        #[arg(long, default_value_t = 5000)]
        batch_limit: usize,

        /// Count ENTERING-only visits as arrivals for headway purposes
        #[arg(long, default_value_t = false)]
        count_entering_as_arrival: bool,

        /// Reference instant (RFC 3339) for the stale-train check; omitted = skipped
        #[arg(long, value_name = "TIMESTAMP")]
        as_of: Option<DateTime<Utc>>,

        /// A train unseen for longer than this (seconds) as of --as-of is stale
        #[arg(long, default_value_t = 300.0)]
        stale_after_sec: f64,
    },
    /// Reconstruct visits only and print them with discard counts
    Visits {
        /// Snapshot batch: a collector CSV export or a realtime-position JSON payload
        #[arg(value_name = "FILE")]
        source: PathBuf,

        /// Maximum number of snapshots considered
        #[arg(long, default_value_t = 5000)]
        batch_limit: usize,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/subway_rater.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("subway_rater.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Report {
            source,
            output_dir,
            long_stop_sec,
            turnaround_max_sec,
            proximity_sec,
            batch_limit,
            count_entering_as_arrival,
            as_of,
            stale_after_sec,
        } => {
            let config = AnalysisConfig {
                long_stop_threshold_sec: long_stop_sec,
                turnaround_max_sec,
                interference_proximity_sec: proximity_sec,
                batch_limit,
                count_entering_as_arrival,
                stale_after_sec,
            };

            let batch = load_batch(&source, config.batch_limit)?;
            if batch.snapshots.is_empty() {
                warn!(source = %source.display(), "No usable snapshots in batch");
            }

            let report = run_report(&batch.snapshots, &config, batch.malformed_rows, as_of);

            if let Some(dir) = output_dir {
                write_report_tables(&dir, &report)?;
            }
            println!("{}", to_json_pretty(&report)?);

            info!(
                headway_groups = report.headway.groups.len(),
                long_stops = report.dwell.long_stop_count,
                turnarounds = report.turnaround.events.len(),
                interference_flagged = report.interference.flagged_count,
                "Report complete"
            );
        }
        Commands::Visits { source, batch_limit } => {
            let batch = load_batch(&source, batch_limit)?;
            let recon = reconstruct(&batch.snapshots);
            println!("{}", serde_json::to_string_pretty(&recon)?);

            info!(
                visits = recon.visits.len(),
                trains = recon.trains_observed,
                duplicates = recon.duplicate_rows,
                unrecognized = recon.unrecognized_status_rows,
                malformed = batch.malformed_rows,
                "Visit reconstruction complete"
            );
        }
    }

    Ok(())
}
