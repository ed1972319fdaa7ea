//! Derived-metric analyzers over the reconstructed visit sequence.
//!
//! Each analyzer is a pure function of the visit slice and the analysis
//! config; none mutates shared state or depends on another's output, so they
//! can fan out over the same immutable sequence in any order.

pub mod dwell;
pub mod headway;
pub mod interference;
pub mod turnaround;
pub mod utility;
