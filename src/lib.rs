//! Concurrent host-metrics sampler with a live in-place terminal report.
//!
//! The engine runs a fixed number of timed iterations. Each iteration fans
//! the active metrics (system memory, cpu utilization, logged-in sessions)
//! out to isolated blocking workers, merges their results into a frame, and
//! redraws the report in place with line-relative cursor movement (or
//! appends it, in sequential mode). An optional overlay charts the change in
//! used memory and the cpu load below the report.

pub mod config;
pub mod format;
pub mod metrics;
pub mod render;
pub mod sampler;
