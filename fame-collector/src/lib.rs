//! # Feedback Collector
//!
//! Samples current performance metrics for published items from the hosting
//! site into the append-only observation log, and promotes items to
//! ANALYZED once enough samples exist. One sweep per invocation; a failed
//! item never aborts the batch.

pub mod metrics;
pub mod sweep;

pub use metrics::{MetricsSource, VideoStats, YouTubeStatsClient};
pub use sweep::{run_sweep, SweepReport};
