pub mod metrics;

pub use metrics::{Metrics, MetricsSnapshot, SendPath};
