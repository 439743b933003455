pub mod collector;
pub mod metrics;

pub use collector::{MetricsCollector, MetricsSnapshot};
pub use metrics::NodeMetrics;
