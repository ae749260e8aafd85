pub mod metrics;
pub mod tracing;

pub use self::metrics::{FrontendMetrics, Metrics, RequestLabels};
pub use self::tracing::init_tracing;
