pub mod service;
pub mod tracing;

pub use service::{InFlightGuard, MetricsService};
pub use tracing::TracingService;
