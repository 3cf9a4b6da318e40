//! Observability: in-process counters and the sink boundary.
//!
//! Framework code records `MetricsEvent`s through `sink::record` only; it never
//! touches the counter state in `metrics` directly.

pub(crate) mod metrics;
pub(crate) mod sink;

// re-exports
pub use metrics::{EventOps, EventReport, KindCounters};
pub use sink::{MetricsEvent, MetricsSink, metrics_report, metrics_reset_all, with_metrics_sink};
