//! Outbound adapters for metrics exporting.
//!
//! Feature-gated behind `metrics`.

mod prometheus_reconciliation;

pub use prometheus_reconciliation::PrometheusReconciliationMetrics;
