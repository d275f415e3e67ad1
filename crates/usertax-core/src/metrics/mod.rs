//! Metrics collection.

mod registry;

pub use registry::{
    new_shared_registry, MetricsRegistry, MetricsSnapshot, ScopeSnapshot, SharedMetricsRegistry,
};
