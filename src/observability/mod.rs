// Observability: per-stage counters (logging lives in crate::logging)

pub mod metrics;
