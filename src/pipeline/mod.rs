// Listing pipeline: ingestion and processing stages

pub mod ingestion;
pub mod processing;

// Re-export the stage entry points
pub use processing::normalize::{CanonicalFact, PlatformRegistry, SchemaMapper};
pub use processing::derive::DerivedRecord;
