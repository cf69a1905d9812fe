// Pipeline processing: mapping, derivation, validation, and reconciliation

pub mod normalize;
pub mod derive;
pub mod quality_gate;
pub mod availability;
pub mod conflation;
pub mod identity;
pub mod aggregate;
