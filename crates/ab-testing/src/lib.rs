//! C10: A/B assignment between coexisting model versions. Owns experiment
//! records exclusively; the model registry owns artefacts and the predictor
//! only holds non-owning references to a loaded version.

pub mod assigner;
pub mod experiment;

pub use assigner::{assign_variant, normalized_hash, ABFramework, SNAPSHOT_EVERY_N};
pub use experiment::{Experiment, Variant, VariantCounters};
