//! C6 (Stage-1 detector), C7 (Stage-2 classifier) and C8 (two-stage
//! predictor composition). Model weights are Keras `.h5` artefacts; actual
//! forward passes happen in an embedded Python interpreter (see
//! [`inference::embedded`], feature-gated behind `embedded-python`). The
//! composition algorithm in [`predictor`] and the training-time descriptors
//! in [`training`]/[`integrity`] are pure Rust and backend agnostic.

pub mod inference;
pub mod integrity;
pub mod predictor;
pub mod training;

pub use inference::{ConstantModel, ScriptedModel, Stage1Model, Stage2Model};
pub use predictor::{predict_batch, predict_single, PredictionResult};
pub use training::{
    ClassWeightScheme, Stage1Architecture, Stage2Architecture, TrainingCallbacks, TrainingProtocol,
};
