use analysis_core::AnalysisResult;
use preprocessing::Sequence;

/// C6: binary "does this window contain a reversal" model.
pub trait Stage1Model: Send + Sync {
    /// Runs inference once over the full batch.
    fn predict_batch(&self, batch: &[Sequence]) -> AnalysisResult<Vec<f64>>;
}

/// C7: binary "LONG vs SHORT" model, trained and invoked only on the subset
/// of windows Stage-1 flagged as a reversal.
pub trait Stage2Model: Send + Sync {
    fn predict_batch(&self, batch: &[Sequence]) -> AnalysisResult<Vec<f64>>;
}

/// An in-process stand-in for a Stage-1/Stage-2 model that returns a fixed
/// probability per call. Used by tests and by callers wiring up the
/// predictor before a real embedded model is loaded.
#[derive(Debug, Clone)]
pub struct ConstantModel {
    pub probability: f64,
}

impl ConstantModel {
    pub fn new(probability: f64) -> Self {
        Self { probability }
    }
}

impl Stage1Model for ConstantModel {
    fn predict_batch(&self, batch: &[Sequence]) -> AnalysisResult<Vec<f64>> {
        Ok(vec![self.probability; batch.len()])
    }
}

impl Stage2Model for ConstantModel {
    fn predict_batch(&self, batch: &[Sequence]) -> AnalysisResult<Vec<f64>> {
        Ok(vec![self.probability; batch.len()])
    }
}

/// A model backed by a lookup table keyed by batch index, for deterministic
/// scenario tests.
#[derive(Debug, Clone, Default)]
pub struct ScriptedModel {
    pub probabilities: Vec<f64>,
}

impl Stage1Model for ScriptedModel {
    fn predict_batch(&self, batch: &[Sequence]) -> AnalysisResult<Vec<f64>> {
        Ok((0..batch.len())
            .map(|i| self.probabilities.get(i).copied().unwrap_or(0.0))
            .collect())
    }
}

impl Stage2Model for ScriptedModel {
    fn predict_batch(&self, batch: &[Sequence]) -> AnalysisResult<Vec<f64>> {
        Ok((0..batch.len())
            .map(|i| self.probabilities.get(i).copied().unwrap_or(0.0))
            .collect())
    }
}

#[cfg(feature = "embedded-python")]
pub mod embedded {
    use super::{Stage1Model, Stage2Model};
    use analysis_core::{AnalysisError, AnalysisResult};
    use preprocessing::Sequence;
    use pyo3::prelude::*;
    use pyo3::types::{PyList, PyModule};
    use std::path::{Path, PathBuf};

    /// Makes a directory of Keras model-loading scripts importable from the
    /// embedded interpreter by prepending it to `sys.path`, idempotently.
    pub fn setup_python(model_scripts_path: &str) -> PyResult<()> {
        Python::attach(|py| {
            let sys = py.import("sys")?;
            let path: Bound<'_, PyList> = sys.getattr("path")?.cast_into()?;

            let abs_path = std::fs::canonicalize(model_scripts_path)
                .unwrap_or_else(|_| PathBuf::from(model_scripts_path));
            let path_str = abs_path.to_string_lossy().to_string();

            if !path.iter().any(|p| p.extract::<String>().map(|s| s == path_str).unwrap_or(false)) {
                path.insert(0, &path_str)?;
                tracing::info!("added to sys.path: {}", path_str);
            }
            Ok(())
        })
    }

    /// In-process wrapper around a Keras `.h5` model loaded via a small
    /// Python loader module (`stage_models.load_h5`), kept alive for the
    /// process lifetime and called on every prediction.
    pub struct EmbeddedKerasModel {
        model: Py<PyAny>,
    }

    unsafe impl Send for EmbeddedKerasModel {}
    unsafe impl Sync for EmbeddedKerasModel {}

    impl EmbeddedKerasModel {
        pub fn load(h5_path: &Path) -> AnalysisResult<Self> {
            Python::attach(|py| {
                let loader: Bound<'_, PyModule> = py
                    .import("stage_models.loader")
                    .map_err(|e| AnalysisError::ArtefactIoError(format!("stage_models.loader import failed: {e}")))?;
                let model = loader
                    .call_method1("load_h5", (h5_path.to_string_lossy().to_string(),))
                    .map_err(|e| AnalysisError::ArtefactIoError(format!("load_h5 failed: {e}")))?;
                Ok(Self { model: model.unbind() })
            })
        }

        fn predict(&self, batch: &[Sequence]) -> AnalysisResult<Vec<f64>> {
            Python::attach(|py| {
                let result = self
                    .model
                    .call_method1(py, "predict", (batch.to_vec(),))
                    .map_err(|e| AnalysisError::CalculationError(format!("predict() failed: {e}")))?;
                result
                    .extract::<Vec<f64>>(py)
                    .map_err(|e| AnalysisError::CalculationError(format!("failed to extract probabilities: {e}")))
            })
        }
    }

    impl Stage1Model for EmbeddedKerasModel {
        fn predict_batch(&self, batch: &[Sequence]) -> AnalysisResult<Vec<f64>> {
            self.predict(batch)
        }
    }

    impl Stage2Model for EmbeddedKerasModel {
        fn predict_batch(&self, batch: &[Sequence]) -> AnalysisResult<Vec<f64>> {
            self.predict(batch)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_model_repeats_probability() {
        let model = ConstantModel::new(0.42);
        let batch: Vec<Sequence> = vec![vec![vec![0.0]], vec![vec![0.0]]];
        let out = Stage1Model::predict_batch(&model, &batch).unwrap();
        assert_eq!(out, vec![0.42, 0.42]);
    }
}
