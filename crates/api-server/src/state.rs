use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use analysis_core::AnalysisResult;
use model_registry::{LoadedVersion, ModelRegistry};
use preprocessing::Preprocessor;
use stage_predictor::{ConstantModel, Stage1Model, Stage2Model};

use ab_testing::ABFramework;

use crate::brute_force::BruteForceGuard;
use crate::config::ReversalConfig;
use crate::ip_allowlist::IpAllowlist;

/// Shared, request-independent state. Cloned cheaply (everything is behind an
/// `Arc`) into every handler via axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ModelRegistry>,
    pub preprocessor: Arc<Preprocessor>,
    pub ab_framework: Arc<ABFramework>,
    pub brute_force: Arc<BruteForceGuard>,
    pub ip_allowlist: Option<IpAllowlist>,
    pub config: Arc<ReversalConfig>,
    stage1_models: Arc<RwLock<HashMap<String, Arc<dyn Stage1Model>>>>,
    stage2_models: Arc<RwLock<HashMap<String, Arc<dyn Stage2Model>>>>,
}

impl AppState {
    pub fn new(
        registry: Arc<ModelRegistry>,
        preprocessor: Arc<Preprocessor>,
        ab_framework: Arc<ABFramework>,
        config: Arc<ReversalConfig>,
    ) -> Self {
        let ip_allowlist = config.admin_ip_allowlist();
        Self {
            registry,
            preprocessor,
            ab_framework,
            brute_force: Arc::new(BruteForceGuard::new()),
            ip_allowlist,
            config,
            stage1_models: Arc::new(RwLock::new(HashMap::new())),
            stage2_models: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Returns the Stage-1 model and, if available for this version, the
    /// Stage-2 model, loading and caching them on first use. Re-used across
    /// requests for the lifetime of the process or until the version is
    /// reloaded.
    pub fn models_for(
        &self,
        version: &LoadedVersion,
    ) -> AnalysisResult<(Arc<dyn Stage1Model>, Option<Arc<dyn Stage2Model>>)> {
        let version_id = &version.spec.version_id;

        if let Some(s1) = self.stage1_models.read().expect("model cache lock poisoned").get(version_id) {
            let s2 = self
                .stage2_models
                .read()
                .expect("model cache lock poisoned")
                .get(version_id)
                .cloned();
            return Ok((s1.clone(), s2));
        }

        let (stage1, stage2) = self.load_models(version)?;

        self.stage1_models
            .write()
            .expect("model cache lock poisoned")
            .insert(version_id.clone(), stage1.clone());
        if let Some(ref s2) = stage2 {
            self.stage2_models
                .write()
                .expect("model cache lock poisoned")
                .insert(version_id.clone(), s2.clone());
        }

        Ok((stage1, stage2))
    }

    #[cfg(feature = "embedded-ml")]
    fn load_models(
        &self,
        version: &LoadedVersion,
    ) -> AnalysisResult<(Arc<dyn Stage1Model>, Option<Arc<dyn Stage2Model>>)> {
        use stage_predictor::inference::embedded::{setup_python, EmbeddedKerasModel};

        if !self.config.embedded_python_enabled {
            return Ok(self.stub_models(version));
        }

        let _ = setup_python(&self.config.model_scripts_path);
        let stage1: Arc<dyn Stage1Model> = Arc::new(EmbeddedKerasModel::load(&version.spec.stage1_path)?);
        let stage2: Option<Arc<dyn Stage2Model>> = match &version.spec.stage2_path {
            Some(path) if version.stage2_available => {
                Some(Arc::new(EmbeddedKerasModel::load(path)?) as Arc<dyn Stage2Model>)
            }
            _ => None,
        };
        Ok((stage1, stage2))
    }

    #[cfg(not(feature = "embedded-ml"))]
    fn load_models(
        &self,
        version: &LoadedVersion,
    ) -> AnalysisResult<(Arc<dyn Stage1Model>, Option<Arc<dyn Stage2Model>>)> {
        Ok(self.stub_models(version))
    }

    /// Deterministic in-process stand-in used whenever the embedded Python
    /// interpreter is compiled out or disabled. Lets the HTTP surface and its
    /// tests run without a real Keras artefact on disk.
    #[allow(dead_code)]
    fn stub_models(&self, version: &LoadedVersion) -> (Arc<dyn Stage1Model>, Option<Arc<dyn Stage2Model>>) {
        let stage1: Arc<dyn Stage1Model> = Arc::new(ConstantModel::new(version.stage1_threshold));
        let stage2 = version
            .stage2_available
            .then(|| Arc::new(ConstantModel::new(0.5)) as Arc<dyn Stage2Model>);
        (stage1, stage2)
    }
}
