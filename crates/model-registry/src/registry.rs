use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use analysis_core::{AnalysisError, AnalysisResult};
use preprocessing::scaler::FeatureStats;
use preprocessing::{Scaler, ScalerKind};

use crate::version::{known_versions, load_threshold_override, parse_features_file, LoadedVersion, VersionInfo, VersionSpec};

/// Per-file breakdown of a `load()` attempt, reported back to the caller
/// regardless of whether the load ultimately succeeded.
#[derive(Debug, Clone, Default)]
pub struct VersionLoadReport {
    pub version_id: String,
    pub stage1_found: bool,
    pub stage2_found: bool,
    pub scaler_error: Option<String>,
    pub features_error: Option<String>,
}

struct RegistryState {
    specs: HashMap<String, VersionSpec>,
    loaded: HashMap<String, LoadedVersion>,
    active: Option<String>,
    load_errors: HashMap<String, String>,
}

/// C9. A fixed, hard-coded catalogue of known versions plus the currently
/// loaded artefacts and the active pointer. `switch` loads then atomically
/// replaces the pointer; the previously active version stays loaded so
/// in-flight requests keep working against it.
pub struct ModelRegistry {
    state: RwLock<RegistryState>,
}

impl ModelRegistry {
    pub fn new(models_root: &Path) -> Self {
        let specs = known_versions(models_root)
            .into_iter()
            .map(|s| (s.version_id.clone(), s))
            .collect();
        Self {
            state: RwLock::new(RegistryState {
                specs,
                loaded: HashMap::new(),
                active: None,
                load_errors: HashMap::new(),
            }),
        }
    }

    /// Registers an additional version spec at runtime. The three hard-coded
    /// versions are always present; this exists for test fixtures and future
    /// extension, not for runtime discovery of arbitrary artefacts.
    pub fn register(&self, spec: VersionSpec) {
        let mut state = self.state.write().expect("registry lock poisoned");
        state.specs.insert(spec.version_id.clone(), spec);
    }

    /// Loads a version's bookkeeping artefacts. Stage-1 file presence is
    /// fatal; scaler unreadable is non-fatal; feature-list missing is fatal;
    /// stage-2 missing is non-fatal (the predictor falls back to hold).
    pub fn load(&self, version_id: &str) -> AnalysisResult<VersionLoadReport> {
        let spec = {
            let state = self.state.read().expect("registry lock poisoned");
            state
                .specs
                .get(version_id)
                .cloned()
                .ok_or_else(|| AnalysisError::VersionNotAvailable(version_id.to_string()))?
        };

        let mut report = VersionLoadReport {
            version_id: version_id.to_string(),
            ..Default::default()
        };

        report.stage1_found = spec.stage1_path.exists();
        if !report.stage1_found {
            let msg = format!("stage1 artefact missing: {}", spec.stage1_path.display());
            self.record_error(version_id, &msg);
            return Err(AnalysisError::ArtefactIoError(msg));
        }

        report.stage2_found = spec
            .stage2_path
            .as_ref()
            .map(|p| p.exists())
            .unwrap_or(false);

        let features = match std::fs::read_to_string(&spec.features_path) {
            Ok(raw) => match parse_features_file(&raw) {
                Ok(features) => features,
                Err(e) => {
                    let msg = format!("features file unparsable: {e}");
                    self.record_error(version_id, &msg);
                    return Err(AnalysisError::ArtefactIoError(msg));
                }
            },
            Err(e) => {
                let msg = format!("features file missing: {e}");
                report.features_error = Some(msg.clone());
                self.record_error(version_id, &msg);
                return Err(AnalysisError::ArtefactIoError(msg));
            }
        };

        let scaler = match Scaler::load(&spec.scaler_path) {
            Ok(scaler) => scaler,
            Err(e) => {
                report.scaler_error = Some(e.to_string());
                tracing::warn!(version = version_id, error = %e, "scaler unreadable, serving without normalisation");
                Scaler {
                    kind: ScalerKind::Standard,
                    feature_names: features.clone(),
                    stats: features
                        .iter()
                        .map(|_| FeatureStats {
                            min: 0.0,
                            max: 1.0,
                            mean: 0.0,
                            std: 1.0,
                            median: 0.0,
                            q1: 0.0,
                            q3: 1.0,
                        })
                        .collect(),
                    feature_range: (0.0, 1.0),
                }
            }
        };

        let stage1_threshold = load_threshold_override(&spec);
        let stage2_available = report.stage2_found;

        let loaded = LoadedVersion {
            spec,
            features,
            scaler,
            stage1_threshold,
            stage2_available,
        };

        let mut state = self.state.write().expect("registry lock poisoned");
        state.loaded.insert(version_id.to_string(), loaded);
        state.load_errors.remove(version_id);

        Ok(report)
    }

    fn record_error(&self, version_id: &str, msg: &str) {
        let mut state = self.state.write().expect("registry lock poisoned");
        state.load_errors.insert(version_id.to_string(), msg.to_string());
    }

    /// Loads then atomically activates a version.
    pub fn switch(&self, version_id: &str) -> AnalysisResult<()> {
        if !self.is_loaded(version_id) {
            self.load(version_id)?;
        }
        let mut state = self.state.write().expect("registry lock poisoned");
        state.active = Some(version_id.to_string());
        Ok(())
    }

    pub fn is_loaded(&self, version_id: &str) -> bool {
        self.state
            .read()
            .expect("registry lock poisoned")
            .loaded
            .contains_key(version_id)
    }

    pub fn get_active(&self) -> Option<LoadedVersion> {
        let state = self.state.read().expect("registry lock poisoned");
        state.active.as_ref().and_then(|id| state.loaded.get(id).cloned())
    }

    pub fn get_version(&self, version_id: &str) -> AnalysisResult<LoadedVersion> {
        self.state
            .read()
            .expect("registry lock poisoned")
            .loaded
            .get(version_id)
            .cloned()
            .ok_or_else(|| AnalysisError::VersionNotAvailable(version_id.to_string()))
    }

    pub fn get_versions_info(&self) -> Vec<VersionInfo> {
        let state = self.state.read().expect("registry lock poisoned");
        let mut ids: Vec<&String> = state.specs.keys().collect();
        ids.sort();
        ids.into_iter()
            .map(|id| {
                let spec = &state.specs[id];
                let loaded = state.loaded.get(id);
                VersionInfo {
                    version_id: id.clone(),
                    display_name: spec.display_name.clone(),
                    loaded: loaded.is_some(),
                    active: state.active.as_deref() == Some(id.as_str()),
                    stage2_available: loaded.map(|l| l.stage2_available).unwrap_or(false),
                    stage1_threshold: loaded
                        .map(|l| l.stage1_threshold)
                        .unwrap_or(spec.default_stage1_threshold),
                    load_error: state.load_errors.get(id).cloned(),
                }
            })
            .collect()
    }

    /// Startup policy: prefer the highest-numbered version (v3.2, then v3.1,
    /// then v3.0), falling back to the next on load failure. Returns the
    /// activated version id, or `None` if every version failed to load.
    pub fn auto_load_best_version(&self, models_root: &Path) -> Option<String> {
        let mut ids: Vec<String> = known_versions(models_root)
            .into_iter()
            .map(|s| s.version_id)
            .collect();
        ids.sort_by(|a, b| b.cmp(a));

        for id in ids {
            match self.switch(&id) {
                Ok(()) => {
                    tracing::info!(version = %id, "activated model version at startup");
                    return Some(id);
                }
                Err(e) => {
                    tracing::warn!(version = %id, error = %e, "version failed to load, falling back");
                }
            }
        }
        None
    }
}
