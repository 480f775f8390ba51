use std::path::{Path, PathBuf};

use preprocessing::Scaler;
use serde::{Deserialize, Serialize};

/// Static, hard-coded description of a known model version's artefacts and
/// default behaviour. The set of versions is fixed at compile time; nothing
/// discovers new versions at runtime.
#[derive(Debug, Clone)]
pub struct VersionSpec {
    pub version_id: String,
    pub display_name: String,
    pub default_stage1_threshold: f64,
    pub stage1_path: PathBuf,
    pub stage2_path: Option<PathBuf>,
    pub scaler_path: PathBuf,
    pub features_path: PathBuf,
    pub metadata_path: PathBuf,
    pub threshold_path: PathBuf,
}

impl VersionSpec {
    fn new(
        models_root: &Path,
        version_id: &str,
        display_name: &str,
        default_stage1_threshold: f64,
        has_stage2: bool,
    ) -> Self {
        let stage2_path = has_stage2.then(|| models_root.join(format!("{version_id}_stage2.h5")));
        Self {
            version_id: version_id.to_string(),
            display_name: display_name.to_string(),
            default_stage1_threshold,
            stage1_path: models_root.join(format!("{version_id}_stage1.h5")),
            stage2_path,
            scaler_path: models_root.join(format!("{version_id}_scaler.json")),
            features_path: models_root.join(format!("{version_id}_features.json")),
            metadata_path: models_root.join(format!("{version_id}_metadata.json")),
            threshold_path: models_root.join(format!("{version_id}_threshold.json")),
        }
    }
}

/// The three known versions, newest first. Startup auto-load walks this list
/// in order.
pub fn known_versions(models_root: &Path) -> Vec<VersionSpec> {
    vec![
        VersionSpec::new(models_root, "v3.2", "Real Market Data Detector", 0.5, false),
        VersionSpec::new(models_root, "v3.1", "Profitable Reversal Detector", 0.5, true),
        VersionSpec::new(models_root, "v3.0", "Swing Point Detector", 0.2, true),
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FeaturesFile {
    #[serde(default)]
    features: Vec<String>,
    #[serde(default)]
    num_features: Option<usize>,
}

/// Accepts either a bare JSON array or `{features: [...], num_features: N}`.
pub fn parse_features_file(raw: &str) -> Result<Vec<String>, serde_json::Error> {
    if let Ok(bare) = serde_json::from_str::<Vec<String>>(raw) {
        return Ok(bare);
    }
    let wrapped: FeaturesFile = serde_json::from_str(raw)?;
    Ok(wrapped.features)
}

#[derive(Debug, Deserialize)]
struct ThresholdFile {
    stage1_threshold: f64,
}

/// A version that has been loaded: its bookkeeping artefacts resolved and its
/// effective stage1 threshold (persisted override or the spec default).
#[derive(Debug, Clone)]
pub struct LoadedVersion {
    pub spec: VersionSpec,
    pub features: Vec<String>,
    pub scaler: Scaler,
    pub stage1_threshold: f64,
    pub stage2_available: bool,
}

/// Summary surfaced by `GET /reversal/models` and `/models/{version}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version_id: String,
    pub display_name: String,
    pub loaded: bool,
    pub active: bool,
    pub stage2_available: bool,
    pub stage1_threshold: f64,
    pub load_error: Option<String>,
}

pub(crate) fn load_threshold_override(spec: &VersionSpec) -> f64 {
    std::fs::read_to_string(&spec.threshold_path)
        .ok()
        .and_then(|raw| serde_json::from_str::<ThresholdFile>(&raw).ok())
        .map(|t| t.stage1_threshold)
        .unwrap_or(spec.default_stage1_threshold)
}
