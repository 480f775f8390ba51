use std::path::PathBuf;

use crate::ip_allowlist::IpAllowlist;

/// Process-wide configuration, read once at startup from the environment
/// (`.env` loaded via `dotenvy` if present). Covers the options named for
/// the serving layer: window size, artefact roots, and the embedded-Python
/// toggle for real Keras inference versus the in-process stub models.
#[derive(Debug, Clone)]
pub struct ReversalConfig {
    pub bind_addr: String,
    pub models_root: PathBuf,
    pub experiments_root: PathBuf,
    pub model_scripts_path: String,
    pub embedded_python_enabled: bool,
    pub sequence_length: usize,
}

impl ReversalConfig {
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            models_root: PathBuf::from(std::env::var("MODELS_ROOT").unwrap_or_else(|_| "models".to_string())),
            experiments_root: PathBuf::from(
                std::env::var("EXPERIMENTS_ROOT").unwrap_or_else(|_| "experiments".to_string()),
            ),
            model_scripts_path: std::env::var("MODEL_SCRIPTS_PATH").unwrap_or_else(|_| "python".to_string()),
            embedded_python_enabled: std::env::var("EMBEDDED_PYTHON_ENABLED")
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(false),
            sequence_length: std::env::var("SEQUENCE_LENGTH")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(20),
        }
    }

    pub fn admin_ip_allowlist(&self) -> Option<IpAllowlist> {
        IpAllowlist::from_env()
    }
}
