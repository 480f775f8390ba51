use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::Utc;
use sha2::{Digest, Sha256};

use analysis_core::{AnalysisError, AnalysisResult, Signal};

use crate::experiment::{Experiment, Variant};

/// Every this-many `record()` calls, an experiment's counters are flushed to
/// disk. Best-effort: a crash between snapshots loses at most this many
/// records, never corrupts the file.
pub const SNAPSHOT_EVERY_N: u64 = 10;

/// Stable hash of `(user_id, experiment_id)` normalised into `[0, 1)`.
/// Deterministic across processes and restarts: no randomness, no clock.
pub fn normalized_hash(user_id: &str, experiment_id: &str) -> f64 {
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_bytes());
    hasher.update(b":");
    hasher.update(experiment_id.as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    let as_u64 = u64::from_be_bytes(bytes);
    (as_u64 as f64) / (u64::MAX as f64 + 1.0)
}

/// C10: deterministic variant assignment over `variant = A iff normalised <
/// traffic_split_a`.
pub fn assign_variant(user_id: &str, experiment: &Experiment) -> Variant {
    let h = normalized_hash(user_id, &experiment.experiment_id);
    if h < experiment.traffic_split_a {
        Variant::A
    } else {
        Variant::B
    }
}

struct FrameworkState {
    experiments: HashMap<String, Experiment>,
    active_experiment_id: Option<String>,
}

/// C10: owns every experiment record. At most one experiment is active at a
/// time; activating a new one atomically stops whichever was previously
/// active.
pub struct ABFramework {
    state: RwLock<FrameworkState>,
    experiments_root: PathBuf,
}

impl ABFramework {
    pub fn new(experiments_root: impl Into<PathBuf>) -> Self {
        Self {
            state: RwLock::new(FrameworkState {
                experiments: HashMap::new(),
                active_experiment_id: None,
            }),
            experiments_root: experiments_root.into(),
        }
    }

    /// Reconstructs every experiment record found under `experiments_root`,
    /// so that a restart reproduces the active experiment and its counters
    /// up to the last snapshot.
    pub fn load_from_disk(experiments_root: impl Into<PathBuf>) -> AnalysisResult<Self> {
        let root: PathBuf = experiments_root.into();
        let framework = Self::new(root.clone());
        if !root.is_dir() {
            return Ok(framework);
        }

        let mut state = framework.state.write().expect("ab-testing lock poisoned");
        for entry in std::fs::read_dir(&root)
            .map_err(|e| AnalysisError::ArtefactIoError(e.to_string()))?
        {
            let entry = entry.map_err(|e| AnalysisError::ArtefactIoError(e.to_string()))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let raw = std::fs::read_to_string(&path)
                .map_err(|e| AnalysisError::ArtefactIoError(e.to_string()))?;
            let experiment: Experiment = serde_json::from_str(&raw)
                .map_err(|e| AnalysisError::ArtefactIoError(e.to_string()))?;
            if experiment.active {
                state.active_experiment_id = Some(experiment.experiment_id.clone());
            }
            state.experiments.insert(experiment.experiment_id.clone(), experiment);
        }
        drop(state);
        Ok(framework)
    }

    fn snapshot_path(&self, experiment_id: &str) -> PathBuf {
        self.experiments_root.join(format!("{experiment_id}.json"))
    }

    fn snapshot(&self, experiment: &Experiment) {
        if let Err(e) = std::fs::create_dir_all(&self.experiments_root) {
            tracing::warn!(error = %e, "failed to create experiments_root");
            return;
        }
        match serde_json::to_string_pretty(experiment) {
            Ok(json) => {
                if let Err(e) = std::fs::write(self.snapshot_path(&experiment.experiment_id), json) {
                    tracing::warn!(error = %e, experiment = %experiment.experiment_id, "failed to snapshot experiment");
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to serialise experiment snapshot"),
        }
    }

    pub fn create(&self, mut experiment: Experiment) -> AnalysisResult<()> {
        if !(0.0..=1.0).contains(&experiment.traffic_split_a) {
            return Err(AnalysisError::ValidationError(
                "traffic_split_a must be in [0, 1]".to_string(),
            ));
        }
        experiment.active = false;
        let mut state = self.state.write().expect("ab-testing lock poisoned");
        if state.experiments.contains_key(&experiment.experiment_id) {
            return Err(AnalysisError::ValidationError(format!(
                "experiment {} already exists",
                experiment.experiment_id
            )));
        }
        state.experiments.insert(experiment.experiment_id.clone(), experiment);
        Ok(())
    }

    /// Activates `experiment_id`, stopping whichever experiment was
    /// previously active (at most one active per framework).
    pub fn activate(&self, experiment_id: &str) -> AnalysisResult<()> {
        let now = Utc::now();
        let mut state = self.state.write().expect("ab-testing lock poisoned");

        if !state.experiments.contains_key(experiment_id) {
            return Err(AnalysisError::ValidationError(format!(
                "unknown experiment {experiment_id}"
            )));
        }

        if let Some(prev_id) = state.active_experiment_id.clone() {
            if prev_id != experiment_id {
                if let Some(prev) = state.experiments.get_mut(&prev_id) {
                    prev.stop(now);
                }
            }
        }

        if let Some(exp) = state.experiments.get_mut(experiment_id) {
            exp.active = true;
            exp.ended_at = None;
        }
        state.active_experiment_id = Some(experiment_id.to_string());
        Ok(())
    }

    pub fn stop(&self, experiment_id: &str) -> AnalysisResult<()> {
        let now = Utc::now();
        let mut state = self.state.write().expect("ab-testing lock poisoned");
        let exp = state
            .experiments
            .get_mut(experiment_id)
            .ok_or_else(|| AnalysisError::ValidationError(format!("unknown experiment {experiment_id}")))?;
        exp.stop(now);
        if state.active_experiment_id.as_deref() == Some(experiment_id) {
            state.active_experiment_id = None;
        }
        Ok(())
    }

    /// `get_variant_for_user(user_id) -> (version_id, experiment_id)`.
    /// Returns `(None, None)` when no experiment is active.
    pub fn get_variant_for_user(&self, user_id: &str) -> (Option<String>, Option<String>) {
        let state = self.state.read().expect("ab-testing lock poisoned");
        let Some(active_id) = state.active_experiment_id.as_ref() else {
            return (None, None);
        };
        let Some(experiment) = state.experiments.get(active_id) else {
            return (None, None);
        };
        let variant = assign_variant(user_id, experiment);
        (
            Some(experiment.version_for(variant).to_string()),
            Some(experiment.experiment_id.clone()),
        )
    }

    /// After inference: increments the assigned variant's counters and
    /// snapshots every [`SNAPSHOT_EVERY_N`] records.
    pub fn record(
        &self,
        experiment_id: &str,
        user_id: &str,
        signal: Signal,
        confidence: f64,
    ) -> AnalysisResult<()> {
        let mut state = self.state.write().expect("ab-testing lock poisoned");
        let experiment = state
            .experiments
            .get_mut(experiment_id)
            .ok_or_else(|| AnalysisError::ValidationError(format!("unknown experiment {experiment_id}")))?;

        let variant = assign_variant(user_id, experiment);
        experiment.record(variant, signal, confidence);

        let should_snapshot = experiment.records_since_snapshot >= SNAPSHOT_EVERY_N;
        if should_snapshot {
            experiment.records_since_snapshot = 0;
        }
        let snapshot_copy = should_snapshot.then(|| experiment.clone());
        drop(state);

        if let Some(exp) = snapshot_copy {
            self.snapshot(&exp);
        }
        Ok(())
    }

    pub fn get(&self, experiment_id: &str) -> Option<Experiment> {
        self.state
            .read()
            .expect("ab-testing lock poisoned")
            .experiments
            .get(experiment_id)
            .cloned()
    }

    pub fn list(&self) -> Vec<Experiment> {
        let state = self.state.read().expect("ab-testing lock poisoned");
        let mut out: Vec<Experiment> = state.experiments.values().cloned().collect();
        out.sort_by(|a, b| a.experiment_id.cmp(&b.experiment_id));
        out
    }

    pub fn active_experiment_id(&self) -> Option<String> {
        self.state.read().expect("ab-testing lock poisoned").active_experiment_id.clone()
    }

    /// Flushes every experiment to disk unconditionally. Call on teardown so
    /// counters since the last periodic snapshot aren't lost.
    pub fn flush_all(&self) {
        let experiments: Vec<Experiment> = {
            let state = self.state.read().expect("ab-testing lock poisoned");
            state.experiments.values().cloned().collect()
        };
        for exp in &experiments {
            self.snapshot(exp);
        }
    }

    pub fn experiments_root(&self) -> &Path {
        &self.experiments_root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_experiment(split_a: f64) -> Experiment {
        Experiment::new(
            "exp_x",
            "v3.0 vs v3.1",
            "test experiment",
            "v3.0",
            "v3.1",
            split_a,
            Utc::now(),
        )
    }

    #[test]
    fn assignment_is_deterministic_across_calls() {
        let exp = sample_experiment(0.5);
        let first = assign_variant("u1", &exp);
        for _ in 0..1000 {
            assert_eq!(assign_variant("u1", &exp), first);
        }
    }

    #[test]
    fn activating_stops_previous_experiment() {
        let framework = ABFramework::new(std::env::temp_dir().join("ab-test-activate"));
        framework.create(sample_experiment(0.5)).unwrap();
        let mut second = sample_experiment(0.3);
        second.experiment_id = "exp_y".to_string();
        framework.create(second).unwrap();

        framework.activate("exp_x").unwrap();
        assert_eq!(framework.active_experiment_id().as_deref(), Some("exp_x"));

        framework.activate("exp_y").unwrap();
        assert_eq!(framework.active_experiment_id().as_deref(), Some("exp_y"));
        let prev = framework.get("exp_x").unwrap();
        assert!(!prev.active);
        assert!(prev.ended_at.is_some());
    }

    #[test]
    fn no_active_experiment_returns_none() {
        let framework = ABFramework::new(std::env::temp_dir().join("ab-test-none"));
        framework.create(sample_experiment(0.5)).unwrap();
        let (version, experiment_id) = framework.get_variant_for_user("u1");
        assert!(version.is_none());
        assert!(experiment_id.is_none());
    }

    #[test]
    fn record_updates_counters_for_assigned_variant() {
        let framework = ABFramework::new(std::env::temp_dir().join("ab-test-record"));
        framework.create(sample_experiment(1.0)).unwrap(); // everyone is variant A
        framework.activate("exp_x").unwrap();
        framework.record("exp_x", "u1", Signal::Long, 0.8).unwrap();
        let exp = framework.get("exp_x").unwrap();
        assert_eq!(exp.counters_a.count, 1);
        assert_eq!(exp.counters_a.signals_long, 1);
        assert!((exp.counters_a.avg_confidence - 0.8).abs() < 1e-9);
    }
}
