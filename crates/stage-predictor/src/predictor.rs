use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use analysis_core::{AnalysisError, AnalysisResult, Signal};
use model_registry::LoadedVersion;
use preprocessing::Sequence;

use crate::inference::{Stage1Model, Stage2Model};

/// Result of one two-stage prediction pass, also serialised directly as the
/// predict-raw response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    pub signal: Signal,
    pub confidence: f64,
    pub stage1_prob: f64,
    pub stage2_prob: Option<f64>,
    pub model_version: String,
    pub timestamp: DateTime<Utc>,
    /// Set when Stage-1 fired but Stage-2 is unavailable for this version --
    /// recovered locally as a Hold rather than surfaced as an error.
    pub warning: Option<String>,
}

fn validate_shape(x: &Sequence, version: &LoadedVersion) -> AnalysisResult<()> {
    let got = x.first().map(|row| row.len()).unwrap_or(0);
    let expected = version.features.len();
    if got != expected {
        return Err(AnalysisError::FeatureMismatch(format!(
            "version {} expects {} features, got {}",
            version.spec.version_id, expected, got
        )));
    }
    Ok(())
}

/// Single-sample prediction: threshold Stage-1, gate Stage-2, blend confidence.
pub fn predict_single(
    x: &Sequence,
    version: &LoadedVersion,
    stage1: &dyn Stage1Model,
    stage2: Option<&dyn Stage2Model>,
    now: DateTime<Utc>,
) -> AnalysisResult<PredictionResult> {
    validate_shape(x, version)?;

    let p1 = *stage1
        .predict_batch(std::slice::from_ref(x))?
        .first()
        .ok_or_else(|| AnalysisError::CalculationError("stage1 returned no prediction".to_string()))?;

    if p1 < version.stage1_threshold {
        return Ok(PredictionResult {
            signal: Signal::Hold,
            confidence: 1.0 - p1,
            stage1_prob: p1,
            stage2_prob: None,
            model_version: version.spec.version_id.clone(),
            timestamp: now,
            warning: None,
        });
    }

    let Some(stage2) = stage2 else {
        return Ok(PredictionResult {
            signal: Signal::Hold,
            confidence: p1,
            stage1_prob: p1,
            stage2_prob: None,
            model_version: version.spec.version_id.clone(),
            timestamp: now,
            warning: Some("stage2_unavailable".to_string()),
        });
    };

    let p2 = *stage2
        .predict_batch(std::slice::from_ref(x))?
        .first()
        .ok_or_else(|| AnalysisError::CalculationError("stage2 returned no prediction".to_string()))?;

    let signal = if p2 > 0.5 { Signal::Short } else { Signal::Long };
    let direction_confidence = p2.max(1.0 - p2);
    let confidence = 0.4 * p1 + 0.6 * direction_confidence;

    Ok(PredictionResult {
        signal,
        confidence,
        stage1_prob: p1,
        stage2_prob: Some(p2),
        model_version: version.spec.version_id.clone(),
        timestamp: now,
        warning: None,
    })
}

/// Batch form: Stage-1 runs once over the full batch; Stage-2 only runs on
/// the subset crossing the threshold; results are stitched
/// back by original index. Across concurrent requests no ordering is
/// implied; within one call Stage-1 always completes before Stage-2 begins.
pub fn predict_batch(
    batch: &[Sequence],
    version: &LoadedVersion,
    stage1: &dyn Stage1Model,
    stage2: Option<&dyn Stage2Model>,
    now: DateTime<Utc>,
) -> AnalysisResult<Vec<PredictionResult>> {
    for x in batch {
        validate_shape(x, version)?;
    }

    let p1s = stage1.predict_batch(batch)?;
    if p1s.len() != batch.len() {
        return Err(AnalysisError::CalculationError(format!(
            "stage1 returned {} predictions for a batch of {}",
            p1s.len(),
            batch.len()
        )));
    }

    let crossing: Vec<usize> = p1s
        .iter()
        .enumerate()
        .filter(|(_, &p)| p >= version.stage1_threshold)
        .map(|(i, _)| i)
        .collect();

    let p2s: Option<Vec<f64>> = match (crossing.is_empty(), stage2) {
        (true, _) => Some(vec![]),
        (false, None) => None,
        (false, Some(model)) => {
            let subset: Vec<Sequence> = crossing.iter().map(|&i| batch[i].clone()).collect();
            Some(model.predict_batch(&subset)?)
        }
    };

    let mut results = Vec::with_capacity(batch.len());
    let mut crossing_cursor = 0usize;

    for (i, &p1) in p1s.iter().enumerate() {
        if p1 < version.stage1_threshold {
            results.push(PredictionResult {
                signal: Signal::Hold,
                confidence: 1.0 - p1,
                stage1_prob: p1,
                stage2_prob: None,
                model_version: version.spec.version_id.clone(),
                timestamp: now,
                warning: None,
            });
            continue;
        }

        match &p2s {
            None => {
                results.push(PredictionResult {
                    signal: Signal::Hold,
                    confidence: p1,
                    stage1_prob: p1,
                    stage2_prob: None,
                    model_version: version.spec.version_id.clone(),
                    timestamp: now,
                    warning: Some("stage2_unavailable".to_string()),
                });
            }
            Some(values) => {
                let p2 = values[crossing_cursor];
                crossing_cursor += 1;
                let signal = if p2 > 0.5 { Signal::Short } else { Signal::Long };
                let direction_confidence = p2.max(1.0 - p2);
                let confidence = 0.4 * p1 + 0.6 * direction_confidence;
                results.push(PredictionResult {
                    signal,
                    confidence,
                    stage1_prob: p1,
                    stage2_prob: Some(p2),
                    model_version: version.spec.version_id.clone(),
                    timestamp: now,
                    warning: None,
                });
            }
        }
        let _ = i;
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::{ConstantModel, ScriptedModel};
    use chrono::TimeZone;
    use model_registry::VersionSpec;
    use preprocessing::{Scaler, ScalerKind};
    use std::path::PathBuf;

    fn version(threshold: f64, stage2_available: bool) -> LoadedVersion {
        let root = PathBuf::from("/tmp");
        LoadedVersion {
            spec: VersionSpec {
                version_id: "v-test".to_string(),
                display_name: "Test Version".to_string(),
                default_stage1_threshold: threshold,
                stage1_path: root.join("v-test_stage1.h5"),
                stage2_path: stage2_available.then(|| root.join("v-test_stage2.h5")),
                scaler_path: root.join("v-test_scaler.json"),
                features_path: root.join("v-test_features.json"),
                metadata_path: root.join("v-test_metadata.json"),
                threshold_path: root.join("v-test_threshold.json"),
            },
            features: vec!["close".into(), "rsi_14".into()],
            scaler: Scaler {
                kind: ScalerKind::Standard,
                feature_names: vec!["close".into(), "rsi_14".into()],
                stats: vec![],
                feature_range: (0.0, 1.0),
            },
            stage1_threshold: threshold,
            stage2_available,
        }
    }

    fn seq() -> Sequence {
        vec![vec![1.0, 2.0]; 20]
    }

    #[test]
    fn below_threshold_holds_without_invoking_stage2() {
        let v = version(0.5, true);
        let stage1 = ConstantModel::new(0.30);
        let stage2 = ConstantModel::new(0.99);
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let result = predict_single(&seq(), &v, &stage1, Some(&stage2), now).unwrap();
        assert_eq!(result.signal, Signal::Hold);
        assert!((result.confidence - 0.70).abs() < 1e-9);
        assert_eq!(result.stage2_prob, None);
    }

    #[test]
    fn equal_to_threshold_holds_strict_less_than() {
        let v = version(0.5, true);
        let stage1 = ConstantModel::new(0.5);
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let result = predict_single(&seq(), &v, &stage1, Some(&ConstantModel::new(0.9)), now).unwrap();
        assert_eq!(result.signal, Signal::Hold);
    }

    #[test]
    fn short_reversal_blends_confidence() {
        let v = version(0.5, true);
        let stage1 = ConstantModel::new(0.80);
        let stage2 = ConstantModel::new(0.70);
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let result = predict_single(&seq(), &v, &stage1, Some(&stage2), now).unwrap();
        assert_eq!(result.signal, Signal::Short);
        assert!((result.confidence - 0.74).abs() < 1e-9);
    }

    #[test]
    fn stage2_missing_falls_back_to_hold_with_warning() {
        let v = version(0.5, false);
        let stage1 = ConstantModel::new(0.9);
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let result = predict_single(&seq(), &v, &stage1, None, now).unwrap();
        assert_eq!(result.signal, Signal::Hold);
        assert_eq!(result.warning.as_deref(), Some("stage2_unavailable"));
        assert!((result.confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn feature_count_mismatch_is_rejected() {
        let v = version(0.5, true);
        let stage1 = ConstantModel::new(0.9);
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let bad = vec![vec![1.0, 2.0, 3.0]; 20];
        let result = predict_single(&bad, &v, &stage1, Some(&ConstantModel::new(0.5)), now);
        assert!(matches!(result, Err(AnalysisError::FeatureMismatch(_))));
    }

    #[test]
    fn batch_stitches_stage2_only_for_crossing_subset() {
        let v = version(0.5, true);
        let stage1 = ScriptedModel {
            probabilities: vec![0.1, 0.9, 0.2, 0.8],
        };
        let stage2 = ScriptedModel {
            probabilities: vec![0.3, 0.6],
        };
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let batch = vec![seq(), seq(), seq(), seq()];
        let results = predict_batch(&batch, &v, &stage1, Some(&stage2), now).unwrap();
        assert_eq!(results[0].signal, Signal::Hold);
        assert_eq!(results[0].stage2_prob, None);
        assert_eq!(results[1].stage2_prob, Some(0.3));
        assert_eq!(results[1].signal, Signal::Long);
        assert_eq!(results[2].signal, Signal::Hold);
        assert_eq!(results[3].stage2_prob, Some(0.6));
        assert_eq!(results[3].signal, Signal::Short);
    }
}
