use analysis_core::{AnalysisError, AnalysisResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalerKind {
    Minmax,
    Standard,
    Robust,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std: f64,
    pub median: f64,
    pub q1: f64,
    pub q3: f64,
}

/// The serving-parity contract: a fitted scaler and the exact feature list
/// it was fit on must travel together, and be reproduced bit-for-bit at
/// prediction time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scaler {
    pub kind: ScalerKind,
    pub feature_names: Vec<String>,
    pub stats: Vec<FeatureStats>,
    pub feature_range: (f64, f64),
}

fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = rank - lo as f64;
        sorted[lo] + (sorted[hi] - sorted[lo]) * frac
    }
}

impl Scaler {
    pub fn fit(
        kind: ScalerKind,
        matrix: &[Vec<f64>],
        feature_names: &[String],
        feature_range: (f64, f64),
    ) -> AnalysisResult<Self> {
        if matrix.is_empty() {
            return Err(AnalysisError::InsufficientData(
                "cannot fit a scaler on zero rows".to_string(),
            ));
        }

        let n_features = feature_names.len();
        let mut stats = Vec::with_capacity(n_features);

        for f in 0..n_features {
            let mut col: Vec<f64> = matrix.iter().map(|row| row[f]).collect();
            let min = col.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = col.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let mean = col.iter().sum::<f64>() / col.len() as f64;
            let variance =
                col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / col.len() as f64;
            let std = variance.sqrt();

            col.sort_by(|a, b| a.partial_cmp(b).unwrap());
            let median = percentile(&col, 50.0);
            let q1 = percentile(&col, 25.0);
            let q3 = percentile(&col, 75.0);

            stats.push(FeatureStats {
                min,
                max,
                mean,
                std,
                median,
                q1,
                q3,
            });
        }

        Ok(Self {
            kind,
            feature_names: feature_names.to_vec(),
            stats,
            feature_range,
        })
    }

    pub fn transform(&self, features: &[f64]) -> AnalysisResult<Vec<f64>> {
        if features.len() != self.stats.len() {
            return Err(AnalysisError::FeatureMismatch(format!(
                "scaler expects {} features, got {}",
                self.stats.len(),
                features.len()
            )));
        }

        Ok(features
            .iter()
            .zip(&self.stats)
            .map(|(v, s)| match self.kind {
                ScalerKind::Minmax => {
                    let (lo, hi) = self.feature_range;
                    let range = s.max - s.min;
                    if range == 0.0 {
                        lo
                    } else {
                        lo + (v - s.min) / range * (hi - lo)
                    }
                }
                ScalerKind::Standard => {
                    if s.std == 0.0 {
                        0.0
                    } else {
                        (v - s.mean) / s.std
                    }
                }
                ScalerKind::Robust => {
                    let iqr = s.q3 - s.q1;
                    if iqr == 0.0 {
                        0.0
                    } else {
                        (v - s.median) / iqr
                    }
                }
            })
            .collect())
    }

    pub fn save(&self, path: &std::path::Path) -> AnalysisResult<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| AnalysisError::ArtefactIoError(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| AnalysisError::ArtefactIoError(e.to_string()))
    }

    pub fn load(path: &std::path::Path) -> AnalysisResult<Self> {
        let json =
            std::fs::read_to_string(path).map_err(|e| AnalysisError::ArtefactIoError(e.to_string()))?;
        serde_json::from_str(&json).map_err(|e| AnalysisError::ArtefactIoError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minmax_maps_extremes_to_feature_range() {
        let matrix = vec![vec![0.0], vec![5.0], vec![10.0]];
        let names = vec!["x".to_string()];
        let scaler = Scaler::fit(ScalerKind::Minmax, &matrix, &names, (0.0, 1.0)).unwrap();
        assert_eq!(scaler.transform(&[0.0]).unwrap(), vec![0.0]);
        assert_eq!(scaler.transform(&[10.0]).unwrap(), vec![1.0]);
    }

    #[test]
    fn standard_centers_the_mean_at_zero() {
        let matrix = vec![vec![1.0], vec![2.0], vec![3.0]];
        let names = vec!["x".to_string()];
        let scaler = Scaler::fit(ScalerKind::Standard, &matrix, &names, (0.0, 1.0)).unwrap();
        let transformed = scaler.transform(&[2.0]).unwrap();
        assert!(transformed[0].abs() < 1e-9);
    }

    #[test]
    fn feature_count_mismatch_errors() {
        let matrix = vec![vec![1.0, 2.0]];
        let names = vec!["a".to_string(), "b".to_string()];
        let scaler = Scaler::fit(ScalerKind::Standard, &matrix, &names, (0.0, 1.0)).unwrap();
        assert!(scaler.transform(&[1.0]).is_err());
    }
}
