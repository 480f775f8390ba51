use analysis_core::{AnalysisError, AnalysisResult, Bar, IndicatorEngine, IndicatorRow, Mode1Label};
use technical_analysis::FixedIndicatorEngine;

use crate::cleaning::{clean_bars, drop_incomplete_rows, remove_outliers_iqr};
use crate::scaler::{Scaler, ScalerKind};

/// A window of scaled features ready to feed the two-stage predictor: shape
/// `(window, selected_features.len())`.
pub type Sequence = Vec<Vec<f64>>;

/// C5. Owns the indicator engine and applies the cleaning policy identically
/// whether starting from raw bars (serving) or from an already-materialised
/// indicator-row history (training).
pub struct Preprocessor<E: IndicatorEngine = FixedIndicatorEngine> {
    engine: E,
}

impl Default for Preprocessor<FixedIndicatorEngine> {
    fn default() -> Self {
        Self {
            engine: FixedIndicatorEngine::new(),
        }
    }
}

impl<E: IndicatorEngine> Preprocessor<E> {
    pub fn with_engine(engine: E) -> Self {
        Self { engine }
    }

    fn mature_rows(&self, rows: Vec<IndicatorRow>, selected_features: &[String]) -> Vec<IndicatorRow> {
        let rows = drop_incomplete_rows(rows, selected_features);
        remove_outliers_iqr(rows, selected_features)
    }

    fn feature_matrix(rows: &[IndicatorRow], selected_features: &[String]) -> Vec<Vec<f64>> {
        rows.iter()
            .map(|row| {
                selected_features
                    .iter()
                    .map(|f| row.feature(f).unwrap_or(0.0))
                    .collect()
            })
            .collect()
    }

    /// `fit_on_training(indicator_rows, selected_features) -> scaler`. Must
    /// only ever be called on training data.
    pub fn fit_on_training(
        &self,
        rows: Vec<IndicatorRow>,
        selected_features: &[String],
        kind: ScalerKind,
        feature_range: (f64, f64),
    ) -> AnalysisResult<Scaler> {
        let rows = self.mature_rows(rows, selected_features);
        if rows.is_empty() {
            return Err(AnalysisError::InsufficientData(
                "no mature rows survive cleaning".to_string(),
            ));
        }
        let matrix = Self::feature_matrix(&rows, selected_features);
        Scaler::fit(kind, &matrix, selected_features, feature_range)
    }

    fn check_feature_parity(scaler: &Scaler, selected_features: &[String]) -> AnalysisResult<()> {
        if scaler.feature_names != selected_features {
            return Err(AnalysisError::FeatureMismatch(format!(
                "scaler was fit on {:?}, requested {:?}",
                scaler.feature_names, selected_features
            )));
        }
        Ok(())
    }

    /// `transform_for_training(indicator_rows, scaler, selected_features, window) -> (X, y)`.
    /// `labels` must be the Mode-1 labels for the same row series, aligned by
    /// index, as emitted by a [`analysis_core::Labeler`].
    pub fn transform_for_training(
        &self,
        rows: Vec<IndicatorRow>,
        labels: Vec<Mode1Label>,
        scaler: &Scaler,
        selected_features: &[String],
        window: usize,
    ) -> AnalysisResult<(Vec<Sequence>, Vec<u8>)> {
        Self::check_feature_parity(scaler, selected_features)?;
        if rows.len() != labels.len() {
            return Err(AnalysisError::ValidationError(
                "indicator rows and labels must be the same length".to_string(),
            ));
        }

        let paired: Vec<(IndicatorRow, Mode1Label)> = rows.into_iter().zip(labels).collect();
        let mature: Vec<(IndicatorRow, Mode1Label)> = {
            let (rows, labels): (Vec<_>, Vec<_>) = paired.into_iter().unzip();
            let kept = self.mature_rows(rows.clone(), selected_features);
            // re-pair by timestamp since mature_rows may have dropped entries
            kept.into_iter()
                .filter_map(|row| {
                    rows.iter()
                        .position(|r| r.timestamp == row.timestamp)
                        .map(|idx| (row, labels[idx].clone()))
                })
                .collect()
        };

        if mature.len() < window {
            return Err(AnalysisError::InsufficientData(format!(
                "need at least {} mature rows, have {}",
                window,
                mature.len()
            )));
        }

        let matrix = Self::feature_matrix(
            &mature.iter().map(|(r, _)| r.clone()).collect::<Vec<_>>(),
            selected_features,
        );

        let mut scaled = Vec::with_capacity(matrix.len());
        for row in &matrix {
            scaled.push(scaler.transform(row)?);
        }

        let mut x = Vec::with_capacity(scaled.len() - window + 1);
        let mut y = Vec::with_capacity(scaled.len() - window + 1);

        for end in window - 1..scaled.len() {
            let start = end + 1 - window;
            x.push(scaled[start..=end].to_vec());
            y.push(mature[end].1.signal.to_label_code());
        }

        Ok((x, y))
    }

    /// `prepare_prediction(raw_bars, scaler, selected_features, window) -> X`
    /// with shape `(1, window, selected_features.len())`. Consults only bars
    /// up to the decision time.
    pub fn prepare_prediction(
        &self,
        raw_bars: &[Bar],
        scaler: &Scaler,
        selected_features: &[String],
        window: usize,
    ) -> AnalysisResult<Sequence> {
        Self::check_feature_parity(scaler, selected_features)?;

        let cleaned = clean_bars(raw_bars);
        let rows = self.engine.compute(&cleaned);
        let mature = self.mature_rows(rows, selected_features);

        if mature.len() < window {
            return Err(AnalysisError::InsufficientData(format!(
                "need at least {} mature rows, have {}",
                window,
                mature.len()
            )));
        }

        let tail = &mature[mature.len() - window..];
        let matrix = Self::feature_matrix(tail, selected_features);

        matrix
            .into_iter()
            .map(|row| scaler.transform(&row))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::Signal;
    use chrono::{TimeZone, Utc};

    fn bars(n: usize) -> Vec<Bar> {
        (0..n)
            .map(|i| {
                let level = 1.1000 + i as f64 * 0.0002;
                Bar {
                    timestamp: Utc.timestamp_opt(1_700_000_000 + i as i64 * 3600, 0).unwrap(),
                    open: level,
                    high: level + 0.0005,
                    low: level - 0.0005,
                    close: level + 0.0001,
                    volume: 1000.0,
                }
            })
            .collect()
    }

    fn small_feature_list() -> Vec<String> {
        vec!["close".to_string(), "sma_20".to_string(), "rsi_14".to_string()]
    }

    #[test]
    fn prepare_prediction_needs_enough_mature_rows() {
        let pre = Preprocessor::<FixedIndicatorEngine>::default();
        let scaler = Scaler {
            kind: ScalerKind::Standard,
            feature_names: small_feature_list(),
            stats: vec![],
            feature_range: (0.0, 1.0),
        };
        let result = pre.prepare_prediction(&bars(5), &scaler, &small_feature_list(), 20);
        assert!(matches!(result, Err(AnalysisError::InsufficientData(_))));
    }

    #[test]
    fn fit_then_prepare_round_trips_shape() {
        let pre = Preprocessor::<FixedIndicatorEngine>::default();
        let all_bars = bars(260);
        let cleaned = clean_bars(&all_bars);
        let rows = pre.engine.compute(&cleaned);
        let features = small_feature_list();

        let scaler = pre
            .fit_on_training(rows, &features, ScalerKind::Standard, (0.0, 1.0))
            .unwrap();

        let x = pre
            .prepare_prediction(&all_bars, &scaler, &features, 20)
            .unwrap();
        assert_eq!(x.len(), 20);
        assert_eq!(x[0].len(), features.len());
    }

    #[test]
    fn feature_mismatch_is_rejected() {
        let pre = Preprocessor::<FixedIndicatorEngine>::default();
        let scaler = Scaler {
            kind: ScalerKind::Standard,
            feature_names: vec!["close".to_string()],
            stats: vec![crate::scaler::FeatureStats {
                min: 0.0,
                max: 1.0,
                mean: 0.0,
                std: 1.0,
                median: 0.0,
                q1: 0.0,
                q3: 1.0,
            }],
            feature_range: (0.0, 1.0),
        };
        let result = pre.prepare_prediction(&bars(250), &scaler, &small_feature_list(), 20);
        assert!(matches!(result, Err(AnalysisError::FeatureMismatch(_))));
    }

    #[allow(dead_code)]
    fn use_signal(s: Signal) -> u8 {
        s.to_label_code()
    }
}
