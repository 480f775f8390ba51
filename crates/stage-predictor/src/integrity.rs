use analysis_core::{AnalysisError, AnalysisResult};

/// Minimum standard deviation a Stage-1/Stage-2 model's held-out predictions
/// must show. Below this the model has collapsed to a near-constant output.
pub const MIN_PREDICTION_STD: f64 = 0.01;

/// Minimum L2 norm the first recurrent layer's weights must carry. Below this
/// the layer has effectively zeroed out and is not learning from its input.
pub const MIN_FIRST_LAYER_L2_NORM: f64 = 0.1;

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    (values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}

/// Rejects a training run whose held-out predictions barely vary. Returns
/// the observed standard deviation on success.
pub fn check_prediction_variance(held_out_predictions: &[f64]) -> AnalysisResult<f64> {
    if held_out_predictions.is_empty() {
        return Err(AnalysisError::TrainingIntegrityError(
            "no held-out predictions to validate".to_string(),
        ));
    }
    let std = population_std(held_out_predictions);
    if std < MIN_PREDICTION_STD {
        return Err(AnalysisError::TrainingIntegrityError(format!(
            "held-out prediction std {std:.6} below floor {MIN_PREDICTION_STD}; model has collapsed"
        )));
    }
    Ok(std)
}

/// Rejects a training run whose first recurrent layer has collapsed toward
/// zero weights. `first_layer_l2_norm` is computed by the training entry
/// point (Python/Keras side) and handed in here for the pass/fail decision.
pub fn check_first_layer_weight_norm(first_layer_l2_norm: f64) -> AnalysisResult<()> {
    if first_layer_l2_norm < MIN_FIRST_LAYER_L2_NORM {
        return Err(AnalysisError::TrainingIntegrityError(format!(
            "first layer L2 norm {first_layer_l2_norm:.6} below floor {MIN_FIRST_LAYER_L2_NORM}"
        )));
    }
    Ok(())
}

/// Runs both post-training checks. Either failure aborts the training run
/// before any artefact is written to the serving path.
pub fn validate_training_run(
    held_out_predictions: &[f64],
    first_layer_l2_norm: f64,
) -> AnalysisResult<()> {
    check_prediction_variance(held_out_predictions)?;
    check_first_layer_weight_norm(first_layer_l2_norm)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapsed_predictions_fail_variance_check() {
        let preds = vec![0.5; 100];
        assert!(check_prediction_variance(&preds).is_err());
    }

    #[test]
    fn varied_predictions_pass() {
        let preds: Vec<f64> = (0..100).map(|i| (i as f64 / 100.0)).collect();
        assert!(check_prediction_variance(&preds).is_ok());
    }

    #[test]
    fn near_zero_layer_norm_fails() {
        assert!(check_first_layer_weight_norm(0.02).is_err());
    }

    #[test]
    fn healthy_layer_norm_passes() {
        assert!(check_first_layer_weight_norm(1.5).is_ok());
    }

    #[test]
    fn validate_training_run_requires_both_checks() {
        let good_preds: Vec<f64> = (0..50).map(|i| i as f64 / 50.0).collect();
        assert!(validate_training_run(&good_preds, 0.5).is_ok());
        assert!(validate_training_run(&good_preds, 0.0).is_err());
        assert!(validate_training_run(&[0.5; 50], 0.5).is_err());
    }
}
