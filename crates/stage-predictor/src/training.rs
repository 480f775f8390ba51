use serde::{Deserialize, Serialize};

/// Class-imbalance handling is a training regime, not a model change: both
/// protocols select the same architecture, only the loss and sample
/// weighting differ. Plain configuration handed to the (external)
/// Python/Keras training entry point, not a code fork in the serving path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "protocol", rename_all = "snake_case")]
pub enum TrainingProtocol {
    /// Protocol A. Has historically produced collapsed weights under extreme
    /// imbalance on the Swing labels -- prefer Protocol B below ~10%
    /// positive rate.
    Focal { gamma: f64, alpha: f64 },
    /// Protocol B, the recommended default for imbalanced data. Class weights
    /// are computed from the training label distribution via an
    /// inverse-frequency scheme.
    BalancedBce { class_weight_scheme: ClassWeightScheme },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassWeightScheme {
    /// weight[c] = n_samples / (n_classes * count[c])
    InverseFrequency,
}

impl Default for TrainingProtocol {
    fn default() -> Self {
        TrainingProtocol::BalancedBce {
            class_weight_scheme: ClassWeightScheme::InverseFrequency,
        }
    }
}

/// Recommends the balanced protocol once the positive-class fraction drops
/// below ~10%. A recommendation, not an override -- callers decide.
pub fn recommend_protocol(positive_fraction: f64) -> TrainingProtocol {
    if positive_fraction < 0.10 {
        TrainingProtocol::BalancedBce {
            class_weight_scheme: ClassWeightScheme::InverseFrequency,
        }
    } else {
        TrainingProtocol::Focal {
            gamma: 2.0,
            alpha: 0.25,
        }
    }
}

/// Inverse-frequency class weights for a binary label vector.
pub fn inverse_frequency_weights(labels: &[u8]) -> (f64, f64) {
    let n = labels.len().max(1) as f64;
    let positives = labels.iter().filter(|&&l| l == 1).count().max(1) as f64;
    let negatives = (labels.len() as f64 - positives).max(1.0);
    let weight_neg = n / (2.0 * negatives);
    let weight_pos = n / (2.0 * positives);
    (weight_neg, weight_pos)
}

/// Standard callback set for both stages: early stopping (patience 15-25,
/// best-weight restoration), LR reduction on plateau (factor 0.5, patience =
/// half of early-stopping patience), checkpointing of best weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingCallbacks {
    pub early_stopping_patience: u32,
    pub restore_best_weights: bool,
    pub lr_reduce_factor: f64,
    pub lr_reduce_patience: u32,
    pub checkpoint_dir: String,
}

impl TrainingCallbacks {
    pub fn new(early_stopping_patience: u32, checkpoint_dir: impl Into<String>) -> Self {
        Self {
            early_stopping_patience,
            restore_best_weights: true,
            lr_reduce_factor: 0.5,
            lr_reduce_patience: (early_stopping_patience / 2).max(1),
            checkpoint_dir: checkpoint_dir.into(),
        }
    }

    /// Recommended patience range is 15-25 epochs.
    pub fn is_within_recommended_patience(&self) -> bool {
        (15..=25).contains(&self.early_stopping_patience)
    }
}

/// Stage-1 architecture descriptor (version v3.x): two stacked recurrent
/// layers (64, then 32 units) with dropout and small L2, two dense layers
/// (32, 16), single sigmoid output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage1Architecture {
    pub recurrent_units: (u32, u32),
    pub dense_units: (u32, u32),
    pub dropout: f64,
    pub l2: f64,
    pub sequence_length: usize,
    pub num_features: usize,
}

impl Default for Stage1Architecture {
    fn default() -> Self {
        Self {
            recurrent_units: (64, 32),
            dense_units: (32, 16),
            dropout: 0.3,
            l2: 1e-4,
            sequence_length: 20,
            num_features: 12,
        }
    }
}

/// Stage-2 architecture descriptor: smaller than Stage-1 (48, 24 recurrent
/// units), standard binary cross-entropy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage2Architecture {
    pub recurrent_units: (u32, u32),
    pub sequence_length: usize,
    pub num_features: usize,
}

impl Default for Stage2Architecture {
    fn default() -> Self {
        Self {
            recurrent_units: (48, 24),
            sequence_length: 20,
            num_features: 12,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recommends_balanced_bce_under_ten_percent() {
        assert_eq!(
            recommend_protocol(0.03),
            TrainingProtocol::BalancedBce {
                class_weight_scheme: ClassWeightScheme::InverseFrequency
            }
        );
    }

    #[test]
    fn recommends_focal_above_ten_percent() {
        matches!(recommend_protocol(0.5), TrainingProtocol::Focal { .. });
    }

    #[test]
    fn inverse_frequency_weights_favor_minority_class() {
        let labels: Vec<u8> = std::iter::repeat(0u8)
            .take(97)
            .chain(std::iter::repeat(1u8).take(3))
            .collect();
        let (w_neg, w_pos) = inverse_frequency_weights(&labels);
        assert!(w_pos > w_neg);
    }

    #[test]
    fn lr_reduce_patience_is_half_early_stopping() {
        let cb = TrainingCallbacks::new(20, "/tmp/ckpt");
        assert_eq!(cb.lr_reduce_patience, 10);
        assert!(cb.is_within_recommended_patience());
    }
}
