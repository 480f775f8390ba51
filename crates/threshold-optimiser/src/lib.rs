//! C11: offline Stage-1 threshold optimisation. Scans a held-out sequence
//! dataset's Stage-1 probabilities against binary "has reversal" labels and
//! recommends a threshold under one of four named policies. The threshold
//! this produces is serving-time configuration, consumed by
//! `model-registry`'s `<version>_threshold.json` on the predictor's next
//! load -- this crate has no dependency on `model-registry` itself, it only
//! emits the same JSON shape.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdPolicy {
    BestF1,
    BestF2,
    RecallAtLeast50,
    RecallAtLeast70,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConfusionCounts {
    pub tp: u64,
    pub fp: u64,
    pub tn: u64,
    pub fn_: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ThresholdMetrics {
    pub threshold: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// F-beta with beta=2, favouring recall.
    pub f2: f64,
    pub accuracy: f64,
    pub confusion: ConfusionCounts,
}

fn fbeta(precision: f64, recall: f64, beta: f64) -> f64 {
    let beta2 = beta * beta;
    let denom = beta2 * precision + recall;
    if denom == 0.0 {
        0.0
    } else {
        (1.0 + beta2) * precision * recall / denom
    }
}

fn metrics_at_threshold(probabilities: &[f64], labels: &[u8], threshold: f64) -> ThresholdMetrics {
    let mut tp = 0u64;
    let mut fp = 0u64;
    let mut tn = 0u64;
    let mut fn_ = 0u64;

    for (&p, &y) in probabilities.iter().zip(labels) {
        let predicted_positive = p >= threshold;
        match (predicted_positive, y == 1) {
            (true, true) => tp += 1,
            (true, false) => fp += 1,
            (false, false) => tn += 1,
            (false, true) => fn_ += 1,
        }
    }

    let precision = if tp + fp == 0 { 0.0 } else { tp as f64 / (tp + fp) as f64 };
    let recall = if tp + fn_ == 0 { 0.0 } else { tp as f64 / (tp + fn_) as f64 };
    let accuracy = (tp + tn) as f64 / (tp + fp + tn + fn_).max(1) as f64;

    ThresholdMetrics {
        threshold,
        precision,
        recall,
        f1: fbeta(precision, recall, 1.0),
        f2: fbeta(precision, recall, 2.0),
        accuracy,
        confusion: ConfusionCounts { tp, fp, tn, fn_ },
    }
}

/// Scans thresholds `start..=stop` in `step` increments (default 0.05 ->
/// 0.95 step 0.05, finer scans supported by passing a smaller step).
pub fn scan_thresholds(
    probabilities: &[f64],
    labels: &[u8],
    start: f64,
    stop: f64,
    step: f64,
) -> Vec<ThresholdMetrics> {
    assert!(step > 0.0, "step must be positive");
    let mut out = Vec::new();
    let mut t = start;
    // Guard against float accumulation drift overshooting `stop`.
    while t <= stop + step * 0.5 {
        out.push(metrics_at_threshold(probabilities, labels, t));
        t += step;
    }
    out
}

/// One point of the continuous precision/recall curve, traced at every
/// distinct probability value present in the data (plus the two endpoints).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PrCurvePoint {
    pub recall: f64,
    pub precision: f64,
}

pub fn precision_recall_curve(probabilities: &[f64], labels: &[u8]) -> Vec<PrCurvePoint> {
    let mut thresholds: Vec<f64> = probabilities.to_vec();
    thresholds.push(0.0);
    thresholds.push(1.0);
    thresholds.sort_by(|a, b| a.partial_cmp(b).unwrap());
    thresholds.dedup();

    let mut curve: Vec<PrCurvePoint> = thresholds
        .into_iter()
        .map(|t| {
            let m = metrics_at_threshold(probabilities, labels, t);
            PrCurvePoint {
                recall: m.recall,
                precision: m.precision,
            }
        })
        .collect();
    curve.sort_by(|a, b| a.recall.partial_cmp(&b.recall).unwrap());
    curve
}

/// Average precision: the area under the precision/recall curve, computed as
/// a sum of `(recall[i] - recall[i-1]) * precision[i]` (the standard
/// step-function AP estimator).
pub fn average_precision(curve: &[PrCurvePoint]) -> f64 {
    if curve.is_empty() {
        return 0.0;
    }
    let mut ap = 0.0;
    let mut prev_recall = 0.0;
    for point in curve {
        ap += (point.recall - prev_recall).max(0.0) * point.precision;
        prev_recall = point.recall;
    }
    ap
}

/// Picks the highest-F1 candidate meeting a recall floor; falls back to the
/// max-recall candidate if none clears the floor.
fn best_f1_with_recall_floor(metrics: &[ThresholdMetrics], floor: f64) -> ThresholdMetrics {
    let eligible: Vec<&ThresholdMetrics> = metrics.iter().filter(|m| m.recall >= floor).collect();
    if let Some(best) = eligible
        .into_iter()
        .max_by(|a, b| a.f1.partial_cmp(&b.f1).unwrap())
    {
        return *best;
    }
    *metrics
        .iter()
        .max_by(|a, b| a.recall.partial_cmp(&b.recall).unwrap())
        .expect("metrics must be non-empty")
}

/// C11 recommendation entry point.
pub fn recommend(metrics: &[ThresholdMetrics], policy: ThresholdPolicy) -> ThresholdMetrics {
    assert!(!metrics.is_empty(), "cannot recommend from an empty scan");
    match policy {
        ThresholdPolicy::BestF1 => *metrics
            .iter()
            .max_by(|a, b| a.f1.partial_cmp(&b.f1).unwrap())
            .unwrap(),
        ThresholdPolicy::BestF2 => *metrics
            .iter()
            .max_by(|a, b| a.f2.partial_cmp(&b.f2).unwrap())
            .unwrap(),
        ThresholdPolicy::RecallAtLeast50 => best_f1_with_recall_floor(metrics, 0.50),
        ThresholdPolicy::RecallAtLeast70 => best_f1_with_recall_floor(metrics, 0.70),
    }
}

/// Summary statistics over the raw Stage-1 probability distribution fed into
/// the scan, surfaced alongside the recommendation report for diagnostics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProbabilitySummary {
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

pub fn summarize_probabilities(probabilities: &[f64]) -> ProbabilitySummary {
    let n = probabilities.len().max(1) as f64;
    let mean = probabilities.iter().sum::<f64>() / n;
    let variance = probabilities.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    ProbabilitySummary {
        mean,
        std_dev: variance.sqrt(),
        min: probabilities.iter().cloned().fold(f64::INFINITY, f64::min),
        max: probabilities.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
    }
}

/// Full report: the scan, the curve, average precision, the recommendation,
/// and the chosen policy -- everything one offline optimiser run emits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimisationReport {
    pub policy: ThresholdPolicy,
    pub scan: Vec<ThresholdMetrics>,
    pub curve: Vec<PrCurvePoint>,
    pub average_precision: f64,
    pub recommended: ThresholdMetrics,
    pub probability_summary: ProbabilitySummary,
}

pub fn optimise(
    probabilities: &[f64],
    labels: &[u8],
    policy: ThresholdPolicy,
    scan_start: f64,
    scan_stop: f64,
    scan_step: f64,
) -> OptimisationReport {
    let scan = scan_thresholds(probabilities, labels, scan_start, scan_stop, scan_step);
    let curve = precision_recall_curve(probabilities, labels);
    let average_precision_value = average_precision(&curve);
    let recommended = recommend(&scan, policy);
    OptimisationReport {
        policy,
        scan,
        curve,
        average_precision: average_precision_value,
        recommended,
        probability_summary: summarize_probabilities(probabilities),
    }
}

/// Writes the `<version>_threshold.json` shape `model-registry` reads back
/// on the predictor's next load. This is the serialisation-only side of the
/// contract; this crate does not know about `models_root` or version ids.
pub fn write_threshold_file(report: &OptimisationReport, path: &std::path::Path) -> std::io::Result<()> {
    #[derive(Serialize)]
    struct ThresholdFile {
        stage1_threshold: f64,
    }
    let json = serde_json::to_string_pretty(&ThresholdFile {
        stage1_threshold: report.recommended.threshold,
    })?;
    std::fs::write(path, json)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perfectly_separable() -> (Vec<f64>, Vec<u8>) {
        let probabilities = vec![0.1, 0.2, 0.3, 0.7, 0.8, 0.9];
        let labels = vec![0, 0, 0, 1, 1, 1];
        (probabilities, labels)
    }

    #[test]
    fn perfect_separation_yields_f1_of_one_at_midpoint() {
        let (p, y) = perfectly_separable();
        let scan = scan_thresholds(&p, &y, 0.05, 0.95, 0.05);
        let best = recommend(&scan, ThresholdPolicy::BestF1);
        assert!((best.f1 - 1.0).abs() < 1e-9);
    }

    #[test]
    fn recall_floor_falls_back_to_max_recall_when_unmet() {
        // Every positive sample scores low, so no threshold can ever reach
        // even 50% recall without flagging everything -- the floor cannot
        // be met and the policy must fall back to max recall.
        let probabilities = vec![0.05, 0.05, 0.05, 0.05];
        let labels = vec![1, 1, 0, 0];
        let scan = scan_thresholds(&probabilities, &labels, 0.50, 0.95, 0.05);
        let best = recommend(&scan, ThresholdPolicy::RecallAtLeast70);
        let max_recall = scan.iter().map(|m| m.recall).fold(0.0, f64::max);
        assert!((best.recall - max_recall).abs() < 1e-9);
    }

    #[test]
    fn average_precision_of_perfect_separator_is_one() {
        let (p, y) = perfectly_separable();
        let curve = precision_recall_curve(&p, &y);
        let ap = average_precision(&curve);
        assert!(ap > 0.95);
    }

    #[test]
    fn scan_covers_requested_range() {
        let (p, y) = perfectly_separable();
        let scan = scan_thresholds(&p, &y, 0.05, 0.95, 0.05);
        assert_eq!(scan.first().unwrap().threshold, 0.05);
        assert!((scan.last().unwrap().threshold - 0.95).abs() < 1e-9);
    }
}
