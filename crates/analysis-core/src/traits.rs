use crate::{AnalysisError, Bar, IndicatorRow, Mode1Label, Mode2Checkpoint, TimeframeTag};

/// C1: computes the fixed indicator family from an ordered bar series.
///
/// Indicators with ambiguous definitions (e.g. EMA seeding) must match the
/// definition used in training; the implementation is frozen and version-tagged
/// with the feature list it produces (`analysis_core::ALL_FEATURE_NAMES`).
pub trait IndicatorEngine {
    fn compute(&self, bars: &[Bar]) -> Vec<IndicatorRow>;
}

/// The two coexisting label philosophies the system keeps side by side; each is
/// bound to a model version rather than chosen once globally.
pub trait Labeler {
    type Params;

    fn label(
        &self,
        rows: &[IndicatorRow],
        timeframe_tag: TimeframeTag,
        params: &Self::Params,
    ) -> Result<Vec<Mode1Label>, AnalysisError>;
}

/// C4: emits per-bar in-trade risk checkpoints for a set of Mode-1 entries.
pub trait RiskMonitor {
    fn monitor(
        &self,
        rows: &[IndicatorRow],
        entries: &[(usize, Mode1Label)],
        timeframe_tag: TimeframeTag,
    ) -> Vec<Mode2Checkpoint>;
}
