use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use analysis_core::Signal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    A,
    B,
}

/// Per-variant running counters: count, signal histogram, and a running
/// mean confidence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VariantCounters {
    pub count: u64,
    pub signals_long: u64,
    pub signals_short: u64,
    pub signals_hold: u64,
    pub total_confidence: f64,
    pub avg_confidence: f64,
}

impl VariantCounters {
    pub fn record(&mut self, signal: Signal, confidence: f64) {
        self.count += 1;
        match signal {
            Signal::Long => self.signals_long += 1,
            Signal::Short => self.signals_short += 1,
            Signal::Hold => self.signals_hold += 1,
        }
        self.total_confidence += confidence;
        self.avg_confidence = self.total_confidence / self.count as f64;
    }
}

/// C10 experiment record. `variant_a_version_id`/`variant_b_version_id` name
/// [`model_registry`]-known version ids, but this crate does not depend on
/// the registry -- it only carries the id strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experiment {
    pub experiment_id: String,
    pub name: String,
    pub description: String,
    pub variant_a_version_id: String,
    pub variant_b_version_id: String,
    pub traffic_split_a: f64,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub active: bool,
    pub counters_a: VariantCounters,
    pub counters_b: VariantCounters,
    /// Number of `record()` calls since the experiment was created or last
    /// reset; used to drive the every-N-predictions snapshot cadence.
    #[serde(default)]
    pub records_since_snapshot: u64,
}

impl Experiment {
    pub fn new(
        experiment_id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        variant_a_version_id: impl Into<String>,
        variant_b_version_id: impl Into<String>,
        traffic_split_a: f64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            experiment_id: experiment_id.into(),
            name: name.into(),
            description: description.into(),
            variant_a_version_id: variant_a_version_id.into(),
            variant_b_version_id: variant_b_version_id.into(),
            traffic_split_a,
            started_at: now,
            ended_at: None,
            active: false,
            counters_a: VariantCounters::default(),
            counters_b: VariantCounters::default(),
            records_since_snapshot: 0,
        }
    }

    pub fn version_for(&self, variant: Variant) -> &str {
        match variant {
            Variant::A => &self.variant_a_version_id,
            Variant::B => &self.variant_b_version_id,
        }
    }

    pub fn record(&mut self, variant: Variant, signal: Signal, confidence: f64) {
        match variant {
            Variant::A => self.counters_a.record(signal, confidence),
            Variant::B => self.counters_b.record(signal, confidence),
        }
        self.records_since_snapshot += 1;
    }

    pub fn stop(&mut self, now: DateTime<Utc>) {
        self.active = false;
        self.ended_at = Some(now);
    }
}
