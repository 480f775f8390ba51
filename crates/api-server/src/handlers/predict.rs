use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};

use analysis_core::{AnalysisError, Bar, Signal};
use model_registry::LoadedVersion;
use preprocessing::Sequence;
use stage_predictor::{predict_single, PredictionResult};

use crate::error::{ApiError, ApiResponse, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BarInput {
    pub timestamp: Option<DateTime<Utc>>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: Option<f64>,
}

fn validate_pair(pair: &str) -> Result<(), ApiError> {
    if pair.matches('/').count() != 1 {
        return Err(ApiError::Analysis(AnalysisError::ValidationError(format!(
            "pair '{pair}' must contain exactly one '/'"
        ))));
    }
    Ok(())
}

/// Synthesises sequential hourly timestamps for bars that omit one, so the
/// cleaning/sort step still has a total order to work with.
fn to_bars(inputs: Vec<BarInput>) -> Vec<Bar> {
    let now = Utc::now();
    let n = inputs.len();
    inputs
        .into_iter()
        .enumerate()
        .map(|(i, b)| Bar {
            timestamp: b.timestamp.unwrap_or_else(|| now - ChronoDuration::hours((n - i) as i64)),
            open: b.open,
            high: b.high,
            low: b.low,
            close: b.close,
            volume: b.volume.unwrap_or(0.0),
        })
        .collect()
}

fn resolve_version(state: &AppState, version: Option<&str>) -> Result<LoadedVersion, ApiError> {
    match version {
        Some(id) => Ok(state.registry.get_version(id)?),
        None => state
            .registry
            .get_active()
            .ok_or_else(|| ApiError::ServiceNotReady("no active model version".to_string())),
    }
}

#[derive(Debug, Serialize)]
pub struct PredictFactors {
    pub reversal_detected: bool,
    pub direction: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct PredictResponseBody {
    pub pair: String,
    pub timeframe: String,
    pub signal: &'static str,
    pub confidence: f64,
    pub stage1_prob: f64,
    pub stage2_prob: Option<f64>,
    pub model_version: String,
    pub factors: PredictFactors,
    pub timestamp: DateTime<Utc>,
    pub warning: Option<String>,
}

fn to_response_body(pair: String, timeframe: String, result: PredictionResult) -> PredictResponseBody {
    let reversal_detected = !matches!(result.signal, Signal::Hold) || result.warning.is_some();
    let direction = match result.signal {
        Signal::Long => Some("long"),
        Signal::Short => Some("short"),
        Signal::Hold => None,
    };
    PredictResponseBody {
        pair,
        timeframe,
        signal: result.signal.as_str(),
        confidence: result.confidence,
        stage1_prob: result.stage1_prob,
        stage2_prob: result.stage2_prob,
        model_version: result.model_version,
        factors: PredictFactors {
            reversal_detected,
            direction,
        },
        timestamp: result.timestamp,
        warning: result.warning,
    }
}

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub pair: String,
    pub timeframe: String,
    pub features: Sequence,
    pub version: Option<String>,
}

/// `POST /reversal/predict` — caller already ran the full preprocessing
/// pipeline and hands in a scaled `(T, F)` window directly.
pub async fn predict(
    State(state): State<AppState>,
    Json(req): Json<PredictRequest>,
) -> ApiResult<PredictResponseBody> {
    validate_pair(&req.pair)?;
    let version = resolve_version(&state, req.version.as_deref())?;
    let (stage1, stage2) = state.models_for(&version)?;
    let result = predict_single(&req.features, &version, stage1.as_ref(), stage2.as_deref(), Utc::now())?;
    Ok(Json(ApiResponse::ok(to_response_body(req.pair, req.timeframe, result))))
}

#[derive(Debug, Deserialize)]
pub struct PredictRawRequest {
    pub pair: String,
    pub timeframe: String,
    pub data: Vec<BarInput>,
    pub version: Option<String>,
}

/// `POST /reversal/predict_raw` — server computes indicators, applies the
/// scaler, and windows the tail itself.
pub async fn predict_raw(
    State(state): State<AppState>,
    Json(req): Json<PredictRawRequest>,
) -> ApiResult<PredictResponseBody> {
    validate_pair(&req.pair)?;
    if req.data.len() < 20 {
        return Err(ApiError::Analysis(AnalysisError::ValidationError(format!(
            "need at least 20 bars, got {}",
            req.data.len()
        ))));
    }

    let version = resolve_version(&state, req.version.as_deref())?;
    let bars = to_bars(req.data);
    let window = state.config.sequence_length;
    let x = state
        .preprocessor
        .prepare_prediction(&bars, &version.scaler, &version.features, window)?;

    let (stage1, stage2) = state.models_for(&version)?;
    let result = predict_single(&x, &version, stage1.as_ref(), stage2.as_deref(), Utc::now())?;
    Ok(Json(ApiResponse::ok(to_response_body(req.pair, req.timeframe, result))))
}

#[derive(Debug, Serialize)]
pub struct PerVersionResult {
    pub version: String,
    pub signal: &'static str,
    pub confidence: f64,
    pub stage1_prob: f64,
    pub stage2_prob: Option<f64>,
    pub warning: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CompareResponseBody {
    pub pair: String,
    pub timeframe: String,
    pub results: Vec<PerVersionResult>,
    pub consensus: &'static str,
    pub disagreement: bool,
    pub timestamp: DateTime<Utc>,
}

/// Majority vote across per-version signals; ties resolve toward the most
/// cautious outcome (hold, then long, then short).
fn consensus_of(signals: &[Signal]) -> (&'static str, bool) {
    let mut holds = 0usize;
    let mut longs = 0usize;
    let mut shorts = 0usize;
    for s in signals {
        match s {
            Signal::Hold => holds += 1,
            Signal::Long => longs += 1,
            Signal::Short => shorts += 1,
        }
    }
    let max = holds.max(longs).max(shorts);
    let consensus = if holds == max {
        "hold"
    } else if longs == max {
        "long"
    } else {
        "short"
    };
    let disagreement = !(holds == signals.len() || longs == signals.len() || shorts == signals.len());
    (consensus, disagreement)
}

fn results_to_signals(results: &[PerVersionResult]) -> Vec<Signal> {
    results
        .iter()
        .map(|r| match r.signal {
            "long" => Signal::Long,
            "short" => Signal::Short,
            _ => Signal::Hold,
        })
        .collect()
}

#[derive(Debug, Deserialize)]
pub struct CompareRequest {
    pub pair: String,
    pub timeframe: String,
    pub features: Sequence,
    pub versions: Vec<String>,
}

/// `POST /reversal/compare` — runs the same preprocessed window through
/// every named version and reports a consensus.
pub async fn compare(
    State(state): State<AppState>,
    Json(req): Json<CompareRequest>,
) -> ApiResult<CompareResponseBody> {
    validate_pair(&req.pair)?;
    if req.versions.len() < 2 {
        return Err(ApiError::Analysis(AnalysisError::ValidationError(
            "compare requires at least two version ids".to_string(),
        )));
    }

    let now = Utc::now();
    let mut results = Vec::with_capacity(req.versions.len());
    for version_id in &req.versions {
        let version = resolve_version(&state, Some(version_id.as_str()))?;
        let (stage1, stage2) = state.models_for(&version)?;
        let result = predict_single(&req.features, &version, stage1.as_ref(), stage2.as_deref(), now)?;
        results.push(PerVersionResult {
            version: version_id.clone(),
            signal: result.signal.as_str(),
            confidence: result.confidence,
            stage1_prob: result.stage1_prob,
            stage2_prob: result.stage2_prob,
            warning: result.warning,
        });
    }

    let signals = results_to_signals(&results);
    let (consensus, disagreement) = consensus_of(&signals);

    Ok(Json(ApiResponse::ok(CompareResponseBody {
        pair: req.pair,
        timeframe: req.timeframe,
        results,
        consensus,
        disagreement,
        timestamp: now,
    })))
}

#[derive(Debug, Deserialize)]
pub struct CompareRawRequest {
    pub pair: String,
    pub timeframe: String,
    pub data: Vec<BarInput>,
    pub versions: Vec<String>,
}

/// `POST /reversal/compare_raw` — as [`compare`] but starting from raw bars.
pub async fn compare_raw(
    State(state): State<AppState>,
    Json(req): Json<CompareRawRequest>,
) -> ApiResult<CompareResponseBody> {
    validate_pair(&req.pair)?;
    if req.versions.len() < 2 {
        return Err(ApiError::Analysis(AnalysisError::ValidationError(
            "compare requires at least two version ids".to_string(),
        )));
    }
    if req.data.len() < 20 {
        return Err(ApiError::Analysis(AnalysisError::ValidationError(format!(
            "need at least 20 bars, got {}",
            req.data.len()
        ))));
    }

    let now = Utc::now();
    let bars = to_bars(req.data);
    let window = state.config.sequence_length;

    let mut results = Vec::with_capacity(req.versions.len());
    for version_id in &req.versions {
        let version = resolve_version(&state, Some(version_id.as_str()))?;
        let x = state
            .preprocessor
            .prepare_prediction(&bars, &version.scaler, &version.features, window)?;
        let (stage1, stage2) = state.models_for(&version)?;
        let result = predict_single(&x, &version, stage1.as_ref(), stage2.as_deref(), now)?;
        results.push(PerVersionResult {
            version: version_id.clone(),
            signal: result.signal.as_str(),
            confidence: result.confidence,
            stage1_prob: result.stage1_prob,
            stage2_prob: result.stage2_prob,
            warning: result.warning,
        });
    }

    let signals = results_to_signals(&results);
    let (consensus, disagreement) = consensus_of(&signals);

    Ok(Json(ApiResponse::ok(CompareResponseBody {
        pair: req.pair,
        timeframe: req.timeframe,
        results,
        consensus,
        disagreement,
        timestamp: now,
    })))
}
