use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use ab_testing::Experiment;
use analysis_core::AnalysisError;

use crate::error::{ApiError, ApiResponse, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateExperimentRequest {
    pub experiment_id: String,
    pub name: String,
    pub description: String,
    pub variant_a_version_id: String,
    pub variant_b_version_id: String,
    pub traffic_split_a: f64,
}

/// `POST /reversal/experiments` — create a new A/B experiment, inactive
/// until explicitly activated.
pub async fn create_experiment(
    State(state): State<AppState>,
    Json(req): Json<CreateExperimentRequest>,
) -> ApiResult<Experiment> {
    let experiment = Experiment::new(
        req.experiment_id,
        req.name,
        req.description,
        req.variant_a_version_id,
        req.variant_b_version_id,
        req.traffic_split_a,
        Utc::now(),
    );
    let id = experiment.experiment_id.clone();
    state.ab_framework.create(experiment)?;
    let created = state
        .ab_framework
        .get(&id)
        .ok_or_else(|| ApiError::Analysis(AnalysisError::Unknown("experiment vanished after create".to_string())))?;
    Ok(Json(ApiResponse::ok(created)))
}

#[derive(Debug, Serialize)]
pub struct ExperimentListBody {
    pub experiments: Vec<Experiment>,
    pub active_experiment_id: Option<String>,
}

/// `GET /reversal/experiments` — every experiment plus the current active id.
pub async fn list_experiments(State(state): State<AppState>) -> ApiResult<ExperimentListBody> {
    Ok(Json(ApiResponse::ok(ExperimentListBody {
        experiments: state.ab_framework.list(),
        active_experiment_id: state.ab_framework.active_experiment_id(),
    })))
}

/// `POST /reversal/experiments/{id}/activate` — stops any other active
/// experiment and activates this one.
pub async fn activate_experiment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Experiment> {
    state.ab_framework.activate(&id)?;
    let experiment = state
        .ab_framework
        .get(&id)
        .ok_or_else(|| ApiError::NotFound(format!("unknown experiment {id}")))?;
    Ok(Json(ApiResponse::ok(experiment)))
}

/// `GET /reversal/experiments/{id}/metrics` — per-variant counters.
pub async fn experiment_metrics(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Experiment> {
    let experiment = state
        .ab_framework
        .get(&id)
        .ok_or_else(|| ApiError::NotFound(format!("unknown experiment {id}")))?;
    Ok(Json(ApiResponse::ok(experiment)))
}

/// `POST /reversal/experiments/{id}/stop` — deactivate, preserving counters.
pub async fn stop_experiment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Experiment> {
    state.ab_framework.stop(&id)?;
    let experiment = state
        .ab_framework
        .get(&id)
        .ok_or_else(|| ApiError::NotFound(format!("unknown experiment {id}")))?;
    Ok(Json(ApiResponse::ok(experiment)))
}
