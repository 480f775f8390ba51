use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::error::{ApiResponse, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthBody {
    pub status: &'static str,
    pub active_model_version: Option<String>,
    pub active_experiment_id: Option<String>,
}

pub async fn health(State(state): State<AppState>) -> ApiResult<HealthBody> {
    let active_model_version = state.registry.get_active().map(|v| v.spec.version_id);
    Ok(Json(ApiResponse::ok(HealthBody {
        status: "ok",
        active_model_version,
        active_experiment_id: state.ab_framework.active_experiment_id(),
    })))
}
