use axum::extract::{Path, State};
use axum::Json;

use model_registry::VersionInfo;

use crate::error::{ApiError, ApiResponse, ApiResult};
use crate::state::AppState;

/// `GET /reversal/models` — every registered version with load status.
pub async fn list_models(State(state): State<AppState>) -> ApiResult<Vec<VersionInfo>> {
    Ok(Json(ApiResponse::ok(state.registry.get_versions_info())))
}

/// `GET /reversal/models/{version}` — info for one version.
pub async fn get_model(
    State(state): State<AppState>,
    Path(version): Path<String>,
) -> ApiResult<VersionInfo> {
    let info = state
        .registry
        .get_versions_info()
        .into_iter()
        .find(|v| v.version_id == version)
        .ok_or_else(|| ApiError::NotFound(format!("unknown model version {version}")))?;
    Ok(Json(ApiResponse::ok(info)))
}

/// `POST /reversal/models/{version}/switch` — atomically activate a version.
pub async fn switch_model(
    State(state): State<AppState>,
    Path(version): Path<String>,
) -> ApiResult<VersionInfo> {
    state.registry.switch(&version)?;
    let info = state
        .registry
        .get_versions_info()
        .into_iter()
        .find(|v| v.version_id == version)
        .ok_or_else(|| ApiError::NotFound(format!("unknown model version {version}")))?;
    Ok(Json(ApiResponse::ok(info)))
}
