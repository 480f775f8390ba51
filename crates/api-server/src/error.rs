use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use analysis_core::AnalysisError;

/// Uniform response envelope for every endpoint. Exactly one of `data`/`error`
/// is populated; there is no partial-success shape.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
        }
    }
}

impl ApiResponse<()> {
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            timestamp: Utc::now(),
        }
    }
}

/// HTTP-layer errors, wrapping the analysis error taxonomy plus the two
/// cases with no typed counterpart below the HTTP boundary.
#[derive(Debug)]
pub enum ApiError {
    Analysis(AnalysisError),
    NotFound(String),
    ServiceNotReady(String),
}

impl From<AnalysisError> for ApiError {
    fn from(e: AnalysisError) -> Self {
        ApiError::Analysis(e)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Analysis(e) => write!(f, "{e}"),
            ApiError::NotFound(m) => write!(f, "{m}"),
            ApiError::ServiceNotReady(m) => write!(f, "{m}"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Analysis(AnalysisError::ValidationError(m)) => (StatusCode::BAD_REQUEST, m.clone()),
            ApiError::Analysis(AnalysisError::InsufficientData(m)) => (StatusCode::BAD_REQUEST, m.clone()),
            // Feature/scaler/registry disagreement is a configuration fault, not a client one.
            ApiError::Analysis(AnalysisError::FeatureMismatch(m)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, m.clone())
            }
            ApiError::Analysis(AnalysisError::VersionNotAvailable(m)) => (StatusCode::NOT_FOUND, m.clone()),
            ApiError::Analysis(AnalysisError::ArtefactIoError(m)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, m.clone())
            }
            ApiError::Analysis(AnalysisError::TrainingIntegrityError(m)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, m.clone())
            }
            ApiError::Analysis(AnalysisError::CalculationError(m)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, m.clone())
            }
            ApiError::Analysis(AnalysisError::CacheError(m)) => (StatusCode::INTERNAL_SERVER_ERROR, m.clone()),
            ApiError::Analysis(AnalysisError::Unknown(m)) => (StatusCode::INTERNAL_SERVER_ERROR, m.clone()),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            ApiError::ServiceNotReady(m) => (StatusCode::SERVICE_UNAVAILABLE, m.clone()),
        };

        tracing::warn!(status = %status, error = %message, "request failed");

        (status, Json(ApiResponse::<()>::err(message))).into_response()
    }
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;
