use axum::routing::{get, post};
use axum::{middleware, Router};

use crate::auth::auth_middleware;
use crate::handlers::{experiments, health, models, predict};
use crate::ip_allowlist::ip_allowlist_middleware;
use crate::request_id::request_id_middleware;
use crate::security_headers::security_headers_middleware;
use crate::state::AppState;

/// Builds the full `/reversal` surface plus `/health`, wrapping it in the
/// shared middleware stack (request id, security headers, auth). Admin-ish
/// routes (model switch, experiment control) additionally run behind the IP
/// allowlist.
pub fn build_router(state: AppState) -> Router {
    let admin_allowlist_state = state.ip_allowlist.clone();

    let admin_routes = Router::new()
        .route("/reversal/models/:version/switch", post(models::switch_model))
        .route("/reversal/experiments", post(experiments::create_experiment))
        .route("/reversal/experiments/:id/activate", post(experiments::activate_experiment))
        .route("/reversal/experiments/:id/stop", post(experiments::stop_experiment))
        .layer(middleware::from_fn_with_state(
            admin_allowlist_state,
            ip_allowlist_middleware,
        ));

    let reversal_routes = Router::new()
        .route("/reversal/predict", post(predict::predict))
        .route("/reversal/predict_raw", post(predict::predict_raw))
        .route("/reversal/compare", post(predict::compare))
        .route("/reversal/compare_raw", post(predict::compare_raw))
        .route("/reversal/models", get(models::list_models))
        .route("/reversal/models/:version", get(models::get_model))
        .route("/reversal/experiments", get(experiments::list_experiments))
        .route("/reversal/experiments/:id/metrics", get(experiments::experiment_metrics))
        .merge(admin_routes);

    Router::new()
        .route("/health", get(health::health))
        .merge(reversal_routes)
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(middleware::from_fn(auth_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}
