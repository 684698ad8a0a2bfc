use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::HeaderValue,
    routing::{get, post},
};
use breeze_desk_core::credentials::Credentials;
use breeze_desk_core::query::HistoricalRequest;
use serde::Serialize;
use serde_json::Value;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::config::Config;
use crate::error::{ApiError, ApiResult};
use crate::pages;
use crate::sessions::SessionId;
use crate::state::AppState;

pub const SESSION_INITIALIZED: &str = "Session initialized successfully";

#[derive(Debug, Serialize)]
pub struct InitSessionResponse {
    pub success: bool,
    pub message: String,
    pub session_id: SessionId,
}

#[derive(Debug, Serialize)]
pub struct HistoricalResponse {
    pub success: bool,
    pub data: Vec<Value>,
}

pub async fn healthz() -> &'static str {
    "ok"
}

async fn init_session(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> ApiResult<Json<InitSessionResponse>> {
    let Json(credentials) = payload.map_err(|e| ApiError::Malformed(e.body_text()))?;
    let session_id = state.open_session(&credentials).await?;
    Ok(Json(InitSessionResponse {
        success: true,
        message: SESSION_INITIALIZED.to_string(),
        session_id,
    }))
}

async fn historical(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<HistoricalRequest>, JsonRejection>,
) -> ApiResult<Json<HistoricalResponse>> {
    let Json(request) = payload.map_err(|e| ApiError::Malformed(e.body_text()))?;
    let data = state.historical(&request).await?;
    Ok(Json(HistoricalResponse {
        success: true,
        data,
    }))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{origin}'");
                None
            }
        })
        .collect();
    layer.allow_origin(allowed)
}

pub fn app_router(state: Arc<AppState>, config: &Config) -> Router {
    let api = Router::new()
        .route("/init-session", post(init_session))
        .route("/historical", post(historical))
        .route("/healthz", get(healthz));

    Router::new()
        .nest("/api", api)
        .merge(pages::router())
        .with_state(state)
        .layer(cors_layer(&config.cors_origins))
        .layer(TraceLayer::new_for_http())
}
