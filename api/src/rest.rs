use crate::db::Database;
use crate::errors;
use crate::model::{Health, Message};
use crate::{sensors, temperatures};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

#[derive(Debug, Clone)]
pub struct AppState {
    pub db: Database,
}

pub fn create_router(db: Database) -> Router {
    let state = AppState { db };

    Router::new()
        .route("/", get(home))
        .route("/api/v1/health", get(health))
        .route("/api/v1/sensors", get(sensors::list).post(sensors::create))
        .route(
            "/api/v1/sensors/:sensor_id",
            get(sensors::get).put(sensors::update),
        )
        .route(
            "/api/v1/temperatures",
            get(temperatures::list).post(temperatures::create),
        )
        .route(
            "/api/v1/temperatures/:log_id",
            get(temperatures::get)
                .put(temperatures::update)
                .delete(temperatures::delete),
        )
        .method_not_allowed_fallback(method_not_allowed)
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn home() -> Json<Message> {
    Json(Message {
        message: "Temperature Logger API",
    })
}

async fn health(State(state): State<AppState>) -> Response {
    match state.db.fetch_one::<(i32,)>("SELECT 1 AS ok", &[]).await {
        Ok(_) => Json(Health { status: "ok" }).into_response(),
        Err(e) => {
            warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(Health { status: "degraded" }),
            )
                .into_response()
        }
    }
}

async fn not_found() -> ApiError {
    ApiError::route_not_found()
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed("Method not allowed".to_string())
}

/// Error returned by route handlers; rendered as
/// `{"error": {"code": <status>, "message": <text>}}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    MethodNotAllowed(String),

    #[error("{0}")]
    UnsupportedMediaType(String),
}

impl ApiError {
    pub fn route_not_found() -> Self {
        ApiError::NotFound("Resource not found".to_string())
    }

    /// Maps a database failure during `action` (e.g. "create sensor").
    /// Integrity violations are reported verbatim; anything else is logged
    /// and reported without internals.
    pub fn database(err: errors::Error, action: &str) -> Self {
        match err {
            errors::Error::Integrity(_) => ApiError::BadRequest(err.to_string()),
            other => {
                error!(error = %other, "{} failed", action);
                ApiError::BadRequest(format!("Failed to {action}"))
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = json!({
            "error": {
                "code": status.as_u16(),
                "message": self.to_string(),
            }
        });

        (status, Json(body)).into_response()
    }
}
