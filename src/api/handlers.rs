//! HTTP endpoint handlers

use std::sync::Arc;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use tracing::{error, info, warn};

use crate::state::{AppState, ControllerError, Error};
use super::responses::{ApiResponse, DurationRequest, ErrorResponse, HealthResponse, StatusResponse};

/// Error type for handlers, rendered as a JSON error body
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::Controller(ControllerError::Running) => StatusCode::CONFLICT,
            Error::Controller(ControllerError::InvalidDuration(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Error::LockPoisoned(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            warn!("Request rejected: {}", self.0);
        }

        (status, Json(ErrorResponse::new(self.0.to_string()))).into_response()
    }
}

/// Handle POST /start - Start or resume the countdown
pub async fn start_handler(State(state): State<Arc<AppState>>) -> Result<Json<ApiResponse>, ApiError> {
    let timer = state.start()?;
    info!("Start endpoint called - countdown {}", timer.state);
    Ok(Json(ApiResponse::new(
        format!("Countdown running, {} remaining", timer.display),
        timer,
    )))
}

/// Handle POST /pause - Pause the countdown
pub async fn pause_handler(State(state): State<Arc<AppState>>) -> Result<Json<ApiResponse>, ApiError> {
    let timer = state.pause()?;
    info!("Pause endpoint called - countdown {}", timer.state);
    Ok(Json(ApiResponse::new(
        format!("Countdown {} at {}", timer.state, timer.display),
        timer,
    )))
}

/// Handle POST /toggle - Start/pause button
pub async fn toggle_handler(State(state): State<Arc<AppState>>) -> Result<Json<ApiResponse>, ApiError> {
    let timer = state.toggle()?;
    info!("Toggle endpoint called - countdown {}", timer.state);
    Ok(Json(ApiResponse::new(
        format!("Countdown {} at {}", timer.state, timer.display),
        timer,
    )))
}

/// Handle PUT /duration - Change the configured duration
pub async fn duration_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DurationRequest>,
) -> Result<Json<ApiResponse>, ApiError> {
    let timer = state.set_duration(request.minutes)?;
    info!("Duration endpoint called - {} minutes", timer.configured_minutes);
    Ok(Json(ApiResponse::new(
        format!("Duration set to {} minutes", timer.configured_minutes),
        timer,
    )))
}

/// Handle GET /status - Reconcile and return the current countdown
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Result<Json<StatusResponse>, ApiError> {
    let timer = state.get_timer_state()?;
    let (last_action, last_action_time) = state.get_last_action();

    Ok(Json(StatusResponse {
        timer,
        uptime: state.get_uptime(),
        port: state.port,
        host: state.host.clone(),
        last_action,
        last_action_time,
    }))
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
