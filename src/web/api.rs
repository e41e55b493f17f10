//! Defines the Axum API routes and handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use crate::cover::{CoverCommand, CoverSnapshot};
use crate::host::{CoverRegistry, HostError};
use crate::sensor::SensorBus;
use crate::web::models::{
    ActivateScriptRequest, ErrorResponse, SensorStateRequest, SensorStateResponse, SetPositionRequest,
};

pub struct AppStateInner {
    pub registry: CoverRegistry,
    pub bus: SensorBus,
}

pub type AppState = Arc<AppStateInner>;

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Creates the Axum router with all the API endpoints.
pub fn create_router(registry: CoverRegistry, bus: SensorBus) -> Router {
    app_with_state(Arc::new(AppStateInner { registry, bus }))
}

pub fn app_with_state(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/covers", get(list_covers))
        .route("/api/v1/covers/{entity_id}", get(get_cover))
        .route("/api/v1/covers/{entity_id}/position", post(set_position))
        .route("/api/v1/covers/{entity_id}/{action}", post(cover_action))
        .route("/api/v1/sensors/{sensor}", post(sensor_state))
        .route("/api/v1/services/activate_script", post(activate_script))
        .with_state(state)
}

fn error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse { error: message.into() }))
}

fn host_error(e: HostError) -> ApiError {
    match e {
        HostError::UnknownCover(_) => error(StatusCode::NOT_FOUND, e.to_string()),
        HostError::Closed(_) => error(StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
    }
}

async fn list_covers(State(state): State<AppState>) -> Json<Vec<CoverSnapshot>> {
    Json(state.registry.snapshots())
}

async fn get_cover(
    State(state): State<AppState>,
    Path(entity_id): Path<String>,
) -> Result<Json<CoverSnapshot>, ApiError> {
    let handle = state.registry.get(&entity_id).map_err(host_error)?;
    Ok(Json(handle.state()))
}

/// Handler for the open / close / stop commands.
async fn cover_action(
    State(state): State<AppState>,
    Path((entity_id, action)): Path<(String, String)>,
) -> Result<Json<CoverSnapshot>, ApiError> {
    let handle = state.registry.get(&entity_id).map_err(host_error)?;
    let Some(command) = CoverCommand::from_action(&action) else {
        tracing::debug!("Ignoring unknown action '{}' for {}", action, entity_id);
        return Err(error(StatusCode::NOT_FOUND, format!("Unknown action: {}", action)));
    };
    let snapshot = handle.execute(command).await.map_err(host_error)?;
    Ok(Json(snapshot))
}

async fn set_position(
    State(state): State<AppState>,
    Path(entity_id): Path<String>,
    Json(payload): Json<SetPositionRequest>,
) -> Result<Json<CoverSnapshot>, ApiError> {
    let handle = state.registry.get(&entity_id).map_err(host_error)?;
    let position = u8::try_from(payload.position)
        .ok()
        .filter(|p| *p <= 100)
        .ok_or_else(|| error(StatusCode::UNPROCESSABLE_ENTITY, "position must be between 0 and 100"))?;
    let snapshot = handle.set_position(position).await.map_err(host_error)?;
    Ok(Json(snapshot))
}

async fn sensor_state(
    State(state): State<AppState>,
    Path(sensor): Path<String>,
    Json(payload): Json<SensorStateRequest>,
) -> Json<SensorStateResponse> {
    let delivered = state.bus.publish(&sensor, &payload.state);
    Json(SensorStateResponse { delivered })
}

/// The `activate_script` service. Unknown entity ids are ignored.
async fn activate_script(
    State(state): State<AppState>,
    Json(payload): Json<ActivateScriptRequest>,
) -> Result<StatusCode, ApiError> {
    match state.registry.activate_script(&payload.entity_id).await {
        Ok(Some(_)) => Ok(StatusCode::OK),
        Ok(None) => Ok(StatusCode::ACCEPTED),
        Err(e) => Err(host_error(e)),
    }
}
