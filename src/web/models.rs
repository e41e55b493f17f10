//! Contains the data models for API requests and responses.

use serde::{Deserialize, Serialize};

/// Request to move a cover to an explicit position (0 closed, 100 open).
#[derive(Debug, Deserialize)]
pub struct SetPositionRequest {
    pub position: u16,
}

/// A sensor state change injected from outside.
#[derive(Debug, Deserialize)]
pub struct SensorStateRequest {
    pub state: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SensorStateResponse {
    pub delivered: usize,
}

/// Payload of the `activate_script` service call.
#[derive(Debug, Deserialize)]
pub struct ActivateScriptRequest {
    pub entity_id: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
