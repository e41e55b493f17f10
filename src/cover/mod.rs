//! Motion controller core for a sensor-synchronised, time-simulated cover.
//!
//! The controller owns a single [`MotionState`] and mutates it in discrete
//! run-to-completion steps: user commands, sensor edges and simulator ticks.
//! Every mutation is followed by a [`StatePublisher::publish`] call.

pub mod controller;
pub mod resolver;
pub mod types;

pub use controller::{MotionController, TICK_INTERVAL, TICK_INTERVAL_SECS};
pub use types::{
    Capability, CoverCommand, Direction, MotionState, NextAction, PendingStart, Phase, Trigger,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::config::CoverConfig;

/// Attributes published after every state change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverSnapshot {
    pub entity_id: String,
    pub unique_id: String,
    pub name: String,
    pub state: Phase,
    pub current_position: u8,
    pub is_closed: bool,
    pub is_moving: bool,
    pub next_action: NextAction,
    pub script_configured_entity_id: Option<String>,
    pub script_running_entity_id: Option<String>,
    pub last_trigger: Option<String>,
    pub pending_start: Option<PendingStart>,
    pub supported_features: Vec<Capability>,
    pub updated_at: DateTime<Utc>,
}

impl CoverSnapshot {
    pub(crate) fn from_state(config: &CoverConfig, state: &MotionState, is_moving: bool) -> Self {
        Self {
            entity_id: config.entity_id(),
            unique_id: config.unique_id(),
            name: config.name.clone(),
            state: state.phase,
            current_position: state.rounded_position(),
            is_closed: state.phase == Phase::Closed,
            is_moving,
            next_action: state.next_action,
            script_configured_entity_id: config.script_entity_id.clone(),
            script_running_entity_id: state.script_running.clone(),
            last_trigger: state.last_trigger.map(|t| t.to_string()),
            pending_start: state.pending_start,
            supported_features: resolver::capabilities(is_moving, state.next_action),
            updated_at: Utc::now(),
        }
    }

    /// State of a freshly registered cover, before it is attached.
    pub fn initial(config: &CoverConfig) -> Self {
        Self::from_state(config, &MotionState::default(), false)
    }
}

/// Sink for published cover state (a listening UI, the HTTP surface, tests).
pub trait StatePublisher: Send {
    fn publish(&mut self, snapshot: &CoverSnapshot);
}

impl StatePublisher for watch::Sender<CoverSnapshot> {
    fn publish(&mut self, snapshot: &CoverSnapshot) {
        self.send_replace(snapshot.clone());
    }
}
