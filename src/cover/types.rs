//! Value types shared by the motion controller, the host and the HTTP surface.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Travel direction. `Open` advances toward 100, `Close` toward 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Open,
    Close,
}

impl Direction {
    /// Parses `"open"` / `"close"`; anything else is not a direction.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "open" => Some(Direction::Open),
            "close" => Some(Direction::Close),
            _ => None,
        }
    }

    /// Position the cover travels to when no explicit target is given.
    pub fn extreme(self) -> u8 {
        match self {
            Direction::Open => 100,
            Direction::Close => 0,
        }
    }

    pub fn travelling_phase(self) -> Phase {
        match self {
            Direction::Open => Phase::Opening,
            Direction::Close => Phase::Closing,
        }
    }

    pub fn reverse(self) -> Self {
        match self {
            Direction::Open => Direction::Close,
            Direction::Close => Direction::Open,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Open => write!(f, "open"),
            Direction::Close => write!(f, "close"),
        }
    }
}

/// Displayed cover state. Derived from position and tolerance whenever motion ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Closed,
    Open,
    Opening,
    Closing,
}

impl Phase {
    pub fn is_travelling(self) -> bool {
        matches!(self, Phase::Opening | Phase::Closing)
    }
}

/// What a fresh open/close command should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NextAction {
    Open,
    Close,
    Stop,
}

impl NextAction {
    pub fn direction(self) -> Option<Direction> {
        match self {
            NextAction::Open => Some(Direction::Open),
            NextAction::Close => Some(Direction::Close),
            NextAction::Stop => None,
        }
    }
}

impl From<Direction> for NextAction {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Open => NextAction::Open,
            Direction::Close => NextAction::Close,
        }
    }
}

/// User-invocable controls exposed by the cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Open,
    Close,
    Stop,
    SetPosition,
}

/// A movement that fired the external script and waits for sensor confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingStart {
    pub direction: Direction,
    pub target: Option<u8>,
}

/// Cause of the last state change. Observability only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    UserOpen,
    UserClose,
    UserSetPosition(u8),
    SensorOpen,
    SensorClose,
    Service,
    Stop,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::UserOpen => write!(f, "user_open"),
            Trigger::UserClose => write!(f, "user_close"),
            Trigger::UserSetPosition(target) => write!(f, "user_set_position_{}", target),
            Trigger::SensorOpen => write!(f, "sensor_open"),
            Trigger::SensorClose => write!(f, "sensor_close"),
            Trigger::Service => write!(f, "service"),
            Trigger::Stop => write!(f, "stop"),
        }
    }
}

/// Commands accepted from the entity host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverCommand {
    Open,
    Close,
    Stop,
    SetPosition(u8),
    ActivateScript,
}

impl CoverCommand {
    /// Maps a plain action name (`open`, `close`, `stop`) to a command.
    pub fn from_action(action: &str) -> Option<Self> {
        match action.trim().to_ascii_lowercase().as_str() {
            "open" => Some(CoverCommand::Open),
            "close" => Some(CoverCommand::Close),
            "stop" => Some(CoverCommand::Stop),
            _ => None,
        }
    }
}

/// Mutable per-device state. Position is mutated only by the simulator.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionState {
    pub position: f64,
    pub phase: Phase,
    pub next_action: NextAction,
    pub last_trigger: Option<Trigger>,
    pub pending_start: Option<PendingStart>,
    pub script_running: Option<String>,
}

impl Default for MotionState {
    fn default() -> Self {
        Self {
            position: 0.0,
            phase: Phase::Closed,
            next_action: NextAction::Open,
            last_trigger: None,
            pending_start: None,
            script_running: None,
        }
    }
}

impl MotionState {
    /// Rounded integer position as published to listeners.
    pub fn rounded_position(&self) -> u8 {
        self.position.clamp(0.0, 100.0).round() as u8
    }
}
