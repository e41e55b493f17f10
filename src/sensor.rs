// src/sensor.rs - Sensor state-change bus with scoped subscriptions
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const OPEN_ACTIVE_STATES: [&str; 4] = ["on", "true", "opening", "open"];
const CLOSE_ACTIVE_STATES: [&str; 4] = ["on", "true", "closing", "closed"];

/// Whether an open-sensor state means "opening has started".
pub fn is_open_active(state: &str) -> bool {
    let state = state.trim().to_ascii_lowercase();
    OPEN_ACTIVE_STATES.contains(&state.as_str())
}

/// Whether a close-sensor state means "closing has started".
pub fn is_close_active(state: &str) -> bool {
    let state = state.trim().to_ascii_lowercase();
    CLOSE_ACTIVE_STATES.contains(&state.as_str())
}

/// A new state reported for a sensor reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorEvent {
    pub sensor: String,
    pub state: String,
}

/// Broadcast bus delivering sensor state changes to subscribers.
#[derive(Debug, Clone)]
pub struct SensorBus {
    sender: broadcast::Sender<SensorEvent>,
}

impl SensorBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes a state change. Returns how many subscriptions received it.
    pub fn publish(&self, sensor: &str, state: &str) -> usize {
        let event = SensorEvent {
            sensor: sensor.to_string(),
            state: state.to_string(),
        };
        tracing::debug!("Sensor {} -> {}", sensor, state);
        self.sender.send(event).unwrap_or(0)
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Forwards every event for `sensor` into `sink` until the returned
    /// subscription is dropped or the sink is closed.
    ///
    /// Must be called from within a tokio runtime.
    pub fn subscribe(&self, sensor: &str, sink: mpsc::Sender<SensorEvent>) -> SensorSubscription {
        let mut receiver = self.sender.subscribe();
        let filter = sensor.to_string();
        let handle = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) if event.sensor == filter => {
                        if sink.send(event).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Subscription for {} lagged, {} events dropped", filter, skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        SensorSubscription {
            sensor: sensor.to_string(),
            handle,
        }
    }
}

impl Default for SensorBus {
    fn default() -> Self {
        Self::new(64)
    }
}

/// Live registration on the [`SensorBus`]. Dropping it deregisters the listener.
#[derive(Debug)]
pub struct SensorSubscription {
    sensor: String,
    handle: JoinHandle<()>,
}

impl SensorSubscription {
    pub fn sensor(&self) -> &str {
        &self.sensor
    }
}

impl Drop for SensorSubscription {
    fn drop(&mut self) {
        tracing::debug!("Unsubscribing from {}", self.sensor);
        self.handle.abort();
    }
}
