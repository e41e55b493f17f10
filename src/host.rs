// src/host.rs - Entity host: one cooperative task per cover
use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::config::{Config, CoverConfig};
use crate::cover::{CoverCommand, CoverSnapshot, MotionController, TICK_INTERVAL};
use crate::script::ScriptInvoker;
use crate::sensor::{SensorBus, SensorEvent, SensorSubscription};

#[derive(Debug, Error)]
pub enum HostError {
    #[error("Unknown cover: {0}")]
    UnknownCover(String),
    #[error("Cover task for {0} is no longer running")]
    Closed(String),
}

/// Requests processed by a cover task, one at a time.
#[derive(Debug)]
pub enum CoverRequest {
    Command {
        command: CoverCommand,
        respond_to: Option<oneshot::Sender<CoverSnapshot>>,
    },
    Shutdown,
}

/// Cloneable handle to a running cover task.
#[derive(Debug, Clone)]
pub struct CoverHandle {
    entity_id: String,
    requests: mpsc::Sender<CoverRequest>,
    state: watch::Receiver<CoverSnapshot>,
}

impl CoverHandle {
    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    /// Latest published snapshot.
    pub fn state(&self) -> CoverSnapshot {
        self.state.borrow().clone()
    }

    /// Receiver notified on every publish.
    pub fn subscribe(&self) -> watch::Receiver<CoverSnapshot> {
        self.state.clone()
    }

    /// Runs a command and returns the snapshot right after it was applied.
    pub async fn execute(&self, command: CoverCommand) -> Result<CoverSnapshot, HostError> {
        let (respond_to, response) = oneshot::channel();
        self.requests
            .send(CoverRequest::Command {
                command,
                respond_to: Some(respond_to),
            })
            .await
            .map_err(|_| HostError::Closed(self.entity_id.clone()))?;
        response.await.map_err(|_| HostError::Closed(self.entity_id.clone()))
    }

    pub async fn open(&self) -> Result<CoverSnapshot, HostError> {
        self.execute(CoverCommand::Open).await
    }

    pub async fn close(&self) -> Result<CoverSnapshot, HostError> {
        self.execute(CoverCommand::Close).await
    }

    pub async fn stop(&self) -> Result<CoverSnapshot, HostError> {
        self.execute(CoverCommand::Stop).await
    }

    pub async fn set_position(&self, position: u8) -> Result<CoverSnapshot, HostError> {
        self.execute(CoverCommand::SetPosition(position)).await
    }

    pub async fn activate_script(&self) -> Result<CoverSnapshot, HostError> {
        self.execute(CoverCommand::ActivateScript).await
    }

    /// Asks the task to detach. Pending requests queued before this are still handled.
    pub async fn shutdown(&self) -> Result<(), HostError> {
        self.requests
            .send(CoverRequest::Shutdown)
            .await
            .map_err(|_| HostError::Closed(self.entity_id.clone()))
    }
}

/// Spawns the task owning one cover's motion controller on the current runtime.
pub fn spawn_cover(
    config: CoverConfig,
    bus: SensorBus,
    invoker: Arc<dyn ScriptInvoker>,
) -> (CoverHandle, JoinHandle<()>) {
    if let Some(warning) = config.tolerance_warning() {
        tracing::warn!("{}", warning);
    }

    let (requests_tx, requests_rx) = mpsc::channel(16);
    let (publisher, state_rx) = watch::channel(CoverSnapshot::initial(&config));
    let controller = MotionController::new(config, invoker, Box::new(publisher));
    let entity_id = controller.entity_id().to_string();

    let task = tokio::spawn(run_cover(controller, requests_rx, bus));
    let handle = CoverHandle {
        entity_id,
        requests: requests_tx,
        state: state_rx,
    };
    (handle, task)
}

fn attach_sensors(
    controller: &MotionController,
    bus: &SensorBus,
    sink: &mpsc::Sender<SensorEvent>,
) -> Vec<SensorSubscription> {
    let config = controller.config();
    let mut sensors: Vec<&str> = Vec::new();
    for sensor in [config.open_sensor.as_deref(), config.close_sensor.as_deref()].into_iter().flatten() {
        if !sensors.contains(&sensor) {
            sensors.push(sensor);
        }
    }
    sensors
        .into_iter()
        .map(|sensor| {
            tracing::info!("Cover {} listening to {}", controller.entity_id(), sensor);
            bus.subscribe(sensor, sink.clone())
        })
        .collect()
}

async fn run_cover(
    mut controller: MotionController,
    mut requests: mpsc::Receiver<CoverRequest>,
    bus: SensorBus,
) {
    let (events_tx, mut events) = mpsc::channel::<SensorEvent>(16);
    let subscriptions = attach_sensors(&controller, &bus, &events_tx);
    drop(events_tx);
    controller.attach();

    let mut ticker = interval(TICK_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let epoch = controller.travel_epoch();
        tokio::select! {
            request = requests.recv() => {
                match request {
                    Some(CoverRequest::Command { command, respond_to }) => {
                        tracing::debug!("Cover {} command {:?}", controller.entity_id(), command);
                        controller.execute(command);
                        if let Some(respond_to) = respond_to {
                            let _ = respond_to.send(controller.snapshot());
                        }
                    }
                    Some(CoverRequest::Shutdown) | None => break,
                }
            }
            Some(event) = events.recv() => {
                controller.handle_sensor(&event.sensor, &event.state);
            }
            _ = ticker.tick(), if controller.is_moving() => {
                controller.tick();
            }
        }
        // A travel started during this step already took its first step.
        if controller.travel_epoch() != epoch {
            ticker.reset();
        }
    }

    drop(subscriptions);
    tracing::info!("Cover {} detached", controller.entity_id());
}

/// All covers hosted by this process, keyed by entity id.
#[derive(Debug, Clone, Default)]
pub struct CoverRegistry {
    covers: Arc<HashMap<String, CoverHandle>>,
}

impl CoverRegistry {
    pub fn new(handles: Vec<CoverHandle>) -> Self {
        let covers = handles
            .into_iter()
            .map(|handle| (handle.entity_id().to_string(), handle))
            .collect();
        Self {
            covers: Arc::new(covers),
        }
    }

    pub fn get(&self, entity_id: &str) -> Result<&CoverHandle, HostError> {
        self.covers
            .get(entity_id)
            .ok_or_else(|| HostError::UnknownCover(entity_id.to_string()))
    }

    /// Snapshots of every cover, ordered by entity id.
    pub fn snapshots(&self) -> Vec<CoverSnapshot> {
        let mut snapshots: Vec<CoverSnapshot> = self.covers.values().map(|h| h.state()).collect();
        snapshots.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
        snapshots
    }

    /// The `activate_script` service. Calls for other entity ids are ignored.
    pub async fn activate_script(&self, entity_id: &str) -> Result<Option<CoverSnapshot>, HostError> {
        match self.covers.get(entity_id) {
            Some(handle) => handle.activate_script().await.map(Some),
            None => {
                tracing::debug!("activate_script for unknown entity {}, ignoring", entity_id);
                Ok(None)
            }
        }
    }

    pub async fn shutdown(&self) {
        for handle in self.covers.values() {
            if let Err(e) = handle.shutdown().await {
                tracing::warn!("{}", e);
            }
        }
    }
}

/// Spawns every configured cover and returns the registry plus the task handles.
pub fn spawn_all(
    config: &Config,
    bus: &SensorBus,
    invoker: Arc<dyn ScriptInvoker>,
) -> (CoverRegistry, Vec<JoinHandle<()>>) {
    let mut handles = Vec::with_capacity(config.covers.len());
    let mut tasks = Vec::with_capacity(config.covers.len());
    for cover in &config.covers {
        let (handle, task) = spawn_cover(cover.clone(), bus.clone(), invoker.clone());
        tracing::info!("Registered cover {} ({})", handle.entity_id(), cover.name);
        handles.push(handle);
        tasks.push(task);
    }
    (CoverRegistry::new(handles), tasks)
}
