// src/cover/controller.rs - Sensor-gated motion controller with time-based position simulation
use std::sync::Arc;
use std::time::Duration;

use super::resolver;
use super::types::{CoverCommand, Direction, MotionState, NextAction, PendingStart, Trigger};
use super::{CoverSnapshot, StatePublisher};
use crate::config::CoverConfig;
use crate::script::ScriptInvoker;
use crate::sensor;

/// Simulator step, in seconds of wall-clock time.
pub const TICK_INTERVAL_SECS: f64 = 0.5;
pub const TICK_INTERVAL: Duration = Duration::from_millis(500);

/// An in-flight simulated travel.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Travel {
    direction: Direction,
    target: f64,
    delta: f64,
}

impl Travel {
    fn reached(&self, position: f64) -> bool {
        match self.direction {
            Direction::Open => position >= self.target,
            Direction::Close => position <= self.target,
        }
    }
}

/// Per-device motion controller.
///
/// Every public operation is one run-to-completion step. The host is responsible
/// for calling [`MotionController::tick`] every [`TICK_INTERVAL`] while
/// [`MotionController::is_moving`] holds.
pub struct MotionController {
    config: CoverConfig,
    entity_id: String,
    tolerance: f64,
    state: MotionState,
    travel: Option<Travel>,
    travel_epoch: u64,
    open_sensor_active: bool,
    close_sensor_active: bool,
    invoker: Arc<dyn ScriptInvoker>,
    publisher: Box<dyn StatePublisher>,
}

impl MotionController {
    pub fn new(
        config: CoverConfig,
        invoker: Arc<dyn ScriptInvoker>,
        publisher: Box<dyn StatePublisher>,
    ) -> Self {
        Self {
            entity_id: config.entity_id(),
            tolerance: config.tolerance(),
            config,
            state: MotionState::default(),
            travel: None,
            travel_epoch: 0,
            open_sensor_active: false,
            close_sensor_active: false,
            invoker,
            publisher,
        }
    }

    pub fn config(&self) -> &CoverConfig {
        &self.config
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn state(&self) -> &MotionState {
        &self.state
    }

    pub fn is_moving(&self) -> bool {
        self.travel.is_some()
    }

    /// Incremented whenever a travel (re)starts; the host re-arms its ticker on change.
    pub fn travel_epoch(&self) -> u64 {
        self.travel_epoch
    }

    /// Lifecycle hook: resolve the displayed state from position and publish it.
    pub fn attach(&mut self) {
        let (phase, next_action) = resolver::resolve_at_rest(self.state.position, self.tolerance);
        self.state.phase = phase;
        self.state.next_action = next_action;
        tracing::info!(
            "Cover {} attached at {:.1}% ({:?}, next {:?})",
            self.entity_id, self.state.position, phase, next_action
        );
        self.publish();
    }

    pub fn execute(&mut self, command: CoverCommand) {
        match command {
            CoverCommand::Open => self.open(),
            CoverCommand::Close => self.close(),
            CoverCommand::Stop => self.stop(),
            CoverCommand::SetPosition(target) => self.set_position(target),
            CoverCommand::ActivateScript => self.activate_script(),
        }
    }

    pub fn open(&mut self) {
        self.state.last_trigger = Some(Trigger::UserOpen);
        self.start_movement(Direction::Open, true, None);
    }

    pub fn close(&mut self) {
        self.state.last_trigger = Some(Trigger::UserClose);
        self.start_movement(Direction::Close, true, None);
    }

    /// Moves to an explicit position without calling the script.
    pub fn set_position(&mut self, target: u8) {
        let target = target.min(100);
        let current = self.state.rounded_position();
        let direction = if target > current {
            Direction::Open
        } else if target < current {
            Direction::Close
        } else {
            tracing::debug!("Cover {} already at {}%, ignoring set_position", self.entity_id, target);
            return;
        };
        self.state.last_trigger = Some(Trigger::UserSetPosition(target));
        self.start_movement(direction, false, Some(target));
    }

    pub fn stop(&mut self) {
        let previous = self.state.phase;
        self.state.pending_start = None;
        self.travel = None;
        self.state.script_running = None;

        let (phase, next_action) =
            resolver::resolve_after_stop(self.state.position, self.tolerance, previous);
        self.state.phase = phase;
        self.state.next_action = next_action;
        self.state.last_trigger = Some(Trigger::Stop);
        tracing::info!(
            "Cover {} stopped at {:.1}% ({:?}, next {:?})",
            self.entity_id, self.state.position, phase, next_action
        );
        self.publish();
    }

    /// The `activate_script` service: fire the script, then start or arm the
    /// movement the current next action calls for.
    pub fn activate_script(&mut self) {
        let Some(script) = self.config.script_entity_id.clone() else {
            tracing::debug!("Cover {} has no script configured, ignoring activate_script", self.entity_id);
            return;
        };
        self.invoke_script(&script);
        self.state.script_running = Some(script);
        self.state.last_trigger = Some(Trigger::Service);
        self.publish();

        let Some(direction) = self.state.next_action.direction() else {
            return;
        };
        if self.sensor_for(direction).is_none() {
            self.begin_movement(direction, None);
        } else {
            self.state.pending_start = Some(PendingStart { direction, target: None });
            tracing::debug!("Cover {} waiting for {} sensor", self.entity_id, direction);
            self.publish();
        }
    }

    /// Handles a state update from the configured open sensor.
    pub fn handle_open_sensor(&mut self, state: &str) {
        let active = sensor::is_open_active(state);
        let rising = active && !self.open_sensor_active;
        self.open_sensor_active = active;
        if rising {
            self.state.last_trigger = Some(Trigger::SensorOpen);
            self.on_motion_confirmed(Direction::Open);
        }
    }

    /// Handles a state update from the configured close sensor.
    pub fn handle_close_sensor(&mut self, state: &str) {
        let active = sensor::is_close_active(state);
        let rising = active && !self.close_sensor_active;
        self.close_sensor_active = active;
        if rising {
            self.state.last_trigger = Some(Trigger::SensorClose);
            self.on_motion_confirmed(Direction::Close);
        }
    }

    /// Dispatches a raw sensor update by sensor reference. Unknown sensors are ignored.
    pub fn handle_sensor(&mut self, sensor: &str, state: &str) {
        if self.config.open_sensor.as_deref() == Some(sensor) {
            self.handle_open_sensor(state);
        }
        if self.config.close_sensor.as_deref() == Some(sensor) {
            self.handle_close_sensor(state);
        }
    }

    /// Advances the simulation by one step. Returns whether the cover is still moving.
    pub fn tick(&mut self) -> bool {
        let Some(travel) = self.travel else {
            return false;
        };
        self.state.position = (self.state.position + travel.delta).clamp(0.0, 100.0);
        if travel.reached(self.state.position) {
            self.finish_travel(travel.direction);
            return false;
        }
        tracing::trace!("Cover {} at {:.1}%", self.entity_id, self.state.position);
        self.publish();
        true
    }

    pub fn snapshot(&self) -> CoverSnapshot {
        CoverSnapshot::from_state(&self.config, &self.state, self.is_moving())
    }

    fn on_motion_confirmed(&mut self, direction: Direction) {
        match self.state.pending_start {
            Some(pending) if pending.direction == direction => {
                self.state.pending_start = None;
                tracing::info!("Cover {} {} confirmed by sensor", self.entity_id, direction);
                self.begin_movement(direction, pending.target);
            }
            _ => {
                // No matching request: the sensor is authoritative.
                tracing::info!(
                    "Cover {} sensor reports unrequested {} travel",
                    self.entity_id, direction
                );
                self.begin_movement(direction, Some(direction.extreme()));
            }
        }
    }

    fn start_movement(&mut self, direction: Direction, calls_script: bool, target: Option<u8>) {
        if self.is_moving() && calls_script {
            tracing::debug!("Cover {} moving, treating {} as stop", self.entity_id, direction);
            self.stop();
            return;
        }

        if calls_script && self.sensor_for(direction).is_some() {
            if let Some(script) = self.config.script_entity_id.clone() {
                self.invoke_script(&script);
                self.state.script_running = Some(script);
            }
            self.state.pending_start = Some(PendingStart { direction, target });
            tracing::debug!("Cover {} waiting for {} sensor", self.entity_id, direction);
            self.publish();
            return;
        }

        self.begin_movement(direction, target);
    }

    fn begin_movement(&mut self, direction: Direction, target: Option<u8>) {
        let full = match direction {
            Direction::Open => self.config.open_duration_secs(),
            Direction::Close => self.config.close_duration_secs(),
        };
        let magnitude = 100.0 / (full as f64 / TICK_INTERVAL_SECS);
        let delta = match direction {
            Direction::Open => magnitude,
            Direction::Close => -magnitude,
        };
        let target = target.unwrap_or_else(|| direction.extreme()) as f64;

        self.state.pending_start = None;
        self.state.phase = direction.travelling_phase();
        self.state.next_action = NextAction::Stop;
        self.travel = Some(Travel { direction, target, delta });
        self.travel_epoch = self.travel_epoch.wrapping_add(1);
        tracing::info!(
            "Cover {} starting {} travel from {:.1}% to {:.0}% ({:.2}%/tick)",
            self.entity_id, direction, self.state.position, target, delta
        );
        self.publish();

        // The first step is taken immediately; later steps come from the host's ticker.
        self.tick();
    }

    fn finish_travel(&mut self, direction: Direction) {
        self.travel = None;
        self.state.script_running = None;
        let (phase, next_action) =
            resolver::resolve_after_travel(self.state.position, self.tolerance, direction);
        self.state.phase = phase;
        self.state.next_action = next_action;
        tracing::info!(
            "Cover {} settled at {:.1}% ({:?}, next {:?})",
            self.entity_id, self.state.position, phase, next_action
        );
        self.publish();
    }

    fn sensor_for(&self, direction: Direction) -> Option<&str> {
        match direction {
            Direction::Open => self.config.open_sensor.as_deref(),
            Direction::Close => self.config.close_sensor.as_deref(),
        }
    }

    fn invoke_script(&self, script: &str) {
        match self.invoker.invoke(script) {
            Ok(()) => tracing::debug!("Cover {} invoked script {}", self.entity_id, script),
            Err(e) => tracing::warn!("Cover {} script call failed (ignored): {}", self.entity_id, e),
        }
    }

    fn publish(&mut self) {
        let snapshot = self.snapshot();
        self.publisher.publish(&snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cover::{Capability, Phase};
    use crate::script::RecordingScriptInvoker;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<CoverSnapshot>>>);

    impl StatePublisher for Recorder {
        fn publish(&mut self, snapshot: &CoverSnapshot) {
            self.0.lock().unwrap().push(snapshot.clone());
        }
    }

    impl Recorder {
        fn count(&self) -> usize {
            self.0.lock().unwrap().len()
        }
        fn last(&self) -> CoverSnapshot {
            self.0.lock().unwrap().last().cloned().unwrap()
        }
    }

    fn cover_config() -> CoverConfig {
        CoverConfig {
            name: "Test Gate".to_string(),
            entry_id: "entry".to_string(),
            open_duration: 25,
            close_duration: 25,
            tolerance_percent: 10.0,
            ..CoverConfig::default()
        }
    }

    fn gated_config() -> CoverConfig {
        CoverConfig {
            open_sensor: Some("binary_sensor.opening".to_string()),
            close_sensor: Some("binary_sensor.closing".to_string()),
            script_entity_id: Some("script.gate_rf".to_string()),
            ..cover_config()
        }
    }

    fn controller(config: CoverConfig) -> (MotionController, RecordingScriptInvoker, Recorder) {
        let invoker = RecordingScriptInvoker::new();
        let recorder = Recorder::default();
        let mut mc = MotionController::new(config, Arc::new(invoker.clone()), Box::new(recorder.clone()));
        mc.attach();
        (mc, invoker, recorder)
    }

    /// Ticks until the travel ends; returns the number of `tick` calls made.
    fn run_to_rest(mc: &mut MotionController) -> usize {
        let mut ticks = 0;
        loop {
            ticks += 1;
            if !mc.tick() {
                return ticks;
            }
            assert!(ticks < 10_000, "simulation did not converge");
        }
    }

    fn assert_invariants(mc: &MotionController) {
        let state = mc.state();
        assert!((0.0..=100.0).contains(&state.position));
        assert_eq!(mc.is_moving(), state.phase.is_travelling());
        if state.pending_start.is_some() {
            assert!(!mc.is_moving());
        }
    }

    #[test]
    fn test_attach_publishes_closed_state() {
        let (mc, _, recorder) = controller(cover_config());
        assert_eq!(recorder.count(), 1);
        let snapshot = recorder.last();
        assert_eq!(snapshot.entity_id, "cover.test_gate");
        assert_eq!(snapshot.unique_id, "entry_cover");
        assert_eq!(snapshot.state, Phase::Closed);
        assert!(snapshot.is_closed);
        assert_eq!(snapshot.next_action, NextAction::Open);
        assert_eq!(snapshot.current_position, 0);
        assert!(!mc.is_moving());
    }

    #[test]
    fn test_open_converges_in_fifty_steps() {
        let (mut mc, _, _) = controller(cover_config());
        mc.open();
        // begin_movement takes the first step immediately
        assert!(mc.is_moving());
        assert_eq!(mc.state().position, 2.0);
        let ticks = run_to_rest(&mut mc);
        assert_eq!(ticks + 1, 50);
        assert_eq!(mc.state().position, 100.0);
        assert!(!mc.is_moving());
        assert_eq!(mc.state().phase, Phase::Open);
        assert_eq!(mc.state().next_action, NextAction::Close);
        assert!(mc.state().script_running.is_none());
    }

    #[test]
    fn test_still_moving_after_forty_nine_steps() {
        let (mut mc, _, _) = controller(cover_config());
        mc.open();
        for _ in 0..48 {
            assert!(mc.tick());
        }
        assert_eq!(mc.state().position, 98.0);
        assert!(mc.is_moving());
        assert!(!mc.tick());
        assert!(!mc.is_moving());
    }

    #[test]
    fn test_open_then_close_to_tolerance_band() {
        let (mut mc, _, _) = controller(cover_config());
        mc.open();
        run_to_rest(&mut mc);
        assert_eq!(mc.state().phase, Phase::Open);
        assert_eq!(mc.state().next_action, NextAction::Close);

        mc.set_position(5);
        assert_eq!(mc.state().last_trigger, Some(Trigger::UserSetPosition(5)));
        run_to_rest(&mut mc);
        assert!(mc.state().position <= 5.0);
        assert_eq!(mc.state().phase, Phase::Closed);
        assert_eq!(mc.state().next_action, NextAction::Open);
        assert_invariants(&mc);
    }

    #[test]
    fn test_stop_mid_close_reverses_next_action() {
        let (mut mc, _, _) = controller(cover_config());
        mc.open();
        run_to_rest(&mut mc);

        mc.close();
        while mc.state().position > 60.0 {
            assert!(mc.tick());
        }
        assert_eq!(mc.state().phase, Phase::Closing);
        mc.stop();
        assert_eq!(mc.state().position, 60.0);
        assert!(!mc.is_moving());
        assert_eq!(mc.state().next_action, NextAction::Open);
        assert_eq!(mc.state().phase, Phase::Open);
        assert_eq!(mc.state().last_trigger, Some(Trigger::Stop));
        // a stopped travel never advances again
        assert!(!mc.tick());
        assert_eq!(mc.state().position, 60.0);
    }

    #[test]
    fn test_stop_mid_open_below_half() {
        let (mut mc, _, _) = controller(cover_config());
        mc.open();
        while mc.state().position < 30.0 {
            mc.tick();
        }
        mc.stop();
        assert_eq!(mc.state().phase, Phase::Closed);
        assert_eq!(mc.state().next_action, NextAction::Close);
        assert_eq!(mc.snapshot().supported_features, vec![Capability::Close, Capability::SetPosition]);
    }

    #[test]
    fn test_second_user_command_toggles_to_stop() {
        let (mut mc, invoker, _) = controller(CoverConfig {
            script_entity_id: Some("script.gate_rf".to_string()),
            ..cover_config()
        });
        mc.open();
        assert!(mc.is_moving());
        mc.tick();
        mc.close();
        assert!(!mc.is_moving());
        assert_eq!(mc.state().last_trigger, Some(Trigger::Stop));
        assert!(invoker.calls().is_empty());
    }

    #[test]
    fn test_open_without_sensor_does_not_fire_script() {
        let (mut mc, invoker, recorder) = controller(CoverConfig {
            script_entity_id: Some("script.gate_rf".to_string()),
            ..cover_config()
        });
        mc.open();
        assert!(mc.is_moving());
        assert!(invoker.calls().is_empty());
        assert_eq!(mc.state().script_running, None);
        assert_eq!(recorder.last().script_running_entity_id, None);
        assert_eq!(recorder.last().script_configured_entity_id.as_deref(), Some("script.gate_rf"));
    }

    #[test]
    fn test_script_fires_only_for_the_gated_direction() {
        let (mut mc, invoker, _) = controller(CoverConfig {
            close_sensor: Some("binary_sensor.closing".to_string()),
            script_entity_id: Some("script.gate_rf".to_string()),
            ..cover_config()
        });
        mc.open();
        assert!(invoker.calls().is_empty());
        run_to_rest(&mut mc);
        mc.close();
        assert_eq!(invoker.calls(), vec!["script.gate_rf"]);
        assert!(!mc.is_moving());
        assert_eq!(mc.state().script_running.as_deref(), Some("script.gate_rf"));
    }

    #[test]
    fn test_sensor_gated_open_waits_for_confirmation() {
        let (mut mc, invoker, recorder) = controller(gated_config());
        mc.open();
        assert_eq!(invoker.calls(), vec!["script.gate_rf"]);
        assert!(!mc.is_moving());
        assert_eq!(mc.state().pending_start, Some(PendingStart { direction: Direction::Open, target: None }));
        assert_eq!(recorder.last().script_running_entity_id.as_deref(), Some("script.gate_rf"));
        assert_eq!(mc.state().position, 0.0);
        assert_invariants(&mc);

        // ticks without confirmation do nothing
        assert!(!mc.tick());
        assert_eq!(mc.state().position, 0.0);

        mc.handle_open_sensor("on");
        assert!(mc.is_moving());
        assert!(mc.state().pending_start.is_none());
        assert_eq!(mc.state().last_trigger, Some(Trigger::SensorOpen));
        run_to_rest(&mut mc);
        assert_eq!(mc.state().position, 100.0);
        assert!(mc.state().script_running.is_none());
    }

    #[test]
    fn test_inactive_sensor_states_are_ignored() {
        let (mut mc, _, _) = controller(gated_config());
        mc.open();
        mc.handle_open_sensor("off");
        mc.handle_open_sensor("closing");
        mc.handle_open_sensor("unavailable");
        assert!(!mc.is_moving());
        assert!(mc.state().pending_start.is_some());
    }

    #[test]
    fn test_close_sensor_active_states() {
        for state in ["on", "TRUE", "closing", "closed"] {
            let (mut mc, _, _) = controller(gated_config());
            mc.handle_open_sensor("on");
            run_to_rest(&mut mc);
            mc.close();
            mc.handle_close_sensor(state);
            assert!(mc.is_moving(), "state {} should confirm closing", state);
        }
    }

    #[test]
    fn test_unrequested_sensor_edge_drives_full_travel() {
        let (mut mc, invoker, _) = controller(gated_config());
        mc.handle_open_sensor("opening");
        assert!(mc.is_moving());
        assert_eq!(mc.state().phase, Phase::Opening);
        run_to_rest(&mut mc);
        assert_eq!(mc.state().position, 100.0);
        assert!(invoker.calls().is_empty());

        mc.handle_close_sensor("closing");
        run_to_rest(&mut mc);
        assert_eq!(mc.state().position, 0.0);
        assert_eq!(mc.state().phase, Phase::Closed);
    }

    #[test]
    fn test_sensor_reacts_to_edges_only() {
        let (mut mc, _, _) = controller(gated_config());
        mc.handle_open_sensor("on");
        mc.stop();
        let position = mc.state().position;
        // still active, no new edge
        mc.handle_open_sensor("open");
        assert!(!mc.is_moving());
        assert_eq!(mc.state().position, position);
        mc.handle_open_sensor("off");
        mc.handle_open_sensor("on");
        assert!(mc.is_moving());
    }

    #[test]
    fn test_opposite_sensor_clears_pending_start() {
        let (mut mc, _, _) = controller(gated_config());
        mc.open();
        mc.handle_close_sensor("on");
        assert!(mc.state().pending_start.is_none());
        assert_invariants(&mc);
    }

    #[test]
    fn test_close_request_waits_for_close_sensor() {
        let (mut mc, _, _) = controller(gated_config());
        mc.handle_open_sensor("on");
        run_to_rest(&mut mc);
        mc.handle_open_sensor("off");

        mc.close();
        assert_eq!(mc.state().pending_start, Some(PendingStart { direction: Direction::Close, target: None }));
        mc.handle_close_sensor("on");
        run_to_rest(&mut mc);
        assert_eq!(mc.state().position, 0.0);
    }

    #[test]
    fn test_stop_clears_pending_start() {
        let (mut mc, _, _) = controller(gated_config());
        mc.open();
        mc.stop();
        assert!(mc.state().pending_start.is_none());
        assert!(mc.state().script_running.is_none());
        assert_eq!(mc.state().phase, Phase::Closed);
        assert_eq!(mc.state().next_action, NextAction::Open);
    }

    #[test]
    fn test_set_position_same_rounded_position_is_noop() {
        let (mut mc, invoker, recorder) = controller(gated_config());
        let before_state = mc.state().clone();
        let before_count = recorder.count();
        mc.set_position(0);
        assert_eq!(mc.state(), &before_state);
        assert_eq!(recorder.count(), before_count);
        assert!(invoker.calls().is_empty());
    }

    #[test]
    fn test_set_position_bypasses_sensor_gate() {
        let (mut mc, invoker, _) = controller(gated_config());
        mc.set_position(40);
        assert!(mc.is_moving());
        assert!(mc.state().pending_start.is_none());
        run_to_rest(&mut mc);
        assert_eq!(mc.state().position, 40.0);
        assert!(invoker.calls().is_empty());
        // middle band after opening: display closed side, next action reverses
        assert_eq!(mc.state().phase, Phase::Closed);
        assert_eq!(mc.state().next_action, NextAction::Close);
    }

    #[test]
    fn test_set_position_while_moving_retargets() {
        let (mut mc, _, _) = controller(cover_config());
        mc.open();
        for _ in 0..10 {
            mc.tick();
        }
        let epoch = mc.travel_epoch();
        mc.set_position(10);
        assert_eq!(mc.state().phase, Phase::Closing);
        assert_ne!(mc.travel_epoch(), epoch);
        run_to_rest(&mut mc);
        assert_eq!(mc.state().position, 10.0);
    }

    #[test]
    fn test_set_position_clamps_target() {
        let (mut mc, _, _) = controller(cover_config());
        mc.set_position(250);
        run_to_rest(&mut mc);
        assert_eq!(mc.state().position, 100.0);
    }

    #[test]
    fn test_script_failure_is_swallowed() {
        let invoker = RecordingScriptInvoker::failing();
        let mut mc = MotionController::new(gated_config(), Arc::new(invoker.clone()), Box::new(Recorder::default()));
        mc.attach();
        mc.open();
        assert_eq!(invoker.calls().len(), 1);
        assert_eq!(mc.state().pending_start, Some(PendingStart { direction: Direction::Open, target: None }));
        mc.handle_open_sensor("on");
        assert!(mc.is_moving());
    }

    #[test]
    fn test_activate_script_without_sensor_starts_immediately() {
        let (mut mc, invoker, _) = controller(CoverConfig {
            script_entity_id: Some("script.gate_rf".to_string()),
            ..cover_config()
        });
        mc.activate_script();
        assert_eq!(invoker.calls(), vec!["script.gate_rf"]);
        assert!(mc.is_moving());
        assert_eq!(mc.state().phase, Phase::Opening);
        assert_eq!(mc.state().last_trigger, Some(Trigger::Service));
    }

    #[test]
    fn test_activate_script_with_sensor_arms_pending_start() {
        let (mut mc, invoker, _) = controller(gated_config());
        mc.activate_script();
        assert_eq!(invoker.calls().len(), 1);
        assert!(!mc.is_moving());
        assert_eq!(mc.state().pending_start, Some(PendingStart { direction: Direction::Open, target: None }));
        assert_eq!(mc.state().script_running.as_deref(), Some("script.gate_rf"));
    }

    #[test]
    fn test_activate_script_without_script_is_noop() {
        let (mut mc, invoker, recorder) = controller(cover_config());
        let count = recorder.count();
        mc.activate_script();
        assert!(invoker.calls().is_empty());
        assert!(!mc.is_moving());
        assert_eq!(recorder.count(), count);
    }

    #[test]
    fn test_activate_script_while_moving_only_fires_script() {
        let (mut mc, invoker, _) = controller(CoverConfig {
            script_entity_id: Some("script.gate_rf".to_string()),
            ..cover_config()
        });
        mc.set_position(50);
        mc.activate_script();
        assert_eq!(invoker.calls().len(), 1);
        assert!(mc.is_moving());
        assert!(mc.state().pending_start.is_none());
    }

    #[test]
    fn test_handle_sensor_dispatches_by_reference() {
        let (mut mc, _, _) = controller(gated_config());
        mc.handle_sensor("binary_sensor.unrelated", "on");
        assert!(!mc.is_moving());
        mc.handle_sensor("binary_sensor.opening", "on");
        assert_eq!(mc.state().phase, Phase::Opening);
    }

    #[test]
    fn test_every_step_publishes() {
        let (mut mc, _, recorder) = controller(cover_config());
        let start = recorder.count();
        mc.open();
        let ticks = run_to_rest(&mut mc);
        // begin, every in-flight step, then the settled state
        assert_eq!(recorder.count() - start, 1 + ticks + 1);
        let last = recorder.last();
        assert_eq!(last.current_position, 100);
        assert!(!last.is_moving);
        assert_eq!(last.state, Phase::Open);
    }

    #[test]
    fn test_one_second_travel_takes_two_steps() {
        let (mut mc, _, _) = controller(CoverConfig {
            open_duration: 1,
            ..cover_config()
        });
        mc.open();
        // 50% per tick
        assert_eq!(mc.state().position, 50.0);
        assert!(!mc.tick());
        assert_eq!(mc.state().position, 100.0);
    }

    #[test]
    fn test_zero_duration_uses_default_travel() {
        let (mut mc, _, _) = controller(CoverConfig {
            open_duration: 0,
            ..cover_config()
        });
        mc.open();
        assert_eq!(mc.state().position, 2.0);
        assert_eq!(run_to_rest(&mut mc), 49);
    }
}
