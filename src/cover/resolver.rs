// src/cover/resolver.rs - Tolerance band, next-action and capability rules
use super::types::{Capability, Direction, NextAction, Phase};

/// Phase and next action when the position sits inside a tolerance band.
///
/// `position <= tolerance` is fully closed, `position >= 100 - tolerance` fully open.
/// Returns `None` for the middle band, where the caller decides.
pub fn settle_in_band(position: f64, tolerance: f64) -> Option<(Phase, NextAction)> {
    if position <= tolerance {
        Some((Phase::Closed, NextAction::Open))
    } else if position >= 100.0 - tolerance {
        Some((Phase::Open, NextAction::Close))
    } else {
        None
    }
}

/// Display side for the middle band.
pub fn majority_phase(position: f64) -> Phase {
    if position >= 50.0 { Phase::Open } else { Phase::Closed }
}

fn majority_next_action(position: f64) -> NextAction {
    if position >= 50.0 { NextAction::Close } else { NextAction::Open }
}

/// Resolution for a cover at rest with no travel history (attach, idle stop).
pub fn resolve_at_rest(position: f64, tolerance: f64) -> (Phase, NextAction) {
    settle_in_band(position, tolerance)
        .unwrap_or_else(|| (majority_phase(position), majority_next_action(position)))
}

/// Resolution once a travel in `direction` has ended, for any reason.
///
/// In the middle band the next action reverses the direction just travelled.
pub fn resolve_after_travel(position: f64, tolerance: f64, direction: Direction) -> (Phase, NextAction) {
    settle_in_band(position, tolerance)
        .unwrap_or_else(|| (majority_phase(position), direction.reverse().into()))
}

/// Resolution for an explicit stop, given the phase the cover was in.
pub fn resolve_after_stop(position: f64, tolerance: f64, previous: Phase) -> (Phase, NextAction) {
    match previous {
        Phase::Opening => resolve_after_travel(position, tolerance, Direction::Open),
        Phase::Closing => resolve_after_travel(position, tolerance, Direction::Close),
        Phase::Open | Phase::Closed => resolve_at_rest(position, tolerance),
    }
}

/// Controls exposed for a given motion state. Set-position is always available.
pub fn capabilities(is_moving: bool, next_action: NextAction) -> Vec<Capability> {
    if is_moving {
        return vec![Capability::Open, Capability::Close, Capability::Stop, Capability::SetPosition];
    }
    match next_action {
        NextAction::Stop => vec![Capability::Open, Capability::Close, Capability::Stop, Capability::SetPosition],
        NextAction::Open => vec![Capability::Open, Capability::SetPosition],
        NextAction::Close => vec![Capability::Close, Capability::SetPosition],
    }
}
