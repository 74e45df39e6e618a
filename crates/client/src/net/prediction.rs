//! Immediate local simulation of outgoing inputs (C10).

use orbit::{step, Input, World, A_MAX, DT, G, PICKUP_RADIUS};

/// Runs `step` once atop the best available base state — predicted if one
/// exists (so consecutive unacked commands chain), else authoritative.
/// History population is the caller's job; this is pure state-in/state-out.
pub fn predict(predicted: Option<&World>, authoritative: Option<&World>, input: Input) -> Option<World> {
    let base = predicted.or(authoritative)?;
    Some(step(base, input, DT, G, A_MAX, PICKUP_RADIUS))
}
