//! Compares predicted to authoritative; rolls back and replays on
//! divergence (C11).

use orbit::{has_mismatch, step, Input, World, A_MAX, DT, G, PICKUP_RADIUS, RECONCILE_TOLERANCE};

use super::history::CommandHistory;
use super::state::StateManager;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconcileOutcome {
    pub mismatch: bool,
    pub replayed: usize,
}

/// Runs one reconciliation pass against a freshly received authoritative
/// snapshot. See SPEC_FULL.md §4.11 for the exact step order; step 2's
/// confirmation policy is deliberately conservative per the Open Question
/// it resolves (DESIGN.md).
pub fn reconcile(state: &mut StateManager, history: &mut CommandHistory, snapshot: World) -> ReconcileOutcome {
    let snapshot_tick = snapshot.tick;
    state.set_authoritative(snapshot.clone());

    let Some(predicted) = state.predicted().cloned() else {
        history.mark_confirmed_up_to(snapshot_tick as u64);
        return ReconcileOutcome {
            mismatch: false,
            replayed: 0,
        };
    };

    if !has_mismatch(&predicted, &snapshot, RECONCILE_TOLERANCE) {
        for entry in history.unconfirmed() {
            history.mark_confirmed(entry.seq);
        }
        return ReconcileOutcome {
            mismatch: false,
            replayed: 0,
        };
    }

    state.set_predicted(None);
    let unconfirmed = history.unconfirmed();
    let mut replay_state = snapshot;
    for entry in &unconfirmed {
        let input = Input {
            thrust: entry.thrust,
            turn: entry.turn,
        };
        replay_state = step(&replay_state, input, DT, G, A_MAX, PICKUP_RADIUS);
    }
    state.set_predicted(Some(replay_state));

    ReconcileOutcome {
        mismatch: true,
        replayed: unconfirmed.len(),
    }
}
