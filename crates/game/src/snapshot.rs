//! Deep-copied world snapshots keyed by tick, with before/after hooks (C5).

use std::collections::BTreeMap;
use std::time::Instant;

use crate::clock::Clock;
use crate::types::World;

/// A captured World plus the monotonic time it was captured at. Stored
/// worlds are owned by the manager; every hand-out is a fresh clone so
/// callers can never mutate what is stored.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub world: World,
    pub captured_at: Instant,
}

type Hook = Box<dyn Fn(&World) + Send + Sync>;

#[derive(Default)]
pub struct SnapshotManager {
    snapshots: BTreeMap<u32, Snapshot>,
    before_snapshot: Vec<Hook>,
    after_restore: Vec<Hook>,
}

impl SnapshotManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook run, in registration order, just before a world is
    /// captured.
    pub fn on_before_snapshot<F>(&mut self, hook: F)
    where
        F: Fn(&World) + Send + Sync + 'static,
    {
        self.before_snapshot.push(Box::new(hook));
    }

    /// Register a hook run, in registration order, just after a snapshot is
    /// restored.
    pub fn on_after_restore<F>(&mut self, hook: F)
    where
        F: Fn(&World) + Send + Sync + 'static,
    {
        self.after_restore.push(Box::new(hook));
    }

    pub fn capture(&mut self, world: &World, tick: u32, clock: &dyn Clock) -> Snapshot {
        for hook in &self.before_snapshot {
            hook(world);
        }
        let snapshot = Snapshot {
            world: world.clone(),
            captured_at: clock.now(),
        };
        self.snapshots.insert(tick, snapshot.clone());
        snapshot
    }

    /// Returns a fresh clone of the snapshot at `tick`, running
    /// `after_restore` hooks first, or `None` if no snapshot exists there.
    pub fn restore(&self, tick: u32) -> Option<Snapshot> {
        let stored = self.snapshots.get(&tick)?;
        for hook in &self.after_restore {
            hook(&stored.world);
        }
        Some(stored.clone())
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }
}
