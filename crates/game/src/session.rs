//! Session engine: composes the simulation, queue, ticker, and snapshot
//! manager into a single run loop over one authoritative world (C6).

use std::time::Instant;

use crate::clock::{Clock, Ticker};
use crate::queue::CommandQueue;
use crate::sim::step;
use crate::snapshot::{Snapshot, SnapshotManager};
use crate::types::{Input, World, A_MAX, DT, G, PICKUP_RADIUS};

pub struct Session {
    world: World,
    queue: CommandQueue,
    ticker: Ticker,
    snapshots: SnapshotManager,
    running: bool,
}

impl Session {
    pub fn new(world: World, queue: CommandQueue, ticker: Ticker) -> Self {
        Self {
            world,
            queue,
            ticker,
            snapshots: SnapshotManager::new(),
            running: true,
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// The manager holding one captured snapshot per tick this session has
    /// advanced through.
    pub fn snapshots(&self) -> &SnapshotManager {
        &self.snapshots
    }

    /// A fresh deep copy of the world as it stood at `tick`, if captured.
    pub fn restore_snapshot(&self, tick: u32) -> Option<Snapshot> {
        self.snapshots.restore(tick)
    }

    pub fn enqueue(&mut self, seq: u64, input: Input) -> Result<(), crate::error::QueueError> {
        self.queue.enqueue(seq, input)
    }

    /// Number of commands currently buffered ahead of the next tick.
    pub fn queue_size(&self) -> usize {
        self.queue.size()
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Run up to `max_ticks` simulation steps, computed from how much
    /// monotonic time has elapsed since the ticker's last recorded fire.
    /// Stops early if the world becomes `done`.
    pub fn run(&mut self, max_ticks: u32, clock: &dyn Clock) -> u32 {
        if !self.running {
            return 0;
        }

        let now = clock.now();
        let elapsed = now.saturating_duration_since(self.ticker.last_tick());
        if elapsed.is_zero() {
            return 0;
        }
        let interval = self.ticker.interval();
        let mut desired = (elapsed.as_secs_f64() / interval.as_secs_f64()).floor() as u32;
        desired = desired.max(1).min(max_ticks);

        let mut advanced = 0;
        for _ in 0..desired {
            let next_tick_time = self.ticker.last_tick() + interval;
            self.ticker.set_last_tick(next_tick_time);

            let input = self
                .queue
                .dequeue()
                .map(|cmd| cmd.input)
                .unwrap_or(Input::ZERO);

            self.world = step(&self.world, input, DT, G, A_MAX, PICKUP_RADIUS);
            self.snapshots.capture(&self.world, self.world.tick, clock);
            advanced += 1;

            if self.world.done {
                log::debug!(
                    "session reached done=true at tick {} (win={})",
                    self.world.tick,
                    self.world.win
                );
                break;
            }
        }
        advanced
    }
}

/// Convenience constructor: a session over the default initial world, a
/// queue of the documented default capacity, and a 30Hz ticker anchored at
/// `start`.
pub fn new_default_session(start: Instant) -> Session {
    Session::new(
        World::default_initial(),
        CommandQueue::default(),
        Ticker::new(std::time::Duration::from_secs_f64(DT), start),
    )
}
