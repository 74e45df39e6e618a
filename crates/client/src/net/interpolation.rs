//! Buffers recent snapshots and emits a smoothed render state lagged by a
//! fixed delay (C12).

use orbit::{lerp_angle, Pallet, Planet, Ship, World, MAX_INTERP_BUFFER, MAX_INTERP_BUFFER_MS, MIN_INTERP_BUFFER_MS};

/// `(snapshot, timestamp)`, ordered by timestamp with ties broken by tick.
struct BufferedSnapshot {
    world: World,
    timestamp_ms: u64,
}

pub struct InterpolationBuffer {
    entries: Vec<BufferedSnapshot>,
    buffer_ms: u64,
}

impl InterpolationBuffer {
    pub fn new(buffer_ms: u64) -> Self {
        Self {
            entries: Vec::new(),
            buffer_ms: buffer_ms.clamp(MIN_INTERP_BUFFER_MS, MAX_INTERP_BUFFER_MS),
        }
    }

    pub fn buffer_ms(&self) -> u64 {
        self.buffer_ms
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every buffered snapshot. Used on restart, so stale pre-restart
    /// ticks never get paired against the new world's tick-0 snapshots.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Replace-or-insert by tick, re-sort, then evict per SPEC_FULL.md §4.12:
    /// entries older than `t - buffer_ms` are dropped only while more than
    /// two remain, and the buffer is capped to `MAX_INTERP_BUFFER` entries.
    pub fn add_snapshot(&mut self, world: World, timestamp_ms: u64) {
        if let Some(existing) = self.entries.iter_mut().find(|e| e.world.tick == world.tick) {
            existing.world = world;
            existing.timestamp_ms = timestamp_ms;
        } else {
            self.entries.push(BufferedSnapshot { world, timestamp_ms });
        }

        self.entries
            .sort_by(|a, b| a.timestamp_ms.cmp(&b.timestamp_ms).then(a.world.tick.cmp(&b.world.tick)));

        let cutoff = timestamp_ms.saturating_sub(self.buffer_ms);
        while self.entries.len() > 2 && self.entries[0].timestamp_ms < cutoff {
            self.entries.remove(0);
        }

        while self.entries.len() > MAX_INTERP_BUFFER {
            self.entries.remove(0);
        }
    }

    /// Emit the interpolated render state for `current_time_ms`, or `None`
    /// if the buffer is empty.
    pub fn update(&self, current_time_ms: u64) -> Option<World> {
        match self.entries.len() {
            0 => None,
            1 => Some(self.entries[0].world.clone()),
            _ => {
                let target = current_time_ms as i64 - self.buffer_ms as i64;
                let first = &self.entries[0];
                let last = self.entries.last().expect("len >= 2");

                if target <= first.timestamp_ms as i64 {
                    return Some(first.world.clone());
                }
                if target >= last.timestamp_ms as i64 {
                    return Some(last.world.clone());
                }

                for pair in self.entries.windows(2) {
                    let (older, newer) = (&pair[0], &pair[1]);
                    if (older.timestamp_ms as i64) <= target && target <= newer.timestamp_ms as i64 {
                        let span = (newer.timestamp_ms - older.timestamp_ms).max(1) as f64;
                        let f = ((target - older.timestamp_ms as i64) as f64 / span).clamp(0.0, 1.0);
                        return Some(lerp_world(&older.world, &newer.world, f));
                    }
                }
                Some(last.world.clone())
            }
        }
    }
}

fn lerp_world(older: &World, newer: &World, f: f64) -> World {
    World {
        tick: newer.tick,
        ship: lerp_ship(&older.ship, &newer.ship, f),
        planets: lerp_planets(&older.planets, &newer.planets, f),
        pallets: lerp_pallets(&older.pallets, &newer.pallets, f),
        done: newer.done,
        win: newer.win,
    }
}

fn lerp_ship(older: &Ship, newer: &Ship, f: f64) -> Ship {
    Ship {
        pos: older.pos.lerp(newer.pos, f),
        vel: older.vel.lerp(newer.vel, f),
        rot: lerp_angle(older.rot, newer.rot, f),
        energy: older.energy + (newer.energy - older.energy) * f as f32,
    }
}

/// Lerped by index; radius is taken from `newer` (planets don't move between
/// sides of one world, so index alignment is safe here).
fn lerp_planets(older: &[Planet], newer: &[Planet], f: f64) -> Vec<Planet> {
    newer
        .iter()
        .enumerate()
        .map(|(i, nb)| match older.get(i) {
            Some(na) => Planet {
                pos: na.pos.lerp(nb.pos, f),
                radius: nb.radius,
            },
            None => *nb,
        })
        .collect()
}

/// Matched by id; `active` is discrete and taken from `newer`.
fn lerp_pallets(older: &[Pallet], newer: &[Pallet], f: f64) -> Vec<Pallet> {
    newer
        .iter()
        .map(|nb| match older.iter().find(|pa| pa.id == nb.id) {
            Some(na) => Pallet {
                id: nb.id,
                pos: na.pos.lerp(nb.pos, f),
                active: nb.active,
            },
            None => *nb,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbit::Vec2;

    fn world_with_ship_x(tick: u32, x: f64) -> World {
        let mut world = World::default_initial();
        world.tick = tick;
        world.ship.pos = Vec2::new(x, 0.0);
        world
    }

    #[test]
    fn single_entry_emits_as_is() {
        let mut buf = InterpolationBuffer::new(125);
        buf.add_snapshot(world_with_ship_x(1, 10.0), 0);
        let out = buf.update(50).unwrap();
        assert_eq!(out.ship.pos.x, 10.0);
    }

    #[test]
    fn interpolation_delay_scenario_from_spec() {
        let mut buf = InterpolationBuffer::new(100);
        buf.add_snapshot(world_with_ship_x(1, 10.0), 0);
        buf.add_snapshot(world_with_ship_x(2, 20.0), 100);

        let out = buf.update(150).unwrap();
        assert!((out.ship.pos.x - 15.0).abs() < 1e-9);
    }

    #[test]
    fn target_before_oldest_emits_nearest_endpoint() {
        let mut buf = InterpolationBuffer::new(100);
        buf.add_snapshot(world_with_ship_x(1, 10.0), 1000);
        buf.add_snapshot(world_with_ship_x(2, 20.0), 1100);

        let out = buf.update(0).unwrap();
        assert_eq!(out.ship.pos.x, 10.0);
    }

    #[test]
    fn target_after_newest_emits_nearest_endpoint() {
        let mut buf = InterpolationBuffer::new(100);
        buf.add_snapshot(world_with_ship_x(1, 10.0), 0);
        buf.add_snapshot(world_with_ship_x(2, 20.0), 100);

        let out = buf.update(10_000).unwrap();
        assert_eq!(out.ship.pos.x, 20.0);
    }

    #[test]
    fn replace_existing_tick_instead_of_duplicating() {
        let mut buf = InterpolationBuffer::new(100);
        buf.add_snapshot(world_with_ship_x(1, 10.0), 0);
        buf.add_snapshot(world_with_ship_x(1, 99.0), 0);
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn clear_drops_all_buffered_snapshots() {
        let mut buf = InterpolationBuffer::new(100);
        buf.add_snapshot(world_with_ship_x(1, 10.0), 0);
        buf.add_snapshot(world_with_ship_x(2, 20.0), 100);
        buf.clear();
        assert!(buf.is_empty());
        assert!(buf.update(150).is_none());
    }

    #[test]
    fn buffer_caps_at_max_entries() {
        let mut buf = InterpolationBuffer::new(100);
        for tick in 0..(MAX_INTERP_BUFFER as u32 + 5) {
            buf.add_snapshot(world_with_ship_x(tick, tick as f64), tick as u64 * 10);
        }
        assert_eq!(buf.len(), MAX_INTERP_BUFFER);
    }

    #[test]
    fn buffer_ms_is_clamped_to_documented_range() {
        let buf = InterpolationBuffer::new(10);
        assert_eq!(buf.buffer_ms(), MIN_INTERP_BUFFER_MS);
        let buf = InterpolationBuffer::new(10_000);
        assert_eq!(buf.buffer_ms(), MAX_INTERP_BUFFER_MS);
    }

    #[test]
    fn shortest_arc_angle_interpolation_does_not_snap_at_wraparound() {
        let mut older = World::default_initial();
        older.tick = 1;
        older.ship.rot = 0.1;
        let mut newer = World::default_initial();
        newer.tick = 2;
        newer.ship.rot = std::f64::consts::TAU - 0.1;

        let mut buf = InterpolationBuffer::new(100);
        buf.add_snapshot(older, 0);
        buf.add_snapshot(newer, 100);

        let out = buf.update(150).unwrap();
        // Shortest arc from 0.1 to -0.1 (mod 2pi) passes through 0, not pi.
        assert!(out.ship.rot < 0.2 || out.ship.rot > std::f64::consts::TAU - 0.2);
    }
}
