//! Process-wide counters surfaced through `/healthz` (C8, §6).
//!
//! Everything here is a plain atomic so recording a sample never blocks a
//! tick or a write pump; `snapshot()` does the one division into an average
//! that callers actually want to read.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

use serde::Serialize;

#[derive(Debug, Default)]
struct RunningAverage {
    total_millis: AtomicU64,
    count: AtomicU64,
}

impl RunningAverage {
    fn record(&self, sample: std::time::Duration) {
        self.total_millis
            .fetch_add(sample.as_millis() as u64, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> AverageStat {
        let count = self.count.load(Ordering::Relaxed);
        let total = self.total_millis.load(Ordering::Relaxed);
        let average_ms = if count == 0 { 0.0 } else { total as f64 / count as f64 };
        AverageStat { average_ms, count }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct AverageStat {
    pub average_ms: f64,
    pub count: u64,
}

/// Shared across every connection's `SessionHandler`; cheap to hand out as
/// `Arc<Metrics>`.
#[derive(Debug, Default)]
pub struct Metrics {
    active_connections: AtomicUsize,
    tick_time: RunningAverage,
    gc_pause: RunningAverage,
    queue_depth: AtomicUsize,
}

impl Metrics {
    pub fn connection_opened(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_tick_time(&self, elapsed: std::time::Duration) {
        self.tick_time.record(elapsed);
    }

    /// No GC in this runtime; recorded as a zero-sample stat so the
    /// `/healthz` shape stays uniform with the spec's documented fields.
    pub fn record_gc_pause(&self, elapsed: std::time::Duration) {
        self.gc_pause.record(elapsed);
    }

    pub fn set_queue_depth(&self, depth: usize) {
        self.queue_depth.store(depth, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            active_connections: self.active_connections.load(Ordering::Relaxed),
            queue_depth: self.queue_depth.load(Ordering::Relaxed),
            tick_time: self.tick_time.snapshot(),
            gc_pause: self.gc_pause.snapshot(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct MetricsSnapshot {
    pub active_connections: usize,
    pub queue_depth: usize,
    pub tick_time: AverageStat,
    pub gc_pause: AverageStat,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_seconds: u64,
    pub metrics: MetricsSnapshot,
}

impl HealthResponse {
    pub fn build(metrics: &Metrics, started_at: Instant) -> Self {
        Self {
            status: "ok",
            uptime_seconds: started_at.elapsed().as_secs(),
            metrics: metrics.snapshot(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_stat_is_zero_before_any_sample() {
        let metrics = Metrics::default();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.tick_time.count, 0);
        assert_eq!(snapshot.tick_time.average_ms, 0.0);
    }

    #[test]
    fn connection_counter_tracks_open_and_close() {
        let metrics = Metrics::default();
        metrics.connection_opened();
        metrics.connection_opened();
        metrics.connection_closed();
        assert_eq!(metrics.snapshot().active_connections, 1);
    }

    #[test]
    fn tick_time_average_reflects_recorded_samples() {
        let metrics = Metrics::default();
        metrics.record_tick_time(std::time::Duration::from_millis(10));
        metrics.record_tick_time(std::time::Duration::from_millis(20));
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.tick_time.count, 2);
        assert!((snapshot.tick_time.average_ms - 15.0).abs() < 1e-9);
    }
}
