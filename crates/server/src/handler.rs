//! Per-connection bridge: routes inbound messages, drives ticks, and
//! broadcasts snapshots (C8).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use orbit::{
    new_default_session, parse_client_message, ClientMessage, Clock, CommandQueue, Input,
    QueueError, RealClock, ServerMessage, Session, Ticker, World, DT,
};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::connection::Connection;
use crate::metrics::Metrics;

const TICK_PERIOD: Duration = Duration::from_millis(1000 / orbit::TICK_RATE as u64);
const SNAPSHOT_PERIOD: Duration = Duration::from_millis(1000 / orbit::SNAPSHOT_RATE as u64);
const MAX_TICKS_PER_DRIVE: u32 = 10;

pub struct SessionHandler {
    session: Arc<Mutex<Session>>,
    initial_world: World,
    conn: Connection,
    clock: Arc<RealClock>,
    running: Arc<AtomicBool>,
    metrics: Arc<Metrics>,
}

impl SessionHandler {
    pub fn new(conn: Connection, metrics: Arc<Metrics>) -> Self {
        let clock = Arc::new(RealClock);
        let initial_world = World::default_initial();
        let session = new_default_session(clock.now());
        metrics.connection_opened();
        Self {
            session: Arc::new(Mutex::new(session)),
            initial_world,
            conn,
            clock,
            running: Arc::new(AtomicBool::new(true)),
            metrics,
        }
    }

    pub async fn handle_text(&self, text: &str) {
        match parse_client_message(text) {
            Ok(ClientMessage::Input { seq, thrust, turn }) => {
                self.handle_input(seq, Input { thrust, turn }).await;
            }
            Ok(ClientMessage::Restart) => self.handle_restart().await,
            Err(err) => self.send_error(err.to_string()).await,
        }
    }

    async fn handle_input(&self, seq: u64, input: Input) {
        let result = {
            let mut session = self.session.lock().await;
            session.enqueue(seq, input)
        };
        if let Err(err) = result {
            let message = match err {
                QueueError::QueueFull => "queue full",
                QueueError::DuplicateSequence => "duplicate sequence",
                QueueError::StaleSequence => "stale sequence",
            };
            self.send_error(message).await;
        }
        let depth = self.session.lock().await.queue_size();
        self.metrics.set_queue_depth(depth);
    }

    async fn handle_restart(&self) {
        let mut session = self.session.lock().await;
        session.stop();
        *session = Session::new(
            self.initial_world.clone(),
            CommandQueue::default(),
            Ticker::new(Duration::from_secs_f64(DT), self.clock.now()),
        );
        log::info!("session restarted to initial world");
    }

    async fn send_error(&self, message: impl Into<String>) {
        let wire = ServerMessage::error(message).encode();
        let _ = self.conn.write_message(wire).await;
    }

    /// Launch the tick driver and snapshot broadcaster tasks. Both exit once
    /// `stop()` is called or the connection closes.
    pub fn start(self: &Arc<Self>) -> (JoinHandle<()>, JoinHandle<()>) {
        let tick_driver = {
            let handler = self.clone();
            tokio::spawn(async move { handler.run_tick_driver().await })
        };
        let broadcaster = {
            let handler = self.clone();
            tokio::spawn(async move { handler.run_broadcaster().await })
        };
        (tick_driver, broadcaster)
    }

    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            self.metrics.connection_closed();
        }
        self.conn.close();
    }

    async fn run_tick_driver(&self) {
        let mut interval = tokio::time::interval(TICK_PERIOD);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        while self.running.load(Ordering::SeqCst) {
            interval.tick().await;
            let started = std::time::Instant::now();
            let mut session = self.session.lock().await;
            session.run(MAX_TICKS_PER_DRIVE, &*self.clock);
            drop(session);
            self.metrics.record_tick_time(started.elapsed());
        }
    }

    async fn run_broadcaster(&self) {
        let mut interval = tokio::time::interval(SNAPSHOT_PERIOD);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        while self.running.load(Ordering::SeqCst) {
            interval.tick().await;
            let world = {
                let session = self.session.lock().await;
                session.world().clone()
            };
            let wire = ServerMessage::from_world(&world).encode();
            if self.conn.write_message(wire).await.is_err() {
                // Connection gone; the reader loop will notice and stop us.
                continue;
            }
        }
    }
}
