//! Single-writer WebSocket connection with ping/pong keepalive (C7).
//!
//! Reads happen on the caller's task via [`ConnectionReader::read_message`].
//! All writes — application messages and pings alike — go through one write
//! pump task so there is never more than one writer per socket, the pattern
//! this workspace's WS gateway reference already uses for its UDS bridge.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::body::Bytes;
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use orbit::ProtocolError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const PONG_WAIT: Duration = Duration::from_secs(orbit::PONG_WAIT_SECS);
pub const PING_PERIOD: Duration = Duration::from_secs(orbit::PING_PERIOD_SECS);
pub const WRITE_DEADLINE: Duration = Duration::from_secs(orbit::WRITE_DEADLINE_SECS);

/// Sole writer handle for one connection. Cheap to clone; every clone shares
/// the same outbound channel and shutdown flag.
#[derive(Clone)]
pub struct Connection {
    outbound: mpsc::Sender<Message>,
    shutdown: Arc<AtomicBool>,
    last_pong_millis: Arc<AtomicU64>,
    started_at: Instant,
}

pub struct ConnectionReader {
    stream: SplitStream<WebSocket>,
}

pub struct ConnectionHandle {
    pub writer_task: JoinHandle<()>,
}

impl Connection {
    /// Split a raw `WebSocket` into a write-pump-backed [`Connection`] and a
    /// [`ConnectionReader`] the caller reads from directly.
    pub fn spawn(socket: WebSocket) -> (Connection, ConnectionReader, ConnectionHandle) {
        let (sink, stream) = socket.split();
        let (tx, rx) = mpsc::channel(orbit::OUT_BUFFER);
        let shutdown = Arc::new(AtomicBool::new(false));
        let started_at = Instant::now();

        let writer_task = tokio::spawn(write_pump(sink, rx, shutdown.clone()));

        let conn = Connection {
            outbound: tx,
            shutdown,
            last_pong_millis: Arc::new(AtomicU64::new(0)),
            started_at,
        };
        (
            conn,
            ConnectionReader { stream },
            ConnectionHandle { writer_task },
        )
    }

    /// Enqueue a text frame to the write pump. Returns an error if the
    /// connection has already been closed; never blocks beyond the bounded
    /// channel's backpressure.
    pub async fn write_message(&self, text: String) -> Result<(), ConnectionError> {
        if self.shutdown.load(Ordering::SeqCst) {
            return Err(ConnectionError::Closed);
        }
        self.outbound
            .send(Message::Text(text.into()))
            .await
            .map_err(|_| ConnectionError::Closed)
    }

    /// Idempotent shutdown: flips the flag (so any racing `write_message`
    /// observes it), best-effort enqueues a close frame, and lets the write
    /// pump drain and exit on its own.
    pub fn close(&self) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.outbound.try_send(Message::Close(Some(CloseFrame {
            code: axum::extract::ws::close_code::NORMAL,
            reason: "session ended".into(),
        })));
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    fn record_pong(&self) {
        let millis = self.started_at.elapsed().as_millis() as u64;
        self.last_pong_millis.store(millis, Ordering::SeqCst);
    }

    /// True once more than `PONG_WAIT` has elapsed since the last observed
    /// pong (or since connection start, if no pong has arrived yet).
    pub fn is_read_deadline_expired(&self) -> bool {
        let last = self.last_pong_millis.load(Ordering::SeqCst);
        let elapsed = self.started_at.elapsed();
        elapsed > PONG_WAIT && elapsed.as_millis() as u64 - last > PONG_WAIT.as_millis() as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    #[error("connection closed")]
    Closed,
}

impl ConnectionReader {
    /// Accept only text frames (C7, §7 `InvalidFrame`). Ping/close are
    /// handled transparently; `Pong` bumps the caller-supplied connection's
    /// read deadline.
    pub async fn read_message(&mut self, conn: &Connection) -> Option<Result<String, ProtocolError>> {
        loop {
            let frame = self.stream.next().await?;
            match frame {
                Ok(Message::Text(text)) => return Some(Ok(text.to_string())),
                Ok(Message::Binary(_)) => return Some(Err(ProtocolError::InvalidFrame)),
                Ok(Message::Pong(_)) => {
                    conn.record_pong();
                    continue;
                }
                Ok(Message::Ping(_)) => continue,
                Ok(Message::Close(_)) => return None,
                Err(_) => return None,
            }
        }
    }
}

/// Sole writer loop. Selects between the outbound queue and a ping ticker;
/// messages take priority, and after any single write the queue is drained
/// before returning to `select!` so a burst of snapshots doesn't wait behind
/// a ping.
async fn write_pump(
    mut sink: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Message>,
    shutdown: Arc<AtomicBool>,
) {
    let mut ping_ticker = tokio::time::interval(PING_PERIOD);
    ping_ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ping_ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            msg = rx.recv() => {
                match msg {
                    Some(msg) => {
                        if send_with_deadline(&mut sink, msg).await.is_err() {
                            break;
                        }
                        while let Ok(more) = rx.try_recv() {
                            if send_with_deadline(&mut sink, more).await.is_err() {
                                shutdown.store(true, Ordering::SeqCst);
                                return;
                            }
                        }
                    }
                    None => break,
                }
            }
            _ = ping_ticker.tick() => {
                if shutdown.load(Ordering::SeqCst) {
                    continue;
                }
                if send_with_deadline(&mut sink, Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
        }
    }
    shutdown.store(true, Ordering::SeqCst);
    let _ = sink.close().await;
}

async fn send_with_deadline(
    sink: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    msg: Message,
) -> Result<(), ()> {
    match tokio::time::timeout(WRITE_DEADLINE, sink.send(msg)).await {
        Ok(Ok(())) => Ok(()),
        _ => Err(()),
    }
}
