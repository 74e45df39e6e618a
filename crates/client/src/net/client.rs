//! Client-side half of the wire connection (§4.1, §6). The server owns a
//! single-writer write pump (C7) because many tasks share one socket;
//! mirroring that split here keeps the reader and sender decoupled so the
//! main loop's send cadence never blocks on inbound frames.

use anyhow::{Context, Result};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use orbit::{parse_server_message, ServerMessage};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct ServerWriter {
    sink: SplitSink<Socket, Message>,
}

pub struct ServerReader {
    stream: SplitStream<Socket>,
}

/// Connects and splits into independent writer/reader halves.
pub async fn connect(url: &str) -> Result<(ServerWriter, ServerReader)> {
    let (socket, _response) = tokio_tungstenite::connect_async(url)
        .await
        .with_context(|| format!("connecting to {url}"))?;
    let (sink, stream) = socket.split();
    Ok((ServerWriter { sink }, ServerReader { stream }))
}

impl ServerWriter {
    pub async fn send_input(&mut self, seq: u64, thrust: f32, turn: f32) -> Result<()> {
        let text = serde_json::json!({
            "t": "input",
            "seq": seq,
            "thrust": thrust,
            "turn": turn,
        })
        .to_string();
        self.sink.send(Message::Text(text.into())).await?;
        Ok(())
    }

    pub async fn send_restart(&mut self) -> Result<()> {
        let text = serde_json::json!({"t": "restart"}).to_string();
        self.sink.send(Message::Text(text.into())).await?;
        Ok(())
    }

    pub async fn send_pong(&mut self, payload: tokio_tungstenite::tungstenite::Bytes) -> Result<()> {
        self.sink.send(Message::Pong(payload)).await?;
        Ok(())
    }
}

impl ServerReader {
    /// Waits for the next frame. Pongs are not produced by a well-behaved
    /// server (the client never pings), so only text/ping/close matter
    /// here; binary is rejected the same way the server rejects it.
    pub async fn recv(&mut self) -> Option<Result<ServerFrame>> {
        loop {
            let frame = self.stream.next().await?;
            match frame {
                Ok(Message::Text(text)) => {
                    return Some(
                        parse_server_message(&text)
                            .map(ServerFrame::Message)
                            .map_err(anyhow::Error::from),
                    )
                }
                Ok(Message::Ping(payload)) => return Some(Ok(ServerFrame::Ping(payload))),
                Ok(Message::Binary(_)) => return Some(Err(anyhow::anyhow!("unexpected binary frame"))),
                Ok(Message::Close(_)) => return None,
                Ok(_) => continue,
                Err(err) => return Some(Err(err.into())),
            }
        }
    }
}

pub enum ServerFrame {
    Message(ServerMessage),
    Ping(tokio_tungstenite::tungstenite::Bytes),
}
