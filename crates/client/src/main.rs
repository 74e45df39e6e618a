//! Reference client driver. Keyboard capture and rendering are out of
//! scope (SPEC_FULL.md §1 Non-goals); this binary stands in for both with a
//! scripted thrust/turn pattern and periodic log lines, while exercising the
//! real prediction/reconciliation/interpolation pipeline end to end.

mod net;

use std::time::Duration;

use clap::Parser;
use orbit::{Input, ServerMessage};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use net::{
    client::{self, ServerFrame},
    predict, reconcile, ClientConfig, CommandHistory, InterpolationBuffer, StateManager,
};

#[derive(Parser)]
#[command(name = "orbit-client")]
#[command(about = "Reference client for the orbit game server")]
struct Args {
    /// Server websocket URL, e.g. ws://127.0.0.1:8080/ws
    #[arg(short, long)]
    server: Option<String>,

    /// Commands sent per second.
    #[arg(long)]
    rate: Option<u32>,

    /// Render delay applied by the interpolation buffer, in milliseconds.
    #[arg(long)]
    interp_ms: Option<u64>,

    /// Path to a file of `thrust,turn` lines to replay instead of the
    /// built-in synthetic input pattern. Useful for headless smoke tests.
    #[arg(long)]
    script: Option<std::path::PathBuf>,
}

/// Parses a scripted input file: one `thrust,turn` pair per line, blank
/// lines and `#`-prefixed comments ignored.
fn load_script(path: &std::path::Path) -> anyhow::Result<Vec<Input>> {
    let text = std::fs::read_to_string(path)?;
    let mut inputs = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (thrust, turn) = line
            .split_once(',')
            .ok_or_else(|| anyhow::anyhow!("malformed script line: {line}"))?;
        inputs.push(Input {
            thrust: thrust.trim().parse()?,
            turn: turn.trim().parse()?,
        });
    }
    Ok(inputs)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = ClientConfig::default();
    if let Some(server) = args.server {
        config.server_url = server;
    }
    if let Some(rate) = args.rate {
        config.command_rate_hz = rate;
    }
    if let Some(interp_ms) = args.interp_ms {
        config.interpolation_buffer_ms = interp_ms;
    }

    let script = args.script.as_deref().map(load_script).transpose()?;
    if let Some(script) = &script {
        log::info!("replaying {} scripted inputs", script.len());
    }

    log::info!("connecting to {}", config.server_url);
    let (mut writer, mut reader) = client::connect(&config.server_url).await?;

    let (tx, mut rx) = mpsc::channel::<ServerFrame>(64);
    tokio::spawn(async move {
        while let Some(frame) = reader.recv().await {
            match frame {
                Ok(frame) => {
                    if tx.send(frame).await.is_err() {
                        break;
                    }
                }
                Err(err) => {
                    log::warn!("connection error: {err:#}");
                    break;
                }
            }
        }
    });

    let mut history = CommandHistory::new();
    let mut state = StateManager::new();
    let mut interpolation = InterpolationBuffer::new(config.interpolation_buffer_ms);

    let period = Duration::from_secs_f64(1.0 / config.command_rate_hz as f64);
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let started = tokio::time::Instant::now();
    let mut last_render_log = tokio::time::Instant::now();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let seq = history.next_sequence();
                let input = match &script {
                    Some(script) if script.is_empty() => break,
                    Some(script) => script[(seq as usize - 1) % script.len()],
                    None => synthetic_input(seq),
                };
                let now_ms = started.elapsed().as_millis() as u64;

                writer.send_input(seq, input.thrust, input.turn).await?;
                history.add_command(seq, input.thrust, input.turn, now_ms);

                let next_predicted = predict(state.predicted(), state.authoritative(), input);
                state.set_predicted(next_predicted);
            }
            frame = rx.recv() => {
                match frame {
                    Some(ServerFrame::Message(msg @ ServerMessage::Snapshot { .. })) => {
                        if let Some(world) = msg.into_world() {
                            let done = world.done;
                            let now_ms = started.elapsed().as_millis() as u64;
                            interpolation.add_snapshot(world.clone(), now_ms);
                            let outcome = reconcile(&mut state, &mut history, world);
                            if outcome.mismatch {
                                log::debug!("reconciled, replayed {} commands", outcome.replayed);
                            }

                            if done {
                                log::info!("world done, requesting restart");
                                writer.send_restart().await?;
                                history.clear();
                                state.reset();
                                interpolation.clear();
                            }
                        }
                    }
                    Some(ServerFrame::Message(ServerMessage::Error { message })) => {
                        log::warn!("server error: {message}");
                    }
                    Some(ServerFrame::Ping(payload)) => {
                        writer.send_pong(payload).await?;
                    }
                    None => {
                        log::info!("connection closed by server");
                        break;
                    }
                }
            }
        }

        if last_render_log.elapsed() >= Duration::from_secs(1) {
            let now_ms = started.elapsed().as_millis() as u64;
            if let Some(frame) = interpolation.update(now_ms) {
                state.set_interpolated(Some(frame.clone()));
                log::info!(
                    "render tick={} pos=({:.2},{:.2}) energy={:.1} done={}",
                    frame.tick,
                    frame.ship.pos.x,
                    frame.ship.pos.y,
                    frame.ship.energy,
                    frame.done
                );
            }
            last_render_log = tokio::time::Instant::now();
        }
    }

    Ok(())
}

/// Stands in for captured keyboard input: a gentle steady burn with a slow
/// left-right wobble, enough to exercise thrust/turn gating and pallet
/// pickups against a live server.
fn synthetic_input(seq: u64) -> Input {
    let phase = (seq % 120) as f64 / 120.0 * std::f64::consts::TAU;
    Input {
        thrust: 0.6,
        turn: (phase.sin() * 0.5) as f32,
    }
}
