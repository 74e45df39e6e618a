//! Wire message schemas and validation (C1).
//!
//! Serialization goes through `serde`-derived structs for the shapes that
//! are unambiguous. The one shape that isn't — a snapshot's `sun`-or-`planets`
//! field — is parsed by hand from a `serde_json::Value`, since serde's derive
//! has no way to express "either field, promoted to the same Rust field".
//! Validation is deliberately done against the raw `Value` rather than after
//! a successful typed deserialize, so structural and range failures produce
//! the named [`ProtocolError`] variants the wire error replies describe,
//! rather than an opaque serde error string.

use serde_json::Value;

use crate::error::ProtocolError;
use crate::types::{Pallet, Planet, Ship, Vec2, World};

#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Input { seq: u64, thrust: f32, turn: f32 },
    Restart,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Snapshot {
        tick: u32,
        ship: Ship,
        planets: Vec<Planet>,
        pallets: Vec<Pallet>,
        done: bool,
        win: bool,
        version: Option<u32>,
    },
    Error {
        message: String,
    },
}

/// Wire protocol version tag. Receivers tolerate its absence; its presence
/// beyond logging is ignored (no version negotiation, per the Non-goals).
pub const PROTOCOL_VERSION: u32 = 1;

impl ServerMessage {
    pub fn from_world(world: &World) -> Self {
        ServerMessage::Snapshot {
            tick: world.tick,
            ship: world.ship,
            planets: world.planets.clone(),
            pallets: world.pallets.clone(),
            done: world.done,
            win: world.win,
            version: Some(PROTOCOL_VERSION),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    pub fn encode(&self) -> String {
        let value = match self {
            ServerMessage::Snapshot {
                tick,
                ship,
                planets,
                pallets,
                done,
                win,
                version,
            } => {
                let mut obj = serde_json::json!({
                    "t": "snapshot",
                    "tick": tick,
                    "ship": ship,
                    "pallets": pallets,
                    "done": done,
                    "win": win,
                });
                if let [sun] = planets.as_slice() {
                    obj["sun"] = serde_json::to_value(sun).expect("Planet serializes");
                } else {
                    obj["planets"] = serde_json::to_value(planets).expect("planets serialize");
                }
                if let Some(v) = version {
                    obj["version"] = serde_json::json!(v);
                }
                obj
            }
            ServerMessage::Error { message } => serde_json::json!({
                "t": "error",
                "message": message,
            }),
        };
        value.to_string()
    }

    /// Convert a received snapshot into a [`World`]. Only meaningful on
    /// [`ServerMessage::Snapshot`].
    pub fn into_world(self) -> Option<World> {
        match self {
            ServerMessage::Snapshot {
                tick,
                ship,
                planets,
                pallets,
                done,
                win,
                ..
            } => Some(World {
                tick,
                ship,
                planets,
                pallets,
                done,
                win,
            }),
            ServerMessage::Error { .. } => None,
        }
    }
}

/// Parse and structurally validate one inbound client message (C1).
pub fn parse_client_message(text: &str) -> Result<ClientMessage, ProtocolError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| ProtocolError::MalformedJson(e.to_string()))?;
    let obj = value.as_object().ok_or(ProtocolError::MissingField("t"))?;

    let t = obj
        .get("t")
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingField("t"))?;

    match t {
        "input" => {
            let seq = require_u64(obj, "seq")?;
            if seq == 0 {
                return Err(ProtocolError::InvalidRange("seq"));
            }
            let thrust = require_finite_f32(obj, "thrust")?;
            if !(0.0..=1.0).contains(&thrust) {
                return Err(ProtocolError::InvalidRange("thrust"));
            }
            let turn = require_finite_f32(obj, "turn")?;
            if !(-1.0..=1.0).contains(&turn) {
                return Err(ProtocolError::InvalidRange("turn"));
            }
            Ok(ClientMessage::Input { seq, thrust, turn })
        }
        "restart" => Ok(ClientMessage::Restart),
        other => Err(ProtocolError::UnknownMessageType(other.to_string())),
    }
}

/// Parse and structurally validate one inbound server message (client side).
pub fn parse_server_message(text: &str) -> Result<ServerMessage, ProtocolError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| ProtocolError::MalformedJson(e.to_string()))?;
    let obj = value.as_object().ok_or(ProtocolError::MissingField("t"))?;
    let t = obj
        .get("t")
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingField("t"))?;

    match t {
        "snapshot" => {
            let tick = require_u64(obj, "tick")? as u32;
            let ship = parse_ship(obj.get("ship").ok_or(ProtocolError::MissingField("ship"))?)?;
            let planets = parse_planets(obj)?;
            let pallets = parse_pallets(obj.get("pallets").ok_or(ProtocolError::MissingField("pallets"))?)?;
            let done = obj
                .get("done")
                .and_then(Value::as_bool)
                .ok_or(ProtocolError::MissingField("done"))?;
            let win = obj
                .get("win")
                .and_then(Value::as_bool)
                .ok_or(ProtocolError::MissingField("win"))?;
            let version = obj.get("version").and_then(Value::as_u64).map(|v| v as u32);
            Ok(ServerMessage::Snapshot {
                tick,
                ship,
                planets,
                pallets,
                done,
                win,
                version,
            })
        }
        "error" => {
            let message = obj
                .get("message")
                .and_then(Value::as_str)
                .ok_or(ProtocolError::MissingField("message"))?
                .to_string();
            Ok(ServerMessage::Error { message })
        }
        other => Err(ProtocolError::UnknownMessageType(other.to_string())),
    }
}

fn parse_planets(obj: &serde_json::Map<String, Value>) -> Result<Vec<Planet>, ProtocolError> {
    if let Some(sun) = obj.get("sun") {
        return Ok(vec![parse_planet(sun)?]);
    }
    let planets = obj
        .get("planets")
        .ok_or(ProtocolError::MissingField("sun|planets"))?
        .as_array()
        .ok_or(ProtocolError::InvalidType("planets"))?;
    planets.iter().map(parse_planet).collect()
}

fn parse_planet(value: &Value) -> Result<Planet, ProtocolError> {
    let obj = value.as_object().ok_or(ProtocolError::InvalidType("planet"))?;
    let pos = parse_vec2(obj.get("pos").ok_or(ProtocolError::MissingField("planet.pos"))?)?;
    let radius = require_finite_f32(obj, "radius")?;
    if radius <= 0.0 {
        return Err(ProtocolError::InvalidRange("radius"));
    }
    Ok(Planet { pos, radius })
}

fn parse_pallets(value: &Value) -> Result<Vec<Pallet>, ProtocolError> {
    let arr = value.as_array().ok_or(ProtocolError::InvalidType("pallets"))?;
    arr.iter().map(parse_pallet).collect()
}

fn parse_pallet(value: &Value) -> Result<Pallet, ProtocolError> {
    let obj = value.as_object().ok_or(ProtocolError::InvalidType("pallet"))?;
    let id = require_u64(obj, "id")? as u32;
    if id == 0 {
        return Err(ProtocolError::InvalidRange("id"));
    }
    let pos = parse_vec2(obj.get("pos").ok_or(ProtocolError::MissingField("pallet.pos"))?)?;
    let active = obj
        .get("active")
        .and_then(Value::as_bool)
        .ok_or(ProtocolError::MissingField("active"))?;
    Ok(Pallet { id, pos, active })
}

fn parse_ship(value: &Value) -> Result<Ship, ProtocolError> {
    let obj = value.as_object().ok_or(ProtocolError::InvalidType("ship"))?;
    let pos = parse_vec2(obj.get("pos").ok_or(ProtocolError::MissingField("ship.pos"))?)?;
    let vel = parse_vec2(obj.get("vel").ok_or(ProtocolError::MissingField("ship.vel"))?)?;
    let rot = require_finite_f64(obj, "rot")?;
    let energy = require_finite_f32(obj, "energy")?;
    if !(0.0..=crate::types::MAX_ENERGY).contains(&energy) {
        return Err(ProtocolError::InvalidRange("energy"));
    }
    Ok(Ship { pos, vel, rot, energy })
}

fn parse_vec2(value: &Value) -> Result<Vec2, ProtocolError> {
    let obj = value.as_object().ok_or(ProtocolError::InvalidType("vec2"))?;
    let x = require_finite_f64(obj, "x")?;
    let y = require_finite_f64(obj, "y")?;
    Ok(Vec2::new(x, y))
}

fn require_u64(obj: &serde_json::Map<String, Value>, field: &'static str) -> Result<u64, ProtocolError> {
    obj.get(field)
        .and_then(Value::as_u64)
        .ok_or(ProtocolError::MissingField(field))
}

fn require_finite_f64(obj: &serde_json::Map<String, Value>, field: &'static str) -> Result<f64, ProtocolError> {
    let n = obj.get(field).and_then(Value::as_f64).ok_or(ProtocolError::MissingField(field))?;
    if !n.is_finite() {
        return Err(ProtocolError::NonFinite(field));
    }
    Ok(n)
}

fn require_finite_f32(obj: &serde_json::Map<String, Value>, field: &'static str) -> Result<f32, ProtocolError> {
    let n = require_finite_f64(obj, field)? as f32;
    if !n.is_finite() {
        return Err(ProtocolError::NonFinite(field));
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_input_parses() {
        let msg = parse_client_message(r#"{"t":"input","seq":1,"thrust":0.5,"turn":-0.2}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Input {
                seq: 1,
                thrust: 0.5,
                turn: -0.2
            }
        );
    }

    #[test]
    fn restart_parses() {
        assert_eq!(parse_client_message(r#"{"t":"restart"}"#).unwrap(), ClientMessage::Restart);
    }

    #[test]
    fn zero_seq_is_invalid_range() {
        let err = parse_client_message(r#"{"t":"input","seq":0,"thrust":0.5,"turn":0}"#).unwrap_err();
        assert_eq!(err, ProtocolError::InvalidRange("seq"));
    }

    #[test]
    fn out_of_range_thrust_rejected() {
        let err = parse_client_message(r#"{"t":"input","seq":1,"thrust":1.5,"turn":0}"#).unwrap_err();
        assert_eq!(err, ProtocolError::InvalidRange("thrust"));
    }

    #[test]
    fn unknown_type_rejected() {
        let err = parse_client_message(r#"{"t":"bogus"}"#).unwrap_err();
        assert_eq!(err, ProtocolError::UnknownMessageType("bogus".to_string()));
    }

    #[test]
    fn extra_fields_are_ignored() {
        let msg = parse_client_message(r#"{"t":"input","seq":1,"thrust":0.5,"turn":0,"extra":true}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Input {
                seq: 1,
                thrust: 0.5,
                turn: 0.0
            }
        );
    }

    #[test]
    fn sun_field_promotes_to_single_planet() {
        let world = World::default_initial();
        let encoded = ServerMessage::from_world(&world).encode();
        assert!(encoded.contains("\"sun\""));
        let decoded = parse_server_message(&encoded).unwrap();
        match decoded {
            ServerMessage::Snapshot { planets, .. } => assert_eq!(planets.len(), 1),
            _ => panic!("expected snapshot"),
        }
    }

    #[test]
    fn round_trip_snapshot_is_identity_within_precision() {
        let world = World::default_initial();
        let encoded = ServerMessage::from_world(&world).encode();
        let decoded = parse_server_message(&encoded).unwrap().into_world().unwrap();
        assert_eq!(decoded.tick, world.tick);
        assert_eq!(decoded.ship.pos.x, world.ship.pos.x);
        assert_eq!(decoded.planets.len(), world.planets.len());
    }

    #[test]
    fn non_finite_rejected() {
        let err = parse_client_message(r#"{"t":"input","seq":1,"thrust":"NaN","turn":0}"#);
        assert!(err.is_err());
    }
}
