use crate::color::{Color, ColorError};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Malformed message: {0}")]
    MalformedMessage(#[from] serde_json::Error),
    #[error(transparent)]
    InvalidColorFormat(#[from] ColorError),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Op {
    Blink,
    Trailing,
    Off,
    On,
    Color,
    Array,
}

/// A validated command, ready to be applied to the animation state.
///
/// Wire format is a JSON object `{"op": "...", "data": ...}`, `data` being
/// ignored for `off` and `on`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Unknown or missing `op`, dropped without touching the state.
    NoOp,
    Blink(u64),
    Trailing(u64),
    Off,
    On,
    SetColor(Color),
    SetArray(Vec<Color>),
}

impl Command {
    pub fn from_payload(payload: &[u8]) -> Result<Self, CommandError> {
        let mut message: Map<String, Value> = serde_json::from_slice(payload)?;

        let op = match message.remove("op").map(serde_json::from_value::<Op>) {
            Some(Ok(op)) => op,
            _ => return Ok(Command::NoOp),
        };
        let data = message.remove("data").unwrap_or(Value::Null);

        let command = match op {
            Op::Blink => Command::Blink(serde_json::from_value(data)?),
            Op::Trailing => Command::Trailing(serde_json::from_value(data)?),
            Op::Off => Command::Off,
            Op::On => Command::On,
            Op::Color => {
                let hex: String = serde_json::from_value(data)?;
                Command::SetColor(hex.parse()?)
            }
            Op::Array => {
                let hexes: Vec<String> = serde_json::from_value(data)?;
                let colors = hexes
                    .iter()
                    .map(|hex| hex.parse())
                    .collect::<Result<Vec<Color>, ColorError>>()?;
                Command::SetArray(colors)
            }
        };

        Ok(command)
    }

    pub fn to_payload(&self) -> Vec<u8> {
        let message = match self {
            Command::NoOp => json!({ "op": "noop" }),
            Command::Blink(delay) => json!({ "op": "blink", "data": delay }),
            Command::Trailing(delay) => json!({ "op": "trailing", "data": delay }),
            Command::Off => json!({ "op": "off" }),
            Command::On => json!({ "op": "on" }),
            Command::SetColor(color) => json!({ "op": "color", "data": color.to_string() }),
            Command::SetArray(colors) => {
                let hexes: Vec<String> = colors.iter().map(Color::to_string).collect();
                json!({ "op": "array", "data": hexes })
            }
        };

        message.to_string().into_bytes()
    }
}
