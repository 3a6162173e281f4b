// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Socket-frame encode/decode helpers.
//!
//! The gateway owes every malformed inbound frame a classified reply:
//! non-JSON (or a structurally invalid payload) is `PARSE_ERROR`, while a
//! well-formed envelope with an unrecognized `type` is `UNKNOWN_TYPE`.
//! [`decode_client`] performs that classification in one place so the
//! gateway never has to inspect serde errors.

use crate::{ClientMessage, ErrorCode, ServerMessage};
use serde_json::Value;
use thiserror::Error;

/// Kind strings accepted from clients, in declaration order.
pub const CLIENT_KINDS: &[&str] = &[
    "input/fader",
    "input/buttonDown",
    "input/buttonUp",
    "input/buttonPress",
    "runtime/subscribeFrames",
    "runtime/unsubscribeFrames",
    "instance/setEnabled",
];

/// Classified decode failure.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Malformed JSON, missing `type`, or an invalid payload for a known
    /// kind.
    #[error("malformed message: {0}")]
    Parse(String),
    /// A syntactically valid envelope naming no known kind.
    #[error("unknown message type `{0}`")]
    UnknownType(String),
}

impl DecodeError {
    /// The protocol error code to reply with.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            DecodeError::Parse(_) => ErrorCode::ParseError,
            DecodeError::UnknownType(_) => ErrorCode::UnknownType,
        }
    }

    /// Renders the failure as an `error` reply message.
    #[must_use]
    pub fn reply(&self) -> ServerMessage {
        ServerMessage::Error {
            code: self.code(),
            message: self.to_string(),
        }
    }
}

/// Decodes one inbound socket frame.
pub fn decode_client(text: &str) -> Result<ClientMessage, DecodeError> {
    let value: Value =
        serde_json::from_str(text).map_err(|err| DecodeError::Parse(err.to_string()))?;
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| DecodeError::Parse("missing `type` field".into()))?;
    if !CLIENT_KINDS.contains(&kind) {
        return Err(DecodeError::UnknownType(kind.to_owned()));
    }
    serde_json::from_value(value).map_err(|err| DecodeError::Parse(err.to_string()))
}

/// Encodes one outbound message as a socket frame.
pub fn encode_server(message: &ServerMessage) -> Result<String, serde_json::Error> {
    serde_json::to_string(message)
}
