//! # Hub Protocol
//!
//! The subset of the SignalR JSON hub protocol the notification client speaks.
//!
//! ## Protocol Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      SignalR JSON Hub Protocol                          │
//! │                                                                         │
//! │  HANDSHAKE                                                             │
//! │  ─────────                                                             │
//! │  CLIENT ───► {"protocol":"json","version":1}␞                           │
//! │  SERVER ◄─── {}␞                    (or {"error":"..."}␞)               │
//! │                                                                         │
//! │  PUSH                                                                  │
//! │  ────                                                                  │
//! │  SERVER ───► {"type":1,"target":"ReceiveNotification",                 │
//! │               "arguments":[{...notification...}]}␞                     │
//! │                                                                         │
//! │  KEEPALIVE                                                             │
//! │  ─────────                                                             │
//! │  Both   ◄──► {"type":6}␞                                               │
//! │                                                                         │
//! │  CLOSE                                                                 │
//! │  ─────                                                                 │
//! │  SERVER ───► {"type":7,"error":"...","allowReconnect":true}␞           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Framing
//! Every record is a JSON document followed by the record separator `0x1E`
//! (␞). A single WebSocket text frame may carry several records, and the
//! handshake response may share a frame with the first messages.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ClientError, ClientResult};

/// Terminator of every hub record.
pub const RECORD_SEPARATOR: char = '\u{1e}';

/// Hub protocol name sent in the handshake.
pub const HUB_PROTOCOL: &str = "json";

/// Hub protocol version sent in the handshake.
pub const HUB_PROTOCOL_VERSION: u32 = 1;

/// Server method that announces a new notification.
pub const RECEIVE_NOTIFICATION: &str = "ReceiveNotification";

/// Query parameter carrying the bearer token on WebSocket upgrade.
pub const ACCESS_TOKEN_PARAM: &str = "access_token";

// Message type discriminators
const TYPE_INVOCATION: u8 = 1;
const TYPE_PING: u8 = 6;
const TYPE_CLOSE: u8 = 7;

// =============================================================================
// Framing
// =============================================================================

/// Splits a text frame into its records, dropping the separators.
///
/// Empty records (e.g. the tail after the final separator) are skipped.
pub fn split_records(frame: &str) -> impl Iterator<Item = &str> {
    frame
        .split(RECORD_SEPARATOR)
        .filter(|record| !record.trim().is_empty())
}

/// Appends the record separator to a JSON document.
pub fn encode_record(json: &str) -> String {
    let mut record = String::with_capacity(json.len() + 1);
    record.push_str(json);
    record.push(RECORD_SEPARATOR);
    record
}

// =============================================================================
// Handshake
// =============================================================================

#[derive(Debug, Serialize)]
struct HandshakeRequest<'a> {
    protocol: &'a str,
    version: u32,
}

#[derive(Debug, Deserialize)]
struct HandshakeResponse {
    #[serde(default)]
    error: Option<String>,
}

/// Returns the handshake record the client sends first.
pub fn handshake_request() -> ClientResult<String> {
    let json = serde_json::to_string(&HandshakeRequest {
        protocol: HUB_PROTOCOL,
        version: HUB_PROTOCOL_VERSION,
    })?;
    Ok(encode_record(&json))
}

/// Checks the server's handshake record (without separator).
pub fn parse_handshake_response(record: &str) -> ClientResult<()> {
    let response: HandshakeResponse = serde_json::from_str(record)
        .map_err(|e| ClientError::Handshake(format!("malformed response: {}", e)))?;

    match response.error {
        Some(error) => Err(ClientError::Handshake(error)),
        None => Ok(()),
    }
}

// =============================================================================
// Hub Messages
// =============================================================================

/// A message received from the hub after the handshake.
#[derive(Debug, Clone, PartialEq)]
pub enum HubMessage {
    /// Server invoked a client method.
    Invocation {
        target: String,
        arguments: Vec<Value>,
    },

    /// Keepalive.
    Ping,

    /// Server is closing the connection.
    Close {
        error: Option<String>,
        allow_reconnect: bool,
    },

    /// Any other message type. Not used by this client.
    Other(u8),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawHubMessage {
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    arguments: Vec<Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    allow_reconnect: bool,
}

impl HubMessage {
    /// Parses one record (without separator).
    pub fn parse(record: &str) -> ClientResult<Self> {
        let raw: RawHubMessage = serde_json::from_str(record)?;

        let message = match raw.kind {
            TYPE_INVOCATION => HubMessage::Invocation {
                target: raw.target.unwrap_or_default(),
                arguments: raw.arguments,
            },
            TYPE_PING => HubMessage::Ping,
            TYPE_CLOSE => HubMessage::Close {
                error: raw.error,
                allow_reconnect: raw.allow_reconnect,
            },
            other => HubMessage::Other(other),
        };

        Ok(message)
    }

    /// Returns the type name for logging.
    pub fn type_name(&self) -> &'static str {
        match self {
            HubMessage::Invocation { .. } => "Invocation",
            HubMessage::Ping => "Ping",
            HubMessage::Close { .. } => "Close",
            HubMessage::Other(_) => "Other",
        }
    }
}

/// Returns the keepalive record the client sends.
pub fn ping_record() -> String {
    encode_record(&format!("{{\"type\":{}}}", TYPE_PING))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_split_records() {
        let frame = "{}\u{1e}{\"type\":6}\u{1e}";
        let records: Vec<&str> = split_records(frame).collect();
        assert_eq!(records, vec!["{}", "{\"type\":6}"]);

        assert_eq!(split_records("").count(), 0);
        assert_eq!(split_records("\u{1e}\u{1e}").count(), 0);
    }

    #[test]
    fn test_handshake_request() {
        let request = handshake_request().unwrap();
        assert!(request.ends_with(RECORD_SEPARATOR));

        let body: Value = serde_json::from_str(request.trim_end_matches(RECORD_SEPARATOR)).unwrap();
        assert_eq!(body, json!({ "protocol": "json", "version": 1 }));
    }

    #[test]
    fn test_handshake_response() {
        assert!(parse_handshake_response("{}").is_ok());

        let err = parse_handshake_response(r#"{"error":"Requested protocol 'json' is not available."}"#)
            .unwrap_err();
        assert!(matches!(err, ClientError::Handshake(msg) if msg.contains("not available")));

        assert!(matches!(
            parse_handshake_response("not json"),
            Err(ClientError::Handshake(_))
        ));
    }

    #[test]
    fn test_parse_invocation() {
        let record = json!({
            "type": 1,
            "target": "ReceiveNotification",
            "arguments": [{ "id": 5, "message": "hi", "isRead": false, "createdAt": "2024-05-01T12:00:00Z" }]
        })
        .to_string();

        match HubMessage::parse(&record).unwrap() {
            HubMessage::Invocation { target, arguments } => {
                assert_eq!(target, RECEIVE_NOTIFICATION);
                assert_eq!(arguments.len(), 1);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_parse_invocation_without_arguments() {
        let message = HubMessage::parse(r#"{"type":1,"target":"ReceiveNotification"}"#).unwrap();
        assert_eq!(
            message,
            HubMessage::Invocation {
                target: RECEIVE_NOTIFICATION.into(),
                arguments: vec![],
            }
        );
    }

    #[test]
    fn test_parse_ping_close_and_other() {
        assert_eq!(HubMessage::parse(r#"{"type":6}"#).unwrap(), HubMessage::Ping);

        assert_eq!(
            HubMessage::parse(r#"{"type":7,"error":"server shutting down","allowReconnect":true}"#)
                .unwrap(),
            HubMessage::Close {
                error: Some("server shutting down".into()),
                allow_reconnect: true,
            }
        );

        assert_eq!(
            HubMessage::parse(r#"{"type":7}"#).unwrap(),
            HubMessage::Close {
                error: None,
                allow_reconnect: false,
            }
        );

        assert_eq!(
            HubMessage::parse(r#"{"type":3,"invocationId":"1"}"#).unwrap(),
            HubMessage::Other(3)
        );
    }

    #[test]
    fn test_parse_garbage_is_decode_error() {
        assert!(matches!(
            HubMessage::parse("{\"target\":\"x\"}"),
            Err(ClientError::Decode(_))
        ));
    }

    #[test]
    fn test_ping_record() {
        assert_eq!(ping_record(), "{\"type\":6}\u{1e}");
    }
}
