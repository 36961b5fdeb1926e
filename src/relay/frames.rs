//! Client-side wire grammar.
//!
//! The first frame of a session must be a JSON handshake. Every later
//! frame is classified opportunistically: a text frame that parses as a
//! complete resize request is control, anything else — binary, plain
//! text, JSON of the wrong shape, malformed resize — is opaque terminal
//! input and must reach the shell byte-identical. Parse attempts never
//! consume or alter the payload.

use axum::extract::ws::Message;
use bytes::Bytes;
use serde::Deserialize;

/// Fallback PTY dimensions when the handshake carries zeroes.
pub const DEFAULT_COLS: u32 = 80;
pub const DEFAULT_ROWS: u32 = 24;

/// Client credentials for the outbound SSH leg. Never persisted.
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSpec {
    pub password: Option<String>,
    pub private_key: Option<String>,
    pub passphrase: Option<String>,
}

// Secrets stay out of Debug output.
impl std::fmt::Debug for AuthSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSpec")
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("private_key", &self.private_key.as_ref().map(|_| "***"))
            .field("passphrase", &self.passphrase.as_ref().map(|_| "***"))
            .finish()
    }
}

/// First-frame payload. Validated once, immutable thereafter.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub server_id: String,
    #[serde(default)]
    pub cols: u32,
    #[serde(default)]
    pub rows: u32,
    #[serde(default)]
    pub auth: AuthSpec,
    #[serde(default)]
    pub token: Option<String>,
}

impl SessionRequest {
    /// PTY dimensions with the zero fallback applied.
    pub fn effective_dims(&self) -> (u32, u32) {
        (
            if self.cols == 0 { DEFAULT_COLS } else { self.cols },
            if self.rows == 0 { DEFAULT_ROWS } else { self.rows },
        )
    }
}

/// Parse the handshake frame. Only a text frame holding valid
/// `SessionRequest` JSON qualifies.
pub fn parse_handshake(msg: &Message) -> Option<SessionRequest> {
    match msg {
        Message::Text(text) => serde_json::from_str(text.as_str()).ok(),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct ResizeFrame {
    #[serde(rename = "type")]
    kind: String,
    rows: u32,
    cols: u32,
}

/// A classified post-handshake frame.
#[derive(Debug, PartialEq)]
pub enum ClientFrame {
    Resize { rows: u32, cols: u32 },
    Data(Bytes),
}

/// Classify a post-handshake frame.
///
/// Returns `None` for transport control frames (ping/pong, close) that
/// carry no session semantics at this layer.
pub fn classify(msg: Message) -> Option<ClientFrame> {
    match msg {
        Message::Text(text) => {
            if let Ok(resize) = serde_json::from_str::<ResizeFrame>(text.as_str()) {
                if resize.kind == "resize" {
                    return Some(ClientFrame::Resize {
                        rows: resize.rows,
                        cols: resize.cols,
                    });
                }
            }
            Some(ClientFrame::Data(Bytes::copy_from_slice(text.as_bytes())))
        }
        Message::Binary(data) => Some(ClientFrame::Data(data)),
        Message::Ping(_) | Message::Pong(_) | Message::Close(_) => None,
    }
}
