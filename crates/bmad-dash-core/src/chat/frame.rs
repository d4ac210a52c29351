//! Classification of decoded frames into token and error signals.

use serde::Deserialize;

/// Prefix every meaningful frame starts with
pub const DATA_PREFIX: &str = "data: ";

/// Payload of one `data:` frame
#[derive(Debug, Default, Deserialize)]
struct StreamFrame {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// What a single frame asks the controller to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamSignal {
    Token(String),
    Error(String),
}

/// Parse one frame candidate.
///
/// Returns `None` for candidates without the `data: ` prefix, for payloads that
/// are not valid JSON, and for objects carrying neither `error` nor `token`.
/// `error` wins when both are present.
pub fn parse_frame(candidate: &str) -> Option<StreamSignal> {
    let payload = candidate.trim_start_matches(['\r', '\n']).strip_prefix(DATA_PREFIX)?;

    let frame: StreamFrame = match serde_json::from_str(payload) {
        Ok(frame) => frame,
        Err(err) => {
            tracing::warn!(error = %err, payload, "skipping malformed chat frame");
            return None;
        }
    };

    if let Some(message) = frame.error {
        Some(StreamSignal::Error(message))
    } else {
        frame.token.map(StreamSignal::Token)
    }
}
