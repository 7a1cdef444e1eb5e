//! Stream Codec
//!
//! Boundary decoding for the OpenAlgo stream. Each WebSocket text frame
//! carries exactly one JSON object with a `type` discriminator; the codec
//! validates the frame into a typed [`StreamFrame`] and keeps the raw JSON
//! value alongside it, because LTP subscribers receive the raw frame with
//! their update.
//!
//! A codec error never terminates the read loop; the caller logs the error
//! and moves on to the next frame.

use serde_json::Value;

use crate::infrastructure::openalgo::messages::StreamFrame;

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON parsing or field validation failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// The frame has no `type` field.
    #[error("frame is missing a `type` field")]
    MissingKind,

    /// The frame's `type` is not one the client understands.
    #[error("unknown frame kind: {0}")]
    UnknownKind(String),
}

/// A decoded frame plus the raw JSON it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    /// The validated frame.
    pub frame: StreamFrame,
    /// The frame as received.
    pub raw: Value,
}

/// JSON codec for the OpenAlgo stream.
#[derive(Debug, Default, Clone)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode one text frame.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed JSON, a missing or unknown `type`,
    /// or a payload that fails field validation.
    pub fn decode(&self, text: &str) -> Result<Decoded, CodecError> {
        let raw: Value = serde_json::from_str(text)?;

        let kind = raw
            .get("type")
            .and_then(Value::as_str)
            .ok_or(CodecError::MissingKind)?;

        let frame = match kind {
            "ltp" => StreamFrame::Ltp(serde_json::from_value(raw.clone())?),
            "quote" => StreamFrame::Quote(serde_json::from_value(raw.clone())?),
            "depth" => StreamFrame::Depth(serde_json::from_value(raw.clone())?),
            "error" => StreamFrame::Error(serde_json::from_value(raw.clone())?),
            "subscribed" => StreamFrame::Subscribed(serde_json::from_value(raw.clone())?),
            "unsubscribed" => StreamFrame::Unsubscribed(serde_json::from_value(raw.clone())?),
            other => return Err(CodecError::UnknownKind(other.to_string())),
        };

        Ok(Decoded { frame, raw })
    }
}
