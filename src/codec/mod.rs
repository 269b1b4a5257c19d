//! Wire codec: JSON wrapped in standard base64.
//!
//! Every frame on the bus is the base64 rendering of a compact JSON
//! document. [`encode`] and [`decode`] are exact inverses for [`Message`].

pub mod message;

use base64::{Engine as _, engine::general_purpose};
use serde::Serialize;
use serde::de::DeserializeOwned;

pub use message::{Message, MessageId};

/// Failure to turn a value into a frame or a frame into a value.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The frame is not valid base64.
    #[error("invalid base64 frame: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The decoded bytes are not valid UTF-8.
    #[error("frame is not utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// JSON (de)serialization failed.
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serializes `value` to JSON and encodes it as base64.
///
/// # Errors
///
/// Returns [`CodecError::Json`] if `value` cannot be serialized.
pub fn encode_json<T: Serialize + ?Sized>(value: &T) -> Result<String, CodecError> {
    let json = serde_json::to_string(value)?;
    Ok(general_purpose::STANDARD.encode(json))
}

/// Decodes a base64 frame and deserializes the JSON inside it.
///
/// # Errors
///
/// Returns a [`CodecError`] if the frame is not base64, not UTF-8, or not
/// JSON matching `T`.
pub fn decode_json<T: DeserializeOwned>(frame: &str) -> Result<T, CodecError> {
    let bytes = general_purpose::STANDARD.decode(frame.trim())?;
    let json = String::from_utf8(bytes)?;
    Ok(serde_json::from_str(&json)?)
}

/// Encodes a [`Message`] into a text frame.
///
/// # Errors
///
/// Returns [`CodecError::Json`] if the payload cannot be serialized.
pub fn encode(message: &Message) -> Result<String, CodecError> {
    encode_json(message)
}

/// Decodes a text frame into a [`Message`].
///
/// # Errors
///
/// Returns a [`CodecError`] if the frame does not hold an encoded message.
pub fn decode(frame: &str) -> Result<Message, CodecError> {
    decode_json(frame)
}
