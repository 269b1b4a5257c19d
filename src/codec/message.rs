//! The bus message envelope.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Caller-assigned message identifier.
///
/// Either a number or a string, as the peer sent it. Numbers keep their
/// JSON form, so fractional ids such as `0.4242` and ids above `i64::MAX`
/// round-trip unchanged. Comparison is strict: the number `1` never equals
/// the string `"1"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageId {
    /// Numeric identifier.
    Number(serde_json::Number),
    /// String identifier.
    Text(String),
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl MessageId {
    /// Numeric identifier from a float. Returns `None` for NaN and
    /// infinities, which JSON cannot carry.
    #[must_use]
    pub fn from_f64(value: f64) -> Option<Self> {
        serde_json::Number::from_f64(value).map(Self::Number)
    }
}

impl From<serde_json::Number> for MessageId {
    fn from(value: serde_json::Number) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for MessageId {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<u64> for MessageId {
    fn from(value: u64) -> Self {
        Self::Number(value.into())
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MessageId {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// A unit of communication on the bus.
///
/// Requests and responses share this shape; a response is recognised by
/// carrying the same [`MessageId`] as the request it answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Identifier used to correlate replies.
    pub id: MessageId,
    /// Optional free-form type tag, carried through untouched.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Arbitrary structured content.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Message {
    /// Creates an untyped message.
    pub fn new(id: impl Into<MessageId>, payload: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            kind: None,
            payload,
        }
    }

    /// Sets the type tag.
    #[must_use]
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Builds a reply to this message carrying the same identifier.
    #[must_use]
    pub fn reply(&self, payload: serde_json::Value) -> Self {
        Self {
            id: self.id.clone(),
            kind: self.kind.clone(),
            payload,
        }
    }
}
