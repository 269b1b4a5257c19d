//! Frame conversions for the WebSocket libraries the bus runs on.
//!
//! The server side speaks [`axum::extract::ws::Message`], the client side
//! [`tokio_tungstenite::tungstenite::Message`]. [`WireMessage`] maps both
//! onto the three things a connection cares about.

use axum::extract::ws;
use tokio_tungstenite::tungstenite;

use super::connection::NO_STATUS_RECEIVED;

/// What a received frame means to a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Application data, as text.
    Text(String),
    /// Close handshake from the peer.
    Close {
        /// WebSocket close code.
        code: u16,
        /// Close reason.
        reason: String,
    },
    /// Ping, pong or raw frame; handled by the library.
    Control,
}

/// A library-specific WebSocket message.
pub trait WireMessage: Sized {
    /// Builds a text frame.
    fn text(text: String) -> Self;

    /// Builds a close frame.
    fn close(code: u16, reason: String) -> Self;

    /// Classifies a received frame. Binary frames are read as lossy UTF-8.
    fn into_inbound(self) -> Inbound;
}

impl WireMessage for ws::Message {
    fn text(text: String) -> Self {
        Self::Text(text.into())
    }

    fn close(code: u16, reason: String) -> Self {
        Self::Close(Some(ws::CloseFrame {
            code,
            reason: reason.into(),
        }))
    }

    fn into_inbound(self) -> Inbound {
        match self {
            Self::Text(text) => Inbound::Text(text.as_str().to_owned()),
            Self::Binary(bytes) => Inbound::Text(String::from_utf8_lossy(&bytes).into_owned()),
            Self::Close(Some(frame)) => Inbound::Close {
                code: frame.code,
                reason: frame.reason.as_str().to_owned(),
            },
            Self::Close(None) => Inbound::Close {
                code: NO_STATUS_RECEIVED,
                reason: String::new(),
            },
            Self::Ping(_) | Self::Pong(_) => Inbound::Control,
        }
    }
}

impl WireMessage for tungstenite::Message {
    fn text(text: String) -> Self {
        Self::Text(text.into())
    }

    fn close(code: u16, reason: String) -> Self {
        Self::Close(Some(tungstenite::protocol::CloseFrame {
            code: code.into(),
            reason: reason.into(),
        }))
    }

    fn into_inbound(self) -> Inbound {
        match self {
            Self::Text(text) => Inbound::Text(text.as_str().to_owned()),
            Self::Binary(bytes) => Inbound::Text(String::from_utf8_lossy(&bytes).into_owned()),
            Self::Close(Some(frame)) => Inbound::Close {
                code: frame.code.into(),
                reason: frame.reason.as_str().to_owned(),
            },
            Self::Close(None) => Inbound::Close {
                code: NO_STATUS_RECEIVED,
                reason: String::new(),
            },
            Self::Ping(_) | Self::Pong(_) | Self::Frame(_) => Inbound::Control,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axum_close_frame_keeps_code_and_reason() {
        let msg = <ws::Message as WireMessage>::close(1000, "done".to_string());
        assert_eq!(
            msg.into_inbound(),
            Inbound::Close {
                code: 1000,
                reason: "done".to_string()
            }
        );
    }

    #[test]
    fn tungstenite_close_frame_keeps_code_and_reason() {
        let msg = <tungstenite::Message as WireMessage>::close(4001, "bye".to_string());
        assert_eq!(
            msg.into_inbound(),
            Inbound::Close {
                code: 4001,
                reason: "bye".to_string()
            }
        );
    }

    #[test]
    fn empty_close_reports_no_status() {
        assert_eq!(
            tungstenite::Message::Close(None).into_inbound(),
            Inbound::Close {
                code: NO_STATUS_RECEIVED,
                reason: String::new()
            }
        );
    }

    #[test]
    fn binary_frames_read_as_text() {
        let msg = ws::Message::Binary(b"eyJpZCI6MX0=".to_vec().into());
        assert_eq!(msg.into_inbound(), Inbound::Text("eyJpZCI6MX0=".to_string()));
    }

    #[test]
    fn pings_are_control() {
        let msg = tungstenite::Message::Ping(Vec::new().into());
        assert_eq!(msg.into_inbound(), Inbound::Control);
    }
}
