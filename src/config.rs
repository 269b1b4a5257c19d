//! Bus configuration loaded from environment variables.
//!
//! All settings come from environment variables (or a `.env` file via
//! `dotenvy`):
//!
//! | Variable               | Default           |
//! |------------------------|-------------------|
//! | `BUS_LISTEN_ADDR`      | `127.0.0.1:24012` |
//! | `BUS_WS_PATH`          | `/`               |
//! | `BUS_MAX_MESSAGE_SIZE` | library default   |
//! | `BUS_MAX_FRAME_SIZE`   | library default   |
//! | `BUS_LOG_JSON`         | `false`           |

use std::net::SocketAddr;

use crate::server::ServerConfig;

/// Default listen address of the relay.
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:24012";

/// Top-level bus configuration.
///
/// Loaded once at startup via [`BusConfig::from_env`].
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Socket address to bind the WebSocket server to.
    pub listen_addr: SocketAddr,

    /// Route on which WebSocket upgrades are accepted.
    pub ws_path: String,

    /// Maximum message size accepted from a peer.
    pub max_message_size: Option<usize>,

    /// Maximum frame size accepted from a peer.
    pub max_frame_size: Option<usize>,

    /// Emit logs as JSON lines instead of human-readable text.
    pub log_json: bool,
}

impl BusConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to defaults when a variable is not set or, for the
    /// optional settings, cannot be parsed.
    ///
    /// # Errors
    ///
    /// Returns an error if `BUS_LISTEN_ADDR` is set but cannot be parsed as
    /// a [`SocketAddr`].
    pub fn from_env() -> Result<Self, std::net::AddrParseError> {
        dotenvy::dotenv().ok();

        let listen_addr: SocketAddr = std::env::var("BUS_LISTEN_ADDR")
            .unwrap_or_else(|_| DEFAULT_LISTEN_ADDR.to_string())
            .parse()?;

        let ws_path = std::env::var("BUS_WS_PATH").unwrap_or_else(|_| "/".to_string());
        let max_message_size = parse_env_opt("BUS_MAX_MESSAGE_SIZE");
        let max_frame_size = parse_env_opt("BUS_MAX_FRAME_SIZE");
        let log_json = parse_env_bool("BUS_LOG_JSON", false);

        Ok(Self {
            listen_addr,
            ws_path,
            max_message_size,
            max_frame_size,
            log_json,
        })
    }

    /// Builds the server options for [`crate::server::start_websocket_server`].
    #[must_use]
    pub fn server_config(&self) -> ServerConfig {
        let mut config = ServerConfig::new(self.listen_addr).with_path(self.ws_path.clone());
        if let Some(size) = self.max_message_size {
            config = config.with_max_message_size(size);
        }
        if let Some(size) = self.max_frame_size {
            config = config.with_max_frame_size(size);
        }
        config
    }
}

/// Parses an environment variable as `T`, returning `None` on missing or
/// invalid values.
fn parse_env_opt<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Parses an environment variable as a boolean. Accepts `"true"`, `"1"`,
/// `"false"`, `"0"` (case-insensitive). Returns `default` otherwise.
fn parse_env_bool(key: &str, default: bool) -> bool {
    parse_bool(std::env::var(key).ok().as_deref(), default)
}

fn parse_bool(value: Option<&str>, default: bool) -> bool {
    match value.map(str::to_ascii_lowercase).as_deref() {
        Some("true" | "1") => true,
        Some("false" | "0") => false,
        _ => default,
    }
}
