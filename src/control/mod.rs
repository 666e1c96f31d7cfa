//! Control-plane subsystem.
//!
//! # Data Flow
//! ```text
//! CLI (ping / close / stop)
//!     → client.rs (connect, write one line, read one line)
//!     → Unix socket
//!     → server.rs (parse message, reply, trigger shutdown)
//! ```
//!
//! # Design Decisions
//! - One newline-terminated message per connection, one reply
//! - Every connection has a 2 second deadline on both sides
//! - Unknown messages are logged and the connection is closed without a reply

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub mod client;
pub mod server;

pub use client::send_message;
pub use server::ControlServer;

/// Deadline applied to each control connection.
pub const CONNECTION_DEADLINE: Duration = Duration::from_secs(2);

/// Socket file name inside the system temp directory.
pub const SOCKET_FILE_NAME: &str = "redirector.sock";

/// Default control socket location.
pub fn default_socket_path() -> PathBuf {
    std::env::temp_dir().join(SOCKET_FILE_NAME)
}

/// A control-plane request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    /// Liveness check, answered with `PONG`.
    Ping,
    /// Remove the socket file, then shut down.
    Close,
    /// Shut down; the socket file is removed during teardown.
    Stop,
}

impl ControlMessage {
    pub fn as_str(self) -> &'static str {
        match self {
            ControlMessage::Ping => "PING",
            ControlMessage::Close => "CLOSE",
            ControlMessage::Stop => "STOP",
        }
    }

    /// The reply a running server gives.
    pub fn expected_reply(self) -> &'static str {
        match self {
            ControlMessage::Ping => "PONG",
            ControlMessage::Close | ControlMessage::Stop => "OK",
        }
    }
}

impl fmt::Display for ControlMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ControlMessage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "PING" => Ok(ControlMessage::Ping),
            "CLOSE" => Ok(ControlMessage::Close),
            "STOP" => Ok(ControlMessage::Stop),
            other => Err(other.to_string()),
        }
    }
}

/// Error returned by the control client.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("server not running")]
    NotRunning(#[source] std::io::Error),

    #[error("error talking to control socket: {0}")]
    Io(#[from] std::io::Error),

    #[error("control socket did not answer within {0:?}")]
    Timeout(Duration),

    #[error("unexpected response {0:?}")]
    UnexpectedResponse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_trimmed_messages() {
        assert_eq!("PING\n".parse(), Ok(ControlMessage::Ping));
        assert_eq!(" CLOSE ".parse(), Ok(ControlMessage::Close));
        assert_eq!("STOP".parse(), Ok(ControlMessage::Stop));
        assert_eq!("ping".parse::<ControlMessage>(), Err("ping".to_string()));
    }

    #[test]
    fn default_path_is_in_temp_dir() {
        let path = default_socket_path();
        assert!(path.starts_with(std::env::temp_dir()));
        assert!(path.ends_with(SOCKET_FILE_NAME));
    }
}
