//! Errors raised while talking to the browser over CDP.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CdpError {
    /// Debugging endpoint did not answer or refused the WebSocket upgrade.
    #[error("Browser unreachable: {0}")]
    Unreachable(String),

    #[error("Transport error: {0}")]
    Transport(String),

    /// Error object returned by the browser for a command.
    #[error("CDP error {code}: {message}")]
    Remote { code: i64, message: String },

    #[error("Malformed CDP payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Unexpected CDP response: {0}")]
    Malformed(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("No element matches {0}")]
    NoSuchElement(String),

    /// Exception thrown by evaluated script.
    #[error("Script error: {0}")]
    Script(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    /// The connection or target went away.
    #[error("CDP session closed")]
    Closed,
}

impl From<tokio_tungstenite::tungstenite::Error> for CdpError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        match e {
            tokio_tungstenite::tungstenite::Error::ConnectionClosed
            | tokio_tungstenite::tungstenite::Error::AlreadyClosed => CdpError::Closed,
            other => CdpError::Transport(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for CdpError {
    fn from(e: reqwest::Error) -> Self {
        CdpError::Transport(e.to_string())
    }
}

impl From<url::ParseError> for CdpError {
    fn from(e: url::ParseError) -> Self {
        CdpError::Unreachable(format!("invalid endpoint URL: {}", e))
    }
}
