use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// The main error type for chargewire-client operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The socket failed to connect, or failed while open.
    #[error("WebSocket error: {0}")]
    Transport(String),

    /// The push-channel URL does not parse.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// The push-channel URL is not `ws://` or `wss://`.
    #[error("Unsupported URL scheme '{0}', expected ws or wss")]
    Scheme(String),

    /// The session task has exited.
    #[error("Session has shut down")]
    SessionClosed,
}

/// Convenience type alias for Results using our Error type
pub type Result<T> = StdResult<T, Error>;

impl From<tungstenite::Error> for Error {
    fn from(err: tungstenite::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
