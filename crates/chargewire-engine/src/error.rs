use std::result::Result as StdResult;

use thiserror::Error;

/// Convenient result type for the engine crate.
pub type Result<T> = StdResult<T, Error>;

/// Unified error type for the chargewire engine.
#[derive(Debug, Error)]
pub enum Error {
    /// The UI event channel has been closed by the receiver.
    #[error("UI channel closed")]
    ChannelClosed,
}
