//! Error handling for the chargewire binary.

use std::{io, result};

use thiserror::Error;

/// Convenient result type for chargewire operations.
pub type Result<T> = result::Result<T, Error>;

/// Errors that end the console.
#[derive(Debug, Error)]
pub enum Error {
    /// Wrapper for standard I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Configuration loading or validation errors.
    #[error("{}", .0.pretty())]
    Config(#[from] config::Error),
    /// Errors surfaced by the push-channel client.
    #[error("Client error: {0}")]
    Client(#[from] chargewire_client::Error),
}
