//! chargewire client
//!
//! Connects the socket-free engine to a real push channel:
//! - [`Client`]: builder that spawns a session on the current tokio runtime
//! - [`SessionHandle`]: enable, disable, reconnect and read status
//! - [`Driver`]: owns one socket at a time behind the [`Connector`] seam
//!
//! Transport failures never surface as errors to the caller. They show up as
//! phase changes on the session's [`chargewire_engine::StatusStore`].

mod client;
mod driver;
mod error;
mod session;

pub use client::{Client, parse_ws_url};
pub use driver::{
    Connector, Driver, DriverEvent, DriverSignal, Inbound, Socket, WsConnector,
};
pub use error::{Error, Result};
pub use session::SessionHandle;
