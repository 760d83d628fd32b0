//! Endpoint addressing and async stream transports.
//!
//! Provides a unified interface over the stream transports a peerwire socket
//! can ride on:
//! - TCP (`tcp://host:port`)
//! - Unix domain sockets (`ipc:///path/to/socket`, Unix only)
//!
//! This is the lowest layer of peerwire. Everything else builds on top of
//! the [`Stream`] and [`Listener`] types provided here.

pub mod endpoint;
pub mod error;
pub mod listener;
pub mod stream;

pub use endpoint::Endpoint;
pub use error::{Result, TransportError};
pub use listener::Listener;
pub use stream::Stream;
