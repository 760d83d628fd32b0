//! Identity-routing multipart socket.
//!
//! A [`RouterSocket`] binds and/or connects to any number of endpoints. Every
//! connection starts with a greeting in which both sides announce their
//! identity; afterwards messages are routed by identity:
//!
//! - On send, the first frame names the recipient and is stripped before the
//!   remaining frames are written to that peer's connection.
//! - On receive, the sending peer's identity is prepended as the first frame.
//!
//! A peer that reconnects under a known identity takes over the routing entry
//! ("handover"). Messages for unknown identities are dropped unless the socket
//! is configured as mandatory.

pub mod config;
pub mod context;
pub mod greeting;
pub mod identity;
pub mod socket;
pub mod traits;

mod connection;
mod routes;

pub use config::SocketConfig;
pub use context::Context;
pub use greeting::{Greeting, PROTOCOL_NAME, PROTOCOL_VERSION};
pub use identity::{display_identity, generate_identity, validate_identity, MAX_IDENTITY_LEN};
pub use peerwire_frame::Multipart;
pub use peerwire_transport::{Endpoint, Result, TransportError};
pub use socket::RouterSocket;
pub use traits::MultipartSocket;
