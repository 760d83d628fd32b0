//! Identity-addressed JSON message router.
//!
//! A [`Router`] owns one identity-routing socket and speaks a three-frame
//! envelope over it: the peer identity, a JSON payload and the send time in
//! whole Unix seconds. Received envelopes older than the configured
//! `max_age` (15 seconds by default) are discarded; everything else is
//! yielded to the caller as `(message, sender)`.
//!
//! ```no_run
//! use peerwire_router::{Router, RouterConfig};
//! use peerwire_socket::Context;
//! use serde_json::json;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let ctx = Context::current()?;
//! let mut client = Router::new(
//!     &ctx,
//!     RouterConfig::default().with_default_recipient("server"),
//! )?;
//! client.connect("tcp://127.0.0.1:4321")?;
//! client.send(&json!({"q": 1}))?;
//!
//! if let Some((reply, sender)) = client.recv().await {
//!     println!("{reply} from {sender:?}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod envelope;
pub mod error;
pub mod recipient;
pub mod router;

pub use config::{RouterConfig, DEFAULT_MAX_AGE};
pub use envelope::{Envelope, EnvelopeError, ENVELOPE_FRAMES};
pub use error::{Result, RouterError};
pub use recipient::Recipient;
pub use router::Router;
