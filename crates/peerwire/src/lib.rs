//! Identity-addressed asynchronous JSON messaging between peers.
//!
//! Every peer has an identity. Messages are JSON values sent to a peer by
//! identity and received together with the sender's identity; messages that
//! sat in transit for more than 15 seconds are discarded on arrival.
//!
//! # Crate Structure
//!
//! - [`transport`]: endpoint addresses, TCP and Unix socket listeners/streams
//! - [`frame`]: length-prefixed multipart message codec
//! - [`socket`]: identity-routing multipart socket with peer handover
//! - [`router`]: the JSON envelope router (behind the default `router` feature)

/// Re-export transport types.
pub mod transport {
    pub use peerwire_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use peerwire_frame::*;
}

/// Re-export socket types.
pub mod socket {
    pub use peerwire_socket::*;
}

/// Re-export router types (requires `router` feature).
#[cfg(feature = "router")]
pub mod router {
    pub use peerwire_router::*;
}

#[cfg(feature = "router")]
pub use peerwire_router::{Recipient, Router, RouterConfig, RouterError};
pub use peerwire_socket::Context;
