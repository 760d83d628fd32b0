use std::time::Duration;

use peerwire_socket::SocketConfig;

use crate::recipient::Recipient;

/// Messages older than this are discarded on receive.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(15);

/// Construction options for a [`Router`](crate::Router).
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Identity announced to peers. Generated when `None` or empty.
    pub identity: Option<String>,
    /// Recipient used by [`Router::send`](crate::Router::send).
    pub default_recipient: Option<Recipient>,
    /// Staleness threshold. A message whose age in whole seconds exceeds it is
    /// dropped.
    pub max_age: Duration,
    /// Options for the underlying socket. Its `identity` is overridden by the
    /// router's.
    pub socket: SocketConfig,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            identity: None,
            default_recipient: None,
            max_age: DEFAULT_MAX_AGE,
            socket: SocketConfig::default(),
        }
    }
}

impl RouterConfig {
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    pub fn with_default_recipient(mut self, recipient: impl Into<Recipient>) -> Self {
        self.default_recipient = Some(recipient.into());
        self
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn with_socket(mut self, socket: SocketConfig) -> Self {
        self.socket = socket;
        self
    }
}
