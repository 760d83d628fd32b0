use std::time::Duration;

use bytes::Bytes;
use peerwire_frame::FrameConfig;

/// Default capacity of the queue between connection tasks and the consumer.
pub const DEFAULT_INBOUND_CAPACITY: usize = 1024;

/// Default number of messages queued per peer before sends are dropped.
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 1024;

/// Behaviour switches for a [`RouterSocket`](crate::RouterSocket).
#[derive(Debug, Clone)]
pub struct SocketConfig {
    /// Identity announced to peers. Generated when `None` or empty.
    pub identity: Option<Bytes>,
    /// Let a new connection presenting a known identity replace the existing
    /// routing entry. When disabled the newcomer is disconnected instead.
    pub handover: bool,
    /// Fail sends to unknown identities with `HostUnreachable` instead of
    /// dropping them silently.
    pub mandatory: bool,
    /// Time allowed for the identity greeting on a new connection.
    pub greeting_timeout: Duration,
    /// Delay between connection attempts for `connect`ed endpoints.
    pub reconnect_interval: Duration,
    /// How long a graceful shutdown keeps writing messages that are still
    /// queued for a peer.
    pub linger: Duration,
    /// Multipart codec limits.
    pub frame: FrameConfig,
    /// Maximum number of received messages buffered ahead of the consumer.
    /// When full, connections stop reading but keep writing.
    pub inbound_capacity: usize,
    /// Maximum number of messages queued for one peer. Further sends to that
    /// peer are dropped, or fail with `QueueFull` when `mandatory` is set.
    pub outbound_capacity: usize,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            identity: None,
            handover: true,
            mandatory: false,
            greeting_timeout: Duration::from_secs(5),
            reconnect_interval: Duration::from_millis(100),
            linger: Duration::from_secs(1),
            frame: FrameConfig::default(),
            inbound_capacity: DEFAULT_INBOUND_CAPACITY,
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
        }
    }
}

impl SocketConfig {
    pub fn with_identity(mut self, identity: impl Into<Bytes>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    pub fn with_handover(mut self, handover: bool) -> Self {
        self.handover = handover;
        self
    }

    pub fn with_mandatory(mut self, mandatory: bool) -> Self {
        self.mandatory = mandatory;
        self
    }

    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    pub fn with_linger(mut self, linger: Duration) -> Self {
        self.linger = linger;
        self
    }

    pub fn with_max_message_size(mut self, max: usize) -> Self {
        self.frame.max_message_size = max;
        self
    }

    pub fn with_inbound_capacity(mut self, capacity: usize) -> Self {
        self.inbound_capacity = capacity;
        self
    }

    pub fn with_outbound_capacity(mut self, capacity: usize) -> Self {
        self.outbound_capacity = capacity;
        self
    }
}
