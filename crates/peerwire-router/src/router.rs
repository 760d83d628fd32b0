use std::time::Duration;

use bytes::Bytes;
use futures_core::Stream;
use peerwire_frame::Multipart;
use peerwire_socket::{
    display_identity, generate_identity, Context, Endpoint, MultipartSocket, RouterSocket,
    MAX_IDENTITY_LEN,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::RouterConfig;
use crate::envelope::{seal, unix_now, Envelope};
use crate::error::{Result, RouterError};
use crate::recipient::Recipient;

/// Identity-addressed JSON message endpoint.
///
/// Outgoing messages are wrapped in a `[recipient, json, timestamp]`
/// envelope. Incoming envelopes older than `max_age` are discarded, and the
/// rest are yielded as `(message, sender)` pairs by [`recv`](Self::recv) or
/// the [`messages`](Self::messages) stream.
///
/// The router exclusively owns its socket. Receiving borrows the router
/// mutably, so there is at most one consumer at a time; a consumer that is
/// cancelled or finishes can simply be restarted.
pub struct Router<S = RouterSocket> {
    socket: S,
    identity: Bytes,
    default_recipient: Option<Bytes>,
    max_age: Duration,
}

impl Router<RouterSocket> {
    /// Create a router whose socket runs on `ctx`.
    pub fn new(ctx: &Context, config: RouterConfig) -> Result<Self> {
        let identity = resolve_identity(config.identity.as_deref())?;
        let socket_config = config.socket.clone().with_identity(identity);
        let socket = RouterSocket::new(ctx, socket_config)?;
        Ok(Self::with_socket(socket, config))
    }
}

impl<S: MultipartSocket> Router<S> {
    /// Wrap an existing socket. The router takes the socket's identity;
    /// `config.identity` and `config.socket` are ignored.
    pub fn with_socket(socket: S, config: RouterConfig) -> Self {
        let identity = Bytes::copy_from_slice(socket.identity());
        debug!(
            identity = %display_identity(&identity),
            default_recipient = ?config.default_recipient,
            max_age_secs = config.max_age.as_secs(),
            "router created"
        );
        Self {
            socket,
            identity,
            default_recipient: config.default_recipient.map(Recipient::into_bytes),
            max_age: config.max_age,
        }
    }

    pub fn identity(&self) -> &Bytes {
        &self.identity
    }

    pub fn default_recipient(&self) -> Option<&Bytes> {
        self.default_recipient.as_ref()
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    pub fn socket(&self) -> &S {
        &self.socket
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        self.socket.endpoints()
    }

    /// Bind the socket to `address`.
    pub fn bind(&mut self, address: &str) -> Result<&mut Self> {
        self.socket.bind(address)?;
        Ok(self)
    }

    /// Connect the socket to `address`.
    pub fn connect(&mut self, address: &str) -> Result<&mut Self> {
        self.socket.connect(address)?;
        Ok(self)
    }

    /// Stop the socket once messages already sent have been written, within
    /// the socket's linger window.
    pub async fn shutdown(&self) {
        self.socket.shutdown().await;
    }

    /// Send `message` to the default recipient.
    ///
    /// Fails with [`RouterError::Address`] when the router has no default
    /// recipient; nothing reaches the socket in that case.
    pub fn send<T: Serialize + ?Sized>(&self, message: &T) -> Result<()> {
        self.dispatch(message, None)
    }

    /// Send `message` to `recipient`.
    pub fn send_to<T, R>(&self, message: &T, recipient: R) -> Result<()>
    where
        T: Serialize + ?Sized,
        R: Into<Recipient>,
    {
        self.dispatch(message, Some(recipient.into()))
    }

    fn dispatch<T>(&self, message: &T, recipient: Option<Recipient>) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let recipient = match recipient {
            Some(recipient) => recipient.into_bytes(),
            None => self
                .default_recipient
                .clone()
                .ok_or_else(|| RouterError::Address("no recipient specified".into()))?,
        };

        let envelope = seal(recipient, message, unix_now())?;
        self.socket.send_multipart(envelope)?;
        Ok(())
    }

    /// Receive the next fresh message as dynamic JSON.
    ///
    /// See [`recv_as`](Self::recv_as).
    pub async fn recv(&mut self) -> Option<(Value, Bytes)> {
        self.recv_as().await
    }

    /// Receive the next fresh message, decoded as `T`, with its sender.
    ///
    /// Stale envelopes are dropped silently. Malformed envelopes (wrong frame
    /// count, unparsable timestamp, payload that is not valid JSON or not a
    /// `T`) are dropped with a warning. Returns `None` once the socket has
    /// shut down.
    ///
    /// Cancel-safe: dropping the future before it completes loses no
    /// message.
    pub async fn recv_as<T: DeserializeOwned>(&mut self) -> Option<(T, Bytes)> {
        loop {
            let msg = self.socket.recv_multipart().await?;
            if let Some(accepted) = self.accept(msg, unix_now()) {
                return Some(accepted);
            }
        }
    }

    /// Restartable stream of fresh `(message, sender)` pairs.
    ///
    /// Ends when the socket shuts down.
    pub fn messages(&mut self) -> impl Stream<Item = (Value, Bytes)> + '_ {
        self.messages_as()
    }

    /// Typed variant of [`messages`](Self::messages).
    pub fn messages_as<'a, T>(&'a mut self) -> impl Stream<Item = (T, Bytes)> + 'a
    where
        T: DeserializeOwned + 'a,
    {
        futures_util::stream::unfold(self, |router| async move {
            let next = router.recv_as::<T>().await?;
            Some((next, router))
        })
    }

    fn accept<T: DeserializeOwned>(&self, msg: Multipart, now: i64) -> Option<(T, Bytes)> {
        let envelope = match Envelope::open(msg) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(error = %err, "dropping malformed message");
                return None;
            }
        };
        let sender = display_identity(&envelope.sender);

        if envelope.is_stale(now, self.max_age) {
            debug!(
                %sender,
                age_secs = envelope.age(now),
                max_age_secs = self.max_age.as_secs(),
                "dropping stale message"
            );
            return None;
        }

        match envelope.decode() {
            Ok(message) => Some((message, envelope.sender)),
            Err(err) => {
                warn!(%sender, error = %err, "dropping message with undecodable payload");
                None
            }
        }
    }
}

impl<S> std::fmt::Debug for Router<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("identity", &display_identity(&self.identity))
            .field(
                "default_recipient",
                &self.default_recipient.as_deref().map(display_identity),
            )
            .field("max_age", &self.max_age)
            .finish_non_exhaustive()
    }
}

fn resolve_identity(requested: Option<&str>) -> Result<Bytes> {
    match requested {
        Some(identity) if !identity.is_empty() => {
            if identity.len() > MAX_IDENTITY_LEN {
                return Err(RouterError::Config(format!(
                    "identity is {} bytes; at most {MAX_IDENTITY_LEN} allowed",
                    identity.len()
                )));
            }
            Ok(Bytes::copy_from_slice(identity.as_bytes()))
        }
        _ => Ok(generate_identity()),
    }
}
