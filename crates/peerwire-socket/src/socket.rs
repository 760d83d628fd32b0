use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use peerwire_frame::{check_message_size, FrameError, Multipart};
use peerwire_transport::{Endpoint, Listener, Result, Stream, TransportError};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::config::SocketConfig;
use crate::connection::{run_connection, ConnectionParams};
use crate::context::Context;
use crate::identity::{display_identity, generate_identity, validate_identity};
use crate::routes::{Dispatch, RouteTable};

const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// Identity-routing multipart socket.
///
/// Exclusively owns its listeners, dialers and connections; dropping the
/// socket (or shutting down its [`Context`]) stops all of them.
pub struct RouterSocket {
    identity: Bytes,
    config: Arc<SocketConfig>,
    routes: Arc<RouteTable>,
    inbound_tx: mpsc::Sender<Multipart>,
    inbound_rx: mpsc::Receiver<Multipart>,
    handle: Handle,
    cancel: CancellationToken,
    tasks: TaskTracker,
    endpoints: Vec<Endpoint>,
}

impl RouterSocket {
    /// Create a socket whose tasks run on the context's runtime.
    pub fn new(ctx: &Context, config: SocketConfig) -> Result<Self> {
        let identity = match &config.identity {
            Some(identity) if !identity.is_empty() => {
                validate_identity(identity)?;
                identity.clone()
            }
            _ => generate_identity(),
        };
        let (inbound_tx, inbound_rx) = mpsc::channel(config.inbound_capacity.max(1));

        debug!(identity = %display_identity(&identity), "created router socket");

        Ok(Self {
            identity,
            config: Arc::new(config),
            routes: Arc::new(RouteTable::default()),
            inbound_tx,
            inbound_rx,
            handle: ctx.handle().clone(),
            cancel: ctx.child_token(),
            tasks: TaskTracker::new(),
            endpoints: Vec::new(),
        })
    }

    /// Identity announced to peers.
    pub fn identity(&self) -> &Bytes {
        &self.identity
    }

    /// Bind to an endpoint and accept peers on it in the background.
    ///
    /// Returns the endpoint actually bound (TCP port 0 is resolved).
    pub fn bind(&mut self, address: &str) -> Result<Endpoint> {
        self.ensure_running()?;
        let endpoint = Endpoint::parse(address)?;
        let listener = {
            let _runtime = self.handle.enter();
            Listener::bind(&endpoint)?
        };
        let bound = listener.local_endpoint().clone();

        let params = self.connection_params();
        let cancel = self.cancel.clone();
        let accept_endpoint = bound.clone();
        let tasks = self.tasks.clone();
        let accept_loop = async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    accepted = listener.accept() => match accepted {
                        Ok((stream, origin)) => {
                            tasks.spawn(run_connection(stream, origin, params.clone()));
                        }
                        Err(err) => {
                            warn!(endpoint = %accept_endpoint, error = %err, "accept failed");
                            tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                        }
                    },
                }
            }
            debug!(endpoint = %accept_endpoint, "listener closed");
        };
        self.tasks.spawn_on(accept_loop, &self.handle);

        info!(
            identity = %display_identity(&self.identity),
            endpoint = %bound,
            "socket bound"
        );
        self.endpoints.push(bound.clone());
        Ok(bound)
    }

    /// Connect to an endpoint in the background.
    ///
    /// The address is validated immediately; the connection itself is
    /// established asynchronously and re-established after every disconnect
    /// (every `reconnect_interval`) until the socket shuts down.
    pub fn connect(&mut self, address: &str) -> Result<()> {
        self.ensure_running()?;
        let endpoint = Endpoint::parse(address)?;

        let params = self.connection_params();
        let cancel = self.cancel.clone();
        let interval = self.config.reconnect_interval;
        let dial_endpoint = endpoint.clone();
        let dial_loop = async move {
            loop {
                let attempt = tokio::select! {
                    _ = cancel.cancelled() => break,
                    attempt = Stream::connect(&dial_endpoint) => attempt,
                };
                match attempt {
                    Ok(stream) => {
                        run_connection(stream, dial_endpoint.to_string(), params.clone()).await;
                    }
                    Err(err) => {
                        debug!(endpoint = %dial_endpoint, error = %err, "connect attempt failed; retrying");
                    }
                }
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
            debug!(endpoint = %dial_endpoint, "dialer stopped");
        };
        self.tasks.spawn_on(dial_loop, &self.handle);

        info!(
            identity = %display_identity(&self.identity),
            %endpoint,
            "socket connecting"
        );
        Ok(())
    }

    /// Route a multipart message. The first frame names the recipient and is
    /// not transmitted.
    ///
    /// Never suspends: the message is queued whole on the peer's connection.
    /// Messages over the frame size limit fail with `MessageTooLarge`.
    /// Unknown recipients and peers whose outbound queue is full are dropped
    /// silently unless the socket is mandatory, in which case
    /// `HostUnreachable` or `QueueFull` is returned.
    pub fn send_multipart(&self, mut msg: Multipart) -> Result<()> {
        self.ensure_running()?;
        let recipient = msg
            .pop_front()
            .ok_or_else(|| TransportError::HostUnreachable("<missing routing frame>".into()))?;
        check_message_size(&msg, self.config.frame.max_message_size).map_err(oversized)?;

        let peer = display_identity(&recipient);
        match self.routes.dispatch(&recipient, msg) {
            Dispatch::Queued => Ok(()),
            Dispatch::NoRoute if self.config.mandatory => {
                Err(TransportError::HostUnreachable(peer))
            }
            Dispatch::NoRoute => {
                debug!(%peer, "no route to peer; dropping message");
                Ok(())
            }
            Dispatch::Full if self.config.mandatory => Err(TransportError::QueueFull(peer)),
            Dispatch::Full => {
                debug!(%peer, "outbound queue full; dropping message");
                Ok(())
            }
        }
    }

    /// Receive the next multipart message; the first frame is the sender's
    /// identity.
    ///
    /// Returns `None` once the socket has shut down. Cancel-safe: dropping
    /// the future never loses a message.
    pub async fn recv_multipart(&mut self) -> Option<Multipart> {
        tokio::select! {
            _ = self.cancel.cancelled() => None,
            msg = self.inbound_rx.recv() => msg,
        }
    }

    /// Identities of currently connected peers, sorted.
    pub fn peers(&self) -> Vec<Bytes> {
        self.routes.identities()
    }

    /// Whether a peer with `identity` is currently connected.
    pub fn has_peer(&self, identity: &[u8]) -> bool {
        self.routes.contains(identity)
    }

    /// Wait until a peer with `identity` is connected.
    ///
    /// Fails with `Shutdown` if the socket stops first. Wrap in
    /// `tokio::time::timeout` to bound the wait.
    pub async fn wait_for_peer(&self, identity: &[u8]) -> Result<()> {
        if self.routes.wait_for(identity, &self.cancel).await {
            Ok(())
        } else {
            Err(TransportError::Shutdown)
        }
    }

    /// Endpoints this socket is bound to.
    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// Stop listeners, dialers and connections. Further operations fail with
    /// `Shutdown`.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Close the socket and wait for its tasks to finish.
    ///
    /// Each connection first writes the messages still queued for its peer,
    /// for at most [`SocketConfig::linger`]. The returned future does not
    /// borrow the socket.
    pub fn shutdown(&self) -> impl Future<Output = ()> + Send + 'static {
        self.cancel.cancel();
        self.tasks.close();
        let tasks = self.tasks.clone();
        async move { tasks.wait().await }
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn ensure_running(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(TransportError::Shutdown);
        }
        Ok(())
    }

    fn connection_params(&self) -> ConnectionParams {
        ConnectionParams {
            local_identity: self.identity.clone(),
            config: Arc::clone(&self.config),
            routes: Arc::clone(&self.routes),
            inbound: self.inbound_tx.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

fn oversized(err: FrameError) -> TransportError {
    match err {
        FrameError::TooManyParts { count, max } => TransportError::TooManyParts { count, max },
        FrameError::MessageTooLarge { size, max } => TransportError::MessageTooLarge { size, max },
        other => TransportError::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, other)),
    }
}

impl Drop for RouterSocket {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for RouterSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterSocket")
            .field("identity", &display_identity(&self.identity))
            .field("endpoints", &self.endpoints)
            .field("peers", &self.routes.identities().len())
            .finish()
    }
}
