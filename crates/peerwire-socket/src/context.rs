use peerwire_transport::{Result, TransportError};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Shared transport context.
///
/// Owns the runtime handle that socket tasks are spawned on and a shutdown
/// token. Sockets created from a context stop all their listeners, dialers
/// and connections when [`Context::shutdown`] is called; pending receives
/// then return `None`.
///
/// Cloning is cheap and yields a handle to the same context.
#[derive(Debug, Clone)]
pub struct Context {
    handle: Handle,
    shutdown: CancellationToken,
}

impl Context {
    /// Create a context on the runtime the caller is running in.
    pub fn current() -> Result<Self> {
        let handle = Handle::try_current().map_err(|err| {
            TransportError::Io(std::io::Error::other(format!(
                "no tokio runtime available: {err}"
            )))
        })?;
        Ok(Self::with_handle(handle))
    }

    /// Create a context that spawns socket tasks on an explicit runtime.
    pub fn with_handle(handle: Handle) -> Self {
        Self {
            handle,
            shutdown: CancellationToken::new(),
        }
    }

    /// Runtime handle socket tasks are spawned on.
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Stop every socket created from this context.
    pub fn shutdown(&self) {
        debug!("shutting down transport context");
        self.shutdown.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub(crate) fn child_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }
}
