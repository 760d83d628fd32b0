use std::future::Future;

use peerwire_frame::Multipart;
use peerwire_transport::{Endpoint, Result};

use crate::socket::RouterSocket;

/// The identity-routing contract a message router is built on.
///
/// - `send_multipart`: the first frame is the recipient identity; the whole
///   message is handed over atomically and never suspends.
/// - `recv_multipart`: suspends until a whole message arrives; the first
///   frame is the sender identity. `None` means the socket has shut down.
///   Implementations must be cancel-safe.
/// - `shutdown`: stops the socket; by default it does nothing.
pub trait MultipartSocket: Send {
    /// Identity announced to peers.
    fn identity(&self) -> &[u8];

    fn bind(&mut self, address: &str) -> Result<()>;

    fn connect(&mut self, address: &str) -> Result<()>;

    fn send_multipart(&self, msg: Multipart) -> Result<()>;

    fn recv_multipart(&mut self) -> impl Future<Output = Option<Multipart>> + Send;

    /// Endpoints this socket is bound to.
    fn endpoints(&self) -> &[Endpoint] {
        &[]
    }

    /// Stop the socket after writing what is still queued for peers.
    fn shutdown(&self) -> impl Future<Output = ()> + Send {
        async {}
    }
}

impl MultipartSocket for RouterSocket {
    fn identity(&self) -> &[u8] {
        RouterSocket::identity(self)
    }

    fn bind(&mut self, address: &str) -> Result<()> {
        RouterSocket::bind(self, address).map(|_| ())
    }

    fn connect(&mut self, address: &str) -> Result<()> {
        RouterSocket::connect(self, address)
    }

    fn send_multipart(&self, msg: Multipart) -> Result<()> {
        RouterSocket::send_multipart(self, msg)
    }

    async fn recv_multipart(&mut self) -> Option<Multipart> {
        RouterSocket::recv_multipart(self).await
    }

    fn endpoints(&self) -> &[Endpoint] {
        RouterSocket::endpoints(self)
    }

    fn shutdown(&self) -> impl Future<Output = ()> + Send {
        RouterSocket::shutdown(self)
    }
}
