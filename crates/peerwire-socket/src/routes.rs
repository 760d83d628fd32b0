use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use peerwire_frame::Multipart;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::identity::display_identity;

struct Route {
    conn_id: u64,
    outbound: mpsc::Sender<Multipart>,
    cancel: CancellationToken,
}

/// Identity → connection routing table shared by a socket and its
/// connection tasks.
#[derive(Default)]
pub(crate) struct RouteTable {
    routes: Mutex<HashMap<Bytes, Route>>,
    changed: Notify,
    next_conn_id: AtomicU64,
}

/// Result of registering a freshly greeted connection.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Registration {
    Added(u64),
    /// Replaced an older connection presenting the same identity.
    HandedOver(u64),
    /// Identity already routed and handover is disabled.
    Refused,
}

/// Outcome of queueing a message for a peer.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Dispatch {
    Queued,
    /// The peer's outbound queue is at capacity; the message was dropped.
    Full,
    NoRoute,
}

impl RouteTable {
    fn lock(&self) -> MutexGuard<'_, HashMap<Bytes, Route>> {
        self.routes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn register(
        &self,
        identity: Bytes,
        outbound: mpsc::Sender<Multipart>,
        cancel: CancellationToken,
        handover: bool,
    ) -> Registration {
        let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        let registration = {
            let mut routes = self.lock();
            let registration = match routes.get(&identity) {
                Some(_) if !handover => return Registration::Refused,
                Some(previous) => {
                    debug!(
                        peer = %display_identity(&identity),
                        old_conn = previous.conn_id,
                        new_conn = conn_id,
                        "handing over peer identity"
                    );
                    previous.cancel.cancel();
                    Registration::HandedOver(conn_id)
                }
                None => Registration::Added(conn_id),
            };
            routes.insert(
                identity,
                Route {
                    conn_id,
                    outbound,
                    cancel,
                },
            );
            registration
        };
        self.changed.notify_waiters();
        registration
    }

    /// Remove the route for `identity` if it still belongs to `conn_id`.
    pub(crate) fn deregister(&self, identity: &[u8], conn_id: u64) {
        let removed = {
            let mut routes = self.lock();
            match routes.get(identity) {
                Some(route) if route.conn_id == conn_id => routes.remove(identity).is_some(),
                _ => false,
            }
        };
        if removed {
            self.changed.notify_waiters();
        }
    }

    /// Queue `msg` on the connection routed under `identity` without waiting.
    pub(crate) fn dispatch(&self, identity: &[u8], msg: Multipart) -> Dispatch {
        let routes = self.lock();
        let Some(route) = routes.get(identity) else {
            return Dispatch::NoRoute;
        };
        match route.outbound.try_send(msg) {
            Ok(()) => Dispatch::Queued,
            Err(TrySendError::Full(_)) => Dispatch::Full,
            Err(TrySendError::Closed(_)) => Dispatch::NoRoute,
        }
    }

    pub(crate) fn contains(&self, identity: &[u8]) -> bool {
        self.lock().contains_key(identity)
    }

    pub(crate) fn identities(&self) -> Vec<Bytes> {
        let mut ids: Vec<Bytes> = self.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Wait until `identity` is routable or `cancel` fires.
    ///
    /// Returns `false` on cancellation.
    pub(crate) async fn wait_for(&self, identity: &[u8], cancel: &CancellationToken) -> bool {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.contains(identity) {
                return true;
            }

            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = &mut notified => {}
            }
        }
    }
}
