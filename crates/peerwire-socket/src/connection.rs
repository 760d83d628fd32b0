use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{Sink, SinkExt, StreamExt};
use peerwire_frame::{FrameError, Multipart, MultipartCodec};
use peerwire_transport::Stream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::SocketConfig;
use crate::greeting::{exchange_greeting, Greeting};
use crate::identity::{display_identity, generate_identity};
use crate::routes::{Registration, RouteTable};

/// Everything a connection task needs from its owning socket.
#[derive(Clone)]
pub(crate) struct ConnectionParams {
    pub local_identity: Bytes,
    pub config: Arc<SocketConfig>,
    pub routes: Arc<RouteTable>,
    pub inbound: mpsc::Sender<Multipart>,
    pub cancel: CancellationToken,
}

/// Drive one connection from greeting to teardown.
///
/// Outbound messages arrive through the routing table; inbound messages get
/// the peer identity prepended and are forwarded whole to the socket's
/// inbound queue. While that queue is full the connection holds one message
/// and stops reading, but keeps writing. Returns when the peer hangs up, a
/// frame error occurs, the route is handed over to a newer connection, or
/// the socket shuts down. On cancellation, messages already queued for the
/// peer are written first (bounded by the socket's `linger`).
pub(crate) async fn run_connection(stream: Stream, origin: String, params: ConnectionParams) {
    let mut framed = Framed::new(stream, MultipartCodec::new(params.config.frame.clone()));
    let local = Greeting::new(params.local_identity.clone());

    let greeting = tokio::select! {
        _ = params.cancel.cancelled() => return,
        result = exchange_greeting(&mut framed, &local, params.config.greeting_timeout) => result,
    };
    let remote = match greeting {
        Ok(remote) => remote,
        Err(err) => {
            warn!(%origin, error = %err, "greeting failed; dropping connection");
            return;
        }
    };

    let identity = if remote.identity.is_empty() {
        generate_identity()
    } else {
        remote.identity
    };
    let peer = display_identity(&identity);

    let conn_cancel = params.cancel.child_token();
    let (outbound_tx, mut outbound_rx) = mpsc::channel(params.config.outbound_capacity.max(1));
    let conn_id = match params.routes.register(
        identity.clone(),
        outbound_tx,
        conn_cancel.clone(),
        params.config.handover,
    ) {
        Registration::Added(id) => {
            info!(%peer, %origin, "peer connected");
            id
        }
        Registration::HandedOver(id) => {
            info!(%peer, %origin, "peer reconnected; routing handed over");
            id
        }
        Registration::Refused => {
            warn!(%peer, %origin, "identity already connected and handover disabled; refusing");
            return;
        }
    };

    let (mut sink, mut source) = framed.split();
    // Received message waiting for room in the socket's inbound queue.
    let mut pending: Option<Multipart> = None;

    loop {
        tokio::select! {
            _ = conn_cancel.cancelled() => {
                debug!(%peer, "connection cancelled");
                linger(&mut sink, &mut outbound_rx, params.config.linger, &peer).await;
                break;
            }
            outbound = outbound_rx.recv() => match outbound {
                Some(msg) => match sink.send(msg).await {
                    Ok(()) => {}
                    Err(err) if is_oversized(&err) => {
                        warn!(%peer, error = %err, "message not encodable; dropped");
                    }
                    Err(err) => {
                        warn!(%peer, error = %err, "send failed; closing connection");
                        break;
                    }
                },
                None => break,
            },
            permit = params.inbound.reserve(), if pending.is_some() => match permit {
                Ok(permit) => {
                    if let Some(msg) = pending.take() {
                        permit.send(msg);
                    }
                }
                Err(_) => {
                    debug!(%peer, "socket closed; dropping connection");
                    break;
                }
            },
            inbound = source.next(), if pending.is_none() => match inbound {
                Some(Ok(mut msg)) => {
                    msg.push_front(identity.clone());
                    match params.inbound.try_send(msg) {
                        Ok(()) => {}
                        Err(TrySendError::Full(msg)) => {
                            trace!(%peer, "inbound queue full; pausing reads");
                            pending = Some(msg);
                        }
                        Err(TrySendError::Closed(_)) => {
                            debug!(%peer, "socket closed; dropping connection");
                            break;
                        }
                    }
                }
                Some(Err(err)) => {
                    warn!(%peer, error = %err, "receive failed; closing connection");
                    break;
                }
                None => {
                    debug!(%peer, "peer closed connection");
                    break;
                }
            },
        }
    }

    params.routes.deregister(&identity, conn_id);
    info!(%peer, "peer disconnected");
}

/// Write whatever is still queued for the peer, for at most `window`.
async fn linger<W>(
    sink: &mut W,
    outbound: &mut mpsc::Receiver<Multipart>,
    window: Duration,
    peer: &str,
) where
    W: Sink<Multipart, Error = FrameError> + Unpin,
{
    outbound.close();
    if window.is_zero() {
        return;
    }

    let flush = async {
        let mut flushed = 0usize;
        while let Some(msg) = outbound.recv().await {
            match sink.send(msg).await {
                Ok(()) => flushed += 1,
                Err(err) if is_oversized(&err) => {}
                Err(err) => return Err(err),
            }
        }
        Ok::<_, FrameError>(flushed)
    };
    match tokio::time::timeout(window, flush).await {
        Ok(Ok(0)) => {}
        Ok(Ok(flushed)) => debug!(%peer, flushed, "flushed queued messages"),
        Ok(Err(err)) => warn!(%peer, error = %err, "flush failed during shutdown"),
        Err(_) => warn!(
            %peer,
            linger_ms = window.as_millis() as u64,
            "linger expired; queued messages discarded"
        ),
    }
}

/// Encoder rejections leave the stream intact; only the message is lost.
fn is_oversized(err: &FrameError) -> bool {
    matches!(
        err,
        FrameError::MessageTooLarge { .. } | FrameError::TooManyParts { .. }
    )
}

#[cfg(test)]
mod tests {
    use peerwire_frame::FrameConfig;
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;

    #[tokio::test]
    async fn linger_skips_unencodable_messages() {
        let (near, far) = tokio::io::duplex(4096);
        let mut sink = FramedWrite::new(
            near,
            MultipartCodec::new(FrameConfig {
                max_message_size: 16,
            }),
        );
        let mut reader = FramedRead::new(far, MultipartCodec::default());

        let (tx, mut rx) = mpsc::channel(4);
        tx.try_send(Multipart::from(vec![Bytes::from(vec![0u8; 64])]))
            .unwrap();
        tx.try_send(Multipart::from([b"ok".as_slice()])).unwrap();
        drop(tx);

        linger(&mut sink, &mut rx, Duration::from_secs(1), "peer").await;
        let received = reader.next().await.unwrap().unwrap();
        assert_eq!(received, Multipart::from([b"ok".as_slice()]));
    }

    #[test]
    fn only_size_errors_spare_the_connection() {
        assert!(is_oversized(&FrameError::MessageTooLarge { size: 2, max: 1 }));
        assert!(is_oversized(&FrameError::TooManyParts { count: 2, max: 1 }));
        assert!(!is_oversized(&FrameError::ConnectionClosed));
    }
}
