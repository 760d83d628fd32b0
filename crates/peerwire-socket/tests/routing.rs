use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use peerwire_frame::{Multipart, MultipartCodec};
use peerwire_socket::{Context, Greeting, RouterSocket, SocketConfig, TransportError};
use peerwire_transport::Stream;
use tokio::time::timeout;
use tokio_util::codec::Framed;

const WAIT: Duration = Duration::from_secs(5);

fn socket(ctx: &Context, identity: &'static str) -> RouterSocket {
    RouterSocket::new(ctx, SocketConfig::default().with_identity(identity))
        .expect("socket should be created")
}

fn bind_local(server: &mut RouterSocket) -> String {
    server
        .bind("tcp://127.0.0.1:0")
        .expect("bind should succeed")
        .to_string()
}

async fn recv(socket: &mut RouterSocket) -> Multipart {
    timeout(WAIT, socket.recv_multipart())
        .await
        .expect("message should arrive in time")
        .expect("socket should be open")
}

fn msg(parts: &[&[u8]]) -> Multipart {
    parts.iter().map(|p| Bytes::copy_from_slice(p)).collect()
}

#[tokio::test]
async fn routes_by_identity_in_both_directions() {
    let ctx = Context::current().unwrap();
    let mut server = socket(&ctx, "server");
    let mut client = socket(&ctx, "client");

    let address = bind_local(&mut server);
    client.connect(&address).unwrap();
    timeout(WAIT, client.wait_for_peer(b"server"))
        .await
        .expect("client should see server")
        .unwrap();

    client.send_multipart(msg(&[b"server", b"ping"])).unwrap();
    let received = recv(&mut server).await;
    assert_eq!(received, msg(&[b"client", b"ping"]));

    server.send_multipart(msg(&[b"client", b"pong", b"2"])).unwrap();
    let reply = recv(&mut client).await;
    assert_eq!(reply, msg(&[b"server", b"pong", b"2"]));

    assert_eq!(server.peers(), vec![Bytes::from_static(b"client")]);
    ctx.shutdown();
}

#[tokio::test]
async fn preserves_per_peer_order() {
    let ctx = Context::current().unwrap();
    let mut server = socket(&ctx, "server");
    let mut client = socket(&ctx, "client");

    let address = bind_local(&mut server);
    client.connect(&address).unwrap();
    timeout(WAIT, client.wait_for_peer(b"server"))
        .await
        .unwrap()
        .unwrap();

    for i in 0..100u32 {
        let body = i.to_string();
        client
            .send_multipart(msg(&[b"server", body.as_bytes()]))
            .unwrap();
    }
    for i in 0..100u32 {
        let received = recv(&mut server).await;
        assert_eq!(received.get(1).unwrap().as_ref(), i.to_string().as_bytes());
    }
    ctx.shutdown();
}

#[tokio::test]
async fn unknown_recipient_dropped_or_rejected_when_mandatory() {
    let ctx = Context::current().unwrap();
    let lenient = socket(&ctx, "lenient");
    assert!(lenient.send_multipart(msg(&[b"nobody", b"x"])).is_ok());

    let strict = RouterSocket::new(
        &ctx,
        SocketConfig::default()
            .with_identity("strict")
            .with_mandatory(true),
    )
    .unwrap();
    let err = strict
        .send_multipart(msg(&[b"nobody", b"x"]))
        .unwrap_err();
    assert!(matches!(err, TransportError::HostUnreachable(peer) if peer == "nobody"));

    let err = strict.send_multipart(Multipart::new()).unwrap_err();
    assert!(matches!(err, TransportError::HostUnreachable(_)));
}

#[tokio::test]
async fn malformed_addresses_fail_synchronously() {
    let ctx = Context::current().unwrap();
    let mut s = socket(&ctx, "s");

    assert!(matches!(
        s.connect("not-an-address"),
        Err(TransportError::InvalidAddress { .. })
    ));
    assert!(matches!(
        s.bind("udp://127.0.0.1:1"),
        Err(TransportError::InvalidAddress { .. })
    ));
}

#[tokio::test]
async fn bind_port_in_use_fails() {
    let ctx = Context::current().unwrap();
    let mut first = socket(&ctx, "first");
    let mut second = socket(&ctx, "second");

    let address = bind_local(&mut first);
    assert!(matches!(
        second.bind(&address),
        Err(TransportError::Bind { .. })
    ));
}

#[tokio::test]
async fn reconnecting_identity_takes_over_route() {
    let ctx = Context::current().unwrap();
    let mut server = socket(&ctx, "server");
    let address = bind_local(&mut server);

    let slow_reconnect = SocketConfig::default()
        .with_identity("dup")
        .with_reconnect_interval(Duration::from_secs(60));
    let mut first = RouterSocket::new(&ctx, slow_reconnect.clone()).unwrap();
    first.connect(&address).unwrap();
    timeout(WAIT, server.wait_for_peer(b"dup"))
        .await
        .unwrap()
        .unwrap();

    let mut second = RouterSocket::new(&ctx, slow_reconnect).unwrap();
    second.connect(&address).unwrap();
    timeout(WAIT, second.wait_for_peer(b"server"))
        .await
        .unwrap()
        .unwrap();

    // Once the server reads from the new connection, its route is in place.
    second.send_multipart(msg(&[b"server", b"hello"])).unwrap();
    assert_eq!(recv(&mut server).await, msg(&[b"dup", b"hello"]));

    server.send_multipart(msg(&[b"dup", b"to-newest"])).unwrap();
    assert_eq!(recv(&mut second).await, msg(&[b"server", b"to-newest"]));
    assert!(
        timeout(Duration::from_millis(200), first.recv_multipart())
            .await
            .is_err(),
        "superseded connection must not receive"
    );

    ctx.shutdown();
}

#[tokio::test]
async fn anonymous_peer_is_assigned_an_identity() {
    let ctx = Context::current().unwrap();
    let mut server = socket(&ctx, "server");
    let address = bind_local(&mut server);

    let endpoint = address.parse().unwrap();
    let stream = Stream::connect(&endpoint).await.unwrap();
    let mut framed = Framed::new(stream, MultipartCodec::default());
    framed
        .send(Greeting::new(Bytes::new()).to_multipart())
        .await
        .unwrap();
    let server_greeting = framed.next().await.unwrap().unwrap();
    assert_eq!(server_greeting.get(2).unwrap().as_ref(), b"server");

    framed.send(msg(&[b"anonymous hello"])).await.unwrap();
    let received = recv(&mut server).await;
    let sender = received.get(0).unwrap();
    assert_eq!(sender.len(), 32);
    assert!(sender.iter().all(u8::is_ascii_hexdigit));
    assert_eq!(received.get(1).unwrap().as_ref(), b"anonymous hello");

    ctx.shutdown();
}

#[tokio::test]
async fn context_shutdown_ends_receive_and_rejects_sends() {
    let ctx = Context::current().unwrap();
    let mut server = socket(&ctx, "server");
    bind_local(&mut server);

    let pending = tokio::spawn(async move {
        let received = server.recv_multipart().await;
        (received, server)
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    ctx.shutdown();

    let (received, mut server) = timeout(WAIT, pending).await.unwrap().unwrap();
    assert!(received.is_none());
    assert!(server.is_closed());
    assert!(matches!(
        server.send_multipart(msg(&[b"x", b"y"])),
        Err(TransportError::Shutdown)
    ));
    assert!(matches!(
        server.bind("tcp://127.0.0.1:0"),
        Err(TransportError::Shutdown)
    ));
}

#[tokio::test]
async fn cancelled_receive_loses_nothing() {
    let ctx = Context::current().unwrap();
    let mut server = socket(&ctx, "server");
    let mut client = socket(&ctx, "client");
    let address = bind_local(&mut server);
    client.connect(&address).unwrap();
    timeout(WAIT, client.wait_for_peer(b"server"))
        .await
        .unwrap()
        .unwrap();

    // Abandon a pending receive before anything arrives.
    assert!(
        timeout(Duration::from_millis(50), server.recv_multipart())
            .await
            .is_err()
    );

    client.send_multipart(msg(&[b"server", b"after-cancel"])).unwrap();
    assert_eq!(
        recv(&mut server).await,
        msg(&[b"client", b"after-cancel"])
    );
    ctx.shutdown();
}

#[cfg(unix)]
#[tokio::test]
async fn routes_over_unix_domain_sockets() {
    let dir = std::env::temp_dir().join(format!("pw-sock-ipc-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let address = format!("ipc://{}", dir.join("router.sock").display());

    let ctx = Context::current().unwrap();
    let mut server = socket(&ctx, "server");
    let mut client = socket(&ctx, "client");
    server.bind(&address).unwrap();
    client.connect(&address).unwrap();
    timeout(WAIT, client.wait_for_peer(b"server"))
        .await
        .unwrap()
        .unwrap();

    client.send_multipart(msg(&[b"server", b"over-ipc"])).unwrap();
    assert_eq!(recv(&mut server).await, msg(&[b"client", b"over-ipc"]));

    ctx.shutdown();
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn graceful_shutdown_flushes_queued_messages() {
    let ctx = Context::current().unwrap();
    let mut server = socket(&ctx, "server");
    let mut client = socket(&ctx, "client");
    let address = bind_local(&mut server);
    client.connect(&address).unwrap();
    timeout(WAIT, client.wait_for_peer(b"server"))
        .await
        .unwrap()
        .unwrap();

    for i in 0..20u32 {
        let body = i.to_string();
        client
            .send_multipart(msg(&[b"server", body.as_bytes()]))
            .unwrap();
    }
    timeout(WAIT, client.shutdown()).await.unwrap();
    assert!(client.is_closed());

    for i in 0..20u32 {
        let received = recv(&mut server).await;
        assert_eq!(received.get(1).unwrap().as_ref(), i.to_string().as_bytes());
    }
    ctx.shutdown();
}

#[tokio::test]
async fn oversized_send_fails_and_connection_survives() {
    let ctx = Context::current().unwrap();
    let mut server = socket(&ctx, "server");
    let address = bind_local(&mut server);
    let mut client = RouterSocket::new(
        &ctx,
        SocketConfig::default()
            .with_identity("client")
            .with_max_message_size(64),
    )
    .unwrap();
    client.connect(&address).unwrap();
    timeout(WAIT, client.wait_for_peer(b"server"))
        .await
        .unwrap()
        .unwrap();

    let big = vec![b'x'; 128];
    let err = client
        .send_multipart(msg(&[b"server", big.as_slice()]))
        .unwrap_err();
    assert!(matches!(
        err,
        TransportError::MessageTooLarge { size: 132, max: 64 }
    ));

    client.send_multipart(msg(&[b"server", b"after"])).unwrap();
    assert_eq!(recv(&mut server).await, msg(&[b"client", b"after"]));

    server.send_multipart(msg(&[b"client", b"reply"])).unwrap();
    assert_eq!(recv(&mut client).await, msg(&[b"server", b"reply"]));
    ctx.shutdown();
}

#[tokio::test]
async fn unread_inbound_does_not_block_sending() {
    let ctx = Context::current().unwrap();
    let mut server = socket(&ctx, "server");
    let address = bind_local(&mut server);
    let mut client = RouterSocket::new(
        &ctx,
        SocketConfig::default()
            .with_identity("client")
            .with_inbound_capacity(1),
    )
    .unwrap();
    client.connect(&address).unwrap();
    timeout(WAIT, server.wait_for_peer(b"client"))
        .await
        .unwrap()
        .unwrap();

    // The client never reads these while it keeps sending.
    for i in 0..3u32 {
        let body = i.to_string();
        server
            .send_multipart(msg(&[b"client", body.as_bytes()]))
            .unwrap();
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    for i in 0..5u32 {
        let body = format!("up-{i}");
        client
            .send_multipart(msg(&[b"server", body.as_bytes()]))
            .unwrap();
        assert_eq!(
            recv(&mut server).await,
            msg(&[b"client", body.as_bytes()])
        );
    }

    // Nothing was lost while reads were paused.
    for i in 0..3u32 {
        let received = recv(&mut client).await;
        assert_eq!(received.get(1).unwrap().as_ref(), i.to_string().as_bytes());
    }
    ctx.shutdown();
}

#[tokio::test]
async fn full_outbound_queue_is_reported_when_mandatory() {
    let ctx = Context::current().unwrap();
    let mut server = socket(&ctx, "server");
    let address = bind_local(&mut server);
    let mut strict = RouterSocket::new(
        &ctx,
        SocketConfig::default()
            .with_identity("strict")
            .with_mandatory(true)
            .with_outbound_capacity(1),
    )
    .unwrap();
    strict.connect(&address).unwrap();
    timeout(WAIT, strict.wait_for_peer(b"server"))
        .await
        .unwrap()
        .unwrap();

    // Synchronous sends outpace the connection task on a capacity of one.
    let results: Vec<_> = (0..64u32)
        .map(|i| strict.send_multipart(msg(&[b"server", i.to_string().as_bytes()])))
        .collect();
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(TransportError::QueueFull(peer)) if peer == "server")));
    assert!(results[0].is_ok());

    assert_eq!(recv(&mut server).await, msg(&[b"strict", b"0"]));
    ctx.shutdown();
}
