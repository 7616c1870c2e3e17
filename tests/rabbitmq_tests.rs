//! Tests for the RabbitMQ dialect overlay: bare-`\0` framing, topic
//! subscription bookkeeping, dialect headers, and queue creation through a
//! transient side-connection.

mod common;

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener};
use std::sync::mpsc;
use std::thread;

use common::{connected_rabbit, Outbox, ScriptTransport};
use stomp_mq::rabbitmq::RabbitMqClient;
use stomp_mq::TcpTransport;

const RECEIPT_2: &[u8] = b"RECEIPT\nreceipt-id: receipt-2\ncontent-length: 0\n\n\0";
const RECEIPT_3: &[u8] = b"RECEIPT\nreceipt-id: receipt-3\ncontent-length: 0\n\n\0";

fn test_addr() -> SocketAddr {
    "127.0.0.1:61613".parse().unwrap()
}

async fn rabbit_client(script: &[u8]) -> (RabbitMqClient<ScriptTransport>, Outbox) {
    let (conn, outbox) = connected_rabbit(script).await;
    let client = RabbitMqClient::from_connection(
        conn,
        test_addr(),
        Some("guest".to_string()),
        Some("guest".to_string()),
    );
    (client, outbox)
}

#[tokio::test]
async fn send_carries_content_type() {
    let (mut client, outbox) = rabbit_client(RECEIPT_2).await;

    client.send("work", None, b"hi").await.expect("send failed");

    assert_eq!(
        outbox.text(),
        "SEND\nreceipt: receipt-2\ncontent-length: 2\ndestination: /queue/work\npersistent: true\ncontent-type: application/octet-stream\n\nhi\0\n"
    );
}

#[tokio::test]
async fn topic_send_routes_through_exchange() {
    let (mut client, outbox) = rabbit_client(RECEIPT_2).await;

    client
        .topic_send("news", None, b"flash")
        .await
        .expect("topic_send failed");

    let text = outbox.text();
    assert!(text.contains("destination: /topic/news"));
    assert!(text.contains("exchange: amq.topic"));
    assert!(text.contains("content-type: application/octet-stream"));
}

#[tokio::test]
async fn topic_send_no_ack_is_unconfirmed() {
    let (mut client, outbox) = rabbit_client(b"").await;

    client
        .topic_send_no_ack("news", b"flash")
        .await
        .expect("topic_send_no_ack failed");

    let text = outbox.text();
    assert!(text.contains("persistent: false"));
    assert!(!text.contains("receipt:"));
}

#[tokio::test]
async fn subscribe_queue_declares_durable() {
    let (mut client, outbox) = rabbit_client(RECEIPT_2).await;

    client.subscribe_queue("work").await.expect("subscribe failed");

    assert_eq!(
        outbox.text(),
        "SUBSCRIBE\nreceipt: receipt-2\ndestination: /queue/work\nauto-delete: false\ndurable: true\nack: client\n\n\0\n"
    );
}

#[tokio::test]
async fn subscribe_topic_allocates_id_and_opaque_body() {
    let (mut client, outbox) = rabbit_client(RECEIPT_2).await;

    client.subscribe_topic("news").await.expect("subscribe failed");
    assert_eq!(client.topic_subscription("news"), Some("topic-1"));

    let bytes = outbox.bytes();
    let text = String::from_utf8_lossy(&bytes);
    assert!(text.starts_with(
        "SUBSCRIBE\nreceipt: receipt-2\nexchange: amq.topic\nrouting_key: /topic/news\nid: topic-1\n\n"
    ));

    // The body is a random 16-byte token rendered as base64url: 24 chars,
    // padded, nothing outside the URL-safe alphabet.
    let blank = bytes.windows(2).position(|w| w == b"\n\n").unwrap() + 2;
    let nul = bytes.iter().position(|&b| b == 0).unwrap();
    let body = &bytes[blank..nul];
    assert_eq!(body.len(), 24);
    assert!(body
        .iter()
        .all(|&b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b'='));
}

#[tokio::test]
async fn subscribe_topic_is_idempotent() {
    let (mut client, outbox) = rabbit_client(RECEIPT_2).await;

    client.subscribe_topic("news").await.expect("first subscribe");
    client.subscribe_topic("news").await.expect("second subscribe");

    assert_eq!(outbox.text().matches("SUBSCRIBE").count(), 1);
    assert_eq!(client.topic_subscription("news"), Some("topic-1"));
}

#[tokio::test]
async fn distinct_topics_get_distinct_ids() {
    let mut script = RECEIPT_2.to_vec();
    script.extend_from_slice(RECEIPT_3);
    let (mut client, _) = rabbit_client(&script).await;

    client.subscribe_topic("news").await.expect("first subscribe");
    client.subscribe_topic("sport").await.expect("second subscribe");

    assert_eq!(client.topic_subscription("news"), Some("topic-1"));
    assert_eq!(client.topic_subscription("sport"), Some("topic-2"));
}

#[tokio::test]
async fn unsubscribe_topic_sends_id_and_forgets_mapping() {
    let mut script = RECEIPT_2.to_vec();
    script.extend_from_slice(RECEIPT_3);
    let (mut client, outbox) = rabbit_client(&script).await;

    client.subscribe_topic("news").await.expect("subscribe failed");
    client
        .unsubscribe_topic("news")
        .await
        .expect("unsubscribe failed");

    assert!(outbox.text().contains(
        "UNSUBSCRIBE\nreceipt: receipt-3\ndestination: /topic/news\nid: topic-1\n\n\0\n"
    ));
    assert_eq!(client.topic_subscription("news"), None);

    // A second unsubscribe is a no-op: no more frames, no receipt needed.
    outbox.take();
    client
        .unsubscribe_topic("news")
        .await
        .expect("second unsubscribe failed");
    assert!(outbox.bytes().is_empty());
}

#[tokio::test]
async fn unsubscribe_unknown_topic_is_noop() {
    let (mut client, outbox) = rabbit_client(b"").await;

    client
        .unsubscribe_topic("never-subscribed")
        .await
        .expect("unsubscribe failed");
    assert!(outbox.bytes().is_empty());
}

#[tokio::test]
async fn receive_parses_bare_nul_framing() {
    let (mut client, _) =
        rabbit_client(b"MESSAGE\nmessage-id: m1\ncontent-length: 5\n\nhello\0").await;

    let msg = client.receive_msg().await.expect("receive failed");
    assert_eq!(msg.id, "m1");
    assert_eq!(msg.body, b"hello");
}

// =============================================================================
// Real-TCP tests: connect with prefetch, and queue creation through a
// transient side-connection.
// =============================================================================

/// Read one client frame (terminated by `\0\n`) off a blocking stream.
fn read_client_frame(stream: &mut std::net::TcpStream) -> String {
    let mut frame = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        stream.read_exact(&mut byte).expect("server read failed");
        if byte[0] == 0 {
            break;
        }
        frame.push(byte[0]);
    }
    // Trailing newline after the NUL.
    stream.read_exact(&mut byte).expect("server read failed");
    String::from_utf8(frame).expect("client frame not utf8")
}

fn serve_rabbit_handshake(stream: &mut std::net::TcpStream) -> String {
    let connect = read_client_frame(stream);
    stream
        .write_all(b"CONNECTED\ncontent-length: 0\n\n\0")
        .expect("server write failed");
    stream.flush().expect("server flush failed");
    connect
}

#[tokio::test]
async fn create_queue_uses_transient_side_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let (seen_tx, seen_rx) = mpsc::channel::<String>();

    let server = thread::spawn(move || {
        // Main connection: handshake only.
        let (mut main_stream, _) = listener.accept().unwrap();
        seen_tx.send(serve_rabbit_handshake(&mut main_stream)).unwrap();

        // Side connection: handshake, durable SUBSCRIBE, receipt, teardown.
        let (mut side_stream, _) = listener.accept().unwrap();
        seen_tx.send(serve_rabbit_handshake(&mut side_stream)).unwrap();

        let subscribe = read_client_frame(&mut side_stream);
        seen_tx.send(subscribe).unwrap();
        side_stream
            .write_all(b"RECEIPT\nreceipt-id: receipt-2\ncontent-length: 0\n\n\0")
            .unwrap();
        side_stream.flush().unwrap();

        let disconnect = read_client_frame(&mut side_stream);
        seen_tx.send(disconnect).unwrap();

        // Keep the main connection alive until the client is done with it.
        drop(main_stream);
    });

    let mut client = RabbitMqClient::<TcpTransport>::connect(
        addr,
        Some("guest"),
        Some("secret"),
        Some(5),
    )
    .await
    .expect("connect failed");

    client.create_queue("tasks").await.expect("create_queue failed");
    server.join().unwrap();

    let main_connect = seen_rx.recv().unwrap();
    assert!(main_connect.starts_with("CONNECT\n"));
    assert!(main_connect.contains("login: guest"));
    assert!(main_connect.contains("passcode: secret"));
    assert!(main_connect.contains("prefetch: 5"));

    let side_connect = seen_rx.recv().unwrap();
    assert!(side_connect.contains("login: guest"));
    assert!(side_connect.contains("prefetch: 1"));

    let subscribe = seen_rx.recv().unwrap();
    assert!(subscribe.starts_with("SUBSCRIBE\n"));
    assert!(subscribe.contains("destination: /queue/tasks"));
    assert!(subscribe.contains("auto-delete: false"));
    assert!(subscribe.contains("durable: true"));
    assert!(subscribe.contains("ack: client"));

    let disconnect = seen_rx.recv().unwrap();
    assert!(disconnect.starts_with("DISCONNECT"));
}

#[tokio::test]
async fn connect_without_prefetch_omits_header() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let (seen_tx, seen_rx) = mpsc::channel::<String>();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        seen_tx.send(serve_rabbit_handshake(&mut stream)).unwrap();
    });

    let _client = RabbitMqClient::<TcpTransport>::connect(addr, None, None, None)
        .await
        .expect("connect failed");
    server.join().unwrap();

    let connect = seen_rx.recv().unwrap();
    assert!(!connect.contains("prefetch"));
    assert!(!connect.contains("login"));
}
