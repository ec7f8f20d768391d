use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use shadow::beacon::{Beacon, HitStore, TRACKING_PAGE};
use shadow::http::connection::Limits;
use shadow::server::listener;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

async fn start(beacon: Arc<Beacon>) -> SocketAddr {
    let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = tcp.local_addr().unwrap();
    tokio::spawn(listener::serve(tcp, Limits::default(), beacon));
    addr
}

fn tracked_beacon() -> Arc<Beacon> {
    Arc::new(Beacon::new(["example.com"], HitStore::in_memory()))
}

/// Reads one response framed by its content-length.
async fn read_response(stream: &mut TcpStream) -> (String, Vec<u8>) {
    let mut buf = Vec::new();
    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let mut chunk = [0u8; 1024];
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before response head");
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8(buf[..head_end].to_vec()).unwrap();
    let length: usize = head
        .lines()
        .find_map(|l| l.strip_prefix("content-length: "))
        .unwrap()
        .parse()
        .unwrap();

    let mut body = buf[head_end..].to_vec();
    while body.len() < length {
        let mut chunk = [0u8; 1024];
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before response body");
        body.extend_from_slice(&chunk[..n]);
    }

    (head, body)
}

async fn assert_closed(stream: &mut TcpStream) {
    let mut rest = Vec::new();
    let read = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut rest))
        .await
        .expect("server kept the connection open");
    // A reset also counts as closed
    if read.is_ok() {
        assert!(rest.is_empty());
    }
}

#[tokio::test]
async fn test_get_index_over_tcp() {
    let addr = start(tracked_beacon()).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream
        .write_all(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n")
        .await
        .unwrap();
    let (head, body) = read_response(&mut stream).await;

    assert!(head.starts_with("HTTP/1.1 200\r\n"));
    assert!(head.contains("content-type: text/html\r\n"));
    assert!(head.contains(&format!("content-length: {}\r\n", TRACKING_PAGE.len())));
    assert!(head.contains(&format!("server: {}\r\n", shadow::SERVER_TOKEN)));
    assert!(head.contains("connection: keep-alive\r\n"));
    assert_eq!(body, TRACKING_PAGE.as_bytes());
}

#[tokio::test]
async fn test_keep_alive_reuses_socket() {
    let beacon = tracked_beacon();
    let addr = start(beacon.clone()).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let url = "https://example.com/posts/1";
    let post = format!(
        "POST /hi HTTP/1.1\r\nContent-Length: {}\r\n\r\n{}",
        url.len(),
        url
    );
    stream.write_all(post.as_bytes()).await.unwrap();
    let (head, body) = read_response(&mut stream).await;
    assert!(head.starts_with("HTTP/1.1 204\r\n"));
    assert!(body.is_empty());

    stream
        .write_all(b"GET /stats HTTP/1.1\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let (head, body) = read_response(&mut stream).await;
    assert!(head.starts_with("HTTP/1.1 200\r\n"));
    assert!(head.contains("connection: close\r\n"));

    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["example.com"]["/posts/1"], 1);

    assert_closed(&mut stream).await;
}

#[tokio::test]
async fn test_untracked_beacon_returns_no_content() {
    let beacon = tracked_beacon();
    let addr = start(beacon.clone()).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream
        .write_all(b"POST /hi HTTP/1.1\r\nContent-Length: 17\r\n\r\nhttp://ex.com/a/b")
        .await
        .unwrap();
    let (head, body) = read_response(&mut stream).await;

    assert!(head.starts_with("HTTP/1.1 204\r\n"));
    assert!(head.contains("content-length: 0\r\n"));
    assert!(body.is_empty());
    assert!(beacon.store().is_empty().await);
}

#[tokio::test]
async fn test_missing_version_gets_400_and_close() {
    let beacon = tracked_beacon();
    let addr = start(beacon.clone()).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream.write_all(b"GET /\r\n\r\n").await.unwrap();
    let (head, body) = read_response(&mut stream).await;

    assert!(head.starts_with("HTTP/1.1 400\r\n"));
    assert!(head.contains("connection: close\r\n"));
    assert_eq!(body, b"Malformed HTTP declaration was sent.");
    assert_closed(&mut stream).await;
}

#[tokio::test]
async fn test_http2_preface_gets_505() {
    let addr = start(tracked_beacon()).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream
        .write_all(b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n")
        .await
        .unwrap();
    let (head, body) = read_response(&mut stream).await;

    assert!(head.starts_with("HTTP/1.1 505\r\n"));
    assert_eq!(body, b"shadow does not support HTTP/2.");
    assert_closed(&mut stream).await;
}

#[tokio::test]
async fn test_stalled_connection_does_not_block_others() {
    let addr = start(tracked_beacon()).await;

    let mut stalled = TcpStream::connect(addr).await.unwrap();
    stalled.write_all(b"GET / HTTP/1.1\r\nHost:").await.unwrap();

    let mut other = TcpStream::connect(addr).await.unwrap();
    other.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();

    let (head, _) = tokio::time::timeout(Duration::from_secs(5), read_response(&mut other))
        .await
        .expect("second connection was blocked");
    assert!(head.starts_with("HTTP/1.1 200\r\n"));
}

#[tokio::test]
async fn test_abrupt_disconnect_leaves_listener_running() {
    let addr = start(tracked_beacon()).await;

    {
        let mut dropped = TcpStream::connect(addr).await.unwrap();
        dropped.write_all(b"POST /hi HTTP/1.1\r\nContent-Length: 100\r\n\r\nabc").await.unwrap();
    }

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();
    let (head, _) = read_response(&mut stream).await;
    assert!(head.starts_with("HTTP/1.1 200\r\n"));
}
