use sprite_atlas::fetch::{FetchError, HttpFetcher, TileFetcher};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Minimal one-shot HTTP fixture: answers the first connection with the
/// given status line and body, then closes.
async fn serve_once(listener: TcpListener, status_line: &'static str, body: Vec<u8>) {
    let (mut socket, _) = listener.accept().await.unwrap();
    let mut buf = [0u8; 2048];
    let _ = socket.read(&mut buf).await;
    let header = format!(
        "{status_line}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    socket.write_all(header.as_bytes()).await.unwrap();
    socket.write_all(&body).await.unwrap();
    let _ = socket.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fetches_body_bytes_on_success() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve_once(listener, "HTTP/1.1 200 OK", vec![7, 8, 9]));

    let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();
    let bytes = fetcher
        .fetch(&format!("http://{addr}/img.png"))
        .await
        .unwrap();
    assert_eq!(bytes, vec![7, 8, 9]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn non_success_status_is_reported() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve_once(listener, "HTTP/1.1 404 Not Found", Vec::new()));

    let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();
    let err = fetcher
        .fetch(&format!("http://{addr}/missing.png"))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Status(404)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stalled_server_hits_the_timeout() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        // accept but never answer
        let (_socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
    });

    let fetcher = HttpFetcher::new(Duration::from_millis(250)).unwrap();
    let err = fetcher
        .fetch(&format!("http://{addr}/slow.png"))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Transport(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn refused_connection_is_a_transport_error() {
    // bind to grab a free port, then drop the listener before fetching
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let fetcher = HttpFetcher::new(Duration::from_secs(1)).unwrap();
    let err = fetcher
        .fetch(&format!("http://{addr}/img.png"))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Transport(_)));
}
