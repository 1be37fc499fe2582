//! Shared test support for the black-box integration suite.
//!
//! These tests exercise the crate only through its public API, the way an
//! external deployment would wire it up (the decorator chain, the provider
//! index, and the query engine all take `Arc<dyn Trait>` seams at their
//! boundaries precisely so a caller never needs a crate-internal hook).

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Binds an ephemeral local port, accepts exactly one HTTP/1.1 connection,
/// and replies with `body` regardless of the request path. Good enough to
/// stand in for a provider's blob/claim endpoint without pulling in an HTTP
/// mocking crate the teacher never depended on.
pub async fn serve_once(body: Vec<u8>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind ephemeral port");
    let addr = listener.local_addr().expect("listener has a local address");
    tokio::spawn(async move {
        let Ok((mut stream, _)) = listener.accept().await else { return };
        let mut buf = [0u8; 4096];
        let _ = stream.read(&mut buf).await;
        let header = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        );
        let _ = stream.write_all(header.as_bytes()).await;
        let _ = stream.write_all(&body).await;
        let _ = stream.shutdown().await;
    });
    format!("http://{addr}/")
}
