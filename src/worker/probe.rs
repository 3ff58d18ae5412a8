//! Control-protocol handshake.
//!
//! Connects to `127.0.0.1:<port>` and asks the debugging endpoint for its version
//! document (`GET /json/version`). The endpoint is ready once it answers `200`.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time;

use crate::error::ProbeError;

/// Performs one handshake, bounded by `timeout`.
pub async fn handshake(port: u16, timeout: Duration) -> Result<(), ProbeError> {
    match time::timeout(timeout, exchange(port)).await {
        Ok(res) => res,
        Err(_elapsed) => Err(ProbeError::Timeout { port, timeout }),
    }
}

async fn exchange(port: u16) -> Result<(), ProbeError> {
    let stream = TcpStream::connect(("127.0.0.1", port))
        .await
        .map_err(|source| ProbeError::Connect { port, source })?;

    let handshake_err = |detail: String| ProbeError::Handshake { port, detail };

    let mut reader = BufReader::new(stream);
    let request = format!(
        "GET /json/version HTTP/1.1\r\nHost: 127.0.0.1:{port}\r\nConnection: close\r\n\r\n"
    );
    reader
        .get_mut()
        .write_all(request.as_bytes())
        .await
        .map_err(|e| handshake_err(e.to_string()))?;

    let mut status = String::new();
    reader
        .read_line(&mut status)
        .await
        .map_err(|e| handshake_err(e.to_string()))?;

    let status = status.trim();
    let mut parts = status.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(proto), Some("200")) if proto.starts_with("HTTP/") => Ok(()),
        _ if status.is_empty() => Err(handshake_err("empty response".to_string())),
        _ => Err(handshake_err(status.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    async fn serve_once(response: &'static str) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        tokio::spawn(async move {
            if let Ok((mut sock, _)) = listener.accept().await {
                let mut buf = [0u8; 512];
                let _ = sock.read(&mut buf).await;
                let _ = sock.write_all(response.as_bytes()).await;
            }
        });
        port
    }

    async fn free_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        listener.local_addr().expect("addr").port()
    }

    #[tokio::test]
    async fn test_200_is_ready() {
        let port = serve_once("HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\n{}").await;
        handshake(port, Duration::from_secs(2)).await.expect("ready");
    }

    #[tokio::test]
    async fn test_non_200_is_handshake_error() {
        let port = serve_once("HTTP/1.1 404 Not Found\r\n\r\n").await;
        let err = handshake(port, Duration::from_secs(2)).await.unwrap_err();
        assert!(matches!(err, ProbeError::Handshake { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn test_closed_port_is_refused() {
        let port = free_port().await;
        let err = handshake(port, Duration::from_secs(2)).await.unwrap_err();
        assert!(err.is_connection_refused(), "{err:?}");
    }

    #[tokio::test]
    async fn test_silent_endpoint_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let hold = tokio::spawn(async move {
            let accepted = listener.accept().await;
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(accepted);
        });

        let err = handshake(port, Duration::from_millis(100)).await.unwrap_err();
        assert!(matches!(err, ProbeError::Timeout { .. }), "{err:?}");
        hold.abort();
    }
}
