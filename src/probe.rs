//! Reachability probes for the ports owned by the external services.

use reqwest::{Method, StatusCode};
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, trace};

/// True if a TCP connection to `host:port` succeeds within `timeout`
pub async fn tcp_open(host: &str, port: u16, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            trace!("{}:{} refused: {}", host, port, e);
            false
        }
        Err(_) => {
            trace!("{}:{} timed out", host, port);
            false
        }
    }
}

/// True if `method url` answers 200 within `timeout`.
///
/// Connection errors and timeouts are `false`, never errors.
pub async fn http_ok(client: &reqwest::Client, method: Method, url: &str, timeout: Duration) -> bool {
    match client.request(method, url).timeout(timeout).send().await {
        Ok(resp) => {
            trace!("{} answered {}", url, resp.status());
            resp.status() == StatusCode::OK
        }
        Err(e) => {
            trace!("{} not reachable: {}", url, e);
            false
        }
    }
}

/// Reachability of one named port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortReport {
    pub name: String,
    pub port: u16,
    pub open: bool,
}

/// Probe each named port on `host`
pub async fn probe_ports(host: &str, ports: &[(&str, u16)], timeout: Duration) -> Vec<PortReport> {
    let checks = ports.iter().map(|(name, port)| async move {
        let open = tcp_open(host, *port, timeout).await;
        debug!(port = *port, open, "Probed {}", name);
        PortReport {
            name: name.to_string(),
            port: *port,
            open,
        }
    });
    futures::future::join_all(checks).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn serve_once(status_line: &'static str) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let response = format!("{}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n", status_line);
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });
        port
    }

    async fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
        // listener dropped here, port is closed again
    }

    #[tokio::test]
    async fn test_tcp_open_and_closed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let open_port = listener.local_addr().unwrap().port();
        let closed = closed_port().await;

        assert!(tcp_open("127.0.0.1", open_port, Duration::from_secs(1)).await);
        assert!(!tcp_open("127.0.0.1", closed, Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_http_ok_only_on_200() {
        let client = reqwest::Client::new();

        let ok = serve_once("HTTP/1.1 200 OK").await;
        assert!(http_ok(&client, Method::HEAD, &format!("http://127.0.0.1:{}/", ok), Duration::from_secs(2)).await);

        let not_found = serve_once("HTTP/1.1 404 Not Found").await;
        assert!(!http_ok(&client, Method::GET, &format!("http://127.0.0.1:{}/api", not_found), Duration::from_secs(2)).await);

        let closed = closed_port().await;
        assert!(!http_ok(&client, Method::HEAD, &format!("http://127.0.0.1:{}/", closed), Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_probe_ports_keeps_order() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let open_port = listener.local_addr().unwrap().port();
        let closed = closed_port().await;

        let reports = probe_ports(
            "127.0.0.1",
            &[("http", open_port), ("ilp", closed)],
            Duration::from_millis(500),
        )
        .await;

        assert_eq!(
            reports,
            vec![
                PortReport { name: "http".to_string(), port: open_port, open: true },
                PortReport { name: "ilp".to_string(), port: closed, open: false },
            ]
        );
    }
}
