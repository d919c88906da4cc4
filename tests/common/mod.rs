#![allow(dead_code)]

use flate2::write::GzEncoder;
use flate2::Compression;
use questplay::config::Settings;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// A gzipped tarball shaped like a QuestDB no-JRE release
pub fn release_archive(version: &str) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::fast()));
    let top = format!("questdb-{}-no-jre-bin", version);

    for (name, body) in [
        ("questdb.jar", b"not really a jar".as_slice()),
        ("questdb.sh", b"#!/bin/sh\n".as_slice()),
    ] {
        let mut header = tar::Header::new_gnu();
        header.set_size(body.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, format!("{}/{}", top, name), body)
            .unwrap();
    }

    builder.into_inner().unwrap().finish().unwrap()
}

/// Minimal HTTP server answering every request with the same body
pub struct FileServer {
    pub port: u16,
    hits: Arc<AtomicUsize>,
}

impl FileServer {
    pub async fn start(status_line: &'static str, body: Vec<u8>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let hits = Arc::new(AtomicUsize::new(0));
        let body = Arc::new(body);

        let counter = hits.clone();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let body = body.clone();
                tokio::spawn(async move {
                    let mut buf = [0u8; 2048];
                    let _ = socket.read(&mut buf).await;
                    let head = format!(
                        "{}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        status_line,
                        body.len()
                    );
                    let _ = socket.write_all(head.as_bytes()).await;
                    let _ = socket.write_all(&body).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        Self { port, hits }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}/{}", self.port, path.trim_start_matches('/'))
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Settings rooted in a fresh temporary directory
pub fn temp_settings() -> (TempDir, Settings) {
    let dir = TempDir::new().unwrap();
    let settings = Settings::default().with_root(dir.path().join("questdb"));
    (dir, settings)
}
