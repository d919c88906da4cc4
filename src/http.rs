//! Shared HTTP client and file downloads.

use futures::StreamExt;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::{PlayError, PlayResult, ResultExt};

/// Client used for downloads and readiness probes
pub fn client() -> PlayResult<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .user_agent(concat!("questplay/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(10))
        .build()?)
}

/// Stream `url` into `dest`; a non-2xx status is an error.
///
/// The body is written to a temporary file that only replaces `dest` once
/// the whole body has arrived.
pub async fn download(client: &reqwest::Client, url: &str, dest: &Path) -> PlayResult<()> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| PlayError::download(e.to_string(), url))?;

    let status = response.status();
    if !status.is_success() {
        return Err(PlayError::download(format!("HTTP {}", status), url));
    }

    // Stage next to `dest` so the final rename stays on one filesystem
    let parent = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    tokio::fs::create_dir_all(parent).await.with_path_context(parent)?;
    let staged = tempfile::Builder::new()
        .prefix(".questplay-")
        .suffix(".part")
        .tempfile_in(parent)
        .with_path_context(parent)?;

    let mut file = tokio::fs::File::from_std(staged.reopen().with_path_context(staged.path())?);
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| PlayError::download(e.to_string(), url))?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    drop(file);

    staged
        .persist(dest)
        .map_err(|e| e.error)
        .with_path_context(dest)?;

    debug!(bytes = written, "Downloaded {} to {}", url, dest.display());
    Ok(())
}
