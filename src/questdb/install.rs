//! Fetching and unpacking a QuestDB release archive.

use flate2::read::GzDecoder;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::info;
use walkdir::{DirEntry, WalkDir};

use super::Layout;
use crate::config::QuestDbSettings;
use crate::http::download;
use crate::{PlayError, PlayResult, ResultExt};

const JAR_NAME: &str = "questdb.jar";

pub struct Installer {
    client: reqwest::Client,
    url: String,
    version: String,
    layout: Layout,
}

impl Installer {
    pub fn new(client: reqwest::Client, settings: &QuestDbSettings, layout: Layout) -> Self {
        Self {
            client,
            url: settings.archive_url(),
            version: settings.version.clone(),
            layout,
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Download and unpack the release unless it is already installed
    pub async fn install(&self) -> PlayResult<()> {
        if self.layout.is_installed() {
            info!(
                "QuestDB already installed at {}, skipping download",
                self.layout.bin.display()
            );
            return Ok(());
        }

        let download_dir = self.layout.root.join("download");
        let archive = download_dir.join("questdb.tar.gz");
        tokio::fs::create_dir_all(&download_dir)
            .await
            .with_path_context(&download_dir)?;

        info!("Downloading QuestDB v{} from {}", self.version, self.url);
        download(&self.client, &self.url, &archive).await?;

        info!("Extracting QuestDB v{} to {}", self.version, self.layout.root.display());
        let layout = self.layout.clone();
        let archive_path = archive.clone();
        tokio::task::spawn_blocking(move || unpack(&archive_path, &layout))
            .await
            .map_err(|e| PlayError::archive(format!("unpack task failed: {}", e), Some(&archive)))??;

        let _ = tokio::fs::remove_dir_all(&download_dir).await;
        Ok(())
    }
}

/// Unpack a gzipped release tarball into the layout root.
///
/// The directory holding `questdb.jar` (e.g. `questdb-6.7-no-jre-bin`) becomes `bin`.
pub fn unpack(archive: &Path, layout: &Layout) -> PlayResult<()> {
    let staging = layout.root.join(".unpack");
    if staging.exists() {
        std::fs::remove_dir_all(&staging).with_path_context(&staging)?;
    }
    std::fs::create_dir_all(&staging).with_path_context(&staging)?;

    let file = File::open(archive).with_path_context(archive)?;
    let mut tarball = tar::Archive::new(GzDecoder::new(file));
    tarball
        .unpack(&staging)
        .map_err(|e| PlayError::archive(e.to_string(), Some(archive)))?;

    let jar = find_file(&staging, JAR_NAME)?
        .ok_or_else(|| PlayError::archive(format!("no {} in archive", JAR_NAME), Some(archive)))?;
    let jar_dir = jar
        .parent()
        .ok_or_else(|| PlayError::archive("jar has no parent directory", Some(archive)))?;

    if layout.bin.exists() {
        std::fs::remove_dir_all(&layout.bin).with_path_context(&layout.bin)?;
    }
    std::fs::rename(jar_dir, &layout.bin).with_path_context(&layout.bin)?;
    // Flat archives have the jar at the top, in which case staging itself was moved
    if staging.exists() {
        std::fs::remove_dir_all(&staging).with_path_context(&staging)?;
    }
    std::fs::create_dir_all(&layout.log).with_path_context(&layout.log)?;

    info!("QuestDB unpacked to {}", layout.bin.display());
    Ok(())
}

/// Shallowest file called `name` below `dir`. Symlinks are not followed.
fn find_file(dir: &Path, name: &str) -> PlayResult<Option<PathBuf>> {
    let mut found: Option<DirEntry> = None;
    for entry in WalkDir::new(dir).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() || entry.file_name() != name {
            continue;
        }
        if found.as_ref().map_or(true, |f| entry.depth() < f.depth()) {
            found = Some(entry);
        }
    }
    Ok(found.map(DirEntry::into_path))
}
