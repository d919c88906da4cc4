//! Notebook assets: the default notebook, static files and the HTML export.

use std::path::Path;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::http::download;
use crate::process::run_to_completion;
use crate::{PlayError, PlayResult, ResultExt};

const CHECKPOINTS_DIR: &str = ".ipynb_checkpoints";

/// Download the default notebook into `dest`, keeping an existing copy
pub async fn fetch_default(client: &reqwest::Client, url: &str, dest: &Path) -> PlayResult<()> {
    if dest.exists() {
        debug!("Notebook {} already present", dest.display());
        return Ok(());
    }
    info!("Fetching notebook {}", url);
    download(client, url, dest).await
}

/// Recursively copy notebook assets from `src` into `dest`. Returns the number of files copied.
pub fn copy_assets(src: &Path, dest: &Path) -> PlayResult<usize> {
    if !src.is_dir() {
        return Err(PlayError::configuration(format!(
            "notebook source is not a directory: {}",
            src.display()
        )));
    }

    std::fs::create_dir_all(dest).with_path_context(dest)?;
    let mut copied = 0;
    let walker = WalkDir::new(src)
        .follow_links(false)
        .min_depth(1)
        .into_iter()
        // Jupyter's own checkpoints are not assets
        .filter_entry(|e| e.file_name() != CHECKPOINTS_DIR);
    for entry in walker {
        let entry = entry.map_err(std::io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| PlayError::configuration(e.to_string()))?;
        let to = dest.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&to).with_path_context(&to)?;
        } else if entry.file_type().is_file() {
            std::fs::copy(entry.path(), &to).with_path_context(entry.path())?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Arguments for `jupyter nbconvert` producing `<output_dir>/index.html`
pub fn export_args(notebook: &str, output_dir: &Path) -> Vec<String> {
    vec![
        "nbconvert".to_string(),
        "--to".to_string(),
        "html".to_string(),
        "--template".to_string(),
        "lab".to_string(),
        "--output-dir".to_string(),
        output_dir.display().to_string(),
        "--output".to_string(),
        "index".to_string(),
        notebook.to_string(),
    ]
}

/// Render `notebook` (relative to `notebook_dir`) as a static HTML page
pub async fn export_html(
    jupyter: &Path,
    notebook_dir: &Path,
    notebook: &str,
    output_dir: &Path,
) -> PlayResult<()> {
    if !notebook_dir.join(notebook).is_file() {
        return Err(PlayError::configuration(format!(
            "notebook not found: {}",
            notebook_dir.join(notebook).display()
        )));
    }
    info!("Exporting {} to {}/index.html", notebook, output_dir.display());
    run_to_completion(jupyter, export_args(notebook, output_dir), Some(notebook_dir)).await
}
