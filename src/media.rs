use reqwest::Client;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, warn};
use url::Url;

use crate::utils::http::AUX_TIMEOUT;

/// A downloaded attachment living inside a `StagedMedia` directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub filename: String,
    pub path: PathBuf,
}

/// Temporary directory holding downloaded media. The directory and everything
/// in it is removed when this value is dropped or released.
#[derive(Debug)]
pub struct StagedMedia {
    dir: TempDir,
    files: Vec<StagedFile>,
}

impl StagedMedia {
    pub fn files(&self) -> &[StagedFile] {
        &self.files
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Remove the directory now, logging instead of failing if removal goes wrong.
    pub fn release(self) {
        let path = self.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            error!("Failed to remove staging directory {}: {}", path.display(), e);
        }
    }
}

/// Download every link into a fresh temporary directory, created under `parent`
/// or the system temp directory. Failed downloads are logged and skipped; only
/// creating the directory itself can fail.
pub async fn stage(
    client: &Client,
    media_links: &[String],
    parent: Option<&Path>,
) -> io::Result<StagedMedia> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("post-media-");
    let dir = match parent {
        Some(parent) => builder.tempdir_in(parent)?,
        None => builder.tempdir()?,
    };
    let mut files = Vec::new();
    let mut used_names = HashSet::new();

    for (i, link) in media_links.iter().enumerate() {
        let mut filename = filename_for(link, i);
        if !used_names.insert(filename.clone()) {
            filename = format!("{}-{}", i, filename);
            used_names.insert(filename.clone());
        }
        let path = dir.path().join(&filename);

        match download(client, link, &path).await {
            Ok(()) => {
                debug!("Staged {} as {}", link, path.display());
                files.push(StagedFile { filename, path });
            }
            Err(e) => {
                error!("Failed to download image {}: {}", link, e);
                if path.exists() {
                    if let Err(e) = tokio::fs::remove_file(&path).await {
                        warn!("Could not remove partial download {}: {}", path.display(), e);
                    }
                }
            }
        }
    }

    Ok(StagedMedia { dir, files })
}

async fn download(client: &Client, link: &str, path: &Path) -> anyhow::Result<()> {
    let mut response = client.get(link).timeout(AUX_TIMEOUT).send().await?;

    let status = response.status();
    if !status.is_success() {
        anyhow::bail!("got status {}", status);
    }

    let mut file = tokio::fs::File::create(path).await?;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    Ok(())
}

/// Last path segment of the link, e.g. `https://pbs.twimg.com/media/abc.jpg?name=large` -> `abc.jpg`.
fn filename_for(link: &str, index: usize) -> String {
    Url::parse(link)
        .ok()
        .and_then(|url| {
            url.path_segments()
                .and_then(|segments| segments.last().map(str::to_string))
        })
        .filter(|name| !name.is_empty() && name != "." && name != "..")
        .unwrap_or_else(|| format!("media-{}", index))
}
