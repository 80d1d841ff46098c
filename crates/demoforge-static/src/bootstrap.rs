//! First-run bootstrap of the output directory tree and runtime asset.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::config::{AssetSource, Layout};

/// Errors that abort the bootstrap.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("Failed to create directory {path}: {message}")]
    CreateDirError { path: String, message: String },
}

/// Errors from downloading the runtime asset. Never fatal to the build.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Failed to write {path}: {message}")]
    WriteError { path: String, message: String },
}

/// Trait for downloading a remote file.
pub trait FetchAsset: Send + Sync {
    /// Download `url` into `dest`, returning the number of bytes written.
    ///
    /// A partially written file must be removed before an error is returned.
    fn fetch(&self, url: &str, dest: &Path) -> Result<u64, FetchError>;
}

/// Blocking HTTP fetcher built on ureq.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    timeout: Duration,
}

impl HttpFetcher {
    /// Create a fetcher with the given connect/read timeout.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl FetchAsset for HttpFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(self.timeout)
            .timeout_read(self.timeout)
            .build();

        let response = match agent.get(url).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(code, _)) => return Err(FetchError::Status(code)),
            Err(ureq::Error::Transport(err)) => {
                return Err(FetchError::Transport(err.to_string()))
            }
        };

        if response.status() != 200 {
            return Err(FetchError::Status(response.status()));
        }

        let write_error = |e: io::Error| FetchError::WriteError {
            path: dest.display().to_string(),
            message: e.to_string(),
        };

        let mut file = fs::File::create(dest).map_err(write_error)?;
        let mut reader = response.into_reader();

        match io::copy(&mut reader, &mut file) {
            Ok(bytes) => Ok(bytes),
            Err(e) => {
                drop(file);
                if let Err(remove) = fs::remove_file(dest) {
                    tracing::warn!(
                        "Failed to remove partial download {}: {}",
                        dest.display(),
                        remove
                    );
                }
                Err(write_error(e))
            }
        }
    }
}

/// Create the output tree: output directory, `js` subdirectory, then the
/// intermediate directory. Each step is fatal on failure.
pub fn create_layout(layout: &Layout) -> Result<(), BootstrapError> {
    for dir in [&layout.output_dir, &layout.js_dir, &layout.build_dir] {
        fs::create_dir_all(dir).map_err(|e| BootstrapError::CreateDirError {
            path: dir.display().to_string(),
            message: e.to_string(),
        })?;
        tracing::debug!("Created {}", dir.display());
    }

    tracing::info!("Output directory '{}' created", layout.output_dir.display());
    Ok(())
}

/// Bootstrap a fresh output directory.
///
/// Creates the directory tree, then starts the runtime asset download on a
/// blocking task and returns its handle without waiting for it. Returns
/// `None` when no download URL can be resolved. Must be called from within a
/// tokio runtime.
pub fn bootstrap(
    layout: &Layout,
    asset: &AssetSource,
    fetcher: Arc<dyn FetchAsset>,
) -> Result<Option<JoinHandle<()>>, BootstrapError> {
    create_layout(layout)?;

    let Some(url) = asset.download_url() else {
        tracing::warn!(
            "No version declared for '{}', skipping runtime asset download",
            asset.dependency
        );
        return Ok(None);
    };

    let dest = layout.js_dir.join(&asset.file_name);
    Ok(Some(tokio::task::spawn_blocking(move || {
        download(fetcher.as_ref(), &url, dest)
    })))
}

/// Download the asset, logging the outcome.
fn download(fetcher: &dyn FetchAsset, url: &str, dest: PathBuf) {
    tracing::info!("Downloading '{}'", url);

    match fetcher.fetch(url, &dest) {
        Ok(bytes) => {
            let name = dest
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            tracing::info!("Downloaded '{}' ({} bytes)", name, bytes);
        }
        Err(e) => {
            tracing::error!("Download of '{}' failed: {}", url, e);
        }
    }
}
