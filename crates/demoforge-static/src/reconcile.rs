//! Directory reconciliation before a rebuild.
//!
//! Stale compiler output and previously generated pages are removed so that
//! every build starts from the same state.

use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use crate::config::{ArtifactPlacement, Layout, PAGE_SUFFIX};

/// What a reconciliation removed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileStats {
    /// Entries removed from the intermediate directory (files and directories)
    pub intermediate: usize,

    /// Pages removed from the output directory
    pub pages: usize,

    /// Final scripts removed from the items directory
    pub scripts: usize,
}

/// Errors that can occur during reconciliation.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("Failed to list {path}: {message}")]
    ListError { path: String, message: String },

    #[error("Failed to remove {path}: {message}")]
    RemoveError { path: String, message: String },
}

/// Whether stale artifacts from a previous build exist.
pub fn has_stale_artifacts(layout: &Layout) -> Result<bool, ReconcileError> {
    if !is_empty_dir(&layout.build_dir)? {
        return Ok(true);
    }

    Ok(layout.placement == ArtifactPlacement::Referenced && !is_empty_dir(&layout.items_dir)?)
}

/// Purge stale artifacts.
///
/// No-op when [`has_stale_artifacts`] is false. Otherwise the intermediate
/// directory is emptied recursively (the directory itself stays), pages
/// directly under the output directory are deleted, and with referenced
/// placement the final scripts under the items directory are deleted.
pub fn reconcile(layout: &Layout) -> Result<ReconcileStats, ReconcileError> {
    let mut stats = ReconcileStats::default();

    if !has_stale_artifacts(layout)? {
        return Ok(stats);
    }

    if layout.build_dir.exists() {
        stats.intermediate = purge_tree(&layout.build_dir)?;
    }
    stats.pages = purge_suffix(&layout.output_dir, PAGE_SUFFIX)?;
    if layout.placement == ArtifactPlacement::Referenced {
        stats.scripts = purge_suffix(&layout.items_dir, ".js")?;
    }

    tracing::info!(
        "Removed {} intermediate entries, {} pages and {} scripts from the previous build",
        stats.intermediate,
        stats.pages,
        stats.scripts
    );

    Ok(stats)
}

/// Missing directories count as empty.
fn is_empty_dir(dir: &Path) -> Result<bool, ReconcileError> {
    if !dir.exists() {
        return Ok(true);
    }

    let mut entries = fs::read_dir(dir).map_err(|e| ReconcileError::ListError {
        path: dir.display().to_string(),
        message: e.to_string(),
    })?;

    Ok(entries.next().is_none())
}

/// Delete everything under `dir`, children before their parents.
fn purge_tree(dir: &Path) -> Result<usize, ReconcileError> {
    let mut removed = 0;

    for entry in WalkDir::new(dir).min_depth(1).contents_first(true) {
        let entry = entry.map_err(|e| ReconcileError::ListError {
            path: dir.display().to_string(),
            message: e.to_string(),
        })?;
        let path = entry.path();

        let result = if entry.file_type().is_dir() {
            fs::remove_dir(path)
        } else {
            fs::remove_file(path)
        };
        result.map_err(|e| ReconcileError::RemoveError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        tracing::debug!("Removed {}", path.display());
        removed += 1;
    }

    Ok(removed)
}

/// Delete entries directly under `dir` whose name ends with `suffix`.
fn purge_suffix(dir: &Path, suffix: &str) -> Result<usize, ReconcileError> {
    if !dir.exists() {
        return Ok(0);
    }

    let entries = fs::read_dir(dir).map_err(|e| ReconcileError::ListError {
        path: dir.display().to_string(),
        message: e.to_string(),
    })?;

    let mut removed = 0;
    for entry in entries {
        let entry = entry.map_err(|e| ReconcileError::ListError {
            path: dir.display().to_string(),
            message: e.to_string(),
        })?;
        let path = entry.path();

        let matches = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.ends_with(suffix));
        if !matches || path.is_dir() {
            continue;
        }

        fs::remove_file(&path).map_err(|e| ReconcileError::RemoveError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        tracing::debug!("Removed {}", path.display());
        removed += 1;
    }

    Ok(removed)
}
