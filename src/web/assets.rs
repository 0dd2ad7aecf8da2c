// Filesystem side of the resize endpoint: directory creation and
// lookup of source images by basename.

use super::error::ApiError;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Source and destination folders of the image store.
#[derive(Debug, Clone)]
pub struct ImageDirs {
    /// Original, full-size images. Read only.
    pub source: PathBuf,
    /// Resized copies, overwritten on every request.
    pub destination: PathBuf,
}

impl ImageDirs {
    /// The conventional `<root>/full` and `<root>/thumb` layout.
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            source: root.join("full"),
            destination: root.join("thumb"),
        }
    }
}

/// Makes sure `dir` exists, creating it and any missing parents.
pub async fn ensure_dir(dir: &Path) -> Result<(), ApiError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(ApiError::FolderAccess)
}

/// Finds the file in `dir` whose name without extension equals `basename`.
///
/// Returns the file name (with extension) of the first match in directory
/// listing order, or `None` when nothing matches. Listing order is whatever
/// the OS reports, so with several candidates (`fjord.jpg` and `fjord.png`)
/// the winner is platform dependent.
pub async fn resolve_filename(basename: &str, dir: &Path) -> Result<Option<String>, ApiError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(ApiError::FolderAccess)?;

    let mut matches = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(ApiError::FolderAccess)? {
        let path = entry.path();
        // `metadata` follows symlinks, so a link to an image counts as a file.
        let is_file = tokio::fs::metadata(&path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            continue;
        }

        if path.file_stem().and_then(|s| s.to_str()) == Some(basename) {
            if let Some(name) = path.file_name().and_then(|s| s.to_str()) {
                matches.push(name.to_string());
            }
        }
    }

    if matches.len() > 1 {
        warn!(
            "Several source images match {:?}: {:?}. Using {:?}.",
            basename, matches, matches[0]
        );
    }

    let found = matches.into_iter().next();
    debug!("Resolved {:?} to {:?}", basename, found);
    Ok(found)
}
