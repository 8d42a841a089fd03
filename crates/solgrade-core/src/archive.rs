//! Zip archive validation and extraction
//!
//! Templates and submissions arrive as zip payloads over the bus. Both are
//! validated before any container work: a bad archive must fail fast and
//! cheap.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Archive is empty")]
    Empty,

    #[error("Malformed archive: {0}")]
    Malformed(String),

    #[error("Archive entry escapes the extraction root: {0}")]
    UnsafePath(String),

    #[error("Missing required path: {0}")]
    MissingRequired(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ArchiveResult<T> = std::result::Result<T, ArchiveError>;

/// Extract a zip payload into `dest`.
///
/// Entry names are confined to the destination; anything trying to climb
/// out (`../`, absolute paths) fails the whole archive.
pub fn extract_archive(bytes: &[u8], dest: &Path) -> ArchiveResult<()> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ArchiveError::Malformed(e.to_string()))?;

    if archive.is_empty() {
        return Err(ArchiveError::Empty);
    }

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| ArchiveError::Malformed(e.to_string()))?;

        let Some(relative) = entry.enclosed_name() else {
            return Err(ArchiveError::UnsafePath(entry.name().to_string()));
        };
        let target = dest.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut out = std::fs::File::create(&target)?;
            std::io::copy(&mut entry, &mut out)?;
        }
    }

    Ok(())
}

/// Validate an extracted template tree and locate its project root.
///
/// A template must contain exactly one top-level project directory, with a
/// `test/` directory and a `foundry.toml` manifest inside it. The container
/// build file is not required: the embedded template's is always used.
pub fn validate_template_tree(dir: &Path) -> ArchiveResult<PathBuf> {
    let mut top_dirs = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.path().is_dir() {
            top_dirs.push(entry.path());
        } else {
            return Err(ArchiveError::Malformed(format!(
                "unexpected top-level file {:?}; the template must be a single project directory",
                entry.file_name()
            )));
        }
    }

    let root = match top_dirs.as_slice() {
        [single] => single.clone(),
        [] => return Err(ArchiveError::MissingRequired("project directory".into())),
        _ => {
            return Err(ArchiveError::Malformed(
                "more than one top-level directory".into(),
            ))
        }
    };

    if !root.join("test").is_dir() {
        return Err(ArchiveError::MissingRequired("test/".into()));
    }
    if !root.join("foundry.toml").is_file() {
        return Err(ArchiveError::MissingRequired("foundry.toml".into()));
    }

    Ok(root)
}

/// Validate an extracted submission tree.
///
/// A submission must carry a `src/` directory at its root. A `test/`
/// directory may be present but is ignored: the image entrypoint re-copies
/// the baked-in tests over the mount before running anything.
pub fn validate_submission_tree(dir: &Path) -> ArchiveResult<()> {
    if !dir.join("src").is_dir() {
        return Err(ArchiveError::MissingRequired("src/".into()));
    }
    Ok(())
}
