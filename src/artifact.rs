//! Upload artifacts and their digests.
//!
//! The digest decides whether bits need uploading: it is compared with the
//! digest of the application's current package. Files hash their bytes;
//! directories hash every relative path and file content in sorted order, so
//! the digest does not depend on filesystem iteration order.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{PushError, Result};

/// Whether an artifact is a single archive or a directory tree.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// A single file, uploaded as-is.
    Archive,
    /// A directory that must be archived before upload.
    Directory,
}

/// Application bits ready for upload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Artifact {
    /// Location on disk.
    pub path: PathBuf,
    /// Hex encoded sha256 digest.
    pub digest: String,
    /// Archive or directory.
    pub kind: ArtifactKind,
}

impl Artifact {
    /// Hashes the artifact at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be read.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata = fs::metadata(path)?;

        let (kind, digest) = if metadata.is_dir() {
            (ArtifactKind::Directory, digest_tree(path)?)
        } else {
            (ArtifactKind::Archive, digest_file(path)?)
        };

        debug!("Artifact {} ({kind:?}) digest {digest}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            digest,
            kind,
        })
    }

    /// Hashes the artifact on the blocking thread pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be read.
    pub async fn load(path: PathBuf) -> Result<Self> {
        tokio::task::spawn_blocking(move || Self::from_path(path))
            .await
            .map_err(|e| PushError::internal(format!("artifact hashing task failed: {e}")))?
    }
}

fn digest_file(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

fn digest_tree(root: &Path) -> io::Result<String> {
    let mut files = Vec::new();
    collect_files(root, root, &mut files)?;
    files.sort();

    let mut hasher = Sha256::new();
    for relative in &files {
        let content = fs::read(root.join(relative))?;
        hasher.update(relative.to_string_lossy().replace('\\', "/").as_bytes());
        hasher.update([0u8]);
        hasher.update((content.len() as u64).to_be_bytes());
        hasher.update(&content);
    }

    Ok(hex::encode(hasher.finalize()))
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            collect_files(root, &path, out)?;
        } else if let Ok(relative) = path.strip_prefix(root) {
            out.push(relative.to_path_buf());
        }
    }
    Ok(())
}
