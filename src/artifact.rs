//! On-disk storage for serialized similarity indexes.
//!
//! Each stored context row owns one index file named after the context and
//! its row id (`sha256(name)-<id>.idx`), so the database row only needs to
//! record that reference and two rows never share a file, even when one
//! name is deleted and written again. Writes go through a temporary file
//! and a rename.

use sha2::{Digest, Sha256};
use std::io;
use std::path::{Path, PathBuf};

const EXTENSION: &str = "idx";

#[derive(Debug, Clone)]
pub struct ArtifactDir {
    root: PathBuf,
}

impl ArtifactDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reference under which the index of context row `id` named `name`
    /// is stored.
    pub fn artifact_ref(name: &str, id: i64) -> String {
        let digest = Sha256::digest(name.as_bytes());
        let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
        format!("{}-{}.{}", hex, id, EXTENSION)
    }

    fn path(&self, reference: &str) -> io::Result<PathBuf> {
        let valid = !reference.is_empty()
            && reference
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-')
            && !reference.starts_with('.');
        if !valid {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid artifact reference: {}", reference),
            ));
        }
        Ok(self.root.join(reference))
    }

    pub async fn write(&self, reference: &str, bytes: &[u8]) -> io::Result<()> {
        let path = self.path(reference)?;
        tokio::fs::create_dir_all(&self.root).await?;
        let tmp = path.with_extension(format!("{}.tmp", EXTENSION));
        tokio::fs::write(&tmp, bytes).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e);
        }
        Ok(())
    }

    pub async fn read(&self, reference: &str) -> io::Result<Vec<u8>> {
        tokio::fs::read(self.path(reference)?).await
    }

    /// Remove one artifact. A missing file is not an error.
    pub async fn remove(&self, reference: &str) -> io::Result<()> {
        match tokio::fs::remove_file(self.path(reference)?).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Remove every artifact in the directory, returning how many were removed.
    pub async fn clear(&self) -> io::Result<usize> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(EXTENSION) {
                tokio::fs::remove_file(&path).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub async fn exists(&self, reference: &str) -> bool {
        match self.path(reference) {
            Ok(path) => tokio::fs::try_exists(path).await.unwrap_or(false),
            Err(_) => false,
        }
    }
}
