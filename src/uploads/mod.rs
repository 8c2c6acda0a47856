//! Storage for uploaded profile pictures.
//!
//! The account layer only keeps the reference string a [`FileStorage`] hands
//! back; how bytes are laid out is up to the implementation.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Longest file-name stem kept from the client-supplied name.
const MAX_NAME_CHARS: usize = 100;

#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Persist `bytes` and return a stable reference to them.
    async fn store(&self, original_name: &str, bytes: &[u8]) -> Result<String>;

    /// Best-effort removal of a previously stored file.
    async fn discard(&self, reference: &str);
}

/// Writes uploads into a single directory on local disk.
pub struct DiskStorage {
    dir: PathBuf,
}

impl DiskStorage {
    /// Use `dir` for uploads, creating it if needed.
    pub fn new(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create upload dir: {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn owns(&self, reference: &str) -> bool {
        Path::new(reference).parent() == Some(self.dir.as_path())
    }
}

#[async_trait]
impl FileStorage for DiskStorage {
    async fn store(&self, original_name: &str, bytes: &[u8]) -> Result<String> {
        // Timestamp + random suffix keeps names unique within the same millisecond
        let millis = chrono::Utc::now().timestamp_millis();
        let suffix = &uuid::Uuid::new_v4().simple().to_string()[..8];
        let filename = format!("{millis}-{suffix}-{}", sanitize_file_name(original_name));
        let path = self.dir.join(filename);

        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write upload: {}", path.display()))?;

        tracing::debug!(path = %path.display(), size = bytes.len(), "Stored upload");
        Ok(path.to_string_lossy().into_owned())
    }

    async fn discard(&self, reference: &str) {
        if !self.owns(reference) {
            tracing::warn!("Refusing to discard file outside upload dir: {reference}");
            return;
        }
        if let Err(e) = tokio::fs::remove_file(reference).await {
            tracing::warn!("Failed to discard upload {reference}: {e}");
        }
    }
}

/// Reduce a client-supplied file name to a safe final path component.
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_NAME_CHARS)
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn sanitize_strips_directories_and_odd_chars() {
        assert_eq!(sanitize_file_name("avatar.png"), "avatar.png");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\Users\\me\\pic.jpg"), "pic.jpg");
        assert_eq!(sanitize_file_name("my photo (1).png"), "my_photo__1_.png");
        assert_eq!(sanitize_file_name(".hidden"), "hidden");
        assert_eq!(sanitize_file_name(""), "upload");
        assert_eq!(sanitize_file_name(".."), "upload");
    }

    #[test]
    fn sanitize_truncates_long_names() {
        let long = "a".repeat(500);
        assert_eq!(sanitize_file_name(&long).len(), MAX_NAME_CHARS);
    }

    #[tokio::test]
    async fn store_writes_bytes_under_upload_dir() {
        let tmp = TempDir::new().unwrap();
        let storage = DiskStorage::new(&tmp.path().join("uploads")).unwrap();

        let reference = storage.store("face.png", b"\x89PNG").await.unwrap();
        assert!(reference.ends_with("-face.png"));
        assert!(Path::new(&reference).starts_with(storage.dir()));
        assert_eq!(std::fs::read(&reference).unwrap(), b"\x89PNG");
    }

    #[tokio::test]
    async fn same_name_twice_gets_distinct_references() {
        let tmp = TempDir::new().unwrap();
        let storage = DiskStorage::new(tmp.path()).unwrap();

        let a = storage.store("same.png", b"a").await.unwrap();
        let b = storage.store("same.png", b"b").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn discard_removes_owned_files_only() {
        let tmp = TempDir::new().unwrap();
        let storage = DiskStorage::new(&tmp.path().join("uploads")).unwrap();

        let outside = tmp.path().join("keep.txt");
        std::fs::write(&outside, b"keep").unwrap();
        storage.discard(&outside.to_string_lossy()).await;
        assert!(outside.exists());

        let reference = storage.store("gone.png", b"x").await.unwrap();
        storage.discard(&reference).await;
        assert!(!Path::new(&reference).exists());
    }
}
