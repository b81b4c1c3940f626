/*!
 * File share service: shares holding directories of named files.
 *
 * Unlike blobs, share files are meant to be read back by name, so the trait
 * carries a download operation. The directory component may be empty, which
 * addresses the share root.
 */

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;

use super::StorageError;

#[async_trait]
pub trait FileShareStore: Send + Sync {
    /// Lazily creates the share and directory; repeated calls are no-ops.
    /// An empty `directory` addresses the share root.
    async fn create_directory_if_absent(
        &self,
        share: &str,
        directory: &str,
    ) -> Result<(), StorageError>;

    /// Stores `content` under `file_name`, creating share and directory as
    /// needed and overwriting any existing file. Returns the stored name.
    async fn upload_file(
        &self,
        share: &str,
        directory: &str,
        file_name: &str,
        content: Bytes,
    ) -> Result<String, StorageError>;

    /// The file's content, or `NotFound` when it does not exist.
    async fn download_file(
        &self,
        share: &str,
        directory: &str,
        file_name: &str,
    ) -> Result<Bytes, StorageError>;
}

fn check_file_name(name: &str) -> Result<(), StorageError> {
    if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
        return Err(StorageError::Transport(format!(
            "invalid share file name '{}'",
            name
        )));
    }
    Ok(())
}

fn missing_file(share: &str, directory: &str, file_name: &str) -> StorageError {
    StorageError::NotFound {
        resource: format!("share file {}/{}/{}", share, directory, file_name),
    }
}

type DirectoryMap = HashMap<String, HashMap<String, Bytes>>;

/// In-memory file share service.
#[derive(Debug, Default)]
pub struct InMemoryFileShareStore {
    shares: RwLock<HashMap<String, DirectoryMap>>,
}

impl InMemoryFileShareStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FileShareStore for InMemoryFileShareStore {
    async fn create_directory_if_absent(
        &self,
        share: &str,
        directory: &str,
    ) -> Result<(), StorageError> {
        let mut shares = self.shares.write().unwrap();
        shares
            .entry(share.to_string())
            .or_default()
            .entry(directory.to_string())
            .or_default();
        Ok(())
    }

    async fn upload_file(
        &self,
        share: &str,
        directory: &str,
        file_name: &str,
        content: Bytes,
    ) -> Result<String, StorageError> {
        check_file_name(file_name)?;
        let mut shares = self.shares.write().unwrap();
        shares
            .entry(share.to_string())
            .or_default()
            .entry(directory.to_string())
            .or_default()
            .insert(file_name.to_string(), content);
        Ok(file_name.to_string())
    }

    async fn download_file(
        &self,
        share: &str,
        directory: &str,
        file_name: &str,
    ) -> Result<Bytes, StorageError> {
        let shares = self.shares.read().unwrap();
        shares
            .get(share)
            .and_then(|dirs| dirs.get(directory))
            .and_then(|files| files.get(file_name))
            .cloned()
            .ok_or_else(|| missing_file(share, directory, file_name))
    }
}

/// File share service backed by a local directory tree laid out as
/// `root/share/directory/file`.
#[derive(Debug)]
pub struct LocalFileShareStore {
    root: PathBuf,
}

impl LocalFileShareStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn directory_path(&self, share: &str, directory: &str) -> PathBuf {
        let mut path = self.root.join(share);
        if !directory.is_empty() {
            path.push(directory);
        }
        path
    }
}

#[async_trait]
impl FileShareStore for LocalFileShareStore {
    async fn create_directory_if_absent(
        &self,
        share: &str,
        directory: &str,
    ) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(self.directory_path(share, directory)).await?;
        Ok(())
    }

    async fn upload_file(
        &self,
        share: &str,
        directory: &str,
        file_name: &str,
        content: Bytes,
    ) -> Result<String, StorageError> {
        check_file_name(file_name)?;
        self.create_directory_if_absent(share, directory).await?;
        let path = self.directory_path(share, directory).join(file_name);
        tokio::fs::write(&path, &content).await?;
        Ok(file_name.to_string())
    }

    async fn download_file(
        &self,
        share: &str,
        directory: &str,
        file_name: &str,
    ) -> Result<Bytes, StorageError> {
        check_file_name(file_name)?;
        let path = self.directory_path(share, directory).join(file_name);
        match tokio::fs::read(&path).await {
            Ok(content) => Ok(Bytes::from(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(missing_file(share, directory, file_name))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn uploaded_bytes_download_unchanged() {
        let store = InMemoryFileShareStore::new();
        let name = store
            .upload_file("contracts", "payments", "proof.pdf", Bytes::from_static(b"%PDF"))
            .await
            .unwrap();
        assert_eq!(name, "proof.pdf");

        let content = store
            .download_file("contracts", "payments", "proof.pdf")
            .await
            .unwrap();
        assert_eq!(content, Bytes::from_static(b"%PDF"));
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let store = InMemoryFileShareStore::new();
        store.create_directory_if_absent("contracts", "payments").await.unwrap();

        let err = store
            .download_file("contracts", "payments", "ghost.pdf")
            .await
            .unwrap_err();
        assert_matches!(err, StorageError::NotFound { .. });
    }

    #[tokio::test]
    async fn empty_directory_addresses_the_share_root() {
        let store = InMemoryFileShareStore::new();
        store
            .upload_file("contracts", "", "root.txt", Bytes::from_static(b"r"))
            .await
            .unwrap();
        let content = store.download_file("contracts", "", "root.txt").await.unwrap();
        assert_eq!(content, Bytes::from_static(b"r"));
    }

    #[tokio::test]
    async fn local_store_round_trips_and_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileShareStore::new(dir.path());

        store
            .upload_file("contracts", "payments", "a.pdf", Bytes::from_static(b"doc"))
            .await
            .unwrap();
        let content = store.download_file("contracts", "payments", "a.pdf").await.unwrap();
        assert_eq!(content, Bytes::from_static(b"doc"));
        assert!(dir.path().join("contracts/payments/a.pdf").exists());

        let err = store
            .download_file("contracts", "payments", "missing.pdf")
            .await
            .unwrap_err();
        assert_matches!(err, StorageError::NotFound { .. });
    }
}
