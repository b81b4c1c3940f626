/*!
 * Blob store: named binary objects grouped into containers.
 *
 * Containers are created lazily on first upload. Uploading to an existing
 * blob name silently replaces its content, and uploads hand back a stable
 * URI that can be persisted on the owning entity.
 */

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;

use super::StorageError;

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Lazily creates the container; repeated calls are no-ops.
    async fn create_container_if_absent(&self, container: &str) -> Result<(), StorageError>;

    /// Stores `content` under `blob_name`, creating the container if needed
    /// and overwriting any existing blob of the same name. Returns the URI
    /// of the stored blob.
    async fn upload(
        &self,
        container: &str,
        blob_name: &str,
        content: Bytes,
    ) -> Result<String, StorageError>;

    /// Removes a blob. Deleting a blob that does not exist is a no-op.
    async fn delete(&self, container: &str, blob_name: &str) -> Result<(), StorageError>;
}

fn check_blob_name(name: &str) -> Result<(), StorageError> {
    if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
        return Err(StorageError::Transport(format!(
            "invalid blob name '{}'",
            name
        )));
    }
    Ok(())
}

/// In-memory blob store; URIs use the `memory://` scheme.
#[derive(Debug)]
pub struct InMemoryBlobStore {
    containers: RwLock<HashMap<String, HashMap<String, Bytes>>>,
    base_url: String,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self {
            containers: RwLock::new(HashMap::new()),
            base_url: "memory://".to_string(),
        }
    }

    /// Test hook: the current content of a blob, if present.
    pub fn content(&self, container: &str, blob_name: &str) -> Option<Bytes> {
        let containers = self.containers.read().unwrap();
        containers
            .get(container)
            .and_then(|blobs| blobs.get(blob_name))
            .cloned()
    }
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn create_container_if_absent(&self, container: &str) -> Result<(), StorageError> {
        let mut containers = self.containers.write().unwrap();
        containers.entry(container.to_string()).or_default();
        Ok(())
    }

    async fn upload(
        &self,
        container: &str,
        blob_name: &str,
        content: Bytes,
    ) -> Result<String, StorageError> {
        check_blob_name(blob_name)?;
        let mut containers = self.containers.write().unwrap();
        containers
            .entry(container.to_string())
            .or_default()
            .insert(blob_name.to_string(), content);
        Ok(format!("{}/{}/{}", self.base_url, container, blob_name))
    }

    async fn delete(&self, container: &str, blob_name: &str) -> Result<(), StorageError> {
        let mut containers = self.containers.write().unwrap();
        if let Some(blobs) = containers.get_mut(container) {
            blobs.remove(blob_name);
        }
        Ok(())
    }
}

/// Blob store backed by a local directory tree, one subdirectory per
/// container. URIs use the `file://` scheme.
#[derive(Debug)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn blob_path(&self, container: &str, blob_name: &str) -> PathBuf {
        self.root.join(container).join(blob_name)
    }

    fn blob_uri(path: &Path) -> String {
        format!("file://{}", path.display())
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn create_container_if_absent(&self, container: &str) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(self.root.join(container)).await?;
        Ok(())
    }

    async fn upload(
        &self,
        container: &str,
        blob_name: &str,
        content: Bytes,
    ) -> Result<String, StorageError> {
        check_blob_name(blob_name)?;
        self.create_container_if_absent(container).await?;
        let path = self.blob_path(container, blob_name);
        tokio::fs::write(&path, &content).await?;
        Ok(Self::blob_uri(&path))
    }

    async fn delete(&self, container: &str, blob_name: &str) -> Result<(), StorageError> {
        match tokio::fs::remove_file(self.blob_path(container, blob_name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
