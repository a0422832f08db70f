//! services/api/src/adapters/blob.rs
//!
//! Filesystem implementation of the `BlobStoreService` port, with signed
//! download URLs served back through the API's own `/api/blob` route.
//! S3-compatible storage can replace this behind the same port.

use std::path::PathBuf;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use skilldeck_core::ports::{BlobStoreService, PortError, PortResult};

/// Stores blobs under `root/<key>` and signs download URLs with a shared
/// secret, so a leaked URL stops working once it expires.
pub struct FsBlobStore {
    root: PathBuf,
    base_url: String,
    secret: String,
}

impl FsBlobStore {
    pub fn new(root: PathBuf, base_url: String, secret: String) -> Self {
        Self {
            root,
            base_url,
            secret,
        }
    }

    /// Keys come from our own key builder, but never trust them as paths.
    fn resolve(&self, key: &str) -> PortResult<PathBuf> {
        if key.split('/').any(|part| part.is_empty() || part == "..") {
            return Err(PortError::NotFound("file not found".to_string()));
        }
        Ok(self.root.join(key))
    }

    fn signature(&self, key: &str, file_name: &str, expires_at: i64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(b"\n");
        hasher.update(key.as_bytes());
        hasher.update(b"\n");
        hasher.update(file_name.as_bytes());
        hasher.update(b"\n");
        hasher.update(expires_at.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Checks an incoming download request against its signature and
    /// expiry, returning the on-disk path when valid.
    pub fn verify_download(
        &self,
        key: &str,
        file_name: &str,
        expires_at: i64,
        signature: &str,
    ) -> PortResult<PathBuf> {
        if chrono::Utc::now().timestamp() > expires_at {
            return Err(PortError::Expired("download link expired".to_string()));
        }
        if self.signature(key, file_name, expires_at) != signature {
            return Err(PortError::NotFound("file not found".to_string()));
        }
        self.resolve(key)
    }
}

#[async_trait]
impl BlobStoreService for FsBlobStore {
    async fn put(&self, key: &str, bytes: &[u8], _content_type: &str) -> PortResult<()> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PortError::Unexpected(format!("blob mkdir failed: {e}")))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| PortError::Unexpected(format!("blob write failed: {e}")))
    }

    async fn delete(&self, key: &str) -> PortResult<()> {
        let path = self.resolve(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            // Deleting bytes that are already gone is not an error.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PortError::Unexpected(format!("blob delete failed: {e}"))),
        }
    }

    async fn signed_download_url(
        &self,
        key: &str,
        file_name: &str,
        ttl_seconds: u64,
    ) -> PortResult<String> {
        let expires_at = chrono::Utc::now().timestamp() + ttl_seconds as i64;
        let signature = self.signature(key, file_name, expires_at);
        let mut url = url::Url::parse(&format!("{}/api/blob/{}", self.base_url, key))
            .map_err(|e| PortError::Unexpected(format!("bad blob URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("name", file_name)
            .append_pair("exp", &expires_at.to_string())
            .append_pair("sig", &signature);
        Ok(url.to_string())
    }
}
