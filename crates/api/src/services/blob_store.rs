//! Blob storage for return evidence.
//!
//! Objects are addressed by `(bucket, path)`. [`S3BlobStore`] keeps them in
//! S3-compatible object storage; [`LocalBlobStore`] maps buckets to
//! sub-directories of a root directory.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Builder as S3ConfigBuilder, Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use thiserror::Error;

use crate::config::{S3StorageConfig, StorageBackend, StorageConfig};

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("Invalid blob path: {0}")]
    InvalidPath(String),

    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Blob storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Object storage error: {0}")]
    ObjectStore(String),
}

impl From<BlobError> for domain::LeadError {
    fn from(err: BlobError) -> Self {
        match err {
            BlobError::NotFound(path) => domain::LeadError::NotFound(format!("File {}", path)),
            other => domain::LeadError::Persistence(other.to_string()),
        }
    }
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, bucket: &str, path: &str, bytes: &[u8]) -> Result<(), BlobError>;

    async fn get(&self, bucket: &str, path: &str) -> Result<Vec<u8>, BlobError>;

    /// Removes an object; a missing object is not an error.
    async fn delete(&self, bucket: &str, path: &str) -> Result<(), BlobError>;
}

/// Builds the store selected by `storage.backend`.
pub async fn blob_store_from_config(config: &StorageConfig) -> Arc<dyn BlobStore> {
    match config.backend {
        StorageBackend::Local => Arc::new(LocalBlobStore::new(&config.root_dir)),
        StorageBackend::S3 => Arc::new(S3BlobStore::from_config(&config.s3).await),
    }
}

/// Rejects empty segments and anything that is not a plain relative path.
fn check_object_path(bucket: &str, path: &str) -> Result<(), BlobError> {
    for part in [bucket, path] {
        if part.is_empty()
            || Path::new(part)
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(BlobError::InvalidPath(format!("{}/{}", bucket, path)));
        }
    }
    Ok(())
}

/// S3-compatible object storage.
#[derive(Debug, Clone)]
pub struct S3BlobStore {
    client: S3Client,
    bucket_prefix: String,
}

impl S3BlobStore {
    pub async fn from_config(config: &S3StorageConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));
        if !config.endpoint.is_empty() {
            loader = loader.endpoint_url(&config.endpoint);
        }
        if !config.access_key.is_empty() {
            loader = loader.credentials_provider(Credentials::new(
                config.access_key.clone(),
                config.secret_key.clone(),
                None,
                None,
                "leadflow-config",
            ));
        }
        let base = loader.load().await;

        let s3_config = S3ConfigBuilder::from(&base)
            .force_path_style(config.force_path_style)
            .build();

        tracing::info!(
            endpoint = %config.endpoint,
            region = %config.region,
            bucket_prefix = %config.bucket_prefix,
            "S3 evidence storage configured"
        );
        Self::with_client(S3Client::from_conf(s3_config), &config.bucket_prefix)
    }

    pub fn with_client(client: S3Client, bucket_prefix: impl Into<String>) -> Self {
        Self {
            client,
            bucket_prefix: bucket_prefix.into(),
        }
    }

    fn bucket_name(&self, bucket: &str) -> String {
        format!("{}{}", self.bucket_prefix, bucket)
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, bucket: &str, path: &str, bytes: &[u8]) -> Result<(), BlobError> {
        check_object_path(bucket, path)?;
        let bucket_name = self.bucket_name(bucket);
        self.client
            .put_object()
            .bucket(&bucket_name)
            .key(path)
            .body(ByteStream::from(bytes.to_vec()))
            .send()
            .await
            .map_err(|e| {
                BlobError::ObjectStore(format!(
                    "put s3://{}/{}: {}",
                    bucket_name,
                    path,
                    e.into_service_error()
                ))
            })?;
        tracing::debug!(bucket = %bucket_name, path, size = bytes.len(), "Object stored");
        Ok(())
    }

    async fn get(&self, bucket: &str, path: &str) -> Result<Vec<u8>, BlobError> {
        check_object_path(bucket, path)?;
        let bucket_name = self.bucket_name(bucket);
        let output = match self
            .client
            .get_object()
            .bucket(&bucket_name)
            .key(path)
            .send()
            .await
        {
            Ok(output) => output,
            Err(e) => {
                let err = e.into_service_error();
                if err.is_no_such_key() {
                    return Err(BlobError::NotFound(format!("{}/{}", bucket, path)));
                }
                return Err(BlobError::ObjectStore(format!(
                    "get s3://{}/{}: {}",
                    bucket_name, path, err
                )));
            }
        };
        let data = output.body.collect().await.map_err(|e| {
            BlobError::ObjectStore(format!("read s3://{}/{}: {}", bucket_name, path, e))
        })?;
        Ok(data.into_bytes().to_vec())
    }

    async fn delete(&self, bucket: &str, path: &str) -> Result<(), BlobError> {
        check_object_path(bucket, path)?;
        let bucket_name = self.bucket_name(bucket);
        self.client
            .delete_object()
            .bucket(&bucket_name)
            .key(path)
            .send()
            .await
            .map_err(|e| {
                BlobError::ObjectStore(format!(
                    "delete s3://{}/{}: {}",
                    bucket_name,
                    path,
                    e.into_service_error()
                ))
            })?;
        Ok(())
    }
}

/// Filesystem-backed store.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Joins `bucket/path` under the root, refusing anything that could
    /// escape it.
    fn resolve(&self, bucket: &str, path: &str) -> Result<PathBuf, BlobError> {
        check_object_path(bucket, path)?;
        Ok(self.root.join(bucket).join(path))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, bucket: &str, path: &str, bytes: &[u8]) -> Result<(), BlobError> {
        let target = self.resolve(bucket, path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;
        tracing::debug!(bucket, path, size = bytes.len(), "Blob stored");
        Ok(())
    }

    async fn get(&self, bucket: &str, path: &str) -> Result<Vec<u8>, BlobError> {
        let target = self.resolve(bucket, path)?;
        tokio::fs::read(&target).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => BlobError::NotFound(format!("{}/{}", bucket, path)),
            _ => BlobError::Io(e),
        })
    }

    async fn delete(&self, bucket: &str, path: &str) -> Result<(), BlobError> {
        let target = self.resolve(bucket, path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Reduces a client file name to a safe single path segment.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn temp_store() -> (LocalBlobStore, PathBuf) {
        let root = std::env::temp_dir().join(format!("leadflow-blobs-{}", uuid::Uuid::new_v4()));
        (LocalBlobStore::new(&root), root)
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let (store, root) = temp_store();

        store
            .put("return-audio", "12/call.mp3", b"ID3 audio")
            .await
            .unwrap();
        assert!(root.join("return-audio").join("12").join("call.mp3").exists());
        assert_eq!(
            store.get("return-audio", "12/call.mp3").await.unwrap(),
            b"ID3 audio"
        );

        store.delete("return-audio", "12/call.mp3").await.unwrap();
        assert!(matches!(
            store.get("return-audio", "12/call.mp3").await,
            Err(BlobError::NotFound(_))
        ));
        store.delete("return-audio", "12/call.mp3").await.unwrap();

        let _ = std::fs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn test_escaping_paths_are_refused() {
        let (store, _root) = temp_store();
        for (bucket, object) in [
            ("return-images", "../secret"),
            ("..", "x"),
            ("return-images", "/etc/passwd"),
            ("return-images", ""),
        ] {
            assert!(matches!(
                store.put(bucket, object, b"x").await,
                Err(BlobError::InvalidPath(_))
            ));
        }
    }

    async fn s3_store(server: &MockServer) -> S3BlobStore {
        S3BlobStore::from_config(&S3StorageConfig {
            endpoint: server.uri(),
            region: "us-east-1".to_string(),
            access_key: "minio".to_string(),
            secret_key: "minio-secret".to_string(),
            bucket_prefix: "leadflow-".to_string(),
            force_path_style: true,
        })
        .await
    }

    #[tokio::test]
    async fn test_s3_put_and_get() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/leadflow-return-audio/12/call.mp3"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/leadflow-return-audio/12/call.mp3"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ID3 audio".to_vec()))
            .mount(&server)
            .await;

        let store = s3_store(&server).await;
        store
            .put("return-audio", "12/call.mp3", b"ID3 audio")
            .await
            .unwrap();
        assert_eq!(
            store.get("return-audio", "12/call.mp3").await.unwrap(),
            b"ID3 audio"
        );
    }

    #[tokio::test]
    async fn test_s3_missing_key_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/leadflow-return-images/3/dni.jpg"))
            .respond_with(
                ResponseTemplate::new(404)
                    .insert_header("content-type", "application/xml")
                    .set_body_string(
                        r#"<?xml version="1.0" encoding="UTF-8"?><Error><Code>NoSuchKey</Code><Message>The specified key does not exist.</Message></Error>"#,
                    ),
            )
            .mount(&server)
            .await;

        let store = s3_store(&server).await;
        assert!(matches!(
            store.get("return-images", "3/dni.jpg").await,
            Err(BlobError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_s3_delete_and_invalid_path() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/leadflow-return-audio/12/call.mp3"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let store = s3_store(&server).await;
        store.delete("return-audio", "12/call.mp3").await.unwrap();
        assert!(matches!(
            store.put("return-audio", "../other", b"x").await,
            Err(BlobError::InvalidPath(_))
        ));
    }

    #[tokio::test]
    async fn test_store_follows_configured_backend() {
        let root = std::env::temp_dir().join(format!("leadflow-blobs-{}", uuid::Uuid::new_v4()));
        let config = StorageConfig {
            root_dir: root.to_string_lossy().into_owned(),
            ..StorageConfig::default()
        };
        let store = blob_store_from_config(&config).await;
        store.put("return-images", "1/a.png", b"png").await.unwrap();
        assert!(root.join("return-images").join("1").join("a.png").exists());

        let _ = std::fs::remove_dir_all(root);
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("llamada 1.mp3"), "llamada_1.mp3");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\fotos\\dni.jpg"), "dni.jpg");
        assert_eq!(sanitize_file_name(".."), "file");
    }
}
