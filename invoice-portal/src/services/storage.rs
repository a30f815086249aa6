use crate::config::{StorageBackend, StorageSettings};
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;
use service_core::error::AppError;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::fs;

/// Object store holding the invoice PDFs. Objects are publicly readable at
/// `public_base() + key`.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn upload(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), AppError>;
    async fn delete(&self, key: &str) -> Result<(), AppError>;

    /// URL prefix of every object, ending in `/`.
    fn public_base(&self) -> &str;

    fn public_url(&self, key: &str) -> String {
        format!("{}{}", self.public_base(), key)
    }

    /// Inverse of [`Storage::public_url`]; `None` for URLs outside this store.
    fn key_for_url(&self, url: &str) -> Option<String> {
        url.strip_prefix(self.public_base())
            .filter(|key| !key.is_empty())
            .map(str::to_string)
    }
}

fn with_trailing_slash(url: &str) -> String {
    format!("{}/", url.trim_end_matches('/'))
}

pub fn s3_public_base(bucket: &str, region: &str) -> String {
    format!("https://{}.s3.{}.amazonaws.com/", bucket, region)
}

/// Filesystem store; the portal serves the directory itself under `/files`.
pub struct LocalStorage {
    base_path: PathBuf,
    public_base: String,
}

impl LocalStorage {
    pub async fn new(base_path: impl Into<PathBuf>, public_url: &str) -> Result<Self, AppError> {
        let base_path = base_path.into();
        if !base_path.exists() {
            fs::create_dir_all(&base_path).await?;
        }
        Ok(Self {
            base_path,
            public_base: with_trailing_slash(public_url),
        })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, AppError> {
        let relative = Path::new(key);
        let confined = !key.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !confined {
            return Err(AppError::invalid(format!("Invalid object key: {}", key)));
        }
        Ok(self.base_path.join(relative))
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn upload(&self, key: &str, data: Bytes, _content_type: &str) -> Result<(), AppError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, &data).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        let path = self.path_for(key)?;
        if path.exists() {
            fs::remove_file(path).await?;
        }
        Ok(())
    }

    fn public_base(&self) -> &str {
        &self.public_base
    }
}

pub struct S3Storage {
    client: S3Client,
    bucket: String,
    public_base: String,
}

impl S3Storage {
    pub fn new(client: S3Client, bucket: String, region: &str) -> Self {
        let public_base = s3_public_base(&bucket, region);
        Self {
            client,
            bucket,
            public_base,
        }
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn upload(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), AppError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| AppError::StorageError(anyhow::anyhow!("S3 upload failed: {}", e)))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::StorageError(anyhow::anyhow!("S3 delete failed: {}", e)))?;
        Ok(())
    }

    fn public_base(&self) -> &str {
        &self.public_base
    }
}

/// Build the configured store. S3 credentials come from the standard AWS
/// provider chain and never leave the server.
pub async fn from_settings(settings: &StorageSettings) -> Result<Arc<dyn Storage>, AppError> {
    match settings.backend {
        StorageBackend::Local => {
            let public_url = settings.local_public_url()?;
            let storage = LocalStorage::new(&settings.local_path, &public_url).await?;
            tracing::info!(path = %settings.local_path, "Using local object storage");
            Ok(Arc::new(storage))
        }
        StorageBackend::S3 => {
            let (bucket, region) = settings.s3_location()?;
            let aws = aws_config::defaults(aws_config::BehaviorVersion::latest())
                .region(aws_sdk_s3::config::Region::new(region.clone()))
                .load()
                .await;
            tracing::info!(bucket = %bucket, region = %region, "Using S3 object storage");
            Ok(Arc::new(S3Storage::new(S3Client::new(&aws), bucket, &region)))
        }
    }
}
