//! Temporary asset store.
//!
//! URL-based providers cannot accept inline bytes; they fetch their source
//! images over HTTP. This crate uploads request images to a short-lived
//! public S3 location and deletes them on demand. Every upload is recorded
//! in the `temporary_assets` table so the background sweep can reclaim
//! anything a request failed to clean up.
//!
//! [`AssetStore`] is the seam the pipeline depends on; [`S3AssetStore`] is
//! the production implementation.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use uuid::Uuid;

use pixshop_db::repositories::TempAssetRepo;
use pixshop_db::DbPool;

/// Errors from the temporary asset store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The object could not be written to the backing bucket.
    #[error("Upload failed: {0}")]
    Upload(String),

    /// The object could not be removed from the backing bucket.
    #[error("Delete failed: {0}")]
    Delete(String),

    /// A metadata query failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Handle to one uploaded object: the key used for deletion and the public
/// URL handed to the provider.
#[derive(Debug, Clone)]
pub struct StoredAsset {
    pub key: String,
    pub url: String,
}

/// Upload/delete contract for temporary provider-visible images.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Upload one image, returning its key and fetchable URL.
    async fn upload(
        &self,
        data: Vec<u8>,
        mime: &str,
        owner_tag: &str,
    ) -> Result<StoredAsset, StoreError>;

    /// Delete a previously uploaded object by key.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// S3 bucket configuration for the store.
#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    /// Key prefix under which all temporary objects live (e.g. `tmp`).
    pub key_prefix: String,
}

/// Production [`AssetStore`] backed by a public S3 bucket.
pub struct S3AssetStore {
    client: aws_sdk_s3::Client,
    config: S3Config,
    pool: DbPool,
}

impl S3AssetStore {
    /// Build a store from the ambient AWS credential chain.
    pub async fn new(config: S3Config, pool: DbPool) -> Self {
        let aws_config = aws_config::load_from_env().await;
        let client = aws_sdk_s3::Client::new(&aws_config);
        Self {
            client,
            config,
            pool,
        }
    }

    /// Virtual-hosted public URL for an object key.
    fn public_url(&self, key: &str) -> String {
        format!(
            "https://{}.s3.{}.amazonaws.com/{key}",
            self.config.bucket, self.config.region
        )
    }

    /// File extension for the object key, derived from the MIME type.
    fn extension_for(mime: &str) -> &'static str {
        match mime {
            "image/jpeg" => "jpg",
            "image/webp" => "webp",
            "image/heic" => "heic",
            _ => "png",
        }
    }
}

#[async_trait]
impl AssetStore for S3AssetStore {
    async fn upload(
        &self,
        data: Vec<u8>,
        mime: &str,
        owner_tag: &str,
    ) -> Result<StoredAsset, StoreError> {
        let key = format!(
            "{}/{}.{}",
            self.config.key_prefix,
            Uuid::new_v4(),
            Self::extension_for(mime)
        );

        self.client
            .put_object()
            .bucket(&self.config.bucket)
            .key(&key)
            .content_type(mime)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| StoreError::Upload(e.to_string()))?;

        let url = self.public_url(&key);

        // The metadata row only backs the sweep; the object itself is live,
        // so a failed insert downgrades to a warning rather than failing
        // the upload.
        if let Err(e) = TempAssetRepo::create(&self.pool, &key, &url, owner_tag).await {
            tracing::warn!(key = %key, error = %e, "Failed to record temporary asset metadata");
        }

        tracing::debug!(key = %key, owner = %owner_tag, "Uploaded temporary asset");
        Ok(StoredAsset { key, url })
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.client
            .delete_object()
            .bucket(&self.config.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StoreError::Delete(e.to_string()))?;

        if let Err(e) = TempAssetRepo::delete_by_key(&self.pool, key).await {
            tracing::warn!(key = %key, error = %e, "Failed to remove temporary asset metadata");
        }

        tracing::debug!(key = %key, "Deleted temporary asset");
        Ok(())
    }
}
