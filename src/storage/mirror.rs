//! Object-storage mirror for the manifest

use crate::config::{ManifestConfig, MirrorConfig};
use crate::error::{PipelineError, Result};
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use std::path::Path;
use std::sync::Arc;

/// Uploads a single object, replacing it if it exists
pub struct ObjectMirror {
    store: Arc<dyn ObjectStore>,
    key: String,
    location: String,
}

impl ObjectMirror {
    /// Build the mirror described by the manifest config, `None` when disabled
    pub fn from_config(config: &ManifestConfig) -> Result<Option<Self>> {
        let mirror = match &config.mirror {
            MirrorConfig::Disabled => return Ok(None),
            MirrorConfig::Local { dir } => Self::local(dir, &config.object_key)?,
            MirrorConfig::S3 {
                bucket,
                region,
                endpoint,
            } => Self::s3(bucket, region, endpoint.as_deref(), &config.object_key)?,
        };
        Ok(Some(mirror))
    }

    /// Mirror into a local directory, created if missing
    pub fn local<P: AsRef<Path>>(dir: P, key: &str) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let canonical = std::fs::canonicalize(dir)?;
        let store = LocalFileSystem::new_with_prefix(&canonical)?;
        log::info!("Manifest mirror: local directory {}", canonical.display());
        Ok(Self {
            store: Arc::new(store),
            key: key.to_string(),
            location: format!("{}/{}", canonical.display(), key),
        })
    }

    /// Mirror into an S3 bucket. Credentials are read from the standard AWS
    /// environment variables.
    pub fn s3(bucket: &str, region: &str, endpoint: Option<&str>, key: &str) -> Result<Self> {
        if bucket.trim().is_empty() {
            return Err(PipelineError::Config("S3 bucket name is empty".to_string()));
        }

        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .with_region(region);

        if let Some(endpoint) = endpoint.filter(|e| !e.is_empty()) {
            let endpoint_url = if endpoint.starts_with("http://") || endpoint.starts_with("https://")
            {
                endpoint.to_string()
            } else {
                format!("https://{}", endpoint)
            };
            builder = builder
                .with_endpoint(&endpoint_url)
                .with_allow_http(endpoint_url.starts_with("http://"));
        }

        let store = builder.build()?;
        log::info!("Manifest mirror: s3://{}/{} (region: {})", bucket, key, region);
        Ok(Self {
            store: Arc::new(store),
            key: key.to_string(),
            location: format!("s3://{}/{}", bucket, key),
        })
    }

    /// Human-readable destination
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Upload `data`, replacing the current object
    pub async fn upload(&self, data: Vec<u8>) -> Result<()> {
        let path = ObjectPath::from(self.key.as_str());
        self.store
            .put(&path, bytes::Bytes::from(data).into())
            .await?;
        log::info!("Mirrored manifest to {}", self.location);
        Ok(())
    }

    /// Current object contents, `None` if it has not been uploaded yet
    pub async fn download(&self) -> Result<Option<Vec<u8>>> {
        let path = ObjectPath::from(self.key.as_str());
        match self.store.get(&path).await {
            Ok(result) => Ok(Some(result.bytes().await?.to_vec())),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
