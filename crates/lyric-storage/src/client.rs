//! R2 client implementation.

use std::path::Path;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Builder;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use aws_types::region::Region;
use tracing::{debug, info};

use lyric_models::JobId;

use crate::error::{StorageError, StorageResult};
use crate::uploader::{render_key, Uploader};

/// Configuration for R2 client.
#[derive(Debug, Clone)]
pub struct R2Config {
    /// R2 endpoint URL (S3 API endpoint)
    pub endpoint_url: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Bucket name
    pub bucket_name: String,
    /// Region (usually "auto" for R2)
    pub region: String,
    /// Public base URL the bucket is served from; no URL is reported without it
    pub public_url: Option<String>,
}

impl R2Config {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Whether the mandatory R2 variables are present in the environment.
    pub fn is_configured() -> bool {
        std::env::var("R2_ENDPOINT_URL").is_ok() && std::env::var("R2_BUCKET_NAME").is_ok()
    }

    /// Create config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> StorageResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| StorageError::config_error(format!("{} not set", name)))
        };

        Ok(Self {
            endpoint_url: required("R2_ENDPOINT_URL")?,
            access_key_id: required("R2_ACCESS_KEY_ID")?,
            secret_access_key: required("R2_SECRET_ACCESS_KEY")?,
            bucket_name: required("R2_BUCKET_NAME")?,
            region: lookup("R2_REGION").unwrap_or_else(|| "auto".to_string()),
            public_url: lookup("R2_PUBLIC_URL").filter(|v| !v.trim().is_empty()),
        })
    }
}

/// Cloudflare R2 storage client.
#[derive(Clone)]
pub struct R2Client {
    client: Client,
    bucket: String,
    public_url: Option<String>,
}

impl R2Client {
    /// Create a new R2 client from configuration.
    pub async fn new(config: R2Config) -> StorageResult<Self> {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "r2",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        let client = Client::from_conf(sdk_config);

        Ok(Self {
            client,
            bucket: config.bucket_name,
            public_url: config.public_url,
        })
    }

    /// Create from environment variables.
    pub async fn from_env() -> StorageResult<Self> {
        let config = R2Config::from_env()?;
        Self::new(config).await
    }

    /// Bucket uploads go to.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Upload a file to R2.
    pub async fn upload_file(
        &self,
        path: impl AsRef<Path>,
        key: &str,
        content_type: &str,
    ) -> StorageResult<()> {
        let path = path.as_ref();
        debug!("Uploading {} to {}", path.display(), key);

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        info!("Uploaded {} to {}", path.display(), key);
        Ok(())
    }

    /// Public URL for `key`, when a public base URL is configured.
    pub fn public_url_for(&self, key: &str) -> Option<String> {
        self.public_url.as_deref().map(|base| join_public_url(base, key))
    }
}

#[async_trait]
impl Uploader for R2Client {
    async fn upload_render(
        &self,
        path: &Path,
        job_id: &JobId,
        project_id: Option<&str>,
    ) -> StorageResult<Option<String>> {
        let key = render_key(job_id, project_id);
        self.upload_file(path, &key, "video/mp4").await?;
        Ok(self.public_url_for(&key))
    }
}

fn join_public_url(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_config_from_lookup() {
        let env = vars(&[
            ("R2_ENDPOINT_URL", "https://acct.r2.cloudflarestorage.com"),
            ("R2_ACCESS_KEY_ID", "key"),
            ("R2_SECRET_ACCESS_KEY", "secret"),
            ("R2_BUCKET_NAME", "renders"),
            ("R2_PUBLIC_URL", "https://cdn.example.com/"),
        ]);
        let config = R2Config::from_lookup(|k| env.get(k).cloned()).unwrap();
        assert_eq!(config.region, "auto");
        assert_eq!(config.bucket_name, "renders");
        assert_eq!(config.public_url.as_deref(), Some("https://cdn.example.com/"));
    }

    #[test]
    fn test_config_missing_variable() {
        let env = vars(&[("R2_ENDPOINT_URL", "https://x"), ("R2_ACCESS_KEY_ID", "key")]);
        let err = R2Config::from_lookup(|k| env.get(k).cloned()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to configure storage client: R2_SECRET_ACCESS_KEY not set"
        );
    }

    #[test]
    fn test_join_public_url() {
        assert_eq!(
            join_public_url("https://cdn.example.com/", "renders/p/j.mp4"),
            "https://cdn.example.com/renders/p/j.mp4"
        );
        assert_eq!(
            join_public_url("https://cdn.example.com", "/a.mp4"),
            "https://cdn.example.com/a.mp4"
        );
    }

    #[tokio::test]
    async fn test_client_public_url() {
        let config = R2Config {
            endpoint_url: "https://acct.r2.cloudflarestorage.com".to_string(),
            access_key_id: "key".to_string(),
            secret_access_key: "secret".to_string(),
            bucket_name: "renders".to_string(),
            region: "auto".to_string(),
            public_url: Some("https://cdn.example.com".to_string()),
        };
        let client = R2Client::new(config.clone()).await.unwrap();
        assert_eq!(client.bucket(), "renders");
        assert_eq!(
            client.public_url_for("renders/default/abc.mp4").as_deref(),
            Some("https://cdn.example.com/renders/default/abc.mp4")
        );

        let private = R2Client::new(R2Config { public_url: None, ..config }).await.unwrap();
        assert!(private.public_url_for("x.mp4").is_none());
    }
}
