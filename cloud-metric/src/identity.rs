//! Project identity resolution
//!
//! The scoped API timer reports under the project the application runs in.
//! That id comes from the environment or, on GCP, from the metadata server.

use crate::auth::{METADATA_FLAVOR_HEADER, METADATA_FLAVOR_VALUE, METADATA_SERVER_URL};
use crate::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Environment variables consulted by [`EnvIdentity`], in order
pub const PROJECT_ENV_VARS: [&str; 2] = ["GOOGLE_CLOUD_PROJECT", "GCP_PROJECT_ID"];

/// Resolves the current application's project id
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn project_id(&self) -> Result<String>;
}

/// A fixed project id
#[derive(Debug, Clone)]
pub struct StaticIdentity(String);

impl StaticIdentity {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self(project_id.into())
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn project_id(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Key lookup used in place of the process environment
pub type EnvLookup = fn(&str) -> Option<String>;

fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Project id from `GOOGLE_CLOUD_PROJECT` or `GCP_PROJECT_ID`
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvIdentity;

impl EnvIdentity {
    fn resolve<F>(lookup: F) -> Result<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        PROJECT_ENV_VARS
            .iter()
            .filter_map(|key| lookup(key))
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty())
            .ok_or_else(|| {
                Error::Identity(format!(
                    "project id not set (checked {})",
                    PROJECT_ENV_VARS.join(", ")
                ))
            })
    }
}

#[async_trait]
impl IdentityProvider for EnvIdentity {
    async fn project_id(&self) -> Result<String> {
        Self::resolve(process_env)
    }
}

/// Project id from the GCE metadata server
#[derive(Debug, Clone)]
pub struct MetadataIdentity {
    metadata_url: String,
    http_client: reqwest::Client,
}

impl MetadataIdentity {
    pub fn new() -> Result<Self> {
        Self::with_base_url(METADATA_SERVER_URL)
    }

    pub fn with_base_url(metadata_url: &str) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| Error::Identity(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            metadata_url: metadata_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }
}

#[async_trait]
impl IdentityProvider for MetadataIdentity {
    async fn project_id(&self) -> Result<String> {
        let url = format!("{}/computeMetadata/v1/project/project-id", self.metadata_url);

        let response = self
            .http_client
            .get(&url)
            .header(METADATA_FLAVOR_HEADER, METADATA_FLAVOR_VALUE)
            .send()
            .await
            .map_err(|e| Error::Identity(format!("Failed to reach metadata server: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Identity(format!(
                "Metadata server returned status {} for project id",
                response.status()
            )));
        }

        let project_id = response
            .text()
            .await
            .map_err(|e| Error::Identity(format!("Failed to read project id: {}", e)))?
            .trim()
            .to_string();

        if project_id.is_empty() {
            return Err(Error::Identity("Metadata server returned an empty project id".into()));
        }

        Ok(project_id)
    }
}

/// Environment first, metadata server second
#[derive(Debug, Clone)]
pub struct AutoIdentity {
    metadata: MetadataIdentity,
    env_lookup: EnvLookup,
}

impl AutoIdentity {
    pub fn new() -> Result<Self> {
        Ok(Self::with_metadata(MetadataIdentity::new()?))
    }

    pub fn with_metadata(metadata: MetadataIdentity) -> Self {
        Self {
            metadata,
            env_lookup: process_env,
        }
    }

    /// Read project variables through `lookup` instead of the process environment
    pub fn with_env_lookup(mut self, lookup: EnvLookup) -> Self {
        self.env_lookup = lookup;
        self
    }
}

#[async_trait]
impl IdentityProvider for AutoIdentity {
    async fn project_id(&self) -> Result<String> {
        match EnvIdentity::resolve(self.env_lookup) {
            Ok(project_id) => Ok(project_id),
            Err(e) => {
                debug!(error = %e, "Project id not in environment, asking metadata server");
                self.metadata.project_id().await
            }
        }
    }
}
