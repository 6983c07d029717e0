//! GCP Client
//!
//! Main client for interacting with GCP APIs, combining authentication
//! and HTTP functionality.

use super::auth::GcpCredentials;
use super::http::GcpHttpClient;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub const DEFAULT_STORAGE_ENDPOINT: &str = "https://storage.googleapis.com";
pub const DEFAULT_RESOURCE_MANAGER_ENDPOINT: &str = "https://cloudresourcemanager.googleapis.com";

/// Base URLs for the APIs this client talks to. Overridable for emulators
/// and tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub storage: String,
    pub resource_manager: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            storage: DEFAULT_STORAGE_ENDPOINT.to_string(),
            resource_manager: DEFAULT_RESOURCE_MANAGER_ENDPOINT.to_string(),
        }
    }
}

/// Main GCP client
#[derive(Clone)]
pub struct GcpClient {
    pub credentials: GcpCredentials,
    pub http: GcpHttpClient,
    pub endpoints: Endpoints,
}

impl GcpClient {
    /// Create a new GCP client using ambient credentials
    pub async fn new(endpoints: Endpoints) -> Result<Self> {
        let credentials = GcpCredentials::new()
            .await
            .context("Failed to initialize GCP credentials")?;

        Self::with_credentials(credentials, endpoints)
    }

    /// Create a client around explicit credentials
    pub fn with_credentials(credentials: GcpCredentials, endpoints: Endpoints) -> Result<Self> {
        let http = GcpHttpClient::new()?;

        Ok(Self {
            credentials,
            http,
            endpoints,
        })
    }

    /// Get the current access token
    pub async fn get_token(&self) -> Result<String> {
        self.credentials.get_token().await
    }

    /// Make a GET request to a GCP API
    pub async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let token = self.get_token().await?;
        self.http.get(url, &token).await
    }

    /// Make a POST request to a GCP API
    pub async fn post<T, B>(&self, url: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let token = self.get_token().await?;
        self.http.post(url, &token, body).await
    }

    /// Make a PATCH request to a GCP API
    pub async fn patch<T, B>(&self, url: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let token = self.get_token().await?;
        self.http.patch(url, &token, body).await
    }

    /// Make a DELETE request to a GCP API
    pub async fn delete(&self, url: &str) -> Result<()> {
        let token = self.get_token().await?;
        self.http.delete(url, &token).await
    }

    // =========================================================================
    // Cloud Storage API helpers
    // =========================================================================

    /// Build Cloud Storage API URL
    pub fn storage_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/{}",
            self.endpoints.storage.trim_end_matches('/'),
            path
        )
    }

    /// Build Cloud Storage bucket URL
    pub fn storage_bucket_url(&self, bucket: &str) -> String {
        self.storage_url(&format!("b/{}", urlencoding::encode(bucket)))
    }

    /// Build Cloud Storage objects URL
    pub fn storage_objects_url(&self, bucket: &str) -> String {
        self.storage_url(&format!("b/{}/o", urlencoding::encode(bucket)))
    }

    /// Build Cloud Storage single object URL
    pub fn storage_object_url(&self, bucket: &str, object: &str) -> String {
        format!(
            "{}/{}",
            self.storage_objects_url(bucket),
            urlencoding::encode(object)
        )
    }

    // =========================================================================
    // Resource Manager API helpers
    // =========================================================================

    /// Build Resource Manager API URL
    pub fn resourcemanager_url(&self, path: &str) -> String {
        format!(
            "{}/v1/{}",
            self.endpoints.resource_manager.trim_end_matches('/'),
            path
        )
    }
}

/// Format a GCP API error for display
pub fn format_gcp_error(error: &anyhow::Error) -> String {
    super::http::format_gcp_error(error)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GcpClient {
        GcpClient::with_credentials(
            GcpCredentials::from_token("t"),
            Endpoints {
                storage: "http://localhost:9000/".to_string(),
                resource_manager: "http://localhost:9001".to_string(),
            },
        )
        .unwrap()
    }

    #[test]
    fn test_storage_urls() {
        let client = client();
        assert_eq!(
            client.storage_bucket_url("my-bucket"),
            "http://localhost:9000/storage/v1/b/my-bucket"
        );
        assert_eq!(
            client.storage_object_url("my-bucket", "dir/file name.txt"),
            "http://localhost:9000/storage/v1/b/my-bucket/o/dir%2Ffile%20name.txt"
        );
    }

    #[test]
    fn test_resourcemanager_url() {
        assert_eq!(
            client().resourcemanager_url("projects/123"),
            "http://localhost:9001/v1/projects/123"
        );
    }
}
