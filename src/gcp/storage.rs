//! Cloud Storage operations
//!
//! [`StorageApi`] is the seam between the bucket controller and the remote
//! service. [`GcpClient`] implements it against the JSON API.

use super::client::GcpClient;
use super::projects;
use super::types::{BucketPatch, ObjectList, ObjectVersion, RemoteBucket};
use anyhow::{Context, Result};
use std::future::Future;
use url::Url;

/// Remote calls needed to manage a bucket
pub trait StorageApi: Sync {
    /// `POST /b?project=` with a full bucket body
    fn insert_bucket(
        &self,
        project: &str,
        bucket: &RemoteBucket,
    ) -> impl Future<Output = Result<RemoteBucket>> + Send;

    /// `GET /b/{bucket}`
    fn get_bucket(&self, name: &str) -> impl Future<Output = Result<RemoteBucket>> + Send;

    /// `PATCH /b/{bucket}` with a sparse body
    fn patch_bucket(
        &self,
        name: &str,
        patch: &BucketPatch,
    ) -> impl Future<Output = Result<RemoteBucket>> + Send;

    /// `DELETE /b/{bucket}`; fails remotely unless the bucket is empty
    fn delete_bucket(&self, name: &str) -> impl Future<Output = Result<()>> + Send;

    /// Every object generation in the bucket, all pages
    fn list_object_versions(
        &self,
        bucket: &str,
    ) -> impl Future<Output = Result<Vec<ObjectVersion>>> + Send;

    /// Delete one specific object generation
    fn delete_object(
        &self,
        bucket: &str,
        object: &ObjectVersion,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Resolve a numeric project number to its project ID
    fn project_id_for_number(&self, number: u64) -> impl Future<Output = Result<String>> + Send;
}

impl GcpClient {
    fn object_list_url(&self, bucket: &str, page_token: Option<&str>) -> Result<String> {
        let mut url = Url::parse(&self.storage_objects_url(bucket))
            .context("Invalid Cloud Storage endpoint")?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("versions", "true");
            if let Some(token) = page_token {
                query.append_pair("pageToken", token);
            }
        }

        Ok(url.into())
    }
}

impl StorageApi for GcpClient {
    async fn insert_bucket(&self, project: &str, bucket: &RemoteBucket) -> Result<RemoteBucket> {
        let url = format!(
            "{}?project={}",
            self.storage_url("b"),
            urlencoding::encode(project)
        );
        self.post(&url, bucket)
            .await
            .with_context(|| format!("Failed to create bucket {}", bucket.name))
    }

    async fn get_bucket(&self, name: &str) -> Result<RemoteBucket> {
        self.get(&self.storage_bucket_url(name))
            .await
            .with_context(|| format!("Failed to read bucket {}", name))
    }

    async fn patch_bucket(&self, name: &str, patch: &BucketPatch) -> Result<RemoteBucket> {
        self.patch(&self.storage_bucket_url(name), patch)
            .await
            .with_context(|| format!("Failed to patch bucket {}", name))
    }

    async fn delete_bucket(&self, name: &str) -> Result<()> {
        self.delete(&self.storage_bucket_url(name))
            .await
            .with_context(|| format!("Failed to delete bucket {}", name))
    }

    async fn list_object_versions(&self, bucket: &str) -> Result<Vec<ObjectVersion>> {
        let mut all_items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let url = self.object_list_url(bucket, page_token.as_deref())?;
            let page: ObjectList = self
                .get(&url)
                .await
                .with_context(|| format!("Failed to list objects in bucket {}", bucket))?;
            all_items.extend(page.items);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(all_items)
    }

    async fn delete_object(&self, bucket: &str, object: &ObjectVersion) -> Result<()> {
        let url = format!(
            "{}?generation={}",
            self.storage_object_url(bucket, &object.name),
            object.generation
        );
        self.delete(&url).await.with_context(|| {
            format!(
                "Failed to delete object {}#{} in bucket {}",
                object.name, object.generation, bucket
            )
        })
    }

    async fn project_id_for_number(&self, number: u64) -> Result<String> {
        projects::get_project(self, number)
            .await
            .map(|project| project.project_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gcp::auth::GcpCredentials;
    use crate::gcp::client::Endpoints;

    #[test]
    fn test_object_list_url_pages() {
        let client = GcpClient::with_credentials(
            GcpCredentials::from_token("t"),
            Endpoints {
                storage: "http://localhost:9000".to_string(),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(
            client.object_list_url("b", None).unwrap(),
            "http://localhost:9000/storage/v1/b/b/o?versions=true"
        );
        assert_eq!(
            client.object_list_url("b", Some("tok=1")).unwrap(),
            "http://localhost:9000/storage/v1/b/b/o?versions=true&pageToken=tok%3D1"
        );
    }
}
