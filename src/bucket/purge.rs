//! Bounded-parallelism object purge used by forced bucket deletion

use crate::gcp::storage::StorageApi;
use crate::gcp::types::ObjectVersion;
use futures::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, error, warn};

/// Number of deletions kept in flight.
///
/// One less than the available parallelism, at least one, unless the
/// provider configuration overrides it.
pub fn pool_size(configured: Option<usize>) -> usize {
    if let Some(n) = configured {
        return n.max(1);
    }

    std::thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1))
        .unwrap_or(1)
        .max(1)
}

/// Delete every listed object generation with at most `parallelism` calls in
/// flight. Returns how many deletions failed; failures are logged, not
/// propagated.
pub async fn purge_objects<S: StorageApi>(
    api: &S,
    bucket: &str,
    objects: &[ObjectVersion],
    parallelism: usize,
) -> usize {
    let failed = AtomicUsize::new(0);

    debug!(
        bucket = %bucket,
        objects = objects.len(),
        parallelism = parallelism,
        "Deleting object versions"
    );

    futures::stream::iter(objects)
        .for_each_concurrent(parallelism.max(1), |object| {
            let failed = &failed;
            async move {
                if let Err(e) = api.delete_object(bucket, object).await {
                    error!(
                        bucket = %bucket,
                        object = %object.name,
                        generation = object.generation,
                        error = %e,
                        "Failed to delete object"
                    );
                    failed.fetch_add(1, Ordering::Relaxed);
                }
            }
        })
        .await;

    let failed = failed.into_inner();
    if failed > 0 {
        warn!(
            bucket = %bucket,
            failed = failed,
            total = objects.len(),
            "Some object deletions failed"
        );
    }
    failed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gcp::http::ApiError;
    use crate::gcp::types::{BucketPatch, RemoteBucket};
    use anyhow::Result;
    use reqwest::StatusCode;
    use std::sync::Mutex;

    /// Object store where one generation can never be deleted
    struct Stubborn {
        undeletable: u64,
        deleted: Mutex<Vec<ObjectVersion>>,
    }

    impl StorageApi for Stubborn {
        async fn insert_bucket(&self, _: &str, _: &RemoteBucket) -> Result<RemoteBucket> {
            unreachable!()
        }
        async fn get_bucket(&self, _: &str) -> Result<RemoteBucket> {
            unreachable!()
        }
        async fn patch_bucket(&self, _: &str, _: &BucketPatch) -> Result<RemoteBucket> {
            unreachable!()
        }
        async fn delete_bucket(&self, _: &str) -> Result<()> {
            unreachable!()
        }
        async fn list_object_versions(&self, _: &str) -> Result<Vec<ObjectVersion>> {
            unreachable!()
        }
        async fn delete_object(&self, _: &str, object: &ObjectVersion) -> Result<()> {
            if object.generation == self.undeletable {
                return Err(ApiError {
                    status: StatusCode::FORBIDDEN,
                    message: "retention policy".to_string(),
                }
                .into());
            }
            self.deleted.lock().unwrap().push(object.clone());
            Ok(())
        }
        async fn project_id_for_number(&self, _: u64) -> Result<String> {
            unreachable!()
        }
    }

    #[tokio::test]
    async fn test_failed_delete_is_counted_and_others_proceed() {
        let objects: Vec<ObjectVersion> = (1..=6)
            .map(|generation| ObjectVersion {
                name: format!("obj-{}", generation),
                generation,
            })
            .collect();
        let api = Stubborn {
            undeletable: 3,
            deleted: Mutex::new(Vec::new()),
        };

        let failed = purge_objects(&api, "b", &objects, 2).await;

        assert_eq!(failed, 1);
        let mut deleted: Vec<u64> = api
            .deleted
            .lock()
            .unwrap()
            .iter()
            .map(|o| o.generation)
            .collect();
        deleted.sort_unstable();
        assert_eq!(deleted, vec![1, 2, 4, 5, 6]);
    }

    #[test]
    fn test_pool_size_is_at_least_one() {
        assert!(pool_size(None) >= 1);
        assert_eq!(pool_size(Some(0)), 1);
        assert_eq!(pool_size(Some(4)), 4);
    }

    #[test]
    fn test_pool_size_leaves_one_core_free() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(pool_size(None), cores.saturating_sub(1).max(1));
    }
}
