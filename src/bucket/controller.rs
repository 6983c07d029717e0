//! Bucket resource controller
//!
//! Drives a bucket through create, read, update, delete and import against a
//! [`StorageApi`]. Planning is pure (see [`super::diff`]); every method here
//! that talks to the remote logs its milestone and propagates errors with
//! context.

use super::config::{BucketConfig, BucketSpec};
use super::diff::{customize_diff, Plan};
use super::model::{Cors, LifecycleRule};
use super::patch::build_patch;
use super::purge::{pool_size, purge_objects};
use super::state::BucketState;
use crate::config::ProviderConfig;
use crate::error::BucketError;
use crate::gcp::http::{is_not_found, is_rate_limited, is_transient};
use crate::gcp::storage::StorageApi;
use crate::gcp::types::{ObjectVersion, RemoteBucket, WireBilling, WireLifecycle};
use crate::retry::{retry_with_backoff, RetryConfig};
use anyhow::{anyhow, Context, Result};
use std::collections::HashSet;
use tracing::{debug, info, warn};

pub struct BucketController<S: StorageApi> {
    api: S,
    provider: ProviderConfig,
    delete_retry: RetryConfig,
}

impl<S: StorageApi> BucketController<S> {
    pub fn new(api: S, provider: ProviderConfig) -> Self {
        Self {
            api,
            provider,
            delete_retry: RetryConfig::rate_limited(),
        }
    }

    /// Override how the final bucket delete backs off on rate limiting
    pub fn with_delete_retry(mut self, config: RetryConfig) -> Self {
        self.delete_retry = config;
        self
    }

    pub fn api(&self) -> &S {
        &self.api
    }

    /// Validate `config` and diff it against `prior`. Makes no remote calls.
    pub fn plan(&self, config: &BucketConfig, prior: Option<&BucketState>) -> Result<Plan> {
        let spec = config.validate()?;
        Ok(customize_diff(&self.provider.default_labels, &spec, prior))
    }

    /// Create the bucket described by `plan` and read it back
    pub async fn create(&self, plan: &Plan) -> Result<BucketState> {
        let spec = &plan.spec;
        let project = spec
            .project
            .clone()
            .or_else(|| self.provider.effective_project())
            .ok_or_else(|| {
                BucketError::validation(format!(
                    "project: no project set for bucket {} and no provider default",
                    spec.name
                ))
            })?;

        let body = insert_body(spec, plan);
        info!(bucket = %spec.name, project = %project, "Creating bucket");

        let created = retry_with_backoff(
            &self.provider.retry.to_retry_config(),
            "insert bucket",
            is_transient,
            || self.api.insert_bucket(&project, &body),
        )
        .await?;
        info!(bucket = %created.name, id = %created.id, "Bucket created");

        let seed = BucketState {
            id: created.id.clone(),
            name: spec.name.clone(),
            project: spec.project.clone(),
            force_destroy: spec.force_destroy,
            labels: spec.labels.clone(),
            terraform_labels: plan.labels.terraform_labels.clone(),
            ..Default::default()
        };

        self.read(&seed)
            .await?
            .ok_or_else(|| anyhow!("Bucket {} was created but could not be read back", spec.name))
    }

    /// Refresh state from the remote. `Ok(None)` means the bucket is gone.
    pub async fn read(&self, prior: &BucketState) -> Result<Option<BucketState>> {
        debug!(bucket = %prior.name, "Reading bucket");

        let remote = match self.api.get_bucket(&prior.name).await {
            Ok(remote) => remote,
            Err(e) if is_not_found(&e) => {
                warn!(bucket = %prior.name, "Bucket not found, removing from state");
                return Ok(None);
            },
            Err(e) => return Err(e),
        };

        let project = match &prior.project {
            Some(project) => project.clone(),
            None => {
                let number = remote.project_number.ok_or_else(|| {
                    anyhow!("Bucket {} response carries no project number", remote.name)
                })?;
                self.api
                    .project_id_for_number(number)
                    .await
                    .with_context(|| format!("Failed to resolve project of bucket {}", remote.name))?
            },
        };

        Ok(Some(BucketState::from_remote(&remote, prior, Some(project))))
    }

    /// Patch the bucket in place. Replacement plans are rejected; the caller
    /// deletes and recreates instead.
    pub async fn update(&self, prior: &BucketState, plan: &Plan) -> Result<BucketState> {
        if plan.requires_replacement() {
            return Err(anyhow!(
                "Bucket {} cannot be updated in place; changed: {}",
                prior.name,
                plan.changes
                    .iter()
                    .filter(|f| f.forces_replacement())
                    .map(|f| f.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }

        let spec = &plan.spec;
        let seed = BucketState {
            force_destroy: spec.force_destroy,
            labels: spec.labels.clone(),
            terraform_labels: plan.labels.terraform_labels.clone(),
            ..prior.clone()
        };

        let patch = build_patch(prior, plan);
        if patch.is_empty() {
            debug!(bucket = %prior.name, "Nothing to send, updating local state only");
            return Ok(seed);
        }

        info!(
            bucket = %prior.name,
            changes = ?plan.changes,
            "Patching bucket"
        );
        let remote = self.api.patch_bucket(&prior.name, &patch).await?;

        Ok(BucketState::from_remote(&remote, &seed, prior.project.clone()))
    }

    /// Delete the bucket, emptying it first when `force_destroy` is set
    pub async fn delete(&self, state: &BucketState) -> Result<()> {
        let bucket = state.name.as_str();

        // Listing left behind by the last pass that had failures
        let mut stalled: Option<HashSet<ObjectVersion>> = None;

        loop {
            let objects = match self.api.list_object_versions(bucket).await {
                Ok(objects) => objects,
                Err(e) if is_not_found(&e) => {
                    info!(bucket = %bucket, "Bucket already deleted");
                    return Ok(());
                },
                Err(e) => return Err(e),
            };

            if objects.is_empty() {
                break;
            }

            if !state.force_destroy {
                return Err(BucketError::BucketNotEmpty {
                    bucket: bucket.to_string(),
                    objects: objects.len(),
                }
                .into());
            }

            let listed: HashSet<ObjectVersion> = objects.iter().cloned().collect();
            if stalled.as_ref() == Some(&listed) {
                // No progress since the last failed pass; the bucket delete
                // reports what is left
                warn!(
                    bucket = %bucket,
                    objects = listed.len(),
                    "Object deletion made no progress, giving up on emptying bucket"
                );
                break;
            }

            let parallelism = pool_size(self.provider.delete_parallelism);
            info!(
                bucket = %bucket,
                objects = objects.len(),
                parallelism = parallelism,
                "Emptying bucket before deletion"
            );

            let failed = purge_objects(&self.api, bucket, &objects, parallelism).await;
            stalled = (failed > 0).then_some(listed);
        }

        let result = retry_with_backoff(
            &self.delete_retry,
            "delete bucket",
            is_rate_limited,
            || self.api.delete_bucket(bucket),
        )
        .await;

        match result {
            Ok(()) => {
                info!(bucket = %bucket, "Bucket deleted");
                Ok(())
            },
            Err(e) if is_not_found(&e) => {
                info!(bucket = %bucket, "Bucket already deleted");
                Ok(())
            },
            Err(e) => Err(e),
        }
    }

    /// Adopt an existing bucket by name
    pub async fn import(&self, name: &str) -> Result<BucketState> {
        info!(bucket = %name, "Importing bucket");
        self.read(&BucketState::imported(name))
            .await?
            .ok_or_else(|| anyhow!("Cannot import bucket {}: it does not exist", name))
    }
}

fn insert_body(spec: &BucketSpec, plan: &Plan) -> RemoteBucket {
    let effective = &plan.labels.effective_labels;

    RemoteBucket {
        name: spec.name.clone(),
        location: spec.location.clone(),
        storage_class: spec.storage_class.clone(),
        labels: (!effective.is_empty()).then(|| effective.clone()),
        lifecycle: (!spec.lifecycle_rules.is_empty()).then(|| WireLifecycle {
            rule: spec.lifecycle_rules.iter().map(LifecycleRule::to_wire).collect(),
        }),
        versioning: spec.versioning.as_ref().map(|v| v.to_wire()),
        website: spec.website.as_ref().map(|w| w.to_wire()),
        cors: (!spec.cors.is_empty()).then(|| spec.cors.iter().map(Cors::to_wire).collect()),
        logging: spec.logging.as_ref().map(|l| l.to_wire()),
        encryption: spec.encryption.as_ref().map(|e| e.to_wire()),
        billing: spec.requester_pays.map(|requester_pays| WireBilling { requester_pays }),
        ..Default::default()
    }
}
