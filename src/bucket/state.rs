//! Persisted bucket state

use super::model::{Cors, Encryption, LifecycleRule, Logging, Versioning, Website};
use crate::gcp::types::RemoteBucket;
use crate::labels::{project_labels, LabelSet};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Everything recorded about a managed bucket after an operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BucketState {
    /// Remote-assigned identifier; empty until the bucket exists
    pub id: String,
    pub name: String,
    pub project: Option<String>,
    pub self_link: String,
    pub url: String,
    pub location: String,
    pub storage_class: String,
    pub force_destroy: bool,
    pub encryption: Option<Encryption>,
    pub cors: Vec<Cors>,
    pub logging: Option<Logging>,
    pub versioning: Option<Versioning>,
    pub website: Option<Website>,
    pub lifecycle_rule: Vec<LifecycleRule>,
    pub labels: LabelSet,
    pub terraform_labels: LabelSet,
    pub effective_labels: LabelSet,
    pub requester_pays: Option<bool>,
}

impl BucketState {
    /// Minimal state for a bucket known only by name
    pub fn imported(name: &str) -> Self {
        Self {
            id: name.to_string(),
            name: name.to_string(),
            force_destroy: false,
            ..Default::default()
        }
    }

    /// Refresh every remote-owned field from an API response.
    ///
    /// `seed` contributes what the remote does not know: the declared label
    /// keys, `force_destroy`, and the project when already resolved.
    pub fn from_remote(remote: &RemoteBucket, seed: &BucketState, project: Option<String>) -> Self {
        let remote_labels = remote.labels.as_ref();

        Self {
            id: remote.id.clone(),
            name: remote.name.clone(),
            project,
            self_link: remote.self_link.clone(),
            url: format!("gs://{}", remote.name),
            location: remote.location.clone(),
            storage_class: remote.storage_class.clone(),
            force_destroy: seed.force_destroy,
            encryption: remote.encryption.as_ref().and_then(Encryption::from_wire),
            cors: remote
                .cors
                .iter()
                .flatten()
                .map(Cors::from_wire)
                .collect(),
            logging: remote.logging.as_ref().map(Logging::from_wire),
            versioning: remote.versioning.as_ref().map(|v| Versioning {
                enabled: v.enabled,
            }),
            website: remote.website.as_ref().and_then(Website::from_wire),
            lifecycle_rule: remote
                .lifecycle
                .iter()
                .flat_map(|l| l.rule.iter())
                .filter_map(LifecycleRule::from_wire)
                .collect(),
            labels: project_labels(remote_labels, &seed.labels),
            terraform_labels: project_labels(remote_labels, &seed.terraform_labels),
            effective_labels: remote_labels.cloned().unwrap_or_default(),
            requester_pays: remote.billing.as_ref().map(|b| b.requester_pays),
        }
    }

    /// Load state from a JSON file; a missing file means no bucket is managed
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file {:?}", path))?;
        let state = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file {:?}", path))?;
        Ok(Some(state))
    }

    /// Write state as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write state file {:?}", path))?;
        Ok(())
    }

    /// Forget the bucket
    pub fn remove(path: &Path) -> Result<()> {
        if path.exists() {
            std::fs::remove_file(path)
                .with_context(|| format!("Failed to remove state file {:?}", path))?;
        }
        Ok(())
    }
}
