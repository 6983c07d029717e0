//! Sparse patch construction
//!
//! Only changed fields are sent. A field removed from configuration is sent
//! as an explicit null (or explicit empty value where the API requires one);
//! an omitted field keeps its remote value.

use super::diff::{Field, Plan};
use super::model::{Cors, LifecycleRule, Website};
use super::state::BucketState;
use crate::gcp::types::{BucketPatch, Patch, WireBilling, WireLifecycle};
use crate::labels::LabelSet;
use std::collections::BTreeMap;

pub fn build_patch(prior: &BucketState, plan: &Plan) -> BucketPatch {
    let spec = &plan.spec;
    let mut patch = BucketPatch::default();

    if plan.has_change(Field::Lifecycle) {
        // An empty rule list is sent explicitly to clear every rule
        patch.lifecycle = Patch::Set(WireLifecycle {
            rule: spec.lifecycle_rules.iter().map(LifecycleRule::to_wire).collect(),
        });
    }

    if plan.has_change(Field::RequesterPays) {
        patch.billing = Patch::Set(WireBilling {
            requester_pays: spec.requester_pays.unwrap_or(false),
        });
    }

    if plan.has_change(Field::Versioning) {
        if let Some(versioning) = &spec.versioning {
            patch.versioning = Patch::Set(versioning.to_wire());
        }
    }

    if plan.has_change(Field::Website) {
        patch.website = Patch::Set(Website::to_wire_explicit(spec.website.as_ref()));
    }

    if !spec.cors.is_empty() {
        patch.cors = Patch::Set(spec.cors.iter().map(Cors::to_wire).collect());
    } else if plan.has_change(Field::Cors) {
        patch.cors = Patch::Null;
    }

    if plan.has_change(Field::Logging) {
        patch.logging = match &spec.logging {
            Some(logging) => Patch::Set(logging.to_wire()),
            None => Patch::Null,
        };
    }

    if plan.has_change(Field::Encryption) {
        patch.encryption = match &spec.encryption {
            Some(encryption) => Patch::Set(encryption.to_wire()),
            None => Patch::Null,
        };
    }

    if plan.labels.effective_labels != prior.effective_labels {
        patch.labels = label_patch(&prior.effective_labels, &plan.labels.effective_labels);
    }

    patch
}

/// New values for every wanted label plus a null marker for each key that
/// has to go; the API only removes a label when it is explicitly nulled.
pub fn label_patch(old: &LabelSet, new: &LabelSet) -> Patch<BTreeMap<String, Option<String>>> {
    let mut labels: BTreeMap<String, Option<String>> = new
        .iter()
        .map(|(k, v)| (k.clone(), Some(v.clone())))
        .collect();

    for k in old.keys() {
        if !new.contains_key(k) {
            labels.insert(k.clone(), None);
        }
    }

    if labels.is_empty() {
        Patch::Null
    } else {
        Patch::Set(labels)
    }
}
