//! Label reconciliation
//!
//! Buckets carry three label views:
//!
//! - `labels`: what the user declared in configuration
//! - `terraform_labels`: provider default labels overlaid by the user's labels,
//!   i.e. every label this tool manages
//! - `effective_labels`: every label present on the bucket, including ones
//!   attached outside this tool
//!
//! All functions here are pure and total; missing inputs are empty maps.

use std::collections::BTreeMap;

/// String-to-string label map with deterministic ordering
pub type LabelSet = BTreeMap<String, String>;

/// The label views persisted by a previous plan or read
#[derive(Debug, Clone, Copy, Default)]
pub struct PriorLabels<'a> {
    pub terraform_labels: Option<&'a LabelSet>,
    pub effective_labels: Option<&'a LabelSet>,
}

/// Planned label views for the next state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciledLabels {
    pub terraform_labels: LabelSet,
    pub effective_labels: LabelSet,
}

/// Provider defaults overlaid by user labels (user wins on collision)
pub fn terraform_labels(defaults: &LabelSet, user: &LabelSet) -> LabelSet {
    let mut merged = defaults.clone();
    merged.extend(user.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// Predict the next `terraform_labels` and `effective_labels`.
///
/// Effective labels start from the prior effective set, take every managed
/// label, then drop keys that were managed before and no longer are. Keys that
/// were never managed (attached remotely) are left alone.
pub fn reconcile(defaults: &LabelSet, user: &LabelSet, prior: PriorLabels<'_>) -> ReconciledLabels {
    let new_terraform = terraform_labels(defaults, user);
    let mut effective = prior.effective_labels.cloned().unwrap_or_default();

    for (k, v) in &new_terraform {
        effective.insert(k.clone(), v.clone());
    }

    if let Some(old_terraform) = prior.terraform_labels {
        for k in old_terraform.keys() {
            if !new_terraform.contains_key(k) {
                effective.remove(k);
            }
        }
    }

    ReconciledLabels {
        terraform_labels: new_terraform,
        effective_labels: effective,
    }
}

/// Restrict a remote label set to the keys the configuration declares.
///
/// Declared keys missing remotely come back with an empty value so the next
/// plan shows the drift.
pub fn project_labels(remote: Option<&LabelSet>, declared: &LabelSet) -> LabelSet {
    let Some(remote) = remote else {
        return LabelSet::new();
    };

    declared
        .keys()
        .map(|k| (k.clone(), remote.get(k).cloned().unwrap_or_default()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> LabelSet {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_user_labels_override_defaults() {
        let merged = terraform_labels(&labels(&[("env", "prod")]), &labels(&[("env", "dev")]));
        assert_eq!(merged, labels(&[("env", "dev")]));
    }

    #[test]
    fn test_defaults_then_removal() {
        let defaults = labels(&[("env", "prod")]);

        let first = reconcile(&defaults, &labels(&[("team", "x")]), PriorLabels::default());
        assert_eq!(
            first.effective_labels,
            labels(&[("env", "prod"), ("team", "x")])
        );

        let second = reconcile(
            &defaults,
            &LabelSet::new(),
            PriorLabels {
                terraform_labels: Some(&first.terraform_labels),
                effective_labels: Some(&first.effective_labels),
            },
        );
        assert_eq!(second.effective_labels, labels(&[("env", "prod")]));
        assert_eq!(second.terraform_labels, labels(&[("env", "prod")]));
    }

    #[test]
    fn test_removing_overridden_default_restores_default_value() {
        let defaults = labels(&[("env", "prod")]);
        let first = reconcile(&defaults, &labels(&[("env", "dev")]), PriorLabels::default());
        assert_eq!(first.effective_labels, labels(&[("env", "dev")]));

        let second = reconcile(
            &defaults,
            &LabelSet::new(),
            PriorLabels {
                terraform_labels: Some(&first.terraform_labels),
                effective_labels: Some(&first.effective_labels),
            },
        );
        assert_eq!(second.effective_labels, labels(&[("env", "prod")]));
    }

    #[test]
    fn test_unmanaged_remote_labels_survive() {
        let prior_terraform = labels(&[("team", "x")]);
        let prior_effective = labels(&[("team", "x"), ("goog-managed", "1")]);

        let next = reconcile(
            &LabelSet::new(),
            &LabelSet::new(),
            PriorLabels {
                terraform_labels: Some(&prior_terraform),
                effective_labels: Some(&prior_effective),
            },
        );
        assert_eq!(next.effective_labels, labels(&[("goog-managed", "1")]));
    }

    #[test]
    fn test_project_labels_drops_undeclared_keys() {
        let remote = labels(&[("team", "x"), ("goog-managed", "1")]);
        let declared = labels(&[("team", "anything"), ("missing", "y")]);

        let projected = project_labels(Some(&remote), &declared);
        assert_eq!(projected, labels(&[("missing", ""), ("team", "x")]));
    }

    #[test]
    fn test_project_labels_without_remote_labels() {
        assert!(project_labels(None, &labels(&[("team", "x")])).is_empty());
    }
}
