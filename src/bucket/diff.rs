//! Plan-time diff customization
//!
//! Compares a validated specification against prior state, predicts the label
//! views the next apply will produce, and decides whether the bucket can be
//! patched in place or must be replaced.

use super::config::BucketSpec;
use super::model::same_rules;
use super::state::BucketState;
use crate::labels::{self, LabelSet, PriorLabels, ReconciledLabels};
use std::fmt;

/// Fields whose change is detected by the plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Name,
    Project,
    Location,
    StorageClass,
    ForceDestroy,
    Labels,
    Lifecycle,
    Versioning,
    Website,
    Cors,
    Logging,
    Encryption,
    RequesterPays,
}

impl Field {
    /// Changing these fields cannot be patched; the bucket is recreated
    pub fn forces_replacement(self) -> bool {
        matches!(
            self,
            Field::Name | Field::Project | Field::Location | Field::StorageClass
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Project => "project",
            Field::Location => "location",
            Field::StorageClass => "storage_class",
            Field::ForceDestroy => "force_destroy",
            Field::Labels => "labels",
            Field::Lifecycle => "lifecycle_rule",
            Field::Versioning => "versioning",
            Field::Website => "website",
            Field::Cors => "cors",
            Field::Logging => "logging",
            Field::Encryption => "encryption",
            Field::RequesterPays => "requester_pays",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanAction {
    Create,
    Update,
    Replace,
    NoOp,
}

/// Outcome of diff customization
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub spec: BucketSpec,
    pub labels: ReconciledLabels,
    pub changes: Vec<Field>,
    pub action: PlanAction,
}

impl Plan {
    pub fn has_change(&self, field: Field) -> bool {
        self.changes.contains(&field)
    }

    pub fn requires_replacement(&self) -> bool {
        self.action == PlanAction::Replace
    }
}

/// Build the plan for `spec` given the provider's default labels and the
/// prior state, if any.
pub fn customize_diff(
    default_labels: &LabelSet,
    spec: &BucketSpec,
    prior: Option<&BucketState>,
) -> Plan {
    let Some(prior) = prior else {
        return Plan {
            spec: spec.clone(),
            labels: labels::reconcile(default_labels, &spec.labels, PriorLabels::default()),
            changes: Vec::new(),
            action: PlanAction::Create,
        };
    };

    let planned_labels = labels::reconcile(
        default_labels,
        &spec.labels,
        PriorLabels {
            terraform_labels: Some(&prior.terraform_labels),
            effective_labels: Some(&prior.effective_labels),
        },
    );

    let changes = changed_fields(spec, prior, &planned_labels);
    let action = if changes.iter().any(|f| f.forces_replacement()) {
        PlanAction::Replace
    } else if changes.is_empty() {
        PlanAction::NoOp
    } else {
        PlanAction::Update
    };

    Plan {
        spec: spec.clone(),
        labels: planned_labels,
        changes,
        action,
    }
}

fn changed_fields(spec: &BucketSpec, prior: &BucketState, planned: &ReconciledLabels) -> Vec<Field> {
    let mut changes = Vec::new();
    let mut check = |field: Field, changed: bool| {
        if changed {
            changes.push(field);
        }
    };

    check(Field::Name, spec.name != prior.name);
    // An unpinned project follows whatever the bucket was created in
    check(
        Field::Project,
        matches!((&spec.project, &prior.project), (Some(want), Some(have)) if want != have),
    );
    check(
        Field::Location,
        !prior.location.is_empty() && !spec.location.eq_ignore_ascii_case(&prior.location),
    );
    check(
        Field::StorageClass,
        !prior.storage_class.is_empty() && spec.storage_class != prior.storage_class,
    );
    check(Field::ForceDestroy, spec.force_destroy != prior.force_destroy);
    check(
        Field::Labels,
        spec.labels != prior.labels
            || planned.terraform_labels != prior.terraform_labels
            || planned.effective_labels != prior.effective_labels,
    );
    check(
        Field::Lifecycle,
        !same_rules(&spec.lifecycle_rules, &prior.lifecycle_rule),
    );
    // Dropping the versioning block leaves the remote setting alone
    check(
        Field::Versioning,
        spec.versioning.is_some() && spec.versioning != prior.versioning,
    );
    check(Field::Website, spec.website != prior.website);
    check(Field::Cors, spec.cors != prior.cors);
    check(
        Field::Logging,
        match (&spec.logging, &prior.logging) {
            (Some(want), Some(have)) => !want.matches(have),
            (None, None) => false,
            _ => true,
        },
    );
    check(Field::Encryption, spec.encryption != prior.encryption);
    check(
        Field::RequesterPays,
        spec.requester_pays.unwrap_or(false) != prior.requester_pays.unwrap_or(false),
    );

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::config::BucketConfig;
    use crate::bucket::model::{Logging, Website};

    fn labels(pairs: &[(&str, &str)]) -> LabelSet {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn spec(config: &BucketConfig) -> BucketSpec {
        config.validate().unwrap()
    }

    /// State as it would look right after applying `plan`
    fn applied(plan: &Plan) -> BucketState {
        let spec = &plan.spec;
        BucketState {
            id: spec.name.clone(),
            name: spec.name.clone(),
            project: Some("p".to_string()),
            url: format!("gs://{}", spec.name),
            location: spec.location.clone(),
            storage_class: spec.storage_class.clone(),
            force_destroy: spec.force_destroy,
            encryption: spec.encryption.clone(),
            cors: spec.cors.clone(),
            logging: spec.logging.clone(),
            versioning: spec.versioning.clone(),
            website: spec.website.clone(),
            lifecycle_rule: spec.lifecycle_rules.clone(),
            labels: spec.labels.clone(),
            terraform_labels: plan.labels.terraform_labels.clone(),
            effective_labels: plan.labels.effective_labels.clone(),
            requester_pays: spec.requester_pays,
            ..Default::default()
        }
    }

    #[test]
    fn test_create_plan_merges_default_labels() {
        let mut config = BucketConfig::named("b");
        config.labels = labels(&[("team", "x")]);

        let plan = customize_diff(&labels(&[("env", "prod")]), &spec(&config), None);

        assert_eq!(plan.action, PlanAction::Create);
        assert_eq!(
            plan.labels.effective_labels,
            labels(&[("env", "prod"), ("team", "x")])
        );
    }

    #[test]
    fn test_applied_plan_is_stable() {
        let defaults = labels(&[("env", "prod")]);
        let mut config = BucketConfig::named("b");
        config.labels = labels(&[("team", "x")]);
        config.website = vec![Website {
            main_page_suffix: Some("index.html".to_string()),
            not_found_page: None,
        }];

        let first = customize_diff(&defaults, &spec(&config), None);
        let second = customize_diff(&defaults, &spec(&config), Some(&applied(&first)));

        assert_eq!(second.action, PlanAction::NoOp);
        assert!(second.changes.is_empty());
    }

    #[test]
    fn test_removing_user_label_plans_update() {
        let defaults = labels(&[("env", "prod")]);
        let mut config = BucketConfig::named("b");
        config.labels = labels(&[("team", "x")]);
        let first = customize_diff(&defaults, &spec(&config), None);

        config.labels.clear();
        let second = customize_diff(&defaults, &spec(&config), Some(&applied(&first)));

        assert_eq!(second.action, PlanAction::Update);
        assert_eq!(second.changes, vec![Field::Labels]);
        assert_eq!(second.labels.effective_labels, labels(&[("env", "prod")]));
    }

    #[test]
    fn test_location_change_forces_replacement() {
        let config = BucketConfig::named("b");
        let first = customize_diff(&LabelSet::new(), &spec(&config), None);

        let mut moved = config.clone();
        moved.location = "EU".to_string();
        let plan = customize_diff(&LabelSet::new(), &spec(&moved), Some(&applied(&first)));

        assert!(plan.requires_replacement());
        assert!(plan.has_change(Field::Location));
    }

    #[test]
    fn test_location_case_is_ignored() {
        let config = BucketConfig::named("b");
        let first = customize_diff(&LabelSet::new(), &spec(&config), None);

        let mut lower = config.clone();
        lower.location = "us".to_string();
        let plan = customize_diff(&LabelSet::new(), &spec(&lower), Some(&applied(&first)));

        assert_eq!(plan.action, PlanAction::NoOp);
    }

    #[test]
    fn test_unpinned_project_never_diffs() {
        let config = BucketConfig::named("b");
        let first = customize_diff(&LabelSet::new(), &spec(&config), None);
        let mut prior = applied(&first);
        prior.project = Some("looked-up".to_string());

        let plan = customize_diff(&LabelSet::new(), &spec(&config), Some(&prior));
        assert!(!plan.has_change(Field::Project));
    }

    #[test]
    fn test_server_computed_log_prefix_is_not_a_change() {
        let mut config = BucketConfig::named("b");
        config.logging = Some(Logging {
            log_bucket: "logs".to_string(),
            log_object_prefix: None,
        });
        let first = customize_diff(&LabelSet::new(), &spec(&config), None);
        let mut prior = applied(&first);
        prior.logging = Some(Logging {
            log_bucket: "logs".to_string(),
            log_object_prefix: Some("b".to_string()),
        });

        let plan = customize_diff(&LabelSet::new(), &spec(&config), Some(&prior));
        assert!(!plan.has_change(Field::Logging));
    }

    #[test]
    fn test_removed_blocks_are_changes() {
        let mut config = BucketConfig::named("b");
        config.logging = Some(Logging {
            log_bucket: "logs".to_string(),
            log_object_prefix: None,
        });
        config.requester_pays = Some(true);
        let first = customize_diff(&LabelSet::new(), &spec(&config), None);

        let plan = customize_diff(
            &LabelSet::new(),
            &spec(&BucketConfig::named("b")),
            Some(&applied(&first)),
        );

        assert!(plan.has_change(Field::Logging));
        assert!(plan.has_change(Field::RequesterPays));
        assert_eq!(plan.action, PlanAction::Update);
    }
}
