//! Bucket configuration
//!
//! [`BucketConfig`] mirrors the configuration file. It is validated once, by
//! [`BucketConfig::validate`], into a [`BucketSpec`] that the rest of the
//! crate works with.

use super::model::{
    dedup_rules, Action, Condition, Cors, Encryption, LifecycleRule, Logging, Versioning, Website,
    DELETE_ACTION, SET_STORAGE_CLASS_ACTION,
};
use crate::error::BucketError;
use crate::labels::LabelSet;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_LOCATION: &str = "US";
pub const DEFAULT_STORAGE_CLASS: &str = "STANDARD";
pub const MAX_LIFECYCLE_RULES: usize = 100;

fn default_location() -> String {
    DEFAULT_LOCATION.to_string()
}

fn default_storage_class() -> String {
    DEFAULT_STORAGE_CLASS.to_string()
}

/// A bucket as declared in configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BucketConfig {
    pub name: String,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default = "default_location")]
    pub location: String,
    #[serde(default = "default_storage_class")]
    pub storage_class: String,
    #[serde(default)]
    pub force_destroy: bool,
    #[serde(default)]
    pub labels: LabelSet,
    #[serde(default)]
    pub lifecycle_rule: Vec<LifecycleRuleBlock>,
    #[serde(default)]
    pub versioning: Option<Versioning>,
    #[serde(default)]
    pub website: Vec<Website>,
    #[serde(default)]
    pub cors: Vec<Cors>,
    #[serde(default)]
    pub logging: Option<Logging>,
    #[serde(default)]
    pub encryption: Option<Encryption>,
    #[serde(default)]
    pub requester_pays: Option<bool>,
}

/// Lifecycle rule as written in configuration; exactly one action and one
/// condition are required.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LifecycleRuleBlock {
    #[serde(default)]
    pub action: Vec<ActionBlock>,
    #[serde(default)]
    pub condition: Vec<ConditionBlock>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActionBlock {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub storage_class: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConditionBlock {
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub created_before: Option<String>,
    #[serde(default)]
    pub is_live: Option<bool>,
    #[serde(default)]
    pub matches_storage_class: Option<Vec<String>>,
    #[serde(default)]
    pub num_newer_versions: Option<u32>,
}

/// A validated bucket specification
#[derive(Debug, Clone, PartialEq)]
pub struct BucketSpec {
    pub name: String,
    pub project: Option<String>,
    pub location: String,
    pub storage_class: String,
    pub force_destroy: bool,
    pub labels: LabelSet,
    pub lifecycle_rules: Vec<LifecycleRule>,
    pub versioning: Option<Versioning>,
    pub website: Option<Website>,
    pub cors: Vec<Cors>,
    pub logging: Option<Logging>,
    pub encryption: Option<Encryption>,
    pub requester_pays: Option<bool>,
}

impl BucketConfig {
    /// A configuration with every optional field at its default
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            project: None,
            location: default_location(),
            storage_class: default_storage_class(),
            force_destroy: false,
            labels: LabelSet::new(),
            lifecycle_rule: Vec::new(),
            versioning: None,
            website: Vec::new(),
            cors: Vec::new(),
            logging: None,
            encryption: None,
            requester_pays: None,
        }
    }

    /// Parse a YAML (or JSON) configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read bucket config {:?}", path))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse bucket config {:?}", path))
    }

    /// Check the configuration and produce a typed specification
    pub fn validate(&self) -> Result<BucketSpec, BucketError> {
        if self.name.trim().is_empty() {
            return Err(BucketError::validation("Bucket name must not be empty"));
        }

        if self.website.len() > 1 {
            return Err(BucketError::validation("At most one website block is allowed"));
        }

        if self.lifecycle_rule.len() > MAX_LIFECYCLE_RULES {
            return Err(BucketError::validation(format!(
                "At most {} lifecycle rules are allowed, got {}",
                MAX_LIFECYCLE_RULES,
                self.lifecycle_rule.len()
            )));
        }

        let rules = self
            .lifecycle_rule
            .iter()
            .enumerate()
            .map(|(i, block)| {
                block.validate().map_err(|e| match e {
                    BucketError::Validation(msg) => {
                        BucketError::validation(format!("lifecycle_rule[{}]: {}", i, msg))
                    },
                    other => other,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let encryption = self
            .encryption
            .clone()
            .filter(|e| !e.default_kms_key_name.is_empty());

        if let Some(logging) = &self.logging {
            if logging.log_bucket.is_empty() {
                return Err(BucketError::validation("logging.log_bucket must not be empty"));
            }
        }

        Ok(BucketSpec {
            name: self.name.clone(),
            project: self.project.clone().filter(|p| !p.is_empty()),
            location: self.location.to_uppercase(),
            storage_class: self.storage_class.clone(),
            force_destroy: self.force_destroy,
            labels: self.labels.clone(),
            lifecycle_rules: dedup_rules(rules),
            versioning: self.versioning.clone(),
            website: self.website.first().cloned(),
            cors: self.cors.clone(),
            logging: self.logging.clone(),
            encryption,
            requester_pays: self.requester_pays,
        })
    }
}

impl LifecycleRuleBlock {
    fn validate(&self) -> Result<LifecycleRule, BucketError> {
        let [action] = self.action.as_slice() else {
            return Err(BucketError::validation("Exactly one action is required"));
        };
        let [condition] = self.condition.as_slice() else {
            return Err(BucketError::validation("Exactly one condition is required"));
        };

        Ok(LifecycleRule {
            action: action.validate()?,
            condition: condition.validate()?,
        })
    }
}

impl ActionBlock {
    fn validate(&self) -> Result<Action, BucketError> {
        match self.kind.as_str() {
            DELETE_ACTION => Ok(Action::Delete),
            SET_STORAGE_CLASS_ACTION => match self.storage_class.as_deref() {
                Some(class) if !class.is_empty() => Ok(Action::SetStorageClass {
                    storage_class: class.to_string(),
                }),
                _ => Err(BucketError::validation(
                    "SetStorageClass action requires storage_class",
                )),
            },
            other => Err(BucketError::validation(format!(
                "Unsupported lifecycle action type {:?}, expected {} or {}",
                other, DELETE_ACTION, SET_STORAGE_CLASS_ACTION
            ))),
        }
    }
}

impl ConditionBlock {
    fn validate(&self) -> Result<Condition, BucketError> {
        let created_before = self
            .created_before
            .as_deref()
            .map(|raw| {
                NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| {
                    BucketError::validation(format!(
                        "created_before {:?} is not a YYYY-MM-DD date: {}",
                        raw, e
                    ))
                })
            })
            .transpose()?;

        let matches_storage_class = match &self.matches_storage_class {
            Some(classes) if classes.is_empty() => {
                return Err(BucketError::validation(
                    "matches_storage_class must list at least one storage class",
                ));
            },
            Some(classes) => classes.clone(),
            None => Vec::new(),
        };

        Ok(Condition {
            age: self.age,
            created_before,
            is_live: self.is_live,
            matches_storage_class,
            num_newer_versions: self.num_newer_versions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(kind: &str, age: u32) -> LifecycleRuleBlock {
        LifecycleRuleBlock {
            action: vec![ActionBlock {
                kind: kind.to_string(),
                storage_class: None,
            }],
            condition: vec![ConditionBlock {
                age: Some(age),
                ..Default::default()
            }],
        }
    }

    #[test]
    fn test_parse_yaml_with_defaults() {
        let config: BucketConfig = serde_yaml::from_str(
            r#"
name: my-bucket
location: eu
labels:
  team: data
lifecycle_rule:
  - action:
      - type: SetStorageClass
        storage_class: NEARLINE
    condition:
      - age: 30
        matches_storage_class: [STANDARD]
website:
  - main_page_suffix: index.html
"#,
        )
        .unwrap();

        assert_eq!(config.storage_class, "STANDARD");
        assert!(!config.force_destroy);

        let spec = config.validate().unwrap();
        assert_eq!(spec.location, "EU");
        assert_eq!(spec.lifecycle_rules.len(), 1);
        assert_eq!(
            spec.lifecycle_rules[0].action,
            Action::SetStorageClass {
                storage_class: "NEARLINE".to_string()
            }
        );
        assert_eq!(
            spec.website.unwrap().main_page_suffix.as_deref(),
            Some("index.html")
        );
    }

    #[test]
    fn test_two_website_blocks_rejected() {
        let mut config = BucketConfig::named("b");
        config.website = vec![Website::default(), Website::default()];

        let err = config.validate().unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("At most one website block"));
    }

    #[test]
    fn test_rule_needs_exactly_one_action() {
        let mut config = BucketConfig::named("b");
        let mut block = rule("Delete", 1);
        block.action.push(block.action[0].clone());
        config.lifecycle_rule = vec![block];

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("lifecycle_rule[0]: Exactly one action"));
    }

    #[test]
    fn test_rule_needs_a_condition() {
        let mut config = BucketConfig::named("b");
        let mut block = rule("Delete", 1);
        block.condition.clear();
        config.lifecycle_rule = vec![block];

        assert!(config
            .validate()
            .unwrap_err()
            .to_string()
            .contains("Exactly one condition"));
    }

    #[test]
    fn test_unknown_action_and_missing_target_rejected() {
        let mut config = BucketConfig::named("b");
        config.lifecycle_rule = vec![rule("Archive", 1)];
        assert!(config.validate().is_err());

        config.lifecycle_rule = vec![rule("SetStorageClass", 1)];
        assert!(config
            .validate()
            .unwrap_err()
            .to_string()
            .contains("requires storage_class"));
    }

    #[test]
    fn test_bad_created_before_rejected() {
        let mut config = BucketConfig::named("b");
        let mut block = rule("Delete", 1);
        block.condition[0].created_before = Some("31/01/2024".to_string());
        config.lifecycle_rule = vec![block];

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_matches_storage_class_rejected() {
        let mut config = BucketConfig::named("b");
        let mut block = rule("Delete", 1);
        block.condition[0].matches_storage_class = Some(vec![]);
        config.lifecycle_rule = vec![block];

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_rules_collapse() {
        let mut config = BucketConfig::named("b");
        config.lifecycle_rule = vec![rule("Delete", 30), rule("Delete", 30), rule("Delete", 7)];

        let spec = config.validate().unwrap();
        assert_eq!(spec.lifecycle_rules.len(), 2);
    }

    #[test]
    fn test_too_many_rules_rejected() {
        let mut config = BucketConfig::named("b");
        config.lifecycle_rule = (0..=MAX_LIFECYCLE_RULES as u32)
            .map(|age| rule("Delete", age))
            .collect();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_kms_key_means_no_encryption() {
        let mut config = BucketConfig::named("b");
        config.encryption = Some(Encryption {
            default_kms_key_name: String::new(),
        });

        assert_eq!(config.validate().unwrap().encryption, None);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let parsed: Result<BucketConfig, _> =
            serde_yaml::from_str("name: b\nacl: private\n");
        assert!(parsed.is_err());
    }
}
