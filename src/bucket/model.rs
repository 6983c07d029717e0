//! Strongly typed bucket blocks
//!
//! These types are shared by the validated specification and the persisted
//! state, and convert to and from the JSON API representation.

use crate::gcp::types::{
    WireAction, WireCondition, WireCors, WireEncryption, WireLogging, WireRule, WireVersioning,
    WireWebsite,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const DELETE_ACTION: &str = "Delete";
pub const SET_STORAGE_CLASS_ACTION: &str = "SetStorageClass";

/// What a lifecycle rule does once its condition matches
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Action {
    Delete,
    SetStorageClass { storage_class: String },
}

/// Conjunction of predicates; unset predicates always match
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Condition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_before: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_live: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matches_storage_class: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_newer_versions: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LifecycleRule {
    pub action: Action,
    pub condition: Condition,
}

impl LifecycleRule {
    pub fn to_wire(&self) -> WireRule {
        let action = match &self.action {
            Action::Delete => WireAction {
                kind: DELETE_ACTION.to_string(),
                storage_class: None,
            },
            Action::SetStorageClass { storage_class } => WireAction {
                kind: SET_STORAGE_CLASS_ACTION.to_string(),
                storage_class: Some(storage_class.clone()),
            },
        };

        let c = &self.condition;
        WireRule {
            action,
            condition: WireCondition {
                age: c.age,
                created_before: c.created_before.map(|d| d.format("%Y-%m-%d").to_string()),
                is_live: c.is_live,
                matches_storage_class: c.matches_storage_class.clone(),
                num_newer_versions: c.num_newer_versions,
            },
        }
    }

    /// Rules with actions this crate does not model are skipped with a warning
    /// rather than failing the read.
    pub fn from_wire(rule: &WireRule) -> Option<Self> {
        let action = match rule.action.kind.as_str() {
            DELETE_ACTION => Action::Delete,
            SET_STORAGE_CLASS_ACTION => Action::SetStorageClass {
                storage_class: rule.action.storage_class.clone().unwrap_or_default(),
            },
            other => {
                tracing::warn!("Ignoring lifecycle rule with unsupported action {}", other);
                return None;
            },
        };

        let c = &rule.condition;
        let created_before = match c.created_before.as_deref() {
            None => None,
            Some(raw) => match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
                Ok(date) => Some(date),
                Err(e) => {
                    tracing::warn!("Ignoring unparseable createdBefore {:?}: {}", raw, e);
                    None
                },
            },
        };

        Some(Self {
            action,
            condition: Condition {
                age: c.age,
                created_before,
                is_live: c.is_live,
                matches_storage_class: c.matches_storage_class.clone(),
                num_newer_versions: c.num_newer_versions,
            },
        })
    }
}

/// Remove content-identical rules, keeping the first occurrence
pub fn dedup_rules(rules: Vec<LifecycleRule>) -> Vec<LifecycleRule> {
    let mut seen = HashSet::new();
    rules
        .into_iter()
        .filter(|rule| seen.insert(rule.clone()))
        .collect()
}

/// Rule lists are compared as sets; order and duplicates carry no meaning
pub fn same_rules(a: &[LifecycleRule], b: &[LifecycleRule]) -> bool {
    let a: HashSet<&LifecycleRule> = a.iter().collect();
    let b: HashSet<&LifecycleRule> = b.iter().collect();
    a == b
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Versioning {
    #[serde(default)]
    pub enabled: bool,
}

impl Versioning {
    pub fn to_wire(&self) -> WireVersioning {
        WireVersioning {
            enabled: self.enabled,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Website {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_page_suffix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_found_page: Option<String>,
}

impl Website {
    pub fn to_wire(&self) -> WireWebsite {
        WireWebsite {
            main_page_suffix: self.main_page_suffix.clone(),
            not_found_page: self.not_found_page.clone(),
        }
    }

    /// Both fields sent explicitly, empty when unset, so a patch clears them
    pub fn to_wire_explicit(website: Option<&Website>) -> WireWebsite {
        let website = website.cloned().unwrap_or_default();
        WireWebsite {
            main_page_suffix: Some(website.main_page_suffix.unwrap_or_default()),
            not_found_page: Some(website.not_found_page.unwrap_or_default()),
        }
    }

    pub fn from_wire(website: &WireWebsite) -> Option<Self> {
        let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());
        let website = Self {
            main_page_suffix: non_empty(&website.main_page_suffix),
            not_found_page: non_empty(&website.not_found_page),
        };
        (website != Self::default()).then_some(website)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Cors {
    #[serde(default)]
    pub origin: Vec<String>,
    #[serde(default)]
    pub method: Vec<String>,
    #[serde(default)]
    pub response_header: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age_seconds: Option<i64>,
}

impl Cors {
    pub fn to_wire(&self) -> WireCors {
        WireCors {
            origin: self.origin.clone(),
            method: self.method.clone(),
            response_header: self.response_header.clone(),
            max_age_seconds: self.max_age_seconds,
        }
    }

    pub fn from_wire(cors: &WireCors) -> Self {
        Self {
            origin: cors.origin.clone(),
            method: cors.method.clone(),
            response_header: cors.response_header.clone(),
            max_age_seconds: cors.max_age_seconds,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Logging {
    pub log_bucket: String,
    /// Server fills this with the bucket name when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_object_prefix: Option<String>,
}

impl Logging {
    pub fn to_wire(&self) -> WireLogging {
        WireLogging {
            log_bucket: self.log_bucket.clone(),
            log_object_prefix: self.log_object_prefix.clone(),
        }
    }

    pub fn from_wire(logging: &WireLogging) -> Self {
        Self {
            log_bucket: logging.log_bucket.clone(),
            log_object_prefix: logging.log_object_prefix.clone(),
        }
    }

    /// A configured block matches the observed one when the bucket agrees and
    /// the prefix either agrees or was left for the server to compute.
    pub fn matches(&self, observed: &Logging) -> bool {
        self.log_bucket == observed.log_bucket
            && (self.log_object_prefix.is_none()
                || self.log_object_prefix == observed.log_object_prefix)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Encryption {
    pub default_kms_key_name: String,
}

impl Encryption {
    pub fn to_wire(&self) -> WireEncryption {
        WireEncryption {
            default_kms_key_name: self.default_kms_key_name.clone(),
        }
    }

    pub fn from_wire(encryption: &WireEncryption) -> Option<Self> {
        (!encryption.default_kms_key_name.is_empty()).then(|| Self {
            default_kms_key_name: encryption.default_kms_key_name.clone(),
        })
    }
}
