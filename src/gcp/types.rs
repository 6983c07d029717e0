//! Cloud Storage JSON API resources
//!
//! Only the fields this crate reads or writes are modelled. Numeric fields the
//! API encodes as strings (`projectNumber`, `generation`) are decoded into
//! integers.

use crate::labels::LabelSet;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Number(u64),
}

fn u64_from_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => s.parse().map_err(serde::de::Error::custom),
        StringOrNumber::Number(n) => Ok(n),
    }
}

fn opt_u64_from_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    match Option::<StringOrNumber>::deserialize(deserializer)? {
        None => Ok(None),
        Some(StringOrNumber::String(s)) => s.parse().map(Some).map_err(serde::de::Error::custom),
        Some(StringOrNumber::Number(n)) => Ok(Some(n)),
    }
}

/// A bucket as sent on insert and returned by get/insert/patch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteBucket {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub self_link: String,
    #[serde(default, skip_serializing, deserialize_with = "opt_u64_from_string")]
    pub project_number: Option<u64>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub location: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub storage_class: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<LabelSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifecycle: Option<WireLifecycle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub versioning: Option<WireVersioning>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<WireWebsite>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cors: Option<Vec<WireCors>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<WireLogging>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption: Option<WireEncryption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing: Option<WireBilling>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WireLifecycle {
    #[serde(default)]
    pub rule: Vec<WireRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WireRule {
    pub action: WireAction,
    #[serde(default)]
    pub condition: WireCondition,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireAction {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_before: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_live: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matches_storage_class: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_newer_versions: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WireVersioning {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireWebsite {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_page_suffix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_found_page: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireCors {
    #[serde(default)]
    pub origin: Vec<String>,
    #[serde(default)]
    pub method: Vec<String>,
    #[serde(default)]
    pub response_header: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age_seconds: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireLogging {
    pub log_bucket: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_object_prefix: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireEncryption {
    pub default_kms_key_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireBilling {
    #[serde(default)]
    pub requester_pays: bool,
}

/// One field of a sparse patch.
///
/// `Omit` leaves the remote value untouched, `Null` clears it.
#[derive(Debug, Clone, PartialEq)]
pub enum Patch<T> {
    Omit,
    Null,
    Set(T),
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Patch::Omit
    }
}

impl<T> Patch<T> {
    pub fn is_omitted(&self) -> bool {
        matches!(self, Patch::Omit)
    }
}

impl<T: Serialize> Serialize for Patch<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            // Omit is filtered by skip_serializing_if before we get here
            Patch::Omit | Patch::Null => serializer.serialize_none(),
            Patch::Set(value) => value.serialize(serializer),
        }
    }
}

/// Body of `PATCH /storage/v1/b/{bucket}`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketPatch {
    #[serde(skip_serializing_if = "Patch::is_omitted")]
    pub lifecycle: Patch<WireLifecycle>,
    #[serde(skip_serializing_if = "Patch::is_omitted")]
    pub billing: Patch<WireBilling>,
    #[serde(skip_serializing_if = "Patch::is_omitted")]
    pub versioning: Patch<WireVersioning>,
    #[serde(skip_serializing_if = "Patch::is_omitted")]
    pub website: Patch<WireWebsite>,
    #[serde(skip_serializing_if = "Patch::is_omitted")]
    pub cors: Patch<Vec<WireCors>>,
    #[serde(skip_serializing_if = "Patch::is_omitted")]
    pub logging: Patch<WireLogging>,
    #[serde(skip_serializing_if = "Patch::is_omitted")]
    pub encryption: Patch<WireEncryption>,
    /// `None` values delete the corresponding key
    #[serde(skip_serializing_if = "Patch::is_omitted")]
    pub labels: Patch<BTreeMap<String, Option<String>>>,
}

impl BucketPatch {
    /// True when the patch would not change anything remotely
    pub fn is_empty(&self) -> bool {
        self.lifecycle.is_omitted()
            && self.billing.is_omitted()
            && self.versioning.is_omitted()
            && self.website.is_omitted()
            && self.cors.is_omitted()
            && self.logging.is_omitted()
            && self.encryption.is_omitted()
            && self.labels.is_omitted()
    }
}

/// One object generation, as listed with `versions=true`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct ObjectVersion {
    pub name: String,
    #[serde(deserialize_with = "u64_from_string")]
    pub generation: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectList {
    #[serde(default)]
    pub items: Vec<ObjectVersion>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}
