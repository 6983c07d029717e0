//! Declarative lifecycle management for Google Cloud Storage buckets.
//!
//! A bucket is declared in a [`bucket::BucketConfig`], planned against its
//! persisted [`bucket::BucketState`], and applied through a
//! [`bucket::BucketController`] over any [`gcp::storage::StorageApi`].

pub mod bucket;
pub mod config;
pub mod error;
pub mod gcp;
pub mod labels;
pub mod retry;
