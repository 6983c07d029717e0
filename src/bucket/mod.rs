//! Cloud Storage bucket resource
//!
//! # Module Structure
//!
//! - [`config`] - Declared configuration and its validation into a [`BucketSpec`]
//! - [`model`] - Lifecycle rules and the optional configuration blocks
//! - [`state`] - Persisted state and its refresh from remote responses
//! - [`diff`] - Plan-time diff customization and replacement detection
//! - [`patch`] - Sparse update patches
//! - [`purge`] - Bounded-parallelism object deletion
//! - [`controller`] - Create, read, update, delete and import

pub mod config;
pub mod controller;
pub mod diff;
pub mod model;
pub mod patch;
pub mod purge;
pub mod state;

pub use config::{BucketConfig, BucketSpec};
pub use controller::BucketController;
pub use diff::{customize_diff, Field, Plan, PlanAction};
pub use state::BucketState;
