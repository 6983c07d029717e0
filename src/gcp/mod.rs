//! GCP API interaction module
//!
//! This module provides the core functionality for talking to Google Cloud
//! Platform APIs: authentication, the HTTP client, and the Cloud Storage and
//! Resource Manager calls the bucket controller needs.
//!
//! # Module Structure
//!
//! - [`auth`] - GCP authentication using Application Default Credentials
//! - [`client`] - Main GCP client for making API requests
//! - [`http`] - HTTP utilities and API error classification
//! - [`projects`] - Project number to project ID lookup
//! - [`storage`] - The [`storage::StorageApi`] trait and its REST implementation
//! - [`types`] - Cloud Storage JSON resources and sparse patches
//!
//! # Example
//!
//! ```ignore
//! use gcs_bucket::gcp::client::{Endpoints, GcpClient};
//! use gcs_bucket::gcp::storage::StorageApi;
//!
//! async fn example() -> anyhow::Result<()> {
//!     let client = GcpClient::new(Endpoints::default()).await?;
//!     let bucket = client.get_bucket("my-bucket").await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod http;
pub mod projects;
pub mod storage;
pub mod types;
