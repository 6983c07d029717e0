//! GCP Authentication
//!
//! Handles authentication using Application Default Credentials (ADC),
//! service account keys, gcloud CLI credentials, or a pre-minted access token.

use anyhow::{Context, Result};
use gcp_auth::TokenProvider;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Default scopes for GCP API access
pub const DEFAULT_SCOPES: &[&str] = &["https://www.googleapis.com/auth/cloud-platform"];

/// Environment variable holding a pre-minted OAuth access token
pub const ACCESS_TOKEN_ENV: &str = "GCS_BUCKET_ACCESS_TOKEN";

/// Refresh cached tokens this long before their assumed expiry
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Assumed token lifetime
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(30 * 60);

/// Where bearer tokens come from
#[derive(Clone)]
enum TokenSource {
    /// Application Default Credentials, refreshed through a shared cache
    Adc {
        provider: Arc<dyn TokenProvider>,
        cache: Arc<RwLock<Option<CachedToken>>>,
    },
    /// A token minted elsewhere; never refreshed
    Static(String),
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    /// Refresh deadline, already shortened by the expiry buffer
    refresh_at: Instant,
}

/// Bearer-token credentials shared by every request of a client
#[derive(Clone)]
pub struct GcpCredentials {
    source: TokenSource,
}

impl GcpCredentials {
    /// Create credentials from `GCS_BUCKET_ACCESS_TOKEN` when set, falling
    /// back to Application Default Credentials.
    pub async fn new() -> Result<Self> {
        if let Some(token) = std::env::var(ACCESS_TOKEN_ENV)
            .ok()
            .filter(|t| !t.trim().is_empty())
        {
            tracing::debug!("Using access token from {}", ACCESS_TOKEN_ENV);
            return Ok(Self::from_token(token.trim()));
        }

        let provider = gcp_auth::provider().await.context(
            "Failed to initialize GCP authentication. Run 'gcloud auth application-default login'",
        )?;
        tracing::debug!("Using Application Default Credentials");

        Ok(Self {
            source: TokenSource::Adc {
                provider,
                cache: Arc::new(RwLock::new(None)),
            },
        })
    }

    /// Credentials that always hand out the same bearer token
    pub fn from_token(token: &str) -> Self {
        Self {
            source: TokenSource::Static(token.to_string()),
        }
    }

    /// Current bearer token, refreshed when the cached one is due
    pub async fn get_token(&self) -> Result<String> {
        match &self.source {
            TokenSource::Static(token) => Ok(token.clone()),
            TokenSource::Adc { provider, cache } => adc_token(provider.as_ref(), cache).await,
        }
    }
}

async fn adc_token(
    provider: &dyn TokenProvider,
    cache: &RwLock<Option<CachedToken>>,
) -> Result<String> {
    if let Some(cached) = cache.read().await.as_ref() {
        if Instant::now() < cached.refresh_at {
            return Ok(cached.token.clone());
        }
        tracing::debug!("Cached token is due for refresh");
    }

    let token = provider
        .token(DEFAULT_SCOPES)
        .await
        .context("Failed to get access token")?
        .as_str()
        .to_string();

    // gcp_auth does not always report expiry; assume a conservative lifetime
    let lifetime = DEFAULT_TOKEN_TTL - TOKEN_EXPIRY_BUFFER;
    *cache.write().await = Some(CachedToken {
        token: token.clone(),
        refresh_at: Instant::now() + lifetime,
    });
    tracing::debug!("Cached new access token for {}s", lifetime.as_secs());

    Ok(token)
}

/// Get the gcloud configuration directory
pub fn get_gcloud_config_dir() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("CLOUDSDK_CONFIG") {
        return Some(PathBuf::from(path));
    }

    dirs::config_dir().map(|p| p.join("gcloud"))
}

/// Validate a GCP project ID format
/// Project IDs must be 6-30 characters, lowercase letters, digits, and hyphens
/// Must start with a letter and cannot end with a hyphen
pub fn validate_project_id(project: &str) -> bool {
    if project.len() < 6 || project.len() > 30 {
        return false;
    }

    match project.chars().next() {
        Some(c) if c.is_ascii_lowercase() => {},
        _ => return false,
    }

    if project.ends_with('-') {
        return false;
    }

    project
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Pull `project = <id>` out of the `[core]` section of a gcloud properties file
fn parse_core_project(content: &str) -> Option<String> {
    let mut in_core_section = false;
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if line.starts_with('[') {
            in_core_section = line == "[core]";
            continue;
        }
        if !in_core_section {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            if key.trim() == "project" {
                let project = value.trim().to_string();
                if validate_project_id(&project) {
                    return Some(project);
                }
            }
        }
    }
    None
}

/// Read the default project from the environment or gcloud configuration
/// Validates project ID format before returning
pub fn get_default_project() -> Option<String> {
    for var in ["CLOUDSDK_CORE_PROJECT", "GOOGLE_CLOUD_PROJECT", "GCLOUD_PROJECT"] {
        if let Ok(project) = std::env::var(var) {
            if validate_project_id(&project) {
                return Some(project);
            }
            tracing::warn!("Invalid project ID format in {}", var);
        }
    }

    let config_dir = get_gcloud_config_dir()?;

    if let Ok(content) = std::fs::read_to_string(config_dir.join("properties")) {
        if let Some(project) = parse_core_project(&content) {
            return Some(project);
        }
    }

    let active_config = std::fs::read_to_string(config_dir.join("active_config")).ok()?;
    let config_name = active_config.trim();

    // Validate config name to prevent path traversal
    if !config_name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        tracing::warn!("Invalid characters in active_config name");
        return None;
    }

    let config_path = config_dir
        .join("configurations")
        .join(format!("config_{}", config_name));

    let content = std::fs::read_to_string(config_path).ok()?;
    parse_core_project(&content)
}
