//! GCP Projects
//!
//! Resolves project numbers (as reported on buckets) to project IDs.

use super::client::GcpClient;
use anyhow::{Context, Result};
use serde_json::Value;

/// Project information
#[derive(Debug, Clone)]
pub struct Project {
    pub project_id: String,
    pub lifecycle_state: String,
}

impl From<&Value> for Project {
    fn from(value: &Value) -> Self {
        let field = |key: &str, fallback: &str| {
            value
                .get(key)
                .and_then(|v| v.as_str())
                .unwrap_or(fallback)
                .to_string()
        };

        Self {
            project_id: field("projectId", ""),
            lifecycle_state: field("lifecycleState", "UNKNOWN"),
        }
    }
}

/// Look up a project by its numeric project number
pub async fn get_project(client: &GcpClient, project_number: u64) -> Result<Project> {
    let url = client.resourcemanager_url(&format!("projects/{}", project_number));
    let response: Value = client
        .get(&url)
        .await
        .with_context(|| format!("Failed to look up project number {}", project_number))?;

    let project = Project::from(&response);
    if project.project_id.is_empty() {
        anyhow::bail!("Project {} has no projectId in response", project_number);
    }

    tracing::debug!(
        "Project number {} is project ID {} ({})",
        project_number,
        project.project_id,
        project.lifecycle_state
    );

    Ok(project)
}
