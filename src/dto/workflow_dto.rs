use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::workflow::Workflow;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateWorkflowPayload {
    pub account_id: Uuid,
    #[validate(length(min = 1, message = "Workflow name is required"))]
    pub name: String,
    #[serde(default)]
    pub triggers: Vec<String>,
    /// Opaque node graph; stored verbatim, never interpreted.
    pub nodes: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct ToggleWorkflowPayload {
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
pub struct WorkflowListQuery {
    pub account_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct WorkflowResponse {
    pub id: Uuid,
    pub name: String,
    pub triggers: Vec<String>,
    pub nodes: serde_json::Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Workflow> for WorkflowResponse {
    fn from(w: Workflow) -> Self {
        Self {
            id: w.id,
            name: w.name,
            triggers: w.triggers,
            nodes: w.nodes,
            is_active: w.is_active,
            created_at: w.created_at,
            updated_at: w.updated_at,
        }
    }
}
