use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Stored workflow definition. The node graph is an opaque JSON document;
/// this service only stores it and flips `is_active`, it never interprets it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Workflow {
    pub id: Uuid,
    pub account_id: Uuid,
    pub name: String,
    pub triggers: Vec<String>,
    pub nodes: serde_json::Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewWorkflow {
    pub account_id: Uuid,
    pub name: String,
    pub triggers: Vec<String>,
    pub nodes: serde_json::Value,
}
