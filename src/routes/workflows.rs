use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::workflow_dto::{
        CreateWorkflowPayload, ToggleWorkflowPayload, WorkflowListQuery, WorkflowResponse,
    },
    error::{Error, Result},
    models::workflow::NewWorkflow,
    store::WorkflowStore,
    AppState,
};

#[axum::debug_handler]
pub async fn list_workflows(
    State(state): State<AppState>,
    Query(query): Query<WorkflowListQuery>,
) -> Result<impl IntoResponse> {
    let workflows = state.workflows.list(query.account_id).await?;
    let body: Vec<WorkflowResponse> = workflows.into_iter().map(WorkflowResponse::from).collect();
    Ok(Json(body))
}

#[axum::debug_handler]
pub async fn create_workflow(
    State(state): State<AppState>,
    Json(payload): Json<CreateWorkflowPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;

    let workflow = state
        .workflows
        .insert(NewWorkflow {
            account_id: payload.account_id,
            name: payload.name,
            triggers: payload.triggers,
            nodes: payload.nodes,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(WorkflowResponse::from(workflow))))
}

#[axum::debug_handler]
pub async fn toggle_workflow(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ToggleWorkflowPayload>,
) -> Result<impl IntoResponse> {
    let workflow = state
        .workflows
        .set_active(id, payload.is_active)
        .await?
        .ok_or_else(|| Error::NotFound("Workflow not found".to_string()))?;
    Ok(Json(WorkflowResponse::from(workflow)))
}

#[axum::debug_handler]
pub async fn delete_workflow(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    if !state.workflows.delete(id).await? {
        return Err(Error::NotFound("Workflow not found".to_string()));
    }
    Ok(Json(json!({ "success": true })))
}
