/// Approval request REST API endpoints
///
/// Listing pending requests and resolving them. Only privileged actors may
/// approve or deny; the engine answers 403 for everyone else.

use crate::api::{
    error::{ApiError, ApiResult},
    AppState,
};
use crate::process::types::{Actor, Role};
use crate::runtime::engine::Resolution;
use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct ListApprovalsQuery {
    /// Target role; defaults to the approver role
    pub role: Option<String>,
    /// Comma-separated project names; all projects when absent
    pub project: Option<String>,
}

/// Create approval routes
pub fn create_approval_routes() -> Router<AppState> {
    Router::new()
        .route("/api/approvals", get(list_approvals))
        .route("/api/approvals/{id}/approve", post(approve_request))
        .route("/api/approvals/{id}/deny", post(deny_request))
}

/// List pending approval requests, oldest first
///
/// GET /api/approvals?role=Manager&project=ops,finance
async fn list_approvals(
    State(state): State<AppState>,
    _actor: Actor,
    Query(query): Query<ListApprovalsQuery>,
) -> ApiResult<Json<Value>> {
    let role = match query.role.as_deref() {
        Some(role) => role.parse::<Role>().map_err(ApiError::BadRequest)?,
        None => Role::APPROVER,
    };
    let projects: Vec<String> = query
        .project
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();

    let requests = state.engine.pending_approvals(role, &projects).await?;
    Ok(Json(json!({ "approvals": requests })))
}

/// Approve a request and replay its operation
///
/// POST /api/approvals/{id}/approve
async fn approve_request(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> ApiResult<Json<Resolution>> {
    Ok(Json(state.engine.approve(&id, &actor).await?))
}

/// Dismiss a request
///
/// POST /api/approvals/{id}/deny
async fn deny_request(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> ApiResult<Json<Resolution>> {
    Ok(Json(state.engine.deny(&id, &actor).await?))
}
