/// Process instance REST API endpoints
///
/// Creating and reading instances, and the four step operations. Step
/// operations answer 200 with the new instance, or 202 with an approval request
/// when the actor's role does not match the current element.

use crate::api::{
    error::{ApiError, ApiResult},
    outcome_response, AppState,
};
use crate::process::types::Actor;
use crate::runtime::engine::{InstanceFilter, Outcome};
use crate::runtime::instance::{InstanceStatus, ProcessInstance};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

/// Request body for instance creation
#[derive(Debug, Deserialize)]
pub struct CreateInstanceRequest {
    pub process_id: String,
    pub name: String,
}

/// Request body for resolving a gateway
#[derive(Debug, Deserialize)]
pub struct ChooseRequest {
    pub target: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListInstancesQuery {
    pub project: Option<String>,
    pub status: Option<String>,
    /// Finished and cancelled instances only
    #[serde(default)]
    pub archived: bool,
    /// Process name, any case
    pub process: Option<String>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
    pub completed_from: Option<DateTime<Utc>>,
    pub completed_to: Option<DateTime<Utc>>,
}

impl ListInstancesQuery {
    fn into_filter(self) -> Result<InstanceFilter, ApiError> {
        let status = self
            .status
            .as_deref()
            .map(str::parse::<InstanceStatus>)
            .transpose()
            .map_err(ApiError::BadRequest)?;
        Ok(InstanceFilter {
            project: self.project,
            status,
            archived: self.archived,
            process_name: self.process,
            created_from: self.created_from,
            created_to: self.created_to,
            completed_from: self.completed_from,
            completed_to: self.completed_to,
        })
    }
}

/// Create instance routes
pub fn create_instance_routes() -> Router<AppState> {
    Router::new()
        .route("/api/instances", post(create_instance).get(list_instances))
        .route("/api/instances/{id}", get(get_instance))
        .route("/api/instances/{id}/advance", post(advance_instance))
        .route("/api/instances/{id}/choose", post(choose_path))
        .route("/api/instances/{id}/finish", post(finish_instance))
        .route("/api/instances/{id}/cancel", post(cancel_instance))
}

/// Start a new instance
///
/// POST /api/instances
/// Body: { "process_id": "...", "name": "..." }
async fn create_instance(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<CreateInstanceRequest>,
) -> ApiResult<(StatusCode, Json<ProcessInstance>)> {
    let instance = state
        .engine
        .create_instance(&payload.process_id, &payload.name, &actor)
        .await?;
    Ok((StatusCode::CREATED, Json(instance)))
}

/// List instances, newest first
///
/// GET /api/instances?project=...&status=running|finished|canceled&process=...
async fn list_instances(
    State(state): State<AppState>,
    _actor: Actor,
    Query(query): Query<ListInstancesQuery>,
) -> ApiResult<Json<Value>> {
    let filter = query.into_filter()?;
    let instances = state.engine.list_instances(&filter).await?;
    Ok(Json(json!({ "instances": instances })))
}

/// GET /api/instances/{id}
async fn get_instance(
    State(state): State<AppState>,
    _actor: Actor,
    Path(id): Path<String>,
) -> ApiResult<Json<ProcessInstance>> {
    Ok(Json(state.engine.get_instance(&id).await?))
}

/// POST /api/instances/{id}/advance
async fn advance_instance(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> ApiResult<(StatusCode, Json<Outcome<ProcessInstance>>)> {
    Ok(outcome_response(state.engine.advance(&id, &actor).await?))
}

/// Resolve a pending gateway choice
///
/// POST /api/instances/{id}/choose
/// Body: { "target": "<element id>" }
async fn choose_path(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    Json(payload): Json<ChooseRequest>,
) -> ApiResult<(StatusCode, Json<Outcome<ProcessInstance>>)> {
    Ok(outcome_response(
        state.engine.choose(&id, &payload.target, &actor).await?,
    ))
}

/// POST /api/instances/{id}/finish
async fn finish_instance(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> ApiResult<(StatusCode, Json<Outcome<ProcessInstance>>)> {
    Ok(outcome_response(state.engine.finish(&id, &actor).await?))
}

/// POST /api/instances/{id}/cancel
async fn cancel_instance(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> ApiResult<(StatusCode, Json<Outcome<ProcessInstance>>)> {
    Ok(outcome_response(state.engine.cancel(&id, &actor).await?))
}
