/// Process definition REST API endpoints
///
/// Publishing and deleting definitions is gated: privileged actors apply the
/// change directly, everyone else gets a pending approval request back.

use crate::api::{error::ApiResult, outcome_response, AppState};
use crate::process::types::{Actor, DefinitionDraft, ProcessDefinition};
use crate::runtime::engine::Outcome;
use crate::storage::SavedDefinition;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct ListProcessesQuery {
    pub project: Option<String>,
}

/// Create process definition routes
pub fn create_process_routes() -> Router<AppState> {
    Router::new()
        .route("/api/processes", post(publish_process).get(list_processes))
        .route("/api/processes/{id}", get(get_process).delete(delete_process))
}

/// Publish a definition, overwriting any existing one with the same name
///
/// POST /api/processes
/// Body: { "name": "...", "project": "...", "elements": [...], "transitions": [...] }
/// Returns 200 when applied, 202 with the approval request when deferred
async fn publish_process(
    State(state): State<AppState>,
    actor: Actor,
    Json(draft): Json<DefinitionDraft>,
) -> ApiResult<(StatusCode, Json<Outcome<SavedDefinition>>)> {
    tracing::info!("📥 {} publishing process '{}'", actor.name, draft.name);
    let outcome = state.engine.publish_definition(draft, &actor).await?;
    Ok(outcome_response(outcome))
}

/// List definitions, optionally for one project
///
/// GET /api/processes?project=...
async fn list_processes(
    State(state): State<AppState>,
    _actor: Actor,
    Query(query): Query<ListProcessesQuery>,
) -> ApiResult<Json<Value>> {
    let processes = state
        .engine
        .list_definitions(query.project.as_deref())
        .await?;
    Ok(Json(json!({ "processes": processes })))
}

/// GET /api/processes/{id}
async fn get_process(
    State(state): State<AppState>,
    _actor: Actor,
    Path(id): Path<String>,
) -> ApiResult<Json<ProcessDefinition>> {
    Ok(Json(state.engine.get_definition(&id).await?))
}

/// Delete a definition
///
/// DELETE /api/processes/{id}
async fn delete_process(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> ApiResult<(StatusCode, Json<Outcome<String>>)> {
    let outcome = state.engine.delete_definition(&id, &actor).await?;
    Ok(outcome_response(outcome))
}
