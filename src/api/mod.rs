/// HTTP API Layer
///
/// This module provides the REST API over the process engine. It handles:
/// - Process definition publication, listing and deletion
/// - Instance creation, reads and step operations
/// - Approval request listing and resolution
/// - Actor extraction from request headers and error mapping

use crate::runtime::engine::{Outcome, ProcessEngine};
use axum::{http::StatusCode, response::Json, Router};
use serde::Serialize;
use std::sync::Arc;

// Actor header extractor
pub mod actor;

// Engine error -> HTTP response mapping
pub mod error;

// Process definition endpoints
pub mod processes;

// Instance endpoints
pub mod instances;

// Approval request endpoints
pub mod approvals;

pub use processes::create_process_routes;
pub use instances::create_instance_routes;
pub use approvals::create_approval_routes;

/// Application state shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ProcessEngine>,
}

/// All API routes, ready for `with_state`.
pub fn create_api_routes() -> Router<AppState> {
    Router::new()
        .merge(create_process_routes())
        .merge(create_instance_routes())
        .merge(create_approval_routes())
}

/// 200 for applied operations, 202 for deferred ones.
pub(crate) fn outcome_response<T: Serialize>(outcome: Outcome<T>) -> (StatusCode, Json<Outcome<T>>) {
    let status = if outcome.is_deferred() {
        StatusCode::ACCEPTED
    } else {
        StatusCode::OK
    };
    (status, Json(outcome))
}
