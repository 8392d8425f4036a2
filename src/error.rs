/// Engine-level error types.
///
/// Every failure the engine reports is one of these kinds. They are all raised
/// before any state is written, so a returned error always means "nothing changed".

use crate::process::validator::ValidationIssue;
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Which kind of record a `NotFound` refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Definition,
    Instance,
    ApprovalRequest,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RecordKind::Definition => "process definition",
            RecordKind::Instance => "process instance",
            RecordKind::ApprovalRequest => "approval request",
        };
        f.write_str(name)
    }
}

/// Errors produced by the process engine and its stores.
#[derive(Debug, Error)]
pub enum EngineError {
    // ------ Definition errors ------

    /// The transition graph cannot be executed (empty, no usable start, dangling references).
    #[error("malformed process definition: {0}")]
    MalformedDefinition(String),

    /// One or more elements lack a role or a description.
    #[error("incomplete process definition: {}", format_issues(.0))]
    IncompleteDefinition(Vec<ValidationIssue>),

    /// Caller-supplied input is unusable (blank instance name, blank process name, ...).
    #[error("validation error: {0}")]
    Validation(String),

    // ------ Lookup / state machine errors ------

    #[error("{kind} not found: '{id}'")]
    NotFound { kind: RecordKind, id: String },

    /// The operation is not valid for the instance's current status or state.
    #[error("illegal transition: {0}")]
    IllegalTransition(String),

    /// The gateway target is not one of the currently offered choices.
    #[error("'{target}' is not an offered gateway choice")]
    InvalidChoice { target: String },

    /// The actor may not perform this operation and no approval path applies.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// A concurrent writer changed the instance first.
    #[error("process instance '{id}' was modified concurrently (expected version {expected})")]
    Conflict { id: String, expected: u64 },

    // ------ Collaborator errors ------

    /// Storage collaborator failure, surfaced unchanged.
    #[error("storage error: {0}")]
    Storage(String),
}

impl EngineError {
    pub fn not_found(kind: RecordKind, id: impl Into<String>) -> Self {
        EngineError::NotFound {
            kind,
            id: id.into(),
        }
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        EngineError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Storage(format!("record encoding: {}", err))
    }
}

fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|issue| issue.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::validator::MissingField;

    #[test]
    fn incomplete_definition_lists_every_issue() {
        let err = EngineError::IncompleteDefinition(vec![
            ValidationIssue {
                element_id: "Task_1".into(),
                element_name: Some("Review".into()),
                missing: MissingField::Role,
            },
            ValidationIssue {
                element_id: "Task_2".into(),
                element_name: None,
                missing: MissingField::Description,
            },
        ]);
        let text = err.to_string();
        assert!(text.contains("Review is missing a role."));
        assert!(text.contains("Task_2 is missing a description."));
    }

    #[test]
    fn not_found_names_the_record_kind() {
        let err = EngineError::not_found(RecordKind::ApprovalRequest, "abc");
        assert_eq!(err.to_string(), "approval request not found: 'abc'");
    }
}
