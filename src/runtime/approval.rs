/// Approval request records
///
/// A request captures the exact operation an under-privileged actor attempted,
/// so approving it replays that operation and nothing else.

use crate::process::types::{Actor, DefinitionDraft, Role};
use crate::runtime::instance::StepCommand;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The deferred operation held by a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Intent {
    /// A step on a running instance, valid only while the instance is still
    /// at the version it had when the request was filed.
    Step {
        instance_id: String,
        command: StepCommand,
        filed_at_version: u64,
    },
    /// Publish (create or overwrite by name) a definition.
    PublishDefinition { draft: DefinitionDraft },
    DeleteDefinition { definition_id: String },
}

impl Intent {
    pub fn instance_id(&self) -> Option<&str> {
        match self {
            Intent::Step { instance_id, .. } => Some(instance_id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Dismissed,
}

/// What a request is about, for display and filtering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestSubject {
    pub project: String,
    pub process_name: Option<String>,
    pub process_id: Option<String>,
    pub instance_name: Option<String>,
}

/// A gated operation waiting for a privileged actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: String,
    /// Absent for definition-level requests.
    pub instance_id: Option<String>,
    pub message: String,
    pub requested_by: String,
    pub requested_by_id: String,
    pub target_role: Role,
    pub status: ApprovalStatus,
    pub project: String,
    #[serde(default)]
    pub process_name: Option<String>,
    #[serde(default)]
    pub process_id: Option<String>,
    #[serde(default)]
    pub instance_name: Option<String>,
    pub intent: Intent,
    pub created_at: DateTime<Utc>,
}

impl ApprovalRequest {
    /// New pending request addressed to the approver role.
    pub fn pending(
        requester: &Actor,
        intent: Intent,
        message: String,
        subject: RequestSubject,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            instance_id: intent.instance_id().map(str::to_string),
            message,
            requested_by: requester.name.clone(),
            requested_by_id: requester.id.clone(),
            target_role: Role::APPROVER,
            status: ApprovalStatus::Pending,
            project: subject.project,
            process_name: subject.process_name,
            process_id: subject.process_id,
            instance_name: subject.instance_name,
            intent,
            created_at: now,
        }
    }

    /// Short human label for what the request is about.
    pub fn subject(&self) -> String {
        match &self.intent {
            Intent::Step { .. } => format!(
                "instance \"{}\"",
                self.instance_name.as_deref().unwrap_or("unknown")
            ),
            Intent::PublishDefinition { draft } => format!("process \"{}\"", draft.name),
            Intent::DeleteDefinition { .. } => format!(
                "deletion of process \"{}\"",
                self.process_name.as_deref().unwrap_or("unknown")
            ),
        }
    }
}

/// Sent to the requester once a request is resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionNotice {
    pub request_id: String,
    pub recipient_id: String,
    pub recipient_name: String,
    pub status: ApprovalStatus,
    pub message: String,
    pub project: String,
    pub resolved_by: String,
    pub resolved_at: DateTime<Utc>,
}

impl ResolutionNotice {
    pub fn for_request(
        request: &ApprovalRequest,
        status: ApprovalStatus,
        resolver: &Actor,
        now: DateTime<Utc>,
    ) -> Self {
        let verdict = match status {
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Dismissed => "dismissed",
            ApprovalStatus::Pending => "left pending",
        };
        Self {
            request_id: request.id.clone(),
            recipient_id: request.requested_by_id.clone(),
            recipient_name: request.requested_by.clone(),
            status,
            message: format!(
                "Your approval request for {} has been {}.",
                request.subject(),
                verdict
            ),
            project: request.project.clone(),
            resolved_by: resolver.name.clone(),
            resolved_at: now,
        }
    }
}
