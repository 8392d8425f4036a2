/// Storage contracts
///
/// The engine owns the records but not the storage engine. These traits are the
/// operations it needs; `memory` and `sqlite` provide two implementations.

use crate::error::Result;
use crate::process::types::{DefinitionDraft, ProcessDefinition, Role};
use crate::runtime::approval::ApprovalRequest;
use crate::runtime::instance::{InstanceStatus, ProcessInstance};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

// Pool setup and schema
pub mod database;

// In-process store for tests and single-node use
pub mod memory;

// SQLite-backed store
pub mod sqlite;

pub use database::Database;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Result of create-or-overwrite-by-name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavedDefinition {
    pub definition: ProcessDefinition,
    /// True when an existing definition with the same name was replaced.
    pub overwritten: bool,
}

#[async_trait]
pub trait DefinitionStore: Send + Sync {
    /// Create a definition, or overwrite the one with the same name in place.
    async fn save_definition(
        &self,
        draft: DefinitionDraft,
        now: DateTime<Utc>,
    ) -> Result<SavedDefinition>;

    async fn get_definition(&self, id: &str) -> Result<Option<ProcessDefinition>>;

    /// All definitions, or only those of `project`; ordered by name.
    async fn list_definitions(&self, project: Option<&str>) -> Result<Vec<ProcessDefinition>>;

    /// Returns false if nothing was deleted.
    async fn delete_definition(&self, id: &str) -> Result<bool>;
}

#[async_trait]
pub trait InstanceStore: Send + Sync {
    async fn insert_instance(&self, instance: &ProcessInstance) -> Result<()>;

    async fn get_instance(&self, id: &str) -> Result<Option<ProcessInstance>>;

    /// Replace the stored instance only if its version is still `expected_version`.
    ///
    /// Fails with `Conflict` when another writer got there first and `NotFound`
    /// when the instance is gone. `instance.version` must already be bumped.
    async fn update_instance(&self, instance: &ProcessInstance, expected_version: u64)
        -> Result<()>;

    /// Instances filtered by project and status; newest first.
    async fn list_instances(
        &self,
        project: Option<&str>,
        status: Option<InstanceStatus>,
    ) -> Result<Vec<ProcessInstance>>;
}

#[async_trait]
pub trait ApprovalStore: Send + Sync {
    async fn insert_approval(&self, request: &ApprovalRequest) -> Result<()>;

    async fn get_approval(&self, id: &str) -> Result<Option<ApprovalRequest>>;

    /// Returns false if the request did not exist; exactly one concurrent caller wins.
    async fn delete_approval(&self, id: &str) -> Result<bool>;

    /// Requests addressed to `target_role` in any of `projects` (all projects
    /// when empty); oldest first.
    async fn list_approvals(
        &self,
        target_role: Role,
        projects: &[String],
    ) -> Result<Vec<ApprovalRequest>>;
}

/// Everything the engine needs from its storage collaborator.
pub trait ProcessStore: DefinitionStore + InstanceStore + ApprovalStore {}

impl<T> ProcessStore for T where T: DefinitionStore + InstanceStore + ApprovalStore {}

/// Apply a draft on top of an existing definition with the same name.
///
/// Keeps id and creation time, replaces the content, bumps the revision.
pub(crate) fn overwrite_definition(
    existing: &ProcessDefinition,
    draft: DefinitionDraft,
    now: DateTime<Utc>,
) -> ProcessDefinition {
    let mut next = ProcessDefinition::from_draft(draft, now);
    next.id = existing.id.clone();
    next.created_at = existing.created_at;
    next.revision = existing.revision + 1;
    next
}
