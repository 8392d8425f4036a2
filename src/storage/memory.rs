/// In-memory store
///
/// Holds every record in `RwLock`-guarded maps. Writes that need a compare step
/// take the write lock for the whole check-then-write, which gives the same
/// single-winner guarantees as the SQLite store's conditional updates.

use crate::error::{EngineError, RecordKind, Result};
use crate::process::types::{DefinitionDraft, ProcessDefinition, Role};
use crate::runtime::approval::ApprovalRequest;
use crate::runtime::instance::{InstanceStatus, ProcessInstance};
use crate::storage::{
    overwrite_definition, ApprovalStore, DefinitionStore, InstanceStore, SavedDefinition,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct MemoryStore {
    definitions: RwLock<HashMap<String, ProcessDefinition>>,
    instances: RwLock<HashMap<String, ProcessInstance>>,
    approvals: RwLock<HashMap<String, ApprovalRequest>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DefinitionStore for MemoryStore {
    async fn save_definition(
        &self,
        draft: DefinitionDraft,
        now: DateTime<Utc>,
    ) -> Result<SavedDefinition> {
        let mut definitions = self.definitions.write().await;
        let existing = definitions.values().find(|d| d.name == draft.name).cloned();

        let (definition, overwritten) = match existing {
            Some(existing) => (overwrite_definition(&existing, draft, now), true),
            None => (ProcessDefinition::from_draft(draft, now), false),
        };
        definitions.insert(definition.id.clone(), definition.clone());

        Ok(SavedDefinition {
            definition,
            overwritten,
        })
    }

    async fn get_definition(&self, id: &str) -> Result<Option<ProcessDefinition>> {
        Ok(self.definitions.read().await.get(id).cloned())
    }

    async fn list_definitions(&self, project: Option<&str>) -> Result<Vec<ProcessDefinition>> {
        let mut found: Vec<ProcessDefinition> = self
            .definitions
            .read()
            .await
            .values()
            .filter(|d| project.map_or(true, |p| d.project == p))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(found)
    }

    async fn delete_definition(&self, id: &str) -> Result<bool> {
        Ok(self.definitions.write().await.remove(id).is_some())
    }
}

#[async_trait]
impl InstanceStore for MemoryStore {
    async fn insert_instance(&self, instance: &ProcessInstance) -> Result<()> {
        self.instances
            .write()
            .await
            .insert(instance.id.clone(), instance.clone());
        Ok(())
    }

    async fn get_instance(&self, id: &str) -> Result<Option<ProcessInstance>> {
        Ok(self.instances.read().await.get(id).cloned())
    }

    async fn update_instance(
        &self,
        instance: &ProcessInstance,
        expected_version: u64,
    ) -> Result<()> {
        let mut instances = self.instances.write().await;
        let stored = instances
            .get_mut(&instance.id)
            .ok_or_else(|| EngineError::not_found(RecordKind::Instance, &instance.id))?;
        if stored.version != expected_version {
            return Err(EngineError::Conflict {
                id: instance.id.clone(),
                expected: expected_version,
            });
        }
        *stored = instance.clone();
        Ok(())
    }

    async fn list_instances(
        &self,
        project: Option<&str>,
        status: Option<InstanceStatus>,
    ) -> Result<Vec<ProcessInstance>> {
        let mut found: Vec<ProcessInstance> = self
            .instances
            .read()
            .await
            .values()
            .filter(|i| project.map_or(true, |p| i.project == p))
            .filter(|i| status.map_or(true, |s| i.status == s))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created.cmp(&a.created));
        Ok(found)
    }
}

#[async_trait]
impl ApprovalStore for MemoryStore {
    async fn insert_approval(&self, request: &ApprovalRequest) -> Result<()> {
        self.approvals
            .write()
            .await
            .insert(request.id.clone(), request.clone());
        Ok(())
    }

    async fn get_approval(&self, id: &str) -> Result<Option<ApprovalRequest>> {
        Ok(self.approvals.read().await.get(id).cloned())
    }

    async fn delete_approval(&self, id: &str) -> Result<bool> {
        Ok(self.approvals.write().await.remove(id).is_some())
    }

    async fn list_approvals(
        &self,
        target_role: Role,
        projects: &[String],
    ) -> Result<Vec<ApprovalRequest>> {
        let mut found: Vec<ApprovalRequest> = self
            .approvals
            .read()
            .await
            .values()
            .filter(|r| r.target_role == target_role)
            .filter(|r| projects.is_empty() || projects.contains(&r.project))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(found)
    }
}
