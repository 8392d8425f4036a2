/// SQLite persistence layer
///
/// Definitions, instances and approval requests are stored as JSON documents,
/// with the fields queries filter on copied into indexed columns.

use crate::error::{EngineError, RecordKind, Result};
use crate::process::types::{DefinitionDraft, ProcessDefinition, Role};
use crate::runtime::approval::ApprovalRequest;
use crate::runtime::instance::{InstanceStatus, ProcessInstance};
use crate::storage::{
    overwrite_definition, ApprovalStore, Database, DefinitionStore, InstanceStore,
    SavedDefinition,
};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{sqlite::SqlitePool, QueryBuilder, Row, Sqlite};

/// SQLite-backed implementation of every store contract.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

/// Fixed-width timestamps so text ordering matches time ordering.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl SqliteStore {
    pub fn new(database: &Database) -> Self {
        Self {
            pool: database.pool().clone(),
        }
    }

    async fn definition_by_name(
        conn: &mut sqlx::SqliteConnection,
        name: &str,
    ) -> Result<Option<ProcessDefinition>> {
        let row = sqlx::query("SELECT definition FROM process_definitions WHERE name = ?")
            .bind(name)
            .fetch_optional(conn)
            .await?;
        match row {
            Some(row) => {
                let json: String = row.try_get("definition")?;
                Ok(Some(serde_json::from_str(&json)?))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl DefinitionStore for SqliteStore {
    async fn save_definition(
        &self,
        draft: DefinitionDraft,
        now: DateTime<Utc>,
    ) -> Result<SavedDefinition> {
        let mut tx = self.pool.begin().await?;

        let existing = Self::definition_by_name(&mut tx, &draft.name).await?;
        let overwritten = existing.is_some();
        let definition = match existing {
            Some(existing) => overwrite_definition(&existing, draft, now),
            None => ProcessDefinition::from_draft(draft, now),
        };
        let json = serde_json::to_string(&definition)?;

        sqlx::query(
            r#"
            INSERT INTO process_definitions (id, name, project, revision, definition, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                project = excluded.project,
                revision = excluded.revision,
                definition = excluded.definition,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&definition.id)
        .bind(&definition.name)
        .bind(&definition.project)
        .bind(definition.revision as i64)
        .bind(&json)
        .bind(timestamp(definition.created_at))
        .bind(timestamp(definition.updated_at))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(SavedDefinition {
            definition,
            overwritten,
        })
    }

    async fn get_definition(&self, id: &str) -> Result<Option<ProcessDefinition>> {
        let row = sqlx::query("SELECT definition FROM process_definitions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let json: String = row.try_get("definition")?;
                Ok(Some(serde_json::from_str(&json)?))
            }
            None => Ok(None),
        }
    }

    async fn list_definitions(&self, project: Option<&str>) -> Result<Vec<ProcessDefinition>> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT definition FROM process_definitions");
        if let Some(project) = project {
            query.push(" WHERE project = ").push_bind(project.to_string());
        }
        query.push(" ORDER BY name ASC");

        let rows = query.build().fetch_all(&self.pool).await?;
        let mut definitions = Vec::with_capacity(rows.len());
        for row in rows {
            let json: String = row.try_get("definition")?;
            definitions.push(serde_json::from_str(&json)?);
        }
        Ok(definitions)
    }

    async fn delete_definition(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM process_definitions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl InstanceStore for SqliteStore {
    async fn insert_instance(&self, instance: &ProcessInstance) -> Result<()> {
        let json = serde_json::to_string(instance)?;
        sqlx::query(
            r#"
            INSERT INTO process_instances (id, process_id, project, status, version, instance, created)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&instance.id)
        .bind(&instance.process_id)
        .bind(&instance.project)
        .bind(instance.status.as_str())
        .bind(instance.version as i64)
        .bind(&json)
        .bind(timestamp(instance.created))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_instance(&self, id: &str) -> Result<Option<ProcessInstance>> {
        let row = sqlx::query("SELECT instance FROM process_instances WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let json: String = row.try_get("instance")?;
                Ok(Some(serde_json::from_str(&json)?))
            }
            None => Ok(None),
        }
    }

    async fn update_instance(
        &self,
        instance: &ProcessInstance,
        expected_version: u64,
    ) -> Result<()> {
        let json = serde_json::to_string(instance)?;
        let result = sqlx::query(
            r#"
            UPDATE process_instances
            SET status = ?, version = ?, instance = ?
            WHERE id = ? AND version = ?
            "#,
        )
        .bind(instance.status.as_str())
        .bind(instance.version as i64)
        .bind(&json)
        .bind(&instance.id)
        .bind(expected_version as i64)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        let exists = sqlx::query("SELECT 1 FROM process_instances WHERE id = ?")
            .bind(&instance.id)
            .fetch_optional(&self.pool)
            .await?
            .is_some();
        if exists {
            Err(EngineError::Conflict {
                id: instance.id.clone(),
                expected: expected_version,
            })
        } else {
            Err(EngineError::not_found(RecordKind::Instance, &instance.id))
        }
    }

    async fn list_instances(
        &self,
        project: Option<&str>,
        status: Option<InstanceStatus>,
    ) -> Result<Vec<ProcessInstance>> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT instance FROM process_instances WHERE 1 = 1");
        if let Some(project) = project {
            query.push(" AND project = ").push_bind(project.to_string());
        }
        if let Some(status) = status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        query.push(" ORDER BY created DESC");

        let rows = query.build().fetch_all(&self.pool).await?;
        let mut instances = Vec::with_capacity(rows.len());
        for row in rows {
            let json: String = row.try_get("instance")?;
            instances.push(serde_json::from_str(&json)?);
        }
        Ok(instances)
    }
}

#[async_trait]
impl ApprovalStore for SqliteStore {
    async fn insert_approval(&self, request: &ApprovalRequest) -> Result<()> {
        let json = serde_json::to_string(request)?;
        sqlx::query(
            r#"
            INSERT INTO approval_requests (id, instance_id, target_role, project, request, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&request.id)
        .bind(request.instance_id.as_deref())
        .bind(request.target_role.as_str())
        .bind(&request.project)
        .bind(&json)
        .bind(timestamp(request.created_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_approval(&self, id: &str) -> Result<Option<ApprovalRequest>> {
        let row = sqlx::query("SELECT request FROM approval_requests WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let json: String = row.try_get("request")?;
                Ok(Some(serde_json::from_str(&json)?))
            }
            None => Ok(None),
        }
    }

    async fn delete_approval(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM approval_requests WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_approvals(
        &self,
        target_role: Role,
        projects: &[String],
    ) -> Result<Vec<ApprovalRequest>> {
        let mut query =
            QueryBuilder::<Sqlite>::new("SELECT request FROM approval_requests WHERE target_role = ");
        query.push_bind(target_role.as_str());
        if !projects.is_empty() {
            query.push(" AND project IN (");
            let mut separated = query.separated(", ");
            for project in projects {
                separated.push_bind(project.clone());
            }
            separated.push_unseparated(")");
        }
        query.push(" ORDER BY created_at ASC");

        let rows = query.build().fetch_all(&self.pool).await?;
        let mut requests = Vec::with_capacity(rows.len());
        for row in rows {
            let json: String = row.try_get("request")?;
            requests.push(serde_json::from_str(&json)?);
        }
        Ok(requests)
    }
}
