/// Process engine
///
/// Entry point for every operation on definitions, instances and approval
/// requests. Each mutating call follows the same order: load, dry-run the
/// change on a copy, consult the approval gate, then either commit through the
/// store's conditional write or file an approval request capturing the intent.

use crate::error::{EngineError, RecordKind, Result};
use crate::notify::{ApprovalEvent, NotificationRelay};
use crate::process::graph::compile;
use crate::process::registry::DefinitionRegistry;
use crate::process::types::{Actor, DefinitionDraft, ProcessDefinition, Role};
use crate::process::validator::validate_draft;
use crate::runtime::approval::{
    ApprovalRequest, ApprovalStatus, Intent, RequestSubject, ResolutionNotice,
};
use crate::runtime::gate::{self, GateDecision, Requirement};
use crate::runtime::instance::{InstanceStatus, ProcessInstance, StepCommand, StepEffect};
use crate::storage::{ProcessStore, SavedDefinition};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Result of a gated operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "record", rename_all = "snake_case")]
pub enum Outcome<T> {
    /// The operation ran; here is the new state.
    Applied(T),
    /// The actor lacked the role; the operation waits for approval.
    Deferred(ApprovalRequest),
}

impl<T> Outcome<T> {
    pub fn is_deferred(&self) -> bool {
        matches!(self, Outcome::Deferred(_))
    }

    pub fn applied(self) -> Option<T> {
        match self {
            Outcome::Applied(value) => Some(value),
            Outcome::Deferred(_) => None,
        }
    }

    pub fn deferred(self) -> Option<ApprovalRequest> {
        match self {
            Outcome::Applied(_) => None,
            Outcome::Deferred(request) => Some(request),
        }
    }
}

/// State produced by replaying an approved intent.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "record", rename_all = "snake_case")]
pub enum Replayed {
    Instance(ProcessInstance),
    Definition(ProcessDefinition),
    DefinitionDeleted(String),
}

/// What resolving an approval request did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub request: ApprovalRequest,
    pub notice: ResolutionNotice,
    /// Present only for approvals.
    pub replayed: Option<Replayed>,
}

/// Instance listing filter; every field narrows the result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceFilter {
    pub project: Option<String>,
    pub status: Option<InstanceStatus>,
    /// Only instances that are no longer running (finished or cancelled).
    pub archived: bool,
    /// Matched case-insensitively.
    pub process_name: Option<String>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
    pub completed_from: Option<DateTime<Utc>>,
    pub completed_to: Option<DateTime<Utc>>,
}

impl InstanceFilter {
    /// Checks the fields the store does not filter on.
    fn admits(&self, instance: &ProcessInstance) -> bool {
        if self.archived && instance.status == InstanceStatus::Running {
            return false;
        }
        if let Some(name) = &self.process_name {
            if instance.process_name.to_lowercase() != name.to_lowercase() {
                return false;
            }
        }
        if self.created_from.is_some_and(|from| instance.created < from)
            || self.created_to.is_some_and(|to| instance.created > to)
        {
            return false;
        }
        if self.completed_from.is_some() || self.completed_to.is_some() {
            let Some(completed) = instance.completed_at else {
                return false;
            };
            if self.completed_from.is_some_and(|from| completed < from)
                || self.completed_to.is_some_and(|to| completed > to)
            {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gating {
    Enforce,
    /// Replay of an approved request filed against `filed_at_version`.
    Replay { filed_at_version: u64 },
}

/// Role-gated process execution engine.
pub struct ProcessEngine {
    store: Arc<dyn ProcessStore>,
    registry: Arc<DefinitionRegistry>,
    relay: Arc<dyn NotificationRelay>,
}

impl ProcessEngine {
    pub fn new(
        store: Arc<dyn ProcessStore>,
        registry: Arc<DefinitionRegistry>,
        relay: Arc<dyn NotificationRelay>,
    ) -> Self {
        Self {
            store,
            registry,
            relay,
        }
    }

    pub fn registry(&self) -> &DefinitionRegistry {
        &self.registry
    }

    /// Compile every stored definition into the registry.
    pub async fn warm_registry(&self) -> Result<usize> {
        let definitions = self.store.list_definitions(None).await?;
        Ok(self.registry.warm(&definitions))
    }

    // ---------------------------------------------------------------------
    // Definitions
    // ---------------------------------------------------------------------

    /// Publish a definition, overwriting any definition with the same name.
    ///
    /// The draft is fully validated and compiled before the gate is consulted,
    /// so only publishable drafts are ever filed for approval.
    pub async fn publish_definition(
        &self,
        draft: DefinitionDraft,
        actor: &Actor,
    ) -> Result<Outcome<SavedDefinition>> {
        check_publishable(&draft).inspect_err(|e| {
            tracing::warn!("❌ Rejected definition '{}' from {}: {}", draft.name, actor.name, e)
        })?;

        match gate::check(actor, Requirement::Privileged) {
            GateDecision::Proceed => Ok(Outcome::Applied(self.save_definition(draft).await?)),
            GateDecision::Defer => {
                let message = format!(
                    "{} requests approval to publish process \"{}\".",
                    actor.name, draft.name
                );
                let subject = RequestSubject {
                    project: draft.project.clone(),
                    process_name: Some(draft.name.clone()),
                    ..RequestSubject::default()
                };
                let request = self
                    .file_request(actor, Intent::PublishDefinition { draft }, message, subject)
                    .await?;
                Ok(Outcome::Deferred(request))
            }
        }
    }

    async fn save_definition(&self, draft: DefinitionDraft) -> Result<SavedDefinition> {
        let saved = self.store.save_definition(draft, Utc::now()).await?;
        self.registry.compiled(&saved.definition)?;
        tracing::info!(
            "📝 {} definition '{}' ({}) rev {}",
            if saved.overwritten { "Overwrote" } else { "Created" },
            saved.definition.name,
            saved.definition.id,
            saved.definition.revision
        );
        Ok(saved)
    }

    /// Delete a definition. Instances already created from it keep running on
    /// their own graph snapshot.
    pub async fn delete_definition(
        &self,
        definition_id: &str,
        actor: &Actor,
    ) -> Result<Outcome<String>> {
        let definition = self.get_definition(definition_id).await?;

        match gate::check(actor, Requirement::Privileged) {
            GateDecision::Proceed => {
                self.remove_definition(definition_id).await?;
                Ok(Outcome::Applied(definition_id.to_string()))
            }
            GateDecision::Defer => {
                let message = format!(
                    "{} requests approval to delete process \"{}\".",
                    actor.name, definition.name
                );
                let subject = RequestSubject {
                    project: definition.project.clone(),
                    process_name: Some(definition.name.clone()),
                    process_id: Some(definition.id.clone()),
                    instance_name: None,
                };
                let intent = Intent::DeleteDefinition {
                    definition_id: definition_id.to_string(),
                };
                let request = self.file_request(actor, intent, message, subject).await?;
                Ok(Outcome::Deferred(request))
            }
        }
    }

    async fn remove_definition(&self, definition_id: &str) -> Result<()> {
        if !self.store.delete_definition(definition_id).await? {
            return Err(EngineError::not_found(RecordKind::Definition, definition_id));
        }
        self.registry.remove(definition_id);
        tracing::info!("🗑️ Deleted definition: {}", definition_id);
        Ok(())
    }

    pub async fn get_definition(&self, definition_id: &str) -> Result<ProcessDefinition> {
        tracing::debug!("Loading definition {}", definition_id);
        self.store
            .get_definition(definition_id)
            .await?
            .ok_or_else(|| EngineError::not_found(RecordKind::Definition, definition_id))
    }

    pub async fn list_definitions(&self, project: Option<&str>) -> Result<Vec<ProcessDefinition>> {
        self.store.list_definitions(project).await
    }

    // ---------------------------------------------------------------------
    // Instances
    // ---------------------------------------------------------------------

    /// Start a new instance of a definition. Not gated.
    pub async fn create_instance(
        &self,
        definition_id: &str,
        instance_name: &str,
        actor: &Actor,
    ) -> Result<ProcessInstance> {
        let definition = self.get_definition(definition_id).await?;
        let compiled = self.registry.compiled(&definition)?;
        let instance = ProcessInstance::start(&definition, &compiled, instance_name, Utc::now())?;
        self.store.insert_instance(&instance).await?;

        tracing::info!(
            "🚀 {} started instance '{}' ({}) of '{}' at {}",
            actor.name,
            instance.instance_name,
            instance.id,
            instance.process_name,
            instance.position
        );
        Ok(instance)
    }

    pub async fn get_instance(&self, instance_id: &str) -> Result<ProcessInstance> {
        tracing::debug!("Loading instance {}", instance_id);
        self.store
            .get_instance(instance_id)
            .await?
            .ok_or_else(|| EngineError::not_found(RecordKind::Instance, instance_id))
    }

    /// Instances matching `filter`, newest first.
    pub async fn list_instances(&self, filter: &InstanceFilter) -> Result<Vec<ProcessInstance>> {
        let instances = self
            .store
            .list_instances(filter.project.as_deref(), filter.status)
            .await?;
        Ok(instances.into_iter().filter(|i| filter.admits(i)).collect())
    }

    pub async fn advance(&self, instance_id: &str, actor: &Actor) -> Result<Outcome<ProcessInstance>> {
        self.step(instance_id, StepCommand::Advance, actor, Gating::Enforce)
            .await
    }

    pub async fn choose(
        &self,
        instance_id: &str,
        target: &str,
        actor: &Actor,
    ) -> Result<Outcome<ProcessInstance>> {
        let command = StepCommand::Choose {
            target: target.to_string(),
        };
        self.step(instance_id, command, actor, Gating::Enforce).await
    }

    pub async fn finish(&self, instance_id: &str, actor: &Actor) -> Result<Outcome<ProcessInstance>> {
        self.step(instance_id, StepCommand::Finish, actor, Gating::Enforce)
            .await
    }

    pub async fn cancel(&self, instance_id: &str, actor: &Actor) -> Result<Outcome<ProcessInstance>> {
        self.step(instance_id, StepCommand::Cancel, actor, Gating::Enforce)
            .await
    }

    /// Run one step command.
    ///
    /// The command is applied to a copy first; a failure there is returned
    /// before the gate is asked, and the stored instance is untouched. A replay
    /// is refused when the instance no longer has the version the request saw.
    async fn step(
        &self,
        instance_id: &str,
        command: StepCommand,
        actor: &Actor,
        gating: Gating,
    ) -> Result<Outcome<ProcessInstance>> {
        let current = self.get_instance(instance_id).await?;

        if let Gating::Replay { filed_at_version } = gating {
            if current.version != filed_at_version {
                return Err(EngineError::IllegalTransition(format!(
                    "instance '{}' has moved on since the request was filed (version {} is now {})",
                    current.instance_name, filed_at_version, current.version
                )));
            }
        }

        let mut next = current.clone();
        let effect = next.apply(&command, Utc::now()).inspect_err(|e| {
            tracing::warn!(
                "❌ {} could not {} instance '{}': {}",
                actor.name,
                command.verb(),
                current.instance_name,
                e
            )
        })?;

        if !effect.changed_state() {
            tracing::debug!(
                "Instance '{}' is at sink '{}'; nothing to do",
                current.instance_name,
                current.position
            );
            return Ok(Outcome::Applied(current));
        }

        if gating == Gating::Enforce {
            let required = current.required_role();
            if gate::check(actor, Requirement::ElementRole(required)) == GateDecision::Defer {
                return self.defer_step(&current, command, actor, required).await;
            }
        }

        next.version = current.version + 1;
        self.store.update_instance(&next, current.version).await?;
        log_effect(&next, &effect, actor);
        Ok(Outcome::Applied(next))
    }

    async fn defer_step(
        &self,
        instance: &ProcessInstance,
        command: StepCommand,
        actor: &Actor,
        required: Role,
    ) -> Result<Outcome<ProcessInstance>> {
        let message = format!(
            "{} requests approval to {} instance \"{}\" of process \"{}\" at \"{}\" ({} step).",
            actor.name,
            command.verb(),
            instance.instance_name,
            instance.process_name,
            instance.current_element.name,
            required
        );
        let subject = RequestSubject {
            project: instance.project.clone(),
            process_name: Some(instance.process_name.clone()),
            process_id: Some(instance.process_id.clone()),
            instance_name: Some(instance.instance_name.clone()),
        };
        let intent = Intent::Step {
            instance_id: instance.id.clone(),
            command,
            filed_at_version: instance.version,
        };
        let request = self.file_request(actor, intent, message, subject).await?;
        Ok(Outcome::Deferred(request))
    }

    // ---------------------------------------------------------------------
    // Approvals
    // ---------------------------------------------------------------------

    async fn file_request(
        &self,
        actor: &Actor,
        intent: Intent,
        message: String,
        subject: RequestSubject,
    ) -> Result<ApprovalRequest> {
        let request = ApprovalRequest::pending(actor, intent, message, subject, Utc::now());
        self.store.insert_approval(&request).await?;
        tracing::info!(
            "⏸️ Deferred: {} ({}) filed approval request {} for {}",
            actor.name,
            actor.role,
            request.id,
            request.subject()
        );
        self.relay.publish(ApprovalEvent::Filed(request.clone()));
        Ok(request)
    }

    /// Pending requests addressed to `target_role` in any of `projects` (all
    /// projects when empty), oldest first.
    pub async fn pending_approvals(
        &self,
        target_role: Role,
        projects: &[String],
    ) -> Result<Vec<ApprovalRequest>> {
        self.store.list_approvals(target_role, projects).await
    }

    pub async fn get_approval(&self, request_id: &str) -> Result<ApprovalRequest> {
        self.store
            .get_approval(request_id)
            .await?
            .ok_or_else(|| EngineError::not_found(RecordKind::ApprovalRequest, request_id))
    }

    /// Approve a request: replay its intent as `approver`, then notify the requester.
    ///
    /// The request is claimed by deleting it, so a second approval of the same
    /// request fails with `NotFound`. If the replay itself fails the request is
    /// put back and the error returned; it can then still be denied. Between the
    /// claim and the re-insert the request is absent from the store, so a
    /// `deny` or `approve` racing a failing approval gets `NotFound` and has to
    /// be retried once the first call returns.
    pub async fn approve(&self, request_id: &str, approver: &Actor) -> Result<Resolution> {
        gate::ensure_can_resolve(approver)?;
        let request = self.claim(request_id).await?;

        let replayed = match self.replay(&request.intent, approver).await {
            Ok(replayed) => replayed,
            Err(e) => {
                tracing::warn!("❌ Replay of approval request {} failed: {}", request.id, e);
                self.store.insert_approval(&request).await?;
                return Err(e);
            }
        };

        Ok(self.resolve(request, ApprovalStatus::Approved, approver, Some(replayed)))
    }

    /// Dismiss a request without touching the instance or definition it names.
    pub async fn deny(&self, request_id: &str, approver: &Actor) -> Result<Resolution> {
        gate::ensure_can_resolve(approver)?;
        let request = self.claim(request_id).await?;
        Ok(self.resolve(request, ApprovalStatus::Dismissed, approver, None))
    }

    async fn claim(&self, request_id: &str) -> Result<ApprovalRequest> {
        let request = self.get_approval(request_id).await?;
        if !self.store.delete_approval(request_id).await? {
            // Another resolver won the race
            return Err(EngineError::not_found(RecordKind::ApprovalRequest, request_id));
        }
        Ok(request)
    }

    async fn replay(&self, intent: &Intent, approver: &Actor) -> Result<Replayed> {
        match intent {
            Intent::Step {
                instance_id,
                command,
                filed_at_version,
            } => {
                let gating = Gating::Replay {
                    filed_at_version: *filed_at_version,
                };
                let outcome = self
                    .step(instance_id, command.clone(), approver, gating)
                    .await?;
                match outcome {
                    Outcome::Applied(instance) => Ok(Replayed::Instance(instance)),
                    Outcome::Deferred(_) => Err(EngineError::IllegalTransition(
                        "replayed step was deferred again".into(),
                    )),
                }
            }
            Intent::PublishDefinition { draft } => {
                check_publishable(draft)?;
                let saved = self.save_definition(draft.clone()).await?;
                Ok(Replayed::Definition(saved.definition))
            }
            Intent::DeleteDefinition { definition_id } => {
                self.remove_definition(definition_id).await?;
                Ok(Replayed::DefinitionDeleted(definition_id.clone()))
            }
        }
    }

    fn resolve(
        &self,
        mut request: ApprovalRequest,
        status: ApprovalStatus,
        resolver: &Actor,
        replayed: Option<Replayed>,
    ) -> Resolution {
        request.status = status;
        let notice = ResolutionNotice::for_request(&request, status, resolver, Utc::now());
        tracing::info!(
            "✅ {} {} approval request {} from {}",
            resolver.name,
            if status == ApprovalStatus::Approved { "approved" } else { "dismissed" },
            request.id,
            request.requested_by
        );
        self.relay.publish(ApprovalEvent::Resolved(notice.clone()));
        Resolution {
            request,
            notice,
            replayed,
        }
    }
}

/// Full pre-publication check: draft fields, element completeness, graph shape.
fn check_publishable(draft: &DefinitionDraft) -> Result<()> {
    validate_draft(draft)?;
    let provisional = ProcessDefinition::from_draft(draft.clone(), Utc::now());
    compile(&provisional).map(|_| ())
}

fn log_effect(instance: &ProcessInstance, effect: &StepEffect, actor: &Actor) {
    match effect {
        StepEffect::Moved { from, to } => tracing::info!(
            "➡️ {} moved instance '{}' from {} to {}",
            actor.name,
            instance.instance_name,
            from,
            to
        ),
        StepEffect::ChoicesOffered(edges) => tracing::info!(
            "🔀 Instance '{}' reached gateway {} with {} choices",
            instance.instance_name,
            instance.position,
            edges.len()
        ),
        StepEffect::Finished => {
            tracing::info!("🏁 {} finished instance '{}'", actor.name, instance.instance_name)
        }
        StepEffect::Canceled => {
            tracing::info!("🛑 {} canceled instance '{}'", actor.name, instance.instance_name)
        }
        StepEffect::AtSink => {}
    }
}
