/// Process instance record and its state machine
///
/// `Running -> Finished` and `Running -> Canceled` are the only status changes.
/// Every transition method validates first and mutates only on success, so a
/// failed call leaves the instance untouched.

use crate::error::{EngineError, Result};
use crate::process::graph::{CompiledDefinition, FlowEdge, FlowGraph};
use crate::process::types::{ElementSnapshot, ProcessDefinition, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    Running,
    Finished,
    Canceled,
}

impl InstanceStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, InstanceStatus::Running)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InstanceStatus::Running => "running",
            InstanceStatus::Finished => "finished",
            InstanceStatus::Canceled => "canceled",
        }
    }
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstanceStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "running" => Ok(InstanceStatus::Running),
            "finished" => Ok(InstanceStatus::Finished),
            "canceled" | "cancelled" => Ok(InstanceStatus::Canceled),
            other => Err(format!("unknown instance status '{}'", other)),
        }
    }
}

/// A step operation on a running instance, as captured for replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StepCommand {
    Advance,
    Choose { target: String },
    Finish,
    Cancel,
}

impl StepCommand {
    /// Verb used in log lines and request messages.
    pub fn verb(&self) -> &'static str {
        match self {
            StepCommand::Advance => "advance",
            StepCommand::Choose { .. } => "choose a path for",
            StepCommand::Finish => "finish",
            StepCommand::Cancel => "cancel",
        }
    }
}

/// What an applied step did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepEffect {
    /// Position moved to a new element.
    Moved { from: String, to: String },
    /// A gateway was reached; the listed edges await a `choose`.
    ChoicesOffered(Vec<FlowEdge>),
    /// The position has no outgoing edges; nothing changed.
    AtSink,
    Finished,
    Canceled,
}

impl StepEffect {
    /// Whether the instance record changed and must be persisted.
    pub fn changed_state(&self) -> bool {
        !matches!(self, StepEffect::AtSink)
    }
}

/// One running or concluded execution of a definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInstance {
    pub id: String,
    pub process_id: String,
    pub process_name: String,
    pub instance_name: String,
    pub project: String,
    /// Graph captured at creation; later definition edits do not reach it.
    pub flow_graph: FlowGraph,
    /// Element catalogue captured at creation, used to refresh `current_element`.
    pub elements: BTreeMap<String, ElementSnapshot>,
    pub position: String,
    pub current_element: ElementSnapshot,
    pub gateway_choices: Vec<FlowEdge>,
    pub status: InstanceStatus,
    pub created: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Optimistic concurrency token; bumped on every persisted change.
    pub version: u64,
}

impl ProcessInstance {
    /// Start a new instance at the definition's start element.
    pub fn start(
        definition: &ProcessDefinition,
        compiled: &CompiledDefinition,
        instance_name: &str,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let instance_name = instance_name.trim();
        if instance_name.is_empty() {
            return Err(EngineError::Validation("instance name is required".into()));
        }

        let current_element = compiled
            .elements
            .get(&compiled.start_element)
            .cloned()
            .ok_or_else(|| {
                EngineError::MalformedDefinition(format!(
                    "start element '{}' is not declared",
                    compiled.start_element
                ))
            })?;

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            process_id: definition.id.clone(),
            process_name: definition.name.clone(),
            instance_name: instance_name.to_string(),
            project: definition.project.clone(),
            flow_graph: compiled.graph.clone(),
            elements: compiled.elements.clone(),
            position: compiled.start_element.clone(),
            current_element,
            gateway_choices: Vec::new(),
            status: InstanceStatus::Running,
            created: now,
            completed_at: None,
            version: 0,
        })
    }

    /// Role required to act on the current element.
    pub fn required_role(&self) -> Role {
        self.current_element.role
    }

    /// Outgoing edges of the current position.
    pub fn next_edges(&self) -> &[FlowEdge] {
        self.flow_graph.outgoing(&self.position)
    }

    fn ensure_running(&self, operation: &str) -> Result<()> {
        if self.status.is_terminal() {
            return Err(EngineError::IllegalTransition(format!(
                "cannot {} instance '{}': it is already {}",
                operation, self.instance_name, self.status
            )));
        }
        Ok(())
    }

    fn snapshot_of(&self, element: &str) -> Result<ElementSnapshot> {
        self.elements.get(element).cloned().ok_or_else(|| {
            EngineError::MalformedDefinition(format!(
                "element '{}' is missing from the instance snapshot",
                element
            ))
        })
    }

    fn move_to(&mut self, target: &str) -> Result<StepEffect> {
        let snapshot = self.snapshot_of(target)?;
        let from = std::mem::replace(&mut self.position, target.to_string());
        self.current_element = snapshot;
        self.gateway_choices.clear();
        Ok(StepEffect::Moved {
            from,
            to: target.to_string(),
        })
    }

    /// Take one step along the graph.
    pub fn advance(&mut self) -> Result<StepEffect> {
        self.ensure_running("advance")?;
        let edges = self.next_edges().to_vec();
        match edges.as_slice() {
            [] => Ok(StepEffect::AtSink),
            [only] => {
                let target = only.target.clone();
                self.move_to(&target)
            }
            _ => {
                self.gateway_choices = edges.clone();
                Ok(StepEffect::ChoicesOffered(edges))
            }
        }
    }

    /// Resolve a pending gateway choice.
    pub fn choose(&mut self, target: &str) -> Result<StepEffect> {
        self.ensure_running("choose a path for")?;
        if self.gateway_choices.is_empty() {
            return Err(EngineError::IllegalTransition(format!(
                "instance '{}' has no pending gateway choice",
                self.instance_name
            )));
        }
        if !self.gateway_choices.iter().any(|edge| edge.target == target) {
            return Err(EngineError::InvalidChoice {
                target: target.to_string(),
            });
        }
        self.move_to(target)
    }

    pub fn finish(&mut self, now: DateTime<Utc>) -> Result<StepEffect> {
        self.ensure_running("finish")?;
        self.conclude(InstanceStatus::Finished, now);
        Ok(StepEffect::Finished)
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<StepEffect> {
        self.ensure_running("cancel")?;
        self.conclude(InstanceStatus::Canceled, now);
        Ok(StepEffect::Canceled)
    }

    fn conclude(&mut self, status: InstanceStatus, now: DateTime<Utc>) {
        self.status = status;
        self.gateway_choices.clear();
        self.completed_at = Some(now);
    }

    /// Apply a captured command.
    pub fn apply(&mut self, command: &StepCommand, now: DateTime<Utc>) -> Result<StepEffect> {
        match command {
            StepCommand::Advance => self.advance(),
            StepCommand::Choose { target } => self.choose(target),
            StepCommand::Finish => self.finish(now),
            StepCommand::Cancel => self.cancel(now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::graph::compile;
    use crate::process::types::{Element, ElementKind, Transition};

    fn fixture(transitions: &[(&str, &str, &str)]) -> (ProcessDefinition, CompiledDefinition) {
        let mut ids: Vec<&str> = transitions.iter().flat_map(|(s, t, _)| [*s, *t]).collect();
        ids.sort();
        ids.dedup();
        let elements = ids
            .iter()
            .map(|id| Element {
                id: id.to_string(),
                name: Some(format!("Step {}", id)),
                kind: ElementKind::Task,
                role: Some(Role::Employee),
                description: "work".into(),
            })
            .collect();
        let now = Utc::now();
        let definition = ProcessDefinition {
            id: "def".into(),
            name: "Test process".into(),
            project: "proj".into(),
            elements,
            transitions: transitions
                .iter()
                .map(|(s, t, l)| Transition::new(*s, *t, Some(*l)))
                .collect(),
            start_element: "A".into(),
            source: None,
            revision: 1,
            created_at: now,
            updated_at: now,
        };
        let compiled = compile(&definition).unwrap();
        (definition, compiled)
    }

    fn instance(transitions: &[(&str, &str, &str)]) -> ProcessInstance {
        let (definition, compiled) = fixture(transitions);
        ProcessInstance::start(&definition, &compiled, "run #1", Utc::now()).unwrap()
    }

    #[test]
    fn starts_at_start_element() {
        let inst = instance(&[("A", "B", "x")]);
        assert_eq!(inst.position, "A");
        assert_eq!(inst.current_element.name, "Step A");
        assert!(inst.gateway_choices.is_empty());
        assert_eq!(inst.status, InstanceStatus::Running);
        assert!(inst.completed_at.is_none());
    }

    #[test]
    fn blank_instance_name_is_rejected() {
        let (definition, compiled) = fixture(&[("A", "B", "x")]);
        let err = ProcessInstance::start(&definition, &compiled, "   ", Utc::now()).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn single_edge_advance_moves() {
        let mut inst = instance(&[("A", "B", "x")]);
        let effect = inst.advance().unwrap();
        assert_eq!(
            effect,
            StepEffect::Moved {
                from: "A".into(),
                to: "B".into()
            }
        );
        assert_eq!(inst.position, "B");
        assert_eq!(inst.current_element.id, "B");
        assert!(inst.gateway_choices.is_empty());
    }

    #[test]
    fn multi_edge_advance_offers_choices_then_choose_moves() {
        let mut inst = instance(&[("A", "B", "left"), ("A", "C", "right")]);
        inst.advance().unwrap();
        assert_eq!(inst.position, "A");
        let targets: Vec<&str> = inst.gateway_choices.iter().map(|e| e.target.as_str()).collect();
        assert_eq!(targets, vec!["B", "C"]);

        inst.choose("C").unwrap();
        assert_eq!(inst.position, "C");
        assert!(inst.gateway_choices.is_empty());
    }

    #[test]
    fn unoffered_choice_fails_without_change() {
        let mut inst = instance(&[("A", "B", "left"), ("A", "C", "right"), ("C", "D", "on")]);
        inst.advance().unwrap();
        let before = inst.clone();
        let err = inst.choose("D").unwrap_err();
        assert!(matches!(err, EngineError::InvalidChoice { .. }));
        assert_eq!(inst, before);
    }

    #[test]
    fn choose_without_pending_choices_is_illegal() {
        let mut inst = instance(&[("A", "B", "left"), ("A", "C", "right")]);
        let err = inst.choose("B").unwrap_err();
        assert!(matches!(err, EngineError::IllegalTransition(_)));
    }

    #[test]
    fn advance_at_sink_is_a_no_op() {
        let mut inst = instance(&[("A", "B", "x")]);
        inst.advance().unwrap();
        let before = inst.clone();
        let effect = inst.advance().unwrap();
        assert_eq!(effect, StepEffect::AtSink);
        assert!(!effect.changed_state());
        assert_eq!(inst, before);
    }

    #[test]
    fn terminal_instances_reject_everything() {
        let mut inst = instance(&[("A", "B", "left"), ("A", "C", "right")]);
        inst.advance().unwrap();
        let stamped = Utc::now();
        inst.cancel(stamped).unwrap();
        assert!(inst.gateway_choices.is_empty());
        let before = inst.clone();

        for command in [
            StepCommand::Advance,
            StepCommand::Choose { target: "B".into() },
            StepCommand::Finish,
            StepCommand::Cancel,
        ] {
            let err = inst.apply(&command, Utc::now()).unwrap_err();
            assert!(matches!(err, EngineError::IllegalTransition(_)), "{:?}", command);
        }
        assert_eq!(inst, before);
        assert_eq!(inst.completed_at, Some(stamped));
    }

    #[test]
    fn finish_stamps_completion_once() {
        let mut inst = instance(&[("A", "B", "x")]);
        let first = Utc::now();
        inst.finish(first).unwrap();
        assert_eq!(inst.status, InstanceStatus::Finished);
        assert!(inst.finish(Utc::now()).is_err());
        assert_eq!(inst.completed_at, Some(first));
    }

    #[test]
    fn status_parses_both_spellings() {
        assert_eq!("Cancelled".parse::<InstanceStatus>(), Ok(InstanceStatus::Canceled));
        assert_eq!("running".parse::<InstanceStatus>(), Ok(InstanceStatus::Running));
    }

    #[test]
    fn step_command_serializes_with_kind_tag() {
        let json = serde_json::to_value(StepCommand::Choose { target: "B".into() }).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "choose", "target": "B" }));
    }
}
