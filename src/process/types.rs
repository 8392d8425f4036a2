/// Core process definition types
///
/// Defines roles, actors, elements and transitions, and the definition record
/// that is published, stored, and compiled into flow graphs for new instances.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Id of the start element every modeled process begins with.
pub const DEFAULT_START_ELEMENT: &str = "StartEvent_1";

/// Organizational role carried by actors and required by elements.
///
/// Ranked `Admin > Manager > Employee`. Admin and Manager are privileged:
/// they may act on any element and resolve approval requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Manager,
    Employee,
}

impl Role {
    /// The role approval requests are addressed to.
    pub const APPROVER: Role = Role::Manager;

    pub fn is_privileged(self) -> bool {
        matches!(self, Role::Admin | Role::Manager)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Manager => "Manager",
            Role::Employee => "Employee",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            "employee" => Ok(Role::Employee),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// An already-authenticated caller, supplied by the identity collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub name: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role,
        }
    }
}

/// Kind of a modeled element.
///
/// `SequenceFlow` and `Process` may appear in an element list exported from a
/// modeler; they are structure, not steps, and are never validated or visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementKind {
    StartEvent,
    Task,
    Gateway,
    IntermediateEvent,
    EndEvent,
    SequenceFlow,
    Process,
}

impl ElementKind {
    /// Whether elements of this kind are steps an instance can occupy.
    pub fn is_step(self) -> bool {
        !matches!(self, ElementKind::SequenceFlow | ElementKind::Process)
    }
}

/// A single modeled element with its execution metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub kind: ElementKind,
    /// Required role; optional only while a definition is still being authored.
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub description: String,
}

impl Element {
    /// Name shown to users, falling back to the element id.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.id)
    }
}

/// Directed, optionally labeled connection between two elements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub label: Option<String>,
}

impl Transition {
    pub fn new(source: impl Into<String>, target: impl Into<String>, label: Option<&str>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            label: label.map(str::to_string),
        }
    }
}

/// A definition as submitted for publication.
///
/// This is also the payload captured in an approval request when an
/// under-privileged actor asks for a definition to be published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionDraft {
    pub name: String,
    pub project: String,
    pub elements: Vec<Element>,
    pub transitions: Vec<Transition>,
    /// Defaults to [`DEFAULT_START_ELEMENT`].
    #[serde(default)]
    pub start_element: Option<String>,
    /// Opaque diagram source (e.g. modeler XML); stored verbatim, never interpreted.
    #[serde(default)]
    pub source: Option<String>,
}

impl DefinitionDraft {
    pub fn start_element(&self) -> &str {
        self.start_element
            .as_deref()
            .unwrap_or(DEFAULT_START_ELEMENT)
    }
}

/// A published, reusable process template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessDefinition {
    pub id: String,
    pub name: String,
    pub project: String,
    pub elements: Vec<Element>,
    pub transitions: Vec<Transition>,
    pub start_element: String,
    #[serde(default)]
    pub source: Option<String>,
    /// Bumped every time the definition is overwritten by name.
    pub revision: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProcessDefinition {
    /// Materialize a fresh record from a draft.
    pub fn from_draft(draft: DefinitionDraft, now: DateTime<Utc>) -> Self {
        let start_element = draft.start_element().to_string();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: draft.name,
            project: draft.project,
            elements: draft.elements,
            transitions: draft.transitions,
            start_element,
            source: draft.source,
            revision: 1,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn element(&self, id: &str) -> Option<&Element> {
        self.elements.iter().find(|element| element.id == id)
    }
}

/// Denormalized view of an element, copied into instances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementSnapshot {
    pub id: String,
    pub name: String,
    pub role: Role,
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_parse_case_insensitively() {
        assert_eq!("manager".parse::<Role>(), Ok(Role::Manager));
        assert_eq!(" Admin ".parse::<Role>(), Ok(Role::Admin));
        assert!("intern".parse::<Role>().is_err());
    }

    #[test]
    fn only_admin_and_manager_are_privileged() {
        assert!(Role::Admin.is_privileged());
        assert!(Role::Manager.is_privileged());
        assert!(!Role::Employee.is_privileged());
    }

    #[test]
    fn draft_defaults_start_element() {
        let draft = DefinitionDraft {
            name: "Onboarding".into(),
            project: "hr".into(),
            elements: vec![],
            transitions: vec![],
            start_element: None,
            source: None,
        };
        assert_eq!(draft.start_element(), DEFAULT_START_ELEMENT);
    }

    #[test]
    fn display_name_falls_back_to_id() {
        let element = Element {
            id: "Task_9".into(),
            name: Some("  ".into()),
            kind: ElementKind::Task,
            role: None,
            description: String::new(),
        };
        assert_eq!(element.display_name(), "Task_9");
    }
}
