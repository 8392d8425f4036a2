/// Definition validation
///
/// Every step element must name the role that performs it and describe the
/// work before a definition may be published.

use crate::error::{EngineError, Result};
use crate::process::types::{DefinitionDraft, Element};
use serde::{Deserialize, Serialize};

/// The field an element is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MissingField {
    Role,
    Description,
}

/// One offending element/field pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub element_id: String,
    pub element_name: Option<String>,
    pub missing: MissingField,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let who = self
            .element_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.element_id);
        let what = match self.missing {
            MissingField::Role => "a role",
            MissingField::Description => "a description",
        };
        write!(f, "{} is missing {}.", who, what)
    }
}

/// Collect every role/description violation among step elements.
pub fn collect_issues(elements: &[Element]) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for element in elements.iter().filter(|e| e.kind.is_step()) {
        if element.role.is_none() {
            issues.push(ValidationIssue {
                element_id: element.id.clone(),
                element_name: element.name.clone(),
                missing: MissingField::Role,
            });
        }
        if element.description.trim().is_empty() {
            issues.push(ValidationIssue {
                element_id: element.id.clone(),
                element_name: element.name.clone(),
                missing: MissingField::Description,
            });
        }
    }
    issues
}

/// Fail with `IncompleteDefinition` listing all issues, if there are any.
pub fn validate_elements(elements: &[Element]) -> Result<()> {
    let issues = collect_issues(elements);
    if issues.is_empty() {
        Ok(())
    } else {
        Err(EngineError::IncompleteDefinition(issues))
    }
}

/// Full publication check for a draft: name, project, then elements.
pub fn validate_draft(draft: &DefinitionDraft) -> Result<()> {
    if draft.name.trim().is_empty() {
        return Err(EngineError::Validation("process name is required".into()));
    }
    if draft.project.trim().is_empty() {
        return Err(EngineError::Validation(
            "a project must be assigned to the process".into(),
        ));
    }
    validate_elements(&draft.elements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::types::{ElementKind, Role};

    fn element(id: &str, kind: ElementKind, role: Option<Role>, description: &str) -> Element {
        Element {
            id: id.into(),
            name: None,
            kind,
            role,
            description: description.into(),
        }
    }

    #[test]
    fn complete_elements_pass() {
        let elements = vec![
            element("S", ElementKind::StartEvent, Some(Role::Employee), "kick off"),
            element("T", ElementKind::Task, Some(Role::Manager), "sign"),
        ];
        assert!(validate_elements(&elements).is_ok());
    }

    #[test]
    fn collects_all_violations_not_just_first() {
        let elements = vec![
            element("S", ElementKind::StartEvent, None, ""),
            element("T", ElementKind::Task, Some(Role::Manager), "   "),
            element("G", ElementKind::Gateway, None, "route"),
        ];
        let issues = collect_issues(&elements);
        assert_eq!(issues.len(), 4);
        assert_eq!(
            issues
                .iter()
                .filter(|issue| issue.element_id == "S")
                .count(),
            2
        );
        assert!(issues
            .iter()
            .any(|i| i.element_id == "T" && i.missing == MissingField::Description));
        assert!(issues
            .iter()
            .any(|i| i.element_id == "G" && i.missing == MissingField::Role));
    }

    #[test]
    fn flows_and_process_container_are_skipped() {
        let elements = vec![
            element("Flow_1", ElementKind::SequenceFlow, None, ""),
            element("Process_1", ElementKind::Process, None, ""),
        ];
        assert!(validate_elements(&elements).is_ok());
    }

    #[test]
    fn draft_requires_name_and_project() {
        let mut draft = DefinitionDraft {
            name: " ".into(),
            project: "ops".into(),
            elements: vec![],
            transitions: vec![],
            start_element: None,
            source: None,
        };
        assert!(matches!(validate_draft(&draft), Err(EngineError::Validation(_))));

        draft.name = "Purchase".into();
        draft.project = String::new();
        assert!(matches!(validate_draft(&draft), Err(EngineError::Validation(_))));
    }
}
