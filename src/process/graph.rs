/// Flow graph construction
///
/// Turns a definition's ordered transition list into the adjacency map instances
/// traverse, and compiles whole definitions into execution-ready form.

use crate::error::{EngineError, Result};
use crate::process::types::{ElementSnapshot, ProcessDefinition, Transition};
use crate::process::validator::validate_elements;
use petgraph::graphmap::DiGraphMap;
use petgraph::visit::Bfs;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Label given to transitions authored without one.
pub const UNNAMED_FLOW: &str = "Unnamed Flow";

/// Name given to element snapshots whose element has no name.
pub const UNNAMED_ELEMENT: &str = "Unnamed";

/// One outgoing edge as offered to an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowEdge {
    pub target: String,
    pub label: String,
}

/// Adjacency map `element id -> outgoing edges`.
///
/// Edge order within a source is the order the transitions were defined in;
/// gateway choices are offered in that order. Duplicate edges are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowGraph {
    edges: BTreeMap<String, Vec<FlowEdge>>,
}

impl FlowGraph {
    /// Build the adjacency map from an ordered transition list.
    ///
    /// Fails when the list is empty or when `start` is not the source of any
    /// transition, since an instance placed there could never move.
    pub fn build(transitions: &[Transition], start: &str) -> Result<Self> {
        if transitions.is_empty() {
            return Err(EngineError::MalformedDefinition(
                "definition has no transitions".to_string(),
            ));
        }

        let mut edges: BTreeMap<String, Vec<FlowEdge>> = BTreeMap::new();
        for transition in transitions {
            let label = transition
                .label
                .as_deref()
                .map(str::trim)
                .filter(|label| !label.is_empty())
                .unwrap_or(UNNAMED_FLOW)
                .to_string();
            edges
                .entry(transition.source.clone())
                .or_default()
                .push(FlowEdge {
                    target: transition.target.clone(),
                    label,
                });
        }

        if !edges.contains_key(start) {
            return Err(EngineError::MalformedDefinition(format!(
                "start element '{}' has no outgoing transition",
                start
            )));
        }

        Ok(Self { edges })
    }

    /// Outgoing edges of `element`, empty for sinks.
    pub fn outgoing(&self, element: &str) -> &[FlowEdge] {
        self.edges.get(element).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether `element` appears as a source or a target.
    pub fn contains(&self, element: &str) -> bool {
        self.edges.contains_key(element)
            || self
                .edges
                .values()
                .flatten()
                .any(|edge| edge.target == element)
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(Vec::len).sum()
    }

    /// Every element id reachable from `start`, `start` included.
    pub fn reachable_from(&self, start: &str) -> HashSet<String> {
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for (source, edges) in &self.edges {
            for edge in edges {
                graph.add_edge(source.as_str(), edge.target.as_str(), ());
            }
        }

        let mut reachable = HashSet::new();
        if !graph.contains_node(start) {
            return reachable;
        }
        let mut bfs = Bfs::new(&graph, start);
        while let Some(node) = bfs.next(&graph) {
            reachable.insert(node.to_string());
        }
        reachable
    }
}

/// A definition checked and prepared for instance creation.
#[derive(Debug, Clone)]
pub struct CompiledDefinition {
    pub definition_id: String,
    pub revision: u64,
    pub start_element: String,
    pub graph: FlowGraph,
    /// Step elements keyed by id, copied into every new instance.
    pub elements: BTreeMap<String, ElementSnapshot>,
    /// Step elements no path from the start element reaches.
    pub unreachable: Vec<String>,
}

/// Validate and compile a definition.
///
/// Fails with `IncompleteDefinition` if any step lacks a role or description, and
/// with `MalformedDefinition` for duplicate element ids, an undeclared start
/// element, a dangling transition, or an unusable transition list.
pub fn compile(definition: &ProcessDefinition) -> Result<CompiledDefinition> {
    validate_elements(&definition.elements)?;

    let mut elements = BTreeMap::new();
    for element in definition.elements.iter().filter(|e| e.kind.is_step()) {
        // validate_elements guarantees a role on every step element
        let role = element.role.ok_or_else(|| {
            EngineError::MalformedDefinition(format!("element '{}' has no role", element.id))
        })?;
        let snapshot = ElementSnapshot {
            id: element.id.clone(),
            name: element
                .name
                .clone()
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| UNNAMED_ELEMENT.to_string()),
            role,
            description: element.description.clone(),
        };
        if elements.insert(element.id.clone(), snapshot).is_some() {
            return Err(EngineError::MalformedDefinition(format!(
                "duplicate element id '{}'",
                element.id
            )));
        }
    }

    if !elements.contains_key(&definition.start_element) {
        return Err(EngineError::MalformedDefinition(format!(
            "start element '{}' is not declared",
            definition.start_element
        )));
    }

    for transition in &definition.transitions {
        for endpoint in [&transition.source, &transition.target] {
            if !elements.contains_key(endpoint) {
                return Err(EngineError::MalformedDefinition(format!(
                    "transition {} -> {} references undeclared element '{}'",
                    transition.source, transition.target, endpoint
                )));
            }
        }
    }

    let graph = FlowGraph::build(&definition.transitions, &definition.start_element)?;

    let reachable = graph.reachable_from(&definition.start_element);
    let unreachable: Vec<String> = elements
        .keys()
        .filter(|id| !reachable.contains(*id))
        .cloned()
        .collect();
    if !unreachable.is_empty() {
        tracing::warn!(
            "Definition '{}' has elements unreachable from '{}': {:?}",
            definition.name,
            definition.start_element,
            unreachable
        );
    }

    tracing::debug!(
        "Compiled definition '{}' rev {} ({} elements, {} edges)",
        definition.name,
        definition.revision,
        elements.len(),
        graph.edge_count()
    );

    Ok(CompiledDefinition {
        definition_id: definition.id.clone(),
        revision: definition.revision,
        start_element: definition.start_element.clone(),
        graph,
        elements,
        unreachable,
    })
}
