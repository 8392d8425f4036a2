/// Process definition layer
///
/// Definition records, validation, flow graph compilation, and the compiled
/// definition registry.

pub mod types;

// Role/description checks run before publication
pub mod validator;

// Transition list -> adjacency map, definition compilation
pub mod graph;

// Lock-free cache of compiled definitions
pub mod registry;

pub use graph::{CompiledDefinition, FlowEdge, FlowGraph};
pub use registry::DefinitionRegistry;
pub use types::{
    Actor, DefinitionDraft, Element, ElementKind, ElementSnapshot, ProcessDefinition, Role,
    Transition,
};
