/// Process manager: role-gated execution of modeled business processes
///
/// This library compiles process definitions into flow graphs, runs instances
/// through them one step at a time, and routes steps taken by under-privileged
/// actors through an approval workflow.

// Engine error kinds
pub mod error;

// Core configuration and setup
pub mod config;

// Definition layer - types, validation, flow graph compilation, registry
pub mod process;

// Runtime layer - instance state machine, approval gate, engine
pub mod runtime;

// Storage contracts with in-memory and SQLite implementations
pub mod storage;

// Approval event relay
pub mod notify;

// HTTP API layer - REST endpoints over the engine
pub mod api;

// Server setup and initialization
pub mod server;

// Re-export commonly used types for external consumers
pub use error::{EngineError, Result};
pub use process::{Actor, DefinitionDraft, Element, ElementKind, ProcessDefinition, Role, Transition};
pub use runtime::{InstanceFilter, Outcome, ProcessEngine, ProcessInstance};
pub use server::start_server;
