/// Runtime Execution Engine
///
/// This module drives process instances through their flow graphs:
/// - Per-instance state machine (advance, choose, finish, cancel)
/// - Role gate deciding between direct execution and approval requests
/// - Approval records capturing the deferred intent for replay
/// - The engine tying these to storage and notifications

// Instance record and state machine
pub mod instance;

// Role checks for gated operations
pub mod gate;

// Approval requests, intents and resolution notices
pub mod approval;

// Engine orchestrating load, gate, commit and replay
pub mod engine;

// Re-export main types
pub use approval::{ApprovalRequest, ApprovalStatus, Intent, ResolutionNotice};
pub use engine::{InstanceFilter, Outcome, ProcessEngine, Replayed, Resolution};
pub use instance::{InstanceStatus, ProcessInstance, StepCommand};
