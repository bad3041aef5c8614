//! Core durable-workflow engine (§1-§9): expression/condition evaluation,
//! step execution, the orchestrator loop, the approval sub-machine, the
//! event dispatcher, control-plane operations, and the repository/store
//! layer they all run on.

pub mod approval;
pub mod condition;
pub mod control;
pub mod dispatcher;
pub mod events;
pub mod executor;
pub mod expression;
pub mod orchestrator;
pub mod repository;
pub mod store;

pub use approval::{ApprovalError, ApprovalMachine, CreateApprovalParams};
pub use control::{ControlError, ControlPlane, IssueSeverity, ValidationIssue};
pub use dispatcher::{DispatchError, EventDispatcher, InboundEvent};
pub use events::{EventEnvelope, Publisher, WorkflowEvent};
pub use executor::{ExecutorError, StepDispatcher};
pub use orchestrator::{Orchestrator, OrchestratorError};
pub use store::{Store, StoreError, StoredDocument};
