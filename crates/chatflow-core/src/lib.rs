//! Core abstractions for the chat workflow engine
//!
//! This crate provides the step lifecycle contract, the workflow definition
//! model and the execution record. It knows nothing about how steps are
//! registered or how a graph is traversed.

mod error;
pub mod events;
mod execution;
mod node;
mod state;
mod value;
mod workflow;

pub use error::{FlowError, NodeError, WorkflowError};
pub use events::*;
pub use execution::{ExecutionStatus, WorkflowExecution};
pub use node::{execute, Node, NodeContext, StepResult, DEFAULT_ACTION};
pub use state::{InboundMessage, SharedData, SharedState};
pub use value::Value;
pub use workflow::{Edge, StepDeclaration, StepId, WorkflowBuilder, WorkflowDefinition, WorkflowId};

/// Result type for flow operations
pub type Result<T> = std::result::Result<T, FlowError>;
