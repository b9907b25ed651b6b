//! Workflow execution runtime
//!
//! This crate provides the engine that walks workflow graphs, the node
//! registry step types are resolved through, and the service that keeps
//! workflow definitions and execution history.

mod executor;
mod registry;
mod routing;
mod service;
mod validate;

pub use executor::WorkflowEngine;
pub use registry::{NodeFactory, NodeRegistry, NodeRegistryBuilder};
pub use routing::RoutingTable;
pub use service::{RuntimeConfig, WorkflowService};
pub use validate::{validate_definition, ValidationIssue};
