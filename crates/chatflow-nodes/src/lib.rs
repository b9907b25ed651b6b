//! Standard node library
//!
//! Built-in step types for chat pipelines. All of them work on
//! [`SharedData`](chatflow_core::SharedData).

mod access;
mod command;
mod data;
mod debug;
mod reply;
mod time;

pub use access::{AccessControlNode, AccessControlNodeFactory};
pub use command::{parse_command, CommandNode, CommandNodeFactory, ParsedCommand};
pub use data::{SetDataNode, SetDataNodeFactory};
pub use debug::{DebugNode, DebugNodeFactory};
pub use reply::{render_template, ReplyNode, ReplyNodeFactory};
pub use time::{DelayNode, DelayNodeFactory};

use chatflow_core::SharedData;
use chatflow_runtime::{NodeRegistry, NodeRegistryBuilder};
use std::sync::Arc;

/// Register all standard nodes with a registry builder
pub fn register_all(registry: &mut NodeRegistryBuilder<SharedData>) {
    registry.register(Arc::new(DebugNodeFactory));
    registry.register(Arc::new(SetDataNodeFactory));
    registry.register(Arc::new(AccessControlNodeFactory));
    registry.register(Arc::new(CommandNodeFactory));
    registry.register(Arc::new(ReplyNodeFactory));
    registry.register(Arc::new(DelayNodeFactory));
}

/// A frozen registry holding only the standard nodes
pub fn standard_registry() -> NodeRegistry<SharedData> {
    let mut builder = NodeRegistry::builder();
    register_all(&mut builder);
    builder.build()
}
