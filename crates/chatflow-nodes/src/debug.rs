use async_trait::async_trait;
use chatflow_core::{Node, NodeContext, NodeError, SharedData, Value};
use chatflow_runtime::NodeFactory;
use std::collections::HashMap;

/// Simple debug node that logs the message and the shared data keys
pub struct DebugNode;

#[async_trait]
impl Node<SharedData> for DebugNode {
    fn node_type(&self) -> &str {
        "debug.log"
    }

    async fn run(&self, prepared: &Value, ctx: &NodeContext<SharedData>) -> Result<Value, NodeError> {
        let label = ctx.config_str("label").unwrap_or("DEBUG");
        let payload = prepared.to_json().to_string();

        tracing::info!("{} [{}] message: {}", label, ctx.step_id, payload);
        ctx.events.info(format!("{}: {}", label, payload));

        // Also log shared keys for visibility
        let shared = ctx.read_shared().await;
        let mut keys: Vec<&String> = shared.keys().collect();
        keys.sort();
        for key in keys {
            ctx.events.info(format!("  {}", key));
        }

        Ok(prepared.clone())
    }
}

pub struct DebugNodeFactory;

impl NodeFactory<SharedData> for DebugNodeFactory {
    fn create_instance(
        &self,
        _id: &str,
        _name: &str,
        _config: &HashMap<String, Value>,
    ) -> Result<Box<dyn Node<SharedData>>, NodeError> {
        Ok(Box::new(DebugNode))
    }

    fn node_type(&self) -> &str {
        "debug.log"
    }

    fn description(&self) -> &str {
        "Logs the inbound message and shared data keys"
    }

    fn category(&self) -> &str {
        "debug"
    }
}
