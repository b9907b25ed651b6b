#![allow(dead_code)]

use async_trait::async_trait;
use chatflow_core::{Node, NodeContext, NodeError, SharedData, StepDeclaration, Value};
use chatflow_runtime::{NodeFactory, NodeRegistry};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Step whose behavior is driven entirely by its configuration:
///
/// - `copy_field`: copy this payload field into shared key `who`
/// - `write_key` / `write_value`: write a value into shared data
/// - `read_key`: copy that shared value to `seen.<step_id>`
/// - `sleep_ms`: sleep before finishing `run`
/// - `fail`: return an error from `run`
/// - `panic`: panic inside `run`
/// - `action`: label reported by `finalize`
pub struct ScriptedNode {
    config: HashMap<String, Value>,
}

impl ScriptedNode {
    fn str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(|v| v.as_str())
    }
}

#[async_trait]
impl Node<SharedData> for ScriptedNode {
    fn node_type(&self) -> &str {
        "test.scripted"
    }

    async fn run(&self, prepared: &Value, ctx: &NodeContext<SharedData>) -> Result<Value, NodeError> {
        if let Some(field) = self.str("copy_field") {
            let value = prepared.field(field).unwrap_or_default();
            ctx.write_shared().await.set("who", value);
        }
        if let Some(ms) = self.config.get("sleep_ms").and_then(|v| v.as_f64()) {
            tokio::time::sleep(Duration::from_millis(ms as u64)).await;
        }
        if let Some(message) = self.str("fail") {
            return Err(NodeError::ExecutionFailed(message.to_string()));
        }
        if let Some(message) = self.str("panic") {
            panic!("{}", message);
        }
        Ok(Value::from(ctx.step_id.clone()))
    }

    async fn finalize(
        &self,
        ctx: &NodeContext<SharedData>,
        _prepared: &Value,
        output: &Value,
    ) -> Result<Option<String>, NodeError> {
        let mut shared = ctx.write_shared().await;
        shared.set(SharedData::output_key(&ctx.step_id), output.clone());
        if let Some(key) = self.str("write_key") {
            let value = self.config.get("write_value").cloned().unwrap_or_default();
            shared.set(key, value);
        }
        if let Some(key) = self.str("read_key") {
            let seen = shared.get(key).cloned().unwrap_or_default();
            shared.set(format!("seen.{}", ctx.step_id), seen);
        }
        Ok(self.str("action").map(str::to_string))
    }
}

pub struct ScriptedNodeFactory;

impl NodeFactory<SharedData> for ScriptedNodeFactory {
    fn create_instance(
        &self,
        _id: &str,
        _name: &str,
        config: &HashMap<String, Value>,
    ) -> Result<Box<dyn Node<SharedData>>, NodeError> {
        Ok(Box::new(ScriptedNode {
            config: config.clone(),
        }))
    }

    fn node_type(&self) -> &str {
        "test.scripted"
    }

    fn description(&self) -> &str {
        "Configurable test step"
    }
}

/// Records the merged configuration it was created with under `config.<id>`
pub struct ConfigProbeNode {
    config: HashMap<String, Value>,
}

#[async_trait]
impl Node<SharedData> for ConfigProbeNode {
    fn node_type(&self) -> &str {
        "test.config_probe"
    }

    async fn run(&self, _prepared: &Value, ctx: &NodeContext<SharedData>) -> Result<Value, NodeError> {
        let mut shared = ctx.write_shared().await;
        shared.set(format!("config.{}", ctx.step_id), Value::Object(self.config.clone()));
        shared.set(format!("context_config.{}", ctx.step_id), Value::Object(ctx.config.clone()));
        Ok(Value::Null)
    }
}

pub struct ConfigProbeNodeFactory;

impl NodeFactory<SharedData> for ConfigProbeNodeFactory {
    fn create_instance(
        &self,
        _id: &str,
        _name: &str,
        config: &HashMap<String, Value>,
    ) -> Result<Box<dyn Node<SharedData>>, NodeError> {
        Ok(Box::new(ConfigProbeNode {
            config: config.clone(),
        }))
    }

    fn node_type(&self) -> &str {
        "test.config_probe"
    }

    fn default_config(&self) -> HashMap<String, Value> {
        HashMap::from([
            ("greeting".to_string(), Value::from("hello")),
            ("tone".to_string(), Value::from("formal")),
        ])
    }
}

/// Factory that refuses to build its step
pub struct BrokenNodeFactory;

impl NodeFactory<SharedData> for BrokenNodeFactory {
    fn create_instance(
        &self,
        _id: &str,
        _name: &str,
        _config: &HashMap<String, Value>,
    ) -> Result<Box<dyn Node<SharedData>>, NodeError> {
        Err(NodeError::InitializationFailed("no credentials".into()))
    }

    fn node_type(&self) -> &str {
        "test.broken"
    }
}

pub fn test_registry() -> Arc<NodeRegistry<SharedData>> {
    Arc::new(
        NodeRegistry::<SharedData>::builder()
            .with(Arc::new(ScriptedNodeFactory))
            .with(Arc::new(ConfigProbeNodeFactory))
            .with(Arc::new(BrokenNodeFactory))
            .build(),
    )
}

pub fn scripted(id: &str) -> StepDeclaration {
    StepDeclaration::new(id, "test.scripted")
}
