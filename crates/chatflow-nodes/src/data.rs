use async_trait::async_trait;
use chatflow_core::{Node, NodeContext, NodeError, SharedData, Value};
use chatflow_runtime::NodeFactory;
use std::collections::HashMap;

/// Seeds shared data with fixed values from configuration
pub struct SetDataNode {
    values: HashMap<String, Value>,
}

#[async_trait]
impl Node<SharedData> for SetDataNode {
    fn node_type(&self) -> &str {
        "data.set"
    }

    async fn run(&self, _prepared: &Value, _ctx: &NodeContext<SharedData>) -> Result<Value, NodeError> {
        Ok(Value::Object(self.values.clone()))
    }

    async fn finalize(
        &self,
        ctx: &NodeContext<SharedData>,
        _prepared: &Value,
        _output: &Value,
    ) -> Result<Option<String>, NodeError> {
        let mut shared = ctx.write_shared().await;
        for (key, value) in &self.values {
            shared.set(key.clone(), value.clone());
        }
        Ok(None)
    }
}

pub struct SetDataNodeFactory;

impl NodeFactory<SharedData> for SetDataNodeFactory {
    fn create_instance(
        &self,
        _id: &str,
        _name: &str,
        config: &HashMap<String, Value>,
    ) -> Result<Box<dyn Node<SharedData>>, NodeError> {
        let values = match config.get("values") {
            Some(Value::Object(map)) => map.clone(),
            Some(Value::Json(json @ serde_json::Value::Object(_))) => {
                match Value::from_json(json.clone()) {
                    Value::Object(map) => map,
                    _ => HashMap::new(),
                }
            }
            Some(_) => {
                return Err(NodeError::Configuration("'values' must be an object".into()));
            }
            None => HashMap::new(),
        };

        Ok(Box::new(SetDataNode { values }))
    }

    fn node_type(&self) -> &str {
        "data.set"
    }

    fn description(&self) -> &str {
        "Writes the configured values into shared data"
    }

    fn category(&self) -> &str {
        "data"
    }
}
