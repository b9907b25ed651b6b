use async_trait::async_trait;
use chatflow_core::{Node, NodeContext, NodeError, SharedData, Value};
use chatflow_runtime::NodeFactory;
use std::collections::HashMap;
use tokio::time::{sleep, Duration};

/// Delay execution for a configured duration
pub struct DelayNode {
    delay: Duration,
}

impl DelayNode {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl Node<SharedData> for DelayNode {
    fn node_type(&self) -> &str {
        "time.delay"
    }

    async fn run(&self, prepared: &Value, ctx: &NodeContext<SharedData>) -> Result<Value, NodeError> {
        ctx.events.info(format!("Delaying for {}ms", self.delay.as_millis()));

        sleep(self.delay).await;

        // Pass through the prepared input
        Ok(prepared.clone())
    }
}

pub struct DelayNodeFactory;

impl NodeFactory<SharedData> for DelayNodeFactory {
    fn create_instance(
        &self,
        _id: &str,
        _name: &str,
        config: &HashMap<String, Value>,
    ) -> Result<Box<dyn Node<SharedData>>, NodeError> {
        let delay_ms = config
            .get("delay_ms")
            .and_then(|v| v.as_f64())
            .ok_or_else(|| NodeError::Configuration("'delay_ms' must be a number".into()))?;
        if delay_ms < 0.0 {
            return Err(NodeError::Configuration("'delay_ms' must not be negative".into()));
        }

        Ok(Box::new(DelayNode::new(Duration::from_millis(delay_ms as u64))))
    }

    fn node_type(&self) -> &str {
        "time.delay"
    }

    fn default_config(&self) -> HashMap<String, Value> {
        HashMap::from([("delay_ms".to_string(), Value::Number(1000.0))])
    }

    fn description(&self) -> &str {
        "Delay execution for specified milliseconds"
    }

    fn category(&self) -> &str {
        "time"
    }
}
