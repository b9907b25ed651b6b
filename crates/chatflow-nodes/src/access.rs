use async_trait::async_trait;
use chatflow_core::{Node, NodeContext, NodeError, SharedData, Value};
use chatflow_runtime::NodeFactory;
use std::collections::{HashMap, HashSet};

pub const ALLOWED: &str = "allowed";
pub const DENIED: &str = "denied";

/// Checks the sender of a message against an allow-list.
///
/// Reports `"allowed"` or `"denied"`; an empty allow-list lets everyone in.
pub struct AccessControlNode {
    user_field: String,
    allowed_users: HashSet<String>,
}

impl AccessControlNode {
    pub fn new(user_field: impl Into<String>, allowed_users: impl IntoIterator<Item = String>) -> Self {
        Self {
            user_field: user_field.into(),
            allowed_users: allowed_users.into_iter().collect(),
        }
    }
}

#[async_trait]
impl Node<SharedData> for AccessControlNode {
    fn node_type(&self) -> &str {
        "chat.access"
    }

    async fn prepare(&self, ctx: &NodeContext<SharedData>) -> Result<Value, NodeError> {
        ctx.message
            .payload
            .field(&self.user_field)
            .filter(|v| !v.is_null())
            .ok_or_else(|| NodeError::MissingData(format!("message.{}", self.user_field)))
    }

    async fn run(&self, prepared: &Value, ctx: &NodeContext<SharedData>) -> Result<Value, NodeError> {
        let user = user_key(prepared);
        let allowed = self.allowed_users.is_empty() || self.allowed_users.contains(&user);
        if !allowed {
            ctx.events.warn(format!("User {} is not allowed", user));
        }
        Ok(Value::Bool(allowed))
    }

    async fn finalize(
        &self,
        ctx: &NodeContext<SharedData>,
        _prepared: &Value,
        output: &Value,
    ) -> Result<Option<String>, NodeError> {
        let allowed = output.as_bool().unwrap_or(false);
        ctx.write_shared().await.set("access.allowed", allowed);
        Ok(Some(if allowed { ALLOWED } else { DENIED }.to_string()))
    }
}

/// Normalize a user identifier so `42`, `42.0` and `"42"` compare equal
fn user_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) if n.fract() == 0.0 => format!("{}", *n as i64),
        other => match other.to_json() {
            serde_json::Value::String(s) => s,
            json => json.to_string(),
        },
    }
}

pub struct AccessControlNodeFactory;

impl NodeFactory<SharedData> for AccessControlNodeFactory {
    fn create_instance(
        &self,
        _id: &str,
        _name: &str,
        config: &HashMap<String, Value>,
    ) -> Result<Box<dyn Node<SharedData>>, NodeError> {
        let user_field = config
            .get("user_field")
            .and_then(|v| v.as_str())
            .ok_or_else(|| NodeError::Configuration("'user_field' must be a string".into()))?;

        let allowed_users = match config.get("allowed_users").map(|v| Value::from_json(v.to_json())) {
            Some(Value::Array(items)) => items.iter().map(user_key).collect(),
            Some(Value::Null) | None => Vec::new(),
            Some(_) => {
                return Err(NodeError::Configuration("'allowed_users' must be an array".into()));
            }
        };

        Ok(Box::new(AccessControlNode::new(user_field, allowed_users)))
    }

    fn node_type(&self) -> &str {
        "chat.access"
    }

    fn default_config(&self) -> HashMap<String, Value> {
        HashMap::from([
            ("user_field".to_string(), Value::from("user_id")),
            ("allowed_users".to_string(), Value::Array(Vec::new())),
        ])
    }

    fn description(&self) -> &str {
        "Routes 'allowed' or 'denied' depending on the sender's id"
    }

    fn category(&self) -> &str {
        "chat"
    }
}
