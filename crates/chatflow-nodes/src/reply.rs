use async_trait::async_trait;
use chatflow_core::{Node, NodeContext, NodeError, SharedData, Value};
use chatflow_runtime::NodeFactory;
use std::collections::HashMap;

/// Renders a reply template into shared data for an output step to send
pub struct ReplyNode {
    template: String,
    target: String,
}

impl ReplyNode {
    pub fn new(template: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            target: target.into(),
        }
    }
}

#[async_trait]
impl Node<SharedData> for ReplyNode {
    fn node_type(&self) -> &str {
        "chat.reply"
    }

    async fn run(&self, _prepared: &Value, ctx: &NodeContext<SharedData>) -> Result<Value, NodeError> {
        let shared = ctx.read_shared().await;
        Ok(Value::String(render_template(&self.template, &shared)))
    }

    async fn finalize(
        &self,
        ctx: &NodeContext<SharedData>,
        _prepared: &Value,
        output: &Value,
    ) -> Result<Option<String>, NodeError> {
        ctx.write_shared().await.set(self.target.clone(), output.clone());
        Ok(None)
    }
}

/// Fill `{key}` placeholders from shared data.
///
/// `{message.text}` style keys walk into object values when there is no
/// exact match. `{{` and `}}` produce literal braces. Unknown keys render
/// as empty strings.
pub fn render_template(template: &str, data: &SharedData) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut key = String::new();
                let mut closed = false;
                for k in chars.by_ref() {
                    if k == '}' {
                        closed = true;
                        break;
                    }
                    key.push(k);
                }
                if !closed {
                    out.push('{');
                    out.push_str(&key);
                    break;
                }
                match lookup(data, key.trim()) {
                    Some(value) => out.push_str(&display(&value)),
                    None => tracing::debug!("Template key '{}' not found in shared data", key),
                }
            }
            c => out.push(c),
        }
    }

    out
}

fn lookup(data: &SharedData, key: &str) -> Option<Value> {
    if let Some(value) = data.get(key) {
        return Some(value.clone());
    }
    let mut segments = key.split('.');
    let mut value = data.get(segments.next()?)?.clone();
    for segment in segments {
        value = value.field(segment)?;
    }
    Some(value)
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) if n.fract() == 0.0 => format!("{}", *n as i64),
        Value::Null => String::new(),
        other => match other.to_json() {
            serde_json::Value::String(s) => s,
            json => json.to_string(),
        },
    }
}

pub struct ReplyNodeFactory;

impl NodeFactory<SharedData> for ReplyNodeFactory {
    fn create_instance(
        &self,
        _id: &str,
        _name: &str,
        config: &HashMap<String, Value>,
    ) -> Result<Box<dyn Node<SharedData>>, NodeError> {
        let template = config
            .get("template")
            .and_then(|v| v.as_str())
            .ok_or_else(|| NodeError::Configuration("Missing 'template' config".into()))?;
        let target = config
            .get("target")
            .and_then(|v| v.as_str())
            .unwrap_or("reply");

        Ok(Box::new(ReplyNode::new(template, target)))
    }

    fn node_type(&self) -> &str {
        "chat.reply"
    }

    fn default_config(&self) -> HashMap<String, Value> {
        HashMap::from([("target".to_string(), Value::from("reply"))])
    }

    fn description(&self) -> &str {
        "Renders a reply template from shared data"
    }

    fn category(&self) -> &str {
        "chat"
    }
}
