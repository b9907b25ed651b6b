use async_trait::async_trait;
use chatflow_core::{Node, NodeContext, NodeError, SharedData, Value};
use chatflow_runtime::NodeFactory;
use std::collections::{HashMap, HashSet};

/// Action reported for messages that are not commands
pub const TEXT_ACTION: &str = "text";
/// Action reported for commands outside the configured set
pub const UNKNOWN_COMMAND_ACTION: &str = "unknown_command";

/// A `/command args` message split into its parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub name: String,
    pub args: String,
}

/// Parse `/name[@bot] args`. Returns `None` for plain text.
pub fn parse_command(text: &str) -> Option<ParsedCommand> {
    let rest = text.trim_start().strip_prefix('/')?;
    let (head, args) = match rest.split_once(char::is_whitespace) {
        Some((head, args)) => (head, args.trim()),
        None => (rest, ""),
    };
    let name = head.split('@').next().unwrap_or_default().to_lowercase();
    if name.is_empty() {
        return None;
    }
    Some(ParsedCommand {
        name,
        args: args.to_string(),
    })
}

/// Dispatches on the command in a message's `text` field.
///
/// The command name becomes the action label, so a workflow routes commands
/// with labeled edges (`start`, `help`, ...) and plain text with `"text"`.
pub struct CommandNode {
    commands: HashSet<String>,
}

impl CommandNode {
    pub fn new(commands: impl IntoIterator<Item = String>) -> Self {
        Self {
            commands: commands.into_iter().map(|c| c.to_lowercase()).collect(),
        }
    }
}

#[async_trait]
impl Node<SharedData> for CommandNode {
    fn node_type(&self) -> &str {
        "chat.command"
    }

    async fn prepare(&self, ctx: &NodeContext<SharedData>) -> Result<Value, NodeError> {
        Ok(ctx.message.payload.field("text").unwrap_or_default())
    }

    async fn run(&self, prepared: &Value, _ctx: &NodeContext<SharedData>) -> Result<Value, NodeError> {
        let Some(text) = prepared.as_str() else {
            return Ok(Value::Null);
        };
        Ok(match parse_command(text) {
            Some(command) => Value::Object(HashMap::from([
                ("name".to_string(), Value::String(command.name)),
                ("args".to_string(), Value::String(command.args)),
            ])),
            None => Value::Null,
        })
    }

    async fn finalize(
        &self,
        ctx: &NodeContext<SharedData>,
        _prepared: &Value,
        output: &Value,
    ) -> Result<Option<String>, NodeError> {
        let name = output.field("name").and_then(|v| v.as_str().map(str::to_string));
        let Some(name) = name else {
            return Ok(Some(TEXT_ACTION.to_string()));
        };

        let mut shared = ctx.write_shared().await;
        shared.set("command", name.clone());
        shared.set("command.args", output.field("args").unwrap_or_default());

        if self.commands.is_empty() || self.commands.contains(&name) {
            Ok(Some(name))
        } else {
            Ok(Some(UNKNOWN_COMMAND_ACTION.to_string()))
        }
    }
}

pub struct CommandNodeFactory;

impl NodeFactory<SharedData> for CommandNodeFactory {
    fn create_instance(
        &self,
        _id: &str,
        _name: &str,
        config: &HashMap<String, Value>,
    ) -> Result<Box<dyn Node<SharedData>>, NodeError> {
        let commands = match config.get("commands").map(|v| Value::from_json(v.to_json())) {
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(|s| s.trim_start_matches('/').to_string())
                        .ok_or_else(|| {
                            NodeError::Configuration("'commands' must contain strings".into())
                        })
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(Value::Null) | None => Vec::new(),
            Some(_) => {
                return Err(NodeError::Configuration("'commands' must be an array".into()));
            }
        };

        Ok(Box::new(CommandNode::new(commands)))
    }

    fn node_type(&self) -> &str {
        "chat.command"
    }

    fn description(&self) -> &str {
        "Routes on the /command in the message text ('text' for plain messages)"
    }

    fn category(&self) -> &str {
        "chat"
    }
}
