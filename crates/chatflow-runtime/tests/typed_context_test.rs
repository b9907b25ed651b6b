//! A pipeline with its own typed shared state instead of the string-keyed map

use async_trait::async_trait;
use chatflow_core::{
    ExecutionStatus, InboundMessage, Node, NodeContext, NodeError, SharedState, Value,
    WorkflowDefinition,
};
use chatflow_runtime::{NodeFactory, NodeRegistry, WorkflowService};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
struct ChatContext {
    text: Option<String>,
    command: Option<String>,
    reply: Option<String>,
    outputs: HashMap<String, Value>,
}

impl SharedState for ChatContext {
    fn seed(message: &InboundMessage) -> Self {
        Self {
            text: message
                .payload
                .field("text")
                .and_then(|v| v.as_str().map(str::to_string)),
            ..Self::default()
        }
    }

    fn record_output(&mut self, step_id: &str, output: Value) {
        self.outputs.insert(step_id.to_string(), output);
    }
}

struct ParseCommand;

#[async_trait]
impl Node<ChatContext> for ParseCommand {
    fn node_type(&self) -> &str {
        "typed.parse"
    }

    async fn prepare(&self, ctx: &NodeContext<ChatContext>) -> Result<Value, NodeError> {
        let shared = ctx.read_shared().await;
        let text = shared
            .text
            .clone()
            .ok_or_else(|| NodeError::MissingData("text".into()))?;
        Ok(Value::String(text))
    }

    async fn run(&self, prepared: &Value, _ctx: &NodeContext<ChatContext>) -> Result<Value, NodeError> {
        let text = prepared.as_str().unwrap_or_default();
        Ok(match text.strip_prefix('/') {
            Some(command) => Value::from(command),
            None => Value::Null,
        })
    }

    async fn finalize(
        &self,
        ctx: &NodeContext<ChatContext>,
        _prepared: &Value,
        output: &Value,
    ) -> Result<Option<String>, NodeError> {
        let command = output.as_str().map(str::to_string);
        let action = if command.is_some() { "command" } else { "text" };
        ctx.write_shared().await.command = command;
        Ok(Some(action.to_string()))
    }
}

struct Answer;

#[async_trait]
impl Node<ChatContext> for Answer {
    fn node_type(&self) -> &str {
        "typed.answer"
    }

    async fn run(&self, _prepared: &Value, ctx: &NodeContext<ChatContext>) -> Result<Value, NodeError> {
        let mut shared = ctx.write_shared().await;
        let reply = match shared.command.as_deref() {
            Some(command) => format!("running {}", command),
            None => "plain text".to_string(),
        };
        shared.reply = Some(reply.clone());
        Ok(Value::String(reply))
    }
}

struct Factory(&'static str);

impl NodeFactory<ChatContext> for Factory {
    fn create_instance(
        &self,
        _id: &str,
        _name: &str,
        _config: &HashMap<String, Value>,
    ) -> Result<Box<dyn Node<ChatContext>>, NodeError> {
        match self.0 {
            "typed.parse" => Ok(Box::new(ParseCommand)),
            _ => Ok(Box::new(Answer)),
        }
    }

    fn node_type(&self) -> &str {
        self.0
    }
}

fn service() -> WorkflowService<ChatContext> {
    let registry = NodeRegistry::<ChatContext>::builder()
        .with(Arc::new(Factory("typed.parse")))
        .with(Arc::new(Factory("typed.answer")))
        .build();
    WorkflowService::new(Arc::new(registry))
}

fn workflow() -> WorkflowDefinition {
    WorkflowDefinition::builder("typed", "Typed pipeline")
        .step(chatflow_core::StepDeclaration::new("parse", "typed.parse"))
        .step(chatflow_core::StepDeclaration::new("answer", "typed.answer"))
        .edge_on("parse", "command", "answer")
        .entry("parse")
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_typed_context_flows_between_steps() {
    let service = service();
    service.register_workflow(workflow()).await;

    let message = InboundMessage::new("m1", Value::from_json(serde_json::json!({"text": "/weather"})));
    let execution = service.execute_workflow("typed", message).await.unwrap();

    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(execution.shared_data.command.as_deref(), Some("weather"));
    assert_eq!(execution.shared_data.reply.as_deref(), Some("running weather"));
    assert_eq!(
        execution.shared_data.outputs.get("answer"),
        Some(&Value::from("running weather"))
    );
}

#[tokio::test]
async fn test_typed_context_text_route_has_no_edge() {
    let service = service();
    service.register_workflow(workflow()).await;

    let message = InboundMessage::new("m1", Value::from_json(serde_json::json!({"text": "hello"})));
    let execution = service.execute_workflow("typed", message).await.unwrap();

    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(execution.path, vec!["parse"]);
    assert!(execution.shared_data.reply.is_none());
}

#[tokio::test]
async fn test_typed_context_missing_text_fails_in_prepare() {
    let service = service();
    service.register_workflow(workflow()).await;

    let message = InboundMessage::new("m1", Value::from_json(serde_json::json!({"photo": "x.jpg"})));
    let execution = service.execute_workflow("typed", message).await.unwrap();

    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert!(execution.error.unwrap().contains("text"));
}
