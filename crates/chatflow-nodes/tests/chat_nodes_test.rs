use chatflow_core::{
    EventBus, ExecutionStatus, InboundMessage, SharedData, SharedState, StepDeclaration, Value,
    WorkflowDefinition,
};
use chatflow_nodes::{parse_command, render_template, standard_registry, ParsedCommand};
use chatflow_runtime::{NodeRegistry, WorkflowEngine};
use std::collections::HashMap;
use std::sync::Arc;

fn engine() -> WorkflowEngine<SharedData> {
    WorkflowEngine::new(Arc::new(standard_registry()), Arc::new(EventBus::new(100)))
}

fn message(payload: serde_json::Value) -> InboundMessage {
    InboundMessage::new("m1", Value::from_json(payload))
}

fn single(step: StepDeclaration) -> WorkflowDefinition {
    let id = step.id.clone();
    WorkflowDefinition::builder("wf", "Single").step(step).entry(id).build().unwrap()
}

#[test]
fn test_parse_command() {
    assert_eq!(
        parse_command("/start"),
        Some(ParsedCommand {
            name: "start".to_string(),
            args: String::new(),
        })
    );
    assert_eq!(
        parse_command("  /Remind@HelperBot tomorrow 9am "),
        Some(ParsedCommand {
            name: "remind".to_string(),
            args: "tomorrow 9am".to_string(),
        })
    );
    assert_eq!(parse_command("hello /start"), None);
    assert_eq!(parse_command("/"), None);
    assert_eq!(parse_command("/@bot"), None);
}

#[test]
fn test_render_template() {
    let mut data = SharedData::seed(&message(serde_json::json!({"first_name": "Ada", "age": 36})));
    data.set("command", "start");
    data.set("score", 4.5);

    assert_eq!(
        render_template("Hi {message.first_name}, /{command} ({message.age}, {score})", &data),
        "Hi Ada, /start (36, 4.5)"
    );
    assert_eq!(render_template("{{literal}} {missing}!", &data), "{literal} !");
    assert_eq!(render_template("open {command", &data), "open {command");
}

#[test]
fn test_standard_registry_contents() {
    let registry = standard_registry();

    assert_eq!(
        registry.list_node_types(),
        vec![
            "chat.access",
            "chat.command",
            "chat.reply",
            "data.set",
            "debug.log",
            "time.delay",
        ]
    );
    for node_type in registry.list_node_types() {
        assert!(!registry.get(&node_type).unwrap().description().is_empty());
    }
}

#[test]
fn test_factory_defaults_are_merged() {
    let registry = standard_registry();
    let factory = registry.get("chat.access").unwrap();

    let merged = NodeRegistry::merged_config(
        factory.as_ref(),
        &HashMap::from([("user_field".to_string(), Value::from("chat_id"))]),
    );

    assert_eq!(merged.get("user_field"), Some(&Value::from("chat_id")));
    assert_eq!(merged.get("allowed_users"), Some(&Value::Array(Vec::new())));
}

#[tokio::test]
async fn test_access_control_routes_by_user() {
    let workflow = WorkflowDefinition::builder("wf", "Access")
        .step(
            StepDeclaration::new("access", "chat.access")
                .with_config("allowed_users", Value::Array(vec![Value::from("42"), Value::from("7")])),
        )
        .step(StepDeclaration::new("welcome", "data.set"))
        .step(StepDeclaration::new("reject", "data.set"))
        .edge_on("access", "allowed", "welcome")
        .edge_on("access", "denied", "reject")
        .entry("access")
        .build()
        .unwrap();

    let allowed = engine().execute(&workflow, message(serde_json::json!({"user_id": 42}))).await;
    assert_eq!(allowed.path, vec!["access", "welcome"]);
    assert_eq!(allowed.shared_data.get("access.allowed"), Some(&Value::Bool(true)));

    let denied = engine().execute(&workflow, message(serde_json::json!({"user_id": "13"}))).await;
    assert_eq!(denied.path, vec!["access", "reject"]);
    assert_eq!(denied.shared_data.get("access.allowed"), Some(&Value::Bool(false)));

    let anonymous = engine().execute(&workflow, message(serde_json::json!({"text": "hi"}))).await;
    assert_eq!(anonymous.status, ExecutionStatus::Failed);
    assert!(anonymous.error.unwrap().contains("message.user_id"));
}

#[tokio::test]
async fn test_access_control_empty_list_allows_everyone() {
    let workflow = single(StepDeclaration::new("access", "chat.access"));

    let execution = engine().execute(&workflow, message(serde_json::json!({"user_id": 99}))).await;

    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(execution.shared_data.get("access.allowed"), Some(&Value::Bool(true)));
}

#[tokio::test]
async fn test_command_dispatch_routes() {
    let workflow = WorkflowDefinition::builder("wf", "Commands")
        .step(
            StepDeclaration::new("dispatch", "chat.command")
                .with_config("commands", Value::Array(vec![Value::from("/start"), Value::from("help")])),
        )
        .step(StepDeclaration::new("start", "data.set"))
        .step(StepDeclaration::new("unknown", "data.set"))
        .step(StepDeclaration::new("chat", "data.set"))
        .edge_on("dispatch", "start", "start")
        .edge_on("dispatch", "unknown_command", "unknown")
        .edge_on("dispatch", "text", "chat")
        .entry("dispatch")
        .build()
        .unwrap();

    let start = engine()
        .execute(&workflow, message(serde_json::json!({"text": "/start now please"})))
        .await;
    assert_eq!(start.path, vec!["dispatch", "start"]);
    assert_eq!(start.shared_data.get_str("command"), Some("start"));
    assert_eq!(start.shared_data.get_str("command.args"), Some("now please"));

    // Known command without an edge of its own: no default edge, run ends here
    let help = engine().execute(&workflow, message(serde_json::json!({"text": "/help"}))).await;
    assert_eq!(help.status, ExecutionStatus::Completed);
    assert_eq!(help.path, vec!["dispatch"]);

    let unknown = engine().execute(&workflow, message(serde_json::json!({"text": "/deploy"}))).await;
    assert_eq!(unknown.path, vec!["dispatch", "unknown"]);

    let text = engine().execute(&workflow, message(serde_json::json!({"text": "hello"}))).await;
    assert_eq!(text.path, vec!["dispatch", "chat"]);
    assert!(!text.shared_data.contains_key("command"));

    let photo = engine().execute(&workflow, message(serde_json::json!({"photo": "x.jpg"}))).await;
    assert_eq!(photo.path, vec!["dispatch", "chat"]);
}

#[tokio::test]
async fn test_invalid_command_config_fails_run() {
    let workflow = single(
        StepDeclaration::new("dispatch", "chat.command").with_config("commands", "start"),
    );

    let execution = engine().execute(&workflow, message(serde_json::json!({"text": "/start"}))).await;

    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert!(execution.error.unwrap().contains("'commands' must be an array"));
}

#[tokio::test]
async fn test_set_data_then_reply() {
    let values = HashMap::from([
        ("bot_name".to_string(), Value::from("Helper")),
        ("version".to_string(), Value::Number(2.0)),
    ]);
    let workflow = WorkflowDefinition::builder("wf", "Reply")
        .step(StepDeclaration::new("seed", "data.set").with_config("values", Value::Object(values)))
        .step(
            StepDeclaration::new("reply", "chat.reply")
                .with_config("template", "{bot_name} v{version} got: {message.text}"),
        )
        .step(
            StepDeclaration::new("footer", "chat.reply")
                .with_config("template", "-- {bot_name}")
                .with_config("target", "footer"),
        )
        .edge("seed", "reply")
        .edge("reply", "footer")
        .entry("seed")
        .build()
        .unwrap();

    let execution = engine().execute(&workflow, message(serde_json::json!({"text": "ping"}))).await;

    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(execution.shared_data.get_str("reply"), Some("Helper v2 got: ping"));
    assert_eq!(execution.shared_data.get_str("footer"), Some("-- Helper"));
}

#[tokio::test]
async fn test_reply_without_template_fails() {
    let workflow = single(StepDeclaration::new("reply", "chat.reply"));

    let execution = engine().execute(&workflow, message(serde_json::json!({}))).await;

    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert!(execution.error.unwrap().contains("template"));
}

#[tokio::test]
async fn test_debug_and_delay_pass_through() {
    let workflow = WorkflowDefinition::builder("wf", "Passthrough")
        .step(StepDeclaration::new("log", "debug.log").with_config("label", "TRACE"))
        .step(StepDeclaration::new("wait", "time.delay").with_config("delay_ms", 5i64))
        .edge("log", "wait")
        .entry("log")
        .build()
        .unwrap();

    let payload = serde_json::json!({"text": "hi"});
    let execution = engine().execute(&workflow, message(payload.clone())).await;

    assert_eq!(execution.status, ExecutionStatus::Completed);
    let expected = Value::from_json(payload);
    assert_eq!(execution.shared_data.get("log.output"), Some(&expected));
    assert_eq!(execution.shared_data.get("wait.output"), Some(&expected));
}

#[tokio::test]
async fn test_delay_rejects_negative_duration() {
    let workflow = single(StepDeclaration::new("wait", "time.delay").with_config("delay_ms", -1i64));

    let execution = engine().execute(&workflow, message(serde_json::json!({}))).await;

    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert!(execution.error.unwrap().contains("delay_ms"));
}
