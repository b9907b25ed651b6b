use crate::{events::EventEmitter, ExecutionId, InboundMessage, NodeError, SharedState, Value};
use async_trait::async_trait;
use futures_util::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Action label used when a step does not pick one, and the fallback edge label.
pub const DEFAULT_ACTION: &str = "default";

/// Core trait that every processing step implements.
///
/// A step runs in three phases over a shared [`NodeContext`]: `prepare`
/// gathers its input, `run` does the work, `finalize` writes results back
/// into shared data and picks the outgoing action label. Only `run` is
/// required. The engine never calls the phases directly; it goes through
/// [`execute`].
#[async_trait]
pub trait Node<D: SharedState>: Send + Sync {
    /// Type tag this step was registered under (e.g. "chat.command")
    fn node_type(&self) -> &str;

    /// Extract what the step needs. Defaults to the inbound message payload.
    async fn prepare(&self, ctx: &NodeContext<D>) -> Result<Value, NodeError> {
        Ok(ctx.message.payload.clone())
    }

    /// The step's actual work
    async fn run(&self, prepared: &Value, ctx: &NodeContext<D>) -> Result<Value, NodeError>;

    /// Write results into shared data and choose the outgoing action.
    ///
    /// Defaults to recording `output` for this step and returning `None`,
    /// which routes along the `"default"` edge.
    async fn finalize(
        &self,
        ctx: &NodeContext<D>,
        _prepared: &Value,
        output: &Value,
    ) -> Result<Option<String>, NodeError> {
        ctx.write_shared().await.record_output(&ctx.step_id, output.clone());
        Ok(None)
    }
}

/// Execution context passed to each step invocation
pub struct NodeContext<D> {
    pub execution_id: ExecutionId,

    pub workflow_id: String,

    pub step_id: String,

    pub step_name: String,

    /// The run's shared data. Every step of a run holds the same reference.
    pub shared: Arc<RwLock<D>>,

    pub message: Arc<InboundMessage>,

    /// Factory defaults overridden by the step declaration's own config
    pub config: HashMap<String, Value>,

    /// Event emitter for real-time updates
    pub events: EventEmitter,
}

impl<D> NodeContext<D> {
    pub async fn read_shared(&self) -> RwLockReadGuard<'_, D> {
        self.shared.read().await
    }

    pub async fn write_shared(&self) -> RwLockWriteGuard<'_, D> {
        self.shared.write().await
    }

    /// Get config value or return error
    pub fn require_config(&self, name: &str) -> Result<&Value, NodeError> {
        self.config
            .get(name)
            .ok_or_else(|| NodeError::Configuration(format!("Missing config: {}", name)))
    }

    /// Get config with default
    pub fn get_config_or(&self, name: &str, default: Value) -> Value {
        self.config.get(name).cloned().unwrap_or(default)
    }

    pub fn config_str(&self, name: &str) -> Option<&str> {
        self.config.get(name).and_then(|v| v.as_str())
    }
}

impl<D> Clone for NodeContext<D> {
    fn clone(&self) -> Self {
        Self {
            execution_id: self.execution_id,
            workflow_id: self.workflow_id.clone(),
            step_id: self.step_id.clone(),
            step_name: self.step_name.clone(),
            shared: Arc::clone(&self.shared),
            message: Arc::clone(&self.message),
            config: self.config.clone(),
            events: self.events.clone(),
        }
    }
}

/// Outcome of one step's lifecycle
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub action: String,
    pub output: Value,
    pub error: Option<NodeError>,
    /// Authoritative for whether traversal proceeds
    pub should_continue: bool,
}

impl StepResult {
    pub fn success(action: impl Into<String>, output: Value) -> Self {
        Self {
            action: action.into(),
            output,
            error: None,
            should_continue: true,
        }
    }

    pub fn failure(error: NodeError) -> Self {
        Self {
            action: DEFAULT_ACTION.to_string(),
            output: Value::Null,
            error: Some(error),
            should_continue: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.should_continue && self.error.is_none()
    }
}

/// Run a step through `prepare`, `run` and `finalize`.
///
/// Never fails: an error or a panic from any phase comes back as a
/// [`StepResult`] with `should_continue == false`.
pub async fn execute<D: SharedState>(node: &dyn Node<D>, ctx: &NodeContext<D>) -> StepResult {
    let phases = async {
        let prepared = node.prepare(ctx).await?;
        let output = node.run(&prepared, ctx).await?;
        let action = node.finalize(ctx, &prepared, &output).await?;
        Ok::<_, NodeError>((action, output))
    };

    match AssertUnwindSafe(phases).catch_unwind().await {
        Ok(Ok((action, output))) => {
            StepResult::success(action.unwrap_or_else(|| DEFAULT_ACTION.to_string()), output)
        }
        Ok(Err(e)) => {
            tracing::debug!("Step {} returned an error: {}", ctx.step_id, e);
            StepResult::failure(e)
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!("Step {} panicked: {}", ctx.step_id, message);
            StepResult::failure(NodeError::Panicked(message))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
