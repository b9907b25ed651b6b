use crate::{executor::WorkflowEngine, registry::NodeRegistry};
use chatflow_core::{
    EventBus, ExecutionEvent, ExecutionId, FlowError, InboundMessage, SharedState,
    WorkflowDefinition, WorkflowError, WorkflowExecution, WorkflowId,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Directory of workflow definitions and log of past executions.
///
/// This is the entry point message sources call: look up a definition by
/// id, run it through the engine and keep the resulting record.
pub struct WorkflowService<D: SharedState> {
    registry: Arc<NodeRegistry<D>>,
    engine: Arc<WorkflowEngine<D>>,
    event_bus: Arc<EventBus>,
    workflows: Arc<RwLock<HashMap<WorkflowId, Arc<WorkflowDefinition>>>>,
    executions: Arc<RwLock<ExecutionLog<D>>>,
    config: RuntimeConfig,
}

impl<D: SharedState> WorkflowService<D> {
    /// Create a service with default settings
    pub fn new(registry: Arc<NodeRegistry<D>>) -> Self {
        Self::with_config(registry, RuntimeConfig::default())
    }

    pub fn with_config(registry: Arc<NodeRegistry<D>>, config: RuntimeConfig) -> Self {
        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));
        let engine = Arc::new(
            WorkflowEngine::new(Arc::clone(&registry), Arc::clone(&event_bus))
                .with_max_steps(config.max_steps),
        );

        Self {
            registry,
            engine,
            event_bus,
            workflows: Arc::new(RwLock::new(HashMap::new())),
            executions: Arc::new(RwLock::new(ExecutionLog::default())),
            config,
        }
    }

    pub fn registry(&self) -> &Arc<NodeRegistry<D>> {
        &self.registry
    }

    pub fn engine(&self) -> &Arc<WorkflowEngine<D>> {
        &self.engine
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Register a workflow, returning the definition it replaced, if any
    pub async fn register_workflow(
        &self,
        workflow: WorkflowDefinition,
    ) -> Option<Arc<WorkflowDefinition>> {
        tracing::info!("Registering workflow: {} ({})", workflow.name, workflow.id);
        let mut workflows = self.workflows.write().await;
        workflows.insert(workflow.id.clone(), Arc::new(workflow))
    }

    pub async fn remove_workflow(&self, workflow_id: &str) -> Option<Arc<WorkflowDefinition>> {
        self.workflows.write().await.remove(workflow_id)
    }

    pub async fn get_workflow(&self, workflow_id: &str) -> Option<Arc<WorkflowDefinition>> {
        self.workflows.read().await.get(workflow_id).cloned()
    }

    /// All registered workflows, sorted by id
    pub async fn list_workflows(&self) -> Vec<Arc<WorkflowDefinition>> {
        let mut workflows: Vec<_> = self.workflows.read().await.values().cloned().collect();
        workflows.sort_by(|a, b| a.id.cmp(&b.id));
        workflows
    }

    /// Execute a registered workflow for one message.
    ///
    /// Only an unknown workflow id is an error; failed runs come back as
    /// records with `status == Failed`.
    pub async fn execute_workflow(
        &self,
        workflow_id: &str,
        message: InboundMessage,
    ) -> Result<WorkflowExecution<D>, FlowError> {
        let cancel = CancellationToken::new();
        self.execute_workflow_with_cancellation(workflow_id, message, &cancel)
            .await
    }

    /// Like [`execute_workflow`](Self::execute_workflow), but the caller can
    /// cancel the run. The configured `run_timeout` still applies and only
    /// ends this run; `cancel` itself is never cancelled here.
    pub async fn execute_workflow_with_cancellation(
        &self,
        workflow_id: &str,
        message: InboundMessage,
        cancel: &CancellationToken,
    ) -> Result<WorkflowExecution<D>, FlowError> {
        let workflow = self
            .get_workflow(workflow_id)
            .await
            .ok_or_else(|| FlowError::Workflow(WorkflowError::NotFound(workflow_id.to_string())))?;

        let run_token = cancel.child_token();
        let run = self
            .engine
            .execute_with_cancellation(&workflow, message, &run_token);

        let execution = match self.config.run_timeout {
            Some(limit) => {
                tokio::pin!(run);
                tokio::select! {
                    execution = &mut run => execution,
                    _ = tokio::time::sleep(limit) => {
                        tracing::warn!("Workflow {} exceeded run timeout of {:?}", workflow.id, limit);
                        run_token.cancel();
                        run.await
                    }
                }
            }
            None => run.await,
        };

        self.executions
            .write()
            .await
            .record(execution.clone(), self.config.execution_history_limit);

        Ok(execution)
    }

    pub async fn get_execution(&self, execution_id: ExecutionId) -> Option<WorkflowExecution<D>> {
        self.executions.read().await.get(execution_id).cloned()
    }

    /// Logged executions of one workflow, oldest first
    pub async fn executions_for(&self, workflow_id: &str) -> Vec<WorkflowExecution<D>> {
        self.executions.read().await.for_workflow(workflow_id)
    }

    /// Subscribe to execution events
    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<ExecutionEvent> {
        self.event_bus.subscribe()
    }

    /// Get the event bus for direct access
    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }
}

/// Bounded log of finished executions, indexed by id and by workflow
struct ExecutionLog<D> {
    records: HashMap<ExecutionId, WorkflowExecution<D>>,
    order: VecDeque<ExecutionId>,
    by_workflow: HashMap<WorkflowId, Vec<ExecutionId>>,
}

impl<D: Clone> ExecutionLog<D> {
    fn record(&mut self, execution: WorkflowExecution<D>, limit: usize) {
        let id = execution.id;
        self.by_workflow
            .entry(execution.workflow_id.clone())
            .or_default()
            .push(id);
        self.order.push_back(id);
        self.records.insert(id, execution);

        while self.order.len() > limit {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            if let Some(evicted) = self.records.remove(&oldest) {
                if let Some(ids) = self.by_workflow.get_mut(&evicted.workflow_id) {
                    ids.retain(|id| *id != oldest);
                    if ids.is_empty() {
                        self.by_workflow.remove(&evicted.workflow_id);
                    }
                }
            }
        }
    }

    fn get(&self, id: ExecutionId) -> Option<&WorkflowExecution<D>> {
        self.records.get(&id)
    }

    fn for_workflow(&self, workflow_id: &str) -> Vec<WorkflowExecution<D>> {
        self.by_workflow
            .get(workflow_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.records.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl<D> Default for ExecutionLog<D> {
    fn default() -> Self {
        Self {
            records: HashMap::new(),
            order: VecDeque::new(),
            by_workflow: HashMap::new(),
        }
    }
}

/// Configuration for the workflow service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub event_buffer_size: usize,
    /// Fail runs that visit more steps than this. `None` means unlimited.
    pub max_steps: Option<usize>,
    /// Cancel runs that take longer than this. `None` means no timeout.
    pub run_timeout: Option<Duration>,
    pub execution_history_limit: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            event_buffer_size: 1000,
            max_steps: None,
            run_timeout: None,
            execution_history_limit: 1000,
        }
    }
}
