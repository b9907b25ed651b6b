use crate::registry::NodeRegistry;
use crate::routing::RoutingTable;
use chatflow_core::{
    execute, EventBus, ExecutionEvent, ExecutionId, ExecutionStatus, InboundMessage, NodeContext,
    SharedState, WorkflowDefinition, WorkflowError, WorkflowExecution,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// What happened to a single step
enum StepOutcome {
    /// Step succeeded and reported this action label
    Next(String),
    Failed(String),
    Cancelled,
}

/// Walks a workflow graph one step at a time for a single inbound message
pub struct WorkflowEngine<D: SharedState> {
    registry: Arc<NodeRegistry<D>>,
    event_bus: Arc<EventBus>,
    max_steps: Option<usize>,
}

impl<D: SharedState> WorkflowEngine<D> {
    pub fn new(registry: Arc<NodeRegistry<D>>, event_bus: Arc<EventBus>) -> Self {
        Self {
            registry,
            event_bus,
            max_steps: None,
        }
    }

    /// Fail runs that visit more than `max_steps` steps
    pub fn with_max_steps(mut self, max_steps: Option<usize>) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn registry(&self) -> &Arc<NodeRegistry<D>> {
        &self.registry
    }

    /// Execute a workflow for one message.
    ///
    /// Never fails: graph-resolution errors and step failures are reported
    /// through the returned record's `status` and `error`.
    pub async fn execute(
        &self,
        workflow: &WorkflowDefinition,
        message: InboundMessage,
    ) -> WorkflowExecution<D> {
        self.execute_with_cancellation(workflow, message, &CancellationToken::new())
            .await
    }

    /// Execute a workflow, ending the run as `Cancelled` once `cancel` fires.
    ///
    /// A step that is running when the token fires is dropped at its next
    /// suspension point. Shared data written before that is kept.
    pub async fn execute_with_cancellation(
        &self,
        workflow: &WorkflowDefinition,
        message: InboundMessage,
        cancel: &CancellationToken,
    ) -> WorkflowExecution<D> {
        let start_time = Instant::now();
        let routes = RoutingTable::from_edges(&workflow.edges);
        let shared = Arc::new(RwLock::new(D::seed(&message)));
        let mut execution = WorkflowExecution::new(workflow.id.clone(), message.id.clone(), ());
        let message = Arc::new(message);

        execution.status = ExecutionStatus::Running;
        execution.current_step = Some(workflow.entry_step.clone());

        self.event_bus.emit(ExecutionEvent::WorkflowStarted {
            execution_id: execution.id,
            workflow_id: workflow.id.clone(),
            message_id: execution.message_id.clone(),
            timestamp: Utc::now(),
        });

        tracing::info!(
            "Starting workflow execution {} of {} for message {}",
            execution.id,
            workflow.id,
            execution.message_id
        );

        while let Some(step_id) = execution.current_step.clone() {
            if let Some(limit) = self.max_steps {
                if execution.path.len() >= limit {
                    execution.current_step = execution.path.last().cloned();
                    execution.status = ExecutionStatus::Failed;
                    execution.error = Some(WorkflowError::StepLimitExceeded(limit).to_string());
                    break;
                }
            }
            execution.path.push(step_id.clone());

            let outcome = self
                .run_step(workflow, &step_id, execution.id, &shared, &message, cancel)
                .await;

            match outcome {
                StepOutcome::Next(action) => match routes.next(&step_id, &action) {
                    Some(next) => {
                        tracing::debug!("Step {} --{}--> {}", step_id, action, next);
                        execution.current_step = Some(next.to_string());
                    }
                    None => {
                        tracing::debug!("No edge from {} on '{}', workflow complete", step_id, action);
                        execution.status = ExecutionStatus::Completed;
                        break;
                    }
                },
                StepOutcome::Failed(error) => {
                    execution.status = ExecutionStatus::Failed;
                    execution.error = Some(error);
                    break;
                }
                StepOutcome::Cancelled => {
                    tracing::warn!("Workflow execution {} cancelled at step {}", execution.id, step_id);
                    execution.status = ExecutionStatus::Cancelled;
                    execution.error = Some(format!("Cancelled at step '{}'", step_id));
                    break;
                }
            }
        }

        execution.completed_at = Some(Utc::now());
        let duration_ms = start_time.elapsed().as_millis() as u64;

        match execution.status {
            ExecutionStatus::Completed => tracing::info!(
                "Workflow execution {} completed in {}ms",
                execution.id,
                duration_ms
            ),
            status => tracing::error!(
                "Workflow execution {} {}: {}",
                execution.id,
                status,
                execution.error.as_deref().unwrap_or("unknown error")
            ),
        }

        self.event_bus.emit(ExecutionEvent::WorkflowCompleted {
            execution_id: execution.id,
            status: execution.status,
            duration_ms,
            timestamp: Utc::now(),
        });

        execution.with_shared_data(take_shared(shared).await)
    }

    /// Resolve, instantiate and execute one step
    async fn run_step(
        &self,
        workflow: &WorkflowDefinition,
        step_id: &str,
        execution_id: ExecutionId,
        shared: &Arc<RwLock<D>>,
        message: &Arc<InboundMessage>,
        cancel: &CancellationToken,
    ) -> StepOutcome {
        let Some(step) = workflow.find_step(step_id) else {
            return StepOutcome::Failed(WorkflowError::StepNotFound(step_id.to_string()).to_string());
        };

        let (node, config) =
            match self
                .registry
                .create_node(&step.step_type, &step.id, &step.name, &step.config)
            {
                Ok(created) => created,
                Err(e) => {
                    tracing::error!("Cannot instantiate step {}: {}", step_id, e);
                    return StepOutcome::Failed(e.to_string());
                }
            };

        let ctx = NodeContext {
            execution_id,
            workflow_id: workflow.id.clone(),
            step_id: step.id.clone(),
            step_name: step.name.clone(),
            shared: Arc::clone(shared),
            message: Arc::clone(message),
            config,
            events: self.event_bus.create_emitter(execution_id, &step.id),
        };

        if cancel.is_cancelled() {
            return StepOutcome::Cancelled;
        }

        self.event_bus.emit(ExecutionEvent::StepStarted {
            execution_id,
            step_id: step.id.clone(),
            step_type: step.step_type.clone(),
            timestamp: Utc::now(),
        });

        let start = Instant::now();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return StepOutcome::Cancelled,
            result = execute(node.as_ref(), &ctx) => result,
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        if !result.should_continue || result.error.is_some() {
            let error = result
                .error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "step stopped the workflow".to_string());
            tracing::error!("Step {} failed: {}", step_id, error);

            self.event_bus.emit(ExecutionEvent::StepFailed {
                execution_id,
                step_id: step.id.clone(),
                error: error.clone(),
                timestamp: Utc::now(),
            });
            return StepOutcome::Failed(format!("Step '{}' failed: {}", step_id, error));
        }

        tracing::info!("Step {} completed in {}ms with action '{}'", step_id, duration_ms, result.action);

        self.event_bus.emit(ExecutionEvent::StepCompleted {
            execution_id,
            step_id: step.id.clone(),
            action: result.action.clone(),
            duration_ms,
            timestamp: Utc::now(),
        });

        StepOutcome::Next(result.action)
    }
}

/// Unwrap the run's shared data once every step has released it
async fn take_shared<D: SharedState>(shared: Arc<RwLock<D>>) -> D {
    match Arc::try_unwrap(shared) {
        Ok(lock) => lock.into_inner(),
        // A step kept a handle (e.g. in a spawned task); return what it holds now.
        Err(shared) => shared.read().await.clone(),
    }
}
