use crate::{ExecutionId, StepId, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a workflow run: `Pending -> Running -> {Completed | Failed | Cancelled}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Record of one traversal of a workflow for one inbound message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecution<D> {
    pub id: ExecutionId,
    pub workflow_id: WorkflowId,
    pub message_id: String,
    pub status: ExecutionStatus,
    /// Last step reached (the failing one if the run failed)
    pub current_step: Option<StepId>,
    /// Steps visited, in order
    pub path: Vec<StepId>,
    pub shared_data: D,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl<D> WorkflowExecution<D> {
    pub fn new(
        workflow_id: impl Into<String>,
        message_id: impl Into<String>,
        shared_data: D,
    ) -> Self {
        Self {
            id: ExecutionId::new_v4(),
            workflow_id: workflow_id.into(),
            message_id: message_id.into(),
            status: ExecutionStatus::Pending,
            current_step: None,
            path: Vec::new(),
            shared_data,
            started_at: Utc::now(),
            completed_at: None,
            error: None,
        }
    }

    /// Replace the shared data, keeping everything else
    pub fn with_shared_data<E>(self, shared_data: E) -> WorkflowExecution<E> {
        WorkflowExecution {
            id: self.id,
            workflow_id: self.workflow_id,
            message_id: self.message_id,
            status: self.status,
            current_step: self.current_step,
            path: self.path,
            shared_data,
            started_at: self.started_at,
            completed_at: self.completed_at,
            error: self.error,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == ExecutionStatus::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.status == ExecutionStatus::Failed
    }

    pub fn duration_ms(&self) -> Option<i64> {
        self.completed_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }
}
