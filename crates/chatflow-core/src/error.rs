use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Node error: {0}")]
    Node(#[from] NodeError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures raised inside a step's lifecycle phases.
///
/// `Clone` so a [`StepResult`](crate::StepResult) can carry the error it
/// was produced from.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NodeError {
    #[error("Missing required data: {0}")]
    MissingData(String),

    #[error("Invalid input type for '{field}': expected {expected}, got {actual}")]
    InvalidInputType {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Node initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Step panicked: {0}")]
    Panicked(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkflowError {
    #[error("Workflow not found: {0}")]
    NotFound(String),

    #[error("Invalid workflow: {0}")]
    Invalid(String),

    #[error("Workflow has no entry step")]
    MissingEntryStep,

    #[error("Workflow has no steps")]
    NoSteps,

    #[error("Entry step '{0}' is not declared in the workflow")]
    UnknownEntryStep(String),

    #[error("Duplicate step id: {0}")]
    DuplicateStep(String),

    #[error("Duplicate edge from '{from}' on action '{action}'")]
    DuplicateEdge { from: String, action: String },

    #[error("Step not found: {0}")]
    StepNotFound(String),

    #[error("Step type not registered: {0}")]
    TypeNotRegistered(String),

    #[error("Failed to create step '{step}': {source}")]
    Instantiation {
        step: String,
        #[source]
        source: NodeError,
    },

    #[error("Step limit of {0} exceeded")]
    StepLimitExceeded(usize),
}
