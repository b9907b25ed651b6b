use crate::{node::DEFAULT_ACTION, Value, WorkflowError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

pub type WorkflowId = String;
pub type StepId = String;

/// Complete workflow definition.
///
/// Built once through [`WorkflowBuilder`] and never mutated afterwards;
/// rebuild to change it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: WorkflowId,
    pub name: String,
    pub description: Option<String>,
    pub steps: Vec<StepDeclaration>,
    pub edges: Vec<Edge>,
    pub entry_step: StepId,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowDefinition {
    pub fn builder(id: impl Into<String>, name: impl Into<String>) -> WorkflowBuilder {
        WorkflowBuilder::new(id, name)
    }

    pub fn find_step(&self, id: &str) -> Option<&StepDeclaration> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Edges leaving `step_id`, in declaration order
    pub fn outgoing(&self, step_id: &str) -> impl Iterator<Item = &Edge> + '_ {
        let step_id = step_id.to_string();
        self.edges.iter().filter(move |e| e.from == step_id)
    }
}

/// Step specification in a workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDeclaration {
    pub id: StepId,
    /// Resolved against the node registry when the step is reached
    pub step_type: String,
    pub name: String,
    #[serde(default)]
    pub config: HashMap<String, Value>,
}

impl StepDeclaration {
    pub fn new(id: impl Into<String>, step_type: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            step_type: step_type.into(),
            config: HashMap::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }
}

/// Directed edge between two steps.
///
/// An edge without an action is the default edge of its `from` step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub from: StepId,
    pub to: StepId,
    #[serde(default)]
    pub action: Option<String>,
}

impl Edge {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            action: None,
        }
    }

    pub fn on(from: impl Into<String>, action: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            action: Some(action.into()),
        }
    }

    /// The label this edge routes on, `"default"` when unlabeled
    pub fn action_label(&self) -> &str {
        self.action.as_deref().unwrap_or(DEFAULT_ACTION)
    }
}

/// Fluent accumulator for [`WorkflowDefinition`]s
#[derive(Debug, Clone)]
pub struct WorkflowBuilder {
    id: WorkflowId,
    name: String,
    description: Option<String>,
    steps: Vec<StepDeclaration>,
    edges: Vec<Edge>,
    entry_step: Option<StepId>,
    version: u32,
}

impl WorkflowBuilder {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            steps: Vec::new(),
            edges: Vec::new(),
            entry_step: None,
            version: 1,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn step(mut self, step: StepDeclaration) -> Self {
        self.steps.push(step);
        self
    }

    /// Add a default (unlabeled) edge
    pub fn edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.push(Edge::new(from, to));
        self
    }

    /// Add an edge taken when `from` reports `action`
    pub fn edge_on(
        mut self,
        from: impl Into<String>,
        action: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        self.edges.push(Edge::on(from, action, to));
        self
    }

    pub fn entry(mut self, step_id: impl Into<String>) -> Self {
        self.entry_step = Some(step_id.into());
        self
    }

    /// Finish the definition.
    ///
    /// Checks only structural invariants: at least one step, an entry step
    /// that is declared, unique step ids and at most one edge per
    /// (`from`, action) pair. Reachability and step types are not checked.
    pub fn build(self) -> Result<WorkflowDefinition, WorkflowError> {
        let entry_step = self.entry_step.ok_or(WorkflowError::MissingEntryStep)?;
        if self.steps.is_empty() {
            return Err(WorkflowError::NoSteps);
        }

        let mut ids = HashSet::new();
        for step in &self.steps {
            if !ids.insert(step.id.as_str()) {
                return Err(WorkflowError::DuplicateStep(step.id.clone()));
            }
        }
        if !ids.contains(entry_step.as_str()) {
            return Err(WorkflowError::UnknownEntryStep(entry_step));
        }

        let mut routes = HashSet::new();
        for edge in &self.edges {
            if !routes.insert((edge.from.as_str(), edge.action_label())) {
                return Err(WorkflowError::DuplicateEdge {
                    from: edge.from.clone(),
                    action: edge.action_label().to_string(),
                });
            }
        }

        let now = Utc::now();
        Ok(WorkflowDefinition {
            id: self.id,
            name: self.name,
            description: self.description,
            steps: self.steps,
            edges: self.edges,
            entry_step,
            version: self.version,
            created_at: now,
            updated_at: now,
        })
    }
}
