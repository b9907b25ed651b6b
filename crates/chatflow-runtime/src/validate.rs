use crate::registry::NodeRegistry;
use chatflow_core::{SharedState, WorkflowDefinition};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// A problem found in a workflow definition that would only surface at run time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationIssue {
    UnknownEntryStep { step: String },
    DuplicateStep { step: String },
    UnknownEdgeEndpoint { from: String, to: String, missing: String },
    DuplicateEdge { from: String, action: String },
    UnregisteredType { step: String, step_type: String },
    UnreachableStep { step: String },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownEntryStep { step } => write!(f, "entry step '{}' is not declared", step),
            Self::DuplicateStep { step } => write!(f, "step id '{}' is declared more than once", step),
            Self::UnknownEdgeEndpoint { from, to, missing } => {
                write!(f, "edge {} -> {} references unknown step '{}'", from, to, missing)
            }
            Self::DuplicateEdge { from, action } => write!(
                f,
                "step '{}' has more than one edge for action '{}', the last one wins",
                from, action
            ),
            Self::UnregisteredType { step, step_type } => {
                write!(f, "step '{}' uses unregistered type '{}'", step, step_type)
            }
            Self::UnreachableStep { step } => {
                write!(f, "step '{}' is not reachable from the entry step", step)
            }
        }
    }
}

/// Check a definition against a registry without executing it.
///
/// Advisory only: the engine does not call this, and a definition with
/// issues can still be executed.
pub fn validate_definition<D: SharedState>(
    workflow: &WorkflowDefinition,
    registry: &NodeRegistry<D>,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let mut graph: DiGraph<&str, &str> = DiGraph::new();
    let mut step_to_index: HashMap<&str, NodeIndex> = HashMap::new();

    for step in &workflow.steps {
        if step_to_index.contains_key(step.id.as_str()) {
            issues.push(ValidationIssue::DuplicateStep {
                step: step.id.clone(),
            });
            continue;
        }
        step_to_index.insert(step.id.as_str(), graph.add_node(step.id.as_str()));

        if !registry.contains(&step.step_type) {
            issues.push(ValidationIssue::UnregisteredType {
                step: step.id.clone(),
                step_type: step.step_type.clone(),
            });
        }
    }

    let mut routes = HashSet::new();
    for edge in &workflow.edges {
        if !routes.insert((edge.from.as_str(), edge.action_label())) {
            issues.push(ValidationIssue::DuplicateEdge {
                from: edge.from.clone(),
                action: edge.action_label().to_string(),
            });
        }

        let from = step_to_index.get(edge.from.as_str());
        let to = step_to_index.get(edge.to.as_str());
        match (from, to) {
            (Some(from), Some(to)) => {
                graph.add_edge(*from, *to, edge.action_label());
            }
            (None, _) => issues.push(ValidationIssue::UnknownEdgeEndpoint {
                from: edge.from.clone(),
                to: edge.to.clone(),
                missing: edge.from.clone(),
            }),
            (Some(_), None) => issues.push(ValidationIssue::UnknownEdgeEndpoint {
                from: edge.from.clone(),
                to: edge.to.clone(),
                missing: edge.to.clone(),
            }),
        }
    }

    let Some(entry) = step_to_index.get(workflow.entry_step.as_str()) else {
        issues.push(ValidationIssue::UnknownEntryStep {
            step: workflow.entry_step.clone(),
        });
        return issues;
    };

    let mut reachable = HashSet::new();
    let mut dfs = Dfs::new(&graph, *entry);
    while let Some(idx) = dfs.next(&graph) {
        reachable.insert(idx);
    }

    for idx in graph.node_indices() {
        if !reachable.contains(&idx) {
            issues.push(ValidationIssue::UnreachableStep {
                step: graph[idx].to_string(),
            });
        }
    }

    issues
}
