use crate::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;

/// An inbound chat message handed to a workflow run.
///
/// The engine only reads `id`; `payload` is passed through to steps untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InboundMessage {
    pub id: String,
    pub payload: Value,
}

impl InboundMessage {
    pub fn new(id: impl Into<String>, payload: impl Into<Value>) -> Self {
        Self {
            id: id.into(),
            payload: payload.into(),
        }
    }
}

/// Per-run data threaded through every step of a workflow.
///
/// Pipelines with a fixed set of stages can implement this for their own
/// struct to get compile-time checked producer/consumer fields. Workflows
/// assembled from loosely coupled step types use [`SharedData`].
pub trait SharedState: Clone + Debug + Send + Sync + 'static {
    /// Initial data for a run started by `message`.
    fn seed(message: &InboundMessage) -> Self;

    /// Store a step's output. Used by the default `finalize` phase.
    fn record_output(&mut self, step_id: &str, output: Value);
}

/// String-keyed scratchpad used by generic step types.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SharedData {
    values: HashMap<String, Value>,
}

impl SharedData {
    pub const MESSAGE_KEY: &'static str = "message";

    pub fn new() -> Self {
        Self::default()
    }

    /// Key under which the default `finalize` stores a step's output.
    pub fn output_key(step_id: &str) -> String {
        format!("{}.output", step_id)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(|v| v.as_str())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// The inbound message payload stored when the run was seeded.
    pub fn message(&self) -> Option<&Value> {
        self.values.get(Self::MESSAGE_KEY)
    }
}

impl SharedState for SharedData {
    fn seed(message: &InboundMessage) -> Self {
        let mut data = Self::new();
        data.set(Self::MESSAGE_KEY, message.payload.clone());
        data
    }

    fn record_output(&mut self, step_id: &str, output: Value) {
        self.values.insert(Self::output_key(step_id), output);
    }
}

impl From<HashMap<String, Value>> for SharedData {
    fn from(values: HashMap<String, Value>) -> Self {
        Self { values }
    }
}
