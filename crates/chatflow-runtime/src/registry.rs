use chatflow_core::{Node, NodeError, SharedState, Value, WorkflowError};
use std::collections::HashMap;
use std::sync::Arc;

/// Factory trait for creating step instances of one type
pub trait NodeFactory<D: SharedState>: Send + Sync {
    /// Create a new instance with already-merged configuration
    fn create_instance(
        &self,
        id: &str,
        name: &str,
        config: &HashMap<String, Value>,
    ) -> Result<Box<dyn Node<D>>, NodeError>;

    /// Type tag steps refer to (e.g. "chat.reply")
    fn node_type(&self) -> &str;

    /// Configuration applied before a step declaration's own values
    fn default_config(&self) -> HashMap<String, Value> {
        HashMap::new()
    }

    fn description(&self) -> &str {
        ""
    }

    fn category(&self) -> &str {
        "general"
    }
}

/// Collects factories during start-up, then freezes into a [`NodeRegistry`]
pub struct NodeRegistryBuilder<D: SharedState> {
    factories: HashMap<String, Arc<dyn NodeFactory<D>>>,
}

impl<D: SharedState> NodeRegistryBuilder<D> {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a factory. A later registration for the same type replaces
    /// the earlier one.
    pub fn register(&mut self, factory: Arc<dyn NodeFactory<D>>) -> &mut Self {
        let node_type = factory.node_type().to_string();
        tracing::info!("Registering node type: {}", node_type);
        if self.factories.insert(node_type.clone(), factory).is_some() {
            tracing::warn!("Node type {} was already registered, replacing it", node_type);
        }
        self
    }

    pub fn with(mut self, factory: Arc<dyn NodeFactory<D>>) -> Self {
        self.register(factory);
        self
    }

    pub fn build(self) -> NodeRegistry<D> {
        NodeRegistry {
            factories: self.factories,
        }
    }
}

impl<D: SharedState> Default for NodeRegistryBuilder<D> {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only table of available step types.
///
/// Has no mutating methods, so it can be shared across concurrent runs
/// behind an `Arc` without locking.
pub struct NodeRegistry<D: SharedState> {
    factories: HashMap<String, Arc<dyn NodeFactory<D>>>,
}

impl<D: SharedState> NodeRegistry<D> {
    pub fn builder() -> NodeRegistryBuilder<D> {
        NodeRegistryBuilder::new()
    }

    pub fn get(&self, node_type: &str) -> Option<&Arc<dyn NodeFactory<D>>> {
        self.factories.get(node_type)
    }

    pub fn contains(&self, node_type: &str) -> bool {
        self.factories.contains_key(node_type)
    }

    /// Merge the factory's defaults with `config`; `config` wins on collisions.
    pub fn merged_config(
        factory: &dyn NodeFactory<D>,
        config: &HashMap<String, Value>,
    ) -> HashMap<String, Value> {
        let mut merged = factory.default_config();
        merged.extend(config.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }

    /// Create a step instance, returning it with the merged configuration
    /// it was created with.
    pub fn create_node(
        &self,
        node_type: &str,
        id: &str,
        name: &str,
        config: &HashMap<String, Value>,
    ) -> Result<(Box<dyn Node<D>>, HashMap<String, Value>), WorkflowError> {
        let factory = self
            .factories
            .get(node_type)
            .ok_or_else(|| WorkflowError::TypeNotRegistered(node_type.to_string()))?;

        let merged = Self::merged_config(factory.as_ref(), config);
        let node = factory
            .create_instance(id, name, &merged)
            .map_err(|source| WorkflowError::Instantiation {
                step: id.to_string(),
                source,
            })?;
        Ok((node, merged))
    }

    /// Get all registered node types, sorted
    pub fn list_node_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.factories.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}
