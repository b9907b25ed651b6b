use chatflow_core::{Edge, DEFAULT_ACTION};
use std::collections::HashMap;

/// Next-step lookup keyed by (`from`, action label).
///
/// Built once per run. Duplicate (`from`, action) edges resolve to the one
/// declared last.
#[derive(Debug, Default, Clone)]
pub struct RoutingTable {
    routes: HashMap<String, HashMap<String, String>>,
}

impl RoutingTable {
    pub fn from_edges(edges: &[Edge]) -> Self {
        let mut routes: HashMap<String, HashMap<String, String>> = HashMap::new();
        for edge in edges {
            let previous = routes
                .entry(edge.from.clone())
                .or_default()
                .insert(edge.action_label().to_string(), edge.to.clone());
            if let Some(previous) = previous {
                tracing::debug!(
                    "Edge {} --{}--> {} overrides earlier target {}",
                    edge.from,
                    edge.action_label(),
                    edge.to,
                    previous
                );
            }
        }
        Self { routes }
    }

    /// Step to run after `from` reported `action`.
    ///
    /// Tries the exact label first, then the `"default"` edge. `None` means
    /// the run is finished.
    pub fn next(&self, from: &str, action: &str) -> Option<&str> {
        let routes = self.routes.get(from)?;
        routes
            .get(action)
            .or_else(|| routes.get(DEFAULT_ACTION))
            .map(String::as_str)
    }
}
