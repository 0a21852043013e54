use chatcore::{NodeError, NodeHandler, NodeKind};
use std::collections::HashMap;
use std::sync::Arc;

/// Handlers keyed by node type. A type with no handler is rejected as
/// `InvalidNodeType` before any contact state is touched.
pub struct NodeRegistry {
    handlers: HashMap<NodeKind, Arc<dyn NodeHandler>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler, replacing any previous one for the same type
    pub fn register(&mut self, handler: Arc<dyn NodeHandler>) {
        let kind = handler.node_kind();
        tracing::info!("Registering node type: {}", kind);
        self.handlers.insert(kind, handler);
    }

    pub fn handler(&self, kind: &NodeKind) -> Result<Arc<dyn NodeHandler>, NodeError> {
        self.handlers
            .get(kind)
            .cloned()
            .ok_or_else(|| NodeError::InvalidNodeType(kind.to_string()))
    }

    pub fn contains(&self, kind: &NodeKind) -> bool {
        self.handlers.contains_key(kind)
    }

    /// Registered node types, sorted by name
    pub fn list_node_kinds(&self) -> Vec<NodeKind> {
        let mut kinds: Vec<_> = self.handlers.keys().cloned().collect();
        kinds.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        kinds
    }

    pub fn description(&self, kind: &NodeKind) -> Option<String> {
        self.handlers.get(kind).map(|h| h.description().to_string())
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
