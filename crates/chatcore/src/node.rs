use crate::{
    ChannelClient, ContactState, ContactStore, FlowId, FlowStore, JobId, Node, NodeError, NodeKind,
    TaskQueue,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Side effect attached to a node type
#[async_trait]
pub trait NodeHandler: Send + Sync {
    /// Node type this handler serves
    fn node_kind(&self) -> NodeKind;

    /// One-line description for listings
    fn description(&self) -> &str {
        ""
    }

    /// Run the node's side effect. Changes to `ctx.contact` are persisted by the caller.
    async fn execute(&self, ctx: NodeContext<'_>) -> Result<NodeOutcome, NodeError>;
}

/// Collaborators injected into the executor and handed to every handler
#[derive(Clone)]
pub struct Services {
    pub contacts: Arc<dyn ContactStore>,
    pub flows: Arc<dyn FlowStore>,
    pub channel: Arc<dyn ChannelClient>,
    pub queue: Arc<dyn TaskQueue>,
}

/// Execution context passed to a handler
pub struct NodeContext<'a> {
    pub flow_id: FlowId,
    pub node: &'a Node,
    pub contact: &'a mut ContactState,
    pub services: &'a Services,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeOutcome {
    /// Side effect applied synchronously
    Completed,
    /// Continuation handed to the task queue
    Deferred { job_id: JobId, ready_at: i64 },
}
