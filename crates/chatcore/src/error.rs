use crate::{ContactId, FlowId, NodeId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Malformed flow: {0}")]
    MalformedFlow(#[from] GraphError),

    #[error("Flow not found: {0}")]
    FlowNotFound(FlowId),

    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Contact not found: {0}")]
    ContactNotFound(ContactId),

    #[error("Node error: {0}")]
    Node(#[from] NodeError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

/// Structural problems found while parsing a flow definition
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("start node '{0}' does not exist")]
    MissingStartNode(NodeId),

    #[error("node '{node}' connects to unknown node '{target}'")]
    DanglingConnection { node: NodeId, target: NodeId },

    #[error("node id '{0}' is used more than once")]
    DuplicateNode(NodeId),

    #[error("invalid definition: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for GraphError {
    fn from(e: serde_json::Error) -> Self {
        GraphError::Parse(e.to_string())
    }
}

#[derive(Error, Debug, Clone)]
pub enum NodeError {
    #[error("Invalid node type: {0}")]
    InvalidNodeType(String),

    #[error("Node '{node}' is missing '{field}'")]
    MissingConfig { node: NodeId, field: String },

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

#[derive(Error, Debug, Clone)]
pub enum ChannelError {
    #[error("message delivery failed: {0}")]
    Delivery(String),

    #[error("profile lookup failed: {0}")]
    Profile(String),
}

#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("persistence failure: {0}")]
    Persistence(String),
}

#[derive(Error, Debug, Clone)]
pub enum QueueError {
    #[error("queue unavailable: {0}")]
    Unavailable(String),

    #[error("task serialization failed: {0}")]
    Serialization(String),
}
