//! Core abstractions for the chat automation engine
//!
//! Flow graphs, contact state, triggers, tasks, collaborator contracts and
//! the error types shared by the runtime and the node handlers. Nothing in
//! this crate performs I/O.

mod contact;
mod error;
pub mod events;
mod flow;
mod node;
mod store;
mod task;
mod trigger;
mod value;

pub use contact::{AccountId, ContactId, ContactState, ConversationStatus, EventKind, InboundEvent};
pub use error::{ChannelError, FlowError, GraphError, NodeError, QueueError, StoreError};
pub use events::{AutomationEvent, DropReason, EventBus};
pub use flow::{
    Condition, Connection, FlowDefinition, FlowGraph, FlowId, FlowRecord, FlowStatus, Node, NodeId,
    NodeKind,
};
pub use node::{NodeContext, NodeHandler, NodeOutcome, Services};
pub use store::{ChannelClient, ContactStore, FlowStore, LockStore, Profile, TaskQueue};
pub use task::{JobId, Task, TaskKind, TriggerData};
pub use trigger::{Trigger, TriggerKind, TriggerStatus};
pub use value::{Value, ValueMap};

/// Result type for flow operations
pub type Result<T> = std::result::Result<T, FlowError>;
