use crate::{ContactId, FlowId, JobId, NodeId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Why a contact was pulled out of a flow without completing it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    FlowNotFound,
    NodeNotFound,
    Replaced,
}

/// Events emitted while driving contacts through flows
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AutomationEvent {
    FlowStarted {
        contact_id: ContactId,
        flow_id: FlowId,
        node_id: NodeId,
        timestamp: DateTime<Utc>,
    },
    NodeExecuted {
        contact_id: ContactId,
        flow_id: FlowId,
        node_id: NodeId,
        node_type: String,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    NodeFailed {
        contact_id: ContactId,
        flow_id: FlowId,
        node_id: NodeId,
        error: String,
        timestamp: DateTime<Utc>,
    },
    /// The contact ran off the end of the flow (the analytics "completed" marker)
    FlowCompleted {
        contact_id: ContactId,
        flow_id: FlowId,
        timestamp: DateTime<Utc>,
    },
    FlowAbandoned {
        contact_id: ContactId,
        flow_id: FlowId,
        reason: DropReason,
        timestamp: DateTime<Utc>,
    },
    TaskScheduled {
        job_id: JobId,
        flow_id: FlowId,
        ready_at: Option<i64>,
        timestamp: DateTime<Utc>,
    },
}

/// In-process broadcast bus for automation events
pub struct EventBus {
    sender: broadcast::Sender<AutomationEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AutomationEvent> {
        self.sender.subscribe()
    }

    /// Fire and forget; events are dropped when nobody listens
    pub fn emit(&self, event: AutomationEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1000)
    }
}
