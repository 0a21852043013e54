use crate::{ContactId, FlowId, NodeId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type JobId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Start the task's flow for the contact
    ExecuteFlow,
    /// Resume a contact parked on a wait node
    ContinueFlow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerData {
    #[serde(rename = "type")]
    pub kind: TaskKind,
    pub contact_id: ContactId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_node_id: Option<NodeId>,
}

/// Unit of deferred work for the worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub job_id: JobId,
    pub flow_id: FlowId,
    pub trigger_data: TriggerData,
    pub queued_at: DateTime<Utc>,
    /// Epoch seconds; set only for tasks parked in the delayed set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready_at: Option<i64>,
}

impl Task {
    fn new(flow_id: FlowId, trigger_data: TriggerData) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            flow_id,
            trigger_data,
            queued_at: Utc::now(),
            ready_at: None,
        }
    }

    pub fn execute_flow(flow_id: FlowId, contact_id: ContactId) -> Self {
        Self::new(
            flow_id,
            TriggerData {
                kind: TaskKind::ExecuteFlow,
                contact_id,
                resume_node_id: None,
            },
        )
    }

    pub fn continue_flow(flow_id: FlowId, contact_id: ContactId, node_id: impl Into<NodeId>) -> Self {
        Self::new(
            flow_id,
            TriggerData {
                kind: TaskKind::ContinueFlow,
                contact_id,
                resume_node_id: Some(node_id.into()),
            },
        )
    }

    pub fn kind(&self) -> TaskKind {
        self.trigger_data.kind
    }

    pub fn contact_id(&self) -> ContactId {
        self.trigger_data.contact_id
    }

    /// Key of the mutual-exclusion lock guarding this job
    pub fn lock_key(&self) -> String {
        format!("job:{}", self.job_id)
    }
}
