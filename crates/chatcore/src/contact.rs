use crate::{FlowId, JobId, NodeId, ValueMap};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

pub type ContactId = Uuid;
pub type AccountId = Uuid;

/// Automation-relevant state of one conversation participant.
///
/// The flow position is private: a contact is either idle (no flow) or in a
/// flow with a current step, and only the transition methods below change it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactState {
    pub id: ContactId,
    pub account_id: AccountId,
    /// Recipient id on the messaging channel
    pub channel_user_id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub last_interaction_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    current_flow_id: Option<FlowId>,
    current_step_node_id: Option<NodeId>,
    /// Continuation scheduled by the current step, if it is a wait
    #[serde(default)]
    awaiting_job_id: Option<JobId>,
    #[serde(default)]
    pub flow_context: ValueMap,
}

impl ContactState {
    pub fn new(account_id: AccountId, channel_user_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            channel_user_id: channel_user_id.into(),
            first_name: None,
            last_name: None,
            last_interaction_at: None,
            tags: BTreeSet::new(),
            current_flow_id: None,
            current_step_node_id: None,
            awaiting_job_id: None,
            flow_context: ValueMap::new(),
        }
    }

    pub fn with_name(mut self, first: impl Into<String>, last: Option<String>) -> Self {
        self.first_name = Some(first.into());
        self.last_name = last;
        self
    }

    pub fn is_idle(&self) -> bool {
        self.current_flow_id.is_none()
    }

    pub fn current_flow_id(&self) -> Option<FlowId> {
        self.current_flow_id
    }

    pub fn current_step_node_id(&self) -> Option<&str> {
        self.current_step_node_id.as_deref()
    }

    pub fn awaiting_job_id(&self) -> Option<JobId> {
        self.awaiting_job_id
    }

    /// Record the continuation that may resume the current step.
    ///
    /// Cleared by every step change, so a continuation from an earlier visit to
    /// the same node never matches.
    pub fn await_job(&mut self, job_id: JobId) {
        self.awaiting_job_id = Some(job_id);
    }

    /// Enter a flow at `node_id` with a fresh context
    pub fn enter_flow(&mut self, flow_id: FlowId, node_id: impl Into<NodeId>) {
        self.current_flow_id = Some(flow_id);
        self.current_step_node_id = Some(node_id.into());
        self.awaiting_job_id = None;
        self.flow_context = ValueMap::new();
    }

    /// Move the step pointer within the current flow
    pub fn move_to(&mut self, node_id: impl Into<NodeId>) {
        self.current_step_node_id = Some(node_id.into());
        self.awaiting_job_id = None;
    }

    /// Return to idle, handing back the flow that was left
    pub fn leave_flow(&mut self) -> Option<FlowId> {
        self.current_step_node_id = None;
        self.awaiting_job_id = None;
        self.flow_context = ValueMap::new();
        self.current_flow_id.take()
    }

    /// Add a tag; returns false when it was already present
    pub fn add_tag(&mut self, tag: impl Into<String>) -> bool {
        self.tags.insert(tag.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Open,
    Closed,
    PendingHuman,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Message,
    Postback,
    /// Synthesised when a scheduled wait elapses
    Timer,
}

/// An inbound event as handed over by the webhook layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
    pub contact_id: ContactId,
    pub account_id: AccountId,
    pub kind: EventKind,
    pub text: Option<String>,
    pub payload: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl InboundEvent {
    pub fn message(contact: &ContactState, text: impl Into<String>) -> Self {
        Self {
            contact_id: contact.id,
            account_id: contact.account_id,
            kind: EventKind::Message,
            text: Some(text.into()),
            payload: None,
            timestamp: Utc::now(),
        }
    }

    pub fn postback(contact: &ContactState, payload: impl Into<String>) -> Self {
        Self {
            contact_id: contact.id,
            account_id: contact.account_id,
            kind: EventKind::Postback,
            text: None,
            payload: Some(payload.into()),
            timestamp: Utc::now(),
        }
    }

    pub fn timer(contact: &ContactState) -> Self {
        Self {
            contact_id: contact.id,
            account_id: contact.account_id,
            kind: EventKind::Timer,
            text: None,
            payload: None,
            timestamp: Utc::now(),
        }
    }

    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    /// Payload of a button response, if this is one
    pub fn button_payload(&self) -> Option<&str> {
        match self.kind {
            EventKind::Postback => self.payload.as_deref(),
            _ => None,
        }
    }
}
