use crate::FlowId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    WelcomeMessage,
    DmKeyword,
    CommentKeyword,
    StoryMention,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerStatus {
    Active,
    Inactive,
}

/// Rule that starts a flow for a contact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub id: Uuid,
    pub flow_id: FlowId,
    #[serde(rename = "type")]
    pub kind: TriggerKind,
    pub keyword: Option<String>,
    pub status: TriggerStatus,
    /// Lower values are evaluated first; unset sorts after every explicit priority
    #[serde(default)]
    pub priority: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl Trigger {
    pub fn new(flow_id: FlowId, kind: TriggerKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            flow_id,
            kind,
            keyword: None,
            status: TriggerStatus::Active,
            priority: None,
            created_at: Utc::now(),
        }
    }

    pub fn dm_keyword(flow_id: FlowId, keyword: impl Into<String>) -> Self {
        let mut trigger = Self::new(flow_id, TriggerKind::DmKeyword);
        trigger.keyword = Some(keyword.into());
        trigger
    }

    pub fn welcome(flow_id: FlowId) -> Self {
        Self::new(flow_id, TriggerKind::WelcomeMessage)
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.status = TriggerStatus::Inactive;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == TriggerStatus::Active
    }
}
