//! Contracts of the external collaborators the engine talks to.
//!
//! Persistence, the outbound messaging channel and the queue/lock store all
//! live outside this workspace; the runtime only sees these traits.

use crate::{
    AccountId, ChannelError, ContactId, ContactState, ConversationStatus, FlowId, FlowRecord,
    QueueError, StoreError, Task, Trigger, ValueMap,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[async_trait]
pub trait ContactStore: Send + Sync {
    async fn load_contact(&self, id: ContactId) -> Result<ContactState, StoreError>;

    async fn save_contact(&self, contact: &ContactState) -> Result<(), StoreError>;

    /// Move the contact's open conversation, if there is one, to `status`.
    /// Returns whether an open conversation existed.
    async fn set_conversation_status(
        &self,
        contact_id: ContactId,
        status: ConversationStatus,
    ) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait FlowStore: Send + Sync {
    /// Fails with `StoreError::NotFound` when the flow does not exist
    async fn load_flow(&self, id: FlowId) -> Result<FlowRecord, StoreError>;

    /// Active triggers of all flows owned by the account
    async fn load_active_triggers(&self, account_id: AccountId) -> Result<Vec<Trigger>, StoreError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub username: String,
    pub display_name: Option<String>,
    pub picture_url: Option<String>,
}

/// Outbound messaging channel. Credentials are resolved by the client from the account id.
#[async_trait]
pub trait ChannelClient: Send + Sync {
    async fn send_message(
        &self,
        account_id: AccountId,
        recipient_id: &str,
        content: &ValueMap,
    ) -> Result<(), ChannelError>;

    async fn get_profile(&self, account_id: AccountId, user_id: &str) -> Result<Profile, ChannelError>;
}

/// FIFO queue for immediate work plus a time-ordered delayed set
#[async_trait]
pub trait TaskQueue: Send + Sync {
    async fn enqueue(&self, task: Task) -> Result<(), QueueError>;

    async fn dequeue(&self) -> Result<Option<Task>, QueueError>;

    /// Park `task` until `ready_at` (epoch seconds)
    async fn schedule_delayed(&self, task: Task, ready_at: i64) -> Result<(), QueueError>;

    /// Remove and return every delayed task with `ready_at <= now`, oldest first.
    /// A task is never returned twice.
    async fn drain_ready(&self, now: i64) -> Result<Vec<Task>, QueueError>;

    /// Release underlying connections.
    ///
    /// Called by whoever owns the queue. Executors and workers sharing it must
    /// not close it, since every later enqueue would fail.
    async fn close(&self) -> Result<(), QueueError> {
        Ok(())
    }
}

/// TTL-bounded mutual exclusion keyed by string
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Take the lock unless someone else holds an unexpired one
    async fn acquire_lock(&self, key: &str, token: &str, ttl: Duration) -> Result<bool, QueueError>;

    /// Drop the lock only if it is still held under `token`
    async fn release_lock(&self, key: &str, token: &str) -> Result<bool, QueueError>;
}
