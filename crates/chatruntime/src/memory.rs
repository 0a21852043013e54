//! In-memory persistence and channel collaborators, used by the CLI
//! simulator and by tests.

use async_trait::async_trait;
use chatcore::{
    AccountId, ChannelClient, ChannelError, ContactId, ContactState, ContactStore,
    ConversationStatus, FlowId, FlowRecord, FlowStore, Profile, StoreError, Trigger, ValueMap,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// Contacts, flows, triggers and conversation status held in process memory
#[derive(Default)]
pub struct MemoryStore {
    contacts: RwLock<HashMap<ContactId, ContactState>>,
    flows: RwLock<HashMap<FlowId, FlowRecord>>,
    triggers: RwLock<Vec<Trigger>>,
    conversations: RwLock<HashMap<ContactId, ConversationStatus>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_contact(&self, contact: ContactState) {
        self.contacts.write().await.insert(contact.id, contact);
    }

    /// Snapshot of a stored contact
    pub async fn contact(&self, id: ContactId) -> Option<ContactState> {
        self.contacts.read().await.get(&id).cloned()
    }

    pub async fn insert_flow(&self, flow: FlowRecord) {
        self.flows.write().await.insert(flow.id, flow);
    }

    pub async fn remove_flow(&self, id: FlowId) -> Option<FlowRecord> {
        self.flows.write().await.remove(&id)
    }

    pub async fn insert_trigger(&self, trigger: Trigger) {
        self.triggers.write().await.push(trigger);
    }

    pub async fn open_conversation(&self, contact_id: ContactId) {
        self.conversations
            .write()
            .await
            .insert(contact_id, ConversationStatus::Open);
    }

    pub async fn conversation_status(&self, contact_id: ContactId) -> Option<ConversationStatus> {
        self.conversations.read().await.get(&contact_id).copied()
    }
}

#[async_trait]
impl ContactStore for MemoryStore {
    async fn load_contact(&self, id: ContactId) -> Result<ContactState, StoreError> {
        self.contact(id)
            .await
            .ok_or_else(|| StoreError::NotFound(format!("contact {}", id)))
    }

    async fn save_contact(&self, contact: &ContactState) -> Result<(), StoreError> {
        self.contacts.write().await.insert(contact.id, contact.clone());
        Ok(())
    }

    async fn set_conversation_status(
        &self,
        contact_id: ContactId,
        status: ConversationStatus,
    ) -> Result<bool, StoreError> {
        let mut conversations = self.conversations.write().await;
        match conversations.get_mut(&contact_id) {
            Some(current) if *current == ConversationStatus::Open => {
                *current = status;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl FlowStore for MemoryStore {
    async fn load_flow(&self, id: FlowId) -> Result<FlowRecord, StoreError> {
        self.flows
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("flow {}", id)))
    }

    async fn load_active_triggers(&self, account_id: AccountId) -> Result<Vec<Trigger>, StoreError> {
        let flows = self.flows.read().await;
        let triggers = self.triggers.read().await;
        Ok(triggers
            .iter()
            .filter(|t| t.is_active())
            .filter(|t| {
                flows
                    .get(&t.flow_id)
                    .map(|f| f.account_id == account_id)
                    .unwrap_or(false)
            })
            .cloned()
            .collect())
    }
}

/// A message handed to the channel
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub account_id: AccountId,
    pub recipient_id: String,
    pub content: ValueMap,
}

/// Channel client that records outbound messages instead of delivering them
#[derive(Default)]
pub struct RecordingChannel {
    sent: RwLock<Vec<SentMessage>>,
    profiles: RwLock<HashMap<String, Profile>>,
    failing: AtomicBool,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<SentMessage> {
        self.sent.read().await.clone()
    }

    pub async fn insert_profile(&self, user_id: impl Into<String>, profile: Profile) {
        self.profiles.write().await.insert(user_id.into(), profile);
    }

    /// Make every following `send_message` fail
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChannelClient for RecordingChannel {
    async fn send_message(
        &self,
        account_id: AccountId,
        recipient_id: &str,
        content: &ValueMap,
    ) -> Result<(), ChannelError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ChannelError::Delivery(format!(
                "recipient {} unreachable",
                recipient_id
            )));
        }
        self.sent.write().await.push(SentMessage {
            account_id,
            recipient_id: recipient_id.to_string(),
            content: content.clone(),
        });
        Ok(())
    }

    async fn get_profile(&self, _account_id: AccountId, user_id: &str) -> Result<Profile, ChannelError> {
        self.profiles
            .read()
            .await
            .get(user_id)
            .cloned()
            .ok_or_else(|| ChannelError::Profile(format!("no profile for {}", user_id)))
    }
}
