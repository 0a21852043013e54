use chatcore::{AccountId, ContactState, FlowStore, StoreError, Trigger, TriggerKind};
use std::sync::Arc;

/// Selects the flow to start for an idle contact
#[derive(Clone)]
pub struct TriggerMatcher {
    flows: Arc<dyn FlowStore>,
}

impl TriggerMatcher {
    pub fn new(flows: Arc<dyn FlowStore>) -> Self {
        Self { flows }
    }

    /// First active trigger of the account matching the inbound text, in precedence order
    pub async fn match_trigger(
        &self,
        account_id: AccountId,
        inbound_text: &str,
        contact: &ContactState,
    ) -> Result<Option<Trigger>, StoreError> {
        let mut triggers = self.flows.load_active_triggers(account_id).await?;
        triggers.retain(Trigger::is_active);
        order_triggers(&mut triggers);

        let text = inbound_text.to_lowercase();
        let found = triggers
            .into_iter()
            .find(|trigger| trigger_matches(trigger, &text, contact));

        if let Some(trigger) = &found {
            tracing::debug!(
                trigger_id = %trigger.id,
                flow_id = %trigger.flow_id,
                "Matched {:?} trigger",
                trigger.kind
            );
        }
        Ok(found)
    }
}

/// Deterministic precedence: explicit priority ascending, then unprioritised
/// triggers, each group by creation time and finally id.
pub fn order_triggers(triggers: &mut [Trigger]) {
    triggers.sort_by_key(|t| (t.priority.is_none(), t.priority.unwrap_or(0), t.created_at, t.id));
}

/// `text` must already be lower-cased
pub fn trigger_matches(trigger: &Trigger, text: &str, contact: &ContactState) -> bool {
    match trigger.kind {
        TriggerKind::DmKeyword => trigger
            .keyword
            .as_deref()
            .map(str::trim)
            .filter(|kw| !kw.is_empty())
            .map(|kw| text.contains(&kw.to_lowercase()))
            .unwrap_or(false),
        TriggerKind::WelcomeMessage => contact.last_interaction_at.is_none(),
        // Comment and story events never reach the DM path
        TriggerKind::CommentKeyword | TriggerKind::StoryMention => false,
    }
}
