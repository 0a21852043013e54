use async_trait::async_trait;
use chatcore::{ConversationStatus, NodeContext, NodeError, NodeHandler, NodeKind, NodeOutcome};

/// Hand the open conversation over to a human agent.
///
/// Automation does not pause: the contact stays on this step and the next
/// inbound event follows its connections as usual.
pub struct HumanTakeoverNode;

#[async_trait]
impl NodeHandler for HumanTakeoverNode {
    fn node_kind(&self) -> NodeKind {
        NodeKind::HumanTakeover
    }

    fn description(&self) -> &str {
        "Mark the open conversation as pending a human agent"
    }

    async fn execute(&self, ctx: NodeContext<'_>) -> Result<NodeOutcome, NodeError> {
        let updated = ctx
            .services
            .contacts
            .set_conversation_status(ctx.contact.id, ConversationStatus::PendingHuman)
            .await?;

        if updated {
            tracing::info!(contact_id = %ctx.contact.id, "Conversation handed to a human");
        } else {
            tracing::debug!(contact_id = %ctx.contact.id, "No open conversation to hand over");
        }
        Ok(NodeOutcome::Completed)
    }
}
