use async_trait::async_trait;
use chatcore::{NodeContext, NodeError, NodeHandler, NodeKind, NodeOutcome};
use chatruntime::render::render;

/// Send the node's content to the contact, with placeholders filled in
pub struct MessageNode;

#[async_trait]
impl NodeHandler for MessageNode {
    fn node_kind(&self) -> NodeKind {
        NodeKind::Message
    }

    fn description(&self) -> &str {
        "Send a message to the contact"
    }

    async fn execute(&self, ctx: NodeContext<'_>) -> Result<NodeOutcome, NodeError> {
        if ctx.node.content.is_empty() {
            return Err(NodeError::MissingConfig {
                node: ctx.node.id.clone(),
                field: "content".to_string(),
            });
        }

        let content = render(&ctx.node.content, ctx.contact);
        ctx.services
            .channel
            .send_message(ctx.contact.account_id, &ctx.contact.channel_user_id, &content)
            .await?;

        tracing::debug!(contact_id = %ctx.contact.id, "Sent message from node {}", ctx.node.id);
        Ok(NodeOutcome::Completed)
    }
}
