use async_trait::async_trait;
use chatcore::{NodeContext, NodeError, NodeHandler, NodeKind, NodeOutcome};

/// Add `tagName` to the contact's tag set. Tagging twice is a no-op.
pub struct TagContactNode;

#[async_trait]
impl NodeHandler for TagContactNode {
    fn node_kind(&self) -> NodeKind {
        NodeKind::TagContact
    }

    fn description(&self) -> &str {
        "Add a tag to the contact"
    }

    async fn execute(&self, ctx: NodeContext<'_>) -> Result<NodeOutcome, NodeError> {
        let tag = ctx
            .node
            .param_str("tagName")
            .map(str::trim)
            .filter(|t| !t.is_empty());

        match tag {
            Some(tag) => {
                if ctx.contact.add_tag(tag) {
                    tracing::debug!(contact_id = %ctx.contact.id, "Tagged contact '{}'", tag);
                }
            }
            None => tracing::warn!("Node {} has no tagName; skipping", ctx.node.id),
        }
        Ok(NodeOutcome::Completed)
    }
}
