use async_trait::async_trait;
use chatcore::{NodeContext, NodeError, NodeHandler, NodeKind, NodeOutcome, Value, ValueMap};
use chatruntime::render::render_text;

/// Ask the contact for input. The reply is validated on the way out of this
/// step by `input_valid` connections, using the node's `inputType`.
pub struct GetInputNode;

#[async_trait]
impl NodeHandler for GetInputNode {
    fn node_kind(&self) -> NodeKind {
        NodeKind::GetInput
    }

    fn description(&self) -> &str {
        "Prompt the contact and wait for a reply"
    }

    async fn execute(&self, ctx: NodeContext<'_>) -> Result<NodeOutcome, NodeError> {
        let Some(prompt) = ctx.node.param_str("prompt").filter(|p| !p.trim().is_empty()) else {
            return Ok(NodeOutcome::Completed);
        };

        let mut content = ValueMap::new();
        content.insert("text".to_string(), Value::String(render_text(prompt, ctx.contact)));
        ctx.services
            .channel
            .send_message(ctx.contact.account_id, &ctx.contact.channel_user_id, &content)
            .await?;
        Ok(NodeOutcome::Completed)
    }
}
