use async_trait::async_trait;
use chatcore::{NodeContext, NodeError, NodeHandler, NodeKind, NodeOutcome, Task};
use chrono::Utc;

/// Delay used when a wait node has no `durationSeconds`
pub const DEFAULT_WAIT_SECONDS: i64 = 60;

/// Park the contact and schedule a `continue_flow` task `durationSeconds` from now
pub struct WaitNode {
    default_delay: i64,
}

impl WaitNode {
    pub fn new(default_delay: i64) -> Self {
        Self {
            default_delay: default_delay.max(0),
        }
    }
}

impl Default for WaitNode {
    fn default() -> Self {
        Self::new(DEFAULT_WAIT_SECONDS)
    }
}

#[async_trait]
impl NodeHandler for WaitNode {
    fn node_kind(&self) -> NodeKind {
        NodeKind::Wait
    }

    fn description(&self) -> &str {
        "Continue the flow after a delay"
    }

    async fn execute(&self, ctx: NodeContext<'_>) -> Result<NodeOutcome, NodeError> {
        let delay = ctx
            .node
            .param_f64("durationSeconds")
            .map(|secs| secs.max(0.0) as i64)
            .unwrap_or(self.default_delay);
        // `as` saturates huge durations to i64::MAX; the sum must too
        let ready_at = Utc::now().timestamp().saturating_add(delay);

        let task = Task::continue_flow(ctx.flow_id, ctx.contact.id, ctx.node.id.clone());
        let job_id = task.job_id;
        ctx.services.queue.schedule_delayed(task, ready_at).await?;

        tracing::info!(
            contact_id = %ctx.contact.id,
            job_id = %job_id,
            "Waiting {}s at node {}",
            delay,
            ctx.node.id
        );
        Ok(NodeOutcome::Deferred { job_id, ready_at })
    }
}
