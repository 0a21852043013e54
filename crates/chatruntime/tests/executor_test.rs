// crates/chatruntime/tests/executor_test.rs

use async_trait::async_trait;
use chatcore::{
    AutomationEvent, Condition, Connection, ContactState, DropReason, FlowError, FlowGraph,
    FlowRecord, FlowStatus, InboundEvent, LockStore, Node, NodeContext, NodeError, NodeHandler,
    NodeKind, NodeOutcome, Task, TaskQueue, Trigger,
};
use chatruntime::render::render;
use chatruntime::{
    ChatRuntime, JobOutcome, MemoryQueue, NodeRegistry, Transition, Worker, WorkerConfig,
};
use chrono::Utc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Sends the rendered node content to the contact
struct SendNode;

#[async_trait]
impl NodeHandler for SendNode {
    fn node_kind(&self) -> NodeKind {
        NodeKind::Message
    }

    async fn execute(&self, ctx: NodeContext<'_>) -> Result<NodeOutcome, NodeError> {
        let content = render(&ctx.node.content, ctx.contact);
        ctx.services
            .channel
            .send_message(ctx.contact.account_id, &ctx.contact.channel_user_id, &content)
            .await?;
        Ok(NodeOutcome::Completed)
    }
}

/// Does nothing; stands in for input prompts
struct NoopNode;

#[async_trait]
impl NodeHandler for NoopNode {
    fn node_kind(&self) -> NodeKind {
        NodeKind::GetInput
    }

    async fn execute(&self, _ctx: NodeContext<'_>) -> Result<NodeOutcome, NodeError> {
        Ok(NodeOutcome::Completed)
    }
}

/// Parks the contact with a continuation that is already due
struct ParkNode;

#[async_trait]
impl NodeHandler for ParkNode {
    fn node_kind(&self) -> NodeKind {
        NodeKind::Wait
    }

    async fn execute(&self, ctx: NodeContext<'_>) -> Result<NodeOutcome, NodeError> {
        let task = Task::continue_flow(ctx.flow_id, ctx.contact.id, ctx.node.id.clone());
        let job_id = task.job_id;
        let ready_at = Utc::now().timestamp() - 1;
        ctx.services.queue.schedule_delayed(task, ready_at).await?;
        Ok(NodeOutcome::Deferred { job_id, ready_at })
    }
}

/// Pauses mid-node and tags the contact once per visit, tracking overlap
#[derive(Default)]
struct SlowNode {
    active: AtomicUsize,
    peak: AtomicUsize,
    visits: AtomicUsize,
}

#[async_trait]
impl NodeHandler for SlowNode {
    fn node_kind(&self) -> NodeKind {
        NodeKind::Custom("slow".into())
    }

    async fn execute(&self, ctx: NodeContext<'_>) -> Result<NodeOutcome, NodeError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;

        let visit = self.visits.fetch_add(1, Ordering::SeqCst) + 1;
        ctx.contact.add_tag(format!("visit-{}", visit));
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(NodeOutcome::Completed)
    }
}

fn runtime() -> ChatRuntime {
    let mut registry = NodeRegistry::new();
    registry.register(Arc::new(SendNode));
    registry.register(Arc::new(NoopNode));
    registry.register(Arc::new(ParkNode));
    ChatRuntime::new(registry)
}

fn message(id: &str, text: &str) -> Node {
    Node::new(id, NodeKind::Message).with_content("text", text)
}

/// Greeting, then a button choice between two replies
fn greeting_graph() -> FlowGraph {
    FlowGraph::new(
        "n1",
        vec![
            message("n1", "Hello {{contact.firstName}}!")
                .connect(Connection::when("yes", Condition::ButtonPayload("YES".into())))
                .connect(Connection::when("no", Condition::ButtonPayload("NO".into()))),
            message("yes", "Great"),
            message("no", "Maybe later"),
        ],
    )
    .unwrap()
}

async fn seed(rt: &ChatRuntime, graph: &FlowGraph, keyword: &str) -> (FlowRecord, ContactState) {
    let contact = ContactState::new(Uuid::new_v4(), "ig-user-1").with_name("Sam", None);
    let flow = FlowRecord::from_graph(contact.account_id, "greeting", graph).unwrap();
    rt.store().insert_flow(flow.clone()).await;
    rt.store().insert_trigger(Trigger::dm_keyword(flow.id, keyword)).await;
    rt.store().insert_contact(contact.clone()).await;
    (flow, contact)
}

async fn texts(rt: &ChatRuntime) -> Vec<String> {
    rt.channel()
        .sent()
        .await
        .into_iter()
        .filter_map(|m| m.content.get("text").and_then(|v| v.as_str()).map(String::from))
        .collect()
}

#[tokio::test]
async fn test_keyword_starts_flow_and_renders_greeting() {
    let rt = runtime();
    let (flow, contact) = seed(&rt, &greeting_graph(), "hi").await;

    let result = rt
        .executor()
        .handle_event(&InboundEvent::message(&contact, "Hi there"))
        .await
        .unwrap();

    assert_eq!(
        result,
        Transition::Started {
            flow_id: flow.id,
            node_id: "n1".into()
        }
    );
    assert_eq!(texts(&rt).await, vec!["Hello Sam!".to_string()]);

    let stored = rt.store().contact(contact.id).await.unwrap();
    assert_eq!(stored.current_flow_id(), Some(flow.id));
    assert_eq!(stored.current_step_node_id(), Some("n1"));
    assert!(stored.last_interaction_at.is_some());
}

#[tokio::test]
async fn test_button_payload_selects_branch() {
    let rt = runtime();
    let (flow, contact) = seed(&rt, &greeting_graph(), "hi").await;
    let executor = rt.executor();

    executor.handle_event(&InboundEvent::message(&contact, "hi")).await.unwrap();
    let result = executor
        .handle_event(&InboundEvent::postback(&contact, "NO"))
        .await
        .unwrap();

    assert_eq!(
        result,
        Transition::Advanced {
            flow_id: flow.id,
            node_id: "no".into()
        }
    );
    assert_eq!(texts(&rt).await.last().map(String::as_str), Some("Maybe later"));
}

#[tokio::test]
async fn test_unmatched_event_completes_flow() {
    let rt = runtime();
    let (flow, contact) = seed(&rt, &greeting_graph(), "hi").await;
    let mut events = rt.subscribe_events();
    let executor = rt.executor();

    executor.handle_event(&InboundEvent::message(&contact, "hi")).await.unwrap();
    // Payloads compare case-sensitively
    let result = executor
        .handle_event(&InboundEvent::postback(&contact, "yes"))
        .await
        .unwrap();

    assert_eq!(result, Transition::Completed { flow_id: flow.id });
    let stored = rt.store().contact(contact.id).await.unwrap();
    assert!(stored.is_idle());
    assert_eq!(stored.current_step_node_id(), None);

    let mut completed = false;
    while let Ok(event) = events.try_recv() {
        if let AutomationEvent::FlowCompleted { flow_id, .. } = event {
            completed = flow_id == flow.id;
        }
    }
    assert!(completed, "FlowCompleted should be emitted");
}

#[tokio::test]
async fn test_no_trigger_leaves_contact_idle() {
    let rt = runtime();
    let (_, contact) = seed(&rt, &greeting_graph(), "hi").await;

    let result = rt
        .executor()
        .handle_event(&InboundEvent::message(&contact, "what is this"))
        .await
        .unwrap();

    assert_eq!(result, Transition::NoTrigger);
    assert!(rt.channel().sent().await.is_empty());
    assert!(rt.store().contact(contact.id).await.unwrap().is_idle());
}

#[tokio::test]
async fn test_postback_without_payload_is_ignored() {
    let rt = runtime();
    let (_, contact) = seed(&rt, &greeting_graph(), "hi").await;

    let mut event = InboundEvent::postback(&contact, "x");
    event.payload = None;

    let result = rt.executor().handle_event(&event).await.unwrap();
    assert_eq!(result, Transition::Ignored);
    assert!(rt.store().contact(contact.id).await.unwrap().last_interaction_at.is_none());
}

#[tokio::test]
async fn test_unknown_node_type_leaves_state_unchanged() {
    let rt = runtime();
    let graph = FlowGraph::new(
        "n1",
        vec![
            message("n1", "Hi").connect(Connection::to("n2")),
            Node::new("n2", "teleport"),
        ],
    )
    .unwrap();
    let (flow, contact) = seed(&rt, &graph, "hi").await;
    let executor = rt.executor();

    executor.handle_event(&InboundEvent::message(&contact, "hi")).await.unwrap();
    let err = executor
        .handle_event(&InboundEvent::message(&contact, "anything"))
        .await
        .unwrap_err();

    assert!(matches!(err, FlowError::Node(NodeError::InvalidNodeType(ref t)) if t == "teleport"));
    let stored = rt.store().contact(contact.id).await.unwrap();
    assert_eq!(stored.current_flow_id(), Some(flow.id));
    assert_eq!(stored.current_step_node_id(), Some("n1"));
}

#[tokio::test]
async fn test_channel_failure_still_advances_pointer() {
    let rt = runtime();
    let graph = FlowGraph::new(
        "n1",
        vec![
            message("n1", "Hi").connect(Connection::to("n2")),
            message("n2", "Second"),
        ],
    )
    .unwrap();
    let (_, contact) = seed(&rt, &graph, "hi").await;
    let executor = rt.executor();

    executor.handle_event(&InboundEvent::message(&contact, "hi")).await.unwrap();
    rt.channel().set_failing(true);

    let err = executor
        .handle_event(&InboundEvent::message(&contact, "next"))
        .await
        .unwrap_err();

    assert!(matches!(err, FlowError::Node(NodeError::Channel(_))));
    let stored = rt.store().contact(contact.id).await.unwrap();
    assert_eq!(stored.current_step_node_id(), Some("n2"));
}

#[tokio::test]
async fn test_deleted_flow_drops_contact_to_idle() {
    let rt = runtime();
    let (flow, contact) = seed(&rt, &greeting_graph(), "hi").await;
    let executor = rt.executor();

    executor.handle_event(&InboundEvent::message(&contact, "hi")).await.unwrap();
    rt.store().remove_flow(flow.id).await;

    let result = executor
        .handle_event(&InboundEvent::postback(&contact, "YES"))
        .await
        .unwrap();

    assert_eq!(
        result,
        Transition::Dropped {
            flow_id: flow.id,
            reason: DropReason::FlowNotFound
        }
    );
    assert_eq!(rt.channel().sent().await.len(), 1);
    assert!(rt.store().contact(contact.id).await.unwrap().is_idle());
}

#[tokio::test]
async fn test_missing_step_drops_contact_to_idle() {
    let rt = runtime();
    let (flow, mut contact) = seed(&rt, &greeting_graph(), "hi").await;
    contact.enter_flow(flow.id, "removed-node");
    rt.store().insert_contact(contact.clone()).await;

    let result = rt
        .executor()
        .handle_event(&InboundEvent::message(&contact, "hello"))
        .await
        .unwrap();

    assert_eq!(
        result,
        Transition::Dropped {
            flow_id: flow.id,
            reason: DropReason::NodeNotFound
        }
    );
    assert!(rt.channel().sent().await.is_empty());
    assert!(rt.store().contact(contact.id).await.unwrap().is_idle());
}

#[tokio::test]
async fn test_malformed_flow_is_surfaced_without_side_effects() {
    let rt = runtime();
    let contact = ContactState::new(Uuid::new_v4(), "ig-user-2");
    let flow = FlowRecord::new(
        contact.account_id,
        "broken",
        serde_json::json!({
            "startNodeId": "n1",
            "nodes": [{"id": "n1", "type": "message", "connections": [{"targetNodeId": "nowhere"}]}]
        }),
    );
    rt.store().insert_flow(flow.clone()).await;
    rt.store().insert_trigger(Trigger::dm_keyword(flow.id, "hi")).await;
    rt.store().insert_contact(contact.clone()).await;

    let err = rt
        .executor()
        .handle_event(&InboundEvent::message(&contact, "hi"))
        .await
        .unwrap_err();

    assert!(matches!(err, FlowError::MalformedFlow(_)));
    assert!(rt.channel().sent().await.is_empty());
    assert!(rt.store().contact(contact.id).await.unwrap().is_idle());
}

#[tokio::test]
async fn test_inactive_flow_is_not_started() {
    let rt = runtime();
    let contact = ContactState::new(Uuid::new_v4(), "ig-user-3");
    let flow = FlowRecord::from_graph(contact.account_id, "draft", &greeting_graph())
        .unwrap()
        .with_status(FlowStatus::Draft);
    rt.store().insert_flow(flow.clone()).await;
    rt.store().insert_trigger(Trigger::dm_keyword(flow.id, "hi")).await;
    rt.store().insert_contact(contact.clone()).await;

    let result = rt
        .executor()
        .handle_event(&InboundEvent::message(&contact, "hi"))
        .await
        .unwrap();

    assert_eq!(result, Transition::FlowInactive { flow_id: flow.id });
    assert!(rt.store().contact(contact.id).await.unwrap().is_idle());
}

#[tokio::test]
async fn test_queued_execution_runs_through_worker() {
    let rt = runtime();
    let (flow, contact) = seed(&rt, &greeting_graph(), "hi").await;
    let worker = rt.worker(WorkerConfig::default());

    rt.executor()
        .queue_flow_execution(flow.id, contact.id)
        .await
        .unwrap();
    let outcomes = worker.poll_once().await.unwrap();

    assert_eq!(outcomes, vec![JobOutcome::Completed]);
    assert_eq!(texts(&rt).await, vec!["Hello Sam!".to_string()]);
    assert_eq!(
        rt.store().contact(contact.id).await.unwrap().current_step_node_id(),
        Some("n1")
    );
}

#[tokio::test]
async fn test_wait_continuation_resumes_and_goes_stale() {
    let rt = runtime();
    let graph = FlowGraph::new(
        "n1",
        vec![
            Node::new("n1", NodeKind::Wait).connect(Connection::to("n2")),
            message("n2", "Thanks for waiting"),
        ],
    )
    .unwrap();
    let (flow, contact) = seed(&rt, &graph, "hi").await;
    let worker = rt.worker(WorkerConfig::default());

    rt.executor()
        .handle_event(&InboundEvent::message(&contact, "hi"))
        .await
        .unwrap();
    assert_eq!(rt.queue().delayed_len().await, 1);

    let outcomes = worker.poll_once().await.unwrap();
    assert_eq!(outcomes, vec![JobOutcome::Completed]);
    assert_eq!(texts(&rt).await, vec!["Thanks for waiting".to_string()]);

    // A continuation for a step the contact already left is dropped
    let stale = Task::continue_flow(flow.id, contact.id, "n1");
    let result = rt.executor().execute_task(&stale).await.unwrap();
    assert_eq!(result, Transition::Stale);
    assert_eq!(
        rt.store().contact(contact.id).await.unwrap().current_step_node_id(),
        Some("n2")
    );
}

#[tokio::test]
async fn test_inbound_event_and_task_for_one_contact_run_one_at_a_time() {
    let slow = Arc::new(SlowNode::default());
    let mut registry = NodeRegistry::new();
    registry.register(slow.clone());
    let rt = ChatRuntime::new(registry);

    let graph = FlowGraph::new(
        "s",
        vec![Node::new("s", NodeKind::Custom("slow".into())).connect(Connection::to("s"))],
    )
    .unwrap();
    let (flow, contact) = seed(&rt, &graph, "go").await;
    let executor = rt.executor();
    executor.handle_event(&InboundEvent::message(&contact, "go")).await.unwrap();

    let reply = InboundEvent::message(&contact, "again");
    let restart = Task::execute_flow(flow.id, contact.id);
    let (advanced, restarted) = tokio::join!(executor.handle_event(&reply), executor.execute_task(&restart));

    assert_eq!(advanced.unwrap(), Transition::Advanced { flow_id: flow.id, node_id: "s".into() });
    assert_eq!(restarted.unwrap(), Transition::Started { flow_id: flow.id, node_id: "s".into() });
    assert_eq!(slow.peak.load(Ordering::SeqCst), 1);

    // Each run saw the other's save, so no tag was lost
    let stored = rt.store().contact(contact.id).await.unwrap();
    let tags: Vec<&str> = stored.tags.iter().map(String::as_str).collect();
    assert_eq!(tags, vec!["visit-1", "visit-2", "visit-3"]);
}

#[tokio::test]
async fn test_worker_skips_locked_job_without_requeue() {
    let rt = runtime();
    let (flow, contact) = seed(&rt, &greeting_graph(), "hi").await;
    let worker = rt.worker(WorkerConfig::default());

    let task = Task::execute_flow(flow.id, contact.id);
    rt.queue()
        .acquire_lock(&task.lock_key(), "other-worker", Duration::from_secs(300))
        .await
        .unwrap();
    rt.queue().enqueue(task).await.unwrap();

    let outcomes = worker.poll_once().await.unwrap();
    assert_eq!(outcomes, vec![JobOutcome::Skipped]);
    assert_eq!(rt.queue().len().await, 0);
    assert!(rt.channel().sent().await.is_empty());
}

#[tokio::test]
async fn test_worker_shutdown_leaves_shared_queue_open() {
    let rt = runtime();
    let graph = FlowGraph::new(
        "n1",
        vec![
            Node::new("n1", NodeKind::Wait).connect(Connection::to("n2")),
            message("n2", "Thanks for waiting"),
        ],
    )
    .unwrap();
    let (_, contact) = seed(&rt, &graph, "hi").await;
    let worker = Arc::new(rt.worker(WorkerConfig {
        poll_interval: Duration::from_millis(10),
        ..WorkerConfig::default()
    }));
    let shutdown = CancellationToken::new();

    let handle = {
        let worker = worker.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { worker.run(shutdown).await })
    };

    tokio::time::sleep(Duration::from_millis(30)).await;
    shutdown.cancel();

    let stats = handle.await.unwrap().unwrap();
    assert_eq!(stats.completed, 0);
    assert!(worker.in_flight().is_empty());
    assert!(!rt.queue().is_closed());

    // The executor can still schedule waits after the worker is gone
    rt.executor()
        .handle_event(&InboundEvent::message(&contact, "hi"))
        .await
        .unwrap();
    assert_eq!(rt.queue().delayed_len().await, 1);

    rt.shutdown().await.unwrap();
    assert!(rt.queue().is_closed());
}

#[tokio::test]
async fn test_owning_worker_closes_its_queue() {
    let rt = runtime();
    let queue = Arc::new(MemoryQueue::new("private"));
    let worker = Worker::new(
        WorkerConfig {
            poll_interval: Duration::from_millis(10),
            ..WorkerConfig::default()
        },
        rt.executor().clone(),
        queue.clone(),
        queue.clone(),
    )
    .owning_queue();
    let shutdown = CancellationToken::new();
    shutdown.cancel();

    worker.run(shutdown).await.unwrap();
    assert!(queue.is_closed());
    assert!(!rt.queue().is_closed());
}
