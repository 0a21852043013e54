use crate::condition::select_next;
use crate::locks::ContactLocks;
use crate::matcher::TriggerMatcher;
use crate::registry::NodeRegistry;
use chatcore::{
    AutomationEvent, ContactId, ContactState, DropReason, EventBus, EventKind, FlowError, FlowGraph,
    FlowId, FlowRecord, InboundEvent, JobId, Node, NodeContext, NodeHandler, NodeId, NodeOutcome,
    Services, StoreError, Task, TaskKind,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;

/// What driving one event or task did to the contact
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Postback without a payload
    Ignored,
    /// Contact is idle and no trigger matched
    NoTrigger,
    /// The selected flow exists but is not active
    FlowInactive { flow_id: FlowId },
    Started { flow_id: FlowId, node_id: NodeId },
    Advanced { flow_id: FlowId, node_id: NodeId },
    /// No connection matched; contact is idle again
    Completed { flow_id: FlowId },
    /// Flow or step vanished underneath the contact; contact forced idle, event dropped
    Dropped { flow_id: FlowId, reason: DropReason },
    /// Continuation no longer matches the contact's position
    Stale,
}

/// The per-contact flow state machine.
///
/// Construct one with its collaborators; nothing here is global. All work for
/// a single contact is serialised, whether it arrives from the inbound path or
/// from the worker.
pub struct FlowExecutor {
    services: Services,
    registry: Arc<NodeRegistry>,
    matcher: TriggerMatcher,
    events: Arc<EventBus>,
    locks: ContactLocks,
}

impl FlowExecutor {
    pub fn new(services: Services, registry: Arc<NodeRegistry>, events: Arc<EventBus>) -> Self {
        let matcher = TriggerMatcher::new(services.flows.clone());
        Self {
            services,
            registry,
            matcher,
            events,
            locks: ContactLocks::new(),
        }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Entry point for inbound messages and button clicks
    pub async fn handle_event(&self, event: &InboundEvent) -> Result<Transition, FlowError> {
        if event.kind == EventKind::Postback && event.payload.is_none() {
            tracing::debug!(contact_id = %event.contact_id, "Ignoring postback without payload");
            return Ok(Transition::Ignored);
        }

        let guard = self.locks.lock(event.contact_id).await;
        let mut contact = self.load_contact(event.contact_id).await?;

        let result = match contact.current_flow_id() {
            Some(flow_id) => self.advance(&mut contact, flow_id, event).await,
            None => self.start_from_trigger(&mut contact, event).await,
        };

        contact.last_interaction_at = Some(event.timestamp);
        self.services.contacts.save_contact(&contact).await?;

        drop(guard);
        self.locks.prune();
        result
    }

    /// Entry point for tasks pulled off the queue by a worker
    pub async fn execute_task(&self, task: &Task) -> Result<Transition, FlowError> {
        let guard = self.locks.lock(task.contact_id()).await;
        let mut contact = self.load_contact(task.contact_id()).await?;

        let result = match task.kind() {
            TaskKind::ExecuteFlow => self.start_flow(&mut contact, task.flow_id).await,
            TaskKind::ContinueFlow => self.resume(&mut contact, task).await,
        };

        self.services.contacts.save_contact(&contact).await?;

        drop(guard);
        self.locks.prune();
        result
    }

    /// Queue an immediate start of `flow_id` for a contact
    pub async fn queue_flow_execution(
        &self,
        flow_id: FlowId,
        contact_id: ContactId,
    ) -> Result<JobId, FlowError> {
        let task = Task::execute_flow(flow_id, contact_id);
        let job_id = task.job_id;
        self.services.queue.enqueue(task).await?;

        tracing::info!(job_id = %job_id, flow_id = %flow_id, "Queued flow execution");
        self.events.emit(AutomationEvent::TaskScheduled {
            job_id,
            flow_id,
            ready_at: None,
            timestamp: Utc::now(),
        });
        Ok(job_id)
    }

    async fn start_from_trigger(
        &self,
        contact: &mut ContactState,
        event: &InboundEvent,
    ) -> Result<Transition, FlowError> {
        let trigger = self
            .matcher
            .match_trigger(event.account_id, event.text(), contact)
            .await?;

        match trigger {
            Some(trigger) => self.start_flow(contact, trigger.flow_id).await,
            None => {
                tracing::debug!(contact_id = %contact.id, "No trigger matched");
                Ok(Transition::NoTrigger)
            }
        }
    }

    /// Put the contact on the flow's start node and execute it
    async fn start_flow(
        &self,
        contact: &mut ContactState,
        flow_id: FlowId,
    ) -> Result<Transition, FlowError> {
        let (record, graph) = self.load_graph(flow_id).await?;
        if !record.is_active() {
            tracing::info!(flow_id = %flow_id, "Flow '{}' is not active; not starting", record.name);
            return Ok(Transition::FlowInactive { flow_id });
        }

        let start = graph.start_node();
        let handler = self.resolve_handler(contact, start)?;

        if let Some(previous) = contact.leave_flow() {
            tracing::info!(contact_id = %contact.id, flow_id = %previous, "Replacing running flow");
            self.events.emit(AutomationEvent::FlowAbandoned {
                contact_id: contact.id,
                flow_id: previous,
                reason: DropReason::Replaced,
                timestamp: Utc::now(),
            });
        }

        contact.enter_flow(flow_id, start.id.clone());
        self.services.contacts.save_contact(contact).await?;

        tracing::info!(contact_id = %contact.id, flow_id = %flow_id, node_id = %start.id, "Flow started");
        self.events.emit(AutomationEvent::FlowStarted {
            contact_id: contact.id,
            flow_id,
            node_id: start.id.clone(),
            timestamp: Utc::now(),
        });

        self.run_node(contact, flow_id, start, handler).await?;
        Ok(Transition::Started {
            flow_id,
            node_id: start.id.clone(),
        })
    }

    /// Follow the first matching connection of the current step, or finish the flow
    async fn advance(
        &self,
        contact: &mut ContactState,
        flow_id: FlowId,
        event: &InboundEvent,
    ) -> Result<Transition, FlowError> {
        let graph = match self.load_graph(flow_id).await {
            Ok((_, graph)) => graph,
            Err(FlowError::FlowNotFound(_)) => {
                return self.abandon(contact, flow_id, DropReason::FlowNotFound).await;
            }
            Err(e) => return Err(e),
        };

        let current = match contact.current_step_node_id().and_then(|id| graph.node(id)) {
            Some(node) => node,
            None => return self.abandon(contact, flow_id, DropReason::NodeNotFound).await,
        };

        let Some(target_id) = select_next(current, event) else {
            contact.leave_flow();
            self.services.contacts.save_contact(contact).await?;

            tracing::info!(contact_id = %contact.id, flow_id = %flow_id, "Flow completed");
            self.events.emit(AutomationEvent::FlowCompleted {
                contact_id: contact.id,
                flow_id,
                timestamp: Utc::now(),
            });
            return Ok(Transition::Completed { flow_id });
        };

        let target = graph
            .node(target_id)
            .ok_or_else(|| FlowError::NodeNotFound(target_id.to_string()))?;
        let handler = self.resolve_handler(contact, target)?;

        contact.move_to(target.id.clone());
        self.services.contacts.save_contact(contact).await?;
        tracing::debug!(
            contact_id = %contact.id,
            "Advanced from '{}' to '{}'",
            current.id,
            target.id
        );

        self.run_node(contact, flow_id, target, handler).await?;
        Ok(Transition::Advanced {
            flow_id,
            node_id: target.id.clone(),
        })
    }

    /// Continue a contact parked on a wait node, if this task is the one it awaits
    async fn resume(&self, contact: &mut ContactState, task: &Task) -> Result<Transition, FlowError> {
        let on_track = contact.current_flow_id() == Some(task.flow_id)
            && contact.awaiting_job_id() == Some(task.job_id)
            && match task.trigger_data.resume_node_id.as_deref() {
                Some(node_id) => contact.current_step_node_id() == Some(node_id),
                None => true,
            };

        if !on_track {
            tracing::debug!(
                contact_id = %contact.id,
                job_id = %task.job_id,
                "Contact moved on since the wait was scheduled; dropping continuation"
            );
            return Ok(Transition::Stale);
        }

        let event = InboundEvent::timer(contact);
        self.advance(contact, task.flow_id, &event).await
    }

    async fn abandon(
        &self,
        contact: &mut ContactState,
        flow_id: FlowId,
        reason: DropReason,
    ) -> Result<Transition, FlowError> {
        contact.leave_flow();
        self.services.contacts.save_contact(contact).await?;

        tracing::warn!(contact_id = %contact.id, flow_id = %flow_id, "Dropping contact from flow: {:?}", reason);
        self.events.emit(AutomationEvent::FlowAbandoned {
            contact_id: contact.id,
            flow_id,
            reason,
            timestamp: Utc::now(),
        });
        Ok(Transition::Dropped { flow_id, reason })
    }

    async fn run_node(
        &self,
        contact: &mut ContactState,
        flow_id: FlowId,
        node: &Node,
        handler: Arc<dyn NodeHandler>,
    ) -> Result<NodeOutcome, FlowError> {
        let start = Instant::now();
        let ctx = NodeContext {
            flow_id,
            node,
            contact: &mut *contact,
            services: &self.services,
        };

        match handler.execute(ctx).await {
            Ok(outcome) => {
                if let NodeOutcome::Deferred { job_id, .. } = &outcome {
                    contact.await_job(*job_id);
                }
                self.services.contacts.save_contact(contact).await?;

                if let NodeOutcome::Deferred { job_id, ready_at } = &outcome {
                    self.events.emit(AutomationEvent::TaskScheduled {
                        job_id: *job_id,
                        flow_id,
                        ready_at: Some(*ready_at),
                        timestamp: Utc::now(),
                    });
                }

                let duration_ms = start.elapsed().as_millis() as u64;
                tracing::debug!("Node {} ({}) executed in {}ms", node.id, node.kind, duration_ms);
                self.events.emit(AutomationEvent::NodeExecuted {
                    contact_id: contact.id,
                    flow_id,
                    node_id: node.id.clone(),
                    node_type: node.kind.to_string(),
                    duration_ms,
                    timestamp: Utc::now(),
                });
                Ok(outcome)
            }
            Err(e) => {
                tracing::error!(contact_id = %contact.id, "Node {} failed: {}", node.id, e);
                self.events.emit(AutomationEvent::NodeFailed {
                    contact_id: contact.id,
                    flow_id,
                    node_id: node.id.clone(),
                    error: e.to_string(),
                    timestamp: Utc::now(),
                });
                Err(e.into())
            }
        }
    }

    /// Look up the handler before any state is touched
    fn resolve_handler(
        &self,
        contact: &ContactState,
        node: &Node,
    ) -> Result<Arc<dyn NodeHandler>, FlowError> {
        self.registry.handler(&node.kind).map_err(|e| {
            tracing::error!(
                contact_id = %contact.id,
                "Cannot execute node {}: {}; contact left in place",
                node.id,
                e
            );
            FlowError::from(e)
        })
    }

    async fn load_contact(&self, id: ContactId) -> Result<ContactState, FlowError> {
        match self.services.contacts.load_contact(id).await {
            Ok(contact) => Ok(contact),
            Err(StoreError::NotFound(_)) => Err(FlowError::ContactNotFound(id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Load and re-parse a flow; a missing flow maps to `FlowNotFound`
    async fn load_graph(&self, flow_id: FlowId) -> Result<(FlowRecord, FlowGraph), FlowError> {
        let record = match self.services.flows.load_flow(flow_id).await {
            Ok(record) => record,
            Err(StoreError::NotFound(_)) => return Err(FlowError::FlowNotFound(flow_id)),
            Err(e) => return Err(e.into()),
        };
        let graph = record.graph()?;
        Ok((record, graph))
    }
}
