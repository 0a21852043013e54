use crate::memory::{MemoryStore, RecordingChannel};
use crate::queue::{MemoryQueue, DEFAULT_QUEUE_NAME};
use crate::{FlowExecutor, NodeRegistry, Worker, WorkerConfig};
use chatcore::{AutomationEvent, EventBus, QueueError, Services, TaskQueue};
use std::sync::Arc;

/// Single-process runtime wiring the executor to in-memory collaborators
pub struct ChatRuntime {
    executor: Arc<FlowExecutor>,
    store: Arc<MemoryStore>,
    channel: Arc<RecordingChannel>,
    queue: Arc<MemoryQueue>,
    event_bus: Arc<EventBus>,
}

impl ChatRuntime {
    /// Create a runtime with default settings
    pub fn new(registry: NodeRegistry) -> Self {
        Self::with_config(registry, RuntimeConfig::default())
    }

    pub fn with_config(registry: NodeRegistry, config: RuntimeConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let channel = Arc::new(RecordingChannel::new());
        let queue = Arc::new(MemoryQueue::new(config.queue_name));
        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));

        let services = Services {
            contacts: store.clone(),
            flows: store.clone(),
            channel: channel.clone(),
            queue: queue.clone(),
        };
        let executor = Arc::new(FlowExecutor::new(
            services,
            Arc::new(registry),
            event_bus.clone(),
        ));

        Self {
            executor,
            store,
            channel,
            queue,
            event_bus,
        }
    }

    pub fn executor(&self) -> &Arc<FlowExecutor> {
        &self.executor
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    pub fn channel(&self) -> &Arc<RecordingChannel> {
        &self.channel
    }

    pub fn queue(&self) -> &Arc<MemoryQueue> {
        &self.queue
    }

    /// A worker over this runtime's queue, which also serves as the lock store.
    ///
    /// The runtime keeps ownership of the queue, so stopping the worker leaves
    /// it open for the executor and any other worker.
    pub fn worker(&self, config: WorkerConfig) -> Worker {
        Worker::new(
            config,
            self.executor.clone(),
            self.queue.clone(),
            self.queue.clone(),
        )
    }

    /// Close the queue once every worker has stopped
    pub async fn shutdown(&self) -> Result<(), QueueError> {
        self.queue.close().await
    }

    /// Subscribe to automation events
    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<AutomationEvent> {
        self.event_bus.subscribe()
    }
}

/// Configuration for the runtime
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub event_buffer_size: usize,
    pub queue_name: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            event_buffer_size: 1000,
            queue_name: DEFAULT_QUEUE_NAME.to_string(),
        }
    }
}
