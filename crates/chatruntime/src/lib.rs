//! Automation runtime
//!
//! The flow state machine, trigger matching, condition evaluation and variable
//! rendering, plus the worker that replays queued tasks. In-memory
//! collaborators are provided for single-process use and tests.

pub mod condition;
mod executor;
mod locks;
mod matcher;
pub mod memory;
mod queue;
mod registry;
pub mod render;
mod runtime;
mod worker;

pub use executor::{FlowExecutor, Transition};
pub use locks::ContactLocks;
pub use matcher::{order_triggers, trigger_matches, TriggerMatcher};
pub use memory::{MemoryStore, RecordingChannel, SentMessage};
pub use queue::{MemoryQueue, DEFAULT_QUEUE_NAME};
pub use registry::NodeRegistry;
pub use runtime::{ChatRuntime, RuntimeConfig};
pub use worker::{JobOutcome, Worker, WorkerConfig, WorkerStats};
