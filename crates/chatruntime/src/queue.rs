//! In-process task queue and lock store.
//!
//! Mirrors the list / sorted-set / `SET NX EX` semantics a shared key-value
//! store provides, for single-process deployments and tests.

use async_trait::async_trait;
use chatcore::{LockStore, QueueError, Task, TaskQueue};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

pub const DEFAULT_QUEUE_NAME: &str = "automation_tasks";

pub struct MemoryQueue {
    name: String,
    state: Mutex<QueueState>,
    closed: AtomicBool,
}

#[derive(Default)]
struct QueueState {
    immediate: VecDeque<Task>,
    /// Keyed by (ready_at, insertion sequence) so equal ready times stay FIFO
    delayed: BTreeMap<(i64, u64), Task>,
    seq: u64,
    locks: HashMap<String, LockEntry>,
}

struct LockEntry {
    token: String,
    expires_at: Instant,
}

impl MemoryQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(QueueState::default()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.immediate.len()
    }

    pub async fn delayed_len(&self) -> usize {
        self.state.lock().await.delayed.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), QueueError> {
        if self.is_closed() {
            return Err(QueueError::Unavailable(format!("queue '{}' is closed", self.name)));
        }
        Ok(())
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_NAME)
    }
}

#[async_trait]
impl TaskQueue for MemoryQueue {
    async fn enqueue(&self, task: Task) -> Result<(), QueueError> {
        self.ensure_open()?;
        tracing::debug!(queue = %self.name, job_id = %task.job_id, "Enqueued task");
        self.state.lock().await.immediate.push_back(task);
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<Task>, QueueError> {
        self.ensure_open()?;
        Ok(self.state.lock().await.immediate.pop_front())
    }

    async fn schedule_delayed(&self, mut task: Task, ready_at: i64) -> Result<(), QueueError> {
        self.ensure_open()?;
        task.ready_at = Some(ready_at);
        tracing::debug!(queue = %self.name, job_id = %task.job_id, ready_at, "Scheduled delayed task");

        let mut state = self.state.lock().await;
        let seq = state.seq;
        state.seq += 1;
        state.delayed.insert((ready_at, seq), task);
        Ok(())
    }

    async fn drain_ready(&self, now: i64) -> Result<Vec<Task>, QueueError> {
        self.ensure_open()?;
        let mut state = self.state.lock().await;

        let ready = match now.checked_add(1) {
            Some(bound) => {
                let pending = state.delayed.split_off(&(bound, 0));
                std::mem::replace(&mut state.delayed, pending)
            }
            None => std::mem::take(&mut state.delayed),
        };
        Ok(ready.into_values().collect())
    }

    async fn close(&self) -> Result<(), QueueError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            tracing::info!(queue = %self.name, "Queue closed");
        }
        Ok(())
    }
}

#[async_trait]
impl LockStore for MemoryQueue {
    async fn acquire_lock(&self, key: &str, token: &str, ttl: Duration) -> Result<bool, QueueError> {
        self.ensure_open()?;
        let now = Instant::now();
        let mut state = self.state.lock().await;

        if let Some(entry) = state.locks.get(key) {
            if entry.expires_at > now {
                return Ok(false);
            }
        }
        state.locks.insert(
            key.to_string(),
            LockEntry {
                token: token.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }

    async fn release_lock(&self, key: &str, token: &str) -> Result<bool, QueueError> {
        self.ensure_open()?;
        let now = Instant::now();
        let mut state = self.state.lock().await;

        match state.locks.get(key) {
            Some(entry) if entry.token == token && entry.expires_at > now => {
                state.locks.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
