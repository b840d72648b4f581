// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The turn coordinator: serializes handler invocations across every agent
//! while preserving submission order. Only one handler body ever runs at a
//! time, regardless of how many timers are ticking concurrently.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use crate::error::CoreError;

/// The handler invoked for one turn. Boxed and type-erased because each
/// submission may carry a different closure.
pub type TurnHandler =
    Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = Result<(), CoreError>> + Send>> + Send>;

struct TurnJob {
    agent_id: String,
    handler: TurnHandler,
    reply: oneshot::Sender<Result<(), CoreError>>,
}

/// FIFO scheduler guaranteeing at-most-one handler executing across all
/// agents. Grounded in the teacher's request/response oneshot idiom
/// (`credential/broker.rs`) and bounded-channel back-pressure style.
pub struct TurnCoordinator {
    tx: Mutex<Option<mpsc::Sender<TurnJob>>>,
    waiting: Arc<Mutex<VecDeque<String>>>,
    closed: Arc<AtomicBool>,
    turn_index: Arc<AtomicU64>,
    worker: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl TurnCoordinator {
    pub fn new(queue_capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<TurnJob>(queue_capacity);
        let waiting = Arc::new(Mutex::new(VecDeque::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let turn_index = Arc::new(AtomicU64::new(0));

        let worker_waiting = Arc::clone(&waiting);
        let worker = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                worker_waiting.lock().retain(|id| id != &job.agent_id);
                let result = (job.handler)().await;
                if let Err(ref err) = result {
                    tracing::warn!(agent_id = %job.agent_id, %err, "turn handler failed");
                }
                let _ = job.reply.send(result);
            }
        });

        Self { tx: Mutex::new(Some(tx)), waiting, closed, turn_index, worker: Mutex::new(Some(worker)) }
    }

    /// Enqueue a turn job and await the handler's outcome. Fails with
    /// [`CoreError::CoordinatorClosed`] once `aclose` has run.
    pub async fn submit(&self, agent_id: impl Into<String>, handler: TurnHandler) -> Result<(), CoreError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CoreError::CoordinatorClosed);
        }
        let sender = self.tx.lock().clone().ok_or(CoreError::CoordinatorClosed)?;
        let agent_id = agent_id.into();
        let (reply_tx, reply_rx) = oneshot::channel();
        self.waiting.lock().push_back(agent_id.clone());
        let job = TurnJob { agent_id, handler, reply: reply_tx };
        sender.send(job).await.map_err(|_| CoreError::CoordinatorClosed)?;
        reply_rx.await.map_err(|_| CoreError::CoordinatorClosed)?
    }

    /// The next agent (other than `exclude`) waiting for its turn, or `None`.
    pub fn next_waiting_agent(&self, exclude: Option<&str>) -> Option<String> {
        self.waiting.lock().iter().find(|id| Some(id.as_str()) != exclude).cloned()
    }

    /// Assign and return the next monotonically increasing turn index.
    pub fn next_turn_index(&self) -> u64 {
        self.turn_index.fetch_add(1, Ordering::SeqCst)
    }

    /// Stop accepting new submissions and drain everything already queued.
    pub async fn aclose(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.tx.lock().take();
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
