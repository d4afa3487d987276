//! Bounded-concurrency task execution with per-slot progress.
//!
//! A [`WorkerPool`] runs a fixed number of workers over a queue of tasks that
//! is filled before [`WorkerPool::start`]. Each task gets a [`TaskContext`]
//! for status lines (keyed by the worker slot) and for aborting the pool.
//!
//! Aborting stops new dispatch; it does not interrupt tasks already running.
//!
//! ```text
//! add(task)... → start() → workers ──status──→ display loop → SyncProgress::TaskStatus
//!                               └──all accounted for──→ oneshot → PoolRun::wait()
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;

use crate::sync::{ProgressCallback, SyncProgress, emit};

/// A unit of work run by a [`WorkerPool`].
#[async_trait]
pub trait Task: Send + 'static {
    async fn run(self, ctx: TaskContext);
}

/// Handle given to a running task.
#[derive(Clone)]
pub struct TaskContext {
    slot: usize,
    status: mpsc::UnboundedSender<(usize, String)>,
    aborted: Arc<AtomicBool>,
}

impl TaskContext {
    /// Worker slot running this task, stable for the task's lifetime.
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Replace this slot's status line.
    pub fn send(&self, message: impl Into<String>) {
        // The display loop outlives every worker.
        let _ = self.status.send((self.slot, message.into()));
    }

    /// Stop the pool from dispatching further tasks.
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }
}

/// How a pool run ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolOutcome {
    /// Tasks that ran to completion.
    pub completed: usize,
    /// Tasks never started (or lost to a panic).
    pub skipped: usize,
    /// Whether a task called [`TaskContext::abort`].
    pub aborted: bool,
    /// Whether the external shutdown flag was raised.
    pub interrupted: bool,
}

/// A pool of workers over a pre-filled queue.
pub struct WorkerPool<T> {
    max_workers: usize,
    queue: VecDeque<T>,
    on_progress: Option<Arc<ProgressCallback>>,
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl<T: Task> WorkerPool<T> {
    /// `expected_tasks` sizes the queue so [`WorkerPool::add`] never reallocates.
    pub fn new(max_workers: usize, expected_tasks: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
            queue: VecDeque::with_capacity(expected_tasks),
            on_progress: None,
            shutdown_flag: None,
        }
    }

    /// Forward status lines to a progress callback.
    #[must_use]
    pub fn with_progress(mut self, on_progress: Option<Arc<ProgressCallback>>) -> Self {
        self.on_progress = on_progress;
        self
    }

    /// Stop dispatching when this flag is raised (e.g. Ctrl+C).
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Option<Arc<AtomicBool>>) -> Self {
        self.shutdown_flag = flag;
        self
    }

    pub fn add(&mut self, task: T) {
        self.queue.push_back(task);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Spawn the workers. Must be called inside a tokio runtime.
    pub fn start(self) -> PoolRun {
        let total = self.queue.len();
        let workers = self.max_workers.min(total);
        let queue = Arc::new(Mutex::new(self.queue));
        let aborted = Arc::new(AtomicBool::new(false));
        let completed = Arc::new(AtomicUsize::new(0));
        let shutdown = self.shutdown_flag;
        let (status_tx, mut status_rx) = mpsc::unbounded_channel::<(usize, String)>();
        let (done_tx, done_rx) = oneshot::channel();

        let mut join_set = JoinSet::new();
        for slot in 0..workers {
            let queue = Arc::clone(&queue);
            let completed = Arc::clone(&completed);
            let shutdown = shutdown.clone();
            let ctx = TaskContext {
                slot,
                status: status_tx.clone(),
                aborted: Arc::clone(&aborted),
            };

            join_set.spawn(async move {
                loop {
                    let stopping = ctx.is_aborted()
                        || shutdown
                            .as_ref()
                            .is_some_and(|flag| flag.load(Ordering::SeqCst));
                    if stopping {
                        break;
                    }
                    let next = queue.lock().unwrap_or_else(|e| e.into_inner()).pop_front();
                    let Some(task) = next else {
                        break;
                    };
                    task.run(ctx.clone()).await;
                    completed.fetch_add(1, Ordering::SeqCst);
                }
            });
        }
        drop(status_tx);

        let on_progress = self.on_progress;
        let display = tokio::spawn(async move {
            while let Some((slot, message)) = status_rx.recv().await {
                emit(
                    on_progress.as_deref(),
                    SyncProgress::TaskStatus { slot, message },
                );
            }
        });

        tokio::spawn(async move {
            while let Some(joined) = join_set.join_next().await {
                if let Err(err) = joined {
                    tracing::error!("Worker failed: {err}");
                }
            }
            let _ = display.await;

            let completed = completed.load(Ordering::SeqCst);
            let _ = done_tx.send(PoolOutcome {
                completed,
                skipped: total - completed,
                aborted: aborted.load(Ordering::SeqCst),
                interrupted: shutdown.is_some_and(|flag| flag.load(Ordering::SeqCst)),
            });
        });

        PoolRun {
            done: Some(done_rx),
            outcome: None,
            total,
        }
    }
}

/// A started pool.
pub struct PoolRun {
    done: Option<oneshot::Receiver<PoolOutcome>>,
    outcome: Option<PoolOutcome>,
    total: usize,
}

impl PoolRun {
    /// Wait until every task is accounted for.
    ///
    /// Cancel-safe, so it can sit in a `select!` next to a message channel.
    pub async fn wait(&mut self) -> PoolOutcome {
        if let Some(done) = self.done.as_mut() {
            let outcome = done.await.unwrap_or(PoolOutcome {
                skipped: self.total,
                ..PoolOutcome::default()
            });
            self.outcome = Some(outcome);
            self.done = None;
        }
        self.outcome.unwrap_or_default()
    }
}
