//! # Task Scheduling
//!
//! Background work is spread over a fixed set of worker threads, one fewer
//! than the machine has processors unless configured otherwise.
//!
//! ## Task Lifecycle
//! 1. The main thread enqueues a [`TaskItem`](task::TaskItem) with
//!    [`TaskScheduler::enqueue`]. Tasks with an affinity go to that worker;
//!    the rest are dealt out round robin.
//! 2. Enqueued tasks stay in the worker's pending lists until
//!    [`TaskScheduler::commit`] hands them over, normally once per tick.
//! 3. Each worker drains its committed priority tasks before its ordinary
//!    ones (see [`worker`]).
//! 4. Results come back over a channel and are collected with
//!    [`TaskScheduler::try_completions`] on the main thread, which never
//!    blocks on a worker.
//!
//! Chunks remember the worker they were assigned to, and every task that
//! touches a chunk is pinned to that worker, so per-chunk work runs in the
//! order it was committed.
//!
//! ## Example Usage
//! ```rust,ignore
//! let mut scheduler = TaskScheduler::new(workers, resources)?;
//! scheduler.enqueue(TaskItem::new(MyTask::new(), TaskPriority::Ordinary))?;
//!
//! // In the main loop:
//! scheduler.commit();
//! for completion in scheduler.try_completions() {
//!     // handle the result
//! }
//! ```

pub mod task;
pub mod worker;

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use crossbeam_channel::{unbounded, Receiver};
use log::info;

use self::{
    task::{TaskCompletion, TaskItem, WorkerContext},
    worker::{WorkerState, WorkerThread},
};
use crate::{
    engine_state::context::EngineResources,
    error::{EngineError, EngineResult},
};

/// Index of a worker thread.
pub type WorkerId = usize;

/// Owns the worker threads and routes tasks to them.
///
/// # Implementation Notes
/// - Main thread only: enqueue, commit and completion polling take `&mut self`
/// - Drop-safe: dropping the scheduler stops and joins every worker
/// - Panic-safe: a panicking task is reported as a failure and its worker keeps running
pub struct TaskScheduler {
    workers: Vec<WorkerThread>,
    completions: Receiver<TaskCompletion>,
    ready: VecDeque<TaskCompletion>,
    next_worker: AtomicUsize,
    in_flight: usize,
    stopped: bool,
}

impl TaskScheduler {
    /// Starts `worker_count` worker threads.
    ///
    /// # Arguments
    /// * `worker_count` - Number of threads, at least one is started
    /// * `resources` - Shared state handed to every worker
    ///
    /// # Errors
    /// [`EngineError::Io`] if a thread cannot be spawned.
    pub fn new(worker_count: usize, resources: Arc<EngineResources>) -> EngineResult<Self> {
        let worker_count = worker_count.max(1);
        let (sender, completions) = unbounded();

        let mut workers = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            let context = WorkerContext::new(id, resources.clone());
            workers.push(WorkerThread::spawn(context, sender.clone())?);
        }
        info!("started {} worker threads", worker_count);

        Ok(Self {
            workers,
            completions,
            ready: VecDeque::new(),
            next_worker: AtomicUsize::new(0),
            in_flight: 0,
            stopped: false,
        })
    }

    /// Starts as many workers as the resources' configuration asks for.
    pub fn from_config(resources: Arc<EngineResources>) -> EngineResult<Self> {
        let worker_count = resources.config.resolved_worker_threads();
        Self::new(worker_count, resources)
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// The next worker in round-robin order.
    pub fn next_worker_id(&self) -> WorkerId {
        self.next_worker.fetch_add(1, Ordering::Relaxed) % self.workers.len()
    }

    /// Queues a task; it is not visible to any worker until the next [`TaskScheduler::commit`].
    ///
    /// # Returns
    /// The worker the task was assigned to
    ///
    /// # Errors
    /// [`EngineError::SchedulerStopped`] after [`TaskScheduler::shutdown`].
    pub fn enqueue(&mut self, item: TaskItem) -> EngineResult<WorkerId> {
        if self.stopped {
            return Err(EngineError::SchedulerStopped);
        }
        let worker = match item.affinity {
            Some(worker) => worker % self.workers.len(),
            None => self.next_worker_id(),
        };
        self.workers[worker].enqueue(item.task, item.priority);
        Ok(worker)
    }

    /// Hands every pending task to its worker and wakes the workers that received any.
    ///
    /// # Returns
    /// The number of tasks committed
    pub fn commit(&mut self) -> usize {
        let committed: usize = self.workers.iter_mut().map(WorkerThread::commit).sum();
        self.in_flight += committed;
        committed
    }

    /// Tasks enqueued but not yet committed.
    pub fn pending(&self) -> usize {
        self.workers.iter().map(WorkerThread::pending).sum()
    }

    /// Tasks committed whose completion has not been collected yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Collects every completion that is ready, without blocking.
    pub fn try_completions(&mut self) -> Vec<TaskCompletion> {
        while let Ok(completion) = self.completions.try_recv() {
            self.ready.push_back(completion);
        }
        self.in_flight = self.in_flight.saturating_sub(self.ready.len());
        self.ready.drain(..).collect()
    }

    /// Blocks until at least one completion is ready or `timeout` passes.
    ///
    /// The completion stays buffered for the next [`TaskScheduler::try_completions`].
    ///
    /// # Returns
    /// Whether a completion is ready
    pub fn wait_for_completion(&mut self, timeout: Duration) -> bool {
        if !self.ready.is_empty() {
            return true;
        }
        match self.completions.recv_timeout(timeout) {
            Ok(completion) => {
                self.ready.push_back(completion);
                true
            }
            Err(_) => false,
        }
    }

    pub fn worker_state(&self, worker: WorkerId) -> Option<WorkerState> {
        self.workers.get(worker).map(WorkerThread::state)
    }

    /// Tasks run and tasks failed, summed over all workers.
    pub fn statistics(&self) -> (u64, u64) {
        self.workers.iter().fold((0, 0), |(executed, failed), worker| {
            (executed + worker.executed(), failed + worker.failed())
        })
    }

    /// Stops every worker after its current batch and joins the threads.
    ///
    /// Committed tasks a worker has not taken yet are dropped and logged.
    pub fn shutdown(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        for worker in &self.workers {
            worker.request_stop();
        }
        for worker in &mut self.workers {
            worker.join();
        }
        let (executed, failed) = self.statistics();
        info!(
            "task scheduler stopped: {} tasks executed, {} failed",
            executed, failed
        );
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}

impl Drop for TaskScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
