//! # Worker Threads
//!
//! Each worker owns a pair of task lists (priority and ordinary) on the main
//! thread side, the *pending* lists, and shares a second pair with its thread,
//! the *committed* lists. Enqueueing only touches the pending lists. A commit
//! appends them to the committed lists under the worker's lock and wakes the
//! thread.
//!
//! The thread swaps the committed lists for its own empty pair while holding
//! the lock, then drains the swapped-out batch without it: all priority tasks
//! first, then ordinary tasks. Between ordinary tasks it checks a flag that a
//! commit raises when new priority work arrives, and takes that work first.
//!
//! Every task runs behind an error boundary. A returned error or a panic is
//! reported as [`TaskCompletion::Failed`] and the thread moves on to the next
//! task.

use std::{
    any::Any,
    collections::VecDeque,
    mem,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

use crossbeam_channel::Sender;
use log::{debug, error, warn};
use parking_lot::{Condvar, Mutex};

use super::{
    task::{Task, TaskCompletion, TaskPriority, WorkerContext},
    WorkerId,
};
use crate::error::EngineError;

/// What a worker thread is doing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    /// Waiting for a commit.
    Idle = 0,
    DrainingPriority = 1,
    DrainingOrdinary = 2,
    /// The thread has exited.
    Stopped = 3,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => WorkerState::DrainingPriority,
            2 => WorkerState::DrainingOrdinary,
            3 => WorkerState::Stopped,
            _ => WorkerState::Idle,
        }
    }
}

#[derive(Default)]
struct TaskLists {
    priority: VecDeque<Box<dyn Task>>,
    ordinary: VecDeque<Box<dyn Task>>,
}

impl TaskLists {
    fn len(&self) -> usize {
        self.priority.len() + self.ordinary.len()
    }

    fn is_empty(&self) -> bool {
        self.priority.is_empty() && self.ordinary.is_empty()
    }
}

/// State shared between the scheduler and one worker thread.
struct WorkerShared {
    committed: Mutex<TaskLists>,
    wake: Condvar,
    stop: AtomicBool,
    /// Raised by a commit that carried priority tasks.
    priority_waiting: AtomicBool,
    state: AtomicU8,
    executed: AtomicU64,
    failed: AtomicU64,
}

impl WorkerShared {
    fn set_state(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

/// The scheduler's handle on one worker thread.
pub(super) struct WorkerThread {
    id: WorkerId,
    shared: Arc<WorkerShared>,
    pending: TaskLists,
    handle: Option<JoinHandle<()>>,
}

impl WorkerThread {
    /// Starts a worker thread.
    ///
    /// # Arguments
    /// * `context` - Moved into the thread; holds the worker's scratch memory
    /// * `completions` - Where finished and failed tasks are reported
    pub(super) fn spawn(
        context: WorkerContext,
        completions: Sender<TaskCompletion>,
    ) -> std::io::Result<Self> {
        let id = context.worker_id;
        let shared = Arc::new(WorkerShared {
            committed: Mutex::new(TaskLists::default()),
            wake: Condvar::new(),
            stop: AtomicBool::new(false),
            priority_waiting: AtomicBool::new(false),
            state: AtomicU8::new(WorkerState::Idle as u8),
            executed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        });

        let thread_shared = shared.clone();
        let handle = thread::Builder::new()
            .name(format!("voxel-worker-{id}"))
            .spawn(move || run(thread_shared, context, completions))?;

        Ok(Self {
            id,
            shared,
            pending: TaskLists::default(),
            handle: Some(handle),
        })
    }

    /// Adds a task to the pending lists; it becomes visible to the thread on the next commit.
    pub(super) fn enqueue(&mut self, task: Box<dyn Task>, priority: TaskPriority) {
        match priority {
            TaskPriority::High => self.pending.priority.push_back(task),
            TaskPriority::Ordinary => self.pending.ordinary.push_back(task),
        }
    }

    pub(super) fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Hands every pending task to the thread.
    ///
    /// # Returns
    /// The number of tasks committed
    pub(super) fn commit(&mut self) -> usize {
        let count = self.pending.len();
        if count == 0 {
            return 0;
        }
        {
            let mut committed = self.shared.committed.lock();
            if !self.pending.priority.is_empty() {
                self.shared.priority_waiting.store(true, Ordering::Release);
            }
            committed.priority.append(&mut self.pending.priority);
            committed.ordinary.append(&mut self.pending.ordinary);
        }
        self.shared.wake.notify_one();
        count
    }

    pub(super) fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.shared.state.load(Ordering::Acquire))
    }

    pub(super) fn executed(&self) -> u64 {
        self.shared.executed.load(Ordering::Relaxed)
    }

    pub(super) fn failed(&self) -> u64 {
        self.shared.failed.load(Ordering::Relaxed)
    }

    /// Asks the thread to exit once its current batch is done.
    pub(super) fn request_stop(&self) {
        // Taking the lock orders the flag against a thread about to wait.
        let _committed = self.shared.committed.lock();
        self.shared.stop.store(true, Ordering::Release);
        self.shared.wake.notify_one();
    }

    /// Waits for the thread to exit.
    pub(super) fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("worker {} exited abnormally", self.id);
            }
        }
        if !self.pending.is_empty() {
            warn!(
                "worker {} dropped {} tasks that were never committed",
                self.id,
                self.pending.len()
            );
            self.pending = TaskLists::default();
        }
    }
}

fn run(shared: Arc<WorkerShared>, mut context: WorkerContext, completions: Sender<TaskCompletion>) {
    let mut batch = TaskLists::default();
    debug!("worker {} started", context.worker_id);

    loop {
        shared.set_state(WorkerState::Idle);
        {
            let mut committed = shared.committed.lock();
            while committed.is_empty() && !shared.stop.load(Ordering::Acquire) {
                shared.wake.wait(&mut committed);
            }
            if shared.stop.load(Ordering::Acquire) {
                if !committed.is_empty() {
                    warn!(
                        "worker {} stopping with {} committed tasks unstarted",
                        context.worker_id,
                        committed.len()
                    );
                }
                break;
            }
            mem::swap(&mut batch, &mut *committed);
            shared.priority_waiting.store(false, Ordering::Release);
        }

        drain(&shared, &mut batch, &mut context, &completions);
    }

    shared.set_state(WorkerState::Stopped);
    debug!("worker {} stopped", context.worker_id);
}

/// Runs a swapped-out batch to completion, letting newly committed priority work cut in.
fn drain(
    shared: &WorkerShared,
    batch: &mut TaskLists,
    context: &mut WorkerContext,
    completions: &Sender<TaskCompletion>,
) {
    loop {
        if let Some(task) = batch.priority.pop_front() {
            shared.set_state(WorkerState::DrainingPriority);
            execute(shared, task, context, completions);
            continue;
        }

        if shared.priority_waiting.swap(false, Ordering::AcqRel) {
            let mut committed = shared.committed.lock();
            mem::swap(&mut batch.priority, &mut committed.priority);
            continue;
        }

        match batch.ordinary.pop_front() {
            Some(task) => {
                shared.set_state(WorkerState::DrainingOrdinary);
                execute(shared, task, context, completions);
            }
            None => break,
        }
    }
}

fn execute(
    shared: &WorkerShared,
    task: Box<dyn Task>,
    context: &mut WorkerContext,
    completions: &Sender<TaskCompletion>,
) {
    let worker = context.worker_id;
    let label = task.label();

    let outcome = catch_unwind(AssertUnwindSafe(|| task.process(context)));
    shared.executed.fetch_add(1, Ordering::Relaxed);

    let completion = match outcome {
        Ok(Ok(result)) => TaskCompletion::Completed {
            worker,
            label,
            result,
        },
        Ok(Err(error)) => {
            shared.failed.fetch_add(1, Ordering::Relaxed);
            error!("task {} failed on worker {}: {}", label, worker, error);
            TaskCompletion::Failed { worker, label, error }
        }
        Err(payload) => {
            shared.failed.fetch_add(1, Ordering::Relaxed);
            let reason = panic_message(payload.as_ref());
            error!("task {} panicked on worker {}: {}", label, worker, reason);
            TaskCompletion::Failed {
                worker,
                error: EngineError::TaskFailed {
                    task: label.to_string(),
                    reason,
                },
                label,
            }
        }
    };

    if completions.send(completion).is_err() {
        debug!("worker {} has no one to report to", worker);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
