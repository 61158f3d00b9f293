use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use voxel_geometry_engine::{
    config::EngineConfig,
    engine_state::{
        context::EngineResources,
        task_management::{
            task::{
                Task, TaskCompletion, TaskItem, TaskLabel, TaskPriority, TaskResult, WorkerContext,
            },
            TaskScheduler, WorkerId,
        },
        voxels::block::registry::BlockRegistry,
        CommitContext,
    },
    error::{EngineError, EngineResult},
};

type Log = Arc<Mutex<Vec<(WorkerId, &'static str, usize)>>>;

struct Done;

impl TaskResult for Done {
    fn handle_result(
        self: Box<Self>,
        _context: &mut CommitContext<'_>,
    ) -> EngineResult<Vec<TaskItem>> {
        Ok(Vec::new())
    }
}

/// Appends `(worker, kind, id)` to a shared log when it runs.
struct RecordingTask {
    kind: &'static str,
    id: usize,
    log: Log,
}

impl Task for RecordingTask {
    fn label(&self) -> TaskLabel {
        TaskLabel::new(self.kind)
    }

    fn process(self: Box<Self>, context: &mut WorkerContext) -> EngineResult<Box<dyn TaskResult>> {
        self.log.lock().push((context.worker_id, self.kind, self.id));
        Ok(Box::new(Done))
    }
}

/// Reports that it started, then waits to be released.
struct BlockingTask {
    started: Sender<()>,
    release: Receiver<()>,
    log: Log,
}

impl Task for BlockingTask {
    fn label(&self) -> TaskLabel {
        TaskLabel::new("blocking")
    }

    fn process(self: Box<Self>, context: &mut WorkerContext) -> EngineResult<Box<dyn TaskResult>> {
        let _ = self.started.send(());
        let _ = self.release.recv_timeout(Duration::from_secs(5));
        self.log.lock().push((context.worker_id, "blocking", 0));
        Ok(Box::new(Done))
    }
}

struct PanickingTask;

impl Task for PanickingTask {
    fn label(&self) -> TaskLabel {
        TaskLabel::new("panicking")
    }

    fn process(self: Box<Self>, _context: &mut WorkerContext) -> EngineResult<Box<dyn TaskResult>> {
        panic!("boom");
    }
}

struct FailingTask;

impl Task for FailingTask {
    fn label(&self) -> TaskLabel {
        TaskLabel::new("failing")
    }

    fn process(self: Box<Self>, _context: &mut WorkerContext) -> EngineResult<Box<dyn TaskResult>> {
        Err(EngineError::Config("bad input".into()))
    }
}

fn scheduler(workers: usize) -> TaskScheduler {
    let resources =
        EngineResources::new(EngineConfig::default(), BlockRegistry::with_default_blocks());
    TaskScheduler::new(workers, resources).unwrap()
}

fn collect(scheduler: &mut TaskScheduler, expected: usize) -> Vec<TaskCompletion> {
    let deadline = Instant::now() + Duration::from_secs(10);
    let mut completions = Vec::new();
    while completions.len() < expected && Instant::now() < deadline {
        scheduler.wait_for_completion(Duration::from_millis(50));
        completions.extend(scheduler.try_completions());
    }
    completions
}

fn record(kind: &'static str, id: usize, log: &Log) -> RecordingTask {
    RecordingTask {
        kind,
        id,
        log: log.clone(),
    }
}

#[test]
fn priority_tasks_run_first_on_every_worker() {
    let mut scheduler = scheduler(3);
    let log = Log::default();

    for worker in 0..3 {
        for id in 0..5 {
            let task = record("ordinary", id, &log);
            scheduler
                .enqueue(TaskItem::new(task, TaskPriority::Ordinary).on_worker(worker))
                .unwrap();
        }
        for id in 0..3 {
            let task = record("priority", id, &log);
            scheduler
                .enqueue(TaskItem::new(task, TaskPriority::High).on_worker(worker))
                .unwrap();
        }
    }
    assert_eq!(scheduler.commit(), 24);

    let completions = collect(&mut scheduler, 24);
    assert_eq!(completions.len(), 24);
    assert!(completions.iter().all(|completion| !completion.is_failure()));

    let log = log.lock();
    for worker in 0..3 {
        let kinds: Vec<_> = log
            .iter()
            .filter(|(id, ..)| *id == worker)
            .map(|(_, kind, _)| *kind)
            .collect();
        assert_eq!(kinds.len(), 8);
        assert!(kinds[..3].iter().all(|kind| *kind == "priority"), "worker {worker}: {kinds:?}");
        // Each queue keeps submission order.
        let ordinary: Vec<_> = log
            .iter()
            .filter(|(id, kind, _)| *id == worker && *kind == "ordinary")
            .map(|(.., seq)| *seq)
            .collect();
        assert_eq!(ordinary, vec![0, 1, 2, 3, 4]);
    }
}

#[test]
fn priority_work_preempts_remaining_ordinary_work() {
    let mut scheduler = scheduler(1);
    let log = Log::default();
    let (started_tx, started_rx) = bounded(1);
    let (release_tx, release_rx) = bounded(1);

    let blocking = BlockingTask {
        started: started_tx,
        release: release_rx,
        log: log.clone(),
    };
    scheduler.enqueue(TaskItem::new(blocking, TaskPriority::Ordinary)).unwrap();
    scheduler
        .enqueue(TaskItem::new(record("ordinary", 1, &log), TaskPriority::Ordinary))
        .unwrap();
    scheduler.commit();
    started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

    scheduler
        .enqueue(TaskItem::new(record("priority", 2, &log), TaskPriority::High))
        .unwrap();
    scheduler.commit();
    release_tx.send(()).unwrap();

    assert_eq!(collect(&mut scheduler, 3).len(), 3);
    let order: Vec<_> = log.lock().iter().map(|(_, kind, _)| *kind).collect();
    assert_eq!(order, vec!["blocking", "priority", "ordinary"]);
}

#[test]
fn round_robin_spreads_work_evenly() {
    let scheduler = scheduler(4);
    let mut counts: HashMap<WorkerId, usize> = HashMap::new();
    for _ in 0..102 {
        *counts.entry(scheduler.next_worker_id()).or_default() += 1;
    }
    assert_eq!(counts.len(), 4);
    assert!(counts.values().all(|&count| (25..=26).contains(&count)), "{counts:?}");
}

#[test]
fn failures_are_reported_and_workers_survive() {
    let mut scheduler = scheduler(1);
    let log = Log::default();

    scheduler.enqueue(TaskItem::new(PanickingTask, TaskPriority::Ordinary)).unwrap();
    scheduler.enqueue(TaskItem::new(FailingTask, TaskPriority::Ordinary)).unwrap();
    scheduler
        .enqueue(TaskItem::new(record("after", 0, &log), TaskPriority::Ordinary))
        .unwrap();
    scheduler.commit();

    let completions = collect(&mut scheduler, 3);
    assert_eq!(completions.len(), 3);

    let mut failed = 0;
    for completion in &completions {
        match completion {
            TaskCompletion::Failed { label, error, .. } if label.name == "panicking" => {
                failed += 1;
                assert!(error.to_string().contains("boom"), "{error}");
            }
            TaskCompletion::Failed { label, error, .. } => {
                failed += 1;
                assert_eq!(label.name, "failing");
                assert!(matches!(error, EngineError::Config(_)));
            }
            TaskCompletion::Completed { label, .. } => assert_eq!(label.name, "after"),
        }
    }
    assert_eq!(failed, 2);
    assert_eq!(log.lock().len(), 1);
    assert_eq!(scheduler.statistics(), (3, 2));
}

#[test]
fn enqueue_after_shutdown_is_rejected() {
    let mut scheduler = scheduler(2);
    scheduler.shutdown();
    assert!(scheduler.is_stopped());

    let log = Log::default();
    let result = scheduler.enqueue(TaskItem::new(record("late", 0, &log), TaskPriority::Ordinary));
    assert!(matches!(result, Err(EngineError::SchedulerStopped)));
}
