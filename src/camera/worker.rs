//! The shared camera worker thread.
//!
//! Every device operation of every session runs as a task on one worker
//! thread, in the order it was posted. The thread is spawned when the
//! first session opens and retired when the last one closes, so an idle
//! application holds no camera thread.
//!
//! Tasks may schedule delayed follow-ups (auto-focus cycles) on the same
//! thread through [`Timers`]; those run once their deadline passes and
//! the queue has no earlier work.

use super::manager::CameraManager;
use super::SessionId;
use crate::capture::CameraProvider;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// A unit of work for the camera thread.
pub(crate) type Task = Box<dyn FnOnce(&mut WorkerContext) + Send + 'static>;

pub(crate) fn task<F>(f: F) -> Task
where
    F: FnOnce(&mut WorkerContext) + Send + 'static,
{
    Box::new(f)
}

/// Why a task could not be queued.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The worker thread has shut down.
    #[error("camera worker is not running")]
    NotRunning,
    /// The worker thread could not be started.
    #[error("failed to spawn camera worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Handle for a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct TimerId(u64);

/// Delayed tasks, ordered by deadline.
#[derive(Default)]
pub(crate) struct Timers {
    next_id: u64,
    pending: BTreeMap<(Instant, TimerId), Task>,
}

impl Timers {
    pub(crate) fn schedule(&mut self, delay: Duration, task: Task) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.pending.insert((Instant::now() + delay, id), task);
        id
    }

    /// Drops a scheduled task. Returns false if it already ran.
    pub(crate) fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|(_, timer), _| *timer != id);
        self.pending.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.pending.keys().next().map(|(deadline, _)| *deadline)
    }

    fn pop_due(&mut self, now: Instant) -> Option<Task> {
        let key = *self.pending.keys().next()?;
        if key.0 <= now {
            self.pending.remove(&key)
        } else {
            None
        }
    }
}

/// State owned by the worker thread and handed to every task.
pub(crate) struct WorkerContext {
    pub(crate) provider: Arc<dyn CameraProvider>,
    pub(crate) managers: HashMap<SessionId, CameraManager>,
    pub(crate) timers: Timers,
}

impl WorkerContext {
    fn new(provider: Arc<dyn CameraProvider>) -> Self {
        Self {
            provider,
            managers: HashMap::new(),
            timers: Timers::default(),
        }
    }

    /// Runs `f` on the session's manager, if the session's camera is open.
    pub(crate) fn with_manager<R>(
        &mut self,
        session: SessionId,
        f: impl FnOnce(&mut CameraManager, &mut Timers) -> R,
    ) -> Option<R> {
        let manager = self.managers.get_mut(&session)?;
        Some(f(manager, &mut self.timers))
    }

    fn run(&mut self, task: Task) {
        if panic::catch_unwind(AssertUnwindSafe(|| task(self))).is_err() {
            error!("camera task panicked");
        }
    }
}

/// Counters describing the worker's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Sessions currently holding the worker open.
    pub open_sessions: usize,
    /// Whether the worker thread is alive.
    pub running: bool,
    /// Worker threads started so far.
    pub threads_spawned: u64,
    /// Worker threads that have exited.
    pub threads_retired: u64,
}

struct RunningThread {
    sender: Sender<Task>,
    quit: Arc<AtomicBool>,
}

#[derive(Default)]
struct WorkerState {
    open_count: usize,
    thread: Option<RunningThread>,
}

struct Shared {
    provider: Arc<dyn CameraProvider>,
    state: Mutex<WorkerState>,
    next_session: AtomicU64,
    spawned: AtomicU64,
    retired: AtomicU64,
}

/// Serializes camera work onto one reference-counted thread.
///
/// Cheap to clone; clones share the thread and its reference count.
#[derive(Clone)]
pub struct CameraWorker {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for CameraWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraWorker")
            .field("stats", &self.stats())
            .finish()
    }
}

impl CameraWorker {
    /// Creates an idle worker over `provider`.
    pub fn new(provider: impl CameraProvider + 'static) -> Self {
        Self::with_provider(Arc::new(provider))
    }

    /// Creates an idle worker over a shared provider.
    pub fn with_provider(provider: Arc<dyn CameraProvider>) -> Self {
        Self {
            shared: Arc::new(Shared {
                provider,
                state: Mutex::new(WorkerState::default()),
                next_session: AtomicU64::new(0),
                spawned: AtomicU64::new(0),
                retired: AtomicU64::new(0),
            }),
        }
    }

    /// Returns the provider cameras are opened from.
    pub fn provider(&self) -> &Arc<dyn CameraProvider> {
        &self.shared.provider
    }

    pub(crate) fn next_session_id(&self) -> SessionId {
        SessionId(self.shared.next_session.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Returns a snapshot of the worker's counters.
    pub fn stats(&self) -> WorkerStats {
        let state = self.shared.state.lock();
        WorkerStats {
            open_sessions: state.open_count,
            running: state.thread.is_some(),
            threads_spawned: self.shared.spawned.load(Ordering::Relaxed),
            threads_retired: self.shared.retired.load(Ordering::Relaxed),
        }
    }

    /// Returns true while the worker thread is alive.
    pub fn is_running(&self) -> bool {
        self.shared.state.lock().thread.is_some()
    }

    /// Takes a reference for a new session and queues its first task,
    /// starting the thread if needed.
    pub(crate) fn increment_and_enqueue(&self, task: Task) -> Result<(), WorkerError> {
        let mut state = self.shared.state.lock();
        state.open_count += 1;
        let result = self.enqueue_locked(&mut state, task);
        if result.is_err() {
            state.open_count -= 1;
        }
        result
    }

    /// Queues a task for a session that already holds a reference.
    pub(crate) fn enqueue(&self, task: Task) -> Result<(), WorkerError> {
        let mut state = self.shared.state.lock();
        self.enqueue_locked(&mut state, task)
    }

    /// Drops one session reference. The last one retires the thread once
    /// the current task returns; anything still queued is discarded.
    pub(crate) fn decrement_instances(&self) {
        let mut state = self.shared.state.lock();
        state.open_count = state.open_count.saturating_sub(1);
        if state.open_count > 0 {
            return;
        }
        if let Some(thread) = state.thread.take() {
            thread.quit.store(true, Ordering::Release);
            let retired = self.shared.retired.fetch_add(1, Ordering::Relaxed) + 1;
            info!(retired, "camera worker retired");
        }
    }

    fn enqueue_locked(&self, state: &mut WorkerState, task: Task) -> Result<(), WorkerError> {
        if state.open_count == 0 {
            return Err(WorkerError::NotRunning);
        }
        if state.thread.is_none() {
            state.thread = Some(self.spawn()?);
        }
        let Some(thread) = state.thread.as_ref() else {
            return Err(WorkerError::NotRunning);
        };
        thread.sender.send(task).map_err(|_| {
            warn!("camera worker queue disconnected");
            WorkerError::NotRunning
        })
    }

    fn spawn(&self) -> Result<RunningThread, WorkerError> {
        let (sender, receiver) = channel::unbounded();
        let quit = Arc::new(AtomicBool::new(false));
        let provider = Arc::clone(&self.shared.provider);
        let generation = self.shared.spawned.load(Ordering::Relaxed) + 1;
        let thread_quit = Arc::clone(&quit);

        thread::Builder::new()
            .name(format!("camera-worker-{}", generation))
            .spawn(move || run(receiver, provider, thread_quit, generation))?;

        self.shared.spawned.fetch_add(1, Ordering::Relaxed);
        info!(generation, "camera worker started");
        Ok(RunningThread { sender, quit })
    }
}

fn run(
    receiver: Receiver<Task>,
    provider: Arc<dyn CameraProvider>,
    quit: Arc<AtomicBool>,
    generation: u64,
) {
    let mut ctx = WorkerContext::new(provider);

    while !quit.load(Ordering::Acquire) {
        let next = match ctx.timers.next_deadline() {
            Some(deadline) => receiver.recv_deadline(deadline),
            None => receiver.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match next {
            Ok(task) => ctx.run(task),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        let now = Instant::now();
        while !quit.load(Ordering::Acquire) {
            match ctx.timers.pop_due(now) {
                Some(task) => ctx.run(task),
                None => break,
            }
        }
    }

    if !ctx.managers.is_empty() {
        warn!(
            generation,
            sessions = ctx.managers.len(),
            "camera worker exiting with open cameras"
        );
    }
    debug!(generation, pending_timers = ctx.timers.len(), "camera worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::MockCamera;
    use std::sync::mpsc;

    fn worker() -> CameraWorker {
        CameraWorker::new(MockCamera::new())
    }

    #[test]
    fn test_not_running_without_sessions() {
        let worker = worker();
        assert!(matches!(
            worker.enqueue(task(|_| {})),
            Err(WorkerError::NotRunning)
        ));
        assert!(!worker.is_running());
    }

    #[test]
    fn test_tasks_run_in_order() {
        let worker = worker();
        let (tx, rx) = mpsc::channel();
        for i in 0..10 {
            let tx = tx.clone();
            let t = task(move |_| tx.send(i).unwrap());
            if i == 0 {
                worker.increment_and_enqueue(t).unwrap();
            } else {
                worker.enqueue(t).unwrap();
            }
        }
        let seen: Vec<i32> = (0..10)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());

        worker.decrement_instances();
        let stats = worker.stats();
        assert!(!stats.running);
        assert_eq!(stats.threads_spawned, 1);
        assert_eq!(stats.threads_retired, 1);
    }

    #[test]
    fn test_timers_fire_and_cancel() {
        let worker = worker();
        let (tx, rx) = mpsc::channel();
        let fired = tx.clone();
        worker
            .increment_and_enqueue(task(move |ctx| {
                let cancelled = ctx.timers.schedule(
                    Duration::from_millis(10),
                    task(|_| panic!("cancelled timer ran")),
                );
                ctx.timers.schedule(
                    Duration::from_millis(20),
                    task(move |_| fired.send("fired").unwrap()),
                );
                assert!(ctx.timers.cancel(cancelled));
                assert!(!ctx.timers.cancel(cancelled));
            }))
            .unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "fired");
        worker.decrement_instances();
    }

    #[test]
    fn test_panicking_task_keeps_worker_alive() {
        let worker = worker();
        let (tx, rx) = mpsc::channel();
        worker
            .increment_and_enqueue(task(|_| panic!("driver bug")))
            .unwrap();
        worker
            .enqueue(task(move |_| tx.send(()).unwrap()))
            .unwrap();
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
        worker.decrement_instances();
    }

    #[test]
    fn test_thread_respawns_after_retirement() {
        let worker = worker();
        for _ in 0..2 {
            worker.increment_and_enqueue(task(|_| {})).unwrap();
            worker.decrement_instances();
        }
        let stats = worker.stats();
        assert_eq!(stats.threads_spawned, 2);
        assert_eq!(stats.threads_retired, 2);
    }

    #[test]
    fn test_session_ids_unique() {
        let worker = worker();
        assert_ne!(worker.next_session_id(), worker.next_session_id());
    }
}
