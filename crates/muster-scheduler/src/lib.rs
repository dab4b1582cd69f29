//! One-shot timer scheduling for Muster sessions.
//!
//! Provides the injectable `Clock` and `Scheduler` seams the event session
//! derives its reminder/finalizer timers through, a tokio-backed wall-clock
//! implementation, and a deterministic manual implementation for tests.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use futures_util::future::BoxFuture;
use muster_core::current_unix_timestamp_ms;


/// Supplies "now" in Unix milliseconds; substitutable for deterministic tests.
pub trait Clock: Send + Sync {
    fn now_unix_ms(&self) -> u64;
}

/// Wall clock used in production wiring.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix_ms(&self) -> u64 {
        current_unix_timestamp_ms()
    }
}

/// Hand-driven clock for tests; time only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_unix_ms: AtomicU64,
}

impl ManualClock {
    pub fn new(start_unix_ms: u64) -> Self {
        Self {
            now_unix_ms: AtomicU64::new(start_unix_ms),
        }
    }

    pub fn set(&self, now_unix_ms: u64) {
        self.now_unix_ms.store(now_unix_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: u64) {
        self.now_unix_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_unix_ms(&self) -> u64 {
        self.now_unix_ms.load(Ordering::SeqCst)
    }
}

/// Work to run when a timer fires.
pub type TimerTask = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// Opaque handle to one scheduled callback; cancel through the scheduler
/// that issued it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TimerHandle {
    id: u64,
}

/// Schedules one-shot callbacks at absolute Unix-ms timestamps. Registrations
/// for timestamps already in the past are accepted and fire immediately.
pub trait Scheduler: Send + Sync {
    fn schedule(&self, at_unix_ms: u64, task: TimerTask) -> TimerHandle;
    fn cancel(&self, handle: &TimerHandle);
}

/// Wall-clock scheduler backed by tokio timers. Each registration spawns a
/// task that sleeps until the target instant; cancel aborts the task.
pub struct TokioScheduler {
    clock: Arc<dyn Clock>,
    next_id: AtomicU64,
    running: Arc<Mutex<HashMap<u64, tokio::task::JoinHandle<()>>>>,
}

impl TokioScheduler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            next_id: AtomicU64::new(1),
            running: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of timers that have been scheduled and not yet fired or
    /// cancelled.
    pub fn live_timers(&self) -> usize {
        self.running.lock().expect("timer table mutex poisoned").len()
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, at_unix_ms: u64, task: TimerTask) -> TimerHandle {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let delay_ms = at_unix_ms.saturating_sub(self.clock.now_unix_ms());
        let running = Arc::clone(&self.running);
        // Insert under the same lock the fired task removes itself under, so
        // a zero-delay timer cannot clean up before it is registered.
        let mut table = self.running.lock().expect("timer table mutex poisoned");
        let join = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            tracing::debug!(timer_id = id, at_unix_ms, "timer fired");
            task().await;
            if let Ok(mut entries) = running.lock() {
                entries.remove(&id);
            }
        });
        table.insert(id, join);
        TimerHandle { id }
    }

    fn cancel(&self, handle: &TimerHandle) {
        let removed = self
            .running
            .lock()
            .expect("timer table mutex poisoned")
            .remove(&handle.id);
        if let Some(join) = removed {
            join.abort();
            tracing::debug!(timer_id = handle.id, "timer cancelled");
        }
    }
}

struct PendingTimer {
    id: u64,
    at_unix_ms: u64,
    task: TimerTask,
}

/// Deterministic scheduler for tests: registrations queue until `fire_due`
/// is driven past their timestamps.
#[derive(Default)]
pub struct ManualScheduler {
    next_id: AtomicU64,
    pending: Mutex<Vec<PendingTimer>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().expect("pending mutex poisoned").len()
    }

    /// Target timestamps of all live registrations, ascending.
    pub fn pending_times(&self) -> Vec<u64> {
        let mut times: Vec<u64> = self
            .pending
            .lock()
            .expect("pending mutex poisoned")
            .iter()
            .map(|timer| timer.at_unix_ms)
            .collect();
        times.sort_unstable();
        times
    }

    /// Runs every registration due at or before `now_unix_ms`, earliest
    /// first, and returns how many fired. Tasks may register new timers
    /// while running; those only fire on a later call.
    pub async fn fire_due(&self, now_unix_ms: u64) -> usize {
        let mut due = {
            let mut pending = self.pending.lock().expect("pending mutex poisoned");
            let mut due = Vec::new();
            let mut index = 0;
            while index < pending.len() {
                if pending[index].at_unix_ms <= now_unix_ms {
                    due.push(pending.swap_remove(index));
                } else {
                    index += 1;
                }
            }
            due
        };
        due.sort_by_key(|timer| (timer.at_unix_ms, timer.id));
        let fired = due.len();
        for timer in due {
            (timer.task)().await;
        }
        fired
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, at_unix_ms: u64, task: TimerTask) -> TimerHandle {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.pending
            .lock()
            .expect("pending mutex poisoned")
            .push(PendingTimer {
                id,
                at_unix_ms,
                task,
            });
        TimerHandle { id }
    }

    fn cancel(&self, handle: &TimerHandle) {
        self.pending
            .lock()
            .expect("pending mutex poisoned")
            .retain(|timer| timer.id != handle.id);
    }
}
