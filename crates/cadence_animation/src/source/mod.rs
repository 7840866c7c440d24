//! Timing sources
//!
//! A [`TimingSource`] is the periodic tick generator that drives animators.
//! Every source owns a [`TickDispatcher`], which serializes the two kinds of
//! work a source performs in its tick context:
//!
//! 1. one-shot tasks submitted with [`TimingSource::submit`], drained in
//!    submission order before each tick's listener notifications
//! 2. tick notifications to every registered [`TickListener`]
//!
//! Neither kind of work runs while the dispatcher holds a lock, so listeners
//! and tasks may add or remove listeners and submit further tasks freely.

mod manual;
mod thread;

pub use manual::ManualTimingSource;
pub use thread::ThreadTimingSource;

use parking_lot::Mutex;
use slotmap::{new_key_type, SlotMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

new_key_type! {
    /// Handle to a registered tick listener
    pub struct TickListenerId;
}

/// A unit of work run once in a source's tick context
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Receives one notification per period while subscribed
pub trait TickListener: Send + Sync {
    /// `nanos` is the source's monotonic clock at the time of the tick
    fn tick(&self, source: &dyn TimingSource, nanos: u64);
}

/// Periodic tick generator
///
/// Ticking happens only between [`init`](TimingSource::init) and
/// [`dispose`](TimingSource::dispose). Tick notifications and submitted
/// tasks for one source are never concurrent with each other.
pub trait TimingSource: Send + Sync {
    /// Begin ticking
    fn init(&self);

    /// Stop ticking for good; a disposed source cannot be initialized again
    fn dispose(&self);

    fn is_disposed(&self) -> bool;

    fn add_tick_listener(&self, listener: Arc<dyn TickListener>) -> TickListenerId;

    /// Returns whether the listener was registered
    fn remove_tick_listener(&self, id: TickListenerId) -> bool;

    /// Run `task` once, before the next tick's listener notifications
    fn submit(&self, task: Task);

    /// Monotonic clock, in nanoseconds, that ticks are stamped with
    fn now_nanos(&self) -> u64;
}

/// Listener table and task queue shared by all source implementations
pub struct TickDispatcher {
    listeners: Mutex<SlotMap<TickListenerId, Arc<dyn TickListener>>>,
    task_tx: Sender<Task>,
    task_rx: Mutex<Receiver<Task>>,
}

impl TickDispatcher {
    pub fn new() -> Self {
        let (task_tx, task_rx) = mpsc::channel();
        Self {
            listeners: Mutex::new(SlotMap::with_key()),
            task_tx,
            task_rx: Mutex::new(task_rx),
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn TickListener>) -> TickListenerId {
        self.listeners.lock().insert(listener)
    }

    pub fn remove_listener(&self, id: TickListenerId) -> bool {
        self.listeners.lock().remove(id).is_some()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn clear_listeners(&self) {
        self.listeners.lock().clear();
    }

    pub fn submit(&self, task: Task) {
        // The receiver lives as long as the dispatcher, so this cannot fail
        let _ = self.task_tx.send(task);
    }

    /// Run every queued task, in submission order
    ///
    /// Tasks submitted by a running task are picked up in the same drain.
    /// Returns the number of tasks run.
    pub fn run_tasks(&self) -> usize {
        let mut ran = 0;
        loop {
            // Release the receiver before running the task so it may submit more
            let next = self.task_rx.lock().try_recv();
            let Ok(task) = next else {
                break;
            };
            ran += 1;
            if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
                tracing::error!("TickDispatcher: submitted task panicked; continuing");
            }
        }
        ran
    }

    /// One full tick: drain tasks, then notify a snapshot of the listeners
    pub fn run_tick(&self, source: &dyn TimingSource, nanos: u64) {
        self.run_tasks();

        let listeners: Vec<Arc<dyn TickListener>> =
            self.listeners.lock().values().cloned().collect();
        tracing::trace!("TickDispatcher: tick at {}ns to {} listeners", nanos, listeners.len());

        for listener in listeners {
            let result = panic::catch_unwind(AssertUnwindSafe(|| listener.tick(source, nanos)));
            if result.is_err() {
                tracing::error!("TickDispatcher: tick listener panicked; continuing");
            }
        }
    }
}

impl Default for TickDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingListener(AtomicUsize);

    impl TickListener for CountingListener {
        fn tick(&self, _source: &dyn TimingSource, _nanos: u64) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_tasks_run_before_listeners_in_order() {
        let source = ManualTimingSource::new();
        source.init();

        let log = Arc::new(Mutex::new(Vec::new()));

        struct LoggingListener(Arc<Mutex<Vec<&'static str>>>);
        impl TickListener for LoggingListener {
            fn tick(&self, _source: &dyn TimingSource, _nanos: u64) {
                self.0.lock().push("tick");
            }
        }

        source.add_tick_listener(Arc::new(LoggingListener(Arc::clone(&log))));
        let first = Arc::clone(&log);
        source.submit(Box::new(move || first.lock().push("task 1")));
        let second = Arc::clone(&log);
        source.submit(Box::new(move || second.lock().push("task 2")));

        source.tick();
        assert_eq!(*log.lock(), vec!["task 1", "task 2", "tick"]);
    }

    #[test]
    fn test_panicking_task_does_not_block_others() {
        let dispatcher = TickDispatcher::new();
        let count = Arc::new(AtomicUsize::new(0));

        dispatcher.submit(Box::new(|| panic!("task failure")));
        let after = Arc::clone(&count);
        dispatcher.submit(Box::new(move || {
            after.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(dispatcher.run_tasks(), 2);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listener_removal() {
        let source = ManualTimingSource::new();
        source.init();

        let listener = Arc::new(CountingListener(AtomicUsize::new(0)));
        let id = source.add_tick_listener(listener.clone());
        source.tick();
        assert!(source.remove_tick_listener(id));
        assert!(!source.remove_tick_listener(id));
        source.tick();

        assert_eq!(listener.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listener_may_unsubscribe_itself_mid_tick() {
        struct OneShot {
            id: Mutex<Option<TickListenerId>>,
            ticks: AtomicUsize,
        }
        impl TickListener for OneShot {
            fn tick(&self, source: &dyn TimingSource, _nanos: u64) {
                self.ticks.fetch_add(1, Ordering::SeqCst);
                if let Some(id) = self.id.lock().take() {
                    source.remove_tick_listener(id);
                }
            }
        }

        let source = ManualTimingSource::new();
        source.init();
        let listener = Arc::new(OneShot {
            id: Mutex::new(None),
            ticks: AtomicUsize::new(0),
        });
        let id = source.add_tick_listener(listener.clone());
        *listener.id.lock() = Some(id);

        source.tick();
        source.tick();
        assert_eq!(listener.ticks.load(Ordering::SeqCst), 1);
    }
}
