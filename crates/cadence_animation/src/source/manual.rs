//! Manually driven timing source
//!
//! Ticks only when [`ManualTimingSource::tick`] is called, at a clock the
//! caller controls. Useful for host-driven frame loops and deterministic tests.

use super::{Task, TickDispatcher, TickListener, TickListenerId, TimingSource};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub struct ManualTimingSource {
    dispatcher: TickDispatcher,
    clock_nanos: AtomicU64,
    initialized: AtomicBool,
    disposed: AtomicBool,
}

impl ManualTimingSource {
    /// A source whose clock starts at zero
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    pub fn starting_at(nanos: u64) -> Self {
        Self {
            dispatcher: TickDispatcher::new(),
            clock_nanos: AtomicU64::new(nanos),
            initialized: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn set_time(&self, nanos: u64) {
        self.clock_nanos.store(nanos, Ordering::SeqCst);
    }

    /// Move the clock forward without ticking
    pub fn advance(&self, by: Duration) {
        self.clock_nanos
            .fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }

    /// Run one tick at the current clock
    ///
    /// Returns false (and does nothing) outside of the init/dispose bracket.
    pub fn tick(&self) -> bool {
        if !self.is_active() {
            tracing::warn!("ManualTimingSource: tick() ignored; source is not active");
            return false;
        }
        let nanos = self.now_nanos();
        self.dispatcher.run_tick(self, nanos);
        true
    }

    /// Advance the clock, then tick
    pub fn advance_and_tick(&self, by: Duration) -> bool {
        self.advance(by);
        self.tick()
    }

    /// Run queued tasks without notifying listeners
    pub fn run_pending_tasks(&self) -> usize {
        if !self.is_active() {
            return 0;
        }
        self.dispatcher.run_tasks()
    }

    pub fn listener_count(&self) -> usize {
        self.dispatcher.listener_count()
    }

    pub fn is_active(&self) -> bool {
        self.initialized.load(Ordering::SeqCst) && !self.disposed.load(Ordering::SeqCst)
    }
}

impl Default for ManualTimingSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimingSource for ManualTimingSource {
    fn init(&self) {
        if self.disposed.load(Ordering::SeqCst) {
            tracing::warn!("ManualTimingSource: init() after dispose() ignored");
            return;
        }
        self.initialized.store(true, Ordering::SeqCst);
    }

    fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::SeqCst) {
            tracing::debug!("ManualTimingSource: disposed");
            self.dispatcher.clear_listeners();
        }
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn add_tick_listener(&self, listener: Arc<dyn TickListener>) -> TickListenerId {
        self.dispatcher.add_listener(listener)
    }

    fn remove_tick_listener(&self, id: TickListenerId) -> bool {
        self.dispatcher.remove_listener(id)
    }

    fn submit(&self, task: Task) {
        self.dispatcher.submit(task);
    }

    fn now_nanos(&self) -> u64 {
        self.clock_nanos.load(Ordering::SeqCst)
    }
}
