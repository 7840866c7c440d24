//! Background-thread timing source
//!
//! Ticks from a dedicated thread at a fixed period, sleeping away whatever is
//! left of each period after tasks and listeners have run. Animations keep
//! running regardless of what the application's main loop is doing.
//!
//! ```ignore
//! let source = ThreadTimingSource::with_fps(120);
//! source.init(); // spawns the tick thread
//!
//! let animator = AnimatorBuilder::with_source(source.clone())
//!     .duration(Duration::from_millis(300))
//!     .build()?;
//! ```

use super::{Task, TickDispatcher, TickListener, TickListenerId, TimingSource};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub struct ThreadTimingSource {
    /// Weak self-reference handed to the tick thread
    me: Weak<ThreadTimingSource>,
    dispatcher: TickDispatcher,
    period: Duration,
    epoch: Instant,
    /// Stop signal for the tick thread
    stop_flag: AtomicBool,
    disposed: AtomicBool,
    thread_handle: Mutex<Option<JoinHandle<()>>>,
}

impl ThreadTimingSource {
    /// A source ticking every `period`
    pub fn new(period: Duration) -> Arc<Self> {
        let period = period.max(Duration::from_micros(100));
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            dispatcher: TickDispatcher::new(),
            period,
            epoch: Instant::now(),
            stop_flag: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            thread_handle: Mutex::new(None),
        })
    }

    /// A source ticking `fps` times per second
    pub fn with_fps(fps: u32) -> Arc<Self> {
        Self::new(Duration::from_micros(1_000_000 / u64::from(fps.max(1))))
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle.lock().is_some() && !self.stop_flag.load(Ordering::Relaxed)
    }

    fn spawn_tick_thread(&self) -> Option<JoinHandle<()>> {
        let me = self.me.clone();
        let period = self.period;

        let spawned = thread::Builder::new()
            .name("cadence-timing".into())
            .spawn(move || loop {
                let start = Instant::now();

                // Tick while holding a strong reference only for this period
                {
                    let Some(source) = me.upgrade() else {
                        break;
                    };
                    if source.stop_flag.load(Ordering::Relaxed) {
                        break;
                    }
                    let nanos = source.now_nanos();
                    source.dispatcher.run_tick(&*source, nanos);
                }

                // Sleep for remaining period time
                let elapsed = start.elapsed();
                if elapsed < period {
                    thread::sleep(period - elapsed);
                }
            });

        match spawned {
            Ok(handle) => Some(handle),
            Err(err) => {
                tracing::error!("ThreadTimingSource: failed to spawn tick thread: {}", err);
                None
            }
        }
    }
}

impl TimingSource for ThreadTimingSource {
    fn init(&self) {
        if self.disposed.load(Ordering::SeqCst) {
            tracing::warn!("ThreadTimingSource: init() after dispose() ignored");
            return;
        }
        let mut handle = self.thread_handle.lock();
        if handle.is_some() {
            return; // Already running
        }
        tracing::debug!("ThreadTimingSource: starting tick thread ({:?} period)", self.period);
        *handle = self.spawn_tick_thread();
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::debug!("ThreadTimingSource: disposing");
        self.stop_flag.store(true, Ordering::Relaxed);
        self.dispatcher.clear_listeners();

        let handle = self.thread_handle.lock().take();
        if let Some(handle) = handle {
            // Disposing from a tick callback: the loop exits on its own
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
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
        self.epoch.elapsed().as_nanos() as u64
    }
}

impl Drop for ThreadTimingSource {
    fn drop(&mut self) {
        // The thread holds only a weak reference and exits on its next period
        self.stop_flag.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_thread_source_ticks_and_runs_tasks() {
        let source = ThreadTimingSource::new(Duration::from_millis(1));

        struct Counter(AtomicUsize);
        impl TickListener for Counter {
            fn tick(&self, _source: &dyn TimingSource, _nanos: u64) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        source.add_tick_listener(counter.clone());

        let (tx, rx) = std::sync::mpsc::channel();
        source.submit(Box::new(move || {
            let _ = tx.send(thread::current().name().map(str::to_owned));
        }));

        source.init();
        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(name.as_deref(), Some("cadence-timing"));

        let deadline = Instant::now() + Duration::from_secs(5);
        while counter.0.load(Ordering::SeqCst) < 3 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(counter.0.load(Ordering::SeqCst) >= 3);

        source.dispose();
        assert!(source.is_disposed());
        assert!(!source.is_running());
        let after_dispose = counter.0.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(10));
        assert_eq!(counter.0.load(Ordering::SeqCst), after_dispose);
    }

    #[test]
    fn test_clock_is_monotonic() {
        let source = ThreadTimingSource::with_fps(60);
        let a = source.now_nanos();
        thread::sleep(Duration::from_millis(1));
        assert!(source.now_nanos() > a);
        assert_eq!(source.period(), Duration::from_micros(16_666));
    }
}
