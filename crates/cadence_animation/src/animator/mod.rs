//! Animator
//!
//! The animator turns timing source ticks into cycle fractions and lifecycle
//! notifications for its [`TimingTarget`]s.
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──start()──▶ Running ⇄ Paused
//!                     │  (reverse_now, repeat, timing events)
//!                  stop()/end of last cycle
//!                     ▼
//!                  Stopping ──end() delivered──▶ Idle
//! ```
//!
//! `begin` and `end` notifications are never delivered on the caller's stack.
//! They are submitted as one-shot tasks to the timing source, which runs them
//! in its tick context ahead of the next tick. This keeps them ordered with
//! respect to timing events, whatever thread called `start()` or `stop()`.
//!
//! All target callbacks run with the animator's state lock released, so a
//! target may call back into the animator (for example `stop()` from
//! `timing_event`).

mod builder;

pub use builder::{
    clear_default_timing_source, default_timing_source, set_default_timing_source,
    AnimatorBuilder, CycleDuration, Direction, EndBehavior, RepeatBehavior, RepeatCount,
};

use crate::error::{AnimationError, Result};
use crate::interpolator::Interpolator;
use crate::source::{TickListener, TickListenerId, TimingSource};
use crate::target::TimingTarget;
use builder::AnimatorConfig;
use parking_lot::{Condvar, Mutex, RwLock};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

type TargetList = Arc<Vec<Arc<dyn TimingTarget>>>;

/// Drives timing targets through a configured timeline
///
/// `Animator` is a cheap handle; clones refer to the same animation.
#[derive(Clone)]
pub struct Animator {
    shared: Arc<AnimatorShared>,
}

struct AnimatorShared {
    config: AnimatorConfig,
    state: Mutex<AnimatorState>,
    /// Copy-on-write so dispatch iterates a snapshot without holding a lock
    targets: RwLock<TargetList>,
}

/// Mutable state, guarded by a single lock per animator
#[derive(Default)]
struct AnimatorState {
    /// Signed: reflecting a reversal can move the cycle start before the epoch
    start_time: i64,
    cycle_start_time: i64,
    /// Clock reading when paused; `Some` iff paused
    pause_begin: Option<i64>,
    direction: Direction,
    stopping: bool,
    /// `reverse_now()` calls since the last tick
    reverse_pending: u32,
    /// Present from start until the final `end` notification has run
    running: Option<Arc<Completion>>,
    tick_listener: Option<TickListenerId>,
}

/// What one tick decided, computed under the lock and dispatched after it
#[derive(Debug, Default)]
struct TickOutcome {
    fraction: f64,
    reverse: bool,
    repeat: bool,
    finished: bool,
}

impl Animator {
    pub(crate) fn from_config(config: AnimatorConfig) -> Self {
        Self {
            shared: Arc::new(AnimatorShared {
                config,
                state: Mutex::new(AnimatorState::default()),
                targets: RwLock::new(Arc::new(Vec::new())),
            }),
        }
    }

    pub fn builder() -> AnimatorBuilder {
        AnimatorBuilder::new()
    }

    pub(crate) fn config(&self) -> &AnimatorConfig {
        &self.shared.config
    }

    fn source(&self) -> &Arc<dyn TimingSource> {
        &self.shared.config.timing_source
    }

    fn now(&self) -> i64 {
        self.source().now_nanos() as i64
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Start running in the configured start direction
    ///
    /// Fails with [`AnimationError::IllegalState`] if already running.
    pub fn start(&self) -> Result<()> {
        self.start_with(self.config().start_direction)
    }

    /// Start running opposite to the configured start direction
    pub fn start_reverse(&self) -> Result<()> {
        self.start_with(self.config().start_direction.reversed())
    }

    /// Stop (notifying targets) and start again in the start direction
    ///
    /// Behaves as [`start`](Self::start) when not running. Several restart
    /// requests queued before the first takes effect collapse into one.
    pub fn restart(&self) -> Result<()> {
        self.restart_with(self.config().start_direction)
    }

    pub fn restart_reverse(&self) -> Result<()> {
        self.restart_with(self.config().start_direction.reversed())
    }

    /// Stop and deliver `end` to targets; false if not running or already stopping
    pub fn stop(&self) -> bool {
        self.stop_with(true)
    }

    /// Stop without delivering `end`
    pub fn cancel(&self) -> bool {
        self.stop_with(false)
    }

    /// Suspend ticking; elapsed time stops accumulating until `resume()`
    pub fn pause(&self) -> bool {
        let mut state = self.shared.state.lock();
        if state.running.is_none() || state.stopping || state.pause_begin.is_some() {
            return false;
        }
        state.pause_begin = Some(self.now());
        if let Some(id) = state.tick_listener.take() {
            self.source().remove_tick_listener(id);
        }
        tracing::debug!("{}: paused", self);
        true
    }

    pub fn resume(&self) -> bool {
        let mut state = self.shared.state.lock();
        if state.stopping {
            return false;
        }
        let Some(paused_at) = state.pause_begin.take() else {
            return false;
        };

        let paused_for = (self.now() - paused_at).max(0);
        state.start_time += paused_for;
        state.cycle_start_time += paused_for;
        state.tick_listener = Some(self.subscribe());
        tracing::debug!("{}: resumed after {}ns", self, paused_for);
        true
    }

    /// Request a direction change, applied on the next tick
    ///
    /// Returns false when not running, stopping, or paused.
    pub fn reverse_now(&self) -> bool {
        let mut state = self.shared.state.lock();
        if state.running.is_none() || state.stopping || state.pause_begin.is_some() {
            return false;
        }
        state.reverse_pending += 1;
        true
    }

    /// Block until the current run has fully stopped
    ///
    /// Returns immediately when not running. Must not be called from the
    /// timing source's tick context: completion is signalled from there.
    pub fn await_completion(&self) {
        let signal = self.shared.state.lock().running.clone();
        if let Some(signal) = signal {
            signal.wait();
        }
    }

    /// Like [`await_completion`](Self::await_completion) with a timeout
    ///
    /// Returns whether the run completed in time.
    pub fn await_timeout(&self, timeout: Duration) -> bool {
        let signal = self.shared.state.lock().running.clone();
        match signal {
            Some(signal) => signal.wait_for(timeout),
            None => true,
        }
    }

    fn start_with(&self, direction: Direction) -> Result<()> {
        let config = self.config();
        let mut state = self.shared.state.lock();

        if state.running.is_some() {
            return Err(AnimationError::IllegalState(format!(
                "{self} is already running"
            )));
        }
        if self.source().is_disposed() {
            tracing::warn!("{}: starting on a disposed timing source", self);
        }

        let now = self.now();
        state.start_time = now;
        state.cycle_start_time = now + config.start_delay_nanos() as i64;
        state.pause_begin = None;
        state.direction = direction;
        state.stopping = false;
        state.reverse_pending = 0;
        state.running = Some(Arc::new(Completion::new()));

        // Queue begin() ahead of subscribing so it precedes the first timing event
        if !self.shared.targets.read().is_empty() {
            self.schedule_begin();
        }
        state.tick_listener = Some(self.subscribe());

        tracing::debug!("{}: started {:?}", self, direction);
        Ok(())
    }

    fn restart_with(&self, direction: Direction) -> Result<()> {
        if !self.is_running() {
            return self.start_with(direction);
        }

        self.stop_with(true);

        // Queued behind the stop task; the first queued restart to run wins
        let animator = self.clone();
        self.source().submit(Box::new(move || {
            if let Err(err) = animator.start_with(direction) {
                tracing::debug!("{}: queued restart skipped: {}", animator, err);
            }
        }));
        tracing::debug!("{}: restart queued", self);
        Ok(())
    }

    fn stop_with(&self, notify: bool) -> bool {
        let completion = {
            let mut state = self.shared.state.lock();
            let Some(completion) = state.running.clone() else {
                return false;
            };
            if state.stopping {
                return false;
            }
            state.stopping = true;
            if let Some(id) = state.tick_listener.take() {
                self.source().remove_tick_listener(id);
            }
            completion
        };

        tracing::debug!("{}: stopping (notify={})", self, notify);
        let animator = self.clone();
        self.source()
            .submit(Box::new(move || animator.finish_stop(notify, completion)));
        true
    }

    /// Runs in the tick context once a stop has been requested
    fn finish_stop(&self, notify: bool, completion: Arc<Completion>) {
        if self.config().dispose_timing_source {
            self.source().dispose();
        }
        if notify {
            self.notify_targets("end", |target, animator| target.end(animator));
        }
        {
            let mut state = self.shared.state.lock();
            state.running = None;
            state.stopping = false;
            state.pause_begin = None;
            state.reverse_pending = 0;
        }
        completion.complete();
        tracing::debug!("{}: stopped", self);
    }

    fn subscribe(&self) -> TickListenerId {
        let ticker = Arc::new(AnimatorTicker {
            animator: self.clone(),
        });
        self.source().add_tick_listener(ticker)
    }

    fn schedule_begin(&self) {
        let animator = self.clone();
        self.source().submit(Box::new(move || {
            animator.notify_targets("begin", |target, animator| target.begin(animator));
        }));
    }

    // =========================================================================
    // Tick Processing
    // =========================================================================

    fn on_tick(&self, nanos: u64) {
        let Some(outcome) = self.advance(nanos) else {
            return;
        };
        tracing::trace!("{}: tick {:?}", self, outcome);

        if outcome.reverse {
            self.notify_targets("reverse", |target, animator| target.reverse(animator));
        }
        if outcome.repeat {
            self.notify_targets("repeat", |target, animator| target.repeat(animator));
        }
        let fraction = outcome.fraction;
        self.notify_targets("timing_event", |target, animator| {
            target.timing_event(animator, fraction)
        });
        if outcome.finished {
            self.stop_with(true);
        }
    }

    /// Advance the timeline to `nanos`, returning what to dispatch
    fn advance(&self, nanos: u64) -> Option<TickOutcome> {
        let config = self.config();
        let now = nanos as i64;
        let mut state = self.shared.state.lock();

        if state.running.is_none() || state.stopping || state.pause_begin.is_some() {
            return None;
        }
        // Still inside the start delay
        if now < state.cycle_start_time {
            return None;
        }

        let mut outcome = TickOutcome::default();
        let duration = config.duration.as_nanos();

        if state.reverse_pending > 0 {
            if state.reverse_pending % 2 == 1 {
                // Reflect the position: time left in the cycle becomes time elapsed
                if let Some(duration) = duration {
                    let cycle_elapsed = (now - state.cycle_start_time) as u64;
                    let remaining = duration.saturating_sub(cycle_elapsed);
                    state.cycle_start_time = now - remaining as i64;
                }
                state.direction = state.direction.reversed();
            }
            state.reverse_pending = 0;
            outcome.reverse = true;
        }

        let cycle_elapsed = (now - state.cycle_start_time).max(0) as u64;
        let total_elapsed = (now - state.start_time).max(0) as u64;

        let fraction = match duration {
            None => {
                if state.direction.is_forward() {
                    0.0
                } else {
                    1.0
                }
            }
            Some(duration) => {
                let current_cycle =
                    total_elapsed.saturating_sub(config.start_delay_nanos()) / duration;
                let cycles_done = match config.repeat_count {
                    RepeatCount::Times(count) => current_cycle >= u64::from(count),
                    RepeatCount::Infinite => false,
                };

                if cycles_done {
                    outcome.finished = true;
                    match (config.end_behavior, state.direction) {
                        (EndBehavior::Hold, Direction::Forward) => 1.0,
                        (EndBehavior::Hold, Direction::Backward) => 0.0,
                        (EndBehavior::Reset, _) => 0.0,
                    }
                } else if cycle_elapsed > duration {
                    let overflow = cycle_elapsed % duration;
                    state.cycle_start_time = now - overflow as i64;
                    if config.repeat_behavior == RepeatBehavior::Reverse {
                        state.direction = state.direction.reversed();
                    }
                    outcome.repeat = true;

                    let fraction = overflow as f64 / duration as f64;
                    if state.direction.is_forward() {
                        fraction
                    } else {
                        1.0 - fraction
                    }
                } else {
                    let fraction = cycle_elapsed as f64 / duration as f64;
                    let fraction = if state.direction.is_forward() {
                        fraction
                    } else {
                        1.0 - fraction
                    };
                    fraction.clamp(0.0, 1.0)
                }
            }
        };

        outcome.fraction = config.interpolator.interpolate(fraction);
        Some(outcome)
    }

    /// Invoke `callback` on every target, isolating panics per target
    fn notify_targets<F>(&self, event: &str, callback: F)
    where
        F: Fn(&dyn TimingTarget, &Animator),
    {
        let targets = self.shared.targets.read().clone();
        for target in targets.iter() {
            let result = panic::catch_unwind(AssertUnwindSafe(|| callback(target.as_ref(), self)));
            if result.is_err() {
                tracing::error!("{}: timing target panicked in {}; continuing", self, event);
            }
        }
    }

    // =========================================================================
    // Targets
    // =========================================================================

    /// Register a target; duplicates are ignored
    ///
    /// Adding a target to a running animator replays `begin` to all targets
    /// so the newcomer observes a matching begin/end pair.
    pub fn add_target(&self, target: Arc<dyn TimingTarget>) {
        // Held until the push: a concurrent start() either sees the new target
        // or is seen here. Lock order is state, then targets, as in start_with
        let state = self.shared.state.lock();
        let replay_begin = state.running.is_some() && !state.stopping;

        let mut targets = self.shared.targets.write();
        if targets.iter().any(|existing| same_target(existing, &target)) {
            return;
        }
        if replay_begin {
            self.schedule_begin();
        }
        Arc::make_mut(&mut *targets).push(target);
    }

    pub fn add_targets<I>(&self, targets: I)
    where
        I: IntoIterator<Item = Arc<dyn TimingTarget>>,
    {
        for target in targets {
            self.add_target(target);
        }
    }

    /// Returns whether the target was registered
    pub fn remove_target(&self, target: &Arc<dyn TimingTarget>) -> bool {
        let mut targets = self.shared.targets.write();
        let Some(index) = targets.iter().position(|existing| same_target(existing, target)) else {
            return false;
        };
        Arc::make_mut(&mut *targets).remove(index);
        true
    }

    pub fn clear_targets(&self) {
        *self.shared.targets.write() = Arc::new(Vec::new());
    }

    pub fn target_count(&self) -> usize {
        self.shared.targets.read().len()
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// True from `start()` until the final `end` notification has run
    pub fn is_running(&self) -> bool {
        self.shared.state.lock().running.is_some()
    }

    pub fn is_paused(&self) -> bool {
        self.shared.state.lock().pause_begin.is_some()
    }

    /// Direction of the current cycle (start direction when idle)
    pub fn current_direction(&self) -> Direction {
        let state = self.shared.state.lock();
        if state.running.is_some() {
            state.direction
        } else {
            self.config().start_direction
        }
    }

    /// Time spent in the current cycle, excluding pauses
    pub fn cycle_elapsed(&self) -> Duration {
        let state = self.shared.state.lock();
        if state.running.is_none() {
            return Duration::ZERO;
        }
        let now = state.pause_begin.unwrap_or_else(|| self.now());
        Duration::from_nanos((now - state.cycle_start_time).max(0) as u64)
    }

    /// Time since start, excluding pauses
    pub fn total_elapsed(&self) -> Duration {
        let state = self.shared.state.lock();
        if state.running.is_none() {
            return Duration::ZERO;
        }
        let now = state.pause_begin.unwrap_or_else(|| self.now());
        Duration::from_nanos((now - state.start_time).max(0) as u64)
    }

    pub fn duration(&self) -> CycleDuration {
        self.config().duration
    }

    pub fn end_behavior(&self) -> EndBehavior {
        self.config().end_behavior
    }

    pub fn start_direction(&self) -> Direction {
        self.config().start_direction
    }

    pub fn repeat_behavior(&self) -> RepeatBehavior {
        self.config().repeat_behavior
    }

    pub fn repeat_count(&self) -> RepeatCount {
        self.config().repeat_count
    }

    pub fn start_delay(&self) -> Duration {
        self.config().start_delay
    }

    pub fn interpolator(&self) -> &Arc<dyn Interpolator> {
        &self.config().interpolator
    }

    pub fn disposes_timing_source(&self) -> bool {
        self.config().dispose_timing_source
    }

    pub fn debug_name(&self) -> Option<&str> {
        self.config().debug_name.as_deref()
    }

    pub fn timing_source(&self) -> &Arc<dyn TimingSource> {
        self.source()
    }

    /// Whether both handles refer to the same animator
    pub fn ptr_eq(&self, other: &Animator) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl PartialEq for Animator {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Animator {}

impl fmt::Display for Animator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.config().debug_name {
            Some(name) => write!(f, "Animator({name})"),
            None => write!(f, "Animator@{:p}", Arc::as_ptr(&self.shared)),
        }
    }
}

impl fmt::Debug for Animator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let config = self.config();
        f.debug_struct("Animator")
            .field("debug_name", &config.debug_name)
            .field("duration", &config.duration)
            .field("repeat_count", &config.repeat_count)
            .field("repeat_behavior", &config.repeat_behavior)
            .field("end_behavior", &config.end_behavior)
            .field("start_direction", &config.start_direction)
            .field("start_delay", &config.start_delay)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

/// Compare targets by the address of the shared allocation
fn same_target(a: &Arc<dyn TimingTarget>, b: &Arc<dyn TimingTarget>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

/// Tick listener registered with the timing source while running
struct AnimatorTicker {
    animator: Animator,
}

impl TickListener for AnimatorTicker {
    fn tick(&self, _source: &dyn TimingSource, nanos: u64) {
        self.animator.on_tick(nanos);
    }
}

/// One-shot completion signal for a single run
struct Completion {
    done: Mutex<bool>,
    cond: Condvar,
}

impl Completion {
    fn new() -> Self {
        Self {
            done: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    fn complete(&self) {
        *self.done.lock() = true;
        self.cond.notify_all();
    }

    fn wait(&self) {
        let mut done = self.done.lock();
        while !*done {
            self.cond.wait(&mut done);
        }
    }

    fn wait_for(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut done = self.done.lock();
        while !*done {
            if self.cond.wait_until(&mut done, deadline).timed_out() {
                return *done;
            }
        }
        true
    }
}
