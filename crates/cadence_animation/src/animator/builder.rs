//! Animator configuration and builder

use super::Animator;
use crate::error::{AnimationError, Result};
use crate::interpolator::{linear, Interpolator};
use crate::source::TimingSource;
use crate::target::TimingTarget;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Default Timing Source
// ============================================================================

/// Source used by [`AnimatorBuilder::new`] when none is given explicitly
static DEFAULT_TIMING_SOURCE: RwLock<Option<Arc<dyn TimingSource>>> = RwLock::new(None);

/// Set the timing source picked up by builders created with [`AnimatorBuilder::new`]
///
/// Typically called once at startup after creating and initializing the
/// application's timing source. Replaces any previous default.
pub fn set_default_timing_source(source: Arc<dyn TimingSource>) {
    *DEFAULT_TIMING_SOURCE.write() = Some(source);
}

/// The current default timing source, if one has been set
pub fn default_timing_source() -> Option<Arc<dyn TimingSource>> {
    DEFAULT_TIMING_SOURCE.read().clone()
}

pub fn clear_default_timing_source() {
    *DEFAULT_TIMING_SOURCE.write() = None;
}

// ============================================================================
// Configuration Types
// ============================================================================

/// Length of one cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CycleDuration {
    Finite(Duration),
    /// The cycle never completes; progress stays at its start
    Infinite,
}

impl CycleDuration {
    /// Cycle length in nanoseconds, `None` when infinite
    pub fn as_nanos(&self) -> Option<u64> {
        match self {
            Self::Finite(duration) => Some(duration.as_nanos() as u64),
            Self::Infinite => None,
        }
    }
}

impl Default for CycleDuration {
    fn default() -> Self {
        Self::Finite(Duration::from_secs(1))
    }
}

impl From<Duration> for CycleDuration {
    fn from(duration: Duration) -> Self {
        Self::Finite(duration)
    }
}

/// How many cycles to run before stopping
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RepeatCount {
    Times(u32),
    Infinite,
}

impl Default for RepeatCount {
    fn default() -> Self {
        Self::Times(1)
    }
}

/// Direction a cycle runs in
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    /// Fraction runs 0 → 1
    #[default]
    Forward,
    /// Fraction runs 1 → 0
    Backward,
}

impl Direction {
    pub fn reversed(self) -> Self {
        match self {
            Self::Forward => Self::Backward,
            Self::Backward => Self::Forward,
        }
    }

    pub fn is_forward(self) -> bool {
        self == Self::Forward
    }
}

/// What the final timing event reports once all cycles are done
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EndBehavior {
    /// Stay at the end of the last cycle
    #[default]
    Hold,
    /// Jump back to fraction 0
    Reset,
}

/// What happens at a cycle boundary
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RepeatBehavior {
    /// Restart the next cycle in the same direction
    Loop,
    /// Run the next cycle in the opposite direction
    #[default]
    Reverse,
}

/// Immutable animator configuration, fixed at build time
#[derive(Clone)]
pub(crate) struct AnimatorConfig {
    pub(crate) duration: CycleDuration,
    pub(crate) end_behavior: EndBehavior,
    pub(crate) start_direction: Direction,
    pub(crate) repeat_behavior: RepeatBehavior,
    pub(crate) repeat_count: RepeatCount,
    pub(crate) start_delay: Duration,
    pub(crate) interpolator: Arc<dyn Interpolator>,
    pub(crate) dispose_timing_source: bool,
    pub(crate) debug_name: Option<String>,
    pub(crate) timing_source: Arc<dyn TimingSource>,
}

impl AnimatorConfig {
    pub(crate) fn start_delay_nanos(&self) -> u64 {
        self.start_delay.as_nanos() as u64
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builds an [`Animator`]
///
/// Defaults: one-second cycle, one repetition, `RepeatBehavior::Reverse`,
/// `EndBehavior::Hold`, `Direction::Forward`, no start delay, linear
/// interpolation.
///
/// ```ignore
/// let animator = AnimatorBuilder::with_source(source)
///     .duration(Duration::from_millis(250))
///     .repeat_count(RepeatCount::Times(3))
///     .repeat_behavior(RepeatBehavior::Loop)
///     .add_target(target)
///     .build()?;
/// ```
pub struct AnimatorBuilder {
    duration: CycleDuration,
    end_behavior: EndBehavior,
    start_direction: Direction,
    repeat_behavior: RepeatBehavior,
    repeat_count: RepeatCount,
    start_delay: Duration,
    interpolator: Arc<dyn Interpolator>,
    dispose_timing_source: bool,
    debug_name: Option<String>,
    timing_source: Option<Arc<dyn TimingSource>>,
    targets: Vec<Arc<dyn TimingTarget>>,
}

impl AnimatorBuilder {
    /// Builder using the default timing source, if one is set
    pub fn new() -> Self {
        Self {
            duration: CycleDuration::default(),
            end_behavior: EndBehavior::default(),
            start_direction: Direction::default(),
            repeat_behavior: RepeatBehavior::default(),
            repeat_count: RepeatCount::default(),
            start_delay: Duration::ZERO,
            interpolator: linear(),
            dispose_timing_source: false,
            debug_name: None,
            timing_source: default_timing_source(),
            targets: Vec::new(),
        }
    }

    pub fn with_source(source: Arc<dyn TimingSource>) -> Self {
        Self::new().timing_source(source)
    }

    /// Builder pre-filled with another animator's configuration
    ///
    /// Targets and runtime state are not copied.
    pub fn from_template(animator: &Animator) -> Self {
        let config = animator.config();
        Self {
            duration: config.duration,
            end_behavior: config.end_behavior,
            start_direction: config.start_direction,
            repeat_behavior: config.repeat_behavior,
            repeat_count: config.repeat_count,
            start_delay: config.start_delay,
            interpolator: Arc::clone(&config.interpolator),
            dispose_timing_source: config.dispose_timing_source,
            debug_name: config.debug_name.clone(),
            timing_source: Some(Arc::clone(&config.timing_source)),
            targets: Vec::new(),
        }
    }

    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = CycleDuration::Finite(duration);
        self
    }

    pub fn infinite_duration(mut self) -> Self {
        self.duration = CycleDuration::Infinite;
        self
    }

    pub fn cycle_duration(mut self, duration: CycleDuration) -> Self {
        self.duration = duration;
        self
    }

    pub fn end_behavior(mut self, end_behavior: EndBehavior) -> Self {
        self.end_behavior = end_behavior;
        self
    }

    pub fn start_direction(mut self, direction: Direction) -> Self {
        self.start_direction = direction;
        self
    }

    pub fn repeat_behavior(mut self, repeat_behavior: RepeatBehavior) -> Self {
        self.repeat_behavior = repeat_behavior;
        self
    }

    pub fn repeat_count(mut self, repeat_count: RepeatCount) -> Self {
        self.repeat_count = repeat_count;
        self
    }

    pub fn repeat_infinitely(self) -> Self {
        self.repeat_count(RepeatCount::Infinite)
    }

    pub fn start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    /// Interpolator applied to each cycle's fraction before dispatch
    pub fn interpolator(mut self, interpolator: Arc<dyn Interpolator>) -> Self {
        self.interpolator = interpolator;
        self
    }

    /// Dispose the timing source once the animator stops
    pub fn dispose_timing_source(mut self, dispose: bool) -> Self {
        self.dispose_timing_source = dispose;
        self
    }

    pub fn debug_name(mut self, name: impl Into<String>) -> Self {
        self.debug_name = Some(name.into());
        self
    }

    pub fn timing_source(mut self, source: Arc<dyn TimingSource>) -> Self {
        self.timing_source = Some(source);
        self
    }

    pub fn add_target(mut self, target: Arc<dyn TimingTarget>) -> Self {
        self.targets.push(target);
        self
    }

    pub fn add_targets<I>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn TimingTarget>>,
    {
        self.targets.extend(targets);
        self
    }

    pub fn build(self) -> Result<Animator> {
        if let CycleDuration::Finite(duration) = self.duration {
            if duration.is_zero() {
                return Err(AnimationError::invalid(
                    "duration must be at least 1ns or infinite",
                ));
            }
            if duration.as_nanos() > i64::MAX as u128 {
                return Err(AnimationError::invalid(format!(
                    "duration {duration:?} is too long"
                )));
            }
        }
        if self.repeat_count == RepeatCount::Times(0) {
            return Err(AnimationError::invalid(
                "repeat count must be at least 1 or infinite",
            ));
        }
        if self.start_delay.as_nanos() > u128::from(u64::MAX / 2) {
            return Err(AnimationError::invalid(format!(
                "start delay {:?} is too long",
                self.start_delay
            )));
        }
        let Some(timing_source) = self.timing_source else {
            return Err(AnimationError::invalid(
                "a timing source is required (set one on the builder or a default)",
            ));
        };

        let config = AnimatorConfig {
            duration: self.duration,
            end_behavior: self.end_behavior,
            start_direction: self.start_direction,
            repeat_behavior: self.repeat_behavior,
            repeat_count: self.repeat_count,
            start_delay: self.start_delay,
            interpolator: self.interpolator,
            dispose_timing_source: self.dispose_timing_source,
            debug_name: self.debug_name,
            timing_source,
        };

        let animator = Animator::from_config(config);
        animator.add_targets(self.targets);
        Ok(animator)
    }
}

impl Default for AnimatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
