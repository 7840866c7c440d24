//! Cadence Animation
//!
//! Timeline-driven animators, key frames, and pluggable timing sources.
//!
//! # Features
//!
//! - **Animators**: Cycle duration, repeat count, loop/reverse repeat, start delay,
//!   pause/resume, and mid-flight direction changes
//! - **Timing Sources**: Tick providers with a serialized one-shot task queue;
//!   a background-thread source and a manually driven source are included
//! - **Key Frames**: Multi-segment value tracks with per-segment interpolators
//! - **Evaluators**: Type-keyed value blending through an injectable registry
//! - **Interpolators**: Linear, discrete, acceleration/deceleration, and cubic splines
//! - **Property Setters**: Drive any value through caller-supplied closures
//! - **Triggers**: Start animations from application events or other animators
//!
//! # Example
//!
//! ```ignore
//! use cadence_animation::{AnimatorBuilder, KeyFrames, PropertySetter, ThreadTimingSource, TimingSource};
//!
//! let source = ThreadTimingSource::with_fps(60);
//! source.init();
//!
//! let opacity = PropertySetter::new(KeyFrames::from_values([0.0, 1.0])?, |v| apply_opacity(v));
//! let animator = AnimatorBuilder::with_source(source)
//!     .duration(Duration::from_millis(300))
//!     .add_target(opacity.into_target())
//!     .build()?;
//!
//! animator.start()?;
//! animator.await_completion();
//! ```

pub mod animator;
pub mod error;
pub mod evaluator;
pub mod interpolator;
pub mod keyframes;
pub mod source;
pub mod target;
pub mod trigger;

pub use animator::{
    clear_default_timing_source, default_timing_source, set_default_timing_source, Animator,
    AnimatorBuilder, CycleDuration, Direction, EndBehavior, RepeatBehavior, RepeatCount,
};
pub use error::{AnimationError, Result};
pub use evaluator::{ComponentEvaluator, Evaluator, EvaluatorRegistry, NumericEvaluator};
pub use interpolator::{
    linear, AccelerationInterpolator, DiscreteInterpolator, Interpolator, LinearInterpolator,
    SplineInterpolator,
};
pub use keyframes::{Frame, KeyFrames, KeyFramesBuilder};
pub use source::{
    ManualTimingSource, Task, ThreadTimingSource, TickDispatcher, TickListener, TickListenerId,
    TimingSource,
};
pub use target::{PropertySetter, TimingTarget};
pub use trigger::{EventTrigger, TimingTrigger, TimingTriggerEvent, Trigger};
