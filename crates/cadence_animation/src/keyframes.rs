//! Key frames
//!
//! A [`KeyFrames<T>`] is an immutable, ordered list of [`Frame`]s plus one
//! [`Evaluator<T>`]. Given a global fraction it finds the segment the fraction
//! falls in, remaps the local fraction with the interpolator of the frame that
//! ends the segment, then blends the two boundary values with the evaluator.
//!
//! ```ignore
//! use cadence_animation::KeyFrames;
//!
//! let frames = KeyFrames::builder()
//!     .add_frame(0.0)
//!     .add_frame_at(80.0, 0.25)
//!     .add_frame(100.0)
//!     .build()?;
//!
//! let value = frames.interpolated_value_at(0.5);
//! ```

use crate::error::{AnimationError, Result};
use crate::evaluator::{Evaluator, EvaluatorRegistry};
use crate::interpolator::{linear, Interpolator, InterpolatorDebug};
use std::fmt;
use std::sync::Arc;

/// One anchor point: a value at a time fraction
///
/// `interpolator` governs the segment leading *into* this frame. The first
/// frame of a built [`KeyFrames`] never carries one.
#[derive(Clone)]
pub struct Frame<T> {
    value: T,
    time_fraction: Option<f64>,
    interpolator: Option<Arc<dyn Interpolator>>,
}

impl<T> Frame<T> {
    /// A frame whose time fraction is computed by the builder
    pub fn new(value: T) -> Self {
        Self {
            value,
            time_fraction: None,
            interpolator: None,
        }
    }

    pub fn at(value: T, time_fraction: f64) -> Self {
        Self {
            value,
            time_fraction: Some(time_fraction),
            interpolator: None,
        }
    }

    pub fn with_interpolator(mut self, interpolator: Arc<dyn Interpolator>) -> Self {
        self.interpolator = Some(interpolator);
        self
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    /// Time fraction of the frame; always set on frames of a built [`KeyFrames`]
    pub fn time_fraction(&self) -> f64 {
        self.time_fraction.unwrap_or(0.0)
    }

    pub fn interpolator(&self) -> Option<&Arc<dyn Interpolator>> {
        self.interpolator.as_ref()
    }
}

impl<T: fmt::Debug> fmt::Debug for Frame<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("value", &self.value)
            .field("time_fraction", &self.time_fraction)
            .field("interpolator", &InterpolatorDebug(&self.interpolator))
            .finish()
    }
}

/// An immutable sequence of key frames with the evaluator that blends them
///
/// Cloning is cheap; the frames are shared.
pub struct KeyFrames<T> {
    frames: Arc<[Frame<T>]>,
    evaluator: Arc<dyn Evaluator<T>>,
}

impl<T> Clone for KeyFrames<T> {
    fn clone(&self) -> Self {
        Self {
            frames: Arc::clone(&self.frames),
            evaluator: Arc::clone(&self.evaluator),
        }
    }
}

impl<T: 'static> KeyFrames<T> {
    pub fn builder() -> KeyFramesBuilder<T> {
        KeyFramesBuilder::new()
    }

    /// Evenly spaced frames using the evaluator registered for `T`
    pub fn from_values<I>(values: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
    {
        KeyFramesBuilder::new().add_frames(values).build()
    }
}

impl<T> KeyFrames<T> {
    /// Number of frames (always at least 2)
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frame(&self, index: usize) -> Option<&Frame<T>> {
        self.frames.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Frame<T>> {
        self.frames.iter()
    }

    pub fn evaluator(&self) -> &Arc<dyn Evaluator<T>> {
        &self.evaluator
    }

    /// Index of the segment containing `fraction`
    ///
    /// Segment `i` spans `(frame[i].time, frame[i+1].time]`, except segment 0
    /// which is closed at both ends. A fraction exactly on a key time belongs
    /// to the segment ending there. Out-of-range fractions clamp to the first
    /// or last segment.
    pub fn frame_index_at(&self, fraction: f64) -> usize {
        for i in 1..self.frames.len() {
            if fraction <= self.frames[i].time_fraction() {
                return i - 1;
            }
        }
        self.frames.len() - 2
    }

    /// Value at `fraction`, interpolated within its segment
    pub fn interpolated_value_at(&self, fraction: f64) -> T {
        let interval = self.frame_index_at(fraction);
        let start = &self.frames[interval];
        let end = &self.frames[interval + 1];

        let t0 = start.time_fraction();
        let t1 = end.time_fraction();
        let local = if t1 > t0 {
            (fraction - t0) / (t1 - t0)
        } else {
            1.0
        };

        let eased = match &end.interpolator {
            Some(interpolator) => interpolator.interpolate(local),
            None => local,
        };
        let eased = eased.clamp(0.0, 1.0);

        self.evaluator.evaluate(&start.value, &end.value, eased)
    }
}

impl<T: Clone> KeyFrames<T> {
    /// Copy of these key frames with the first value replaced
    pub fn with_first_value(&self, value: T) -> Self {
        let mut frames: Vec<Frame<T>> = self.frames.to_vec();
        frames[0].value = value;
        Self {
            frames: frames.into(),
            evaluator: Arc::clone(&self.evaluator),
        }
    }
}

impl<'a, T> IntoIterator for &'a KeyFrames<T> {
    type Item = &'a Frame<T>;
    type IntoIter = std::slice::Iter<'a, Frame<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.iter()
    }
}

impl<T: fmt::Debug> fmt::Debug for KeyFrames<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyFrames")
            .field("frames", &self.frames)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Staging area that validates and normalizes frames into [`KeyFrames`]
pub struct KeyFramesBuilder<T> {
    values: Vec<T>,
    time_fractions: Vec<Option<f64>>,
    interpolators: Vec<Option<Arc<dyn Interpolator>>>,
    interpolator: Option<Arc<dyn Interpolator>>,
    evaluator: Option<Arc<dyn Evaluator<T>>>,
    registry: Option<Arc<EvaluatorRegistry>>,
}

impl<T: 'static> KeyFramesBuilder<T> {
    pub fn new() -> Self {
        Self {
            values: Vec::new(),
            time_fractions: Vec::new(),
            interpolators: Vec::new(),
            interpolator: None,
            evaluator: None,
            registry: None,
        }
    }

    /// Builder whose first frame holds `value`
    pub fn starting_at(value: T) -> Self {
        Self::new().add_frame(value)
    }

    pub fn add_frame(self, value: T) -> Self {
        self.push(value, None, None)
    }

    pub fn add_frame_at(self, value: T, time_fraction: f64) -> Self {
        self.push(value, Some(time_fraction), None)
    }

    pub fn add_frame_with(self, value: T, interpolator: Arc<dyn Interpolator>) -> Self {
        self.push(value, None, Some(interpolator))
    }

    pub fn add_frame_at_with(
        self,
        value: T,
        time_fraction: f64,
        interpolator: Arc<dyn Interpolator>,
    ) -> Self {
        self.push(value, Some(time_fraction), Some(interpolator))
    }

    /// Append a pre-built frame, keeping its time fraction and interpolator
    pub fn add_keyframe(self, frame: Frame<T>) -> Self {
        self.push(frame.value, frame.time_fraction, frame.interpolator)
    }

    pub fn add_frames<I>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        for value in values {
            self = self.add_frame(value);
        }
        self
    }

    /// Interpolator applied to every segment, overriding per-frame ones
    pub fn interpolator(mut self, interpolator: Arc<dyn Interpolator>) -> Self {
        self.interpolator = Some(interpolator);
        self
    }

    pub fn evaluator(mut self, evaluator: Arc<dyn Evaluator<T>>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    /// Registry consulted when no explicit evaluator is set
    pub fn registry(mut self, registry: Arc<EvaluatorRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn frame_count(&self) -> usize {
        self.values.len()
    }

    fn push(
        mut self,
        value: T,
        time_fraction: Option<f64>,
        interpolator: Option<Arc<dyn Interpolator>>,
    ) -> Self {
        self.values.push(value);
        self.time_fractions.push(time_fraction);
        self.interpolators.push(interpolator);
        self
    }

    pub fn build(self) -> Result<KeyFrames<T>> {
        let count = self.values.len();
        if count < 2 {
            return Err(AnimationError::invalid(format!(
                "key frames need at least 2 frames, got {count}"
            )));
        }

        let mut fractions = self.time_fractions;
        fractions[0] = Some(0.0);
        fractions[count - 1] = Some(1.0);
        for (index, fraction) in fractions.iter().enumerate() {
            if let Some(fraction) = fraction {
                if !fraction.is_finite() {
                    return Err(AnimationError::invalid(format!(
                        "frame {index} has a non-finite time fraction"
                    )));
                }
            }
        }
        let fractions = fill_gaps(&fractions);

        let mut frames = Vec::with_capacity(count);
        let per_frame = self.interpolators.into_iter();
        for (index, ((value, time_fraction), interpolator)) in self
            .values
            .into_iter()
            .zip(fractions)
            .zip(per_frame)
            .enumerate()
        {
            let interpolator = if index == 0 {
                None
            } else {
                Some(
                    self.interpolator
                        .clone()
                        .or(interpolator)
                        .unwrap_or_else(linear),
                )
            };
            frames.push(Frame {
                value,
                time_fraction: Some(time_fraction),
                interpolator,
            });
        }

        for window in frames.windows(2) {
            let previous = window[0].time_fraction();
            let current = window[1].time_fraction();
            if current < previous {
                return Err(AnimationError::invalid(format!(
                    "time fractions must not decrease ({previous} followed by {current})"
                )));
            }
        }

        let evaluator = match self.evaluator {
            Some(evaluator) => evaluator,
            None => {
                let found = match &self.registry {
                    Some(registry) => registry.lookup::<T>(),
                    None => EvaluatorRegistry::global().lookup::<T>(),
                };
                found.ok_or(AnimationError::NoEvaluatorFound {
                    type_name: std::any::type_name::<T>(),
                })?
            }
        };

        Ok(KeyFrames {
            frames: frames.into(),
            evaluator,
        })
    }
}

impl<T: 'static> Default for KeyFramesBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Linearly distribute unset fractions between their nearest set neighbours
///
/// The first and last entries must be set.
fn fill_gaps(fractions: &[Option<f64>]) -> Vec<f64> {
    let mut filled = vec![0.0; fractions.len()];
    let mut prev_index = 0;
    let mut prev = fractions[0].unwrap_or(0.0);
    filled[0] = prev;

    for (index, fraction) in fractions.iter().enumerate().skip(1) {
        let Some(current) = *fraction else {
            continue;
        };
        let run = index - prev_index - 1;
        for j in 1..=run {
            filled[prev_index + j] = prev + j as f64 * (current - prev) / (run + 1) as f64;
        }
        filled[index] = current;
        prev_index = index;
        prev = current;
    }
    filled
}
