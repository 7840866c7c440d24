//! Interpolators
//!
//! An interpolator remaps a normalized fraction in [0, 1] to another fraction,
//! giving an animation non-linear pacing. Interpolators are pure and are
//! shared between animators behind an `Arc`.
//!
//! ```ignore
//! use cadence_animation::{Interpolator, SplineInterpolator};
//!
//! let ease = SplineInterpolator::new(0.42, 0.0, 0.58, 1.0)?;
//! let eased = ease.interpolate(0.25);
//! ```

use crate::error::{AnimationError, Result};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Maps a fraction in [0, 1] to a (possibly different) fraction
///
/// Implementations must be free of side effects; the same instance may be
/// invoked concurrently from several animators.
pub trait Interpolator: Send + Sync {
    fn interpolate(&self, fraction: f64) -> f64;
}

impl<F> Interpolator for F
where
    F: Fn(f64) -> f64 + Send + Sync,
{
    fn interpolate(&self, fraction: f64) -> f64 {
        self(fraction)
    }
}

/// Shared linear interpolator, the default wherever none is specified
pub fn linear() -> Arc<dyn Interpolator> {
    static LINEAR: OnceLock<Arc<dyn Interpolator>> = OnceLock::new();
    LINEAR
        .get_or_init(|| Arc::new(LinearInterpolator) as Arc<dyn Interpolator>)
        .clone()
}

// ============================================================================
// Linear / Discrete
// ============================================================================

/// Identity mapping
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LinearInterpolator;

impl Interpolator for LinearInterpolator {
    fn interpolate(&self, fraction: f64) -> f64 {
        fraction
    }
}

/// Holds the start of a segment until the very end, then jumps
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DiscreteInterpolator;

impl Interpolator for DiscreteInterpolator {
    fn interpolate(&self, fraction: f64) -> f64 {
        if fraction < 1.0 {
            0.0
        } else {
            1.0
        }
    }
}

// ============================================================================
// Acceleration
// ============================================================================

/// Constant acceleration, cruise, then constant deceleration
///
/// `acceleration` is the fraction of the timeline spent speeding up and
/// `deceleration` the fraction spent slowing down. The cruise rate is chosen
/// so the mapping still ends at 1.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AccelerationInterpolator {
    acceleration: f64,
    deceleration: f64,
}

impl AccelerationInterpolator {
    pub fn new(acceleration: f64, deceleration: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&acceleration) {
            return Err(AnimationError::invalid(format!(
                "acceleration must be in [0, 1], got {acceleration}"
            )));
        }
        if !(0.0..=1.0).contains(&deceleration) {
            return Err(AnimationError::invalid(format!(
                "deceleration must be in [0, 1], got {deceleration}"
            )));
        }
        if acceleration + deceleration > 1.0 {
            return Err(AnimationError::invalid(format!(
                "acceleration + deceleration must not exceed 1, got {}",
                acceleration + deceleration
            )));
        }
        Ok(Self {
            acceleration,
            deceleration,
        })
    }

    pub fn acceleration(&self) -> f64 {
        self.acceleration
    }

    pub fn deceleration(&self) -> f64 {
        self.deceleration
    }
}

impl Interpolator for AccelerationInterpolator {
    fn interpolate(&self, fraction: f64) -> f64 {
        let accel = self.acceleration;
        let decel = self.deceleration;
        let run_rate = 1.0 / (1.0 - accel / 2.0 - decel / 2.0);

        if fraction < accel {
            let average_rate = run_rate * (fraction / accel) / 2.0;
            fraction * average_rate
        } else if fraction > 1.0 - decel {
            let into_decel = fraction - (1.0 - decel);
            let decel_progress = into_decel / decel;
            run_rate * (1.0 - accel / 2.0 - decel + into_decel * (2.0 - decel_progress) / 2.0)
        } else {
            run_rate * (fraction - accel / 2.0)
        }
    }
}

// ============================================================================
// Spline (cubic Bézier)
// ============================================================================

/// Cubic Bézier timing curve anchored at (0, 0) and (1, 1)
///
/// Equivalent to CSS `cubic-bezier(x1, y1, x2, y2)` with all control
/// coordinates restricted to [0, 1].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SplineInterpolator {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
}

impl SplineInterpolator {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Result<Self> {
        for (name, value) in [("x1", x1), ("y1", y1), ("x2", x2), ("y2", y2)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(AnimationError::invalid(format!(
                    "spline control point {name} must be in [0, 1], got {value}"
                )));
            }
        }
        Ok(Self { x1, y1, x2, y2 })
    }

    /// Find the curve parameter whose x coordinate is `target_x` (Newton-Raphson)
    fn solve_x(&self, target_x: f64) -> f64 {
        let mut t = target_x;
        for _ in 0..8 {
            let x = bezier(self.x1, self.x2, t) - target_x;
            if x.abs() < 1e-7 {
                break;
            }
            let dx = bezier_derivative(self.x1, self.x2, t);
            if dx.abs() < 1e-7 {
                break;
            }
            t = (t - x / dx).clamp(0.0, 1.0);
        }
        t
    }
}

impl Interpolator for SplineInterpolator {
    fn interpolate(&self, fraction: f64) -> f64 {
        if fraction <= 0.0 {
            return 0.0;
        }
        if fraction >= 1.0 {
            return 1.0;
        }
        let t = self.solve_x(fraction);
        bezier(self.y1, self.y2, t)
    }
}

/// One coordinate of the curve: 3(1-t)²t·p1 + 3(1-t)t²·p2 + t³
#[inline]
fn bezier(p1: f64, p2: f64, t: f64) -> f64 {
    let mt = 1.0 - t;
    3.0 * mt * mt * t * p1 + 3.0 * mt * t * t * p2 + t * t * t
}

#[inline]
fn bezier_derivative(p1: f64, p2: f64, t: f64) -> f64 {
    let mt = 1.0 - t;
    3.0 * mt * mt * p1 + 6.0 * mt * t * (p2 - p1) + 3.0 * t * t * (1.0 - p2)
}

/// Debug wrapper for `Arc<dyn Interpolator>` fields
pub(crate) struct InterpolatorDebug<'a>(pub(crate) &'a Option<Arc<dyn Interpolator>>);

impl fmt::Debug for InterpolatorDebug<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(_) => f.write_str("Some(<interpolator>)"),
            None => f.write_str("None"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_linear_is_identity() {
        for f in [0.0, 0.1, 0.5, 0.99, 1.0] {
            assert_eq!(LinearInterpolator.interpolate(f), f);
            assert_eq!(linear().interpolate(f), f);
        }
    }

    #[test]
    fn test_discrete_jumps_at_end() {
        assert_eq!(DiscreteInterpolator.interpolate(0.0), 0.0);
        assert_eq!(DiscreteInterpolator.interpolate(0.999), 0.0);
        assert_eq!(DiscreteInterpolator.interpolate(1.0), 1.0);
    }

    #[test]
    fn test_acceleration_endpoints_and_shape() {
        let interp = AccelerationInterpolator::new(0.25, 0.25).unwrap();
        assert!(approx_eq(interp.interpolate(0.0), 0.0));
        assert!(approx_eq(interp.interpolate(1.0), 1.0));
        assert!(approx_eq(interp.interpolate(0.5), 0.5));
        // Slower than linear while accelerating, faster once cruising
        assert!(interp.interpolate(0.1) < 0.1);
        assert!(interp.interpolate(0.9) > 0.9);
    }

    #[test]
    fn test_acceleration_validation() {
        assert!(AccelerationInterpolator::new(-0.1, 0.0).is_err());
        assert!(AccelerationInterpolator::new(0.0, 1.5).is_err());
        assert!(AccelerationInterpolator::new(0.6, 0.6).is_err());
        assert!(AccelerationInterpolator::new(0.5, 0.5).is_ok());
    }

    #[test]
    fn test_spline_boundaries() {
        let ease = SplineInterpolator::new(0.42, 0.0, 0.58, 1.0).unwrap();
        assert_eq!(ease.interpolate(0.0), 0.0);
        assert_eq!(ease.interpolate(1.0), 1.0);
        assert!(approx_eq(ease.interpolate(0.5), 0.5));
        assert!(ease.interpolate(0.2) < 0.2);
    }

    #[test]
    fn test_spline_linear_controls_match_linear() {
        let spline = SplineInterpolator::new(0.0, 0.0, 1.0, 1.0).unwrap();
        for f in [0.1, 0.3, 0.6, 0.9] {
            assert!(approx_eq(spline.interpolate(f), f));
        }
    }

    #[test]
    fn test_spline_validation() {
        assert!(SplineInterpolator::new(1.2, 0.0, 0.5, 1.0).is_err());
        assert!(SplineInterpolator::new(0.2, -0.1, 0.5, 1.0).is_err());
    }

    #[test]
    fn test_closure_interpolator() {
        let squared = |f: f64| f * f;
        assert_eq!(squared.interpolate(0.5), 0.25);
    }
}
