//! Timing targets
//!
//! A [`TimingTarget`] receives an animator's lifecycle callbacks. All
//! callbacks run in the timing source's tick context, in registration order.
//! Every method has an empty default body, so implementations override only
//! what they need.

use crate::animator::Animator;
use crate::keyframes::KeyFrames;
use parking_lot::RwLock;
use std::sync::Arc;

/// Listener for animation lifecycle events
pub trait TimingTarget: Send + Sync {
    /// The animation started (or a target joined a running animation)
    fn begin(&self, _animator: &Animator) {}

    /// The animation stopped, naturally or through `stop()`
    fn end(&self, _animator: &Animator) {}

    /// A new cycle started
    fn repeat(&self, _animator: &Animator) {}

    /// `reverse_now()` took effect
    fn reverse(&self, _animator: &Animator) {}

    /// Progress update; `fraction` has been through the cycle interpolator
    fn timing_event(&self, _animator: &Animator, _fraction: f64) {}
}

type Setter<T> = Box<dyn Fn(T) + Send + Sync>;
type Getter<T> = Box<dyn Fn() -> T + Send + Sync>;

/// Drives a property through key frames
///
/// The property is reached through caller-supplied closures rather than by
/// name. Each timing event resolves the key frames at the event's fraction
/// and hands the value to the setter.
///
/// ```ignore
/// let opacity = Arc::new(Mutex::new(0.0));
/// let target = {
///     let opacity = opacity.clone();
///     PropertySetter::new(KeyFrames::from_values([0.0, 1.0])?, move |v| *opacity.lock() = v)
/// };
/// animator.add_target(Arc::new(target));
/// ```
pub struct PropertySetter<T> {
    keyframes: KeyFrames<T>,
    active: RwLock<KeyFrames<T>>,
    setter: Setter<T>,
    getter: Option<Getter<T>>,
}

impl<T> PropertySetter<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new<S>(keyframes: KeyFrames<T>, setter: S) -> Self
    where
        S: Fn(T) + Send + Sync + 'static,
    {
        Self {
            active: RwLock::new(keyframes.clone()),
            keyframes,
            setter: Box::new(setter),
            getter: None,
        }
    }

    /// Animate from the property's current value
    ///
    /// On every `begin`, the first frame is replaced by the value read through
    /// `getter`; the remaining frames are the destinations.
    pub fn to<G, S>(keyframes: KeyFrames<T>, getter: G, setter: S) -> Self
    where
        G: Fn() -> T + Send + Sync + 'static,
        S: Fn(T) + Send + Sync + 'static,
    {
        Self {
            active: RwLock::new(keyframes.clone()),
            keyframes,
            setter: Box::new(setter),
            getter: Some(Box::new(getter)),
        }
    }

    /// Key frames in use for the current run
    pub fn keyframes(&self) -> KeyFrames<T> {
        self.active.read().clone()
    }

    pub fn into_target(self) -> Arc<dyn TimingTarget> {
        Arc::new(self)
    }
}

impl<T> TimingTarget for PropertySetter<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn begin(&self, _animator: &Animator) {
        if let Some(getter) = &self.getter {
            let current = getter();
            *self.active.write() = self.keyframes.with_first_value(current);
        }
    }

    fn timing_event(&self, _animator: &Animator, fraction: f64) {
        let value = self.active.read().interpolated_value_at(fraction);
        (self.setter)(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animator::AnimatorBuilder;
    use crate::source::ManualTimingSource;
    use parking_lot::Mutex;

    fn animator() -> Animator {
        AnimatorBuilder::with_source(Arc::new(ManualTimingSource::new()))
            .build()
            .unwrap()
    }

    #[test]
    fn test_setter_applies_interpolated_values() {
        let animator = animator();
        let applied = Arc::new(Mutex::new(Vec::new()));
        let setter = {
            let applied = Arc::clone(&applied);
            PropertySetter::new(KeyFrames::from_values([0.0, 10.0, 30.0]).unwrap(), move |v| {
                applied.lock().push(v)
            })
        };

        setter.begin(&animator);
        for fraction in [0.0, 0.25, 0.5, 0.75, 1.0] {
            setter.timing_event(&animator, fraction);
        }
        assert_eq!(*applied.lock(), vec![0.0, 5.0, 10.0, 20.0, 30.0]);
    }

    #[test]
    fn test_to_starts_from_current_value() {
        let animator = animator();
        let property = Arc::new(Mutex::new(40));
        let setter = {
            let read = Arc::clone(&property);
            let write = Arc::clone(&property);
            PropertySetter::to(
                KeyFrames::from_values([0, 100]).unwrap(),
                move || *read.lock(),
                move |v| *write.lock() = v,
            )
        };

        setter.begin(&animator);
        assert_eq!(*setter.keyframes().frame(0).unwrap().value(), 40);
        setter.timing_event(&animator, 0.5);
        assert_eq!(*property.lock(), 70);

        // Each begin re-reads the property
        *property.lock() = 0;
        setter.begin(&animator);
        setter.timing_event(&animator, 0.5);
        assert_eq!(*property.lock(), 50);
    }

    #[test]
    fn test_default_callbacks_are_no_ops() {
        struct Quiet;
        impl TimingTarget for Quiet {}

        let animator = animator();
        let quiet = Quiet;
        quiet.begin(&animator);
        quiet.repeat(&animator);
        quiet.reverse(&animator);
        quiet.timing_event(&animator, 0.5);
        quiet.end(&animator);
    }
}
