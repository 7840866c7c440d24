//! Triggers
//!
//! A trigger starts an animator in response to an event. [`EventTrigger`]
//! reacts to any comparable event value fed to it by the application, and
//! [`TimingTrigger`] reacts to the lifecycle of another animator, which makes
//! it the building block for sequencing animations.
//!
//! With auto-reverse, a trigger pairs an event with its opposite (hover in /
//! hover out, begin / end): the event plays the animation forward and the
//! opposite plays it backward from wherever it currently is.
//!
//! ```ignore
//! #[derive(PartialEq)]
//! enum Hover { Enter, Leave }
//!
//! let trigger = EventTrigger::with_auto_reverse(animator, Hover::Enter, Hover::Leave);
//! trigger.handle(&Hover::Enter)?;
//! ```

use crate::animator::Animator;
use crate::error::Result;
use crate::target::TimingTarget;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Common control surface of all triggers
pub trait Trigger: Send + Sync {
    /// Stop reacting to events; cannot be re-armed
    fn disarm(&self);

    fn is_armed(&self) -> bool;
}

/// Starts an animator when a matching event is handled
pub struct EventTrigger<E> {
    animator: Animator,
    event: E,
    opposite: Option<E>,
    armed: AtomicBool,
}

impl<E> EventTrigger<E>
where
    E: PartialEq + Send + Sync,
{
    /// `event` restarts the animator (or starts it when idle)
    pub fn new(animator: Animator, event: E) -> Self {
        Self {
            animator,
            event,
            opposite: None,
            armed: AtomicBool::new(true),
        }
    }

    /// `event` plays the animator forward, `opposite` plays it backward
    ///
    /// A running animator changes direction with `reverse_now()` instead of
    /// restarting, so the animation turns around from its current position.
    pub fn with_auto_reverse(animator: Animator, event: E, opposite: E) -> Self {
        Self {
            animator,
            event,
            opposite: Some(opposite),
            armed: AtomicBool::new(true),
        }
    }

    pub fn animator(&self) -> &Animator {
        &self.animator
    }

    pub fn event(&self) -> &E {
        &self.event
    }

    pub fn is_auto_reverse(&self) -> bool {
        self.opposite.is_some()
    }

    /// React to `event`; unrelated events and a disarmed trigger do nothing
    pub fn handle(&self, event: &E) -> Result<()> {
        if !self.is_armed() {
            return Ok(());
        }
        if *event == self.event {
            self.play_forward()
        } else if self.opposite.as_ref() == Some(event) {
            self.play_backward()
        } else {
            Ok(())
        }
    }

    fn play_forward(&self) -> Result<()> {
        let animator = &self.animator;
        if !self.is_auto_reverse() {
            return animator.restart();
        }
        if !animator.is_running() {
            return animator.start();
        }
        if animator.current_direction() != animator.start_direction() {
            animator.reverse_now();
        }
        Ok(())
    }

    fn play_backward(&self) -> Result<()> {
        let animator = &self.animator;
        if !animator.is_running() {
            return animator.start_reverse();
        }
        if animator.current_direction() == animator.start_direction() {
            animator.reverse_now();
        }
        Ok(())
    }
}

impl<E> Trigger for EventTrigger<E>
where
    E: PartialEq + Send + Sync,
{
    fn disarm(&self) {
        self.armed.store(false, Ordering::SeqCst);
    }

    fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }
}

/// Lifecycle events of an animator that a [`TimingTrigger`] can react to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TimingTriggerEvent {
    Begin,
    End,
    Repeat,
    Reverse,
}

impl TimingTriggerEvent {
    /// The paired event for auto-reverse (`Begin` ⇄ `End`)
    pub fn opposite(self) -> Option<Self> {
        match self {
            Self::Begin => Some(Self::End),
            Self::End => Some(Self::Begin),
            Self::Repeat | Self::Reverse => None,
        }
    }
}

/// Starts one animator from another animator's lifecycle
///
/// Registered as a [`TimingTarget`] of the source animator.
pub struct TimingTrigger {
    trigger: EventTrigger<TimingTriggerEvent>,
}

impl TimingTrigger {
    /// Trigger for `target`; not yet attached to any source
    ///
    /// `auto_reverse` only applies to `Begin` and `End`, which have opposites.
    pub fn new(target: Animator, event: TimingTriggerEvent, auto_reverse: bool) -> Self {
        let trigger = match event.opposite() {
            Some(opposite) if auto_reverse => {
                EventTrigger::with_auto_reverse(target, event, opposite)
            }
            _ => {
                if auto_reverse {
                    tracing::warn!(
                        "TimingTrigger: {:?} has no opposite; auto-reverse ignored",
                        event
                    );
                }
                EventTrigger::new(target, event)
            }
        };
        Self { trigger }
    }

    /// Create a trigger and register it as a target of `source`
    pub fn attach(
        source: &Animator,
        target: Animator,
        event: TimingTriggerEvent,
        auto_reverse: bool,
    ) -> Arc<Self> {
        let trigger = Arc::new(Self::new(target, event, auto_reverse));
        source.add_target(trigger.clone());
        tracing::debug!("TimingTrigger: attached to {} on {:?}", source, event);
        trigger
    }

    /// Disarm and unregister from `source`; returns whether it was registered
    pub fn detach(self: &Arc<Self>, source: &Animator) -> bool {
        self.disarm();
        let target: Arc<dyn TimingTarget> = self.clone();
        source.remove_target(&target)
    }

    /// The animator this trigger starts
    pub fn target(&self) -> &Animator {
        self.trigger.animator()
    }

    pub fn event(&self) -> TimingTriggerEvent {
        *self.trigger.event()
    }

    fn fire(&self, event: TimingTriggerEvent) {
        if let Err(err) = self.trigger.handle(&event) {
            tracing::warn!("TimingTrigger: {:?} could not start {}: {}", event, self.target(), err);
        }
    }
}

impl TimingTarget for TimingTrigger {
    fn begin(&self, _animator: &Animator) {
        self.fire(TimingTriggerEvent::Begin);
    }

    fn end(&self, _animator: &Animator) {
        self.fire(TimingTriggerEvent::End);
    }

    fn repeat(&self, _animator: &Animator) {
        self.fire(TimingTriggerEvent::Repeat);
    }

    fn reverse(&self, _animator: &Animator) {
        self.fire(TimingTriggerEvent::Reverse);
    }
}

impl Trigger for TimingTrigger {
    fn disarm(&self) {
        self.trigger.disarm();
    }

    fn is_armed(&self) -> bool {
        self.trigger.is_armed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animator::{AnimatorBuilder, Direction, RepeatCount};
    use crate::source::{ManualTimingSource, TimingSource};
    use std::time::Duration;

    #[derive(Debug, PartialEq)]
    enum Hover {
        Enter,
        Leave,
        Click,
    }

    fn setup() -> (Arc<ManualTimingSource>, Animator) {
        let source = Arc::new(ManualTimingSource::new());
        source.init();
        let animator = AnimatorBuilder::with_source(source.clone())
            .duration(Duration::from_millis(100))
            .build()
            .unwrap();
        (source, animator)
    }

    #[test]
    fn test_event_restarts_animator() {
        let (source, animator) = setup();
        let trigger = EventTrigger::new(animator.clone(), Hover::Click);

        trigger.handle(&Hover::Enter).unwrap();
        assert!(!animator.is_running());

        trigger.handle(&Hover::Click).unwrap();
        assert!(animator.is_running());
        source.tick();
        source.advance_and_tick(Duration::from_millis(50));
        assert_eq!(animator.cycle_elapsed(), Duration::from_millis(50));

        // Restart goes through the task queue and resets the timeline
        trigger.handle(&Hover::Click).unwrap();
        source.tick();
        assert!(animator.is_running());
        assert_eq!(animator.cycle_elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_disarmed_trigger_ignores_events() {
        let (_source, animator) = setup();
        let trigger = EventTrigger::new(animator.clone(), Hover::Click);

        assert!(trigger.is_armed());
        trigger.disarm();
        assert!(!trigger.is_armed());
        trigger.handle(&Hover::Click).unwrap();
        assert!(!animator.is_running());
    }

    #[test]
    fn test_auto_reverse_turns_around() {
        let (source, animator) = setup();
        let trigger =
            EventTrigger::with_auto_reverse(animator.clone(), Hover::Enter, Hover::Leave);
        assert!(trigger.is_auto_reverse());

        trigger.handle(&Hover::Enter).unwrap();
        source.tick();
        assert_eq!(animator.current_direction(), Direction::Forward);

        // Already playing forward: nothing to do
        trigger.handle(&Hover::Enter).unwrap();
        source.advance_and_tick(Duration::from_millis(30));
        assert_eq!(animator.current_direction(), Direction::Forward);

        trigger.handle(&Hover::Leave).unwrap();
        source.advance_and_tick(Duration::from_millis(10));
        assert_eq!(animator.current_direction(), Direction::Backward);

        trigger.handle(&Hover::Enter).unwrap();
        source.advance_and_tick(Duration::from_millis(10));
        assert_eq!(animator.current_direction(), Direction::Forward);
    }

    #[test]
    fn test_opposite_event_starts_idle_animator_backward() {
        let (_source, animator) = setup();
        let trigger =
            EventTrigger::with_auto_reverse(animator.clone(), Hover::Enter, Hover::Leave);

        trigger.handle(&Hover::Leave).unwrap();
        assert!(animator.is_running());
        assert_eq!(animator.current_direction(), Direction::Backward);
    }

    #[test]
    fn test_opposites() {
        use TimingTriggerEvent::*;
        assert_eq!(Begin.opposite(), Some(End));
        assert_eq!(End.opposite(), Some(Begin));
        assert_eq!(Repeat.opposite(), None);
        assert_eq!(Reverse.opposite(), None);
    }

    #[test]
    fn test_timing_trigger_sequences_animators() {
        let (source, first) = setup();
        let second = AnimatorBuilder::with_source(source.clone())
            .duration(Duration::from_millis(100))
            .build()
            .unwrap();

        let trigger = TimingTrigger::attach(&first, second.clone(), TimingTriggerEvent::End, false);
        assert_eq!(first.target_count(), 1);
        assert_eq!(trigger.event(), TimingTriggerEvent::End);
        assert!(trigger.target().ptr_eq(&second));

        first.start().unwrap();
        source.tick();
        assert!(!second.is_running());

        source.advance_and_tick(Duration::from_millis(100));
        source.advance_and_tick(Duration::from_millis(1));
        assert!(!first.is_running());
        assert!(second.is_running());
    }

    #[test]
    fn test_timing_trigger_auto_reverse_follows_source() {
        let (source, leader) = setup();
        let follower = AnimatorBuilder::with_source(source.clone())
            .duration(Duration::from_millis(100))
            .repeat_count(RepeatCount::Infinite)
            .build()
            .unwrap();

        TimingTrigger::attach(&leader, follower.clone(), TimingTriggerEvent::Begin, true);

        leader.start().unwrap();
        source.tick();
        assert!(follower.is_running());
        assert_eq!(follower.current_direction(), Direction::Forward);

        // Leader's end() runs ahead of the follower's tick, which turns it around
        source.advance_and_tick(Duration::from_millis(100));
        source.advance_and_tick(Duration::from_millis(1));
        assert!(!leader.is_running());
        assert_eq!(follower.current_direction(), Direction::Backward);
        assert!(follower.is_running());
    }

    #[test]
    fn test_detach() {
        let (source, first) = setup();
        let (_other, second) = setup();
        let trigger = TimingTrigger::attach(&first, second.clone(), TimingTriggerEvent::Begin, false);

        assert!(trigger.detach(&first));
        assert!(!trigger.is_armed());
        assert_eq!(first.target_count(), 0);

        first.start().unwrap();
        source.tick();
        assert!(!second.is_running());
        assert!(!source.is_disposed());
    }
}
