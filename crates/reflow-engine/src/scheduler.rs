//! The playback boundary.
//!
//! The engine computes what should animate but never advances time itself.
//! It emits instructions to a [`Scheduler`] (property tweens and timed style
//! writes on a timeline) and a [`TransformAnimator`] (compositor-friendly
//! translate/transform keyframes), then waits for the host to report
//! completion or pause back through the animator entry points.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::easing::Ease;
use crate::timing::ResolvedTiming;
use crate::value::PropertyValue;

static NEXT_TIMELINE_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_TRANSFORM_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier for a scheduled timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimelineId(pub u64);

impl TimelineId {
    /// Allocate a process-unique id.
    pub fn next() -> Self {
        Self(NEXT_TIMELINE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Identifier for a running transform animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransformAnimationId(pub u64);

impl TransformAnimationId {
    /// Allocate a process-unique id.
    pub fn next() -> Self {
        Self(NEXT_TRANSFORM_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Ease applied to one tween segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SegmentEase {
    /// Evaluate the ease as-is.
    Forward(Ease),
    /// Evaluate the reflection `1 - ease(1 - t)`. Swap crossfades use this
    /// for their second half.
    Reflected(Ease),
}

impl SegmentEase {
    pub fn evaluate(&self, t: f64) -> f64 {
        match self {
            Self::Forward(ease) => ease.evaluate(t),
            Self::Reflected(ease) => ease.evaluate_reflected(t),
        }
    }
}

/// One leg of a property tween.
#[derive(Debug, Clone, PartialEq)]
pub struct TweenSegment {
    pub from: PropertyValue,
    pub to: PropertyValue,
    /// Segment-specific ease; `None` uses the tween's timing ease.
    pub ease: Option<SegmentEase>,
}

impl TweenSegment {
    pub fn new(from: impl Into<PropertyValue>, to: impl Into<PropertyValue>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            ease: None,
        }
    }

    pub fn with_ease(mut self, ease: SegmentEase) -> Self {
        self.ease = Some(ease);
        self
    }
}

/// An animated style property on one element: one segment for a plain
/// transition, two for a swap crossfade pivoting at the midpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Tween {
    pub property: String,
    pub segments: Vec<TweenSegment>,
}

impl Tween {
    /// Single-segment tween from one value to another.
    pub fn between(
        property: impl Into<String>,
        from: impl Into<PropertyValue>,
        to: impl Into<PropertyValue>,
    ) -> Self {
        Self {
            property: property.into(),
            segments: vec![TweenSegment::new(from, to)],
        }
    }

    pub fn segmented(property: impl Into<String>, segments: Vec<TweenSegment>) -> Self {
        Self {
            property: property.into(),
            segments,
        }
    }
}

/// An inline style write executed at a timeline position.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleWrite<E> {
    pub element: E,
    pub property: String,
    pub value: String,
    pub important: bool,
}

impl<E> StyleWrite<E> {
    pub fn new(element: E, property: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            element,
            property: property.into(),
            value: value.into(),
            important: false,
        }
    }

    pub fn important(mut self) -> Self {
        self.important = true;
        self
    }
}

/// Keyframed translate/transform track for one element.
///
/// Frame lists hold two entries for a plain move and three when a swap
/// midpoint injects an intermediate transform.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformFrames<E> {
    pub element: E,
    pub timing: ResolvedTiming,
    /// `translate` property keyframes, `"x y"` per frame.
    pub translate: Vec<String>,
    /// `transform` property keyframes.
    pub transform: Vec<String>,
}

/// Receives property tweens and drives them over time.
///
/// `init` is called once after a cycle's instructions are emitted; the
/// scheduler then plays the timeline and reports back through the animator's
/// completion entry points.
pub trait Scheduler<E> {
    /// Create an empty timeline for one transition cycle.
    fn create(&mut self) -> TimelineId;

    /// Add property tweens for one element, starting at `position`
    /// milliseconds into the timeline.
    fn add(
        &mut self,
        timeline: TimelineId,
        target: E,
        timing: ResolvedTiming,
        tweens: Vec<Tween>,
        position: f64,
    );

    /// Schedule inline style writes at a timeline position.
    fn call(&mut self, timeline: TimelineId, position: f64, writes: Vec<StyleWrite<E>>);

    /// Keep a transform animation's clock locked to the timeline, seeking it
    /// from `position`.
    fn sync(&mut self, timeline: TimelineId, animation: TransformAnimationId, position: f64);

    /// Finalize and start playback.
    fn init(&mut self, timeline: TimelineId);

    /// Jump the timeline to its end state immediately.
    fn complete(&mut self, timeline: TimelineId);

    /// Cancel without applying end state.
    fn cancel(&mut self, timeline: TimelineId);
}

/// Receives transform keyframes, typically mapped onto a compositor-driven
/// animation so position changes stay off the layout path.
pub trait TransformAnimator<E> {
    /// Start a keyframed animation over the given tracks.
    fn animate(&mut self, frames: Vec<TransformFrames<E>>) -> TransformAnimationId;

    /// Jump to the end state immediately.
    fn complete(&mut self, id: TransformAnimationId);

    /// Cancel without applying end state.
    fn cancel(&mut self, id: TransformAnimationId);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let a = TimelineId::next();
        let b = TimelineId::next();
        assert_ne!(a, b);
        assert_ne!(TransformAnimationId::next(), TransformAnimationId::next());
    }

    #[test]
    fn test_segment_ease_reflection() {
        let ease = Ease::InPower { power: 2.0 };
        let forward = SegmentEase::Forward(ease);
        let reflected = SegmentEase::Reflected(ease);
        assert_eq!(forward.evaluate(0.5), 0.25);
        assert_eq!(reflected.evaluate(0.5), 0.75);
    }

    #[test]
    fn test_tween_constructors() {
        let tween = Tween::between("opacity", 1.0, 0.0);
        assert_eq!(tween.segments.len(), 1);
        assert_eq!(tween.segments[0].from, PropertyValue::number(1.0));

        let swap = Tween::segmented(
            "opacity",
            vec![
                TweenSegment::new(1.0, 0.0),
                TweenSegment::new(0.0, 1.0).with_ease(SegmentEase::Reflected(Ease::default())),
            ],
        );
        assert_eq!(swap.segments.len(), 2);
        assert!(swap.segments[1].ease.is_some());
    }
}
