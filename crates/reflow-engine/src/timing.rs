//! Timing parameters and per-node resolution.
//!
//! Callers describe timing with possibly-staggered values; the engine
//! resolves them exactly once per node per cycle against the node's
//! `(index, total)` position, so every downstream consumer (tween emission,
//! swap midpoints, completion accounting) sees one stable number set.

use crate::easing::Ease;
use crate::value::{Resolvable, StaggerContext};

/// Default transition duration, in milliseconds.
pub const DEFAULT_DURATION: f64 = 350.0;

/// Ease applied to swap crossfades, `inOut(1.75)`.
pub const SWAP_EASE: Ease = Ease::InOutPower { power: 1.75 };

/// Caller-facing timing parameters. Each field may be a fixed value or a
/// stagger function of the node's group position.
#[derive(Debug, Clone)]
pub struct Timing {
    pub delay: Resolvable<f64>,
    pub duration: Resolvable<f64>,
    pub ease: Resolvable<Ease>,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            delay: Resolvable::Value(0.0),
            duration: Resolvable::Value(DEFAULT_DURATION),
            ease: Resolvable::Value(Ease::default()),
        }
    }
}

impl Timing {
    pub fn with_delay(mut self, delay: impl Into<Resolvable<f64>>) -> Self {
        self.delay = delay.into();
        self
    }

    pub fn with_duration(mut self, duration: impl Into<Resolvable<f64>>) -> Self {
        self.duration = duration.into();
        self
    }

    pub fn with_ease(mut self, ease: impl Into<Resolvable<Ease>>) -> Self {
        self.ease = ease.into();
        self
    }

    /// Resolve the timing for one node.
    ///
    /// A spring ease overrides the configured duration with the spring's
    /// settling duration.
    pub fn resolve(&self, cx: StaggerContext) -> ResolvedTiming {
        let delay = self.delay.resolve(cx).max(0.0);
        let ease = self.ease.resolve(cx);
        let duration = match ease.spring() {
            Some(spring) => spring.settling_duration(),
            None => self.duration.resolve(cx).max(0.0),
        };
        ResolvedTiming {
            delay,
            duration,
            ease,
        }
    }
}

/// Timing after per-node resolution. All values are concrete.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedTiming {
    /// Delay before the transition starts, in milliseconds.
    pub delay: f64,
    /// Transition duration, in milliseconds.
    pub duration: f64,
    pub ease: Ease,
}

impl Default for ResolvedTiming {
    fn default() -> Self {
        Self {
            delay: 0.0,
            duration: DEFAULT_DURATION,
            ease: Ease::default(),
        }
    }
}

impl ResolvedTiming {
    /// Absolute end time of the transition relative to cycle start.
    pub fn end(&self) -> f64 {
        self.delay + self.duration
    }

    /// Midpoint of the transition, where swap crossfades pivot.
    pub fn midpoint(&self) -> f64 {
        self.delay + self.duration / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spring::Spring;
    use crate::value::stagger;

    #[test]
    fn test_defaults() {
        let resolved = Timing::default().resolve(StaggerContext::new(0, 1));
        assert_eq!(resolved.delay, 0.0);
        assert_eq!(resolved.duration, DEFAULT_DURATION);
        assert_eq!(resolved.ease, Ease::default());
    }

    #[test]
    fn test_staggered_delay() {
        let timing = Timing::default().with_delay(stagger(|cx: StaggerContext| cx.index as f64 * 50.0));
        assert_eq!(timing.resolve(StaggerContext::new(0, 4)).delay, 0.0);
        assert_eq!(timing.resolve(StaggerContext::new(3, 4)).delay, 150.0);
        // Duration stays fixed for every node.
        assert_eq!(timing.resolve(StaggerContext::new(3, 4)).duration, DEFAULT_DURATION);
    }

    #[test]
    fn test_spring_overrides_duration() {
        let spring = Spring::default();
        let timing = Timing::default()
            .with_duration(90.0)
            .with_ease(Ease::Spring(spring));
        let resolved = timing.resolve(StaggerContext::new(0, 1));
        assert_eq!(resolved.duration, spring.settling_duration());
        assert_ne!(resolved.duration, 90.0);
    }

    #[test]
    fn test_negative_values_clamped() {
        let timing = Timing::default().with_delay(-20.0).with_duration(-1.0);
        let resolved = timing.resolve(StaggerContext::new(0, 1));
        assert_eq!(resolved.delay, 0.0);
        assert_eq!(resolved.duration, 0.0);
    }

    #[test]
    fn test_midpoint() {
        let t = ResolvedTiming {
            delay: 100.0,
            duration: 300.0,
            ease: Ease::Linear,
        };
        assert_eq!(t.midpoint(), 250.0);
        assert_eq!(t.end(), 400.0);
    }
}
