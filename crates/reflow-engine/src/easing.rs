//! Easing functions for transition timing.
//!
//! This module implements CSS-compatible timing functions plus the power
//! family used as the engine defaults:
//! - Linear
//! - Ease, EaseIn, EaseOut, EaseInOut (standard CSS curves)
//! - CubicBezier (custom bezier curves)
//! - Steps (stepped animations)
//! - InPower / OutPower / InOutPower (`inOut(3.5)`-style power curves)
//! - Spring (physical ease; carries its own settling duration)
//!
//! # Usage
//!
//! ```
//! use reflow_engine::easing::Ease;
//!
//! let ease = Ease::in_out(3.5);
//! let progress = ease.evaluate(0.5);
//! assert!((progress - 0.5).abs() < 1e-9);
//! ```

use serde::{Deserialize, Serialize};

use crate::spring::Spring;

/// Position for stepped animations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepPosition {
    /// Jump at the start of each interval (CSS `jump-start` / `start`).
    Start,
    /// Jump at the end of each interval (CSS `jump-end` / `end`).
    End,
}

impl Default for StepPosition {
    fn default() -> Self {
        Self::End
    }
}

/// Easing function for transition timing.
///
/// Easing functions map a linear progress value (0.0 to 1.0) to an eased
/// output value, controlling the rate of change over time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Ease {
    /// Linear interpolation (no easing).
    Linear,

    /// CSS `ease` - `cubic-bezier(0.25, 0.1, 0.25, 1.0)`.
    Ease,

    /// CSS `ease-in` - `cubic-bezier(0.42, 0, 1, 1)`.
    EaseIn,

    /// CSS `ease-out` - `cubic-bezier(0, 0, 0.58, 1)`.
    EaseOut,

    /// CSS `ease-in-out` - `cubic-bezier(0.42, 0, 0.58, 1)`.
    EaseInOut,

    /// Custom cubic bezier curve. x values must be in [0, 1].
    CubicBezier { x1: f64, y1: f64, x2: f64, y2: f64 },

    /// Stepped animation with discrete jumps.
    Steps { count: u32, position: StepPosition },

    /// Accelerating power curve `t^p`.
    InPower { power: f64 },

    /// Decelerating power curve `1 - (1 - t)^p`.
    OutPower { power: f64 },

    /// Symmetric power curve; `power` 1.0 is linear.
    InOutPower { power: f64 },

    /// Spring physics ease. Resolving a spring ease also overrides the
    /// configured duration with the spring's settling duration.
    Spring(Spring),
}

impl Default for Ease {
    /// The engine default, `inOut(3.5)`.
    fn default() -> Self {
        Self::in_out(3.5)
    }
}

impl Ease {
    /// Symmetric power ease, the `inOut(p)` shorthand.
    pub fn in_out(power: f64) -> Self {
        Self::InOutPower { power }
    }

    /// Create a custom cubic bezier easing function.
    ///
    /// # Panics
    /// Panics if x1 or x2 are outside [0, 1].
    pub fn cubic_bezier(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        assert!(
            (0.0..=1.0).contains(&x1) && (0.0..=1.0).contains(&x2),
            "Bezier x values must be in [0, 1]"
        );
        Self::CubicBezier { x1, y1, x2, y2 }
    }

    /// Create a stepped easing function.
    ///
    /// # Panics
    /// Panics if steps is 0.
    pub fn steps(steps: u32, position: StepPosition) -> Self {
        assert!(steps >= 1, "Steps must be at least 1");
        Self::Steps {
            count: steps,
            position,
        }
    }

    /// The spring carried by this ease, if any.
    pub fn spring(&self) -> Option<&Spring> {
        match self {
            Self::Spring(spring) => Some(spring),
            _ => None,
        }
    }

    /// Evaluate the easing function at the given progress.
    ///
    /// # Arguments
    /// * `t` - Progress value from 0.0 to 1.0
    pub fn evaluate(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);

        match self {
            Self::Linear => t,
            Self::Ease => cubic_bezier(0.25, 0.1, 0.25, 1.0, t),
            Self::EaseIn => cubic_bezier(0.42, 0.0, 1.0, 1.0, t),
            Self::EaseOut => cubic_bezier(0.0, 0.0, 0.58, 1.0, t),
            Self::EaseInOut => cubic_bezier(0.42, 0.0, 0.58, 1.0, t),
            Self::CubicBezier { x1, y1, x2, y2 } => cubic_bezier(*x1, *y1, *x2, *y2, t),
            Self::Steps { count, position } => stepped(*count, *position, t),
            Self::InPower { power } => t.powf(*power),
            Self::OutPower { power } => 1.0 - (1.0 - t).powf(*power),
            Self::InOutPower { power } => {
                if t < 0.5 {
                    (2.0 * t).powf(*power) / 2.0
                } else {
                    1.0 - (-2.0 * t + 2.0).powf(*power) / 2.0
                }
            }
            Self::Spring(spring) => spring.evaluate(t),
        }
    }

    /// Evaluate the reflected curve, `1 - ease(1 - t)`.
    ///
    /// Swap crossfades run their second half on the reflected ease so the
    /// midpoint lines up with the parent's perceived settle point.
    pub fn evaluate_reflected(&self, t: f64) -> f64 {
        1.0 - self.evaluate(1.0 - t)
    }
}

/// Evaluate a cubic bezier curve at time t.
///
/// Uses Newton-Raphson iteration to find the t parameter on the bezier curve
/// corresponding to the input progress, then evaluates the y coordinate at
/// that point.
fn cubic_bezier(x1: f64, y1: f64, x2: f64, y2: f64, progress: f64) -> f64 {
    if progress <= 0.0 {
        return 0.0;
    }
    if progress >= 1.0 {
        return 1.0;
    }

    let t = solve_bezier_x(x1, x2, progress);
    bezier_axis(y1, y2, t)
}

/// Solve for t in the bezier x equation using Newton-Raphson iteration.
fn solve_bezier_x(x1: f64, x2: f64, target_x: f64) -> f64 {
    let mut t = target_x;

    for _ in 0..8 {
        let x = bezier_axis(x1, x2, t) - target_x;
        if x.abs() < 1e-7 {
            break;
        }

        let dx = bezier_axis_derivative(x1, x2, t);
        if dx.abs() < 1e-7 {
            break;
        }

        t -= x / dx;
        t = t.clamp(0.0, 1.0);
    }

    t
}

/// Coordinate on one bezier axis at parameter t:
/// `3(1-t)²t·c1 + 3(1-t)t²·c2 + t³`.
#[inline]
fn bezier_axis(c1: f64, c2: f64, t: f64) -> f64 {
    let t2 = t * t;
    let t3 = t2 * t;
    let mt = 1.0 - t;
    let mt2 = mt * mt;

    3.0 * mt2 * t * c1 + 3.0 * mt * t2 * c2 + t3
}

/// Derivative of one bezier axis with respect to t.
#[inline]
fn bezier_axis_derivative(c1: f64, c2: f64, t: f64) -> f64 {
    let mt = 1.0 - t;
    3.0 * mt * mt * c1 + 6.0 * mt * t * (c2 - c1) + 3.0 * t * t * (1.0 - c2)
}

/// Evaluate stepped easing.
fn stepped(steps: u32, position: StepPosition, t: f64) -> f64 {
    if steps == 0 {
        return t;
    }
    let steps_f = f64::from(steps);
    match position {
        StepPosition::Start => ((t * steps_f).ceil() / steps_f).min(1.0),
        StepPosition::End => ((t * steps_f).floor() / steps_f).min(1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 0.001;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < EPSILON
    }

    #[test]
    fn test_linear() {
        let ease = Ease::Linear;
        assert!(approx_eq(ease.evaluate(0.0), 0.0));
        assert!(approx_eq(ease.evaluate(0.25), 0.25));
        assert!(approx_eq(ease.evaluate(0.5), 0.5));
        assert!(approx_eq(ease.evaluate(1.0), 1.0));
    }

    #[test]
    fn test_ease_boundaries() {
        let ease = Ease::Ease;
        assert!(approx_eq(ease.evaluate(0.0), 0.0));
        assert!(approx_eq(ease.evaluate(1.0), 1.0));

        // CSS ease accelerates early; the midpoint sits around 0.8.
        let mid = ease.evaluate(0.5);
        assert!(mid > 0.7 && mid < 0.9, "mid should be ~0.8, got {mid}");

        let early = ease.evaluate(0.25);
        let late = ease.evaluate(0.75);
        assert!(early < mid && mid < late);
    }

    #[test]
    fn test_ease_in_out_symmetry() {
        let ease = Ease::EaseInOut;
        assert!(approx_eq(ease.evaluate(0.5), 0.5));
        assert!(approx_eq(ease.evaluate(0.25) + ease.evaluate(0.75), 1.0));
    }

    #[test]
    fn test_power_in_out() {
        let ease = Ease::in_out(3.5);
        assert!(approx_eq(ease.evaluate(0.0), 0.0));
        assert!(approx_eq(ease.evaluate(0.5), 0.5));
        assert!(approx_eq(ease.evaluate(1.0), 1.0));
        // Slow start, symmetric end.
        assert!(ease.evaluate(0.25) < 0.1);
        assert!(approx_eq(ease.evaluate(0.25) + ease.evaluate(0.75), 1.0));

        // Power 1 degenerates to linear.
        assert!(approx_eq(Ease::in_out(1.0).evaluate(0.3), 0.3));
    }

    #[test]
    fn test_out_power() {
        let ease = Ease::OutPower { power: 2.0 };
        assert!(approx_eq(ease.evaluate(0.5), 0.75));
    }

    #[test]
    fn test_steps_end() {
        let ease = Ease::steps(4, StepPosition::End);
        assert!(approx_eq(ease.evaluate(0.0), 0.0));
        assert!(approx_eq(ease.evaluate(0.24), 0.0));
        assert!(approx_eq(ease.evaluate(0.25), 0.25));
        assert!(approx_eq(ease.evaluate(0.99), 0.75));
        assert!(approx_eq(ease.evaluate(1.0), 1.0));
    }

    #[test]
    fn test_reflected() {
        let ease = Ease::InPower { power: 2.0 };
        // Reflecting t^2 gives 1-(1-t)^2.
        assert!(approx_eq(ease.evaluate_reflected(0.5), 0.75));
        assert!(approx_eq(ease.evaluate_reflected(0.0), 0.0));
        assert!(approx_eq(ease.evaluate_reflected(1.0), 1.0));
        // Linear is its own reflection.
        assert!(approx_eq(Ease::Linear.evaluate_reflected(0.3), 0.3));
    }

    #[test]
    fn test_clamping() {
        let ease = Ease::Ease;
        assert!(approx_eq(ease.evaluate(-0.5), 0.0));
        assert!(approx_eq(ease.evaluate(1.5), 1.0));
    }

    #[test]
    fn test_default_is_in_out_3_5() {
        assert_eq!(Ease::default(), Ease::InOutPower { power: 3.5 });
    }

    #[test]
    #[should_panic(expected = "Bezier x values must be in [0, 1]")]
    fn test_invalid_bezier_x() {
        let _ = Ease::cubic_bezier(-0.1, 0.0, 0.5, 1.0);
    }

    #[test]
    #[should_panic(expected = "Steps must be at least 1")]
    fn test_invalid_steps() {
        let _ = Ease::steps(0, StepPosition::End);
    }

    #[test]
    fn test_serde_round_trip() {
        let ease = Ease::cubic_bezier(0.4, 0.0, 0.2, 1.0);
        let json = serde_json::to_string(&ease).unwrap();
        let back: Ease = serde_json::from_str(&json).unwrap();
        assert_eq!(ease, back);
    }
}
