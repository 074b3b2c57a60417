//! Spring physics ease.
//!
//! A spring is described by the damped harmonic oscillator
//! `x''(t) + 2ζω₀x'(t) + ω₀²x(t) = ω₀²` and solved analytically for the
//! underdamped (ζ < 1), critically damped (ζ = 1) and overdamped (ζ > 1)
//! cases, where ω₀ = √(k/m) is the natural frequency and
//! ζ = c / (2√(mk)) the damping ratio.
//!
//! Unlike curve eases a spring owns its duration: [`Spring::settling_duration`]
//! is the time for the decay envelope to fall below a perceptibility
//! threshold, and timing resolution substitutes it for the configured
//! duration whenever a spring ease is selected.

use serde::{Deserialize, Serialize};

/// Envelope threshold that counts as settled (0.1% of travel distance).
const SETTLE_THRESHOLD: f64 = 0.001;

/// Spring ease parameters.
///
/// The defaults (`mass` 1, `stiffness` 100, `damping` 10, `velocity` 0)
/// give a gently underdamped spring settling in roughly 1.4 seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Spring {
    /// Mass (m), must be positive.
    pub mass: f64,
    /// Stiffness (k), must be positive.
    pub stiffness: f64,
    /// Damping coefficient (c), must be positive.
    pub damping: f64,
    /// Initial velocity, in travel-distances per second.
    pub velocity: f64,
}

impl Default for Spring {
    fn default() -> Self {
        Self {
            mass: 1.0,
            stiffness: 100.0,
            damping: 10.0,
            velocity: 0.0,
        }
    }
}

impl Spring {
    pub fn new(mass: f64, stiffness: f64, damping: f64, velocity: f64) -> Self {
        Self {
            mass: mass.max(1e-3),
            stiffness: stiffness.max(1e-3),
            damping: damping.max(1e-3),
            velocity,
        }
    }

    /// Natural frequency ω₀ = √(k/m), in radians per second.
    pub fn natural_frequency(&self) -> f64 {
        (self.stiffness / self.mass).sqrt()
    }

    /// Damping ratio ζ = c / (2√(mk)).
    pub fn damping_ratio(&self) -> f64 {
        self.damping / (2.0 * (self.mass * self.stiffness).sqrt())
    }

    /// Time in milliseconds for the spring to settle within the
    /// perceptibility threshold.
    ///
    /// The decay envelope of every case is an exponential with rate
    /// `ζω₀` (for ζ ≤ 1) or the slow root `ζω₀ - ω₀√(ζ²-1)` (for ζ > 1);
    /// the settling time solves `e^(-rate·T) = threshold`.
    pub fn settling_duration(&self) -> f64 {
        let omega_0 = self.natural_frequency();
        let zeta = self.damping_ratio();

        let rate = if zeta <= 1.0 {
            zeta * omega_0
        } else {
            omega_0 * (zeta - (zeta * zeta - 1.0).sqrt())
        };

        let rate = rate.max(1e-6);
        (-SETTLE_THRESHOLD.ln() / rate) * 1000.0
    }

    /// Evaluate the spring as an easing curve.
    ///
    /// `t` is normalized progress over the settling duration; the result
    /// starts at 0, ends at 1, and may overshoot 1 for underdamped springs.
    pub fn evaluate(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        if t >= 1.0 {
            return 1.0;
        }
        let seconds = t * self.settling_duration() / 1000.0;
        self.position_at(seconds)
    }

    /// Analytical position at `t` seconds, starting at 0 and converging on 1.
    fn position_at(&self, t: f64) -> f64 {
        let omega_0 = self.natural_frequency();
        let zeta = self.damping_ratio();
        let v0 = self.velocity;

        if (zeta - 1.0).abs() < 1e-4 {
            // Critically damped: x = 1 - e^(-ω₀t)(1 + (ω₀ - v₀)t)
            let decay = (-omega_0 * t).exp();
            1.0 - decay * (1.0 + (omega_0 - v0) * t)
        } else if zeta < 1.0 {
            // Underdamped: decaying oscillation at ωd = ω₀√(1-ζ²).
            let omega_d = omega_0 * (1.0 - zeta * zeta).sqrt();
            let decay = (-zeta * omega_0 * t).exp();
            let b = (zeta * omega_0 - v0) / omega_d;
            1.0 - decay * ((omega_d * t).cos() + b * (omega_d * t).sin())
        } else {
            // Overdamped: sum of two real exponentials.
            let gamma = omega_0 * (zeta * zeta - 1.0).sqrt();
            let r1 = -zeta * omega_0 + gamma;
            let r2 = -zeta * omega_0 - gamma;
            let c1 = (v0 + r2) / (r1 - r2);
            let c2 = -1.0 - c1;
            1.0 + c1 * (r1 * t).exp() + c2 * (r2 * t).exp()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 0.01;

    #[test]
    fn test_endpoints() {
        let spring = Spring::default();
        assert!(spring.evaluate(0.0).abs() < EPSILON);
        assert!((spring.evaluate(1.0) - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_default_is_underdamped() {
        let spring = Spring::default();
        assert!(spring.damping_ratio() < 1.0);
        // Underdamped springs overshoot the target at least once.
        let overshoots = (1..100).any(|i| spring.evaluate(i as f64 / 100.0) > 1.0);
        assert!(overshoots);
    }

    #[test]
    fn test_critically_damped_never_overshoots() {
        // ζ = 1 requires c = 2√(mk).
        let spring = Spring::new(1.0, 100.0, 20.0, 0.0);
        assert!((spring.damping_ratio() - 1.0).abs() < 1e-9);
        for i in 0..=100 {
            let x = spring.evaluate(i as f64 / 100.0);
            assert!(x <= 1.0 + 1e-9, "overshoot at step {i}: {x}");
        }
    }

    #[test]
    fn test_overdamped_never_overshoots() {
        let spring = Spring::new(1.0, 100.0, 40.0, 0.0);
        assert!(spring.damping_ratio() > 1.0);
        for i in 0..=100 {
            let x = spring.evaluate(i as f64 / 100.0);
            assert!(x <= 1.0 + 1e-9, "overshoot at step {i}: {x}");
        }
        assert!((spring.evaluate(1.0) - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_settling_duration_follows_decay_envelope() {
        // For ζ ≤ 1 the envelope decays at ζω₀ = c / 2m. Damping and mass
        // move the settle point; stiffness only changes the oscillation
        // frequency inside the envelope.
        let light = Spring::new(1.0, 100.0, 10.0, 0.0);
        let damped = Spring::new(1.0, 100.0, 16.0, 0.0);
        let heavy = Spring::new(4.0, 100.0, 10.0, 0.0);
        assert!(damped.settling_duration() < light.settling_duration());
        assert!(heavy.settling_duration() > light.settling_duration());

        let soft = Spring::new(1.0, 50.0, 10.0, 0.0);
        let stiff = Spring::new(1.0, 400.0, 10.0, 0.0);
        assert!(soft.damping_ratio() < 1.0 && stiff.damping_ratio() < 1.0);
        assert!((soft.settling_duration() - stiff.settling_duration()).abs() < 1e-9);
        assert!(soft.settling_duration() > 0.0);
    }

    #[test]
    fn test_overdamped_settling_slows_with_damping() {
        // Past critical damping the slow root dominates, so piling on more
        // damping lengthens the settle instead of shortening it.
        let critical = Spring::new(1.0, 100.0, 20.0, 0.0);
        let overdamped = Spring::new(1.0, 100.0, 60.0, 0.0);
        assert!(overdamped.damping_ratio() > 1.0);
        assert!(overdamped.settling_duration() > critical.settling_duration());
    }

    #[test]
    fn test_parameters_clamped_positive() {
        let spring = Spring::new(0.0, -5.0, 0.0, 0.0);
        assert!(spring.mass > 0.0);
        assert!(spring.stiffness > 0.0);
        assert!(spring.damping > 0.0);
        assert!(spring.settling_duration().is_finite());
    }

    #[test]
    fn test_serde_round_trip() {
        let spring = Spring::new(1.0, 200.0, 15.0, 2.0);
        let json = serde_json::to_string(&spring).unwrap();
        let back: Spring = serde_json::from_str(&json).unwrap();
        assert_eq!(spring, back);
    }
}
