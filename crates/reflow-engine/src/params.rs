//! Animator options and per-cycle parameter resolution.
//!
//! Options are layered: values passed to an individual `animate` call win
//! over the animator's constructor options, which win over the built-in
//! defaults. State overrides (`swap_at`, `enter_from`, `leave_to`) carry
//! their own optional timing that falls back to the cycle timing where
//! unspecified.

use std::collections::BTreeMap;

use crate::easing::Ease;
use crate::timing::{SWAP_EASE, Timing};
use crate::value::{PropertyValue, Resolvable, ResolvableValue};

/// Style properties compared between generations by default.
pub const TRACKED_BASELINE: [&str; 8] = [
    "opacity",
    "font-size",
    "color",
    "background-color",
    "border-radius",
    "border",
    "filter",
    "clip-path",
];

/// Style properties captured during measurement but only compared when also
/// tracked. Layout recovery needs these even when they never animate.
pub const RECORDED_BASELINE: [&str; 14] = [
    "display",
    "visibility",
    "translate",
    "position",
    "left",
    "top",
    "margin-left",
    "margin-top",
    "width",
    "height",
    "max-width",
    "max-height",
    "min-width",
    "min-height",
];

/// Property overrides plus optional timing for one transition role.
///
/// Used for the swap crossfade midpoint (`swap_at`), the synthetic start
/// state of entering nodes (`enter_from`) and the synthetic end state of
/// leaving nodes (`leave_to`).
#[derive(Debug, Clone, Default)]
pub struct StateParams {
    pub properties: BTreeMap<String, ResolvableValue>,
    pub delay: Option<Resolvable<f64>>,
    pub duration: Option<Resolvable<f64>>,
    pub ease: Option<Resolvable<Ease>>,
}

impl StateParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_property(
        mut self,
        name: impl Into<String>,
        value: impl Into<ResolvableValue>,
    ) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn with_delay(mut self, delay: impl Into<Resolvable<f64>>) -> Self {
        self.delay = Some(delay.into());
        self
    }

    pub fn with_duration(mut self, duration: impl Into<Resolvable<f64>>) -> Self {
        self.duration = Some(duration.into());
        self
    }

    pub fn with_ease(mut self, ease: impl Into<Resolvable<Ease>>) -> Self {
        self.ease = Some(ease.into());
        self
    }

    /// Merge `self` over `base`: properties and timing fields present in
    /// `self` win, everything else comes from `base`.
    fn merged_over(&self, base: &StateParams) -> StateParams {
        let mut properties = base.properties.clone();
        for (name, value) in &self.properties {
            properties.insert(name.clone(), value.clone());
        }
        StateParams {
            properties,
            delay: self.delay.clone().or_else(|| base.delay.clone()),
            duration: self.duration.clone().or_else(|| base.duration.clone()),
            ease: self.ease.clone().or_else(|| base.ease.clone()),
        }
    }

    /// Timing for this role, falling back to the cycle timing for fields the
    /// override leaves unset.
    fn timing_with_fallback(&self, cycle: &Timing) -> Timing {
        Timing {
            delay: self.delay.clone().unwrap_or_else(|| cycle.delay.clone()),
            duration: self
                .duration
                .clone()
                .unwrap_or_else(|| cycle.duration.clone()),
            ease: self.ease.clone().unwrap_or_else(|| cycle.ease.clone()),
        }
    }
}

/// Constructor options for a layout animator.
#[derive(Debug, Clone)]
pub struct LayoutOptions {
    /// Cycle timing defaults.
    pub timing: Timing,
    /// Selectors for the elements to track, resolved against the root.
    pub children: Vec<String>,
    /// Swap crossfade midpoint state. Defaults to `opacity: 0` with the
    /// `inOut(1.75)` ease.
    pub swap_at: StateParams,
    /// Synthetic start state for entering nodes. Defaults to `opacity: 0`.
    pub enter_from: StateParams,
    /// Synthetic end state for leaving nodes. Defaults to `opacity: 0`.
    pub leave_to: StateParams,
    /// Additional style properties to track beyond the baseline.
    pub properties: Vec<String>,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            timing: Timing::default(),
            children: vec!["*".to_string()],
            swap_at: StateParams::new()
                .with_property("opacity", PropertyValue::number(0.0))
                .with_ease(SWAP_EASE),
            enter_from: StateParams::new().with_property("opacity", PropertyValue::number(0.0)),
            leave_to: StateParams::new().with_property("opacity", PropertyValue::number(0.0)),
            properties: Vec::new(),
        }
    }
}

impl LayoutOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_children(mut self, selectors: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.children = selectors.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the swap midpoint state. The default `inOut(1.75)` ease is
    /// kept unless the override sets its own.
    pub fn with_swap_at(mut self, params: StateParams) -> Self {
        let defaults = StateParams::new().with_ease(SWAP_EASE);
        self.swap_at = params.merged_over(&defaults);
        self
    }

    pub fn with_enter_from(mut self, params: StateParams) -> Self {
        self.enter_from = params;
        self
    }

    pub fn with_leave_to(mut self, params: StateParams) -> Self {
        self.leave_to = params;
        self
    }

    pub fn with_properties(
        mut self,
        properties: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.properties = properties.into_iter().map(Into::into).collect();
        self
    }

    /// Style properties compared between generations: the baseline plus any
    /// property named in a state override plus the caller's extras.
    pub fn tracked_properties(&self) -> Vec<String> {
        let mut tracked: Vec<String> = TRACKED_BASELINE.iter().map(|s| s.to_string()).collect();
        let mut push = |name: &str| {
            if !tracked.iter().any(|t| t == name) {
                tracked.push(name.to_string());
            }
        };
        for params in [&self.swap_at, &self.enter_from, &self.leave_to] {
            for name in params.properties.keys() {
                push(name);
            }
        }
        for name in &self.properties {
            push(name);
        }
        tracked
    }

    /// Style properties captured at measurement time: the structural baseline
    /// plus every tracked property.
    pub fn recorded_properties(&self) -> Vec<String> {
        let mut recorded: Vec<String> = RECORDED_BASELINE.iter().map(|s| s.to_string()).collect();
        for name in self.tracked_properties() {
            if !recorded.iter().any(|r| r == &name) {
                recorded.push(name);
            }
        }
        recorded
    }

    /// Layer one `animate` call's overrides on top of these options.
    pub fn resolve_cycle(&self, call: &AnimateParams) -> CycleParams {
        let timing = Timing {
            delay: call
                .delay
                .clone()
                .unwrap_or_else(|| self.timing.delay.clone()),
            duration: call
                .duration
                .clone()
                .unwrap_or_else(|| self.timing.duration.clone()),
            ease: call.ease.clone().unwrap_or_else(|| self.timing.ease.clone()),
        };

        let layer = |call_params: &Option<StateParams>, base: &StateParams| {
            let merged = match call_params {
                Some(p) => p.merged_over(base),
                None => base.clone(),
            };
            RoleParams {
                timing: merged.timing_with_fallback(&timing),
                properties: merged.properties,
            }
        };

        CycleParams {
            swap_at: layer(&call.swap_at, &self.swap_at),
            enter_from: layer(&call.enter_from, &self.enter_from),
            leave_to: layer(&call.leave_to, &self.leave_to),
            timing,
        }
    }
}

/// Per-call overrides accepted by `animate`.
#[derive(Debug, Clone, Default)]
pub struct AnimateParams {
    pub delay: Option<Resolvable<f64>>,
    pub duration: Option<Resolvable<f64>>,
    pub ease: Option<Resolvable<Ease>>,
    pub swap_at: Option<StateParams>,
    pub enter_from: Option<StateParams>,
    pub leave_to: Option<StateParams>,
}

impl AnimateParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: impl Into<Resolvable<f64>>) -> Self {
        self.delay = Some(delay.into());
        self
    }

    pub fn with_duration(mut self, duration: impl Into<Resolvable<f64>>) -> Self {
        self.duration = Some(duration.into());
        self
    }

    pub fn with_ease(mut self, ease: impl Into<Resolvable<Ease>>) -> Self {
        self.ease = Some(ease.into());
        self
    }

    pub fn with_swap_at(mut self, params: StateParams) -> Self {
        self.swap_at = Some(params);
        self
    }

    pub fn with_enter_from(mut self, params: StateParams) -> Self {
        self.enter_from = Some(params);
        self
    }

    pub fn with_leave_to(mut self, params: StateParams) -> Self {
        self.leave_to = Some(params);
        self
    }
}

/// Property overrides and concrete timing for one transition role.
#[derive(Debug, Clone)]
pub struct RoleParams {
    pub properties: BTreeMap<String, ResolvableValue>,
    pub timing: Timing,
}

/// Fully layered parameters for one transition cycle.
#[derive(Debug, Clone)]
pub struct CycleParams {
    pub timing: Timing,
    pub swap_at: RoleParams,
    pub enter_from: RoleParams,
    pub leave_to: RoleParams,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::StaggerContext;

    #[test]
    fn test_default_states() {
        let options = LayoutOptions::default();
        assert_eq!(
            options.swap_at.properties.get("opacity"),
            Some(&ResolvableValue::Value(PropertyValue::number(0.0)))
        );
        assert_eq!(options.swap_at.ease, Some(Resolvable::Value(SWAP_EASE)));
        assert!(options.enter_from.ease.is_none());
        assert_eq!(options.children, vec!["*".to_string()]);
    }

    #[test]
    fn test_tracked_includes_override_properties() {
        let options = LayoutOptions::new()
            .with_enter_from(
                StateParams::new()
                    .with_property("opacity", PropertyValue::number(0.0))
                    .with_property("transform", PropertyValue::text("scale(0.8)")),
            )
            .with_properties(["outline-color"]);
        let tracked = options.tracked_properties();
        assert!(tracked.iter().any(|p| p == "transform"));
        assert!(tracked.iter().any(|p| p == "outline-color"));
        // Baseline survives, without duplicates.
        assert_eq!(tracked.iter().filter(|p| *p == "opacity").count(), 1);

        let recorded = options.recorded_properties();
        assert!(recorded.iter().any(|p| p == "display"));
        assert!(recorded.iter().any(|p| p == "outline-color"));
    }

    #[test]
    fn test_call_params_win_over_constructor() {
        let options = LayoutOptions::new()
            .with_timing(Timing::default().with_duration(500.0))
            .with_swap_at(StateParams::new().with_property("opacity", PropertyValue::number(0.25)));
        let call = AnimateParams::new()
            .with_duration(200.0)
            .with_swap_at(StateParams::new().with_property("opacity", PropertyValue::number(0.5)));
        let cycle = options.resolve_cycle(&call);

        let cx = StaggerContext::new(0, 1);
        assert_eq!(cycle.timing.resolve(cx).duration, 200.0);
        assert_eq!(
            cycle.swap_at.properties.get("opacity"),
            Some(&ResolvableValue::Value(PropertyValue::number(0.5)))
        );
        // Swap keeps its dedicated ease while inheriting the call duration.
        assert_eq!(cycle.swap_at.timing.resolve(cx).ease, SWAP_EASE);
        assert_eq!(cycle.swap_at.timing.resolve(cx).duration, 200.0);
    }

    #[test]
    fn test_state_timing_falls_back_to_cycle() {
        let options = LayoutOptions::new();
        let cycle = options.resolve_cycle(&AnimateParams::new().with_delay(40.0));
        let cx = StaggerContext::new(0, 1);
        assert_eq!(cycle.enter_from.timing.resolve(cx).delay, 40.0);
        assert_eq!(cycle.leave_to.timing.resolve(cx).delay, 40.0);
    }

    #[test]
    fn test_swap_override_keeps_default_ease() {
        let options = LayoutOptions::new()
            .with_swap_at(StateParams::new().with_property("opacity", PropertyValue::number(0.1)));
        assert_eq!(options.swap_at.ease, Some(Resolvable::Value(SWAP_EASE)));

        let explicit = LayoutOptions::new()
            .with_swap_at(StateParams::new().with_ease(Ease::Linear));
        assert_eq!(explicit.swap_at.ease, Some(Resolvable::Value(Ease::Linear)));
    }
}
