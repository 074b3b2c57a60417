//! Measured and caller-supplied property values.
//!
//! Every tracked style property resolves to a [`PropertyValue`] at measurement
//! time. Caller-supplied override values (`enter_from`, `leave_to`, `swap_at`)
//! may instead be stagger functions of the node's `(index, total)` position;
//! those are wrapped in [`Resolvable`] and evaluated exactly once per cycle so
//! later comparisons always see stable resolved values.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// Position of a node within its timing group, handed to stagger functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StaggerContext {
    /// Index of the node within its group.
    pub index: usize,
    /// Total number of nodes in the group.
    pub total: usize,
}

impl StaggerContext {
    /// Create a stagger context from an index/total pair.
    pub fn new(index: usize, total: usize) -> Self {
        Self { index, total }
    }

    /// Normalized position in `[0, 1]` (0 when the group has a single node).
    pub fn fraction(&self) -> f64 {
        if self.total > 1 {
            self.index as f64 / (self.total - 1) as f64
        } else {
            0.0
        }
    }
}

/// A resolved style property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PropertyValue {
    /// Numeric value (opacity, pixel length, unitless factor).
    Number { value: f64 },
    /// Textual value (colors, filters, transform lists, keywords).
    Text { value: String },
}

impl PropertyValue {
    /// Textual value helper.
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text {
            value: value.into(),
        }
    }

    /// Numeric value helper.
    pub fn number(value: f64) -> Self {
        Self::Number { value }
    }

    /// Try to extract a numeric value.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number { value } => Some(*value),
            Self::Text { .. } => None,
        }
    }

    /// Try to extract a textual value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { value } => Some(value),
            Self::Number { .. } => None,
        }
    }

    /// Render the value the way it would be written to an inline style.
    pub fn to_style_string(&self) -> String {
        match self {
            Self::Number { value } => format_number(*value),
            Self::Text { value } => value.clone(),
        }
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        Self::Number { value }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::Text {
            value: value.to_string(),
        }
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::Text { value }
    }
}

/// Render a number without a trailing `.0` for integral values.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// A value that is either fixed or derived from the node's stagger position.
///
/// Mirrors the "function value" convention of animation parameters: a plain
/// value applies to every node, a function receives `(index, total)` and
/// produces a per-node value.
#[derive(Clone)]
pub enum Resolvable<T> {
    /// The same value for every node.
    Value(T),
    /// A per-node value computed from the node's stagger context.
    Stagger(Rc<dyn Fn(StaggerContext) -> T>),
}

impl<T: Clone> Resolvable<T> {
    /// Evaluate the value for one node.
    pub fn resolve(&self, cx: StaggerContext) -> T {
        match self {
            Self::Value(value) => value.clone(),
            Self::Stagger(f) => f(cx),
        }
    }

    /// True when this is a plain (non-stagger) value.
    pub fn is_value(&self) -> bool {
        matches!(self, Self::Value(_))
    }
}

impl<T> From<T> for Resolvable<T> {
    fn from(value: T) -> Self {
        Self::Value(value)
    }
}

impl<T: fmt::Debug> fmt::Debug for Resolvable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Stagger(_) => f.write_str("Stagger(..)"),
        }
    }
}

impl<T: PartialEq> PartialEq for Resolvable<T> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Value(a), Self::Value(b)) => a == b,
            // Stagger functions are opaque; they only compare equal once
            // resolved.
            _ => false,
        }
    }
}

/// Shorthand for a resolvable property value.
pub type ResolvableValue = Resolvable<PropertyValue>;

/// Build a stagger-function value.
pub fn stagger<T>(f: impl Fn(StaggerContext) -> T + 'static) -> Resolvable<T> {
    Resolvable::Stagger(Rc::new(f))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_value_conversions() {
        let v: PropertyValue = 42.0.into();
        assert_eq!(v.as_number(), Some(42.0));
        assert_eq!(v.as_text(), None);

        let v: PropertyValue = "rgb(0, 0, 0)".into();
        assert_eq!(v.as_text(), Some("rgb(0, 0, 0)"));
        assert_eq!(v.as_number(), None);
    }

    #[test]
    fn test_style_string_formatting() {
        assert_eq!(PropertyValue::number(12.0).to_style_string(), "12");
        assert_eq!(PropertyValue::number(12.5).to_style_string(), "12.5");
        assert_eq!(PropertyValue::text("none").to_style_string(), "none");
    }

    #[test]
    fn test_resolvable_value() {
        let fixed: Resolvable<f64> = 350.0.into();
        assert_eq!(fixed.resolve(StaggerContext::new(3, 10)), 350.0);
        assert!(fixed.is_value());

        let staggered = stagger(|cx: StaggerContext| 100.0 * cx.index as f64);
        assert_eq!(staggered.resolve(StaggerContext::new(3, 10)), 300.0);
        assert!(!staggered.is_value());
    }

    #[test]
    fn test_stagger_fraction() {
        assert_eq!(StaggerContext::new(0, 1).fraction(), 0.0);
        assert_eq!(StaggerContext::new(0, 5).fraction(), 0.0);
        assert_eq!(StaggerContext::new(4, 5).fraction(), 1.0);
        assert_eq!(StaggerContext::new(2, 5).fraction(), 0.5);
    }

    #[test]
    fn test_property_value_serde_round_trip() {
        let v = PropertyValue::number(0.5);
        let json = serde_json::to_string(&v).unwrap();
        let back: PropertyValue = serde_json::from_str(&json).unwrap();
        assert_eq!(v, back);
    }
}
