//! The DOM measurement boundary.
//!
//! The engine never touches a live document directly; every geometry read,
//! computed-style read, and inline-style write goes through the [`Dom`] trait.
//! Implementations are expected to be cheap to query: the engine performs one
//! synchronous measurement pass per generation and tolerates elements that
//! disappear between passes (every lookup is an `Option`, never a panic).

use std::fmt::Debug;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

/// Stable per-element key used to match nodes across generations.
///
/// Keys are assigned by the engine on first registration and written back onto
/// the element (the DOM incarnation stores them in a data attribute), so the
/// same element keeps its key for as long as it persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeKey(pub u64);

/// Viewport-relative bounding geometry of an element.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }
}

/// Measurement and mutation primitives the engine consumes.
///
/// Elements are small copyable ids; structural queries on an element that no
/// longer exists must return `false`/`None`/empty rather than fail. Computed
/// style reads return the resolved value string, or `""` when the property is
/// unknown, matching the silent-skip error policy.
pub trait Dom {
    /// Opaque element reference.
    type Element: Copy + Eq + Hash + Debug;

    /// True when the reference denotes a live element node the engine may
    /// track (foreign-namespace content such as SVG internals returns false).
    fn is_element(&self, el: Self::Element) -> bool;

    /// True when `el` is `root` or a descendant of it.
    fn contains(&self, root: Self::Element, el: Self::Element) -> bool;

    /// Parent element, if any.
    fn parent(&self, el: Self::Element) -> Option<Self::Element>;

    /// First element child.
    fn first_child(&self, el: Self::Element) -> Option<Self::Element>;

    /// Last element child.
    fn last_child(&self, el: Self::Element) -> Option<Self::Element>;

    /// Next sibling element.
    fn next_sibling(&self, el: Self::Element) -> Option<Self::Element>;

    /// Previous sibling element.
    fn prev_sibling(&self, el: Self::Element) -> Option<Self::Element>;

    /// True when the element has reflowable text adjacent to it (skipping
    /// comments and whitespace-only text). Such elements are excluded from
    /// position animation.
    fn has_adjacent_text(&self, el: Self::Element) -> bool;

    /// The node key previously written onto this element, if any.
    fn node_key(&self, el: Self::Element) -> Option<NodeKey>;

    /// Write a node key onto the element.
    fn set_node_key(&mut self, el: Self::Element, key: NodeKey);

    /// Remove the node key from the element.
    fn clear_node_key(&mut self, el: Self::Element);

    /// Elements under `scope` matching `selector`, in document order.
    fn select(&self, scope: Self::Element, selector: &str) -> Vec<Self::Element>;

    /// Viewport-relative bounding geometry.
    fn bounding_rect(&self, el: Self::Element) -> Rect;

    /// Left border offset.
    fn client_left(&self, el: Self::Element) -> f64;

    /// Top border offset.
    fn client_top(&self, el: Self::Element) -> f64;

    /// Resolved computed value of a style property, `""` when unknown.
    fn computed_value(&self, el: Self::Element, property: &str) -> String;

    /// Current inline value of a style property, `""` when unset.
    fn inline_value(&self, el: Self::Element, property: &str) -> String;

    /// Set an inline style property.
    fn set_inline(&mut self, el: Self::Element, property: &str, value: &str);

    /// Set an inline style property with `!important` priority.
    fn set_inline_important(&mut self, el: Self::Element, property: &str, value: &str);

    /// Remove an inline style property. Removing an absent property is a
    /// no-op.
    fn remove_inline(&mut self, el: Self::Element, property: &str);

    /// Current document scroll offset.
    fn scroll_offset(&self) -> (f64, f64);

    /// Scroll the document.
    fn scroll_to(&mut self, x: f64, y: f64);

    /// Mark the root as mid-transition (a class in the DOM incarnation).
    fn set_animating_marker(&mut self, el: Self::Element, on: bool);

    /// Whether the mid-transition marker is present.
    fn has_animating_marker(&self, el: Self::Element) -> bool;
}

/// Mute any active CSS transition on an element, returning the prior inline
/// value so it can be restored later.
pub(crate) fn mute_transition<D: Dom>(dom: &mut D, el: D::Element) -> String {
    let prior = dom.inline_value(el, "transition");
    dom.set_inline_important(el, "transition", "none");
    prior
}

/// Restore a previously muted transition. Restoring an empty prior value
/// removes the inline property entirely.
pub(crate) fn restore_transition<D: Dom>(dom: &mut D, el: D::Element, prior: &str) {
    if prior.is_empty() {
        dom.remove_inline(el, "transition");
    } else {
        dom.set_inline(el, "transition", prior);
    }
}
