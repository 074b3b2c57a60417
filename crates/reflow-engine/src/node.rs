//! Node model: one tracked element within one snapshot generation.
//!
//! Nodes live in a per-snapshot [`NodeArena`] and are addressed by
//! generation-checked [`NodeHandle`]s. Tree structure is intrusive: each node
//! carries `parent`/`prev`/`next` links plus `head`/`tail` child pointers, so
//! detach and append are O(1) and never shift arrays while a walk is in
//! progress. A handle from a cleared generation resolves to `None` instead of
//! aliasing a recycled slot.

use std::collections::BTreeMap;

use static_assertions::assert_impl_all;

use crate::dom::NodeKey;
use crate::easing::Ease;
use crate::value::{PropertyValue, Resolvable};

/// Generation-checked reference to a node in a [`NodeArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    index: u32,
    generation: u32,
}

assert_impl_all!(NodeHandle: Copy, Eq, std::hash::Hash);

/// The measured geometry and tracked style values of one node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeProperties {
    /// Resolved computed transform (`"none"` when absent).
    pub transform: String,
    /// Local x relative to the nearest tracked ancestor.
    pub x: f64,
    /// Local y relative to the nearest tracked ancestor.
    pub y: f64,
    /// Viewport-relative left.
    pub left: f64,
    /// Viewport-relative top.
    pub top: f64,
    /// Left border offset.
    pub client_left: f64,
    /// Top border offset.
    pub client_top: f64,
    pub width: f64,
    pub height: f64,
    /// Tracked style properties by name. Values may temporarily hold stagger
    /// functions injected from enter/leave/swap overrides; they are resolved
    /// in place before any comparison.
    pub styles: BTreeMap<String, Resolvable<PropertyValue>>,
}

impl NodeProperties {
    /// Fresh properties with every tracked style zeroed.
    pub fn new(tracked: impl IntoIterator<Item = String>) -> Self {
        let mut styles = BTreeMap::new();
        for name in tracked {
            styles.insert(name, Resolvable::Value(PropertyValue::number(0.0)));
        }
        Self {
            transform: "none".to_string(),
            x: 0.0,
            y: 0.0,
            left: 0.0,
            top: 0.0,
            client_left: 0.0,
            client_top: 0.0,
            width: 0.0,
            height: 0.0,
            styles,
        }
    }

    /// Iterate every comparable property as `(name, value)`, covering the
    /// fixed numeric fields and the tracked style table. Stagger entries must
    /// already be resolved. The `transform` field is excluded; transforms are
    /// compared separately.
    pub fn comparable(&self) -> impl Iterator<Item = (&str, PropertyValue)> + '_ {
        let fixed = [
            ("x", self.x),
            ("y", self.y),
            ("left", self.left),
            ("top", self.top),
            ("clientLeft", self.client_left),
            ("clientTop", self.client_top),
            ("width", self.width),
            ("height", self.height),
        ];
        fixed
            .into_iter()
            .map(|(name, v)| (name, PropertyValue::number(v)))
            .chain(self.styles.iter().filter_map(|(name, v)| match v {
                Resolvable::Value(value) => Some((name.as_str(), value.clone())),
                Resolvable::Stagger(_) => None,
            }))
    }

    /// Resolved value of one tracked style property, if present and resolved.
    pub fn style(&self, name: &str) -> Option<&PropertyValue> {
        match self.styles.get(name) {
            Some(Resolvable::Value(value)) => Some(value),
            _ => None,
        }
    }

    /// Overwrite a tracked style property.
    pub fn set_style(&mut self, name: &str, value: Resolvable<PropertyValue>) {
        self.styles.insert(name.to_string(), value);
    }
}

/// One tracked element's snapshot record.
///
/// Field groups mirror the measurement cycle: identity, tree links, timing,
/// classification flags, measurement flags, and the measured property table.
#[derive(Debug, Clone)]
pub struct Node<E> {
    /// Stable cross-generation key.
    pub key: NodeKey,
    /// The live element this node animates.
    pub element: E,
    /// The element measurements were taken from. Usually `element`; differs
    /// when a hidden node borrows geometry from its visible twin.
    pub measure: E,

    // Timing, resolved per cycle.
    pub index: usize,
    pub total: usize,
    pub delay: f64,
    pub duration: f64,
    pub ease: Ease,

    // Intrusive tree links.
    pub parent: Option<NodeHandle>,
    pub prev: Option<NodeHandle>,
    pub next: Option<NodeHandle>,
    pub head: Option<NodeHandle>,
    pub tail: Option<NodeHandle>,

    // Classification.
    pub is_target: bool,
    pub is_entering: bool,
    pub is_leaving: bool,
    /// Adjacent to reflowable text; excluded from position animation.
    pub is_inlined: bool,
    pub has_transform: bool,
    pub branch_added: bool,
    pub branch_removed: bool,
    pub branch_not_rendered: bool,
    pub size_changed: bool,
    /// Display/visibility just toggled relative to the previous measurement.
    pub has_visibility_swap: bool,
    pub has_display_none: bool,
    pub has_visibility_hidden: bool,

    // Captured inline state for later restoration.
    pub inline_styles: Vec<(String, String)>,
    pub inline_transform: Option<String>,
    pub inline_transition: Option<String>,
    pub measure_inline_transform: Option<String>,
    pub measure_inline_transition: Option<String>,

    // Measurement flags.
    pub measured_display: String,
    pub measured_visibility: String,
    pub measured_position: String,
    pub measured_has_display_none: bool,
    pub measured_has_visibility_hidden: bool,
    pub measured_is_visible: bool,
    /// Hidden via display/visibility, or under a non-rendered parent.
    pub measured_is_removed: bool,
    pub measured_is_inside_root: bool,

    pub props: NodeProperties,
}

impl<E: Copy> Node<E> {
    /// Fresh node for `element` with the given tracked property set.
    pub fn new(key: NodeKey, element: E, tracked: impl IntoIterator<Item = String>) -> Self {
        Self {
            key,
            element,
            measure: element,
            index: 0,
            total: 1,
            delay: 0.0,
            duration: 0.0,
            ease: Ease::default(),
            parent: None,
            prev: None,
            next: None,
            head: None,
            tail: None,
            is_target: false,
            is_entering: false,
            is_leaving: false,
            is_inlined: false,
            has_transform: false,
            branch_added: false,
            branch_removed: false,
            branch_not_rendered: false,
            size_changed: false,
            has_visibility_swap: false,
            has_display_none: false,
            has_visibility_hidden: false,
            inline_styles: Vec::new(),
            inline_transform: None,
            inline_transition: None,
            measure_inline_transform: None,
            measure_inline_transition: None,
            measured_display: String::new(),
            measured_visibility: String::new(),
            measured_position: String::new(),
            measured_has_display_none: false,
            measured_has_visibility_hidden: false,
            measured_is_visible: false,
            measured_is_removed: false,
            measured_is_inside_root: false,
            props: NodeProperties::new(tracked),
        }
    }

    /// Re-initialize this slot for a different element, keeping the key.
    /// Used when a node is rebound during hidden-twin reassignment.
    pub fn rebind(&mut self, element: E, tracked: impl IntoIterator<Item = String>) {
        let key = self.key;
        *self = Self::new(key, element, tracked);
    }
}

/// Arena of nodes for one snapshot generation.
///
/// Clearing the arena bumps the generation counter so handles issued before
/// the clear can no longer resolve.
#[derive(Debug)]
pub struct NodeArena<E> {
    slots: Vec<Node<E>>,
    generation: u32,
}

impl<E: Copy> NodeArena<E> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            generation: 0,
        }
    }

    /// Drop every node and invalidate all outstanding handles.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.generation = self.generation.wrapping_add(1);
    }

    /// Insert a node and return its handle.
    pub fn alloc(&mut self, node: Node<E>) -> NodeHandle {
        let index = self.slots.len() as u32;
        self.slots.push(node);
        NodeHandle {
            index,
            generation: self.generation,
        }
    }

    /// Resolve a handle, or `None` if it belongs to a cleared generation.
    pub fn get(&self, handle: NodeHandle) -> Option<&Node<E>> {
        if handle.generation != self.generation {
            return None;
        }
        self.slots.get(handle.index as usize)
    }

    /// Mutable handle resolution with the same generation check.
    pub fn get_mut(&mut self, handle: NodeHandle) -> Option<&mut Node<E>> {
        if handle.generation != self.generation {
            return None;
        }
        self.slots.get_mut(handle.index as usize)
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Unlink a node from its parent's child list, fixing up all four
    /// neighboring pointers atomically. Detaching an already-detached node is
    /// a safe no-op.
    pub fn detach(&mut self, handle: NodeHandle) {
        let Some(node) = self.get(handle) else {
            return;
        };
        let Some(parent) = node.parent else {
            return;
        };
        let prev = node.prev;
        let next = node.next;

        if let Some(p) = self.get_mut(parent) {
            if p.head == Some(handle) {
                p.head = next;
            }
            if p.tail == Some(handle) {
                p.tail = prev;
            }
        }
        if let Some(prev) = prev {
            if let Some(n) = self.get_mut(prev) {
                n.next = next;
            }
        }
        if let Some(next) = next {
            if let Some(n) = self.get_mut(next) {
                n.prev = prev;
            }
        }
        if let Some(n) = self.get_mut(handle) {
            n.prev = None;
            n.next = None;
            n.parent = None;
        }
    }

    /// Append `child` at the tail of `parent`'s child list.
    pub fn append_child(&mut self, parent: NodeHandle, child: NodeHandle) {
        let tail = match self.get(parent) {
            Some(p) => p.tail,
            None => return,
        };
        match tail {
            None => {
                if let Some(p) = self.get_mut(parent) {
                    p.head = Some(child);
                    p.tail = Some(child);
                }
            }
            Some(tail) => {
                if let Some(t) = self.get_mut(tail) {
                    t.next = Some(child);
                }
                if let Some(c) = self.get_mut(child) {
                    c.prev = Some(tail);
                }
                if let Some(p) = self.get_mut(parent) {
                    p.tail = Some(child);
                }
            }
        }
        if let Some(c) = self.get_mut(child) {
            c.parent = Some(parent);
        }
    }

    /// Pre-order traversal from `start` using the intrusive links. Siblings
    /// of `start` are outside the traversal.
    pub fn preorder(&self, start: NodeHandle) -> Vec<NodeHandle> {
        let mut out = Vec::new();
        let mut current = Some(start);
        while let Some(handle) = current {
            let Some(node) = self.get(handle) else { break };
            out.push(handle);
            current = if let Some(head) = node.head {
                Some(head)
            } else if handle == start {
                None
            } else if let Some(next) = node.next {
                Some(next)
            } else {
                let mut up = node.parent;
                let mut resumed = None;
                while let Some(p) = up {
                    if p == start {
                        break;
                    }
                    let Some(pn) = self.get(p) else { break };
                    if let Some(next) = pn.next {
                        resumed = Some(next);
                        break;
                    }
                    up = pn.parent;
                }
                resumed
            };
        }
        out
    }
}

impl<E: Copy> Default for NodeArena<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(key: u64) -> Node<u32> {
        Node::new(NodeKey(key), key as u32, std::iter::empty())
    }

    #[test]
    fn test_handle_survives_within_generation() {
        let mut arena = NodeArena::new();
        let h = arena.alloc(node(1));
        assert!(arena.get(h).is_some());
        assert_eq!(arena.get(h).unwrap().key, NodeKey(1));
    }

    #[test]
    fn test_stale_handle_after_clear() {
        let mut arena = NodeArena::new();
        let h = arena.alloc(node(1));
        arena.clear();
        assert!(arena.get(h).is_none());

        let h2 = arena.alloc(node(2));
        // The old handle points at the same slot index but must not alias the
        // recycled node.
        assert!(arena.get(h).is_none());
        assert_eq!(arena.get(h2).unwrap().key, NodeKey(2));
    }

    #[test]
    fn test_append_and_detach_fix_links() {
        let mut arena = NodeArena::new();
        let parent = arena.alloc(node(1));
        let a = arena.alloc(node(2));
        let b = arena.alloc(node(3));
        let c = arena.alloc(node(4));
        arena.append_child(parent, a);
        arena.append_child(parent, b);
        arena.append_child(parent, c);

        assert_eq!(arena.get(parent).unwrap().head, Some(a));
        assert_eq!(arena.get(parent).unwrap().tail, Some(c));
        assert_eq!(arena.get(b).unwrap().prev, Some(a));
        assert_eq!(arena.get(b).unwrap().next, Some(c));

        arena.detach(b);
        assert_eq!(arena.get(a).unwrap().next, Some(c));
        assert_eq!(arena.get(c).unwrap().prev, Some(a));
        assert_eq!(arena.get(b).unwrap().parent, None);
        assert_eq!(arena.get(b).unwrap().prev, None);
        assert_eq!(arena.get(b).unwrap().next, None);

        arena.detach(a);
        assert_eq!(arena.get(parent).unwrap().head, Some(c));
        arena.detach(c);
        assert_eq!(arena.get(parent).unwrap().head, None);
        assert_eq!(arena.get(parent).unwrap().tail, None);
    }

    #[test]
    fn test_detach_detached_is_noop() {
        let mut arena = NodeArena::new();
        let a = arena.alloc(node(1));
        arena.detach(a);
        arena.detach(a);
        assert!(arena.get(a).is_some());
    }

    #[test]
    fn test_preorder_traversal() {
        let mut arena = NodeArena::new();
        let root = arena.alloc(node(1));
        let a = arena.alloc(node(2));
        let a1 = arena.alloc(node(3));
        let a2 = arena.alloc(node(4));
        let b = arena.alloc(node(5));
        arena.append_child(root, a);
        arena.append_child(a, a1);
        arena.append_child(a, a2);
        arena.append_child(root, b);

        let order: Vec<u64> = arena
            .preorder(root)
            .into_iter()
            .map(|h| arena.get(h).unwrap().key.0)
            .collect();
        assert_eq!(order, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_preorder_subtree_stays_inside_start() {
        let mut arena = NodeArena::new();
        let root = arena.alloc(node(1));
        let a = arena.alloc(node(2));
        let a1 = arena.alloc(node(3));
        let b = arena.alloc(node(4));
        arena.append_child(root, a);
        arena.append_child(a, a1);
        arena.append_child(root, b);

        let order: Vec<u64> = arena
            .preorder(a)
            .into_iter()
            .map(|h| arena.get(h).unwrap().key.0)
            .collect();
        // b is a sibling of the start node and must not be visited.
        assert_eq!(order, vec![2, 3]);
    }

    #[test]
    fn test_comparable_covers_geometry_and_styles() {
        let mut props = NodeProperties::new(["opacity".to_string()]);
        props.width = 120.0;
        props.set_style("opacity", Resolvable::Value(PropertyValue::number(0.5)));

        let all: Vec<(String, PropertyValue)> = props
            .comparable()
            .map(|(n, v)| (n.to_string(), v))
            .collect();
        assert!(all.contains(&("width".to_string(), PropertyValue::number(120.0))));
        assert!(all.contains(&("opacity".to_string(), PropertyValue::number(0.5))));
        assert!(!all.iter().any(|(n, _)| n == "transform"));
    }
}
