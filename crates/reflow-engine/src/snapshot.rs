//! Snapshot: one measured generation of the tracked region.
//!
//! A snapshot walks the root's subtree, mirrors every element into an arena
//! node, and captures geometry plus the tracked style properties. Two
//! snapshots (old and new) alternate between cycles; nodes are matched across
//! generations purely by their stable [`NodeKey`], never by handle.
//!
//! Measurement is invasive by necessity: CSS transitions are muted before
//! reading geometry so in-flight declarative animations cannot skew the
//! numbers, and computed transforms are zeroed for the read then restored at
//! the end of the pass.

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;

use tracing::trace;

use crate::dom::{Dom, NodeKey, mute_transition, restore_transition};
use crate::node::{Node, NodeArena, NodeHandle};
use crate::value::{PropertyValue, Resolvable};

/// Per-animator state shared by both snapshot generations.
#[derive(Debug)]
pub(crate) struct CycleState<E> {
    /// Elements whose CSS transitions are muted for the current cycle, with
    /// the inline value to restore.
    pub transition_mutes: HashMap<E, String>,
    /// Elements currently playing their leave transition; still in the
    /// document but already counted as removed.
    pub pending_removal: HashSet<E>,
    /// True when the root is absolutely positioned, making node coordinates
    /// viewport-relative.
    pub absolute_coords: bool,
    next_key: u64,
}

impl<E: Copy + Eq + Hash> CycleState<E> {
    pub fn new() -> Self {
        Self {
            transition_mutes: HashMap::new(),
            pending_removal: HashSet::new(),
            absolute_coords: false,
            next_key: 1,
        }
    }

    fn alloc_key(&mut self) -> NodeKey {
        let key = NodeKey(self.next_key);
        self.next_key += 1;
        key
    }

    /// Mute an element's CSS transition once per cycle.
    pub fn mute_once<D: Dom<Element = E>>(&mut self, dom: &mut D, el: E) {
        if !self.transition_mutes.contains_key(&el) {
            let prior = mute_transition(dom, el);
            self.transition_mutes.insert(el, prior);
        }
    }

    /// Restore every muted transition and forget them.
    pub fn restore_mutes<D: Dom<Element = E>>(&mut self, dom: &mut D) {
        for (el, prior) in self.transition_mutes.drain() {
            restore_transition(dom, el, &prior);
        }
    }
}

/// Borrowed configuration for one measurement pass.
pub(crate) struct RecordScope<'a, E> {
    pub root: E,
    /// Element named selectors resolve against; `"*"` always resolves
    /// against the root itself.
    pub select_scope: E,
    pub children: &'a [String],
    pub tracked: &'a [String],
}

/// Computed-style stand-in for nodes under a non-rendered parent, which
/// cannot be measured.
fn hidden_computed_value(property: &str) -> Option<&'static str> {
    match property {
        "display" => Some("none"),
        "visibility" => Some("hidden"),
        "opacity" => Some("0"),
        "transform" => Some("none"),
        "position" => Some("static"),
        _ => None,
    }
}

/// One measured generation.
#[derive(Debug)]
pub struct Snapshot<E> {
    arena: NodeArena<E>,
    /// Key to handle, for cross-generation matching.
    nodes: HashMap<NodeKey, NodeHandle>,
    /// Handles in registration order; the source of `index`/`total`.
    order: Vec<NodeHandle>,
    /// Disconnected subtree roots, the tracked root first.
    roots: Vec<NodeHandle>,
    root: Option<NodeHandle>,
    pub scroll_x: f64,
    pub scroll_y: f64,
}

impl<E: Copy + Eq + Hash + Debug> Snapshot<E> {
    pub fn new() -> Self {
        Self {
            arena: NodeArena::new(),
            nodes: HashMap::new(),
            order: Vec::new(),
            roots: Vec::new(),
            root: None,
            scroll_x: 0.0,
            scroll_y: 0.0,
        }
    }

    pub fn arena(&self) -> &NodeArena<E> {
        &self.arena
    }

    pub fn arena_mut(&mut self) -> &mut NodeArena<E> {
        &mut self.arena
    }

    /// The node mirroring the tracked root, if a pass has run.
    pub fn root(&self) -> Option<NodeHandle> {
        self.root
    }

    /// Handle for a key measured in this generation.
    pub fn lookup(&self, key: NodeKey) -> Option<NodeHandle> {
        self.nodes.get(&key).copied()
    }

    /// Handle for an element, through its key.
    pub fn node_of<D: Dom<Element = E>>(&self, dom: &D, el: E) -> Option<NodeHandle> {
        dom.node_key(el).and_then(|key| self.lookup(key))
    }

    /// Nodes in registration order.
    pub fn ordered(&self) -> &[NodeHandle] {
        &self.order
    }

    /// Pre-order traversal of the root's subtree.
    pub fn root_preorder(&self) -> Vec<NodeHandle> {
        match self.root {
            Some(root) => self.arena.preorder(root),
            None => Vec::new(),
        }
    }

    /// Pre-order traversal over every disconnected subtree.
    pub fn all_preorder(&self) -> Vec<NodeHandle> {
        let mut out = Vec::new();
        for &root in &self.roots {
            out.extend(self.arena.preorder(root));
        }
        out
    }

    /// Insert a node synthesized by reconciliation (a counterpart for a key
    /// this generation never measured). The node joins the key index but not
    /// the registration order or any tree.
    pub(crate) fn insert_synthetic(&mut self, node: Node<E>) -> NodeHandle {
        let key = node.key;
        let handle = self.arena.alloc(node);
        self.nodes.insert(key, handle);
        handle
    }

    /// Measured value of a property, as the swap midpoint tweens see it.
    pub fn measured_value(&self, handle: NodeHandle, property: &str) -> Option<PropertyValue> {
        let node = self.arena.get(handle)?;
        if property == "transform" {
            return Some(PropertyValue::text(node.props.transform.clone()));
        }
        node.props.style(property).cloned()
    }

    /// Drop all nodes and strip their keys from the document.
    pub(crate) fn revert<D: Dom<Element = E>>(&mut self, dom: &mut D, state: &mut CycleState<E>) {
        for handle in self.all_preorder() {
            if let Some(node) = self.arena.get(handle) {
                state.pending_removal.remove(&node.element);
                dom.clear_node_key(node.element);
                if node.measure != node.element {
                    dom.clear_node_key(node.measure);
                }
            }
        }
        self.root = None;
        self.roots.clear();
        self.nodes.clear();
        self.order.clear();
        self.arena.clear();
    }

    /// Measure the whole tracked region into this snapshot.
    ///
    /// Any previous generation held by this snapshot is discarded. Root
    /// ancestors with active transforms are muted around the pass so every
    /// bounding rect is read in an untransformed coordinate space.
    pub(crate) fn record<D: Dom<Element = E>>(
        &mut self,
        dom: &mut D,
        state: &mut CycleState<E>,
        scope: &RecordScope<'_, E>,
    ) {
        let root = scope.root;

        // Mute root-ancestor transforms before measuring.
        let mut ancestor_restores: Vec<(E, String, String)> = Vec::new();
        let mut ancestor = dom.parent(root);
        while let Some(el) = ancestor {
            let transform = dom.computed_value(el, "transform");
            if !transform.is_empty() && transform != "none" {
                let inline_transform = dom.inline_value(el, "transform");
                let inline_transition = mute_transition(dom, el);
                dom.set_inline(el, "transform", "none");
                ancestor_restores.push((el, inline_transform, inline_transition));
            }
            ancestor = dom.parent(el);
        }

        let mut selected: Vec<E> = Vec::new();
        for selector in scope.children {
            let from = if selector == "*" {
                root
            } else {
                scope.select_scope
            };
            selected.extend(dom.select(from, selector));
        }

        self.nodes.clear();
        self.order.clear();
        self.roots.clear();
        self.root = None;
        self.arena.clear();

        let root_node = self.register_element(dom, state, scope, root, None);
        if let Some(root_node) = root_node {
            if let Some(node) = self.arena.get_mut(root_node) {
                node.is_target = true;
            }
            self.root = Some(root_node);
        }

        // Initial index/total, and the keys already registered under the root.
        let total = self.order.len();
        let mut in_root_keys = HashSet::new();
        for (index, &handle) in self.order.clone().iter().enumerate() {
            if let Some(node) = self.arena.get_mut(handle) {
                node.index = index;
                node.total = total;
                if node.measured_is_inside_root {
                    in_root_keys.insert(node.key);
                }
            }
        }

        // Selector matches outside the root join the snapshot only when an
        // in-root twin carries the same key.
        let mut detached_lookup: HashSet<E> = HashSet::new();
        let mut detached_ordered: Vec<E> = Vec::new();
        for &el in &selected {
            if !dom.is_element(el) || el == root {
                continue;
            }
            if !dom.contains(root, el) {
                let twin_tracked = dom
                    .node_key(el)
                    .is_some_and(|key| in_root_keys.contains(&key));
                if !twin_tracked {
                    continue;
                }
            }
            if detached_lookup.insert(el) {
                detached_ordered.push(el);
            }
        }
        for el in detached_ordered {
            self.ensure_detached_node(dom, state, scope, el, &detached_lookup);
        }

        // Selector matches and their ancestors become targets.
        for &el in &selected {
            let mut current = self.node_of(dom, el);
            while let Some(handle) = current {
                let Some(node) = self.arena.get_mut(handle) else {
                    break;
                };
                if node.is_target {
                    break;
                }
                node.is_target = true;
                current = node.parent;
            }
        }

        let (scroll_x, scroll_y) = dom.scroll_offset();
        self.scroll_x = scroll_x;
        self.scroll_y = scroll_y;

        for handle in self.all_preorder() {
            self.restore_node_transform(dom, state, handle);
        }

        for (el, inline_transform, inline_transition) in ancestor_restores {
            if inline_transform.is_empty() {
                dom.remove_inline(el, "transform");
            } else {
                dom.set_inline(el, "transform", &inline_transform);
            }
            restore_transition(dom, el, &inline_transition);
        }

        trace!(
            nodes = self.order.len(),
            roots = self.roots.len(),
            "snapshot recorded"
        );
    }

    /// Register `el` and its descendants, returning the handle for `el`.
    ///
    /// The walk is an explicit stack (deep component trees must not recurse)
    /// carrying the tracked parent for each element. When an element's key is
    /// already bound to a different element this pass, the hidden-twin
    /// heuristic decides whether to rebind the node, borrow the twin's
    /// measurements, or keep walking.
    pub(crate) fn register_element<D: Dom<Element = E>>(
        &mut self,
        dom: &mut D,
        state: &mut CycleState<E>,
        scope: &RecordScope<'_, E>,
        el: E,
        parent: Option<NodeHandle>,
    ) -> Option<NodeHandle> {
        if !dom.is_element(el) {
            return None;
        }
        state.mute_once(dom, el);

        let root = scope.root;
        let mut first_node = None;
        let mut stack: Vec<(E, Option<NodeHandle>)> = vec![(el, parent)];

        while let Some((current, parent)) = stack.pop() {
            if !dom.is_element(current) {
                continue;
            }

            let skip_measurements = parent
                .and_then(|p| self.arena.get(p))
                .is_some_and(|p| p.measured_is_removed);
            let computed = |dom: &D, property: &str| -> String {
                if skip_measurements {
                    hidden_computed_value(property).unwrap_or("").to_string()
                } else {
                    dom.computed_value(current, property)
                }
            };
            let has_display_none = skip_measurements || computed(dom, "display") == "none";
            let has_visibility_hidden = skip_measurements || computed(dom, "visibility") == "hidden";
            let is_visible = !has_display_none && !has_visibility_hidden;
            let is_inside_root = dom.contains(root, current);

            let existing = dom.node_key(current).and_then(|key| self.lookup(key));

            let handle = match existing {
                Some(handle)
                    if self
                        .arena
                        .get(handle)
                        .is_some_and(|node| node.element != current) =>
                {
                    let Some((node_el, measured_visible)) = self
                        .arena
                        .get(handle)
                        .map(|node| (node.element, node.measured_is_visible))
                    else {
                        continue;
                    };
                    let node_inside_root = dom.contains(root, node_el);
                    let should_reassign = !node_inside_root
                        && (is_inside_root || (!measured_visible && is_visible));
                    let should_reuse_measurements =
                        node_inside_root && !measured_visible && is_visible;

                    if should_reassign {
                        // The key's element moved into the root (or its
                        // detached twin just became visible): rebind the node.
                        self.arena.detach(handle);
                        if let Some(node) = self.arena.get_mut(handle) {
                            node.rebind(current, scope.tracked.iter().cloned());
                        }
                        handle
                    } else if should_reuse_measurements {
                        // Hidden in-root node with a visible out-of-root twin:
                        // keep the node, borrow the twin's measurements.
                        self.record_node_state(dom, state, scope, handle, current, skip_measurements);
                        self.push_children(dom, &mut stack, current, Some(handle));
                        first_node.get_or_insert(handle);
                        continue;
                    } else {
                        self.push_children(dom, &mut stack, current, parent);
                        first_node.get_or_insert(handle);
                        continue;
                    }
                }
                Some(handle) => {
                    // Same element visited again this pass: reset it in place.
                    self.arena.detach(handle);
                    if let Some(node) = self.arena.get_mut(handle) {
                        node.rebind(current, scope.tracked.iter().cloned());
                    }
                    handle
                }
                None => {
                    let key = match dom.node_key(current) {
                        Some(key) => key,
                        None => {
                            let key = state.alloc_key();
                            dom.set_node_key(current, key);
                            key
                        }
                    };
                    self.arena
                        .alloc(Node::new(key, current, scope.tracked.iter().cloned()))
                }
            };

            if let Some(node) = self.arena.get_mut(handle) {
                node.branch_added = false;
                node.branch_removed = false;
                node.branch_not_rendered = false;
                node.is_target = false;
                node.size_changed = false;
                node.has_visibility_hidden = has_visibility_hidden;
                node.has_display_none = has_display_none;
                // Computed against the previous measurement of this key, so a
                // node that just toggled hidden reads as a swap.
                node.has_visibility_swap = (has_visibility_hidden
                    && !node.measured_has_visibility_hidden)
                    || (has_display_none && !node.measured_has_display_none);

                let key = node.key;
                if self.nodes.insert(key, handle).is_none() {
                    self.order.push(handle);
                }
            }

            self.arena.detach(handle);
            match parent {
                Some(parent) => {
                    self.roots.retain(|&r| r != handle);
                    self.arena.append_child(parent, handle);
                }
                None => {
                    if !self.roots.contains(&handle) {
                        self.roots.push(handle);
                    }
                }
            }

            self.record_node_state(dom, state, scope, handle, current, skip_measurements);
            self.push_children(dom, &mut stack, current, Some(handle));
            first_node.get_or_insert(handle);
        }

        first_node
    }

    /// Queue `el`'s element children for the walk, first child on top.
    fn push_children<D: Dom<Element = E>>(
        &self,
        dom: &D,
        stack: &mut Vec<(E, Option<NodeHandle>)>,
        el: E,
        parent: Option<NodeHandle>,
    ) {
        let mut child = dom.last_child(el);
        while let Some(c) = child {
            stack.push((c, parent));
            child = dom.prev_sibling(c);
        }
    }

    /// Register an element that matched the children selectors but sits
    /// outside the root, attaching it under its nearest also-matched
    /// ancestor.
    pub(crate) fn ensure_detached_node<D: Dom<Element = E>>(
        &mut self,
        dom: &mut D,
        state: &mut CycleState<E>,
        scope: &RecordScope<'_, E>,
        el: E,
        candidates: &HashSet<E>,
    ) -> Option<NodeHandle> {
        if el == scope.root {
            return None;
        }
        if let Some(handle) = self.node_of(dom, el) {
            if self
                .arena
                .get(handle)
                .is_some_and(|node| node.element == el)
            {
                return Some(handle);
            }
        }
        let mut parent = None;
        let mut ancestor = dom.parent(el);
        while let Some(a) = ancestor {
            if a == scope.root {
                break;
            }
            if candidates.contains(&a) {
                parent = self.ensure_detached_node(dom, state, scope, a, candidates);
                break;
            }
            ancestor = dom.parent(a);
        }
        self.register_element(dom, state, scope, el, parent)
    }

    /// Measure one node: structural flags, geometry, and the tracked style
    /// table. `measure` is the element the numbers come from, which differs
    /// from the node's element when borrowing from a visible twin.
    fn record_node_state<D: Dom<Element = E>>(
        &mut self,
        dom: &mut D,
        state: &mut CycleState<E>,
        scope: &RecordScope<'_, E>,
        handle: NodeHandle,
        measure: E,
        skip_measurements: bool,
    ) {
        let root = scope.root;
        let (el, parent) = match self.arena.get(handle) {
            Some(node) => (node.element, node.parent),
            None => return,
        };
        let is_root = el == root;

        let computed = |dom: &D, property: &str| -> String {
            if skip_measurements {
                hidden_computed_value(property).unwrap_or("").to_string()
            } else {
                dom.computed_value(measure, property)
            }
        };

        let computed_transform = computed(dom, "transform");
        let inline_transform = dom.inline_value(el, "transform");
        let position = computed(dom, "position");
        if is_root {
            state.absolute_coords = position == "fixed" || position == "absolute";
        }
        let parent_not_rendered = parent
            .and_then(|p| self.arena.get(p))
            .is_some_and(|p| p.measured_is_removed);
        let has_transform = !computed_transform.is_empty() && computed_transform != "none";
        let measured_is_inside_root = dom.contains(root, measure);
        let measured_display = computed(dom, "display");
        let measured_visibility = computed(dom, "visibility");
        let measured_has_display_none = measured_display == "none";
        let measured_has_visibility_hidden = measured_visibility == "hidden";
        let is_inlined = dom.has_adjacent_text(el);

        {
            let Some(node) = self.arena.get_mut(handle) else {
                return;
            };
            node.measure = measure;
            node.inline_transform = Some(inline_transform);
            node.has_transform = has_transform;
            node.measured_is_inside_root = measured_is_inside_root;
            node.measure_inline_transform = None;
            node.measured_display = measured_display;
            node.measured_visibility = measured_visibility;
            node.measured_position = position;
            node.measured_has_display_none = measured_has_display_none;
            node.measured_has_visibility_hidden = measured_has_visibility_hidden;
            node.measured_is_visible = !(measured_has_display_none || measured_has_visibility_hidden);
            node.measured_is_removed =
                measured_has_display_none || measured_has_visibility_hidden || parent_not_rendered;
            node.is_inlined = is_inlined;
        }

        // Zero transforms (and mute transitions so the write cannot animate)
        // before reading geometry.
        if has_transform && !skip_measurements {
            let el_muted = state.transition_mutes.contains_key(&el);
            if !el_muted {
                let prior = mute_transition(dom, el);
                if let Some(node) = self.arena.get_mut(handle) {
                    node.inline_transition = Some(prior);
                }
            }
            if measure == el {
                dom.set_inline(el, "transform", "none");
            } else {
                if !state.transition_mutes.contains_key(&measure) {
                    let prior = mute_transition(dom, measure);
                    if let Some(node) = self.arena.get_mut(handle) {
                        node.measure_inline_transition = Some(prior);
                    }
                }
                let measure_inline = dom.inline_value(measure, "transform");
                if let Some(node) = self.arena.get_mut(handle) {
                    node.measure_inline_transform = Some(measure_inline);
                }
                dom.set_inline(measure, "transform", "none");
            }
        }

        let (left, top, width, height, client_left, client_top) = if skip_measurements {
            (0.0, 0.0, 0.0, 0.0, 0.0, 0.0)
        } else {
            let rect = dom.bounding_rect(measure);
            (
                rect.left,
                rect.top,
                rect.width,
                rect.height,
                dom.client_left(measure),
                dom.client_top(measure),
            )
        };

        let mut style_values: Vec<(String, String)> = Vec::new();
        for name in scope.tracked {
            let value = if name == "transform" {
                computed_transform.clone()
            } else {
                computed(dom, name)
            };
            if !value.is_empty() {
                style_values.push((name.clone(), value));
            }
        }

        // Local x/y relative to the nearest tracked ancestor (or the root
        // node for detached subtrees); viewport-relative for the root itself.
        let (x, y) = if is_root {
            if state.absolute_coords {
                (left, top)
            } else {
                (0.0, 0.0)
            }
        } else {
            let reference = parent.or(self.root);
            match reference.and_then(|h| self.arena.get(h)) {
                Some(p) => (
                    left - p.props.left - p.props.client_left,
                    top - p.props.top - p.props.client_top,
                ),
                None => (left, top),
            }
        };

        if let Some(node) = self.arena.get_mut(handle) {
            for (name, value) in style_values {
                node.props
                    .set_style(&name, Resolvable::Value(PropertyValue::text(value)));
            }
            node.props.transform = if computed_transform.is_empty() {
                "none".to_string()
            } else {
                computed_transform
            };
            node.props.left = left;
            node.props.top = top;
            node.props.client_left = client_left;
            node.props.client_top = client_top;
            node.props.x = x;
            node.props.y = y;
            node.props.width = width;
            node.props.height = height;
        }
    }

    /// Undo the transform zeroing applied while measuring one node.
    fn restore_node_transform<D: Dom<Element = E>>(
        &mut self,
        dom: &mut D,
        _state: &mut CycleState<E>,
        handle: NodeHandle,
    ) {
        let Some(node) = self.arena.get_mut(handle) else {
            return;
        };
        let el = node.element;
        let measure = node.measure;
        let has_transform = node.has_transform;
        let inline_transform = node.inline_transform.clone().unwrap_or_default();
        let measure_inline_transform = node.measure_inline_transform.take();
        let inline_transition = node.inline_transition.take();
        let measure_inline_transition = node.measure_inline_transition.take();

        let current = dom.inline_value(el, "transform");
        if !has_transform
            || inline_transform.is_empty()
            || current == "none"
            || inline_transform == "none"
        {
            dom.remove_inline(el, "transform");
        } else {
            dom.set_inline(el, "transform", &inline_transform);
        }
        if has_transform && measure != el {
            match measure_inline_transform {
                Some(t) if !t.is_empty() => dom.set_inline(measure, "transform", &t),
                _ => dom.remove_inline(measure, "transform"),
            }
        }
        if let Some(prior) = inline_transition {
            restore_transition(dom, el, &prior);
        }
        if measure != el {
            if let Some(prior) = measure_inline_transition {
                restore_transition(dom, measure, &prior);
            }
        }
    }

    /// Capture the inline values of every recorded property for later
    /// restoration.
    pub(crate) fn capture_inline_styles<D: Dom<Element = E>>(
        &mut self,
        dom: &D,
        handle: NodeHandle,
        recorded: &[String],
    ) {
        let Some(node) = self.arena.get_mut(handle) else {
            return;
        };
        let el = node.element;
        node.inline_styles.clear();
        for property in recorded {
            let value = dom.inline_value(el, property);
            node.inline_styles.push((property.clone(), value));
        }
    }

    /// Write back the inline values captured by [`Self::capture_inline_styles`].
    pub(crate) fn restore_inline_styles<D: Dom<Element = E>>(&self, dom: &mut D, handle: NodeHandle) {
        let Some(node) = self.arena.get(handle) else {
            return;
        };
        for (property, value) in &node.inline_styles {
            if value.is_empty() {
                dom.remove_inline(node.element, property);
            } else {
                dom.set_inline(node.element, property, value);
            }
        }
    }

    /// Clear the display/visibility overrides applied to removed and
    /// visibility-swapped nodes.
    pub(crate) fn restore_visual_state<D: Dom<Element = E>>(
        &self,
        dom: &mut D,
        state: &mut CycleState<E>,
        handle: NodeHandle,
    ) {
        let Some(node) = self.arena.get(handle) else {
            return;
        };
        if node.measured_is_removed || node.has_visibility_swap {
            dom.remove_inline(node.element, "display");
            dom.remove_inline(node.element, "visibility");
            if node.has_visibility_swap {
                dom.remove_inline(node.measure, "display");
                dom.remove_inline(node.measure, "visibility");
            }
        }
        state.pending_removal.remove(&node.element);
    }
}

impl<E: Copy + Eq + Hash + Debug> Default for Snapshot<E> {
    fn default() -> Self {
        Self::new()
    }
}
