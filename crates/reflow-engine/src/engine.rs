//! The layout animator: record, diff, classify, emit.
//!
//! A [`LayoutAnimator`] owns two snapshot generations of one tracked region.
//! `record` captures the current layout as the old generation; the host then
//! mutates the document; `animate` captures the new generation, reconciles
//! the two trees by node key, classifies every node's transition role, and
//! emits tween and keyframe instructions to the injected [`Scheduler`] and
//! [`TransformAnimator`]. The engine never advances time: the host reports
//! playback milestones back through [`LayoutAnimator::handle_complete`],
//! [`LayoutAnimator::handle_pause`], and drives deferred cleanup through
//! [`LayoutAnimator::flush_frame_tasks`].
//!
//! Classification invariants:
//! - entering and leaving are mutually exclusive for a node in one cycle;
//! - branch flags propagate root-to-leaf, so a subtree added under an added
//!   parent animates as one unit instead of re-staggering;
//! - untracked nodes are the swap group, crossfading through the `swap_at`
//!   state at each node's timing midpoint.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::hash::Hash;

use tracing::{debug, trace};

use crate::dom::Dom;
use crate::error::LayoutError;
use crate::frame::{FrameQueue, FrameTask};
use crate::node::{Node, NodeHandle, NodeProperties};
use crate::params::{AnimateParams, CycleParams, LayoutOptions};
use crate::scheduler::{
    Scheduler, SegmentEase, StyleWrite, TimelineId, TransformAnimationId, TransformAnimator,
    TransformFrames, Tween, TweenSegment,
};
use crate::snapshot::{CycleState, RecordScope, Snapshot};
use crate::timing::ResolvedTiming;
use crate::value::{PropertyValue, Resolvable, ResolvableValue, StaggerContext};

/// Width/height deltas at or below this many pixels do not count as a size
/// change, keeping barely-visible reflow from triggering dimension tweens.
const SIZE_TOLERANCE: f64 = 1.0;

/// FLIP-style transition animator for one root element.
pub struct LayoutAnimator<E> {
    root: E,
    /// Element named children selectors resolve against. Usually the root;
    /// a wider scope lets selectors match detached twins outside the root.
    select_scope: E,
    options: LayoutOptions,
    tracked: Vec<String>,
    recorded: Vec<String>,
    state: CycleState<E>,
    old_state: Snapshot<E>,
    new_state: Snapshot<E>,
    timeline: Option<TimelineId>,
    transform_animation: Option<TransformAnimationId>,
    frame_tasks: FrameQueue,
    // Role groups of the last cycle, in classification order.
    animating: Vec<E>,
    swapping: Vec<E>,
    entering: Vec<E>,
    leaving: Vec<E>,
    transformed: Vec<E>,
}

impl<E: Copy + Eq + Hash + Debug> LayoutAnimator<E> {
    /// Create an animator and record the current layout as the old
    /// generation, so the first `animate` can run without an explicit
    /// `record`.
    pub fn new<D: Dom<Element = E>>(
        dom: &mut D,
        root: E,
        options: LayoutOptions,
    ) -> Result<Self, LayoutError> {
        Self::with_scope(dom, root, root, options)
    }

    /// Like [`Self::new`], with an explicit scope for named children
    /// selectors. Matching against an ancestor scope is what lets a
    /// transition pick up detached twins that sit outside the root.
    pub fn with_scope<D: Dom<Element = E>>(
        dom: &mut D,
        root: E,
        select_scope: E,
        options: LayoutOptions,
    ) -> Result<Self, LayoutError> {
        if !dom.is_element(root) {
            return Err(LayoutError::InvalidRoot);
        }
        let tracked = options.tracked_properties();
        let recorded = options.recorded_properties();
        let mut animator = Self {
            root,
            select_scope,
            options,
            tracked,
            recorded,
            state: CycleState::new(),
            old_state: Snapshot::new(),
            new_state: Snapshot::new(),
            timeline: None,
            transform_animation: None,
            frame_tasks: FrameQueue::new(),
            animating: Vec::new(),
            swapping: Vec::new(),
            entering: Vec::new(),
            leaving: Vec::new(),
            transformed: Vec::new(),
        };
        let scope = RecordScope {
            root,
            select_scope,
            children: &animator.options.children,
            tracked: &animator.tracked,
        };
        animator.old_state.record(dom, &mut animator.state, &scope);
        // Transitions muted for the initial measurement are restored right
        // away; the deferred restore only matters after an animation.
        animator.state.restore_mutes(dom);
        Ok(animator)
    }

    pub fn root(&self) -> E {
        self.root
    }

    /// The timeline of the current or last cycle.
    pub fn timeline(&self) -> Option<TimelineId> {
        self.timeline
    }

    /// Elements classified as stable-but-moving in the last cycle.
    pub fn animating(&self) -> &[E] {
        &self.animating
    }

    /// Untracked elements crossfading through the swap state.
    pub fn swapping(&self) -> &[E] {
        &self.swapping
    }

    pub fn entering(&self) -> &[E] {
        &self.entering
    }

    pub fn leaving(&self) -> &[E] {
        &self.leaving
    }


    /// Capture the old generation. Call before mutating the document.
    ///
    /// Cancels any in-flight cycle: the transform animation is cancelled so
    /// its committed transforms cannot leak into the measurement, the
    /// timeline is cancelled, and inline styles captured by the previous
    /// cycle are restored.
    pub fn record<D, S, T>(&mut self, dom: &mut D, scheduler: &mut S, transforms: &mut T)
    where
        D: Dom<Element = E>,
        S: Scheduler<E>,
        T: TransformAnimator<E>,
    {
        if let Some(id) = self.transform_animation.take() {
            transforms.cancel(id);
        }
        // A pending transition restore from the previous cycle must not fire
        // mid-measurement; recording re-mutes everything anyway.
        self.frame_tasks
            .retain(|t| !matches!(t, FrameTask::RestoreTransitions));

        let scope = RecordScope {
            root: self.root,
            select_scope: self.select_scope,
            children: &self.options.children,
            tracked: &self.tracked,
        };
        self.old_state.record(dom, &mut self.state, &scope);

        if let Some(id) = self.timeline.take() {
            scheduler.cancel(id);
        }
        for handle in self.new_state.root_preorder() {
            self.new_state.restore_inline_styles(dom, handle);
        }
    }

    /// Record, let the callback mutate the document, then animate.
    pub fn update<D, S, T>(
        &mut self,
        dom: &mut D,
        scheduler: &mut S,
        transforms: &mut T,
        mutate: impl FnOnce(&mut D),
        params: &AnimateParams,
    ) -> Result<TimelineId, LayoutError>
    where
        D: Dom<Element = E>,
        S: Scheduler<E>,
        T: TransformAnimator<E>,
    {
        self.record(dom, scheduler, transforms);
        mutate(dom);
        self.animate(dom, scheduler, transforms, params)
    }

    /// Capture the new generation, diff it against the old one, and emit the
    /// transition. A cycle still playing is cancelled first.
    pub fn animate<D, S, T>(
        &mut self,
        dom: &mut D,
        scheduler: &mut S,
        transforms: &mut T,
        params: &AnimateParams,
    ) -> Result<TimelineId, LayoutError>
    where
        D: Dom<Element = E>,
        S: Scheduler<E>,
        T: TransformAnimator<E>,
    {
        let cycle = self.options.resolve_cycle(params);

        self.animating.clear();
        self.swapping.clear();
        self.entering.clear();
        self.leaving.clear();
        self.transformed.clear();

        // A second animate supersedes the in-flight cycle: cancel its
        // handles and put back the inline styles it captured, so the new
        // measurement reads the document rather than the primed overrides.
        if let Some(id) = self.transform_animation.take() {
            transforms.cancel(id);
        }
        if let Some(id) = self.timeline.take() {
            scheduler.cancel(id);
        }
        self.frame_tasks
            .retain(|t| !matches!(t, FrameTask::RestoreTransitions));
        for handle in self.new_state.root_preorder() {
            self.new_state.restore_inline_styles(dom, handle);
        }

        // Mute old-generation transitions so the new measurement cannot catch
        // an element mid-CSS-transition.
        for handle in self.old_state.root_preorder() {
            if let Some(node) = self.old_state.arena().get(handle) {
                let (el, measure) = (node.element, node.measure);
                self.state.mute_once(dom, el);
                if measure != el {
                    self.state.mute_once(dom, measure);
                }
            }
        }

        let scope = RecordScope {
            root: self.root,
            select_scope: self.select_scope,
            children: &self.options.children,
            tracked: &self.tracked,
        };
        self.new_state.record(dom, &mut self.state, &scope);

        let recorded = self.recorded.clone();
        for handle in self.new_state.root_preorder() {
            self.new_state.capture_inline_styles(dom, handle, &recorded);
        }

        let root_handle = self.new_state.root().ok_or(LayoutError::InvalidRoot)?;
        let new_order = self.new_state.root_preorder();

        let mut targets: Vec<E> = Vec::new();
        let mut animated: Vec<E> = Vec::new();
        let mut animated_swap: Vec<E> = Vec::new();

        self.classify(dom, &cycle, root_handle, &new_order);
        self.derive_timing_and_changes(
            &cycle,
            root_handle,
            &new_order,
            &mut animated,
            &mut animated_swap,
            &mut targets,
        );

        let timeline = scheduler.create();
        self.timeline = Some(timeline);

        if animated.is_empty() && self.transformed.is_empty() && self.swapping.is_empty() {
            // Nothing moved: complete immediately and restore transitions now.
            debug!("layout cycle is a no-op");
            self.state.restore_mutes(dom);
            scheduler.complete(timeline);
            return Ok(timeline);
        }

        debug!(
            targets = targets.len(),
            animated = animated.len(),
            swapping = self.swapping.len(),
            entering = self.entering.len(),
            leaving = self.leaving.len(),
            transformed = self.transformed.len(),
            "layout cycle"
        );

        if !targets.is_empty() {
            dom.set_animating_marker(self.root, true);
            self.prime_targets(dom, &targets);

            // Restore the recorded scroll position if the mutation moved it.
            let (sx, sy) = dom.scroll_offset();
            if self.old_state.scroll_x != sx || self.old_state.scroll_y != sy {
                self.frame_tasks.push(FrameTask::RestoreScroll {
                    x: self.old_state.scroll_x,
                    y: self.old_state.scroll_y,
                });
            }

            self.emit_animated(scheduler, timeline, &animated);
        }

        if !self.swapping.is_empty() {
            self.prime_swapping(dom);
            self.emit_swap_calls(scheduler, timeline);
            self.emit_animated_swap(&cycle, scheduler, timeline, &animated_swap);
        }

        if !self.transformed.is_empty() {
            self.emit_transformed(dom, &cycle, scheduler, transforms, timeline, &animated_swap);
        }

        scheduler.init(timeline);
        Ok(timeline)
    }

    /// Pass 1: reconcile each new node with its old counterpart and classify
    /// its transition role.
    fn classify<D: Dom<Element = E>>(
        &mut self,
        dom: &mut D,
        cycle: &CycleParams,
        root_handle: NodeHandle,
        new_order: &[NodeHandle],
    ) {
        for &handle in new_order {
            let Some(node) = self.new_state.arena().get(handle) else {
                continue;
            };
            let el = node.element;
            let measure = node.measure;
            let key = node.key;
            let parent = node.parent;
            let is_target = node.is_target;
            let registration_cx = StaggerContext::new(node.index, node.total);
            let is_removed_now = node.measured_is_removed;
            let is_visible_now = node.measured_is_visible;
            let has_visibility_swap = node.has_visibility_swap;
            let has_visibility_hidden = node.has_visibility_hidden;
            let has_display_none = node.has_display_none;
            let node_measured_display = node.measured_display.clone();

            let (parent_added, parent_removed, parent_not_rendered, parent_key) = match parent
                .and_then(|p| self.new_state.arena().get(p))
            {
                Some(p) => (p.branch_added, p.branch_removed, p.branch_not_rendered, Some(p.key)),
                None => (false, false, false, None),
            };

            // Reconcile with the old generation, synthesizing a removed-state
            // counterpart when the node is new, and refreshing counterparts
            // that were removed last cycle but rendered again since.
            let mut had_old_state = true;
            let old_handle = match self.old_state.lookup(key) {
                Some(old_handle) => {
                    let refresh = self
                        .old_state
                        .arena()
                        .get(old_handle)
                        .is_some_and(|old| old.measured_is_removed && !is_removed_now);
                    if refresh {
                        let src = self.new_state.arena().get(handle).cloned();
                        if let (Some(src), Some(old)) =
                            (src, self.old_state.arena_mut().get_mut(old_handle))
                        {
                            clone_counterpart(&src, old);
                            old.measured_is_removed = true;
                        }
                    }
                    old_handle
                }
                None => {
                    had_old_state = false;
                    let mut synthetic = Node::new(key, el, self.tracked.iter().cloned());
                    if let Some(src) = self.new_state.arena().get(handle) {
                        clone_counterpart(src, &mut synthetic);
                    }
                    synthetic.measured_is_removed = true;
                    self.old_state.insert_synthetic(synthetic)
                }
            };

            let (old_parent_key, was_removed_before, was_visible_before, old_element, old_display) = {
                let old = self
                    .old_state
                    .arena()
                    .get(old_handle)
                    .cloned();
                match old {
                    Some(old) => (
                        old.parent
                            .and_then(|p| self.old_state.arena().get(p))
                            .map(|p| p.key),
                        old.measured_is_removed,
                        old.measured_is_visible,
                        old.element,
                        old.measured_display.clone(),
                    ),
                    None => (None, true, false, el, String::new()),
                }
            };

            let parent_changed = old_parent_key != parent_key;
            let element_changed = old_element != el;

            // A reparented (or rebound) node's stored local position is
            // relative to a parent that no longer applies: rebase the old
            // coordinates against the old parent's own old geometry.
            if !was_removed_before
                && !is_removed_now
                && had_old_state
                && (parent_changed || element_changed)
            {
                let reference = self
                    .old_state
                    .arena()
                    .get(old_handle)
                    .and_then(|old| old.parent)
                    .or_else(|| self.old_state.root());
                let reference_geom = reference
                    .and_then(|h| self.old_state.arena().get(h))
                    .map(|p| (p.props.left, p.props.top, p.props.client_left, p.props.client_top))
                    .unwrap_or((0.0, 0.0, 0.0, 0.0));
                if let Some(old) = self.old_state.arena_mut().get_mut(old_handle) {
                    old.props.x = old.props.left - reference_geom.0 - reference_geom.2;
                    old.props.y = old.props.top - reference_geom.1 - reference_geom.3;
                }
            }

            // A visibility swap shows the hidden element and hides its twin
            // for the duration of the transition.
            if has_visibility_swap {
                if has_visibility_hidden {
                    dom.set_inline(el, "visibility", "visible");
                    dom.set_inline(measure, "visibility", "hidden");
                }
                if has_display_none {
                    let display = if !old_display.is_empty() {
                        old_display.clone()
                    } else {
                        node_measured_display.clone()
                    };
                    if display.is_empty() {
                        dom.remove_inline(el, "display");
                    } else {
                        dom.set_inline(el, "display", &display);
                    }
                    dom.set_inline(measure, "visibility", "hidden");
                }
            }

            let was_pending_removal = self.state.pending_removal.contains(&el);
            let become_visible = !was_visible_before && is_visible_now && !parent_not_rendered;
            let top_level_added =
                !is_removed_now && (was_removed_before || was_pending_removal) && !parent_added;
            let newly_removed = is_removed_now && !was_removed_before && !parent_removed;
            let top_level_removed =
                newly_removed || (is_removed_now && was_pending_removal && !parent_removed);

            if let Some(node) = self.new_state.arena_mut().get_mut(handle) {
                node.branch_added = parent_added || top_level_added;
                node.branch_removed = parent_removed || top_level_removed;
                node.branch_not_rendered = parent_not_rendered || is_removed_now;
            }

            // A leaving node keeps rendering its old state: force it visible
            // and carry the old measurements forward.
            if is_removed_now && was_visible_before {
                if old_display.is_empty() {
                    dom.remove_inline(el, "display");
                } else {
                    dom.set_inline(el, "display", &old_display);
                }
                dom.set_inline(el, "visibility", "visible");
                let src = self.old_state.arena().get(old_handle).cloned();
                if let (Some(src), Some(node)) = (src, self.new_state.arena_mut().get_mut(handle)) {
                    clone_counterpart(&src, node);
                }
            }

            if newly_removed {
                if is_target {
                    self.leaving.push(el);
                    if let Some(node) = self.new_state.arena_mut().get_mut(handle) {
                        node.is_leaving = true;
                    }
                }
                self.state.pending_removal.insert(el);
            } else if !is_removed_now && was_pending_removal {
                self.state.pending_removal.remove(&el);
            }

            if (top_level_added && !parent_not_rendered) || become_visible {
                if let Some(old) = self.old_state.arena_mut().get_mut(old_handle) {
                    apply_overrides(&mut old.props, &cycle.enter_from.properties, registration_cx);
                }
                if is_target {
                    self.entering.push(el);
                    if let Some(node) = self.new_state.arena_mut().get_mut(handle) {
                        node.is_entering = true;
                    }
                }
            } else if top_level_removed && !parent_not_rendered {
                if let Some(node) = self.new_state.arena_mut().get_mut(handle) {
                    apply_overrides(&mut node.props, &cycle.leave_to.properties, registration_cx);
                }
            }

            let (is_entering, is_leaving) = self
                .new_state
                .arena()
                .get(handle)
                .map(|n| (n.is_entering, n.is_leaving))
                .unwrap_or((false, false));
            if handle != root_handle && is_target && !is_entering && !is_leaving {
                self.animating.push(el);
            }
        }
    }

    /// Pass 2: resolve per-node timing from the role groups, resolve stagger
    /// values, and detect what actually changed.
    fn derive_timing_and_changes(
        &mut self,
        cycle: &CycleParams,
        root_handle: NodeHandle,
        new_order: &[NodeHandle],
        animated: &mut Vec<E>,
        animated_swap: &mut Vec<E>,
        targets: &mut Vec<E>,
    ) {
        let mut entering_index = 0usize;
        let mut leaving_index = 0usize;
        let mut animating_index = 0usize;
        let animating_total = self.animating.len();

        for &handle in new_order {
            let Some(node) = self.new_state.arena().get(handle) else {
                continue;
            };
            let el = node.element;
            let key = node.key;
            let parent = node.parent;
            let is_target = node.is_target;
            let is_entering = node.is_entering;
            let is_leaving = node.is_leaving;

            // Children inherit the stagger position of their closest animated
            // ancestor so a branch staggers as one unit.
            let mut animated_parent = match parent {
                Some(p) if p != root_handle => Some(p),
                _ => None,
            };
            while let Some(ap) = animated_parent {
                let Some(ap_node) = self.new_state.arena().get(ap) else {
                    animated_parent = None;
                    break;
                };
                if ap_node.is_target || ap == root_handle {
                    break;
                }
                animated_parent = ap_node.parent;
            }
            let animated_parent_index = animated_parent
                .and_then(|h| self.new_state.arena().get(h))
                .map(|n| n.index);

            let (index, total, timing) = if handle == root_handle {
                (0, animating_total, &cycle.timing)
            } else if is_entering {
                let idx = animated_parent_index.unwrap_or(entering_index);
                let total = if animated_parent_index.is_some() {
                    animating_total
                } else {
                    self.entering.len()
                };
                entering_index += 1;
                (idx, total, &cycle.enter_from.timing)
            } else if is_leaving {
                let idx = animated_parent_index.unwrap_or(leaving_index);
                let total = if animated_parent_index.is_some() {
                    animating_total
                } else {
                    self.leaving.len()
                };
                leaving_index += 1;
                (idx, total, &cycle.leave_to.timing)
            } else if is_target {
                let idx = animating_index;
                animating_index += 1;
                (idx, animating_total, &cycle.timing)
            } else {
                (
                    animated_parent_index.unwrap_or(0),
                    animating_total,
                    &cycle.swap_at.timing,
                )
            };

            let cx = StaggerContext::new(index, total);
            let resolved = timing.resolve(cx);
            let Some(old_handle) = self.old_state.lookup(key) else {
                continue;
            };

            if let Some(node) = self.new_state.arena_mut().get_mut(handle) {
                node.index = index;
                node.total = total;
                node.delay = resolved.delay;
                node.duration = resolved.duration;
                node.ease = resolved.ease;
                resolve_props(&mut node.props, cx);
            }
            if let Some(old) = self.old_state.arena_mut().get_mut(old_handle) {
                old.index = index;
                old.total = total;
                resolve_props(&mut old.props, cx);
            }

            let (node_snapshot, old_snapshot) = match (
                self.new_state.arena().get(handle),
                self.old_state.arena().get(old_handle),
            ) {
                (Some(n), Some(o)) => (n.clone(), o.clone()),
                _ => continue,
            };

            let width_changed = (node_snapshot.props.width - old_snapshot.props.width).abs()
                > SIZE_TOLERANCE;
            let height_changed = (node_snapshot.props.height - old_snapshot.props.height).abs()
                > SIZE_TOLERANCE;
            let size_changed = width_changed || height_changed;
            if let Some(node) = self.new_state.arena_mut().get_mut(handle) {
                node.size_changed = size_changed;
            }

            // Only nodes visible in at least one generation can animate.
            let comparably_visible = (!node_snapshot.measured_is_removed
                && old_snapshot.measured_is_visible)
                || (node_snapshot.measured_is_removed && node_snapshot.measured_is_visible);

            if is_target && comparably_visible {
                if node_snapshot.props.transform != "none"
                    || old_snapshot.props.transform != "none"
                {
                    if let Some(node) = self.new_state.arena_mut().get_mut(handle) {
                        node.has_transform = true;
                    }
                    self.transformed.push(el);
                }
                if props_differ(&node_snapshot.props, &old_snapshot.props) {
                    animated.push(el);
                }
            }

            if !is_target {
                self.swapping.push(el);
                let parent_qualifies = parent
                    .and_then(|p| self.new_state.arena().get(p))
                    .is_some_and(|p| p.is_target && p.size_changed);
                if size_changed && parent_qualifies {
                    if cycle.swap_at.properties.contains_key("transform") {
                        if let Some(node) = self.new_state.arena_mut().get_mut(handle) {
                            node.has_transform = true;
                        }
                        self.transformed.push(el);
                    }
                    animated_swap.push(el);
                }
            }

            targets.push(el);
            trace!(?key, index, total, is_target, size_changed, "node classified");
        }
    }

    /// Take every target out of flow and pin it to its old geometry, so the
    /// tweens play over a frozen layout.
    fn prime_targets<D: Dom<Element = E>>(&mut self, dom: &mut D, targets: &[E]) {
        for &el in targets {
            let Some(old_handle) = self.old_state.node_of(dom, el) else {
                continue;
            };
            let Some(new_handle) = self.new_state.node_of(dom, el) else {
                continue;
            };
            let (old_props, old_display) = match self.old_state.arena().get(old_handle) {
                Some(old) => (old.props.clone(), old.measured_display.clone()),
                None => continue,
            };
            let (is_inlined, new_display, new_position) = match self.new_state.arena().get(new_handle)
            {
                Some(n) => (
                    n.is_inlined,
                    n.measured_display.clone(),
                    n.measured_position.clone(),
                ),
                None => continue,
            };

            if !is_inlined {
                // Grid placement fights absolute positioning for the duration
                // of the transition.
                if old_display == "grid" || new_display == "grid" {
                    dom.set_inline_important(el, "display", "block");
                }
                if el != self.root || self.state.absolute_coords {
                    let position = if self.state.absolute_coords {
                        "fixed"
                    } else {
                        "absolute"
                    };
                    dom.set_inline(el, "position", position);
                    dom.set_inline(el, "left", "0px");
                    dom.set_inline(el, "top", "0px");
                    dom.set_inline(el, "margin-left", "0px");
                    dom.set_inline(el, "margin-top", "0px");
                    dom.set_inline(
                        el,
                        "translate",
                        &format!("{}px {}px", old_props.x, old_props.y),
                    );
                }
                if el == self.root && new_position == "static" {
                    dom.set_inline(el, "position", "relative");
                    dom.set_inline(el, "left", "0px");
                    dom.set_inline(el, "top", "0px");
                }
            }
            dom.set_inline(el, "width", &format!("{}px", old_props.width));
            dom.set_inline(el, "height", &format!("{}px", old_props.height));
            // Min/max clamping would fight the dimension tweens.
            dom.set_inline(el, "min-width", "auto");
            dom.set_inline(el, "min-height", "auto");
            dom.set_inline(el, "max-width", "none");
            dom.set_inline(el, "max-height", "none");
        }
    }

    /// Emit property tweens for the stable-but-changed group.
    fn emit_animated<S: Scheduler<E>>(
        &mut self,
        scheduler: &mut S,
        timeline: TimelineId,
        animated: &[E],
    ) {
        for &el in animated {
            let Some((old, new)) = self.counterparts(el) else {
                continue;
            };
            let mut tweens: Vec<Tween> = Vec::new();
            if old.props.width != new.props.width {
                tweens.push(Tween::between("width", old.props.width, new.props.width));
            }
            if old.props.height != new.props.height {
                tweens.push(Tween::between("height", old.props.height, new.props.height));
            }
            // Transformed nodes animate translate through the transform
            // animator instead, or translate and transform drift out of sync.
            if !new.has_transform && !new.is_inlined {
                tweens.push(Tween::between(
                    "translate",
                    PropertyValue::text(format!("{}px {}px", old.props.x, old.props.y)),
                    PropertyValue::text(format!("{}px {}px", new.props.x, new.props.y)),
                ));
            }
            for name in &self.tracked {
                if name == "transform" {
                    continue;
                }
                let old_value = old.props.style(name);
                let new_value = new.props.style(name);
                if let (Some(old_value), Some(new_value)) = (old_value, new_value) {
                    if old_value != new_value {
                        tweens.push(Tween::between(
                            name.clone(),
                            old_value.clone(),
                            new_value.clone(),
                        ));
                    }
                }
            }
            if !tweens.is_empty() {
                let timing = ResolvedTiming {
                    delay: new.delay,
                    duration: new.duration,
                    ease: new.ease,
                };
                scheduler.add(timeline, el, timing, tweens, 0.0);
            }
        }
    }

    /// Pin every swap node to its old visual state.
    fn prime_swapping<D: Dom<Element = E>>(&mut self, dom: &mut D) {
        for &el in &self.swapping.clone() {
            let Some(old_handle) = self.old_state.node_of(dom, el) else {
                continue;
            };
            let Some(old) = self.old_state.arena().get(old_handle).cloned() else {
                continue;
            };
            dom.set_inline(el, "width", &format!("{}px", old.props.width));
            dom.set_inline(el, "height", &format!("{}px", old.props.height));
            dom.set_inline(el, "min-width", "auto");
            dom.set_inline(el, "min-height", "auto");
            dom.set_inline(el, "max-width", "none");
            dom.set_inline(el, "max-height", "none");
            if !old.is_inlined {
                dom.set_inline(el, "translate", &format!("{}px {}px", old.props.x, old.props.y));
            }
            for name in &self.tracked {
                if name == "transform" {
                    continue;
                }
                if let Some(value) = old.props.style(name) {
                    dom.set_inline(el, name, &value.to_style_string());
                }
            }
        }
    }

    /// Schedule the half-way flip of every swap node to its new visual state.
    fn emit_swap_calls<S: Scheduler<E>>(&mut self, scheduler: &mut S, timeline: TimelineId) {
        for &el in &self.swapping {
            let Some(new_handle) = self
                .new_state
                .ordered()
                .iter()
                .copied()
                .find(|&h| self.new_state.arena().get(h).is_some_and(|n| n.element == el))
            else {
                continue;
            };
            let Some(new) = self.new_state.arena().get(new_handle).cloned() else {
                continue;
            };
            let mut writes = vec![
                StyleWrite::new(el, "width", format!("{}px", new.props.width)),
                StyleWrite::new(el, "height", format!("{}px", new.props.height)),
                StyleWrite::new(el, "min-width", "auto"),
                StyleWrite::new(el, "min-height", "auto"),
                StyleWrite::new(el, "max-width", "none"),
                StyleWrite::new(el, "max-height", "none"),
            ];
            if !new.is_inlined {
                writes.push(StyleWrite::new(
                    el,
                    "translate",
                    format!("{}px {}px", new.props.x, new.props.y),
                ));
            }
            for name in &self.tracked {
                if name == "transform" {
                    continue;
                }
                if let Some(value) = new.props.style(name) {
                    writes.push(StyleWrite::new(el, name.clone(), value.to_style_string()));
                }
            }
            let midpoint = new.delay + new.duration / 2.0;
            scheduler.call(timeline, midpoint, writes);
        }
    }

    /// Emit the crossfade tweens for swap nodes whose size changed alongside
    /// their parent: old value to the swap state, then swap state to the new
    /// value on the reflected ease.
    fn emit_animated_swap<S: Scheduler<E>>(
        &mut self,
        cycle: &CycleParams,
        scheduler: &mut S,
        timeline: TimelineId,
        animated_swap: &[E],
    ) {
        if animated_swap.is_empty() {
            return;
        }
        // One reflection curve for the whole group, from its first member.
        let group_ease = animated_swap
            .first()
            .and_then(|&el| self.counterparts(el))
            .map(|(_, new)| new.ease)
            .unwrap_or_default();

        for &el in animated_swap {
            let Some((old, new)) = self.counterparts(el) else {
                continue;
            };
            let cx = StaggerContext::new(new.index, new.total);
            let mut tweens: Vec<Tween> = Vec::new();
            for (name, value) in &cycle.swap_at.properties {
                if name == "transform" {
                    continue;
                }
                let mid = value.resolve(cx);
                let old_value = old.props.style(name).cloned();
                let new_value = new.props.style(name).cloned();
                if let (Some(old_value), Some(new_value)) = (old_value, new_value) {
                    tweens.push(Tween::segmented(
                        name.clone(),
                        vec![
                            TweenSegment::new(old_value, mid.clone()),
                            TweenSegment::new(mid, new_value)
                                .with_ease(SegmentEase::Reflected(group_ease)),
                        ],
                    ));
                }
            }
            if !tweens.is_empty() {
                let timing = ResolvedTiming {
                    delay: new.delay,
                    duration: new.duration,
                    ease: new.ease,
                };
                scheduler.add(timeline, el, timing, tweens, 0.0);
            }
        }
    }

    /// Prime and start the transform keyframe animation, synced to the
    /// timeline at position zero.
    fn emit_transformed<D, S, T>(
        &mut self,
        dom: &mut D,
        cycle: &CycleParams,
        scheduler: &mut S,
        transforms: &mut T,
        timeline: TimelineId,
        animated_swap: &[E],
    ) where
        D: Dom<Element = E>,
        S: Scheduler<E>,
        T: TransformAnimator<E>,
    {
        let mut frames: Vec<TransformFrames<E>> = Vec::new();
        for &el in &self.transformed.clone() {
            let Some((old, new)) = self.counterparts(el) else {
                continue;
            };
            let is_swap = animated_swap.contains(&el);

            if !new.is_inlined {
                dom.set_inline(el, "translate", &format!("{}px {}px", old.props.x, old.props.y));
            }
            dom.set_inline(el, "transform", &old.props.transform);

            // Swap members run the transform track on the swap timing.
            let cx = StaggerContext::new(new.index, new.total);
            let timing = if is_swap {
                cycle.swap_at.timing.resolve(cx)
            } else {
                ResolvedTiming {
                    delay: new.delay,
                    duration: new.duration,
                    ease: new.ease,
                }
            };
            if is_swap {
                if let Some(handle) = self.new_state.node_of(dom, el) {
                    if let Some(node) = self.new_state.arena_mut().get_mut(handle) {
                        node.delay = timing.delay;
                        node.duration = timing.duration;
                        node.ease = timing.ease;
                    }
                }
            }

            let translate = if new.is_inlined {
                vec!["0px 0px".to_string()]
            } else {
                vec![
                    format!("{}px {}px", old.props.x, old.props.y),
                    format!("{}px {}px", new.props.x, new.props.y),
                ]
            };
            let transform = if is_swap {
                let mid = cycle
                    .swap_at
                    .properties
                    .get("transform")
                    .map(|v| v.resolve(cx).to_style_string())
                    .unwrap_or_else(|| "none".to_string());
                vec![old.props.transform.clone(), mid, new.props.transform.clone()]
            } else {
                vec![new.props.transform.clone()]
            };
            frames.push(TransformFrames {
                element: el,
                timing,
                translate,
                transform,
            });
        }

        if !frames.is_empty() {
            let id = transforms.animate(frames);
            self.transform_animation = Some(id);
            scheduler.sync(timeline, id, 0.0);
        }
    }

    /// Old and new nodes for one element, cloned out of their arenas.
    fn counterparts(&self, el: E) -> Option<(Node<E>, Node<E>)> {
        let new_handle = self
            .new_state
            .ordered()
            .iter()
            .copied()
            .find(|&h| self.new_state.arena().get(h).is_some_and(|n| n.element == el))?;
        let new = self.new_state.arena().get(new_handle)?.clone();
        let old_handle = self.old_state.lookup(new.key)?;
        let old = self.old_state.arena().get(old_handle)?.clone();
        Some((old, new))
    }

    /// Host entry point for timeline completion: commit final state, drop
    /// transition overrides, and defer the CSS transition restore by one
    /// frame.
    pub fn handle_complete<D, T>(&mut self, dom: &mut D, transforms: &mut T)
    where
        D: Dom<Element = E>,
        T: TransformAnimator<E>,
    {
        if let Some(id) = self.transform_animation.take() {
            transforms.cancel(id);
        }
        for handle in self.new_state.root_preorder() {
            self.new_state
                .restore_visual_state(dom, &mut self.state, handle);
            self.new_state.restore_inline_styles(dom, handle);
        }
        for &el in &self.transformed {
            if let Some(handle) = self.new_state.node_of(dom, el) {
                if let Some(value) = self.new_state.measured_value(handle, "transform") {
                    dom.set_inline(el, "transform", &value.to_style_string());
                }
            }
        }
        if dom.has_animating_marker(self.root) {
            dom.set_animating_marker(self.root, false);
        }
        self.frame_tasks.push(FrameTask::RestoreTransitions);
    }

    /// Host entry point for a paused (interrupted) timeline: drop visual
    /// overrides without committing final state.
    pub fn handle_pause<D, T>(&mut self, dom: &mut D, transforms: &mut T)
    where
        D: Dom<Element = E>,
        T: TransformAnimator<E>,
    {
        if !dom.has_animating_marker(self.root) {
            return;
        }
        if let Some(id) = self.transform_animation.take() {
            transforms.cancel(id);
        }
        for handle in self.new_state.root_preorder() {
            self.new_state
                .restore_visual_state(dom, &mut self.state, handle);
        }
        dom.set_animating_marker(self.root, false);
    }

    /// Run the deferred tasks queued for the host's next frame.
    pub fn flush_frame_tasks<D: Dom<Element = E>>(&mut self, dom: &mut D) {
        for task in self.frame_tasks.drain() {
            match task {
                FrameTask::RestoreTransitions => {
                    // A new cycle may have started since this was queued.
                    if !dom.has_animating_marker(self.root) {
                        self.state.restore_mutes(dom);
                    }
                }
                FrameTask::RestoreScroll { x, y } => dom.scroll_to(x, y),
            }
        }
    }

    /// Tear the animator down: jump playback to its end state, drop both
    /// generations, and strip node keys from the document.
    pub fn revert<D, S, T>(&mut self, dom: &mut D, scheduler: &mut S, transforms: &mut T)
    where
        D: Dom<Element = E>,
        S: Scheduler<E>,
        T: TransformAnimator<E>,
    {
        if dom.has_animating_marker(self.root) {
            dom.set_animating_marker(self.root, false);
        }
        if let Some(id) = self.timeline.take() {
            scheduler.complete(id);
        }
        if let Some(id) = self.transform_animation.take() {
            transforms.complete(id);
        }
        self.animating.clear();
        self.swapping.clear();
        self.entering.clear();
        self.leaving.clear();
        self.transformed.clear();
        self.old_state.revert(dom, &mut self.state);
        self.new_state.revert(dom, &mut self.state);
        self.frame_tasks.push(FrameTask::RestoreTransitions);
    }
}

/// Copy the measured state of one node onto its synthesized or refreshed
/// counterpart in the other generation. Tree links and timing stay untouched.
fn clone_counterpart<E: Copy>(src: &Node<E>, dst: &mut Node<E>) {
    dst.props = src.props.clone();
    dst.is_target = src.is_target;
    dst.has_transform = src.has_transform;
    dst.inline_transform = src.inline_transform.clone();
    dst.measured_is_visible = src.measured_is_visible;
    dst.measured_display = src.measured_display.clone();
    dst.measured_is_removed = src.measured_is_removed;
    dst.measured_has_display_none = src.measured_has_display_none;
    dst.measured_has_visibility_hidden = src.measured_has_visibility_hidden;
    dst.has_display_none = src.has_display_none;
    dst.is_inlined = src.is_inlined;
    dst.has_visibility_hidden = src.has_visibility_hidden;
}

/// Apply role override properties onto a node's measured property table.
/// Overrides for the geometry fields land on the fields themselves, resolving
/// function values against the node's registration position; other styles
/// stay unresolved until the timing pass.
fn apply_overrides(
    props: &mut NodeProperties,
    overrides: &BTreeMap<String, ResolvableValue>,
    cx: StaggerContext,
) {
    for (name, value) in overrides {
        match name.as_str() {
            "x" | "y" | "width" | "height" | "left" | "top" => {
                let resolved = value.resolve(cx);
                match (name.as_str(), resolved.as_number()) {
                    ("x", Some(n)) => props.x = n,
                    ("y", Some(n)) => props.y = n,
                    ("width", Some(n)) => props.width = n,
                    ("height", Some(n)) => props.height = n,
                    ("left", Some(n)) => props.left = n,
                    ("top", Some(n)) => props.top = n,
                    _ => props.set_style(name, Resolvable::Value(resolved)),
                }
            }
            "transform" => props.transform = value.resolve(cx).to_style_string(),
            _ => props.set_style(name, value.clone()),
        }
    }
}

/// Resolve any stagger-function style values in place.
fn resolve_props(props: &mut NodeProperties, cx: StaggerContext) {
    for value in props.styles.values_mut() {
        let resolved = match &*value {
            Resolvable::Stagger(f) => Some(f(cx)),
            Resolvable::Value(_) => None,
        };
        if let Some(resolved) = resolved {
            *value = Resolvable::Value(resolved);
        }
    }
}

/// True when any comparable property differs between the generations.
/// Transforms are excluded; they are detected separately.
fn props_differ(new: &NodeProperties, old: &NodeProperties) -> bool {
    let new_values: Vec<(&str, PropertyValue)> = new.comparable().collect();
    let old_values: BTreeMap<&str, PropertyValue> = old.comparable().collect();
    for (name, value) in new_values {
        match old_values.get(name) {
            Some(old_value) if *old_value == value => {}
            _ => return true,
        }
    }
    false
}
