//! In-memory document and playback recorders for exercising the layout
//! engine.
//!
//! [`TestDom`] implements the engine's [`Dom`] boundary over a forest of
//! copyable element ids with an explicit style cascade (inline wins over the
//! stylesheet value, which wins over a small set of initial values) and
//! per-element bounding rects set by the test. [`RecordingScheduler`] and
//! [`RecordingTransformAnimator`] capture every emitted instruction verbatim
//! so tests can assert on the exact tweens, timed writes, and keyframes a
//! cycle produces.

use std::collections::{BTreeMap, HashMap};

use reflow_engine::{
    Dom, NodeKey, Rect, ResolvedTiming, Scheduler, StyleWrite, TimelineId, TransformAnimationId,
    TransformAnimator, TransformFrames, Tween,
};

/// Test element id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct El(u32);

#[derive(Debug, Default)]
struct ElementData {
    tag: String,
    classes: Vec<String>,
    parent: Option<El>,
    children: Vec<El>,
    /// Stylesheet-provided computed values.
    base: BTreeMap<String, String>,
    /// Inline values with their `!important` flag.
    inline: BTreeMap<String, (String, bool)>,
    rect: Rect,
    client_left: f64,
    client_top: f64,
    key: Option<NodeKey>,
    adjacent_text: bool,
    marker: bool,
}

/// Initial value used when neither an inline nor a stylesheet value is set.
fn initial_value(property: &str) -> &'static str {
    match property {
        "display" => "block",
        "visibility" => "visible",
        "position" => "static",
        "transform" => "none",
        "opacity" => "1",
        _ => "",
    }
}

/// A scriptable in-memory document.
#[derive(Debug, Default)]
pub struct TestDom {
    elements: HashMap<El, ElementData>,
    next_id: u32,
    scroll: (f64, f64),
}

impl TestDom {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detached element.
    pub fn create(&mut self, tag: &str) -> El {
        let el = El(self.next_id);
        self.next_id += 1;
        self.elements.insert(
            el,
            ElementData {
                tag: tag.to_string(),
                ..ElementData::default()
            },
        );
        el
    }

    pub fn add_class(&mut self, el: El, class: &str) {
        if let Some(data) = self.elements.get_mut(&el) {
            data.classes.push(class.to_string());
        }
    }

    /// Append `child` as the last child of `parent`, detaching it first.
    pub fn append(&mut self, parent: El, child: El) {
        self.detach(child);
        if let Some(data) = self.elements.get_mut(&parent) {
            data.children.push(child);
        }
        if let Some(data) = self.elements.get_mut(&child) {
            data.parent = Some(parent);
        }
    }

    /// Insert `child` at `index` within `parent`'s children.
    pub fn insert_child(&mut self, parent: El, index: usize, child: El) {
        self.detach(child);
        if let Some(data) = self.elements.get_mut(&parent) {
            let index = index.min(data.children.len());
            data.children.insert(index, child);
        }
        if let Some(data) = self.elements.get_mut(&child) {
            data.parent = Some(parent);
        }
    }

    /// Remove `el` from its parent's child list, keeping the element alive.
    pub fn detach(&mut self, el: El) {
        let parent = self.elements.get(&el).and_then(|data| data.parent);
        if let Some(parent) = parent {
            if let Some(data) = self.elements.get_mut(&parent) {
                data.children.retain(|&c| c != el);
            }
        }
        if let Some(data) = self.elements.get_mut(&el) {
            data.parent = None;
        }
    }

    pub fn set_rect(&mut self, el: El, rect: Rect) {
        if let Some(data) = self.elements.get_mut(&el) {
            data.rect = rect;
        }
    }

    /// Set the element's border offsets.
    pub fn set_client_borders(&mut self, el: El, left: f64, top: f64) {
        if let Some(data) = self.elements.get_mut(&el) {
            data.client_left = left;
            data.client_top = top;
        }
    }

    /// Set a stylesheet-provided computed value.
    pub fn set_style(&mut self, el: El, property: &str, value: &str) {
        if let Some(data) = self.elements.get_mut(&el) {
            data.base.insert(property.to_string(), value.to_string());
        }
    }

    /// Drop a stylesheet-provided value, falling back to the initial value.
    pub fn clear_style(&mut self, el: El, property: &str) {
        if let Some(data) = self.elements.get_mut(&el) {
            data.base.remove(property);
        }
    }

    pub fn set_adjacent_text(&mut self, el: El, adjacent: bool) {
        if let Some(data) = self.elements.get_mut(&el) {
            data.adjacent_text = adjacent;
        }
    }

    /// Current inline value, `None` when unset. Assert-friendly counterpart
    /// of [`Dom::inline_value`].
    pub fn inline(&self, el: El, property: &str) -> Option<String> {
        self.elements
            .get(&el)
            .and_then(|data| data.inline.get(property))
            .map(|(value, _)| value.clone())
    }

    /// Whether the inline value carries `!important`.
    pub fn inline_is_important(&self, el: El, property: &str) -> bool {
        self.elements
            .get(&el)
            .and_then(|data| data.inline.get(property))
            .is_some_and(|(_, important)| *important)
    }

    fn collect_descendants(&self, el: El, out: &mut Vec<El>) {
        if let Some(data) = self.elements.get(&el) {
            for &child in &data.children {
                out.push(child);
                self.collect_descendants(child, out);
            }
        }
    }

    fn matches(&self, el: El, selector: &str) -> bool {
        let Some(data) = self.elements.get(&el) else {
            return false;
        };
        if selector == "*" {
            return true;
        }
        match selector.strip_prefix('.') {
            Some(class) => data.classes.iter().any(|c| c == class),
            None => data.tag == selector,
        }
    }
}

impl Dom for TestDom {
    type Element = El;

    fn is_element(&self, el: El) -> bool {
        self.elements.contains_key(&el)
    }

    fn contains(&self, root: El, el: El) -> bool {
        let mut current = Some(el);
        while let Some(c) = current {
            if c == root {
                return true;
            }
            current = self.elements.get(&c).and_then(|data| data.parent);
        }
        false
    }

    fn parent(&self, el: El) -> Option<El> {
        self.elements.get(&el).and_then(|data| data.parent)
    }

    fn first_child(&self, el: El) -> Option<El> {
        self.elements
            .get(&el)
            .and_then(|data| data.children.first().copied())
    }

    fn last_child(&self, el: El) -> Option<El> {
        self.elements
            .get(&el)
            .and_then(|data| data.children.last().copied())
    }

    fn next_sibling(&self, el: El) -> Option<El> {
        let parent = self.parent(el)?;
        let children = &self.elements.get(&parent)?.children;
        let index = children.iter().position(|&c| c == el)?;
        children.get(index + 1).copied()
    }

    fn prev_sibling(&self, el: El) -> Option<El> {
        let parent = self.parent(el)?;
        let children = &self.elements.get(&parent)?.children;
        let index = children.iter().position(|&c| c == el)?;
        index.checked_sub(1).and_then(|i| children.get(i).copied())
    }

    fn has_adjacent_text(&self, el: El) -> bool {
        self.elements
            .get(&el)
            .is_some_and(|data| data.adjacent_text)
    }

    fn node_key(&self, el: El) -> Option<NodeKey> {
        self.elements.get(&el).and_then(|data| data.key)
    }

    fn set_node_key(&mut self, el: El, key: NodeKey) {
        if let Some(data) = self.elements.get_mut(&el) {
            data.key = Some(key);
        }
    }

    fn clear_node_key(&mut self, el: El) {
        if let Some(data) = self.elements.get_mut(&el) {
            data.key = None;
        }
    }

    fn select(&self, scope: El, selector: &str) -> Vec<El> {
        let mut descendants = Vec::new();
        self.collect_descendants(scope, &mut descendants);
        descendants
            .into_iter()
            .filter(|&el| self.matches(el, selector))
            .collect()
    }

    fn bounding_rect(&self, el: El) -> Rect {
        self.elements
            .get(&el)
            .map(|data| data.rect)
            .unwrap_or_default()
    }

    fn client_left(&self, el: El) -> f64 {
        self.elements
            .get(&el)
            .map(|data| data.client_left)
            .unwrap_or(0.0)
    }

    fn client_top(&self, el: El) -> f64 {
        self.elements
            .get(&el)
            .map(|data| data.client_top)
            .unwrap_or(0.0)
    }

    fn computed_value(&self, el: El, property: &str) -> String {
        let Some(data) = self.elements.get(&el) else {
            return String::new();
        };
        if let Some((value, _)) = data.inline.get(property) {
            return value.clone();
        }
        if let Some(value) = data.base.get(property) {
            return value.clone();
        }
        initial_value(property).to_string()
    }

    fn inline_value(&self, el: El, property: &str) -> String {
        self.inline(el, property).unwrap_or_default()
    }

    fn set_inline(&mut self, el: El, property: &str, value: &str) {
        if let Some(data) = self.elements.get_mut(&el) {
            data.inline
                .insert(property.to_string(), (value.to_string(), false));
        }
    }

    fn set_inline_important(&mut self, el: El, property: &str, value: &str) {
        if let Some(data) = self.elements.get_mut(&el) {
            data.inline
                .insert(property.to_string(), (value.to_string(), true));
        }
    }

    fn remove_inline(&mut self, el: El, property: &str) {
        if let Some(data) = self.elements.get_mut(&el) {
            data.inline.remove(property);
        }
    }

    fn scroll_offset(&self) -> (f64, f64) {
        self.scroll
    }

    fn scroll_to(&mut self, x: f64, y: f64) {
        self.scroll = (x, y);
    }

    fn set_animating_marker(&mut self, el: El, on: bool) {
        if let Some(data) = self.elements.get_mut(&el) {
            data.marker = on;
        }
    }

    fn has_animating_marker(&self, el: El) -> bool {
        self.elements.get(&el).is_some_and(|data| data.marker)
    }
}

/// One `Scheduler::add` invocation.
#[derive(Debug, Clone)]
pub struct AddedTweens {
    pub timeline: TimelineId,
    pub target: El,
    pub timing: ResolvedTiming,
    pub tweens: Vec<Tween>,
    pub position: f64,
}

/// One `Scheduler::call` invocation.
#[derive(Debug, Clone)]
pub struct ScheduledCall {
    pub timeline: TimelineId,
    pub position: f64,
    pub writes: Vec<StyleWrite<El>>,
}

/// Scheduler that records every instruction instead of playing it.
#[derive(Debug, Default)]
pub struct RecordingScheduler {
    pub created: Vec<TimelineId>,
    pub adds: Vec<AddedTweens>,
    pub calls: Vec<ScheduledCall>,
    pub syncs: Vec<(TimelineId, TransformAnimationId, f64)>,
    pub inited: Vec<TimelineId>,
    pub completed: Vec<TimelineId>,
    pub cancelled: Vec<TimelineId>,
}

impl RecordingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every tween emitted for one element, across all adds.
    pub fn tweens_for(&self, el: El) -> Vec<&Tween> {
        self.adds
            .iter()
            .filter(|add| add.target == el)
            .flat_map(|add| add.tweens.iter())
            .collect()
    }

    /// The tween emitted for one element and property, if any.
    pub fn tween(&self, el: El, property: &str) -> Option<&Tween> {
        self.tweens_for(el)
            .into_iter()
            .find(|tween| tween.property == property)
    }

    /// The resolved timing of the first add targeting one element.
    pub fn timing_for(&self, el: El) -> Option<ResolvedTiming> {
        self.adds
            .iter()
            .find(|add| add.target == el)
            .map(|add| add.timing)
    }

    /// Scheduled writes touching one element, with their positions.
    pub fn writes_for(&self, el: El) -> Vec<(f64, &StyleWrite<El>)> {
        self.calls
            .iter()
            .flat_map(|call| {
                call.writes
                    .iter()
                    .filter(|w| w.element == el)
                    .map(move |w| (call.position, w))
            })
            .collect()
    }
}

impl Scheduler<El> for RecordingScheduler {
    fn create(&mut self) -> TimelineId {
        let id = TimelineId::next();
        self.created.push(id);
        id
    }

    fn add(
        &mut self,
        timeline: TimelineId,
        target: El,
        timing: ResolvedTiming,
        tweens: Vec<Tween>,
        position: f64,
    ) {
        self.adds.push(AddedTweens {
            timeline,
            target,
            timing,
            tweens,
            position,
        });
    }

    fn call(&mut self, timeline: TimelineId, position: f64, writes: Vec<StyleWrite<El>>) {
        self.calls.push(ScheduledCall {
            timeline,
            position,
            writes,
        });
    }

    fn sync(&mut self, timeline: TimelineId, animation: TransformAnimationId, position: f64) {
        self.syncs.push((timeline, animation, position));
    }

    fn init(&mut self, timeline: TimelineId) {
        self.inited.push(timeline);
    }

    fn complete(&mut self, timeline: TimelineId) {
        self.completed.push(timeline);
    }

    fn cancel(&mut self, timeline: TimelineId) {
        self.cancelled.push(timeline);
    }
}

/// Transform animator that records every keyframe set.
#[derive(Debug, Default)]
pub struct RecordingTransformAnimator {
    pub started: Vec<(TransformAnimationId, Vec<TransformFrames<El>>)>,
    pub completed: Vec<TransformAnimationId>,
    pub cancelled: Vec<TransformAnimationId>,
}

impl RecordingTransformAnimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The keyframes emitted for one element, if any.
    pub fn frames_for(&self, el: El) -> Option<&TransformFrames<El>> {
        self.started
            .iter()
            .flat_map(|(_, frames)| frames.iter())
            .find(|f| f.element == el)
    }
}

impl TransformAnimator<El> for RecordingTransformAnimator {
    fn animate(&mut self, frames: Vec<TransformFrames<El>>) -> TransformAnimationId {
        let id = TransformAnimationId::next();
        self.started.push((id, frames));
        id
    }

    fn complete(&mut self, id: TransformAnimationId) {
        self.completed.push(id);
    }

    fn cancel(&mut self, id: TransformAnimationId) {
        self.cancelled.push(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_computed_cascade() {
        let mut dom = TestDom::new();
        let el = dom.create("div");
        assert_eq!(dom.computed_value(el, "display"), "block");
        assert_eq!(dom.computed_value(el, "color"), "");

        dom.set_style(el, "display", "flex");
        assert_eq!(dom.computed_value(el, "display"), "flex");

        dom.set_inline(el, "display", "none");
        assert_eq!(dom.computed_value(el, "display"), "none");

        dom.remove_inline(el, "display");
        assert_eq!(dom.computed_value(el, "display"), "flex");
    }

    #[test]
    fn test_select_document_order() {
        let mut dom = TestDom::new();
        let root = dom.create("div");
        let a = dom.create("div");
        let a1 = dom.create("span");
        let b = dom.create("div");
        dom.append(root, a);
        dom.append(a, a1);
        dom.append(root, b);
        dom.add_class(b, "card");

        assert_eq!(dom.select(root, "*"), vec![a, a1, b]);
        assert_eq!(dom.select(root, "span"), vec![a1]);
        assert_eq!(dom.select(root, ".card"), vec![b]);
        // The scope itself never matches.
        assert!(dom.select(root, "div").iter().all(|&el| el != root));
    }

    #[test]
    fn test_structure_queries() {
        let mut dom = TestDom::new();
        let root = dom.create("div");
        let a = dom.create("div");
        let b = dom.create("div");
        dom.append(root, a);
        dom.append(root, b);

        assert!(dom.contains(root, b));
        assert!(!dom.contains(a, b));
        assert_eq!(dom.first_child(root), Some(a));
        assert_eq!(dom.next_sibling(a), Some(b));
        assert_eq!(dom.prev_sibling(b), Some(a));

        dom.detach(a);
        assert_eq!(dom.parent(a), None);
        assert_eq!(dom.first_child(root), Some(b));
        assert!(!dom.contains(root, a));
    }

    #[test]
    fn test_insert_child_reorders() {
        let mut dom = TestDom::new();
        let root = dom.create("div");
        let a = dom.create("div");
        let b = dom.create("div");
        dom.append(root, a);
        dom.append(root, b);

        dom.insert_child(root, 0, b);
        assert_eq!(dom.first_child(root), Some(b));
        assert_eq!(dom.next_sibling(b), Some(a));
    }
}
