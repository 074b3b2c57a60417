//! FLIP-style layout transition engine.
//!
//! The engine mirrors a live DOM region into two measured generations,
//! reconciles them by stable node identity, classifies each node's
//! transition role, and emits per-node timing and property instructions to
//! an external playback layer. It is deliberately host-agnostic: document
//! access goes through the [`Dom`] trait, playback through the [`Scheduler`]
//! and [`TransformAnimator`] traits, and deferred cleanup through an
//! explicit frame-task queue the host drains.
//!
//! # Architecture
//!
//! ```text
//! LayoutAnimator
//!   ├── Snapshot (old)  ──┐
//!   ├── Snapshot (new)  ──┤  NodeArena + NodeKey index per generation
//!   ├── CycleState        │  mutes, pending removals, key allocation
//!   ├── record / animate ─┘  measure, diff, classify, emit
//!   ├── Scheduler            property tweens on a timeline
//!   ├── TransformAnimator    compositor translate/transform keyframes
//!   └── FrameQueue           one-frame deferred restores
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let mut animator = LayoutAnimator::new(&mut dom, root, LayoutOptions::default())?;
//! animator.record(&mut dom, &mut scheduler, &mut transforms);
//! // ... mutate the document ...
//! animator.animate(&mut dom, &mut scheduler, &mut transforms, &AnimateParams::new())?;
//! ```

pub mod dom;
pub mod easing;
pub mod engine;
pub mod error;
pub mod frame;
pub mod node;
pub mod params;
pub mod scheduler;
pub mod snapshot;
pub mod spring;
pub mod timing;
pub mod value;

pub use dom::{Dom, NodeKey, Rect};
pub use easing::{Ease, StepPosition};
pub use engine::LayoutAnimator;
pub use error::LayoutError;
pub use frame::FrameTask;
pub use node::{Node, NodeArena, NodeHandle, NodeProperties};
pub use params::{AnimateParams, LayoutOptions, StateParams};
pub use scheduler::{
    Scheduler, SegmentEase, StyleWrite, TimelineId, TransformAnimationId, TransformAnimator,
    TransformFrames, Tween, TweenSegment,
};
pub use snapshot::Snapshot;
pub use spring::Spring;
pub use timing::{DEFAULT_DURATION, ResolvedTiming, Timing};
pub use value::{PropertyValue, Resolvable, ResolvableValue, StaggerContext, stagger};
