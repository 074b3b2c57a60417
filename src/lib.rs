//! Reflow: snapshot-and-diff layout transition engine.
//!
//! This crate is a thin facade over [`reflow_engine`]. See that crate for the
//! full documentation of the node model, snapshot diffing, and the
//! scheduler/transform-animator boundary.

pub use reflow_engine::*;
