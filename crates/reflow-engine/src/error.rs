//! Engine errors.
//!
//! The error policy is deliberately narrow: misconfiguration surfaces as an
//! error, while elements that disappear or fail to measure mid-cycle are
//! skipped silently so a transition can never take the host down.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum LayoutError {
    /// The configured root is not a trackable element, or disappeared from
    /// the document between passes.
    #[error("layout root is not a trackable element")]
    InvalidRoot,
}
