//! appgrid-delta — the pure reconciliation engine.
//!
//! Given a desired instance count and the set of currently reported
//! actual instances, [`reconcile`] computes the minimal set of start,
//! stop, and duplicate-resolution decisions. The engine is a total
//! function over value types: it never suspends, never errors, and is
//! invariant under permutation of its input.

pub mod reconciler;

pub use reconciler::{reconcile, Delta};
