//! appgrid-bbs — the shared-store contract and its adapters.
//!
//! The reconciler owns no state of its own; everything flows through
//! the BBS, the strongly-consistent store holding desired and actual
//! LRP records. This crate defines the [`Bbs`] trait the core consumes,
//! the watch primitive for desired-LRP change subscriptions, and two
//! implementations:
//!
//! - [`InMemoryBbs`] — in-process store for tests and standalone runs
//! - [`HttpBbs`] — client for a store cluster over its HTTP surface

pub mod bbs;
pub mod error;
pub mod http;
pub mod memory;

pub use bbs::{Bbs, DesiredWatch, WatchStop};
pub use error::{BbsError, BbsResult};
pub use http::HttpBbs;
pub use memory::InMemoryBbs;
