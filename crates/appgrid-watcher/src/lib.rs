//! appgrid-watcher — drives the store toward desired state.
//!
//! The [`Consumer`] holds a long-lived desired-LRP subscription and
//! hands each change to a [`Dispatcher`] task: fetch the file server,
//! fetch the actuals, reconcile, and submit the resulting start and
//! stop commands. The consumer survives watch failures by
//! re-subscribing and drains in-flight work on shutdown.
//!
//! The [`desire`] module carries the legacy message-bus path: raw
//! desire payloads parsed and recorded as desired LRPs.

mod backoff;
pub mod consumer;
pub mod desire;
pub mod dispatcher;

pub use consumer::Consumer;
pub use desire::{DesireBus, DesireReceiver, InMemoryDesireBus};
pub use dispatcher::Dispatcher;
