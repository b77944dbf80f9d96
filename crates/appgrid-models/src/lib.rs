//! appgrid-models — domain types for the LRP reconciler.
//!
//! These types mirror the platform wire schema: desired and actual
//! long-running processes (LRPs), the change events delivered by the
//! store watch, the action programs executed inside containers, and the
//! auction/stop commands the reconciler submits back to the store.
//!
//! All types are value-like records, JSON-serializable with serde.

pub mod actions;
pub mod auction;
pub mod desire;
pub mod lrp;

pub use actions::{Action, HealthHook, ResourceLimits};
pub use auction::{
    AuctionState, LogConfig, LrpStartAuction, LrpStopAuction, PortMapping, StopLrpInstance,
};
pub use desire::DesireAppRequest;
pub use lrp::{ActualLrp, ActualLrpState, DesiredLrp, DesiredLrpChange, EnvVar};
