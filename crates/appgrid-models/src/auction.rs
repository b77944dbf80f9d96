//! Auction and stop commands submitted to the store.

use serde::{Deserialize, Serialize};

use crate::actions::Action;

/// State of a start auction. The reconciler only ever submits `Pending`;
/// the auctioneer advances it from there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuctionState {
    Pending,
}

/// A container-port mapping exposed by an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    pub container_port: u16,
}

/// Log routing metadata attached to a start auction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    pub guid: String,
    pub source_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
}

/// Request to the auctioneer to place one missing instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LrpStartAuction {
    pub process_guid: String,
    pub instance_guid: String,
    pub index: u32,
    pub state: AuctionState,
    pub memory_mb: u32,
    pub disk_mb: u32,
    pub ports: Vec<PortMapping>,
    pub stack: String,
    pub log: LogConfig,
    pub actions: Vec<Action>,
}

/// Request to stop one specific instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopLrpInstance {
    pub process_guid: String,
    pub index: u32,
    pub instance_guid: String,
}

/// Request to auction away all-but-one duplicate at an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LrpStopAuction {
    pub process_guid: String,
    pub index: u32,
}
