//! The store contract consumed by the reconciler core.

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use appgrid_models::{
    ActualLrp, DesiredLrp, DesiredLrpChange, LrpStartAuction, LrpStopAuction, StopLrpInstance,
};

use crate::error::{BbsError, BbsResult};

/// Handle that asks the store to terminate a desired-LRP subscription.
#[derive(Debug, Clone)]
pub struct WatchStop {
    tx: watch::Sender<bool>,
}

impl WatchStop {
    /// Create a stop handle and the flag receiver the adapter observes.
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, rx)
    }

    /// Ask the store to close the subscription. Safe to call more than
    /// once; the adapter may take a moment to notice.
    pub fn stop(&self) {
        let _ = self.tx.send(true);
    }
}

/// A live desired-LRP subscription.
///
/// Changes and watch errors arrive on separate channels; both close
/// when the subscription ends, whether by [`WatchStop::stop`] or by the
/// store tearing it down.
pub struct DesiredWatch {
    pub changes: mpsc::Receiver<DesiredLrpChange>,
    pub errors: mpsc::Receiver<BbsError>,
    pub stop: WatchStop,
}

/// Operations the reconciler performs against the shared store.
///
/// Implementations must be safe for concurrent use — one instance is
/// shared across every dispatcher task.
#[async_trait]
pub trait Bbs: Send + Sync {
    /// Open a long-lived subscription to desired-LRP changes.
    async fn watch_desired_changes(&self) -> BbsResult<DesiredWatch>;

    /// Record a desired LRP declaration.
    async fn desire_lrp(&self, desired: DesiredLrp) -> BbsResult<()>;

    /// Remove a desired LRP declaration.
    async fn remove_desired_lrp(&self, process_guid: &str) -> BbsResult<()>;

    /// Fetch the reported actual instances for one process.
    async fn get_actual_lrps(&self, process_guid: &str) -> BbsResult<Vec<ActualLrp>>;

    /// Resolve the base URL of an available file server.
    async fn get_available_file_server(&self) -> BbsResult<String>;

    /// Submit a start auction for a missing instance.
    async fn request_lrp_start_auction(&self, auction: LrpStartAuction) -> BbsResult<()>;

    /// Submit a stop for one specific instance.
    async fn request_stop_lrp_instance(&self, stop: StopLrpInstance) -> BbsResult<()>;

    /// Submit a stop auction resolving duplicates at one index.
    async fn request_lrp_stop_auction(&self, stop_auction: LrpStopAuction) -> BbsResult<()>;
}
