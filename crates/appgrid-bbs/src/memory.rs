//! In-process store for tests and standalone runs.
//!
//! Behaves like the real store from the reconciler's point of view:
//! desiring an LRP emits a change to every live watcher, reads return
//! whatever the test seeded, and writes are recorded for inspection.
//! Failure injection flips individual operations into errors.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use appgrid_models::{
    ActualLrp, DesiredLrp, DesiredLrpChange, LrpStartAuction, LrpStopAuction, StopLrpInstance,
};

use crate::bbs::{Bbs, DesiredWatch, WatchStop};
use crate::error::{BbsError, BbsResult};

const CHANGE_BUFFER: usize = 64;
const ERROR_BUFFER: usize = 16;

struct Watcher {
    changes: mpsc::Sender<DesiredLrpChange>,
    errors: mpsc::Sender<BbsError>,
    stopped: watch::Receiver<bool>,
}

#[derive(Default)]
struct Inner {
    desired: HashMap<String, DesiredLrp>,
    actuals: HashMap<String, Vec<ActualLrp>>,
    file_server: Option<String>,
    start_auctions: Vec<LrpStartAuction>,
    stop_instances: Vec<StopLrpInstance>,
    stop_auctions: Vec<LrpStopAuction>,
    watchers: Vec<Watcher>,
    fail_watch: bool,
    fail_desire: bool,
    fail_actuals: bool,
    fail_start_auctions: bool,
    fail_stop_instances: bool,
    fail_stop_auctions: bool,
}

/// In-memory [`Bbs`] implementation.
#[derive(Clone)]
pub struct InMemoryBbs {
    inner: Arc<Mutex<Inner>>,
}

impl Default for InMemoryBbs {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBbs {
    pub fn new() -> Self {
        let inner = Inner {
            file_server: Some("http://file-server.example.com".to_string()),
            ..Inner::default()
        };
        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    // ── Test seeding ───────────────────────────────────────────────

    pub fn set_file_server(&self, url: &str) {
        self.lock().file_server = Some(url.to_string());
    }

    pub fn set_file_server_unavailable(&self) {
        self.lock().file_server = None;
    }

    pub fn set_actual_lrps(&self, process_guid: &str, actuals: Vec<ActualLrp>) {
        self.lock().actuals.insert(process_guid.to_string(), actuals);
    }

    pub fn fail_watch(&self, fail: bool) {
        self.lock().fail_watch = fail;
    }

    pub fn fail_desire(&self, fail: bool) {
        self.lock().fail_desire = fail;
    }

    pub fn fail_actual_lrps(&self, fail: bool) {
        self.lock().fail_actuals = fail;
    }

    pub fn fail_start_auctions(&self, fail: bool) {
        self.lock().fail_start_auctions = fail;
    }

    pub fn fail_stop_instances(&self, fail: bool) {
        self.lock().fail_stop_instances = fail;
    }

    pub fn fail_stop_auctions(&self, fail: bool) {
        self.lock().fail_stop_auctions = fail;
    }

    // ── Test inspection ────────────────────────────────────────────

    pub fn desired_lrps(&self) -> Vec<DesiredLrp> {
        self.lock().desired.values().cloned().collect()
    }

    pub fn start_auctions(&self) -> Vec<LrpStartAuction> {
        self.lock().start_auctions.clone()
    }

    pub fn stop_instances(&self) -> Vec<StopLrpInstance> {
        self.lock().stop_instances.clone()
    }

    pub fn stop_auctions(&self) -> Vec<LrpStopAuction> {
        self.lock().stop_auctions.clone()
    }

    /// Number of live watch subscriptions.
    pub fn watcher_count(&self) -> usize {
        let mut inner = self.lock();
        inner.watchers.retain(watcher_is_live);
        inner.watchers.len()
    }

    // ── Event injection ────────────────────────────────────────────

    /// Deliver a change to every live watcher.
    pub async fn emit_desired_change(&self, change: DesiredLrpChange) {
        for sender in self.live_change_senders() {
            let _ = sender.send(change.clone()).await;
        }
    }

    /// Deliver a watch error to every live watcher.
    pub async fn emit_watch_error(&self, message: &str) {
        let senders: Vec<mpsc::Sender<BbsError>> = {
            let mut inner = self.lock();
            inner.watchers.retain(watcher_is_live);
            inner.watchers.iter().map(|w| w.errors.clone()).collect()
        };
        for sender in senders {
            let _ = sender
                .send(BbsError::WatchClosed(message.to_string()))
                .await;
        }
    }

    fn live_change_senders(&self) -> Vec<mpsc::Sender<DesiredLrpChange>> {
        let mut inner = self.lock();
        inner.watchers.retain(watcher_is_live);
        inner.watchers.iter().map(|w| w.changes.clone()).collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("in-memory bbs lock poisoned")
    }
}

fn watcher_is_live(watcher: &Watcher) -> bool {
    !*watcher.stopped.borrow() && !watcher.changes.is_closed()
}

#[async_trait]
impl Bbs for InMemoryBbs {
    async fn watch_desired_changes(&self) -> BbsResult<DesiredWatch> {
        let (change_tx, change_rx) = mpsc::channel(CHANGE_BUFFER);
        let (error_tx, error_rx) = mpsc::channel(ERROR_BUFFER);
        let (stop, stopped) = WatchStop::new();

        {
            let mut inner = self.lock();
            if inner.fail_watch {
                return Err(BbsError::StoreUnavailable("watch refused".to_string()));
            }
            inner.watchers.push(Watcher {
                changes: change_tx,
                errors: error_tx,
                stopped,
            });
        }

        Ok(DesiredWatch {
            changes: change_rx,
            errors: error_rx,
            stop,
        })
    }

    async fn desire_lrp(&self, desired: DesiredLrp) -> BbsResult<()> {
        let change = {
            let mut inner = self.lock();
            if inner.fail_desire {
                return Err(BbsError::WriteFailed("desire refused".to_string()));
            }
            let before = inner
                .desired
                .insert(desired.process_guid.clone(), desired.clone());
            DesiredLrpChange {
                before,
                after: Some(desired),
            }
        };
        self.emit_desired_change(change).await;
        Ok(())
    }

    async fn remove_desired_lrp(&self, process_guid: &str) -> BbsResult<()> {
        let removed = self.lock().desired.remove(process_guid);
        if let Some(before) = removed {
            self.emit_desired_change(DesiredLrpChange::deleted(before))
                .await;
        }
        Ok(())
    }

    async fn get_actual_lrps(&self, process_guid: &str) -> BbsResult<Vec<ActualLrp>> {
        let inner = self.lock();
        if inner.fail_actuals {
            return Err(BbsError::StoreUnavailable(
                "actuals read refused".to_string(),
            ));
        }
        Ok(inner.actuals.get(process_guid).cloned().unwrap_or_default())
    }

    async fn get_available_file_server(&self) -> BbsResult<String> {
        self.lock()
            .file_server
            .clone()
            .ok_or_else(|| BbsError::StoreUnavailable("no file server available".to_string()))
    }

    async fn request_lrp_start_auction(&self, auction: LrpStartAuction) -> BbsResult<()> {
        let mut inner = self.lock();
        if inner.fail_start_auctions {
            return Err(BbsError::WriteFailed("start auction refused".to_string()));
        }
        inner.start_auctions.push(auction);
        Ok(())
    }

    async fn request_stop_lrp_instance(&self, stop: StopLrpInstance) -> BbsResult<()> {
        let mut inner = self.lock();
        if inner.fail_stop_instances {
            return Err(BbsError::WriteFailed("stop instance refused".to_string()));
        }
        inner.stop_instances.push(stop);
        Ok(())
    }

    async fn request_lrp_stop_auction(&self, stop_auction: LrpStopAuction) -> BbsResult<()> {
        let mut inner = self.lock();
        if inner.fail_stop_auctions {
            return Err(BbsError::WriteFailed("stop auction refused".to_string()));
        }
        inner.stop_auctions.push(stop_auction);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use appgrid_models::{ActualLrpState, EnvVar};

    fn test_desired(guid: &str, instances: i32) -> DesiredLrp {
        DesiredLrp {
            process_guid: guid.to_string(),
            instances,
            stack: "some-stack".to_string(),
            memory_mb: 128,
            disk_mb: 512,
            file_descriptors: 0,
            source: "http://example.com/droplet.tgz".to_string(),
            start_command: "./run".to_string(),
            environment: vec![EnvVar::new("foo", "bar")],
            routes: Vec::new(),
            log_guid: "log-guid".to_string(),
            actions: Vec::new(),
        }
    }

    #[tokio::test]
    async fn desiring_an_lrp_emits_a_created_change() {
        let bbs = InMemoryBbs::new();
        let mut watch = bbs.watch_desired_changes().await.unwrap();

        bbs.desire_lrp(test_desired("guid-1", 2)).await.unwrap();

        let change = watch.changes.recv().await.unwrap();
        assert!(change.before.is_none());
        assert_eq!(change.after.unwrap().process_guid, "guid-1");
    }

    #[tokio::test]
    async fn redesiring_emits_a_modified_change() {
        let bbs = InMemoryBbs::new();
        bbs.desire_lrp(test_desired("guid-1", 2)).await.unwrap();

        let mut watch = bbs.watch_desired_changes().await.unwrap();
        bbs.desire_lrp(test_desired("guid-1", 5)).await.unwrap();

        let change = watch.changes.recv().await.unwrap();
        assert_eq!(change.before.unwrap().instances, 2);
        assert_eq!(change.after.unwrap().instances, 5);
    }

    #[tokio::test]
    async fn removing_emits_a_deleted_change() {
        let bbs = InMemoryBbs::new();
        bbs.desire_lrp(test_desired("guid-1", 2)).await.unwrap();

        let mut watch = bbs.watch_desired_changes().await.unwrap();
        bbs.remove_desired_lrp("guid-1").await.unwrap();

        let change = watch.changes.recv().await.unwrap();
        assert!(change.after.is_none());
        assert_eq!(change.before.unwrap().process_guid, "guid-1");
    }

    #[tokio::test]
    async fn removing_an_unknown_guid_emits_nothing() {
        let bbs = InMemoryBbs::new();
        let mut watch = bbs.watch_desired_changes().await.unwrap();

        bbs.remove_desired_lrp("nonesuch").await.unwrap();
        bbs.desire_lrp(test_desired("guid-1", 1)).await.unwrap();

        // The next event is the desire, not a phantom deletion.
        let change = watch.changes.recv().await.unwrap();
        assert!(change.after.is_some());
    }

    #[tokio::test]
    async fn stopped_watchers_are_pruned() {
        let bbs = InMemoryBbs::new();
        let watch = bbs.watch_desired_changes().await.unwrap();
        assert_eq!(bbs.watcher_count(), 1);

        watch.stop.stop();
        assert_eq!(bbs.watcher_count(), 0);
    }

    #[tokio::test]
    async fn actuals_default_to_empty() {
        let bbs = InMemoryBbs::new();
        assert!(bbs.get_actual_lrps("guid-1").await.unwrap().is_empty());

        bbs.set_actual_lrps(
            "guid-1",
            vec![ActualLrp {
                process_guid: "guid-1".to_string(),
                instance_guid: "instance-1".to_string(),
                index: 0,
                state: ActualLrpState::Running,
            }],
        );
        assert_eq!(bbs.get_actual_lrps("guid-1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failure_injection_flips_operations() {
        let bbs = InMemoryBbs::new();

        bbs.set_file_server_unavailable();
        assert!(matches!(
            bbs.get_available_file_server().await,
            Err(BbsError::StoreUnavailable(_))
        ));

        bbs.fail_actual_lrps(true);
        assert!(bbs.get_actual_lrps("g").await.is_err());

        bbs.fail_watch(true);
        assert!(bbs.watch_desired_changes().await.is_err());
    }

    #[tokio::test]
    async fn emitted_watch_errors_reach_subscribers() {
        let bbs = InMemoryBbs::new();
        let mut watch = bbs.watch_desired_changes().await.unwrap();

        bbs.emit_watch_error("etcd hiccup").await;

        let err = watch.errors.recv().await.unwrap();
        assert!(matches!(err, BbsError::WatchClosed(_)));
    }
}
