//! HTTP client for a store cluster.
//!
//! Desired-LRP changes are delivered by long-polling the watch
//! endpoint: each request blocks until the next change (or the
//! subscription is stopped) and carries a sequence number so no change
//! is skipped between polls.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::{mpsc, watch};
use tracing::debug;

use appgrid_models::{
    ActualLrp, DesiredLrp, DesiredLrpChange, LrpStartAuction, LrpStopAuction, StopLrpInstance,
};

use crate::bbs::{Bbs, DesiredWatch, WatchStop};
use crate::error::{BbsError, BbsResult};

const CHANGE_BUFFER: usize = 64;
const ERROR_BUFFER: usize = 16;

/// Timeout for the initial cluster probe.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Timeout for everything except the long-poll watch request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// One long-poll response from the watch endpoint.
#[derive(Debug, Deserialize)]
struct WatchEvent {
    index: u64,
    change: DesiredLrpChange,
}

/// [`Bbs`] implementation over the store's HTTP surface.
#[derive(Clone)]
pub struct HttpBbs {
    client: reqwest::Client,
    base: String,
}

impl HttpBbs {
    /// Probe the cluster node list and connect to the first node that
    /// answers. Fails if no node is reachable.
    pub async fn connect(nodes: &[String]) -> BbsResult<Self> {
        let client = reqwest::Client::new();

        for node in nodes {
            let base = node.trim_end_matches('/').to_string();
            let probe = client
                .get(format!("{base}/v1/ping"))
                .timeout(CONNECT_TIMEOUT)
                .send()
                .await;
            match probe {
                Ok(resp) if resp.status().is_success() => {
                    debug!(%base, "connected to store node");
                    return Ok(Self { client, base });
                }
                Ok(resp) => {
                    debug!(%base, status = %resp.status(), "store node refused ping");
                }
                Err(e) => {
                    debug!(%base, error = %e, "store node unreachable");
                }
            }
        }

        Err(BbsError::StoreUnavailable(format!(
            "no reachable store node among {nodes:?}"
        )))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> BbsResult<T> {
        let resp = self
            .client
            .get(format!("{}{path}", self.base))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| BbsError::StoreUnavailable(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(BbsError::StoreUnavailable(format!(
                "GET {path} returned {}",
                resp.status()
            )));
        }

        resp.json::<T>()
            .await
            .map_err(|e| BbsError::Deserialize(e.to_string()))
    }

    async fn write_json<T: serde::Serialize>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &T,
    ) -> BbsResult<()> {
        let resp = self
            .client
            .request(method, format!("{}{path}", self.base))
            .timeout(REQUEST_TIMEOUT)
            .json(body)
            .send()
            .await
            .map_err(|e| BbsError::WriteFailed(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(BbsError::WriteFailed(format!(
                "{path} returned {}",
                resp.status()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Bbs for HttpBbs {
    async fn watch_desired_changes(&self) -> BbsResult<DesiredWatch> {
        let (change_tx, change_rx) = mpsc::channel(CHANGE_BUFFER);
        let (error_tx, error_rx) = mpsc::channel(ERROR_BUFFER);
        let (stop, stop_rx) = WatchStop::new();

        let client = self.client.clone();
        let base = self.base.clone();
        tokio::spawn(run_watch_loop(client, base, change_tx, error_tx, stop_rx));

        Ok(DesiredWatch {
            changes: change_rx,
            errors: error_rx,
            stop,
        })
    }

    async fn desire_lrp(&self, desired: DesiredLrp) -> BbsResult<()> {
        let path = format!("/v1/desired/{}", desired.process_guid);
        self.write_json(reqwest::Method::PUT, &path, &desired).await
    }

    async fn remove_desired_lrp(&self, process_guid: &str) -> BbsResult<()> {
        let path = format!("/v1/desired/{process_guid}");
        self.write_json(reqwest::Method::DELETE, &path, &serde_json::json!({}))
            .await
    }

    async fn get_actual_lrps(&self, process_guid: &str) -> BbsResult<Vec<ActualLrp>> {
        self.get_json(&format!("/v1/actual/{process_guid}")).await
    }

    async fn get_available_file_server(&self) -> BbsResult<String> {
        self.get_json("/v1/file_server").await
    }

    async fn request_lrp_start_auction(&self, auction: LrpStartAuction) -> BbsResult<()> {
        self.write_json(reqwest::Method::POST, "/v1/start_auctions", &auction)
            .await
    }

    async fn request_stop_lrp_instance(&self, stop: StopLrpInstance) -> BbsResult<()> {
        self.write_json(reqwest::Method::POST, "/v1/stop_instances", &stop)
            .await
    }

    async fn request_lrp_stop_auction(&self, stop_auction: LrpStopAuction) -> BbsResult<()> {
        self.write_json(reqwest::Method::POST, "/v1/stop_auctions", &stop_auction)
            .await
    }
}

/// The long-poll loop behind one subscription. Ends when the stop
/// handle fires or the store stops answering; either way the channels
/// close and the consumer re-subscribes if it still wants events.
async fn run_watch_loop(
    client: reqwest::Client,
    base: String,
    change_tx: mpsc::Sender<DesiredLrpChange>,
    error_tx: mpsc::Sender<BbsError>,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut after: u64 = 0;

    loop {
        if *stop_rx.borrow() {
            return;
        }

        let request = client
            .get(format!("{base}/v1/desired/watch"))
            .query(&[("after", after)])
            .send();

        let response = tokio::select! {
            _ = stop_rx.changed() => return,
            response = request => response,
        };

        let event: WatchEvent = match parse_watch_response(response).await {
            Ok(event) => event,
            Err(e) => {
                let _ = error_tx.send(e).await;
                return;
            }
        };

        after = event.index;
        if change_tx.send(event.change).await.is_err() {
            // Subscriber went away; nothing left to deliver to.
            return;
        }
    }
}

async fn parse_watch_response(
    response: Result<reqwest::Response, reqwest::Error>,
) -> BbsResult<WatchEvent> {
    let response = response.map_err(|e| BbsError::WatchClosed(e.to_string()))?;
    if !response.status().is_success() {
        return Err(BbsError::WatchClosed(format!(
            "watch returned {}",
            response.status()
        )));
    }
    response
        .json::<WatchEvent>()
        .await
        .map_err(|e| BbsError::Deserialize(e.to_string()))
}
