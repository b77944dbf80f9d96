//! Legacy desire-message ingestion.
//!
//! The cloud controller publishes desire requests on the message bus.
//! The receiver parses each payload and records the equivalent desired
//! LRP in the store, where the watch-driven reconciliation picks it up.
//! The bus transport itself is an external collaborator — only the
//! subscription contract is consumed here.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use appgrid_bbs::Bbs;
use appgrid_models::DesireAppRequest;

use crate::backoff::{sleep_or_shutdown, Backoff, BACKOFF_BASE, BACKOFF_CAP};

/// Subject the cloud controller publishes desire requests on.
pub const DESIRE_SUBJECT: &str = "diego.desire.app";

const PAYLOAD_BUFFER: usize = 64;

/// Subscription contract over the message bus.
#[async_trait]
pub trait DesireBus: Send + Sync {
    /// Subscribe to a subject; payloads arrive raw and unparsed.
    async fn subscribe(&self, subject: &str) -> anyhow::Result<mpsc::Receiver<Vec<u8>>>;
}

/// Consumes desire payloads and records them as desired LRPs.
pub struct DesireReceiver {
    bus: Arc<dyn DesireBus>,
    bbs: Arc<dyn Bbs>,
}

impl DesireReceiver {
    pub fn new(bus: Arc<dyn DesireBus>, bbs: Arc<dyn Bbs>) -> Self {
        Self { bus, bbs }
    }

    /// Run until the shutdown signal fires.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut backoff = Backoff::new(BACKOFF_BASE, BACKOFF_CAP);

        'outer: loop {
            let mut payloads = match self.bus.subscribe(DESIRE_SUBJECT).await {
                Ok(payloads) => {
                    backoff.reset();
                    info!(subject = DESIRE_SUBJECT, "subscribed to desire messages");
                    payloads
                }
                Err(e) => {
                    warn!(error = %e, "desire subscription failed");
                    if sleep_or_shutdown(backoff.next_delay(), &mut shutdown).await {
                        break 'outer;
                    }
                    continue;
                }
            };

            loop {
                tokio::select! {
                    _ = shutdown.changed() => break 'outer,
                    maybe_payload = payloads.recv() => match maybe_payload {
                        Some(payload) => self.handle_payload(&payload).await,
                        None => {
                            warn!("desire subscription closed, resubscribing");
                            break;
                        }
                    },
                }
            }

            if sleep_or_shutdown(backoff.next_delay(), &mut shutdown).await {
                break 'outer;
            }
        }

        info!("desire receiver stopped");
    }

    /// A payload that fails to parse is logged and dropped — it must
    /// never terminate the receiver.
    async fn handle_payload(&self, payload: &[u8]) {
        let request: DesireAppRequest = match serde_json::from_slice(payload) {
            Ok(request) => request,
            Err(e) => {
                error!(error = %e, "failed to parse desire message");
                return;
            }
        };

        let desired = request.to_desired_lrp();
        let process_guid = desired.process_guid.clone();
        if let Err(e) = self.bbs.desire_lrp(desired).await {
            error!(%process_guid, error = %e, "failed to record desired lrp");
        }
    }
}

/// In-process bus for tests and standalone runs.
#[derive(Clone, Default)]
pub struct InMemoryDesireBus {
    subscribers: Arc<Mutex<Vec<(String, mpsc::Sender<Vec<u8>>)>>>,
}

impl InMemoryDesireBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a payload to every subscriber of `subject`.
    pub async fn publish(&self, subject: &str, payload: Vec<u8>) {
        let senders: Vec<mpsc::Sender<Vec<u8>>> = {
            let mut subscribers = self.subscribers.lock().expect("desire bus lock poisoned");
            subscribers.retain(|(_, tx)| !tx.is_closed());
            subscribers
                .iter()
                .filter(|(s, _)| s == subject)
                .map(|(_, tx)| tx.clone())
                .collect()
        };
        for sender in senders {
            let _ = sender.send(payload.clone()).await;
        }
    }
}

#[async_trait]
impl DesireBus for InMemoryDesireBus {
    async fn subscribe(&self, subject: &str) -> anyhow::Result<mpsc::Receiver<Vec<u8>>> {
        let (tx, rx) = mpsc::channel(PAYLOAD_BUFFER);
        self.subscribers
            .lock()
            .expect("desire bus lock poisoned")
            .push((subject.to_string(), tx));
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use appgrid_bbs::InMemoryBbs;
    use appgrid_models::EnvVar;

    fn test_request() -> DesireAppRequest {
        DesireAppRequest {
            app_id: "the-app-guid".to_string(),
            app_version: "the-app-version".to_string(),
            droplet_uri: "http://the-droplet.uri.com".to_string(),
            stack: "some-stack".to_string(),
            start_command: "the-start-command".to_string(),
            environment: vec![EnvVar::new("foo", "bar")],
            memory_mb: 128,
            disk_mb: 512,
            file_descriptors: 32,
            num_instances: 2,
            routes: vec!["route1".to_string()],
        }
    }

    fn start_receiver(
        bus: &InMemoryDesireBus,
        bbs: &InMemoryBbs,
    ) -> (watch::Sender<bool>, tokio::task::JoinHandle<()>) {
        let receiver = DesireReceiver::new(Arc::new(bus.clone()), Arc::new(bbs.clone()));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(receiver.run(shutdown_rx));
        (shutdown_tx, handle)
    }

    async fn eventually<F: Fn() -> bool>(what: &str, check: F) {
        for _ in 0..200 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition never held: {what}");
    }

    #[tokio::test]
    async fn records_desired_lrps_from_the_bus() {
        let bus = InMemoryDesireBus::new();
        let bbs = InMemoryBbs::new();
        let (shutdown_tx, handle) = start_receiver(&bus, &bbs);

        // Wait for the subscription before publishing.
        eventually("subscribed", || {
            bus.subscribers.lock().unwrap().len() == 1
        })
        .await;

        let payload = serde_json::to_vec(&test_request()).unwrap();
        bus.publish(DESIRE_SUBJECT, payload).await;

        eventually("desired recorded", || {
            bbs.desired_lrps()
                .iter()
                .any(|d| d.process_guid == "the-app-guid-the-app-version" && d.instances == 2)
        })
        .await;

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn unparseable_payloads_are_dropped() {
        let bus = InMemoryDesireBus::new();
        let bbs = InMemoryBbs::new();
        let (shutdown_tx, handle) = start_receiver(&bus, &bbs);

        eventually("subscribed", || {
            bus.subscribers.lock().unwrap().len() == 1
        })
        .await;

        bus.publish(DESIRE_SUBJECT, b"not json at all".to_vec())
            .await;
        let payload = serde_json::to_vec(&test_request()).unwrap();
        bus.publish(DESIRE_SUBJECT, payload).await;

        // The bad payload is skipped; the good one still lands.
        eventually("desired recorded", || !bbs.desired_lrps().is_empty()).await;

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn desire_write_failures_do_not_stop_the_receiver() {
        let bus = InMemoryDesireBus::new();
        let bbs = InMemoryBbs::new();
        bbs.fail_desire(true);
        let (shutdown_tx, handle) = start_receiver(&bus, &bbs);

        eventually("subscribed", || {
            bus.subscribers.lock().unwrap().len() == 1
        })
        .await;

        bus.publish(DESIRE_SUBJECT, serde_json::to_vec(&test_request()).unwrap())
            .await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        bbs.fail_desire(false);
        bus.publish(DESIRE_SUBJECT, serde_json::to_vec(&test_request()).unwrap())
            .await;

        eventually("desired recorded", || !bbs.desired_lrps().is_empty()).await;

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
