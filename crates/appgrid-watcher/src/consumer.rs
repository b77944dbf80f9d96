//! The change-watch consumer.

use std::sync::Arc;

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{info, warn};

use appgrid_bbs::Bbs;

use crate::backoff::{sleep_or_shutdown, Backoff, BACKOFF_BASE, BACKOFF_CAP};
use crate::dispatcher::Dispatcher;

const DEFAULT_MAX_IN_FLIGHT: usize = 64;

/// Subscribes to desired-LRP changes and fans each one out to a
/// dispatcher task.
///
/// Watch failures tear the subscription down and re-subscribe with
/// jittered backoff; every change is reconciled against a fresh read of
/// actuals, so nothing is lost across the gap beyond what the next
/// event corrects. On shutdown the subscription is stopped and all
/// admitted work is drained — tasks are never cancelled mid-flight.
pub struct Consumer {
    bbs: Arc<dyn Bbs>,
    dispatcher: Arc<Dispatcher>,
    max_in_flight: usize,
}

impl Consumer {
    pub fn new(bbs: Arc<dyn Bbs>, dispatcher: Dispatcher) -> Self {
        Self {
            bbs,
            dispatcher: Arc::new(dispatcher),
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }

    /// Cap the number of concurrently dispatching changes.
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight;
        self
    }

    /// Run until the shutdown signal fires.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let semaphore = Arc::new(Semaphore::new(self.max_in_flight));
        let mut tasks: JoinSet<()> = JoinSet::new();
        let mut backoff = Backoff::new(BACKOFF_BASE, BACKOFF_CAP);

        'outer: loop {
            let mut desired_watch = match self.bbs.watch_desired_changes().await {
                Ok(w) => {
                    backoff.reset();
                    info!("watching desired changes");
                    w
                }
                Err(e) => {
                    warn!(error = %e, "desired watch subscription failed");
                    if sleep_or_shutdown(backoff.next_delay(), &mut shutdown).await {
                        break 'outer;
                    }
                    continue;
                }
            };

            let mut errors_closed = false;
            loop {
                tokio::select! {
                    _ = shutdown.changed() => {
                        info!("shutdown signal received, closing desired watch");
                        desired_watch.stop.stop();
                        break 'outer;
                    }

                    maybe_change = desired_watch.changes.recv() => match maybe_change {
                        Some(change) => {
                            let permit = semaphore
                                .clone()
                                .acquire_owned()
                                .await
                                .expect("dispatch semaphore closed");
                            let dispatcher = self.dispatcher.clone();
                            tasks.spawn(async move {
                                dispatcher.dispatch(change).await;
                                drop(permit);
                            });
                        }
                        None => {
                            warn!("desired watch closed, resubscribing");
                            break;
                        }
                    },

                    maybe_err = desired_watch.errors.recv(), if !errors_closed => match maybe_err {
                        Some(e) => {
                            warn!(error = %e, "desired watch failed, resubscribing");
                            desired_watch.stop.stop();
                            break;
                        }
                        None => errors_closed = true,
                    },

                    // Reap finished dispatches so the set stays small.
                    Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
                }
            }

            if sleep_or_shutdown(backoff.next_delay(), &mut shutdown).await {
                break 'outer;
            }
        }

        // Admitted work runs to completion so the store is not left
        // with a half-submitted change.
        while tasks.join_next().await.is_some() {}
        info!("consumer stopped");
    }
}
