//! Per-change dispatch: reconcile one desired-LRP change against the
//! world and submit the resulting commands.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, error, warn};

use appgrid_bbs::Bbs;
use appgrid_builder::{BuildError, StartMessageBuilder};
use appgrid_delta::reconcile;
use appgrid_models::{ActualLrp, DesiredLrpChange, LrpStopAuction, StopLrpInstance};

/// Processes one desired-LRP change end to end.
///
/// Each change runs on its own task; the dispatcher itself is shared
/// and holds no per-change state. A command failure never cancels the
/// other commands of the same change.
pub struct Dispatcher {
    bbs: Arc<dyn Bbs>,
    builder: StartMessageBuilder,
}

impl Dispatcher {
    pub fn new(bbs: Arc<dyn Bbs>, builder: StartMessageBuilder) -> Self {
        Self { bbs, builder }
    }

    /// Reconcile one change: fresh reads, delta, submissions.
    pub async fn dispatch(&self, change: DesiredLrpChange) {
        // Deletion reconciles the `before` declaration toward zero.
        let (desired, desired_count) = match (change.before, change.after) {
            (_, Some(after)) => {
                let count = after.instances;
                (after, count)
            }
            (Some(before), None) => (before, 0),
            (None, None) => {
                debug!("desired change carried neither before nor after");
                return;
            }
        };
        let process_guid = desired.process_guid.clone();

        // Without a file server we cannot build correct replacements, so
        // the whole change is skipped — no partial writes.
        let file_server_url = match self.bbs.get_available_file_server().await {
            Ok(url) => url,
            Err(e) => {
                warn!(%process_guid, error = %e, "file server lookup failed, skipping change");
                return;
            }
        };

        let actuals = match self.bbs.get_actual_lrps(&process_guid).await {
            Ok(actuals) => actuals,
            Err(e) => {
                error!(%process_guid, error = %e, "actuals fetch failed, skipping change");
                return;
            }
        };

        let delta = reconcile(desired_count, &actuals);
        debug!(
            %process_guid,
            desired = desired_count,
            starts = delta.indices_to_start.len(),
            stops = delta.guids_to_stop.len(),
            stop_auctions = delta.indices_to_stop_all_but_one.len(),
            "reconciled desired change"
        );

        let by_guid: HashMap<&str, &ActualLrp> = actuals
            .iter()
            .map(|a| (a.instance_guid.as_str(), a))
            .collect();

        for index in &delta.indices_to_start {
            let index = *index;
            let auction = match self.builder.build(&desired, index, &file_server_url) {
                Ok(auction) => auction,
                Err(e @ BuildError::EnvironmentMalformed(_)) => {
                    warn!(%process_guid, index, error = %e, "skipping start");
                    continue;
                }
                Err(e) => {
                    error!(%process_guid, index, error = %e, "skipping start");
                    continue;
                }
            };
            if let Err(e) = self.bbs.request_lrp_start_auction(auction).await {
                error!(%process_guid, index, error = %e, "start auction request failed");
            }
        }

        for guid in &delta.guids_to_stop {
            let Some(actual) = by_guid.get(guid.as_str()) else {
                continue;
            };
            let stop = StopLrpInstance {
                process_guid: actual.process_guid.clone(),
                index: actual.index,
                instance_guid: actual.instance_guid.clone(),
            };
            if let Err(e) = self.bbs.request_stop_lrp_instance(stop).await {
                error!(%process_guid, instance_guid = %guid, error = %e, "stop request failed");
            }
        }

        for index in &delta.indices_to_stop_all_but_one {
            let stop_auction = LrpStopAuction {
                process_guid: process_guid.clone(),
                index: *index,
            };
            if let Err(e) = self.bbs.request_lrp_stop_auction(stop_auction).await {
                error!(%process_guid, index = *index, error = %e, "stop auction request failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;

    use appgrid_bbs::InMemoryBbs;
    use appgrid_models::{ActualLrpState, DesiredLrp, EnvVar};

    fn test_builder() -> StartMessageBuilder {
        let bundles = StdHashMap::from([(
            "some-stack".to_string(),
            "some-health-check.tgz".to_string(),
        )]);
        StartMessageBuilder::new("127.0.0.1:20515", bundles).unwrap()
    }

    fn test_dispatcher(bbs: &InMemoryBbs) -> Dispatcher {
        Dispatcher::new(Arc::new(bbs.clone()), test_builder())
    }

    fn test_desired(guid: &str, instances: i32) -> DesiredLrp {
        DesiredLrp {
            process_guid: guid.to_string(),
            instances,
            stack: "some-stack".to_string(),
            memory_mb: 128,
            disk_mb: 512,
            file_descriptors: 32,
            source: "http://example.com/droplet.tgz".to_string(),
            start_command: "./run".to_string(),
            environment: vec![EnvVar::new("foo", "bar")],
            routes: Vec::new(),
            log_guid: "log-guid".to_string(),
            actions: Vec::new(),
        }
    }

    fn actual(guid: &str, instance: &str, index: u32) -> ActualLrp {
        ActualLrp {
            process_guid: guid.to_string(),
            instance_guid: instance.to_string(),
            index,
            state: ActualLrpState::Running,
        }
    }

    #[tokio::test]
    async fn starts_every_missing_index() {
        let bbs = InMemoryBbs::new();
        let dispatcher = test_dispatcher(&bbs);

        dispatcher
            .dispatch(DesiredLrpChange::created(test_desired("guid-1", 3)))
            .await;

        let auctions = bbs.start_auctions();
        assert_eq!(auctions.len(), 3);
        let mut indices: Vec<u32> = auctions.iter().map(|a| a.index).collect();
        indices.sort_unstable();
        assert_eq!(indices, vec![0, 1, 2]);
        assert!(bbs.stop_instances().is_empty());
        assert!(bbs.stop_auctions().is_empty());
    }

    #[tokio::test]
    async fn stops_out_of_range_instances() {
        let bbs = InMemoryBbs::new();
        bbs.set_actual_lrps(
            "guid-1",
            vec![
                actual("guid-1", "a", 0),
                actual("guid-1", "b", 4),
                actual("guid-1", "c", 5),
            ],
        );
        let dispatcher = test_dispatcher(&bbs);

        dispatcher
            .dispatch(DesiredLrpChange::created(test_desired("guid-1", 4)))
            .await;

        let mut start_indices: Vec<u32> =
            bbs.start_auctions().iter().map(|a| a.index).collect();
        start_indices.sort_unstable();
        assert_eq!(start_indices, vec![1, 2, 3]);

        let stops = bbs.stop_instances();
        assert_eq!(stops.len(), 2);
        let mut stopped: Vec<&str> = stops.iter().map(|s| s.instance_guid.as_str()).collect();
        stopped.sort_unstable();
        assert_eq!(stopped, vec!["b", "c"]);
        assert_eq!(stops[0].process_guid, "guid-1");
        assert!(bbs.stop_auctions().is_empty());
    }

    #[tokio::test]
    async fn duplicate_index_requests_a_stop_auction() {
        let bbs = InMemoryBbs::new();
        bbs.set_actual_lrps(
            "guid-1",
            vec![
                actual("guid-1", "a", 0),
                actual("guid-1", "a-prime", 0),
                actual("guid-1", "b", 1),
            ],
        );
        let dispatcher = test_dispatcher(&bbs);

        dispatcher
            .dispatch(DesiredLrpChange::created(test_desired("guid-1", 2)))
            .await;

        assert!(bbs.start_auctions().is_empty());
        assert!(bbs.stop_instances().is_empty());
        assert_eq!(
            bbs.stop_auctions(),
            vec![LrpStopAuction {
                process_guid: "guid-1".to_string(),
                index: 0,
            }]
        );
    }

    #[tokio::test]
    async fn deletion_stops_everything() {
        let bbs = InMemoryBbs::new();
        bbs.set_actual_lrps("guid-1", vec![actual("guid-1", "a", 0)]);
        let dispatcher = test_dispatcher(&bbs);

        dispatcher
            .dispatch(DesiredLrpChange::deleted(test_desired("guid-1", 2)))
            .await;

        assert!(bbs.start_auctions().is_empty());
        let stops = bbs.stop_instances();
        assert_eq!(stops.len(), 1);
        assert_eq!(stops[0].instance_guid, "a");
        assert!(bbs.stop_auctions().is_empty());
    }

    #[tokio::test]
    async fn file_server_failure_writes_nothing() {
        let bbs = InMemoryBbs::new();
        bbs.set_file_server_unavailable();
        // Out-of-range actual that would otherwise be stopped.
        bbs.set_actual_lrps("guid-1", vec![actual("guid-1", "a", 9)]);
        let dispatcher = test_dispatcher(&bbs);

        dispatcher
            .dispatch(DesiredLrpChange::created(test_desired("guid-1", 2)))
            .await;

        assert!(bbs.start_auctions().is_empty());
        assert!(bbs.stop_instances().is_empty());
        assert!(bbs.stop_auctions().is_empty());
    }

    #[tokio::test]
    async fn actuals_failure_writes_nothing() {
        let bbs = InMemoryBbs::new();
        bbs.fail_actual_lrps(true);
        let dispatcher = test_dispatcher(&bbs);

        dispatcher
            .dispatch(DesiredLrpChange::created(test_desired("guid-1", 2)))
            .await;

        assert!(bbs.start_auctions().is_empty());
        assert!(bbs.stop_instances().is_empty());
    }

    #[tokio::test]
    async fn unknown_stack_skips_starts_but_still_stops() {
        let bbs = InMemoryBbs::new();
        bbs.set_actual_lrps("guid-1", vec![actual("guid-1", "tail", 5)]);
        let mut desired = test_desired("guid-1", 2);
        desired.stack = "nonesuch".to_string();
        let dispatcher = test_dispatcher(&bbs);

        dispatcher.dispatch(DesiredLrpChange::created(desired)).await;

        assert!(bbs.start_auctions().is_empty());
        assert_eq!(bbs.stop_instances().len(), 1);
    }

    #[tokio::test]
    async fn submit_failure_does_not_cancel_other_commands() {
        let bbs = InMemoryBbs::new();
        bbs.fail_start_auctions(true);
        bbs.set_actual_lrps("guid-1", vec![actual("guid-1", "tail", 7)]);
        let dispatcher = test_dispatcher(&bbs);

        dispatcher
            .dispatch(DesiredLrpChange::created(test_desired("guid-1", 2)))
            .await;

        // Starts were refused, but the stop still went through.
        assert!(bbs.start_auctions().is_empty());
        assert_eq!(bbs.stop_instances().len(), 1);
    }

    #[tokio::test]
    async fn empty_change_is_a_no_op() {
        let bbs = InMemoryBbs::new();
        let dispatcher = test_dispatcher(&bbs);

        dispatcher
            .dispatch(DesiredLrpChange {
                before: None,
                after: None,
            })
            .await;

        assert!(bbs.start_auctions().is_empty());
        assert!(bbs.stop_instances().is_empty());
    }
}
