//! Desired-count × actuals → start/stop decisions.

use std::collections::{BTreeMap, BTreeSet};

use appgrid_models::ActualLrp;

/// The decisions the engine emits for one desired LRP.
///
/// All three fields are sets — ordering of the resulting commands is a
/// presentation concern, not a contract.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delta {
    /// Indices in `[0, desired_count)` with no reported actual.
    pub indices_to_start: BTreeSet<u32>,
    /// Instance guids whose index is at or beyond the desired count.
    pub guids_to_stop: BTreeSet<String>,
    /// Indices below the desired count holding more than one actual;
    /// the survivor is picked by a stop auction, not here.
    pub indices_to_stop_all_but_one: BTreeSet<u32>,
}

impl Delta {
    /// True when the world already matches the declaration.
    pub fn is_empty(&self) -> bool {
        self.indices_to_start.is_empty()
            && self.guids_to_stop.is_empty()
            && self.indices_to_stop_all_but_one.is_empty()
    }
}

/// Compute the delta between a desired instance count and the reported
/// actuals. Negative `desired_count` is treated as zero, which reduces
/// every rule to "stop everything".
pub fn reconcile(desired_count: i32, actuals: &[ActualLrp]) -> Delta {
    let desired_count = desired_count.max(0) as u32;

    let mut by_index: BTreeMap<u32, Vec<&ActualLrp>> = BTreeMap::new();
    for actual in actuals {
        by_index.entry(actual.index).or_default().push(actual);
    }

    let mut delta = Delta::default();

    for index in 0..desired_count {
        match by_index.get(&index) {
            None => {
                delta.indices_to_start.insert(index);
            }
            Some(bucket) if bucket.len() >= 2 => {
                delta.indices_to_stop_all_but_one.insert(index);
            }
            Some(_) => {}
        }
    }

    for actual in actuals {
        if actual.index >= desired_count {
            delta.guids_to_stop.insert(actual.instance_guid.clone());
        }
    }

    delta
}
