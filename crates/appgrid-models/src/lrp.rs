//! Desired and actual LRP records, and the watch change event.

use serde::{Deserialize, Serialize};

use crate::actions::Action;

/// A single name/value environment entry.
///
/// Order matters on the wire — the environment is a sequence, not a map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

impl EnvVar {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Declaration of how many instances of a process should exist and how
/// to launch them. The reconciler drives the world toward this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredLrp {
    pub process_guid: String,
    /// Target instance count. Negative values are treated as zero.
    pub instances: i32,
    /// Opaque tag selecting a lifecycle-binary bundle.
    pub stack: String,
    pub memory_mb: u32,
    pub disk_mb: u32,
    /// File-descriptor limit; 0 means no limit requested.
    pub file_descriptors: u64,
    /// URL of the application droplet.
    pub source: String,
    pub start_command: String,
    #[serde(default)]
    pub environment: Vec<EnvVar>,
    #[serde(default)]
    pub routes: Vec<String>,
    pub log_guid: String,
    /// Pre-authored action program. Empty means the builder authors the
    /// program itself; non-empty means placeholders inside it are
    /// substituted per instance.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Action>,
}

/// Lifecycle state of a reported instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActualLrpState {
    Starting,
    Running,
}

/// A snapshot of a running/starting instance, as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActualLrp {
    pub process_guid: String,
    pub instance_guid: String,
    pub index: u32,
    pub state: ActualLrpState,
}

/// A desired-LRP watch event.
///
/// Absent `after` means the desired was removed (target count becomes 0).
/// Absent `before` means newly created. Both present means modified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredLrpChange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<DesiredLrp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<DesiredLrp>,
}

impl DesiredLrpChange {
    /// A newly created desired LRP.
    pub fn created(after: DesiredLrp) -> Self {
        Self {
            before: None,
            after: Some(after),
        }
    }

    /// A modified desired LRP.
    pub fn modified(before: DesiredLrp, after: DesiredLrp) -> Self {
        Self {
            before: Some(before),
            after: Some(after),
        }
    }

    /// A deleted desired LRP.
    pub fn deleted(before: DesiredLrp) -> Self {
        Self {
            before: Some(before),
            after: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_desired(guid: &str, instances: i32) -> DesiredLrp {
        DesiredLrp {
            process_guid: guid.to_string(),
            instances,
            stack: "lucid64".to_string(),
            memory_mb: 128,
            disk_mb: 512,
            file_descriptors: 0,
            source: "http://example.com/droplet.tgz".to_string(),
            start_command: "./run".to_string(),
            environment: vec![EnvVar::new("foo", "bar")],
            routes: vec!["route-1".to_string()],
            log_guid: "log-guid".to_string(),
            actions: Vec::new(),
        }
    }

    #[test]
    fn desired_lrp_round_trips_without_actions_field() {
        let lrp = test_desired("guid-1", 3);
        let json = serde_json::to_value(&lrp).unwrap();

        // Empty action programs are omitted from the wire form.
        assert!(json.get("actions").is_none());

        let back: DesiredLrp = serde_json::from_value(json).unwrap();
        assert_eq!(back, lrp);
    }

    #[test]
    fn actual_lrp_state_uses_snake_case() {
        let actual = ActualLrp {
            process_guid: "p".to_string(),
            instance_guid: "i".to_string(),
            index: 0,
            state: ActualLrpState::Starting,
        };
        let json = serde_json::to_string(&actual).unwrap();
        assert!(json.contains("\"starting\""));
    }

    #[test]
    fn change_constructors() {
        let lrp = test_desired("guid-1", 2);

        let created = DesiredLrpChange::created(lrp.clone());
        assert!(created.before.is_none());
        assert!(created.after.is_some());

        let deleted = DesiredLrpChange::deleted(lrp.clone());
        assert!(deleted.before.is_some());
        assert!(deleted.after.is_none());

        let modified = DesiredLrpChange::modified(lrp.clone(), lrp);
        assert!(modified.before.is_some());
        assert!(modified.after.is_some());
    }

    #[test]
    fn deletion_omits_after_on_the_wire() {
        let change = DesiredLrpChange::deleted(test_desired("guid-1", 2));
        let json = serde_json::to_value(&change).unwrap();
        assert!(json.get("after").is_none());
        assert!(json.get("before").is_some());
    }
}
