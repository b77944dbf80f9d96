//! The legacy desire message published by the cloud controller.
//!
//! This is the message-bus dialect that predates store-native desired
//! LRPs: a flat request naming the app, its droplet, and how many
//! instances should run. The receiver converts it into a [`DesiredLrp`]
//! and writes that to the store.

use serde::{Deserialize, Serialize};

use crate::lrp::{DesiredLrp, EnvVar};

/// Desire request received on the message bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesireAppRequest {
    pub app_id: String,
    pub app_version: String,
    pub droplet_uri: String,
    pub stack: String,
    pub start_command: String,
    #[serde(default)]
    pub environment: Vec<EnvVar>,
    pub memory_mb: u32,
    pub disk_mb: u32,
    #[serde(default)]
    pub file_descriptors: u64,
    pub num_instances: i32,
    #[serde(default)]
    pub routes: Vec<String>,
}

impl DesireAppRequest {
    /// The process guid an app desire maps to: `{app_id}-{app_version}`.
    pub fn process_guid(&self) -> String {
        format!("{}-{}", self.app_id, self.app_version)
    }

    /// Convert into the store-native desired-LRP declaration.
    pub fn to_desired_lrp(&self) -> DesiredLrp {
        DesiredLrp {
            process_guid: self.process_guid(),
            instances: self.num_instances,
            stack: self.stack.clone(),
            memory_mb: self.memory_mb,
            disk_mb: self.disk_mb,
            file_descriptors: self.file_descriptors,
            source: self.droplet_uri.clone(),
            start_command: self.start_command.clone(),
            environment: self.environment.clone(),
            routes: self.routes.clone(),
            log_guid: self.app_id.clone(),
            actions: Vec::new(),
        }
    }
}
