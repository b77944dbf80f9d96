//! Container action programs.
//!
//! An action program is a tree: the top-level list runs in sequence,
//! `Parallel` children run concurrently, and `Monitor` wraps an action
//! with health thresholds and hook callbacks.

use serde::{Deserialize, Serialize};

use crate::lrp::EnvVar;

/// Resource limits applied to a `Run` action.
///
/// `nofile: None` means no file-descriptor limit was requested — this is
/// distinct from a limit of zero and must survive the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nofile: Option<u64>,
}

/// An HTTP callback invoked by the container host on a health transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthHook {
    pub method: String,
    pub url: String,
}

/// One node of an action program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Download {
        from: String,
        to: String,
        extract: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cache_key: Option<String>,
    },
    Run {
        path: String,
        #[serde(default)]
        args: Vec<String>,
        /// Shell-script form used by older declarations in place of
        /// `path`/`args`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        script: Option<String>,
        #[serde(default)]
        env: Vec<EnvVar>,
        /// 0 means no timeout.
        #[serde(default)]
        timeout_secs: u64,
        #[serde(default)]
        resource_limits: ResourceLimits,
    },
    Monitor {
        action: Box<Action>,
        healthy_threshold: u32,
        unhealthy_threshold: u32,
        healthy_hook: HealthHook,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        unhealthy_hook: Option<HealthHook>,
    },
    Parallel {
        actions: Vec<Action>,
    },
}

impl Action {
    /// Convenience constructor for a bare `Run` with no env or limits.
    pub fn run(path: impl Into<String>, args: Vec<String>) -> Self {
        Action::Run {
            path: path.into(),
            args,
            script: None,
            env: Vec::new(),
            timeout_secs: 0,
            resource_limits: ResourceLimits::default(),
        }
    }
}
