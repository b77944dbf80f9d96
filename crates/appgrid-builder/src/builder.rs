//! The start-message builder.

use std::collections::HashMap;

use url::Url;
use uuid::Uuid;

use appgrid_models::{
    Action, AuctionState, DesiredLrp, LogConfig, LrpStartAuction, PortMapping, ResourceLimits,
};

use crate::env::build_env;
use crate::error::{BuildError, BuildResult};
use crate::hooks::HookUrls;
use crate::placeholder::substitute_placeholders;

/// Route prefix under which the file server exposes static assets.
const FS_STATIC_ROUTE: &str = "/v1/static/";

/// Fixed path the lifecycle bundle is extracted to inside the container.
const CIRCUS_PATH: &str = "/tmp/circus";

/// The port every instance listens on.
const CONTAINER_PORT: u16 = 8080;

/// Builds concrete start auctions from desired LRPs.
///
/// The builder is pure apart from instance-guid generation: the same
/// declaration and index always produce the same program shape, env,
/// and hook URL, differing only in the fresh guid.
pub struct StartMessageBuilder {
    hook_urls: HookUrls,
    /// stack → lifecycle bundle filename on the file server.
    lifecycle_bundles: HashMap<String, String>,
}

impl StartMessageBuilder {
    /// Create a builder targeting the rep at `rep_addr`.
    pub fn new(
        rep_addr: &str,
        lifecycle_bundles: HashMap<String, String>,
    ) -> BuildResult<Self> {
        Ok(Self {
            hook_urls: HookUrls::new(rep_addr)?,
            lifecycle_bundles,
        })
    }

    /// Materialise one instance of a desired LRP as a start auction.
    pub fn build(
        &self,
        desired: &DesiredLrp,
        index: u32,
        file_server_url: &str,
    ) -> BuildResult<LrpStartAuction> {
        let instance_guid = Uuid::new_v4().to_string();

        let actions = if desired.actions.is_empty() {
            self.authored_program(desired, index, &instance_guid, file_server_url)?
        } else {
            substitute_placeholders(&desired.actions, file_server_url, index, &instance_guid)
        };

        Ok(LrpStartAuction {
            process_guid: desired.process_guid.clone(),
            instance_guid,
            index,
            state: AuctionState::Pending,
            memory_mb: desired.memory_mb,
            disk_mb: desired.disk_mb,
            ports: vec![PortMapping {
                container_port: CONTAINER_PORT,
            }],
            stack: desired.stack.clone(),
            log: LogConfig {
                guid: desired.log_guid.clone(),
                source_name: "App".to_string(),
                index: Some(index),
            },
            actions,
        })
    }

    /// The canonical three-step program: fetch the lifecycle bundle,
    /// fetch the droplet, then run the app under the spy's watch.
    fn authored_program(
        &self,
        desired: &DesiredLrp,
        index: u32,
        instance_guid: &str,
        file_server_url: &str,
    ) -> BuildResult<Vec<Action>> {
        let bundle_url = self.lifecycle_bundle_url(&desired.stack, file_server_url)?;

        let env = build_env(&desired.environment, &desired.process_guid, index)
            .map_err(BuildError::EnvironmentMalformed)?;

        // 0 is the "no limit requested" sentinel, never a limit of zero.
        let nofile = (desired.file_descriptors != 0).then_some(desired.file_descriptors);

        let healthy_hook = self
            .hook_urls
            .lrp_running(&desired.process_guid, index, instance_guid);

        Ok(vec![
            Action::Download {
                from: bundle_url.to_string(),
                to: CIRCUS_PATH.to_string(),
                extract: true,
                cache_key: None,
            },
            Action::Download {
                from: desired.source.clone(),
                to: ".".to_string(),
                extract: true,
                cache_key: Some(format!("droplets-{}", desired.process_guid)),
            },
            Action::Parallel {
                actions: vec![
                    Action::Run {
                        path: format!("{CIRCUS_PATH}/soldier"),
                        args: vec!["./app".to_string(), desired.start_command.clone()],
                        script: None,
                        env,
                        timeout_secs: 0,
                        resource_limits: ResourceLimits { nofile },
                    },
                    Action::Monitor {
                        action: Box::new(Action::run(
                            format!("{CIRCUS_PATH}/spy"),
                            vec![format!("-addr=:{CONTAINER_PORT}")],
                        )),
                        healthy_threshold: 1,
                        unhealthy_threshold: 1,
                        healthy_hook,
                        unhealthy_hook: None,
                    },
                ],
            },
        ])
    }

    /// Resolve the lifecycle bundle for a stack into an absolute URL on
    /// the file server.
    fn lifecycle_bundle_url(&self, stack: &str, file_server_url: &str) -> BuildResult<Url> {
        let filename = self
            .lifecycle_bundles
            .get(stack)
            .ok_or_else(|| BuildError::NoLifecycleBundle {
                stack: stack.to_string(),
            })?;

        let joined = join_url(&[file_server_url, FS_STATIC_ROUTE, filename]);
        Ok(Url::parse(&joined)?)
    }
}

/// Join URL parts with exactly one slash between each.
fn join_url(parts: &[&str]) -> String {
    let mut out = String::new();
    for part in parts {
        if out.is_empty() {
            out.push_str(part.trim_end_matches('/'));
        } else {
            out.push('/');
            out.push_str(part.trim_matches('/'));
        }
    }
    out
}
