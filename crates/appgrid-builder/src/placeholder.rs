//! Per-instance placeholder substitution for pre-authored programs.
//!
//! Declarations in the forward dialect carry their own action tree with
//! placeholder tokens where per-instance values belong. Substitution is
//! textual and applies to download source URLs and health-hook URLs,
//! recursing through `Parallel` and `Monitor` nodes.

use appgrid_models::{Action, HealthHook};

pub const PLACEHOLDER_FILESERVER_URL: &str = "PLACEHOLDER_FILESERVER_URL";
pub const PLACEHOLDER_INSTANCE_INDEX: &str = "PLACEHOLDER_INSTANCE_INDEX";
pub const PLACEHOLDER_INSTANCE_GUID: &str = "PLACEHOLDER_INSTANCE_GUID";

/// Substitute all placeholders in a pre-authored action program.
pub fn substitute_placeholders(
    actions: &[Action],
    file_server_url: &str,
    index: u32,
    instance_guid: &str,
) -> Vec<Action> {
    let file_server_url = file_server_url.trim_end_matches('/');
    let index = index.to_string();
    actions
        .iter()
        .map(|a| substitute_action(a, file_server_url, &index, instance_guid))
        .collect()
}

fn substitute_action(
    action: &Action,
    file_server_url: &str,
    index: &str,
    instance_guid: &str,
) -> Action {
    let fill = |s: &str| {
        s.replace(PLACEHOLDER_FILESERVER_URL, file_server_url)
            .replace(PLACEHOLDER_INSTANCE_INDEX, index)
            .replace(PLACEHOLDER_INSTANCE_GUID, instance_guid)
    };

    match action {
        Action::Download {
            from,
            to,
            extract,
            cache_key,
        } => Action::Download {
            from: fill(from),
            to: to.clone(),
            extract: *extract,
            cache_key: cache_key.clone(),
        },
        Action::Run { .. } => action.clone(),
        Action::Monitor {
            action: inner,
            healthy_threshold,
            unhealthy_threshold,
            healthy_hook,
            unhealthy_hook,
        } => Action::Monitor {
            action: Box::new(substitute_action(inner, file_server_url, index, instance_guid)),
            healthy_threshold: *healthy_threshold,
            unhealthy_threshold: *unhealthy_threshold,
            healthy_hook: HealthHook {
                method: healthy_hook.method.clone(),
                url: fill(&healthy_hook.url),
            },
            unhealthy_hook: unhealthy_hook.as_ref().map(|hook| HealthHook {
                method: hook.method.clone(),
                url: fill(&hook.url),
            }),
        },
        Action::Parallel { actions } => Action::Parallel {
            actions: actions
                .iter()
                .map(|a| substitute_action(a, file_server_url, index, instance_guid))
                .collect(),
        },
    }
}
