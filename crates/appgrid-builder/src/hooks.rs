//! Health-hook URL rendering against the rep's route table.

use appgrid_models::HealthHook;
use url::Url;

/// One entry of the rep route table.
struct Route {
    method: &'static str,
    path: &'static str,
}

/// Callback the container host invokes when an instance becomes healthy.
const LRP_RUNNING: Route = Route {
    method: "PUT",
    path: "/lrp_running/:process_guid/:index/:instance_guid",
};

/// Renders health-hook URLs for the downstream rep service.
#[derive(Debug, Clone)]
pub struct HookUrls {
    base: Url,
}

impl HookUrls {
    /// Build a generator for a rep at `host:port`.
    pub fn new(rep_addr: &str) -> Result<Self, url::ParseError> {
        let base = Url::parse(&format!("http://{rep_addr}"))?;
        Ok(Self { base })
    }

    /// Render the healthy hook for one instance.
    pub fn lrp_running(&self, process_guid: &str, index: u32, instance_guid: &str) -> HealthHook {
        let path = LRP_RUNNING
            .path
            .replace(":process_guid", process_guid)
            .replace(":index", &index.to_string())
            .replace(":instance_guid", instance_guid);

        HealthHook {
            method: LRP_RUNNING.method.to_string(),
            url: format!("{}{}", self.base.as_str().trim_end_matches('/'), path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_the_lrp_running_route() {
        let hooks = HookUrls::new("127.0.0.1:20515").unwrap();
        let hook = hooks.lrp_running("process-guid", 2, "instance-guid");

        assert_eq!(hook.method, "PUT");
        assert_eq!(
            hook.url,
            "http://127.0.0.1:20515/lrp_running/process-guid/2/instance-guid"
        );
    }

    #[test]
    fn rejects_unparseable_rep_addr() {
        assert!(HookUrls::new("not a host").is_err());
    }
}
