//! appgrid-builder — materialises desired LRPs into start auctions.
//!
//! Given a desired LRP and an instance index, the builder produces a
//! fully populated [`appgrid_models::LrpStartAuction`]: a fresh instance
//! guid, the download/run/monitor action program, the assembled
//! environment, and the health-hook callback URL.
//!
//! Two dialects are supported. When the declaration carries no action
//! program the builder authors the canonical three-step program itself;
//! when the declaration supplies its own program, per-instance
//! placeholders inside it are substituted instead.

pub mod builder;
pub mod env;
pub mod error;
pub mod hooks;
pub mod placeholder;

pub use builder::StartMessageBuilder;
pub use env::build_env;
pub use error::{BuildError, BuildResult};
pub use hooks::HookUrls;
pub use placeholder::substitute_placeholders;
