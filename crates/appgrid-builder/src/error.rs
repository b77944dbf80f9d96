//! Builder error types.

use thiserror::Error;

/// Result type alias for builder operations.
pub type BuildResult<T> = Result<T, BuildError>;

/// Errors that can occur while building a start auction.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("no lifecycle bundle defined for stack: {stack}")]
    NoLifecycleBundle { stack: String },

    #[error("failed to parse URL: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("malformed VCAP_APPLICATION environment entry: {0}")]
    EnvironmentMalformed(serde_json::Error),
}
