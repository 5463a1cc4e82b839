mod config;
mod probe;
mod prober;

use thiserror::Error;

pub use config::{ProbeConfig, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRYABLE_STATUS_CODES};
pub use probe::{HttpProbe, ProbeFailure, ReqwestProbe};
pub use prober::{scan_urls, ReadinessProber, ReadinessResult};

/// Setup failures. Unreachable endpoints are verdicts, never errors.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("invalid probe configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}
