use std::collections::{BTreeMap, BTreeSet};
use std::net::SocketAddr;
use std::time::Duration;

use crate::ProbeError;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 7;
pub const DEFAULT_RETRYABLE_STATUS_CODES: [u16; 3] = [400, 404, 502];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    pub max_attempts: u32,
    pub retryable_status_codes: BTreeSet<u16>,
    /// Upper bound on one GET, connect included.
    pub attempt_timeout: Duration,
    /// Attempt `n` waits `n * retry_backoff` before attempt `n + 1`.
    pub retry_backoff: Duration,
    /// Host name to socket address overrides applied instead of DNS.
    pub resolve: BTreeMap<String, SocketAddr>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retryable_status_codes: DEFAULT_RETRYABLE_STATUS_CODES.into_iter().collect(),
            attempt_timeout: Duration::from_secs(10),
            retry_backoff: Duration::from_millis(500),
            resolve: BTreeMap::new(),
        }
    }
}

impl ProbeConfig {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_retry_backoff(mut self, retry_backoff: Duration) -> Self {
        self.retry_backoff = retry_backoff;
        self
    }

    pub fn with_resolve(mut self, host: impl Into<String>, addr: SocketAddr) -> Self {
        self.resolve.insert(host.into(), addr);
        self
    }

    pub fn is_retryable(&self, status: u16) -> bool {
        self.retryable_status_codes.contains(&status)
    }

    pub fn validate(&self) -> Result<(), ProbeError> {
        if self.max_attempts == 0 {
            return Err(ProbeError::InvalidConfig(
                "max_attempts must be greater than zero".to_string(),
            ));
        }
        if self.attempt_timeout.is_zero() {
            return Err(ProbeError::InvalidConfig(
                "attempt_timeout must be greater than zero".to_string(),
            ));
        }
        if let Some(code) = self
            .retryable_status_codes
            .iter()
            .find(|code| !(100..=599).contains(*code))
        {
            return Err(ProbeError::InvalidConfig(format!(
                "retryable_status_codes contains {code}, which is not an HTTP status"
            )));
        }
        Ok(())
    }
}
