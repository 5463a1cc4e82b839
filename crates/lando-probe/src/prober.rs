use futures::future::join_all;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::probe::{HttpProbe, ProbeFailure, ReqwestProbe};
use crate::{ProbeConfig, ProbeError};

/// Final verdict for one URL. Serializes as `{url, status}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadinessResult {
    pub url: String,
    #[serde(rename = "status")]
    pub reachable: bool,
    #[serde(skip_serializing)]
    pub attempts: u32,
}

pub struct ReadinessProber<P = ReqwestProbe> {
    probe: P,
    config: ProbeConfig,
}

impl ReadinessProber<ReqwestProbe> {
    pub fn new(config: ProbeConfig) -> Result<Self, ProbeError> {
        config.validate()?;
        let probe = ReqwestProbe::new(&config)?;
        Ok(Self { probe, config })
    }
}

impl<P> ReadinessProber<P>
where
    P: HttpProbe,
{
    pub fn with_probe(probe: P, config: ProbeConfig) -> Result<Self, ProbeError> {
        config.validate()?;
        Ok(Self { probe, config })
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Probes every URL concurrently. Results come back in input order.
    pub async fn scan_urls<I, S>(&self, urls: I) -> Vec<ReadinessResult>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let urls: Vec<String> = urls.into_iter().map(|url| url.as_ref().to_string()).collect();
        join_all(urls.iter().map(|url| self.probe_url(url))).await
    }

    /// Like [`Self::scan_urls`], but URLs still in flight when `shutdown`
    /// flips to `true` are dropped from the result instead of given a verdict.
    pub async fn scan_urls_until<I, S>(
        &self,
        urls: I,
        shutdown: watch::Receiver<bool>,
    ) -> Vec<ReadinessResult>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let urls: Vec<String> = urls.into_iter().map(|url| url.as_ref().to_string()).collect();
        let scans = urls.iter().map(|url| {
            let shutdown = shutdown.clone();
            async move {
                if *shutdown.borrow() {
                    return None;
                }
                tokio::select! {
                    biased;
                    _ = shutdown_requested(shutdown) => {
                        debug!(url = %url, "probe abandoned on shutdown");
                        None
                    }
                    result = self.probe_url(url) => Some(result),
                }
            }
        });
        join_all(scans).await.into_iter().flatten().collect()
    }

    /// Runs the retry loop for one URL. Attempts are strictly sequential.
    pub async fn probe_url(&self, url: &str) -> ReadinessResult {
        let max_attempts = self.config.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            let outcome =
                match tokio::time::timeout(self.config.attempt_timeout, self.probe.get(url)).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(ProbeFailure::Timeout),
                };

            match outcome {
                Ok(status) if !self.config.is_retryable(status) => {
                    info!(url, status, attempt, "endpoint is ready");
                    return ReadinessResult {
                        url: url.to_string(),
                        reachable: true,
                        attempts: attempt,
                    };
                }
                Ok(status) => {
                    debug!(url, status, attempt, "endpoint answered with a retryable status")
                }
                Err(failure) => debug!(url, attempt, %failure, "endpoint attempt failed"),
            }

            if attempt < max_attempts && !self.config.retry_backoff.is_zero() {
                tokio::time::sleep(self.config.retry_backoff * attempt).await;
            }
        }

        warn!(url, attempts = max_attempts, "endpoint never became ready");
        ReadinessResult {
            url: url.to_string(),
            reachable: false,
            attempts: max_attempts,
        }
    }
}

/// One-shot scan with a reqwest-backed prober.
pub async fn scan_urls<I, S>(
    urls: I,
    config: ProbeConfig,
) -> Result<Vec<ReadinessResult>, ProbeError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let prober = ReadinessProber::new(config)?;
    Ok(prober.scan_urls(urls).await)
}

async fn shutdown_requested(mut shutdown: watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        // Sender gone without a shutdown: never cancel.
        std::future::pending::<()>().await;
    }
}
