use std::fmt;
use std::future::Future;
use std::sync::Arc;

use reqwest::redirect::Policy;
use reqwest::Client;

use crate::{ProbeConfig, ProbeError};

/// Why one attempt produced no status code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeFailure {
    Timeout,
    Transport(String),
}

impl fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => f.write_str("attempt timed out"),
            Self::Transport(detail) => write!(f, "transport failure: {detail}"),
        }
    }
}

/// One GET against a URL, reporting the status code without following redirects.
pub trait HttpProbe: Send + Sync {
    fn get(&self, url: &str) -> impl Future<Output = Result<u16, ProbeFailure>> + Send;
}

impl<P> HttpProbe for Arc<P>
where
    P: HttpProbe,
{
    fn get(&self, url: &str) -> impl Future<Output = Result<u16, ProbeFailure>> + Send {
        self.as_ref().get(url)
    }
}

#[derive(Debug, Clone)]
pub struct ReqwestProbe {
    client: Client,
}

impl ReqwestProbe {
    /// Local sites present self-signed certificates, so validation is off.
    pub fn new(config: &ProbeConfig) -> Result<Self, ProbeError> {
        let mut builder = Client::builder()
            .danger_accept_invalid_certs(true)
            .redirect(Policy::none())
            .timeout(config.attempt_timeout)
            .connect_timeout(config.attempt_timeout);
        for (host, addr) in &config.resolve {
            builder = builder.resolve(host, *addr);
        }
        let client = builder
            .build()
            .map_err(|error| ProbeError::Client(error.to_string()))?;
        Ok(Self { client })
    }
}

impl HttpProbe for ReqwestProbe {
    async fn get(&self, url: &str) -> Result<u16, ProbeFailure> {
        match self.client.get(url).send().await {
            Ok(response) => Ok(response.status().as_u16()),
            Err(error) if error.is_timeout() => Err(ProbeFailure::Timeout),
            Err(error) => Err(ProbeFailure::Transport(error.to_string())),
        }
    }
}
