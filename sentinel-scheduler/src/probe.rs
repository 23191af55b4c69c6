//! Single bounded-time HTTP liveness check.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, redirect::Policy};
use sentinel_core::{Result, config::ProbeConfig, models::CheckStatus};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Result of one probe. Latency is recorded whatever the status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub status: CheckStatus,
    pub response_time_ms: i32,
}

impl ProbeOutcome {
    pub fn new(status: CheckStatus, elapsed: Duration) -> Self {
        Self {
            status,
            response_time_ms: i32::try_from(elapsed.as_millis()).unwrap_or(i32::MAX),
        }
    }

    pub fn down(elapsed: Duration) -> Self {
        Self::new(CheckStatus::Down, elapsed)
    }
}

/// Anything that can tell whether a URL is reachable. Implementations
/// never fail: every problem resolves to a DOWN outcome.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, url: &str) -> ProbeOutcome;
}

/// 2xx and 3xx count as UP.
pub fn classify(status: StatusCode) -> CheckStatus {
    if status.is_success() || status.is_redirection() {
        CheckStatus::Up
    } else {
        CheckStatus::Down
    }
}

/// GET-based prober with a hard deadline.
#[derive(Clone, Debug)]
pub struct HttpProber {
    client: Client,
    timeout: Duration,
}

impl HttpProber {
    pub fn new(config: &ProbeConfig) -> Result<Self> {
        Self::with_timeout(config, config.timeout())
    }

    pub fn with_timeout(config: &ProbeConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .redirect(Policy::none())
            .connect_timeout(timeout)
            .build()?;

        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, url: &str) -> ProbeOutcome {
        let start = Instant::now();

        // Dropping the send future on timeout tears down the connection.
        let status = match tokio::time::timeout(self.timeout, self.client.get(url).send()).await {
            Ok(Ok(response)) => {
                let code = response.status();
                let status = classify(code);
                if status == CheckStatus::Down {
                    warn!(url, status_code = code.as_u16(), "probe got unsuccessful status");
                } else {
                    debug!(url, status_code = code.as_u16(), "probe succeeded");
                }
                status
            }
            Ok(Err(e)) => {
                warn!(url, error = %e, "probe request failed");
                CheckStatus::Down
            }
            Err(_) => {
                warn!(url, timeout_ms = self.timeout.as_millis() as u64, "probe timed out");
                CheckStatus::Down
            }
        };

        ProbeOutcome::new(status, start.elapsed())
    }
}
