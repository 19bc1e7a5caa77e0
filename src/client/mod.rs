//! Sidecar client.
//!
//! [`DaprClient`] is a cheap-to-clone handle. Operations are grouped by
//! building block in the submodules; each validates its arguments before
//! anything goes on the wire.

pub mod binding;
pub mod invoke;
pub mod pubsub;
pub mod secret;
pub mod state;

use http::Method;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::communication::http::{SidecarRequest, SidecarTransport};
use crate::core::config::ClientConfig;
use crate::core::error::{Error, Result};
use crate::core::logging::LOGGER_NAME;

/// Delay between sidecar readiness probes.
pub const HEALTH_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct DaprClient {
    transport: SidecarTransport,
}

impl DaprClient {
    /// Builds a client without contacting the sidecar.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            transport: SidecarTransport::new(&config),
        }
    }

    /// Builds a client and waits until the sidecar reports healthy.
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let timeout = config.timeout;
        let client = Self::new(config);
        info!(target: LOGGER_NAME, endpoint = %client.transport.endpoint(), "connecting to sidecar");
        client.wait_for_sidecar(timeout).await?;
        Ok(client)
    }

    /// [`connect`](Self::connect) with configuration read from the environment.
    pub async fn from_env() -> Result<Self> {
        Self::connect(ClientConfig::from_env()?).await
    }

    pub fn transport(&self) -> &SidecarTransport {
        &self.transport
    }

    /// Polls the sidecar's outbound health endpoint until it answers with a
    /// success status or `timeout` elapses.
    pub async fn wait_for_sidecar(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::Timeout(timeout));
            }
            let probe = SidecarRequest::new(Method::GET, ["healthz", "outbound"]);
            match self.transport.send_with_timeout(probe, remaining).await {
                Ok(_) => {
                    debug!(target: LOGGER_NAME, attempts, "sidecar is ready");
                    return Ok(());
                }
                Err(e) => {
                    debug!(target: LOGGER_NAME, attempts, error = %e, "sidecar not ready yet");
                }
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            tokio::time::sleep(HEALTH_POLL_INTERVAL.min(remaining)).await;
        }
    }

    /// Asks the sidecar to shut down.
    pub async fn shutdown(&self) -> Result<()> {
        self.transport
            .send(SidecarRequest::new(Method::POST, ["shutdown"]))
            .await?;
        info!(target: LOGGER_NAME, "sidecar shutdown requested");
        Ok(())
    }
}

/// Rejects empty required arguments.
pub(crate) fn require(what: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::invalid(format!("{what} required")));
    }
    Ok(())
}
