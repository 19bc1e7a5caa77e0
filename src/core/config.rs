//! Client configuration, read from the same environment variables the
//! sidecar injects into application processes.

use secrecy::SecretString;
use std::time::Duration;
use url::Url;

use crate::core::error::{Error, Result};

pub const ENV_HTTP_ENDPOINT: &str = "DAPR_HTTP_ENDPOINT";
pub const ENV_HTTP_PORT: &str = "DAPR_HTTP_PORT";
pub const ENV_API_TOKEN: &str = "DAPR_API_TOKEN";
pub const ENV_CLIENT_TIMEOUT: &str = "DAPR_CLIENT_TIMEOUT_SECONDS";

pub const DEFAULT_HTTP_PORT: u16 = 3500;
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Where the sidecar lives and how to talk to it.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the sidecar HTTP API, without the `/v1.0` prefix.
    pub endpoint: Url,
    /// Sent as `dapr-api-token` when set.
    pub api_token: Option<SecretString>,
    /// Upper bound for each request and for the sidecar readiness wait.
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: local_endpoint(DEFAULT_HTTP_PORT),
            api_token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ClientConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through an arbitrary variable lookup.
    ///
    /// Empty values count as unset. `DAPR_HTTP_ENDPOINT` wins over
    /// `DAPR_HTTP_PORT`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let endpoint = match (get(ENV_HTTP_ENDPOINT), get(ENV_HTTP_PORT)) {
            (Some(raw), _) => parse_endpoint(&raw)?,
            (None, Some(port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|e| Error::Config(format!("{ENV_HTTP_PORT}={port:?}: {e}")))?;
                local_endpoint(port)
            }
            (None, None) => local_endpoint(DEFAULT_HTTP_PORT),
        };

        let timeout = match get(ENV_CLIENT_TIMEOUT) {
            Some(secs) => {
                let secs = secs
                    .parse::<u64>()
                    .map_err(|e| Error::Config(format!("{ENV_CLIENT_TIMEOUT}={secs:?}: {e}")))?;
                if secs == 0 {
                    return Err(Error::Config(format!("{ENV_CLIENT_TIMEOUT} must be positive")));
                }
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        Ok(Self {
            endpoint,
            api_token: get(ENV_API_TOKEN).map(SecretString::from),
            timeout,
        })
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Result<Self> {
        self.endpoint = parse_endpoint(endpoint)?;
        Ok(self)
    }

    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(SecretString::from(token.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn local_endpoint(port: u16) -> Url {
    Url::parse(&format!("http://127.0.0.1:{port}")).expect("loopback URL with a u16 port always parses")
}

/// Accepts `http://host:port` style URLs. HTTPS is refused since the
/// transport only speaks plain HTTP/1.
fn parse_endpoint(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| Error::Config(format!("endpoint {raw:?}: {e}")))?;
    if url.scheme() != "http" {
        return Err(Error::Config(format!(
            "endpoint {raw:?}: unsupported scheme {:?}",
            url.scheme()
        )));
    }
    if url.host_str().is_none() {
        return Err(Error::Config(format!("endpoint {raw:?}: missing host")));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let cfg = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.endpoint.as_str(), "http://127.0.0.1:3500/");
        assert!(cfg.api_token.is_none());
        assert_eq!(cfg.timeout, Duration::from_secs(5));
    }

    #[test]
    fn port_and_token_are_read() {
        let cfg = ClientConfig::from_lookup(lookup(&[
            (ENV_HTTP_PORT, "3600"),
            (ENV_API_TOKEN, "s3cret"),
            (ENV_CLIENT_TIMEOUT, "12"),
        ]))
        .unwrap();
        assert_eq!(cfg.endpoint.port(), Some(3600));
        assert_eq!(cfg.api_token.unwrap().expose_secret(), "s3cret");
        assert_eq!(cfg.timeout, Duration::from_secs(12));
    }

    #[test]
    fn endpoint_overrides_port() {
        let cfg = ClientConfig::from_lookup(lookup(&[
            (ENV_HTTP_ENDPOINT, "http://sidecar.local:4000"),
            (ENV_HTTP_PORT, "3600"),
        ]))
        .unwrap();
        assert_eq!(cfg.endpoint.host_str(), Some("sidecar.local"));
        assert_eq!(cfg.endpoint.port(), Some(4000));
    }

    #[test]
    fn empty_values_count_as_unset() {
        let cfg = ClientConfig::from_lookup(lookup(&[(ENV_HTTP_PORT, "  "), (ENV_API_TOKEN, "")])).unwrap();
        assert_eq!(cfg.endpoint.port(), Some(DEFAULT_HTTP_PORT));
        assert!(cfg.api_token.is_none());
    }

    #[test]
    fn bad_values_are_config_errors() {
        for vars in [
            vec![(ENV_HTTP_PORT, "not-a-port")],
            vec![(ENV_HTTP_PORT, "70000")],
            vec![(ENV_CLIENT_TIMEOUT, "0")],
            vec![(ENV_HTTP_ENDPOINT, "https://secure:443")],
            vec![(ENV_HTTP_ENDPOINT, "sidecar:3500")],
        ] {
            let err = ClientConfig::from_lookup(lookup(&vars)).unwrap_err();
            assert!(matches!(err, Error::Config(_)), "{vars:?} gave {err:?}");
        }
    }
}
