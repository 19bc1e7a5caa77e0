//! Secret store reads.

use http::Method;
use std::collections::HashMap;
use tracing::debug;

use super::{require, DaprClient};
use crate::communication::http::SidecarRequest;
use crate::core::error::Result;
use crate::core::logging::LOGGER_NAME;

impl DaprClient {
    /// Fetches one secret; stores may return several values per key.
    pub async fn get_secret(
        &self,
        store: &str,
        key: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<HashMap<String, String>> {
        require("secret store name", store)?;
        require("secret key", key)?;
        let request = SidecarRequest::new(Method::GET, ["secrets", store, key]).metadata(metadata);
        let response = self.transport.send(request).await?;
        let values: HashMap<String, String> = serde_json::from_slice(&response.body)?;
        // Values are never logged.
        debug!(target: LOGGER_NAME, store, key, count = values.len(), "secret read");
        Ok(values)
    }

    /// Fetches every secret the store allows this app to read.
    pub async fn get_bulk_secret(
        &self,
        store: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<HashMap<String, HashMap<String, String>>> {
        require("secret store name", store)?;
        let request = SidecarRequest::new(Method::GET, ["secrets", store, "bulk"]).metadata(metadata);
        let response = self.transport.send(request).await?;
        let secrets: HashMap<String, HashMap<String, String>> = serde_json::from_slice(&response.body)?;
        debug!(target: LOGGER_NAME, store, count = secrets.len(), "bulk secrets read");
        Ok(secrets)
    }
}
