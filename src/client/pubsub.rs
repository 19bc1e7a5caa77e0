//! Publishing events to a pub/sub component.

use http::Method;
use std::collections::HashMap;
use tracing::info;

use super::{require, DaprClient};
use crate::communication::http::SidecarRequest;
use crate::core::error::Result;
use crate::core::logging::LOGGER_NAME;

/// Optional knobs for [`DaprClient::publish_event_with_options`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishOptions {
    /// Overrides content-type detection.
    pub content_type: Option<String>,
    /// Component-specific metadata, e.g. `ttlInSeconds`.
    pub metadata: HashMap<String, String>,
}

/// `application/json` for bytes that parse as JSON, `text/plain` otherwise.
pub fn detect_content_type(data: &[u8]) -> &'static str {
    if serde_json::from_slice::<serde::de::IgnoredAny>(data).is_ok() {
        "application/json"
    } else {
        "text/plain"
    }
}

impl DaprClient {
    /// Publishes `data` to `topic` on the `pubsub` component.
    pub async fn publish_event(&self, pubsub: &str, topic: &str, data: &[u8]) -> Result<()> {
        self.publish_event_with_options(pubsub, topic, data, &PublishOptions::default())
            .await
    }

    pub async fn publish_event_with_options(
        &self,
        pubsub: &str,
        topic: &str,
        data: &[u8],
        options: &PublishOptions,
    ) -> Result<()> {
        require("pubsub name", pubsub)?;
        require("topic name", topic)?;
        let content_type = options
            .content_type
            .clone()
            .unwrap_or_else(|| detect_content_type(data).to_string());
        let request = SidecarRequest::new(Method::POST, ["publish", pubsub, topic])
            .metadata(&options.metadata)
            .body(content_type, data.to_vec());
        self.transport.send(request).await?;
        info!(target: LOGGER_NAME, pubsub, topic, size = data.len(), "event published");
        Ok(())
    }
}
