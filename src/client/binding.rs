//! Output bindings.

use http::Method;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::info;

use super::state::encode_value;
use super::{require, DaprClient};
use crate::communication::http::SidecarRequest;
use crate::core::error::Result;
use crate::core::logging::LOGGER_NAME;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvokeBindingRequest {
    /// Binding component name.
    pub name: String,
    /// Operation understood by the component, e.g. `create`.
    pub operation: String,
    pub data: Vec<u8>,
    pub metadata: HashMap<String, String>,
}

impl InvokeBindingRequest {
    pub fn new(name: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            operation: operation.into(),
            ..Self::default()
        }
    }
}

/// What a binding returned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingEvent {
    pub data: Vec<u8>,
    /// Read from `metadata.*` response headers, so keys are lowercase.
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
struct WireBinding<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    metadata: HashMap<String, String>,
    operation: &'a str,
}

impl<'a> WireBinding<'a> {
    fn from_request(request: &'a InvokeBindingRequest) -> Result<Self> {
        require("binding name", &request.name)?;
        require("binding operation", &request.operation)?;
        let data = if request.data.is_empty() {
            None
        } else {
            Some(encode_value(&request.data)?)
        };
        Ok(Self {
            data,
            metadata: request.metadata.clone(),
            operation: &request.operation,
        })
    }
}

impl DaprClient {
    /// Invokes a binding and returns its response.
    pub async fn invoke_binding(&self, request: &InvokeBindingRequest) -> Result<BindingEvent> {
        let body = WireBinding::from_request(request)?;
        let call = SidecarRequest::new(Method::POST, ["bindings", request.name.as_str()]).json(&body)?;
        let response = self.transport.send(call).await?;
        info!(target: LOGGER_NAME, binding = %request.name, operation = %request.operation, "binding invoked");
        Ok(BindingEvent {
            data: response.body.to_vec(),
            metadata: response.metadata(),
        })
    }

    /// Invokes a binding, discarding whatever it returns.
    pub async fn invoke_output_binding(&self, request: &InvokeBindingRequest) -> Result<()> {
        self.invoke_binding(request).await.map(|_| ())
    }
}
