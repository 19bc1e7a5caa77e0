//! Service invocation through the sidecar.

use http::Method;
use tracing::info;

use super::{require, DaprClient};
use crate::communication::http::SidecarRequest;
use crate::core::error::{Error, Result};
use crate::core::logging::LOGGER_NAME;

/// Payload of an invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataContent {
    pub content_type: String,
    pub data: Vec<u8>,
}

impl DataContent {
    pub fn new(content_type: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            content_type: content_type.into(),
            data: data.into(),
        }
    }
}

/// Parses a case-insensitive HTTP verb such as `post`.
pub fn parse_verb(verb: &str) -> Result<Method> {
    require("verb", verb)?;
    Method::from_bytes(verb.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| Error::invalid(format!("unsupported verb {verb:?}")))
}

/// Route segments for `method`, which may contain `/` and a `?query`.
fn method_request(verb: Method, app_id: &str, method: &str) -> Result<SidecarRequest> {
    let (path, query) = match method.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (method, None),
    };
    let mut segments = vec!["invoke".to_string(), app_id.to_string(), "method".to_string()];
    segments.extend(path.split('/').filter(|s| !s.is_empty()).map(str::to_string));
    if segments.len() == 3 {
        return Err(Error::invalid(format!("method name required, got {method:?}")));
    }
    let mut request = SidecarRequest::new(verb, segments);
    if let Some(query) = query {
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            request = request.query(k, v);
        }
    }
    Ok(request)
}

impl DaprClient {
    /// Invokes `method` on `app_id` without a body and returns the response body.
    pub async fn invoke_method(&self, app_id: &str, method: &str, verb: &str) -> Result<Vec<u8>> {
        self.invoke(app_id, method, verb, None).await
    }

    /// Invokes `method` on `app_id` with `content` and returns the response body.
    pub async fn invoke_method_with_content(
        &self,
        app_id: &str,
        method: &str,
        verb: &str,
        content: &DataContent,
    ) -> Result<Vec<u8>> {
        self.invoke(app_id, method, verb, Some(content)).await
    }

    async fn invoke(
        &self,
        app_id: &str,
        method: &str,
        verb: &str,
        content: Option<&DataContent>,
    ) -> Result<Vec<u8>> {
        require("app id", app_id)?;
        require("method name", method)?;
        let verb = parse_verb(verb)?;
        let mut request = method_request(verb, app_id, method)?;
        if let Some(content) = content {
            request = request.body(content.content_type.clone(), content.data.clone());
        }
        let response = self.transport.send(request).await?;
        info!(target: LOGGER_NAME, app_id, method, size = response.body.len(), "service method invoked");
        Ok(response.body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbs_are_case_insensitive() {
        assert_eq!(parse_verb("post").unwrap(), Method::POST);
        assert_eq!(parse_verb("Get").unwrap(), Method::GET);
        assert!(matches!(parse_verb(""), Err(Error::InvalidArgument(_))));
        assert!(matches!(parse_verb("not a verb"), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn nested_methods_and_queries_are_split() {
        let request = method_request(Method::GET, "orders", "api/v1/items?limit=5&sort=").unwrap();
        assert_eq!(request.path(), "/v1.0/invoke/orders/method/api/v1/items");
        assert_eq!(request.method(), Method::GET);
    }

    #[test]
    fn methods_without_a_path_are_rejected() {
        for method in ["/", "?x=1", "//?a=b"] {
            assert!(
                matches!(method_request(Method::GET, "orders", method), Err(Error::InvalidArgument(_))),
                "{method:?}"
            );
        }
    }
}
