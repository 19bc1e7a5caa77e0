//! State store operations.
//!
//! Values travel as JSON inside the sidecar API. Bytes that already are JSON
//! are sent as-is, other UTF-8 text is sent as a JSON string, and a stored
//! JSON string is handed back as its text. Etags are opaque and passed
//! through untouched.
//!
//! Two inputs do not round-trip byte for byte. Text that is itself a JSON
//! string literal (`"hi"`, quotes included) is stored as that string and
//! read back as `hi`. The bytes `null` are stored as JSON `null`, which a
//! bulk read returns as an empty value.

use http::header::{ETAG, IF_MATCH};
use http::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info};

use super::{require, DaprClient};
use crate::communication::http::SidecarRequest;
use crate::core::error::{Error, Result};
use crate::core::logging::LOGGER_NAME;

/// Concurrency token of a stored item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ETag {
    pub value: String,
}

impl ETag {
    pub fn new(value: impl Into<String>) -> Self {
        Self { value: value.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StateConcurrency {
    #[default]
    Undefined,
    FirstWrite,
    LastWrite,
}

impl StateConcurrency {
    pub fn as_wire(&self) -> Option<&'static str> {
        match self {
            StateConcurrency::Undefined => None,
            StateConcurrency::FirstWrite => Some("first-write"),
            StateConcurrency::LastWrite => Some("last-write"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StateConsistency {
    #[default]
    Undefined,
    Eventual,
    Strong,
}

impl StateConsistency {
    pub fn as_wire(&self) -> Option<&'static str> {
        match self {
            StateConsistency::Undefined => None,
            StateConsistency::Eventual => Some("eventual"),
            StateConsistency::Strong => Some("strong"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StateOptions {
    pub concurrency: StateConcurrency,
    pub consistency: StateConsistency,
}

impl StateOptions {
    fn to_wire(self) -> Option<WireOptions> {
        let wire = WireOptions {
            concurrency: self.concurrency.as_wire(),
            consistency: self.consistency.as_wire(),
        };
        (wire.concurrency.is_some() || wire.consistency.is_some()).then_some(wire)
    }

    fn apply_query(self, mut request: SidecarRequest) -> SidecarRequest {
        if let Some(c) = self.concurrency.as_wire() {
            request = request.query("concurrency", c);
        }
        if let Some(c) = self.consistency.as_wire() {
            request = request.query("consistency", c);
        }
        request
    }
}

/// An item read from a store. A missing key yields an empty value and no etag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateItem {
    pub key: String,
    pub value: Vec<u8>,
    pub etag: Option<String>,
    /// Read from `metadata.*` response headers, so keys are lowercase.
    pub metadata: HashMap<String, String>,
}

impl StateItem {
    pub fn is_empty(&self) -> bool {
        self.value.is_empty() && self.etag.is_none()
    }
}

/// One entry of a bulk read; `error` is set when the store failed that key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkStateItem {
    pub key: String,
    pub value: Vec<u8>,
    pub etag: Option<String>,
    /// Taken from the JSON body; keys keep the case the store used.
    pub metadata: HashMap<String, String>,
    pub error: Option<String>,
}

/// An item to write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetStateItem {
    pub key: String,
    pub value: Vec<u8>,
    pub etag: Option<ETag>,
    pub metadata: HashMap<String, String>,
    pub options: Option<StateOptions>,
}

impl SetStateItem {
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            ..Self::default()
        }
    }
}

/// An item to delete inside a transaction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteStateItem {
    pub key: String,
    pub etag: Option<ETag>,
    pub metadata: HashMap<String, String>,
    pub options: Option<StateOptions>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StateOperation {
    Upsert(SetStateItem),
    Delete(DeleteStateItem),
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct WireOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    concurrency: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    consistency: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct WireStateItem<'a> {
    key: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    etag: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<&'a HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<WireOptions>,
}

impl<'a> WireStateItem<'a> {
    fn upsert(item: &'a SetStateItem) -> Result<Self> {
        require("state key", &item.key)?;
        Ok(Self {
            key: &item.key,
            value: Some(encode_value(&item.value)?),
            etag: item.etag.as_ref().map(|e| e.value.as_str()),
            metadata: non_empty(&item.metadata),
            options: item.options.and_then(StateOptions::to_wire),
        })
    }

    fn delete(item: &'a DeleteStateItem) -> Result<Self> {
        require("state key", &item.key)?;
        Ok(Self {
            key: &item.key,
            value: None,
            etag: item.etag.as_ref().map(|e| e.value.as_str()),
            metadata: non_empty(&item.metadata),
            options: item.options.and_then(StateOptions::to_wire),
        })
    }
}

#[derive(Debug, Serialize)]
struct WireOperation<'a> {
    operation: &'static str,
    request: WireStateItem<'a>,
}

#[derive(Debug, Serialize)]
struct WireTransaction<'a> {
    operations: Vec<WireOperation<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<&'a HashMap<String, String>>,
}

#[derive(Debug, Serialize)]
struct WireBulkGet<'a> {
    keys: &'a [String],
    parallelism: u32,
}

#[derive(Debug, Deserialize)]
struct WireBulkItem {
    key: String,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    etag: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
    #[serde(default)]
    error: Option<String>,
}

fn non_empty(map: &HashMap<String, String>) -> Option<&HashMap<String, String>> {
    (!map.is_empty()).then_some(map)
}

/// JSON form of a state value.
pub fn encode_value(data: &[u8]) -> Result<Value> {
    if let Ok(json) = serde_json::from_slice::<Value>(data) {
        return Ok(json);
    }
    std::str::from_utf8(data)
        .map(|text| Value::String(text.to_string()))
        .map_err(|_| Error::invalid("state value is neither JSON nor UTF-8 text"))
}

/// Bytes of a stored value as returned by the sidecar.
pub fn decode_value(body: &[u8]) -> Vec<u8> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::String(text)) => text.into_bytes(),
        _ => body.to_vec(),
    }
}

fn value_bytes(value: Option<Value>) -> Vec<u8> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(text)) => text.into_bytes(),
        Some(other) => other.to_string().into_bytes(),
    }
}

impl DaprClient {
    /// Saves `data` under `key`.
    pub async fn save_state(&self, store: &str, key: &str, data: &[u8]) -> Result<()> {
        self.save_bulk_state(store, &[SetStateItem::new(key, data)]).await
    }

    /// Saves several items in one request.
    pub async fn save_bulk_state(&self, store: &str, items: &[SetStateItem]) -> Result<()> {
        require("store name", store)?;
        if items.is_empty() {
            return Err(Error::invalid("at least one state item required"));
        }
        let wire = items
            .iter()
            .map(WireStateItem::upsert)
            .collect::<Result<Vec<_>>>()?;
        let request = SidecarRequest::new(Method::POST, ["state", store]).json(&wire)?;
        self.transport.send(request).await?;
        info!(target: LOGGER_NAME, store, count = items.len(), "state saved");
        Ok(())
    }

    pub async fn get_state(&self, store: &str, key: &str) -> Result<StateItem> {
        self.get_state_with_consistency(store, key, StateConsistency::Undefined, &HashMap::new())
            .await
    }

    pub async fn get_state_with_consistency(
        &self,
        store: &str,
        key: &str,
        consistency: StateConsistency,
        metadata: &HashMap<String, String>,
    ) -> Result<StateItem> {
        require("store name", store)?;
        require("state key", key)?;
        let mut request = SidecarRequest::new(Method::GET, ["state", store, key]);
        if let Some(c) = consistency.as_wire() {
            request = request.query("consistency", c);
        }
        let response = self.transport.send(request.metadata(metadata)).await?;

        let etag = response.header_str(ETAG.as_str()).map(str::to_string);
        let item = StateItem {
            key: key.to_string(),
            value: decode_value(&response.body),
            etag,
            metadata: response.metadata(),
        };
        debug!(target: LOGGER_NAME, store, key, found = !item.is_empty(), "state read");
        Ok(item)
    }

    /// Reads several keys at once; `parallelism` bounds the sidecar's fan-out.
    pub async fn get_bulk_state(
        &self,
        store: &str,
        keys: &[String],
        parallelism: u32,
        metadata: &HashMap<String, String>,
    ) -> Result<Vec<BulkStateItem>> {
        require("store name", store)?;
        if keys.is_empty() {
            return Err(Error::invalid("at least one key required"));
        }
        let body = WireBulkGet { keys, parallelism };
        let request = SidecarRequest::new(Method::POST, ["state", store, "bulk"])
            .metadata(metadata)
            .json(&body)?;
        let response = self.transport.send(request).await?;
        let items: Vec<WireBulkItem> = serde_json::from_slice(&response.body)?;
        Ok(items
            .into_iter()
            .map(|item| BulkStateItem {
                key: item.key,
                value: value_bytes(item.data),
                etag: item.etag,
                metadata: item.metadata,
                error: item.error.filter(|e| !e.is_empty()),
            })
            .collect())
    }

    pub async fn delete_state(&self, store: &str, key: &str) -> Result<()> {
        self.delete_state_with_etag(store, key, None, &HashMap::new(), None)
            .await
    }

    /// Deletes `key`, guarded by `etag` when given.
    pub async fn delete_state_with_etag(
        &self,
        store: &str,
        key: &str,
        etag: Option<&ETag>,
        metadata: &HashMap<String, String>,
        options: Option<StateOptions>,
    ) -> Result<()> {
        require("store name", store)?;
        require("state key", key)?;
        let mut request = SidecarRequest::new(Method::DELETE, ["state", store, key]);
        if let Some(opts) = options {
            request = opts.apply_query(request);
        }
        request = request.metadata(metadata);
        if let Some(etag) = etag {
            request = request.header(IF_MATCH, etag.value.clone());
        }
        self.transport.send(request).await?;
        info!(target: LOGGER_NAME, store, key, "state deleted");
        Ok(())
    }

    /// Applies upserts and deletes atomically, if the store supports it.
    pub async fn execute_state_transaction(
        &self,
        store: &str,
        metadata: &HashMap<String, String>,
        operations: &[StateOperation],
    ) -> Result<()> {
        require("store name", store)?;
        if operations.is_empty() {
            return Err(Error::invalid("at least one operation required"));
        }
        let operations = operations
            .iter()
            .map(|op| {
                Ok(match op {
                    StateOperation::Upsert(item) => WireOperation {
                        operation: "upsert",
                        request: WireStateItem::upsert(item)?,
                    },
                    StateOperation::Delete(item) => WireOperation {
                        operation: "delete",
                        request: WireStateItem::delete(item)?,
                    },
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let count = operations.len();
        let body = WireTransaction {
            operations,
            metadata: non_empty(metadata),
        };
        let request = SidecarRequest::new(Method::POST, ["state", store, "transaction"]).json(&body)?;
        self.transport.send(request).await?;
        info!(target: LOGGER_NAME, store, count, "state transaction committed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn values_are_sent_as_json_when_possible() {
        assert_eq!(encode_value(br#"{ "message": "hello" }"#).unwrap(), json!({"message": "hello"}));
        assert_eq!(encode_value(b"42").unwrap(), json!(42));
        assert_eq!(encode_value(b"ping").unwrap(), json!("ping"));
        assert_eq!(encode_value(b"").unwrap(), json!(""));
        assert!(matches!(encode_value(&[0xff, 0xfe]), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn stored_strings_are_unwrapped_on_read() {
        assert_eq!(decode_value(br#""ping""#), b"ping");
        assert_eq!(decode_value(br#"{"message":"hello"}"#), br#"{"message":"hello"}"#);
        assert_eq!(decode_value(b""), b"");
    }

    #[test]
    fn quoted_text_and_null_lose_their_literal_form() {
        let quoted = encode_value(br#""hi""#).unwrap();
        assert_eq!(quoted, json!("hi"));
        assert_eq!(decode_value(quoted.to_string().as_bytes()), b"hi");

        let null = encode_value(b"null").unwrap();
        assert_eq!(null, Value::Null);
        assert_eq!(value_bytes(Some(null)), b"");
    }

    #[test]
    fn upsert_item_serializes_etag_metadata_and_options() {
        let item = SetStateItem {
            key: "key1".to_string(),
            value: br#"{"message":"hello"}"#.to_vec(),
            etag: Some(ETag::new("2")),
            metadata: HashMap::from([("created-on".to_string(), "now".to_string())]),
            options: Some(StateOptions {
                concurrency: StateConcurrency::LastWrite,
                consistency: StateConsistency::Strong,
            }),
        };
        let wire = serde_json::to_value(WireStateItem::upsert(&item).unwrap()).unwrap();
        assert_eq!(
            wire,
            json!({
                "key": "key1",
                "value": {"message": "hello"},
                "etag": "2",
                "metadata": {"created-on": "now"},
                "options": {"concurrency": "last-write", "consistency": "strong"}
            })
        );
    }

    #[test]
    fn undefined_options_are_omitted() {
        let item = SetStateItem {
            options: Some(StateOptions::default()),
            ..SetStateItem::new("k", "v")
        };
        let wire = serde_json::to_value(WireStateItem::upsert(&item).unwrap()).unwrap();
        assert_eq!(wire, json!({"key": "k", "value": "v"}));
    }

    #[test]
    fn delete_operation_has_no_value() {
        let item = DeleteStateItem {
            key: "gone".to_string(),
            etag: Some(ETag::new("7")),
            ..DeleteStateItem::default()
        };
        let wire = serde_json::to_value(WireStateItem::delete(&item).unwrap()).unwrap();
        assert_eq!(wire, json!({"key": "gone", "etag": "7"}));
    }

    #[test]
    fn bulk_values_follow_read_rules() {
        assert_eq!(value_bytes(None), b"");
        assert_eq!(value_bytes(Some(Value::Null)), b"");
        assert_eq!(value_bytes(Some(json!("text"))), b"text");
        assert_eq!(value_bytes(Some(json!({"a": 1}))), br#"{"a":1}"#);
    }
}
