use crate::error::StoreError;
use async_trait::async_trait;
use model::{
    execution::{identity::SourceSelector, job::CollectionSettings},
    pagination::cursor::KeyRange,
    records::document::{Fields, SourceDocument},
    schema::{SourceSchema, UnifiedSchema},
};
use serde_json::Value;
use std::collections::BTreeMap;

/// Ordered, range-bounded scroll query over a source index.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub index: String,
    pub collection: Option<String>,
    pub terms: BTreeMap<String, Value>,
    /// Sorted on ascending and bounded by `range`.
    pub key_field: String,
    pub range: KeyRange,
    pub size: usize,
    pub scroll_ttl: String,
}

impl SearchRequest {
    pub fn new(
        selector: &SourceSelector,
        key_field: impl Into<String>,
        range: KeyRange,
        size: usize,
        scroll_ttl: impl Into<String>,
    ) -> Self {
        Self {
            index: selector.index.clone(),
            collection: selector.collection.clone(),
            terms: selector.terms.clone(),
            key_field: key_field.into(),
            range,
            size,
            scroll_ttl: scroll_ttl.into(),
        }
    }
}

/// One page of a scroll.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrollPage {
    pub docs: Vec<SourceDocument>,
    /// Handle for the next page; `None` when the server closed the scroll.
    pub scroll_id: Option<String>,
    /// Server's estimate of total matching documents.
    pub total: u64,
}

/// One `index` action of a bulk request.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkOperation {
    pub index: String,
    pub id: Option<String>,
    pub document: Fields,
}

/// Outcome of one bulk action, positionally matching the request.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkItem {
    pub id: Option<String>,
    pub status: u16,
    pub error: Option<Value>,
}

impl BulkItem {
    pub fn is_failure(&self) -> bool {
        self.error.is_some() || self.status >= 300
    }

    /// Short human-readable reason, taken from the error object when present.
    pub fn reason(&self) -> String {
        match &self.error {
            Some(Value::Object(err)) => {
                let kind = err.get("type").and_then(Value::as_str).unwrap_or("error");
                match err.get("reason").and_then(Value::as_str) {
                    Some(reason) => format!("{kind}: {reason}"),
                    None => kind.to_string(),
                }
            }
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => format!("status {}", self.status),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkResponse {
    /// Store-level flag: at least one action failed.
    pub errors: bool,
    pub items: Vec<BulkItem>,
}

/// Capabilities the pipeline needs from a schema-bearing document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn index_exists(&self, index: &str) -> Result<bool, StoreError>;

    /// Field declarations of every collection in `index`.
    async fn get_schemas(&self, index: &str) -> Result<Vec<SourceSchema>, StoreError>;

    async fn create_collection(
        &self,
        index: &str,
        settings: &CollectionSettings,
    ) -> Result<(), StoreError>;

    async fn apply_schema(&self, index: &str, schema: &UnifiedSchema) -> Result<(), StoreError>;

    async fn open_scroll(&self, request: &SearchRequest) -> Result<ScrollPage, StoreError>;

    async fn advance_scroll(&self, scroll_id: &str, ttl: &str) -> Result<ScrollPage, StoreError>;

    async fn bulk_write(
        &self,
        ops: &[BulkOperation],
        timeout: &str,
    ) -> Result<BulkResponse, StoreError>;

    async fn write_one(&self, index: &str, document: &Value) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn item_reason_prefers_error_object() {
        let item = BulkItem {
            id: Some("2".into()),
            status: 400,
            error: Some(json!({"type": "mapper_parsing_exception", "reason": "failed to parse [a]"})),
        };
        assert!(item.is_failure());
        assert_eq!(item.reason(), "mapper_parsing_exception: failed to parse [a]");

        let ok = BulkItem {
            id: Some("1".into()),
            status: 201,
            error: None,
        };
        assert!(!ok.is_failure());

        let bare = BulkItem {
            id: None,
            status: 429,
            error: None,
        };
        assert_eq!(bare.reason(), "status 429");
    }
}
