use crate::error::ProcessingError;
use engine_core::connectors::store::{DocumentStore, ScrollPage, SearchRequest};
use model::{
    execution::identity::SourceSelector,
    pagination::cursor::{Cursor, KeyRange, OrderingKey},
};
use std::sync::Arc;
use tracing::debug;

/// Pages through a source index in ascending key order.
pub struct CursorExtractor {
    store: Arc<dyn DocumentStore>,
    selector: SourceSelector,
    key_field: String,
    batch_size: usize,
    scroll_ttl: String,
    cursor: Cursor,
    total: u64,
}

impl CursorExtractor {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        selector: SourceSelector,
        key_field: impl Into<String>,
        batch_size: usize,
        scroll_ttl: impl Into<String>,
    ) -> Self {
        Self {
            store,
            selector,
            key_field: key_field.into(),
            batch_size,
            scroll_ttl: scroll_ttl.into(),
            cursor: Cursor::default(),
            total: 0,
        }
    }

    /// Starts a scroll over `range` and returns its first page.
    pub async fn open(&mut self, range: KeyRange) -> Result<ScrollPage, ProcessingError> {
        let request = SearchRequest::new(
            &self.selector,
            &self.key_field,
            range.clone(),
            self.batch_size,
            &self.scroll_ttl,
        );

        let page = self
            .store
            .open_scroll(&request)
            .await
            .map_err(|source| ProcessingError::Open { range, source })?;

        self.total = page.total;
        self.cursor.handle = page.scroll_id.clone();
        debug!(
            total = page.total,
            docs = page.docs.len(),
            "Opened scroll"
        );
        Ok(page)
    }

    /// Next page of the open scroll; empty once the handle is gone.
    pub async fn advance(&mut self) -> Result<ScrollPage, ProcessingError> {
        let Some(handle) = self.cursor.handle.clone() else {
            return Ok(ScrollPage::default());
        };

        let page = self
            .store
            .advance_scroll(&handle, &self.scroll_ttl)
            .await
            .map_err(|source| ProcessingError::Advance { source })?;

        self.cursor.handle = page.scroll_id.clone();
        Ok(page)
    }

    /// More pages exist only when the result set outgrows one batch and
    /// the server left a handle to continue with.
    pub fn should_advance(&self) -> bool {
        self.total > self.batch_size as u64 && self.cursor.is_open()
    }

    pub fn record_key(&mut self, key: OrderingKey) {
        self.cursor.last_key = self.cursor.last_key.max(Some(key));
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub fn total(&self) -> u64 {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectors::memory::MemoryStore;
    use model::records::document::SourceDocument;
    use serde_json::json;

    fn doc(id: i64) -> SourceDocument {
        SourceDocument::new(
            id.to_string(),
            "ride_details",
            json!({ "id": id }).as_object().cloned().unwrap(),
        )
    }

    async fn store_with(ids: impl IntoIterator<Item = i64>) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_source("rides", ids.into_iter().map(doc).collect::<Vec<_>>())
            .await;
        store
    }

    fn range(start: i64, end: i64) -> KeyRange {
        KeyRange::new(OrderingKey::Integer(start), OrderingKey::Integer(end))
    }

    #[tokio::test]
    async fn pages_until_exhausted() {
        let store = store_with(1..=5).await;
        let mut extractor =
            CursorExtractor::new(store, SourceSelector::index("rides"), "id", 2, "1m");

        let mut seen = Vec::new();
        let mut page = extractor.open(range(1, 5)).await.unwrap();
        loop {
            seen.extend(page.docs.iter().map(|d| d.id.clone()));
            if page.docs.is_empty() || !extractor.should_advance() {
                break;
            }
            page = extractor.advance().await.unwrap();
        }

        assert_eq!(seen, vec!["1", "2", "3", "4", "5"]);
        assert_eq!(extractor.total(), 5);
    }

    #[tokio::test]
    async fn small_result_sets_do_not_advance() {
        let store = store_with(1..=2).await;
        let mut extractor =
            CursorExtractor::new(store, SourceSelector::index("rides"), "id", 20, "1m");

        let page = extractor.open(range(0, 100)).await.unwrap();

        assert_eq!(page.docs.len(), 2);
        assert!(!extractor.should_advance());
    }

    #[tokio::test]
    async fn expired_handle_is_reported() {
        let store = store_with(1..=5).await;
        store.expire_scroll_on_advance(1).await;
        let mut extractor =
            CursorExtractor::new(store, SourceSelector::index("rides"), "id", 2, "1m");

        extractor.open(range(1, 5)).await.unwrap();
        let err = extractor.advance().await.unwrap_err();

        assert!(err.is_cursor_expired());
    }

    #[tokio::test]
    async fn advance_without_handle_is_empty() {
        let store = store_with(1..=3).await;
        let mut extractor =
            CursorExtractor::new(store, SourceSelector::index("rides"), "id", 2, "1m");

        assert!(extractor.advance().await.unwrap().docs.is_empty());
    }
}
