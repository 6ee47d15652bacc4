use async_trait::async_trait;
use engine_core::{
    connectors::store::{
        BulkItem, BulkOperation, BulkResponse, DocumentStore, ScrollPage, SearchRequest,
    },
    error::StoreError,
};
use model::{
    execution::job::CollectionSettings,
    records::document::{Fields, SourceDocument},
    schema::{SourceSchema, UnifiedSchema},
};
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use tokio::sync::Mutex;

/// How an injected bulk failure presents itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkFault {
    /// The request never reaches the store.
    Transport,

    /// The store flags errors but returns no per-item detail.
    OpaqueErrors,
}

/// One index held by [`MemoryStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryIndex {
    pub schemas: Vec<SourceSchema>,
    pub settings: Option<CollectionSettings>,
    pub mapping: Option<UnifiedSchema>,
    /// Documents served by scroll searches, in insertion order.
    pub source: Vec<SourceDocument>,
    /// Documents written through bulk or single writes, by id.
    pub written: BTreeMap<String, Fields>,
}

struct OpenScroll {
    remaining: VecDeque<SourceDocument>,
    size: usize,
    total: u64,
}

#[derive(Default)]
struct Inner {
    indices: BTreeMap<String, MemoryIndex>,
    scrolls: HashMap<String, OpenScroll>,
    next_scroll: u64,
    next_id: u64,

    searches: Vec<SearchRequest>,
    bulk_calls: usize,
    advances: usize,

    failing_ids: HashSet<String>,
    bulk_faults: HashMap<usize, BulkFault>,
    expire_on_advance: Option<usize>,
    fail_single_writes: bool,
    unavailable: bool,
}

/// In-process [`DocumentStore`] with scroll semantics and failure injection.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a source index with the given collection schemas.
    pub async fn add_index(&self, index: &str, schemas: Vec<SourceSchema>) {
        let mut inner = self.inner.lock().await;
        inner.indices.entry(index.to_string()).or_default().schemas = schemas;
    }

    pub async fn insert_source(
        &self,
        index: &str,
        docs: impl IntoIterator<Item = SourceDocument>,
    ) {
        let mut inner = self.inner.lock().await;
        inner
            .indices
            .entry(index.to_string())
            .or_default()
            .source
            .extend(docs);
    }

    pub async fn index(&self, index: &str) -> Option<MemoryIndex> {
        self.inner.lock().await.indices.get(index).cloned()
    }

    pub async fn written(&self, index: &str) -> BTreeMap<String, Fields> {
        self.index(index)
            .await
            .map(|i| i.written)
            .unwrap_or_default()
    }

    /// Every search opened so far, in call order.
    pub async fn searches(&self) -> Vec<SearchRequest> {
        self.inner.lock().await.searches.clone()
    }

    pub async fn bulk_calls(&self) -> usize {
        self.inner.lock().await.bulk_calls
    }

    /// Bulk items carrying one of these ids fail with a mapping error.
    pub async fn fail_items(&self, ids: impl IntoIterator<Item = &str>) {
        let mut inner = self.inner.lock().await;
        inner.failing_ids.extend(ids.into_iter().map(str::to_string));
    }

    /// The `call`-th bulk request (1-based) fails as a whole.
    pub async fn fail_bulk_call(&self, call: usize, fault: BulkFault) {
        self.inner.lock().await.bulk_faults.insert(call, fault);
    }

    /// The `advance`-th scroll continuation (1-based, counted over the
    /// store's lifetime) finds its scroll context gone.
    pub async fn expire_scroll_on_advance(&self, advance: usize) {
        self.inner.lock().await.expire_on_advance = Some(advance);
    }

    pub async fn fail_single_writes(&self, fail: bool) {
        self.inner.lock().await.fail_single_writes = fail;
    }

    /// Every call fails as if the store were down.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.inner.lock().await.unavailable = unavailable;
    }
}

impl Inner {
    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.unavailable {
            return Err(StoreError::Transport("connection refused".to_string()));
        }
        Ok(())
    }

    fn next_page(&mut self, scroll_id: &str) -> ScrollPage {
        let (docs, total) = match self.scrolls.get_mut(scroll_id) {
            Some(scroll) => {
                let take = scroll.size.min(scroll.remaining.len());
                (scroll.remaining.drain(..take).collect(), scroll.total)
            }
            None => (Vec::new(), 0),
        };
        ScrollPage {
            docs,
            scroll_id: Some(scroll_id.to_string()),
            total,
        }
    }
}

fn is_hit(doc: &SourceDocument, request: &SearchRequest) -> bool {
    if let Some(collection) = &request.collection {
        if &doc.collection != collection {
            return false;
        }
    }
    if request
        .terms
        .iter()
        .any(|(field, value)| doc.field(field) != Some(value))
    {
        return false;
    }
    doc.ordering_key(&request.key_field, request.range.start.kind())
        .is_ok_and(|key| request.range.contains(&key))
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn index_exists(&self, index: &str) -> Result<bool, StoreError> {
        let inner = self.inner.lock().await;
        inner.ensure_available()?;
        Ok(inner.indices.contains_key(index))
    }

    async fn get_schemas(&self, index: &str) -> Result<Vec<SourceSchema>, StoreError> {
        let inner = self.inner.lock().await;
        inner.ensure_available()?;
        inner
            .indices
            .get(index)
            .map(|i| i.schemas.clone())
            .ok_or_else(|| StoreError::IndexNotFound(index.to_string()))
    }

    async fn create_collection(
        &self,
        index: &str,
        settings: &CollectionSettings,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.ensure_available()?;
        if inner.indices.contains_key(index) {
            return Err(StoreError::Status {
                status: 400,
                body: format!("resource_already_exists_exception: index [{index}]"),
            });
        }
        inner.indices.insert(
            index.to_string(),
            MemoryIndex {
                settings: Some(settings.clone()),
                ..Default::default()
            },
        );
        Ok(())
    }

    async fn apply_schema(&self, index: &str, schema: &UnifiedSchema) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.ensure_available()?;
        let target = inner
            .indices
            .get_mut(index)
            .ok_or_else(|| StoreError::IndexNotFound(index.to_string()))?;
        target.mapping = Some(schema.clone());
        Ok(())
    }

    async fn open_scroll(&self, request: &SearchRequest) -> Result<ScrollPage, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.ensure_available()?;
        inner.searches.push(request.clone());

        let source = inner
            .indices
            .get(&request.index)
            .ok_or_else(|| StoreError::IndexNotFound(request.index.clone()))?;

        let kind = request.range.start.kind();
        let mut hits: Vec<SourceDocument> = source
            .source
            .iter()
            .filter(|doc| is_hit(doc, request))
            .cloned()
            .collect();
        hits.sort_by_key(|doc| doc.ordering_key(&request.key_field, kind).ok());

        let total = hits.len() as u64;
        inner.next_scroll += 1;
        let scroll_id = format!("scroll-{}", inner.next_scroll);
        inner.scrolls.insert(
            scroll_id.clone(),
            OpenScroll {
                remaining: hits.into(),
                size: request.size,
                total,
            },
        );

        Ok(inner.next_page(&scroll_id))
    }

    async fn advance_scroll(&self, scroll_id: &str, _ttl: &str) -> Result<ScrollPage, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.ensure_available()?;
        inner.advances += 1;

        if inner.expire_on_advance == Some(inner.advances) {
            inner.scrolls.remove(scroll_id);
        }
        if !inner.scrolls.contains_key(scroll_id) {
            return Err(StoreError::CursorExpired(format!(
                "No search context found for id [{scroll_id}]"
            )));
        }

        Ok(inner.next_page(scroll_id))
    }

    async fn bulk_write(
        &self,
        ops: &[BulkOperation],
        _timeout: &str,
    ) -> Result<BulkResponse, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.ensure_available()?;
        inner.bulk_calls += 1;

        match inner.bulk_faults.get(&inner.bulk_calls).copied() {
            Some(BulkFault::Transport) => {
                return Err(StoreError::Transport("connection reset by peer".to_string()));
            }
            Some(BulkFault::OpaqueErrors) => {
                return Ok(BulkResponse {
                    errors: true,
                    items: Vec::new(),
                });
            }
            None => {}
        }

        let mut items = Vec::with_capacity(ops.len());
        for op in ops {
            let failing = op
                .id
                .as_ref()
                .is_some_and(|id| inner.failing_ids.contains(id));
            if failing {
                items.push(BulkItem {
                    id: op.id.clone(),
                    status: 400,
                    error: Some(json!({
                        "type": "mapper_parsing_exception",
                        "reason": "failed to parse",
                    })),
                });
                continue;
            }

            let id = match &op.id {
                Some(id) => id.clone(),
                None => {
                    inner.next_id += 1;
                    format!("generated-{}", inner.next_id)
                }
            };
            inner
                .indices
                .entry(op.index.clone())
                .or_default()
                .written
                .insert(id.clone(), op.document.clone());
            items.push(BulkItem {
                id: Some(id),
                status: 201,
                error: None,
            });
        }

        let errors = items.iter().any(BulkItem::is_failure);
        Ok(BulkResponse { errors, items })
    }

    async fn write_one(&self, index: &str, document: &Value) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.ensure_available()?;
        if inner.fail_single_writes {
            return Err(StoreError::Transport("connection refused".to_string()));
        }

        let Value::Object(fields) = document else {
            return Err(StoreError::Status {
                status: 400,
                body: "document must be an object".to_string(),
            });
        };
        inner.next_id += 1;
        let id = format!("generated-{}", inner.next_id);
        inner
            .indices
            .entry(index.to_string())
            .or_default()
            .written
            .insert(id, fields.clone());
        Ok(())
    }
}
