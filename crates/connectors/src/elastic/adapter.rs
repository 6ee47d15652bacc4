use crate::elastic::{
    error::{check, decode, transport},
    query::{bulk_body, scroll_body, search_body},
    response::{SearchResponse, parse_bulk, parse_mappings},
};
use async_trait::async_trait;
use engine_core::{
    connectors::store::{BulkOperation, BulkResponse, DocumentStore, ScrollPage, SearchRequest},
    error::StoreError,
};
use model::{
    execution::job::{CollectionSettings, StoreSettings},
    schema::{SourceSchema, UnifiedSchema},
};
use reqwest::{Client, StatusCode, header::CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

/// Upper bound for any single HTTP call. Bulk requests also carry their
/// own server-side timeout.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

/// Answer of the cluster root endpoint.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ClusterInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub cluster_name: String,
    pub version: ClusterVersion,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ClusterVersion {
    pub number: String,
}

/// [`DocumentStore`] over the Elasticsearch REST API.
#[derive(Clone)]
pub struct ElasticStore {
    client: Client,
    base_url: String,
    mapping_type: Option<String>,
}

impl ElasticStore {
    pub fn new(base_url: &str) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(transport)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            mapping_type: None,
        })
    }

    pub fn from_settings(settings: &StoreSettings) -> Result<Self, StoreError> {
        let store = Self::new(&settings.url)?;
        Ok(match &settings.mapping_type {
            Some(mapping_type) => store.with_mapping_type(mapping_type),
            None => store,
        })
    }

    /// Write under an explicit mapping type, as 6.x clusters require.
    pub fn with_mapping_type(mut self, mapping_type: impl Into<String>) -> Self {
        self.mapping_type = Some(mapping_type.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn ping(&self) -> Result<ClusterInfo, StoreError> {
        let response = self
            .client
            .get(self.url(""))
            .send()
            .await
            .map_err(transport)?;
        let response = check(response, None).await?;
        response.json().await.map_err(decode)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn send_json(
        &self,
        request: reqwest::RequestBuilder,
        index: Option<&str>,
    ) -> Result<Value, StoreError> {
        let response = request.send().await.map_err(transport)?;
        let response = check(response, index).await?;
        response.json().await.map_err(decode)
    }
}

#[async_trait]
impl DocumentStore for ElasticStore {
    async fn index_exists(&self, index: &str) -> Result<bool, StoreError> {
        let response = self
            .client
            .head(self.url(index))
            .send()
            .await
            .map_err(transport)?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(StoreError::Status {
                status: status.as_u16(),
                body: String::new(),
            }),
        }
    }

    async fn get_schemas(&self, index: &str) -> Result<Vec<SourceSchema>, StoreError> {
        let body = self
            .send_json(
                self.client.get(self.url(&format!("{index}/_mapping"))),
                Some(index),
            )
            .await?;
        parse_mappings(body)
    }

    async fn create_collection(
        &self,
        index: &str,
        settings: &CollectionSettings,
    ) -> Result<(), StoreError> {
        let body = json!({ "settings": settings.to_index_settings() });
        self.send_json(self.client.put(self.url(index)).json(&body), Some(index))
            .await?;
        debug!(index, "Created target index");
        Ok(())
    }

    async fn apply_schema(&self, index: &str, schema: &UnifiedSchema) -> Result<(), StoreError> {
        let path = match &self.mapping_type {
            Some(mapping_type) => format!("{index}/_mapping/{mapping_type}"),
            None => format!("{index}/_mapping"),
        };
        let body = schema.mapping_body(false);
        self.send_json(self.client.put(self.url(&path)).json(&body), Some(index))
            .await?;
        debug!(index, fields = schema.properties.len(), "Applied mapping");
        Ok(())
    }

    async fn open_scroll(&self, request: &SearchRequest) -> Result<ScrollPage, StoreError> {
        let url = self.url(&format!("{}/_search", request.index));
        let body = self
            .send_json(
                self.client
                    .post(url)
                    .query(&[("scroll", request.scroll_ttl.as_str())])
                    .json(&search_body(request)),
                Some(&request.index),
            )
            .await?;

        let response: SearchResponse = serde_json::from_value(body).map_err(decode)?;
        Ok(response.into_page())
    }

    async fn advance_scroll(&self, scroll_id: &str, ttl: &str) -> Result<ScrollPage, StoreError> {
        let body = self
            .send_json(
                self.client
                    .post(self.url("_search/scroll"))
                    .json(&scroll_body(scroll_id, ttl)),
                None,
            )
            .await?;

        let response: SearchResponse = serde_json::from_value(body).map_err(decode)?;
        Ok(response.into_page())
    }

    async fn bulk_write(
        &self,
        ops: &[BulkOperation],
        timeout: &str,
    ) -> Result<BulkResponse, StoreError> {
        let payload = bulk_body(ops, self.mapping_type.as_deref()).map_err(decode)?;
        let body = self
            .send_json(
                self.client
                    .post(self.url("_bulk"))
                    .query(&[("timeout", timeout)])
                    .header(CONTENT_TYPE, "application/x-ndjson")
                    .body(payload),
                None,
            )
            .await?;
        parse_bulk(body)
    }

    async fn write_one(&self, index: &str, document: &Value) -> Result<(), StoreError> {
        let path = match &self.mapping_type {
            Some(mapping_type) => format!("{index}/{mapping_type}"),
            None => format!("{index}/_doc"),
        };
        self.send_json(self.client.post(self.url(&path)).json(document), Some(index))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{
        execution::identity::SourceSelector,
        pagination::cursor::{KeyRange, OrderingKey},
        records::document::Fields,
        schema::FieldMapping,
    };
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_json, body_string_contains, header, method, path, query_param},
    };

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn ping_reads_cluster_version() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "node-1",
                "cluster_name": "rides",
                "version": {"number": "6.8.23"}
            })))
            .mount(&server)
            .await;

        let store = ElasticStore::new(&server.uri()).unwrap();
        let info = store.ping().await.unwrap();

        assert_eq!(info.version.number, "6.8.23");
        assert_eq!(info.cluster_name, "rides");
    }

    #[tokio::test]
    async fn index_exists_maps_404_to_false() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/rides"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = ElasticStore::new(&server.uri()).unwrap();

        assert!(store.index_exists("rides").await.unwrap());
        assert!(!store.index_exists("missing").await.unwrap());
    }

    #[tokio::test]
    async fn open_scroll_sends_sorted_range_query() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rides/_search"))
            .and(query_param("scroll", "1m"))
            .and(body_json(json!({
                "size": 2,
                "sort": [{"id": {"order": "asc"}}],
                "query": {"bool": {"filter": [{"range": {"id": {"gte": 5, "lte": 9}}}]}}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "_scroll_id": "s1",
                "hits": {"total": 3, "hits": [
                    {"_id": "5", "_type": "ride_details", "_source": {"id": 5}},
                    {"_id": "6", "_type": "ride_details", "_source": {"id": 6}}
                ]}
            })))
            .mount(&server)
            .await;

        let store = ElasticStore::new(&server.uri()).unwrap();
        let range = KeyRange::new(OrderingKey::Integer(5), OrderingKey::Integer(9));
        let request = SearchRequest::new(&SourceSelector::index("rides"), "id", range, 2, "1m");

        let page = store.open_scroll(&request).await.unwrap();

        assert_eq!(page.total, 3);
        assert_eq!(page.scroll_id.as_deref(), Some("s1"));
        assert_eq!(page.docs.len(), 2);
    }

    #[tokio::test]
    async fn expired_scroll_surfaces_as_cursor_expired() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_search/scroll"))
            .and(body_json(json!({"scroll": "1m", "scroll_id": "gone"})))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"type": "search_context_missing_exception", "reason": "No search context found for id [7]"},
                "status": 404
            })))
            .mount(&server)
            .await;

        let store = ElasticStore::new(&server.uri()).unwrap();
        let err = store.advance_scroll("gone", "1m").await.unwrap_err();

        assert!(err.is_cursor_expired());
    }

    #[tokio::test]
    async fn bulk_write_posts_ndjson_and_reads_items() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_bulk"))
            .and(query_param("timeout", "5m"))
            .and(header("content-type", "application/x-ndjson"))
            .and(body_string_contains(r#"{"index":{"_id":"1","_index":"rides_modified","_type":"doc"}}"#))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "errors": false,
                "items": [{"index": {"_id": "1", "status": 201}}]
            })))
            .mount(&server)
            .await;

        let store = ElasticStore::new(&server.uri())
            .unwrap()
            .with_mapping_type("doc");
        let ops = vec![BulkOperation {
            index: "rides_modified".into(),
            id: Some("1".into()),
            document: fields(json!({"id": 1})),
        }];

        let response = store.bulk_write(&ops, "5m").await.unwrap();

        assert!(!response.errors);
        assert_eq!(response.items.len(), 1);
        assert_eq!(response.items[0].status, 201);
    }

    #[tokio::test]
    async fn creates_index_and_applies_strict_mapping() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/rides_modified"))
            .and(body_json(json!({"settings": CollectionSettings::default().to_index_settings()})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"acknowledged": true})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/rides_modified/_mapping/doc"))
            .and(body_json(json!({
                "dynamic": false,
                "properties": {"index_type": {"type": "keyword"}}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"acknowledged": true})))
            .expect(1)
            .mount(&server)
            .await;

        let store = ElasticStore::new(&server.uri())
            .unwrap()
            .with_mapping_type("doc");
        let schema = UnifiedSchema {
            properties: [("index_type".to_string(), FieldMapping::scalar("keyword"))].into(),
        };

        store
            .create_collection("rides_modified", &CollectionSettings::default())
            .await
            .unwrap();
        store.apply_schema("rides_modified", &schema).await.unwrap();
    }

    #[tokio::test]
    async fn missing_source_index_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/nope/_mapping"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"type": "index_not_found_exception"},
                "status": 404
            })))
            .mount(&server)
            .await;

        let store = ElasticStore::new(&server.uri()).unwrap();

        assert_eq!(
            store.get_schemas("nope").await.unwrap_err(),
            StoreError::IndexNotFound("nope".into())
        );
    }

    #[tokio::test]
    async fn unreachable_cluster_is_a_transport_error() {
        let store = ElasticStore::new("http://127.0.0.1:1").unwrap();

        let err = store.index_exists("rides").await.unwrap_err();

        assert!(matches!(err, StoreError::Transport(_)));
    }
}
