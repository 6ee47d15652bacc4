use crate::elastic::error::decode;
use engine_core::{
    connectors::store::{BulkItem, BulkResponse, ScrollPage},
    error::StoreError,
};
use model::{
    records::document::{Fields, SourceDocument},
    schema::{Properties, SourceSchema},
};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Collection tag reported for typeless (7.x) documents and mappings.
pub const TYPELESS_COLLECTION: &str = "_doc";

#[derive(Deserialize, Debug)]
pub struct SearchResponse {
    #[serde(rename = "_scroll_id", default)]
    pub scroll_id: Option<String>,
    pub hits: Hits,
}

#[derive(Deserialize, Debug)]
pub struct Hits {
    #[serde(default)]
    pub total: Option<Total>,
    #[serde(default)]
    pub hits: Vec<Hit>,
}

/// 6.x reports a bare count, 7.x an object.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum Total {
    Count(u64),
    Tracked { value: u64 },
}

impl Total {
    fn value(&self) -> u64 {
        match self {
            Total::Count(n) | Total::Tracked { value: n } => *n,
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct Hit {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_type", default)]
    pub doc_type: Option<String>,
    #[serde(rename = "_source", default)]
    pub source: Fields,
}

impl SearchResponse {
    pub fn into_page(self) -> ScrollPage {
        let total = self.hits.total.as_ref().map(Total::value).unwrap_or(0);
        let docs = self
            .hits
            .hits
            .into_iter()
            .map(|hit| {
                let collection = hit
                    .doc_type
                    .unwrap_or_else(|| TYPELESS_COLLECTION.to_string());
                SourceDocument::new(hit.id, collection, hit.source)
            })
            .collect();

        ScrollPage {
            docs,
            scroll_id: self.scroll_id,
            total,
        }
    }
}

#[derive(Deserialize, Debug)]
struct RawBulkResponse {
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<BTreeMap<String, RawBulkItem>>,
}

#[derive(Deserialize, Debug)]
struct RawBulkItem {
    #[serde(rename = "_id", default)]
    id: Option<String>,
    #[serde(default)]
    status: u16,
    #[serde(default)]
    error: Option<Value>,
}

/// Flattens `{"items": [{"index": {...}}, ...]}` into positional results.
pub fn parse_bulk(body: Value) -> Result<BulkResponse, StoreError> {
    let raw: RawBulkResponse = serde_json::from_value(body).map_err(decode)?;
    let items = raw
        .items
        .into_iter()
        .filter_map(|action| action.into_values().next())
        .map(|item| BulkItem {
            id: item.id,
            status: item.status,
            error: item.error,
        })
        .collect();

    Ok(BulkResponse {
        errors: raw.errors,
        items,
    })
}

/// Reads a `GET <index>/_mapping` body into one schema per collection.
///
/// Typed (6.x) mappings yield one schema per mapping type; typeless
/// mappings yield a single `_doc` schema. An alias resolving to several
/// indices contributes the collections of each.
pub fn parse_mappings(body: Value) -> Result<Vec<SourceSchema>, StoreError> {
    let Value::Object(indices) = body else {
        return Err(decode("mapping response is not an object"));
    };

    let mut schemas = Vec::new();
    for (_, entry) in indices {
        let Some(Value::Object(mappings)) = entry.get("mappings").cloned() else {
            continue;
        };

        if let Some(properties) = mappings.get("properties") {
            schemas.push(SourceSchema::new(
                TYPELESS_COLLECTION,
                parse_properties(properties)?,
            ));
            continue;
        }

        for (collection, mapping) in mappings {
            if collection == "_default_" {
                continue;
            }
            let properties = match mapping.get("properties") {
                Some(properties) => parse_properties(properties)?,
                None => Properties::new(),
            };
            schemas.push(SourceSchema::new(collection, properties));
        }
    }
    Ok(schemas)
}

fn parse_properties(value: &Value) -> Result<Properties, StoreError> {
    serde_json::from_value(value.clone()).map_err(decode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_typed_search_page() {
        let body = json!({
            "_scroll_id": "DXF1ZXJ5",
            "hits": {
                "total": 42,
                "hits": [
                    {"_id": "1", "_type": "ride_details", "_source": {"id": 1}},
                    {"_id": "2", "_type": "ride_orders", "_source": {"id": 2}}
                ]
            }
        });

        let page = serde_json::from_value::<SearchResponse>(body)
            .unwrap()
            .into_page();

        assert_eq!(page.total, 42);
        assert_eq!(page.scroll_id.as_deref(), Some("DXF1ZXJ5"));
        assert_eq!(page.docs[1].collection, "ride_orders");
        assert_eq!(page.docs[0].fields["id"], json!(1));
    }

    #[test]
    fn reads_typeless_total_object() {
        let body = json!({
            "hits": {"total": {"value": 7, "relation": "eq"}, "hits": [{"_id": "a", "_source": {}}]}
        });

        let page = serde_json::from_value::<SearchResponse>(body)
            .unwrap()
            .into_page();

        assert_eq!(page.total, 7);
        assert_eq!(page.scroll_id, None);
        assert_eq!(page.docs[0].collection, TYPELESS_COLLECTION);
    }

    #[test]
    fn bulk_items_keep_request_order() {
        let body = json!({
            "took": 3,
            "errors": true,
            "items": [
                {"index": {"_id": "1", "status": 201}},
                {"index": {"_id": "2", "status": 400, "error": {"type": "mapper_parsing_exception", "reason": "bad"}}},
                {"index": {"_id": "3", "status": 200}}
            ]
        });

        let response = parse_bulk(body).unwrap();

        assert!(response.errors);
        let failed: Vec<_> = response
            .items
            .iter()
            .filter(|i| i.is_failure())
            .map(|i| i.id.clone())
            .collect();
        assert_eq!(failed, vec![Some("2".to_string())]);
    }

    #[test]
    fn typed_mappings_become_one_schema_per_collection() {
        let body = json!({
            "rides": {"mappings": {
                "_default_": {},
                "ride_details": {"properties": {"id": {"type": "long"}}},
                "ride_orders": {"properties": {"id": {"type": "keyword"}, "total": {"type": "float"}}}
            }}
        });

        let schemas = parse_mappings(body).unwrap();

        let names: Vec<&str> = schemas.iter().map(|s| s.collection.as_str()).collect();
        assert_eq!(names, vec!["ride_details", "ride_orders"]);
        assert_eq!(schemas[1].properties.len(), 2);
    }

    #[test]
    fn typeless_mapping_is_a_single_schema() {
        let body = json!({
            "logs-000001": {"mappings": {"properties": {"createdAt": {"type": "date"}}}}
        });

        let schemas = parse_mappings(body).unwrap();

        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0].collection, TYPELESS_COLLECTION);
    }
}
