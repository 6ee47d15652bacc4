use engine_core::connectors::store::{BulkOperation, SearchRequest};
use model::pagination::cursor::OrderingKey;
use serde_json::{Map, Value, json};

const TIMESTAMP_FORMAT: &str = "strict_date_optional_time||epoch_millis";

/// Body of the initial scroll search: ascending on the key field, bounded
/// to the request's range and narrowed by its collection and term filters.
pub fn search_body(request: &SearchRequest) -> Value {
    let mut bounds = Map::new();
    bounds.insert("gte".into(), request.range.start.to_json());
    bounds.insert("lte".into(), request.range.end.to_json());
    if matches!(request.range.start, OrderingKey::Timestamp(_)) {
        bounds.insert("format".into(), Value::from(TIMESTAMP_FORMAT));
    }

    let mut filters = vec![json!({ "range": { &request.key_field: bounds } })];
    if let Some(collection) = &request.collection {
        filters.push(json!({ "term": { "_type": collection } }));
    }
    for (field, value) in &request.terms {
        filters.push(json!({ "term": { field: value } }));
    }

    json!({
        "size": request.size,
        "sort": [{ &request.key_field: { "order": "asc" } }],
        "query": { "bool": { "filter": filters } },
    })
}

pub fn scroll_body(scroll_id: &str, ttl: &str) -> Value {
    json!({ "scroll": ttl, "scroll_id": scroll_id })
}

/// Newline-delimited bulk payload, one `index` action per operation.
pub fn bulk_body(
    ops: &[BulkOperation],
    mapping_type: Option<&str>,
) -> Result<String, serde_json::Error> {
    let mut body = String::new();
    for op in ops {
        let mut action = Map::new();
        action.insert("_index".into(), Value::from(op.index.as_str()));
        if let Some(id) = &op.id {
            action.insert("_id".into(), Value::from(id.as_str()));
        }
        if let Some(mapping_type) = mapping_type {
            action.insert("_type".into(), Value::from(mapping_type));
        }

        body.push_str(&serde_json::to_string(&json!({ "index": action }))?);
        body.push('\n');
        body.push_str(&serde_json::to_string(&op.document)?);
        body.push('\n');
    }
    Ok(body)
}
