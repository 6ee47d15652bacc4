#![allow(dead_code)]

use connectors::memory::MemoryStore;
use model::{
    records::document::SourceDocument,
    schema::{FieldMapping, Properties, SourceSchema},
};
use serde_json::{Value, json};
use std::sync::Arc;

pub mod integration;
pub mod utils;

pub const SOURCE_INDEX: &str = "rides";
pub const TARGET_INDEX: &str = "rides_modified";
pub const QUARANTINE_INDEX: &str = "reindex_quarantine";

/// Job file shared by the integer-keyed scenarios.
pub const RIDES_JOB: &str = r#"{
    "source": {"index": "rides"},
    "target": "rides_modified",
    "key": {"field": "id"},
    "batch_size": 2,
    "override_fields": ["flag", "book_now"],
    "excluded_paths": ["receipt.fare_breakdown"]
}"#;

pub fn props(fields: &[(&str, FieldMapping)]) -> Properties {
    fields
        .iter()
        .map(|(name, field)| (name.to_string(), field.clone()))
        .collect()
}

/// The two collections of the rides index, with a `long`/`keyword`
/// clash on `a` and a `boolean` override candidate.
pub fn ride_schemas() -> Vec<SourceSchema> {
    let receipt = FieldMapping::object(props(&[
        ("total", FieldMapping::scalar("float")),
        (
            "fare_breakdown",
            FieldMapping::object(props(&[("base", FieldMapping::scalar("float"))])),
        ),
    ]));

    vec![
        SourceSchema::new(
            "ride_details",
            props(&[
                ("id", FieldMapping::scalar("long")),
                ("a", FieldMapping::scalar("long")),
                ("receipt", receipt),
            ]),
        ),
        SourceSchema::new(
            "ride_orders",
            props(&[
                ("id", FieldMapping::scalar("long")),
                ("a", FieldMapping::scalar("keyword")),
                ("b", FieldMapping::scalar("text")),
                ("flag", FieldMapping::scalar("boolean")),
            ]),
        ),
    ]
}

pub fn document(id: &str, collection: &str, fields: Value) -> SourceDocument {
    let fields = fields.as_object().cloned().unwrap_or_default();
    SourceDocument::new(id, collection, fields)
}

/// Ride documents keyed by `id`, alternating between both collections.
pub fn rides(ids: impl IntoIterator<Item = i64>) -> Vec<SourceDocument> {
    ids.into_iter()
        .map(|id| {
            let collection = if id % 2 == 0 { "ride_orders" } else { "ride_details" };
            document(&id.to_string(), collection, json!({"id": id, "a": id * 10}))
        })
        .collect()
}

pub async fn rides_store(ids: impl IntoIterator<Item = i64>) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.add_index(SOURCE_INDEX, ride_schemas()).await;
    store.insert_source(SOURCE_INDEX, rides(ids)).await;
    store
}
