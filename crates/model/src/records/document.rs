use crate::pagination::cursor::{KeyError, KeyKind, OrderingKey};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type Fields = Map<String, Value>;

/// A document as read from the source index. Never mutated after reading.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SourceDocument {
    pub id: String,
    /// Mapping type / shape the document was stored under.
    pub collection: String,
    pub fields: Fields,
}

impl SourceDocument {
    pub fn new(id: impl Into<String>, collection: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            collection: collection.into(),
            fields,
        }
    }

    /// Look up a field by dot-delimited path.
    pub fn field(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = self.fields.get(segments.next()?)?;
        segments.try_fold(first, |value, segment| value.as_object()?.get(segment))
    }

    pub fn ordering_key(&self, field: &str, kind: KeyKind) -> Result<OrderingKey, KeyError> {
        let value = self
            .field(field)
            .ok_or_else(|| KeyError::Missing(field.to_string()))?;
        kind.from_json(value)
    }
}

/// A reshaped document ready for the bulk write.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TargetDocument {
    /// Id to write under; `None` lets the store assign one.
    pub id: Option<String>,
    pub source_id: String,
    /// `None` when the source document carried no readable key.
    pub key: Option<OrderingKey>,
    pub fields: Fields,
}

impl TargetDocument {
    /// The id quarantine records refer to.
    pub fn display_id(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.source_id)
    }
}
