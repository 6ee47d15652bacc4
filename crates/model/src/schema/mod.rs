use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

pub const TEXT_TYPE: &str = "text";
pub const KEYWORD_TYPE: &str = "keyword";

pub type Properties = BTreeMap<String, FieldMapping>;

/// One field declaration of an index mapping.
///
/// `type` and `properties` are modelled explicitly; every other mapping
/// parameter (`format`, `analyzer`, `fields`, ...) is carried through
/// untouched in `params`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct FieldMapping {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Properties>,

    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl FieldMapping {
    pub fn scalar(field_type: impl Into<String>) -> Self {
        Self {
            field_type: Some(field_type.into()),
            ..Default::default()
        }
    }

    pub fn object(properties: Properties) -> Self {
        Self {
            field_type: None,
            properties: Some(properties),
            params: Map::new(),
        }
    }

    pub fn text() -> Self {
        Self::scalar(TEXT_TYPE)
    }

    /// Object-like: no scalar type, or explicitly `object`/`nested`.
    pub fn is_container(&self) -> bool {
        match self.field_type.as_deref() {
            None | Some("object") | Some("nested") => true,
            Some(_) => false,
        }
    }

    pub fn has_children(&self) -> bool {
        self.properties.as_ref().is_some_and(|p| !p.is_empty())
    }
}

/// Field declarations of one collection (mapping type) in a source index.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SourceSchema {
    pub collection: String,
    pub properties: Properties,
}

impl SourceSchema {
    pub fn new(collection: impl Into<String>, properties: Properties) -> Self {
        Self {
            collection: collection.into(),
            properties,
        }
    }
}

/// A type clash resolved while merging source schemas.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct MappingConflict {
    pub path: String,
    pub existing: Option<String>,
    pub incoming: Option<String>,
}

/// Target mapping produced by unification.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct UnifiedSchema {
    pub properties: Properties,
}

impl UnifiedSchema {
    /// Flattened view: dot-delimited field path -> declaration.
    pub fn field_paths(&self) -> BTreeMap<String, &FieldMapping> {
        let mut out = BTreeMap::new();
        collect_paths(&self.properties, "", &mut out);
        out
    }

    pub fn get(&self, path: &str) -> Option<&FieldMapping> {
        let mut segments = path.split('.');
        let mut field = self.properties.get(segments.next()?)?;
        for segment in segments {
            field = field.properties.as_ref()?.get(segment)?;
        }
        Some(field)
    }

    /// Copy of the schema with the given dot paths (and their subtrees)
    /// removed. Unknown paths are ignored.
    pub fn without_paths<S: AsRef<str>>(&self, paths: &[S]) -> UnifiedSchema {
        let mut properties = self.properties.clone();
        for path in paths {
            let segments: Vec<&str> = path.as_ref().split('.').collect();
            prune(&mut properties, &segments);
        }
        UnifiedSchema { properties }
    }

    /// Body of a put-mapping request.
    pub fn mapping_body(&self, dynamic: bool) -> Value {
        json!({
            "dynamic": dynamic,
            "properties": self.properties,
        })
    }
}

fn collect_paths<'a>(
    properties: &'a Properties,
    prefix: &str,
    out: &mut BTreeMap<String, &'a FieldMapping>,
) {
    for (name, field) in properties {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}.{name}")
        };
        if let Some(children) = &field.properties {
            collect_paths(children, &path, out);
        }
        out.insert(path, field);
    }
}

fn prune(properties: &mut Properties, segments: &[&str]) {
    match segments {
        [] => {}
        [leaf] => {
            properties.remove(*leaf);
        }
        [head, rest @ ..] => {
            if let Some(children) = properties
                .get_mut(*head)
                .and_then(|f| f.properties.as_mut())
            {
                prune(children, rest);
            }
        }
    }
}
