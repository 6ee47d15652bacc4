use model::{
    execution::job::{DiscriminatorSettings, DiscriminatorSource, IdPolicy, JobConfig, KeySettings},
    records::{
        batch::Batch,
        document::{SourceDocument, TargetDocument},
    },
};
use serde_json::Value;
use tracing::warn;

/// Reshapes source documents for the target collection.
pub struct BatchTransformer {
    key: KeySettings,
    discriminator: DiscriminatorSettings,
    id_policy: IdPolicy,
}

impl BatchTransformer {
    pub fn new(
        key: KeySettings,
        discriminator: DiscriminatorSettings,
        id_policy: IdPolicy,
    ) -> Self {
        Self {
            key,
            discriminator,
            id_policy,
        }
    }

    pub fn from_config(config: &JobConfig) -> Self {
        Self::new(
            config.key.clone(),
            config.discriminator.clone(),
            config.id_policy,
        )
    }

    pub fn transform(&self, doc: &SourceDocument) -> TargetDocument {
        let mut fields = doc.fields.clone();
        let tag = match self.discriminator.source() {
            DiscriminatorSource::Fixed(value) => value.to_string(),
            DiscriminatorSource::CollectionTag => doc.collection.clone(),
        };
        fields.insert(self.discriminator.field.clone(), Value::String(tag));

        let id = match self.id_policy {
            IdPolicy::Reuse => Some(doc.id.clone()),
            IdPolicy::Derive => Some(derive_id(&doc.collection, &doc.id)),
            IdPolicy::Generate => None,
        };

        let key = match doc.ordering_key(&self.key.field, self.key.kind) {
            Ok(key) => Some(key),
            Err(err) => {
                warn!(
                    doc_id = %doc.id,
                    field = %self.key.field,
                    error = %err,
                    "Document has no readable ordering key"
                );
                None
            }
        };

        TargetDocument {
            id,
            source_id: doc.id.clone(),
            key,
            fields,
        }
    }

    pub fn transform_batch(&self, seq: usize, docs: &[SourceDocument]) -> Batch {
        Batch::new(seq, docs.iter().map(|d| self.transform(d)).collect())
    }
}

/// Stable target id for a source document, unique across collections.
pub fn derive_id(collection: &str, source_id: &str) -> String {
    let mut h = blake3::Hasher::new();
    h.update(collection.as_bytes());
    h.update(b":");
    h.update(source_id.as_bytes());
    format!("doc-{}", &h.finalize().to_hex()[..32])
}
