use crate::{
    execution::identity::{JobIdentity, SourceSelector},
    pagination::cursor::{KeyError, KeyKind, KeyRange, parse_month_label},
};
use chrono::Month;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::{collections::BTreeSet, path::PathBuf};
use thiserror::Error;

pub const DEFAULT_BATCH_SIZE: usize = 20;
pub const DEFAULT_SCROLL_TTL: &str = "1m";
pub const DEFAULT_BULK_TIMEOUT: &str = "5m";
pub const DEFAULT_DISCRIMINATOR_FIELD: &str = "index_type";
pub const DEFAULT_QUARANTINE_INDEX: &str = "reindex_quarantine";
pub const DEFAULT_STORE_URL: &str = "http://localhost:9200";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid job configuration: {0}")]
    Invalid(String),

    #[error("Failed to parse job configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid key range: {0}")]
    Range(#[from] KeyError),
}

/// Ordering key field of the source documents.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct KeySettings {
    pub field: String,
    #[serde(default)]
    pub kind: KeyKind,
}

/// Where the discriminator value comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum DiscriminatorSource<'a> {
    /// The document's own collection tag.
    CollectionTag,

    /// The same value for every document of the job.
    Fixed(&'a str),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DiscriminatorSettings {
    #[serde(default = "default_discriminator_field")]
    pub field: String,
    /// Fixed value; when absent each document's collection tag is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl DiscriminatorSettings {
    pub fn source(&self) -> DiscriminatorSource<'_> {
        match &self.value {
            Some(value) => DiscriminatorSource::Fixed(value),
            None => DiscriminatorSource::CollectionTag,
        }
    }
}

impl Default for DiscriminatorSettings {
    fn default() -> Self {
        Self {
            field: default_discriminator_field(),
            value: None,
        }
    }
}

/// How target ids relate to source ids.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum IdPolicy {
    /// Write under the source id. Re-runs overwrite.
    #[default]
    Reuse,

    /// Deterministic hash of collection tag and source id. Re-runs overwrite.
    Derive,

    /// Let the store assign ids. Re-runs duplicate.
    Generate,
}

/// Settings for a freshly created target collection.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CollectionSettings {
    #[serde(default = "default_total_fields_limit")]
    pub total_fields_limit: u64,
    #[serde(default = "default_shards")]
    pub shards: u32,
    #[serde(default)]
    pub replicas: u32,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: String,
}

impl Default for CollectionSettings {
    fn default() -> Self {
        Self {
            total_fields_limit: default_total_fields_limit(),
            shards: default_shards(),
            replicas: 0,
            refresh_interval: default_refresh_interval(),
        }
    }
}

impl CollectionSettings {
    pub fn to_index_settings(&self) -> Value {
        json!({
            "index": {
                "mapping.total_fields.limit": self.total_fields_limit,
                "number_of_shards": self.shards,
                "number_of_replicas": self.replicas,
                "refresh_interval": self.refresh_interval,
            }
        })
    }
}

/// Default key range, overridable from the command line.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RangeSettings {
    pub start: Value,
    pub end: Value,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StoreSettings {
    #[serde(default = "default_store_url")]
    pub url: String,
    /// Mapping type for clusters that still require one (6.x writes under `doc`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping_type: Option<String>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            url: default_store_url(),
            mapping_type: None,
        }
    }
}

/// Everything one reindex job needs, read from a JSON job file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JobConfig {
    pub source: SourceSelector,
    pub target: String,
    pub key: KeySettings,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_scroll_ttl")]
    pub scroll_ttl: String,
    #[serde(default = "default_bulk_timeout")]
    pub bulk_timeout: String,

    /// Leaf field names forced to `text` in the target mapping.
    #[serde(default)]
    pub override_fields: BTreeSet<String>,
    /// Dot paths dropped from the unified mapping before it is applied.
    #[serde(default)]
    pub excluded_paths: Vec<String>,

    #[serde(default)]
    pub discriminator: DiscriminatorSettings,
    #[serde(default)]
    pub id_policy: IdPolicy,
    #[serde(default = "default_quarantine_index")]
    pub quarantine_index: String,
    #[serde(default)]
    pub collection: CollectionSettings,

    #[serde(default)]
    pub range: Option<RangeSettings>,
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
}

impl JobConfig {
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: JobConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.source.index.trim().is_empty() {
            return invalid("source.index must not be empty");
        }
        if self.target.trim().is_empty() {
            return invalid("target must not be empty");
        }
        if self.target == self.source.index {
            return invalid("target must differ from the source index");
        }
        if self.key.field.trim().is_empty() {
            return invalid("key.field must not be empty");
        }
        if self.batch_size == 0 {
            return invalid("batch_size must be greater than zero");
        }
        if self.discriminator.field.trim().is_empty() {
            return invalid("discriminator.field must not be empty");
        }
        if self.quarantine_index == self.target {
            return invalid("quarantine_index must differ from target");
        }
        Ok(())
    }

    pub fn identity(&self, partition: Option<String>) -> JobIdentity {
        JobIdentity::new(&self.source, &self.target, partition)
    }

    /// Whether the target names a month and needs [`JobConfig::for_month`].
    pub fn is_monthly(&self) -> bool {
        MONTH_PLACEHOLDERS.iter().any(|p| self.target.contains(p))
    }

    /// Settings of a run over one calendar month (`YYYY-MM`) of a
    /// timestamp-keyed job. `{year}`, `{month}` and `{month_name}` in the
    /// target are filled in.
    pub fn for_month(&self, label: &str) -> Result<MonthRun, ConfigError> {
        if self.key.kind != KeyKind::Timestamp {
            return Err(ConfigError::Invalid(format!(
                "month runs need a timestamp key, '{}' is {}",
                self.key.field, self.key.kind
            )));
        }

        let (year, month) = parse_month_label(label)?;
        let range = KeyRange::for_month(year, month)?;
        let name = u8::try_from(month)
            .ok()
            .and_then(|m| Month::try_from(m).ok())
            .ok_or(KeyError::InvalidMonth { year, month })?
            .name()
            .to_lowercase();

        let mut config = self.clone();
        config.target = self
            .target
            .replace("{year}", &year.to_string())
            .replace("{month_name}", &name)
            .replace("{month}", &format!("{month:02}"));
        config.validate()?;

        Ok(MonthRun {
            label: format!("{year:04}-{month:02}"),
            config,
            range,
        })
    }

    /// The range stored in the job file, if any.
    pub fn default_range(&self) -> Result<Option<KeyRange>, ConfigError> {
        let Some(range) = &self.range else {
            return Ok(None);
        };
        let kind = self.key.kind;
        Ok(Some(KeyRange::new(
            kind.from_json(&range.start)?,
            kind.from_json(&range.end)?,
        )))
    }
}

/// Target placeholders filled in by [`JobConfig::for_month`].
pub const MONTH_PLACEHOLDERS: [&str; 3] = ["{year}", "{month}", "{month_name}"];

/// One calendar month of a timestamp-keyed job.
#[derive(Debug, Clone)]
pub struct MonthRun {
    /// Normalized `YYYY-MM`.
    pub label: String,
    pub config: JobConfig,
    pub range: KeyRange,
}

impl MonthRun {
    /// Partition component of the month's checkpoint key. Months never
    /// share a checkpoint, even when they write to the same target.
    pub fn partition(&self, partition: Option<String>) -> String {
        match partition.filter(|p| !p.is_empty()) {
            Some(p) => format!("{}.{p}", self.label),
            None => self.label.clone(),
        }
    }

    pub fn identity(&self, partition: Option<String>) -> JobIdentity {
        self.config.identity(Some(self.partition(partition)))
    }
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_scroll_ttl() -> String {
    DEFAULT_SCROLL_TTL.to_string()
}

fn default_bulk_timeout() -> String {
    DEFAULT_BULK_TIMEOUT.to_string()
}

fn default_discriminator_field() -> String {
    DEFAULT_DISCRIMINATOR_FIELD.to_string()
}

fn default_quarantine_index() -> String {
    DEFAULT_QUARANTINE_INDEX.to_string()
}

fn default_store_url() -> String {
    DEFAULT_STORE_URL.to_string()
}

fn default_total_fields_limit() -> u64 {
    70_000
}

fn default_shards() -> u32 {
    1
}

fn default_refresh_interval() -> String {
    "-1".to_string()
}
