//! Job identity and its checkpoint-key serialization.
//!
//! Layout of a serialized identity:
//!
//! ```text
//! reindex:v1:<target>:<selector>:<partition>
//! ```
//!
//! Each component escapes `\` as `\\` and `:` as `\:`. An absent partition
//! is an empty last component. Bumping [`IDENTITY_VERSION`] orphans every
//! stored checkpoint, so the layout must only change together with it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{collections::BTreeMap, fmt, str::FromStr};
use thiserror::Error;

pub const IDENTITY_PREFIX: &str = "reindex";
pub const IDENTITY_VERSION: &str = "v1";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Malformed job identity '{0}'")]
    Malformed(String),

    #[error("Unsupported job identity version '{0}'")]
    UnsupportedVersion(String),
}

/// Which documents of the source index a job reads.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SourceSelector {
    pub index: String,

    /// Restrict to one collection tag (mapping type) inside the index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,

    /// Extra exact-match filters, field -> value.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub terms: BTreeMap<String, Value>,
}

impl SourceSelector {
    pub fn index(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            collection: None,
            terms: BTreeMap::new(),
        }
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    pub fn with_term(mut self, field: impl Into<String>, value: Value) -> Self {
        self.terms.insert(field.into(), value);
        self
    }
}

impl fmt::Display for SourceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.index)?;
        if let Some(collection) = &self.collection {
            write!(f, "/{collection}")?;
        }
        if !self.terms.is_empty() {
            let terms: Vec<String> = self
                .terms
                .iter()
                .map(|(field, value)| format!("{field}={value}"))
                .collect();
            write!(f, "[{}]", terms.join(","))?;
        }
        Ok(())
    }
}

/// Namespaces checkpoints so partitioned workers never share one.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobIdentity {
    pub source: String,
    pub target: String,
    pub partition: Option<String>,
}

impl JobIdentity {
    pub fn new(
        selector: &SourceSelector,
        target: impl Into<String>,
        partition: Option<String>,
    ) -> Self {
        Self {
            source: selector.to_string(),
            target: target.into(),
            partition: partition.filter(|p| !p.is_empty()),
        }
    }

    pub fn checkpoint_key(&self) -> String {
        format!(
            "{IDENTITY_PREFIX}:{IDENTITY_VERSION}:{}:{}:{}",
            escape(&self.target),
            escape(&self.source),
            escape(self.partition.as_deref().unwrap_or_default()),
        )
    }

    /// Key prefix shared by every partition of the same source and target.
    pub fn family_prefix(&self) -> String {
        format!(
            "{IDENTITY_PREFIX}:{IDENTITY_VERSION}:{}:{}:",
            escape(&self.target),
            escape(&self.source),
        )
    }
}

impl fmt::Display for JobIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.checkpoint_key())
    }
}

impl FromStr for JobIdentity {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = split_escaped(s).ok_or_else(|| IdentityError::Malformed(s.to_string()))?;
        let [prefix, version, target, source, partition]: [String; 5] = parts
            .try_into()
            .map_err(|_| IdentityError::Malformed(s.to_string()))?;

        if prefix != IDENTITY_PREFIX {
            return Err(IdentityError::Malformed(s.to_string()));
        }
        if version != IDENTITY_VERSION {
            return Err(IdentityError::UnsupportedVersion(version));
        }
        if target.is_empty() || source.is_empty() {
            return Err(IdentityError::Malformed(s.to_string()));
        }

        Ok(Self {
            source,
            target,
            partition: Some(partition).filter(|p| !p.is_empty()),
        })
    }
}

fn escape(component: &str) -> String {
    let mut out = String::with_capacity(component.len());
    for c in component.chars() {
        if c == '\\' || c == ':' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn split_escaped(s: &str) -> Option<Vec<String>> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => current.push(chars.next()?),
            ':' => parts.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    parts.push(current);
    Some(parts)
}
