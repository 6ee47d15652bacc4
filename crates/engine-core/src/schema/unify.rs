use model::schema::{
    FieldMapping, KEYWORD_TYPE, MappingConflict, Properties, SourceSchema, UnifiedSchema,
};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Result of merging a set of source schemas.
#[derive(Debug, Clone, PartialEq)]
pub struct Unification {
    pub schema: UnifiedSchema,

    /// Type clashes that were resolved in favour of the later declaration.
    pub conflicts: Vec<MappingConflict>,
}

/// Merges the field declarations of several collections into one mapping.
///
/// Sources are applied in order. Containers that both carry children are
/// merged recursively; any other collision takes the later declaration,
/// shallow-merged over the earlier one. Fields whose leaf name is in
/// `overrides` are declared as plain `text` at every depth, and the
/// discriminator field is always a `keyword`.
pub struct MappingUnifier<'a> {
    overrides: &'a BTreeSet<String>,
    discriminator: &'a str,
}

impl<'a> MappingUnifier<'a> {
    pub fn new(overrides: &'a BTreeSet<String>, discriminator: &'a str) -> Self {
        Self {
            overrides,
            discriminator,
        }
    }

    pub fn unify(&self, sources: &[SourceSchema]) -> Unification {
        let mut properties = Properties::new();
        let mut conflicts = Vec::new();

        for source in sources {
            debug!(
                collection = %source.collection,
                fields = source.properties.len(),
                "Merging source schema"
            );
            self.merge_children(&mut properties, &source.properties, "", &mut conflicts);
        }

        properties.insert(
            self.discriminator.to_string(),
            FieldMapping::scalar(KEYWORD_TYPE),
        );

        for conflict in &conflicts {
            warn!(
                path = %conflict.path,
                existing = conflict.existing.as_deref().unwrap_or("-"),
                incoming = conflict.incoming.as_deref().unwrap_or("-"),
                "Conflicting field types, keeping the later declaration"
            );
        }

        Unification {
            schema: UnifiedSchema { properties },
            conflicts,
        }
    }

    fn merge_children(
        &self,
        into: &mut Properties,
        incoming: &Properties,
        prefix: &str,
        conflicts: &mut Vec<MappingConflict>,
    ) {
        for (name, field) in incoming {
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{prefix}.{name}")
            };

            let merged = match into.remove(name) {
                None => self.normalize(name, field, &path, conflicts),
                Some(existing) => self.merge(existing, name, field, &path, conflicts),
            };
            into.insert(name.clone(), merged);
        }
    }

    /// Fresh copy of a declaration with overrides applied through its subtree.
    fn normalize(
        &self,
        name: &str,
        field: &FieldMapping,
        path: &str,
        conflicts: &mut Vec<MappingConflict>,
    ) -> FieldMapping {
        if self.overrides.contains(name) {
            return FieldMapping::text();
        }

        let mut out = field.clone();
        if let Some(children) = &field.properties {
            let mut normalized = Properties::new();
            self.merge_children(&mut normalized, children, path, conflicts);
            out.properties = Some(normalized);
        }
        out
    }

    fn merge(
        &self,
        mut existing: FieldMapping,
        name: &str,
        incoming: &FieldMapping,
        path: &str,
        conflicts: &mut Vec<MappingConflict>,
    ) -> FieldMapping {
        if self.overrides.contains(name) {
            return FieldMapping::text();
        }

        let both_containers = existing.is_container()
            && existing.has_children()
            && incoming.is_container()
            && incoming.has_children();

        // Recursive merges keep the existing container kind unless the
        // incoming side names one.
        let replaces_kind = !both_containers || incoming.field_type.is_some();
        let (before, after) = (kind_of(&existing), kind_of(incoming));
        if let (Some(a), Some(b)) = (&before, &after) {
            if a != b && replaces_kind {
                conflicts.push(MappingConflict {
                    path: path.to_string(),
                    existing: before.clone(),
                    incoming: after.clone(),
                });
            }
        }

        if both_containers {
            let mut children = existing.properties.take().unwrap_or_default();
            if let Some(incoming_children) = &incoming.properties {
                self.merge_children(&mut children, incoming_children, path, conflicts);
            }
            existing.properties = Some(children);
            if incoming.field_type.is_some() {
                existing.field_type = incoming.field_type.clone();
            }
            existing
                .params
                .extend(incoming.params.iter().map(|(k, v)| (k.clone(), v.clone())));
            return existing;
        }

        // Shallow merge, incoming keys win.
        let normalized = self.normalize(name, incoming, path, conflicts);
        let takes_shape = normalized.field_type.is_some() || normalized.has_children();
        let mut merged = existing;
        merged.params.extend(normalized.params);
        if takes_shape {
            merged.field_type = normalized.field_type;
        }
        if normalized.properties.is_some() {
            merged.properties = normalized.properties;
        }
        if !merged.is_container() {
            merged.properties = None;
        }
        merged
    }
}

/// Convenience wrapper around [`MappingUnifier`].
pub fn unify(
    sources: &[SourceSchema],
    overrides: &BTreeSet<String>,
    discriminator: &str,
) -> Unification {
    MappingUnifier::new(overrides, discriminator).unify(sources)
}

fn kind_of(field: &FieldMapping) -> Option<String> {
    match &field.field_type {
        Some(t) => Some(t.clone()),
        None if field.has_children() => Some("object".to_string()),
        None => None,
    }
}
