use engine_core::{
    connectors::store::DocumentStore,
    error::StoreError,
    schema::{MappingUnifier, Unification},
};
use model::{execution::job::JobConfig, schema::MappingConflict};
use tracing::info;

/// What ensuring the target schema did.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SchemaOutcome {
    pub created: bool,
    pub conflicts: Vec<MappingConflict>,
}

/// Target mapping for `config`: every collection of the source index
/// unified, with the excluded paths pruned afterwards.
pub async fn plan_schema(
    store: &dyn DocumentStore,
    config: &JobConfig,
) -> Result<Unification, StoreError> {
    let sources = store.get_schemas(&config.source.index).await?;
    let unifier = MappingUnifier::new(&config.override_fields, &config.discriminator.field);

    let mut unification = unifier.unify(&sources);
    unification.schema = unification.schema.without_paths(&config.excluded_paths);
    Ok(unification)
}

/// Creates and maps the target collection unless it already exists.
///
/// An existing target is left alone; its mapping is never re-applied. The
/// same holds when a parallel partition wins the race to create it.
pub async fn ensure_schema(
    store: &dyn DocumentStore,
    config: &JobConfig,
) -> Result<SchemaOutcome, StoreError> {
    if store.index_exists(&config.target).await? {
        info!(target_index = %config.target, "Target exists, skipping schema setup");
        return Ok(SchemaOutcome::default());
    }

    let unification = plan_schema(store, config).await?;
    match store
        .create_collection(&config.target, &config.collection)
        .await
    {
        Ok(()) => {}
        Err(err) if err.is_already_exists() => {
            info!(
                target_index = %config.target,
                "Target created concurrently, skipping schema setup"
            );
            return Ok(SchemaOutcome::default());
        }
        Err(err) => return Err(err),
    }
    store
        .apply_schema(&config.target, &unification.schema)
        .await?;

    info!(
        target_index = %config.target,
        fields = unification.schema.field_paths().len(),
        conflicts = unification.conflicts.len(),
        "Target created with unified mapping"
    );
    Ok(SchemaOutcome {
        created: true,
        conflicts: unification.conflicts,
    })
}
