use crate::{
    conn::{ConnectionPinger, ElasticPinger},
    env::EnvManager,
    error::CliError,
    job::JobScope,
    output::ProgressEntry,
};
use clap::Parser;
use commands::Commands;
use connectors::elastic::ElasticStore;
use engine_core::{
    error::StateError,
    state::{CheckpointStore, sled_store::SledCheckpointStore},
};
use engine_runtime::execution::{ReindexJob, partition::plan_partitions, schema::plan_schema};
use model::execution::{
    identity::JobIdentity,
    job::{DEFAULT_STORE_URL, JobConfig},
};
use serde_json::json;
use std::{process::ExitCode, sync::Arc};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod commands;
mod conn;
mod env;
mod error;
mod job;
mod output;

#[derive(Parser)]
#[command(
    name = "reindex",
    version = "0.1.0",
    about = "Resumable bulk reindexer with mapping unification"
)]
struct Cli {
    #[arg(long, global = true, help = "Optional .env file with REINDEX_* overrides")]
    env_file: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, CliError> {
    let mut env = EnvManager::new();
    if let Some(path) = &cli.env_file {
        env.load_from_file(path)?;
    }

    match cli.command {
        Commands::Run {
            config,
            start,
            end,
            month,
            partition,
            json,
        } => {
            let config = job::load_job(&config, &env).await?;
            let scope = job::scope(config, month.as_deref(), partition)?;
            let range = job::resolve_range(&scope, start.as_deref(), end.as_deref())?;

            let store = Arc::new(ElasticStore::from_settings(&scope.config.store)?);
            let checkpoints: Arc<dyn CheckpointStore> =
                Arc::new(open_checkpoint_store(&scope.config)?);

            match ReindexJob::new(scope.config, range, scope.partition, store, checkpoints)?
                .run()
                .await
            {
                Ok(report) => output::print_report(&report, json)?,
                Err(err) => {
                    error!("{err}");
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
        Commands::Progress {
            config,
            partition,
            month,
            all,
            json,
        } => {
            let config = job::load_job(&config, &env).await?;
            let scope = job::scope(config, month.as_deref(), partition)?;
            show_progress(&scope, all, json).await?;
        }
        Commands::Partitions {
            start,
            end,
            count,
            config,
        } => {
            let partitions = plan_partitions(start, end, count)?;
            output::print_partitions(&partitions, config.as_deref());
        }
        Commands::Mapping { config, output } => {
            let config = job::load_job(&config, &env).await?;
            let store = ElasticStore::from_settings(&config.store)?;
            let plan = plan_schema(&store, &config).await?;

            info!(
                source = %config.source.index,
                fields = plan.schema.field_paths().len(),
                conflicts = plan.conflicts.len(),
                "Unified mapping planned"
            );
            let body = json!({
                "settings": config.collection.to_index_settings(),
                "mappings": plan.schema.mapping_body(false),
                "conflicts": plan.conflicts,
            });
            output::write_json(&body, output).await?;
        }
        Commands::Ping { url } => {
            let url = url
                .or_else(|| env.store_url().map(str::to_string))
                .unwrap_or_else(|| DEFAULT_STORE_URL.to_string());
            ElasticPinger { url }.ping().await?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn open_checkpoint_store(config: &JobConfig) -> Result<SledCheckpointStore, CliError> {
    let path = job::state_dir(config)?;
    SledCheckpointStore::open(&path).map_err(|err| {
        CliError::Unexpected(format!(
            "Failed to open checkpoint store at {}: {err}",
            path.display()
        ))
    })
}

async fn show_progress(scope: &JobScope, all: bool, as_json: bool) -> Result<(), CliError> {
    let store = open_checkpoint_store(&scope.config)?;
    let identity = scope.config.identity(scope.partition.clone());

    let identities = if all {
        // A month scope lists that month's partitions only.
        let prefix = match scope.month_range {
            Some(_) => identity.checkpoint_key(),
            None => identity.family_prefix(),
        };
        store
            .keys(&prefix)?
            .into_iter()
            .filter_map(|key| key.parse::<JobIdentity>().ok())
            .collect()
    } else {
        vec![identity]
    };

    let mut entries = Vec::with_capacity(identities.len());
    for identity in &identities {
        let entry = match store.get(&identity.checkpoint_key()).await {
            Ok(last_key) => ProgressEntry::new(identity, last_key),
            Err(StateError::Locked(_)) => ProgressEntry::in_use(identity),
            Err(err) => return Err(err.into()),
        };
        entries.push(entry);
    }

    output::print_progress(&entries, as_json)
}
