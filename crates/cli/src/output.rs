use crate::error::CliError;
use engine_runtime::execution::{JobReport, partition::Partition};
use model::execution::identity::JobIdentity;
use serde::Serialize;
use serde_json::Value;

/// Stored checkpoint of one job identity.
#[derive(Serialize, Debug)]
pub struct ProgressEntry {
    pub key: String,
    pub partition: Option<String>,
    pub last_key: Option<String>,
    /// A running job holds the checkpoint, so it could not be read.
    pub in_use: bool,
}

impl ProgressEntry {
    pub fn new(identity: &JobIdentity, last_key: Option<String>) -> Self {
        Self {
            key: identity.checkpoint_key(),
            partition: identity.partition.clone(),
            last_key,
            in_use: false,
        }
    }

    pub fn in_use(identity: &JobIdentity) -> Self {
        Self {
            in_use: true,
            ..Self::new(identity, None)
        }
    }
}

pub fn print_report(report: &JobReport, as_json: bool) -> Result<(), CliError> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("Job '{}':", report.job);
    println!("-----------------------------");
    println!("{:<16} {}", "State", report.state);
    println!("{:<16} {}", "Range", report.range);
    println!("{:<16} {}", "Started at", report.start.as_deref().unwrap_or("n/a"));
    println!("{:<16} {}", "Batches", report.batches);
    println!("{:<16} {}", "Docs seen", report.docs_seen);
    println!("{:<16} {}", "Docs loaded", report.docs_loaded);
    println!("{:<16} {}", "Quarantined", report.docs_quarantined);
    println!("{:<16} {}", "Last key", report.last_key.as_deref().unwrap_or("n/a"));
    println!("{:<16} {}", "Schema created", report.schema_created);
    println!("{:<16} {}", "Conflicts", report.conflicts.len());
    println!("{:<16} {:.2}s", "Duration", report.duration_ms as f64 / 1000.0);
    Ok(())
}

pub fn print_progress(entries: &[ProgressEntry], as_json: bool) -> Result<(), CliError> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(entries)?);
        return Ok(());
    }

    for entry in entries {
        println!("Progress for '{}':", entry.key);
        println!("-----------------------------");
        println!("{:<16} {}", "Partition", entry.partition.as_deref().unwrap_or("-"));
        let last_key = match (&entry.last_key, entry.in_use) {
            (_, true) => "in use by a running job",
            (Some(key), false) => key.as_str(),
            (None, false) => "none",
        };
        println!("{:<16} {}", "Last key", last_key);
    }
    if entries.is_empty() {
        println!("No checkpoints stored");
    }
    Ok(())
}

pub fn print_partitions(partitions: &[Partition], config: Option<&str>) {
    for p in partitions {
        match config {
            Some(config) => println!(
                "reindex run --config {config} --start {} --end {} --partition {}",
                p.range.start, p.range.end, p.id
            ),
            None => println!("{:<16} {}", p.id, p.range),
        }
    }
}

pub async fn write_json(value: &Value, path: Option<String>) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value)?;
    match path {
        Some(path) => tokio::fs::write(path, json).await?,
        None => println!("{json}"),
    }
    Ok(())
}
