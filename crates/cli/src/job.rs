use crate::{env::EnvManager, error::CliError};
use model::{execution::job::JobConfig, pagination::cursor::KeyRange};
use std::path::PathBuf;

const DEFAULT_STATE_DIR: &str = ".reindex/state";

/// Reads and validates a job file, then applies environment overrides.
pub async fn load_job(path: &str, env: &EnvManager) -> Result<JobConfig, CliError> {
    let raw = tokio::fs::read_to_string(path).await?;
    let mut config = JobConfig::from_json(&raw)?;
    env.apply(&mut config);
    Ok(config)
}

/// Job settings, month range and partition a command works on.
#[derive(Debug)]
pub struct JobScope {
    pub config: JobConfig,
    pub month_range: Option<KeyRange>,
    pub partition: Option<String>,
}

/// Narrows a job to one `--month`. Month runs checkpoint under their own
/// identity, so months can run in any order.
pub fn scope(
    config: JobConfig,
    month: Option<&str>,
    partition: Option<String>,
) -> Result<JobScope, CliError> {
    let Some(month) = month else {
        if config.is_monthly() {
            return Err(CliError::InvalidArgument(format!(
                "target '{}' names a month, pass --month",
                config.target
            )));
        }
        return Ok(JobScope {
            config,
            month_range: None,
            partition,
        });
    };

    let run = config
        .for_month(month)
        .map_err(|e| CliError::InvalidArgument(e.to_string()))?;
    Ok(JobScope {
        partition: Some(run.partition(partition)),
        month_range: Some(run.range),
        config: run.config,
    })
}

/// Range of one run: the scope's month, else `--start`/`--end` falling
/// back to the range stored in the job file bound by bound.
pub fn resolve_range(
    scope: &JobScope,
    start: Option<&str>,
    end: Option<&str>,
) -> Result<KeyRange, CliError> {
    if let Some(range) = &scope.month_range {
        return Ok(range.clone());
    }

    let config = &scope.config;
    let kind = config.key.kind;
    let parse = |raw: &str| {
        kind.parse(raw)
            .map_err(|e| CliError::InvalidArgument(e.to_string()))
    };
    let stored = config.default_range()?;

    let start = match start {
        Some(raw) => parse(raw)?,
        None => stored.as_ref().map(|r| r.start).ok_or_else(missing_bound)?,
    };
    let end = match end {
        Some(raw) => parse(raw)?,
        None => stored.as_ref().map(|r| r.end).ok_or_else(missing_bound)?,
    };
    Ok(KeyRange::new(start, end))
}

fn missing_bound() -> CliError {
    CliError::InvalidArgument(
        "no key range: pass --start and --end, --month, or set \"range\" in the job file".into(),
    )
}

/// Checkpoint directory: job file or environment, else `~/.reindex/state`.
pub fn state_dir(config: &JobConfig) -> Result<PathBuf, CliError> {
    if let Some(dir) = &config.state_dir {
        return Ok(dir.clone());
    }
    let home = dirs::home_dir()
        .ok_or_else(|| CliError::Unexpected("Could not determine home directory".into()))?;
    Ok(home.join(DEFAULT_STATE_DIR))
}
