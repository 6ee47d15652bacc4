use crate::{
    error::ReindexError,
    execution::{report::JobReport, schema, state::JobState},
};
use engine_core::{connectors::store::DocumentStore, state::CheckpointStore};
use engine_processing::{
    consumer::{
        loader::BulkLoader,
        quarantine::{DEFAULT_DRAIN_GRACE, QuarantineWriter},
    },
    producer::{reader::CursorExtractor, transformer::BatchTransformer},
    state_manager::{CheckpointManager, CommitOutcome},
};
use model::{
    execution::{
        identity::JobIdentity,
        job::{ConfigError, JobConfig},
    },
    pagination::cursor::KeyRange,
    records::{batch::Batch, document::SourceDocument},
};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tracing::{debug, error, info, warn};

/// Runs one job instance to completion.
pub async fn run(
    config: JobConfig,
    range: KeyRange,
    partition: Option<String>,
    store: Arc<dyn DocumentStore>,
    checkpoints: Arc<dyn CheckpointStore>,
) -> Result<JobReport, ReindexError> {
    ReindexJob::new(config, range, partition, store, checkpoints)?
        .run()
        .await
}

/// One job instance: a source selector, a target and an inclusive key
/// range, driven through [`JobState`] one batch at a time.
///
/// Extraction, loading and checkpointing are strictly sequential. Only
/// quarantine writes run in the background; they get `drain_grace` to
/// finish once the job stops.
pub struct ReindexJob {
    config: JobConfig,
    range: KeyRange,
    identity: JobIdentity,
    store: Arc<dyn DocumentStore>,

    checkpoints: CheckpointManager,
    extractor: CursorExtractor,
    transformer: BatchTransformer,
    loader: BulkLoader,
    quarantine: QuarantineWriter,
    drain_grace: Duration,

    state: JobState,
    effective: KeyRange,
    scroll_opened: bool,
    page: Vec<SourceDocument>,
    batch: Option<Batch>,
    report: JobReport,
}

impl ReindexJob {
    pub fn new(
        config: JobConfig,
        range: KeyRange,
        partition: Option<String>,
        store: Arc<dyn DocumentStore>,
        checkpoints: Arc<dyn CheckpointStore>,
    ) -> Result<Self, ReindexError> {
        config.validate()?;
        let kind = config.key.kind;
        if range.start.kind() != kind || range.end.kind() != kind {
            return Err(ConfigError::Invalid(format!(
                "range {range} does not match the {kind} key of field '{}'",
                config.key.field
            ))
            .into());
        }

        let identity = config.identity(partition);
        let quarantine = QuarantineWriter::new(store.clone(), &config.quarantine_index);
        let loader = BulkLoader::new(
            store.clone(),
            identity.clone(),
            &config.bulk_timeout,
            quarantine.clone(),
        );
        let extractor = CursorExtractor::new(
            store.clone(),
            config.source.clone(),
            &config.key.field,
            config.batch_size,
            &config.scroll_ttl,
        );

        Ok(Self {
            checkpoints: CheckpointManager::new(identity.clone(), kind, checkpoints),
            transformer: BatchTransformer::from_config(&config),
            report: JobReport::new(identity.to_string(), range.to_string()),
            effective: range.clone(),
            extractor,
            loader,
            quarantine,
            drain_grace: DEFAULT_DRAIN_GRACE,
            state: JobState::Init,
            scroll_opened: false,
            page: Vec::new(),
            batch: None,
            config,
            range,
            identity,
            store,
        })
    }

    /// How long a stopping job waits for outstanding quarantine writes.
    pub fn with_drain_grace(mut self, grace: Duration) -> Self {
        self.drain_grace = grace;
        self
    }

    pub fn identity(&self) -> &JobIdentity {
        &self.identity
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub async fn run(mut self) -> Result<JobReport, ReindexError> {
        let started = Instant::now();
        info!(
            job = %self.identity,
            range = %self.range,
            batch_size = self.config.batch_size,
            "Starting reindex job"
        );

        while !self.state.is_terminal() {
            let from = self.state;
            match self.step().await {
                Ok(next) => {
                    debug!(job = %self.identity, from = %from, to = %next, "State transition");
                    self.state = next;
                }
                Err(err) => return Err(self.fail(from, err).await),
            }
        }

        self.quarantine.drain(self.drain_grace).await;
        self.report.state = self.state;
        self.report.set_duration(started.elapsed());

        info!(
            job = %self.identity,
            batches = self.report.batches,
            docs_seen = self.report.docs_seen,
            docs_loaded = self.report.docs_loaded,
            docs_quarantined = self.report.docs_quarantined,
            last_key = self.report.last_key.as_deref().unwrap_or("none"),
            duration_ms = self.report.duration_ms,
            docs_per_sec = %format!("{:.2}", self.report.docs_per_sec()),
            "Reindex job finished"
        );
        Ok(self.report)
    }

    async fn step(&mut self) -> Result<JobState, ReindexError> {
        match self.state {
            JobState::Init => {
                let outcome = schema::ensure_schema(self.store.as_ref(), &self.config).await?;
                self.report.schema_created = outcome.created;
                self.report.conflicts = outcome.conflicts;
                Ok(JobState::SchemaEnsured)
            }
            JobState::SchemaEnsured => {
                let start = self.checkpoints.resume_from(self.range.start).await?;
                self.effective = self.range.starting_at(start);
                self.report.start = Some(start.to_string());
                self.report.last_key = self.checkpoints.committed().map(|k| k.to_string());
                Ok(JobState::Resuming)
            }
            JobState::Resuming => {
                if self.effective.is_empty() {
                    info!(
                        job = %self.identity,
                        start = %self.effective.start,
                        end = %self.effective.end,
                        "Range already covered, nothing to do"
                    );
                    return Ok(JobState::Done);
                }
                Ok(JobState::Extracting)
            }
            JobState::Extracting => {
                let page = if self.scroll_opened {
                    self.extractor.advance().await?
                } else {
                    self.scroll_opened = true;
                    self.extractor.open(self.effective.clone()).await?
                };

                if page.docs.is_empty() {
                    debug!(job = %self.identity, "Scroll exhausted");
                    return Ok(JobState::Done);
                }
                self.page = page.docs;
                Ok(JobState::Loading)
            }
            JobState::Loading => {
                let docs = std::mem::take(&mut self.page);
                let seq = self.report.batches + 1;
                let batch = self.transformer.transform_batch(seq, &docs);
                let result = self.loader.load(&batch).await;

                self.report.batches = seq;
                self.report.docs_seen += batch.len();
                self.report.docs_loaded += result.succeeded;
                self.report.docs_quarantined += result.failed_count();
                if result.whole_batch.is_some() {
                    self.report.whole_batch_failures += 1;
                }

                self.batch = Some(batch);
                Ok(JobState::Checkpointing)
            }
            JobState::Checkpointing => {
                self.checkpoint().await;
                if self.extractor.should_advance() {
                    Ok(JobState::Extracting)
                } else {
                    Ok(JobState::Done)
                }
            }
            JobState::Done | JobState::Failed => Ok(self.state),
        }
    }

    /// Commits the highest key of the loaded batch, failed documents
    /// included. A write failure only costs progress on a rerun.
    async fn checkpoint(&mut self) {
        let Some(batch) = self.batch.take() else {
            return;
        };
        let Some(key) = batch.max_key else {
            warn!(
                job = %self.identity,
                batch_no = batch.seq,
                "Batch has no readable ordering key, checkpoint unchanged"
            );
            return;
        };

        self.extractor.record_key(key);
        match self.checkpoints.commit(key).await {
            CommitOutcome::Committed => self.report.last_key = Some(key.to_string()),
            CommitOutcome::Failed => self.report.checkpoint_failures += 1,
            CommitOutcome::Ignored => {}
        }
    }

    async fn fail(&mut self, state: JobState, err: ReindexError) -> ReindexError {
        self.state = JobState::Failed;
        let last_key = self.checkpoints.committed().map(|k| k.to_string());
        error!(
            job = %self.identity,
            state = %state,
            last_key = last_key.as_deref().unwrap_or("none"),
            cursor_expired = err.is_cursor_expired(),
            error = %err,
            "Reindex job failed"
        );

        self.quarantine.drain(self.drain_grace).await;
        ReindexError::Failed {
            state,
            last_key,
            source: Box::new(err),
        }
    }
}
