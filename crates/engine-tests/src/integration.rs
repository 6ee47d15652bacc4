#[cfg(test)]
mod tests {
    use crate::{
        QUARANTINE_INDEX, SOURCE_INDEX, TARGET_INDEX, document, rides_store,
        utils::{
            int_range, quarantine_records, rides_config, run_job, search_starts, stored_checkpoint,
        },
    };
    use connectors::memory::{BulkFault, MemoryStore};
    use engine_core::{
        error::StateError,
        state::{CheckpointStore, memory::MemoryCheckpointStore},
    };
    use engine_runtime::{
        error::ReindexError,
        execution::{JobState, partition::plan_partitions},
    };
    use model::{
        execution::job::{CollectionSettings, IdPolicy, JobConfig},
        pagination::cursor::{KeyRange, OrderingKey},
        schema::FieldMapping,
    };
    use serde_json::json;
    use std::sync::Arc;
    use tracing_test::traced_test;

    // Scenario: The target does not exist; the source index has two collections whose
    // mappings disagree on `a` (long vs keyword).
    // Expected Outcome:
    // - The target is created once with the configured settings.
    // - `a` is declared as the later collection's `keyword`, `b` as `text`.
    // - Override fields are plain `text`, the discriminator is a `keyword`.
    // - Excluded paths are absent and the clash is reported.
    #[traced_test]
    #[tokio::test]
    async fn tc01() {
        let store = rides_store(1..=4).await;
        let checkpoints = Arc::new(MemoryCheckpointStore::new());
        let config = rides_config();

        let report = run_job(&config, int_range(1, 4), None, store.clone(), checkpoints)
            .await
            .unwrap();

        assert!(report.schema_created);
        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.conflicts[0].path, "a");

        let target = store.index(TARGET_INDEX).await.unwrap();
        assert_eq!(target.settings, Some(CollectionSettings::default()));

        let mapping = target.mapping.unwrap();
        let type_of = |path: &str| mapping.get(path).and_then(|f| f.field_type.clone());
        assert_eq!(type_of("a").as_deref(), Some("keyword"));
        assert_eq!(type_of("b").as_deref(), Some("text"));
        assert_eq!(mapping.get("flag"), Some(&FieldMapping::text()));
        assert_eq!(type_of("index_type").as_deref(), Some("keyword"));
        assert_eq!(type_of("receipt.total").as_deref(), Some("float"));
        assert!(mapping.get("receipt.fare_breakdown").is_none());
        assert!(logs_contain("Conflicting field types"));
    }

    // Scenario: The target already exists.
    // Expected Outcome: No schema is applied; documents are still copied.
    #[tokio::test]
    async fn tc02() {
        let store = rides_store(1..=3).await;
        store.add_index(TARGET_INDEX, Vec::new()).await;
        let checkpoints = Arc::new(MemoryCheckpointStore::new());
        let config = rides_config();

        let report = run_job(&config, int_range(1, 3), None, store.clone(), checkpoints)
            .await
            .unwrap();

        assert!(!report.schema_created);
        assert!(report.conflicts.is_empty());
        let target = store.index(TARGET_INDEX).await.unwrap();
        assert!(target.mapping.is_none());
        assert_eq!(target.written.len(), 3);
    }

    // Scenario: A 3-document batch where the store rejects document 2.
    // Expected Outcome:
    // - Two documents land, one item quarantine record carries document 2's payload.
    // - The checkpoint is the key of document 3.
    #[tokio::test]
    async fn tc03() {
        let store = rides_store(1..=3).await;
        store.fail_items(["2"]).await;
        let checkpoints = Arc::new(MemoryCheckpointStore::new());
        let mut config = rides_config();
        config.batch_size = 3;

        let report = run_job(&config, int_range(1, 3), None, store.clone(), checkpoints.clone())
            .await
            .unwrap();

        assert_eq!(report.batches, 1);
        assert_eq!(report.docs_loaded, 2);
        assert_eq!(report.docs_quarantined, 1);
        assert_eq!(report.whole_batch_failures, 0);

        let records = quarantine_records(&store).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["kind"], json!("item"));
        assert_eq!(records[0]["document_ids"], json!(["2"]));
        assert_eq!(records[0]["payload"]["id"], json!(2));
        assert_eq!(records[0]["payload"]["index_type"], json!("ride_orders"));

        let identity = config.identity(None);
        assert_eq!(
            stored_checkpoint(checkpoints.as_ref(), &identity).await.as_deref(),
            Some("3")
        );
    }

    // Scenario: The first bulk request of a 5-document batch fails in transport.
    // Expected Outcome:
    // - One whole-batch quarantine record lists all five ids and the batch's last key.
    // - The checkpoint still advances past the batch and the job continues.
    #[tokio::test]
    async fn tc04() {
        let store = rides_store(1..=10).await;
        store.fail_bulk_call(1, BulkFault::Transport).await;
        let checkpoints = Arc::new(MemoryCheckpointStore::new());
        let mut config = rides_config();
        config.batch_size = 5;

        let report = run_job(&config, int_range(1, 10), None, store.clone(), checkpoints.clone())
            .await
            .unwrap();

        assert_eq!(report.state, JobState::Done);
        assert_eq!(report.batches, 2);
        assert_eq!(report.docs_loaded, 5);
        assert_eq!(report.docs_quarantined, 5);
        assert_eq!(report.whole_batch_failures, 1);

        let records = quarantine_records(&store).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["kind"], json!("whole_batch"));
        assert_eq!(records[0]["document_ids"], json!(["1", "2", "3", "4", "5"]));
        assert_eq!(records[0]["last_key"], json!("5"));

        let committed: Vec<String> = checkpoints
            .history()
            .await
            .into_iter()
            .map(|(_, value)| value)
            .collect();
        assert_eq!(committed, vec!["5", "10"]);
        let written: Vec<String> = store.written(TARGET_INDEX).await.into_keys().collect();
        assert_eq!(written, vec!["10", "6", "7", "8", "9"]);
    }

    // Scenario: The requested start is after the requested end.
    // Expected Outcome: Done with zero batches, no search, no checkpoint.
    #[tokio::test]
    async fn tc05() {
        let store = rides_store(1..=5).await;
        let checkpoints = Arc::new(MemoryCheckpointStore::new());
        let config = rides_config();

        let report = run_job(&config, int_range(9, 3), None, store.clone(), checkpoints.clone())
            .await
            .unwrap();

        assert_eq!(report.state, JobState::Done);
        assert_eq!(report.batches, 0);
        assert!(store.searches().await.is_empty());
        assert!(checkpoints.history().await.is_empty());
    }

    // Scenario: A checkpoint of 7 exists for the job identity.
    // Expected Outcome:
    // - No search asks for a key at or below 7.
    // - Only documents 8..=12 are written.
    #[tokio::test]
    async fn tc06() {
        let store = rides_store(1..=12).await;
        let checkpoints = Arc::new(MemoryCheckpointStore::new());
        let config = rides_config();
        checkpoints
            .set(&config.identity(None).checkpoint_key(), "7")
            .await
            .unwrap();

        let report = run_job(&config, int_range(1, 12), None, store.clone(), checkpoints)
            .await
            .unwrap();

        assert_eq!(report.start.as_deref(), Some("8"));
        assert!(
            search_starts(&store)
                .await
                .iter()
                .all(|start| *start > OrderingKey::Integer(7))
        );
        let written: Vec<String> = store.written(TARGET_INDEX).await.into_keys().collect();
        assert_eq!(written, vec!["10", "11", "12", "8", "9"]);
    }

    // Scenario: The scroll context expires after the second batch.
    // Expected Outcome:
    // - The job fails while extracting, reporting the last committed key.
    // - A rerun resumes right after that key and completes the range.
    #[traced_test]
    #[tokio::test]
    async fn tc07() {
        let store = rides_store(1..=7).await;
        store.expire_scroll_on_advance(2).await;
        let checkpoints = Arc::new(MemoryCheckpointStore::new());
        let config = rides_config();

        let err = run_job(&config, int_range(1, 7), None, store.clone(), checkpoints.clone())
            .await
            .unwrap_err();

        assert!(err.is_cursor_expired());
        assert_eq!(err.failed_state(), Some(JobState::Extracting));
        assert!(matches!(&err, ReindexError::Failed { last_key: Some(k), .. } if k == "4"));
        assert!(logs_contain("Reindex job failed"));

        let report = run_job(&config, int_range(1, 7), None, store.clone(), checkpoints)
            .await
            .unwrap();

        assert_eq!(report.state, JobState::Done);
        assert_eq!(report.start.as_deref(), Some("5"));
        assert_eq!(report.docs_seen, 3);
        assert_eq!(store.written(TARGET_INDEX).await.len(), 7);
        assert_eq!(search_starts(&store).await[1], OrderingKey::Integer(5));
    }

    // Scenario: A timestamp-keyed log job over one calendar month, tagging every
    // document with a fixed discriminator and letting the store assign ids.
    // Expected Outcome:
    // - Only March documents of the selected app are written.
    // - The checkpoint is the last March timestamp.
    // - A rerun re-requests that boundary and delivers the boundary document again.
    #[tokio::test]
    async fn tc08() {
        let store = Arc::new(MemoryStore::new());
        store.add_index("logstash", Vec::new()).await;
        store
            .insert_source(
                "logstash",
                [
                    ("l1", "2019-02-28 23:59:59.999+0000", "portal"),
                    ("l2", "2019-03-01 00:00:00.000+0000", "portal"),
                    ("l3", "2019-03-15 12:00:00.000+0000", "portal"),
                    ("l4", "2019-03-20 08:30:00.000+0000", "driver"),
                    ("l5", "2019-03-31 23:59:59.999+0000", "portal"),
                    ("l6", "2019-04-01 00:00:00.000+0000", "portal"),
                ]
                .into_iter()
                .map(|(id, ts, app)| {
                    document(id, "logs", json!({"createdAt": ts, "app": app}))
                }),
            )
            .await;
        let checkpoints = Arc::new(MemoryCheckpointStore::new());
        let config = JobConfig::from_json(
            r#"{
                "source": {"index": "logstash", "terms": {"app": "portal"}},
                "target": "logstash_march_2019",
                "key": {"field": "createdAt", "kind": "timestamp"},
                "batch_size": 2,
                "discriminator": {"field": "kind", "value": "vendor_portal"},
                "id_policy": "generate",
                "collection": {"refresh_interval": "1s"}
            }"#,
        )
        .unwrap();
        let march = KeyRange::parse_month("2019-03").unwrap();

        let report = run_job(&config, march.clone(), None, store.clone(), checkpoints.clone())
            .await
            .unwrap();

        assert_eq!(report.docs_loaded, 3);
        assert_eq!(report.last_key.as_deref(), Some("2019-03-31T23:59:59.999Z"));
        let written = store.written("logstash_march_2019").await;
        assert!(written.keys().all(|id| id.starts_with("generated-")));
        assert!(written.values().all(|doc| doc["kind"] == json!("vendor_portal")));
        assert!(written.values().all(|doc| doc["app"] == json!("portal")));

        let rerun = run_job(&config, march, None, store.clone(), checkpoints)
            .await
            .unwrap();

        assert_eq!(rerun.start.as_deref(), Some("2019-03-31T23:59:59.999Z"));
        assert_eq!(rerun.docs_seen, 1);
        assert_eq!(store.written("logstash_march_2019").await.len(), 4);
    }

    // Scenario: The range is split into two partitions that run concurrently.
    // Expected Outcome:
    // - Every document is written exactly once.
    // - Each partition keeps its own checkpoint.
    #[tokio::test]
    async fn tc09() {
        let store = rides_store(1..=20).await;
        let checkpoints = Arc::new(MemoryCheckpointStore::new());
        let config = rides_config();
        let partitions = plan_partitions(1, 20, 2).unwrap();

        let runs = partitions.iter().map(|p| {
            run_job(
                &config,
                p.range.clone(),
                Some(p.id.as_str()),
                store.clone(),
                checkpoints.clone(),
            )
        });
        let reports = futures::future::join_all(runs).await;

        assert!(reports.iter().all(|r| r.as_ref().is_ok_and(|r| r.docs_loaded == 10)));
        assert_eq!(store.written(TARGET_INDEX).await.len(), 20);

        let family = config.identity(None).family_prefix();
        let stored = checkpoints.scan_prefix(&family).await.unwrap();
        let values: Vec<&str> = stored.iter().map(|(_, v)| v.as_str()).collect();
        assert_eq!(values, vec!["10", "20"]);
        assert_eq!(
            stored_checkpoint(checkpoints.as_ref(), &config.identity(Some("p1".into())))
                .await
                .as_deref(),
            Some("20")
        );
    }

    // Scenario: The same range is run twice with derived ids and no checkpoint
    // carried between the runs.
    // Expected Outcome: The second run overwrites instead of duplicating.
    #[tokio::test]
    async fn tc10() {
        let store = rides_store(1..=6).await;
        let mut config = rides_config();
        config.id_policy = IdPolicy::Derive;

        for _ in 0..2 {
            let checkpoints = Arc::new(MemoryCheckpointStore::new());
            run_job(&config, int_range(1, 6), None, store.clone(), checkpoints)
                .await
                .unwrap();
        }

        let written = store.written(TARGET_INDEX).await;
        assert_eq!(written.len(), 6);
        assert!(written.keys().all(|id| id.starts_with("doc-")));
    }

    // Scenario: Both a bulk item and its quarantine write fail.
    // Expected Outcome: The quarantine failure is only logged; the job is Done.
    #[traced_test]
    #[tokio::test]
    async fn tc11() {
        let store = rides_store(1..=4).await;
        store.fail_items(["3"]).await;
        store.fail_single_writes(true).await;
        let checkpoints = Arc::new(MemoryCheckpointStore::new());
        let config = rides_config();

        let report = run_job(&config, int_range(1, 4), None, store.clone(), checkpoints)
            .await
            .unwrap();

        assert_eq!(report.state, JobState::Done);
        assert_eq!(report.docs_quarantined, 1);
        assert!(store.written(QUARANTINE_INDEX).await.is_empty());
        assert!(logs_contain("Failed to write quarantine record"));
    }

    // Scenario: The document store is down when the job starts.
    // Expected Outcome: The job fails in Init and writes no checkpoint.
    #[tokio::test]
    async fn tc12() {
        let store = rides_store(1..=4).await;
        store.set_unavailable(true).await;
        let checkpoints = Arc::new(MemoryCheckpointStore::new());
        let config = rides_config();

        let err = run_job(&config, int_range(1, 4), None, store, checkpoints.clone())
            .await
            .unwrap_err();

        assert_eq!(err.failed_state(), Some(JobState::Init));
        assert!(matches!(&err, ReindexError::Failed { last_key: None, .. }));
        assert!(checkpoints.history().await.is_empty());
    }

    // Scenario: The stored checkpoint does not parse as an integer key.
    // Expected Outcome: The job fails while resuming instead of guessing a start.
    #[tokio::test]
    async fn tc13() {
        let store = rides_store(1..=4).await;
        let checkpoints = Arc::new(MemoryCheckpointStore::new());
        let config = rides_config();
        checkpoints
            .set(&config.identity(None).checkpoint_key(), "2019-03-01T00:00:00Z")
            .await
            .unwrap();

        let err = run_job(&config, int_range(1, 4), None, store.clone(), checkpoints)
            .await
            .unwrap_err();

        assert_eq!(err.failed_state(), Some(JobState::SchemaEnsured));
        assert!(matches!(
            &err,
            ReindexError::Failed { source, .. }
                if matches!(source.as_ref(), ReindexError::State(StateError::Corrupt { .. }))
        ));
        assert!(store.searches().await.is_empty());
    }

    // Scenario: The source index is missing.
    // Expected Outcome: The job fails in Init and no target is created.
    #[tokio::test]
    async fn tc14() {
        let store = Arc::new(MemoryStore::new());
        let checkpoints = Arc::new(MemoryCheckpointStore::new());
        let config = rides_config();

        let err = run_job(&config, int_range(1, 4), None, store.clone(), checkpoints)
            .await
            .unwrap_err();

        assert_eq!(err.failed_state(), Some(JobState::Init));
        assert!(store.index(TARGET_INDEX).await.is_none());
        assert!(store.index(SOURCE_INDEX).await.is_none());
    }

    // Scenario: A timestamp-keyed job writing one shared target runs April before March.
    // Expected Outcome:
    // - Each month keeps its own checkpoint, so March still reads its documents.
    // - A month placeholder in the target gives each month its own index.
    #[tokio::test]
    async fn tc15() {
        let store = Arc::new(MemoryStore::new());
        store.add_index("logstash", Vec::new()).await;
        store
            .insert_source(
                "logstash",
                [
                    ("l1", "2019-03-10 09:00:00.000+0000"),
                    ("l2", "2019-03-20 09:00:00.000+0000"),
                    ("l3", "2019-04-10 00:00:00.000+0000"),
                ]
                .into_iter()
                .map(|(id, ts)| document(id, "logs", json!({"createdAt": ts}))),
            )
            .await;
        let checkpoints = Arc::new(MemoryCheckpointStore::new());
        let config = JobConfig::from_json(
            r#"{
                "source": {"index": "logstash"},
                "target": "portal_logs",
                "key": {"field": "createdAt", "kind": "timestamp"}
            }"#,
        )
        .unwrap();

        let april = config.for_month("2019-04").unwrap();
        let march = config.for_month("2019-03").unwrap();
        for (run, docs) in [(&april, 1), (&march, 2)] {
            let partition = run.partition(None);
            let report = run_job(
                &run.config,
                run.range.clone(),
                Some(partition.as_str()),
                store.clone(),
                checkpoints.clone(),
            )
            .await
            .unwrap();
            assert_eq!(report.state, JobState::Done);
            assert_eq!(report.docs_seen, docs, "{}", run.label);
        }

        assert_eq!(store.written("portal_logs").await.len(), 3);
        assert_eq!(
            stored_checkpoint(checkpoints.as_ref(), &march.identity(None))
                .await
                .as_deref(),
            Some("2019-03-20T09:00:00.000Z")
        );
        assert_eq!(
            stored_checkpoint(checkpoints.as_ref(), &april.identity(None))
                .await
                .as_deref(),
            Some("2019-04-10T00:00:00.000Z")
        );

        let mut monthly = config.clone();
        monthly.target = "logstash_{month_name}_{year}".into();
        let run = monthly.for_month("2019-03").unwrap();
        let partition = run.partition(None);
        run_job(
            &run.config,
            run.range.clone(),
            Some(partition.as_str()),
            store.clone(),
            checkpoints,
        )
        .await
        .unwrap();
        assert_eq!(store.written("logstash_march_2019").await.len(), 2);
    }
}
