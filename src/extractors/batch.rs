// src/extractors/batch.rs
//! Fans submissions out over tokio's blocking pool, chunk by chunk.
//!
//! Within a chunk at most `workers` normalizations are in flight; results are
//! written as they complete. Every task of chunk *k* finishes (document, skip,
//! panic or timeout) before chunk *k + 1* is started, which bounds how many
//! documents are held in memory at once.
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;

use crate::edgar::models::{NumericFact, Submission};
use crate::extractors::lookups::{FactIndex, Lookups};
use crate::extractors::statement::{self, FinancialStatementDocument, NormalizeOptions, SkipReason};
use crate::storage::DocumentWriter;
use crate::utils::error::StorageError;

pub const DEFAULT_CHUNK_SIZE: usize = 5000;

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub chunks: usize,
    pub submissions: usize,
    pub written: usize,
    pub skipped: usize,
    /// Panicked or timed out.
    pub failed: usize,
    /// Documents that replaced one written earlier in the same run.
    pub overwritten: usize,
}

#[derive(Debug, Clone)]
pub struct BatchDispatcher {
    pub chunk_size: usize,
    pub workers: usize,
    pub task_timeout: Option<Duration>,
    pub options: NormalizeOptions,
}

impl Default for BatchDispatcher {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            workers: default_workers(),
            task_timeout: None,
            options: NormalizeOptions::default(),
        }
    }
}

pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

type NormalizeFn = fn(
    &Submission,
    &[NumericFact],
    &Lookups,
    &NormalizeOptions,
) -> Result<FinancialStatementDocument, SkipReason>;

enum TaskOutcome {
    Document(Box<FinancialStatementDocument>),
    Skipped(SkipReason),
    Failed(String),
}

impl BatchDispatcher {
    /// Normalizes every submission and writes the accepted documents.
    ///
    /// Only storage errors end the run early; anything that goes wrong with a
    /// single submission is logged and counted.
    pub async fn run(
        &self,
        submissions: Vec<Submission>,
        facts: Arc<FactIndex>,
        lookups: Arc<Lookups>,
        writer: &mut DocumentWriter,
    ) -> Result<BatchReport, StorageError> {
        self.run_with(statement::normalize, submissions, facts, lookups, writer)
            .await
    }

    async fn run_with(
        &self,
        normalize: NormalizeFn,
        submissions: Vec<Submission>,
        facts: Arc<FactIndex>,
        lookups: Arc<Lookups>,
        writer: &mut DocumentWriter,
    ) -> Result<BatchReport, StorageError> {
        let chunk_size = self.chunk_size.max(1);
        let workers = self.workers.max(1);
        let options = Arc::new(self.options.clone());
        let total = submissions.len();

        let mut report = BatchReport {
            submissions: total,
            ..Default::default()
        };

        let mut remaining = submissions.into_iter().map(Arc::new).peekable();
        let mut chunk_start = 0;
        while remaining.peek().is_some() {
            let chunk: Vec<Arc<Submission>> = remaining.by_ref().take(chunk_size).collect();
            let chunk_end = chunk_start + chunk.len();
            report.chunks += 1;
            tracing::info!(
                "Processing chunk <{}> - <{}> of {} with {} workers",
                chunk_start,
                chunk_end,
                total,
                workers
            );

            let mut queue = chunk.into_iter();
            let mut in_flight = JoinSet::new();
            loop {
                while in_flight.len() < workers {
                    let Some(submission) = queue.next() else { break };
                    in_flight.spawn(process(
                        normalize,
                        submission,
                        Arc::clone(&facts),
                        Arc::clone(&lookups),
                        Arc::clone(&options),
                        self.task_timeout,
                    ));
                }

                let Some(joined) = in_flight.join_next().await else { break };
                match joined {
                    Ok((submission_id, TaskOutcome::Document(document))) => {
                        writer.write(&submission_id, &document).await?;
                        report.written += 1;
                        tracing::debug!("Processed submission <{}> as {}", submission_id, document.symbol);
                    }
                    Ok((submission_id, TaskOutcome::Skipped(reason))) => {
                        report.skipped += 1;
                        tracing::warn!("Skipping submission <{}>: {}", submission_id, reason);
                    }
                    Ok((submission_id, TaskOutcome::Failed(cause))) => {
                        report.failed += 1;
                        tracing::error!("Error processing submission <{}>: {}", submission_id, cause);
                    }
                    Err(e) => {
                        report.failed += 1;
                        tracing::error!("Submission task failed: {}", e);
                    }
                }
            }

            chunk_start = chunk_end;
        }

        report.overwritten = writer.overwritten();
        Ok(report)
    }
}

async fn process(
    normalize: NormalizeFn,
    submission: Arc<Submission>,
    facts: Arc<FactIndex>,
    lookups: Arc<Lookups>,
    options: Arc<NormalizeOptions>,
    timeout: Option<Duration>,
) -> (String, TaskOutcome) {
    let submission_id = submission.submission_id.clone();
    let work = tokio::task::spawn_blocking(move || {
        let rows = facts.for_submission(&submission.submission_id);
        normalize(&submission, rows, &lookups, &options)
    });

    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, work).await {
            Ok(joined) => joined,
            // The blocking thread keeps running; we just stop waiting for it.
            Err(_) => {
                return (submission_id, TaskOutcome::Failed(format!("timed out after {:?}", limit)))
            }
        },
        None => work.await,
    };

    let outcome = match joined {
        Ok(Ok(document)) => TaskOutcome::Document(Box::new(document)),
        Ok(Err(reason)) => TaskOutcome::Skipped(reason),
        Err(e) => TaskOutcome::Failed(e.to_string()),
    };
    (submission_id, outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edgar::models::{DatasetId, PresentationRow, SymbolEntry, TagDefinition};
    use crate::extractors::statement::tests::{fact, submission};

    fn lookups_for(n: usize) -> Lookups {
        let tags = vec![TagDefinition {
            tag: "Assets".to_string(),
            documentation: Some("Total Assets".to_string()),
        }];
        let presentations: Vec<PresentationRow> = (0..n)
            .map(|i| PresentationRow {
                submission_id: format!("S{}", i),
                tag: "Assets".to_string(),
                statement: "BS".to_string(),
                label: "Assets".to_string(),
            })
            .collect();
        let symbols: Vec<SymbolEntry> = (0..n)
            .map(|i| SymbolEntry {
                symbol: format!("SYM{}", i),
                central_index_key: (1000 + i).to_string(),
            })
            .collect();
        Lookups::build(&tags, &presentations, &symbols)
    }

    fn batch(n: usize) -> (Vec<Submission>, Vec<NumericFact>) {
        let subs = (0..n)
            .map(|i| submission(&format!("S{}", i), &(1000 + i).to_string(), "Q1"))
            .collect();
        let facts = (0..n)
            .map(|i| fact(&format!("S{}", i), "Assets", Some(i as f64)))
            .collect();
        (subs, facts)
    }

    fn panics_on_s7777(
        submission: &Submission,
        facts: &[NumericFact],
        lookups: &Lookups,
        options: &NormalizeOptions,
    ) -> Result<FinancialStatementDocument, SkipReason> {
        if submission.submission_id == "S7777" {
            panic!("unexpected value in submission S7777");
        }
        statement::normalize(submission, facts, lookups, options)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_large_batch_is_chunked_and_isolates_failures() {
        let n = 12_000;
        let (subs, facts) = batch(n);

        let dir = tempfile::tempdir().unwrap();
        let mut writer = DocumentWriter::new(dir.path(), DatasetId::new(2022, 1)).unwrap();
        let dispatcher = BatchDispatcher {
            workers: 8,
            ..Default::default()
        };

        let report = dispatcher
            .run_with(
                panics_on_s7777,
                subs,
                Arc::new(FactIndex::build(facts)),
                Arc::new(lookups_for(n)),
                &mut writer,
            )
            .await
            .unwrap();

        assert_eq!(report.chunks, 3);
        assert_eq!(report.submissions, 12_000);
        assert_eq!(report.written, 11_999);
        assert_eq!(report.skipped, 0);
        assert_eq!(report.failed, 1);

        let files = std::fs::read_dir(dir.path().join("2022q1")).unwrap().count();
        assert_eq!(files, 11_999);
        assert!(!dir.path().join("2022q1").join("SYM7777_Q1_2022.json").exists());
    }

    fn sleeps_on_s1(
        submission: &Submission,
        facts: &[NumericFact],
        lookups: &Lookups,
        options: &NormalizeOptions,
    ) -> Result<FinancialStatementDocument, SkipReason> {
        if submission.submission_id == "S1" {
            std::thread::sleep(Duration::from_millis(500));
        }
        statement::normalize(submission, facts, lookups, options)
    }

    #[tokio::test]
    async fn test_task_timeout_counts_as_failure() {
        let (subs, facts) = batch(3);
        let dir = tempfile::tempdir().unwrap();
        let mut writer = DocumentWriter::new(dir.path(), DatasetId::new(2022, 1)).unwrap();
        let dispatcher = BatchDispatcher {
            task_timeout: Some(Duration::from_millis(50)),
            ..Default::default()
        };

        let report = dispatcher
            .run_with(
                sleeps_on_s1,
                subs,
                Arc::new(FactIndex::build(facts)),
                Arc::new(lookups_for(3)),
                &mut writer,
            )
            .await
            .unwrap();

        assert_eq!(report.written, 2);
        assert_eq!(report.failed, 1);
    }

    #[tokio::test]
    async fn test_skips_and_documents_are_counted() {
        let (mut subs, facts) = batch(5);
        subs[1].fiscal_period = Some("ZZ".to_string());
        subs[3].central_index_key = "424242".to_string();
        subs[4].period_start = Some(99_999_999);

        let dir = tempfile::tempdir().unwrap();
        let mut writer = DocumentWriter::new(dir.path(), DatasetId::new(2022, 1)).unwrap();
        let dispatcher = BatchDispatcher {
            chunk_size: 2,
            workers: 2,
            ..Default::default()
        };
        let report = dispatcher
            .run(subs, Arc::new(FactIndex::build(facts)), Arc::new(lookups_for(5)), &mut writer)
            .await
            .unwrap();

        assert_eq!(
            report,
            BatchReport {
                chunks: 3,
                submissions: 5,
                written: 2,
                skipped: 3,
                failed: 0,
                overwritten: 0,
            }
        );
    }

    #[tokio::test]
    async fn test_rerun_produces_identical_documents() {
        let (subs, facts) = batch(50);
        let facts = Arc::new(FactIndex::build(facts));
        let lookups = Arc::new(lookups_for(50));
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();

        for dir in [&dir_a, &dir_b] {
            let mut writer = DocumentWriter::new(dir.path(), DatasetId::new(2022, 1)).unwrap();
            BatchDispatcher {
                chunk_size: 7,
                workers: 3,
                ..Default::default()
            }
            .run(subs.clone(), Arc::clone(&facts), Arc::clone(&lookups), &mut writer)
            .await
            .unwrap();
        }

        for i in 0..50 {
            let name = format!("SYM{}_Q1_2022.json", i);
            let a = std::fs::read(dir_a.path().join("2022q1").join(&name)).unwrap();
            let b = std::fs::read(dir_b.path().join("2022q1").join(&name)).unwrap();
            assert_eq!(a, b, "{} differs between runs", name);
        }
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = DocumentWriter::new(dir.path(), DatasetId::new(2022, 1)).unwrap();
        let report = BatchDispatcher::default()
            .run(Vec::new(), Arc::default(), Arc::default(), &mut writer)
            .await
            .unwrap();
        assert_eq!(report.chunks, 0);
        assert_eq!(report.written, 0);
    }
}
