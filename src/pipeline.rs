// src/pipeline.rs
//! The two long-running operations: acquire a quarter, transform a quarter.
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::edgar::client::{AcquireConfig, Acquirer, TICKER_FILE_NAME};
use crate::edgar::dataset;
use crate::edgar::models::{DatasetId, Submission};
use crate::extractors::batch::{BatchDispatcher, BatchReport};
use crate::extractors::lookups::{FactIndex, Lookups};
use crate::storage::DocumentWriter;
use crate::utils::AppError;

#[derive(Debug, Clone)]
pub struct TransformConfig {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub dispatcher: BatchDispatcher,
}

/// Downloads the quarter's archive and the ticker table. Reports only success or failure.
pub async fn acquire(config: AcquireConfig, dataset: DatasetId) -> bool {
    match Acquirer::new(config) {
        Ok(acquirer) => acquirer.fetch(dataset).await,
        Err(e) => {
            tracing::error!("Could not build HTTP client: {}", e);
            false
        }
    }
}

/// Turns a downloaded quarter into one JSON document per company and period.
pub async fn transform(config: &TransformConfig, dataset: DatasetId) -> Result<BatchReport, AppError> {
    tracing::info!("Starting transformation for {}...", dataset.stem());
    let started = Instant::now();

    let archive_path = config.data_dir.join(dataset.archive_name());
    let ticker_path = config.data_dir.join(TICKER_FILE_NAME);
    let (submissions, facts, lookups) =
        tokio::task::spawn_blocking(move || prepare(&archive_path, &ticker_path))
            .await
            .map_err(|e| AppError::Processing(format!("Loading dataset panicked: {}", e)))??;

    tracing::info!("Preprocessing complete, starting transformation...");
    let mut writer = DocumentWriter::new(&config.output_dir, dataset)?;
    let report = config
        .dispatcher
        .run(submissions, Arc::new(facts), Arc::new(lookups), &mut writer)
        .await?;

    tracing::info!(
        "Transformation complete. {} documents written, {} skipped, {} failed, {} overwritten in {} chunks. Total processing time: {:.2} seconds",
        report.written,
        report.skipped,
        report.failed,
        report.overwritten,
        report.chunks,
        started.elapsed().as_secs_f64()
    );
    Ok(report)
}

type Prepared = (Vec<Submission>, FactIndex, Lookups);

fn prepare(archive_path: &Path, ticker_path: &Path) -> Result<Prepared, AppError> {
    let tables = dataset::load(archive_path, ticker_path)?;
    tracing::info!("Data loaded, preprocessing...");
    let lookups = Lookups::build(&tables.tags, &tables.presentations, &tables.symbols);
    let facts = FactIndex::build(tables.facts);
    Ok((tables.submissions, facts, lookups))
}
