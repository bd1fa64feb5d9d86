// src/storage/mod.rs
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::edgar::models::DatasetId;
use crate::extractors::statement::{FinancialStatementDocument, LineItem};
use crate::utils::error::StorageError;

/// Writes one JSON file per document under `{base_dir}/{year}q{quarter}/`.
pub struct DocumentWriter {
    target_dir: PathBuf,
    // output path -> submission that last wrote it, for collision reporting
    written: HashMap<PathBuf, String>,
    overwritten: usize,
}

impl DocumentWriter {
    /// Creates the writer and its quarter directory if it doesn't exist.
    pub fn new<P: AsRef<Path>>(base_dir: P, dataset: DatasetId) -> Result<Self, StorageError> {
        let target_dir = base_dir.as_ref().join(dataset.stem());

        if !target_dir.exists() {
            fs::create_dir_all(&target_dir).map_err(StorageError::IoError)?;
        }

        Ok(Self {
            target_dir,
            written: HashMap::new(),
            overwritten: 0,
        })
    }

    pub fn path_for(&self, document: &FinancialStatementDocument) -> PathBuf {
        self.target_dir.join(format!(
            "{}_{}_{}.json",
            document.symbol, document.fiscal_period, document.fiscal_year
        ))
    }

    /// Serializes `document` onto a single line and writes it, replacing any
    /// previous file at the same path.
    pub async fn write(
        &mut self,
        submission_id: &str,
        document: &FinancialStatementDocument,
    ) -> Result<PathBuf, StorageError> {
        let file_path = self.path_for(document);

        let json = serde_json::to_string(&single_line(document))
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        tokio::fs::write(&file_path, json)
            .await
            .map_err(StorageError::IoError)?;

        let previous = self.written.insert(file_path.clone(), submission_id.to_string());
        if let Some(previous) = previous.filter(|p| p != submission_id) {
            self.overwritten += 1;
            tracing::warn!(
                "Submission <{}> overwrote {} (previously written by <{}>)",
                submission_id,
                file_path.display(),
                previous
            );
        }
        tracing::debug!("Saved document to {}", file_path.display());

        Ok(file_path)
    }

    pub fn overwritten(&self) -> usize {
        self.overwritten
    }
}

/// Drops carriage returns and turns newlines into spaces in every string field.
fn single_line(document: &FinancialStatementDocument) -> FinancialStatementDocument {
    let clean = |s: &str| s.replace('\r', "").replace('\n', " ");
    let clean_items = |items: &[LineItem]| -> Vec<LineItem> {
        items
            .iter()
            .map(|item| LineItem {
                label: clean(&item.label),
                tag: clean(&item.tag),
                presentation_label: clean(&item.presentation_label),
                unit: clean(&item.unit),
                value: item.value,
            })
            .collect()
    };

    let mut out = document.clone();
    out.symbol = clean(&document.symbol);
    out.legal_name = clean(&document.legal_name);
    out.country = document.country.as_deref().map(clean);
    out.city = document.city.as_deref().map(clean);
    out.data.bs = clean_items(&document.data.bs);
    out.data.cf = clean_items(&document.data.cf);
    out.data.ic = clean_items(&document.data.ic);
    out
}
