// src/extractors/lookups.rs
//! Read-only join indexes built once per transform run.
//!
//! The whole [`Lookups`] value is published behind an `Arc` and shared by every
//! worker; nothing here is mutated after [`Lookups::build`] returns.
use std::collections::HashMap;

use crate::edgar::models::{NumericFact, PresentationRow, SymbolEntry, TagDefinition};

/// Financial statement a presentation row belongs to (`stmt` column).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementKind {
    BalanceSheet,
    CashFlow,
    IncomeStatement,
    /// Any other code (CI, EQ, CP, UN, ...). Never surfaced in documents.
    Other(String),
}

impl StatementKind {
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "BS" => StatementKind::BalanceSheet,
            "CF" => StatementKind::CashFlow,
            "IC" => StatementKind::IncomeStatement,
            other => StatementKind::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PresentationEntry {
    pub statement: StatementKind,
    pub label: String,
}

#[derive(Debug, Default)]
pub struct Lookups {
    tag_labels: HashMap<String, String>,
    // submission id -> tag -> entry
    presentations: HashMap<String, HashMap<String, PresentationEntry>>,
    symbols: HashMap<String, String>,
}

impl Lookups {
    /// Builds all three indexes, one pass over each table.
    /// Duplicate keys resolve last-write-wins.
    pub fn build(
        tags: &[TagDefinition],
        presentations: &[PresentationRow],
        symbols: &[SymbolEntry],
    ) -> Self {
        let mut tag_labels = HashMap::with_capacity(tags.len());
        for def in tags {
            tag_labels.insert(def.tag.clone(), def.documentation.clone().unwrap_or_default());
        }

        let mut by_submission: HashMap<String, HashMap<String, PresentationEntry>> = HashMap::new();
        for row in presentations {
            by_submission
                .entry(row.submission_id.clone())
                .or_default()
                .insert(
                    row.tag.clone(),
                    PresentationEntry {
                        statement: StatementKind::from_code(&row.statement),
                        label: row.label.clone(),
                    },
                );
        }

        let mut symbol_map = HashMap::with_capacity(symbols.len());
        for entry in symbols {
            symbol_map.insert(entry.central_index_key.clone(), entry.symbol.to_uppercase());
        }

        tracing::info!(
            "Built lookups: {} tags, {} submissions with presentation data, {} symbols",
            tag_labels.len(),
            by_submission.len(),
            symbol_map.len()
        );

        Self {
            tag_labels,
            presentations: by_submission,
            symbols: symbol_map,
        }
    }

    pub fn tag_label(&self, tag: &str) -> Option<&str> {
        self.tag_labels.get(tag).map(String::as_str)
    }

    pub fn presentation(&self, submission_id: &str, tag: &str) -> Option<&PresentationEntry> {
        self.presentations.get(submission_id)?.get(tag)
    }

    /// Resolves a CIK as given, then with leading zeros stripped.
    pub fn symbol_for(&self, cik: &str) -> Option<&str> {
        let cik = cik.trim();
        self.symbols
            .get(cik)
            .or_else(|| self.symbols.get(cik.trim_start_matches('0')))
            .map(String::as_str)
    }
}

/// Numeric facts grouped by submission id so each worker gets its slice
/// without rescanning the full fact table.
#[derive(Debug, Default)]
pub struct FactIndex {
    by_submission: HashMap<String, Vec<NumericFact>>,
}

impl FactIndex {
    pub fn build(facts: Vec<NumericFact>) -> Self {
        let mut by_submission: HashMap<String, Vec<NumericFact>> = HashMap::new();
        for fact in facts {
            by_submission.entry(fact.submission_id.clone()).or_default().push(fact);
        }
        Self { by_submission }
    }

    pub fn for_submission(&self, submission_id: &str) -> &[NumericFact] {
        self.by_submission
            .get(submission_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbol(symbol: &str, cik: &str) -> SymbolEntry {
        SymbolEntry {
            symbol: symbol.to_string(),
            central_index_key: cik.to_string(),
        }
    }

    fn pre(adsh: &str, tag: &str, stmt: &str, label: &str) -> PresentationRow {
        PresentationRow {
            submission_id: adsh.to_string(),
            tag: tag.to_string(),
            statement: stmt.to_string(),
            label: label.to_string(),
        }
    }

    #[test]
    fn test_symbol_falls_back_to_stripped_cik() {
        let lookups = Lookups::build(&[], &[], &[symbol("TEST", "123456")]);
        assert_eq!(lookups.symbol_for("123456"), Some("TEST"));
        assert_eq!(lookups.symbol_for("0000123456"), Some("TEST"));
        assert_eq!(lookups.symbol_for("654321"), None);
    }

    #[test]
    fn test_exact_cik_match_wins_over_stripped() {
        let lookups = Lookups::build(
            &[],
            &[],
            &[symbol("PADDED", "0000000042"), symbol("BARE", "42")],
        );
        assert_eq!(lookups.symbol_for("0000000042"), Some("PADDED"));
        assert_eq!(lookups.symbol_for("42"), Some("BARE"));
    }

    #[test]
    fn test_presentation_collisions_are_last_write_wins() {
        let lookups = Lookups::build(
            &[],
            &[pre("A1", "Assets", "BS", "first"), pre("A1", "Assets", "CF", "second")],
            &[],
        );
        let entry = lookups.presentation("A1", "Assets").unwrap();
        assert_eq!(entry.statement, StatementKind::CashFlow);
        assert_eq!(entry.label, "second");
        assert!(lookups.presentation("A2", "Assets").is_none());
    }

    #[test]
    fn test_statement_codes() {
        assert_eq!(StatementKind::from_code("BS"), StatementKind::BalanceSheet);
        assert_eq!(StatementKind::from_code("IC"), StatementKind::IncomeStatement);
        assert_eq!(StatementKind::from_code("CI"), StatementKind::Other("CI".to_string()));
    }

    #[test]
    fn test_fact_index_groups_by_submission() {
        let fact = |adsh: &str, tag: &str| NumericFact {
            submission_id: adsh.to_string(),
            tag: tag.to_string(),
            value: Some(1.0),
            unit: "USD".to_string(),
        };
        let index = FactIndex::build(vec![fact("A1", "Assets"), fact("A2", "Assets"), fact("A1", "Revenue")]);
        assert_eq!(index.for_submission("A1").len(), 2);
        assert_eq!(index.for_submission("A2").len(), 1);
        assert!(index.for_submission("A3").is_empty());
    }
}
