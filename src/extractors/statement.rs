// src/extractors/statement.rs
//! Per-submission transform: joins a submission's numeric facts against the
//! shared lookups and produces one financial-statement document.
use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use crate::edgar::models::{NumericFact, Submission};
use crate::extractors::lookups::{Lookups, StatementKind};
use crate::extractors::period::{self, FiscalPeriod};

// --- Constants ---
const MAX_SYMBOL_LEN: usize = 19;

// --- Data Structures ---
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineItem {
    pub label: String,
    #[serde(rename = "concept")]
    pub tag: String,
    #[serde(rename = "info")]
    pub presentation_label: String,
    pub unit: String,
    pub value: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatementData {
    pub bs: Vec<LineItem>,
    pub cf: Vec<LineItem>,
    pub ic: Vec<LineItem>,
}

/// One company, one reporting period. Field names follow the output JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialStatementDocument {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(rename = "year")]
    pub fiscal_year: i32,
    #[serde(rename = "quarter")]
    pub fiscal_period: String,
    pub symbol: String,
    #[serde(rename = "name")]
    pub legal_name: String,
    pub country: Option<String>,
    pub city: Option<String>,
    pub data: StatementData,
}

/// Why a submission produced no document.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SkipReason {
    #[error("malformed period start {0:?}")]
    MalformedPeriod(Option<u32>),

    #[error("unrecognized fiscal period {0:?}")]
    UnrecognizedPeriod(String),

    #[error("no symbol for CIK <{0}>")]
    UnknownSymbol(String),

    #[error("invalid symbol <{symbol}> for CIK <{cik}>")]
    InvalidSymbol { cik: String, symbol: String },
}

#[derive(Debug, Clone, Default)]
pub struct NormalizeOptions {
    /// Log facts filed under statements outside BS/CF/IC instead of dropping them silently.
    pub report_other_statements: bool,
}

// --- Normalizer ---
/// Pure function of its inputs: same submission and lookups, same result.
pub fn normalize(
    submission: &Submission,
    facts: &[NumericFact],
    lookups: &Lookups,
    options: &NormalizeOptions,
) -> Result<FinancialStatementDocument, SkipReason> {
    let start = submission
        .period_start
        .and_then(period::parse_period_date)
        .ok_or(SkipReason::MalformedPeriod(submission.period_start))?;

    let code = submission.fiscal_period.as_deref().unwrap_or_default().trim().to_uppercase();
    let (start_date, end_date) =
        period::resolve(start, &code).ok_or_else(|| SkipReason::UnrecognizedPeriod(code.clone()))?;
    // Normalized form, e.g. " q1" -> "Q1".
    let fiscal_period = FiscalPeriod::parse(&code)
        .map(|p| p.code())
        .unwrap_or(code);

    let symbol = resolve_symbol(&submission.central_index_key, lookups)?;

    let mut data = StatementData::default();
    let mut other_statements = 0usize;
    for fact in facts {
        let Some(label) = lookups.tag_label(&fact.tag) else {
            tracing::trace!("{}: no tag definition for {}", submission.submission_id, fact.tag);
            continue;
        };
        let Some(entry) = lookups.presentation(&submission.submission_id, &fact.tag) else {
            tracing::trace!("{}: {} is not presented", submission.submission_id, fact.tag);
            continue;
        };
        let Some(value) = fact.value.filter(|v| v.is_finite()) else {
            continue;
        };

        let item = LineItem {
            label: label.to_string(),
            tag: fact.tag.clone(),
            presentation_label: entry.label.clone(),
            unit: fact.unit.clone(),
            value: value.trunc() as i64,
        };
        match entry.statement {
            StatementKind::BalanceSheet => data.bs.push(item),
            StatementKind::CashFlow => data.cf.push(item),
            StatementKind::IncomeStatement => data.ic.push(item),
            StatementKind::Other(ref code) => {
                tracing::trace!("{}: {} filed under {}", submission.submission_id, fact.tag, code);
                other_statements += 1;
            }
        }
    }

    if options.report_other_statements && other_statements > 0 {
        tracing::info!(
            "Submission <{}>: {} facts on statements other than BS/CF/IC were not included",
            submission.submission_id,
            other_statements
        );
    }

    Ok(FinancialStatementDocument {
        start_date,
        end_date,
        fiscal_year: submission.fiscal_year.unwrap_or(0),
        fiscal_period,
        symbol,
        legal_name: submission.legal_name.clone(),
        country: submission.country.clone(),
        city: submission.city.clone(),
        data,
    })
}

fn resolve_symbol(cik: &str, lookups: &Lookups) -> Result<String, SkipReason> {
    let symbol = lookups
        .symbol_for(cik)
        .ok_or_else(|| SkipReason::UnknownSymbol(cik.to_string()))?
        .to_uppercase();

    let len = symbol.chars().count();
    // Symbols become file names.
    let path_safe = !symbol.contains(|c: char| c == '/' || c == '\\') && symbol != "." && symbol != "..";
    if !(1..=MAX_SYMBOL_LEN).contains(&len) || !path_safe {
        return Err(SkipReason::InvalidSymbol {
            cik: cik.to_string(),
            symbol,
        });
    }
    Ok(symbol)
}
