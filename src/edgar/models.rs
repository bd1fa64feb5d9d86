// src/edgar/models.rs
//! Row types for the quarterly Financial Statement Data Sets.
//!
//! Each struct projects only the columns the statement joins need; the csv
//! deserializer matches by header name and ignores every other column.
use serde::Deserialize;

/// One row of `num.txt`: a single reported quantity.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NumericFact {
    #[serde(rename = "adsh")]
    pub submission_id: String,
    pub tag: String,
    #[serde(deserialize_with = "csv::invalid_option")]
    pub value: Option<f64>,
    #[serde(rename = "uom")]
    pub unit: String,
}

/// One row of `pre.txt`: where a tag is presented for a given submission.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PresentationRow {
    #[serde(rename = "adsh")]
    pub submission_id: String,
    pub tag: String,
    #[serde(rename = "stmt", default)]
    pub statement: String,
    #[serde(rename = "plabel", default)]
    pub label: String,
}

/// One row of `tag.txt`. Standard tags without documentation keep an empty label.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TagDefinition {
    pub tag: String,
    #[serde(rename = "doc", deserialize_with = "csv::invalid_option")]
    pub documentation: Option<String>,
}

/// One row of `sub.txt`: the filing itself.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Submission {
    #[serde(rename = "adsh")]
    pub submission_id: String,
    #[serde(rename = "cik")]
    pub central_index_key: String,
    #[serde(rename = "name", default)]
    pub legal_name: String,
    #[serde(rename = "countryma", deserialize_with = "csv::invalid_option")]
    pub country: Option<String>,
    #[serde(rename = "cityma", deserialize_with = "csv::invalid_option")]
    pub city: Option<String>,
    /// Balance sheet date as `YYYYMMDD`.
    #[serde(rename = "period", deserialize_with = "csv::invalid_option")]
    pub period_start: Option<u32>,
    #[serde(rename = "fp", deserialize_with = "csv::invalid_option")]
    pub fiscal_period: Option<String>,
    #[serde(rename = "fy", deserialize_with = "csv::invalid_option")]
    pub fiscal_year: Option<i32>,
}

/// One line of `ticker.txt` (no header): `symbol<TAB>cik`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SymbolEntry {
    pub symbol: String,
    pub central_index_key: String,
}

/// Identifies one quarterly dataset, e.g. `2024q4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DatasetId {
    pub year: u16,
    pub quarter: u8,
}

impl DatasetId {
    pub fn new(year: u16, quarter: u8) -> Self {
        Self { year, quarter }
    }

    /// Directory / file stem used both by the SEC and by our output tree.
    pub fn stem(&self) -> String {
        format!("{}q{}", self.year, self.quarter)
    }

    pub fn archive_name(&self) -> String {
        format!("{}.zip", self.stem())
    }
}

impl std::fmt::Display for DatasetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}Q{}", self.year, self.quarter)
    }
}
