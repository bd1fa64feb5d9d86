// src/edgar/dataset.rs
//! Loads the four quarterly tables out of a downloaded archive, plus the
//! separately downloaded ticker table.
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::de::DeserializeOwned;
use zip::ZipArchive;

use crate::edgar::models::{NumericFact, PresentationRow, Submission, SymbolEntry, TagDefinition};
use crate::utils::error::LoadError;

/// Everything a transform run needs, as parsed rows.
#[derive(Debug, Default)]
pub struct LoadedTables {
    pub facts: Vec<NumericFact>,
    pub presentations: Vec<PresentationRow>,
    pub submissions: Vec<Submission>,
    pub tags: Vec<TagDefinition>,
    pub symbols: Vec<SymbolEntry>,
}

/// Loads the quarterly archive and the ticker table.
pub fn load(archive_path: &Path, ticker_path: &Path) -> Result<LoadedTables, LoadError> {
    let mut tables = load_archive(archive_path)?;
    tables.symbols = load_symbols(File::open(ticker_path)?)?;
    Ok(tables)
}

/// Parses `num`, `pre`, `sub` and `tag` out of the archive at `path`.
pub fn load_archive(path: &Path) -> Result<LoadedTables, LoadError> {
    tracing::info!("Loading dataset tables from {}", path.display());
    let mut archive = ZipArchive::new(File::open(path)?)?;

    let mut facts: Vec<NumericFact> = read_table(&mut archive, "num.txt")?;
    let before = facts.len();
    facts.retain(|fact| fact.value.is_some_and(f64::is_finite));
    tracing::info!(
        "Loaded {} numeric facts ({} dropped without a usable value)",
        facts.len(),
        before - facts.len()
    );

    let presentations: Vec<PresentationRow> = read_table(&mut archive, "pre.txt")?;
    let submissions: Vec<Submission> = read_table(&mut archive, "sub.txt")?;
    let tags: Vec<TagDefinition> = read_table(&mut archive, "tag.txt")?;
    tracing::info!(
        "Loaded {} presentation rows, {} submissions, {} tag definitions",
        presentations.len(),
        submissions.len(),
        tags.len()
    );

    Ok(LoadedTables {
        facts,
        presentations,
        submissions,
        tags,
        symbols: Vec::new(),
    })
}

/// Parses the header-less `symbol<TAB>cik` table. Symbols are upper-cased.
pub fn load_symbols<R: Read>(reader: R) -> Result<Vec<SymbolEntry>, LoadError> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .quoting(false)
        .flexible(true)
        .from_reader(reader);

    let mut entries = Vec::new();
    for record in rdr.deserialize::<SymbolEntry>() {
        match record {
            Ok(mut entry) => {
                entry.symbol = entry.symbol.trim().to_uppercase();
                entry.central_index_key = entry.central_index_key.trim().to_string();
                entries.push(entry);
            }
            Err(e) => tracing::warn!("Skipping malformed ticker row: {}", e),
        }
    }
    tracing::info!("Loaded {} ticker symbols", entries.len());
    Ok(entries)
}

fn read_table<T: DeserializeOwned>(
    archive: &mut ZipArchive<File>,
    name: &str,
) -> Result<Vec<T>, LoadError> {
    let entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => {
            return Err(LoadError::MissingTable(name.to_string()))
        }
        Err(e) => return Err(e.into()),
    };
    parse_table(entry, name)
}

/// Tab-delimited with a header row. SEC labels contain bare quotes, so quoting is off.
fn parse_table<T: DeserializeOwned, R: Read>(reader: R, name: &str) -> Result<Vec<T>, LoadError> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .quoting(false)
        .flexible(true)
        .from_reader(reader);

    // Fail on a missing header rather than silently skipping every row.
    rdr.headers()?;

    let mut rows = Vec::new();
    let mut malformed = 0usize;
    for record in rdr.deserialize::<T>() {
        match record {
            Ok(row) => rows.push(row),
            Err(e) => {
                malformed += 1;
                tracing::debug!("Skipping malformed row in {}: {}", name, e);
            }
        }
    }
    if malformed > 0 {
        tracing::warn!("Skipped {} malformed rows in {}", malformed, name);
    }
    Ok(rows)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    pub(crate) const NUM: &str = "adsh\ttag\tversion\tddate\tqtrs\tuom\tvalue\n\
        A1\tAssets\tus-gaap/2022\t20220331\t0\tUSD\t1000000\n\
        A1\tLiabilities\tus-gaap/2022\t20220331\t0\tUSD\t500000\n\
        A1\tRevenue\tus-gaap/2022\t20220331\t1\tUSD\t750000\n\
        A1\tAssets\tus-gaap/2022\t20211231\t0\tUSD\t\n";
    pub(crate) const PRE: &str = "adsh\treport\tline\tstmt\ttag\tplabel\n\
        A1\t2\t1\tBS\tAssets\tTotal Assets\n\
        A1\t2\t2\tBS\tLiabilities\tTotal Liabilities\n\
        A1\t4\t1\tIC\tRevenue\tTotal \"net\" Revenue\n";
    pub(crate) const SUB: &str = "adsh\tcik\tname\tcountryma\tcityma\tperiod\tfy\tfp\tform\n\
        A1\t123456\tTest Company\tUS\tNew York\t20220331\t2022\tQ1\t10-Q\n";
    pub(crate) const TAG: &str = "tag\tversion\tdoc\n\
        Assets\tus-gaap/2022\tTotal Assets\n\
        Liabilities\tus-gaap/2022\tTotal Liabilities\n\
        Revenue\tus-gaap/2022\tTotal Revenue\n";
    pub(crate) const TICKER: &str = "test\t123456\nother\t999\n";

    /// Builds an in-memory quarterly archive from raw table text.
    pub(crate) fn archive_bytes(tables: &[(&str, &str)]) -> Vec<u8> {
        let mut zw = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in tables {
            zw.start_file(*name, SimpleFileOptions::default()).unwrap();
            zw.write_all(body.as_bytes()).unwrap();
        }
        zw.finish().unwrap().into_inner()
    }

    pub(crate) fn write_fixture(dir: &Path) -> (std::path::PathBuf, std::path::PathBuf) {
        let archive = dir.join("2022q1.zip");
        std::fs::write(
            &archive,
            archive_bytes(&[("num.txt", NUM), ("pre.txt", PRE), ("sub.txt", SUB), ("tag.txt", TAG)]),
        )
        .unwrap();
        let ticker = dir.join("ticker.txt");
        std::fs::write(&ticker, TICKER).unwrap();
        (archive, ticker)
    }

    #[test]
    fn test_load_projects_and_drops_null_values() {
        let dir = tempfile::tempdir().unwrap();
        let (archive, ticker) = write_fixture(dir.path());

        let tables = load(&archive, &ticker).unwrap();
        assert_eq!(tables.facts.len(), 3, "fact without a value is dropped at load time");
        assert!(tables.facts.iter().all(|f| f.value.is_some()));
        assert_eq!(tables.presentations.len(), 3);
        assert_eq!(tables.presentations[2].label, "Total \"net\" Revenue");
        assert_eq!(tables.tags.len(), 3);

        let sub = &tables.submissions[0];
        assert_eq!(sub.central_index_key, "123456");
        assert_eq!(sub.period_start, Some(20220331));
        assert_eq!(sub.fiscal_period.as_deref(), Some("Q1"));
        assert_eq!(sub.fiscal_year, Some(2022));

        assert_eq!(tables.symbols[0].symbol, "TEST");
        assert_eq!(tables.symbols[0].central_index_key, "123456");
    }

    #[test]
    fn test_unparseable_value_is_dropped() {
        let num = "adsh\ttag\tuom\tvalue\nA1\tAssets\tUSD\tn/a\nA1\tRevenue\tUSD\t12.9\n";
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.zip");
        std::fs::write(
            &path,
            archive_bytes(&[("num.txt", num), ("pre.txt", PRE), ("sub.txt", SUB), ("tag.txt", TAG)]),
        )
        .unwrap();

        let tables = load_archive(&path).unwrap();
        assert_eq!(tables.facts.len(), 1);
        assert_eq!(tables.facts[0].tag, "Revenue");
    }

    #[test]
    fn test_missing_table_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.zip");
        std::fs::write(&path, archive_bytes(&[("num.txt", NUM)])).unwrap();

        match load_archive(&path) {
            Err(LoadError::MissingTable(name)) => assert_eq!(name, "pre.txt"),
            other => panic!("expected missing table, got {:?}", other.map(|t| t.facts.len())),
        }
    }

    #[test]
    fn test_empty_optional_fields_become_none() {
        let sub = "adsh\tcik\tname\tcountryma\tcityma\tperiod\tfy\tfp\nA2\t42\tNoCity Inc\t\t\t20230630\t\t\n";
        let rows: Vec<Submission> = parse_table(sub.as_bytes(), "sub.txt").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].city, None);
        assert_eq!(rows[0].fiscal_year, None);
        assert_eq!(rows[0].fiscal_period, None);
    }
}
