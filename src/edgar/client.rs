// src/edgar/client.rs
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{header, StatusCode};
use tokio::io::AsyncWriteExt;

use crate::edgar::models::DatasetId;
use crate::edgar::retry::RetryPolicy;
use crate::utils::error::AcquireError;

// Identifies us to the SEC; their fair-access policy rejects anonymous clients.
pub const DEFAULT_USER_AGENT: &str = "SEC Statements Pipeline admin@example.com";
pub const DEFAULT_ARCHIVE_BASE_URL: &str =
    "https://www.sec.gov/files/dera/data/financial-statement-data-sets";
pub const DEFAULT_TICKER_URL: &str = "https://www.sec.gov/include/ticker.txt";
pub const TICKER_FILE_NAME: &str = "ticker.txt";

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

// Every non-blank line of ticker.txt looks like "aapl\t320193".
static TICKER_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\t\s]+\t\d+\r?$").expect("Failed to compile TICKER_LINE_RE")
});

#[derive(Debug, Clone)]
pub struct AcquireConfig {
    pub data_dir: PathBuf,
    pub archive_base_url: String,
    pub ticker_url: String,
    pub user_agent: String,
    /// Limit for connecting and for each read, not for the whole transfer.
    pub read_timeout: Duration,
    pub retry: RetryPolicy,
}

impl AcquireConfig {
    pub fn archive_path(&self, dataset: DatasetId) -> PathBuf {
        self.data_dir.join(dataset.archive_name())
    }

    pub fn ticker_path(&self) -> PathBuf {
        self.data_dir.join(TICKER_FILE_NAME)
    }
}

/// Downloads quarterly dataset archives and the ticker table.
#[derive(Debug)]
pub struct Acquirer {
    client: reqwest::Client,
    config: AcquireConfig,
}

impl Acquirer {
    pub fn new(config: AcquireConfig) -> Result<Self, AcquireError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone()) // Set the required User-Agent
            // No overall deadline: a 100 MB archive on a slow link is fine as long as bytes keep arriving
            .connect_timeout(config.read_timeout)
            .read_timeout(config.read_timeout)
            .build()?;
        Ok(Self { client, config })
    }

    /// Downloads the archive for `dataset`, then the ticker table.
    /// Returns whether both are now on disk; failures are logged.
    pub async fn fetch(&self, dataset: DatasetId) -> bool {
        tracing::info!("Downloading SEC data for {}", dataset);

        let archive_url = format!(
            "{}/{}",
            self.config.archive_base_url.trim_end_matches('/'),
            dataset.archive_name()
        );
        let archive_path = self.config.archive_path(dataset);
        match self
            .with_retry(&archive_url, || self.download_to(&archive_url, &archive_path, Payload::Archive))
            .await
        {
            Ok(bytes) => tracing::info!("Successfully downloaded SEC data for {} ({} bytes)", dataset, bytes),
            Err(e) => {
                tracing::error!("Giving up on {}: {}", archive_url, e);
                return false;
            }
        }

        let ticker_url = self.config.ticker_url.clone();
        let ticker_path = self.config.ticker_path();
        if let Err(e) = self
            .with_retry(&ticker_url, || self.download_to(&ticker_url, &ticker_path, Payload::TickerTable))
            .await
        {
            tracing::error!("Giving up on {}: {}", ticker_url, e);
            return false;
        }
        tracing::info!("Successfully downloaded {}", TICKER_FILE_NAME);

        true
    }

    async fn with_retry<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, AcquireError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AcquireError>>,
    {
        let policy = &self.config.retry;
        let mut attempt = 0;
        loop {
            tracing::info!("Attempt {} of {} for {}", attempt + 1, policy.max_attempts, what);
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => match policy.delay_for(attempt, &e) {
                    Some(delay) => {
                        if matches!(e, AcquireError::RateLimited) {
                            tracing::info!("Rate limited. Retrying in {:?}...", delay);
                        } else {
                            tracing::warn!("{} failed: {}. Retrying in {:?}", what, e, delay);
                        }
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => return Err(e),
                },
            }
        }
    }

    /// One GET into a `.part` file next to `dest`, renamed over `dest` once the
    /// payload is complete and valid. A rejected payload never touches `dest`.
    async fn download_to(&self, url: &str, dest: &Path, payload: Payload) -> Result<u64, AcquireError> {
        let mut response = self
            .client
            .get(url)
            .header(header::ACCEPT, "*/*")
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AcquireError::RateLimited);
        }
        if !status.is_success() {
            tracing::error!("HTTP error status: {} for URL: {}", status, url);
            return Err(AcquireError::Http(status));
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let part = part_path(dest);

        let received = match payload {
            Payload::Archive => stream_archive(&mut response, &part).await,
            Payload::TickerTable => write_ticker_table(response, &part).await,
        };
        let renamed = match received {
            Ok(bytes) => tokio::fs::rename(&part, dest)
                .await
                .map(|()| bytes)
                .map_err(AcquireError::from),
            Err(e) => Err(e),
        };
        if renamed.is_err() {
            let _ = tokio::fs::remove_file(&part).await;
        }

        let bytes = renamed?;
        tracing::debug!("Downloaded {} bytes from {}", bytes, url);
        Ok(bytes)
    }
}

/// How a download is checked before it replaces the file on disk.
#[derive(Debug, Clone, Copy)]
enum Payload {
    /// Streamed to disk; only the leading signature is held in memory.
    Archive,
    /// Small enough to validate line by line before writing.
    TickerTable,
}

fn part_path(dest: &Path) -> PathBuf {
    let mut part = dest.as_os_str().to_owned();
    part.push(".part");
    PathBuf::from(part)
}

/// Writes the body chunk by chunk. Nothing is written until the first bytes
/// have been checked against the ZIP signature.
async fn stream_archive(response: &mut reqwest::Response, part: &Path) -> Result<u64, AcquireError> {
    let mut head: Vec<u8> = Vec::with_capacity(ZIP_MAGIC.len());
    let mut file: Option<tokio::fs::File> = None;
    let mut written = 0u64;

    while let Some(chunk) = response.chunk().await? {
        if let Some(file) = file.as_mut() {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
            continue;
        }
        head.extend_from_slice(&chunk);
        if head.len() < ZIP_MAGIC.len() {
            continue;
        }
        validate_archive(&head)?;
        let mut created = tokio::fs::File::create(part).await?;
        created.write_all(&head).await?;
        written += head.len() as u64;
        file = Some(created);
    }

    // Shorter than the signature itself
    let Some(mut file) = file else {
        return Err(AcquireError::InvalidArchive);
    };
    file.flush().await?;
    Ok(written)
}

async fn write_ticker_table(response: reqwest::Response, part: &Path) -> Result<u64, AcquireError> {
    let body = response.bytes().await?;
    validate_ticker_file(&body)?;
    tokio::fs::write(part, &body).await?;
    Ok(body.len() as u64)
}

fn validate_archive(body: &[u8]) -> Result<(), AcquireError> {
    if body.starts_with(ZIP_MAGIC) {
        Ok(())
    } else {
        Err(AcquireError::InvalidArchive)
    }
}

fn validate_ticker_file(body: &[u8]) -> Result<(), AcquireError> {
    let text = std::str::from_utf8(body)
        .map_err(|_| AcquireError::InvalidTickerFile("not UTF-8".to_string()))?;
    let mut rows = 0usize;
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        if !TICKER_LINE_RE.is_match(line) {
            let preview: String = line.chars().take(40).collect();
            return Err(AcquireError::InvalidTickerFile(format!("unexpected line {:?}", preview)));
        }
        rows += 1;
    }
    if rows == 0 {
        return Err(AcquireError::InvalidTickerFile("empty".to_string()));
    }
    Ok(())
}
