use std::fmt;
use std::fs;
use std::path::PathBuf;

use tracing::{info, instrument, warn};

use crate::tuneset::tools::config::{CREDENTIALS_KEY, Config};
use crate::tuneset::tools::error::{Result, ToolError};
use crate::tuneset::tools::extract::SheetExtractor;
use crate::tuneset::tools::io::google::GoogleSheetsClient;
use crate::tuneset::tools::io::jsonl;
use crate::tuneset::tools::io::sheets::{SpreadsheetClient, WorkbookClient};
use crate::tuneset::tools::model::{RejectedRow, RunTotals};
use crate::tuneset::tools::normalize::Normalizer;
use crate::tuneset::tools::tokens::{BpeTokenizer, TokenEstimator};

/// Outcome of a completed dataset build.
#[derive(Debug)]
pub struct RunReport {
    pub output: PathBuf,
    pub record_count: usize,
    pub totals: RunTotals,
    pub rejected: Vec<RejectedRow>,
    pub skipped_empty: usize,
}

impl fmt::Display for RunReport {
    /// Human-readable run summary. The cost is printed unrounded.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total word count: {}", self.totals.word_count)?;
        writeln!(f, "Estimated tokens: {}", self.totals.token_count)?;
        writeln!(
            f,
            "Estimated cost of fine-tuning: ${}",
            self.totals.estimated_cost
        )?;
        writeln!(
            f,
            "Rows written: {}, skipped (empty): {}, rejected: {}",
            self.record_count,
            self.skipped_empty,
            self.rejected.len()
        )?;
        for rejected in &self.rejected {
            writeln!(f, "  row {}: {}", rejected.row, rejected.error)?;
        }
        writeln!(f, "Dataset: {}", self.output.display())
    }
}

/// Builds the extractor described by `config` with its BPE encoder.
pub fn extractor_for(config: &Config) -> Result<SheetExtractor> {
    let tokenizer = BpeTokenizer::from_name(&config.encoding)?;
    let estimator = TokenEstimator::new(
        Box::new(tokenizer),
        config.cost_per_1k,
        config.token_limit,
    );
    Ok(SheetExtractor::new(
        Normalizer::new(estimator),
        config.overflow_policy,
    ))
}

/// Picks the client for the configured sheet and runs the whole build.
///
/// `http(s)` locations are read from Google Sheets with the configured
/// service-account key; anything else is opened as a local workbook.
#[instrument(level = "info", skip_all, fields(sheet = %config.sheet_url))]
pub fn build_dataset(config: &Config) -> Result<RunReport> {
    let extractor = extractor_for(config)?;
    if is_remote(&config.sheet_url) {
        let credentials = config.credentials_path.as_deref().ok_or_else(|| {
            ToolError::config(
                CREDENTIALS_KEY,
                "a service-account key is required to read Google Sheets",
            )
        })?;
        let client = GoogleSheetsClient::authenticate(credentials)?;
        build_dataset_with(&client, &extractor, config)
    } else {
        build_dataset_with(&WorkbookClient::new(), &extractor, config)
    }
}

fn is_remote(url: &str) -> bool {
    let url = url.trim();
    url.starts_with("https://") || url.starts_with("http://")
}

/// Extracts the configured worksheet through `client` and writes the dataset.
#[instrument(
    level = "info",
    skip_all,
    fields(sheet_index = config.sheet_index, output = %config.output_path().display())
)]
pub fn build_dataset_with<C: SpreadsheetClient>(
    client: &C,
    extractor: &SheetExtractor,
    config: &Config,
) -> Result<RunReport> {
    config.validate()?;
    let extraction = extractor.extract_from(client, &config.sheet_url, config.sheet_index)?;

    let output = config.output_path();
    fs::create_dir_all(&config.output_dir).map_err(|source| ToolError::SerializationFailed {
        path: config.output_dir.clone(),
        source,
    })?;
    jsonl::write_records(&extraction.records, &output)?;

    let totals = extraction.totals;
    info!(
        records = extraction.records.len(),
        words = totals.word_count,
        tokens = totals.token_count,
        estimated_cost = totals.estimated_cost,
        "dataset written"
    );
    if !extraction.rejected.is_empty() {
        warn!(
            rejected = extraction.rejected.len(),
            "some rows exceeded the token limit and were left out"
        );
    }

    Ok(RunReport {
        output,
        record_count: extraction.records.len(),
        totals,
        rejected: extraction.rejected,
        skipped_empty: extraction.skipped_empty,
    })
}
