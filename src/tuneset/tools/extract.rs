use std::fmt;
use std::str::FromStr;

use tracing::{debug, info, instrument, warn};

use crate::tuneset::tools::error::{Result, SheetError, ToolError};
use crate::tuneset::tools::io::sheets::{Spreadsheet, SpreadsheetClient};
use crate::tuneset::tools::model::{Extraction, RawRow, RejectedRow};
use crate::tuneset::tools::normalize::Normalizer;

/// What to do with a row whose pair exceeds the token limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Record the row in the report and keep going.
    #[default]
    Collect,
    /// Stop the extraction with the error.
    Abort,
}

impl FromStr for OverflowPolicy {
    type Err = ToolError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "collect" => Ok(OverflowPolicy::Collect),
            "abort" => Ok(OverflowPolicy::Abort),
            other => Err(ToolError::config(
                "OVERFLOW_POLICY",
                format!("expected 'collect' or 'abort', found '{other}'"),
            )),
        }
    }
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowPolicy::Collect => write!(f, "collect"),
            OverflowPolicy::Abort => write!(f, "abort"),
        }
    }
}

/// Walks worksheet rows and normalises every usable prompt/completion pair.
#[derive(Debug)]
pub struct SheetExtractor {
    normalizer: Normalizer,
    policy: OverflowPolicy,
}

impl SheetExtractor {
    pub fn new(normalizer: Normalizer, policy: OverflowPolicy) -> Self {
        Self { normalizer, policy }
    }

    /// Opens the sheet at `url` through `client` and extracts the worksheet at
    /// `sheet_index`.
    #[instrument(level = "info", skip(self, client), fields(policy = %self.policy))]
    pub fn extract_from<C: SpreadsheetClient>(
        &self,
        client: &C,
        url: &str,
        sheet_index: usize,
    ) -> Result<Extraction> {
        let mut sheet = client.open_by_url(url)?;
        let worksheet = sheet.get_worksheet(sheet_index)?;
        let rows = worksheet.get_all_values();
        info!(
            worksheet = worksheet.title(),
            row_count = rows.len(),
            "fetched worksheet values"
        );
        self.extract(rows)
    }

    /// Extracts records from `rows`.
    ///
    /// The first row is a header and is always skipped. Later rows use their
    /// first two cells as prompt and completion; rows where either is blank
    /// are skipped. Rows over the token limit are handled per the
    /// [`OverflowPolicy`].
    pub fn extract(&self, rows: &[Vec<String>]) -> Result<Extraction> {
        let mut extraction = Extraction::default();

        for (index, cells) in rows.iter().enumerate().skip(1) {
            let row_number = index + 1;
            let raw = raw_row(row_number, cells)?;
            if raw.is_blank() {
                debug!(row = row_number, "skipping row with an empty cell");
                extraction.skipped_empty += 1;
                continue;
            }

            match self.normalizer.normalize(&raw.prompt, &raw.completion) {
                Ok((record, metrics)) => {
                    debug!(
                        row = row_number,
                        tokens = metrics.token_count,
                        words = metrics.word_count,
                        "accepted row"
                    );
                    extraction.records.push(record);
                    extraction.totals += metrics;
                }
                Err(error @ ToolError::TokenLimitExceeded { .. })
                    if self.policy == OverflowPolicy::Collect =>
                {
                    warn!(row = row_number, %error, "rejected row");
                    extraction.rejected.push(RejectedRow {
                        row: row_number,
                        error,
                    });
                }
                Err(error) => return Err(error),
            }
        }

        info!(
            accepted = extraction.totals.accepted,
            skipped = extraction.skipped_empty,
            rejected = extraction.rejected.len(),
            "extraction finished"
        );
        Ok(extraction)
    }
}

fn raw_row(row_number: usize, cells: &[String]) -> Result<RawRow> {
    match cells {
        [prompt, completion, ..] => Ok(RawRow::new(prompt.as_str(), completion.as_str())),
        _ => Err(SheetError::MalformedRow {
            row: row_number,
            cells: cells.len(),
        }
        .into()),
    }
}
