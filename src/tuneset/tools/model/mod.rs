use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

use crate::tuneset::tools::error::ToolError;

/// A prompt/completion pair exactly as it was read from two spreadsheet cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub prompt: String,
    pub completion: String,
}

impl RawRow {
    /// Creates a raw row from the two cell values.
    pub fn new(prompt: impl Into<String>, completion: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            completion: completion.into(),
        }
    }

    /// Returns `true` when either cell is empty or holds only whitespace.
    pub fn is_blank(&self) -> bool {
        self.prompt.trim().is_empty() || self.completion.trim().is_empty()
    }
}

/// A normalised training example. Serialises as `{"prompt": .., "completion": ..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    prompt: String,
    completion: String,
}

impl Record {
    /// Creates a record from already normalised text.
    pub fn new(prompt: impl Into<String>, completion: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            completion: completion.into(),
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn completion(&self) -> &str {
        &self.completion
    }
}

/// Token accounting for a single prompt/completion pair.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Metrics {
    /// Whitespace-delimited words in `prompt + " " + completion`.
    pub word_count: usize,
    /// Encoded tokens in `prompt + " " + completion`.
    pub token_count: usize,
    /// Estimated fine-tuning cost of the tokens.
    pub estimated_cost: f64,
}

/// Aggregate metrics over every accepted row of one extraction.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RunTotals {
    pub accepted: usize,
    pub word_count: usize,
    pub token_count: usize,
    pub estimated_cost: f64,
}

impl AddAssign<Metrics> for RunTotals {
    fn add_assign(&mut self, metrics: Metrics) {
        self.accepted += 1;
        self.word_count += metrics.word_count;
        self.token_count += metrics.token_count;
        self.estimated_cost += metrics.estimated_cost;
    }
}

/// A data row that was dropped because it failed validation.
#[derive(Debug)]
pub struct RejectedRow {
    /// One-based row number in the worksheet, header included.
    pub row: usize,
    pub error: ToolError,
}

/// Everything an extraction produced: the records in sheet order plus the
/// bookkeeping needed to report on the run.
#[derive(Debug, Default)]
pub struct Extraction {
    pub records: Vec<Record>,
    pub totals: RunTotals,
    pub rejected: Vec<RejectedRow>,
    /// Rows skipped because a cell was empty or only whitespace.
    pub skipped_empty: usize,
}
