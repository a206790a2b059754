#![allow(dead_code)]

use std::collections::HashMap;

use tuneset_tools::error::SheetError;
use tuneset_tools::extract::{OverflowPolicy, SheetExtractor};
use tuneset_tools::io::sheets::{Spreadsheet, SpreadsheetClient, Worksheet};
use tuneset_tools::normalize::Normalizer;
use tuneset_tools::tokens::{TokenCounter, TokenEstimator};

/// Counts one token per whitespace-delimited word, which makes token totals
/// easy to reason about in assertions.
pub struct WordCounter;

impl TokenCounter for WordCounter {
    fn count_tokens(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }

    fn name(&self) -> &str {
        "words"
    }
}

pub fn estimator(token_limit: usize) -> TokenEstimator {
    TokenEstimator::new(Box::new(WordCounter), 0.03, token_limit)
}

pub fn normalizer(token_limit: usize) -> Normalizer {
    Normalizer::new(estimator(token_limit))
}

pub fn extractor(token_limit: usize, policy: OverflowPolicy) -> SheetExtractor {
    SheetExtractor::new(normalizer(token_limit), policy)
}

pub fn rows(values: &[&[&str]]) -> Vec<Vec<String>> {
    values
        .iter()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .collect()
}

/// Serves worksheets held in memory, keyed by URL.
#[derive(Default)]
pub struct MemoryClient {
    sheets: HashMap<String, Vec<Worksheet>>,
}

impl MemoryClient {
    pub fn with_sheet(mut self, url: &str, worksheets: Vec<Worksheet>) -> Self {
        self.sheets.insert(url.to_string(), worksheets);
        self
    }
}

pub struct MemorySheet {
    worksheets: Vec<Worksheet>,
}

impl SpreadsheetClient for MemoryClient {
    type Sheet = MemorySheet;

    fn open_by_url(&self, url: &str) -> tuneset_tools::Result<MemorySheet> {
        let worksheets = self
            .sheets
            .get(url)
            .cloned()
            .ok_or_else(|| SheetError::UnsupportedLocation(url.to_string()))?;
        Ok(MemorySheet { worksheets })
    }
}

impl Spreadsheet for MemorySheet {
    fn get_worksheet(&mut self, index: usize) -> tuneset_tools::Result<Worksheet> {
        self.worksheets.get(index).cloned().ok_or_else(|| {
            SheetError::MissingWorksheet {
                index,
                available: self.worksheets.len(),
            }
            .into()
        })
    }
}
