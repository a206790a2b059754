use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use calamine::{DataType, Range, Reader, Sheets, open_workbook_auto};
use tracing::{debug, instrument};

use crate::tuneset::tools::error::{Result, SheetError};

/// Entry point of a spreadsheet backend: resolves a sheet location.
pub trait SpreadsheetClient {
    type Sheet: Spreadsheet;

    fn open_by_url(&self, url: &str) -> Result<Self::Sheet>;
}

/// An opened spreadsheet made of zero-indexed worksheets.
pub trait Spreadsheet {
    fn get_worksheet(&mut self, index: usize) -> Result<Worksheet>;
}

/// All cell values of one worksheet, rendered as strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Worksheet {
    title: String,
    rows: Vec<Vec<String>>,
}

impl Worksheet {
    pub fn new(title: impl Into<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            title: title.into(),
            rows,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Rows of cells starting at the top-left cell of the sheet.
    pub fn get_all_values(&self) -> &[Vec<String>] {
        &self.rows
    }
}

/// Reads workbooks from the local filesystem (xlsx, xlsm, xlsb, xls, ods).
/// Locations are plain paths or `file://` URLs.
#[derive(Debug, Default)]
pub struct WorkbookClient;

impl WorkbookClient {
    pub fn new() -> Self {
        Self
    }
}

impl SpreadsheetClient for WorkbookClient {
    type Sheet = Workbook;

    #[instrument(level = "debug", skip(self))]
    fn open_by_url(&self, url: &str) -> Result<Workbook> {
        let path = resolve_location(url)?;
        if !path.is_file() {
            return Err(SheetError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("workbook {} does not exist", path.display()),
            ))
            .into());
        }
        let sheets = open_workbook_auto(&path).map_err(SheetError::from)?;
        Ok(Workbook { path, sheets })
    }
}

/// A workbook opened by [`WorkbookClient`].
pub struct Workbook {
    path: PathBuf,
    sheets: Sheets<BufReader<File>>,
}

impl Workbook {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Spreadsheet for Workbook {
    fn get_worksheet(&mut self, index: usize) -> Result<Worksheet> {
        let names = self.sheets.sheet_names().to_vec();
        let title = names
            .get(index)
            .cloned()
            .ok_or(SheetError::MissingWorksheet {
                index,
                available: names.len(),
            })?;
        let range = self
            .sheets
            .worksheet_range_at(index)
            .ok_or(SheetError::MissingWorksheet {
                index,
                available: names.len(),
            })?
            .map_err(SheetError::from)?;
        debug!(worksheet = %title, path = %self.path.display(), "read worksheet range");
        Ok(Worksheet::new(title, range_to_rows(&range)))
    }
}

fn resolve_location(url: &str) -> Result<PathBuf> {
    let url = url.trim();
    if let Some(path) = url.strip_prefix("file://") {
        return Ok(PathBuf::from(path));
    }
    if url.is_empty() || url.contains("://") {
        return Err(SheetError::UnsupportedLocation(url.to_string()).into());
    }
    Ok(PathBuf::from(url))
}

/// Expands a calamine range into rows anchored at cell A1. Calamine trims
/// leading empty rows and columns, so they are padded back in.
fn range_to_rows(range: &Range<DataType>) -> Vec<Vec<String>> {
    let Some((start_row, start_col)) = range.start() else {
        return Vec::new();
    };
    let start_col = start_col as usize;
    let width = start_col + range.width();

    let mut rows = vec![vec![String::new(); width]; start_row as usize];
    for row in range.rows() {
        let mut cells = vec![String::new(); start_col];
        cells.extend(row.iter().map(|cell| cell_to_string(Some(cell))));
        rows.push(cells);
    }
    rows
}

fn cell_to_string(cell: Option<&DataType>) -> String {
    match cell {
        Some(DataType::String(value)) => value.clone(),
        Some(DataType::Float(value)) => value.to_string(),
        Some(DataType::Int(value)) => value.to_string(),
        Some(DataType::Bool(value)) => value.to_string(),
        Some(DataType::Empty) | None => String::new(),
        Some(other) => other.to_string(),
    }
}
