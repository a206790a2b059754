use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::debug;

use crate::tuneset::tools::error::{Result, ToolError};
use crate::tuneset::tools::extract::OverflowPolicy;
use crate::tuneset::tools::tokens::{DEFAULT_COST_PER_1K, DEFAULT_ENCODING, DEFAULT_TOKEN_LIMIT};

pub const SHEET_URL_KEY: &str = "GSPREAD_URL";
pub const CREDENTIALS_KEY: &str = "GS_CONFIG_PATH";
pub const SHEET_INDEX_KEY: &str = "SHEET_INDEX";
pub const FILENAME_KEY: &str = "FILENAME";
pub const OUTPUT_DIR_KEY: &str = "OUTPUT_DIR";
pub const ENCODING_KEY: &str = "TOKEN_ENCODING";
pub const COST_KEY: &str = "COST_PER_1K_TOKENS";
pub const TOKEN_LIMIT_KEY: &str = "TOKEN_LIMIT";
pub const OVERFLOW_POLICY_KEY: &str = "OVERFLOW_POLICY";

/// Directory the dataset is written to when none is configured.
pub const DEFAULT_OUTPUT_DIR: &str = "Output";

/// Settings for one dataset build.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Sheet location handed to the spreadsheet client.
    pub sheet_url: String,
    /// Service-account key used to authenticate the client.
    pub credentials_path: Option<PathBuf>,
    /// Zero-based worksheet index.
    pub sheet_index: usize,
    pub output_dir: PathBuf,
    pub filename: String,
    /// Token encoder name, e.g. `r50k_base`.
    pub encoding: String,
    pub cost_per_1k: f64,
    pub token_limit: usize,
    pub overflow_policy: OverflowPolicy,
}

impl Config {
    /// Loads and validates settings from a dotenv file.
    pub fn from_env_file(path: &Path) -> Result<Self> {
        Self::from_values(&read_env_file(path)?)
    }

    /// Builds settings from key/value pairs, applying defaults for optional
    /// keys.
    pub fn from_values(values: &HashMap<String, String>) -> Result<Self> {
        let lookup = |key: &str| {
            values
                .get(key)
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
        };

        let config = Self {
            sheet_url: lookup(SHEET_URL_KEY)
                .ok_or_else(|| ToolError::config(SHEET_URL_KEY, "a sheet URL is required"))?
                .to_string(),
            credentials_path: lookup(CREDENTIALS_KEY).map(PathBuf::from),
            sheet_index: parse_or(lookup(SHEET_INDEX_KEY), SHEET_INDEX_KEY, 0)?,
            output_dir: lookup(OUTPUT_DIR_KEY)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            filename: lookup(FILENAME_KEY)
                .ok_or_else(|| ToolError::config(FILENAME_KEY, "an output file name is required"))?
                .to_string(),
            encoding: lookup(ENCODING_KEY).unwrap_or(DEFAULT_ENCODING).to_string(),
            cost_per_1k: parse_or(lookup(COST_KEY), COST_KEY, DEFAULT_COST_PER_1K)?,
            token_limit: parse_or(lookup(TOKEN_LIMIT_KEY), TOKEN_LIMIT_KEY, DEFAULT_TOKEN_LIMIT)?,
            overflow_policy: lookup(OVERFLOW_POLICY_KEY)
                .map(OverflowPolicy::from_str)
                .transpose()?
                .unwrap_or_default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks invariants that hold regardless of where values came from.
    pub fn validate(&self) -> Result<()> {
        if self.sheet_url.trim().is_empty() {
            return Err(ToolError::config(SHEET_URL_KEY, "a sheet URL is required"));
        }
        if self.filename.trim().is_empty() {
            return Err(ToolError::config(FILENAME_KEY, "an output file name is required"));
        }
        if self.encoding.trim().is_empty() {
            return Err(ToolError::config(ENCODING_KEY, "an encoding name is required"));
        }
        if !self.cost_per_1k.is_finite() || self.cost_per_1k < 0.0 {
            return Err(ToolError::config(
                COST_KEY,
                format!("expected a non-negative rate, found {}", self.cost_per_1k),
            ));
        }
        if self.token_limit == 0 {
            return Err(ToolError::config(TOKEN_LIMIT_KEY, "the limit must be positive"));
        }
        Ok(())
    }

    /// Full path of the dataset file.
    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(&self.filename)
    }
}

/// Reads the raw key/value pairs of a dotenv file without touching the
/// process environment.
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let file_error =
        |err: dotenvy::Error| ToolError::config(path.display().to_string(), err.to_string());

    let mut values = HashMap::new();
    for entry in dotenvy::from_path_iter(path).map_err(file_error)? {
        let (key, value) = entry.map_err(file_error)?;
        values.insert(key, value);
    }
    debug!(path = %path.display(), keys = values.len(), "loaded configuration file");
    Ok(values)
}

fn parse_or<T>(value: Option<&str>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw
            .parse()
            .map_err(|err| ToolError::config(key, format!("cannot parse '{raw}': {err}"))),
        None => Ok(default),
    }
}
