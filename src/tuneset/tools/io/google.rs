//! Google Sheets backend authenticated with a service-account key.
//!
//! The key is exchanged for an OAuth access token through the JWT bearer
//! grant, then the Sheets v4 REST API is read with blocking requests.

use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument};
use ureq::Agent;

use crate::tuneset::tools::error::{BoxError, Result, SheetError, ToolError};
use crate::tuneset::tools::io::sheets::{Spreadsheet, SpreadsheetClient, Worksheet};

pub const SHEETS_API: &str = "https://sheets.googleapis.com/v4";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const READONLY_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets.readonly";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: u64 = 3600;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// The parts of a service-account JSON key needed to request tokens.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    /// Reads and checks a key file.
    pub fn load(path: &Path) -> Result<Self> {
        Self::read(path).map_err(|source| ToolError::AuthenticationFailed {
            path: path.to_path_buf(),
            source,
        })
    }

    fn read(path: &Path) -> std::result::Result<Self, BoxError> {
        let source = fs::read_to_string(path)?;
        let key: ServiceAccountKey = serde_json::from_str(&source)?;
        if key.client_email.trim().is_empty() {
            return Err("service-account key has an empty client_email".into());
        }
        if key.private_key.trim().is_empty() {
            return Err("service-account key has an empty private_key".into());
        }
        Ok(key)
    }

    /// Signs the RS256 assertion presented to the token endpoint.
    pub fn signed_assertion(&self, issued_at: u64) -> std::result::Result<String, BoxError> {
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: READONLY_SCOPE,
            aud: &self.token_uri,
            iat: issued_at,
            exp: issued_at + ASSERTION_LIFETIME_SECS,
        };
        let key = EncodingKey::from_rsa_pem(self.private_key.as_bytes())?;
        Ok(encode(&Header::new(Algorithm::RS256), &claims, &key)?)
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMetadata {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
    #[serde(default)]
    index: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchValues {
    #[serde(default)]
    value_ranges: Vec<ValueRange>,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Reads Google Sheets over the Sheets v4 API.
#[derive(Debug, Clone)]
pub struct GoogleSheetsClient {
    agent: Agent,
    api_base: String,
    access_token: String,
}

impl GoogleSheetsClient {
    /// Exchanges the service-account key at `credentials` for an access token.
    #[instrument(level = "info", skip_all, fields(credentials = %credentials.display()))]
    pub fn authenticate(credentials: &Path) -> Result<Self> {
        let key = ServiceAccountKey::load(credentials)?;
        let agent = new_agent();
        let access_token = request_token(&agent, &key).map_err(|source| {
            ToolError::AuthenticationFailed {
                path: credentials.to_path_buf(),
                source,
            }
        })?;
        info!(account = %key.client_email, "obtained access token");
        Ok(Self {
            agent,
            api_base: SHEETS_API.to_string(),
            access_token,
        })
    }

    /// Builds a client around an existing access token and API root.
    pub fn with_access_token(api_base: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            agent: new_agent(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        }
    }

    fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let mut request = self
            .agent
            .get(url)
            .set("Authorization", &format!("Bearer {}", self.access_token));
        for (name, value) in query {
            request = request.query(name, value);
        }
        let response = request
            .call()
            .map_err(|err| SheetError::Client(Box::new(err)))?;
        let body = response.into_json::<T>().map_err(SheetError::from)?;
        Ok(body)
    }
}

impl SpreadsheetClient for GoogleSheetsClient {
    type Sheet = GoogleSpreadsheet;

    #[instrument(level = "debug", skip(self))]
    fn open_by_url(&self, url: &str) -> Result<GoogleSpreadsheet> {
        let id = spreadsheet_id(url)
            .ok_or_else(|| SheetError::UnsupportedLocation(url.to_string()))?
            .to_string();
        let metadata: SpreadsheetMetadata = self.get_json(
            &format!("{}/spreadsheets/{id}", self.api_base),
            &[("fields", "sheets.properties(title,index)")],
        )?;

        let mut sheets: Vec<SheetProperties> = metadata
            .sheets
            .into_iter()
            .map(|entry| entry.properties)
            .collect();
        sheets.sort_by_key(|properties| properties.index);
        debug!(sheet_count = sheets.len(), "read spreadsheet metadata");

        Ok(GoogleSpreadsheet {
            client: self.clone(),
            id,
            titles: sheets.into_iter().map(|properties| properties.title).collect(),
        })
    }
}

/// A spreadsheet opened by [`GoogleSheetsClient`].
#[derive(Debug)]
pub struct GoogleSpreadsheet {
    client: GoogleSheetsClient,
    id: String,
    titles: Vec<String>,
}

impl GoogleSpreadsheet {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Spreadsheet for GoogleSpreadsheet {
    fn get_worksheet(&mut self, index: usize) -> Result<Worksheet> {
        let title = self
            .titles
            .get(index)
            .cloned()
            .ok_or(SheetError::MissingWorksheet {
                index,
                available: self.titles.len(),
            })?;
        let range = format!("'{}'", title.replace('\'', "''"));
        let batch: BatchValues = self.client.get_json(
            &format!(
                "{}/spreadsheets/{}/values:batchGet",
                self.client.api_base, self.id
            ),
            &[("ranges", range.as_str()), ("majorDimension", "ROWS")],
        )?;

        let values = batch
            .value_ranges
            .into_iter()
            .next()
            .map(|range| range.values)
            .unwrap_or_default();
        debug!(worksheet = %title, row_count = values.len(), "read worksheet values");
        Ok(Worksheet::new(title, pad_rows(values)))
    }
}

/// Extracts the document id from a `.../spreadsheets/d/<id>/...` URL.
pub fn spreadsheet_id(url: &str) -> Option<&str> {
    let (_, rest) = url.split_once("/spreadsheets/d/")?;
    let id = rest
        .split(['/', '?', '#'])
        .next()
        .filter(|id| !id.is_empty())?;
    Some(id)
}

/// The API omits trailing empty cells, so rows are padded to a common width.
fn pad_rows(values: Vec<Vec<Value>>) -> Vec<Vec<String>> {
    let width = values.iter().map(Vec::len).max().unwrap_or(0);
    values
        .into_iter()
        .map(|row| {
            let mut cells: Vec<String> = row.into_iter().map(value_to_cell).collect();
            cells.resize(width, String::new());
            cells
        })
        .collect()
}

fn value_to_cell(value: Value) -> String {
    match value {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn new_agent() -> Agent {
    ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build()
}

fn request_token(agent: &Agent, key: &ServiceAccountKey) -> std::result::Result<String, BoxError> {
    let issued_at = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
    let assertion = key.signed_assertion(issued_at)?;
    let response = agent
        .post(&key.token_uri)
        .send_form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", &assertion)])?;
    let token: TokenResponse = response.into_json()?;
    Ok(token.access_token)
}
