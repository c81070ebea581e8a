use crate::config::Config;
use crate::error::SheetError;
use crate::sequence::{RawRow, Row};
use crate::{logi, logok, logw};
use anyhow::Result;
use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const SCOPES: &str = "https://www.googleapis.com/auth/spreadsheets https://www.googleapis.com/auth/drive";
const JWT_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const TOKEN_LIFETIME_S: i64 = 3600;
const TOKEN_REFRESH_MARGIN_S: i64 = 60;

pub const USED_HEADER: &str = "used?";
pub const MENTIONS_HEADER: &str = "mentions toffee?";
pub const TYPE_HEADER: &str = "type";
pub const ORDER_HEADER: &str = "order";
pub const TEXT_HEADER: &str = "overlay text";
pub const EXPECTED_HEADERS: [&str; 5] = [USED_HEADER, MENTIONS_HEADER, TYPE_HEADER, ORDER_HEADER, TEXT_HEADER];

/// Durable store of rows; the only state that survives a run.
#[async_trait]
pub trait RowStore: Send + Sync {
    /// All data rows in sheet order.
    async fn list_rows(&self) -> Result<Vec<Row>>;

    /// Writes `TRUE` into the `used?` cells of the given 1-based sheet rows.
    /// Either every row is marked or none is.
    async fn mark_rows_used(&self, row_numbers: &[usize]) -> Result<()>;

    async fn mark_used(&self, row_number: usize) -> Result<()> {
        self.mark_rows_used(&[row_number]).await
    }
}

fn whitespace_regex() -> Result<&'static Regex, SheetError> {
    static WS_RE: OnceCell<Regex> = OnceCell::new();
    Ok(WS_RE.get_or_try_init(|| Regex::new(r"\s+"))?)
}

/// Lowercased header with surrounding whitespace removed and inner runs
/// collapsed to one space.
pub fn normalize_header(header: &str) -> Result<String, SheetError> {
    let lowered = header.trim().to_lowercase();
    Ok(whitespace_regex()?.replace_all(&lowered, " ").into_owned())
}

/// A1 column letters for a 0-based column index (0 -> A, 26 -> AA).
pub fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut out = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        out.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

pub fn quote_title(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Parsed worksheet contents.
#[derive(Debug, Clone)]
pub struct SheetTable {
    pub rows: Vec<Row>,
    /// 0-based index of the `used?` column.
    pub used_column: usize,
}

/// Validates the header row and turns the remaining rows into [`Row`]s.
///
/// Header matching ignores case, surrounding whitespace and column order, but
/// the set of headers must be exactly the expected five.
pub fn parse_values(values: &[Vec<Value>]) -> Result<SheetTable, SheetError> {
    let Some((header, data)) = values.split_first() else {
        return Err(SheetError::Empty);
    };

    let found = header
        .iter()
        .map(|v| normalize_header(&cell_text(v)))
        .collect::<Result<Vec<_>, _>>()?;
    let mut found_sorted = found.clone();
    found_sorted.sort();
    found_sorted.dedup();
    let mut expected_sorted: Vec<String> = EXPECTED_HEADERS.iter().map(|h| h.to_string()).collect();
    expected_sorted.sort();

    if found_sorted != expected_sorted {
        return Err(SheetError::HeaderMismatch {
            expected: EXPECTED_HEADERS.iter().map(|h| h.to_string()).collect(),
            found: header.iter().map(cell_text).collect(),
        });
    }

    let column = |name: &str| found.iter().position(|h| h == name).unwrap_or(0);
    let used_col = column(USED_HEADER);
    let mentions_col = column(MENTIONS_HEADER);
    let type_col = column(TYPE_HEADER);
    let order_col = column(ORDER_HEADER);
    let text_col = column(TEXT_HEADER);

    let rows = data
        .iter()
        .enumerate()
        .map(|(index, cells)| {
            let cell = |col: usize| cells.get(col).map(cell_text).unwrap_or_default();
            Row::from_raw(
                index,
                RawRow {
                    used: cell(used_col),
                    mentions_toffee: cell(mentions_col),
                    kind: cell(type_col),
                    order: cell(order_col),
                    overlay_text: cell(text_col),
                },
            )
        })
        .collect();

    Ok(SheetTable {
        rows,
        used_column: used_col,
    })
}

#[derive(Debug, Clone, Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    properties: TitleProps,
    #[serde(default)]
    sheets: Vec<WorksheetMeta>,
}

#[derive(Debug, Deserialize)]
struct WorksheetMeta {
    properties: TitleProps,
}

#[derive(Debug, Deserialize)]
struct TitleProps {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

struct CachedToken {
    value: String,
    expires_at: i64,
}

/// Google Sheets worksheet accessed with a service-account key.
pub struct GoogleSheet {
    client: reqwest::Client,
    key: ServiceAccountKey,
    sheet_id: String,
    worksheet: String,
    used_column: String,
    token: Mutex<Option<CachedToken>>,
}

impl GoogleSheet {
    /// Authenticates, resolves the worksheet and validates its headers.
    pub async fn connect(cfg: &Config) -> Result<Self, SheetError> {
        let key = load_key(&cfg.credentials).await?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        let mut sheet = Self {
            client,
            key,
            sheet_id: cfg.sheet_id.clone(),
            worksheet: cfg.worksheet.clone(),
            used_column: column_letter(0),
            token: Mutex::new(None),
        };

        let meta: SpreadsheetMeta = sheet
            .get_json(
                sheet.url(&[])?,
                &[("fields", "properties.title,sheets.properties.title")],
            )
            .await?;
        logok("Google Sheets authentication successful");
        logok(format!("Connected to spreadsheet: {}", meta.properties.title));

        if !meta.sheets.iter().any(|s| s.properties.title == sheet.worksheet) {
            let first = meta.sheets.first().ok_or(SheetError::NoWorksheet)?;
            logw(format!(
                "Worksheet '{}' not found; using first worksheet '{}'",
                sheet.worksheet, first.properties.title
            ));
            sheet.worksheet = first.properties.title.clone();
        }
        logok(format!("Using worksheet: {}", sheet.worksheet));

        let table = sheet.fetch_table().await?;
        if table.rows.is_empty() {
            return Err(SheetError::Empty);
        }
        sheet.used_column = column_letter(table.used_column);
        logok("Google Sheet format validated");
        logi(format!("Found {} data rows", table.rows.len()));

        Ok(sheet)
    }

    pub fn worksheet(&self) -> &str {
        &self.worksheet
    }

    async fn fetch_table(&self) -> Result<SheetTable, SheetError> {
        let range = quote_title(&self.worksheet);
        let body: ValueRange = self.get_json(self.url(&["values", &range])?, &[]).await?;
        parse_values(&body.values)
    }

    fn url(&self, tail: &[&str]) -> Result<reqwest::Url, SheetError> {
        let mut url = reqwest::Url::parse(SHEETS_API).map_err(|e| SheetError::Url(e.to_string()))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| SheetError::Url(SHEETS_API.to_string()))?;
            segments.push(&self.sheet_id);
            segments.extend(tail);
        }
        Ok(url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: reqwest::Url,
        query: &[(&str, &str)],
    ) -> Result<T, SheetError> {
        let token = self.access_token().await?;
        let resp = self.client.get(url).query(query).bearer_auth(token).send().await?;
        Ok(ensure_success(resp).await?.json().await?)
    }

    async fn access_token(&self) -> Result<String, SheetError> {
        let mut guard = self.token.lock().await;
        let now = chrono::Utc::now().timestamp();
        if let Some(cached) = guard.as_ref() {
            if cached.expires_at - TOKEN_REFRESH_MARGIN_S > now {
                return Ok(cached.value.clone());
            }
        }

        debug!("requesting Google access token for {}", self.key.client_email);
        let claims = Claims {
            iss: &self.key.client_email,
            scope: SCOPES,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + TOKEN_LIFETIME_S,
        };
        let signing_key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .map_err(|e| SheetError::Auth(format!("invalid private key: {e}")))?;
        let assertion = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &signing_key)
            .map_err(|e| SheetError::Auth(format!("failed to sign token request: {e}")))?;

        let resp = self
            .client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;
        let token: TokenResponse = ensure_success(resp)
            .await
            .map_err(|e| SheetError::Auth(e.to_string()))?
            .json()
            .await?;

        let value = token.access_token.clone();
        *guard = Some(CachedToken {
            value: token.access_token,
            expires_at: now + token.expires_in.unwrap_or(TOKEN_LIFETIME_S),
        });
        Ok(value)
    }
}

#[async_trait]
impl RowStore for GoogleSheet {
    async fn list_rows(&self) -> Result<Vec<Row>> {
        Ok(self.fetch_table().await?.rows)
    }

    async fn mark_rows_used(&self, row_numbers: &[usize]) -> Result<()> {
        if row_numbers.is_empty() {
            return Ok(());
        }
        let body = used_update_body(&self.worksheet, &self.used_column, row_numbers);
        let token = self.access_token().await?;
        let resp = self
            .client
            .post(self.url(&["values:batchUpdate"])?)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        ensure_success(resp).await?;
        Ok(())
    }
}

/// `values:batchUpdate` body setting the `used?` cell of every listed row in
/// one request.
fn used_update_body(worksheet: &str, used_column: &str, row_numbers: &[usize]) -> Value {
    let title = quote_title(worksheet);
    let data: Vec<Value> = row_numbers
        .iter()
        .map(|row| {
            serde_json::json!({
                "range": format!("{}!{}{}", title, used_column, row),
                "values": [["TRUE"]],
            })
        })
        .collect();
    serde_json::json!({ "valueInputOption": "USER_ENTERED", "data": data })
}

async fn load_key(path: &Path) -> Result<ServiceAccountKey, SheetError> {
    let credentials_error = |detail: String| SheetError::Credentials {
        path: path.to_path_buf(),
        detail,
    };
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| credentials_error(e.to_string()))?;
    serde_json::from_str(&text).map_err(|e| credentials_error(e.to_string()))
}

async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response, SheetError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(SheetError::Status {
        status: status.as_u16(),
        body: body.chars().take(300).collect(),
    })
}
