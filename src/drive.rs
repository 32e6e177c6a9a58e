//! Google Drive / Docs / Sheets backend for [`DocumentStore`].
//!
//! Authenticates as a service account: an RS256-signed JWT is exchanged for
//! a bearer token, which is cached until shortly before expiry. List
//! queries are rendered from [`ListQuery`] data into the Drive v3 filter
//! syntax with single-quote escaping on every interpolated term.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::config::StoreConfig;
use crate::store::{
    Combine, DocumentHandle, DocumentStore, ListQuery, MatchField, RangeSpec, Scope,
    StructuredDoc, MIME_FOLDER,
};

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive.readonly";
const DOCS_SCOPE: &str = "https://www.googleapis.com/auth/documents.readonly";
const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets.readonly";

/// Refresh the cached token this long before it actually expires.
const TOKEN_SLACK: Duration = Duration::from_secs(60);

// ============ Credentials ============

/// The fields of a Google service-account key file that the token exchange
/// needs. Extra fields in the JSON are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
}

impl ServiceAccountKey {
    /// Load credentials, preferring the `GOOGLE_SERVICE_ACCOUNT_JSON`
    /// environment variable (the full key JSON inline) over the configured
    /// key file path.
    pub fn load(cfg: &StoreConfig) -> Result<Self> {
        let raw = match std::env::var("GOOGLE_SERVICE_ACCOUNT_JSON") {
            Ok(json) => json,
            Err(_) => match &cfg.service_account_file {
                Some(path) => std::fs::read_to_string(path).with_context(|| {
                    format!("Failed to read service account key: {}", path.display())
                })?,
                None => bail!(
                    "No store credentials: set GOOGLE_SERVICE_ACCOUNT_JSON or [store].service_account_file"
                ),
            },
        };
        Self::parse(&raw)
    }

    fn parse(raw: &str) -> Result<Self> {
        let key: ServiceAccountKey =
            serde_json::from_str(raw).context("Malformed service account key JSON")?;
        if key.client_email.is_empty() || key.private_key.is_empty() {
            bail!("Service account key is missing client_email or private_key");
        }
        Ok(key)
    }
}

#[derive(serde::Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

struct CachedToken {
    token: String,
    good_until: Instant,
}

// ============ Client ============

/// Authenticated Drive client. Cheap to share behind an `Arc`.
pub struct DriveStore {
    http: reqwest::Client,
    key: ServiceAccountKey,
    token: Mutex<Option<CachedToken>>,
}

impl DriveStore {
    pub fn new(cfg: &StoreConfig) -> Result<Self> {
        let key = ServiceAccountKey::load(cfg)?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            key,
            token: Mutex::new(None),
        })
    }

    /// Current bearer token, exchanging a fresh JWT when the cached one is
    /// missing or near expiry.
    async fn bearer_token(&self) -> Result<String> {
        let mut guard = self.token.lock().await;
        if let Some(cached) = guard.as_ref() {
            if Instant::now() < cached.good_until {
                return Ok(cached.token.clone());
            }
        }

        let assertion = self.signed_assertion()?;
        let response = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .context("Token exchange request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Token exchange failed with {}: {}", status, body);
        }
        let token: TokenResponse = response
            .json()
            .await
            .context("Malformed token exchange response")?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_SLACK);
        *guard = Some(CachedToken {
            token: token.access_token.clone(),
            good_until: Instant::now() + lifetime,
        });
        Ok(token.access_token)
    }

    fn signed_assertion(&self) -> Result<String> {
        let now = Utc::now().timestamp();
        let scope = format!("{} {} {}", DRIVE_SCOPE, DOCS_SCOPE, SHEETS_SCOPE);
        let claims = JwtClaims {
            iss: &self.key.client_email,
            scope: &scope,
            aud: TOKEN_URL,
            iat: now,
            exp: now + 3600,
        };
        // Key files often arrive with escaped newlines in the PEM block.
        let pem = self.key.private_key.replace("\\n", "\n");
        let key = EncodingKey::from_rsa_pem(pem.as_bytes())
            .context("Service account private key is not valid RSA PEM")?;
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)
            .context("Failed to sign token assertion")
    }

    async fn get_json(&self, url: reqwest::Url) -> Result<serde_json::Value> {
        let token = self.bearer_token().await?;
        let response = self
            .http
            .get(url.clone())
            .bearer_auth(token)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url.path()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("API error {} from {}: {}", status, url.path(), body);
        }
        response.json().await.context("Malformed JSON response")
    }
}

// ============ Filter rendering ============

/// Escape a value for interpolation inside a single-quoted Drive filter
/// string literal.
fn escape_term(term: &str) -> String {
    term.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Render a [`ListQuery`] into Drive v3 `q` filter syntax. Always excludes
/// trashed items and folders; an empty term list renders no term clause.
pub fn render_filter(query: &ListQuery) -> String {
    let mut clauses = vec![
        "trashed = false".to_string(),
        format!("mimeType != '{}'", MIME_FOLDER),
    ];

    match &query.scope {
        Scope::Folder(id) => clauses.push(format!("'{}' in parents", escape_term(id))),
        Scope::SharedWithMe => clauses.push("sharedWithMe = true".to_string()),
        Scope::Anywhere => {}
    }

    if !query.terms.is_empty() {
        let field = match query.field {
            MatchField::Name => "name contains",
            MatchField::FullText => "fullText contains",
        };
        let joiner = match query.combine {
            Combine::Any => " or ",
            Combine::All => " and ",
        };
        let terms = query
            .terms
            .iter()
            .map(|t| format!("{} '{}'", field, escape_term(t)))
            .collect::<Vec<_>>()
            .join(joiner);
        clauses.push(format!("({})", terms));
    }

    clauses.join(" and ")
}

// ============ Response shapes ============

#[derive(Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<FileResource>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileResource {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    modified_time: Option<DateTime<Utc>>,
}

impl From<FileResource> for DocumentHandle {
    fn from(f: FileResource) -> Self {
        DocumentHandle {
            id: f.id,
            name: f.name,
            content_type: f.mime_type,
            modified: f.modified_time,
        }
    }
}

#[derive(Deserialize)]
struct SheetList {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Deserialize)]
struct SheetEntry {
    #[serde(default)]
    properties: SheetProperties,
}

#[derive(Deserialize, Default)]
struct SheetProperties {
    #[serde(default)]
    title: String,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

// ============ DocumentStore impl ============

#[async_trait]
impl DocumentStore for DriveStore {
    async fn list(&self, query: &ListQuery, page_size: usize) -> Result<Vec<DocumentHandle>> {
        let mut url = reqwest::Url::parse("https://www.googleapis.com/drive/v3/files")
            .context("Bad Drive list URL")?;
        url.query_pairs_mut()
            .append_pair("q", &render_filter(query))
            .append_pair("fields", "files(id,name,mimeType,modifiedTime)")
            .append_pair("orderBy", "modifiedTime desc")
            .append_pair("pageSize", &page_size.to_string())
            .append_pair("supportsAllDrives", "true")
            .append_pair("includeItemsFromAllDrives", "true")
            .append_pair("corpora", "allDrives")
            .append_pair("spaces", "drive");

        let json = self.get_json(url).await?;
        let list: FileList = serde_json::from_value(json).context("Malformed file list")?;
        Ok(list.files.into_iter().map(DocumentHandle::from).collect())
    }

    async fn get_metadata(&self, id: &str) -> Result<DocumentHandle> {
        let mut url = reqwest::Url::parse("https://www.googleapis.com/drive/v3/files")
            .context("Bad Drive metadata URL")?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Bad Drive metadata URL"))?
            .push(id);
        url.query_pairs_mut()
            .append_pair("fields", "id,name,mimeType,modifiedTime")
            .append_pair("supportsAllDrives", "true");

        let json = self.get_json(url).await?;
        let file: FileResource = serde_json::from_value(json).context("Malformed file metadata")?;
        Ok(file.into())
    }

    async fn get_content(&self, id: &str) -> Result<Vec<u8>> {
        let mut url = reqwest::Url::parse("https://www.googleapis.com/drive/v3/files")
            .context("Bad Drive download URL")?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Bad Drive download URL"))?
            .push(id);
        url.query_pairs_mut()
            .append_pair("alt", "media")
            .append_pair("supportsAllDrives", "true");

        let token = self.bearer_token().await?;
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .context("Content download failed")?;
        let status = response.status();
        if !status.is_success() {
            bail!("Content download failed with {}", status);
        }
        let bytes = response.bytes().await.context("Content download truncated")?;
        Ok(bytes.to_vec())
    }

    async fn get_structured_doc(&self, id: &str) -> Result<StructuredDoc> {
        let mut url = reqwest::Url::parse("https://docs.googleapis.com/v1/documents")
            .context("Bad Docs URL")?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Bad Docs URL"))?
            .push(id);

        let json = self.get_json(url).await?;
        serde_json::from_value(json).context("Malformed document tree")
    }

    async fn get_tabular_range(&self, id: &str, range: &RangeSpec) -> Result<Vec<Vec<String>>> {
        // The first worksheet's title is dynamic; resolve it before reading.
        let mut meta_url = reqwest::Url::parse("https://sheets.googleapis.com/v4/spreadsheets")
            .context("Bad Sheets URL")?;
        meta_url
            .path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Bad Sheets URL"))?
            .push(id);
        meta_url
            .query_pairs_mut()
            .append_pair("fields", "sheets.properties.title");

        let json = self.get_json(meta_url).await?;
        let sheets: SheetList = serde_json::from_value(json).context("Malformed sheet list")?;
        let title = sheets
            .sheets
            .first()
            .map(|s| s.properties.title.clone())
            .filter(|t| !t.is_empty())
            .context("Spreadsheet has no worksheets")?;

        let mut values_url = reqwest::Url::parse("https://sheets.googleapis.com/v4/spreadsheets")
            .context("Bad Sheets URL")?;
        values_url
            .path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Bad Sheets URL"))?
            .push(id)
            .push("values")
            .push(&format!("{}!{}", title, range.a1()));

        let json = self.get_json(values_url).await?;
        let values: ValueRange = serde_json::from_value(json).context("Malformed value range")?;
        Ok(values
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect())
    }
}

/// Sheets cells arrive as heterogeneous JSON values; render them the way
/// the UI shows them, without quoting strings.
fn cell_to_string(v: serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}
