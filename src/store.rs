//! Document-store interface and shared data types.
//!
//! The pipeline never talks to a concrete backend directly; it goes through
//! the [`DocumentStore`] trait with query predicates expressed as plain data.
//! The production implementation lives in [`crate::drive`]; tests use an
//! in-memory store.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Content types the pipeline dispatches on.
pub const MIME_FOLDER: &str = "application/vnd.google-apps.folder";
pub const MIME_GOOGLE_DOC: &str = "application/vnd.google-apps.document";
pub const MIME_GOOGLE_SHEET: &str = "application/vnd.google-apps.spreadsheet";
pub const MIME_GOOGLE_SLIDES: &str = "application/vnd.google-apps.presentation";
pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// One entry in the document store. `id` is unique and stable across
/// lookups; everything here is read-only from the pipeline's perspective.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentHandle {
    pub id: String,
    pub name: String,
    pub content_type: String,
    pub modified: Option<DateTime<Utc>>,
}

/// True for text-bearing formats worth extracting (native docs and sheets,
/// PDFs, Word files).
pub fn mime_is_doc_like(mime: &str) -> bool {
    let m = mime.to_lowercase();
    m.contains("pdf")
        || m.contains(MIME_GOOGLE_DOC)
        || m.contains(MIME_GOOGLE_SHEET)
        || m.contains("wordprocessingml.document")
        || m.contains("application/msword")
}

/// True for opaque media types (video, images) that can only be cited by
/// title.
pub fn mime_is_media(mime: &str) -> bool {
    let m = mime.to_lowercase();
    m.starts_with("video/") || m.starts_with("image/") || m.contains("quicktime")
}

/// Which indexed field a tier matches against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchField {
    Name,
    FullText,
}

/// How multiple terms combine within one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combine {
    Any,
    All,
}

/// Scope restriction for one lookup tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Restricted to children of this folder.
    Folder(String),
    /// Items shared with the requesting service identity.
    SharedWithMe,
    /// No scope restriction.
    Anywhere,
}

/// A list query as data. Implementations render this to their filter
/// syntax and must always add the implicit "not trashed, not a folder"
/// predicate. An empty `terms` list means "match everything in scope".
#[derive(Debug, Clone)]
pub struct ListQuery {
    pub terms: Vec<String>,
    pub field: MatchField,
    pub combine: Combine,
    pub scope: Scope,
}

/// Bounded rectangular range for tabular reads.
#[derive(Debug, Clone, Copy)]
pub struct RangeSpec {
    pub max_rows: u32,
    pub max_cols: u32,
}

impl RangeSpec {
    /// A1-notation for this range, e.g. `A1:Z200`. Columns are clamped to
    /// a single letter (26 columns) which is all the pipeline ever reads.
    pub fn a1(&self) -> String {
        let col = (b'A' + (self.max_cols.clamp(1, 26) as u8 - 1)) as char;
        format!("A1:{}{}", col, self.max_rows.max(1))
    }
}

// ============ Structured document tree ============
//
// Typed mirror of the shapes the extractor actually consumes (paragraph
// runs and table rows). Unknown or unexpected shapes deserialize to `None`
// or empty and degrade to "no content extracted".

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StructuredDoc {
    #[serde(default)]
    pub body: DocBody,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocBody {
    #[serde(default)]
    pub content: Vec<StructuralElement>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StructuralElement {
    #[serde(default)]
    pub paragraph: Option<Paragraph>,
    #[serde(default)]
    pub table: Option<Table>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Paragraph {
    #[serde(default)]
    pub elements: Vec<ParagraphElement>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParagraphElement {
    #[serde(default)]
    pub text_run: Option<TextRun>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TextRun {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    #[serde(default)]
    pub table_rows: Vec<TableRow>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRow {
    #[serde(default)]
    pub table_cells: Vec<TableCell>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TableCell {
    #[serde(default)]
    pub content: Vec<StructuralElement>,
}

// ============ Store trait ============

/// Read-only view of the remote document store.
///
/// Every method is a single bounded remote call; callers decide how to
/// degrade on failure (the locator absorbs per-tier errors, the extractor
/// converts them to notes).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// List documents matching the query, newest first, capped at
    /// `page_size`. Trashed items and folders are always excluded.
    async fn list(&self, query: &ListQuery, page_size: usize) -> Result<Vec<DocumentHandle>>;

    /// Fetch metadata for one document.
    async fn get_metadata(&self, id: &str) -> Result<DocumentHandle>;

    /// Download raw bytes (PDFs, Word files, other binaries).
    async fn get_content(&self, id: &str) -> Result<Vec<u8>>;

    /// Fetch the structured content tree of a native text document.
    async fn get_structured_doc(&self, id: &str) -> Result<StructuredDoc>;

    /// Read a bounded rectangular range from the first worksheet of a
    /// tabular document. Implementations resolve the worksheet name
    /// dynamically; it must not be hardcoded.
    async fn get_tabular_range(&self, id: &str, range: &RangeSpec) -> Result<Vec<Vec<String>>>;
}
