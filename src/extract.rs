//! Multi-format text extraction for shortlisted documents.
//!
//! Dispatches on content type: native document trees and sheet ranges come
//! from the store's structured APIs; PDFs and Word files are downloaded as
//! bytes and parsed locally. Extraction never errors past this module's
//! boundary: every failure degrades to empty text plus an optional note, so
//! one unreadable file never blocks the answer.

use std::io::Read;

use crate::config::ExtractConfig;
use crate::store::{
    DocumentHandle, DocumentStore, Paragraph, RangeSpec, StructuredDoc, MIME_GOOGLE_DOC,
    MIME_GOOGLE_SHEET,
};

/// Maximum decompressed bytes read from a single ZIP entry (zip-bomb
/// protection for docx payloads).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Bounded plain text for one document, plus an optional diagnostic note
/// when extraction degraded.
#[derive(Debug, Clone, Default)]
pub struct ExtractedText {
    pub text: String,
    pub note: Option<String>,
}

impl ExtractedText {
    pub fn empty() -> Self {
        Self::default()
    }

    fn noted(note: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            note: Some(note.into()),
        }
    }

    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// Extract bounded plain text for one handle. Infallible at this boundary.
pub async fn extract(
    store: &dyn DocumentStore,
    handle: &DocumentHandle,
    cfg: &ExtractConfig,
) -> ExtractedText {
    let mime = handle.content_type.to_lowercase();
    let result = if mime.contains(MIME_GOOGLE_DOC) {
        extract_structured_doc(store, handle, cfg).await
    } else if mime.contains(MIME_GOOGLE_SHEET) {
        extract_sheet(store, handle, cfg).await
    } else if mime.contains("pdf") {
        extract_pdf(store, handle, cfg).await
    } else if mime.contains("wordprocessingml.document") {
        extract_word(store, handle, cfg).await
    } else {
        // Images, video, unrecognized binaries: cite by title only.
        return ExtractedText::empty();
    };

    if let Some(note) = &result.note {
        tracing::debug!(id = %handle.id, name = %handle.name, note = %note, "extraction degraded");
    }
    result
}

async fn extract_structured_doc(
    store: &dyn DocumentStore,
    handle: &DocumentHandle,
    cfg: &ExtractConfig,
) -> ExtractedText {
    match store.get_structured_doc(&handle.id).await {
        Ok(doc) => ExtractedText {
            text: cap_chars(flatten_doc(&doc), cfg.text_cap_chars),
            note: None,
        },
        Err(e) => ExtractedText::noted(format!("document read failed: {}", e)),
    }
}

async fn extract_sheet(
    store: &dyn DocumentStore,
    handle: &DocumentHandle,
    cfg: &ExtractConfig,
) -> ExtractedText {
    let range = RangeSpec {
        max_rows: cfg.sheet_max_rows,
        max_cols: cfg.sheet_max_cols,
    };
    match store.get_tabular_range(&handle.id, &range).await {
        Ok(rows) => {
            let text = rows
                .iter()
                .map(|r| r.join("\t"))
                .collect::<Vec<_>>()
                .join("\n");
            ExtractedText {
                text: cap_chars(text, cfg.text_cap_chars),
                note: None,
            }
        }
        Err(e) => ExtractedText::noted(format!("sheet read failed: {}", e)),
    }
}

async fn extract_pdf(
    store: &dyn DocumentStore,
    handle: &DocumentHandle,
    cfg: &ExtractConfig,
) -> ExtractedText {
    let bytes = match store.get_content(&handle.id).await {
        Ok(b) => b,
        Err(e) => return ExtractedText::noted(format!("download failed: {}", e)),
    };
    if bytes.is_empty() {
        return ExtractedText::noted("downloaded 0 bytes (permission or download issue)");
    }
    match pdf_text(&bytes, cfg.pdf_max_pages) {
        Ok(text) if text.trim().is_empty() => {
            ExtractedText::noted("no extractable text; likely a scanned/image-only PDF")
        }
        Ok(text) => ExtractedText {
            text: cap_chars(text, cfg.text_cap_chars),
            note: None,
        },
        Err(e) => ExtractedText::noted(format!("PDF parse failed: {}", e)),
    }
}

async fn extract_word(
    store: &dyn DocumentStore,
    handle: &DocumentHandle,
    cfg: &ExtractConfig,
) -> ExtractedText {
    let bytes = match store.get_content(&handle.id).await {
        Ok(b) => b,
        Err(e) => return ExtractedText::noted(format!("download failed: {}", e)),
    };
    if bytes.is_empty() {
        return ExtractedText::noted("downloaded 0 bytes (permission or download issue)");
    }
    match docx_text(&bytes) {
        Ok(text) => ExtractedText {
            text: cap_chars(text, cfg.text_cap_chars),
            note: None,
        },
        Err(e) => ExtractedText::noted(format!("Word extraction failed: {}", e)),
    }
}

// ============ Structured document flattening ============

/// Flatten a structured document tree: paragraph runs concatenated per
/// paragraph, table rows flattened to ` | `-joined lines, runs of blank
/// lines collapsed to at most one.
pub fn flatten_doc(doc: &StructuredDoc) -> String {
    let mut out: Vec<String> = Vec::new();
    for element in &doc.body.content {
        if let Some(paragraph) = &element.paragraph {
            out.push(paragraph_text(paragraph).trim().to_string());
        } else if let Some(table) = &element.table {
            for row in &table.table_rows {
                let cells: Vec<String> = row
                    .table_cells
                    .iter()
                    .map(|cell| {
                        cell.content
                            .iter()
                            .filter_map(|e| e.paragraph.as_ref())
                            .map(paragraph_text)
                            .collect::<Vec<_>>()
                            .join(" ")
                    })
                    .collect();
                if !cells.is_empty() {
                    out.push(cells.join(" | "));
                }
            }
        }
        // Section breaks and other shapes carry no text.
    }
    collapse_blank_lines(&out.join("\n"))
}

fn paragraph_text(paragraph: &Paragraph) -> String {
    paragraph
        .elements
        .iter()
        .filter_map(|e| e.text_run.as_ref())
        .map(|r| r.content.as_str())
        .collect()
}

/// Collapse runs of three or more newlines to exactly two (one blank line).
pub fn collapse_blank_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut newlines = 0usize;
    for c in text.chars() {
        if c == '\n' {
            newlines += 1;
            if newlines <= 2 {
                out.push(c);
            }
        } else {
            newlines = 0;
            out.push(c);
        }
    }
    out
}

/// Truncate to a character budget (not bytes, so multi-byte names survive)
/// and strip NUL bytes that occasionally leak out of binary parsers.
pub fn cap_chars(text: String, max_chars: usize) -> String {
    let cleaned = if text.contains('\u{0}') {
        text.replace('\u{0}', "")
    } else {
        text
    };
    if cleaned.chars().count() <= max_chars {
        return cleaned;
    }
    cleaned.chars().take(max_chars).collect()
}

// ============ PDF ============

/// Extract text from the first `max_pages` pages. Large page counts are a
/// valid input, never an error; the cap bounds work on huge scans.
fn pdf_text(bytes: &[u8], max_pages: usize) -> Result<String, String> {
    let pages =
        pdf_extract::extract_text_from_mem_by_pages(bytes).map_err(|e| e.to_string())?;
    let text = pages
        .iter()
        .take(max_pages)
        .map(|p| p.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n");
    Ok(text)
}

// ============ Word (.docx) ============

fn docx_text(bytes: &[u8]) -> Result<String, String> {
    let mut archive =
        zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(|e| e.to_string())?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|e| e.to_string())?;
    let mut doc_xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut doc_xml)
        .map_err(|e| e.to_string())?;
    if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err("word/document.xml exceeds size limit".to_string());
    }
    docx_runs(&doc_xml)
}

/// Walk `<w:t>` text runs, inserting a newline at each paragraph end so the
/// output reads like the document instead of one long line.
fn docx_runs(xml: &[u8]) -> Result<String, String> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    if let Ok(quick_xml::events::Event::Text(te)) = reader.read_event_into(&mut buf)
                    {
                        out.push_str(te.unescape().unwrap_or_default().as_ref());
                    }
                }
            }
            Ok(quick_xml::events::Event::End(e)) => {
                if e.local_name().as_ref() == b"p" {
                    out.push('\n');
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
        buf.clear();
    }
    Ok(out.trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DocBody, ParagraphElement, StructuralElement, Table, TableCell, TableRow, TextRun};

    fn paragraph(text: &str) -> StructuralElement {
        StructuralElement {
            paragraph: Some(Paragraph {
                elements: vec![ParagraphElement {
                    text_run: Some(TextRun {
                        content: text.to_string(),
                    }),
                }],
            }),
            table: None,
        }
    }

    fn doc(elements: Vec<StructuralElement>) -> StructuredDoc {
        StructuredDoc {
            body: DocBody { content: elements },
        }
    }

    #[test]
    fn flatten_joins_paragraphs_with_newlines() {
        let d = doc(vec![paragraph("first"), paragraph("second")]);
        assert_eq!(flatten_doc(&d), "first\nsecond");
    }

    #[test]
    fn flatten_collapses_consecutive_empty_paragraphs() {
        let d = doc(vec![
            paragraph("above"),
            paragraph(""),
            paragraph(""),
            paragraph(""),
            paragraph("below"),
        ]);
        // Three empty paragraphs collapse to a single blank line.
        assert_eq!(flatten_doc(&d), "above\n\nbelow");
    }

    #[test]
    fn flatten_renders_table_rows_pipe_delimited() {
        let table = StructuralElement {
            paragraph: None,
            table: Some(Table {
                table_rows: vec![TableRow {
                    table_cells: vec![
                        TableCell {
                            content: vec![paragraph("Fee")],
                        },
                        TableCell {
                            content: vec![paragraph("15%")],
                        },
                    ],
                }],
            }),
        };
        let d = doc(vec![paragraph("Schedule"), table]);
        assert_eq!(flatten_doc(&d), "Schedule\nFee | 15%");
    }

    #[test]
    fn cap_chars_is_exact_at_the_boundary() {
        let text: String = "x".repeat(301);
        assert_eq!(cap_chars(text.clone(), 300).chars().count(), 300);
        assert_eq!(cap_chars("x".repeat(300), 300).chars().count(), 300);
        assert_eq!(cap_chars("ok".to_string(), 300), "ok");
    }

    #[test]
    fn cap_chars_counts_characters_not_bytes() {
        let text = "é".repeat(10);
        assert_eq!(cap_chars(text, 4).chars().count(), 4);
    }

    #[test]
    fn cap_chars_strips_nul_bytes() {
        assert_eq!(cap_chars("a\u{0}b".to_string(), 10), "ab");
    }

    #[test]
    fn collapse_leaves_single_blank_lines_alone() {
        assert_eq!(collapse_blank_lines("a\n\nb"), "a\n\nb");
        assert_eq!(collapse_blank_lines("a\n\n\n\n\nb"), "a\n\nb");
    }

    #[test]
    fn invalid_zip_is_an_error_not_a_panic() {
        assert!(docx_text(b"not a zip").is_err());
    }

    #[test]
    fn invalid_pdf_is_an_error_not_a_panic() {
        assert!(pdf_text(b"not a pdf", 8).is_err());
    }

    #[test]
    fn docx_runs_separate_paragraphs() {
        let xml = br#"<?xml version="1.0"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t>first</w:t></w:r></w:p><w:p><w:r><w:t>second</w:t></w:r></w:p></w:body></w:document>"#;
        assert_eq!(docx_runs(xml).unwrap(), "first\nsecond");
    }
}
