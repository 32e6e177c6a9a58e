//! Citation assembly.
//!
//! Packages a ranked candidate and its extracted text into the user-facing
//! source record: name, canonical open URL, and a bounded excerpt. URL
//! derivation is total and deterministic; unrecognized types fall back to
//! the generic file-view link.

use serde::Serialize;

use crate::extract::{cap_chars, ExtractedText};
use crate::rank::RankedCandidate;
use crate::store::{MIME_GOOGLE_DOC, MIME_GOOGLE_SHEET, MIME_GOOGLE_SLIDES};

/// A cited source returned alongside the synthesized answer.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Citation {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(rename = "contentType")]
    pub content_type: String,
    pub excerpt: String,
}

/// Canonical open URL for a document. Total: every (id, type) pair yields
/// a URL, and identical input always yields identical output.
pub fn open_url(id: &str, content_type: &str) -> String {
    let mime = content_type.to_lowercase();
    if mime.contains(MIME_GOOGLE_DOC) {
        format!("https://docs.google.com/document/d/{}/edit", id)
    } else if mime.contains(MIME_GOOGLE_SHEET) {
        format!("https://docs.google.com/spreadsheets/d/{}/edit", id)
    } else if mime.contains(MIME_GOOGLE_SLIDES) {
        format!("https://docs.google.com/presentation/d/{}/edit", id)
    } else {
        format!("https://drive.google.com/file/d/{}/view", id)
    }
}

/// Build the citation for one shortlisted candidate.
pub fn assemble(candidate: &RankedCandidate, extracted: &ExtractedText, excerpt_cap: usize) -> Citation {
    Citation {
        id: candidate.handle.id.clone(),
        name: candidate.handle.name.clone(),
        url: open_url(&candidate.handle.id, &candidate.handle.content_type),
        content_type: candidate.handle.content_type.clone(),
        excerpt: cap_chars(extracted.text.clone(), excerpt_cap),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_templates_per_type() {
        assert_eq!(
            open_url("abc", MIME_GOOGLE_DOC),
            "https://docs.google.com/document/d/abc/edit"
        );
        assert_eq!(
            open_url("abc", MIME_GOOGLE_SHEET),
            "https://docs.google.com/spreadsheets/d/abc/edit"
        );
        assert_eq!(
            open_url("abc", MIME_GOOGLE_SLIDES),
            "https://docs.google.com/presentation/d/abc/edit"
        );
        assert_eq!(
            open_url("abc", "application/pdf"),
            "https://drive.google.com/file/d/abc/view"
        );
    }

    #[test]
    fn unrecognized_types_still_get_a_url() {
        assert_eq!(
            open_url("abc", "application/x-mystery"),
            "https://drive.google.com/file/d/abc/view"
        );
        assert_eq!(open_url("abc", ""), "https://drive.google.com/file/d/abc/view");
    }

    #[test]
    fn url_derivation_is_deterministic() {
        let first = open_url("1a2b", "application/pdf");
        let second = open_url("1a2b", "application/pdf");
        assert_eq!(first, second);
    }
}
