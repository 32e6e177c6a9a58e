//! Relevance ranking of located candidates.
//!
//! Additive point scoring over filename/term overlap, recognized form-name
//! patterns, content-type preference, and a bounded recency adjustment.
//! The score is a pure function of (handle, terms, now); `now` is a
//! parameter so ranking is deterministic under test.

use chrono::{DateTime, Utc};

use crate::config::{RetrievalConfig, ScoringConfig};
use crate::locate::{Candidate, Provenance};
use crate::query::SearchTerms;
use crate::store::{mime_is_doc_like, mime_is_media, DocumentHandle};

/// Terms whose presence marks a query as document-seeking. Substring match,
/// so "sublease" and "w9" both qualify.
const DOC_SEEKING_TERMS: &[&str] = &[
    "lease", "rider", "agreement", "template", "form", "w9", "commission", "nda", "disclosure",
    "checklist", "contract", "application", "package",
];

/// A candidate with its computed relevance score.
#[derive(Debug, Clone)]
pub struct RankedCandidate {
    pub handle: DocumentHandle,
    pub score: i64,
    pub provenance: Provenance,
}

/// True when the query smells like a request for a document rather than,
/// say, a listing photo or walkthrough video.
pub fn is_document_seeking(terms: &SearchTerms) -> bool {
    terms
        .expanded
        .iter()
        .any(|t| DOC_SEEKING_TERMS.iter().any(|k| t.contains(k)))
}

/// Score one handle against the term set.
pub fn score_handle(
    handle: &DocumentHandle,
    terms: &SearchTerms,
    scoring: &ScoringConfig,
    doc_seeking: bool,
    now: DateTime<Utc>,
) -> i64 {
    let name = handle.name.to_lowercase();
    let stem = name.rsplit_once('.').map(|(s, _)| s).unwrap_or(&name);
    let mut score = 0;

    for term in &terms.expanded {
        if term.is_empty() {
            continue;
        }
        if stem == term.as_str() {
            score += scoring.exact_name;
        }
        if name.contains(term.as_str()) {
            score += scoring.name_contains;
        }
        if name.starts_with(term.as_str()) {
            score += scoring.name_starts;
        }
    }

    // Recognized form-name patterns, matched on whole words in the name.
    if contains_word(&name, "rebny") {
        score += scoring.form_pattern;
    }
    if contains_word(&name, "lease") || contains_word(&name, "sublease") {
        score += scoring.lease_pattern;
    }
    if contains_word(&name, "rider") {
        score += scoring.rider_pattern;
    }
    if ["agreement", "template", "form"].iter().any(|w| contains_word(&name, w)) {
        score += scoring.agreement_pattern;
    }

    if mime_is_doc_like(&handle.content_type) {
        score += scoring.doc_like_type;
    }
    if doc_seeking && mime_is_media(&handle.content_type) {
        score -= scoring.media_penalty;
    }

    // Light recency nudge: half a point per year of age, bounded so it can
    // never overturn a filename match.
    if let Some(modified) = handle.modified {
        let age_days = (now - modified).num_days().max(0);
        let penalty = ((age_days as f64 / 365.0) * 0.5).round() as i64;
        score -= penalty.min(scoring.recency_cap);
    }

    score
}

/// Rank candidates and truncate to the shortlist.
///
/// Sort is stable: score descending, then modification time descending,
/// then original discovery order. On document-seeking queries media types
/// are either dropped or left to sink on their penalty, per configuration.
pub fn rank(
    candidates: Vec<Candidate>,
    terms: &SearchTerms,
    scoring: &ScoringConfig,
    retrieval: &RetrievalConfig,
    now: DateTime<Utc>,
) -> Vec<RankedCandidate> {
    let doc_seeking = is_document_seeking(terms);

    let mut ranked: Vec<RankedCandidate> = candidates
        .into_iter()
        .filter(|c| {
            !(doc_seeking && retrieval.exclude_media() && mime_is_media(&c.handle.content_type))
        })
        .map(|c| {
            let score = score_handle(&c.handle, terms, scoring, doc_seeking, now);
            RankedCandidate {
                handle: c.handle,
                score,
                provenance: c.provenance,
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| modified_key(b).cmp(&modified_key(a)))
    });
    ranked.truncate(retrieval.shortlist_limit);
    ranked
}

fn modified_key(c: &RankedCandidate) -> i64 {
    c.handle.modified.map(|m| m.timestamp()).unwrap_or(i64::MIN)
}

/// Whole-word containment over alphanumeric runs in the name.
fn contains_word(name: &str, word: &str) -> bool {
    name.split(|c: char| !c.is_alphanumeric()).any(|w| w == word)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::normalize;
    use chrono::TimeZone;

    fn handle(id: &str, name: &str, content_type: &str, modified_ts: Option<i64>) -> DocumentHandle {
        DocumentHandle {
            id: id.to_string(),
            name: name.to_string(),
            content_type: content_type.to_string(),
            modified: modified_ts.map(|ts| Utc.timestamp_opt(ts, 0).unwrap()),
        }
    }

    fn candidate(h: DocumentHandle) -> Candidate {
        Candidate {
            handle: h,
            provenance: Provenance::ScopedName,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_750_000_000, 0).unwrap()
    }

    #[test]
    fn sublease_checklist_ranks_pdf_first_and_photos_last() {
        let terms = normalize("sublease checklist", 6, 12);
        let candidates = vec![
            candidate(handle("a", "Vacation Photos.jpg", "image/jpeg", Some(1_749_000_000))),
            candidate(handle("b", "Sublease Checklist.pdf", "application/pdf", Some(1_700_000_000))),
            candidate(handle("c", "Lease Rider.docx", crate::store::MIME_DOCX, Some(1_749_500_000))),
        ];
        let ranked = rank(
            candidates,
            &terms,
            &ScoringConfig::default(),
            &RetrievalConfig::default(),
            now(),
        );
        assert_eq!(ranked[0].handle.id, "b");
        assert_eq!(ranked.last().unwrap().handle.id, "a");
        assert!(ranked.last().unwrap().score < 0);
    }

    #[test]
    fn exclude_media_drops_photos_outright() {
        let terms = normalize("sublease checklist", 6, 12);
        let retrieval = RetrievalConfig {
            media_filter: "exclude".to_string(),
            ..RetrievalConfig::default()
        };
        let candidates = vec![
            candidate(handle("a", "Vacation Photos.jpg", "image/jpeg", None)),
            candidate(handle("b", "Sublease Checklist.pdf", "application/pdf", None)),
        ];
        let ranked = rank(candidates, &terms, &ScoringConfig::default(), &retrieval, now());
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].handle.id, "b");
    }

    #[test]
    fn media_survives_non_document_queries() {
        let terms = normalize("staten island walkthrough video", 6, 12);
        assert!(!is_document_seeking(&terms));
        let candidates = vec![candidate(handle("a", "Walkthrough Video.mp4", "video/mp4", None))];
        let ranked = rank(
            candidates,
            &terms,
            &ScoringConfig::default(),
            &RetrievalConfig::default(),
            now(),
        );
        assert_eq!(ranked.len(), 1);
        assert!(ranked[0].score > 0);
    }

    #[test]
    fn equal_score_ties_break_on_recency_then_discovery_order() {
        let terms = normalize("commission", 6, 12);
        let older = handle("old", "Commission Schedule.pdf", "application/pdf", Some(1_749_000_000));
        let newer = handle("new", "Commission Schedule.pdf", "application/pdf", Some(1_749_900_000));
        let twin_a = handle("twin-a", "Commission Schedule.pdf", "application/pdf", Some(1_749_900_000));

        let ranked = rank(
            vec![candidate(older), candidate(newer.clone()), candidate(twin_a)],
            &terms,
            &ScoringConfig::default(),
            &RetrievalConfig::default(),
            now(),
        );
        assert_eq!(ranked[0].handle.id, "new");
        // Same score, same timestamp: discovery order preserved.
        assert_eq!(ranked[1].handle.id, "twin-a");
        assert_eq!(ranked[2].handle.id, "old");
    }

    #[test]
    fn recency_cannot_overturn_a_name_match() {
        let terms = normalize("rebny lease", 6, 12);
        let ancient_match = handle(
            "match",
            "REBNY Lease.pdf",
            "application/pdf",
            Some(1_500_000_000), // roughly eight years before `now`
        );
        let fresh_miss = handle("miss", "Team Lunch Notes.pdf", "application/pdf", Some(1_749_990_000));
        let ranked = rank(
            vec![candidate(fresh_miss), candidate(ancient_match)],
            &terms,
            &ScoringConfig::default(),
            &RetrievalConfig::default(),
            now(),
        );
        assert_eq!(ranked[0].handle.id, "match");
    }

    #[test]
    fn exact_stem_beats_substring_match() {
        let terms = normalize("w9", 6, 12);
        let exact = handle("exact", "w9.pdf", "application/pdf", None);
        let partial = handle("partial", "old w9 scans archive.pdf", "application/pdf", None);
        let s_exact = score_handle(&exact, &terms, &ScoringConfig::default(), true, now());
        let s_partial = score_handle(&partial, &terms, &ScoringConfig::default(), true, now());
        assert!(s_exact > s_partial);
    }

    #[test]
    fn score_is_deterministic() {
        let terms = normalize("lease rider", 6, 12);
        let h = handle("x", "Lease Rider.docx", crate::store::MIME_DOCX, Some(1_749_000_000));
        let a = score_handle(&h, &terms, &ScoringConfig::default(), true, now());
        let b = score_handle(&h, &terms, &ScoringConfig::default(), true, now());
        assert_eq!(a, b);
    }

    #[test]
    fn shortlist_is_truncated() {
        let terms = normalize("lease", 6, 12);
        let candidates: Vec<Candidate> = (0..20)
            .map(|i| {
                candidate(handle(
                    &format!("id-{}", i),
                    &format!("Lease {}.pdf", i),
                    "application/pdf",
                    Some(1_749_000_000 + i),
                ))
            })
            .collect();
        let ranked = rank(
            candidates,
            &terms,
            &ScoringConfig::default(),
            &RetrievalConfig::default(),
            now(),
        );
        assert_eq!(ranked.len(), RetrievalConfig::default().shortlist_limit);
    }
}
