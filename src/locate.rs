//! Tiered candidate location.
//!
//! Widening search over the document store: the configured folder first,
//! then items shared with the service identity, then everything. Each scope
//! runs a name-match tier and a full-text tier; results merge with id-based
//! de-duplication, earlier tiers first. A failed tier is treated as an
//! empty tier so one flaky lookup never fails the whole request.

use std::collections::HashSet;

use crate::config::RetrievalConfig;
use crate::query::SearchTerms;
use crate::store::{Combine, DocumentHandle, DocumentStore, ListQuery, MatchField, Scope};

/// Which tier produced a candidate. Kept for ranking diagnostics and the
/// search endpoint's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    ScopedName,
    ScopedFullText,
    SharedName,
    SharedFullText,
    GlobalName,
    GlobalFullText,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::ScopedName => "scoped:name",
            Provenance::ScopedFullText => "scoped:fulltext",
            Provenance::SharedName => "shared:name",
            Provenance::SharedFullText => "shared:fulltext",
            Provenance::GlobalName => "global:name",
            Provenance::GlobalFullText => "global:fulltext",
        }
    }
}

/// A located document plus the tier that found it.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub handle: DocumentHandle,
    pub provenance: Provenance,
}

/// Run the tiered search. Never fails: lookup errors are logged and the
/// tier contributes nothing. The result preserves tier order, is
/// deduplicated by id, and is capped at `candidate_cap`.
pub async fn locate(
    store: &dyn DocumentStore,
    terms: &SearchTerms,
    cfg: &RetrievalConfig,
    scope_hint: Option<&str>,
) -> Vec<Candidate> {
    let mut scopes: Vec<(Scope, Provenance, Provenance)> = Vec::new();
    if let Some(folder) = scope_hint {
        scopes.push((
            Scope::Folder(folder.to_string()),
            Provenance::ScopedName,
            Provenance::ScopedFullText,
        ));
    }
    scopes.push((
        Scope::SharedWithMe,
        Provenance::SharedName,
        Provenance::SharedFullText,
    ));
    scopes.push((
        Scope::Anywhere,
        Provenance::GlobalName,
        Provenance::GlobalFullText,
    ));

    let mut found: Vec<Candidate> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    // Empty term set: match everything not-trashed/not-folder in the first
    // scope only. Widening a match-all query would just re-list the drive.
    if terms.is_empty() {
        let (scope, name_tag, _) = scopes.remove(0);
        let query = ListQuery {
            terms: Vec::new(),
            field: MatchField::Name,
            combine: Combine::Any,
            scope,
        };
        run_tier(store, &query, name_tag, cfg.tier_page_size, &mut found, &mut seen).await;
        found.truncate(cfg.candidate_cap);
        return found;
    }

    for (scope, name_tag, fulltext_tag) in scopes {
        let name_query = ListQuery {
            terms: terms.expanded.clone(),
            field: MatchField::Name,
            combine: Combine::Any,
            scope: scope.clone(),
        };
        run_tier(store, &name_query, name_tag, cfg.tier_page_size, &mut found, &mut seen).await;

        let fulltext_query = ListQuery {
            terms: terms.expanded.clone(),
            field: MatchField::FullText,
            combine: cfg.fulltext_combine(),
            scope,
        };
        run_tier(
            store,
            &fulltext_query,
            fulltext_tag,
            cfg.tier_page_size,
            &mut found,
            &mut seen,
        )
        .await;

        if found.len() >= cfg.candidate_cap {
            break;
        }
        if cfg.short_circuit() && has_strong_hit(&found, terms) {
            tracing::debug!(
                candidates = found.len(),
                scope = name_tag.as_str(),
                "name hit in scope group; skipping wider tiers"
            );
            break;
        }
    }

    found.truncate(cfg.candidate_cap);
    found
}

async fn run_tier(
    store: &dyn DocumentStore,
    query: &ListQuery,
    tag: Provenance,
    page_size: usize,
    found: &mut Vec<Candidate>,
    seen: &mut HashSet<String>,
) {
    match store.list(query, page_size).await {
        Ok(handles) => {
            for handle in handles {
                if seen.insert(handle.id.clone()) {
                    found.push(Candidate { handle, provenance: tag });
                }
            }
        }
        Err(e) => {
            tracing::warn!(tier = tag.as_str(), error = %e, "document lookup failed; continuing with remaining tiers");
        }
    }
}

/// A strong hit is a candidate whose name contains one of the search terms.
/// Full-text-only matches are weak signal and keep the widening going.
fn has_strong_hit(found: &[Candidate], terms: &SearchTerms) -> bool {
    found.iter().any(|c| {
        let name = c.handle.name.to_lowercase();
        terms.expanded.iter().any(|t| name.contains(t.as_str()))
    })
}
