//! End-to-end orchestration: question in, answer and citations out.
//!
//! The pipeline wires the stages together and owns the degradation policy:
//! input validation fails fast before any remote call, lookup and
//! extraction failures degrade to smaller result sets, and only synthesis
//! failure is fatal to a request.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::cite::{self, Citation};
use crate::config::Config;
use crate::extract::{self, ExtractedText};
use crate::locate;
use crate::query;
use crate::rank::{self, RankedCandidate};
use crate::store::DocumentStore;
use crate::synthesize::{self, CompletionClient, SynthesisError};

/// Request-fatal pipeline failures. Everything else degrades in place.
#[derive(Debug)]
pub enum PipelineError {
    /// The question was empty after trimming.
    InvalidInput(String),
    Synthesis(SynthesisError),
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::InvalidInput(msg) => write!(f, "{}", msg),
            PipelineError::Synthesis(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for PipelineError {}

/// A synthesized answer with the sources it drew on.
#[derive(Debug, Serialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<Citation>,
}

/// One entry in a search-only result set.
#[derive(Debug, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(rename = "contentType")]
    pub content_type: String,
    pub modified: Option<chrono::DateTime<Utc>>,
    pub score: i64,
    pub provenance: &'static str,
}

/// Cap the raw question, then trim. Cap-then-trim, so a question of
/// whitespace followed by text never truncates to nothing that trimming
/// would have saved.
pub fn clean_question(raw: &str, max_chars: usize) -> Result<String, PipelineError> {
    let capped: String = raw.chars().take(max_chars).collect();
    let cleaned = capped.trim();
    if cleaned.is_empty() {
        return Err(PipelineError::InvalidInput(
            "Question must not be empty".to_string(),
        ));
    }
    Ok(cleaned.to_string())
}

/// Locate and rank documents for a question, without extraction or
/// synthesis. Backs the search endpoint and CLI command.
pub async fn search_documents(
    store: &dyn DocumentStore,
    cfg: &Config,
    question: &str,
) -> Result<Vec<SearchHit>, PipelineError> {
    let question = clean_question(question, cfg.synthesis.max_question_chars)?;
    let shortlist = shortlist(store, cfg, &question).await;
    Ok(shortlist
        .into_iter()
        .map(|c| SearchHit {
            url: cite::open_url(&c.handle.id, &c.handle.content_type),
            id: c.handle.id,
            name: c.handle.name,
            content_type: c.handle.content_type,
            modified: c.handle.modified,
            score: c.score,
            provenance: c.provenance.as_str(),
        })
        .collect())
}

/// Run the full pipeline. The store is taken as an `Arc` so extraction can
/// fan out across tasks.
pub async fn answer_question(
    store: Arc<dyn DocumentStore>,
    completion: &dyn CompletionClient,
    cfg: &Config,
    question: &str,
) -> Result<Answer, PipelineError> {
    let question = clean_question(question, cfg.synthesis.max_question_chars)?;
    let shortlist = shortlist(store.as_ref(), cfg, &question).await;

    tracing::info!(candidates = shortlist.len(), "shortlist selected");

    let extracted = extract_all(store, &shortlist, cfg).await;

    let sources: Vec<(Citation, ExtractedText)> = shortlist
        .iter()
        .zip(extracted)
        .map(|(candidate, text)| {
            let citation = cite::assemble(candidate, &text, cfg.extract.excerpt_cap_chars);
            (citation, text)
        })
        .collect();

    let prompt = synthesize::build_prompt(&question, &sources);
    let answer = completion
        .complete(synthesize::SYSTEM_INSTRUCTION, &prompt)
        .await
        .map_err(PipelineError::Synthesis)?;

    Ok(Answer {
        answer,
        sources: sources.into_iter().map(|(c, _)| c).collect(),
    })
}

async fn shortlist(
    store: &dyn DocumentStore,
    cfg: &Config,
    question: &str,
) -> Vec<RankedCandidate> {
    let terms = query::normalize(
        question,
        cfg.retrieval.max_terms,
        cfg.retrieval.max_expanded_terms,
    );
    tracing::debug!(kept = ?terms.kept, expanded = ?terms.expanded, "normalized question");

    let candidates = locate::locate(
        store,
        &terms,
        &cfg.retrieval,
        cfg.store.root_folder_id.as_deref(),
    )
    .await;

    rank::rank(
        candidates,
        &terms,
        &cfg.scoring,
        &cfg.retrieval,
        Utc::now(),
    )
}

/// Extract every shortlisted document concurrently, bounded by the
/// configured permit count, and reassemble results in shortlist order.
async fn extract_all(
    store: Arc<dyn DocumentStore>,
    shortlist: &[RankedCandidate],
    cfg: &Config,
) -> Vec<ExtractedText> {
    let permits = Arc::new(Semaphore::new(cfg.retrieval.max_concurrent_extractions.max(1)));
    let mut tasks: JoinSet<(usize, ExtractedText)> = JoinSet::new();

    for (index, candidate) in shortlist.iter().enumerate() {
        let store = Arc::clone(&store);
        let permits = Arc::clone(&permits);
        let handle = candidate.handle.clone();
        let extract_cfg = cfg.extract.clone();
        tasks.spawn(async move {
            // Closed only if the semaphore is dropped, which it never is
            // while tasks hold clones of it.
            let _permit = permits.acquire_owned().await;
            let text = extract::extract(store.as_ref(), &handle, &extract_cfg).await;
            (index, text)
        });
    }

    let mut results: Vec<ExtractedText> = vec![ExtractedText::empty(); shortlist.len()];
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, text)) => results[index] = text,
            Err(e) => {
                tracing::warn!(error = %e, "extraction task panicked; source kept without text");
            }
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_question_is_rejected() {
        assert!(clean_question("", 2000).is_err());
        assert!(clean_question("   \n\t  ", 2000).is_err());
    }

    #[test]
    fn question_is_capped_before_trimming() {
        let long = "x".repeat(5000);
        let cleaned = clean_question(&long, 2000).unwrap();
        assert_eq!(cleaned.chars().count(), 2000);

        // Padding inside the cap trims away; the text survives.
        let padded = format!("  {}  ", "sublease checklist");
        assert_eq!(clean_question(&padded, 2000).unwrap(), "sublease checklist");
    }

    #[test]
    fn cap_counts_chars_not_bytes() {
        let multibyte = "é".repeat(10);
        let cleaned = clean_question(&multibyte, 4).unwrap();
        assert_eq!(cleaned.chars().count(), 4);
    }
}
