use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::store::Combine;

/// Top-level configuration, loaded once at startup and passed by parameter
/// into every component. Nothing reads ambient globals after load except
/// credential environment variables, which are resolved when the store and
/// completion clients are constructed.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub extract: ExtractConfig,
    #[serde(default)]
    pub synthesis: SynthesisConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StoreConfig {
    /// Scope hint: the shared folder searched before widening to
    /// shared-with-me and global tiers. None skips the scoped tiers.
    #[serde(default)]
    pub root_folder_id: Option<String>,
    /// Path to a service-account JSON key file. The
    /// `GOOGLE_SERVICE_ACCOUNT_JSON` environment variable takes precedence.
    #[serde(default)]
    pub service_account_file: Option<PathBuf>,
    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,
}

fn default_store_timeout() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Tokens kept from the question after stopword filtering.
    #[serde(default = "default_max_terms")]
    pub max_terms: usize,
    /// Upper bound on the synonym-expanded term set.
    #[serde(default = "default_max_expanded_terms")]
    pub max_expanded_terms: usize,
    /// Page size for each lookup tier.
    #[serde(default = "default_tier_page_size")]
    pub tier_page_size: usize,
    /// Cap on the merged candidate list before ranking.
    #[serde(default = "default_candidate_cap")]
    pub candidate_cap: usize,
    /// Final shortlist size selected for extraction and citation.
    #[serde(default = "default_shortlist_limit")]
    pub shortlist_limit: usize,
    /// `all` (every term must appear in full text) or `any`.
    #[serde(default = "default_fulltext_mode")]
    pub fulltext_mode: String,
    /// `short-circuit` (stop widening once a scope group produced a name
    /// hit) or `exhaustive` (always run every tier).
    #[serde(default = "default_widen_policy")]
    pub widen_policy: String,
    /// `deprioritize` (media types rank last on document-seeking queries)
    /// or `exclude` (dropped from the shortlist outright).
    #[serde(default = "default_media_filter")]
    pub media_filter: String,
    /// Max documents extracted concurrently.
    #[serde(default = "default_max_concurrent_extractions")]
    pub max_concurrent_extractions: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_terms: default_max_terms(),
            max_expanded_terms: default_max_expanded_terms(),
            tier_page_size: default_tier_page_size(),
            candidate_cap: default_candidate_cap(),
            shortlist_limit: default_shortlist_limit(),
            fulltext_mode: default_fulltext_mode(),
            widen_policy: default_widen_policy(),
            media_filter: default_media_filter(),
            max_concurrent_extractions: default_max_concurrent_extractions(),
        }
    }
}

impl RetrievalConfig {
    pub fn fulltext_combine(&self) -> Combine {
        if self.fulltext_mode == "any" {
            Combine::Any
        } else {
            Combine::All
        }
    }

    pub fn short_circuit(&self) -> bool {
        self.widen_policy != "exhaustive"
    }

    pub fn exclude_media(&self) -> bool {
        self.media_filter == "exclude"
    }
}

fn default_max_terms() -> usize {
    6
}
fn default_max_expanded_terms() -> usize {
    12
}
fn default_tier_page_size() -> usize {
    20
}
fn default_candidate_cap() -> usize {
    24
}
fn default_shortlist_limit() -> usize {
    8
}
fn default_fulltext_mode() -> String {
    "all".to_string()
}
fn default_widen_policy() -> String {
    "short-circuit".to_string()
}
fn default_media_filter() -> String {
    "deprioritize".to_string()
}
fn default_max_concurrent_extractions() -> usize {
    4
}

/// Additive ranking weights. The ordering of effects is the contract; the
/// exact numbers are a tuning surface.
#[derive(Debug, Deserialize, Clone)]
pub struct ScoringConfig {
    #[serde(default = "default_exact_name")]
    pub exact_name: i64,
    #[serde(default = "default_name_contains")]
    pub name_contains: i64,
    #[serde(default = "default_name_starts")]
    pub name_starts: i64,
    #[serde(default = "default_form_pattern")]
    pub form_pattern: i64,
    #[serde(default = "default_lease_pattern")]
    pub lease_pattern: i64,
    #[serde(default = "default_rider_pattern")]
    pub rider_pattern: i64,
    #[serde(default = "default_agreement_pattern")]
    pub agreement_pattern: i64,
    #[serde(default = "default_doc_like_type")]
    pub doc_like_type: i64,
    #[serde(default = "default_media_penalty")]
    pub media_penalty: i64,
    /// Bound on the recency adjustment, so age can never overturn a strong
    /// filename match.
    #[serde(default = "default_recency_cap")]
    pub recency_cap: i64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            exact_name: default_exact_name(),
            name_contains: default_name_contains(),
            name_starts: default_name_starts(),
            form_pattern: default_form_pattern(),
            lease_pattern: default_lease_pattern(),
            rider_pattern: default_rider_pattern(),
            agreement_pattern: default_agreement_pattern(),
            doc_like_type: default_doc_like_type(),
            media_penalty: default_media_penalty(),
            recency_cap: default_recency_cap(),
        }
    }
}

fn default_exact_name() -> i64 {
    20
}
fn default_name_contains() -> i64 {
    12
}
fn default_name_starts() -> i64 {
    4
}
fn default_form_pattern() -> i64 {
    18
}
fn default_lease_pattern() -> i64 {
    15
}
fn default_rider_pattern() -> i64 {
    8
}
fn default_agreement_pattern() -> i64 {
    6
}
fn default_doc_like_type() -> i64 {
    6
}
fn default_media_penalty() -> i64 {
    40
}
fn default_recency_cap() -> i64 {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractConfig {
    /// Hard cap on extracted text per document, in characters.
    #[serde(default = "default_text_cap_chars")]
    pub text_cap_chars: usize,
    /// Cap on the preview excerpt attached to each citation.
    #[serde(default = "default_excerpt_cap_chars")]
    pub excerpt_cap_chars: usize,
    /// PDF pages parsed before giving up, to bound latency on large files.
    #[serde(default = "default_pdf_max_pages")]
    pub pdf_max_pages: usize,
    #[serde(default = "default_sheet_max_rows")]
    pub sheet_max_rows: u32,
    #[serde(default = "default_sheet_max_cols")]
    pub sheet_max_cols: u32,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            text_cap_chars: default_text_cap_chars(),
            excerpt_cap_chars: default_excerpt_cap_chars(),
            pdf_max_pages: default_pdf_max_pages(),
            sheet_max_rows: default_sheet_max_rows(),
            sheet_max_cols: default_sheet_max_cols(),
        }
    }
}

fn default_text_cap_chars() -> usize {
    15_000
}
fn default_excerpt_cap_chars() -> usize {
    300
}
fn default_pdf_max_pages() -> usize {
    8
}
fn default_sheet_max_rows() -> u32 {
    200
}
fn default_sheet_max_cols() -> u32 {
    26
}

#[derive(Debug, Deserialize, Clone)]
pub struct SynthesisConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Questions longer than this are truncated before processing.
    #[serde(default = "default_max_question_chars")]
    pub max_question_chars: usize,
    #[serde(default = "default_synthesis_timeout")]
    pub timeout_secs: u64,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: default_temperature(),
            max_question_chars: default_max_question_chars(),
            timeout_secs: default_synthesis_timeout(),
        }
    }
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_temperature() -> f64 {
    0.2
}
fn default_max_question_chars() -> usize {
    2000
}
fn default_synthesis_timeout() -> u64 {
    45
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7414".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    let r = &config.retrieval;
    if r.max_terms == 0 {
        anyhow::bail!("retrieval.max_terms must be > 0");
    }
    if r.max_expanded_terms < r.max_terms {
        anyhow::bail!("retrieval.max_expanded_terms must be >= retrieval.max_terms");
    }
    if r.shortlist_limit == 0 || r.candidate_cap == 0 || r.tier_page_size == 0 {
        anyhow::bail!("retrieval caps must be >= 1");
    }
    if r.shortlist_limit > r.candidate_cap {
        anyhow::bail!("retrieval.shortlist_limit must be <= retrieval.candidate_cap");
    }
    match r.fulltext_mode.as_str() {
        "all" | "any" => {}
        other => anyhow::bail!(
            "Unknown retrieval.fulltext_mode: '{}'. Must be all or any.",
            other
        ),
    }
    match r.widen_policy.as_str() {
        "short-circuit" | "exhaustive" => {}
        other => anyhow::bail!(
            "Unknown retrieval.widen_policy: '{}'. Must be short-circuit or exhaustive.",
            other
        ),
    }
    match r.media_filter.as_str() {
        "deprioritize" | "exclude" => {}
        other => anyhow::bail!(
            "Unknown retrieval.media_filter: '{}'. Must be deprioritize or exclude.",
            other
        ),
    }
    if config.extract.text_cap_chars == 0 || config.extract.excerpt_cap_chars == 0 {
        anyhow::bail!("extract caps must be >= 1");
    }
    if config.extract.pdf_max_pages == 0 {
        anyhow::bail!("extract.pdf_max_pages must be >= 1");
    }
    if !(0.0..=2.0).contains(&config.synthesis.temperature) {
        anyhow::bail!("synthesis.temperature must be in [0.0, 2.0]");
    }
    if config.synthesis.max_question_chars == 0 {
        anyhow::bail!("synthesis.max_question_chars must be > 0");
    }
    Ok(())
}
