//! Query normalization and synonym expansion.
//!
//! Turns a free-text agent question into a bounded, ordered set of search
//! terms. Normalization strips everything outside Unicode letters, digits,
//! and whitespace before tokenizing, so the resulting terms are safe to
//! embed in the document store's filter-expression strings. A static rule
//! table then widens the term set with domain synonyms (lease riders,
//! sublet/assignment families, co-op board packages) to improve recall on a
//! loosely organized file store.

/// Filler words and generic real-estate nouns dropped before truncation, so
/// the retained tokens are the content-bearing ones.
const STOPWORDS: &[&str] = &[
    "i", "need", "a", "an", "the", "to", "for", "please", "help", "with", "about", "on", "of",
    "in", "and", "or", "me", "my", "us", "our", "agreement", "template", "templates", "form",
    "forms", "document", "doc",
];

/// Predicate deciding whether a synonym rule fires for a given term.
#[derive(Debug, Clone, Copy)]
pub enum Trigger {
    /// The term equals this word exactly.
    Equals(&'static str),
    /// The term contains this word as a substring.
    Contains(&'static str),
    /// The term equals one of these words.
    OneOf(&'static [&'static str]),
}

impl Trigger {
    fn matches(&self, term: &str) -> bool {
        match self {
            Trigger::Equals(w) => term == *w,
            Trigger::Contains(w) => term.contains(w),
            Trigger::OneOf(words) => words.contains(&term),
        }
    }
}

/// One entry in the synonym table: when `trigger` matches any kept term,
/// every word in `adds` is unioned into the expanded set.
#[derive(Debug, Clone, Copy)]
pub struct SynonymRule {
    pub trigger: Trigger,
    pub adds: &'static [&'static str],
}

/// Domain synonym table. Expansion only ever adds terms; the seeded tokens
/// are never removed. Extend this table to teach the search new families.
pub const SYNONYM_RULES: &[SynonymRule] = &[
    SynonymRule {
        trigger: Trigger::Contains("sublease"),
        adds: &["sublease", "sublet", "subletting", "assignment", "assign"],
    },
    SynonymRule {
        trigger: Trigger::Contains("sublet"),
        adds: &["sublease", "sublet", "subletting", "assignment", "assign"],
    },
    SynonymRule {
        trigger: Trigger::Equals("lease"),
        adds: &["lease", "rider", "addendum", "agreement"],
    },
    SynonymRule {
        trigger: Trigger::Contains("rebny"),
        adds: &["rebny"],
    },
    SynonymRule {
        trigger: Trigger::OneOf(&["co", "coop"]),
        adds: &["coop", "board", "package"],
    },
];

/// Normalized search terms for one question.
///
/// `kept` is the ordered, deduplicated, truncated token list; `expanded` is
/// the synonym-widened superset actually sent to the document store. `kept`
/// is always a prefix-preserving subset of `expanded`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchTerms {
    pub kept: Vec<String>,
    pub expanded: Vec<String>,
}

impl SearchTerms {
    pub fn is_empty(&self) -> bool {
        self.expanded.is_empty()
    }
}

/// Normalize a free-text question into a bounded term set using the
/// built-in stopword list and synonym table.
pub fn normalize(question: &str, max_terms: usize, max_expanded: usize) -> SearchTerms {
    normalize_with_rules(question, SYNONYM_RULES, max_terms, max_expanded)
}

/// Like [`normalize`] but with a caller-supplied synonym table, so the
/// expansion rules are tunable without touching the pipeline.
pub fn normalize_with_rules(
    question: &str,
    rules: &[SynonymRule],
    max_terms: usize,
    max_expanded: usize,
) -> SearchTerms {
    let mut kept = Vec::new();
    for token in tokenize(question) {
        if kept.len() >= max_terms {
            break;
        }
        if STOPWORDS.contains(&token.as_str()) {
            continue;
        }
        if !kept.contains(&token) {
            kept.push(token);
        }
    }
    let expanded = expand_terms(&kept, rules, max_expanded);
    SearchTerms { kept, expanded }
}

/// Lowercase, strip everything outside letters/digits/whitespace, split on
/// whitespace. Unicode-aware so accented street or client names survive.
fn tokenize(question: &str) -> Vec<String> {
    question
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .map(|t| t.to_string())
        .collect()
}

/// Apply the synonym table to a term list. Monotonic: the input terms are
/// always retained, and re-running expansion on an already-expanded set
/// adds nothing new.
pub fn expand_terms(terms: &[String], rules: &[SynonymRule], max_expanded: usize) -> Vec<String> {
    let mut expanded: Vec<String> = terms.to_vec();
    for rule in rules {
        if !terms.iter().any(|t| rule.trigger.matches(t)) {
            continue;
        }
        for add in rule.adds {
            if expanded.len() >= max_expanded {
                return expanded;
            }
            if !expanded.iter().any(|e| e == add) {
                expanded.push((*add).to_string());
            }
        }
    }
    expanded
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn strips_punctuation_and_lowercases() {
        let t = normalize("Where's the REBNY Sublease-Checklist?!", 6, 12);
        assert_eq!(t.kept, terms(&["where", "s", "rebny", "sublease", "checklist"]));
    }

    #[test]
    fn drops_stopwords_and_truncates() {
        let t = normalize(
            "i need a template for the lease rider addendum package checklist disclosure",
            3,
            12,
        );
        assert_eq!(t.kept, terms(&["lease", "rider", "addendum"]));
    }

    #[test]
    fn deduplicates_tokens() {
        let t = normalize("lease lease lease rider", 6, 12);
        assert_eq!(t.kept, terms(&["lease", "rider"]));
    }

    #[test]
    fn empty_input_yields_empty_terms() {
        let t = normalize("   ...!!!   ", 6, 12);
        assert!(t.kept.is_empty());
        assert!(t.expanded.is_empty());
        assert!(t.is_empty());
    }

    #[test]
    fn sublease_family_expands() {
        let t = normalize("sublease checklist", 6, 12);
        assert_eq!(t.kept, terms(&["sublease", "checklist"]));
        for w in ["sublease", "checklist", "sublet", "subletting", "assignment", "assign"] {
            assert!(t.expanded.iter().any(|e| e == w), "missing {}", w);
        }
    }

    #[test]
    fn expansion_never_removes_kept_terms() {
        let t = normalize("lease signing question", 6, 12);
        for k in &t.kept {
            assert!(t.expanded.contains(k));
        }
    }

    #[test]
    fn expansion_respects_cap() {
        let t = normalize("sublease lease coop", 6, 7);
        assert!(t.expanded.len() <= 7);
        // Seeded tokens survive even at the cap.
        for k in &t.kept {
            assert!(t.expanded.contains(k));
        }
    }

    #[test]
    fn normalize_is_idempotent_on_normalized_input() {
        let first = normalize("sublease checklist", 6, 12);
        let again = normalize(&first.kept.join(" "), 6, 12);
        assert_eq!(first.kept, again.kept);
    }

    #[test]
    fn expansion_is_monotonic() {
        let first = normalize("sublease checklist", 6, 24);
        let re_expanded = expand_terms(&first.expanded, SYNONYM_RULES, 24);
        assert_eq!(first.expanded, re_expanded);
    }
}
