use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tracing::{debug, warn};

const MIN_TERM_LEN: usize = 3;

lazy_static! {
    static ref STOPWORDS: HashSet<&'static str> = [
        "the", "and", "for", "with", "this", "that", "from", "are", "was", "were", "will",
        "can", "not", "but", "you", "your", "our", "has", "have", "had", "into", "its", "all",
        "any", "use", "used", "using", "when", "then", "than", "also", "each", "which", "who",
        "what", "where", "how", "more", "most", "some", "such", "only", "other", "may", "must",
        "should", "would", "could", "been", "being", "there", "their", "they", "them", "these",
        "those", "via", "per", "see", "does", "did", "here", "about", "over", "out",
        // language keywords that carry no documentation meaning
        "self", "none", "true", "false", "null", "nil", "return", "def", "let", "mut", "pub",
        "impl", "struct", "enum", "class", "import", "const", "var", "function", "func", "end",
        "else", "elif", "while", "match", "async", "await", "static", "void", "string", "str",
    ]
    .into_iter()
    .collect();
}

#[derive(Debug, Error)]
pub enum TermIndexError {
    #[error("failed to access term index {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid term index {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InclusionReason {
    TermMatch,
    HighPriority,
    ScopeRelevant,
    SafetyNet,
}

impl InclusionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            InclusionReason::TermMatch => "term match",
            InclusionReason::HighPriority => "high priority",
            InclusionReason::ScopeRelevant => "scope relevant",
            InclusionReason::SafetyNet => "safety net",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelevantDoc {
    pub path: String,
    pub match_count: usize,
    pub reason: InclusionReason,
}

#[derive(Debug, Clone, Default)]
pub struct RelevanceQuery {
    pub min_match_threshold: usize,
    pub min_docs_threshold: usize,
    pub high_priority: BTreeSet<String>,
    pub scope_relevant: BTreeSet<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocTermIndex {
    term_to_docs: BTreeMap<String, BTreeSet<String>>,
    #[serde(default)]
    doc_hashes: BTreeMap<String, String>,
}

impl DocTermIndex {
    pub fn build<I, P, B>(corpus: I) -> Self
    where
        I: IntoIterator<Item = (P, B)>,
        P: Into<String>,
        B: AsRef<[u8]>,
    {
        let mut index = DocTermIndex::default();

        for (path, content) in corpus {
            let path = path.into();
            let bytes = content.as_ref();
            let text = match std::str::from_utf8(bytes) {
                Ok(text) => text,
                Err(e) => {
                    warn!(doc = %path, error = %e, "skipping unreadable document");
                    continue;
                }
            };

            index.doc_hashes.insert(path.clone(), content_hash(bytes));
            for term in extract_terms(text) {
                index
                    .term_to_docs
                    .entry(term)
                    .or_default()
                    .insert(path.clone());
            }
        }

        debug!(
            docs = index.doc_hashes.len(),
            terms = index.term_to_docs.len(),
            "built term index"
        );
        index
    }

    pub fn is_empty(&self) -> bool {
        self.term_to_docs.is_empty()
    }

    pub fn term_count(&self) -> usize {
        self.term_to_docs.len()
    }

    pub fn doc_count(&self) -> usize {
        self.doc_hashes.len()
    }

    pub fn doc_paths(&self) -> impl Iterator<Item = &str> {
        self.doc_hashes.keys().map(String::as_str)
    }

    pub fn docs_for(&self, term: &str) -> Option<&BTreeSet<String>> {
        self.term_to_docs.get(term)
    }

    pub fn term_match_count(&self, change_terms: &BTreeSet<String>) -> usize {
        change_terms
            .iter()
            .filter(|t| self.term_to_docs.contains_key(t.as_str()))
            .count()
    }

    pub fn match_counts(&self, change_terms: &BTreeSet<String>) -> Vec<(String, usize)> {
        let mut counts = self.count_by_doc(change_terms).into_iter().collect::<Vec<_>>();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        counts
    }

    fn count_by_doc(&self, change_terms: &BTreeSet<String>) -> BTreeMap<String, usize> {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for term in change_terms {
            if let Some(docs) = self.term_to_docs.get(term) {
                for doc in docs {
                    *counts.entry(doc.clone()).or_default() += 1;
                }
            }
        }
        counts
    }

    /// OR of term match, HIGH priority and scope, topped up by match count to `min_docs_threshold`.
    pub fn relevant_docs(
        &self,
        change_terms: &BTreeSet<String>,
        query: &RelevanceQuery,
    ) -> Vec<RelevantDoc> {
        let counts = self.count_by_doc(change_terms);

        let universe: BTreeSet<&str> = self
            .doc_hashes
            .keys()
            .chain(self.term_to_docs.values().flatten())
            .chain(query.high_priority.iter())
            .chain(query.scope_relevant.iter())
            .map(String::as_str)
            .collect();

        let mut included = Vec::new();
        let mut excluded = Vec::new();

        for path in &universe {
            let match_count = counts.get(*path).copied().unwrap_or(0);
            let reason = if match_count >= query.min_match_threshold {
                Some(InclusionReason::TermMatch)
            } else if query.high_priority.contains(*path) {
                Some(InclusionReason::HighPriority)
            } else if query.scope_relevant.contains(*path) {
                Some(InclusionReason::ScopeRelevant)
            } else {
                None
            };

            let doc = RelevantDoc {
                path: path.to_string(),
                match_count,
                reason: reason.unwrap_or(InclusionReason::SafetyNet),
            };
            if reason.is_some() {
                included.push(doc);
            } else {
                excluded.push(doc);
            }
        }

        let target = query.min_docs_threshold.min(universe.len());
        if included.len() < target {
            excluded.sort_by(by_relevance);
            let missing = target - included.len();
            debug!(restored = missing, "restoring docs below minimum threshold");
            included.extend(excluded.into_iter().take(missing));
        }

        included.sort_by(by_relevance);
        included
    }

    pub fn is_stale(&self, current: &BTreeMap<String, String>) -> bool {
        if self.doc_hashes.is_empty() {
            return true;
        }
        self.doc_hashes != *current
    }

    pub fn save(&self, path: &Path) -> Result<(), TermIndexError> {
        let io_err = |source| TermIndexError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let content = serde_json::to_string_pretty(self).map_err(|source| TermIndexError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, content).map_err(io_err)?;

        Ok(())
    }

    pub fn load(path: &Path) -> Result<Option<Self>, TermIndexError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path).map_err(|source| TermIndexError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let index = serde_json::from_str(&content).map_err(|source| TermIndexError::Json {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Some(index))
    }
}

fn by_relevance(a: &RelevantDoc, b: &RelevantDoc) -> std::cmp::Ordering {
    b.match_count
        .cmp(&a.match_count)
        .then_with(|| a.path.cmp(&b.path))
}

pub fn content_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

pub fn corpus_hashes<I, P, B>(corpus: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (P, B)>,
    P: Into<String>,
    B: AsRef<[u8]>,
{
    corpus
        .into_iter()
        .filter(|(_, content)| std::str::from_utf8(content.as_ref()).is_ok())
        .map(|(path, content)| (path.into(), content_hash(content.as_ref())))
        .collect()
}

/// Lowercase terms split on non-alphanumerics and camelCase; the whole piece is kept too.
pub fn extract_terms(text: &str) -> BTreeSet<String> {
    let mut terms = BTreeSet::new();

    for token in text.split_whitespace() {
        for piece in token.split(|c: char| !c.is_alphanumeric()) {
            push_term(&mut terms, piece);
            let words = camel_words(piece);
            if words.len() > 1 {
                for word in words {
                    push_term(&mut terms, word);
                }
            }
        }
    }

    terms
}

fn push_term(terms: &mut BTreeSet<String>, raw: &str) {
    if raw.chars().count() < MIN_TERM_LEN {
        return;
    }
    if !raw.chars().next().is_some_and(char::is_alphabetic) {
        return;
    }
    let term = raw.to_lowercase();
    if STOPWORDS.contains(term.as_str()) {
        return;
    }
    terms.insert(term);
}

/// Splits `parseHTTPHeader` into `parse`, `HTTP`, `Header`.
fn camel_words(piece: &str) -> Vec<&str> {
    let chars: Vec<(usize, char)> = piece.char_indices().collect();
    let mut words = Vec::new();
    let mut start = 0;

    for i in 1..chars.len() {
        let (idx, c) = chars[i];
        let prev = chars[i - 1].1;
        let next_lower = chars.get(i + 1).is_some_and(|(_, n)| n.is_lowercase());

        let boundary = (prev.is_lowercase() && c.is_uppercase())
            || (prev.is_uppercase() && c.is_uppercase() && next_lower)
            || (prev.is_alphabetic() != c.is_alphabetic());

        if boundary {
            words.push(&piece[start..idx]);
            start = idx;
        }
    }
    if start < piece.len() {
        words.push(&piece[start..]);
    }

    words
}

/// Readers keep their snapshot even if a rebuild is swapped in.
#[derive(Debug, Default)]
pub struct SharedTermIndex {
    current: RwLock<Arc<DocTermIndex>>,
}

impl SharedTermIndex {
    pub fn new(index: DocTermIndex) -> Self {
        SharedTermIndex {
            current: RwLock::new(Arc::new(index)),
        }
    }

    pub fn snapshot(&self) -> Arc<DocTermIndex> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn swap(&self, index: DocTermIndex) -> Arc<DocTermIndex> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, Arc::new(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::tempdir;

    fn terms(words: &[&str]) -> BTreeSet<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    fn sample_corpus() -> Vec<(&'static str, &'static str)> {
        vec![
            ("README.md", "# Overview\nRun the setup command to configure docsieve."),
            ("docs/cli.md", "## CLI Reference\nThe `filter` command accepts arguments."),
            ("docs/config.md", "## Configuration\nSet magnitude_floor in the config file."),
        ]
    }

    #[test]
    fn test_extract_terms_identifiers() {
        let t = extract_terms("DocSummary parse_args kebab-case-name");
        assert!(t.contains("docsummary"));
        assert!(t.contains("doc"));
        assert!(t.contains("summary"));
        assert!(t.contains("parse"));
        assert!(t.contains("args"));
        assert!(t.contains("kebab"));
        assert!(t.contains("case"));
        assert!(t.contains("name"));
    }

    #[test]
    fn test_extract_terms_paths() {
        let t = extract_terms("see dope/cli/scan.py for details");
        assert!(t.contains("dope"));
        assert!(t.contains("cli"));
        assert!(t.contains("scan"));
        assert!(!t.contains("py"));
        assert!(!t.contains("see"));
        assert!(!t.contains("for"));
    }

    #[test]
    fn test_extract_terms_acronyms() {
        let t = extract_terms("parseHTTPHeader");
        assert!(t.contains("parse"));
        assert!(t.contains("http"));
        assert!(t.contains("header"));
    }

    #[test]
    fn test_extract_terms_drops_numbers_and_short() {
        let t = extract_terms("42 ab 2024-01-01 v2");
        assert!(t.is_empty(), "unexpected terms: {:?}", t);
    }

    #[test]
    fn test_build_is_idempotent() {
        let first = DocTermIndex::build(sample_corpus());
        let second = DocTermIndex::build(sample_corpus());
        assert_eq!(first, second);
        assert_eq!(first.doc_count(), 3);
    }

    #[test]
    fn test_build_skips_invalid_utf8() {
        let corpus: Vec<(&str, Vec<u8>)> = vec![
            ("good.md", b"configuration guide".to_vec()),
            ("bad.md", vec![0xff, 0xfe, 0x00]),
        ];
        let index = DocTermIndex::build(corpus);
        assert_eq!(index.doc_count(), 1);
        assert!(index.docs_for("configuration").is_some());
    }

    #[test]
    fn test_empty_corpus() {
        let index = DocTermIndex::build(Vec::<(String, String)>::new());
        assert!(index.is_empty());
        let docs = index.relevant_docs(&terms(&["cli"]), &RelevanceQuery::default());
        assert!(docs.is_empty());
    }

    #[test]
    fn test_match_counts_sorted() {
        let index = DocTermIndex::build(sample_corpus());
        let counts = index.match_counts(&terms(&["command", "filter", "arguments", "setup"]));
        assert_eq!(counts[0], ("docs/cli.md".to_string(), 3));
        assert_eq!(counts[1], ("README.md".to_string(), 2));
        assert_eq!(index.term_match_count(&terms(&["command", "unknown"])), 1);
    }

    #[test]
    fn test_relevant_docs_or_policy() {
        let index = DocTermIndex::build(sample_corpus());
        let query = RelevanceQuery {
            min_match_threshold: 2,
            min_docs_threshold: 0,
            high_priority: terms(&["README.md"]),
            scope_relevant: terms(&["docs/config.md"]),
        };

        let docs = index.relevant_docs(&terms(&["filter", "arguments"]), &query);
        let reasons: BTreeMap<_, _> = docs.iter().map(|d| (d.path.as_str(), d.reason)).collect();
        assert_eq!(reasons["docs/cli.md"], InclusionReason::TermMatch);
        assert_eq!(reasons["README.md"], InclusionReason::HighPriority);
        assert_eq!(reasons["docs/config.md"], InclusionReason::ScopeRelevant);
    }

    #[test]
    fn test_empty_change_terms_keep_priority_docs() {
        let index = DocTermIndex::build(sample_corpus());
        let query = RelevanceQuery {
            min_match_threshold: 1,
            high_priority: terms(&["README.md"]),
            ..RelevanceQuery::default()
        };
        let docs = index.relevant_docs(&BTreeSet::new(), &query);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].path, "README.md");
    }

    #[test]
    fn test_safety_net_restores_best_excluded() {
        let corpus: Vec<(String, String)> = (0..10)
            .map(|i| {
                let body = match i {
                    0 => "alpha bravo charlie".to_string(),
                    1 => "alpha bravo".to_string(),
                    2 => "alpha".to_string(),
                    _ => format!("unrelated topic{}", i),
                };
                (format!("docs/doc{}.md", i), body)
            })
            .collect();
        let index = DocTermIndex::build(corpus);
        let query = RelevanceQuery {
            min_match_threshold: 3,
            min_docs_threshold: 3,
            ..RelevanceQuery::default()
        };

        let docs = index.relevant_docs(&terms(&["alpha", "bravo", "charlie"]), &query);
        assert_eq!(docs.len(), 3);
        assert_eq!(docs[0].path, "docs/doc0.md");
        assert_eq!(docs[0].reason, InclusionReason::TermMatch);
        assert_eq!(docs[1].path, "docs/doc1.md");
        assert_eq!(docs[1].reason, InclusionReason::SafetyNet);
        assert_eq!(docs[2].path, "docs/doc2.md");
    }

    proptest! {
        #[test]
        fn safety_net_lower_bound(doc_total in 0usize..12, min_docs in 0usize..15, threshold in 0usize..5) {
            let corpus: Vec<(String, String)> = (0..doc_total)
                .map(|i| (format!("doc{}.md", i), format!("topic{} shared", i)))
                .collect();
            let index = DocTermIndex::build(corpus);
            let query = RelevanceQuery {
                min_match_threshold: threshold,
                min_docs_threshold: min_docs,
                ..RelevanceQuery::default()
            };
            let docs = index.relevant_docs(&terms(&["shared"]), &query);
            prop_assert!(docs.len() >= min_docs.min(doc_total));
        }
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state").join("doc-terms.json");
        let index = DocTermIndex::build(sample_corpus());

        index.save(&path).unwrap();
        let loaded = DocTermIndex::load(&path).unwrap().unwrap();
        assert_eq!(loaded, index);

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert!(raw["term_to_docs"]["command"].is_array());
    }

    #[test]
    fn test_load_missing_and_corrupt() {
        let dir = tempdir().unwrap();
        assert!(DocTermIndex::load(&dir.path().join("missing.json"))
            .unwrap()
            .is_none());

        let corrupt = dir.path().join("corrupt.json");
        fs::write(&corrupt, "{not json").unwrap();
        assert!(matches!(
            DocTermIndex::load(&corrupt),
            Err(TermIndexError::Json { .. })
        ));
    }

    #[test]
    fn test_is_stale() {
        let index = DocTermIndex::build(sample_corpus());
        assert!(!index.is_stale(&corpus_hashes(sample_corpus())));

        let mut changed = sample_corpus();
        changed[0].1 = "# Overview\nRewritten.";
        assert!(index.is_stale(&corpus_hashes(changed)));

        assert!(DocTermIndex::default().is_stale(&BTreeMap::new()));
    }

    #[test]
    fn test_shared_index_swap() {
        let shared = SharedTermIndex::new(DocTermIndex::build(sample_corpus()));
        let before = shared.snapshot();

        shared.swap(DocTermIndex::default());

        assert_eq!(before.doc_count(), 3);
        assert!(shared.snapshot().is_empty());
    }
}
