use crate::git::{self, GitError};
use crate::ignore::IgnorePatterns;
use crate::terms::{corpus_hashes, DocTermIndex};
use mime_guess::mime;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

pub const DOC_EXTENSIONS: &[&str] = &["md", "markdown", "mdx", "rst", "adoc", "asciidoc", "org", "wiki"];

pub const EXCLUDED_DIRS: &[&str] = &["node_modules", ".venv", "dist", "build", "venv", ".pytest_cache"];

pub fn is_doc_path(path: &str) -> bool {
    let Some(extension) = Path::new(path).extension().and_then(|e| e.to_str()) else {
        return false;
    };
    let extension = extension.to_lowercase();
    DOC_EXTENSIONS.contains(&extension.as_str())
}

fn in_excluded_dir(path: &str) -> bool {
    let components: Vec<&str> = path.split('/').collect();
    components[..components.len().saturating_sub(1)]
        .iter()
        .any(|dir| EXCLUDED_DIRS.contains(dir))
}

fn is_text_file(path: &Path) -> bool {
    let mime = mime_guess::from_path(path).first_or_text_plain();

    !match mime.type_() {
        mime::IMAGE | mime::VIDEO | mime::AUDIO => true,
        mime::APPLICATION => mime.subtype() == mime::OCTET_STREAM,
        _ => false,
    }
}

/// Tracked and untracked (not ignored) documentation files under `root`,
/// sorted by path.
pub fn discover_docs(root: &Path) -> Result<Vec<String>, GitError> {
    let ignore = IgnorePatterns::load(root);

    let mut docs: Vec<String> = git::ls_files(root)?
        .into_iter()
        .filter_map(|p| p.to_str().map(String::from))
        .filter(|p| is_doc_path(p))
        .filter(|p| !in_excluded_dir(p))
        .filter(|p| !ignore.is_ignored(p))
        .filter(|p| is_text_file(Path::new(p)))
        .collect();
    docs.sort();

    debug!(count = docs.len(), "discovered documentation files");
    Ok(docs)
}

/// Reads each doc under `root`. Files that vanished or cannot be read are
/// logged and left out.
pub fn read_corpus(root: &Path, docs: &[String]) -> Vec<(String, Vec<u8>)> {
    docs.iter()
        .filter_map(|doc| match fs::read(root.join(doc)) {
            Ok(content) => Some((doc.clone(), content)),
            Err(e) => {
                warn!(doc = %doc, error = %e, "skipping unreadable document");
                None
            }
        })
        .collect()
}

/// Where the index returned by [`load_index`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexSource {
    /// The saved artifact matched the current docs.
    Fresh,
    Missing,
    Stale,
    Unreadable,
}

#[derive(Debug)]
pub struct LoadedIndex {
    pub index: DocTermIndex,
    pub source: IndexSource,
    pub doc_count: usize,
}

/// Returns the saved index at `path` when it still matches the docs under
/// `root`, otherwise a freshly built one. Nothing is written.
pub fn load_index(root: &Path, path: &Path) -> Result<LoadedIndex, GitError> {
    let docs = discover_docs(root)?;
    let corpus = read_corpus(root, &docs);
    let hashes = corpus_hashes(corpus.iter().map(|(p, c)| (p.as_str(), c.as_slice())));

    let source = match DocTermIndex::load(path) {
        Ok(Some(index)) if !index.is_stale(&hashes) => {
            debug!(path = %path.display(), "term index is fresh");
            return Ok(LoadedIndex {
                index,
                source: IndexSource::Fresh,
                doc_count: hashes.len(),
            });
        }
        Ok(Some(_)) => {
            info!(path = %path.display(), "term index is stale, rebuilding");
            IndexSource::Stale
        }
        Ok(None) => IndexSource::Missing,
        Err(e) => {
            warn!(error = %e, "term index unreadable, rebuilding");
            IndexSource::Unreadable
        }
    };

    Ok(LoadedIndex {
        index: DocTermIndex::build(corpus),
        source,
        doc_count: hashes.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_is_doc_path() {
        assert!(is_doc_path("README.md"));
        assert!(is_doc_path("docs/guide.RST"));
        assert!(is_doc_path("notes/todo.org"));
        assert!(!is_doc_path("src/main.rs"));
        assert!(!is_doc_path("Makefile"));
    }

    #[test]
    fn test_excluded_dirs() {
        assert!(in_excluded_dir("node_modules/pkg/README.md"));
        assert!(in_excluded_dir("web/dist/guide.md"));
        assert!(!in_excluded_dir("docs/build.md"));
        assert!(!in_excluded_dir("README.md"));
    }

    #[test]
    fn test_text_detection() {
        assert!(is_text_file(Path::new("docs/guide.md")));
        assert!(is_text_file(Path::new("docs/notes.wiki")));
        assert!(!is_text_file(Path::new("docs/diagram.png")));
    }

    #[test]
    fn test_read_corpus_skips_missing() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.md"), "alpha").unwrap();
        let corpus = read_corpus(dir.path(), &["a.md".to_string(), "gone.md".to_string()]);
        assert_eq!(corpus.len(), 1);
        assert_eq!(corpus[0].1, b"alpha");
    }
}
