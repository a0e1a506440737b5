use glob::Pattern;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Category {
    Skip,
    Normal,
    High,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Skip => write!(f, "SKIP"),
            Category::Normal => write!(f, "NORMAL"),
            Category::High => write!(f, "HIGH"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileClassification {
    pub path: String,
    pub category: Category,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_pattern: Option<String>,
}

/// A named, ordered list of glob patterns, e.g. `lock = ["*.lock", ...]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternGroup {
    pub name: String,
    pub patterns: Vec<String>,
}

impl PatternGroup {
    pub fn new(name: &str, patterns: &[&str]) -> Self {
        PatternGroup {
            name: name.to_string(),
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
        }
    }
}

lazy_static! {
    pub static ref TRIVIAL_PATTERNS: Vec<PatternGroup> = vec![
        PatternGroup::new(
            "test",
            &["*_test.py", "*.spec.ts", "*.spec.js", "tests/*", "test_*.py", "**/test/**"],
        ),
        PatternGroup::new(
            "lock",
            &["*.lock", "*.sum", "package-lock.json", "poetry.lock", "cargo.lock", "yarn.lock"],
        ),
        PatternGroup::new(
            "vendor",
            &["vendor/*", "node_modules/*", "dist/*", "build/*", ".venv/*", "venv/*"],
        ),
        PatternGroup::new(
            "generated",
            &["*_pb2.py", "*.pb.go", "*_generated.py", "*.generated.ts"],
        ),
        PatternGroup::new("minified", &["*.min.js", "*.min.css", "*.bundle.js"]),
    ];
    pub static ref CRITICAL_PATTERNS: Vec<PatternGroup> = vec![
        PatternGroup::new("readme", &["README.md", "readme.md", "README.rst"]),
        PatternGroup::new("api_docs", &["docs/api/*", "api/*"]),
        PatternGroup::new(
            "entry_points",
            &["__init__.py", "index.ts", "index.js", "lib.rs", "main.py", "main.go"],
        ),
        PatternGroup::new(
            "config",
            &["*.config.js", "*.config.ts", "pyproject.toml", "setup.py", "Cargo.toml"],
        ),
    ];
}

#[derive(Debug, Error)]
#[error("invalid pattern '{pattern}': {source}")]
pub struct InvalidPattern {
    pub pattern: String,
    #[source]
    pub source: glob::PatternError,
}

struct CompiledGroup {
    name: String,
    patterns: Vec<(String, Pattern)>,
}

/// Path-only triage of changed files. Trivial groups are checked before
/// critical groups and the first matching pattern wins.
pub struct FileClassifier {
    trivial: Vec<CompiledGroup>,
    critical: Vec<CompiledGroup>,
}

impl FileClassifier {
    /// Compiles both group lists. Patterns are matched case-insensitively by
    /// lowercasing both sides.
    pub fn new(
        trivial: &[PatternGroup],
        critical: &[PatternGroup],
    ) -> Result<Self, InvalidPattern> {
        Ok(FileClassifier {
            trivial: compile_groups(trivial)?,
            critical: compile_groups(critical)?,
        })
    }

    pub fn classify(&self, path: &str) -> FileClassification {
        let lowered = path.to_lowercase();

        if let Some((group, pattern)) = first_match(&self.trivial, &lowered) {
            return FileClassification {
                path: path.to_string(),
                category: Category::Skip,
                reason: format!("Trivial file type: {}", group),
                matched_pattern: Some(pattern.to_string()),
            };
        }

        if let Some((group, pattern)) = first_match(&self.critical, &lowered) {
            return FileClassification {
                path: path.to_string(),
                category: Category::High,
                reason: format!("Critical file type: {}", group),
                matched_pattern: Some(pattern.to_string()),
            };
        }

        FileClassification {
            path: path.to_string(),
            category: Category::Normal,
            reason: "Regular file requiring standard analysis".to_string(),
            matched_pattern: None,
        }
    }
}

impl Default for FileClassifier {
    fn default() -> Self {
        FileClassifier::new(&TRIVIAL_PATTERNS, &CRITICAL_PATTERNS)
            .unwrap_or_else(|e| panic!("built-in {}", e))
    }
}

fn compile_groups(groups: &[PatternGroup]) -> Result<Vec<CompiledGroup>, InvalidPattern> {
    groups
        .iter()
        .map(|group| {
            let patterns = group
                .patterns
                .iter()
                .map(|p| {
                    Pattern::new(&p.to_lowercase())
                        .map(|compiled| (p.clone(), compiled))
                        .map_err(|source| InvalidPattern {
                            pattern: p.clone(),
                            source,
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(CompiledGroup {
                name: group.name.clone(),
                patterns,
            })
        })
        .collect()
}

fn first_match<'a>(groups: &'a [CompiledGroup], path: &str) -> Option<(&'a str, &'a str)> {
    for group in groups {
        for (raw, pattern) in &group.patterns {
            if pattern.matches(path) {
                return Some((group.name.as_str(), raw.as_str()));
            }
        }
    }
    None
}

/// Semantic area a change most likely touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeCategory {
    Api,
    Cli,
    Configuration,
    Architecture,
    Deployment,
    Testing,
    Security,
    Documentation,
}

impl ChangeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeCategory::Api => "api",
            ChangeCategory::Cli => "cli",
            ChangeCategory::Configuration => "configuration",
            ChangeCategory::Architecture => "architecture",
            ChangeCategory::Deployment => "deployment",
            ChangeCategory::Testing => "testing",
            ChangeCategory::Security => "security",
            ChangeCategory::Documentation => "documentation",
        }
    }
}

lazy_static! {
    static ref CATEGORY_RULES: Vec<(ChangeCategory, Vec<&'static str>)> = vec![
        (ChangeCategory::Cli, vec!["cli/", "commands/", "_cli."]),
        (ChangeCategory::Api, vec!["api/", "endpoints/", "routes/", "views/"]),
        (
            ChangeCategory::Configuration,
            vec!["config", "pyproject.toml", "cargo.toml", "setup.py", "requirements.txt", ".env", "settings"],
        ),
        (
            ChangeCategory::Architecture,
            vec!["__init__.py", "mod.rs", "lib.rs", "architecture/", "core/", "models/domain/"],
        ),
        (
            ChangeCategory::Testing,
            vec!["test_", "_test.", "tests/", "test/", ".spec.", "conftest.py"],
        ),
        (ChangeCategory::Security, vec!["security/", "auth", "crypto", "secrets"]),
        (
            ChangeCategory::Deployment,
            vec!["deploy", "docker", "kubernetes", "k8s", ".yml", ".yaml", "ci/"],
        ),
        (ChangeCategory::Documentation, vec!["docs/", "readme", ".md", ".rst"]),
    ];
}

/// First category whose substrings appear in the lowercased path.
pub fn infer_category(path: &str) -> Option<ChangeCategory> {
    let lowered = path.to_lowercase();
    CATEGORY_RULES
        .iter()
        .find(|(_, needles)| needles.iter().any(|n| lowered.contains(n)))
        .map(|(category, _)| *category)
}
