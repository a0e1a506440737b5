use crate::classifier::Category;
use crate::config::ConfigError;
use crate::magnitude::ChangeMagnitude;
use crate::relevance::RelevanceScore;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

pub const OMITTED_NAME: &str = "Details omitted";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DetailLevel {
    Minimal,
    Reduced,
    Full,
}

impl fmt::Display for DetailLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetailLevel::Full => write!(f, "FULL"),
            DetailLevel::Reduced => write!(f, "REDUCED"),
            DetailLevel::Minimal => write!(f, "MINIMAL"),
        }
    }
}

/// Cutoffs for [`DetailLevel`]. Construction enforces
/// `0 <= medium < high <= 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetailThresholds {
    high: f64,
    medium: f64,
}

impl DetailThresholds {
    pub fn new(high: f64, medium: f64) -> Result<Self, ConfigError> {
        if !(0.0..=1.0).contains(&high) {
            return Err(ConfigError::invalid(
                "high_detail_threshold",
                format!("must be within [0, 1], got {}", high),
            ));
        }
        if !(0.0..=1.0).contains(&medium) {
            return Err(ConfigError::invalid(
                "medium_detail_threshold",
                format!("must be within [0, 1], got {}", medium),
            ));
        }
        if high <= medium {
            return Err(ConfigError::invalid(
                "high_detail_threshold",
                format!("must be greater than medium_detail_threshold ({} <= {})", high, medium),
            ));
        }
        Ok(DetailThresholds { high, medium })
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    pub fn medium(&self) -> f64 {
        self.medium
    }

    pub fn select(&self, combined: f64) -> DetailLevel {
        if combined >= self.high {
            DetailLevel::Full
        } else if combined >= self.medium {
            DetailLevel::Reduced
        } else {
            DetailLevel::Minimal
        }
    }
}

impl Default for DetailThresholds {
    fn default() -> Self {
        DetailThresholds {
            high: 0.6,
            medium: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeChange {
    pub name: String,
    pub summary: String,
}

/// Structured description of one file's change, normally produced by the
/// summarizing LLM layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSummary {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub specific_changes: Vec<CodeChange>,
    #[serde(default)]
    pub functional_impact: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub programming_language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

lazy_static! {
    static ref LANGUAGES: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        m.insert("rs", "Rust");
        m.insert("py", "Python");
        m.insert("go", "Go");
        m.insert("js", "JavaScript");
        m.insert("jsx", "JavaScript");
        m.insert("ts", "TypeScript");
        m.insert("tsx", "TypeScript");
        m.insert("java", "Java");
        m.insert("kt", "Kotlin");
        m.insert("rb", "Ruby");
        m.insert("c", "C");
        m.insert("h", "C");
        m.insert("cpp", "C++");
        m.insert("cs", "C#");
        m.insert("sh", "Shell");
        m.insert("toml", "TOML");
        m.insert("yaml", "YAML");
        m.insert("yml", "YAML");
        m.insert("json", "JSON");
        m.insert("md", "Markdown");
        m
    };
}

pub fn language_for(path: &str) -> Option<&'static str> {
    let extension = Path::new(path).extension().and_then(|s| s.to_str())?;
    LANGUAGES.get(extension.to_lowercase().as_str()).copied()
}

impl ChangeSummary {
    /// Mechanical summary of a (normalized) unified diff, used when no LLM
    /// summary exists yet. Each hunk becomes one specific change.
    pub fn from_diff(path: &str, diff: &str) -> Self {
        let mut changes = Vec::new();
        let mut current: Option<(String, u64, u64)> = None;

        for line in diff.lines() {
            if let Some(rest) = line.strip_prefix("@@") {
                if let Some(hunk) = current.take() {
                    changes.push(hunk_change(hunk));
                }
                let context = rest
                    .split_once("@@")
                    .map(|(_, ctx)| ctx.trim())
                    .filter(|ctx| !ctx.is_empty())
                    .map(String::from)
                    .unwrap_or_else(|| format!("hunk {}", changes.len() + 1));
                current = Some((context, 0, 0));
            } else if let Some((_, added, removed)) = current.as_mut() {
                if line.starts_with('+') {
                    *added += 1;
                } else if line.starts_with('-') {
                    *removed += 1;
                }
            }
        }
        if let Some(hunk) = current.take() {
            changes.push(hunk_change(hunk));
        }

        ChangeSummary {
            specific_changes: changes,
            functional_impact: Vec::new(),
            programming_language: language_for(path).map(String::from),
            note: None,
        }
    }

    /// Keeps the amount of detail `level` allows. Pruning is always visible in
    /// the result, either as an omitted-details entry or as a note.
    pub fn prune(&self, level: DetailLevel) -> ChangeSummary {
        match level {
            DetailLevel::Full => self.clone(),
            DetailLevel::Reduced => {
                let elided = self.specific_changes.len();
                ChangeSummary {
                    specific_changes: vec![CodeChange {
                        name: OMITTED_NAME.to_string(),
                        summary: format!("{} specific change(s) summarized by impact", elided),
                    }],
                    functional_impact: self.functional_impact.clone(),
                    programming_language: self.programming_language.clone(),
                    note: self.note.clone(),
                }
            }
            DetailLevel::Minimal => ChangeSummary {
                specific_changes: Vec::new(),
                functional_impact: self.functional_impact.clone(),
                programming_language: self.programming_language.clone(),
                note: Some(format!(
                    "{}: low relevance, {} specific change(s) not included",
                    OMITTED_NAME,
                    self.specific_changes.len()
                )),
            },
        }
    }
}

fn hunk_change((context, added, removed): (String, u64, u64)) -> CodeChange {
    CodeChange {
        name: context,
        summary: format!("+{} -{} lines", added, removed),
    }
}

/// Everything the formatter needs to render one processed change.
#[derive(Debug, Clone)]
pub struct PayloadInput<'a> {
    pub path: &'a str,
    pub category: Category,
    pub magnitude: &'a ChangeMagnitude,
    pub relevance: &'a RelevanceScore,
    pub level: DetailLevel,
    pub change_category: Option<&'a str>,
    pub related_docs: &'a [String],
    pub summary: &'a ChangeSummary,
}

/// Renders a change as a prompt fragment: a metadata header followed by the
/// pruned summary wrapped in a tag named after the file.
pub fn format_change(input: &PayloadInput<'_>) -> String {
    let mut parts = vec![format!("file_path: {}", input.path)];

    parts.push(format!("Priority: {}", input.category));

    let magnitude = input.magnitude;
    if magnitude.score > 0.0 {
        parts.push(format!(
            "Change Magnitude: {:.2} (significance: {})",
            magnitude.score,
            magnitude.significance()
        ));
    }
    if magnitude.total_lines() > 0 {
        parts.push(format!(
            "Lines Changed: +{} -{}",
            magnitude.lines_added, magnitude.lines_removed
        ));
    }
    if let Some(category) = input.change_category {
        parts.push(format!("Category: {}", category));
    }
    parts.push(format!("Combined Relevance: {:.2}", input.relevance.combined));
    parts.push(format!("Detail Level: {}", input.level));
    if !input.related_docs.is_empty() {
        parts.push(format!("Related Docs: {}", input.related_docs.join(", ")));
    }

    let pruned = input.summary.prune(input.level);
    let body = serde_json::to_string_pretty(&pruned).unwrap_or_else(|_| "{}".to_string());
    parts.push(format!("\n<{tag}>\n{body}\n</{tag}>", tag = input.path, body = body));

    parts.join("\n")
}
