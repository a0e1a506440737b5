use glob::Pattern;
use std::fs;
use std::path::Path;
use tracing::warn;

pub const IGNORE_FILENAME: &str = ".docsieveignore";

/// Gitignore-style exclusions for documentation discovery, read from
/// `~/.docsieveignore` and the repo's `.docsieveignore`.
#[derive(Debug, Default)]
pub struct IgnorePatterns {
    patterns: Vec<Pattern>,
}

impl IgnorePatterns {
    pub fn load(root: &Path) -> Self {
        let mut patterns = Vec::new();

        if let Some(home) = dirs::home_dir() {
            if let Ok(content) = fs::read_to_string(home.join(IGNORE_FILENAME)) {
                patterns.extend(Self::parse(&content));
            }
        }

        if let Ok(content) = fs::read_to_string(root.join(IGNORE_FILENAME)) {
            patterns.extend(Self::parse(&content));
        }

        IgnorePatterns { patterns }
    }

    pub fn from_lines(content: &str) -> Self {
        IgnorePatterns {
            patterns: Self::parse(content),
        }
    }

    fn parse(content: &str) -> Vec<Pattern> {
        let mut patterns = Vec::new();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let pattern = if line.starts_with("**/") {
                line.to_string()
            } else if line.ends_with('/') {
                format!("{}**", line)
            } else if line.contains('*') || line.contains('?') {
                format!("**/{}", line)
            } else {
                line.to_string()
            };

            match Pattern::new(&pattern) {
                Ok(p) => patterns.push(p),
                Err(e) => warn!(pattern = %line, error = %e, "ignoring invalid ignore pattern"),
            }
        }

        patterns
    }

    pub fn is_ignored(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(path))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
