use crate::classifier::{FileClassifier, InvalidPattern, PatternGroup, CRITICAL_PATTERNS, TRIVIAL_PATTERNS};
use crate::detail::DetailThresholds;
use crate::git;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub const CONFIG_FILENAME: &str = ".docsieve.toml";
pub const DEFAULT_INDEX_PATH: &str = ".docsieve/doc-terms.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for '{field}': {message}")]
    InvalidField { field: &'static str, message: String },

    #[error("'{field}' must contain at least one pattern")]
    MissingPatterns { field: &'static str },

    #[error("invalid pattern in '{field}': {source}")]
    InvalidPattern {
        field: &'static str,
        #[source]
        source: InvalidPattern,
    },

    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        ConfigError::InvalidField {
            field,
            message: message.into(),
        }
    }
}

/// One configuration layer. Unset fields fall through to the layer below and
/// finally to the defaults in [`FilterSettings`].
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub base_branch: Option<String>,
    pub index_path: Option<String>,
    pub enable_filtering: Option<bool>,
    pub jobs: Option<usize>,
    pub magnitude_floor: Option<f64>,
    pub high_detail_threshold: Option<f64>,
    pub medium_detail_threshold: Option<f64>,
    pub doc_term_boost_weight: Option<f64>,
    pub doc_term_match_threshold: Option<usize>,
    pub min_docs_threshold: Option<usize>,
    pub rename_similarity_floor: Option<f64>,
    pub priority_boost: Option<f64>,
    pub term_boost_divisor: Option<f64>,
    pub trivial_patterns: Option<Vec<PatternGroup>>,
    pub critical_patterns: Option<Vec<PatternGroup>>,
}

macro_rules! merge_fields {
    ($self:ident, $other:ident, $($field:ident),+ $(,)?) => {
        $(
            if $other.$field.is_some() {
                $self.$field = $other.$field;
            }
        )+
    };
}

impl Config {
    pub fn merge(&mut self, other: Config) {
        merge_fields!(
            self,
            other,
            base_branch,
            index_path,
            enable_filtering,
            jobs,
            magnitude_floor,
            high_detail_threshold,
            medium_detail_threshold,
            doc_term_boost_weight,
            doc_term_match_threshold,
            min_docs_threshold,
            rename_similarity_floor,
            priority_boost,
            term_boost_divisor,
            trivial_patterns,
            critical_patterns,
        );
    }

    /// Fills defaults and validates the result.
    pub fn resolve(self) -> Result<FilterSettings, ConfigError> {
        let d = FilterSettings::default();
        let settings = FilterSettings {
            base_branch: self.base_branch.unwrap_or(d.base_branch),
            index_path: self.index_path.unwrap_or(d.index_path),
            enable_filtering: self.enable_filtering.unwrap_or(d.enable_filtering),
            jobs: self.jobs.unwrap_or(d.jobs),
            magnitude_floor: self.magnitude_floor.unwrap_or(d.magnitude_floor),
            high_detail_threshold: self.high_detail_threshold.unwrap_or(d.high_detail_threshold),
            medium_detail_threshold: self
                .medium_detail_threshold
                .unwrap_or(d.medium_detail_threshold),
            doc_term_boost_weight: self.doc_term_boost_weight.unwrap_or(d.doc_term_boost_weight),
            doc_term_match_threshold: self
                .doc_term_match_threshold
                .unwrap_or(d.doc_term_match_threshold),
            min_docs_threshold: self.min_docs_threshold.unwrap_or(d.min_docs_threshold),
            rename_similarity_floor: self
                .rename_similarity_floor
                .unwrap_or(d.rename_similarity_floor),
            priority_boost: self.priority_boost.unwrap_or(d.priority_boost),
            term_boost_divisor: self.term_boost_divisor.unwrap_or(d.term_boost_divisor),
            trivial_patterns: self.trivial_patterns.unwrap_or(d.trivial_patterns),
            critical_patterns: self.critical_patterns.unwrap_or(d.critical_patterns),
        };
        settings.validate()?;
        Ok(settings)
    }
}

/// Fully resolved filtering options.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterSettings {
    pub base_branch: String,
    pub index_path: String,
    pub enable_filtering: bool,
    /// Worker threads for batch evaluation, 0 picks the CPU count.
    pub jobs: usize,
    pub magnitude_floor: f64,
    pub high_detail_threshold: f64,
    pub medium_detail_threshold: f64,
    /// Upper bound of the boost contributed by doc term matches.
    pub doc_term_boost_weight: f64,
    pub doc_term_match_threshold: usize,
    pub min_docs_threshold: usize,
    pub rename_similarity_floor: f64,
    pub priority_boost: f64,
    pub term_boost_divisor: f64,
    pub trivial_patterns: Vec<PatternGroup>,
    pub critical_patterns: Vec<PatternGroup>,
}

impl Default for FilterSettings {
    fn default() -> Self {
        FilterSettings {
            base_branch: "main".to_string(),
            index_path: DEFAULT_INDEX_PATH.to_string(),
            enable_filtering: true,
            jobs: 0,
            magnitude_floor: 0.2,
            high_detail_threshold: 0.6,
            medium_detail_threshold: 0.3,
            doc_term_boost_weight: 0.2,
            doc_term_match_threshold: 2,
            min_docs_threshold: 3,
            rename_similarity_floor: 0.95,
            priority_boost: 0.3,
            term_boost_divisor: 20.0,
            trivial_patterns: TRIVIAL_PATTERNS.clone(),
            critical_patterns: CRITICAL_PATTERNS.clone(),
        }
    }
}

impl FilterSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        unit_range("magnitude_floor", self.magnitude_floor)?;
        unit_range("rename_similarity_floor", self.rename_similarity_floor)?;
        non_negative("doc_term_boost_weight", self.doc_term_boost_weight)?;
        non_negative("priority_boost", self.priority_boost)?;

        if !(self.term_boost_divisor.is_finite() && self.term_boost_divisor > 0.0) {
            return Err(ConfigError::invalid(
                "term_boost_divisor",
                format!("must be a positive number, got {}", self.term_boost_divisor),
            ));
        }

        self.thresholds()?;
        self.classifier()?;

        Ok(())
    }

    pub fn thresholds(&self) -> Result<DetailThresholds, ConfigError> {
        DetailThresholds::new(self.high_detail_threshold, self.medium_detail_threshold)
    }

    /// Compiles both pattern lists, naming the offending list on failure.
    pub fn classifier(&self) -> Result<FileClassifier, ConfigError> {
        require_patterns("trivial_patterns", &self.trivial_patterns)?;
        require_patterns("critical_patterns", &self.critical_patterns)?;

        FileClassifier::new(&self.trivial_patterns, &[]).map_err(|source| {
            ConfigError::InvalidPattern {
                field: "trivial_patterns",
                source,
            }
        })?;
        FileClassifier::new(&self.trivial_patterns, &self.critical_patterns).map_err(|source| {
            ConfigError::InvalidPattern {
                field: "critical_patterns",
                source,
            }
        })
    }

    /// Index artifact location, relative paths are taken from `root`.
    pub fn index_path_in(&self, root: &Path) -> PathBuf {
        let path = Path::new(&self.index_path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            root.join(path)
        }
    }
}

fn unit_range(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            field,
            format!("must be within [0, 1], got {}", value),
        ))
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            field,
            format!("must not be negative, got {}", value),
        ))
    }
}

fn require_patterns(field: &'static str, groups: &[PatternGroup]) -> Result<(), ConfigError> {
    if groups.iter().all(|g| g.patterns.is_empty()) {
        return Err(ConfigError::MissingPatterns { field });
    }
    Ok(())
}

pub fn global_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".docsieve").join("config.toml"))
}

/// Loads `~/.docsieve/config.toml`, then `.docsieve.toml` from the repo root
/// containing `start` (or `start` itself outside a repo). Later layers win.
pub fn load_config(start: &Path) -> Result<Config, ConfigError> {
    let mut config = Config::default();

    if let Some(global_path) = global_config_path() {
        if let Some(global) = read_layer(&global_path)? {
            config.merge(global);
        }
    }

    let base = git::repo_root(start).unwrap_or_else(|_| start.to_path_buf());
    if let Some(repo) = read_layer(&base.join(CONFIG_FILENAME))? {
        config.merge(repo);
    }

    Ok(config)
}

/// Config layers merged with `overrides` (usually CLI flags), resolved and
/// validated.
pub fn load_settings(start: &Path, overrides: Config) -> Result<FilterSettings, ConfigError> {
    let mut config = load_config(start)?;
    config.merge(overrides);
    config.resolve()
}

fn read_layer(path: &Path) -> Result<Option<Config>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let layer = toml::from_str::<Config>(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    debug!(path = %path.display(), "loaded config layer");
    Ok(Some(layer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_parsing() {
        let toml_str = r#"
            magnitude_floor = 0.1
            min_docs_threshold = 5
            enable_filtering = false

            [[trivial_patterns]]
            name = "snapshots"
            patterns = ["*.snap"]
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.magnitude_floor, Some(0.1));
        assert_eq!(config.min_docs_threshold, Some(5));
        assert_eq!(config.enable_filtering, Some(false));
        assert_eq!(config.trivial_patterns.unwrap()[0].name, "snapshots");
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(toml::from_str::<Config>("min_score = 3").is_err());
    }

    #[test]
    fn test_config_merge() {
        let mut c1 = Config {
            magnitude_floor: Some(0.1),
            jobs: Some(2),
            ..Config::default()
        };
        let c2 = Config {
            magnitude_floor: Some(0.4),
            ..Config::default()
        };
        c1.merge(c2);
        assert_eq!(c1.magnitude_floor, Some(0.4));
        assert_eq!(c1.jobs, Some(2));
    }

    #[test]
    fn test_resolve_defaults() {
        let settings = Config::default().resolve().unwrap();
        assert_eq!(settings, FilterSettings::default());
        assert_eq!(settings.high_detail_threshold, 0.6);
        assert_eq!(settings.medium_detail_threshold, 0.3);
    }

    #[test]
    fn test_inverted_thresholds_fail_fast() {
        let err = Config {
            high_detail_threshold: Some(0.3),
            medium_detail_threshold: Some(0.5),
            ..Config::default()
        }
        .resolve()
        .unwrap_err();
        assert!(err.to_string().contains("high_detail_threshold"));
    }

    #[test]
    fn test_negative_weight_rejected() {
        let err = Config {
            priority_boost: Some(-0.1),
            ..Config::default()
        }
        .resolve()
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidField {
                field: "priority_boost",
                ..
            }
        ));
    }

    #[test]
    fn test_zero_divisor_rejected() {
        let result = Config {
            term_boost_divisor: Some(0.0),
            ..Config::default()
        }
        .resolve();
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_patterns_rejected() {
        let err = Config {
            critical_patterns: Some(Vec::new()),
            ..Config::default()
        }
        .resolve()
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingPatterns {
                field: "critical_patterns"
            }
        ));
    }

    #[test]
    fn test_bad_pattern_names_field() {
        let err = Config {
            critical_patterns: Some(vec![PatternGroup::new("broken", &["docs/***"])]),
            ..Config::default()
        }
        .resolve()
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidPattern {
                field: "critical_patterns",
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_toml_layer_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        fs::write(&path, "magnitude_floor = \"high\"").unwrap();
        assert!(matches!(
            read_layer(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_repo_layer_outside_git() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME), "min_docs_threshold = 7\n").unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config.min_docs_threshold, Some(7));
    }

    #[test]
    fn test_index_path_in() {
        let settings = FilterSettings::default();
        assert_eq!(
            settings.index_path_in(Path::new("/repo")),
            PathBuf::from("/repo/.docsieve/doc-terms.json")
        );
    }
}
