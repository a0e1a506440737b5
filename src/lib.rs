pub mod classifier;
pub mod config;
pub mod detail;
pub mod docs;
pub mod git;
pub mod ignore;
pub mod magnitude;
pub mod output;
pub mod pipeline;
pub mod relevance;
pub mod terms;
pub mod tokens;

pub use classifier::{Category, FileClassification, FileClassifier};
pub use config::{load_settings, Config, ConfigError, FilterSettings};
pub use detail::{ChangeSummary, DetailLevel, DetailThresholds};
pub use docs::{load_index, IndexSource, LoadedIndex};
pub use git::{changed_files, collect_change, repo_root, GitError};
pub use magnitude::{ChangeMagnitude, DiffError, MagnitudeScorer};
pub use output::OutputFormat;
pub use pipeline::{
    format_changes, ChangeStats, ChangeStrategy, CodeStrategy, DocStrategy, FileChange, FileReport,
    FilterDecision, FilterPipeline,
};
pub use relevance::{RelevanceCombiner, RelevanceScore};
pub use terms::{DocTermIndex, RelevanceQuery, RelevantDoc, SharedTermIndex};
