use crate::classifier::{infer_category, Category, ChangeCategory, FileClassification, FileClassifier};
use crate::config::{ConfigError, FilterSettings};
use crate::detail::{format_change, ChangeSummary, DetailLevel, DetailThresholds, PayloadInput};
use crate::magnitude::{ChangeMagnitude, DiffError, DiffStats, MagnitudeScorer, RenameInfo};
use crate::relevance::{RelevanceCombiner, RelevanceScore};
use crate::terms::{extract_terms, DocTermIndex};
use rayon::prelude::*;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

const RELATED_DOCS_LIMIT: usize = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChangeStats {
    pub numstat: DiffStats,
    pub rename: RenameInfo,
}

#[derive(Debug)]
pub struct FileChange {
    pub path: String,
    pub stats: Result<ChangeStats, DiffError>,
    pub diff_text: Option<String>,
    pub scope_relevance: f64,
    pub summary: Option<ChangeSummary>,
}

impl FileChange {
    pub fn new(path: impl Into<String>, stats: Result<ChangeStats, DiffError>) -> Self {
        FileChange {
            path: path.into(),
            stats,
            diff_text: None,
            scope_relevance: 0.0,
            summary: None,
        }
    }

    pub fn with_diff(mut self, diff: impl Into<String>) -> Self {
        self.diff_text = Some(diff.into());
        self
    }

    pub fn with_scope(mut self, scope_relevance: f64) -> Self {
        self.scope_relevance = scope_relevance;
        self
    }

    pub fn with_summary(mut self, summary: ChangeSummary) -> Self {
        self.summary = Some(summary);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    TrivialPath { detail: String },
    PureRename { similarity: Option<f64> },
    LowMagnitude { score: f64, floor: f64 },
    WhitespaceOnly,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::TrivialPath { detail } => write!(f, "trivial path ({})", detail),
            SkipReason::PureRename {
                similarity: Some(similarity),
            } => write!(f, "trivial rename ({:.0}% similar)", similarity * 100.0),
            SkipReason::PureRename { similarity: None } => write!(f, "trivial rename"),
            SkipReason::LowMagnitude { score, floor } => {
                write!(f, "low magnitude ({:.2} below floor {:.2})", score, floor)
            }
            SkipReason::WhitespaceOnly => write!(f, "whitespace-only change"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProcessReason {
    FilteringDisabled,
    Documentation,
    Passed { category: Category, magnitude: f64 },
}

impl fmt::Display for ProcessReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessReason::FilteringDisabled => write!(f, "filtering disabled"),
            ProcessReason::Documentation => write!(f, "documentation is never pre-filtered"),
            ProcessReason::Passed {
                category: Category::High,
                ..
            } => write!(f, "high priority file"),
            ProcessReason::Passed { magnitude, .. } => {
                write!(f, "passed filters (magnitude {:.2})", magnitude)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DecisionReason {
    Skip(SkipReason),
    Process(ProcessReason),
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionReason::Skip(reason) => reason.fmt(f),
            DecisionReason::Process(reason) => reason.fmt(f),
        }
    }
}

impl Serialize for DecisionReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterDecision {
    pub path: String,
    pub process: bool,
    pub reason: DecisionReason,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub decision: FilterDecision,
    pub classification: FileClassification,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_category: Option<ChangeCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub magnitude: Option<ChangeMagnitude>,
    pub term_match_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub related_docs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance: Option<RelevanceScore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<DetailLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

impl FileReport {
    fn skip(mut self, reason: SkipReason) -> Self {
        debug!(path = %self.decision.path, reason = %reason, "skipping change");
        self.decision.process = false;
        self.decision.reason = DecisionReason::Skip(reason);
        self
    }
}

pub trait ChangeStrategy: Send + Sync {
    fn classify(&self, classifier: &FileClassifier, path: &str) -> FileClassification;

    fn magnitude(&self, scorer: &MagnitudeScorer, change: &FileChange) -> ChangeMagnitude {
        match &change.stats {
            Ok(stats) => scorer.score(stats.numstat, stats.rename),
            Err(e) => {
                warn!(path = %change.path, error = %e, "diff stats unavailable, using conservative magnitude");
                ChangeMagnitude::conservative()
            }
        }
    }

    fn format(&self, input: &PayloadInput<'_>) -> String {
        format_change(input)
    }

    fn prefilter(&self) -> bool {
        true
    }

    fn detail_level(&self, thresholds: &DetailThresholds, relevance: &RelevanceScore) -> DetailLevel {
        thresholds.select(relevance.combined)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CodeStrategy;

impl ChangeStrategy for CodeStrategy {
    fn classify(&self, classifier: &FileClassifier, path: &str) -> FileClassification {
        classifier.classify(path)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DocStrategy;

impl ChangeStrategy for DocStrategy {
    fn classify(&self, _classifier: &FileClassifier, path: &str) -> FileClassification {
        FileClassification {
            path: path.to_string(),
            category: Category::Normal,
            reason: "Documentation file".to_string(),
            matched_pattern: None,
        }
    }

    fn prefilter(&self) -> bool {
        false
    }

    fn detail_level(&self, _thresholds: &DetailThresholds, _relevance: &RelevanceScore) -> DetailLevel {
        DetailLevel::Full
    }
}

pub struct FilterPipeline<S: ChangeStrategy = CodeStrategy> {
    settings: FilterSettings,
    classifier: FileClassifier,
    scorer: MagnitudeScorer,
    combiner: RelevanceCombiner,
    thresholds: DetailThresholds,
    index: Arc<DocTermIndex>,
    strategy: S,
}

impl FilterPipeline<CodeStrategy> {
    pub fn for_code(settings: &FilterSettings, index: Arc<DocTermIndex>) -> Result<Self, ConfigError> {
        FilterPipeline::new(settings, index, CodeStrategy)
    }
}

impl<S: ChangeStrategy> FilterPipeline<S> {
    pub fn new(settings: &FilterSettings, index: Arc<DocTermIndex>, strategy: S) -> Result<Self, ConfigError> {
        settings.validate()?;

        Ok(FilterPipeline {
            classifier: settings.classifier()?,
            scorer: MagnitudeScorer::new(settings.rename_similarity_floor),
            combiner: RelevanceCombiner {
                priority_boost: settings.priority_boost,
                term_boost_divisor: settings.term_boost_divisor,
                term_boost_cap: settings.doc_term_boost_weight,
            },
            thresholds: settings.thresholds()?,
            settings: settings.clone(),
            index,
            strategy,
        })
    }

    pub fn settings(&self) -> &FilterSettings {
        &self.settings
    }

    pub fn should_process(&self, change: &FileChange) -> FilterDecision {
        self.run(change, false).decision
    }

    pub fn evaluate(&self, change: &FileChange) -> FileReport {
        self.run(change, true)
    }

    pub fn evaluate_all(&self, changes: &[FileChange]) -> Vec<FileReport> {
        let jobs = if self.settings.jobs == 0 {
            num_cpus::get()
        } else {
            self.settings.jobs
        };

        match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
            Ok(pool) => pool.install(|| changes.par_iter().map(|c| self.evaluate(c)).collect()),
            Err(e) => {
                warn!(error = %e, "thread pool unavailable, evaluating sequentially");
                changes.iter().map(|c| self.evaluate(c)).collect()
            }
        }
    }

    fn run(&self, change: &FileChange, with_payload: bool) -> FileReport {
        let filtering = self.settings.enable_filtering && self.strategy.prefilter();
        let classification = self.strategy.classify(&self.classifier, &change.path);
        let category = classification.category;

        let mut report = FileReport {
            decision: FilterDecision {
                path: change.path.clone(),
                process: true,
                reason: DecisionReason::Process(ProcessReason::FilteringDisabled),
            },
            change_category: infer_category(&change.path),
            classification,
            magnitude: None,
            term_match_count: 0,
            related_docs: Vec::new(),
            relevance: None,
            detail: None,
            payload: None,
        };

        if filtering && category == Category::Skip {
            let detail = report.classification.reason.clone();
            return report.skip(SkipReason::TrivialPath { detail });
        }

        let magnitude = self.strategy.magnitude(&self.scorer, change);
        let score = magnitude.score;
        let similarity = magnitude.similarity;
        let trivial_rename = magnitude.trivial_rename;
        report.magnitude = Some(magnitude);

        if filtering {
            if trivial_rename {
                return report.skip(SkipReason::PureRename { similarity });
            }
            if score < self.settings.magnitude_floor && category != Category::High {
                return report.skip(SkipReason::LowMagnitude {
                    score,
                    floor: self.settings.magnitude_floor,
                });
            }
        }

        let normalized = change.diff_text.as_deref().map(normalize_diff);
        let mut terms = extract_terms(&change.path);
        if let Some(diff) = &normalized {
            terms.extend(extract_terms(diff));
        }
        report.term_match_count = self.index.term_match_count(&terms);
        report.related_docs = self
            .index
            .match_counts(&terms)
            .into_iter()
            .filter(|(_, count)| *count >= self.settings.doc_term_match_threshold)
            .take(RELATED_DOCS_LIMIT)
            .map(|(doc, _)| doc)
            .collect();

        let textual = change.diff_text.as_deref().is_some_and(has_text_hunks);
        if filtering && textual && normalized.as_deref().is_some_and(|d| d.trim().is_empty()) {
            return report.skip(SkipReason::WhitespaceOnly);
        }

        let relevance = self
            .combiner
            .combine(change.scope_relevance, category, report.term_match_count);
        let level = self.strategy.detail_level(&self.thresholds, &relevance);

        report.decision.reason = DecisionReason::Process(if !self.settings.enable_filtering {
            ProcessReason::FilteringDisabled
        } else if !self.strategy.prefilter() {
            ProcessReason::Documentation
        } else {
            ProcessReason::Passed {
                category,
                magnitude: score,
            }
        });

        if with_payload {
            let derived;
            let summary = match &change.summary {
                Some(summary) => summary,
                None => {
                    derived = ChangeSummary::from_diff(&change.path, normalized.as_deref().unwrap_or(""));
                    &derived
                }
            };

            if let Some(magnitude) = &report.magnitude {
                report.payload = Some(self.strategy.format(&PayloadInput {
                    path: &change.path,
                    category,
                    magnitude,
                    relevance: &relevance,
                    level,
                    change_category: report.change_category.as_ref().map(ChangeCategory::as_str),
                    related_docs: &report.related_docs,
                    summary,
                }));
            }
        }

        report.relevance = Some(relevance);
        report.detail = Some(level);
        report
    }
}

/// HIGH priority first, then by magnitude (largest first), then by path.
pub fn format_changes(reports: &[FileReport]) -> String {
    let mut processed: Vec<&FileReport> = reports
        .iter()
        .filter(|r| r.decision.process && r.payload.is_some())
        .collect();

    processed.sort_by(|a, b| {
        let is_high = |r: &FileReport| r.classification.category == Category::High;
        let magnitude = |r: &FileReport| r.magnitude.as_ref().map_or(0.0, |m| m.score);
        is_high(b)
            .cmp(&is_high(a))
            .then_with(|| magnitude(b).total_cmp(&magnitude(a)))
            .then_with(|| a.decision.path.cmp(&b.decision.path))
    });

    processed
        .iter()
        .filter_map(|r| r.payload.as_deref())
        .collect::<Vec<_>>()
        .join("\n")
}

enum Section {
    Loose,
    Preamble,
    Hunk,
}

/// Drops headers and blank lines, and cancels removed/added runs that only differ in whitespace, in order.
pub fn normalize_diff(diff: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    let mut header: Option<&str> = None;
    let mut kept: Vec<&str> = Vec::new();
    let mut block: Vec<&str> = Vec::new();
    let mut section = Section::Loose;

    for line in diff.lines() {
        if line.starts_with("diff --git") || line.starts_with("@@") {
            settle_block(&mut block, &mut kept);
            flush_hunk(header.take(), &mut kept, &mut out);
            if line.starts_with("@@") {
                header = Some(line);
                section = Section::Hunk;
            } else {
                section = Section::Preamble;
            }
            continue;
        }

        match section {
            Section::Preamble => {}
            Section::Loose if line.starts_with("+++") || line.starts_with("---") => {}
            Section::Loose | Section::Hunk => {
                if line.starts_with('+') || line.starts_with('-') {
                    // a removal after additions starts a new run
                    if line.starts_with('-') && block.last().is_some_and(|l| l.starts_with('+')) {
                        settle_block(&mut block, &mut kept);
                    }
                    block.push(line);
                } else {
                    settle_block(&mut block, &mut kept);
                }
            }
        }
    }
    settle_block(&mut block, &mut kept);
    flush_hunk(header.take(), &mut kept, &mut out);

    out.join("\n")
}

pub fn has_text_hunks(diff: &str) -> bool {
    diff.lines().any(|line| line.starts_with("@@"))
        || diff.lines().any(|line| {
            (line.starts_with('+') && !line.starts_with("+++"))
                || (line.starts_with('-') && !line.starts_with("---"))
        })
}

fn squash(line: &str) -> String {
    line[1..].chars().filter(|c| !c.is_whitespace()).collect()
}

fn settle_block<'a>(block: &mut Vec<&'a str>, kept: &mut Vec<&'a str>) {
    let lines: Vec<&str> = block.drain(..).filter(|line| !squash(line).is_empty()).collect();
    let (removed, added): (Vec<&str>, Vec<&str>) = lines.iter().partition(|line| line.starts_with('-'));

    let joined = |side: &[&str]| side.iter().map(|line| squash(line)).collect::<String>();
    if !removed.is_empty() && !added.is_empty() && joined(&removed[..]) == joined(&added[..]) {
        return;
    }

    if removed.len() == added.len() {
        let differs: Vec<bool> = removed
            .iter()
            .zip(&added)
            .map(|(old, new)| squash(old) != squash(new))
            .collect();
        kept.extend(removed.iter().zip(&differs).filter(|(_, d)| **d).map(|(l, _)| *l));
        kept.extend(added.iter().zip(&differs).filter(|(_, d)| **d).map(|(l, _)| *l));
    } else {
        kept.extend(lines);
    }
}

fn flush_hunk<'a>(header: Option<&'a str>, kept: &mut Vec<&'a str>, out: &mut Vec<&'a str>) {
    if kept.is_empty() {
        return;
    }
    if let Some(header) = header {
        out.push(header);
    }
    out.append(kept);
}
