pub mod json;
pub mod xml;

use crate::classifier::Category;
use crate::detail::DetailLevel;
use crate::pipeline::FileReport;
use crate::terms::RelevantDoc;
use crate::tokens::payload_tokens;
use serde::Serialize;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Xml,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "xml" => Ok(OutputFormat::Xml),
            _ => Err(format!("Invalid format: {}. Use text, json, or xml", s)),
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct DecisionOutput {
    pub path: String,
    pub process: bool,
    pub reason: String,
    pub category: Category,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub magnitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<DetailLevel>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub related_docs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

impl DecisionOutput {
    /// Flattens a report. The payload is only kept when `with_payload` is set,
    /// token counts only when `with_tokens` is set.
    pub fn from_report(report: &FileReport, with_payload: bool, with_tokens: bool) -> Self {
        let payload = report.payload.as_deref().filter(|_| with_payload);
        DecisionOutput {
            path: report.decision.path.clone(),
            process: report.decision.process,
            reason: report.decision.reason.to_string(),
            category: report.classification.category,
            magnitude: report.magnitude.as_ref().map(|m| m.score),
            relevance: report.relevance.as_ref().map(|r| r.combined),
            detail: report.detail,
            related_docs: report.related_docs.clone(),
            tokens: report
                .payload
                .as_deref()
                .filter(|_| with_tokens)
                .map(payload_tokens),
            payload: payload.map(String::from),
        }
    }
}

#[derive(Serialize, Debug)]
pub struct FilterOutput {
    pub project: String,
    pub base: String,
    pub processed: usize,
    pub skipped: usize,
    pub files: Vec<DecisionOutput>,
}

impl FilterOutput {
    pub fn new(project: String, base: String, files: Vec<DecisionOutput>) -> Self {
        let processed = files.iter().filter(|f| f.process).count();
        FilterOutput {
            project,
            base,
            processed,
            skipped: files.len() - processed,
            files,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct DocsOutput {
    pub project: String,
    pub change_terms: usize,
    pub docs: Vec<RelevantDoc>,
}
