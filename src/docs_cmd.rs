use crate::cli::DocsArgs;
use colored::*;
use docsieve::git::diff_text;
use docsieve::output::{self, DocsOutput, OutputFormat};
use docsieve::pipeline::normalize_diff;
use docsieve::terms::{extract_terms, InclusionReason};
use docsieve::{
    changed_files, load_index, load_settings, repo_root, Category, Config, RelevanceQuery,
};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

pub fn run(args: DocsArgs) -> Result<(), Box<dyn std::error::Error>> {
    let path = PathBuf::from(args.path.clone().unwrap_or_else(|| ".".to_string()));
    let root = repo_root(&path)?;

    let format = if let Some(ref fmt) = args.format {
        fmt.parse::<OutputFormat>()?
    } else {
        OutputFormat::Text
    };

    let overrides = Config {
        base_branch: args.base.clone(),
        index_path: args.index.clone(),
        min_docs_threshold: args.min_docs,
        ..Config::default()
    };
    let settings = load_settings(&root, overrides)?;
    let base = settings.base_branch.as_str();

    let loaded = load_index(&root, &settings.index_path_in(&root))?;

    let mut change_terms = BTreeSet::new();
    for changed in changed_files(&root, base)? {
        change_terms.extend(extract_terms(&changed.path));
        match diff_text(&root, base, &changed) {
            Ok(diff) => change_terms.extend(extract_terms(&normalize_diff(&diff))),
            Err(e) => warn!(path = %changed.path, error = %e, "diff unavailable, using path terms only"),
        }
    }

    // docs the classifier rates HIGH are always candidates
    let classifier = settings.classifier()?;
    let mut high_priority: BTreeSet<String> = args.high.iter().cloned().collect();
    high_priority.extend(
        loaded
            .index
            .doc_paths()
            .filter(|doc| classifier.classify(doc).category == Category::High)
            .map(String::from),
    );

    let scope_relevant = match args.scope {
        Some(ref file) => load_scope(Path::new(file))?,
        None => BTreeSet::new(),
    };

    let query = RelevanceQuery {
        min_match_threshold: settings.doc_term_match_threshold,
        min_docs_threshold: settings.min_docs_threshold,
        high_priority,
        scope_relevant,
    };
    let docs = loaded.index.relevant_docs(&change_terms, &query);

    match format {
        OutputFormat::Text => {
            if args.no_color {
                colored::control::set_override(false);
            }
            for doc in &docs {
                let reason = format!("{:<14}", doc.reason.as_str());
                let reason = match doc.reason {
                    InclusionReason::TermMatch => reason.green().to_string(),
                    InclusionReason::HighPriority => reason.yellow().to_string(),
                    InclusionReason::ScopeRelevant => reason.cyan().to_string(),
                    InclusionReason::SafetyNet => reason.dimmed().to_string(),
                };
                println!("{} {:>3}  {}", reason, doc.match_count, doc.path);
            }
            println!();
            println!(
                "{} of {} docs relevant to {} change terms",
                docs.len(),
                loaded.index.doc_count(),
                change_terms.len()
            );
        }
        OutputFormat::Json | OutputFormat::Xml => {
            let data = DocsOutput {
                project: root
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| root.display().to_string()),
                change_terms: change_terms.len(),
                docs,
            };
            if format == OutputFormat::Json {
                output::json::output_docs(&data)?;
            } else {
                output::xml::output_docs(&data)?;
            }
        }
    }

    Ok(())
}

/// Reads a JSON array of repo-relative doc paths.
fn load_scope(path: &Path) -> Result<BTreeSet<String>, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("failed to read scope file {}: {}", path.display(), e))?;
    let scope: BTreeSet<String> = serde_json::from_str(&content)
        .map_err(|e| format!("invalid scope file {}: {}", path.display(), e))?;
    Ok(scope)
}
