use crate::cli::FilterArgs;
use colored::*;
use docsieve::output::{self, DecisionOutput, FilterOutput, OutputFormat};
use docsieve::tokens::payload_tokens;
use docsieve::{
    changed_files, collect_change, format_changes, load_index, load_settings, repo_root, Category,
    Config, FileChange, FileReport, FilterPipeline,
};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

pub fn run(args: FilterArgs) -> Result<(), Box<dyn std::error::Error>> {
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
        jobs: args.jobs,
        magnitude_floor: args.magnitude_floor,
        enable_filtering: args.no_filter.then_some(false),
        ..Config::default()
    };
    let settings = load_settings(&root, overrides)?;

    let loaded = load_index(&root, &settings.index_path_in(&root))?;
    info!(docs = loaded.doc_count, source = ?loaded.source, "term index ready");
    let pipeline = FilterPipeline::for_code(&settings, Arc::new(loaded.index))?;

    let scope = match args.scope {
        Some(ref file) => load_scope(Path::new(file))?,
        None => HashMap::new(),
    };

    let base = settings.base_branch.as_str();
    let changes: Vec<FileChange> = changed_files(&root, base)?
        .iter()
        .map(|changed| {
            let change = collect_change(&root, base, changed);
            let relevance = scope.get(&change.path).copied().unwrap_or(0.0);
            change.with_scope(relevance)
        })
        .collect();

    info!(files = changes.len(), base, "evaluating changes");
    let reports = pipeline.evaluate_all(&changes);

    match format {
        OutputFormat::Text => {
            if args.no_color {
                colored::control::set_override(false);
            }
            print_text(&reports, &args);
        }
        OutputFormat::Json | OutputFormat::Xml => {
            let project = root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| root.display().to_string());
            let files = reports
                .iter()
                .map(|r| DecisionOutput::from_report(r, args.payload, args.tokens))
                .collect();
            let data = FilterOutput::new(project, base.to_string(), files);

            if format == OutputFormat::Json {
                output::json::output_filter(&data)?;
            } else {
                output::xml::output_filter(&data)?;
            }
        }
    }

    Ok(())
}

/// Reads a JSON object mapping repo-relative paths to scope relevance.
fn load_scope(path: &Path) -> Result<HashMap<String, f64>, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("failed to read scope file {}: {}", path.display(), e))?;
    let scope: HashMap<String, f64> = serde_json::from_str(&content)
        .map_err(|e| format!("invalid scope file {}: {}", path.display(), e))?;
    Ok(scope)
}

fn print_text(reports: &[FileReport], args: &FilterArgs) {
    let mut total_tokens = 0;

    for report in reports {
        let decision = &report.decision;
        let mark = if decision.process {
            "PROCESS".green().bold()
        } else {
            "SKIP   ".dimmed()
        };

        let mut line = format!("{} {}", mark, decision.path);

        if let (Some(relevance), Some(detail)) = (&report.relevance, report.detail) {
            let category = report.classification.category.to_string();
            let category = if report.classification.category == Category::High {
                category.yellow().to_string()
            } else {
                category
            };
            line.push_str(&format!(" [{} {} {:.2}]", category, detail, relevance.combined));
        }

        if args.tokens {
            if let Some(payload) = &report.payload {
                let tokens = payload_tokens(payload);
                total_tokens += tokens;
                line.push_str(&format!(" {}", format!("~{} tokens", tokens).dimmed()));
            }
        }

        println!("{}  {}", line, decision.reason.to_string().dimmed());
    }

    let processed = reports.iter().filter(|r| r.decision.process).count();
    println!();
    println!(
        "{} processed, {} skipped",
        processed.to_string().bold(),
        reports.len() - processed
    );
    if args.tokens {
        println!("{} payload tokens", total_tokens);
    }

    if args.payload && processed > 0 {
        println!();
        println!("{}", format_changes(reports));
    }
}
