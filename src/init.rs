use crate::cli::InitArgs;
use docsieve::config::{global_config_path, CONFIG_FILENAME};
use std::fs;
use std::path::PathBuf;

const DEFAULT_CONFIG: &str = r#"# docsieve configuration
#
# Global settings live in ~/.docsieve/config.toml, repository settings in
# .docsieve.toml at the repository root. Repository values win.

base_branch = "main"
index_path = ".docsieve/doc-terms.json"

# Set to false to send every changed file on without pre-filtering.
enable_filtering = true

# Parallel jobs for scoring, 0 uses every CPU.
jobs = 0

# Changes scoring below this magnitude (0-1) are skipped unless HIGH priority.
magnitude_floor = 0.2

# A rename at or above this similarity is skipped as a pure move.
rename_similarity_floor = 0.95

# Combined relevance needed for FULL and REDUCED detail.
high_detail_threshold = 0.6
medium_detail_threshold = 0.3

priority_boost = 0.3
doc_term_boost_weight = 0.2
term_boost_divisor = 20.0

# Shared terms a doc needs to count as related, and the minimum number of
# docs always considered.
doc_term_match_threshold = 2
min_docs_threshold = 3

# Pattern groups replace the built-in lists entirely when given.
#
# [[trivial_patterns]]
# name = "snapshots"
# patterns = ["*.snap", "__snapshots__/*"]
#
# [[critical_patterns]]
# name = "public_api"
# patterns = ["src/api/*"]
"#;

pub fn run(args: InitArgs) -> Result<(), Box<dyn std::error::Error>> {
    let path = if args.global {
        global_config_path().ok_or("Could not determine home directory")?
    } else {
        PathBuf::from(CONFIG_FILENAME)
    };

    if path.exists() && !args.force {
        return Err(format!(
            "{} already exists. Use --force to overwrite.",
            path.display()
        )
        .into());
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, DEFAULT_CONFIG)?;

    let location = if args.global { "global" } else { "local" };
    println!("Created {} config at {}", location, path.display());

    Ok(())
}
