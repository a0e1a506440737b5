use crate::cli::IndexArgs;
use docsieve::{load_index, load_settings, repo_root, Config, IndexSource};
use std::path::PathBuf;

pub fn run(args: IndexArgs) -> Result<(), Box<dyn std::error::Error>> {
    let path = PathBuf::from(args.path.clone().unwrap_or_else(|| ".".to_string()));
    let root = repo_root(&path)?;

    let overrides = Config {
        index_path: args.out.clone(),
        ..Config::default()
    };
    let settings = load_settings(&root, overrides)?;
    let index_path = settings.index_path_in(&root);

    let loaded = load_index(&root, &index_path)?;

    if loaded.source == IndexSource::Fresh && !args.force {
        println!(
            "Term index at {} is up to date ({} docs, {} terms)",
            index_path.display(),
            loaded.index.doc_count(),
            loaded.index.term_count()
        );
        return Ok(());
    }

    loaded.index.save(&index_path)?;
    println!(
        "Indexed {} docs ({} terms) into {}",
        loaded.index.doc_count(),
        loaded.index.term_count(),
        index_path.display()
    );

    Ok(())
}
