use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "docsieve")]
#[command(
    about = "Pre-filters code changes and scores how much they matter to the docs",
    long_about = None
)]
pub struct Cli {
    #[arg(
        short,
        long,
        action = ArgAction::Count,
        global = true,
        help = "Increase log verbosity (-v info, -vv debug)"
    )]
    pub verbose: u8,

    #[arg(short, long, global = true, help = "Only log errors")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Decide which changed files are worth describing")]
    Filter(FilterArgs),

    #[command(about = "Build the documentation term index")]
    Index(IndexArgs),

    #[command(about = "List docs related to the current change set")]
    Docs(DocsArgs),

    #[command(about = "Write a default .docsieve.toml")]
    Init(InitArgs),
}

#[derive(Parser)]
pub struct FilterArgs {
    #[arg(short, long, help = "Repository path (default: current directory)")]
    pub path: Option<String>,

    #[arg(short, long, help = "Base branch or commit to diff against")]
    pub base: Option<String>,

    #[arg(long, help = "Output format: text, json, xml (default: text)")]
    pub format: Option<String>,

    #[arg(long, help = "Term index file (default: from config)")]
    pub index: Option<String>,

    #[arg(long, help = "JSON file mapping paths to scope relevance (0-1)")]
    pub scope: Option<String>,

    #[arg(long, help = "Include the formatted payload of processed files")]
    pub payload: bool,

    #[arg(short, long, help = "Show payload token counts")]
    pub tokens: bool,

    #[arg(short = 'j', long, help = "Number of parallel jobs (0 = auto)")]
    pub jobs: Option<usize>,

    #[arg(long, help = "Override the magnitude floor (0-1)")]
    pub magnitude_floor: Option<f64>,

    #[arg(long, help = "Process every file without pre-filtering")]
    pub no_filter: bool,

    #[arg(long, help = "Disable colors")]
    pub no_color: bool,
}

#[derive(Parser)]
pub struct IndexArgs {
    #[arg(short, long, help = "Repository path (default: current directory)")]
    pub path: Option<String>,

    #[arg(short, long, help = "Where to write the index (default: from config)")]
    pub out: Option<String>,

    #[arg(short, long, help = "Rebuild even if the saved index is fresh")]
    pub force: bool,
}

#[derive(Parser)]
pub struct DocsArgs {
    #[arg(short, long, help = "Repository path (default: current directory)")]
    pub path: Option<String>,

    #[arg(long, help = "Term index file (default: from config)")]
    pub index: Option<String>,

    #[arg(short, long, help = "Base branch or commit to diff against")]
    pub base: Option<String>,

    #[arg(long = "high", value_name = "FILE", help = "Doc that is always relevant (repeatable)")]
    pub high: Vec<String>,

    #[arg(long, help = "JSON file listing docs in scope of the change")]
    pub scope: Option<String>,

    #[arg(long, help = "Minimum number of docs to return")]
    pub min_docs: Option<usize>,

    #[arg(long, help = "Output format: text, json, xml (default: text)")]
    pub format: Option<String>,

    #[arg(long, help = "Disable colors")]
    pub no_color: bool,
}

#[derive(Parser)]
pub struct InitArgs {
    #[arg(short, long, help = "Write ~/.docsieve/config.toml instead")]
    pub global: bool,

    #[arg(short, long, help = "Overwrite an existing file")]
    pub force: bool,
}
