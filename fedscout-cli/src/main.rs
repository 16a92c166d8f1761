use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use fedscout::{
    CliOverrides, EngineConfig, LocalFilesPerformer, RankedEntry, RelevanceRanker, ResultRecord,
    SearchManager, SearchPerformer, SearchRequest, SessionCollector, SharedResult,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use std::{fs, io};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Upper bound on waiting for a session when no performer deadline is set
const DEFAULT_WAIT: Duration = Duration::from_secs(300);

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a YAML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser)]
struct SearchArgs {
    /// Query text; may contain +:keyword:<word> and -:keyword:<word> filters
    query: String,

    /// Directory to search (one performer per directory)
    #[arg(short = 'd', long = "dir", required = true)]
    dirs: Vec<PathBuf>,

    /// Emit subdirectories as crawlable results and expand them
    #[arg(long)]
    crawl_dirs: bool,

    /// Show at most this many results
    #[arg(short = 'n', long)]
    limit: Option<usize>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Per-performer deadline, e.g. 10s or 1m
    #[arg(short = 't', long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Number of threads running performers
    #[arg(short = 'j', long)]
    threads: Option<NonZeroUsize>,

    /// Ignore English/Spanish/German stopwords when ranking
    #[arg(long)]
    remove_stopwords: bool,

    /// Log level (trace, debug, info, warn, error); defaults to the config's
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Parser)]
struct RankArgs {
    /// Query to rank against
    query: String,

    /// File with one display name per line
    #[arg(short = 'i', long = "input")]
    input: PathBuf,

    /// Show at most this many results
    #[arg(short = 'n', long)]
    limit: Option<usize>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Search file names under one or more directories
    Search(SearchArgs),
    /// Rank the lines of a file by relevance to a query
    Rank(RankArgs),
}

fn main() -> Result<()> {
    run()
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let file_config = EngineConfig::load_from(cli.config.as_deref())?;

    match cli.command {
        Commands::Search(args) => {
            let overrides = CliOverrides {
                perform_threads: args.threads,
                performer_timeout: args
                    .timeout
                    .map(|t| humantime::format_duration(t).to_string()),
                remove_stopwords: args.remove_stopwords,
                log_level: args.log_level.clone(),
                ..CliOverrides::default()
            };
            let config = file_config.merge_with_cli(overrides);
            config.validate()?;
            init_logging(&config.log_level);
            search(&args, &config)
        }
        Commands::Rank(args) => {
            init_logging(&file_config.log_level);
            rank(&args, &file_config)
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // A subscriber may already be installed when embedded; keep that one.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn ranker_for(config: &EngineConfig) -> RelevanceRanker {
    RelevanceRanker::new()
        .with_stopwords_removed(config.remove_stopwords)
        .with_parallel_threshold(config.parallel_rank_threshold)
}

fn search(args: &SearchArgs, config: &EngineConfig) -> Result<()> {
    for dir in &args.dirs {
        if !dir.is_dir() {
            bail!("{} is not a directory", dir.display());
        }
    }

    let request = SearchRequest::parse(&args.query)?;
    let query = request.query().to_string();
    info!(
        "Searching {} directories for '{}'",
        args.dirs.len(),
        query
    );

    let manager = SearchManager::new(config)?;
    let collector = Arc::new(SessionCollector::new());
    manager.set_listener(collector.clone());

    let performers: Vec<Arc<dyn SearchPerformer>> = args
        .dirs
        .iter()
        .map(|dir| {
            Arc::new(LocalFilesPerformer::new(dir, &query).with_directory_crawl(args.crawl_dirs))
                as Arc<dyn SearchPerformer>
        })
        .collect();
    let source_count = performers.len();

    let spinner = spinner(args.json);
    let token = manager.search(request, performers)?;
    let wait = config
        .performer_deadline()?
        .map_or(DEFAULT_WAIT, |deadline| deadline * 2 + Duration::from_secs(1));
    let session = collector
        .wait(token, wait)
        .context("search did not finish")?;
    spinner.finish_and_clear();

    for error in &session.errors {
        eprintln!("{} {}", "warning:".yellow().bold(), error);
    }

    // Batches arrive ranked individually; rank the whole session for display.
    let results: Vec<SharedResult> = session.results().cloned().collect();
    let mut entries = ranker_for(config).rank_entries(results, &query);
    let total = entries.len();
    if let Some(limit) = args.limit {
        entries.truncate(limit);
    }

    if args.json {
        print_json(&entries)?;
    } else {
        print_entries(&entries, true);
        println!("\nFound {} results from {} sources", total, source_count);
    }

    manager.metrics().log_stats();
    Ok(())
}

fn spinner(hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message("searching");
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

fn rank(args: &RankArgs, config: &EngineConfig) -> Result<()> {
    let results = read_lines(&args.input)?;
    debug!("Ranking {} lines against '{}'", results.len(), args.query);
    let mut entries = ranker_for(config).rank_entries(results, &args.query);
    if let Some(limit) = args.limit {
        entries.truncate(limit);
    }

    if args.json {
        print_json(&entries)
    } else {
        print_entries(&entries, false);
        Ok(())
    }
}

fn read_lines(path: &Path) -> Result<Vec<SharedResult>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    let source = path
        .file_name()
        .map_or_else(|| "input".to_string(), |n| n.to_string_lossy().into_owned());
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| ResultRecord::new(line, source.clone()).into_shared())
        .collect())
}

fn print_entries(entries: &[RankedEntry], show_location: bool) {
    for entry in entries {
        let scores = format!(
            "[{} tokens, distance {}]",
            entry.matched_token_count, entry.edit_distance
        );
        println!("{} {}", scores.green(), entry.result.display_name().bold());
        if show_location && !entry.result.details_url().is_empty() {
            println!("    {}", entry.result.details_url().blue());
        }
    }
}

fn print_json(entries: &[RankedEntry]) -> Result<()> {
    let values: Vec<serde_json::Value> = entries
        .iter()
        .map(|entry| {
            let result = &entry.result;
            serde_json::json!({
                "name": result.display_name(),
                "source": result.source(),
                "url": result.details_url(),
                "size": result.as_file().map(|f| f.size()),
                "parent": result.parent().map(|p| p.display_name()),
                "matched_tokens": entry.matched_token_count,
                "distance": entry.edit_distance,
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&values)?);
    Ok(())
}
