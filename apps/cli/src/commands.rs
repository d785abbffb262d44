//! CLI command definitions, routing, and tracing setup.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use linkshelf_core::pipeline::{
    AddContext, AddOutcome, AddPhase, AddRequest, AddStatus, AddWarning, PipelineConfig,
    ProgressReporter, add_bookmark,
};
use linkshelf_shared::{AppConfig, FetchConfig, init_config, load_config};
use linkshelf_storage::Storage;
use linkshelf_web::{HttpClient, ReadabilityExtractor};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// linkshelf: a local bookmark shelf.
#[derive(Parser)]
#[command(
    name = "linkshelf",
    version,
    about = "Save web pages as local bookmarks with extracted text and thumbnails.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Save a URL as a new bookmark.
    Add {
        /// URL of the page to save.
        url: String,

        /// Title to use instead of the extracted one.
        #[arg(short = 'i', long)]
        title: Option<String>,

        /// Excerpt to use instead of the extracted one.
        #[arg(short, long)]
        excerpt: Option<String>,

        /// Comma-separated tags.
        #[arg(short, long, value_delimiter = ',')]
        tags: Vec<String>,

        /// Do not fetch the page or its thumbnail.
        #[arg(short, long)]
        offline: bool,

        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List saved bookmarks.
    Print {
        /// Full-text search query.
        #[arg(short, long)]
        search: Option<String>,

        /// Maximum number of bookmarks to show.
        #[arg(short = 'n', long, default_value = "20")]
        limit: u32,

        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "linkshelf=info",
        1 => "linkshelf=debug",
        _ => "linkshelf=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Add {
            url,
            title,
            excerpt,
            tags,
            offline,
            json,
        } => {
            let request = AddRequest {
                url,
                title,
                excerpt,
                tags,
                offline,
            };
            cmd_add(&request, json).await
        }
        Command::Print {
            search,
            limit,
            json,
        } => cmd_print(search.as_deref(), limit, json).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// add
// ---------------------------------------------------------------------------

async fn cmd_add(request: &AddRequest, json: bool) -> Result<()> {
    let config = load_config()?;
    let ctx = build_context(&config).await?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling network requests");
            on_interrupt.cancel();
        }
    });

    info!(url = %request.url, offline = request.offline, "adding bookmark");

    let reporter = CliProgress::new(!json);
    let result = add_bookmark(&ctx, request, &reporter, &cancel).await;
    reporter.spinner.finish_and_clear();
    let outcome = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }

    Ok(())
}

/// Wire the real storage and HTTP collaborators from config.
async fn build_context(config: &AppConfig) -> Result<AddContext> {
    let storage = Arc::new(Storage::open(&config.database_path()?).await?);
    let http = Arc::new(HttpClient::new(FetchConfig::from(config))?);

    Ok(AddContext {
        allocator: storage.clone(),
        store: storage,
        fetcher: http.clone(),
        extractor: Arc::new(ReadabilityExtractor),
        thumbnails: http,
        config: PipelineConfig::from_app_config(config)?,
    })
}

fn print_outcome(outcome: &AddOutcome) {
    let b = &outcome.bookmark;

    println!();
    match outcome.status {
        AddStatus::Success => println!("  Bookmark saved!"),
        AddStatus::PartialSuccess => println!("  Bookmark saved, thumbnail download failed."),
    }
    println!("  ID:        {}", b.id);
    println!("  URL:       {}", b.url);
    println!("  Title:     {}", b.title);
    if !b.excerpt.is_empty() {
        println!("  Excerpt:   {}", b.excerpt);
    }
    if !b.tags.is_empty() {
        let names: Vec<&str> = b.tags.iter().map(|t| t.name.as_str()).collect();
        println!("  Tags:      {}", names.join(", "));
    }
    if let Some(path) = &outcome.thumbnail {
        println!("  Thumbnail: {}", path.display());
    }
    println!("  Time:      {:.1}s", outcome.elapsed.as_secs_f64());

    for warning in &outcome.warnings {
        println!("  ! {}: {}", warning.stage, warning.message);
    }
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new(visible: bool) -> Self {
        if !visible {
            return Self {
                spinner: ProgressBar::hidden(),
            };
        }

        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, phase: AddPhase) {
        self.spinner.set_message(phase.to_string());
    }

    fn warning(&self, warning: &AddWarning) {
        self.spinner
            .set_message(format!("{} failed, continuing", warning.stage));
    }

    fn done(&self, _outcome: &AddOutcome) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// print
// ---------------------------------------------------------------------------

async fn cmd_print(search: Option<&str>, limit: u32, json: bool) -> Result<()> {
    let config = load_config()?;
    let db_path = config.database_path()?;

    if !db_path.exists() {
        if json {
            println!("[]");
        } else {
            println!("No bookmarks yet.");
        }
        return Ok(());
    }

    let storage = Storage::open_readonly(&db_path).await?;

    if let Some(query) = search {
        let results = storage.search(query, limit).await?;
        if json {
            let rows: Vec<serde_json::Value> = results
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "id": r.id,
                        "url": r.url,
                        "title": r.title,
                        "score": r.score,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        } else if results.is_empty() {
            println!("No bookmarks match '{query}'.");
        } else {
            for r in &results {
                println!("{:>5}  {}", r.id.0, r.title);
                println!("       {}", r.url);
            }
        }
        return Ok(());
    }

    let bookmarks = storage.list_bookmarks(limit).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&bookmarks)?);
        return Ok(());
    }

    if bookmarks.is_empty() {
        println!("No bookmarks yet.");
    }
    for b in &bookmarks {
        println!("{:>5}  {}", b.id.0, b.title);
        println!("       {}", b.url);
        if !b.tags.is_empty() {
            let names: Vec<&str> = b.tags.iter().map(|t| t.name.as_str()).collect();
            println!("       [{}]", names.join(", "));
        }
    }
    let total = storage.count_bookmarks().await?;
    if total > bookmarks.len() as u64 {
        println!("({} of {total} shown)", bookmarks.len());
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
