// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use console::{Emoji, Term};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use podingest::{
    Config, FsDocumentStore, FsObjectStore, MemoryDocumentStore, MemoryObjectStore, NoopReporter,
    ProgressEvent, ProgressReporter, ReqwestClient, RunOptions, Runner, SharedDocumentStore,
    SharedObjectStore, SharedProgressReporter, TracingReporter, UpsertOptions, Upserter,
};

// Emoji with fallback for terminals without Unicode support
static MICROPHONE: Emoji<'_, '_> = Emoji("🎙️  ", "");
static SEARCH: Emoji<'_, '_> = Emoji("🔍 ", "[~] ");
static HEADPHONES: Emoji<'_, '_> = Emoji("🎧 ", "[i] ");
static PICTURE: Emoji<'_, '_> = Emoji("🖼️  ", "[p] ");
static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "[-] ");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static FAILURE: Emoji<'_, '_> = Emoji("❌ ", "[!] ");
static BROOM: Emoji<'_, '_> = Emoji("🧹 ", "[x] ");
static PARTY: Emoji<'_, '_> = Emoji("🎉 ", "[*] ");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "x ");

/// Ingest podcast feeds into the document and object stores
#[derive(Parser, Debug)]
#[command(name = "podingest")]
#[command(about = "Ingest podcast RSS/Atom feeds into document and object storage")]
#[command(version)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Keep everything in memory instead of writing to the data directory
    #[arg(long)]
    dry_run: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    /// Quiet mode - suppress progress output
    #[arg(short, long)]
    quiet: bool,

    /// What to do; prompts for a command or feed URL when omitted
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
enum Command {
    /// Erase all podcasts and their episodes
    Delete,
    /// Erase all podcasts, then ingest every configured feed
    Rebuild,
    /// Ingest configured feeds that are not stored yet
    New,
    /// Ingest a single feed
    Ingest {
        /// RSS or Atom feed URL
        url: String,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Pretty,
    Json,
}

impl Command {
    /// Map a typed word to a command; anything unknown is a feed URL
    fn from_input(input: &str) -> Option<Self> {
        match input.trim() {
            "" => None,
            "delete" => Some(Self::Delete),
            "rebuild" => Some(Self::Rebuild),
            "new" => Some(Self::New),
            url => Some(Self::Ingest {
                url: url.to_string(),
            }),
        }
    }
}

/// Progress reporter using indicatif for terminal output
struct TerminalReporter {
    bar: ProgressBar,
}

impl TerminalReporter {
    fn new(total_feeds: usize) -> Result<Self> {
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{pos}/{len}] {wide_msg}")
            .context("Invalid progress bar template")?;

        let bar = ProgressBar::new(total_feeds as u64);
        bar.set_style(style);
        bar.enable_steady_tick(std::time::Duration::from_millis(100));

        Ok(Self { bar })
    }
}

impl ProgressReporter for TerminalReporter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::FetchingFeed { url } => {
                self.bar
                    .set_message(format!("{SEARCH}Fetching feed: {}", url.cyan()));
            }

            ProgressEvent::FeedNormalized {
                podcast_title,
                episodes,
                unplayable,
                failed_items,
                ..
            } => {
                self.bar.set_message(format!(
                    "{HEADPHONES}{} • {} episodes, {} unplayable, {} malformed",
                    truncate_title(&podcast_title, 40).bold().green(),
                    episodes.to_string().cyan(),
                    unplayable.to_string().yellow(),
                    failed_items.to_string().yellow()
                ));
            }

            ProgressEvent::ExistenceChecked { .. } => {}

            ProgressEvent::SkippingExisting { url, .. } => {
                self.bar
                    .println(format!("{SKIP}{} already stored", url.dimmed()));
                self.bar.inc(1);
            }

            ProgressEvent::ThumbnailPublished { url, .. } => {
                self.bar
                    .println(format!("{PICTURE}Thumbnail: {}", url.cyan()));
            }

            ProgressEvent::EpisodesWritten {
                podcast_title,
                count,
                batches,
                ..
            } => {
                self.bar.println(format!(
                    "{SUCCESS}{} - {} episodes in {} batches",
                    truncate_title(&podcast_title, 40).green(),
                    count.to_string().cyan(),
                    batches
                ));
                self.bar.inc(1);
            }

            ProgressEvent::FeedFailed { url, error } => {
                self.bar
                    .println(format!("{FAILURE}{} - {}", url.red(), error.red()));
                self.bar.inc(1);
            }

            ProgressEvent::CollectionErased {
                collection,
                documents,
                batches,
            } => {
                self.bar.println(format!(
                    "{BROOM}Erased {} documents from {} in {} batches",
                    documents.to_string().yellow().bold(),
                    collection.cyan(),
                    batches
                ));
            }

            ProgressEvent::RunCompleted {
                ingested,
                skipped,
                failed,
            } => {
                self.bar.finish_and_clear();
                println!(
                    "\n{PARTY}{} {} ingested, {} skipped, {} failed",
                    "Run complete:".bold().green(),
                    ingested.to_string().green().bold(),
                    skipped.to_string().yellow(),
                    if failed > 0 {
                        failed.to_string().red().bold()
                    } else {
                        failed.to_string().green()
                    }
                );
            }
        }
    }
}

impl Drop for TerminalReporter {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

fn truncate_title(title: &str, max_len: usize) -> String {
    if title.chars().count() <= max_len {
        title.to_string()
    } else {
        let head: String = title.chars().take(max_len.saturating_sub(3)).collect();
        format!("{head}...")
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}

fn prompt_command() -> Result<Command> {
    let term = Term::stdout();
    term.write_str("Enter Feed URL: ")
        .context("Failed to write prompt")?;
    let input = term.read_line().context("Failed to read input")?;

    match Command::from_input(&input) {
        Some(command) => Ok(command),
        None => bail!("No feed URL or command entered"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format);

    let config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if let Some(credentials) = &config.service_account_path {
        tracing::info!(path = %credentials.display(), "Using service account credentials");
    }

    let command = match args.command.clone() {
        Some(command) => command,
        None => prompt_command()?,
    };

    let feeds = match &command {
        Command::Ingest { url } => vec![url.clone()],
        _ => config.feeds.clone(),
    };

    let interactive = !args.quiet && args.log_format == LogFormat::Pretty;

    if interactive {
        println!(
            "\n{}{} {}\n",
            MICROPHONE,
            "podingest".bold().magenta(),
            "- Podcast Feed Ingest".dimmed()
        );
    }

    let reporter: SharedProgressReporter = if args.quiet {
        NoopReporter::shared()
    } else if args.log_format == LogFormat::Json {
        TracingReporter::shared()
    } else {
        let total = if command == Command::Delete { 0 } else { feeds.len() };
        Arc::new(TerminalReporter::new(total)?)
    };

    let (documents, objects): (SharedDocumentStore, SharedObjectStore) = if args.dry_run {
        tracing::info!("Dry run, nothing is written to disk");
        (
            Arc::new(MemoryDocumentStore::new()),
            Arc::new(MemoryObjectStore::new()),
        )
    } else {
        (
            Arc::new(FsDocumentStore::new(config.documents_dir())),
            Arc::new(FsObjectStore::new(config.objects_dir())),
        )
    };

    let client =
        ReqwestClient::with_timeout(config.feed_timeout()).context("Failed to create HTTP client")?;

    let upserter = Upserter::new(
        client,
        documents,
        objects,
        UpsertOptions::from_config(&config),
        reporter.clone(),
    );
    let runner = Runner::new(upserter, RunOptions::from_config(&config), reporter);

    let summary = match command {
        Command::Delete => {
            runner.delete().await.context("Failed to erase podcasts")?;
            return Ok(());
        }
        Command::Rebuild => runner
            .rebuild(&feeds)
            .await
            .context("Failed to erase podcasts before rebuild")?,
        Command::New => runner.ingest_new(&feeds).await,
        Command::Ingest { url } => runner.ingest_url(&url).await,
    };

    if interactive && !summary.failed_feeds.is_empty() {
        println!("\n{}", "Failed feeds:".red().bold());
        for (url, error) in &summary.failed_feeds {
            println!("  {}{} - {}", CROSS, url.yellow(), error.dimmed());
        }
    }

    if summary.all_failed() {
        std::process::exit(1);
    }

    Ok(())
}
