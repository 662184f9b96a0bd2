use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod config;
mod db;
mod error;
mod extract;
mod handle;
mod models;
mod pipeline;

use config::Config;
use db::Repository;
use error::{AppError, Result};
use extract::WebExtractor;
use pipeline::{IngestionPipeline, SourceOutcome};

#[derive(Parser)]
#[command(name = "newsgrab", version, about = "Collects and stores news articles from configured web sources")]
struct Cli {
    /// Override the database path from the config file
    #[arg(long, global = true, value_name = "PATH")]
    database: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new source; it catches up on the next fetch
    AddSource {
        /// Front page URL of the source
        url: String,
    },

    /// Remove a source and all of its articles
    RemoveSource {
        url: String,
    },

    /// List registered sources
    Sources,

    /// Run one ingestion pass over all registered sources
    Fetch,

    /// Delete articles older than the retention window
    Prune {
        /// Retention horizon in days (defaults to the configured value)
        #[arg(long)]
        days: Option<u32>,
    },

    /// List the most recently found articles
    Recent {
        /// Maximum number of rows (defaults to the configured page size)
        #[arg(short, long)]
        limit: Option<usize>,

        /// Print as JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Show one article by its public handle
    Show {
        /// Encoded article handle, as printed by `recent`
        handle: String,

        /// Print as JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("newsgrab=info".parse().map_err(anyhow::Error::from)?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(db_path) = cli.database {
        config.db_path = db_path;
    }

    let repo = Repository::new(&config.db_path).await?;

    match cli.command {
        Commands::AddSource { url } => cmd_add_source(&repo, &url).await?,
        Commands::RemoveSource { url } => cmd_remove_source(&repo, &url).await?,
        Commands::Sources => cmd_sources(&repo).await?,
        Commands::Fetch => cmd_fetch(&repo, &config).await?,
        Commands::Prune { days } => {
            cmd_prune(&repo, days.unwrap_or(config.retention_days)).await?
        }
        Commands::Recent { limit, json } => {
            cmd_recent(&repo, limit.unwrap_or(config.page_size), config.show_unextracted, json).await?
        }
        Commands::Show { handle, json } => cmd_show(&repo, &handle, json).await?,
    }

    Ok(())
}

async fn cmd_add_source(repo: &Repository, url: &str) -> Result<()> {
    if repo.source_exists(url).await? {
        println!("source already registered: {url}");
        return Ok(());
    }
    let id = repo.add_source(url, None, None).await?;
    println!("added source {url} (id {id})");
    Ok(())
}

async fn cmd_remove_source(repo: &Repository, url: &str) -> Result<()> {
    match repo.get_source_by_url(url).await? {
        Some(source) => {
            repo.delete_source(source.id).await?;
            println!("removed source {url} and its articles");
        }
        None => println!("source not registered: {url}"),
    }
    Ok(())
}

async fn cmd_sources(repo: &Repository) -> Result<()> {
    let sources = repo.list_sources().await?;
    if sources.is_empty() {
        println!("no sources registered");
        return Ok(());
    }
    for source in sources {
        println!(
            "{}, {} @ {}",
            source.brand.as_deref().unwrap_or("-"),
            source.domain.as_deref().unwrap_or("-"),
            source.url
        );
    }
    Ok(())
}

async fn cmd_fetch(repo: &Repository, config: &Config) -> Result<()> {
    let extractor = WebExtractor::new();
    let pipeline = IngestionPipeline::new(repo, &extractor, config.catchup_limit);
    let report = pipeline.run().await?;

    if report.is_empty() {
        println!("no sources registered; add one with `newsgrab add-source <url>`");
        return Ok(());
    }

    let (mut new, mut blocked, mut failed, mut skipped) = (0, 0, 0, 0);
    for source in &report.sources {
        match source.outcome {
            SourceOutcome::Ingested => {
                println!(
                    "{}: total {}, new {}, blocked {}, failed {}",
                    source.source_url, source.total, source.new, source.blocked, source.failed
                );
                new += source.new;
                blocked += source.blocked;
                failed += source.failed;
            }
            SourceOutcome::EnumerationFailed => {
                println!("{}: enumeration failed, skipped", source.source_url);
                skipped += 1;
            }
            SourceOutcome::StoreFailed => {
                println!("{}: store failure, batch rolled back", source.source_url);
                skipped += 1;
            }
        }
    }
    println!(
        "done: {} sources ({} skipped), {} new, {} blocked, {} failed",
        report.sources.len(),
        skipped,
        new,
        blocked,
        failed
    );
    Ok(())
}

async fn cmd_prune(repo: &Repository, days: u32) -> Result<()> {
    let cutoff = Utc::now() - chrono::Duration::days(days as i64);
    let removed = repo.prune_older_than(cutoff).await?;
    println!("removed {removed} articles older than {days} days");
    Ok(())
}

async fn cmd_recent(
    repo: &Repository,
    limit: usize,
    show_unextracted: bool,
    json: bool,
) -> Result<()> {
    let articles = repo.list_recent(limit, show_unextracted).await?;

    if json {
        let rows: Vec<serde_json::Value> = articles
            .iter()
            .map(|a| {
                serde_json::json!({
                    "handle": handle::encode(a.handle),
                    "url": a.url,
                    "title": a.title,
                    "summary": a.summary,
                    "found_at": a.found_at.to_rfc3339(),
                    "source": { "url": a.source_url, "brand": a.source_brand },
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows).map_err(anyhow::Error::from)?);
        return Ok(());
    }

    if articles.is_empty() {
        println!("no articles stored");
        return Ok(());
    }
    for article in articles {
        println!(
            "{}  {}  [{}] {}",
            handle::encode(article.handle),
            article.found_at.format("%Y-%m-%d %H:%M"),
            article.source_brand.as_deref().unwrap_or("-"),
            article.title.as_deref().unwrap_or(&article.url),
        );
    }
    Ok(())
}

async fn cmd_show(repo: &Repository, token: &str, json: bool) -> Result<()> {
    // A malformed token reads the same as an unknown one: not found.
    let article = match handle::decode(token) {
        Ok(handle) => repo.get_by_handle(handle).await?,
        Err(AppError::InvalidHandle) => None,
        Err(e) => return Err(e),
    };

    let Some(article) = article else {
        println!("article not found: {token}");
        return Ok(());
    };

    if json {
        let row = serde_json::json!({
            "handle": handle::encode(article.handle),
            "url": article.url,
            "title": article.title,
            "top_image": article.top_image,
            "text": article.text,
            "summary": article.summary,
            "found_at": article.found_at.to_rfc3339(),
            "source": { "url": article.source_url, "brand": article.source_brand },
        });
        println!("{}", serde_json::to_string_pretty(&row).map_err(anyhow::Error::from)?);
        return Ok(());
    }

    println!("{}", article.title.as_deref().unwrap_or("(untitled)"));
    println!(
        "{} @ {}",
        article.source_brand.as_deref().unwrap_or("-"),
        article.found_at.format("%Y-%m-%d %H:%M")
    );
    println!("{}", article.url);
    if let Some(summary) = &article.summary {
        println!();
        println!("{summary}");
    }
    if let Some(text) = &article.text {
        println!();
        println!("{text}");
    }
    Ok(())
}
