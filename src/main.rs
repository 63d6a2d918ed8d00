//! # Article Enhancer CLI
//!
//! ```sh
//! article_enhancer scrape https://example.com/blog
//! article_enhancer batch https://a.example/post https://b.example/post
//! article_enhancer links https://example.com/blog
//! article_enhancer -j ./json enhance https://example.com/blog/post
//! ```
//!
//! Articles live in an in-process store for the duration of one run; pass
//! `--json-output-dir` to keep the results.

use article_enhancer::api::ChatClient;
use article_enhancer::cli::{Cli, Command};
use article_enhancer::config::AppConfig;
use article_enhancer::enhancer::Enhancer;
use article_enhancer::fetcher::Fetcher;
use article_enhancer::ingest::Ingestor;
use article_enhancer::outputs::json;
use article_enhancer::scrapers::{discover_links, scrape_many};
use article_enhancer::search::GoogleSearch;
use article_enhancer::store::{ArticleStore, MemoryStore};
use article_enhancer::utils::{ensure_writable_dir, parse_http_url};
use article_enhancer::ErrorBody;
use clap::Parser;
use serde::Serialize;
use std::error::Error;
use std::path::Path;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    let start_time = std::time::Instant::now();
    info!("article_enhancer starting up");

    let args = Cli::parse();
    debug!(?args.command, ?args.json_output_dir, "Parsed CLI arguments");

    let config = AppConfig::load(args.config.as_deref().map(Path::new))?;
    let expose_details = config.environment.exposes_error_details();

    if let Some(dir) = args.json_output_dir.as_deref() {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(
                path = %dir,
                error = %e,
                "JSON output directory is not writable (fix perms or choose a different path)"
            );
            return Err(e);
        }
    }

    let fetcher = Fetcher::from_config(&config.fetch)?;
    let store = MemoryStore::new();

    let outcome = match args.command {
        Command::Scrape { url } => {
            let ingestor = Ingestor::new(&store, &fetcher, &config);
            match ingestor.ingest(&url).await {
                Ok(articles) => {
                    print_json(&articles)?;
                    save(&articles, args.json_output_dir.as_deref()).await;
                    Ok(())
                }
                Err(e) => Err(e),
            }
        }
        Command::Batch { urls } => {
            let outcomes = scrape_many(&fetcher, &urls).await;
            print_json(&outcomes)?;
            save(&outcomes, args.json_output_dir.as_deref()).await;
            Ok(())
        }
        Command::Links { url } => match parse_http_url(&url) {
            Ok(listing) => discover_links(&fetcher, &listing).await.map(|links| {
                for link in links {
                    println!("{link}");
                }
            }),
            Err(e) => Err(e),
        },
        Command::Enhance { url, force } => {
            let generator = ChatClient::new(&config.generation)?;
            let search = GoogleSearch::new(config.search.clone())?;
            let ingestor = Ingestor::new(&store, &fetcher, &config);
            let enhancer = Enhancer::new(&store, &search, &generator, &fetcher, &config);

            let run = async {
                let articles = ingestor.ingest(&url).await?;
                let ids: Vec<_> = articles.iter().map(|a| a.id).collect();
                let reports = enhancer.enhance_many(&ids, force).await?;
                // full records, failed runs included with their recorded error
                let stored = store.list().await?;
                Ok::<_, article_enhancer::Error>((reports, stored))
            };
            match run.await {
                Ok((reports, stored)) => {
                    print_json(&reports)?;
                    save(&stored, args.json_output_dir.as_deref()).await;
                    info!(reported = reports.len(), stored = stored.len(), "Enhancement finished");
                    Ok(())
                }
                Err(e) => Err(e),
            }
        }
    };

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    if let Err(e) = outcome {
        let body = ErrorBody::from_error(&e, expose_details);
        eprintln!("{}", serde_json::to_string_pretty(&body)?);
        return Err(e.into());
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn save<T: Serialize>(items: &[T], dir: Option<&str>) {
    let Some(dir) = dir else { return };
    if let Err(e) = json::write_articles(items, dir).await {
        error!(error = %e, "Failed to write JSON output");
    }
}
