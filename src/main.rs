//! Pagepress main entry point
//!
//! Command-line interface for extracting articles and crawling list pages.

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use pagepress::config::{load_config_with_hash, OutputFormat, PipelineConfig, ProxyConfig, RenderMode};
use pagepress::crawler::CrawlReport;
use pagepress::render::ChromeBackend;
use pagepress::{ExtractResult, Pipeline};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Pagepress: adaptive article extraction
///
/// Fetches pages with a lightweight HTTP request and only falls back to a
/// headless browser when the fetched markup looks incomplete.
#[derive(Parser, Debug)]
#[command(name = "pagepress")]
#[command(version)]
#[command(about = "Adaptive fetch/render/extract pipeline for web articles", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract article content from one or more URLs
    Extract {
        #[arg(required = true, value_name = "URL")]
        urls: Vec<String>,

        #[command(flatten)]
        options: PipelineArgs,
    },

    /// Discover article URLs starting from list or feed pages
    Crawl {
        #[arg(required = true, value_name = "SEED")]
        seeds: Vec<String>,

        /// Maximum number of discovered URLs
        #[arg(long)]
        max_pages: Option<usize>,

        /// Maximum link depth from the seeds
        #[arg(long)]
        max_depth: Option<u32>,

        /// Concurrent fetches (and extractions with --extract)
        #[arg(long)]
        workers: Option<usize>,

        /// Regex a discovered URL must match (repeatable)
        #[arg(long, value_name = "REGEX")]
        allow: Vec<String>,

        /// Regex that rejects a discovered URL (repeatable)
        #[arg(long, value_name = "REGEX")]
        deny: Vec<String>,

        /// Extract every discovered URL instead of listing it
        #[arg(long)]
        extract: bool,

        #[command(flatten)]
        options: PipelineArgs,
    },
}

/// Flags that override the configuration file
#[derive(Args, Debug)]
struct PipelineArgs {
    /// Render policy: auto, always or never
    #[arg(long, value_name = "MODE")]
    render: Option<RenderMode>,

    /// CSS selector to wait for after navigation (repeatable)
    #[arg(long, value_name = "SELECTOR")]
    wait_selector: Vec<String>,

    /// Proxy server for both fetch and render
    #[arg(long, value_name = "URL")]
    proxy: Option<String>,

    /// Minimum extracted text length before a page counts as complete
    #[arg(long, value_name = "CHARS")]
    min_text_len: Option<usize>,

    /// Output format: txt, md or html
    #[arg(long, value_name = "FORMAT")]
    format: Option<OutputFormat>,

    /// Chromium/Chrome executable used for rendering
    #[arg(long, value_name = "PATH")]
    browser: Option<PathBuf>,

    /// Print one JSON record per line
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded (hash: {})", hash);
            config
        }
        None => PipelineConfig::default(),
    };
    let from_file = cli.config.is_some();

    match cli.command {
        Command::Extract { urls, options } => {
            let json = options.json;
            let pipeline = build_pipeline(config, &options, from_file)?;
            let results = pipeline.extract_urls(&urls).await;
            pipeline.shutdown().await;
            print_results(&results, json)
        }
        Command::Crawl {
            seeds,
            max_pages,
            max_depth,
            workers,
            allow,
            deny,
            extract,
            options,
        } => {
            let mut config = config;
            if let Some(n) = max_pages {
                config.crawl.max_pages = n;
            }
            if let Some(n) = max_depth {
                config.crawl.max_depth = n;
            }
            if let Some(n) = workers {
                config.crawl.max_workers = n;
            }
            config.crawl.allow_patterns.extend(allow);
            config.crawl.deny_patterns.extend(deny);

            let json = options.json;
            let pipeline = build_pipeline(config, &options, from_file)?;
            if extract {
                let results = pipeline.crawl_and_extract(&seeds).await;
                pipeline.shutdown().await;
                print_results(&results, json)
            } else {
                let report = pipeline.crawl_report(&seeds).await;
                print_report(&report, json)?;
                Ok(ExitCode::SUCCESS)
            }
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// Logs go to stderr; stdout carries only results.
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("pagepress=info,warn"),
            1 => EnvFilter::new("pagepress=debug,info"),
            2 => EnvFilter::new("pagepress=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Applies CLI overrides and attaches a browser when rendering is possible
///
/// Without `--render`, the mode comes from the configuration file, or is
/// `auto` when `--browser` is given and `never` otherwise.
fn build_pipeline(
    mut config: PipelineConfig,
    args: &PipelineArgs,
    from_file: bool,
) -> anyhow::Result<Pipeline> {
    config.render.mode = match args.render {
        Some(mode) => mode,
        None if from_file => config.render.mode,
        None if args.browser.is_some() => RenderMode::Auto,
        None => RenderMode::Never,
    };
    if !args.wait_selector.is_empty() {
        config.render.wait_selectors = args.wait_selector.clone();
    }
    if let Some(proxy) = &args.proxy {
        config.fetch.proxy = Some(ProxyConfig::server(proxy.clone()));
        config.render.proxy = Some(ProxyConfig::server(proxy.clone()));
    }
    if let Some(n) = args.min_text_len {
        config.extract.min_text_len = n;
    }
    if let Some(format) = args.format {
        config.extract.output_format = format;
    }

    let mut builder = Pipeline::builder(config.clone());
    if config.render.mode != RenderMode::Never {
        let backend = match &args.browser {
            Some(path) => ChromeBackend::new(path),
            None => match ChromeBackend::detect() {
                Some(backend) => backend,
                None => bail!(
                    "render mode '{}' needs a browser; pass --browser <PATH> or --render never",
                    config.render.mode
                ),
            },
        };
        tracing::info!("Rendering with {}", backend.binary().display());
        builder = builder.render_backend(Arc::new(backend));
    }

    Ok(builder.build()?)
}

/// Prints extraction results; returns a failure code if any URL failed
fn print_results(results: &[ExtractResult], json: bool) -> anyhow::Result<ExitCode> {
    let mut failed = 0usize;
    for result in results {
        if json {
            println!("{}", serde_json::to_string(result)?);
        } else if let Some(text) = &result.text {
            if results.len() > 1 {
                println!("=== {} ===", result.url);
            }
            if let Some(title) = &result.title {
                println!("{}\n", title);
            }
            println!("{}\n", text);
        }

        if let Some(error) = &result.error {
            failed += 1;
            eprintln!("error: {}: {}", result.url, error);
        }
    }

    tracing::info!(total = results.len(), failed, "Done");
    Ok(if failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn print_report(report: &CrawlReport, json: bool) -> anyhow::Result<()> {
    for discovered in &report.discovered {
        if json {
            println!("{}", serde_json::to_string(discovered)?);
        } else {
            println!("{}", discovered.url);
        }
    }
    Ok(())
}
