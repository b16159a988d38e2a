use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use channel_importer::{
    config::Config,
    pipeline::{ImportOptions, ImportOrchestrator},
    resolver::{AddressResolver, CachedDirectory, PlayerApiDirectory},
    utils::http_client::HttpFetcher,
    validator::{StreamValidator, VerdictCache},
};

#[derive(Parser)]
#[command(name = "channel-importer")]
#[command(version)]
#[command(about = "Import, filter and validate channels from an M3U playlist")]
struct Cli {
    /// Playlist URL to import (GitHub blob/tree URLs are rewritten to raw)
    url: String,

    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Restrict to these country codes (repeatable)
    #[arg(long = "country", value_name = "CODE")]
    countries: Vec<String>,

    /// Restrict to these language codes (repeatable)
    #[arg(long = "language", value_name = "CODE")]
    languages: Vec<String>,

    /// Maximum number of channels to keep (0 = unlimited)
    #[arg(long, value_name = "N")]
    max_channels: Option<usize>,

    /// First channel number
    #[arg(long, value_name = "N")]
    starting_number: Option<u32>,

    /// Skip liveness validation
    #[arg(long)]
    no_validate: bool,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = format!("channel_importer={}", cli.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting channel importer v{}", env!("CARGO_PKG_VERSION"));

    std::env::set_var("CONFIG_FILE", &cli.config);
    let config = Config::load()?;

    let fetcher = Arc::new(HttpFetcher::new());

    let resolver = match (&config.resolver.enabled, &config.resolver.directory_url) {
        (true, Some(directory_url)) => {
            let provider = Arc::new(PlayerApiDirectory::new(
                fetcher.clone(),
                directory_url.clone(),
                config.resolver.username.clone().unwrap_or_default(),
                config.resolver.password.clone().unwrap_or_default(),
            ));
            Some(AddressResolver::new(
                CachedDirectory::new(provider, config.resolver.directory_ttl()),
                config.resolver.token_host_fragments.clone(),
            ))
        }
        _ => None,
    };

    let cache = Arc::new(VerdictCache::new(config.validation.cache_ttl()));
    let validator = StreamValidator::with_http_prober(cache, config.validation.clone());
    let orchestrator = ImportOrchestrator::new(fetcher, resolver, validator);

    let options = ImportOptions {
        known_addresses: Default::default(),
        starting_number: cli
            .starting_number
            .unwrap_or(config.import.starting_number),
        allowed_countries: if cli.countries.is_empty() {
            config.import.allowed_countries.clone()
        } else {
            cli.countries
        },
        allowed_languages: if cli.languages.is_empty() {
            config.import.allowed_languages.clone()
        } else {
            cli.languages
        },
        max_channels: cli.max_channels.unwrap_or(config.import.max_channels),
        validate: !cli.no_validate && config.validation.enabled,
    };

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_cancel.cancel();
        }
    });

    let outcome = orchestrator
        .run(&cli.url, &options, &cancel, |progress| {
            info!(
                "[{}] {}/{} {}",
                progress.phase, progress.current, progress.total, progress.message
            );
        })
        .await?;

    for channel in &outcome.channels {
        let category = channel.category.as_deref().unwrap_or("-");
        println!(
            "{:>4}  {:<40}  {:<20}  {}",
            channel.number, channel.name, category, channel.address
        );
    }

    let stats = &outcome.statistics;
    println!(
        "\n{} channels imported ({} parsed, {} resolved, {} filtered, {} checked: {} live / {} dead)",
        outcome.channels.len(),
        stats.total_parsed,
        stats.resolved,
        stats.total_filtered(),
        stats.validated,
        stats.valid,
        stats.invalid,
    );

    for error in &outcome.errors {
        eprintln!("warning: {error}");
    }

    Ok(())
}
