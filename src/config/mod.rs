use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub import: ImportConfig,
    pub resolver: ResolverConfig,
    pub validation: ValidationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// First channel number handed out during final assembly.
    pub starting_number: u32,
    /// Hard cap on surviving entries after filtering. Zero disables the cap.
    pub max_channels: usize,
    /// Country codes (or free-text names) entries must match; empty allows all.
    pub allowed_countries: Vec<String>,
    /// ISO 639 language codes entries must match; empty allows all.
    pub allowed_languages: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    pub enabled: bool,
    /// Base URL of the directory provider (player API style endpoint).
    pub directory_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Address substrings that mark a provider whose stream URLs embed
    /// short-lived session tokens.
    pub token_host_fragments: Vec<String>,
    /// How long a fetched directory stays fresh, in seconds.
    pub directory_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    pub enabled: bool,
    /// Number of probes in flight per batch.
    pub batch_size: usize,
    /// Hard per-probe timeout, in seconds.
    pub probe_timeout_secs: u64,
    /// Base pause between batches, in milliseconds (jitter is added).
    pub batch_pause_ms: u64,
    /// How long a cached verdict stays fresh, in seconds.
    pub cache_ttl_secs: u64,
    /// Address substrings exempt from probing (reliable CDNs that cannot
    /// be meaningfully verified with a plain GET).
    pub trusted_patterns: Vec<String>,
}

impl ResolverConfig {
    pub fn directory_ttl(&self) -> Duration {
        Duration::from_secs(self.directory_ttl_secs)
    }
}

impl ValidationConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn batch_pause(&self) -> Duration {
        Duration::from_millis(self.batch_pause_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            import: ImportConfig {
                starting_number: 1,
                max_channels: 0,
                allowed_countries: Vec::new(),
                allowed_languages: Vec::new(),
            },
            resolver: ResolverConfig {
                enabled: true,
                directory_url: None,
                username: None,
                password: None,
                token_host_fragments: vec![
                    "/live/".to_string(),
                    "player_api".to_string(),
                    "get.php".to_string(),
                ],
                directory_ttl_secs: 30 * 60,
            },
            validation: ValidationConfig {
                enabled: true,
                batch_size: 6,
                probe_timeout_secs: 8,
                batch_pause_ms: 250,
                cache_ttl_secs: 10 * 60,
                trusted_patterns: vec![
                    "akamaized.net".to_string(),
                    "cloudfront.net".to_string(),
                    "fastly.net".to_string(),
                    "llnwd.net".to_string(),
                    "cdn.jwplayer.com".to_string(),
                ],
            },
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());

        if std::path::Path::new(&config_file).exists() {
            let contents = std::fs::read_to_string(&config_file)?;
            Ok(toml::from_str(&contents)?)
        } else {
            let default_config = Self::default();
            let contents = toml::to_string_pretty(&default_config)?;
            std::fs::write(&config_file, contents)?;
            Ok(default_config)
        }
    }
}
