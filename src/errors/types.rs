use thiserror::Error;

/// Fatal-to-run import errors.
///
/// Per the pipeline's error taxonomy, only the orchestrator's fetch and
/// parse phases may terminate a run. Everything downstream degrades the
/// result instead of failing it.
#[derive(Error, Debug)]
pub enum ImportError {
    /// The playlist manifest could not be fetched at all.
    #[error("Failed to fetch playlist from {url}: {message}")]
    ManifestFetch { url: String, message: String },

    /// The manifest endpoint answered with a non-success status.
    #[error("Playlist fetch returned HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    /// The manifest fetched fine but contained no recognizable entries.
    #[error("No channel entries found in playlist")]
    NoEntriesFound,

    /// The caller supplied a URL that cannot be parsed.
    #[error("Invalid playlist URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    /// Configuration file problems surfaced at startup.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// HTTP client errors outside of a specific manifest fetch.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ImportError {
    /// Create a manifest fetch error with a custom message.
    pub fn manifest_fetch<U: Into<String>, M: Into<String>>(url: U, message: M) -> Self {
        Self::ManifestFetch {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create an invalid URL error.
    pub fn invalid_url<U: Into<String>, M: Into<String>>(url: U, message: M) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn configuration<M: Into<String>>(message: M) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

/// Errors internal to the directory provider used by the address
/// resolver. These never abort a run: the resolver logs them and falls
/// back to passing addresses through untouched.
#[derive(Error, Debug)]
pub enum ResolverError {
    /// The provider directory endpoint could not be reached or parsed.
    #[error("Directory fetch failed: {message}")]
    DirectoryFetch { message: String },

    /// The provider base URL is malformed.
    #[error("Invalid directory URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },
}

impl ResolverError {
    /// Create a directory fetch error.
    pub fn directory_fetch<M: Into<String>>(message: M) -> Self {
        Self::DirectoryFetch {
            message: message.into(),
        }
    }
}
