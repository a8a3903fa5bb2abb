//! Error types for every stage of the pipeline.
//!
//! Each concern gets its own enum so callers can tell recoverable failures
//! (a single venue's fetch) apart from fatal ones (a broken category file).
//! End-of-data conditions are not errors; see
//! [`Termination`](crate::harvest::adapter::Termination).

use std::io;
use std::path::PathBuf;

/// Failure of a single page request.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Connection, TLS or protocol failure.
    #[error("request failed: {0}")]
    Transport(String),

    /// The per-request timeout elapsed.
    #[error("request timed out")]
    Timeout,

    /// The server answered with a non-success status other than 404.
    #[error("unexpected HTTP status {0}")]
    Status(u16),

    /// The response body could not be read as text.
    #[error("failed to read response body: {0}")]
    Body(String),
}

impl FetchError {
    /// Whether retrying the same request has a reasonable chance to succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Transport(_) | FetchError::Timeout | FetchError::Body(_) => true,
            FetchError::Status(status) => *status == 429 || *status >= 500,
        }
    }
}

/// Failure of one venue's harvest job.
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    /// No review section could be derived from the catalog locator.
    #[error("cannot derive review pages from locator {locator}")]
    Locator { locator: String },

    /// A page fetch failed for a reason other than end-of-data.
    #[error("fetching {url} failed: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },

    /// A 404 from a source that does not use it as an end-of-data signal.
    #[error("page not found: {url}")]
    UnexpectedNotFound { url: String },

    /// The job panicked; the batch carries on without it.
    #[error("harvest job panicked: {0}")]
    Panicked(String),
}

/// Fatal problems with the category configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read category config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid category config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Categories with keywords but no weight.
    #[error("categories without a weight in `scores`: {}", .0.join(", "))]
    MissingWeights(Vec<String>),

    /// Weights for categories that appear in neither keyword group.
    #[error("weights for unknown categories: {}", .0.join(", "))]
    UnknownWeights(Vec<String>),

    /// A category listed under both `fatal_risks` and `wow_factors`.
    #[error("categories listed as both risk and wow: {}", .0.join(", "))]
    AmbiguousKind(Vec<String>),
}

/// Failures reading or writing the JSON store and score report.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize output: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Failures reading or writing a venue catalog CSV.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed catalog {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to write catalog {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
