use reqwest::StatusCode;
use thiserror::Error;

use quarry_parse::ParseError;

/// A fetch or parse failure for a specific repository. Every variant carries
/// the repository name and a short reason; detailed diagnostics belong in
/// the logs.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{repository}: unsupported URL scheme: {url}")]
    UrlScheme { repository: String, url: String },

    #[error("{repository}: invalid authentication configuration")]
    AuthHeader { repository: String },

    #[error("{repository}: failed to build HTTP client")]
    Build {
        repository: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{repository}: request failed")]
    Request {
        repository: String,
        #[source]
        source: reqwest_middleware::Error,
    },

    #[error("{repository}: request failed")]
    Http {
        repository: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{repository}: HTTP {status} from {url}")]
    Status {
        repository: String,
        status: StatusCode,
        url: String,
    },

    #[error("{repository}: response too large ({size} bytes, limit {limit})")]
    TooLarge {
        repository: String,
        size: u64,
        limit: u64,
    },

    #[error("{repository}: failed to decompress response")]
    Decompress {
        repository: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{repository}: no parser registered for format `{format}`")]
    UnknownFormat { repository: String, format: String },

    #[error("{repository}: failed to parse response")]
    Parse {
        repository: String,
        #[source]
        source: ParseError,
    },

    #[error("{repository}: no packages endpoint configured")]
    NoPackagesEndpoint { repository: String },

    /// HTTP 429 persisted through every allowed retry.
    #[error("{repository}: rate limit exceeded after {retries} retries")]
    RateLimited { repository: String, retries: u32 },

    #[error("{repository}: request failed after {retries} retries: {reason}")]
    RetriesExhausted {
        repository: String,
        retries: u32,
        reason: String,
    },
}
