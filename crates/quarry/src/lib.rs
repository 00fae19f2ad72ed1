//! quarry aggregates package metadata from YAML-described software
//! repositories (APT, DNF, Homebrew, npm, winget, …), normalizes it to a
//! common record, and serves it through a disk-backed TTL cache with
//! per-repository rate limiting and fault tolerance.
//!
//! [`RepositoryManager`] is the entry point; the component crates are
//! re-exported for direct use.

pub use error::Error;
pub use manager::{ManagerStatistics, RepositoryManager, SearchFilters};

pub use quarry_cache::{Cache, CacheEntry, CacheError, CacheStats};
pub use quarry_client::{ApiDownloader, BulkDownloader, Downloader, RateLimiter};
pub use quarry_config::ConfigError;
pub use quarry_parse::{ParseError, ParserRegistry};
pub use quarry_types::{
    Platform, QueryType, RepositoryConfig, RepositoryInfo, RepositoryPackage, SearchResult,
};

mod codename;
mod error;
mod manager;
