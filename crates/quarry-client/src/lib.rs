//! Downloaders for configured package repositories.
//!
//! A repository is fetched either in bulk ([`BulkDownloader`]: one request
//! for the whole index) or per package ([`ApiDownloader`]: rate-limited
//! queries against an info endpoint, with an in-memory response cache and an
//! explicit retry schedule). [`Downloader`] is the sum of the two, chosen by
//! the repository's `query_type` at construction.

pub use api::ApiDownloader;
pub use bulk::BulkDownloader;
pub use downloader::Downloader;
pub use error::Error;
pub use rate_limit::{RateLimitPermit, RateLimiter};

mod api;
mod base;
mod bulk;
mod downloader;
mod error;
mod payload;
mod rate_limit;
mod response_cache;
