//! The API downloader: rate-limited per-package queries with an in-memory
//! response cache and an explicit retry schedule for 429s, server errors,
//! and transport failures.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use indexmap::IndexMap;
use jiff::SignedDuration;
use reqwest::StatusCode;
use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

use quarry_parse::ParserRegistry;
use quarry_types::{LimitsConfig, RepositoryConfig, RepositoryInfo, RepositoryPackage};

use crate::Error;
use crate::base::{
    LazyClient, build_raw_client, check_scheme, filter_matches, identity_digest, resolve_query,
    resolve_template, select_details,
};
use crate::payload::parse_payload;
use crate::rate_limit::RateLimiter;
use crate::response_cache::ResponseCache;

const AVAILABILITY_TIMEOUT: Duration = Duration::from_secs(10);

pub struct ApiDownloader {
    info: RepositoryInfo,
    config: RepositoryConfig,
    parsers: Arc<ParserRegistry>,
    cache_key: String,
    client: LazyClient<reqwest::Client>,
    limiter: RateLimiter,
    responses: ResponseCache,
}

impl std::fmt::Debug for ApiDownloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiDownloader")
            .field("repository", &self.info.name)
            .finish_non_exhaustive()
    }
}

impl ApiDownloader {
    pub fn new(config: RepositoryConfig, parsers: Arc<ParserRegistry>) -> Self {
        let info = config.to_info();
        let cache_key = identity_digest(&info);
        let limiter = RateLimiter::new(
            config.limits.requests_per_minute,
            config.limits.concurrent_requests,
        );
        let responses = ResponseCache::new(config.cache.api_cache_ttl_seconds);
        Self {
            info,
            config,
            parsers,
            cache_key,
            client: LazyClient::new(),
            limiter,
            responses,
        }
    }

    pub fn info(&self) -> &RepositoryInfo {
        &self.info
    }

    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }

    pub fn cache_ttl(&self) -> SignedDuration {
        SignedDuration::from_hours(i64::try_from(self.config.cache.ttl_hours).unwrap_or(24))
    }

    async fn client(&self) -> Result<reqwest::Client, Error> {
        self.client
            .get_or_build(|| build_raw_client(&self.info.name, &self.config))
            .await
    }

    /// Issue one rate-limited GET with retries.
    ///
    /// The in-memory URL cache is consulted once, before the first attempt;
    /// retries always go to the network. HTTP 429, 5xx, and transport errors
    /// are retried up to `limits.max_retries` times with the configured
    /// (optionally exponential) delay.
    async fn make_api_request(&self, url: &str, use_cache: bool) -> Result<Vec<u8>, Error> {
        check_scheme(&self.info.name, url)?;

        if use_cache {
            if let Some(body) = self.responses.get(url).await {
                debug!("Cache hit for {url}");
                return Ok(body);
            }
        }

        let limits = self.config.limits;
        let mut attempt: u32 = 0;
        loop {
            let permit = self.limiter.acquire().await;
            let client = self.client().await?;

            debug!("API request to: {url}");
            let reason = match client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status == StatusCode::TOO_MANY_REQUESTS {
                        if attempt >= limits.max_retries {
                            return Err(Error::RateLimited {
                                repository: self.info.name.clone(),
                                retries: limits.max_retries,
                            });
                        }
                        format!("rate limited (429) by {url}")
                    } else if status.is_server_error() {
                        if attempt >= limits.max_retries {
                            return Err(Error::RetriesExhausted {
                                repository: self.info.name.clone(),
                                retries: limits.max_retries,
                                reason: format!("HTTP {status}"),
                            });
                        }
                        format!("server error {status} from {url}")
                    } else if !status.is_success() {
                        return Err(Error::Status {
                            repository: self.info.name.clone(),
                            status,
                            url: url.to_string(),
                        });
                    } else {
                        let limit = limits.max_response_size_bytes();
                        if let Some(length) = response.content_length() {
                            if length > limit {
                                return Err(Error::TooLarge {
                                    repository: self.info.name.clone(),
                                    size: length,
                                    limit,
                                });
                            }
                        }
                        match response.bytes().await {
                            Ok(body) => {
                                let size = u64::try_from(body.len()).unwrap_or(u64::MAX);
                                if size > limit {
                                    return Err(Error::TooLarge {
                                        repository: self.info.name.clone(),
                                        size,
                                        limit,
                                    });
                                }
                                let body = body.to_vec();
                                if use_cache {
                                    self.responses.insert(url, body.clone()).await;
                                }
                                return Ok(body);
                            }
                            Err(err) => {
                                self.client.reset().await;
                                if attempt >= limits.max_retries {
                                    return Err(Error::RetriesExhausted {
                                        repository: self.info.name.clone(),
                                        retries: limits.max_retries,
                                        reason: err.to_string(),
                                    });
                                }
                                format!("network error: {err}")
                            }
                        }
                    }
                }
                Err(err) => {
                    self.client.reset().await;
                    if attempt >= limits.max_retries {
                        return Err(Error::RetriesExhausted {
                            repository: self.info.name.clone(),
                            retries: limits.max_retries,
                            reason: err.to_string(),
                        });
                    }
                    format!("network error: {err}")
                }
            };

            drop(permit);
            let delay = retry_delay(&limits, attempt);
            warn!(
                "{reason}; retrying in {}s (attempt {}/{})",
                delay.as_secs(),
                attempt + 1,
                limits.max_retries
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Query the info endpoint for one package. Returns `None` on any
    /// failure (logged), never an error.
    pub async fn query_package(
        &self,
        name: &str,
        use_cache: bool,
    ) -> Option<RepositoryPackage> {
        match self.try_query_package(name, use_cache).await {
            Ok(package) => package,
            Err(err) => {
                warn!("Failed to query package {name}: {err}");
                None
            }
        }
    }

    async fn try_query_package(
        &self,
        name: &str,
        use_cache: bool,
    ) -> Result<Option<RepositoryPackage>, Error> {
        match &self.config.endpoints.info {
            Some(info_endpoint) => {
                self.query_info_endpoint(info_endpoint, name, use_cache)
                    .await
            }
            None => {
                debug!("No info endpoint, falling back to search for {name}");
                let packages = self.search_package(name).await?;
                Ok(select_details(packages, name, None))
            }
        }
    }

    /// Fetch and select one package through the info endpoint.
    async fn query_info_endpoint(
        &self,
        info_endpoint: &str,
        name: &str,
        use_cache: bool,
    ) -> Result<Option<RepositoryPackage>, Error> {
        let url = resolve_query(info_endpoint, name);
        debug!("Querying package {name} from {url}");
        let body = self.make_api_request(&url, use_cache).await?;
        let packages = parse_payload(
            &self.info,
            &self.config.parsing,
            &self.parsers,
            &body,
            None,
        )
        .await?;
        debug!("Parsed {} packages from response", packages.len());

        // First case-insensitive name match, else whatever the endpoint
        // returned first.
        let matched = packages
            .iter()
            .position(|package| package.name.eq_ignore_ascii_case(name));
        Ok(match matched {
            Some(index) => packages.into_iter().nth(index),
            None => packages.into_iter().next(),
        })
    }

    /// Query several packages concurrently. Concurrency is bounded by the
    /// rate limiter; the result map preserves the caller's name order and
    /// contains every requested name.
    pub async fn query_batch(
        &self,
        names: &[String],
        use_cache: bool,
    ) -> IndexMap<String, Option<RepositoryPackage>> {
        let concurrency = self.config.limits.concurrent_requests.max(1);
        let results: FxHashMap<String, Option<RepositoryPackage>> =
            futures::stream::iter(names.iter().cloned().map(|name| async move {
                let package = self.query_package(&name, use_cache).await;
                (name, package)
            }))
            .buffer_unordered(concurrency)
            .collect()
            .await;

        names
            .iter()
            .map(|name| (name.clone(), results.get(name).cloned().flatten()))
            .collect()
    }

    /// Bulk download through the packages endpoint. Supported but
    /// discouraged for API repositories; the manager's bulk refresh skips
    /// this variant entirely.
    pub async fn download_package_list(&self) -> Result<Vec<RepositoryPackage>, Error> {
        warn!(
            "download_package_list() called on API repository {}; prefer query_package()",
            self.info.name
        );
        let packages = &self.config.endpoints.packages;
        if packages.is_empty() {
            return Err(Error::NoPackagesEndpoint {
                repository: self.info.name.clone(),
            });
        }
        let url = resolve_template(&self.info, packages);
        let body = self.make_api_request(&url, true).await?;
        let packages = parse_payload(
            &self.info,
            &self.config.parsing,
            &self.parsers,
            &body,
            None,
        )
        .await?;
        info!(
            "Downloaded {} packages from {}",
            packages.len(),
            self.info.name
        );
        Ok(packages)
    }

    /// Search via the search endpoint, falling back to the info endpoint.
    /// Endpoint failures yield an empty list rather than an error.
    pub async fn search_package(&self, name: &str) -> Result<Vec<RepositoryPackage>, Error> {
        if let Some(search) = &self.config.endpoints.search {
            let url = resolve_query(search, name);
            return match self.fetch_and_parse_cached(&url).await {
                Ok(packages) => Ok(filter_matches(packages, name)),
                Err(err) => {
                    debug!("Search failed for {name}: {err}");
                    Ok(Vec::new())
                }
            };
        }

        if let Some(info_endpoint) = &self.config.endpoints.info {
            return match self.query_info_endpoint(info_endpoint, name, true).await {
                Ok(package) => Ok(package.into_iter().collect()),
                Err(err) => {
                    debug!("Info lookup failed for {name}: {err}");
                    Ok(Vec::new())
                }
            };
        }

        debug!(
            "Repository {} has neither search nor info endpoint",
            self.info.name
        );
        Ok(Vec::new())
    }

    async fn fetch_and_parse_cached(&self, url: &str) -> Result<Vec<RepositoryPackage>, Error> {
        let body = self.make_api_request(url, true).await?;
        parse_payload(
            &self.info,
            &self.config.parsing,
            &self.parsers,
            &body,
            None,
        )
        .await
    }

    /// Details for one package: the info endpoint first, then search.
    pub async fn get_package_details(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> Result<Option<RepositoryPackage>, Error> {
        if self.config.endpoints.info.is_some() {
            if let Some(package) = self.query_package(name, true).await {
                if version.is_none_or(|version| package.version == version) {
                    return Ok(Some(package));
                }
            }
        }

        let packages = self.search_package(name).await?;
        Ok(select_details(packages, name, version))
    }

    /// Probe the packages endpoint with a capped-timeout HEAD request.
    pub async fn is_available(&self) -> bool {
        let url = resolve_template(&self.info, &self.config.endpoints.packages);
        if check_scheme(&self.info.name, &url).is_err() {
            return false;
        }
        let Ok(client) = self.client().await else {
            return false;
        };
        let timeout = Duration::from_secs(self.config.limits.timeout_seconds)
            .min(AVAILABILITY_TIMEOUT);
        match client.head(&url).timeout(timeout).send().await {
            Ok(response) => response.status() == StatusCode::OK,
            Err(err) => {
                debug!("Repository {} is not available: {err}", self.info.name);
                self.client.reset().await;
                false
            }
        }
    }

    /// Drop the in-memory response cache.
    pub async fn clear_cache(&self) {
        self.responses.clear().await;
        info!("Cleared API cache for {}", self.info.name);
    }

    /// Release the HTTP client and the response cache.
    pub async fn close(&self) {
        self.client.reset().await;
        self.responses.clear().await;
    }
}

fn retry_delay(limits: &LimitsConfig, attempt: u32) -> Duration {
    let base = limits.retry_delay_seconds;
    let seconds = if limits.exponential_backoff {
        base.saturating_mul(2u64.saturating_pow(attempt))
    } else {
        base
    };
    Duration::from_secs(seconds)
}
