//! The bulk downloader: one request fetches the whole package index, which
//! is decompressed and handed to the configured parser.

use std::sync::Arc;
use std::time::Duration;

use jiff::SignedDuration;
use reqwest::StatusCode;
use reqwest::header::CONTENT_ENCODING;
use reqwest_middleware::ClientWithMiddleware;
use tracing::{debug, info};

use quarry_parse::ParserRegistry;
use quarry_types::{RepositoryConfig, RepositoryInfo, RepositoryPackage};

use crate::Error;
use crate::base::{
    LazyClient, build_raw_client, check_scheme, filter_matches, identity_digest, resolve_query,
    resolve_template, select_details, with_retries,
};
use crate::payload::parse_payload;

/// Ceiling for availability probes, independent of the configured request
/// timeout.
const AVAILABILITY_TIMEOUT: Duration = Duration::from_secs(10);

pub struct BulkDownloader {
    info: RepositoryInfo,
    config: RepositoryConfig,
    parsers: Arc<ParserRegistry>,
    cache_key: String,
    client: LazyClient<ClientWithMiddleware>,
}

impl std::fmt::Debug for BulkDownloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkDownloader")
            .field("repository", &self.info.name)
            .finish_non_exhaustive()
    }
}

impl BulkDownloader {
    pub fn new(config: RepositoryConfig, parsers: Arc<ParserRegistry>) -> Self {
        let info = config.to_info();
        let cache_key = identity_digest(&info);
        Self {
            info,
            config,
            parsers,
            cache_key,
            client: LazyClient::new(),
        }
    }

    pub fn info(&self) -> &RepositoryInfo {
        &self.info
    }

    /// Stable identity digest used as the persistent-cache key.
    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }

    pub fn cache_ttl(&self) -> SignedDuration {
        SignedDuration::from_hours(i64::try_from(self.config.cache.ttl_hours).unwrap_or(24))
    }

    async fn client(&self) -> Result<ClientWithMiddleware, Error> {
        let repository = self.info.name.clone();
        let config = &self.config;
        self.client
            .get_or_build(|| {
                Ok(with_retries(
                    build_raw_client(&repository, config)?,
                    config.limits.max_retries,
                ))
            })
            .await
    }

    /// Download and parse the full package index.
    pub async fn download_package_list(&self) -> Result<Vec<RepositoryPackage>, Error> {
        let url = resolve_template(&self.info, &self.config.endpoints.packages);
        let result = self.fetch_and_parse(&url).await;
        match result {
            Ok(packages) => {
                info!(
                    "Downloaded {} packages from {}",
                    packages.len(),
                    self.info.name
                );
                Ok(packages)
            }
            Err(err) => {
                // Drop the pooled client so the next attempt starts clean.
                self.client.reset().await;
                Err(err)
            }
        }
    }

    async fn fetch_and_parse(&self, url: &str) -> Result<Vec<RepositoryPackage>, Error> {
        check_scheme(&self.info.name, url)?;
        let client = self.client().await?;

        debug!("Downloading from: {url}");
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|source| Error::Request {
                repository: self.info.name.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                repository: self.info.name.clone(),
                status,
                url: url.to_string(),
            });
        }

        let limit = self.config.limits.max_response_size_bytes();
        if let Some(length) = response.content_length() {
            if length > limit {
                return Err(Error::TooLarge {
                    repository: self.info.name.clone(),
                    size: length,
                    limit,
                });
            }
        }

        let content_encoding = response
            .headers()
            .get(CONTENT_ENCODING)
            .and_then(|value| value.to_str().ok())
            .map(ToString::to_string);
        let body = response.bytes().await.map_err(|source| Error::Http {
            repository: self.info.name.clone(),
            source,
        })?;
        let size = u64::try_from(body.len()).unwrap_or(u64::MAX);
        if size > limit {
            return Err(Error::TooLarge {
                repository: self.info.name.clone(),
                size,
                limit,
            });
        }

        parse_payload(
            &self.info,
            &self.config.parsing,
            &self.parsers,
            &body,
            content_encoding.as_deref(),
        )
        .await
    }

    /// Search for a package, via the search endpoint when configured,
    /// otherwise by filtering the full index.
    pub async fn search_package(&self, name: &str) -> Result<Vec<RepositoryPackage>, Error> {
        if let Some(search) = &self.config.endpoints.search {
            let url = resolve_query(search, name);
            match self.fetch_and_parse(&url).await {
                Ok(packages) => return Ok(filter_matches(packages, name)),
                Err(err) => {
                    debug!("Search endpoint failed for {name}: {err}");
                    self.client.reset().await;
                }
            }
        }

        let packages = self.download_package_list().await?;
        Ok(filter_matches(packages, name))
    }

    /// Details for one package, via the info endpoint when configured,
    /// otherwise through search.
    pub async fn get_package_details(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> Result<Option<RepositoryPackage>, Error> {
        if let Some(info_endpoint) = &self.config.endpoints.info {
            let mut url = resolve_query(info_endpoint, name);
            if let Some(version) = version {
                url = url.replace("{version}", version);
            }
            match self.fetch_and_parse(&url).await {
                Ok(packages) => return Ok(select_details(packages, name, version)),
                Err(err) => {
                    debug!("Info endpoint failed for {name}: {err}");
                    self.client.reset().await;
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

    /// Release the pooled HTTP client.
    pub async fn close(&self) {
        self.client.reset().await;
    }
}
