//! Plumbing shared by both downloader variants: client construction, URL
//! templating, and match helpers.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use reqwest_middleware::ClientWithMiddleware;
use reqwest_retry::RetryTransientMiddleware;
use reqwest_retry::policies::ExponentialBackoff;

use quarry_types::{AuthType, RepositoryConfig, RepositoryInfo, RepositoryPackage};

use crate::Error;

pub(crate) fn user_agent() -> String {
    format!("quarry/{}", env!("CARGO_PKG_VERSION"))
}

/// A pooled HTTP client built lazily on first use and dropped on error
/// paths, so the next request reconstructs the connection pool instead of
/// reusing a possibly-wedged one.
#[derive(Debug)]
pub(crate) struct LazyClient<T> {
    slot: tokio::sync::Mutex<Option<T>>,
}

impl<T: Clone> LazyClient<T> {
    pub(crate) fn new() -> Self {
        Self {
            slot: tokio::sync::Mutex::new(None),
        }
    }

    pub(crate) async fn get_or_build(
        &self,
        build: impl FnOnce() -> Result<T, Error>,
    ) -> Result<T, Error> {
        let mut slot = self.slot.lock().await;
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }
        let client = build()?;
        *slot = Some(client.clone());
        Ok(client)
    }

    /// Drop the pooled client; the next call rebuilds it.
    pub(crate) async fn reset(&self) {
        *self.slot.lock().await = None;
    }
}

/// Build the pooled client for one repository: user agent, request timeout,
/// verified TLS, and any configured authentication header (marked sensitive
/// so it never shows up in logs).
pub(crate) fn build_raw_client(
    repository: &str,
    config: &RepositoryConfig,
) -> Result<reqwest::Client, Error> {
    let auth_error = || Error::AuthHeader {
        repository: repository.to_string(),
    };

    let mut headers = HeaderMap::new();
    match config.auth.kind {
        AuthType::None => {}
        AuthType::Bearer => {
            if let Some(token) = &config.auth.token {
                let mut value =
                    HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| auth_error())?;
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
        }
        AuthType::ApiKey => {
            if let Some(api_key) = &config.auth.api_key {
                let name = config.auth.api_key_header.as_deref().unwrap_or("X-API-Key");
                let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| auth_error())?;
                let mut value = HeaderValue::from_str(api_key).map_err(|_| auth_error())?;
                value.set_sensitive(true);
                headers.insert(name, value);
            }
        }
    }

    reqwest::Client::builder()
        .user_agent(user_agent())
        .default_headers(headers)
        .pool_max_idle_per_host(config.limits.concurrent_requests.max(1))
        .timeout(Duration::from_secs(config.limits.timeout_seconds))
        .build()
        .map_err(|source| Error::Build {
            repository: repository.to_string(),
            source,
        })
}

/// Wrap a client with the transient-failure retry middleware used on the
/// bulk path.
pub(crate) fn with_retries(client: reqwest::Client, max_retries: u32) -> ClientWithMiddleware {
    let retry_policy = ExponentialBackoff::builder().build_with_max_retries(max_retries);
    reqwest_middleware::ClientBuilder::new(client)
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build()
}

/// Only `http://` and `https://` endpoints are ever fetched.
pub(crate) fn check_scheme(repository: &str, url: &str) -> Result<(), Error> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(Error::UrlScheme {
            repository: repository.to_string(),
            url: url.to_string(),
        })
    }
}

/// Substitute `{arch}`/`{architecture}` (first configured architecture,
/// default `amd64`) and `{release}`/`{distribution}` (first configured
/// distribution) into an endpoint template.
pub(crate) fn resolve_template(info: &RepositoryInfo, template: &str) -> String {
    let arch = info
        .architecture
        .first()
        .map_or("amd64", String::as_str);
    let mut url = template
        .replace("{arch}", arch)
        .replace("{architecture}", arch);
    if let Some(release) = info.distribution.first() {
        url = url
            .replace("{release}", release)
            .replace("{distribution}", release);
    }
    url
}

/// Substitute a package name into a search or info endpoint template.
pub(crate) fn resolve_query(template: &str, package: &str) -> String {
    template
        .replace("{query}", package)
        .replace("{package}", package)
}

/// Case-insensitive containment filter over name and description, applied to
/// search results.
pub(crate) fn filter_matches(
    packages: Vec<RepositoryPackage>,
    query: &str,
) -> Vec<RepositoryPackage> {
    let query = query.to_lowercase();
    packages
        .into_iter()
        .filter(|package| {
            package.name.to_lowercase().contains(&query)
                || package
                    .description
                    .as_ref()
                    .is_some_and(|description| description.to_lowercase().contains(&query))
        })
        .collect()
}

/// Pick the best match for a details lookup: the first exact name match
/// (and exact version, when requested), else the first result.
pub(crate) fn select_details(
    packages: Vec<RepositoryPackage>,
    name: &str,
    version: Option<&str>,
) -> Option<RepositoryPackage> {
    let exact = packages.iter().position(|package| {
        package.name.eq_ignore_ascii_case(name)
            && version.is_none_or(|version| package.version == version)
    });
    match exact {
        Some(index) => packages.into_iter().nth(index),
        None => packages.into_iter().next(),
    }
}

/// The content-addressed cache key for a repository: a short digest over the
/// identity tuple `{name, type, url, platform, architecture}`.
pub(crate) fn identity_digest(info: &RepositoryInfo) -> String {
    let identity = serde_json::json!({
        "architecture": info.architecture,
        "name": info.name,
        "platform": info.platform,
        "type": info.kind,
        "url": info.url,
    });
    quarry_cache_key::digest_value(&identity)
}
