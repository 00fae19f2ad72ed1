//! The downloader sum type: a repository is either bulk-downloaded or
//! queried per package, chosen by its configured `query_type`.

use std::sync::Arc;

use jiff::SignedDuration;

use quarry_parse::ParserRegistry;
use quarry_types::{QueryType, RepositoryConfig, RepositoryInfo, RepositoryPackage};

use crate::{ApiDownloader, BulkDownloader, Error};

#[derive(Debug)]
pub enum Downloader {
    Bulk(BulkDownloader),
    Api(ApiDownloader),
}

impl Downloader {
    /// Construct the variant matching the repository's `query_type`.
    pub fn from_config(config: RepositoryConfig, parsers: Arc<ParserRegistry>) -> Self {
        match config.query_type {
            QueryType::BulkDownload => Self::Bulk(BulkDownloader::new(config, parsers)),
            QueryType::Api => Self::Api(ApiDownloader::new(config, parsers)),
        }
    }

    pub fn info(&self) -> &RepositoryInfo {
        match self {
            Self::Bulk(bulk) => bulk.info(),
            Self::Api(api) => api.info(),
        }
    }

    /// Whether this repository is queried per package and therefore exempt
    /// from bulk cache refresh.
    pub fn is_api(&self) -> bool {
        matches!(self, Self::Api(_))
    }

    pub fn as_api(&self) -> Option<&ApiDownloader> {
        match self {
            Self::Api(api) => Some(api),
            Self::Bulk(_) => None,
        }
    }

    pub fn cache_key(&self) -> &str {
        match self {
            Self::Bulk(bulk) => bulk.cache_key(),
            Self::Api(api) => api.cache_key(),
        }
    }

    pub fn cache_ttl(&self) -> SignedDuration {
        match self {
            Self::Bulk(bulk) => bulk.cache_ttl(),
            Self::Api(api) => api.cache_ttl(),
        }
    }

    pub async fn download_package_list(&self) -> Result<Vec<RepositoryPackage>, Error> {
        match self {
            Self::Bulk(bulk) => bulk.download_package_list().await,
            Self::Api(api) => api.download_package_list().await,
        }
    }

    pub async fn search_package(&self, name: &str) -> Result<Vec<RepositoryPackage>, Error> {
        match self {
            Self::Bulk(bulk) => bulk.search_package(name).await,
            Self::Api(api) => api.search_package(name).await,
        }
    }

    pub async fn get_package_details(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> Result<Option<RepositoryPackage>, Error> {
        match self {
            Self::Bulk(bulk) => bulk.get_package_details(name, version).await,
            Self::Api(api) => api.get_package_details(name, version).await,
        }
    }

    pub async fn is_available(&self) -> bool {
        match self {
            Self::Bulk(bulk) => bulk.is_available().await,
            Self::Api(api) => api.is_available().await,
        }
    }

    pub async fn close(&self) {
        match self {
            Self::Bulk(bulk) => bulk.close().await,
            Self::Api(api) => api.close().await,
        }
    }
}
