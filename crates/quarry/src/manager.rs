//! The repository manager: owns the configuration, the downloaders, and the
//! persistent cache, and fans queries out across enabled repositories.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use indexmap::IndexMap;
use jiff::Timestamp;
use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use quarry_cache::{Cache, CacheStats};
use quarry_client::Downloader;
use quarry_parse::ParserRegistry;
use quarry_types::{
    Platform, RepositoryConfig, RepositoryInfo, RepositoryPackage, SearchResult,
};

use crate::Error;
use crate::codename;

/// Ceiling on per-repository availability probes during initialization.
const AVAILABILITY_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Repository selection filters for search.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub platform: Option<Platform>,
    pub repository_type: Option<String>,
    /// Search only these repositories, bypassing the other filters.
    pub repositories: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ManagerStatistics {
    pub total_repositories: usize,
    pub enabled_repositories: usize,
    pub supported_platforms: Vec<Platform>,
    pub supported_types: Vec<String>,
    pub last_loaded: Option<Timestamp>,
    pub cache: CacheStats,
}

/// Aggregation layer over every configured repository.
///
/// Single-target calls (`get_packages`, `query_package`) surface their
/// repository's error; fan-out calls (`get_all_packages`, `search_packages`,
/// `update_cache`) absorb individual failures and never fail as a whole
/// because one repository is broken.
pub struct RepositoryManager {
    cache: Cache,
    config_dirs: Vec<PathBuf>,
    parsers: Arc<ParserRegistry>,
    configs: FxHashMap<String, RepositoryConfig>,
    downloaders: FxHashMap<String, Arc<Downloader>>,
    last_loaded: Option<Timestamp>,
    initialized: bool,
}

impl RepositoryManager {
    /// A manager caching under `cache_dir` and reading configuration from
    /// `config_dirs`. Call [`RepositoryManager::initialize`] before use.
    pub fn new(
        cache_dir: impl Into<PathBuf>,
        config_dirs: Vec<PathBuf>,
    ) -> Result<Self, Error> {
        Ok(Self::with_cache(Cache::from_path(cache_dir)?, config_dirs))
    }

    /// A manager over an existing [`Cache`].
    pub fn with_cache(cache: Cache, config_dirs: Vec<PathBuf>) -> Self {
        Self {
            cache,
            config_dirs,
            parsers: Arc::new(ParserRegistry::new()),
            configs: FxHashMap::default(),
            downloaders: FxHashMap::default(),
            last_loaded: None,
            initialized: false,
        }
    }

    /// Load every configuration directory and construct downloaders for the
    /// enabled repositories. Idempotent; malformed entries are logged and
    /// skipped by the loader rather than failing initialization.
    pub async fn initialize(&mut self) -> Result<(), Error> {
        if self.initialized {
            return Ok(());
        }
        info!("Initializing repository manager");
        self.load_configurations();
        self.build_downloaders().await;
        self.initialized = true;
        info!(
            "Repository manager initialized with {} repositories",
            self.downloaders.len()
        );
        Ok(())
    }

    /// Drop all state and re-load the configuration directories.
    pub async fn reload(&mut self) -> Result<(), Error> {
        info!("Reloading repository configurations");
        self.close().await;
        self.downloaders.clear();
        self.configs.clear();
        self.initialized = false;
        self.initialize().await
    }

    fn load_configurations(&mut self) {
        self.configs = quarry_config::load_repository_configs(&self.config_dirs)
            .into_iter()
            .map(|config| (config.name.clone(), config))
            .collect();
        self.last_loaded = Some(Timestamp::now());
    }

    async fn build_downloaders(&mut self) {
        let enabled: Vec<RepositoryConfig> = self
            .configs
            .values()
            .filter(|config| config.metadata.enabled)
            .cloned()
            .collect();
        for config in enabled {
            let name = config.name.clone();
            if let Some(downloader) = self.construct_downloader(config).await {
                debug!("Initialized downloader for {name}");
                self.downloaders.insert(name, downloader);
            }
        }
    }

    /// Build a downloader, probing availability first when the repository
    /// asks for it. Unavailable repositories are omitted with a warning.
    async fn construct_downloader(&self, config: RepositoryConfig) -> Option<Arc<Downloader>> {
        let name = config.name.clone();
        let probe = config.metadata.test_availability;
        let downloader = Arc::new(Downloader::from_config(
            config,
            Arc::clone(&self.parsers),
        ));
        if probe {
            match tokio::time::timeout(AVAILABILITY_PROBE_TIMEOUT, downloader.is_available()).await
            {
                Ok(true) => {}
                Ok(false) => {
                    warn!("Repository {name} is not available");
                    return None;
                }
                Err(_) => {
                    warn!("Repository {name} availability check timed out");
                    return None;
                }
            }
        }
        Some(downloader)
    }

    fn downloader(&self, name: &str) -> Result<&Arc<Downloader>, Error> {
        self.downloaders
            .get(name)
            .ok_or_else(|| Error::UnknownRepository(name.to_string()))
    }

    /// Downloaders matching the filters, in priority-descending order with
    /// name as the deterministic tie-break.
    fn selected(&self, platform: Option<Platform>, kind: Option<&str>) -> Vec<&Arc<Downloader>> {
        let mut selected: Vec<&Arc<Downloader>> = self
            .downloaders
            .values()
            .filter(|downloader| {
                let info = downloader.info();
                platform.is_none_or(|platform| info.platform.matches(platform))
                    && kind.is_none_or(|kind| info.kind == kind)
            })
            .collect();
        sort_by_priority(&mut selected);
        selected
    }

    /// Serve a repository from the persistent cache, fetching and storing on
    /// a miss. API repositories are never bulk-fetched through this path:
    /// they yield an empty list.
    async fn cached_packages(
        &self,
        downloader: &Downloader,
    ) -> Result<Vec<RepositoryPackage>, Error> {
        let key = downloader.cache_key();
        if let Some(entry) = self.cache.get(key).await {
            return Ok(entry.data);
        }
        if downloader.is_api() {
            debug!(
                "Skipping bulk fetch for API repository {}; use query_package instead",
                downloader.info().name
            );
            return Ok(Vec::new());
        }

        let packages = downloader.download_package_list().await?;
        self.cache
            .set(
                key,
                &packages,
                &downloader.info().name,
                Some(downloader.cache_ttl()),
                BTreeMap::new(),
            )
            .await?;
        Ok(packages)
    }

    /// Packages from one repository, optionally through the persistent
    /// cache.
    pub async fn get_packages(
        &self,
        repository: &str,
        use_cache: bool,
    ) -> Result<Vec<RepositoryPackage>, Error> {
        let downloader = self.downloader(repository)?;
        if use_cache {
            self.cached_packages(downloader).await
        } else {
            Ok(downloader.download_package_list().await?)
        }
    }

    /// Packages from every matching bulk repository, fetched concurrently.
    /// API repositories are skipped; a failing repository contributes an
    /// empty list and an error log, never a failure of the whole call.
    pub async fn get_all_packages(
        &self,
        platform: Option<Platform>,
        repository_type: Option<&str>,
        use_cache: bool,
    ) -> FxHashMap<String, Vec<RepositoryPackage>> {
        let selected: Vec<&Arc<Downloader>> = self
            .selected(platform, repository_type)
            .into_iter()
            .filter(|downloader| {
                if downloader.is_api() {
                    debug!(
                        "Skipping API repository {} (use query_package instead)",
                        downloader.info().name
                    );
                    false
                } else {
                    true
                }
            })
            .collect();

        let tasks = selected.into_iter().map(|downloader| async move {
            let name = downloader.info().name.clone();
            let result = if use_cache {
                self.cached_packages(downloader).await
            } else {
                downloader
                    .download_package_list()
                    .await
                    .map_err(Error::from)
            };
            match result {
                Ok(packages) => {
                    debug!("Retrieved {} packages from {name}", packages.len());
                    (name, packages)
                }
                Err(err) => {
                    error!("Failed to get packages from {name}: {err}");
                    (name, Vec::new())
                }
            }
        });
        join_all(tasks).await.into_iter().collect()
    }

    /// Search selected repositories concurrently and aggregate the matches
    /// in priority order. Per-repository failures are logged and skipped.
    pub async fn search_packages(
        &self,
        query: &str,
        filters: &SearchFilters,
        limit: Option<usize>,
    ) -> SearchResult {
        let started = std::time::Instant::now();

        let selected: Vec<&Arc<Downloader>> = match &filters.repositories {
            Some(names) => {
                let mut selected: Vec<&Arc<Downloader>> = names
                    .iter()
                    .filter_map(|name| self.downloaders.get(name))
                    .collect();
                sort_by_priority(&mut selected);
                selected
            }
            None => self.selected(filters.platform, filters.repository_type.as_deref()),
        };

        let tasks = selected.into_iter().map(|downloader| async move {
            (
                downloader.info().name.clone(),
                downloader.search_package(query).await,
            )
        });

        let mut packages = Vec::new();
        let mut repository_sources = Vec::new();
        for (name, result) in join_all(tasks).await {
            match result {
                Ok(mut matches) if !matches.is_empty() => {
                    if let Some(limit) = limit {
                        matches.truncate(limit);
                    }
                    debug!("Found {} matches in {name}", matches.len());
                    repository_sources.push(name);
                    packages.extend(matches);
                }
                Ok(_) => {}
                Err(err) => error!("Search failed in {name}: {err}"),
            }
        }
        if let Some(limit) = limit {
            packages.truncate(limit);
        }

        SearchResult {
            query: query.to_string(),
            total_results: packages.len(),
            packages,
            search_time_seconds: started.elapsed().as_secs_f64(),
            repository_sources,
        }
    }

    /// First matching package across repositories in descending priority.
    pub async fn get_package_details(
        &self,
        name: &str,
        version: Option<&str>,
        platform: Option<Platform>,
        repository_type: Option<&str>,
    ) -> Option<RepositoryPackage> {
        for downloader in self.selected(platform, repository_type) {
            match downloader.get_package_details(name, version).await {
                Ok(Some(package)) => return Some(package),
                Ok(None) => {}
                Err(err) => debug!(
                    "Failed to get package details from {}: {err}",
                    downloader.info().name
                ),
            }
        }
        None
    }

    /// Query one package from one repository. The fast path for API
    /// repositories; bulk repositories fall back to a details lookup.
    /// Network failures are logged and resolve to `None`.
    pub async fn query_package(
        &self,
        repository: &str,
        name: &str,
        use_cache: bool,
    ) -> Result<Option<RepositoryPackage>, Error> {
        let downloader = self.downloader(repository)?;
        match downloader.as_api() {
            Some(api) => Ok(api.query_package(name, use_cache).await),
            None => match downloader.get_package_details(name, None).await {
                Ok(package) => Ok(package),
                Err(err) => {
                    error!("Failed to query package {name} from {repository}: {err}");
                    Ok(None)
                }
            },
        }
    }

    /// Query several packages from one repository. Every requested name is
    /// present in the result, in caller order.
    pub async fn query_batch(
        &self,
        repository: &str,
        names: &[String],
        use_cache: bool,
    ) -> Result<IndexMap<String, Option<RepositoryPackage>>, Error> {
        let downloader = self.downloader(repository)?;
        if let Some(api) = downloader.as_api() {
            return Ok(api.query_batch(names, use_cache).await);
        }

        let mut results = IndexMap::new();
        for name in names {
            let package = match downloader.get_package_details(name, None).await {
                Ok(package) => package,
                Err(err) => {
                    debug!("Failed to query package {name}: {err}");
                    None
                }
            };
            results.insert(name.clone(), package);
        }
        Ok(results)
    }

    /// Refresh the persistent cache for the named (or all) repositories,
    /// concurrently. The result maps each repository to whether its cache
    /// was refreshed; API repositories are always `false` and never
    /// bulk-fetched, as are repositories whose refresh failed.
    pub async fn update_cache(
        &self,
        repositories: Option<&[String]>,
        force: bool,
    ) -> FxHashMap<String, bool> {
        let selected: Vec<&Arc<Downloader>> = match repositories {
            Some(names) => names
                .iter()
                .filter_map(|name| self.downloaders.get(name))
                .collect(),
            None => self.downloaders.values().collect(),
        };

        let tasks = selected.into_iter().map(|downloader| async move {
            (
                downloader.info().name.clone(),
                self.refresh_repository(downloader, force).await,
            )
        });
        join_all(tasks).await.into_iter().collect()
    }

    async fn refresh_repository(&self, downloader: &Downloader, force: bool) -> bool {
        if downloader.is_api() {
            debug!(
                "Skipping cache update for API repository {}; it is queried on demand",
                downloader.info().name
            );
            return false;
        }

        let key = downloader.cache_key();
        if !force && self.cache.get(key).await.is_some() {
            return false;
        }

        self.cache.invalidate(key).await;
        match self.cached_packages(downloader).await {
            Ok(_) => true,
            Err(err) => {
                warn!(
                    "Failed to refresh cache for {}: {err}",
                    downloader.info().name
                );
                false
            }
        }
    }

    /// Resolve `(provider, os, version)` to a repository name using the
    /// loaded `version_mapping` tables; falls back to the provider name.
    /// Selecting an EOL repository logs an informational line.
    pub fn resolve_repository_name(
        &self,
        provider: &str,
        os: Option<&str>,
        version: Option<&str>,
    ) -> String {
        let resolved = codename::resolve_repository_name(
            provider,
            os,
            version,
            self.downloaders.values().map(|downloader| downloader.info()),
        );
        if let Some(downloader) = self.downloaders.get(&resolved) {
            if downloader.info().eol {
                info!(
                    "Using EOL (end-of-life) repository: {resolved} for {} {}",
                    os.unwrap_or_default(),
                    version.unwrap_or_default()
                );
            }
        }
        resolved
    }

    /// The codename a repository maps an OS version to.
    pub fn resolve_codename(&self, repository: &str, version: &str) -> Option<String> {
        let Some(info) = self.repository_info(repository) else {
            warn!("Repository {repository} not found");
            return None;
        };
        codename::resolve_codename(info, version)
    }

    pub fn has_repository(&self, repository: &str) -> bool {
        self.downloaders.contains_key(repository)
    }

    pub fn repository_info(&self, repository: &str) -> Option<&RepositoryInfo> {
        self.downloaders
            .get(repository)
            .map(|downloader| downloader.info())
    }

    /// Info for every available repository matching the filters, in
    /// priority-descending order.
    pub fn all_repository_info(
        &self,
        platform: Option<Platform>,
        repository_type: Option<&str>,
    ) -> Vec<&RepositoryInfo> {
        self.selected(platform, repository_type)
            .into_iter()
            .map(|downloader| downloader.info())
            .collect()
    }

    pub fn supported_platforms(&self) -> Vec<Platform> {
        let platforms: BTreeSet<Platform> = self
            .configs
            .values()
            .map(|config| config.platform)
            .collect();
        platforms.into_iter().collect()
    }

    pub fn supported_types(&self) -> Vec<String> {
        let kinds: BTreeSet<String> = self
            .configs
            .values()
            .map(|config| config.kind.clone())
            .collect();
        kinds.into_iter().collect()
    }

    /// The `version_mapping` tables of every available repository that has
    /// one, optionally filtered by provider type.
    pub fn version_mappings(
        &self,
        provider: Option<&str>,
    ) -> BTreeMap<String, BTreeMap<String, String>> {
        self.downloaders
            .values()
            .map(|downloader| downloader.info())
            .filter(|info| provider.is_none_or(|provider| info.kind == provider))
            .filter(|info| !info.version_mapping.is_empty())
            .map(|info| (info.name.clone(), info.version_mapping.clone()))
            .collect()
    }

    /// Add (or replace) a repository at runtime. Returns whether a
    /// downloader is now available for it.
    pub async fn add_repository(&mut self, config: RepositoryConfig) -> Result<bool, Error> {
        quarry_config::validate_repository(&config)?;
        let name = config.name.clone();
        self.configs.insert(name.clone(), config.clone());

        if !config.metadata.enabled {
            return Ok(false);
        }
        match self.construct_downloader(config).await {
            Some(downloader) => {
                self.downloaders.insert(name.clone(), downloader);
                info!("Added repository {name}");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Remove a repository and invalidate its cache entries.
    pub async fn remove_repository(&mut self, repository: &str) -> Result<bool, Error> {
        if let Some(downloader) = self.downloaders.remove(repository) {
            downloader.close().await;
        }
        self.configs.remove(repository);
        let invalidated = self.cache.invalidate_repository(repository).await?;
        info!("Removed repository {repository} ({invalidated} cache entries invalidated)");
        Ok(true)
    }

    /// Manager and cache statistics.
    pub async fn statistics(&self) -> Result<ManagerStatistics, Error> {
        Ok(ManagerStatistics {
            total_repositories: self.configs.len(),
            enabled_repositories: self.downloaders.len(),
            supported_platforms: self.supported_platforms(),
            supported_types: self.supported_types(),
            last_loaded: self.last_loaded,
            cache: self.cache.stats().await?,
        })
    }

    /// The underlying persistent cache.
    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Drop expired persistent-cache entries, returning how many were
    /// removed.
    pub async fn cache_maintenance(&self) -> Result<usize, Error> {
        Ok(self.cache.cleanup_expired().await?)
    }

    /// Release every downloader's HTTP client and in-memory cache. No
    /// persistent state is flushed; the manager can keep being used and
    /// will reconstruct clients lazily.
    pub async fn close(&self) {
        for downloader in self.downloaders.values() {
            downloader.close().await;
        }
    }
}

fn sort_by_priority(downloaders: &mut [&Arc<Downloader>]) {
    downloaders.sort_by(|a, b| {
        b.info()
            .priority
            .cmp(&a.info().priority)
            .then_with(|| a.info().name.cmp(&b.info().name))
    });
}
