//! Disk-backed TTL cache for normalized repository packages.
//!
//! Each entry is a pair of files in the cache directory: `<key>.data` holds
//! the serialized package list and `<key>.meta` a JSON sidecar with the
//! timestamps and checksum. Corruption is self-healing: any entry that fails
//! to read, parse, or verify is deleted and the next call refetches.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use jiff::{SignedDuration, Timestamp};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, warn};

use quarry_cache_key::{checksum, sanitize};
use quarry_types::RepositoryPackage;

pub use stats::{CacheStats, RepositoryCacheStats};

mod stats;

/// Version tag for the `.data` payload format, recorded in the sidecar's
/// `metadata` map. Entries with a different tag are treated as corrupt.
const DATA_FORMAT: &str = "json/1";

/// Key under which [`DATA_FORMAT`] is stored in the sidecar metadata.
const FORMAT_KEY: &str = "format";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to initialize cache directory `{}`", path.display())]
    Init {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write cache entry `{key}`")]
    Write {
        key: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode cache entry `{key}`")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid TTL for cache entry `{key}`")]
    Ttl {
        key: String,
        #[source]
        source: jiff::Error,
    },
    #[error("failed to scan cache directory `{}`", path.display())]
    Scan {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// One persisted fetch result, as returned by [`Cache::get`].
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub repository_name: String,
    pub data: Vec<RepositoryPackage>,
    pub timestamp: Timestamp,
    pub expires_at: Timestamp,
    /// SHA-256 over the canonical JSON form of `data`.
    pub checksum: String,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

/// The JSON sidecar written next to each `.data` file.
///
/// Readers tolerate forward additions to `metadata`; everything else is
/// structural and a parse failure evicts the entry.
#[derive(Debug, Serialize, Deserialize)]
struct Sidecar {
    repository_name: String,
    timestamp: Timestamp,
    expires_at: Timestamp,
    checksum: String,
    package_count: usize,
    #[serde(default)]
    metadata: BTreeMap<String, serde_json::Value>,
}

/// The persistent repository cache.
///
/// Mutations are serialized per key through an internal lock table; distinct
/// keys progress concurrently. Writes are atomic (sibling temp file plus
/// rename), so readers observe either the previous complete entry or the new
/// one, never a truncated payload.
#[derive(Debug)]
pub struct Cache {
    root: PathBuf,
    default_ttl: SignedDuration,
    locks: Mutex<FxHashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    /// Keeps a temporary cache directory alive for [`Cache::temp`].
    _temp_dir: Option<Arc<TempDir>>,
}

impl Cache {
    /// A persistent cache rooted at `root`, created if missing.
    pub fn from_path(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let root = root.into();
        fs_err::create_dir_all(&root).map_err(|err| CacheError::Init {
            path: root.clone(),
            source: err,
        })?;
        Ok(Self {
            root,
            default_ttl: SignedDuration::from_hours(24),
            locks: Mutex::new(FxHashMap::default()),
            _temp_dir: None,
        })
    }

    /// A cache in a temporary directory, removed on drop.
    pub fn temp() -> Result<Self, CacheError> {
        let temp_dir = tempfile::tempdir().map_err(|err| CacheError::Init {
            path: std::env::temp_dir(),
            source: err,
        })?;
        let mut cache = Self::from_path(temp_dir.path())?;
        cache._temp_dir = Some(Arc::new(temp_dir));
        Ok(cache)
    }

    /// Replace the default TTL applied when [`Cache::set`] is called without
    /// an explicit one.
    #[must_use]
    pub fn with_default_ttl(mut self, ttl: SignedDuration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// The cache directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn data_path(&self, sanitized: &str) -> PathBuf {
        self.root.join(format!("{sanitized}.data"))
    }

    fn meta_path(&self, sanitized: &str) -> PathBuf {
        self.root.join(format!("{sanitized}.meta"))
    }

    /// The per-key lock, creating it on first use. The outer mutex is held
    /// only for the map operation.
    fn key_lock(&self, sanitized: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            locks
                .entry(sanitized.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }

    /// Read an entry, returning `None` when missing, expired, or corrupt.
    /// Expired and corrupt entries are deleted on observation.
    pub async fn get(&self, key: &str) -> Option<CacheEntry> {
        let sanitized = sanitize(key);
        let lock = self.key_lock(&sanitized);
        let _guard = lock.lock().await;
        self.read_entry(&sanitized).await
    }

    async fn read_entry(&self, sanitized: &str) -> Option<CacheEntry> {
        let meta_path = self.meta_path(sanitized);
        let meta_bytes = match fs_err::tokio::read(&meta_path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return None,
            Err(err) => {
                warn!("Failed to read cache sidecar `{sanitized}`: {err}");
                self.remove_files(sanitized).await;
                return None;
            }
        };
        let sidecar: Sidecar = match serde_json::from_slice(&meta_bytes) {
            Ok(sidecar) => sidecar,
            Err(err) => {
                warn!("Broken cache sidecar `{sanitized}`, removing: {err}");
                self.remove_files(sanitized).await;
                return None;
            }
        };

        if Timestamp::now() > sidecar.expires_at {
            debug!("Cache entry `{sanitized}` expired, removing");
            self.remove_files(sanitized).await;
            return None;
        }

        if sidecar.metadata.get(FORMAT_KEY).and_then(|v| v.as_str()) != Some(DATA_FORMAT) {
            warn!("Cache entry `{sanitized}` has an unknown payload format, removing");
            self.remove_files(sanitized).await;
            return None;
        }

        let data_bytes = match fs_err::tokio::read(self.data_path(sanitized)).await {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!("Failed to read cache payload `{sanitized}`: {err}");
                self.remove_files(sanitized).await;
                return None;
            }
        };
        let packages: Vec<RepositoryPackage> = match serde_json::from_slice(&data_bytes) {
            Ok(packages) => packages,
            Err(err) => {
                warn!("Broken cache payload `{sanitized}`, removing: {err}");
                self.remove_files(sanitized).await;
                return None;
            }
        };

        match checksum(&packages) {
            Ok(computed) if computed == sidecar.checksum => {}
            _ => {
                warn!("Checksum mismatch for cache entry `{sanitized}`, removing");
                self.remove_files(sanitized).await;
                return None;
            }
        }

        Some(CacheEntry {
            repository_name: sidecar.repository_name,
            data: packages,
            timestamp: sidecar.timestamp,
            expires_at: sidecar.expires_at,
            checksum: sidecar.checksum,
            metadata: sidecar.metadata,
        })
    }

    /// Store an entry. Partial writes are cleaned up and surfaced as
    /// [`CacheError`]; the files are created with owner-only permissions.
    pub async fn set(
        &self,
        key: &str,
        packages: &[RepositoryPackage],
        repository_name: &str,
        ttl: Option<SignedDuration>,
        metadata: BTreeMap<String, serde_json::Value>,
    ) -> Result<(), CacheError> {
        let sanitized = sanitize(key);
        let lock = self.key_lock(&sanitized);
        let _guard = lock.lock().await;

        let now = Timestamp::now();
        let ttl = ttl.unwrap_or(self.default_ttl);
        let expires_at = now.checked_add(ttl).map_err(|err| CacheError::Ttl {
            key: sanitized.clone(),
            source: err,
        })?;

        let checksum = checksum(&packages).map_err(|err| CacheError::Encode {
            key: sanitized.clone(),
            source: err,
        })?;
        let mut metadata = metadata;
        metadata.insert(
            FORMAT_KEY.to_string(),
            serde_json::Value::String(DATA_FORMAT.to_string()),
        );
        let sidecar = Sidecar {
            repository_name: repository_name.to_string(),
            timestamp: now,
            expires_at,
            checksum,
            package_count: packages.len(),
            metadata,
        };

        let data_bytes = serde_json::to_vec(packages).map_err(|err| CacheError::Encode {
            key: sanitized.clone(),
            source: err,
        })?;
        let meta_bytes = serde_json::to_vec(&sidecar).map_err(|err| CacheError::Encode {
            key: sanitized.clone(),
            source: err,
        })?;

        let result = async {
            write_atomic(&self.data_path(&sanitized), &data_bytes).await?;
            write_atomic(&self.meta_path(&sanitized), &meta_bytes).await
        }
        .await;
        if let Err(err) = result {
            self.remove_files(&sanitized).await;
            return Err(CacheError::Write {
                key: sanitized,
                source: err,
            });
        }
        Ok(())
    }

    /// Delete an entry. Returns whether a payload file was removed.
    pub async fn invalidate(&self, key: &str) -> bool {
        let sanitized = sanitize(key);
        let lock = self.key_lock(&sanitized);
        let _guard = lock.lock().await;
        self.remove_files(&sanitized).await
    }

    /// Delete every entry belonging to `repository_name`. Returns the number
    /// of entries removed.
    pub async fn invalidate_repository(&self, repository_name: &str) -> Result<usize, CacheError> {
        let mut removed = 0;
        for (stem, sidecar) in self.scan().await? {
            if sidecar.repository_name == repository_name && self.invalidate(&stem).await {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Delete every expired entry; unreadable sidecars count as expired.
    /// Returns the number of entries removed.
    pub async fn cleanup_expired(&self) -> Result<usize, CacheError> {
        let now = Timestamp::now();
        let mut removed = 0;
        for entry in self.meta_files().await? {
            let Some(stem) = file_stem(&entry) else {
                continue;
            };
            let expired = match fs_err::tokio::read(&entry).await {
                Ok(bytes) => match serde_json::from_slice::<Sidecar>(&bytes) {
                    Ok(sidecar) => now > sidecar.expires_at,
                    // Corrupt sidecar: remove it along with its payload.
                    Err(_) => true,
                },
                Err(_) => true,
            };
            if expired && self.invalidate(&stem).await {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Delete every entry. Returns the number of entries removed.
    pub async fn clear_all(&self) -> Result<usize, CacheError> {
        let mut removed = 0;
        for entry in self.files_with_extension("data").await? {
            if fs_err::tokio::remove_file(&entry).await.is_ok() {
                removed += 1;
            }
        }
        for entry in self.meta_files().await? {
            let _ = fs_err::tokio::remove_file(&entry).await;
        }
        Ok(removed)
    }

    /// Whether a fresh entry exists for `key`.
    pub async fn contains(&self, key: &str) -> bool {
        self.get(key).await.is_some()
    }

    /// All fresh cached packages for one repository.
    pub async fn packages_for_repository(
        &self,
        repository_name: &str,
    ) -> Result<Vec<RepositoryPackage>, CacheError> {
        let now = Timestamp::now();
        let mut packages = Vec::new();
        for (stem, sidecar) in self.scan().await? {
            if sidecar.repository_name != repository_name || now > sidecar.expires_at {
                continue;
            }
            if let Some(entry) = self.get(&stem).await {
                packages.extend(entry.data);
            }
        }
        Ok(packages)
    }

    /// Sorted names of repositories with at least one fresh entry.
    pub async fn cached_repositories(&self) -> Result<Vec<String>, CacheError> {
        let now = Timestamp::now();
        let mut names = std::collections::BTreeSet::new();
        for (_, sidecar) in self.scan().await? {
            if now <= sidecar.expires_at {
                names.insert(sidecar.repository_name);
            }
        }
        Ok(names.into_iter().collect())
    }

    /// Aggregate statistics over every entry on disk.
    pub async fn stats(&self) -> Result<CacheStats, CacheError> {
        let now = Timestamp::now();
        let mut stats = CacheStats::default();
        for (stem, sidecar) in self.scan().await? {
            let expired = now > sidecar.expires_at;
            stats.record(&sidecar.repository_name, sidecar.package_count, expired);
            if let Ok(meta) = fs_err::tokio::metadata(self.data_path(&stem)).await {
                stats.total_size_bytes += meta.len();
            }
            stats.observe_timestamp(sidecar.timestamp);
        }
        Ok(stats)
    }

    /// Parse every readable sidecar in the cache directory, yielding the
    /// filename stem (the sanitized key) alongside it.
    async fn scan(&self) -> Result<Vec<(String, Sidecar)>, CacheError> {
        let mut sidecars = Vec::new();
        for entry in self.meta_files().await? {
            let Some(stem) = file_stem(&entry) else {
                continue;
            };
            let Ok(bytes) = fs_err::tokio::read(&entry).await else {
                continue;
            };
            let Ok(sidecar) = serde_json::from_slice::<Sidecar>(&bytes) else {
                continue;
            };
            sidecars.push((stem, sidecar));
        }
        Ok(sidecars)
    }

    async fn meta_files(&self) -> Result<Vec<PathBuf>, CacheError> {
        self.files_with_extension("meta").await
    }

    async fn files_with_extension(&self, extension: &str) -> Result<Vec<PathBuf>, CacheError> {
        let mut read_dir =
            fs_err::tokio::read_dir(&self.root)
                .await
                .map_err(|err| CacheError::Scan {
                    path: self.root.clone(),
                    source: err,
                })?;
        let mut files = Vec::new();
        while let Ok(Some(entry)) = read_dir.next_entry().await {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == extension) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Remove both files for a sanitized key. Returns whether the payload
    /// file existed.
    async fn remove_files(&self, sanitized: &str) -> bool {
        let removed = fs_err::tokio::remove_file(self.data_path(sanitized))
            .await
            .is_ok();
        let _ = fs_err::tokio::remove_file(self.meta_path(sanitized)).await;
        removed
    }
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem().map(|s| s.to_string_lossy().into_owned())
}

/// Write a file all-or-nothing: the bytes land in a sibling temp file which
/// is renamed over the target. Permissions are set to owner-only before the
/// rename so the final file never widens.
async fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_extension(format!("{extension}.tmp"));
    let result = async {
        fs_err::tokio::write(&tmp, data).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs_err::tokio::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600)).await?;
        }
        fs_err::tokio::rename(&tmp, path).await
    }
    .await;
    if result.is_err() {
        let _ = fs_err::tokio::remove_file(&tmp).await;
    }
    result
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use quarry_types::Platform;

    fn package(name: &str, version: &str, repository: &str) -> RepositoryPackage {
        RepositoryPackage::new(name, version, repository, Platform::Linux)
    }

    fn packages(repository: &str) -> Vec<RepositoryPackage> {
        vec![
            package("nginx", "1.24.0-1", repository),
            package("curl", "7.88.1-1", repository),
        ]
    }

    #[tokio::test]
    async fn set_then_get_round_trips() -> anyhow::Result<()> {
        let cache = Cache::temp()?;
        let input = packages("apt-test");
        cache
            .set("abc123", &input, "apt-test", None, BTreeMap::new())
            .await?;

        let entry = cache.get("abc123").await.expect("entry should be fresh");
        assert_eq!(entry.data, input);
        assert_eq!(entry.repository_name, "apt-test");
        assert_eq!(entry.checksum, checksum(&entry.data)?);
        assert!(entry.expires_at > entry.timestamp);
        Ok(())
    }

    #[tokio::test]
    async fn expired_entry_is_evicted_with_its_files() -> anyhow::Result<()> {
        let cache = Cache::temp()?;
        cache
            .set(
                "short",
                &packages("r"),
                "r",
                Some(SignedDuration::from_millis(50)),
                BTreeMap::new(),
            )
            .await?;
        tokio::time::sleep(Duration::from_millis(120)).await;

        assert!(cache.get("short").await.is_none());
        assert!(!cache.root().join("short.data").exists());
        assert!(!cache.root().join("short.meta").exists());
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_sidecar_is_self_healing() -> anyhow::Result<()> {
        let cache = Cache::temp()?;
        cache
            .set("bad", &packages("r"), "r", None, BTreeMap::new())
            .await?;
        fs_err::write(cache.root().join("bad.meta"), b"{ not json")?;

        assert!(cache.get("bad").await.is_none());
        assert!(!cache.root().join("bad.data").exists());
        assert!(!cache.root().join("bad.meta").exists());
        Ok(())
    }

    #[tokio::test]
    async fn checksum_mismatch_is_treated_as_corruption() -> anyhow::Result<()> {
        let cache = Cache::temp()?;
        cache
            .set("tampered", &packages("r"), "r", None, BTreeMap::new())
            .await?;
        // Valid JSON, but not the payload the checksum was computed over.
        let other = serde_json::to_vec(&vec![package("rogue", "0.1", "r")])?;
        fs_err::write(cache.root().join("tampered.data"), other)?;

        assert!(cache.get("tampered").await.is_none());
        assert!(!cache.root().join("tampered.data").exists());
        Ok(())
    }

    #[tokio::test]
    async fn distinct_sanitized_keys_are_independent() -> anyhow::Result<()> {
        let cache = Cache::temp()?;
        let first = vec![package("one", "1.0", "r")];
        let second = vec![package("two", "2.0", "r")];
        cache.set("a-key", &first, "r", None, BTreeMap::new()).await?;
        cache
            .set("a_key", &second, "r", None, BTreeMap::new())
            .await?;

        assert_eq!(cache.get("a-key").await.unwrap().data, first);
        assert_eq!(cache.get("a_key").await.unwrap().data, second);
        Ok(())
    }

    #[tokio::test]
    async fn traversal_keys_stay_inside_the_cache_directory() -> anyhow::Result<()> {
        let cache = Cache::temp()?;
        cache
            .set("../../escape", &packages("r"), "r", None, BTreeMap::new())
            .await?;

        // The entry is reachable through the same raw key and lives in the
        // cache root under its sanitized name.
        assert!(cache.get("../../escape").await.is_some());
        assert!(cache.root().join("______escape.data").exists());
        assert!(!cache.root().parent().unwrap().join("escape.data").exists());
        Ok(())
    }

    #[tokio::test]
    async fn invalidate_repository_removes_only_matching_entries() -> anyhow::Result<()> {
        let cache = Cache::temp()?;
        cache
            .set("k1", &packages("apt"), "apt", None, BTreeMap::new())
            .await?;
        cache
            .set("k2", &packages("apt"), "apt", None, BTreeMap::new())
            .await?;
        cache
            .set("k3", &packages("brew"), "brew", None, BTreeMap::new())
            .await?;

        assert_eq!(cache.invalidate_repository("apt").await?, 2);
        assert!(cache.get("k1").await.is_none());
        assert!(cache.get("k3").await.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn cleanup_removes_expired_and_corrupt_entries() -> anyhow::Result<()> {
        let cache = Cache::temp()?;
        cache
            .set(
                "stale",
                &packages("r"),
                "r",
                Some(SignedDuration::from_millis(10)),
                BTreeMap::new(),
            )
            .await?;
        cache
            .set("fresh", &packages("r"), "r", None, BTreeMap::new())
            .await?;
        cache
            .set("broken", &packages("r"), "r", None, BTreeMap::new())
            .await?;
        fs_err::write(cache.root().join("broken.meta"), b"???")?;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(cache.cleanup_expired().await?, 2);
        assert!(cache.get("fresh").await.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn clear_all_counts_entries() -> anyhow::Result<()> {
        let cache = Cache::temp()?;
        cache
            .set("k1", &packages("r"), "r", None, BTreeMap::new())
            .await?;
        cache
            .set("k2", &packages("r"), "r", None, BTreeMap::new())
            .await?;

        assert_eq!(cache.clear_all().await?, 2);
        assert_eq!(cache.stats().await?.total_entries, 0);
        Ok(())
    }

    #[tokio::test]
    async fn stats_report_totals_and_per_repository_counts() -> anyhow::Result<()> {
        let cache = Cache::temp()?;
        cache
            .set("k1", &packages("apt"), "apt", None, BTreeMap::new())
            .await?;
        cache
            .set(
                "k2",
                &[package("jq", "1.7", "brew")],
                "brew",
                None,
                BTreeMap::new(),
            )
            .await?;

        let stats = cache.stats().await?;
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.expired_entries, 0);
        assert_eq!(stats.total_packages, 3);
        assert!(stats.total_size_bytes > 0);
        assert_eq!(stats.repositories["apt"].packages, 2);
        assert_eq!(stats.repositories["brew"].entries, 1);
        assert!(stats.oldest_entry.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn repository_helpers_see_only_fresh_entries() -> anyhow::Result<()> {
        let cache = Cache::temp()?;
        cache
            .set("k1", &packages("apt"), "apt", None, BTreeMap::new())
            .await?;
        cache
            .set(
                "k2",
                &packages("dnf"),
                "dnf",
                Some(SignedDuration::from_millis(10)),
                BTreeMap::new(),
            )
            .await?;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(cache.contains("k1").await);
        assert!(!cache.contains("k2").await);
        assert_eq!(cache.cached_repositories().await?, vec!["apt".to_string()]);
        assert_eq!(cache.packages_for_repository("apt").await?.len(), 2);
        assert!(cache.packages_for_repository("dnf").await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_writers_never_expose_partial_state() -> anyhow::Result<()> {
        let cache = Arc::new(Cache::temp()?);
        let first = vec![package("one", "1.0", "r")];
        let second: Vec<_> = (0..100)
            .map(|i| package(&format!("pkg-{i}"), "2.0", "r"))
            .collect();

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let cache_a = Arc::clone(&cache);
            let data = first.clone();
            tasks.push(tokio::spawn(async move {
                cache_a.set("contended", &data, "r", None, BTreeMap::new()).await
            }));
            let cache_b = Arc::clone(&cache);
            let data = second.clone();
            tasks.push(tokio::spawn(async move {
                cache_b.set("contended", &data, "r", None, BTreeMap::new()).await
            }));
        }
        for task in tasks {
            task.await??;
        }

        let entry = cache.get("contended").await.expect("entry should exist");
        assert!(entry.data == first || entry.data == second);
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn cache_files_are_owner_only() -> anyhow::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let cache = Cache::temp()?;
        cache
            .set("perms", &packages("r"), "r", None, BTreeMap::new())
            .await?;

        for name in ["perms.data", "perms.meta"] {
            let mode = fs_err::metadata(cache.root().join(name))?
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o600, "{name} should be owner-only");
        }
        Ok(())
    }
}
