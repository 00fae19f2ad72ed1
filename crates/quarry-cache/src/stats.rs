use std::collections::BTreeMap;

use jiff::Timestamp;
use serde::Serialize;

/// Aggregate statistics over the cache directory, from a sidecar scan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub expired_entries: usize,
    pub total_packages: usize,
    pub total_size_bytes: u64,
    pub repositories: BTreeMap<String, RepositoryCacheStats>,
    pub oldest_entry: Option<Timestamp>,
    pub newest_entry: Option<Timestamp>,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RepositoryCacheStats {
    pub entries: usize,
    pub packages: usize,
    pub expired: usize,
}

impl CacheStats {
    pub(crate) fn record(&mut self, repository_name: &str, package_count: usize, expired: bool) {
        self.total_entries += 1;
        self.total_packages += package_count;
        if expired {
            self.expired_entries += 1;
        }
        let repository = self
            .repositories
            .entry(repository_name.to_string())
            .or_default();
        repository.entries += 1;
        repository.packages += package_count;
        if expired {
            repository.expired += 1;
        }
    }

    pub(crate) fn observe_timestamp(&mut self, timestamp: Timestamp) {
        if self.oldest_entry.is_none_or(|oldest| timestamp < oldest) {
            self.oldest_entry = Some(timestamp);
        }
        if self.newest_entry.is_none_or(|newest| timestamp > newest) {
            self.newest_entry = Some(timestamp);
        }
    }
}
