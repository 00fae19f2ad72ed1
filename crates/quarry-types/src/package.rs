use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::Platform;

/// A normalized package record from a single repository.
///
/// Every parser produces these, every cache entry stores a list of them, and
/// every manager operation returns them. The record is a plain value type:
/// components exchange owned copies, never shared mutable state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryPackage {
    pub name: String,
    /// Upstream version string. `"unknown"` is permitted when the source
    /// document does not carry one.
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintainer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    /// Size in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// Name of the repository the record came from.
    pub repository_name: String,
    pub platform: Platform,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<Timestamp>,
}

impl RepositoryPackage {
    /// A record with only the required fields set, as produced by parsers
    /// before optional metadata is filled in.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        repository_name: impl Into<String>,
        platform: Platform,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: None,
            homepage: None,
            license: None,
            maintainer: None,
            download_url: None,
            size: None,
            category: None,
            dependencies: None,
            tags: None,
            repository_name: repository_name.into(),
            platform,
            last_updated: None,
        }
    }
}
