use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Platform a repository serves packages for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linux,
    Macos,
    Windows,
    /// Serves every platform; matched by any platform filter.
    Universal,
}

impl Platform {
    /// Whether a repository on this platform satisfies a `filter`, where
    /// `universal` repositories match everything.
    pub fn matches(self, filter: Platform) -> bool {
        self == filter || self == Platform::Universal
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Macos => "macos",
            Self::Windows => "windows",
            Self::Universal => "universal",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linux" => Ok(Self::Linux),
            "macos" => Ok(Self::Macos),
            "windows" => Ok(Self::Windows),
            "universal" => Ok(Self::Universal),
            other => Err(format!("unknown platform: `{other}`")),
        }
    }
}

/// How a repository is queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    /// Fetch and parse the entire package index in one request.
    #[default]
    BulkDownload,
    /// Query a per-package endpoint; never bulk-refreshed.
    Api,
}

/// Compression applied to a repository's index document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// No configured compression; the `Content-Encoding` response header is
    /// consulted instead.
    #[default]
    None,
    Gzip,
    Bzip2,
    Xz,
    Brotli,
}

/// The URLs a repository is reached through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    /// Full package index. May contain `{arch}`/`{architecture}` and
    /// `{release}`/`{distribution}` template variables.
    pub packages: String,
    /// Search endpoint with `{query}` or `{package}` variables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    /// Per-package endpoint with `{package}` and optional `{version}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
}

/// Format-specific extraction patterns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patterns {
    /// Dot-separated path to the package list inside a JSON/YAML document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_path: Option<String>,
    /// Regex applied per line by the `text` parser.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_group: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_group: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_group: Option<usize>,
    /// Element selector for the `xml` parser, e.g. `.//package`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_xpath: Option<String>,
    /// Manifest extension for the `github_directory` parser.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_extension: Option<String>,
}

/// Mapping from logical package fields (`name`, `version`, …) to locations in
/// the source document. A missing entry means the logical name is used as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMap(pub BTreeMap<String, String>);

impl FieldMap {
    /// The configured source location for a logical field, falling back to
    /// the logical name itself.
    pub fn source<'a>(&'a self, logical: &'a str) -> &'a str {
        self.0.get(logical).map_or(logical, String::as_str)
    }
}

/// How a repository's documents are parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsingConfig {
    /// Parser name looked up in the parser registry.
    pub format: String,
    #[serde(default)]
    pub compression: Compression,
    #[serde(default = "default_encoding")]
    pub encoding: String,
    #[serde(default)]
    pub patterns: Patterns,
    #[serde(default)]
    pub fields: FieldMap,
}

fn default_encoding() -> String {
    "utf-8".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: u64,
    #[serde(default = "default_api_cache_ttl_seconds")]
    pub api_cache_ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_hours: default_ttl_hours(),
            api_cache_ttl_seconds: default_api_cache_ttl_seconds(),
        }
    }
}

fn default_ttl_hours() -> u64 {
    24
}

fn default_api_cache_ttl_seconds() -> u64 {
    3600
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
    #[serde(default = "default_concurrent_requests")]
    pub concurrent_requests: usize,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_max_response_size_mb")]
    pub max_response_size_mb: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_seconds")]
    pub retry_delay_seconds: u64,
    #[serde(default = "default_exponential_backoff")]
    pub exponential_backoff: bool,
}

impl LimitsConfig {
    pub fn max_response_size_bytes(&self) -> u64 {
        self.max_response_size_mb * 1024 * 1024
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: default_requests_per_minute(),
            concurrent_requests: default_concurrent_requests(),
            timeout_seconds: default_timeout_seconds(),
            max_response_size_mb: default_max_response_size_mb(),
            max_retries: default_max_retries(),
            retry_delay_seconds: default_retry_delay_seconds(),
            exponential_backoff: default_exponential_backoff(),
        }
    }
}

fn default_requests_per_minute() -> u32 {
    60
}

fn default_concurrent_requests() -> usize {
    5
}

fn default_timeout_seconds() -> u64 {
    300
}

fn default_max_response_size_mb() -> u64 {
    200
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_seconds() -> u64 {
    1
}

fn default_exponential_backoff() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    #[default]
    None,
    Bearer,
    ApiKey,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default, rename = "type")]
    pub kind: AuthType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Header the API key is sent in. Defaults to `X-API-Key`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_header: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryMetadata {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// 1–100, higher is preferred.
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintainer: Option<String>,
    /// Probe the repository during manager initialization and drop it when
    /// unreachable.
    #[serde(default)]
    pub test_availability: bool,
}

impl Default for RepositoryMetadata {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            priority: default_priority(),
            description: None,
            maintainer: None,
            test_availability: false,
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_priority() -> u8 {
    50
}

/// One repository entry from a configuration document (spec'd YAML schema
/// version "1.0"). The full document is kept; `RepositoryInfo` is the
/// distilled identity-and-policy view derived from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub name: String,
    /// Dispatch tag: `apt`, `dnf`, `brew`, `npm`, `winget`, …
    #[serde(rename = "type")]
    pub kind: String,
    pub platform: Platform,
    /// Ordered; the first entry is used for `{release}` templating.
    #[serde(default)]
    pub distribution: Vec<String>,
    /// Ordered; the first entry is used for `{arch}` templating.
    #[serde(default)]
    pub architecture: Vec<String>,
    #[serde(default)]
    pub query_type: QueryType,
    /// `version string → codename`, e.g. `"22.04" → "jammy"`.
    #[serde(default)]
    pub version_mapping: BTreeMap<String, String>,
    #[serde(default)]
    pub eol: bool,
    pub endpoints: Endpoints,
    pub parsing: ParsingConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub metadata: RepositoryMetadata,
}

impl RepositoryConfig {
    /// The identity-and-policy view used throughout the manager.
    pub fn to_info(&self) -> RepositoryInfo {
        RepositoryInfo {
            name: self.name.clone(),
            kind: self.kind.clone(),
            platform: self.platform,
            url: self.endpoints.packages.clone(),
            architecture: self.architecture.clone(),
            distribution: self.distribution.clone(),
            enabled: self.metadata.enabled,
            priority: self.metadata.priority,
            query_type: self.query_type,
            version_mapping: self.version_mapping.clone(),
            eol: self.eol,
        }
    }
}

/// Identity and policy of one configured repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub platform: Platform,
    /// The untemplated packages endpoint; part of the cache-key identity.
    pub url: String,
    pub architecture: Vec<String>,
    pub distribution: Vec<String>,
    pub enabled: bool,
    pub priority: u8,
    pub query_type: QueryType,
    pub version_mapping: BTreeMap<String, String>,
    pub eol: bool,
}
