//! Repository configuration loading and validation.
//!
//! Configuration is a set of YAML documents (`version: "1.0"`, a
//! `repositories` list) spread over one or more directories. Loading is
//! forgiving: an unreadable file or an invalid entry is logged and skipped,
//! never fatal, and a repeated repository name replaces the earlier entry
//! with a warning.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use quarry_types::RepositoryConfig;

/// The configuration schema version this loader understands.
const SUPPORTED_VERSION: &str = "1.0";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration document `{}`", path.display())]
    Document {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid repository entry: {source}")]
    Entry {
        #[source]
        source: serde_yaml::Error,
    },
    #[error("repository `{repository}`: endpoint `{endpoint}` has unsupported URL scheme: {url}")]
    UrlScheme {
        repository: String,
        endpoint: &'static str,
        url: String,
    },
    #[error(
        "repository `{repository}`: version_mapping key `{key}` must match ^[0-9.]+$"
    )]
    VersionMappingKey { repository: String, key: String },
    #[error(
        "repository `{repository}`: version_mapping value `{value}` must match ^[a-z0-9-]+$"
    )]
    VersionMappingValue { repository: String, value: String },
    #[error("repository entry is missing a name")]
    MissingName,
}

#[derive(Debug, Deserialize)]
struct ConfigDocument {
    #[serde(default = "default_version")]
    version: String,
    repositories: Vec<serde_yaml::Value>,
}

fn default_version() -> String {
    SUPPORTED_VERSION.to_string()
}

/// Load every repository configuration under the given directories.
///
/// Files are visited in sorted order per directory (`*.yaml` then `*.yml`
/// both count); later definitions of the same repository name win.
pub fn load_repository_configs(directories: &[PathBuf]) -> Vec<RepositoryConfig> {
    let mut configs: IndexMap<String, RepositoryConfig> = IndexMap::new();

    for directory in directories {
        if !directory.is_dir() {
            warn!("Configuration directory not found: {}", directory.display());
            continue;
        }
        for path in yaml_files(directory) {
            match load_file(&path) {
                Ok(loaded) => {
                    for config in loaded {
                        if configs.insert(config.name.clone(), config.clone()).is_some() {
                            warn!(
                                "Repository `{}` redefined by {}; replacing the earlier entry",
                                config.name,
                                path.display()
                            );
                        }
                    }
                }
                Err(err) => warn!("Failed to load config {}: {err}", path.display()),
            }
        }
    }

    debug!("Loaded {} repository configurations", configs.len());
    configs.into_values().collect()
}

/// Load one configuration file. Invalid entries inside a parseable document
/// are logged and skipped; an unreadable or structurally invalid document is
/// an error.
pub fn load_file(path: &Path) -> Result<Vec<RepositoryConfig>, ConfigError> {
    let text = fs_err::read_to_string(path).map_err(|err| ConfigError::Io {
        path: path.to_path_buf(),
        source: err,
    })?;
    let document: ConfigDocument =
        serde_yaml::from_str(&text).map_err(|err| ConfigError::Document {
            path: path.to_path_buf(),
            source: err,
        })?;

    if document.version != SUPPORTED_VERSION {
        warn!(
            "Unsupported config version {} in {}",
            document.version,
            path.display()
        );
    }

    let mut configs = Vec::new();
    for entry in document.repositories {
        match parse_entry(entry) {
            Ok(config) => {
                debug!("Loaded repository config: {}", config.name);
                configs.push(config);
            }
            Err(err) => warn!(
                "Skipping repository entry in {}: {err}",
                path.display()
            ),
        }
    }
    Ok(configs)
}

fn parse_entry(entry: serde_yaml::Value) -> Result<RepositoryConfig, ConfigError> {
    let config: RepositoryConfig =
        serde_yaml::from_value(entry).map_err(|source| ConfigError::Entry { source })?;
    validate_repository(&config)?;
    Ok(config)
}

/// Validate constraints the schema types cannot express: URL schemes and the
/// `version_mapping` character classes.
pub fn validate_repository(config: &RepositoryConfig) -> Result<(), ConfigError> {
    if config.name.is_empty() {
        return Err(ConfigError::MissingName);
    }

    let endpoints = [
        ("packages", Some(&config.endpoints.packages)),
        ("search", config.endpoints.search.as_ref()),
        ("info", config.endpoints.info.as_ref()),
    ];
    for (endpoint, url) in endpoints {
        if let Some(url) = url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::UrlScheme {
                    repository: config.name.clone(),
                    endpoint,
                    url: url.clone(),
                });
            }
        }
    }

    for (key, value) in &config.version_mapping {
        if key.is_empty() || !key.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
            return Err(ConfigError::VersionMappingKey {
                repository: config.name.clone(),
                key: key.clone(),
            });
        }
        if value.is_empty()
            || !value
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        {
            return Err(ConfigError::VersionMappingValue {
                repository: config.name.clone(),
                value: value.clone(),
            });
        }
    }

    Ok(())
}

fn yaml_files(directory: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs_err::read_dir(directory) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .is_some_and(|ext| ext == "yaml" || ext == "yml")
        })
        .collect();
    files.sort();
    files
}
