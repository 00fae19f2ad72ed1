//! JSON and YAML parsing with dot-path field extraction.

use serde_json::{Map, Value};

use quarry_types::{ParsingConfig, RepositoryInfo, RepositoryPackage};

use crate::ParseError;

pub(crate) fn parse_json(
    content: &str,
    config: &ParsingConfig,
    repository: &RepositoryInfo,
) -> Result<Vec<RepositoryPackage>, ParseError> {
    let data: Value = serde_json::from_str(content).map_err(ParseError::Json)?;
    Ok(extract_packages(&data, config, repository))
}

pub(crate) fn parse_yaml(
    content: &str,
    config: &ParsingConfig,
    repository: &RepositoryInfo,
) -> Result<Vec<RepositoryPackage>, ParseError> {
    // YAML documents deserialize straight into a JSON value; non-string keys
    // are a document-level error.
    let data: Value = serde_yaml::from_str(content).map_err(ParseError::Yaml)?;
    Ok(extract_packages(&data, config, repository))
}

/// Walk `patterns.json_path` to the package list and extract one package per
/// item. A single object is treated as a one-element list.
fn extract_packages(
    data: &Value,
    config: &ParsingConfig,
    repository: &RepositoryInfo,
) -> Vec<RepositoryPackage> {
    let mut current = data;
    if let Some(path) = config.patterns.json_path.as_deref().filter(|p| !p.is_empty()) {
        for part in path.split('.') {
            current = match current {
                Value::Object(map) => map.get(part).unwrap_or(&Value::Null),
                Value::Array(items) => part
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| items.get(index))
                    .unwrap_or(&Value::Null),
                _ => &Value::Null,
            };
        }
    }

    let items: Vec<&Value> = match current {
        Value::Array(items) => items.iter().collect(),
        Value::Object(_) => vec![current],
        _ => Vec::new(),
    };

    items
        .into_iter()
        .filter_map(|item| extract_package(item, config, repository))
        .collect()
}

fn extract_package(
    item: &Value,
    config: &ParsingConfig,
    repository: &RepositoryInfo,
) -> Option<RepositoryPackage> {
    let item = item.as_object()?;
    let fields = &config.fields;

    let name = string_at(item, fields.source("name"))?;
    let version =
        string_at(item, fields.source("version")).unwrap_or_else(|| "unknown".to_string());

    let mut package =
        RepositoryPackage::new(name, version, &repository.name, repository.platform);
    package.description = string_at(item, fields.source("description"));
    package.homepage = string_at(item, fields.source("homepage"));
    package.license = string_at(item, fields.source("license"));
    package.maintainer = string_at(item, fields.source("maintainer"));
    package.dependencies = list_at(item, fields.source("dependencies"));
    package.tags = list_at(item, fields.source("tags"));
    package.size = size_at(item, fields.source("size"));
    package.category = string_at(item, fields.source("category"));
    package.download_url = string_at(item, fields.source("download_url"));
    Some(package)
}

/// Resolve a dot-separated path against an object.
fn value_at<'a>(item: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = item.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    (!current.is_null()).then_some(current)
}

fn string_at(item: &Map<String, Value>, path: &str) -> Option<String> {
    match value_at(item, path)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// A list-valued field: either an actual list of strings or a comma-joined
/// string.
fn list_at(item: &Map<String, Value>, path: &str) -> Option<Vec<String>> {
    let values = match value_at(item, path)? {
        Value::String(joined) => joined
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(ToString::to_string)
            .collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(ToString::to_string)
            .collect::<Vec<_>>(),
        _ => return None,
    };
    (!values.is_empty()).then_some(values)
}

/// A size field: an integer, or a string of digits.
fn size_at(item: &Map<String, Value>, path: &str) -> Option<u64> {
    match value_at(item, path)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => {
            s.parse().ok()
        }
        _ => None,
    }
}
