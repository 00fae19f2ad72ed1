//! GitHub contents-API directory listings, as used by Scoop buckets and
//! winget manifests: every manifest file in the directory is one package.

use serde_json::Value;
use tracing::debug;

use quarry_types::{ParsingConfig, RepositoryInfo, RepositoryPackage};

use crate::ParseError;

pub(crate) fn parse_github_directory(
    content: &str,
    config: &ParsingConfig,
    repository: &RepositoryInfo,
) -> Result<Vec<RepositoryPackage>, ParseError> {
    let data: Value = serde_json::from_str(content).map_err(ParseError::Json)?;
    let Value::Array(entries) = data else {
        return Err(ParseError::UnexpectedShape {
            expected: "a list of directory entries",
            actual: json_type(&data).to_string(),
        });
    };

    let extension = config
        .patterns
        .file_extension
        .as_deref()
        .unwrap_or(".json");

    let mut packages = Vec::new();
    for entry in &entries {
        let Some(entry) = entry.as_object() else {
            continue;
        };
        if entry.get("type").and_then(Value::as_str) != Some("file") {
            continue;
        }
        let Some(filename) = entry.get("name").and_then(Value::as_str) else {
            continue;
        };
        let Some(name) = filename.strip_suffix(extension) else {
            continue;
        };
        // Dotfiles and underscore-prefixed helpers are not manifests.
        if name.is_empty() || name.starts_with('.') || name.starts_with('_') {
            continue;
        }

        // The version would require fetching the manifest itself.
        let mut package =
            RepositoryPackage::new(name, "unknown", &repository.name, repository.platform);
        package.download_url = entry
            .get("download_url")
            .and_then(Value::as_str)
            .map(ToString::to_string);
        packages.push(package);
    }

    debug!(
        "Extracted {} packages from GitHub directory listing",
        packages.len()
    );
    Ok(packages)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
