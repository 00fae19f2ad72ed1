//! Line-oriented text and HTML directory-listing parsers.

use std::sync::LazyLock;

use regex::Regex;

use quarry_types::{ParsingConfig, RepositoryInfo, RepositoryPackage};

use crate::ParseError;

const DEFAULT_LINE_PATTERN: &str = r"^(\S+)\s+(\S+)(?:\s+(.*))?$";

/// Parse a plain-text index line by line with a configurable regex. Blank
/// lines and `#` comments are skipped.
pub(crate) fn parse_text(
    content: &str,
    config: &ParsingConfig,
    repository: &RepositoryInfo,
) -> Result<Vec<RepositoryPackage>, ParseError> {
    let patterns = &config.patterns;
    let pattern = patterns
        .line_pattern
        .as_deref()
        .unwrap_or(DEFAULT_LINE_PATTERN);
    let regex = Regex::new(pattern).map_err(|source| ParseError::LinePattern {
        pattern: pattern.to_string(),
        source,
    })?;
    let name_group = patterns.name_group.unwrap_or(1);
    let version_group = patterns.version_group.unwrap_or(2);
    let description_group = patterns.description_group.unwrap_or(3);

    let mut packages = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(captures) = regex.captures(line) else {
            continue;
        };
        let group = |index: usize| captures.get(index).map(|m| m.as_str().to_string());
        let Some(name) = group(name_group) else {
            continue;
        };
        let version = group(version_group).unwrap_or_else(|| "unknown".to_string());
        let mut package =
            RepositoryPackage::new(name, version, &repository.name, repository.platform);
        package.description = group(description_group);
        packages.push(package);
    }
    Ok(packages)
}

static LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<a[^>]+href=["']([^"']+)["'][^>]*>([^<]+)</a>"#).expect("valid link regex")
});

static TRAILING_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-_](\d+(?:\.\d+)*)").expect("valid version regex"));

/// Extract package links from an HTML directory listing. The version is
/// inferred from a trailing `-1.2.3` / `_1.2.3` component of the link text.
pub(crate) fn parse_html(
    content: &str,
    _config: &ParsingConfig,
    repository: &RepositoryInfo,
) -> Result<Vec<RepositoryPackage>, ParseError> {
    let mut packages = Vec::new();
    for captures in LINK.captures_iter(content) {
        let href = captures[1].to_string();
        let text = captures[2].trim();
        if text.is_empty() || text.starts_with("..") {
            continue;
        }

        let (name, version) = match TRAILING_VERSION.captures(text) {
            Some(found) => {
                let full = found.get(0).map_or(0, |m| m.start());
                let version = found
                    .get(1)
                    .map_or("unknown", |m| m.as_str())
                    .to_string();
                (text[..full].to_string(), version)
            }
            None => (text.to_string(), "unknown".to_string()),
        };
        if name.is_empty() {
            continue;
        }

        let mut package =
            RepositoryPackage::new(name, version, &repository.name, repository.platform);
        package.download_url = Some(href);
        packages.push(package);
    }
    Ok(packages)
}

#[cfg(test)]
mod tests {
    use crate::test_util::{parsing, repository};

    use super::*;

    #[test]
    fn default_pattern_takes_name_version_description() {
        let content = "\
# package index
nano 7.2 small text editor

wget 1.21.4
";
        let packages = parse_text(content, &parsing("text"), &repository("r")).unwrap();
        assert_eq!(packages.len(), 2);
        assert_eq!(packages[0].name, "nano");
        assert_eq!(packages[0].version, "7.2");
        assert_eq!(
            packages[0].description.as_deref(),
            Some("small text editor")
        );
        assert_eq!(packages[1].name, "wget");
        assert_eq!(packages[1].description, None);
    }

    #[test]
    fn custom_pattern_and_groups() {
        let content = "pkg=htop;ver=3.3.0";
        let mut config = parsing("text");
        config.patterns.line_pattern = Some(r"^pkg=([^;]+);ver=(.+)$".to_string());
        config.patterns.name_group = Some(1);
        config.patterns.version_group = Some(2);
        let packages = parse_text(content, &config, &repository("r")).unwrap();
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].name, "htop");
        assert_eq!(packages[0].version, "3.3.0");
    }

    #[test]
    fn invalid_pattern_is_a_document_error() {
        let mut config = parsing("text");
        config.patterns.line_pattern = Some("([unclosed".to_string());
        assert!(matches!(
            parse_text("anything", &config, &repository("r")),
            Err(ParseError::LinePattern { .. })
        ));
    }

    #[test]
    fn html_links_carry_inferred_versions() {
        let content = r#"
<html><body>
<a href="../">..</a>
<a href="nginx-1.24.0.tar.gz">nginx-1.24.0.tar.gz</a>
<a href='tools/'>tools</a>
</body></html>"#;
        let packages = parse_html(content, &parsing("html"), &repository("mirror")).unwrap();
        assert_eq!(packages.len(), 2);

        assert_eq!(packages[0].name, "nginx");
        assert_eq!(packages[0].version, "1.24.0");
        assert_eq!(
            packages[0].download_url.as_deref(),
            Some("nginx-1.24.0.tar.gz")
        );

        assert_eq!(packages[1].name, "tools");
        assert_eq!(packages[1].version, "unknown");
    }
}
