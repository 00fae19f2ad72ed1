//! Pure format parsers mapping repository index documents to normalized
//! [`RepositoryPackage`] lists.
//!
//! Parsers never touch the network or the clock: the same bytes always
//! produce the same packages. A document that cannot be parsed surfaces a
//! single [`ParseError`]; individual items that lack a `name` are silently
//! skipped.

use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::debug;

use quarry_types::{ParsingConfig, RepositoryInfo, RepositoryPackage};

mod debian;
mod github;
mod structured;
mod tabular;
mod text;
mod xml;

/// A parser: `(document, parse config, repository) → packages`.
pub type ParserFn =
    fn(&str, &ParsingConfig, &RepositoryInfo) -> Result<Vec<RepositoryPackage>, ParseError>;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid JSON document")]
    Json(#[source] serde_json::Error),
    #[error("invalid YAML document")]
    Yaml(#[source] serde_yaml::Error),
    #[error("invalid XML document")]
    Xml(#[source] quick_xml::Error),
    #[error("malformed XML document: {0}")]
    XmlStructure(String),
    #[error("invalid CSV document")]
    Csv(#[source] csv::Error),
    #[error("invalid line pattern `{pattern}`")]
    LinePattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("expected {expected}, got {actual}")]
    UnexpectedShape {
        expected: &'static str,
        actual: String,
    },
}

/// Registry of parser functions keyed by the `parsing.format` name.
///
/// Populated once with the built-in formats; extensible by explicit
/// [`ParserRegistry::register`] only.
#[derive(Debug)]
pub struct ParserRegistry {
    parsers: FxHashMap<String, ParserFn>,
}

impl ParserRegistry {
    /// A registry with every built-in format registered.
    pub fn new() -> Self {
        let mut registry = Self {
            parsers: FxHashMap::default(),
        };
        registry.register("json", structured::parse_json);
        registry.register("yaml", structured::parse_yaml);
        registry.register("xml", xml::parse_xml);
        registry.register("text", text::parse_text);
        registry.register("debian_packages", debian::parse_debian_packages);
        registry.register("rpm_metadata", xml::parse_rpm_metadata);
        registry.register("html", text::parse_html);
        registry.register("csv", tabular::parse_csv);
        registry.register("tsv", tabular::parse_tsv);
        registry.register("github_directory", github::parse_github_directory);
        registry
    }

    pub fn register(&mut self, format: impl Into<String>, parser: ParserFn) {
        let format = format.into();
        debug!("Registered parser for format `{format}`");
        self.parsers.insert(format, parser);
    }

    pub fn get(&self, format: &str) -> Option<ParserFn> {
        self.parsers.get(format).copied()
    }

    /// The registered format names, sorted.
    pub fn formats(&self) -> Vec<&str> {
        let mut formats: Vec<&str> = self.parsers.keys().map(String::as_str).collect();
        formats.sort_unstable();
        formats
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}
