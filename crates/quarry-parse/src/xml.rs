//! XML parsing for generic `xml` indexes and RPM `primary.xml`-style
//! metadata.
//!
//! quick-xml is event-based; the extraction rules here need child and
//! attribute lookups, so the events are first folded into a minimal element
//! tree.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use quarry_types::{ParsingConfig, RepositoryInfo, RepositoryPackage};

use crate::ParseError;

pub(crate) fn parse_xml(
    content: &str,
    config: &ParsingConfig,
    repository: &RepositoryInfo,
) -> Result<Vec<RepositoryPackage>, ParseError> {
    let root = parse_tree(content)?;
    let selector = config
        .patterns
        .package_xpath
        .as_deref()
        .unwrap_or(".//package");
    let fields = &config.fields;

    let packages = select(&root, selector)
        .into_iter()
        .filter_map(|element| {
            let name = field_value(element, fields.source("name"))?;
            let version = field_value(element, fields.source("version"))
                .unwrap_or_else(|| "unknown".to_string());
            let mut package =
                RepositoryPackage::new(name, version, &repository.name, repository.platform);
            package.description = field_value(element, fields.source("description"));
            package.homepage = field_value(element, fields.source("homepage"));
            package.license = field_value(element, fields.source("license"));
            package.maintainer = field_value(element, fields.source("maintainer"));
            Some(package)
        })
        .collect();
    Ok(packages)
}

/// RPM repository metadata: `.//package` elements with attribute- or
/// child-based fields (`packager` is the maintainer, `url` the homepage).
pub(crate) fn parse_rpm_metadata(
    content: &str,
    _config: &ParsingConfig,
    repository: &RepositoryInfo,
) -> Result<Vec<RepositoryPackage>, ParseError> {
    let root = parse_tree(content)?;

    let packages = select(&root, ".//package")
        .into_iter()
        .filter_map(|element| {
            let name = element
                .attribute("name")
                .map(ToString::to_string)
                .or_else(|| element.child_text("name"))?;
            let version = element
                .attribute("version")
                .map(ToString::to_string)
                .or_else(|| element.child_text("version"))
                .unwrap_or_else(|| "unknown".to_string());
            let mut package =
                RepositoryPackage::new(name, version, &repository.name, repository.platform);
            package.description = element
                .child_text("description")
                .or_else(|| element.child_text("summary"));
            package.homepage = element
                .child_text("url")
                .or_else(|| element.child_text("homepage"));
            package.license = element.child_text("license");
            package.maintainer = element.child_text("packager");
            Some(package)
        })
        .collect();
    Ok(packages)
}

#[derive(Debug, Default)]
struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Element>,
    text: String,
}

impl Element {
    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn child_text(&self, name: &str) -> Option<String> {
        self.children
            .iter()
            .find(|child| child.name == name)
            .map(|child| child.text.clone())
            .filter(|text| !text.is_empty())
    }
}

/// Fold the event stream into an element tree and return the document root.
fn parse_tree(content: &str) -> Result<Element, ParseError> {
    let mut reader = Reader::from_str(content);
    // The bottom of the stack is a synthetic holder for top-level elements.
    let mut stack = vec![Element::default()];

    loop {
        match reader.read_event().map_err(ParseError::Xml)? {
            Event::Start(start) => stack.push(element_from_start(&start)?),
            Event::Empty(start) => {
                let element = element_from_start(&start)?;
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(element);
                }
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(ParseError::Xml)?;
                append_text(&mut stack, text.trim());
            }
            Event::CData(data) => {
                let text = String::from_utf8_lossy(&data);
                append_text(&mut stack, text.trim());
            }
            Event::End(_) => {
                if stack.len() > 1 {
                    let element = stack.pop().unwrap_or_default();
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(element);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if stack.len() != 1 {
        return Err(ParseError::XmlStructure("unclosed element".to_string()));
    }
    let holder = stack.pop().unwrap_or_default();
    holder
        .children
        .into_iter()
        .next()
        .ok_or_else(|| ParseError::XmlStructure("no root element".to_string()))
}

fn element_from_start(start: &BytesStart<'_>) -> Result<Element, ParseError> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|err| ParseError::XmlStructure(err.to_string()))?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(ParseError::Xml)?
            .into_owned();
        attributes.push((key, value));
    }
    Ok(Element {
        name,
        attributes,
        children: Vec::new(),
        text: String::new(),
    })
}

fn append_text(stack: &mut [Element], text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(top) = stack.last_mut() {
        if !top.text.is_empty() {
            top.text.push(' ');
        }
        top.text.push_str(text);
    }
}

/// Select elements by a restricted XPath subset: `.//a/b` matches any
/// descendant `a` with a `b` child path; `a/b` walks direct children from
/// the root.
fn select<'a>(root: &'a Element, selector: &str) -> Vec<&'a Element> {
    if let Some(descendant_path) = selector.strip_prefix(".//") {
        let segments: Vec<&str> = descendant_path.split('/').collect();
        let Some((first, rest)) = segments.split_first() else {
            return Vec::new();
        };
        let mut matches = Vec::new();
        collect_descendants(root, first, rest, &mut matches);
        matches
    } else {
        let segments: Vec<&str> = selector.split('/').collect();
        walk_path(root, &segments)
    }
}

fn collect_descendants<'a>(
    element: &'a Element,
    first: &str,
    rest: &[&str],
    matches: &mut Vec<&'a Element>,
) {
    for child in &element.children {
        if child.name == first {
            matches.extend(walk_path(child, rest));
        }
        collect_descendants(child, first, rest, matches);
    }
}

fn walk_path<'a>(element: &'a Element, path: &[&str]) -> Vec<&'a Element> {
    let Some((first, rest)) = path.split_first() else {
        return vec![element];
    };
    element
        .children
        .iter()
        .filter(|child| child.name == *first)
        .flat_map(|child| walk_path(child, rest))
        .collect()
}

/// Extract a field from an element: `@attr` reads an attribute, a path with
/// `/` walks child elements, and a bare name reads a direct child's text.
fn field_value(element: &Element, spec: &str) -> Option<String> {
    if let Some(attribute) = spec.strip_prefix('@') {
        element.attribute(attribute).map(ToString::to_string)
    } else if spec.contains('/') {
        let segments: Vec<&str> = spec.split('/').collect();
        walk_path(element, &segments)
            .first()
            .map(|found| found.text.clone())
            .filter(|text| !text.is_empty())
    } else {
        element.child_text(spec)
    }
}
