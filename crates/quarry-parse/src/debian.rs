//! Debian `Packages` stanza parsing.

use rustc_hash::FxHashMap;

use quarry_types::{ParsingConfig, RepositoryInfo, RepositoryPackage};

use crate::ParseError;

/// Parse the stanza format used by Debian `Packages` indexes: blank-line
/// separated blocks of `Field: value` lines, with continuation lines
/// indented by a space or tab.
pub(crate) fn parse_debian_packages(
    content: &str,
    _config: &ParsingConfig,
    repository: &RepositoryInfo,
) -> Result<Vec<RepositoryPackage>, ParseError> {
    let mut packages = Vec::new();
    let mut stanza = Stanza::default();

    for line in content.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            stanza.flush(repository, &mut packages);
            continue;
        }
        if line.starts_with(' ') || line.starts_with('\t') {
            stanza.continue_last(line.trim());
            continue;
        }
        if let Some((field, value)) = line.split_once(':') {
            stanza.insert(field.trim().to_lowercase(), value.trim().to_string());
        }
    }
    stanza.flush(repository, &mut packages);

    Ok(packages)
}

#[derive(Default)]
struct Stanza {
    fields: FxHashMap<String, String>,
    last: Option<String>,
}

impl Stanza {
    fn insert(&mut self, field: String, value: String) {
        self.last = Some(field.clone());
        self.fields.insert(field, value);
    }

    fn continue_last(&mut self, value: &str) {
        if let Some(last) = &self.last {
            if let Some(existing) = self.fields.get_mut(last) {
                existing.push('\n');
                existing.push_str(value);
            }
        }
    }

    fn flush(&mut self, repository: &RepositoryInfo, packages: &mut Vec<RepositoryPackage>) {
        if let Some(package) = self.build(repository) {
            packages.push(package);
        }
        self.fields.clear();
        self.last = None;
    }

    fn build(&self, repository: &RepositoryInfo) -> Option<RepositoryPackage> {
        let name = self.fields.get("package")?;
        let version = self
            .fields
            .get("version")
            .cloned()
            .unwrap_or_else(|| "unknown".to_string());

        let mut package =
            RepositoryPackage::new(name, version, &repository.name, repository.platform);
        package.description = self
            .fields
            .get("description")
            .or_else(|| self.fields.get("summary"))
            .cloned();
        package.homepage = self.fields.get("homepage").cloned();
        package.maintainer = self.fields.get("maintainer").cloned();
        package.dependencies = self.fields.get("depends").map(|d| parse_depends(d));
        // Installed-Size is in kilobytes.
        package.size = self
            .fields
            .get("installed-size")
            .and_then(|size| size.parse::<u64>().ok())
            .map(|kb| kb * 1024);
        package.category = self.fields.get("section").cloned();

        if package.dependencies.as_ref().is_some_and(Vec::is_empty) {
            package.dependencies = None;
        }
        Some(package)
    }
}

/// Split a `Depends` value on `,` and `|`, dropping any versioned constraint
/// in parentheses: `libcurl (= 7.88.1-1), libc6` → `[libcurl, libc6]`.
fn parse_depends(depends: &str) -> Vec<String> {
    depends
        .replace('|', ",")
        .split(',')
        .filter_map(|dep| {
            let name = dep.split('(').next().unwrap_or(dep).trim();
            (!name.is_empty()).then(|| name.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::test_util::{parsing, repository};

    use super::*;

    #[test]
    fn two_stanza_packages_file() {
        let content = "\
Package: nginx
Version: 1.24.0-1
Description: HTTP server
Installed-Size: 512

Package: curl
Version: 7.88.1-1
Depends: libcurl (= 7.88.1-1), libc6
";
        let packages =
            parse_debian_packages(content, &parsing("debian_packages"), &repository("apt-test"))
                .unwrap();

        assert_eq!(packages.len(), 2);

        let nginx = &packages[0];
        assert_eq!(nginx.name, "nginx");
        assert_eq!(nginx.version, "1.24.0-1");
        assert_eq!(nginx.description.as_deref(), Some("HTTP server"));
        assert_eq!(nginx.size, Some(524_288));
        assert_eq!(nginx.category, None);
        assert_eq!(nginx.repository_name, "apt-test");

        let curl = &packages[1];
        assert_eq!(curl.name, "curl");
        assert_eq!(curl.version, "7.88.1-1");
        assert_eq!(
            curl.dependencies,
            Some(vec!["libcurl".to_string(), "libc6".to_string()])
        );
    }

    #[test]
    fn alternatives_split_like_commas() {
        let content = "\
Package: mta
Version: 1.0
Depends: postfix | exim4, mailutils (>= 3.0)
";
        let packages =
            parse_debian_packages(content, &parsing("debian_packages"), &repository("apt"))
                .unwrap();
        assert_eq!(
            packages[0].dependencies,
            Some(vec![
                "postfix".to_string(),
                "exim4".to_string(),
                "mailutils".to_string()
            ])
        );
    }

    #[test]
    fn continuation_lines_extend_the_previous_field() {
        let content = "\
Package: vim
Version: 2:9.0
Description: Vi IMproved
 a highly configurable text editor
 built to enable efficient editing
Section: editors
";
        let packages =
            parse_debian_packages(content, &parsing("debian_packages"), &repository("apt"))
                .unwrap();
        let description = packages[0].description.as_deref().unwrap();
        assert!(description.starts_with("Vi IMproved"));
        assert!(description.contains("highly configurable"));
        assert_eq!(packages[0].category.as_deref(), Some("editors"));
    }

    #[test]
    fn stanza_without_package_field_is_skipped() {
        let content = "\
Version: 1.0
Maintainer: nobody

Package: real
Version: 2.0
";
        let packages =
            parse_debian_packages(content, &parsing("debian_packages"), &repository("apt"))
                .unwrap();
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].name, "real");
    }

    #[test]
    fn file_without_trailing_blank_line_keeps_last_stanza() {
        let content = "Package: tail\nVersion: 1.0";
        let packages =
            parse_debian_packages(content, &parsing("debian_packages"), &repository("apt"))
                .unwrap();
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].name, "tail");
    }
}
