//! Resolution of `(provider, os, version)` to a concrete repository name
//! through the declarative `version_mapping` tables.

use quarry_types::RepositoryInfo;

/// Pick the repository serving `provider` packages for the given OS release.
///
/// Candidates must match the provider type, list `os` in their
/// `distribution`, and map `version` in their `version_mapping`. Ties are
/// broken by non-EOL over EOL, then highest priority, then name. Without an
/// `os` and `version` (or without any candidate) the provider name is
/// returned unchanged.
pub(crate) fn resolve_repository_name<'a>(
    provider: &str,
    os: Option<&str>,
    version: Option<&str>,
    repositories: impl IntoIterator<Item = &'a RepositoryInfo>,
) -> String {
    let (Some(os), Some(version)) = (
        os.filter(|os| !os.is_empty()),
        version.filter(|version| !version.is_empty()),
    ) else {
        return provider.to_string();
    };

    let mut candidates: Vec<&RepositoryInfo> = repositories
        .into_iter()
        .filter(|info| info.kind == provider)
        .filter(|info| info.distribution.iter().any(|distribution| distribution == os))
        .filter(|info| info.version_mapping.contains_key(version))
        .collect();

    if candidates.is_empty() {
        return provider.to_string();
    }

    candidates.sort_by(|a, b| {
        a.eol
            .cmp(&b.eol)
            .then_with(|| b.priority.cmp(&a.priority))
            .then_with(|| a.name.cmp(&b.name))
    });
    candidates[0].name.clone()
}

/// The codename a repository uses for an OS version, if it maps one.
pub(crate) fn resolve_codename(info: &RepositoryInfo, version: &str) -> Option<String> {
    info.version_mapping.get(version).cloned()
}
