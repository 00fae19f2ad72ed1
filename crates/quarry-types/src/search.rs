use serde::{Deserialize, Serialize};

use crate::RepositoryPackage;

/// Aggregated result of a cross-repository search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub query: String,
    /// Concatenated in priority-descending order of the contributing
    /// repositories; parser order is preserved within a repository.
    pub packages: Vec<RepositoryPackage>,
    pub total_results: usize,
    pub search_time_seconds: f64,
    /// Names of the repositories that contributed at least one match.
    pub repository_sources: Vec<String>,
}
