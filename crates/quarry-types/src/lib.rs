pub use config::{
    AuthConfig, AuthType, CacheConfig, Compression, Endpoints, FieldMap, LimitsConfig,
    ParsingConfig, Patterns, Platform, QueryType, RepositoryConfig, RepositoryInfo,
    RepositoryMetadata,
};
pub use package::RepositoryPackage;
pub use search::SearchResult;

mod config;
mod package;
mod search;
