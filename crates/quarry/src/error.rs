use thiserror::Error;

/// Manager-level errors. Aggregation calls absorb per-repository failures
/// into their results; single-target calls surface them here.
#[derive(Debug, Error)]
pub enum Error {
    #[error("repository `{0}` not found or not available")]
    UnknownRepository(String),

    #[error(transparent)]
    Client(#[from] quarry_client::Error),

    #[error(transparent)]
    Cache(#[from] quarry_cache::CacheError),

    #[error(transparent)]
    Config(#[from] quarry_config::ConfigError),
}
