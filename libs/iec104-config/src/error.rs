use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration from {path}: {source}")]
    Load {
        path: String,
        #[source]
        source: config::ConfigError,
    },

    #[error("configuration at {path} does not match the expected shape: {source}")]
    Shape {
        path: String,
        #[source]
        source: config::ConfigError,
    },
}
