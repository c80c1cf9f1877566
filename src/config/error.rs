#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid yaml in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid value for environment variable {name}: `{value}`")]
    InvalidEnvironmentValue { name: String, value: String },
    #[error("settings validation failed: {0}")]
    Settings(String),
}
