use thiserror::Error;

/// Errors that can occur while starting or configuring the model server
#[derive(Error, Debug)]
pub enum ServerError {
    /// Configuration error occurred
    #[error("Configuration error: {0}")]
    Config(String),

    /// The experiment root is unset, missing, or not a directory
    #[error("Experiment root unavailable: {0}")]
    ExperimentRoot(String),

    /// IO error occurred (file operations, listener bind, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML deserialization error
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// A global tracing subscriber could not be installed
    #[error("Tracing error: {0}")]
    Tracing(String),
}

/// Result type alias for server startup operations
pub type Result<T> = std::result::Result<T, ServerError>;
