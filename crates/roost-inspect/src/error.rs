//! Error types for the inspector binary.

/// Top-level error for the inspector.
///
/// Each variant wraps a subsystem error so `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum InspectError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: roost_db::ConfigError,
    },

    /// The storage backend failed.
    #[error("storage error: {source}")]
    Storage {
        /// The underlying storage error.
        #[from]
        source: roost_db::StorageError,
    },

    /// Encoding a record for output failed.
    #[error("output error: {source}")]
    Output {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },

    /// The command line could not be understood.
    #[error("usage: {message}")]
    Usage {
        /// What was wrong with the arguments.
        message: String,
    },
}
