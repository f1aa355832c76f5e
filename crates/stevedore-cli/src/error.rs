//! CLI error type wrapping core and I/O failures

use thiserror::Error;

/// CLI error type
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to read a release document
    #[error("io error: {source}")]
    Io {
        /// The underlying I/O error
        #[from]
        source: std::io::Error,
    },

    /// Failed to build a Kubernetes client
    #[error("kubernetes client error: {source}")]
    Client {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Error from the core engine
    #[error(transparent)]
    Core(#[from] stevedore_common::Error),
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, Error>;
