//! Error types for the token compiler.

use std::path::PathBuf;

/// Result type alias for tokenframe operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can abort a build or a command.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The token configuration is missing required data or is malformed.
    #[error("invalid config: {message}")]
    Config { message: String },

    /// File I/O error.
    #[error("failed to access '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A stored snapshot could not be decoded.
    #[error("corrupt snapshot '{path}': {message}")]
    Snapshot { path: PathBuf, message: String },

    /// A class declares a property outside the fixed set of kinds.
    #[error("class '{class_name}' declares unrecognized property '{property}'")]
    UnknownProperty {
        class_name: String,
        property: String,
    },

    /// A class was requested that the config does not declare.
    #[error("unknown class '{0}'")]
    UnknownClass(String),

    /// Invalid command line.
    #[error("{0}")]
    Cli(String),

    /// File watcher failure.
    #[error("watch error: {0}")]
    Watch(String),
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn unknown_property(class_name: impl Into<String>, property: impl Into<String>) -> Self {
        Self::UnknownProperty {
            class_name: class_name.into(),
            property: property.into(),
        }
    }

    pub fn cli(message: impl Into<String>) -> Self {
        Self::Cli(message.into())
    }
}
