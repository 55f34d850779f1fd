//! Error types shared across conveyor.

use std::path::PathBuf;

use thiserror::Error;

/// A malformed operation request, reported before any job is created.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Source and target lists must correspond one to one.
    #[error("Expected {sources} target(s) for {sources} source(s), got {targets}")]
    MismatchedTargets { sources: usize, targets: usize },

    /// Operating on a root location is not allowed.
    #[error("Cannot operate on the root location {location}")]
    RootLocation { location: String },

    /// A trashed item carries no original location.
    #[error("Failed to determine the original path for \"{name}\"")]
    MissingOriginalLocation { name: String },

    /// The operation cannot handle this kind of location.
    #[error("Unsupported location for this operation: {location}")]
    UnsupportedLocation { location: String },
}

/// Failure to turn a file reference into something that can be opened.
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// The operation was cancelled; never shown to the user.
    #[error("Operation was cancelled")]
    Cancelled,

    /// The input could not be parsed into a locator.
    #[error("Invalid file name \"{input}\": {reason}")]
    InvalidLocator { input: String, reason: String },

    /// The file does not exist.
    #[error("File not found: {path}")]
    NotFound { path: PathBuf },

    /// The resolver cannot handle this location.
    #[error("Location not supported: {location}")]
    Unsupported { location: String },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ResolutionError {
    /// Create an invalid locator error.
    pub fn invalid(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidLocator {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }

    /// Whether this error is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Failure to start an external process.
#[derive(Debug, Error)]
pub enum SpawnError {
    /// No program was configured.
    #[error("No command to spawn")]
    EmptyCommand,

    /// The program could not be started.
    #[error("Failed to spawn {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failure to load the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for the configuration.
    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// The values are inconsistent.
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}
