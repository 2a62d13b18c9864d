//! Error handling for CanLog-RS
//!
//! This module defines the crate-wide error type and a Result alias. The
//! variants follow the acquisition failure classes:
//!
//! - per-record decode failures ([`CanLogError::UnknownIdentifier`],
//!   [`CanLogError::MalformedPayload`]) are recoverable and never leave the
//!   acquisition loop iteration
//! - [`CanLogError::TransportDisconnected`] and
//!   [`CanLogError::PersistenceFailure`] are fatal for the current run
//! - [`CanLogError::NoDestinationSelected`] is fatal at startup
//!
//! A receive timeout is not an error at all; sources return `Ok(None)`.

use std::path::PathBuf;
use thiserror::Error;

/// Exit code constants reported by the `canlog` binary.
pub mod exit_codes {
    /// Acquisition stopped by the operator.
    pub const SUCCESS: u8 = 0;
    /// Configuration, schema or other startup error.
    pub const GENERAL: u8 = 1;
    /// No output directory was chosen.
    pub const NO_DESTINATION: u8 = 2;
    /// The bus transport went away.
    pub const TRANSPORT: u8 = 3;
    /// Log files could not be written.
    pub const PERSISTENCE: u8 = 4;
}

/// Main error type for CanLog-RS operations
#[derive(Error, Debug)]
pub enum CanLogError {
    /// Frame identifier has no rule in the schema
    #[error("Unknown frame identifier 0x{id:X}")]
    UnknownIdentifier { id: u32 },

    /// Payload length does not match the schema rule
    #[error("Malformed payload for 0x{id:X}: expected {expected} bytes, got {actual}")]
    MalformedPayload {
        id: u32,
        expected: usize,
        actual: usize,
    },

    /// The bus transport disconnected
    #[error("Transport disconnected: {0}")]
    TransportDisconnected(String),

    /// The log destination could not be written
    #[error("Persistence failure on {path:?}: {source}")]
    PersistenceFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The operator did not pick an output directory
    #[error("No destination directory selected")]
    NoDestinationSelected,

    /// Errors related to the signal database
    #[error("Schema error: {0}")]
    Schema(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors related to channel communication
    #[error("Channel error: {0}")]
    Channel(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<CanLogError>,
    },
}

impl CanLogError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        CanLogError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create a persistence failure for the given path
    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CanLogError::PersistenceFailure {
            path: path.into(),
            source,
        }
    }

    /// Strip any context wrappers and return the underlying error
    pub fn root(&self) -> &CanLogError {
        match self {
            CanLogError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Per-record errors that are counted and skipped, never fatal
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.root(),
            CanLogError::UnknownIdentifier { .. } | CanLogError::MalformedPayload { .. }
        )
    }

    /// Process exit code for this failure class
    pub fn exit_code(&self) -> u8 {
        match self.root() {
            CanLogError::NoDestinationSelected => exit_codes::NO_DESTINATION,
            CanLogError::TransportDisconnected(_) => exit_codes::TRANSPORT,
            CanLogError::PersistenceFailure { .. } => exit_codes::PERSISTENCE,
            _ => exit_codes::GENERAL,
        }
    }
}

/// Result type alias for CanLog-RS operations
pub type Result<T> = std::result::Result<T, CanLogError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
