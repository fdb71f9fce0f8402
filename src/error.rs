//! Unified error type for server startup and shutdown.
//!
//! Subsystem errors convert into [`Error`] so the wiring code can use `?`
//! throughout.  Runtime paths (reports, commands, timer fires) never
//! fail outward: they log and carry on, see [`StoragePort`] for why a
//! dropped write does not undo a decision.
//!
//! [`StoragePort`]: crate::app::ports::StoragePort

use core::fmt;

use crate::app::ports::{ConfigError, StorageError};

#[derive(Debug)]
pub enum Error {
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
    /// The audit store could not be opened or stopped.
    Storage(StorageError),
    /// Socket bind or thread spawn failed.
    Io(std::io::Error),
    /// A worker thread panicked.
    Thread(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Io(e) => write!(f, "io: {e}"),
            Self::Thread(name) => write!(f, "{name} thread panicked"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Storage(e) => Some(e),
            Self::Io(e) => Some(e),
            Self::Thread(_) => None,
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
