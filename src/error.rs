//! Error types for the SparseDb storage core.

use std::fmt;
use std::io;

/// The result type used throughout SparseDb.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for SparseDb operations.
///
/// Errors represent infrastructure faults: failed syscalls, corrupted or
/// foreign-format files, misuse of a handle. Logical conditions (an absent
/// id, an unknown key) are never errors; they are reported as `Ok(None)`
/// by the operations that can encounter them.
#[derive(Debug)]
pub enum Error {
    /// An I/O error occurred.
    Io(io::Error),

    /// Data corruption was detected.
    Corruption(String),

    /// A persisted store was written by an incompatible format version.
    VersionMismatch {
        /// The version found in the store's metadata file.
        found: u32,
        /// The version this binary expects.
        expected: u32,
    },

    /// A checksum mismatch was detected in a table file.
    ChecksumMismatch {
        /// The expected checksum value.
        expected: u32,
        /// The actual checksum value.
        actual: u32,
    },

    /// An invalid argument was provided.
    InvalidArgument(String),

    /// The store is in an invalid state for the requested operation.
    InvalidState(String),

    /// An internal error occurred.
    Internal(String),
}

impl Error {
    /// Creates a new corruption error.
    pub fn corruption(msg: impl Into<String>) -> Self {
        Error::Corruption(msg.into())
    }

    /// Creates a new invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Creates a new invalid state error.
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }

    /// Creates a new internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::Corruption(msg) => write!(f, "Data corruption: {}", msg),
            Error::VersionMismatch { found, expected } => {
                write!(f, "Format version mismatch: store has {}, expected {}", found, expected)
            }
            Error::ChecksumMismatch { expected, actual } => {
                write!(f, "Checksum mismatch: expected {:#x}, got {:#x}", expected, actual)
            }
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Error::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            Error::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}
