//! Error types for memory-bank operations.
//!
//! This module provides an error hierarchy using `thiserror` covering
//! storage, transcript/chunking, I/O, the vector index, the oracle
//! capability, and CLI commands.

use thiserror::Error;

/// Result type alias for memory-bank operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for memory-bank operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Storage-related errors (on-disk layout, locking, session/artifact logs).
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Transcript and chunking errors.
    #[error("chunking error: {0}")]
    Chunking(#[from] ChunkingError),

    /// I/O errors (file operations).
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Vector index errors.
    #[error("index error: {0}")]
    Index(#[from] IndexError),

    /// Oracle capability errors (embedding/chat).
    #[error("oracle error: {0}")]
    Oracle(#[from] OracleError),

    /// CLI command errors.
    #[error("command error: {0}")]
    Command(#[from] CommandError),

    /// Invalid state errors.
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of the invalid state.
        message: String,
    },

    /// Configuration errors.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },
}

/// Storage-specific errors for the on-disk store.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Store not initialized (`init` command not run).
    #[error("memory bank not initialized. Run: memory-bank init")]
    NotInitialized,

    /// Store directory exists but one of its required files is missing or
    /// unreadable in a way that indicates corruption rather than absence.
    #[error("store corrupt at {path}: {reason}")]
    Corrupt {
        /// Path to the offending file.
        path: String,
        /// Description of the corruption.
        reason: String,
    },

    /// Session not found by id.
    #[error("session not found: {id}")]
    SessionNotFound {
        /// Session id that was not found.
        id: String,
    },

    /// Advisory store lock could not be acquired.
    #[error("failed to acquire store lock at {path}: {reason}")]
    LockFailed {
        /// Path to the lock file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Project registry error (global per-user registry file).
    #[error("registry error: {0}")]
    Registry(String),
}

/// Transcript- and chunking-specific errors.
#[derive(Error, Debug)]
pub enum ChunkingError {
    /// Invalid UTF-8 encountered at specific byte offset.
    #[error("invalid UTF-8 at byte offset {offset}")]
    InvalidUtf8 {
        /// Byte offset where invalid UTF-8 was found.
        offset: usize,
    },

    /// Transcript line could not be parsed as a recognized record.
    #[error("malformed transcript at line {line}: {reason}")]
    TranscriptMalformed {
        /// 1-based line number in the source transcript.
        line: usize,
        /// Description of the parse failure.
        reason: String,
    },

    /// Chunk size exceeds maximum allowed.
    #[error("chunk size {size} exceeds maximum {max}")]
    ChunkTooLarge {
        /// Actual chunk size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Invalid chunk configuration.
    #[error("invalid chunk configuration: {reason}")]
    InvalidConfig {
        /// Reason the configuration is invalid.
        reason: String,
    },

    /// Overlap exceeds chunk size.
    #[error("overlap {overlap} must be less than chunk size {size}")]
    OverlapTooLarge {
        /// Overlap size.
        overlap: usize,
        /// Chunk size.
        size: usize,
    },

    /// Regex compilation error (episode classifier patterns).
    #[error("regex error: {0}")]
    Regex(String),
}

/// I/O-specific errors for file operations.
#[derive(Error, Debug)]
pub enum IoError {
    /// File not found.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path to the file that was not found.
        path: String,
    },

    /// Failed to read file.
    #[error("failed to read file: {path}: {reason}")]
    ReadFailed {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Failed to write file.
    #[error("failed to write file: {path}: {reason}")]
    WriteFailed {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Memory mapping error.
    #[error("memory mapping failed: {path}: {reason}")]
    MmapFailed {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Directory creation error.
    #[error("failed to create directory: {path}: {reason}")]
    DirectoryFailed {
        /// Path to the directory.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Generic I/O error wrapper.
    #[error("I/O error: {0}")]
    Generic(String),
}

/// Vector-index-specific errors.
#[derive(Error, Debug)]
pub enum IndexError {
    /// Embedding dimension does not match the index's recorded dimension.
    #[error("embedding dimension mismatch: index has {expected}, got {actual}")]
    DimMismatch {
        /// Dimension recorded in the index's `dim` sidecar.
        expected: usize,
        /// Dimension of the vector that was rejected.
        actual: usize,
    },

    /// The metadata log and the vector matrix have diverged and crash
    /// recovery could not reconcile them.
    #[error("index stale or inconsistent: {reason}")]
    Stale {
        /// Description of the inconsistency.
        reason: String,
    },

    /// Index has not been built yet.
    #[error("index not built for this store")]
    NotBuilt,
}

/// Oracle capability errors (embedding/chat collaborator).
#[derive(Error, Debug)]
pub enum OracleError {
    /// The oracle endpoint could not be reached.
    #[error("oracle unreachable: {0}")]
    Unreachable(String),

    /// The requested model is not available on the oracle endpoint.
    #[error("oracle model not found: {0}")]
    ModelMissing(String),

    /// The oracle call exceeded its deadline.
    #[error("oracle call timed out after {seconds}s")]
    Timeout {
        /// Deadline that was exceeded, in seconds.
        seconds: u64,
    },

    /// The oracle returned a response that could not be parsed.
    #[error("oracle returned malformed response: {0}")]
    MalformedResponse(String),
}

/// CLI command-specific errors.
#[derive(Error, Debug)]
pub enum CommandError {
    /// Unknown command.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// Invalid argument provided.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Requested token budget is not usable (zero, negative, or below the
    /// minimum needed for a single section).
    #[error("invalid budget: {0}")]
    InvalidBudget(String),

    /// Requested pack mode is not one of the known modes.
    #[error("invalid mode: {0}")]
    InvalidMode(String),

    /// Command is acknowledged by the CLI surface but not implemented
    /// because its collaborators are out of scope.
    #[error("command not implemented: {0}")]
    NotImplemented(String),

    /// Command execution failed.
    #[error("command execution failed: {0}")]
    ExecutionFailed(String),
}

// Implement From traits for standard library and third-party errors.

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(IoError::Generic(err.to_string()))
    }
}

impl From<regex::Error> for ChunkingError {
    fn from(err: regex::Error) -> Self {
        Self::Regex(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::string::FromUtf8Error> for ChunkingError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        Self::InvalidUtf8 {
            offset: err.utf8_error().valid_up_to(),
        }
    }
}

impl From<std::str::Utf8Error> for ChunkingError {
    fn from(err: std::str::Utf8Error) -> Self {
        Self::InvalidUtf8 {
            offset: err.valid_up_to(),
        }
    }
}
