//! Error types for the ExAC browser
//!
//! Defines all error types used throughout the library.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for browser operations
#[derive(Debug, Error)]
pub enum BrowserError {
    /// Coordinate encoding errors
    #[error("Coordinate error: {0}")]
    Coordinate(#[from] CoordinateError),

    /// Record parsing errors
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Backing store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Bulk load errors
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while encoding genomic coordinates
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinateError {
    /// Chromosome label outside 1-22, X, Y, M/MT
    #[error("Invalid chromosome: {0}")]
    InvalidChromosome(String),

    /// Position is 0 or does not fit below the chromosome multiplier
    #[error("Invalid position: {0}")]
    InvalidPosition(u64),
}

/// Defects found on a single data line, before line context is attached
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("Too few fields: expected at least {expected}, found {found}")]
    TooFewFields { expected: usize, found: usize },

    /// Undecodable bytes; carries the 1-based column where they start
    #[error("Invalid UTF-8 in column {0}")]
    InvalidUtf8(usize),

    #[error("Invalid number in field {0}: {1}")]
    InvalidNumber(&'static str, String),

    #[error("Invalid strand: {0}")]
    InvalidStrand(String),

    #[error("Missing required attribute: {0}")]
    MissingAttribute(&'static str),

    #[error("Malformed attribute: {0}")]
    MalformedAttribute(String),

    #[error(transparent)]
    Coordinate(#[from] CoordinateError),
}

/// Errors produced by the record readers
#[derive(Debug, Error)]
pub enum ParseError {
    /// A data line could not be turned into a record
    #[error("Malformed record at line {line}: {kind} ({content:?})")]
    Malformed {
        /// 1-based line number in the decompressed stream
        line: usize,
        /// Raw line content
        content: String,
        kind: RecordError,
    },

    /// I/O error while reading the stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ParseError {
    /// Line number of the offending record, if this is a record error
    pub fn line(&self) -> Option<usize> {
        match self {
            ParseError::Malformed { line, .. } => Some(*line),
            ParseError::Io(_) => None,
        }
    }
}

/// Errors raised by a backing store
#[derive(Debug, Error)]
pub enum StoreError {
    /// A record with the same unique key already exists
    #[error("Duplicate key in {collection}: {key}")]
    Duplicate { collection: &'static str, key: String },

    /// Transaction misuse (commit without begin, nested begin)
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// SQLite failure
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Document (de)serialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors that abort a bulk load
#[derive(Debug, Error)]
pub enum LoadError {
    /// Source file could not be opened
    #[error("Cannot open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Source file contained a malformed record
    #[error("{phase}: {source}")]
    Parse {
        phase: &'static str,
        #[source]
        source: ParseError,
    },

    /// Store rejected a write
    #[error("{phase}: {source}")]
    Store {
        phase: &'static str,
        #[source]
        source: StoreError,
    },

    /// Parsing worker pool could not be started
    #[error("Cannot start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl LoadError {
    /// The parse error behind this failure, if any
    pub fn as_parse_error(&self) -> Option<&ParseError> {
        match self {
            LoadError::Parse { source, .. } => Some(source),
            _ => None,
        }
    }

    /// The store error behind this failure, if any
    pub fn as_store_error(&self) -> Option<&StoreError> {
        match self {
            LoadError::Store { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result type alias for browser operations
pub type Result<T> = std::result::Result<T, BrowserError>;

/// Result type alias for coordinate operations
pub type CoordinateResult<T> = std::result::Result<T, CoordinateError>;

/// Result type alias for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type alias for load operations
pub type LoadResult<T> = std::result::Result<T, LoadError>;
