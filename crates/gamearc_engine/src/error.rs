//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

use crate::codec::CodecId;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent warpper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// a read ran past the end of the stream
    #[error("truncated read: {requested} bytes requested at offset {offset}, {available} available")]
    TruncatedRead {
        /// Position the read started at
        offset: u64,
        /// Number of bytes requested
        requested: u64,
        /// Number of bytes left in the stream
        available: u64,
    },

    /// a seek targeted a position outside of the stream
    #[error("seek to {target} is outside of a {size} byte stream")]
    SeekOutOfBounds {
        /// Requested absolute position
        target: i128,
        /// Size of the stream
        size: u64,
    },

    /// an offset points outside of the archive
    #[error("offset {value} is outside of a {archive_size} byte archive")]
    InvalidOffset {
        /// Parsed value
        value: i128,
        /// Size of the archive
        archive_size: u64,
    },

    /// a length is negative or larger than the archive
    #[error("invalid length {value}")]
    #[diagnostic(help("the directory is probably corrupt or belongs to another format"))]
    InvalidLength {
        /// Parsed value
        value: i128,
        /// Upper bound the value was checked against, if any
        limit: Option<u64>,
    },

    /// a file count is negative or beyond the sanity ceiling
    #[error("implausible file count {value} (ceiling {ceiling})")]
    ImplausibleCount {
        /// Parsed value
        value: i128,
        /// Configured ceiling
        ceiling: u64,
    },

    /// a name is empty, too long or contains control characters
    #[error("invalid entry name {name:?}: {reason}")]
    InvalidName {
        /// The offending name, lossily decoded
        name: String,
        /// Why the name was rejected
        reason: &'static str,
    },

    /// the directory contradicts itself
    #[error("inconsistent directory: {0}")]
    InconsistentDirectory(String),

    /// the stream does not start with the signature of the format
    #[error("missing {format} signature at offset {offset}")]
    BadMagic {
        /// Tag of the format that expected the signature
        format: &'static str,
        /// Position the signature was expected at
        offset: u64,
    },

    /// a type-discriminated record carries an unknown tag
    #[error("unsupported entry type {tag:#x} in {format} directory")]
    UnsupportedEntryType {
        /// Tag of the format that raised the error
        format: &'static str,
        /// The unknown type code
        tag: u32,
    },

    /// a codec or packer was requested but is not registered
    #[error("missing capability: {0}")]
    MissingCapability(Capability),

    /// a codec produced a different amount of data than the directory recorded
    #[error("expected {expected} bytes after decompression, got {actual}")]
    SizeMismatch {
        /// Length recorded in the directory
        expected: u64,
        /// Length produced by the codec
        actual: u64,
    },

    /// no registered format recognized the file
    #[error("unrecognized format")]
    UnrecognizedFormat,

    /// no registered format carries the tag
    #[error("no format registered with tag {0:?}")]
    UnknownFormat(String),

    /// unable to find requested file
    #[error("unable to find requested file")]
    FileNotFound(#[from] FileNotFoundError),

    /// {0}
    #[error("{0}")]
    CustomError(String),
}

/// Capability that was requested without being available
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability {
    /// Expanding payloads with a codec
    Decompress(CodecId),
    /// Producing payloads with a codec
    Compress(CodecId),
    /// Writing a container of the given format
    Pack(&'static str),
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::Decompress(codec) => write!(f, "{codec} decompressor"),
            Capability::Compress(codec) => write!(f, "{codec} compressor"),
            Capability::Pack(format) => write!(f, "{format} packer"),
        }
    }
}

/// Error type to provide further information when a file has not been found
#[derive(Error, Diagnostic, Debug)]
#[error("unable to find requested file")]
pub enum FileNotFoundError {
    /// at index {0}
    #[error("at index {0}")]
    Index(usize),

    /// by name {0}
    #[error("by name {0}")]
    Name(String),
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
