//! Custom error types for the dbf-reader crate.

use std::path::PathBuf;
use thiserror::Error;

/// The primary error type for all operations in this crate.
#[derive(Debug, Error)]
pub enum DbfError {
    /// An error originating from I/O operations.
    #[error("I/O error: {0:?}")]
    Io(#[from] std::io::Error),

    /// The byte source ended before the layout said it should.
    #[error("Truncated data while reading {context}: needed {needed} more bytes")]
    TruncatedData {
        context: &'static str,
        needed: usize,
    },

    /// The file header is structurally inconsistent (declared lengths do not
    /// match the field descriptors, duplicate field names, and so on).
    #[error("Corrupt header: {0}")]
    CorruptHeader(String),

    /// A memo-typed field exists but no companion memo file was found.
    #[error("Missing memo file for table {0:?}")]
    MissingMemoFile(PathBuf),

    /// A memo block could not be read (malformed block header, missing
    /// terminator, block past end of file).
    #[error("Corrupt memo: {0}")]
    CorruptMemo(String),

    /// Field bytes could not be decoded under the field's declared type.
    ///
    /// The raw bytes are preserved so callers can inspect them or wrap them
    /// in an [`InvalidValue`](crate::InvalidValue).
    #[error("Cannot decode field {field}: {data:?}")]
    ValueDecode { field: String, data: Vec<u8> },

    /// A field carries a type tag the active parser does not handle.
    #[error("Unknown field type {tag:?} for field {field}")]
    UnknownFieldType { field: String, tag: char },
}

/// A convenience `Result` type alias using the crate's `DbfError` type.
pub type Result<T> = std::result::Result<T, DbfError>;
