//! # dbf-reader
//!
//! A read-only reader for dBASE-family table files (.dbf), including the
//! companion memo files (.fpt/.dbt) referenced by memo-typed fields.
//!
//! Open a table, inspect its field metadata, and iterate records as ordered
//! name → value mappings. Field decoding is pluggable per type tag through
//! the [`FieldParser`] trait; decode failures can either propagate as errors
//! (default) or surface as [`InvalidValue`] sentinels ([`TolerantFieldParser`]).
pub mod dbf;

// Re-export the main types for convenience
pub use dbf::{
    dispatch, DbfError, DefaultFieldParser, DeletedRecords, Field, FieldParser, InvalidValue,
    OpenOptions, ParseContext, Record, RecordIterator, Result, Table, TableHeader,
    TolerantFieldParser, Value,
};
