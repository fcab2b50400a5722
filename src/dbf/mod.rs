//! Core DBF reader module.

pub mod error;
pub mod models;
mod cursor;
mod encodings;
mod header;
mod iter;
mod memo;
mod parser;

use std::cell::OnceCell;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use encoding_rs::Encoding;
use log::{info, warn};

pub use error::{DbfError, Result};
pub use iter::RecordIterator;
pub use memo::{MemoBlock, MemoFile, MemoFormat, MemoKind, MemoReader};
pub use models::{DeletedRecords, Field, InvalidValue, Record, TableHeader, Value};
pub use parser::{
    dispatch, DefaultFieldParser, FieldParser, ParseContext, TolerantFieldParser,
};

/// Deletion flag marking a soft-deleted record slot.
pub(crate) const DELETED_FLAG: u8 = 0x2A;
/// End-of-file marker that may terminate the record area early.
pub(crate) const EOF_MARKER: u8 = 0x1A;

static DEFAULT_PARSER: DefaultFieldParser = DefaultFieldParser;

/// Configuration for [`Table::open_with`].
#[derive(Debug, Clone)]
pub struct OpenOptions {
    /// Text encoding override. When unset, the encoding is resolved from the
    /// header's language driver byte, falling back to windows-1252.
    pub encoding: Option<&'static Encoding>,
    /// When set, a memo-typed field with no companion memo file does not
    /// fail the open; memo fields decode to [`Value::Null`] instead.
    pub ignore_missing_memo: bool,
    /// When unset, memo content is never resolved: memo-typed fields decode
    /// to their raw block index and the memo file is not required.
    pub load_memos: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            encoding: None,
            ignore_missing_memo: false,
            load_memos: true,
        }
    }
}

/// Result of the flag-only deletion scan, memoized on the table.
#[derive(Debug)]
struct ScanResult {
    deleted: DeletedRecords,
    /// Slots actually present in the file (may be fewer than declared when
    /// an EOF marker cuts the record area short).
    slots: u32,
}

/// The main reader for dBASE-family table files.
///
/// Opening parses the header and field descriptors and locates the companion
/// memo file; record slots are only read when an iteration pass asks for
/// them. A `Table` is a factory of fresh passes, not a cursor: call
/// [`records`](Table::records) as many times as needed.
#[derive(Debug)]
pub struct Table {
    path: PathBuf,
    name: String,
    header: TableHeader,
    fields: Vec<Field>,
    memo: Option<MemoFile>,
    encoding: &'static Encoding,
    load_memos: bool,
    scan: OnceCell<ScanResult>,
}

impl Table {
    /// Open a table with default options.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, OpenOptions::default())
    }

    /// Open a table from the given path.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The file cannot be opened or is shorter than the header layout
    /// - The header is inconsistent (record length vs. field lengths,
    ///   duplicate or empty field names)
    /// - A memo-typed field exists but no memo file is found and
    ///   `ignore_missing_memo` is not set
    pub fn open_with(path: impl AsRef<Path>, options: OpenOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        info!("Opening DBF table: {}", path.display());
        let mut file = File::open(&path)?;

        let (header, fields) = header::parse(&mut file)?;

        let encoding = options
            .encoding
            .unwrap_or_else(|| encodings::from_language_driver(header.language_driver));

        // The memo file only matters when some field references it and the
        // caller actually wants memo content resolved.
        let memo = if options.load_memos && fields.iter().any(Field::is_memo) {
            match MemoFile::locate(&path) {
                Some(memo_path) => Some(MemoFile::open(memo_path)?),
                None if options.ignore_missing_memo => {
                    warn!(
                        "No memo file found for {}; memo fields will decode to Null",
                        path.display()
                    );
                    None
                }
                None => return Err(DbfError::MissingMemoFile(path)),
            }
        } else {
            None
        };

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        info!(
            "Table {} opened: {} fields, {} declared records, encoding {}",
            name,
            fields.len(),
            header.record_count,
            encoding.name()
        );

        Ok(Self {
            path,
            name,
            header,
            fields,
            memo,
            encoding,
            load_memos: options.load_memos,
            scan: OnceCell::new(),
        })
    }

    /// Table name: the file stem of the table path.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &TableHeader {
        &self.header
    }

    /// Field metadata, in record-slot order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Resolved text encoding for character and memo fields.
    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    /// Path of the located companion memo file, if any.
    pub fn memo_path(&self) -> Option<&Path> {
        self.memo.as_ref().map(|m| m.path())
    }

    pub(crate) fn memo_file(&self) -> Option<&MemoFile> {
        self.memo.as_ref()
    }

    pub(crate) fn load_memos(&self) -> bool {
        self.load_memos
    }

    /// Header-declared record count, including soft-deleted slots.
    pub fn record_count(&self) -> u32 {
        self.header.record_count
    }

    /// Number of records excluding soft-deleted ones.
    ///
    /// This is the table's effective length. It is computed by a flag-only
    /// scan on first use and memoized; the header-declared total stays
    /// available as [`record_count`](Table::record_count).
    pub fn active_count(&self) -> Result<u32> {
        let scan = self.scan()?;
        Ok(scan.slots - scan.deleted.len() as u32)
    }

    /// Slot ordinals of soft-deleted records.
    ///
    /// Populated lazily by a scan that reads only the deletion flag byte of
    /// each slot, never decoding field payloads.
    pub fn deleted(&self) -> Result<&DeletedRecords> {
        Ok(&self.scan()?.deleted)
    }

    /// Start a fresh pass over the non-deleted records with the default
    /// strict parser.
    pub fn records(&self) -> Result<RecordIterator<'_>> {
        self.records_with(&DEFAULT_PARSER, false)
    }

    /// Start a fresh pass over every record slot, deleted ones included,
    /// with the default strict parser. Consult [`deleted`](Table::deleted)
    /// for which slots are flagged.
    pub fn all_records(&self) -> Result<RecordIterator<'_>> {
        self.records_with(&DEFAULT_PARSER, true)
    }

    /// Start a fresh pass with a caller-supplied codec.
    ///
    /// Fails with [`DbfError::UnknownFieldType`] if any field carries a type
    /// tag the parser does not claim to handle.
    pub fn records_with<'a>(
        &'a self,
        parser: &'a dyn FieldParser,
        include_deleted: bool,
    ) -> Result<RecordIterator<'a>> {
        for field in &self.fields {
            if !parser.can_parse(field) {
                return Err(DbfError::UnknownFieldType {
                    field: field.name.clone(),
                    tag: field.tag,
                });
            }
        }
        RecordIterator::new(self, parser, include_deleted)
    }

    fn scan(&self) -> Result<&ScanResult> {
        if let Some(scan) = self.scan.get() {
            return Ok(scan);
        }
        let scanned = self.run_deletion_scan()?;
        Ok(self.scan.get_or_init(|| scanned))
    }

    fn run_deletion_scan(&self) -> Result<ScanResult> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(self.header.header_len as u64))?;
        let step = self.header.record_len as i64 - 1;

        let mut deleted = DeletedRecords::default();
        let mut slots = 0u32;
        for slot in 0..self.header.record_count {
            let mut flag = [0u8; 1];
            match file.read_exact(&mut flag) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }
            if flag[0] == EOF_MARKER {
                break;
            }
            if flag[0] == DELETED_FLAG {
                deleted.insert(slot);
            }
            slots += 1;
            file.seek(SeekFrom::Current(step))?;
        }

        if slots < self.header.record_count {
            warn!(
                "Table {} declared {} records but the deletion scan found {} slots",
                self.name, self.header.record_count, slots
            );
        }
        Ok(ScanResult { deleted, slots })
    }
}
