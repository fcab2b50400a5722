//! Iteration over fixed-length record slots.
//!
//! Each pass owns a fresh file handle (and memo handle) and seeks to the end
//! of the header, so any number of independent passes over the same
//! [`Table`] can run without interfering. A pass is a small state machine:
//! positioned-at-header-end → reading-slot → emit record, skip deleted, or
//! end of table.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};

use log::warn;

use super::error::{DbfError, Result};
use super::memo::MemoReader;
use super::models::Record;
use super::parser::{FieldParser, ParseContext};
use super::{Table, DELETED_FLAG, EOF_MARKER};

/// One iteration pass over a table's record slots.
///
/// Yields `Result<Record>`: a decode failure is scoped to that record, and
/// iteration of later slots continues if the caller keeps pulling.
pub struct RecordIterator<'a> {
    table: &'a Table,
    parser: &'a dyn FieldParser,
    file: BufReader<File>,
    memo: Option<MemoReader>,
    include_deleted: bool,
    slot: u32,
    done: bool,
}

impl std::fmt::Debug for RecordIterator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordIterator")
            .field("table", &self.table)
            .field("include_deleted", &self.include_deleted)
            .field("slot", &self.slot)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl<'a> RecordIterator<'a> {
    pub(super) fn new(
        table: &'a Table,
        parser: &'a dyn FieldParser,
        include_deleted: bool,
    ) -> Result<Self> {
        let mut file = BufReader::new(File::open(table.path())?);
        file.seek(SeekFrom::Start(table.header().header_len as u64))?;
        let memo = table.memo_file().map(|m| m.reader()).transpose()?;
        Ok(Self {
            table,
            parser,
            file,
            memo,
            include_deleted,
            slot: 0,
            done: false,
        })
    }

    fn end_of_data(&mut self) {
        if self.slot < self.table.header().record_count {
            warn!(
                "Table {} declared {} records but data ended after {} slots",
                self.table.name(),
                self.table.header().record_count,
                self.slot
            );
        }
        self.done = true;
    }

    fn decode_record(&mut self, payload: &[u8]) -> Result<Record> {
        let table = self.table;
        let parser = self.parser;
        let mut ctx = ParseContext {
            encoding: table.encoding(),
            memo: self.memo.as_mut(),
            load_memos: table.load_memos(),
        };

        let mut entries = Vec::with_capacity(table.fields().len());
        for field in table.fields() {
            let start = field.offset - 1;
            let data = &payload[start..start + field.length as usize];
            let value = parser.parse(field, data, &mut ctx)?;
            entries.push((field.name.clone(), value));
        }
        Ok(Record::new(entries))
    }
}

impl Iterator for RecordIterator<'_> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done || self.slot >= self.table.header().record_count {
                self.done = true;
                return None;
            }

            let mut flag = [0u8; 1];
            match self.file.read_exact(&mut flag) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    self.end_of_data();
                    return None;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
            }
            if flag[0] == EOF_MARKER {
                self.end_of_data();
                return None;
            }

            let payload_len = self.table.header().record_len as usize - 1;
            let mut payload = vec![0u8; payload_len];
            if let Err(e) = self.file.read_exact(&mut payload) {
                self.done = true;
                return Some(Err(if e.kind() == std::io::ErrorKind::UnexpectedEof {
                    DbfError::TruncatedData {
                        context: "record slot",
                        needed: payload_len,
                    }
                } else {
                    e.into()
                }));
            }
            self.slot += 1;

            if flag[0] == DELETED_FLAG && !self.include_deleted {
                // Cheap skip: the payload is never decoded.
                continue;
            }
            return Some(self.decode_record(&payload));
        }
    }
}
