//! Data structures representing DBF format components.

use std::collections::BTreeSet;
use std::fmt;

use time::{Date, PrimitiveDateTime};

/// Parsed fixed 32-byte file header.
#[derive(Debug, Clone)]
pub struct TableHeader {
    /// Version/type code from byte 0.
    pub version: u8,
    /// Last-update date from bytes 1-3 (year stored as offset from 1900).
    /// `None` when the stored bytes do not form a valid calendar date.
    pub last_update: Option<Date>,
    /// Declared number of record slots (including soft-deleted ones).
    pub record_count: u32,
    /// Total header length in bytes; the first record slot starts here.
    pub header_len: u16,
    /// Length of one record slot, including the 1-byte deletion flag.
    pub record_len: u16,
    /// Language driver id from byte 29, used to resolve the text encoding.
    pub language_driver: u8,
}

impl TableHeader {
    /// Human-readable name for the version byte.
    pub fn version_description(&self) -> String {
        match self.version {
            0x02 => "FoxBASE".to_string(),
            0x03 => "FoxBASE+/dBASE III PLUS, no memo".to_string(),
            0x30 => "Visual FoxPro".to_string(),
            0x31 => "Visual FoxPro, autoincrement enabled".to_string(),
            0x32 => "Visual FoxPro with varchar/varbinary".to_string(),
            0x43 => "dBASE IV SQL table files, no memo".to_string(),
            0x63 => "dBASE IV SQL system files, no memo".to_string(),
            0x83 => "FoxBASE+/dBASE III PLUS, with memo".to_string(),
            0x8B => "dBASE IV with memo".to_string(),
            0xCB => "dBASE IV SQL table files, with memo".to_string(),
            0xF5 => "FoxPro 2.x (or earlier) with memo".to_string(),
            0xFB => "FoxBASE".to_string(),
            other => format!("unknown (0x{other:02x})"),
        }
    }
}

/// One column of the table, parsed from a 32-byte field descriptor.
///
/// Immutable once parsed. The byte offset within a record slot is derived
/// from the cumulative lengths of the preceding fields; it is not stored in
/// the raw descriptor.
#[derive(Debug, Clone)]
pub struct Field {
    /// Field name (at most 10 bytes on disk, unique within a table).
    pub name: String,
    /// Single-character type tag (`C`, `N`, `D`, `L`, `M`, ...).
    pub tag: char,
    /// Field width in bytes within the record slot.
    pub length: u8,
    /// Decimal places for numeric types.
    pub decimal_count: u8,
    /// Byte offset within the record slot. Offset 0 is the deletion flag,
    /// so the first field starts at 1.
    pub offset: usize,
}

impl Field {
    /// Whether this field stores a block index into the companion memo file.
    ///
    /// `B` doubles as a Visual FoxPro 8-byte double and a dBASE binary memo
    /// reference; only the latter needs the memo file.
    pub fn is_memo(&self) -> bool {
        match self.tag {
            'M' | 'G' | 'P' => true,
            'B' => self.length != 8,
            _ => false,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} {})", self.name, self.tag, self.length)
    }
}

/// Raw bytes that failed type-directed decoding.
///
/// Produced instead of an error when the caller opts into the tolerant
/// parser; carries the original bytes for inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidValue(Vec<u8>);

impl InvalidValue {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self(data.into())
    }

    /// The undecoded field bytes, exactly as stored in the record slot.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for InvalidValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InvalidValue({:?})", String::from_utf8_lossy(&self.0))
    }
}

/// A decoded field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `C` fields, right-trimmed and decoded with the table encoding.
    Character(String),
    /// `N` fields without a decimal point, `I` integer fields.
    Integer(i64),
    /// `N` fields with decimals, `F`, `Y` and VFP `B` double fields.
    Float(f64),
    /// `D` fields.
    Date(Date),
    /// `T` datetime fields.
    DateTime(PrimitiveDateTime),
    /// `L` fields.
    Logical(bool),
    /// Resolved text memo content.
    Memo(String),
    /// Resolved binary memo content (`G`, `P`, binary `M`/`B`).
    Blob(Vec<u8>),
    /// Undecodable bytes, surfaced by the tolerant parser.
    Invalid(InvalidValue),
    /// Blank/absent value (empty date, all-blank numeric, memo index 0, ...).
    Null,
}

/// One decoded record: an ordered name → value mapping.
///
/// Entry order always equals the table's field order. Records are built
/// during iteration and never cached by the table itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    entries: Vec<(String, Value)>,
}

impl Record {
    pub(crate) fn new(entries: Vec<(String, Value)>) -> Self {
        Self { entries }
    }

    /// Look up a value by field name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Iterate `(name, value)` pairs in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Field names in field order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Slot ordinals (0-based) of records flagged deleted.
///
/// Populated by a flag-only scan that never decodes field payloads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletedRecords {
    slots: BTreeSet<u32>,
}

impl DeletedRecords {
    pub(crate) fn insert(&mut self, slot: u32) {
        self.slots.insert(slot);
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, slot: u32) -> bool {
        self.slots.contains(&slot)
    }

    /// Deleted slot ordinals in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.slots.iter().copied()
    }
}
