//! File header and field descriptor parsing.

use std::collections::HashSet;
use std::io::Read;

use log::{debug, info};
use time::{Date, Month};

use super::cursor::Cursor;
use super::error::{DbfError, Result};
use super::models::{Field, TableHeader};

/// Descriptor area terminator.
const FIELD_TERMINATOR: u8 = 0x0D;
/// Size of the fixed file header and of each field descriptor.
const HEADER_SIZE: usize = 32;
const DESCRIPTOR_SIZE: usize = 32;

/// Parse the DBF file header and field descriptors.
///
/// Fixed header structure (32 bytes):
/// - Byte 0: version/type code
/// - Bytes 1-3: last-update date (YY since 1900, MM, DD, binary)
/// - Bytes 4-7: record count (u32 LE)
/// - Bytes 8-9: header length in bytes (u16 LE)
/// - Bytes 10-11: record length in bytes (u16 LE, includes the deletion flag)
/// - Bytes 12-28: reserved
/// - Byte 29: language driver id
/// - Bytes 30-31: reserved
///
/// Followed by 32-byte field descriptors until a 0x0D terminator:
/// - Bytes 0-10: zero-padded field name
/// - Byte 11: type tag
/// - Bytes 12-15: reserved
/// - Byte 16: field length
/// - Byte 17: decimal count
/// - Bytes 18-31: reserved
///
/// Field byte offsets within a record slot are derived by running sum
/// starting at 1 (offset 0 is the deletion flag).
pub fn parse<R: Read>(file: &mut R) -> Result<(TableHeader, Vec<Field>)> {
    info!("Parsing DBF header");

    let mut header_bytes = [0u8; HEADER_SIZE];
    read_exact(file, &mut header_bytes, "file header")?;
    let header = parse_fixed_header(&header_bytes)?;

    let fields = parse_descriptors(file, &header)?;

    // The slot layout must be consistent with the declared record length.
    let payload_len: usize = fields.iter().map(|f| f.length as usize).sum();
    if payload_len + 1 != header.record_len as usize {
        return Err(DbfError::CorruptHeader(format!(
            "field lengths sum to {} + 1 flag byte, but header declares a record length of {}",
            payload_len, header.record_len
        )));
    }

    info!(
        "Header parsed: version=0x{:02x}, records={}, fields={}, record_len={}",
        header.version,
        header.record_count,
        fields.len(),
        header.record_len
    );

    Ok((header, fields))
}

fn parse_fixed_header(bytes: &[u8; HEADER_SIZE]) -> Result<TableHeader> {
    let mut cur = Cursor::new(bytes, "file header");

    let version = cur.read_u8()?;
    let year = cur.read_u8()?;
    let month = cur.read_u8()?;
    let day = cur.read_u8()?;
    let record_count = cur.read_u32_le()?;
    let header_len = cur.read_u16_le()?;
    let record_len = cur.read_u16_le()?;
    cur.skip(17)?;
    let language_driver = cur.read_u8()?;
    cur.skip(2)?;

    if (header_len as usize) < HEADER_SIZE + 1 {
        return Err(DbfError::CorruptHeader(format!(
            "declared header length {header_len} is shorter than the fixed header"
        )));
    }
    if record_len == 0 {
        return Err(DbfError::CorruptHeader(
            "declared record length is zero".to_string(),
        ));
    }

    let last_update = Month::try_from(month)
        .ok()
        .and_then(|m| Date::from_calendar_date(1900 + year as i32, m, day).ok());
    debug!(
        "Fixed header: version=0x{version:02x}, last_update={last_update:?}, \
         header_len={header_len}, record_len={record_len}, language_driver=0x{language_driver:02x}"
    );

    Ok(TableHeader {
        version,
        last_update,
        record_count,
        header_len,
        record_len,
        language_driver,
    })
}

fn parse_descriptors<R: Read>(file: &mut R, header: &TableHeader) -> Result<Vec<Field>> {
    let mut fields = Vec::new();
    let mut seen_names = HashSet::new();
    // First field payload byte comes after the deletion flag.
    let mut offset = 1usize;
    let mut consumed = HEADER_SIZE;

    loop {
        let mut first = [0u8; 1];
        read_exact(file, &mut first, "field descriptors")?;
        consumed += 1;
        if first[0] == FIELD_TERMINATOR {
            break;
        }

        // The byte just read is the descriptor's first name byte.
        if consumed + DESCRIPTOR_SIZE - 1 > header.header_len as usize {
            return Err(DbfError::CorruptHeader(
                "field descriptors overrun the declared header length".to_string(),
            ));
        }
        let mut rest = [0u8; DESCRIPTOR_SIZE - 1];
        read_exact(file, &mut rest, "field descriptors")?;
        consumed += DESCRIPTOR_SIZE - 1;

        let mut descriptor = [0u8; DESCRIPTOR_SIZE];
        descriptor[0] = first[0];
        descriptor[1..].copy_from_slice(&rest);

        let field = parse_descriptor(&descriptor, offset)?;
        if !seen_names.insert(field.name.clone()) {
            return Err(DbfError::CorruptHeader(format!(
                "duplicate field name {:?}",
                field.name
            )));
        }
        debug!("Field descriptor: {field}");
        offset += field.length as usize;
        fields.push(field);
    }

    Ok(fields)
}

fn parse_descriptor(bytes: &[u8; DESCRIPTOR_SIZE], offset: usize) -> Result<Field> {
    let name_bytes = &bytes[..11];
    let name_end = name_bytes.iter().position(|&b| b == 0).unwrap_or(11);
    let name = std::str::from_utf8(&name_bytes[..name_end])
        .map_err(|_| DbfError::CorruptHeader("field name is not valid text".to_string()))?
        .to_string();
    if name.is_empty() {
        return Err(DbfError::CorruptHeader("empty field name".to_string()));
    }

    Ok(Field {
        name,
        tag: bytes[11] as char,
        length: bytes[16],
        decimal_count: bytes[17],
        offset,
    })
}

/// `read_exact` with truncation mapped to [`DbfError::TruncatedData`].
fn read_exact<R: Read>(file: &mut R, buf: &mut [u8], context: &'static str) -> Result<()> {
    file.read_exact(buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            DbfError::TruncatedData {
                context,
                needed: buf.len(),
            }
        } else {
            DbfError::Io(e)
        }
    })
}
