//! Shared fixture builders: well-formed DBF, FPT and DBT byte images
//! assembled in memory and written into temp directories.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

const HEADER_SIZE: usize = 32;
const DESCRIPTOR_SIZE: usize = 32;

/// `(name, type tag, length, decimal count)`
pub type FieldDef<'a> = (&'a str, u8, u8, u8);

/// Build one record: deletion flag plus exact per-field payloads.
pub fn rec(flag: u8, values: &[&[u8]]) -> (u8, Vec<Vec<u8>>) {
    (flag, values.iter().map(|v| v.to_vec()).collect())
}

pub fn build_dbf(
    version: u8,
    language_driver: u8,
    fields: &[FieldDef],
    records: &[(u8, Vec<Vec<u8>>)],
    trailing_eof: bool,
) -> Vec<u8> {
    build_dbf_with_record_len(version, language_driver, fields, records, trailing_eof, None)
}

/// Like [`build_dbf`] but with an explicit (possibly inconsistent) declared
/// record length, for corrupt-header tests.
pub fn build_dbf_with_record_len(
    version: u8,
    language_driver: u8,
    fields: &[FieldDef],
    records: &[(u8, Vec<Vec<u8>>)],
    trailing_eof: bool,
    record_len_override: Option<u16>,
) -> Vec<u8> {
    let header_len = (HEADER_SIZE + fields.len() * DESCRIPTOR_SIZE + 1) as u16;
    let payload_len: usize = fields.iter().map(|&(_, _, len, _)| len as usize).sum();
    let record_len = record_len_override.unwrap_or((payload_len + 1) as u16);

    let mut out = vec![0u8; HEADER_SIZE];
    out[0] = version;
    out[1] = 95; // last update 1995-07-26
    out[2] = 7;
    out[3] = 26;
    out[4..8].copy_from_slice(&(records.len() as u32).to_le_bytes());
    out[8..10].copy_from_slice(&header_len.to_le_bytes());
    out[10..12].copy_from_slice(&record_len.to_le_bytes());
    out[29] = language_driver;

    for &(name, tag, length, decimals) in fields {
        let mut d = [0u8; DESCRIPTOR_SIZE];
        assert!(name.len() <= 10, "field name too long: {name}");
        d[..name.len()].copy_from_slice(name.as_bytes());
        d[11] = tag;
        d[16] = length;
        d[17] = decimals;
        out.extend_from_slice(&d);
    }
    out.push(0x0D);

    for (flag, values) in records {
        out.push(*flag);
        assert_eq!(values.len(), fields.len(), "record shape mismatch");
        for (value, &(name, _, length, _)) in values.iter().zip(fields) {
            assert_eq!(
                value.len(),
                length as usize,
                "payload length mismatch for field {name}"
            );
            out.extend_from_slice(value);
        }
    }
    if trailing_eof {
        out.push(0x1A);
    }
    out
}

/// Build an FPT memo file. Returns the bytes and the block index of each
/// supplied `(record type, content)` pair.
pub fn build_fpt(block_size: u32, blocks: &[(u32, &[u8])]) -> (Vec<u8>, Vec<u32>) {
    let mut out = vec![0u8; 512];
    out[6..8].copy_from_slice(&(block_size as u16).to_be_bytes());

    let mut indices = Vec::new();
    for &(record_type, data) in blocks {
        while out.len() % block_size as usize != 0 {
            out.push(0);
        }
        indices.push((out.len() / block_size as usize) as u32);
        out.extend_from_slice(&record_type.to_be_bytes());
        out.extend_from_slice(&(data.len() as u32).to_be_bytes());
        out.extend_from_slice(data);
    }
    (out, indices)
}

/// Build a dBASE III DBT memo file (512-byte blocks, 0x1A1A terminator).
/// Returns the bytes and the block index of each supplied content slice.
pub fn build_dbt(blocks: &[&[u8]]) -> (Vec<u8>, Vec<u32>) {
    let mut out = vec![0u8; 512];
    let mut indices = Vec::new();
    for data in blocks {
        indices.push((out.len() / 512) as u32);
        out.extend_from_slice(data);
        out.extend_from_slice(&[0x1A, 0x1A]);
        while out.len() % 512 != 0 {
            out.push(0);
        }
    }
    (out, indices)
}

pub fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, bytes).expect("write fixture");
    path
}

/// ASCII memo block index, right-aligned in a 10-byte memo field.
pub fn memo_index_ascii(index: u32) -> Vec<u8> {
    format!("{index:>10}").into_bytes()
}
