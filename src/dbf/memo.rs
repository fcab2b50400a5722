//! Companion memo file location and block reading.
//!
//! Memo-typed fields store a block index; the variable-length content lives
//! in a sibling file next to the table. Two on-disk sub-formats are
//! supported, distinguished by file extension:
//!
//! - `.fpt` (FoxPro): length-prefixed blocks. The file header carries the
//!   block size (u16 BE at offset 6); each block starts with a 4-byte BE
//!   record type (1 = text, anything else is binary) and a 4-byte BE
//!   content length.
//! - `.dbt` (dBASE III): fixed 512-byte blocks. Content starts at
//!   `index * 512` and runs to a `0x1A 0x1A` terminator, spanning
//!   consecutive blocks if needed.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, ReadBytesExt};
use log::{debug, info};

use super::error::{DbfError, Result};

/// dBASE III memo block granularity.
const DBT_BLOCK_SIZE: u64 = 512;
/// Content terminator in dBASE III memo files.
const DBT_TERMINATOR: [u8; 2] = [0x1A, 0x1A];

/// Memo sub-format, detected from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoFormat {
    /// FoxPro length-prefixed blocks of `block_size` bytes.
    Fpt { block_size: u32 },
    /// dBASE III fixed 512-byte blocks with a text terminator.
    Dbt,
}

/// Content classification of a resolved memo block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoKind {
    Text,
    Binary,
}

/// A resolved memo block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoBlock {
    pub kind: MemoKind,
    pub data: Vec<u8>,
}

/// A located and validated memo file.
///
/// Owns no open handle itself; each iteration pass obtains its own
/// [`MemoReader`] so independent passes never interfere.
#[derive(Debug)]
pub struct MemoFile {
    path: PathBuf,
    format: MemoFormat,
}

impl MemoFile {
    /// Find the companion memo file for `table_path`.
    ///
    /// Scans the table's directory for a sibling whose stem matches the
    /// table's stem and whose extension is `fpt` or `dbt`, both compared
    /// case-insensitively. `.fpt` wins when both exist.
    pub fn locate(table_path: &Path) -> Option<PathBuf> {
        let stem = table_path.file_stem()?.to_str()?.to_lowercase();
        // A bare file name has an empty parent, meaning the current directory.
        let parent = table_path.parent()?;
        let dir = if parent.as_os_str().is_empty() {
            Path::new(".")
        } else {
            parent
        };

        let mut candidates: Vec<(usize, PathBuf)> = Vec::new();
        for entry in dir.read_dir().ok()? {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(_) => continue,
            };
            let entry_stem = match path.file_stem().and_then(|s| s.to_str()) {
                Some(s) => s.to_lowercase(),
                None => continue,
            };
            if entry_stem != stem {
                continue;
            }
            let ext = match path.extension().and_then(|e| e.to_str()) {
                Some(e) => e.to_lowercase(),
                None => continue,
            };
            let rank = match ext.as_str() {
                "fpt" => 0,
                "dbt" => 1,
                _ => continue,
            };
            candidates.push((rank, path));
        }
        candidates.sort();
        let found = candidates.into_iter().map(|(_, p)| p).next();
        if let Some(ref path) = found {
            debug!("Located memo file: {}", path.display());
        }
        found
    }

    /// Open and validate a memo file.
    ///
    /// For `.fpt` files this reads the block size from the file header;
    /// `.dbt` files have no metadata worth validating up front.
    pub fn open(path: PathBuf) -> Result<Self> {
        let is_fpt = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("fpt"));

        let format = if is_fpt {
            let mut file = File::open(&path)?;
            file.seek(SeekFrom::Start(6))?;
            let block_size = file
                .read_u16::<BigEndian>()
                .map_err(|_| DbfError::CorruptMemo("memo file header too short".to_string()))?
                as u32;
            if block_size == 0 {
                return Err(DbfError::CorruptMemo(
                    "memo file declares a block size of zero".to_string(),
                ));
            }
            MemoFormat::Fpt { block_size }
        } else {
            MemoFormat::Dbt
        };

        info!("Opened memo file {} ({:?})", path.display(), format);
        Ok(Self { path, format })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a fresh read handle for one iteration pass.
    pub fn reader(&self) -> Result<MemoReader> {
        Ok(MemoReader {
            file: File::open(&self.path)?,
            format: self.format,
        })
    }
}

/// An open handle on a memo file, owned by a single iteration pass.
#[derive(Debug)]
pub struct MemoReader {
    file: File,
    format: MemoFormat,
}

impl MemoReader {
    /// Resolve the memo block at `index`.
    ///
    /// Index 0 is the format's "no memo" sentinel and is handled by the
    /// field parser before this is called.
    pub fn read_block(&mut self, index: u32) -> Result<MemoBlock> {
        match self.format {
            MemoFormat::Fpt { block_size } => self.read_fpt_block(index, block_size),
            MemoFormat::Dbt => self.read_dbt_block(index),
        }
    }

    fn read_fpt_block(&mut self, index: u32, block_size: u32) -> Result<MemoBlock> {
        self.file
            .seek(SeekFrom::Start(index as u64 * block_size as u64))?;

        let record_type = self
            .file
            .read_u32::<BigEndian>()
            .map_err(|_| corrupt_block(index, "missing block header"))?;
        let length = self
            .file
            .read_u32::<BigEndian>()
            .map_err(|_| corrupt_block(index, "missing block header"))?;

        // The declared length is untrusted; check it against the file before
        // allocating.
        let content_start = index as u64 * block_size as u64 + 8;
        let available = self.file.metadata()?.len().saturating_sub(content_start);
        if length as u64 > available {
            return Err(corrupt_block(index, "declared length exceeds file size"));
        }

        let mut data = vec![0u8; length as usize];
        self.file
            .read_exact(&mut data)
            .map_err(|_| corrupt_block(index, "content shorter than declared length"))?;

        let kind = if record_type == 1 {
            MemoKind::Text
        } else {
            MemoKind::Binary
        };
        Ok(MemoBlock { kind, data })
    }

    fn read_dbt_block(&mut self, index: u32) -> Result<MemoBlock> {
        self.file
            .seek(SeekFrom::Start(index as u64 * DBT_BLOCK_SIZE))?;

        let mut data = Vec::new();
        let mut buf = [0u8; DBT_BLOCK_SIZE as usize];
        let mut scan_from = 0usize;
        loop {
            let n = self.file.read(&mut buf)?;
            if n == 0 {
                return Err(corrupt_block(index, "missing 0x1A1A terminator"));
            }
            data.extend_from_slice(&buf[..n]);

            if let Some(pos) = data[scan_from..]
                .windows(2)
                .position(|w| w == DBT_TERMINATOR)
            {
                data.truncate(scan_from + pos);
                // dBASE III memos carry no type marker; they are text.
                return Ok(MemoBlock {
                    kind: MemoKind::Text,
                    data,
                });
            }
            // The terminator may straddle a read boundary.
            scan_from = data.len().saturating_sub(1);
        }
    }
}

fn corrupt_block(index: u32, detail: &str) -> DbfError {
    DbfError::CorruptMemo(format!("block {index}: {detail}"))
}
