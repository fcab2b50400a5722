//! Pluggable per-type field decoding.
//!
//! [`FieldParser`] maps a field's type tag to a decoding method. Every
//! per-type method has a default implementation and can be overridden
//! independently, so new or exotic type tags are added by implementing the
//! trait and overriding what differs — the dispatch itself never needs
//! modification. [`dispatch`] is the shared tag → method lookup; a custom
//! `parse` override can call it to fall back to the default behaviour.

use byteorder::{ByteOrder, LittleEndian};
use encoding_rs::Encoding;
use time::{Date, Month, PrimitiveDateTime, Time};

use super::error::{DbfError, Result};
use super::memo::{MemoBlock, MemoKind, MemoReader};
use super::models::{Field, InvalidValue, Value};

/// Per-pass decoding context handed to every parse call.
///
/// `memo` is `None` when the table has no memo file and missing-memo
/// tolerance is configured; memo-typed fields then decode to [`Value::Null`].
/// With `load_memos` unset, memo-typed fields decode to their raw block
/// index instead of resolved content.
pub struct ParseContext<'a> {
    pub encoding: &'static Encoding,
    pub memo: Option<&'a mut MemoReader>,
    pub load_memos: bool,
}

/// Tag → method lookup shared by the default `parse` and by overriders
/// that want to fall back to it.
pub fn dispatch<P: FieldParser + ?Sized>(
    parser: &P,
    field: &Field,
    data: &[u8],
    ctx: &mut ParseContext<'_>,
) -> Result<Value> {
    match field.tag {
        'C' => parser.parse_character(field, data, ctx),
        'N' => parser.parse_numeric(field, data, ctx),
        'F' => parser.parse_float(field, data, ctx),
        'D' => parser.parse_date(field, data, ctx),
        'L' => parser.parse_logical(field, data, ctx),
        'I' => parser.parse_integer(field, data, ctx),
        'T' => parser.parse_datetime(field, data, ctx),
        'Y' => parser.parse_currency(field, data, ctx),
        'B' => parser.parse_double_or_binary(field, data, ctx),
        'M' => parser.parse_memo(field, data, ctx),
        'G' | 'P' => parser.parse_binary_memo(field, data, ctx),
        tag => Err(DbfError::UnknownFieldType {
            field: field.name.clone(),
            tag,
        }),
    }
}

/// Extensible codec translating raw field bytes into typed values.
pub trait FieldParser {
    /// Whether this parser handles the field's type tag. Checked once per
    /// field before a pass starts, so unknown tags fail early instead of on
    /// the first record.
    fn can_parse(&self, field: &Field) -> bool {
        matches!(
            field.tag,
            'C' | 'N' | 'F' | 'D' | 'L' | 'I' | 'T' | 'Y' | 'B' | 'M' | 'G' | 'P'
        )
    }

    /// Decode one field's raw bytes.
    ///
    /// The default implementation dispatches on the type tag; override it to
    /// change the error policy (see [`TolerantFieldParser`]) or wrap the
    /// defaults wholesale.
    fn parse(&self, field: &Field, data: &[u8], ctx: &mut ParseContext<'_>) -> Result<Value> {
        dispatch(self, field, data, ctx)
    }

    /// `C`: text decoded with the table encoding, right-trimmed.
    fn parse_character(
        &self,
        _field: &Field,
        data: &[u8],
        ctx: &mut ParseContext<'_>,
    ) -> Result<Value> {
        let (text, _, _) = ctx.encoding.decode(data);
        Ok(Value::Character(
            text.trim_end_matches(&[' ', '\0'][..]).to_string(),
        ))
    }

    /// `N`: integer when the content has no decimal point, float otherwise.
    /// All-blank content is the blank sentinel and decodes to `Null`.
    fn parse_numeric(
        &self,
        field: &Field,
        data: &[u8],
        _ctx: &mut ParseContext<'_>,
    ) -> Result<Value> {
        let trimmed = trim_numeric(data);
        if trimmed.is_empty() {
            return Ok(Value::Null);
        }
        let text =
            std::str::from_utf8(trimmed).map_err(|_| decode_error(field, data))?;
        if let Ok(n) = text.parse::<i64>() {
            return Ok(Value::Integer(n));
        }
        // Some writers use a comma as the decimal separator.
        text.replace(',', ".")
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| decode_error(field, data))
    }

    /// `F`: always a float; blank decodes to `Null`.
    fn parse_float(
        &self,
        field: &Field,
        data: &[u8],
        _ctx: &mut ParseContext<'_>,
    ) -> Result<Value> {
        let trimmed = trim_numeric(data);
        if trimmed.is_empty() {
            return Ok(Value::Null);
        }
        std::str::from_utf8(trimmed)
            .ok()
            .and_then(|s| s.replace(',', ".").parse::<f64>().ok())
            .map(Value::Float)
            .ok_or_else(|| decode_error(field, data))
    }

    /// `D`: eight ASCII digits, `YYYYMMDD`; blank decodes to `Null`.
    fn parse_date(
        &self,
        field: &Field,
        data: &[u8],
        _ctx: &mut ParseContext<'_>,
    ) -> Result<Value> {
        if data.iter().all(|&b| b == b' ' || b == 0) {
            return Ok(Value::Null);
        }
        let text = std::str::from_utf8(data).map_err(|_| decode_error(field, data))?;
        if text.len() != 8 {
            return Err(decode_error(field, data));
        }
        let year: i32 = text[0..4].parse().map_err(|_| decode_error(field, data))?;
        let month: u8 = text[4..6].parse().map_err(|_| decode_error(field, data))?;
        let day: u8 = text[6..8].parse().map_err(|_| decode_error(field, data))?;
        Month::try_from(month)
            .ok()
            .and_then(|m| Date::from_calendar_date(year, m, day).ok())
            .map(Value::Date)
            .ok_or_else(|| decode_error(field, data))
    }

    /// `L`: single byte, `T/t/Y/y` true, `F/f/N/n` false, space or `?` null.
    fn parse_logical(
        &self,
        field: &Field,
        data: &[u8],
        _ctx: &mut ParseContext<'_>,
    ) -> Result<Value> {
        match data.first() {
            Some(b'T' | b't' | b'Y' | b'y') => Ok(Value::Logical(true)),
            Some(b'F' | b'f' | b'N' | b'n') => Ok(Value::Logical(false)),
            Some(b' ' | b'?') | None => Ok(Value::Null),
            Some(_) => Err(decode_error(field, data)),
        }
    }

    /// `I`: 4-byte signed integer, little-endian.
    fn parse_integer(
        &self,
        field: &Field,
        data: &[u8],
        _ctx: &mut ParseContext<'_>,
    ) -> Result<Value> {
        if data.len() != 4 {
            return Err(decode_error(field, data));
        }
        Ok(Value::Integer(LittleEndian::read_i32(data) as i64))
    }

    /// `T`: 4-byte LE Julian day number + 4-byte LE milliseconds since
    /// midnight; blank or zero decodes to `Null`.
    fn parse_datetime(
        &self,
        field: &Field,
        data: &[u8],
        _ctx: &mut ParseContext<'_>,
    ) -> Result<Value> {
        if data.iter().all(|&b| b == b' ' || b == 0) {
            return Ok(Value::Null);
        }
        if data.len() != 8 {
            return Err(decode_error(field, data));
        }
        let julian_day = LittleEndian::read_u32(&data[0..4]);
        let millis = LittleEndian::read_u32(&data[4..8]);
        let date = Date::from_julian_day(julian_day as i32)
            .map_err(|_| decode_error(field, data))?;
        // Milliseconds since midnight must fit within one day.
        if millis >= 86_400_000 {
            return Err(decode_error(field, data));
        }
        let secs = millis / 1000;
        let (hour, minute, second) = (secs / 3600, (secs / 60) % 60, secs % 60);
        let time = Time::from_hms_milli(
            u8::try_from(hour).map_err(|_| decode_error(field, data))?,
            minute as u8,
            second as u8,
            (millis % 1000) as u16,
        )
        .map_err(|_| decode_error(field, data))?;
        Ok(Value::DateTime(PrimitiveDateTime::new(date, time)))
    }

    /// `Y`: 8-byte LE integer scaled by 10^-4.
    fn parse_currency(
        &self,
        field: &Field,
        data: &[u8],
        _ctx: &mut ParseContext<'_>,
    ) -> Result<Value> {
        if data.len() != 8 {
            return Err(decode_error(field, data));
        }
        Ok(Value::Float(LittleEndian::read_i64(data) as f64 / 10_000.0))
    }

    /// `B`: an 8-byte LE double in Visual FoxPro tables, a binary memo
    /// reference in dBASE tables. Distinguished by the declared field length.
    fn parse_double_or_binary(
        &self,
        field: &Field,
        data: &[u8],
        ctx: &mut ParseContext<'_>,
    ) -> Result<Value> {
        if field.length == 8 && data.len() == 8 {
            Ok(Value::Float(LittleEndian::read_f64(data)))
        } else {
            self.parse_binary_memo(field, data, ctx)
        }
    }

    /// `M`: resolve the block index through the memo reader; text memos
    /// decode with the table encoding, binary memos stay raw.
    fn parse_memo(&self, field: &Field, data: &[u8], ctx: &mut ParseContext<'_>) -> Result<Value> {
        if !ctx.load_memos {
            return unresolved_index(field, data);
        }
        match resolve_memo(field, data, ctx)? {
            None => Ok(Value::Null),
            Some(block) => match block.kind {
                MemoKind::Text => {
                    let (text, _, _) = ctx.encoding.decode(&block.data);
                    Ok(Value::Memo(text.into_owned()))
                }
                MemoKind::Binary => Ok(Value::Blob(block.data)),
            },
        }
    }

    /// `G`/`P` (and binary `B`): resolved memo content kept as raw bytes.
    fn parse_binary_memo(
        &self,
        field: &Field,
        data: &[u8],
        ctx: &mut ParseContext<'_>,
    ) -> Result<Value> {
        if !ctx.load_memos {
            return unresolved_index(field, data);
        }
        match resolve_memo(field, data, ctx)? {
            None => Ok(Value::Null),
            Some(block) => Ok(Value::Blob(block.data)),
        }
    }
}

/// Extract the block index from a memo-typed field's raw bytes.
///
/// Dialect-dependent: 4 binary bytes hold a u32 LE, wider fields hold
/// right-aligned ASCII digits. Index 0 and blank are the "no memo" sentinel.
pub fn memo_index(field: &Field, data: &[u8]) -> Result<Option<u32>> {
    let index = if data.len() == 4 {
        LittleEndian::read_u32(data)
    } else {
        let trimmed = trim_numeric(data);
        if trimmed.is_empty() {
            return Ok(None);
        }
        std::str::from_utf8(trimmed)
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .ok_or_else(|| decode_error(field, data))?
    };
    Ok(if index == 0 { None } else { Some(index) })
}

/// The `load_memos = false` rendering of a memo field: its raw block index.
fn unresolved_index(field: &Field, data: &[u8]) -> Result<Value> {
    Ok(match memo_index(field, data)? {
        None => Value::Null,
        Some(index) => Value::Integer(index as i64),
    })
}

fn resolve_memo(
    field: &Field,
    data: &[u8],
    ctx: &mut ParseContext<'_>,
) -> Result<Option<MemoBlock>> {
    let index = match memo_index(field, data)? {
        // "No memo" sentinel: never touches the memo file.
        None => return Ok(None),
        Some(index) => index,
    };
    match ctx.memo.as_deref_mut() {
        // Missing memo file with tolerance configured.
        None => Ok(None),
        Some(reader) => reader.read_block(index).map(Some),
    }
}

fn trim_numeric(data: &[u8]) -> &[u8] {
    let is_pad = |b: &u8| matches!(*b, b' ' | b'\t' | b'\r' | b'\n' | 0 | b'*');
    let start = data.iter().position(|b| !is_pad(b)).unwrap_or(data.len());
    let end = data.iter().rposition(|b| !is_pad(b)).map_or(start, |p| p + 1);
    &data[start..end]
}

fn decode_error(field: &Field, data: &[u8]) -> DbfError {
    DbfError::ValueDecode {
        field: field.name.clone(),
        data: data.to_vec(),
    }
}

/// The strict default codec: a decode failure on any field propagates as
/// [`DbfError::ValueDecode`] and aborts the current record.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultFieldParser;

impl FieldParser for DefaultFieldParser {}

/// A tolerant codec: decode failures become inspectable
/// [`Value::Invalid`] sentinels carrying the raw bytes, instead of errors.
#[derive(Debug, Default, Clone, Copy)]
pub struct TolerantFieldParser;

impl FieldParser for TolerantFieldParser {
    fn parse(&self, field: &Field, data: &[u8], ctx: &mut ParseContext<'_>) -> Result<Value> {
        match dispatch(self, field, data, ctx) {
            Err(DbfError::ValueDecode { data, .. }) => {
                Ok(Value::Invalid(InvalidValue::new(data)))
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::WINDOWS_1252;

    fn field(name: &str, tag: char, length: u8, decimals: u8) -> Field {
        Field {
            name: name.to_string(),
            tag,
            length,
            decimal_count: decimals,
            offset: 1,
        }
    }

    fn ctx() -> ParseContext<'static> {
        ParseContext {
            encoding: WINDOWS_1252,
            memo: None,
            load_memos: true,
        }
    }

    #[test]
    fn character_is_right_trimmed() {
        let f = field("NAME", 'C', 10, 0);
        let v = DefaultFieldParser.parse(&f, b"Alice     ", &mut ctx()).unwrap();
        assert_eq!(v, Value::Character("Alice".to_string()));
    }

    #[test]
    fn numeric_integer_and_float() {
        let f = field("AGE", 'N', 3, 0);
        assert_eq!(
            DefaultFieldParser.parse(&f, b" 42", &mut ctx()).unwrap(),
            Value::Integer(42)
        );
        let f = field("PRICE", 'N', 7, 2);
        assert_eq!(
            DefaultFieldParser.parse(&f, b"  19.99", &mut ctx()).unwrap(),
            Value::Float(19.99)
        );
    }

    #[test]
    fn blank_numeric_is_null() {
        let f = field("AGE", 'N', 3, 0);
        assert_eq!(
            DefaultFieldParser.parse(&f, b"   ", &mut ctx()).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn unparsable_numeric_is_a_decode_error() {
        let f = field("AGE", 'N', 3, 0);
        let err = DefaultFieldParser.parse(&f, b"12X", &mut ctx()).unwrap_err();
        match err {
            DbfError::ValueDecode { field, data } => {
                assert_eq!(field, "AGE");
                assert_eq!(data, b"12X");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn tolerant_parser_wraps_raw_bytes() {
        let f = field("AGE", 'N', 3, 0);
        let v = TolerantFieldParser.parse(&f, b"12X", &mut ctx()).unwrap();
        assert_eq!(v, Value::Invalid(InvalidValue::new(b"12X".to_vec())));
    }

    #[test]
    fn date_parsing() {
        let f = field("DOB", 'D', 8, 0);
        assert_eq!(
            DefaultFieldParser.parse(&f, b"19870312", &mut ctx()).unwrap(),
            Value::Date(Date::from_calendar_date(1987, Month::March, 12).unwrap())
        );
        assert_eq!(
            DefaultFieldParser.parse(&f, b"        ", &mut ctx()).unwrap(),
            Value::Null
        );
        assert!(DefaultFieldParser.parse(&f, b"19871332", &mut ctx()).is_err());
    }

    #[test]
    fn logical_parsing() {
        let f = field("OK", 'L', 1, 0);
        assert_eq!(
            DefaultFieldParser.parse(&f, b"T", &mut ctx()).unwrap(),
            Value::Logical(true)
        );
        assert_eq!(
            DefaultFieldParser.parse(&f, b"n", &mut ctx()).unwrap(),
            Value::Logical(false)
        );
        assert_eq!(
            DefaultFieldParser.parse(&f, b"?", &mut ctx()).unwrap(),
            Value::Null
        );
        assert!(DefaultFieldParser.parse(&f, b"x", &mut ctx()).is_err());
    }

    #[test]
    fn integer_field_is_little_endian() {
        let f = field("ID", 'I', 4, 0);
        assert_eq!(
            DefaultFieldParser
                .parse(&f, &(-7i32).to_le_bytes(), &mut ctx())
                .unwrap(),
            Value::Integer(-7)
        );
    }

    #[test]
    fn datetime_parsing() {
        let f = field("TS", 'T', 8, 0);
        // JDN 2451545 is 2000-01-01; 12:30:05.250 past midnight.
        let mut data = Vec::new();
        data.extend_from_slice(&2451545u32.to_le_bytes());
        let ms = (12 * 3600 + 30 * 60 + 5) * 1000 + 250;
        data.extend_from_slice(&(ms as u32).to_le_bytes());
        let expected = PrimitiveDateTime::new(
            Date::from_calendar_date(2000, Month::January, 1).unwrap(),
            Time::from_hms_milli(12, 30, 5, 250).unwrap(),
        );
        assert_eq!(
            DefaultFieldParser.parse(&f, &data, &mut ctx()).unwrap(),
            Value::DateTime(expected)
        );
    }

    #[test]
    fn datetime_time_word_past_midnight_is_a_decode_error() {
        let f = field("TS", 'T', 8, 0);
        // Claims hour 268; must not wrap into a plausible time.
        let mut data = Vec::new();
        data.extend_from_slice(&2451545u32.to_le_bytes());
        data.extend_from_slice(&(268u32 * 3600 * 1000).to_le_bytes());
        let err = DefaultFieldParser.parse(&f, &data, &mut ctx()).unwrap_err();
        assert!(matches!(err, DbfError::ValueDecode { .. }), "{err}");

        // The last representable millisecond of the day still decodes.
        let mut data = Vec::new();
        data.extend_from_slice(&2451545u32.to_le_bytes());
        data.extend_from_slice(&86_399_999u32.to_le_bytes());
        assert_eq!(
            DefaultFieldParser.parse(&f, &data, &mut ctx()).unwrap(),
            Value::DateTime(PrimitiveDateTime::new(
                Date::from_calendar_date(2000, Month::January, 1).unwrap(),
                Time::from_hms_milli(23, 59, 59, 999).unwrap(),
            ))
        );
    }

    #[test]
    fn memo_sentinel_resolves_to_null_without_a_memo_reader() {
        let f = field("NOTES", 'M', 10, 0);
        assert_eq!(
            DefaultFieldParser
                .parse(&f, b"         0", &mut ctx())
                .unwrap(),
            Value::Null
        );
        assert_eq!(
            DefaultFieldParser
                .parse(&f, b"          ", &mut ctx())
                .unwrap(),
            Value::Null
        );
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let f = field("ODD", 'Z', 4, 0);
        assert!(!DefaultFieldParser.can_parse(&f));
        let err = DefaultFieldParser.parse(&f, b"....", &mut ctx()).unwrap_err();
        assert!(matches!(err, DbfError::UnknownFieldType { .. }), "{err}");
    }

    #[test]
    fn custom_parser_can_override_one_tag() {
        // Character bytes decoded reversed, everything else default.
        struct Reversing;
        impl FieldParser for Reversing {
            fn parse_character(
                &self,
                _field: &Field,
                data: &[u8],
                ctx: &mut ParseContext<'_>,
            ) -> Result<Value> {
                let (text, _, _) = ctx.encoding.decode(data);
                Ok(Value::Character(
                    text.trim_end().chars().rev().collect(),
                ))
            }
        }

        let f = field("NAME", 'C', 10, 0);
        assert_eq!(
            Reversing.parse(&f, b"Alice     ", &mut ctx()).unwrap(),
            Value::Character("ecilA".to_string())
        );
        let n = field("AGE", 'N', 3, 0);
        assert_eq!(
            Reversing.parse(&n, b" 42", &mut ctx()).unwrap(),
            Value::Integer(42)
        );
    }
}
