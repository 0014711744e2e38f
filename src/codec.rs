use crate::error::{ZedisError, ZedisResult};

// Entry layout: <prevlen> <encoding> <payload>
//
// prevlen is the encoded size of the previous entry: one byte for sizes
// below 254, otherwise the 0xFE escape byte followed by a u32 (little
// endian). 0xFF never appears in a prevlen position; it terminates the
// enclosing list.
const PREVLEN_ESCAPE: u8 = 0xFE;
const PREVLEN_ESCAPE_AT: usize = 254;

// The top two bits of the encoding byte select string (00/01/10) or
// integer (11).
const STR_MASK: u8 = 0xC0;

const STR_06B: u8 = 0x00; // |00pppppp| len in the low 6 bits
const STR_14B: u8 = 0x40; // |01pppppp|qqqqqqqq| len in the low 14 bits
const STR_32B: u8 = 0x80; // |10000000| + u32 big endian

const INT_16B: u8 = 0xC0; // + i16 little endian
const INT_32B: u8 = 0xD0; // + i32 little endian
const INT_64B: u8 = 0xE0; // + i64 little endian
const INT_8B: u8 = 0xFE; // + i8

// |1111xxxx| with xxxx in 1..=12 stores the value xxxx-1 in the tag
// itself. Nibbles 0 and 13..=15 collide with other tags and are invalid.
const INT_IMM_MIN: u8 = 0xF1;
const INT_IMM_MAX: u8 = 0xFC;
const INT_IMM_LIMIT: i32 = 12;

/// Values shorter than this that parse as a base-10 i32 are stored as
/// integers; everything else is stored as a string.
const INT_PARSE_MAX_LEN: usize = 32;

/// Encode a single value: encoding byte(s) plus payload, without the
/// prevlen field. Integer encoding is purely syntactic, so "007" is
/// stored (and read back) as "7".
pub fn encode_value(value: &[u8]) -> Vec<u8> {
    match parse_int(value) {
        Some(num) => encode_int(num),
        None => {
            let mut out = encode_str_header(value.len());
            out.extend_from_slice(value);
            out
        }
    }
}

fn parse_int(value: &[u8]) -> Option<i32> {
    if value.len() >= INT_PARSE_MAX_LEN {
        return None;
    }
    std::str::from_utf8(value).ok()?.parse::<i32>().ok()
}

fn encode_int(num: i32) -> Vec<u8> {
    if (0..INT_IMM_LIMIT).contains(&num) {
        vec![INT_IMM_MIN + num as u8]
    } else if let Ok(n) = i8::try_from(num) {
        vec![INT_8B, n as u8]
    } else if let Ok(n) = i16::try_from(num) {
        let mut out = vec![INT_16B];
        out.extend_from_slice(&n.to_le_bytes());
        out
    } else {
        let mut out = vec![INT_32B];
        out.extend_from_slice(&num.to_le_bytes());
        out
    }
}

fn encode_str_header(len: usize) -> Vec<u8> {
    if len <= 0x3F {
        vec![STR_06B | len as u8]
    } else if len <= 0x3FFF {
        vec![STR_14B | (len >> 8) as u8, (len & 0xFF) as u8]
    } else {
        let mut out = vec![STR_32B];
        out.extend_from_slice(&(len as u32).to_be_bytes());
        out
    }
}

/// Decode the entry at `offset`, where the prevlen field starts.
/// Returns the value bytes and the full encoded entry size (prevlen,
/// encoding, payload). Integers come back rendered as base-10 ASCII.
pub fn decode_entry(buf: &[u8], offset: usize) -> ZedisResult<(Vec<u8>, usize)> {
    let (_, prevlen_size) = decode_prevlen(buf, offset)?;
    let (value, value_size) = decode_value(buf, offset + prevlen_size)?;
    Ok((value, prevlen_size + value_size))
}

/// Decode the value at `offset`, where the encoding byte starts (no
/// prevlen field). Returns the value bytes and the encoded size.
pub fn decode_value(buf: &[u8], offset: usize) -> ZedisResult<(Vec<u8>, usize)> {
    let tag = match buf.get(offset) {
        Some(&b) => b,
        None => {
            return Err(ZedisError::CorruptEncoding(
                "entry tag past end of buffer".into(),
            ));
        }
    };
    let (header_size, payload_len) = encoding_size(buf, offset)?;
    let start = offset + header_size;
    let payload = match buf.get(start..start + payload_len) {
        Some(p) => p,
        None => {
            return Err(ZedisError::CorruptEncoding(
                "entry payload truncated".into(),
            ));
        }
    };
    let value = if tag & STR_MASK != STR_MASK {
        payload.to_vec()
    } else {
        decode_int_payload(tag, payload).to_string().into_bytes()
    };
    Ok((value, header_size + payload_len))
}

/// Full encoded size of the entry at `offset` without decoding its
/// payload.
pub fn entry_size(buf: &[u8], offset: usize) -> ZedisResult<usize> {
    let (_, prevlen_size) = decode_prevlen(buf, offset)?;
    let (header_size, payload_len) = encoding_size(buf, offset + prevlen_size)?;
    let total = prevlen_size + header_size + payload_len;
    if offset + total > buf.len() {
        return Err(ZedisError::CorruptEncoding(
            "entry runs past end of buffer".into(),
        ));
    }
    Ok(total)
}

/// Size of the encoding byte(s) and the payload that follows, for the
/// entry whose encoding starts at `offset`.
fn encoding_size(buf: &[u8], offset: usize) -> ZedisResult<(usize, usize)> {
    let tag = match buf.get(offset) {
        Some(&b) => b,
        None => {
            return Err(ZedisError::CorruptEncoding(
                "entry tag past end of buffer".into(),
            ));
        }
    };
    if tag & STR_MASK != STR_MASK {
        return str_encoding_size(buf, offset, tag);
    }
    match tag {
        INT_8B => Ok((1, 1)),
        INT_16B => Ok((1, 2)),
        INT_32B => Ok((1, 4)),
        INT_64B => Ok((1, 8)),
        t if (INT_IMM_MIN..=INT_IMM_MAX).contains(&t) => Ok((1, 0)),
        t => Err(ZedisError::CorruptEncoding(format!(
            "unknown entry tag {t:#04x}"
        ))),
    }
}

fn str_encoding_size(buf: &[u8], offset: usize, tag: u8) -> ZedisResult<(usize, usize)> {
    match tag & STR_MASK {
        STR_06B => Ok((1, (tag & 0x3F) as usize)),
        STR_14B => match buf.get(offset + 1) {
            Some(&b1) => Ok((2, ((tag & 0x3F) as usize) << 8 | b1 as usize)),
            None => Err(ZedisError::CorruptEncoding(
                "string length field truncated".into(),
            )),
        },
        STR_32B => {
            if tag != STR_32B {
                return Err(ZedisError::CorruptEncoding(format!(
                    "unknown entry tag {tag:#04x}"
                )));
            }
            match buf.get(offset + 1..offset + 5) {
                Some(bytes) => {
                    let mut raw = [0u8; 4];
                    raw.copy_from_slice(bytes);
                    Ok((5, u32::from_be_bytes(raw) as usize))
                }
                None => Err(ZedisError::CorruptEncoding(
                    "string length field truncated".into(),
                )),
            }
        }
        _ => unreachable!(),
    }
}

fn decode_int_payload(tag: u8, payload: &[u8]) -> i64 {
    match payload.len() {
        0 => ((tag & 0x0F) as i64) - 1,
        1 => payload[0] as i8 as i64,
        2 => {
            let mut raw = [0u8; 2];
            raw.copy_from_slice(payload);
            i16::from_le_bytes(raw) as i64
        }
        4 => {
            let mut raw = [0u8; 4];
            raw.copy_from_slice(payload);
            i32::from_le_bytes(raw) as i64
        }
        8 => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(payload);
            i64::from_le_bytes(raw)
        }
        _ => unreachable!(),
    }
}

/// Size of the prevlen field needed to record an entry of `prevlen`
/// bytes: one byte below 254, five from there up.
pub fn prevlen_field_size(prevlen: usize) -> usize {
    if prevlen < PREVLEN_ESCAPE_AT { 1 } else { 5 }
}

pub fn encode_prevlen(prevlen: usize) -> Vec<u8> {
    if prevlen < PREVLEN_ESCAPE_AT {
        vec![prevlen as u8]
    } else {
        let mut out = vec![PREVLEN_ESCAPE];
        out.extend_from_slice(&(prevlen as u32).to_le_bytes());
        out
    }
}

/// Decode the prevlen field at `offset`. Returns the recorded size and
/// the field's own width.
pub fn decode_prevlen(buf: &[u8], offset: usize) -> ZedisResult<(usize, usize)> {
    let first = match buf.get(offset) {
        Some(&b) => b,
        None => {
            return Err(ZedisError::CorruptEncoding(
                "prevlen field past end of buffer".into(),
            ));
        }
    };
    if (first as usize) < PREVLEN_ESCAPE_AT {
        return Ok((first as usize, 1));
    }
    if first != PREVLEN_ESCAPE {
        return Err(ZedisError::CorruptEncoding(format!(
            "invalid prevlen byte {first:#04x}"
        )));
    }
    match buf.get(offset + 1..offset + 5) {
        Some(bytes) => {
            let mut raw = [0u8; 4];
            raw.copy_from_slice(bytes);
            Ok((u32::from_le_bytes(raw) as usize, 5))
        }
        None => Err(ZedisError::CorruptEncoding(
            "prevlen field truncated".into(),
        )),
    }
}

/// Approximate encoded size of a `value_len`-byte entry, prevlen field
/// included. Sizes the value as a string and guesses the prevlen field
/// width from the value's own length rather than its predecessor's.
pub fn estimate_entry_size(value_len: usize) -> usize {
    let mut overhead = if value_len < PREVLEN_ESCAPE_AT { 1 } else { 5 };
    overhead += if value_len < 64 {
        1
    } else if value_len < 16384 {
        2
    } else {
        5
    };
    overhead + value_len
}
