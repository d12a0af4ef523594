//! Key codec
//!
//! Flattens a structured key into the canonical byte encoding used as token
//! plaintext, and reverses it.
//!
//! # Layout
//!
//! For each attribute, in map-iteration order:
//!
//! ```text
//! +-----+----------+-----------+------------------+-------------+
//! | tag | name len | name      | value len (be16) | value       |
//! | 1B  | 1B       | name len  | 2B               | value len   |
//! +-----+----------+-----------+------------------+-------------+
//! ```
//!
//! Tag is `b'S'` for string values and `b'B'` for binary values, so the
//! string/binary distinction survives the round-trip. Iteration order only
//! has to be consistent within one encode call: the key is always recovered
//! by decoding the same bytes, never by re-encoding.

use crate::error::{Error, Result};
use crate::types::{Key, KeyValue};
use bytes::Bytes;

/// Type tag for string key values
const TAG_STRING: u8 = b'S';
/// Type tag for binary key values
const TAG_BINARY: u8 = b'B';

/// Maximum attribute name length representable in the 1-byte length field
const MAX_NAME_LEN: usize = u8::MAX as usize;
/// Maximum value length representable in the 2-byte length field
const MAX_VALUE_LEN: usize = u16::MAX as usize;

/// Flatten a structured key into the canonical byte encoding.
///
/// Fails with `Error::Encoding` when an attribute name or value exceeds the
/// capacity of its fixed-width length field.
pub fn flatten(key: &Key) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(key.len() * 16);

    for (name, value) in key {
        if name.len() > MAX_NAME_LEN {
            return Err(Error::encoding(format!(
                "attribute name of {} bytes exceeds {MAX_NAME_LEN}",
                name.len()
            )));
        }

        let (tag, bytes) = match value {
            KeyValue::S(s) => (TAG_STRING, s.as_bytes()),
            KeyValue::B(b) => (TAG_BINARY, b.as_ref()),
        };
        if bytes.len() > MAX_VALUE_LEN {
            return Err(Error::encoding(format!(
                "value of attribute '{name}' exceeds {MAX_VALUE_LEN} bytes"
            )));
        }

        out.push(tag);
        out.push(name.len() as u8);
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
        out.extend_from_slice(bytes);
    }

    Ok(out)
}

/// Rebuild a structured key from its canonical byte encoding.
///
/// Fails with `Error::Decoding` on truncated or malformed input. Callers on
/// the token path normalize this into `Error::Token` so malformed input is
/// indistinguishable from a bad signature.
pub fn unflatten(bytes: &[u8]) -> Result<Key> {
    let mut key = Key::new();
    let mut cursor = bytes;

    while !cursor.is_empty() {
        let (tag, rest) = split_first(cursor)?;
        let (name_len, rest) = split_first(rest)?;
        let (name_bytes, rest) = split_at(rest, name_len as usize)?;
        let (len_bytes, rest) = split_at(rest, 2)?;
        let value_len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;
        let (value_bytes, rest) = split_at(rest, value_len)?;

        let name = std::str::from_utf8(name_bytes)
            .map_err(|_| Error::decoding("attribute name is not valid UTF-8"))?
            .to_string();

        let value = match tag {
            TAG_STRING => {
                let s = std::str::from_utf8(value_bytes)
                    .map_err(|_| Error::decoding("string value is not valid UTF-8"))?;
                KeyValue::S(s.to_string())
            }
            TAG_BINARY => KeyValue::B(Bytes::copy_from_slice(value_bytes)),
            other => {
                return Err(Error::decoding(format!("unknown type tag 0x{other:02x}")));
            }
        };

        key.insert(name, value);
        cursor = rest;
    }

    Ok(key)
}

fn split_first(bytes: &[u8]) -> Result<(u8, &[u8])> {
    match bytes.split_first() {
        Some((first, rest)) => Ok((*first, rest)),
        None => Err(Error::decoding("truncated key encoding")),
    }
}

fn split_at(bytes: &[u8], mid: usize) -> Result<(&[u8], &[u8])> {
    if bytes.len() < mid {
        return Err(Error::decoding("truncated key encoding"));
    }
    Ok(bytes.split_at(mid))
}

#[cfg(test)]
mod tests;
