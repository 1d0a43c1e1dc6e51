//! Tagged primitive value encoding for non-snapshot messages.
//!
//! One byte tag followed by payload. Integers pick the narrowest tag that
//! holds them: `<=255` as `u8`, `<=65535` as `u16`, else `i32`, else `f64`.

use std::collections::BTreeMap;

use crate::WireError;

const TAG_NULL: u8 = 0;
const TAG_FALSE: u8 = 1;
const TAG_TRUE: u8 = 2;
const TAG_I32: u8 = 5;
const TAG_F64: u8 = 6;
const TAG_STRING: u8 = 7;
const TAG_ARRAY: u8 = 8;
const TAG_OBJECT: u8 = 9;
const TAG_U8: u8 = 10;
const TAG_U16: u8 = 11;
const TAG_U32: u8 = 12;

#[derive(Debug, Clone, PartialEq)]
pub enum WireValue {
    Null,
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    I32(i32),
    F64(f64),
    String(String),
    Array(Vec<WireValue>),
    /// Ordered rather than a `HashMap` so re-encoding the same logical
    /// object is byte-identical across runs.
    Object(BTreeMap<String, WireValue>),
}

impl WireValue {
    /// Builds the narrowest integer variant that losslessly holds `v`.
    pub fn from_i64(v: i64) -> WireValue {
        if (0..=255).contains(&v) {
            WireValue::U8(v as u8)
        } else if (0..=65535).contains(&v) {
            WireValue::U16(v as u16)
        } else if let Ok(v) = i32::try_from(v) {
            WireValue::I32(v)
        } else {
            WireValue::F64(v as f64)
        }
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            WireValue::Null => out.push(TAG_NULL),
            WireValue::Bool(false) => out.push(TAG_FALSE),
            WireValue::Bool(true) => out.push(TAG_TRUE),
            WireValue::U8(v) => {
                out.push(TAG_U8);
                out.push(*v);
            }
            WireValue::U16(v) => {
                out.push(TAG_U16);
                out.extend_from_slice(&v.to_be_bytes());
            }
            WireValue::U32(v) => {
                out.push(TAG_U32);
                out.extend_from_slice(&v.to_be_bytes());
            }
            WireValue::I32(v) => {
                out.push(TAG_I32);
                out.extend_from_slice(&v.to_be_bytes());
            }
            WireValue::F64(v) => {
                out.push(TAG_F64);
                out.extend_from_slice(&v.to_be_bytes());
            }
            WireValue::String(s) => {
                out.push(TAG_STRING);
                out.extend_from_slice(&(s.len() as u16).to_be_bytes());
                out.extend_from_slice(s.as_bytes());
            }
            WireValue::Array(items) => {
                out.push(TAG_ARRAY);
                out.extend_from_slice(&(items.len() as u16).to_be_bytes());
                for item in items {
                    item.encode(out);
                }
            }
            WireValue::Object(fields) => {
                out.push(TAG_OBJECT);
                out.extend_from_slice(&(fields.len() as u16).to_be_bytes());
                for (key, value) in fields {
                    WireValue::String(key.clone()).encode(out);
                    value.encode(out);
                }
            }
        }
    }

    pub fn decode(buf: &[u8]) -> Result<(WireValue, &[u8]), WireError> {
        let (&tag, rest) = buf.split_first().ok_or(WireError::Truncated)?;
        match tag {
            TAG_NULL => Ok((WireValue::Null, rest)),
            TAG_FALSE => Ok((WireValue::Bool(false), rest)),
            TAG_TRUE => Ok((WireValue::Bool(true), rest)),
            TAG_U8 => {
                let (&v, rest) = rest.split_first().ok_or(WireError::Truncated)?;
                Ok((WireValue::U8(v), rest))
            }
            TAG_U16 => {
                let (bytes, rest) = take(rest, 2)?;
                Ok((WireValue::U16(u16::from_be_bytes(bytes.try_into().unwrap())), rest))
            }
            TAG_U32 => {
                let (bytes, rest) = take(rest, 4)?;
                Ok((WireValue::U32(u32::from_be_bytes(bytes.try_into().unwrap())), rest))
            }
            TAG_I32 => {
                let (bytes, rest) = take(rest, 4)?;
                Ok((WireValue::I32(i32::from_be_bytes(bytes.try_into().unwrap())), rest))
            }
            TAG_F64 => {
                let (bytes, rest) = take(rest, 8)?;
                Ok((WireValue::F64(f64::from_be_bytes(bytes.try_into().unwrap())), rest))
            }
            TAG_STRING => decode_string(rest).map(|(s, rest)| (WireValue::String(s), rest)),
            TAG_ARRAY => {
                let (len_bytes, mut rest) = take(rest, 2)?;
                let len = u16::from_be_bytes(len_bytes.try_into().unwrap());
                let mut items = Vec::with_capacity(len as usize);
                for _ in 0..len {
                    let (item, next) = WireValue::decode(rest)?;
                    items.push(item);
                    rest = next;
                }
                Ok((WireValue::Array(items), rest))
            }
            TAG_OBJECT => {
                let (len_bytes, mut rest) = take(rest, 2)?;
                let len = u16::from_be_bytes(len_bytes.try_into().unwrap());
                let mut fields = BTreeMap::new();
                for _ in 0..len {
                    let (key, next) = decode_string(rest)?;
                    let (value, next) = WireValue::decode(next)?;
                    fields.insert(key, value);
                    rest = next;
                }
                Ok((WireValue::Object(fields), rest))
            }
            other => Err(WireError::UnknownTag { tag: other }),
        }
    }
}

fn take(buf: &[u8], n: usize) -> Result<(&[u8], &[u8]), WireError> {
    if buf.len() < n {
        return Err(WireError::Truncated);
    }
    Ok(buf.split_at(n))
}

fn decode_string(buf: &[u8]) -> Result<(String, &[u8]), WireError> {
    let (len_bytes, rest) = take(buf, 2)?;
    let len = u16::from_be_bytes(len_bytes.try_into().unwrap()) as usize;
    let (bytes, rest) = take(rest, len)?;
    let s = std::str::from_utf8(bytes).map_err(|_| WireError::InvalidUtf8)?.to_owned();
    Ok((s, rest))
}
