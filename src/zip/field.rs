//! Field descriptors and their little-endian codec.
//!
//! A field is a lightweight descriptor (name, width, rule); the bytes live in
//! the owning [`Record`](super::record::Record)'s buffer. Fixed fields are 2, 4
//! or 8 bytes wide. Variable fields start out empty and are sized by a
//! preceding [`Rule::LengthOf`] field before they are read.

use byteorder::{ByteOrder, LittleEndian};
use std::io::{self, Read};

use crate::error::Violation;

/// Byte width of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    U16,
    U32,
    U64,
    /// Sized at read time by an earlier length field.
    Variable,
}

impl Width {
    /// Width in bytes before any resizing. Variable fields start at zero.
    pub const fn initial(self) -> usize {
        match self {
            Width::U16 => 2,
            Width::U32 => 4,
            Width::U64 => 8,
            Width::Variable => 0,
        }
    }

    pub const fn is_variable(self) -> bool {
        matches!(self, Width::Variable)
    }
}

/// Validation (and derivation) rule run right after a field is decoded.
///
/// Rules may look at fields decoded earlier in the same record and may set the
/// width of a later variable field, never the other way around.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Any,
    /// Value must equal the record's magic number.
    Signature(u32),
    /// Value is the byte length of the variable field at the given index.
    LengthOf(usize),
    Equals(u64, Violation),
    NonZero(Violation),
    /// Value must equal the earlier field at the given index.
    SameAs(usize, Violation),
    /// Value must not exceed the record's `max_offset` bound.
    AtMostBound(Violation),
    /// Value must be nonzero and must not exceed the `max_offset` bound.
    NonZeroAtMostBound(Violation),
    /// Value must equal the record size minus the given number of leading
    /// bytes. A larger value announces trailing data the record layout does
    /// not carry and is rejected with `trailing`.
    DeclaredSize { excluded: u64, trailing: Violation },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDesc {
    pub name: &'static str,
    pub width: Width,
    pub rule: Rule,
}

impl FieldDesc {
    pub const fn u16(name: &'static str, rule: Rule) -> Self {
        Self { name, width: Width::U16, rule }
    }

    pub const fn u32(name: &'static str, rule: Rule) -> Self {
        Self { name, width: Width::U32, rule }
    }

    pub const fn u64(name: &'static str, rule: Rule) -> Self {
        Self { name, width: Width::U64, rule }
    }

    pub const fn bytes(name: &'static str, rule: Rule) -> Self {
        Self { name, width: Width::Variable, rule }
    }
}

/// Decoded view of a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value<'a> {
    Int(u64),
    Bytes(&'a [u8]),
}

impl<'a> Value<'a> {
    pub fn as_u64(self) -> Option<u64> {
        match self {
            Value::Int(v) => Some(v),
            Value::Bytes(_) => None,
        }
    }

    pub fn as_bytes(self) -> Option<&'a [u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            Value::Int(_) => None,
        }
    }
}

/// Append exactly `width` bytes read from `stream` to `buf`.
pub(crate) fn read_into<R: Read>(stream: &mut R, width: usize, buf: &mut Vec<u8>) -> io::Result<()> {
    let start = buf.len();
    buf.resize(start + width, 0);
    if let Err(e) = stream.read_exact(&mut buf[start..]) {
        buf.truncate(start);
        return Err(e);
    }
    Ok(())
}

/// Decode `bytes` according to `width`. `bytes` must be exactly that wide.
pub(crate) fn decode(width: Width, bytes: &[u8]) -> Value<'_> {
    match width {
        Width::U16 => Value::Int(LittleEndian::read_u16(bytes) as u64),
        Width::U32 => Value::Int(LittleEndian::read_u32(bytes) as u64),
        Width::U64 => Value::Int(LittleEndian::read_u64(bytes)),
        Width::Variable => Value::Bytes(bytes),
    }
}

/// Encode `value` into `out`, truncating to the field width.
pub(crate) fn encode(width: Width, value: u64, out: &mut [u8]) {
    match width {
        Width::U16 => LittleEndian::write_u16(out, value as u16),
        Width::U32 => LittleEndian::write_u32(out, value as u32),
        Width::U64 => LittleEndian::write_u64(out, value),
        Width::Variable => {}
    }
}
