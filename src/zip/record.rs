//! Generic table-driven record reader and writer.
//!
//! A [`Record`] owns one contiguous byte buffer and a width per field. Every
//! record kind is described by a static [`FieldDesc`] table (see
//! [`RecordKind::fields`]); this module is the single interpreter for those
//! tables.
//!
//! Reading decodes fields strictly in declaration order. After each field is
//! decoded its [`Rule`] runs against the value, the fields decoded so far and
//! the record's `max_offset` bound. A rule may set the width of a later
//! variable field. The first violation aborts the read and the partially
//! decoded record is dropped.

use std::io::{Read, Write};

use super::field::{self, FieldDesc, Rule, Value};
use super::structures::RecordKind;
use crate::error::{FormatError, Result, Violation};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    kind: RecordKind,
    widths: Vec<usize>,
    buf: Vec<u8>,
    max_offset: u64,
}

impl Record {
    /// Create a record carrying the default value of every field.
    ///
    /// Defaults are whatever makes the record's own rules pass where a rule
    /// pins a value (signatures, required versions, sentinels, the declared
    /// size); everything else is zero and every variable field is empty.
    pub fn new(kind: RecordKind) -> Self {
        let fields = kind.fields();
        let widths: Vec<usize> = fields.iter().map(|f| f.width.initial()).collect();
        let size: usize = widths.iter().sum();
        let mut record = Self {
            kind,
            widths,
            buf: vec![0; size],
            max_offset: u64::MAX,
        };

        for (index, desc) in fields.iter().enumerate() {
            let value = match desc.rule {
                Rule::Signature(magic) => magic as u64,
                Rule::Equals(value, _) => value,
                Rule::DeclaredSize { excluded, .. } => (size as u64).saturating_sub(excluded),
                _ => continue,
            };
            record.set_uint(index, value);
        }
        record
    }

    /// Bound offset-like fields checked by [`Rule::AtMostBound`] and
    /// [`Rule::NonZeroAtMostBound`].
    pub fn with_max_offset(mut self, max_offset: u64) -> Self {
        self.max_offset = max_offset;
        self
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn max_offset(&self) -> u64 {
        self.max_offset
    }

    /// Current size in bytes: the sum of all field widths.
    pub fn size(&self) -> usize {
        self.widths.iter().sum()
    }

    /// Number of fields in this record kind.
    pub fn field_count(&self) -> usize {
        self.widths.len()
    }

    /// Raw serialized bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Decoded view of field `index`, or `None` when out of range.
    pub fn field(&self, index: usize) -> Option<Value<'_>> {
        let desc = self.kind.fields().get(index)?;
        let start = self.offset(index);
        let bytes = self.buf.get(start..start + self.widths[index])?;
        Some(field::decode(desc.width, bytes))
    }

    pub(crate) fn uint(&self, index: usize) -> u64 {
        self.field(index).and_then(Value::as_u64).unwrap_or_default()
    }

    pub(crate) fn bytes(&self, index: usize) -> &[u8] {
        self.field(index).and_then(Value::as_bytes).unwrap_or_default()
    }

    /// Overwrite fixed field `index`. Only used on the write path.
    pub(crate) fn set_uint(&mut self, index: usize, value: u64) {
        let Some(desc) = self.kind.fields().get(index) else {
            return;
        };
        debug_assert!(!desc.width.is_variable(), "{} is variable", desc.name);
        let start = self.offset(index);
        let end = start + self.widths[index];
        field::encode(desc.width, value, &mut self.buf[start..end]);
    }

    /// Replace variable field `index` and update the length field that
    /// describes it, if the record has one.
    pub(crate) fn set_bytes(&mut self, index: usize, bytes: &[u8]) -> Result<()> {
        let fields = self.kind.fields();
        let Some(desc) = fields.get(index) else {
            return Ok(());
        };
        debug_assert!(desc.width.is_variable(), "{} is fixed", desc.name);
        if bytes.len() > u16::MAX as usize {
            return Err(FormatError::FieldOutOfRange {
                field: desc.name,
                len: bytes.len(),
            });
        }

        let start = self.offset(index);
        let end = start + self.widths[index];
        self.buf.splice(start..end, bytes.iter().copied());
        self.widths[index] = bytes.len();

        if let Some(length_index) = fields.iter().position(|f| f.rule == Rule::LengthOf(index)) {
            self.set_uint(length_index, bytes.len() as u64);
        }
        Ok(())
    }

    /// Decode this record from the current position of `stream`.
    ///
    /// Consumes exactly [`size`](Self::size) bytes as it stands once every
    /// length field has been decoded. On failure nothing is returned, so no
    /// half-validated record can escape.
    pub fn read<R: Read>(mut self, stream: &mut R) -> Result<Self> {
        let fields = self.kind.fields();
        for (width, desc) in self.widths.iter_mut().zip(fields) {
            *width = desc.width.initial();
        }

        let mut buf = Vec::with_capacity(self.size());
        for (index, desc) in fields.iter().enumerate() {
            let start = buf.len();
            field::read_into(stream, self.widths[index], &mut buf)?;
            let value = field::decode(desc.width, &buf[start..]);
            self.check(index, desc, value, &buf)?;
        }

        self.buf = buf;
        Ok(self)
    }

    pub fn write<W: Write>(&self, stream: &mut W) -> Result<()> {
        stream.write_all(&self.buf)?;
        Ok(())
    }

    fn offset(&self, index: usize) -> usize {
        self.widths[..index].iter().sum()
    }

    fn check(&mut self, index: usize, desc: &FieldDesc, value: Value<'_>, decoded: &[u8]) -> Result<()> {
        let int = value.as_u64().unwrap_or_default();
        let passed = match desc.rule {
            Rule::Any => true,
            Rule::Signature(expected) => {
                if int != expected as u64 {
                    return Err(FormatError::SignatureMismatch {
                        record: self.kind.name(),
                        expected,
                        found: int as u32,
                    });
                }
                true
            }
            Rule::LengthOf(target) => {
                debug_assert!(target > index);
                let len = int as usize;
                if len > u16::MAX as usize {
                    return Err(FormatError::FieldOutOfRange {
                        field: desc.name,
                        len,
                    });
                }
                self.widths[target] = len;
                true
            }
            Rule::Equals(expected, _) => int == expected,
            Rule::NonZero(_) => int != 0,
            Rule::SameAs(other, _) => {
                let start = self.offset(other);
                let bytes = &decoded[start..start + self.widths[other]];
                field::decode(self.kind.fields()[other].width, bytes).as_u64() == Some(int)
            }
            Rule::AtMostBound(_) => int <= self.max_offset,
            Rule::NonZeroAtMostBound(_) => int != 0 && int <= self.max_offset,
            Rule::DeclaredSize { excluded, trailing } => {
                let expected = (self.size() as u64).saturating_sub(excluded);
                if int > expected {
                    return Err(self.kind.reject(trailing));
                }
                int == expected
            }
        };

        if passed {
            Ok(())
        } else {
            Err(self.kind.reject(violation_of(desc)))
        }
    }
}

fn violation_of(desc: &FieldDesc) -> Violation {
    match desc.rule {
        Rule::Equals(_, v)
        | Rule::NonZero(v)
        | Rule::SameAs(_, v)
        | Rule::AtMostBound(v)
        | Rule::NonZeroAtMostBound(v) => v,
        Rule::DeclaredSize { .. } => Violation::Malformed("declared record size is wrong"),
        Rule::Any | Rule::Signature(_) | Rule::LengthOf(_) => Violation::Malformed(desc.name),
    }
}
