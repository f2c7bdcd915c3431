//! Error types for ZIP64 discovery, validation, extraction and writing.
//!
//! Every rule violation surfaces as a [`FormatError`] and is propagated
//! unchanged from the field that failed up to the caller of
//! [`ZipArchive::open`](crate::ZipArchive::open). Nothing is recovered locally.
//!
//! The record-specific variants carry a [`Violation`], which separates a
//! corrupt archive ([`Violation::Malformed`]) from one that uses a ZIP feature
//! this crate refuses to handle ([`Violation::Unsupported`]):
//!
//! ```
//! use std::io::Cursor;
//! use zipdex::{FormatError, ZipArchive};
//!
//! match ZipArchive::open(Cursor::new(Vec::new())) {
//!     Err(e) if e.is_unsupported() => eprintln!("unsupported archive: {e}"),
//!     Err(e) => eprintln!("corrupt archive: {e}"),
//!     Ok(_) => unreachable!(),
//! }
//! ```

use std::fmt;
use std::io;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FormatError>;

/// ZIP features that are detected and rejected rather than implemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    /// Archives spanning more than one disk.
    MultiDisk,
    /// The archive-level comment trailing the end of central directory record.
    ArchiveComment,
    /// The zip64 extensible data sector.
    ExtensibleData,
    /// Traditional or strong encryption of entry data.
    Encryption,
    /// An end of central directory record that does not defer to zip64.
    LegacyEndOfCentralDirectory,
    /// Any compression method other than Store or Deflate.
    CompressionMethod(u16),
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Feature::MultiDisk => write!(f, "multi-disk archives"),
            Feature::ArchiveComment => write!(f, "archive comments"),
            Feature::ExtensibleData => write!(f, "zip64 extensible data"),
            Feature::Encryption => write!(f, "encryption"),
            Feature::LegacyEndOfCentralDirectory => {
                write!(f, "non-zip64 end of central directory values")
            }
            Feature::CompressionMethod(m) => write!(f, "compression method {m}"),
        }
    }
}

/// Why a record rule rejected a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    /// The bytes are inconsistent with the ZIP format.
    Malformed(&'static str),
    /// The bytes are well-formed but use a feature this crate rejects.
    Unsupported(Feature),
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::Malformed(reason) => f.write_str(reason),
            Violation::Unsupported(feature) => write!(f, "unsupported: {feature}"),
        }
    }
}

/// Why an archive could not be opened, read or written.
///
/// The record-specific variants name the record whose rule failed; the rest
/// cover signatures, oversized variable fields, rejected features and I/O.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("{record}: signature {found:#010x} does not match {expected:#010x}")]
    SignatureMismatch {
        record: &'static str,
        expected: u32,
        found: u32,
    },

    #[error("{field}: length {len} exceeds the 16-bit maximum")]
    FieldOutOfRange { field: &'static str, len: usize },

    #[error("invalid zip64 end of central directory record: {0}")]
    InvalidZip64CentralDirectoryRecord(Violation),

    #[error("invalid zip64 end of central directory locator: {0}")]
    InvalidZip64CentralDirectoryLocator(Violation),

    #[error("invalid end of central directory record: {0}")]
    InvalidEndOfCentralDirectoryRecord(Violation),

    #[error("invalid {record}: {violation}")]
    InvalidHeader {
        record: &'static str,
        violation: Violation,
    },

    #[error("unsupported feature: {0}")]
    UnsupportedFeature(Feature),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl FormatError {
    /// True when the archive was rejected for using a deliberately
    /// unsupported feature rather than for being corrupt.
    pub fn is_unsupported(&self) -> bool {
        match self {
            FormatError::UnsupportedFeature(_) => true,
            FormatError::InvalidZip64CentralDirectoryRecord(v)
            | FormatError::InvalidZip64CentralDirectoryLocator(v)
            | FormatError::InvalidEndOfCentralDirectoryRecord(v)
            | FormatError::InvalidHeader { violation: v, .. } => {
                matches!(v, Violation::Unsupported(_))
            }
            _ => false,
        }
    }

    /// The violation carried by record-specific errors, if any.
    pub fn violation(&self) -> Option<Violation> {
        match self {
            FormatError::InvalidZip64CentralDirectoryRecord(v)
            | FormatError::InvalidZip64CentralDirectoryLocator(v)
            | FormatError::InvalidEndOfCentralDirectoryRecord(v)
            | FormatError::InvalidHeader { violation: v, .. } => Some(*v),
            _ => None,
        }
    }

    pub(crate) fn header(record: &'static str, reason: &'static str) -> Self {
        FormatError::InvalidHeader {
            record,
            violation: Violation::Malformed(reason),
        }
    }
}
