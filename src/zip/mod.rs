//! ZIP64 archive discovery, extraction and writing.
//!
//! ## Architecture
//!
//! - [`field`] and [`record`]: a single table-driven interpreter that reads,
//!   validates and writes every fixed-layout record
//! - `structures`: the record catalog (one field table per record kind) and
//!   typed views over [`record::Record`]
//! - `parser`: the discovery sequence behind [`ZipArchive::open`]
//! - `extractor`: entry data access on an opened [`ZipArchive`]
//! - `writer`: [`ZipWriter`], producing archives that `open` accepts
//!
//! ## ZIP Format Overview
//!
//! A ZIP64 file accepted here consists of:
//! 1. Local file headers and data for each entry
//! 2. The central directory with metadata for all entries
//! 3. The Zip64 end of central directory record and its locator
//! 4. An end of central directory record whose counts and offsets are all
//!    sentinels deferring to the zip64 records
//!
//! Discovery reads from the end of the stream backwards, so listing never
//! touches entry data. That keeps remote archives cheap over HTTP Range
//! requests.
//!
//! ## Supported Features
//!
//! - STORED and DEFLATE compression
//! - Zip64 extended information extra fields in central file headers
//! - Data descriptors, with or without their signature
//!
//! ## Rejected
//!
//! - Archives without zip64 end-of-archive records
//! - Archive comments and zip64 extensible data
//! - Multi-disk archives
//! - Encrypted entries and other compression methods

mod entry;
mod extractor;
pub mod field;
mod parser;
pub mod record;
mod structures;
mod writer;

pub use entry::{
    CompressionMethod, FLAG_DATA_DESCRIPTOR, FLAG_ENCRYPTED, FLAG_STRONG_ENCRYPTION, FLAG_UTF8,
    ZipFileEntry,
};
pub use parser::ZipArchive;
pub use structures::*;
pub use writer::ZipWriter;

/// Names of every entry of `archive`, in central directory order.
pub fn list_entry_names<S>(archive: &ZipArchive<S>) -> Vec<String> {
    archive.file_names()
}
