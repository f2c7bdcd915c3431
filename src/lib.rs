//! # zipdex
//!
//! Strict ZIP64 central directory discovery and validation.
//!
//! An archive is opened by locating its end-of-archive records from the end
//! of the stream, validating every field against the records found before it,
//! and decoding the central directory into an ordered index of entries. Any
//! inconsistency aborts the open with a [`FormatError`] naming the record and
//! the rule that failed.
//!
//! Archives can come from the local filesystem, from an HTTP server that
//! supports Range requests (only the bytes actually needed are downloaded),
//! or from memory.
//!
//! ## Features
//!
//! - Read-only discovery of ZIP64 archives over any `Read + Seek` stream
//! - Entry extraction for STORED and DEFLATE data with CRC-32 verification
//! - A writer producing archives that discovery accepts
//! - HTTP/HTTPS sources using Range requests
//!
//! ## Example
//!
//! ```no_run
//! use zipdex::{HttpRangeStream, ZipArchive};
//!
//! fn main() -> anyhow::Result<()> {
//!     let stream = HttpRangeStream::new("https://example.com/archive.zip".to_string())?;
//!     let mut archive = ZipArchive::open(stream)?;
//!
//!     for name in archive.file_names() {
//!         println!("{name}");
//!     }
//!     let readme = archive.read_entry("README.md")?;
//!     println!("{}", String::from_utf8_lossy(&readme));
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod error;
pub mod io;
pub mod zip;

pub use cli::Cli;
pub use error::{Feature, FormatError, Result, Violation};
pub use io::{HttpRangeStream, LocalFile};
pub use zip::{
    CompressionMethod, Zip64EndOfCentralDirectory, Zip64EndOfCentralDirectoryLocator, ZipArchive,
    ZipFileEntry, ZipWriter, list_entry_names,
};
