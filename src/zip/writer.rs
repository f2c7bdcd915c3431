//! ZIP64 archive writer.
//!
//! Every archive produced here defers its central directory counts and
//! offsets to zip64 records, so it always satisfies the checks made by
//! [`ZipArchive::open`](super::ZipArchive::open).

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::Crc;
use flate2::Compression;
use flate2::write::DeflateEncoder;
use std::borrow::Cow;
use std::collections::HashSet;
use std::io::Write;

use crate::error::{Feature, FormatError, Result, Violation};

use super::entry::{CompressionMethod, FLAG_UTF8};
use super::parser::ZIP64_EXTRA_ID;
use super::structures::*;

/// 1980-01-01, the earliest DOS date.
const DOS_EPOCH_DATE: u16 = (1 << 5) | 1;

/// Streaming writer for ZIP64 archives.
///
/// Entries are written as they are added; the central directory and the
/// end-of-archive records are written by [`finish`](Self::finish).
///
/// ```
/// use std::io::Cursor;
/// use zipdex::{CompressionMethod, ZipArchive, ZipWriter};
///
/// let mut writer = ZipWriter::new(Vec::new());
/// writer.add_file("hello.txt", b"hello", CompressionMethod::Deflate)?;
/// let bytes = writer.finish()?;
///
/// let archive = ZipArchive::open(Cursor::new(bytes))?;
/// assert_eq!(archive.file_names(), vec!["hello.txt"]);
/// # Ok::<(), zipdex::FormatError>(())
/// ```
pub struct ZipWriter<W: Write> {
    inner: W,
    position: u64,
    headers: Vec<CentralFileHeader>,
    names: HashSet<String>,
}

impl<W: Write> ZipWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            position: 0,
            headers: Vec::new(),
            names: HashSet::new(),
        }
    }

    /// Compress `data` with `method` and append it as entry `name`.
    pub fn add_file(&mut self, name: &str, data: &[u8], method: CompressionMethod) -> Result<()> {
        let compressed: Cow<'_, [u8]> = match method {
            CompressionMethod::Stored => Cow::Borrowed(data),
            CompressionMethod::Deflate => {
                let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(data)?;
                Cow::Owned(encoder.finish()?)
            }
            CompressionMethod::Unknown(m) => {
                return Err(FormatError::UnsupportedFeature(Feature::CompressionMethod(m)));
            }
        };

        let mut crc = Crc::new();
        crc.update(data);

        let offset = self.position;
        let uncompressed_size = data.len() as u64;
        let compressed_size = compressed.len() as u64;
        let large_sizes = uncompressed_size >= SENTINEL_U32 as u64 || compressed_size >= SENTINEL_U32 as u64;
        let large_offset = offset >= SENTINEL_U32 as u64;
        let version = if large_sizes || large_offset {
            ZIP64_MINIMUM_VERSION
        } else {
            ZIP32_DEFAULT_VERSION
        };
        let flags = if name.is_ascii() { 0 } else { FLAG_UTF8 };

        let mut local = LocalFileHeader::new();
        local.set_file_name(name.as_bytes())?;
        local.set_version_needed(version);
        local.set_flags(flags);
        local.set_compression_method(method.as_u16());
        local.set_last_mod_date(DOS_EPOCH_DATE);
        local.set_crc32(crc.sum());
        if large_sizes {
            local.set_compressed_size(SENTINEL_U32);
            local.set_uncompressed_size(SENTINEL_U32);
            local.set_extra_field(&zip64_extra(&[uncompressed_size, compressed_size])?)?;
        } else {
            local.set_compressed_size(compressed_size as u32);
            local.set_uncompressed_size(uncompressed_size as u32);
        }

        let mut central = CentralFileHeader::new();
        central.set_file_name(name.as_bytes())?;
        central.set_version_made_by(version);
        central.set_version_needed(version);
        central.set_flags(flags);
        central.set_compression_method(method.as_u16());
        central.set_last_mod_date(DOS_EPOCH_DATE);
        central.set_crc32(crc.sum());

        let mut zip64_values = Vec::new();
        if large_sizes {
            central.set_uncompressed_size(SENTINEL_U32);
            central.set_compressed_size(SENTINEL_U32);
            zip64_values.extend([uncompressed_size, compressed_size]);
        } else {
            central.set_uncompressed_size(uncompressed_size as u32);
            central.set_compressed_size(compressed_size as u32);
        }
        if large_offset {
            central.set_local_header_offset(SENTINEL_U32);
            zip64_values.push(offset);
        } else {
            central.set_local_header_offset(offset as u32);
        }
        if !zip64_values.is_empty() {
            central.set_extra_field(&zip64_extra(&zip64_values)?)?;
        }

        if !self.names.insert(name.to_string()) {
            return Err(FormatError::header("central directory", "duplicate entry name"));
        }

        local.write(&mut self.inner)?;
        self.inner.write_all(&compressed)?;
        self.position += local.size() as u64 + compressed_size;
        self.headers.push(central);
        Ok(())
    }

    /// Append an empty directory entry. A trailing `/` is added if missing.
    pub fn add_directory(&mut self, name: &str) -> Result<()> {
        let name = if name.ends_with('/') {
            name.to_string()
        } else {
            format!("{name}/")
        };
        self.add_file(&name, &[], CompressionMethod::Stored)
    }

    /// Write the central directory, the zip64 records and the sentinel
    /// end of central directory record, then hand back the inner writer.
    ///
    /// # Errors
    ///
    /// Fails when no entry was added: a zip64 end of central directory
    /// record must count at least one entry.
    pub fn finish(mut self) -> Result<W> {
        if self.headers.is_empty() {
            return Err(FormatError::InvalidZip64CentralDirectoryRecord(
                Violation::Malformed("number of entries is zero"),
            ));
        }

        let cd_offset = self.position;
        for header in &self.headers {
            header.write(&mut self.inner)?;
            self.position += header.size() as u64;
        }
        let cd_size = self.position - cd_offset;

        let zip64_offset = self.position;
        let mut zip64 = Zip64EndOfCentralDirectory::new();
        zip64.set_total_entries(self.headers.len() as u64);
        zip64.set_cd_size(cd_size);
        zip64.set_cd_offset(cd_offset);
        zip64.write(&mut self.inner)?;

        let mut locator = Zip64EndOfCentralDirectoryLocator::new();
        locator.set_relative_offset(zip64_offset);
        locator.write(&mut self.inner)?;

        EndOfCentralDirectory::new().write(&mut self.inner)?;
        self.inner.flush()?;

        log::debug!(
            "[ZIP] Wrote {} entries, central directory {} bytes at {}",
            self.headers.len(),
            cd_size,
            cd_offset
        );
        Ok(self.inner)
    }
}

/// Build a zip64 extended information extra block holding `values`.
fn zip64_extra(values: &[u64]) -> Result<Vec<u8>> {
    let mut extra = Vec::with_capacity(4 + values.len() * 8);
    extra.write_u16::<LittleEndian>(ZIP64_EXTRA_ID)?;
    extra.write_u16::<LittleEndian>((values.len() * 8) as u16)?;
    for &value in values {
        extra.write_u64::<LittleEndian>(value)?;
    }
    Ok(extra)
}
