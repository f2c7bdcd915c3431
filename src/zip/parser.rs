//! Archive discovery.
//!
//! This module locates and validates the end-of-archive metadata, then
//! decodes the central directory it describes. ZIP files are read from the
//! end, one record at a time:
//!
//! 1. The End of Central Directory (EOCD) record, `size(EOCD)` bytes before
//!    the end of the stream. It must defer every count and offset to zip64.
//! 2. The Zip64 EOCD Locator immediately before it. Its offset is bounded by
//!    the position at which the EOCD starts.
//! 3. The Zip64 EOCD record at the offset the locator names. Its central
//!    directory size and offset are bounded by the position at which the
//!    locator starts.
//! 4. The central directory itself, which must fit between its declared
//!    offset and the Zip64 EOCD record.
//!
//! Each step depends on the byte size of every record found before it, so the
//! steps run strictly in order, and the first failure abandons the open.

use byteorder::{LittleEndian, ReadBytesExt};
use std::collections::HashMap;
use std::io::{Cursor, Read, Seek, SeekFrom};

use crate::error::{Feature, FormatError, Result, Violation};

use super::entry::{CompressionMethod, FLAG_ENCRYPTED, FLAG_STRONG_ENCRYPTION, ZipFileEntry};
use super::structures::*;

/// Header ID of the zip64 extended information extra field.
pub(crate) const ZIP64_EXTRA_ID: u16 = 0x0001;

/// A ZIP64 archive whose end-of-archive records and central directory have
/// been fully validated.
///
/// The archive owns its stream for its whole lifetime. Pass `&mut S` to keep
/// the stream after the archive is dropped, or use [`into_inner`](Self::into_inner).
///
/// ## Example
///
/// ```no_run
/// use zipdex::{LocalFile, ZipArchive};
///
/// let file = LocalFile::open("archive.zip".as_ref())?;
/// let archive = ZipArchive::open(file)?;
/// for name in archive.file_names() {
///     println!("{name}");
/// }
/// # Ok::<(), zipdex::FormatError>(())
/// ```
pub struct ZipArchive<S> {
    pub(crate) stream: S,
    end_of_cd: EndOfCentralDirectory,
    locator: Zip64EndOfCentralDirectoryLocator,
    zip64_end_of_cd: Zip64EndOfCentralDirectory,
    entries: Vec<ZipFileEntry>,
    by_name: HashMap<String, usize>,
}

impl<S: Read + Seek> ZipArchive<S> {
    /// Run the full discovery sequence against `stream`.
    ///
    /// # Errors
    ///
    /// Returns the first rule violation found, identifying the record and the
    /// rule. No archive is produced on failure.
    pub fn open(mut stream: S) -> Result<Self> {
        let (end_of_cd, eocd_start) = locate_end_of_cd(&mut stream)?;
        let (locator, locator_start) = locate_zip64_locator(&mut stream, eocd_start)?;
        let zip64_end_of_cd = locate_zip64_end_of_cd(&mut stream, &locator, locator_start)?;
        let entries = read_central_directory(&mut stream, &zip64_end_of_cd, locator.relative_offset())?;

        let mut by_name = HashMap::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            if by_name.insert(entry.file_name.clone(), index).is_some() {
                return Err(FormatError::header("central directory", "duplicate entry name"));
            }
        }

        log::debug!(
            "[ZIP] Opened archive with {} entries (central directory at {}, {} bytes)",
            entries.len(),
            zip64_end_of_cd.cd_offset(),
            zip64_end_of_cd.cd_size()
        );

        Ok(Self {
            stream,
            end_of_cd,
            locator,
            zip64_end_of_cd,
            entries,
            by_name,
        })
    }
}

impl<S> ZipArchive<S> {
    /// Entry names in central directory order.
    pub fn file_names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.file_name.clone()).collect()
    }

    /// All entries in central directory order.
    pub fn entries(&self) -> &[ZipFileEntry] {
        &self.entries
    }

    pub fn entry(&self, name: &str) -> Option<&ZipFileEntry> {
        self.by_name.get(name).map(|&i| &self.entries[i])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn end_of_central_directory(&self) -> &EndOfCentralDirectory {
        &self.end_of_cd
    }

    pub fn zip64_locator(&self) -> &Zip64EndOfCentralDirectoryLocator {
        &self.locator
    }

    pub fn zip64_end_of_central_directory(&self) -> &Zip64EndOfCentralDirectory {
        &self.zip64_end_of_cd
    }

    /// Give the stream back, dropping the index.
    pub fn into_inner(self) -> S {
        self.stream
    }
}

/// Step 1: the EOCD record sits exactly at the end of the stream, since
/// archive comments are rejected.
fn locate_end_of_cd<S: Read + Seek>(stream: &mut S) -> Result<(EndOfCentralDirectory, u64)> {
    let size = EndOfCentralDirectory::new().size() as u64;
    let end = stream.seek(SeekFrom::End(0))?;
    if end < size {
        return Err(FormatError::InvalidEndOfCentralDirectoryRecord(
            Violation::Malformed("stream is shorter than an end of central directory record"),
        ));
    }

    let start = stream.seek(SeekFrom::End(-(size as i64)))?;
    let eocd = EndOfCentralDirectory::read(stream)?;
    log::debug!("[ZIP] End of central directory record at {start}");
    Ok((eocd, start))
}

/// Step 2: the locator immediately precedes the EOCD record.
fn locate_zip64_locator<S: Read + Seek>(
    stream: &mut S,
    eocd_start: u64,
) -> Result<(Zip64EndOfCentralDirectoryLocator, u64)> {
    let eocd_size = EndOfCentralDirectory::new().size() as i64;
    let locator_size = Zip64EndOfCentralDirectoryLocator::new().size() as i64;
    if eocd_start < locator_size as u64 {
        return Err(FormatError::InvalidZip64CentralDirectoryLocator(
            Violation::Malformed("no room for a locator before the end of central directory"),
        ));
    }

    let start = stream.seek(SeekFrom::End(-(eocd_size + locator_size)))?;
    let locator = Zip64EndOfCentralDirectoryLocator::read(stream, eocd_start)?;
    log::debug!(
        "[ZIP] Zip64 locator at {start} points to {}",
        locator.relative_offset()
    );
    Ok((locator, start))
}

/// Step 3: an absolute seek to where the locator points.
fn locate_zip64_end_of_cd<S: Read + Seek>(
    stream: &mut S,
    locator: &Zip64EndOfCentralDirectoryLocator,
    locator_start: u64,
) -> Result<Zip64EndOfCentralDirectory> {
    stream.seek(SeekFrom::Start(locator.relative_offset()))?;
    let zip64 = Zip64EndOfCentralDirectory::read(stream, locator_start)?;
    if stream.stream_position()? > locator_start {
        return Err(FormatError::InvalidZip64CentralDirectoryRecord(
            Violation::Malformed("record overlaps the zip64 locator"),
        ));
    }

    log::debug!(
        "[ZIP] Zip64 end of central directory: {} entries, {} bytes at {}",
        zip64.total_entries(),
        zip64.cd_size(),
        zip64.cd_offset()
    );
    Ok(zip64)
}

/// Step 4: decode exactly `total_entries` central file headers occupying
/// exactly `cd_size` bytes that end no later than the zip64 record.
fn read_central_directory<S: Read + Seek>(
    stream: &mut S,
    zip64: &Zip64EndOfCentralDirectory,
    zip64_start: u64,
) -> Result<Vec<ZipFileEntry>> {
    let cd_offset = zip64.cd_offset();
    let cd_size = zip64.cd_size();
    let cd_end = cd_offset.checked_add(cd_size).ok_or(
        FormatError::InvalidZip64CentralDirectoryRecord(Violation::Malformed(
            "central directory end overflows",
        )),
    )?;
    if cd_end > zip64_start {
        return Err(FormatError::InvalidZip64CentralDirectoryRecord(
            Violation::Malformed("central directory overlaps the zip64 record"),
        ));
    }

    // Every header is at least its fixed size, which caps the entry count.
    let min_header = CentralFileHeader::new().size() as u64;
    let total = zip64.total_entries();
    if total > cd_size / min_header {
        return Err(FormatError::InvalidZip64CentralDirectoryRecord(
            Violation::Malformed("more entries than the central directory can hold"),
        ));
    }

    stream.seek(SeekFrom::Start(cd_offset))?;
    let mut entries = Vec::with_capacity(total as usize);
    for _ in 0..total {
        let header = CentralFileHeader::read(stream)?;
        let entry = parse_cdfh(&header)?;
        if entry.lfh_offset >= cd_offset {
            return Err(FormatError::header(
                "central file header",
                "local header offset points into the central directory",
            ));
        }
        entries.push(entry);
    }

    if stream.stream_position()? != cd_end {
        return Err(FormatError::header(
            "central directory",
            "entries do not fill the declared size",
        ));
    }
    Ok(entries)
}

/// Turn a validated central file header into an entry, resolving any zip64
/// extended information.
fn parse_cdfh(header: &CentralFileHeader) -> Result<ZipFileEntry> {
    if header.flags() & (FLAG_ENCRYPTED | FLAG_STRONG_ENCRYPTION) != 0 {
        return Err(FormatError::UnsupportedFeature(Feature::Encryption));
    }

    // Use lossy conversion to handle non-UTF8 filenames gracefully
    let file_name = String::from_utf8_lossy(header.file_name()).into_owned();
    let is_directory = file_name.ends_with('/');

    let mut uncompressed_size = header.uncompressed_size() as u64;
    let mut compressed_size = header.compressed_size() as u64;
    let mut lfh_offset = header.local_header_offset() as u64;
    let mut disk_number_start = header.disk_number_start() as u32;

    let needs_zip64 = header.uncompressed_size() == SENTINEL_U32
        || header.compressed_size() == SENTINEL_U32
        || header.local_header_offset() == SENTINEL_U32
        || header.disk_number_start() == SENTINEL_U16;

    if needs_zip64 {
        let extra = find_zip64_extra(header.extra_field())?.ok_or_else(|| {
            FormatError::header(
                "central file header",
                "placeholder value without zip64 extended information",
            )
        })?;

        // Fields are present only if the corresponding header field is the
        // placeholder, always in this order.
        let mut cursor = Cursor::new(extra);
        let truncated = |_| {
            FormatError::header("central file header", "zip64 extended information is truncated")
        };
        if header.uncompressed_size() == SENTINEL_U32 {
            uncompressed_size = cursor.read_u64::<LittleEndian>().map_err(truncated)?;
        }
        if header.compressed_size() == SENTINEL_U32 {
            compressed_size = cursor.read_u64::<LittleEndian>().map_err(truncated)?;
        }
        if header.local_header_offset() == SENTINEL_U32 {
            lfh_offset = cursor.read_u64::<LittleEndian>().map_err(truncated)?;
        }
        if header.disk_number_start() == SENTINEL_U16 {
            disk_number_start = cursor.read_u32::<LittleEndian>().map_err(truncated)?;
        }
    }

    if disk_number_start != 0 {
        return Err(FormatError::UnsupportedFeature(Feature::MultiDisk));
    }

    Ok(ZipFileEntry {
        file_name,
        raw_name: header.file_name().to_vec(),
        compression_method: CompressionMethod::from_u16(header.compression_method()),
        flags: header.flags(),
        compressed_size,
        uncompressed_size,
        crc32: header.crc32(),
        lfh_offset,
        last_mod_time: header.last_mod_time(),
        last_mod_date: header.last_mod_date(),
        is_directory,
    })
}

/// Find the zip64 extended information block among the extra field's
/// (id, size, data) blocks.
pub(crate) fn find_zip64_extra(extra: &[u8]) -> Result<Option<&[u8]>> {
    let mut rest = extra;
    while rest.len() >= 4 {
        let mut cursor = Cursor::new(rest);
        let header_id = cursor.read_u16::<LittleEndian>()?;
        let size = cursor.read_u16::<LittleEndian>()? as usize;
        let Some(data) = rest.get(4..4 + size) else {
            return Err(FormatError::header("extra field", "block overruns the extra field"));
        };
        if header_id == ZIP64_EXTRA_ID {
            return Ok(Some(data));
        }
        rest = &rest[4 + size..];
    }
    Ok(None)
}
