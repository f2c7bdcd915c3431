use flate2::CrcReader;
use flate2::read::DeflateDecoder;
use std::fs;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::{Feature, FormatError, Result};

use super::entry::{CompressionMethod, ZipFileEntry};
use super::parser::ZipArchive;
use super::structures::*;

impl<S: Read + Seek> ZipArchive<S> {
    /// Read the whole content of the entry called `name`.
    pub fn read_entry(&mut self, name: &str) -> Result<Vec<u8>> {
        let entry = self.entry(name).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("{name}: no such entry"))
        })?;
        self.extract_to_memory(&entry)
    }

    /// Extract file data to memory
    pub fn extract_to_memory(&mut self, entry: &ZipFileEntry) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(entry.uncompressed_size.min(1 << 24) as usize);
        self.extract_to_writer(entry, &mut buf)?;
        Ok(buf)
    }

    /// Decompress `entry` into `writer`, returning the number of bytes written.
    ///
    /// The output length and CRC-32 are checked against the central directory
    /// once all data has been written, so `writer` may already hold the
    /// content of a corrupt entry when an error is returned.
    pub fn extract_to_writer<W: Write>(&mut self, entry: &ZipFileEntry, writer: &mut W) -> Result<u64> {
        if entry.is_encrypted() {
            return Err(FormatError::UnsupportedFeature(Feature::Encryption));
        }
        if let CompressionMethod::Unknown(m) = entry.compression_method {
            return Err(FormatError::UnsupportedFeature(Feature::CompressionMethod(m)));
        }

        let data_start = self.data_offset(entry)?;
        let compressed = (&mut self.stream).take(entry.compressed_size);
        // One byte past the declared size is enough to detect overlong output.
        let limit = entry.uncompressed_size.saturating_add(1);
        let (written, crc) = match entry.compression_method {
            CompressionMethod::Deflate => copy_with_crc(DeflateDecoder::new(compressed).take(limit), writer)?,
            _ => copy_with_crc(compressed, writer)?,
        };

        if written != entry.uncompressed_size {
            return Err(FormatError::header("entry data", "size differs from central directory"));
        }
        if crc != entry.crc32 {
            return Err(FormatError::header("entry data", "CRC-32 differs from central directory"));
        }
        if entry.has_data_descriptor() {
            self.check_data_descriptor(entry, data_start)?;
        }
        Ok(written)
    }

    /// Extract file to disk, creating parent directories as needed.
    pub fn extract_to_file(&mut self, entry: &ZipFileEntry, output_path: &Path) -> Result<()> {
        if let Some(parent) = output_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        if entry.is_directory {
            fs::create_dir_all(output_path)?;
            return Ok(());
        }

        let mut file = io::BufWriter::new(fs::File::create(output_path)?);
        self.extract_to_writer(entry, &mut file)?;
        file.flush()?;
        Ok(())
    }

    /// Offset of the first data byte of `entry`, just past its local header.
    ///
    /// Leaves the stream positioned at that offset.
    pub fn data_offset(&mut self, entry: &ZipFileEntry) -> Result<u64> {
        self.stream.seek(SeekFrom::Start(entry.lfh_offset))?;
        let local = LocalFileHeader::read(&mut self.stream)?;
        if local.file_name() != entry.raw_name.as_slice() {
            return Err(FormatError::header(
                LocalFileHeader::KIND.name(),
                "file name differs from central directory",
            ));
        }
        Ok(entry.lfh_offset + local.size() as u64)
    }

    fn check_data_descriptor(&mut self, entry: &ZipFileEntry, data_start: u64) -> Result<()> {
        if entry.compressed_size >= SENTINEL_U32 as u64 || entry.uncompressed_size >= SENTINEL_U32 as u64 {
            log::debug!("[ZIP] Skipping zip64 data descriptor of {}", entry.file_name);
            return Ok(());
        }

        let descriptor_start = data_start + entry.compressed_size;
        self.stream.seek(SeekFrom::Start(descriptor_start))?;
        if self.stream.read_u32::<LittleEndian>()? != DATA_DESCRIPTOR_SIGNATURE {
            log::debug!("[ZIP] Data descriptor of {} has no signature", entry.file_name);
            self.stream.seek(SeekFrom::Start(descriptor_start))?;
        }

        let descriptor = DataDescriptor::read(&mut self.stream)?;
        if descriptor.crc32() != entry.crc32
            || descriptor.compressed_size() as u64 != entry.compressed_size
            || descriptor.uncompressed_size() as u64 != entry.uncompressed_size
        {
            return Err(FormatError::header(
                DataDescriptor::KIND.name(),
                "values differ from central directory",
            ));
        }
        Ok(())
    }
}

fn copy_with_crc<R: Read, W: Write>(reader: R, writer: &mut W) -> Result<(u64, u32)> {
    let mut reader = CrcReader::new(reader);
    let written = io::copy(&mut reader, writer)?;
    Ok((written, reader.crc().sum()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zip::entry::FLAG_DATA_DESCRIPTOR;
    use crate::zip::writer::ZipWriter;
    use std::io::Cursor;

    fn archive(method: CompressionMethod) -> ZipArchive<Cursor<Vec<u8>>> {
        let mut writer = ZipWriter::new(Vec::new());
        writer
            .add_file("notes.txt", &b"lorem ipsum ".repeat(64), method)
            .unwrap();
        writer.add_directory("empty").unwrap();
        ZipArchive::open(Cursor::new(writer.finish().unwrap())).unwrap()
    }

    #[test]
    fn stored_and_deflated_entries_read_back() {
        for method in [CompressionMethod::Stored, CompressionMethod::Deflate] {
            let mut archive = archive(method);
            assert_eq!(archive.read_entry("notes.txt").unwrap(), b"lorem ipsum ".repeat(64));
            assert!(archive.read_entry("empty/").unwrap().is_empty());
        }
        let archive = archive(CompressionMethod::Deflate);
        let entry = archive.entry("notes.txt").unwrap();
        assert!(entry.compressed_size < entry.uncompressed_size);
    }

    #[test]
    fn missing_entry_is_not_found() {
        let err = archive(CompressionMethod::Stored).read_entry("nope").unwrap_err();
        assert!(matches!(err, FormatError::Io(e) if e.kind() == io::ErrorKind::NotFound));
    }

    #[test]
    fn corrupt_data_fails_the_crc() {
        let mut bytes = archive(CompressionMethod::Stored).into_inner().into_inner();
        bytes[30 + "notes.txt".len()] ^= 0x01;
        let mut archive = ZipArchive::open(Cursor::new(bytes)).unwrap();
        let err = archive.read_entry("notes.txt").unwrap_err();
        assert!(err.to_string().contains("CRC-32"));
    }

    #[test]
    fn local_name_must_match() {
        let mut bytes = archive(CompressionMethod::Stored).into_inner().into_inner();
        bytes[30] = b'N';
        let mut archive = ZipArchive::open(Cursor::new(bytes)).unwrap();
        let err = archive.read_entry("notes.txt").unwrap_err();
        assert!(matches!(err, FormatError::InvalidHeader { record: "local file header", .. }));
    }

    #[test]
    fn non_utf8_names_extract_by_raw_bytes() {
        let mut writer = ZipWriter::new(Vec::new());
        writer.add_file("xb", b"latin-1", CompressionMethod::Stored).unwrap();
        let mut bytes = writer.finish().unwrap();

        // Same name byte in the local header and in the central header.
        let cd_offset = ZipArchive::open(Cursor::new(bytes.clone()))
            .unwrap()
            .zip64_end_of_central_directory()
            .cd_offset() as usize;
        bytes[30] = 0xFF;
        bytes[cd_offset + 46] = 0xFF;

        let mut archive = ZipArchive::open(Cursor::new(bytes)).unwrap();
        let entry = archive.entries()[0].clone();
        assert_eq!(entry.raw_name, vec![0xFF, b'b']);
        assert_eq!(entry.file_name, "\u{FFFD}b");
        assert_eq!(archive.extract_to_memory(&entry).unwrap(), b"latin-1");
        assert_eq!(archive.read_entry("\u{FFFD}b").unwrap(), b"latin-1");
    }

    #[test]
    fn data_descriptor_is_checked() {
        let data = b"descriptor";
        let mut crc = flate2::Crc::new();
        crc.update(data);

        let mut descriptor = DataDescriptor::new();
        descriptor.set_crc32(crc.sum());
        descriptor.set_compressed_size(data.len() as u32);
        descriptor.set_uncompressed_size(data.len() as u32);
        let entry = ZipFileEntry {
            file_name: "d".to_string(),
            raw_name: b"d".to_vec(),
            compression_method: CompressionMethod::Stored,
            flags: FLAG_DATA_DESCRIPTOR,
            compressed_size: data.len() as u64,
            uncompressed_size: data.len() as u64,
            crc32: crc.sum(),
            lfh_offset: 0,
            last_mod_time: 0,
            last_mod_date: 0,
            is_directory: false,
        };

        for (signed, bad) in [(true, false), (false, false), (true, true)] {
            let mut local = LocalFileHeader::new();
            local.set_file_name(b"d").unwrap();
            local.set_flags(FLAG_DATA_DESCRIPTOR);
            let mut bytes = Vec::new();
            local.write(&mut bytes).unwrap();
            bytes.extend_from_slice(data);
            if signed {
                bytes.extend_from_slice(&DATA_DESCRIPTOR_SIGNATURE.to_le_bytes());
            }
            let mut d = descriptor.clone();
            if bad {
                d.set_crc32(0);
            }
            d.write(&mut bytes).unwrap();

            // Only the stream matters to extraction; borrow one from a real archive.
            let mut archive = archive(CompressionMethod::Stored);
            archive.stream = Cursor::new(bytes);
            let result = archive.extract_to_memory(&entry);
            assert_eq!(result.is_err(), bad);
        }
    }

    #[test]
    fn encrypted_and_unknown_methods_are_unsupported() {
        let mut archive = archive(CompressionMethod::Stored);
        let mut entry = archive.entry("notes.txt").unwrap().clone();
        entry.compression_method = CompressionMethod::Unknown(14);
        let err = archive.extract_to_memory(&entry).unwrap_err();
        assert!(matches!(
            err,
            FormatError::UnsupportedFeature(Feature::CompressionMethod(14))
        ));

        entry.flags |= crate::zip::entry::FLAG_ENCRYPTED;
        let err = archive.extract_to_memory(&entry).unwrap_err();
        assert!(matches!(err, FormatError::UnsupportedFeature(Feature::Encryption)));
    }
}
