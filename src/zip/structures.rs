//! ZIP record catalog.
//!
//! Field layouts and validation rules for every record this crate reads or
//! writes, following PKWARE APPNOTE 6.3.x. Each record kind is one static
//! [`FieldDesc`] table interpreted by [`Record`]; the typed structs below are
//! thin, named views over a [`Record`].

use std::io::{Read, Write};

use super::field::{FieldDesc, Rule};
use super::record::Record;
use crate::error::{Feature, FormatError, Result, Violation};

pub const LOCAL_FILE_HEADER_SIGNATURE: u32 = 0x04034b50;
pub const DATA_DESCRIPTOR_SIGNATURE: u32 = 0x08074b50;
pub const CENTRAL_FILE_HEADER_SIGNATURE: u32 = 0x02014b50;
pub const ZIP64_END_OF_CD_SIGNATURE: u32 = 0x06064b50;
pub const ZIP64_END_OF_CD_LOCATOR_SIGNATURE: u32 = 0x07064b50;
pub const END_OF_CD_SIGNATURE: u32 = 0x06054b50;

/// Version needed to extract anything using zip64 records (4.5).
pub const ZIP64_MINIMUM_VERSION: u16 = 45;
/// Version needed for plain deflate/store entries (2.0).
pub const ZIP32_DEFAULT_VERSION: u16 = 20;

/// 16-bit "see the zip64 record" placeholder.
pub const SENTINEL_U16: u16 = u16::MAX;
/// 32-bit "see the zip64 record" placeholder.
pub const SENTINEL_U32: u32 = u32::MAX;

/// Leading bytes of the zip64 end of central directory record (signature and
/// the size field itself) that its declared size does not count.
const ZIP64_EOCD_LEADING_BYTES: u64 = 12;

const MULTI_DISK: Violation = Violation::Unsupported(Feature::MultiDisk);
const NOT_ZIP64: Violation = Violation::Unsupported(Feature::LegacyEndOfCentralDirectory);
const COMMENT: Violation = Violation::Unsupported(Feature::ArchiveComment);

const LOCAL_FILE_HEADER: &[FieldDesc] = &[
    FieldDesc::u32("signature", Rule::Signature(LOCAL_FILE_HEADER_SIGNATURE)),
    FieldDesc::u16("version needed to extract", Rule::Any),
    FieldDesc::u16("general purpose bit flag", Rule::Any),
    FieldDesc::u16("compression method", Rule::Any),
    FieldDesc::u16("last mod file time", Rule::Any),
    FieldDesc::u16("last mod file date", Rule::Any),
    FieldDesc::u32("crc-32", Rule::Any),
    FieldDesc::u32("compressed size", Rule::Any),
    FieldDesc::u32("uncompressed size", Rule::Any),
    FieldDesc::u16("file name length", Rule::LengthOf(11)),
    FieldDesc::u16("extra field length", Rule::LengthOf(12)),
    FieldDesc::bytes("file name", Rule::Any),
    FieldDesc::bytes("extra field", Rule::Any),
];

const DATA_DESCRIPTOR: &[FieldDesc] = &[
    FieldDesc::u32("crc-32", Rule::Any),
    FieldDesc::u32("compressed size", Rule::Any),
    FieldDesc::u32("uncompressed size", Rule::Any),
];

const CENTRAL_FILE_HEADER: &[FieldDesc] = &[
    FieldDesc::u32("signature", Rule::Signature(CENTRAL_FILE_HEADER_SIGNATURE)),
    FieldDesc::u16("version made by", Rule::Any),
    FieldDesc::u16("version needed to extract", Rule::Any),
    FieldDesc::u16("general purpose bit flag", Rule::Any),
    FieldDesc::u16("compression method", Rule::Any),
    FieldDesc::u16("last mod file time", Rule::Any),
    FieldDesc::u16("last mod file date", Rule::Any),
    FieldDesc::u32("crc-32", Rule::Any),
    FieldDesc::u32("compressed size", Rule::Any),
    FieldDesc::u32("uncompressed size", Rule::Any),
    FieldDesc::u16("file name length", Rule::LengthOf(17)),
    FieldDesc::u16("extra field length", Rule::LengthOf(18)),
    FieldDesc::u16("file comment length", Rule::LengthOf(19)),
    FieldDesc::u16("disk number start", Rule::Any),
    FieldDesc::u16("internal file attributes", Rule::Any),
    FieldDesc::u32("external file attributes", Rule::Any),
    FieldDesc::u32("relative offset of local header", Rule::Any),
    FieldDesc::bytes("file name", Rule::Any),
    FieldDesc::bytes("extra field", Rule::Any),
    FieldDesc::bytes("file comment", Rule::Any),
];

const ZIP64_END_OF_CD: &[FieldDesc] = &[
    FieldDesc::u32("signature", Rule::Signature(ZIP64_END_OF_CD_SIGNATURE)),
    FieldDesc::u64(
        "size of zip64 end of central directory record",
        Rule::DeclaredSize {
            excluded: ZIP64_EOCD_LEADING_BYTES,
            trailing: Violation::Unsupported(Feature::ExtensibleData),
        },
    ),
    FieldDesc::u16(
        "version made by",
        Rule::Equals(
            ZIP64_MINIMUM_VERSION as u64,
            Violation::Malformed("invalid zip64 EOCD version made by"),
        ),
    ),
    FieldDesc::u16(
        "version needed to extract",
        Rule::Equals(
            ZIP64_MINIMUM_VERSION as u64,
            Violation::Malformed("invalid zip64 EOCD version to extract"),
        ),
    ),
    FieldDesc::u32("number of this disk", Rule::Equals(0, MULTI_DISK)),
    FieldDesc::u32("disk with start of central directory", Rule::Equals(0, MULTI_DISK)),
    FieldDesc::u64(
        "entries on this disk",
        Rule::NonZero(Violation::Malformed("number of entries is zero")),
    ),
    FieldDesc::u64(
        "total entries",
        Rule::SameAs(6, Violation::Malformed("total entries differ from entries on this disk")),
    ),
    FieldDesc::u64(
        "size of central directory",
        Rule::NonZeroAtMostBound(Violation::Malformed("invalid size of central directory")),
    ),
    FieldDesc::u64(
        "offset of start of central directory",
        Rule::NonZeroAtMostBound(Violation::Malformed("invalid start of central directory")),
    ),
    // Never sized: a declared size announcing it is rejected above.
    FieldDesc::bytes("zip64 extensible data sector", Rule::Any),
];

const ZIP64_END_OF_CD_LOCATOR: &[FieldDesc] = &[
    FieldDesc::u32("signature", Rule::Signature(ZIP64_END_OF_CD_LOCATOR_SIGNATURE)),
    FieldDesc::u32("disk with zip64 end of central directory", Rule::Equals(0, MULTI_DISK)),
    FieldDesc::u64(
        "relative offset of zip64 end of central directory",
        Rule::AtMostBound(Violation::Malformed("invalid relative offset")),
    ),
    FieldDesc::u32("total number of disks", Rule::Equals(1, MULTI_DISK)),
];

const END_OF_CD: &[FieldDesc] = &[
    FieldDesc::u32("signature", Rule::Signature(END_OF_CD_SIGNATURE)),
    FieldDesc::u16("number of this disk", Rule::Equals(0, MULTI_DISK)),
    FieldDesc::u16("disk with start of central directory", Rule::Equals(0, MULTI_DISK)),
    FieldDesc::u16("entries on this disk", Rule::Equals(SENTINEL_U16 as u64, NOT_ZIP64)),
    FieldDesc::u16("total entries", Rule::Equals(SENTINEL_U16 as u64, NOT_ZIP64)),
    FieldDesc::u32("size of central directory", Rule::Equals(SENTINEL_U32 as u64, NOT_ZIP64)),
    FieldDesc::u32(
        "offset of start of central directory",
        Rule::Equals(SENTINEL_U32 as u64, NOT_ZIP64),
    ),
    FieldDesc::u16("comment length", Rule::Equals(0, COMMENT)),
    // Never sized: a nonzero comment length is rejected above.
    FieldDesc::bytes("comment", Rule::Any),
];

/// Every record shape known to the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    LocalFileHeader,
    DataDescriptor,
    CentralFileHeader,
    Zip64EndOfCentralDirectory,
    Zip64EndOfCentralDirectoryLocator,
    EndOfCentralDirectory,
}

impl RecordKind {
    pub const fn name(self) -> &'static str {
        match self {
            RecordKind::LocalFileHeader => "local file header",
            RecordKind::DataDescriptor => "data descriptor",
            RecordKind::CentralFileHeader => "central file header",
            RecordKind::Zip64EndOfCentralDirectory => "zip64 end of central directory record",
            RecordKind::Zip64EndOfCentralDirectoryLocator => {
                "zip64 end of central directory locator"
            }
            RecordKind::EndOfCentralDirectory => "end of central directory record",
        }
    }

    pub const fn fields(self) -> &'static [FieldDesc] {
        match self {
            RecordKind::LocalFileHeader => LOCAL_FILE_HEADER,
            RecordKind::DataDescriptor => DATA_DESCRIPTOR,
            RecordKind::CentralFileHeader => CENTRAL_FILE_HEADER,
            RecordKind::Zip64EndOfCentralDirectory => ZIP64_END_OF_CD,
            RecordKind::Zip64EndOfCentralDirectoryLocator => ZIP64_END_OF_CD_LOCATOR,
            RecordKind::EndOfCentralDirectory => END_OF_CD,
        }
    }

    /// Map a rule violation onto this record's error kind.
    pub fn reject(self, violation: Violation) -> FormatError {
        match self {
            RecordKind::Zip64EndOfCentralDirectory => {
                FormatError::InvalidZip64CentralDirectoryRecord(violation)
            }
            RecordKind::Zip64EndOfCentralDirectoryLocator => {
                FormatError::InvalidZip64CentralDirectoryLocator(violation)
            }
            RecordKind::EndOfCentralDirectory => {
                FormatError::InvalidEndOfCentralDirectoryRecord(violation)
            }
            _ => FormatError::InvalidHeader {
                record: self.name(),
                violation,
            },
        }
    }
}

/// Getter/setter pairs for fixed fields of a typed record view.
macro_rules! fields {
    ($ty:ident { $($get:ident, $set:ident: $int:ty = $index:expr;)* }) => {
        impl $ty {
            $(
                pub fn $get(&self) -> $int {
                    self.0.uint($index) as $int
                }

                pub fn $set(&mut self, value: $int) {
                    self.0.set_uint($index, value as u64);
                }
            )*
        }
    };
}

/// Common plumbing shared by every typed record view.
macro_rules! record_view {
    ($ty:ident, $kind:expr) => {
        impl $ty {
            pub const KIND: RecordKind = $kind;

            /// A fresh record with default field values, for writing.
            pub fn new() -> Self {
                Self(Record::new(Self::KIND))
            }

            pub fn size(&self) -> usize {
                self.0.size()
            }

            pub fn record(&self) -> &Record {
                &self.0
            }

            pub fn write<W: Write>(&self, stream: &mut W) -> Result<()> {
                self.0.write(stream)
            }
        }

        impl Default for $ty {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

/// Header immediately preceding each entry's data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileHeader(Record);

record_view!(LocalFileHeader, RecordKind::LocalFileHeader);

fields!(LocalFileHeader {
    version_needed, set_version_needed: u16 = 1;
    flags, set_flags: u16 = 2;
    compression_method, set_compression_method: u16 = 3;
    last_mod_time, set_last_mod_time: u16 = 4;
    last_mod_date, set_last_mod_date: u16 = 5;
    crc32, set_crc32: u32 = 6;
    compressed_size, set_compressed_size: u32 = 7;
    uncompressed_size, set_uncompressed_size: u32 = 8;
});

impl LocalFileHeader {
    pub fn read<R: Read>(stream: &mut R) -> Result<Self> {
        Record::new(Self::KIND).read(stream).map(Self)
    }

    pub fn file_name(&self) -> &[u8] {
        self.0.bytes(11)
    }

    pub fn set_file_name(&mut self, name: &[u8]) -> Result<()> {
        self.0.set_bytes(11, name)
    }

    pub fn extra_field(&self) -> &[u8] {
        self.0.bytes(12)
    }

    pub fn set_extra_field(&mut self, extra: &[u8]) -> Result<()> {
        self.0.set_bytes(12, extra)
    }
}

/// CRC and sizes trailing streamed entry data. The optional leading
/// signature is not part of this record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDescriptor(Record);

record_view!(DataDescriptor, RecordKind::DataDescriptor);

fields!(DataDescriptor {
    crc32, set_crc32: u32 = 0;
    compressed_size, set_compressed_size: u32 = 1;
    uncompressed_size, set_uncompressed_size: u32 = 2;
});

impl DataDescriptor {
    pub fn read<R: Read>(stream: &mut R) -> Result<Self> {
        Record::new(Self::KIND).read(stream).map(Self)
    }
}

/// One entry of the central directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CentralFileHeader(Record);

record_view!(CentralFileHeader, RecordKind::CentralFileHeader);

fields!(CentralFileHeader {
    version_made_by, set_version_made_by: u16 = 1;
    version_needed, set_version_needed: u16 = 2;
    flags, set_flags: u16 = 3;
    compression_method, set_compression_method: u16 = 4;
    last_mod_time, set_last_mod_time: u16 = 5;
    last_mod_date, set_last_mod_date: u16 = 6;
    crc32, set_crc32: u32 = 7;
    compressed_size, set_compressed_size: u32 = 8;
    uncompressed_size, set_uncompressed_size: u32 = 9;
    disk_number_start, set_disk_number_start: u16 = 13;
    internal_attributes, set_internal_attributes: u16 = 14;
    external_attributes, set_external_attributes: u32 = 15;
    local_header_offset, set_local_header_offset: u32 = 16;
});

impl CentralFileHeader {
    pub fn read<R: Read>(stream: &mut R) -> Result<Self> {
        Record::new(Self::KIND).read(stream).map(Self)
    }

    pub fn file_name(&self) -> &[u8] {
        self.0.bytes(17)
    }

    pub fn set_file_name(&mut self, name: &[u8]) -> Result<()> {
        self.0.set_bytes(17, name)
    }

    pub fn extra_field(&self) -> &[u8] {
        self.0.bytes(18)
    }

    pub fn set_extra_field(&mut self, extra: &[u8]) -> Result<()> {
        self.0.set_bytes(18, extra)
    }

    pub fn comment(&self) -> &[u8] {
        self.0.bytes(19)
    }

    pub fn set_comment(&mut self, comment: &[u8]) -> Result<()> {
        self.0.set_bytes(19, comment)
    }
}

/// Zip64 end of central directory record.
///
/// Its central directory size and offset are bounded by `max_offset`, the
/// position at which the locator that points to it starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zip64EndOfCentralDirectory(Record);

record_view!(Zip64EndOfCentralDirectory, RecordKind::Zip64EndOfCentralDirectory);

fields!(Zip64EndOfCentralDirectory {
    declared_size, set_declared_size: u64 = 1;
    version_made_by, set_version_made_by: u16 = 2;
    version_needed, set_version_needed: u16 = 3;
    cd_size, set_cd_size: u64 = 8;
    cd_offset, set_cd_offset: u64 = 9;
});

impl Zip64EndOfCentralDirectory {
    pub fn read<R: Read>(stream: &mut R, max_offset: u64) -> Result<Self> {
        Record::new(Self::KIND)
            .with_max_offset(max_offset)
            .read(stream)
            .map(Self)
    }

    pub fn total_entries(&self) -> u64 {
        self.0.uint(7)
    }

    /// Sets both the per-disk and the total entry count.
    pub fn set_total_entries(&mut self, value: u64) {
        self.0.set_uint(6, value);
        self.0.set_uint(7, value);
    }
}

/// Zip64 end of central directory locator.
///
/// Its relative offset is bounded by `max_offset`, the position at which
/// the end of central directory record starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zip64EndOfCentralDirectoryLocator(Record);

record_view!(
    Zip64EndOfCentralDirectoryLocator,
    RecordKind::Zip64EndOfCentralDirectoryLocator
);

fields!(Zip64EndOfCentralDirectoryLocator {
    relative_offset, set_relative_offset: u64 = 2;
    total_disks, set_total_disks: u32 = 3;
});

impl Zip64EndOfCentralDirectoryLocator {
    pub fn read<R: Read>(stream: &mut R, max_offset: u64) -> Result<Self> {
        Record::new(Self::KIND)
            .with_max_offset(max_offset)
            .read(stream)
            .map(Self)
    }
}

/// Classic end of central directory record. Only the zip64-deferring form
/// (all counts and offsets set to their sentinels, no comment) is accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndOfCentralDirectory(Record);

record_view!(EndOfCentralDirectory, RecordKind::EndOfCentralDirectory);

fields!(EndOfCentralDirectory {
    total_entries, set_total_entries: u16 = 4;
    cd_size, set_cd_size: u32 = 5;
    cd_offset, set_cd_offset: u32 = 6;
    comment_length, set_comment_length: u16 = 7;
});

impl EndOfCentralDirectory {
    pub fn read<R: Read>(stream: &mut R) -> Result<Self> {
        Record::new(Self::KIND).read(stream).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{LittleEndian, ReadBytesExt};
    use std::io::Cursor;

    fn serialize(record: &Record) -> Vec<u8> {
        let mut out = Vec::new();
        record.write(&mut out).unwrap();
        out
    }

    fn zip64_eocd(cd_size: u64, cd_offset: u64) -> Zip64EndOfCentralDirectory {
        let mut eocd = Zip64EndOfCentralDirectory::new();
        eocd.set_total_entries(3);
        eocd.set_cd_size(cd_size);
        eocd.set_cd_offset(cd_offset);
        eocd
    }

    fn assert_zip64_rejects(bytes: &[u8], max_offset: u64) -> Violation {
        match Zip64EndOfCentralDirectory::read(&mut Cursor::new(bytes), max_offset) {
            Err(FormatError::InvalidZip64CentralDirectoryRecord(v)) => v,
            other => panic!("expected zip64 record rejection, got {other:?}"),
        }
    }

    #[test]
    fn default_zip64_declared_size_excludes_leading_twelve_bytes() {
        let eocd = Zip64EndOfCentralDirectory::new();
        let bytes = serialize(eocd.record());
        let declared = Cursor::new(&bytes[4..12]).read_u64::<LittleEndian>().unwrap();
        assert_eq!(declared, bytes.len() as u64 - 12);
        assert_eq!(declared, 44);
        assert_eq!(eocd.version_made_by(), ZIP64_MINIMUM_VERSION);
        assert_eq!(eocd.version_needed(), ZIP64_MINIMUM_VERSION);
    }

    #[test]
    fn zip64_record_reads_back_its_own_bytes() {
        let eocd = zip64_eocd(100, 200);
        let bytes = serialize(eocd.record());
        let read = Zip64EndOfCentralDirectory::read(&mut Cursor::new(&bytes), 200).unwrap();
        assert_eq!(read.declared_size(), bytes.len() as u64 - 12);
        assert_eq!(read.total_entries(), 3);
        assert_eq!(read.cd_size(), 100);
        assert_eq!(read.cd_offset(), 200);
    }

    #[test]
    fn zip64_offsets_above_bound_are_rejected() {
        let bytes = serialize(zip64_eocd(100, 201).record());
        assert_eq!(
            assert_zip64_rejects(&bytes, 200),
            Violation::Malformed("invalid start of central directory")
        );

        let bytes = serialize(zip64_eocd(201, 10).record());
        assert_eq!(
            assert_zip64_rejects(&bytes, 200),
            Violation::Malformed("invalid size of central directory")
        );
    }

    #[test]
    fn zip64_rejects_zero_entries_and_mismatched_totals() {
        let mut eocd = zip64_eocd(10, 10);
        eocd.set_total_entries(0);
        let bytes = serialize(eocd.record());
        assert_eq!(
            assert_zip64_rejects(&bytes, 100),
            Violation::Malformed("number of entries is zero")
        );

        let mut bytes = serialize(zip64_eocd(10, 10).record());
        bytes[32] = 4; // total entries
        assert_eq!(
            assert_zip64_rejects(&bytes, 100),
            Violation::Malformed("total entries differ from entries on this disk")
        );
    }

    #[test]
    fn zip64_rejects_wrong_declared_size_and_versions() {
        let mut bytes = serialize(zip64_eocd(10, 10).record());
        bytes[4] = 56;
        assert_eq!(
            assert_zip64_rejects(&bytes, 100),
            Violation::Malformed("declared record size is wrong")
        );

        let mut eocd = zip64_eocd(10, 10);
        eocd.set_version_made_by(ZIP32_DEFAULT_VERSION);
        let bytes = serialize(eocd.record());
        assert_eq!(
            assert_zip64_rejects(&bytes, 100),
            Violation::Malformed("invalid zip64 EOCD version made by")
        );
    }

    #[test]
    fn zip64_declared_extensible_data_is_unsupported() {
        let mut bytes = serialize(zip64_eocd(10, 10).record());
        bytes[4..12].copy_from_slice(&52u64.to_le_bytes());
        bytes.extend_from_slice(&[0x01, 0x00, 0x04, 0x00, 1, 2, 3, 4]);
        let v = assert_zip64_rejects(&bytes, 100);
        assert_eq!(v, Violation::Unsupported(Feature::ExtensibleData));

        let mut bytes = serialize(zip64_eocd(10, 10).record());
        bytes[4..12].copy_from_slice(&40u64.to_le_bytes());
        assert_eq!(
            assert_zip64_rejects(&bytes, 100),
            Violation::Malformed("declared record size is wrong")
        );
    }

    #[test]
    fn zip64_rejects_wrong_version_needed() {
        let mut eocd = zip64_eocd(10, 10);
        eocd.set_version_needed(ZIP32_DEFAULT_VERSION);
        let bytes = serialize(eocd.record());
        assert_eq!(
            assert_zip64_rejects(&bytes, 100),
            Violation::Malformed("invalid zip64 EOCD version to extract")
        );
    }

    #[test]
    fn zip64_rejects_central_directory_on_another_disk() {
        let mut bytes = serialize(zip64_eocd(10, 10).record());
        bytes[20] = 1; // disk with start of central directory
        assert_eq!(
            assert_zip64_rejects(&bytes, 100),
            Violation::Unsupported(Feature::MultiDisk)
        );
    }

    fn assert_eocd_rejects(bytes: &[u8]) -> Violation {
        match EndOfCentralDirectory::read(&mut Cursor::new(bytes)) {
            Err(FormatError::InvalidEndOfCentralDirectoryRecord(v)) => v,
            other => panic!("expected end of central directory rejection, got {other:?}"),
        }
    }

    #[test]
    fn eocd_rejects_other_disks() {
        // number of this disk, then disk with start of central directory
        for offset in [4, 6] {
            let mut bytes = serialize(EndOfCentralDirectory::new().record());
            bytes[offset] = 1;
            assert_eq!(assert_eocd_rejects(&bytes), Violation::Unsupported(Feature::MultiDisk));
        }
    }

    #[test]
    fn eocd_offset_must_be_the_sentinel() {
        let mut eocd = EndOfCentralDirectory::new();
        eocd.set_cd_offset(0);
        let bytes = serialize(eocd.record());
        assert_eq!(
            assert_eocd_rejects(&bytes),
            Violation::Unsupported(Feature::LegacyEndOfCentralDirectory)
        );
    }

    #[test]
    fn zip64_rejects_other_disks() {
        let mut bytes = serialize(zip64_eocd(10, 10).record());
        bytes[16] = 1; // number of this disk
        assert_eq!(
            assert_zip64_rejects(&bytes, 100),
            Violation::Unsupported(Feature::MultiDisk)
        );
    }

    #[test]
    fn locator_requires_single_disk() {
        let mut locator = Zip64EndOfCentralDirectoryLocator::new();
        locator.set_total_disks(2);
        let bytes = serialize(locator.record());
        let err = Zip64EndOfCentralDirectoryLocator::read(&mut Cursor::new(&bytes), 0).unwrap_err();
        assert!(err.is_unsupported());
        assert!(matches!(err, FormatError::InvalidZip64CentralDirectoryLocator(_)));
    }

    #[test]
    fn default_eocd_carries_zip64_sentinels() {
        let eocd = EndOfCentralDirectory::new();
        let bytes = serialize(eocd.record());
        assert_eq!(bytes.len(), 22);
        assert_eq!(&bytes[..4], b"PK\x05\x06");
        assert_eq!(&bytes[8..20], &[0xFF; 12]);
        assert_eq!(&bytes[20..], &[0, 0]);
        assert!(EndOfCentralDirectory::read(&mut Cursor::new(&bytes)).is_ok());
    }

    #[test]
    fn eocd_without_sentinels_is_rejected() {
        let mut eocd = EndOfCentralDirectory::new();
        eocd.set_total_entries(1);
        let bytes = serialize(eocd.record());
        let err = EndOfCentralDirectory::read(&mut Cursor::new(&bytes)).unwrap_err();
        assert!(matches!(
            err,
            FormatError::InvalidEndOfCentralDirectoryRecord(Violation::Unsupported(
                Feature::LegacyEndOfCentralDirectory
            ))
        ));

        let mut eocd = EndOfCentralDirectory::new();
        eocd.set_cd_size(1234);
        let bytes = serialize(eocd.record());
        assert!(matches!(
            EndOfCentralDirectory::read(&mut Cursor::new(&bytes)),
            Err(FormatError::InvalidEndOfCentralDirectoryRecord(_))
        ));
    }

    #[test]
    fn eocd_comment_is_rejected_even_without_comment_bytes() {
        let mut eocd = EndOfCentralDirectory::new();
        eocd.set_comment_length(5);
        let bytes = serialize(eocd.record());
        let err = EndOfCentralDirectory::read(&mut Cursor::new(&bytes)).unwrap_err();
        assert!(matches!(
            err,
            FormatError::InvalidEndOfCentralDirectoryRecord(Violation::Unsupported(
                Feature::ArchiveComment
            ))
        ));
    }

    #[test]
    fn central_header_sizes_three_variable_fields() {
        let mut header = CentralFileHeader::new();
        header.set_file_name(b"a/b.txt").unwrap();
        header.set_extra_field(&[0xAA; 4]).unwrap();
        header.set_comment(b"hi").unwrap();
        header.set_local_header_offset(77);
        let bytes = serialize(header.record());
        assert_eq!(bytes.len(), 46 + 7 + 4 + 2);

        let read = CentralFileHeader::read(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(read.file_name(), b"a/b.txt");
        assert_eq!(read.extra_field(), &[0xAA; 4]);
        assert_eq!(read.comment(), b"hi");
        assert_eq!(read.local_header_offset(), 77);
    }

    #[test]
    fn data_descriptor_has_no_signature() {
        let mut descriptor = DataDescriptor::new();
        descriptor.set_crc32(0xDEADBEEF);
        descriptor.set_compressed_size(5);
        descriptor.set_uncompressed_size(9);
        let bytes = serialize(descriptor.record());
        assert_eq!(bytes.len(), 12);
        assert_eq!(DataDescriptor::read(&mut Cursor::new(&bytes)).unwrap(), descriptor);
    }

    #[test]
    fn every_signature_byte_is_checked() {
        let records = [
            serialize(LocalFileHeader::new().record()),
            serialize(CentralFileHeader::new().record()),
            serialize(zip64_eocd(1, 1).record()),
            serialize(Zip64EndOfCentralDirectoryLocator::new().record()),
            serialize(EndOfCentralDirectory::new().record()),
        ];
        for bytes in records {
            for i in 0..4 {
                let mut corrupt = bytes.clone();
                corrupt[i] ^= 0x01;
                let mut stream = Cursor::new(&corrupt);
                let result = match i32::from(bytes[2]) * 256 + i32::from(bytes[3]) {
                    0x0304 => LocalFileHeader::read(&mut stream).map(drop),
                    0x0102 => CentralFileHeader::read(&mut stream).map(drop),
                    0x0606 => Zip64EndOfCentralDirectory::read(&mut stream, u64::MAX).map(drop),
                    0x0607 => Zip64EndOfCentralDirectoryLocator::read(&mut stream, u64::MAX).map(drop),
                    _ => EndOfCentralDirectory::read(&mut stream).map(drop),
                };
                assert!(matches!(result, Err(FormatError::SignatureMismatch { .. })));
                assert_eq!(stream.position(), 4);
            }
        }
    }
}
