//! ROFS on-disk format definitions.
//!
//! The image is laid out as a fixed 32-byte header, a fixed-capacity directory table, a
//! variable-length name table, the file-info table and finally the file data.  All integers are
//! little-endian.

use zerocopy::{
    little_endian::{U16, U32},
    FromBytes, Immutable, IntoBytes, KnownLayout,
};

pub const MAGIC: [u8; 4] = *b"ROFS";

/// Value of the reserved header words.
pub const RESERVED: u32 = 0xffff_ffff;

pub const HEADER_SIZE: usize = 0x20;
pub const DIRECTORY_TABLE_OFFSET: usize = HEADER_SIZE;

/// Number of 8-byte slots in the directory table, including the end marker of a full table.
pub const DIRECTORY_SLOTS: usize = 0x1000;
pub const DIRECTORY_TABLE_SIZE: usize = DIRECTORY_SLOTS * size_of::<DirectoryEntry>();
pub const NAME_TABLE_OFFSET: usize = DIRECTORY_TABLE_OFFSET + DIRECTORY_TABLE_SIZE;

/// The largest number of directories an image can hold, the root included.
pub const MAX_DIRECTORIES: usize = DIRECTORY_SLOTS - 1;
pub const MAX_FILES: usize = u16::MAX as usize - 1;
pub const MAX_NAME_LEN: usize = 0x7f;

/// Files must be strictly smaller than this.
pub const MAX_FILE_SIZE: u64 = u32::MAX as u64;

/// Length byte flag of a subdirectory entry in the name table.
pub const DIRECTORY_NAME_FLAG: u8 = 0x80;
/// High-nibble tag on directory indices in the name table and the parent field.
pub const DIRECTORY_INDEX_TAG: u16 = 0xf000;

pub const FILE_INFO_ALIGNMENT: usize = 2;
pub const FILE_DATA_ALIGNMENT: usize = 16;
pub const FILE_ALIGNMENT: usize = 4;

/// Byte used for the reservation fill, file terminators and file padding.
pub const FILL: u8 = 0xff;

#[derive(Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout)]
#[repr(C)]
pub struct Header {
    pub magic: [u8; 4],
    pub reserved: U32,
    pub directory_table_offset: U32,
    pub file_info_relative_offset: U32,
    pub file_info_offset: U32,
    pub file_info_size: U32,
    pub reserved_tail: [U32; 2],
}

/// One slot of the directory table.
///
/// Slot 0 describes the root; its `parent` field holds the total number of directories
/// instead of a parent reference.
#[derive(Debug, Default, Clone, Copy, PartialEq, FromBytes, Immutable, IntoBytes, KnownLayout)]
#[repr(C)]
pub struct DirectoryEntry {
    /// Offset of the directory's name block, relative to the directory table.
    pub name_offset: U32,
    /// Index of the directory's first file.
    pub first_file: U16,
    pub parent: U16,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, FromBytes, Immutable, IntoBytes, KnownLayout)]
#[repr(C)]
pub struct FileInfo {
    pub start: U32,
    /// End of the file's bytes, exclusive of the terminator and padding.
    pub end: U32,
}

const _: () = assert!(size_of::<Header>() == HEADER_SIZE);
const _: () = assert!(size_of::<DirectoryEntry>() == 8);
const _: () = assert!(size_of::<FileInfo>() == 8);

/// Tags a 0-based directory index for storage in the name table or a parent field.
pub fn directory_index_tag(index: u16) -> u16 {
    index | DIRECTORY_INDEX_TAG
}

pub fn round_up(n: usize, to: usize) -> usize {
    n.div_ceil(to) * to
}
