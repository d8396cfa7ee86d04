//! On-disk layouts of the TRE header and directory records.

use binrw::{BinRead, BinWrite};

/// Size of the header, which is also where payloads start
pub const HEADER_SIZE: u64 = 36;

/// Size of one record in the record block
pub const RECORD_SIZE: u64 = 24;

/// Size of one payload hash after the name block
pub const HASH_SIZE: u64 = 16;

/// Fixed 36 byte header following the `EERT5000` signature.
///
/// Block storage methods are kept as raw integers so an unknown method surfaces as a
/// typed error from [`CompressionMethod`](super::CompressionMethod) rather than a layout
/// failure.
#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq)]
#[brw(magic = b"EERT5000", little)]
pub struct TreHeader {
    /// Number of directory records
    pub record_count: u32,

    /// Absolute offset of the record block, right after the last payload
    pub record_offset: u32,

    /// Storage method of the record block
    pub record_method: u32,

    /// Bytes the record block occupies in the file
    pub record_block_size: u32,

    /// Storage method of the name block
    pub name_method: u32,

    /// Bytes the name block occupies in the file
    pub name_block_size: u32,

    /// Bytes of the name block once expanded
    pub name_block_expanded: u32,
}

impl Default for TreHeader {
    fn default() -> Self {
        TreHeader {
            record_count: 0,
            record_offset: HEADER_SIZE as u32,
            record_method: 0,
            record_block_size: 0,
            name_method: 0,
            name_block_size: 0,
            name_block_expanded: 0,
        }
    }
}

/// One directory record
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(little)]
pub struct TreRecord {
    /// CRC-32/BZIP2 of the entry name
    pub name_crc: u32,

    /// Payload size once expanded
    pub expanded_size: u32,

    /// Absolute offset of the payload
    pub offset: u32,

    /// Storage method of the payload
    pub method: u32,

    /// Payload size in the file
    pub stored_size: u32,

    /// Where the NUL terminated name starts inside the expanded name block
    pub name_offset: u32,
}
