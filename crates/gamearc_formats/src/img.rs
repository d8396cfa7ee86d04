//! Version 2 **IMG** archives used by *Grand Theft Auto: San Andreas*.
//!
//! | Offset (bytes) | Field         | Description                        |
//! |----------------|---------------|------------------------------------|
//! | 0x0000         | Magic number  | 4 bytes: "VER2"                    |
//! | 0x0004         | Entry Count   | 4 bytes: Number of directory records |
//!
//! Each 32 byte record holds the offset in sectors (u32), the streaming size in sectors (u16),
//! the archive size in sectors (u16) and a 24 byte NUL padded name. A sector is 2048 bytes.
//! The streaming size wins when it is not zero. Every integer is little-endian.

use std::sync::Arc;

use binrw::BinRead;
use gamearc_engine::{
    error::{Error, Result},
    validate::{check_file_count, check_filename},
    ByteCursor, Capabilities, ConfidenceScore, EntryTable, FormatDescriptor, FormatPlugin,
    Limits, Platform, Source,
};
use tracing::{debug, instrument};

use crate::binrw_error;

/// Identity of the IMG format
pub static DESCRIPTOR: FormatDescriptor = FormatDescriptor {
    tag: "img",
    label: "GTA San Andreas IMG archive (VER2)",
    extensions: &["img"],
    platforms: &[Platform::Pc, Platform::PlayStation2, Platform::Xbox],
    capabilities: Capabilities::READ_ONLY,
};

/// Size of a sector, the unit of every offset and size
pub const SECTOR_SIZE: u64 = 2048;

const HEADER_SIZE: u64 = 8;
const RECORD_SIZE: u64 = 32;

/// One directory record
#[derive(BinRead, Debug, Copy, Clone, PartialEq)]
#[br(little)]
pub struct ImgRecord {
    /// Offset of the payload in sectors
    pub offset: u32,

    /// Size of the payload in sectors, zero when only the archive size is set
    pub streaming_size: u16,

    /// Legacy size in sectors
    pub archive_size: u16,

    /// NUL padded name
    pub name: [u8; 24],
}

impl ImgRecord {
    /// Size of the payload in sectors
    pub fn sectors(&self) -> u64 {
        match self.streaming_size {
            0 => self.archive_size as u64,
            size => size as u64,
        }
    }

    fn name(&self) -> String {
        let end = self.name.iter().position(|&c| c == 0).unwrap_or(self.name.len());
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }
}

/// Reader for IMG archives
#[derive(Debug, Clone, Copy, Default)]
pub struct Img;

impl Img {
    fn read_count(cursor: &mut ByteCursor) -> Result<u32> {
        cursor.require(HEADER_SIZE)?;
        if &cursor.read_array::<4>()? != b"VER2" {
            return Err(Error::BadMagic {
                format: DESCRIPTOR.tag,
                offset: 0,
            });
        }
        cursor.read_u32::<byteorder::LittleEndian>()
    }
}

impl FormatPlugin for Img {
    fn descriptor(&self) -> &'static FormatDescriptor {
        &DESCRIPTOR
    }

    fn probe(&self, cursor: &mut ByteCursor) -> Result<ConfidenceScore> {
        let mut score = ConfidenceScore::default();
        score.add_if(
            DESCRIPTOR.matches_extension(cursor.name().unwrap_or_default()),
            ConfidenceScore::EXTENSION,
        );

        let Ok(count) = Img::read_count(cursor) else {
            return Ok(score);
        };
        score.add(ConfidenceScore::MAGIC);
        score.add_if(
            count as u64 * RECORD_SIZE <= cursor.remaining(),
            ConfidenceScore::FIELD,
        );
        score.add_if(cursor.len() % SECTOR_SIZE == 0, ConfidenceScore::FIELD);
        Ok(score)
    }

    #[instrument(skip_all, fields(source = source.name()), err)]
    fn extract(&self, source: &Arc<Source>, limits: &Limits) -> Result<EntryTable> {
        let mut cursor = source.lock();
        cursor.seek(0)?;

        let count = check_file_count(Img::read_count(&mut cursor)?, limits)?;
        cursor.require(count as u64 * RECORD_SIZE)?;
        debug!(count, "read header");

        let mut table = EntryTable::new(Arc::clone(source), count);
        for _ in 0..count {
            let record = ImgRecord::read(&mut *cursor).map_err(|e| binrw_error(DESCRIPTOR.tag, e))?;
            let name = record.name();
            check_filename(&name, limits)?;
            table.add(
                name,
                record.offset as u64 * SECTOR_SIZE,
                record.sectors() * SECTOR_SIZE,
            )?;
        }
        Ok(table)
    }
}
