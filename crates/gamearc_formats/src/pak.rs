//! **PAK** archives used by *Quake* and its descendants.
//!
//! | Offset (bytes) | Field             | Description                                  |
//! |----------------|-------------------|----------------------------------------------|
//! | 0x0000         | Magic number      | 4 bytes: "PACK"                              |
//! | 0x0004         | Directory Offset  | 4 bytes: Offset of the directory             |
//! | 0x0008         | Directory Length  | 4 bytes: Size of the directory in bytes      |
//!
//! The directory is a run of 64 byte records: a 56 byte NUL padded name, the payload offset
//! and the payload size. Payloads are never compressed. Every integer is little-endian.

use std::{
    io::{Cursor, Write},
    sync::Arc,
};

use binrw::{io::NoSeek, BinRead, BinWrite};
use gamearc_engine::{
    error::{Error, Result},
    validate::{check_file_count, check_filename, check_span},
    ByteCursor, Capabilities, Codecs, ConfidenceScore, Entry, EntryTable, FormatDescriptor,
    FormatPlugin, Limits, Platform, Source,
};
use tracing::{debug, instrument};

use crate::{binrw_error, to_u32};

/// Identity of the PAK format
pub static DESCRIPTOR: FormatDescriptor = FormatDescriptor {
    tag: "pak",
    label: "Quake PAK archive",
    extensions: &["pak"],
    platforms: &[Platform::Pc],
    capabilities: Capabilities::READ_WRITE,
};

const HEADER_SIZE: u64 = 12;
const RECORD_SIZE: u64 = 64;
const NAME_SIZE: usize = 56;

/// PAK file header
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(magic = b"PACK", little)]
pub struct PakHeader {
    /// Offset of the directory from the start of the file
    pub directory_offset: u32,

    /// Size of the directory in bytes
    pub directory_length: u32,
}

/// One directory record
#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq)]
#[brw(little)]
pub struct PakRecord {
    /// NUL padded name
    pub name: [u8; NAME_SIZE],

    /// Offset of the payload from the start of the file
    pub offset: u32,

    /// Size of the payload
    pub size: u32,
}

impl PakRecord {
    fn name(&self) -> String {
        let end = self.name.iter().position(|&c| c == 0).unwrap_or(NAME_SIZE);
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }
}

/// Reader and writer for PAK archives
#[derive(Debug, Clone, Copy, Default)]
pub struct Pak;

impl Pak {
    fn read_header(cursor: &mut ByteCursor) -> Result<PakHeader> {
        cursor.require(HEADER_SIZE)?;
        if &cursor.peek_bytes(4)?[..] != b"PACK" {
            return Err(Error::BadMagic {
                format: DESCRIPTOR.tag,
                offset: 0,
            });
        }
        PakHeader::read(cursor).map_err(|e| binrw_error(DESCRIPTOR.tag, e))
    }
}

impl FormatPlugin for Pak {
    fn descriptor(&self) -> &'static FormatDescriptor {
        &DESCRIPTOR
    }

    fn probe(&self, cursor: &mut ByteCursor) -> Result<ConfidenceScore> {
        let mut score = ConfidenceScore::default();
        score.add_if(
            DESCRIPTOR.matches_extension(cursor.name().unwrap_or_default()),
            ConfidenceScore::EXTENSION,
        );

        let Ok(header) = Pak::read_header(cursor) else {
            return Ok(score);
        };
        score.add(ConfidenceScore::MAGIC);
        score.add_if(
            check_span(
                header.directory_offset as u64,
                header.directory_length as u64,
                cursor.len(),
            )
            .is_ok(),
            ConfidenceScore::FIELD,
        );
        score.add_if(
            header.directory_length as u64 % RECORD_SIZE == 0,
            ConfidenceScore::FIELD,
        );
        Ok(score)
    }

    #[instrument(skip_all, fields(source = source.name()), err)]
    fn extract(&self, source: &Arc<Source>, limits: &Limits) -> Result<EntryTable> {
        let mut cursor = source.lock();
        cursor.seek(0)?;

        let header = Pak::read_header(&mut cursor)?;
        let offset = header.directory_offset as u64;
        let length = header.directory_length as u64;
        check_span(offset, length, cursor.len())?;
        if length % RECORD_SIZE != 0 {
            return Err(Error::InconsistentDirectory(format!(
                "directory length {length} is not a multiple of {RECORD_SIZE}"
            )));
        }
        let count = check_file_count(length / RECORD_SIZE, limits)?;
        debug!(count, "read header");

        cursor.seek(offset)?;
        let mut table = EntryTable::new(Arc::clone(source), count);
        for _ in 0..count {
            let record = PakRecord::read(&mut *cursor).map_err(|e| binrw_error(DESCRIPTOR.tag, e))?;
            let name = record.name();
            check_filename(&name, limits)?;
            table.add(name, record.offset as u64, record.size as u64)?;
        }
        Ok(table)
    }

    #[instrument(skip_all, fields(entries = entries.len()), err)]
    fn pack(&self, entries: &[Entry], codecs: &Codecs, destination: &mut dyn Write) -> Result<()> {
        let mut data = Vec::new();
        let mut directory = Cursor::new(Vec::with_capacity(entries.len() * RECORD_SIZE as usize));

        for entry in entries {
            let name = entry.name().as_bytes();
            if name.len() >= NAME_SIZE {
                return Err(Error::InvalidName {
                    name: entry.name().to_owned(),
                    reason: "pak names hold at most 55 bytes",
                });
            }

            let payload = entry.read(codecs)?;
            let mut record = PakRecord {
                name: [0u8; NAME_SIZE],
                offset: to_u32(HEADER_SIZE + data.len() as u64)?,
                size: to_u32(payload.len() as u64)?,
            };
            record.name[..name.len()].copy_from_slice(name);
            record
                .write(&mut directory)
                .map_err(|e| binrw_error(DESCRIPTOR.tag, e))?;
            data.extend_from_slice(&payload);
        }

        let directory = directory.into_inner();
        let header = PakHeader {
            directory_offset: to_u32(HEADER_SIZE + data.len() as u64)?,
            directory_length: to_u32(directory.len() as u64)?,
        };

        header
            .write(&mut NoSeek::new(&mut *destination))
            .map_err(|e| binrw_error(DESCRIPTOR.tag, e))?;
        destination.write_all(&data)?;
        destination.write_all(&directory)?;
        destination.flush()?;
        Ok(())
    }
}
