//! **AFS** archives used across Sega's Dreamcast, PlayStation 2 and GameCube catalogue.
//!
//! | Offset (bytes)   | Field              | Description                                    |
//! |------------------|--------------------|------------------------------------------------|
//! | 0x0000           | Magic number       | 4 bytes: "AFS\0"                               |
//! | 0x0004           | Entry Count        | 4 bytes: Number of entries                     |
//! | 0x0008           | Entry Table        | 8 bytes per entry: payload offset and size     |
//! | 0x0008 + 8 × n   | Name Table Pointer | 8 bytes: offset and size of the name table     |
//!
//! The name table is optional. Older archives leave the pointer zeroed and store it in the
//! eight bytes right before the first payload instead, and many archives carry no names at
//! all. A name record is 48 bytes: a 32 byte NUL padded name, six u16 timestamp fields
//! (year, month, day, hour, minute, second) and the payload size again.
//!
//! Every integer is little-endian.

use std::sync::Arc;

use binrw::BinRead;
use gamearc_engine::{
    error::{Error, Result},
    sniff,
    validate::{check_file_count, check_filename, check_span},
    ByteCursor, Capabilities, ConfidenceScore, Entry, EntryTable, FormatDescriptor,
    FormatPlugin, Limits, Platform, Source,
};
use tracing::{debug, instrument};

use crate::binrw_error;

/// Identity of the AFS format
pub static DESCRIPTOR: FormatDescriptor = FormatDescriptor {
    tag: "afs",
    label: "Sega AFS archive",
    extensions: &["afs"],
    platforms: &[
        Platform::Dreamcast,
        Platform::PlayStation2,
        Platform::GameCube,
        Platform::Xbox,
    ],
    capabilities: Capabilities::READ_ONLY,
};

const MAGIC: &[u8; 4] = b"AFS\0";
const HEADER_SIZE: u64 = 8;
const RECORD_SIZE: u64 = 8;
const NAME_RECORD_SIZE: u64 = 48;

/// Offset and size of one payload, also the layout of the name table pointer
#[derive(BinRead, Debug, Default, Copy, Clone, PartialEq)]
#[br(little)]
pub struct AfsRecord {
    /// Offset from the start of the file
    pub offset: u32,

    /// Size in bytes
    pub size: u32,
}

/// One record of the name table
#[derive(BinRead, Debug, Copy, Clone, PartialEq)]
#[br(little)]
pub struct AfsName {
    /// NUL padded name
    pub name: [u8; 32],

    /// Modification time as year, month, day, hour, minute and second
    pub timestamp: [u16; 6],

    /// Size of the payload, a copy of the entry table value
    pub size: u32,
}

impl AfsName {
    fn name(&self) -> String {
        let end = self.name.iter().position(|&c| c == 0).unwrap_or(self.name.len());
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }
}

/// Reader for AFS archives
#[derive(Debug, Clone, Copy, Default)]
pub struct Afs;

impl Afs {
    fn read_count(cursor: &mut ByteCursor) -> Result<u32> {
        cursor.require(HEADER_SIZE)?;
        if &cursor.read_array::<4>()? != MAGIC {
            return Err(Error::BadMagic {
                format: DESCRIPTOR.tag,
                offset: 0,
            });
        }
        cursor.read_u32::<byteorder::LittleEndian>()
    }

    fn read_record(cursor: &mut ByteCursor) -> Result<AfsRecord> {
        AfsRecord::read(cursor).map_err(|e| binrw_error(DESCRIPTOR.tag, e))
    }

    /// Locate the name table, trying the slot after the entry table and then the slot before
    /// the first payload.
    ///
    /// The second slot only counts when it lies past the first one, otherwise it would be a
    /// record of the entry table itself.
    fn find_name_table(
        cursor: &mut ByteCursor,
        records: &[AfsRecord],
    ) -> Result<Option<AfsRecord>> {
        let count = records.len() as u64;
        let table_end = HEADER_SIZE + count * RECORD_SIZE;
        let mut slots = vec![table_end];
        if let Some(first) = records.iter().map(|r| r.offset as u64).filter(|&o| o > 0).min() {
            if first >= table_end + 2 * RECORD_SIZE {
                slots.push(first - RECORD_SIZE);
            }
        }

        for slot in slots {
            if slot + RECORD_SIZE > cursor.len() {
                continue;
            }
            cursor.seek(slot)?;
            let pointer = Afs::read_record(cursor)?;
            if pointer.offset == 0 && pointer.size == 0 {
                continue;
            }

            let plausible = pointer.size as u64 >= count * NAME_RECORD_SIZE
                && check_span(pointer.offset as u64, pointer.size as u64, cursor.len()).is_ok();
            if plausible {
                debug!(slot, offset = pointer.offset, "found name table");
                return Ok(Some(pointer));
            }
        }
        Ok(None)
    }
}

impl FormatPlugin for Afs {
    fn descriptor(&self) -> &'static FormatDescriptor {
        &DESCRIPTOR
    }

    fn probe(&self, cursor: &mut ByteCursor) -> Result<ConfidenceScore> {
        let mut score = ConfidenceScore::default();
        score.add_if(
            DESCRIPTOR.matches_extension(cursor.name().unwrap_or_default()),
            ConfidenceScore::EXTENSION,
        );

        let Ok(count) = Afs::read_count(cursor) else {
            return Ok(score);
        };
        score.add(ConfidenceScore::MAGIC);

        let table_end = HEADER_SIZE + count as u64 * RECORD_SIZE;
        if !score.add_if(table_end <= cursor.len(), ConfidenceScore::FIELD) || count == 0 {
            return Ok(score);
        }
        let first = Afs::read_record(cursor)?;
        score.add_if(
            first.offset as u64 >= table_end
                && check_span(first.offset as u64, first.size as u64, cursor.len()).is_ok(),
            ConfidenceScore::FIELD,
        );
        Ok(score)
    }

    #[instrument(skip_all, fields(source = source.name()), err)]
    fn extract(&self, source: &Arc<Source>, limits: &Limits) -> Result<EntryTable> {
        let mut cursor = source.lock();
        cursor.seek(0)?;

        let count = check_file_count(Afs::read_count(&mut cursor)?, limits)?;
        cursor.require(count as u64 * RECORD_SIZE)?;
        let records = (0..count)
            .map(|_| Afs::read_record(&mut cursor))
            .collect::<Result<Vec<_>>>()?;
        debug!(count, "read entry table");

        let mut table = EntryTable::new(Arc::clone(source), count);
        let Some(names) = Afs::find_name_table(&mut cursor, &records)? else {
            for record in &records {
                table.add_unnamed(record.offset as u64, record.size as u64)?;
            }
            return Ok(table);
        };

        cursor.seek(names.offset as u64)?;
        for record in &records {
            let name = AfsName::read(&mut *cursor).map_err(|e| binrw_error(DESCRIPTOR.tag, e))?;
            let name = name.name();
            check_filename(&name, limits)?;
            table.add(name, record.offset as u64, record.size as u64)?;
        }
        Ok(table)
    }

    fn guess_extension(&self, entry: &Entry, header_probe: &[u8]) -> Option<&'static str> {
        let _ = entry;
        match header_probe {
            // ADX audio streams open with a 0x8000 marker
            [0x80, 0x00, ..] => Some("adx"),
            _ => sniff::guess_extension(header_probe),
        }
    }
}
