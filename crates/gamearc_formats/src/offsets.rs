//! Headerless **offset tables**, the simplest layout found in countless console titles.
//!
//! | Offset (bytes) | Field        | Description                              |
//! |----------------|--------------|------------------------------------------|
//! | 0x0000         | Entry Count  | 4 bytes: Number of entries               |
//! | 0x0004         | Offsets      | 4 bytes per entry: payload offset        |
//!
//! There is no signature, no names and no sizes. Each payload runs up to the next offset
//! and the last one to the end of the file. Integers are little-endian.
//!
//! Without a signature the format can only ever score from its extension and two
//! plausibility checks, which by themselves stay below the default dispatch floor.

use std::sync::Arc;

use byteorder::LittleEndian;
use gamearc_engine::{
    error::Result,
    validate::{check_file_count, check_offset},
    ByteCursor, Capabilities, ConfidenceScore, EntryTable, FormatDescriptor, FormatPlugin,
    Limits, Platform, Source,
};
use tracing::{debug, instrument};

/// Identity of the offset table format
pub static DESCRIPTOR: FormatDescriptor = FormatDescriptor {
    tag: "offsets",
    label: "Headerless offset table",
    extensions: &["dat", "bin"],
    platforms: &[
        Platform::Pc,
        Platform::PlayStation2,
        Platform::PlayStationPortable,
    ],
    capabilities: Capabilities::READ_ONLY,
};

const COUNT_SIZE: u64 = 4;
const OFFSET_SIZE: u64 = 4;

/// Reader for headerless offset tables
#[derive(Debug, Clone, Copy, Default)]
pub struct OffsetTable;

impl OffsetTable {
    fn read_offsets(cursor: &mut ByteCursor, count: usize) -> Result<Vec<u64>> {
        cursor.require(count as u64 * OFFSET_SIZE)?;

        let len = cursor.len();
        (0..count)
            .map(|_| check_offset(cursor.read_u32::<LittleEndian>()?, len))
            .collect()
    }
}

impl FormatPlugin for OffsetTable {
    fn descriptor(&self) -> &'static FormatDescriptor {
        &DESCRIPTOR
    }

    fn probe(&self, cursor: &mut ByteCursor) -> Result<ConfidenceScore> {
        let mut score = ConfidenceScore::default();
        score.add_if(
            DESCRIPTOR.matches_extension(cursor.name().unwrap_or_default()),
            ConfidenceScore::EXTENSION,
        );

        let count = cursor.read_u32::<LittleEndian>()? as u64;
        let table_end = COUNT_SIZE + count * OFFSET_SIZE;
        if !score.add_if(count > 0 && table_end <= cursor.len(), ConfidenceScore::FIELD) {
            return Ok(score);
        }

        let first = cursor.read_u32::<LittleEndian>()? as u64;
        score.add_if(
            first >= table_end && first <= cursor.len(),
            ConfidenceScore::FIELD,
        );
        Ok(score)
    }

    #[instrument(skip_all, fields(source = source.name()), err)]
    fn extract(&self, source: &Arc<Source>, limits: &Limits) -> Result<EntryTable> {
        let mut cursor = source.lock();
        cursor.seek(0)?;

        let count = check_file_count(cursor.read_u32::<LittleEndian>()?, limits)?;
        let offsets = OffsetTable::read_offsets(&mut cursor, count)?;
        debug!(count, "read offsets");
        drop(cursor);

        let mut table = EntryTable::new(Arc::clone(source), count);
        for offset in offsets {
            table.add_unnamed(offset, 0)?;
        }
        table.infer_missing_lengths(source.size())?;
        Ok(table)
    }
}
