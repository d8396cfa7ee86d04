//! **TRE** archives used by *Star Wars Galaxies*.
//!
//! ## File Structure
//!
//! A TRE file consists of a header, followed by the data blocks, a record block, a name block
//! and one MD5 hash per record.
//!
//! | Offset (bytes) | Field                  | Description                                                |
//! |----------------|------------------------|------------------------------------------------------------|
//! | 0x0000         | Magic number           | 4 bytes: "EERT" ("TREE" reversed)                          |
//! | 0x0004         | Version                | 4 bytes: "5000" ("0005" reversed)                          |
//! | 0x0008         | Record Count           | 4 bytes: Number of records in the archive                  |
//! | 0x000C         | Record Offset          | 4 bytes: Offset to the record block                        |
//! | 0x0010         | Record Compression     | 4 bytes: Compression method for records                    |
//! | 0x0014         | Record Comp. Size      | 4 bytes: Compressed size of record block                   |
//! | 0x0018         | Name Compression       | 4 bytes: Compression method for names                      |
//! | 0x001C         | Name Comp. Size        | 4 bytes: Compressed size of the name block                 |
//! | 0x0020         | Name Uncomp. Size      | 4 bytes: Uncompressed size of the name block               |
//!
//! Each 24 byte record holds a CRC-32/BZIP2 of the name, the uncompressed size, the data
//! offset, the compression method, the compressed size and the offset of the name inside
//! the name block. Names are NUL terminated.
//!
//! Compression methods are `0` (none) and `2` (zlib), for the blocks as well as for payloads.
//! Every integer is little-endian.

mod compression;
mod types;
mod write;

use std::{io::Write, sync::Arc};

use binrw::BinRead;
use gamearc_engine::{
    error::{Error, Result},
    validate::{check_file_count, check_filename, check_span},
    ByteCursor, Capabilities, CodecId, Codecs, ConfidenceScore, Entry, EntryTable,
    FormatDescriptor, FormatPlugin, Limits, Platform, Source,
};
use tracing::{debug, instrument};

use compression::TreBlockReader;
use crate::binrw_error;
use types::{TreHeader, TreRecord, HASH_SIZE, HEADER_SIZE, RECORD_SIZE};

pub use compression::CompressionMethod;
pub use write::{TreOptions, TreWriter};

const MAGIC: &[u8; 8] = b"EERT5000";

/// Identity of the TRE format
pub static DESCRIPTOR: FormatDescriptor = FormatDescriptor {
    tag: "tre",
    label: "Star Wars Galaxies TRE archive",
    extensions: &["tre"],
    platforms: &[Platform::Pc],
    capabilities: Capabilities::READ_WRITE,
};

/// Reader and writer for TRE archives
#[derive(Debug, Clone, Copy, Default)]
pub struct Tre {
    options: TreOptions,
}

impl Tre {
    /// Create the format, writing blocks as `options` asks
    pub fn new(options: TreOptions) -> Tre {
        Tre { options }
    }

    fn read_header(cursor: &mut ByteCursor) -> Result<TreHeader> {
        cursor.require(HEADER_SIZE)?;
        if &cursor.peek_bytes(MAGIC.len() as u64)?[..] != MAGIC {
            return Err(Error::BadMagic {
                format: DESCRIPTOR.tag,
                offset: 0,
            });
        }
        TreHeader::read(cursor).map_err(|e| binrw_error(DESCRIPTOR.tag, e))
    }

    fn read_records(
        cursor: &mut ByteCursor,
        header: &TreHeader,
        count: usize,
    ) -> Result<Vec<TreRecord>> {
        let start = header.record_offset as u64;
        let stored = header.record_block_size as u64;
        check_span(start, stored, cursor.len())?;

        let compression = CompressionMethod::try_from(header.record_method)?;
        let block = TreBlockReader::new(cursor, start, stored, compression)?
            .read_exactly(count as u64 * RECORD_SIZE)?;

        let mut block = std::io::Cursor::new(block);
        (0..count)
            .map(|_| TreRecord::read(&mut block).map_err(|e| binrw_error(DESCRIPTOR.tag, e)))
            .collect()
    }

    fn read_names(cursor: &mut ByteCursor, header: &TreHeader) -> Result<Vec<u8>> {
        let start = header.record_offset as u64 + header.record_block_size as u64;
        let stored = header.name_block_size as u64;
        check_span(start, stored, cursor.len())?;

        let compression = CompressionMethod::try_from(header.name_method)?;
        let expected = match compression {
            CompressionMethod::None => stored,
            CompressionMethod::Zlib => header.name_block_expanded as u64,
        };
        TreBlockReader::new(cursor, start, stored, compression)?.read_exactly(expected)
    }
}

fn name_at(names: &[u8], offset: u32) -> Result<String> {
    let tail = names.get(offset as usize..).ok_or_else(|| {
        Error::InconsistentDirectory(format!(
            "name offset {offset} is outside of a {} byte name block",
            names.len()
        ))
    })?;
    let end = tail.iter().position(|&c| c == 0).ok_or_else(|| {
        Error::InconsistentDirectory(format!("name at offset {offset} is not terminated"))
    })?;
    Ok(String::from_utf8_lossy(&tail[..end]).into_owned())
}

impl FormatPlugin for Tre {
    fn descriptor(&self) -> &'static FormatDescriptor {
        &DESCRIPTOR
    }

    fn probe(&self, cursor: &mut ByteCursor) -> Result<ConfidenceScore> {
        let mut score = ConfidenceScore::default();
        score.add_if(
            DESCRIPTOR.matches_extension(cursor.name().unwrap_or_default()),
            ConfidenceScore::EXTENSION,
        );

        let Ok(header) = Tre::read_header(cursor) else {
            return Ok(score);
        };
        score.add(ConfidenceScore::MAGIC);

        let size = cursor.len();
        let blocks_end = header.record_offset as u64
            + header.record_block_size as u64
            + header.name_block_size as u64;
        score.add_if(
            header.record_offset as u64 >= HEADER_SIZE && blocks_end <= size,
            ConfidenceScore::FIELD,
        );
        score.add_if(
            CompressionMethod::try_from(header.record_method).is_ok()
                && CompressionMethod::try_from(header.name_method).is_ok(),
            ConfidenceScore::FIELD,
        );
        Ok(score)
    }

    #[instrument(skip_all, fields(source = source.name()), err)]
    fn extract(&self, source: &Arc<Source>, limits: &Limits) -> Result<EntryTable> {
        let mut cursor = source.lock();
        cursor.seek(0)?;

        let header = Tre::read_header(&mut cursor)?;
        let count = check_file_count(header.record_count, limits)?;
        debug!(?header, "read header");

        let records = Tre::read_records(&mut cursor, &header, count)?;
        let names = Tre::read_names(&mut cursor, &header)?;

        let mut table = EntryTable::new(Arc::clone(source), count);
        for record in records {
            let name = name_at(&names, record.name_offset)?;
            check_filename(&name, limits)?;

            let compression = CompressionMethod::try_from(record.method)?;
            let offset = record.offset as u64;
            let entry = table.add(name, offset, record.stored_size as u64)?;

            match compression.codec() {
                Some(codec) => {
                    *entry = entry
                        .clone()
                        .with_codec(codec, record.expanded_size as u64);
                }
                None if record.stored_size != record.expanded_size => {
                    return Err(Error::InconsistentDirectory(format!(
                        "stored entry {} has {} bytes but expands to {}",
                        entry.name(),
                        record.stored_size,
                        record.expanded_size
                    )));
                }
                None => {}
            }
        }

        let hashes_end = header.record_offset as u64
            + header.record_block_size as u64
            + header.name_block_size as u64
            + count as u64 * HASH_SIZE;
        if hashes_end > source.size() {
            debug!(hashes_end, "archive carries no payload hashes");
        }

        Ok(table)
    }

    #[instrument(skip_all, fields(entries = entries.len()), err)]
    fn pack(&self, entries: &[Entry], codecs: &Codecs, destination: &mut dyn Write) -> Result<()> {
        let mut writer = TreWriter::new(destination, self.options);

        for entry in entries {
            match entry.decompressor() {
                None => {
                    writer.add_raw_file(
                        entry.name(),
                        CompressionMethod::None,
                        &entry.read_raw()?,
                        entry.length(),
                    )?;
                }
                Some(CodecId::Zlib) => {
                    writer.add_raw_file(
                        entry.name(),
                        CompressionMethod::Zlib,
                        &entry.read_raw()?,
                        entry.size(),
                    )?;
                }
                Some(_) => {
                    let data = entry.read(codecs)?;
                    let packed = codecs.compress(CodecId::Zlib, &data)?;
                    writer.add_raw_file(
                        entry.name(),
                        CompressionMethod::Zlib,
                        &packed,
                        data.len() as u64,
                    )?;
                }
            }
        }

        writer.finish()?.flush()?;
        Ok(())
    }
}
