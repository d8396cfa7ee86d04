#![allow(dead_code)]

use std::sync::Arc;

use byteorder::{LittleEndian, WriteBytesExt};
use gamearc_engine::{
    error::{Error, Result},
    validate::{check_file_count, check_filename},
    ByteCursor, Capabilities, CodecId, ConfidenceScore, EntryTable, FormatDescriptor,
    FormatPlugin, Limits, Source,
};

pub const NAME_LENGTH: usize = 16;
pub const RECORD_LENGTH: u64 = NAME_LENGTH as u64 + 12;

/// `DEMO`, count, then per entry a 16 byte name, offset, stored length and an expanded
/// length that is zero for stored payloads.
pub struct Demo;

pub static DEMO: FormatDescriptor = FormatDescriptor {
    tag: "demo",
    label: "Demo container",
    extensions: &["demo"],
    platforms: &[],
    capabilities: Capabilities::READ_ONLY,
};

impl FormatPlugin for Demo {
    fn descriptor(&self) -> &'static FormatDescriptor {
        &DEMO
    }

    fn probe(&self, cursor: &mut ByteCursor) -> Result<ConfidenceScore> {
        let mut score = ConfidenceScore::default();
        score.add_if(
            DEMO.matches_extension(cursor.name().unwrap_or_default()),
            ConfidenceScore::EXTENSION,
        );

        if !score.add_if(&cursor.read_array::<4>()? == b"DEMO", ConfidenceScore::MAGIC) {
            return Ok(score);
        }
        let count = cursor.read_u32::<LittleEndian>()? as u64;
        score.add_if(
            count * RECORD_LENGTH <= cursor.remaining(),
            ConfidenceScore::FIELD,
        );
        Ok(score)
    }

    fn extract(&self, source: &Arc<Source>, limits: &Limits) -> Result<EntryTable> {
        let mut cursor = source.lock();
        cursor.seek(0)?;

        if &cursor.read_array::<4>()? != b"DEMO" {
            return Err(Error::BadMagic {
                format: "demo",
                offset: 0,
            });
        }
        let count = check_file_count(cursor.read_u32::<LittleEndian>()?, limits)?;

        let mut table = EntryTable::new(Arc::clone(source), count);
        for _ in 0..count {
            let name = cursor.read_fixed_string(NAME_LENGTH as u64)?;
            check_filename(&name, limits)?;
            let offset = cursor.read_u32::<LittleEndian>()? as u64;
            let length = cursor.read_u32::<LittleEndian>()? as u64;
            let expanded = cursor.read_u32::<LittleEndian>()? as u64;

            let entry = table.add(name, offset, length)?;
            if expanded != 0 {
                *entry = entry.clone().with_codec(CodecId::Zlib, expanded);
            }
        }
        Ok(table)
    }
}

/// Headerless: count followed by offsets. Names are synthesized and lengths inferred.
pub struct Blob;

pub static BLOB: FormatDescriptor = FormatDescriptor {
    tag: "blob",
    label: "Headerless offset table",
    extensions: &["blob"],
    platforms: &[],
    capabilities: Capabilities::READ_ONLY,
};

impl FormatPlugin for Blob {
    fn descriptor(&self) -> &'static FormatDescriptor {
        &BLOB
    }

    fn probe(&self, cursor: &mut ByteCursor) -> Result<ConfidenceScore> {
        let mut score = ConfidenceScore::default();
        score.add_if(
            BLOB.matches_extension(cursor.name().unwrap_or_default()),
            ConfidenceScore::EXTENSION,
        );
        let count = cursor.read_u32::<LittleEndian>()? as u64;
        score.add_if(
            count > 0 && count * 4 <= cursor.remaining(),
            ConfidenceScore::FIELD,
        );
        Ok(score)
    }

    fn extract(&self, source: &Arc<Source>, limits: &Limits) -> Result<EntryTable> {
        let mut cursor = source.lock();
        cursor.seek(0)?;

        let count = check_file_count(cursor.read_u32::<LittleEndian>()?, limits)?;
        let mut table = EntryTable::new(Arc::clone(source), count);
        for _ in 0..count {
            let offset = cursor.read_u32::<LittleEndian>()? as u64;
            table.add_unnamed(offset, 0)?;
        }
        table.infer_missing_lengths(source.size())?;
        Ok(table)
    }
}

/// Scores everything it sees with a signature match, then refuses to parse it.
pub struct Greedy;

pub static GREEDY: FormatDescriptor = FormatDescriptor {
    tag: "greedy",
    label: "Matches everything, parses nothing",
    extensions: &[],
    platforms: &[],
    capabilities: Capabilities::READ_WRITE,
};

impl FormatPlugin for Greedy {
    fn descriptor(&self) -> &'static FormatDescriptor {
        &GREEDY
    }

    fn probe(&self, _cursor: &mut ByteCursor) -> Result<ConfidenceScore> {
        Ok(ConfidenceScore::new(ConfidenceScore::MAX))
    }

    fn extract(&self, _source: &Arc<Source>, _limits: &Limits) -> Result<EntryTable> {
        Err(Error::InconsistentDirectory("greedy never parses".into()))
    }
}

/// Build a demo container holding `files` as stored payloads.
pub fn demo_archive(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"DEMO");
    out.write_u32::<LittleEndian>(files.len() as u32).unwrap();

    let mut offset = 8 + files.len() as u64 * RECORD_LENGTH;
    for (name, data) in files {
        let mut padded = [0u8; NAME_LENGTH];
        padded[..name.len()].copy_from_slice(name.as_bytes());
        out.extend_from_slice(&padded);
        out.write_u32::<LittleEndian>(offset as u32).unwrap();
        out.write_u32::<LittleEndian>(data.len() as u32).unwrap();
        out.write_u32::<LittleEndian>(0).unwrap();
        offset += data.len() as u64;
    }
    for (_, data) in files {
        out.extend_from_slice(data);
    }
    out
}
