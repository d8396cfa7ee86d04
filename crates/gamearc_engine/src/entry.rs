//! Entries and the table a format builds while walking its directory
//!

use std::{fmt, sync::Arc};

use tracing::instrument;

use crate::{
    codec::{CodecId, Codecs},
    error::{Capability, Error, Result},
    source::Source,
    validate::check_span,
};

/// One logical file inside a container
#[derive(Clone)]
pub struct Entry {
    name: String,
    source: Arc<Source>,
    offset: u64,
    length: u64,
    decompressed_length: Option<u64>,
    decompressor: Option<CodecId>,
    stored_name: bool,
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Entry")
            .field("name", &self.name)
            .field("source", &self.source.name())
            .field("offset", &self.offset)
            .field("length", &self.length)
            .field("decompressed_length", &self.decompressed_length)
            .field("decompressor", &self.decompressor)
            .finish()
    }
}

impl Entry {
    /// An entry with a name stored in the container
    pub fn new(name: impl Into<String>, source: Arc<Source>, offset: u64, length: u64) -> Entry {
        Entry {
            name: name.into(),
            source,
            offset,
            length,
            decompressed_length: None,
            decompressor: None,
            stored_name: true,
        }
    }

    /// An entry of a format without stored names, called `entry_{index:05}`
    pub fn unnamed(index: usize, source: Arc<Source>, offset: u64, length: u64) -> Entry {
        Entry {
            stored_name: false,
            ..Entry::new(format!("entry_{index:05}"), source, offset, length)
        }
    }

    /// Mark the payload as compressed with `codec`, expanding to `decompressed_length` bytes.
    pub fn with_codec(mut self, codec: CodecId, decompressed_length: u64) -> Entry {
        self.decompressor = Some(codec);
        self.decompressed_length = Some(decompressed_length);
        self
    }

    /// Get the name of the entry
    ///
    /// # Warnings
    ///
    /// It is dangerous to use this name directly when extracting an archive.
    /// It may contain an absolute path (`/etc/shadow`), or break out of the
    /// current directory (`../runtime`).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the name was read from the container rather than synthesized
    pub fn has_stored_name(&self) -> bool {
        self.stored_name
    }

    /// The container this entry lives in
    pub fn source(&self) -> &Arc<Source> {
        &self.source
    }

    /// Start of the stored payload
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Size of the stored, possibly compressed, payload
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Size after decompression, present only for compressed entries
    pub fn decompressed_length(&self) -> Option<u64> {
        self.decompressed_length
    }

    /// Codec needed to expand the payload
    pub fn decompressor(&self) -> Option<CodecId> {
        self.decompressor
    }

    /// Size of the entry once read, decompressed if needed
    pub fn size(&self) -> u64 {
        self.decompressed_length.unwrap_or(self.length)
    }

    /// Move the payload span after discovering per-entry headers.
    pub fn set_span(&mut self, offset: u64, length: u64) -> Result<()> {
        check_span(offset, length, self.source.size())?;
        self.offset = offset;
        self.length = length;
        Ok(())
    }

    /// Replace the name, for example while rebuilding nested directory paths.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Read the stored bytes without decompressing them.
    pub fn read_raw(&self) -> Result<Vec<u8>> {
        self.source.read_at(self.offset, self.length)
    }

    /// Read the entry's contents, expanding them with `codecs` when compressed.
    ///
    /// Fails with [`Error::MissingCapability`] when the required codec is not in `codecs`.
    #[instrument(skip_all, fields(name = %self.name), err)]
    pub fn read(&self, codecs: &Codecs) -> Result<Vec<u8>> {
        match self.decompressor {
            None => self.read_raw(),
            Some(codec) => {
                let expected = self.size();
                if !codecs.contains(codec) {
                    return Err(Error::MissingCapability(Capability::Decompress(codec)));
                }
                codecs.decompress(codec, &self.read_raw()?, expected)
            }
        }
    }
}

/// Entries collected while a format walks one container's directory.
///
/// A table belongs to a single extraction. It is handed to the caller only once the whole
/// directory parsed; a failure anywhere discards it.
#[derive(Debug)]
pub struct EntryTable {
    source: Arc<Source>,
    entries: Vec<Entry>,
}

impl EntryTable {
    /// Largest number of entries allocated up front, whatever the hint says
    pub const PREALLOCATION_CEILING: usize = 65_536;

    /// Create a table for `source`, reserving room for `capacity_hint` entries.
    pub fn new(source: Arc<Source>, capacity_hint: usize) -> EntryTable {
        EntryTable {
            source,
            entries: Vec::with_capacity(capacity_hint.min(Self::PREALLOCATION_CEILING)),
        }
    }

    /// The container being parsed
    pub fn source(&self) -> &Arc<Source> {
        &self.source
    }

    /// Append `entry`, rejecting payload spans outside of its source.
    pub fn push(&mut self, entry: Entry) -> Result<&mut Entry> {
        check_span(entry.offset, entry.length, entry.source.size())?;

        self.entries.push(entry);
        let last = self.entries.len() - 1;
        Ok(&mut self.entries[last])
    }

    /// Append an entry with a stored name over the table's source.
    pub fn add(&mut self, name: impl Into<String>, offset: u64, length: u64) -> Result<&mut Entry> {
        let entry = Entry::new(name, Arc::clone(&self.source), offset, length);
        self.push(entry)
    }

    /// Append an entry with a synthesized name over the table's source.
    pub fn add_unnamed(&mut self, offset: u64, length: u64) -> Result<&mut Entry> {
        let entry = Entry::unnamed(self.entries.len(), Arc::clone(&self.source), offset, length);
        self.push(entry)
    }

    /// Keep only the first `actual_count` entries.
    pub fn truncate(&mut self, actual_count: usize) {
        self.entries.truncate(actual_count);
        self.entries.shrink_to_fit();
    }

    /// Derive every entry's length from the gap to the next entry's offset.
    ///
    /// Offsets are ordered first, so entries may appear in any order in the directory; the
    /// table keeps its order. The entry with the highest offset extends to `archive_size`.
    /// Two entries sharing an offset, or an offset past `archive_size`, fail with
    /// [`Error::InconsistentDirectory`] and leave the table untouched.
    #[instrument(skip(self), fields(entries = self.entries.len()), err)]
    pub fn infer_missing_lengths(&mut self, archive_size: u64) -> Result<()> {
        let mut order: Vec<usize> = (0..self.entries.len()).collect();
        order.sort_by_key(|&index| self.entries[index].offset);

        let mut lengths = vec![0u64; self.entries.len()];
        for (position, &index) in order.iter().enumerate() {
            let offset = self.entries[index].offset;
            let end = match order.get(position + 1) {
                Some(&next) => self.entries[next].offset,
                None => archive_size,
            };

            if end < offset {
                return Err(Error::InconsistentDirectory(format!(
                    "entry {index} at offset {offset} lies past the end at {end}"
                )));
            }
            if end == offset && position + 1 < order.len() {
                return Err(Error::InconsistentDirectory(format!(
                    "entries {index} and {} share offset {offset}",
                    order[position + 1]
                )));
            }

            let length = end - offset;
            check_span(offset, length, self.entries[index].source.size())?;
            lengths[index] = length;
        }

        for (entry, length) in self.entries.iter_mut().zip(lengths) {
            entry.length = length;
        }
        Ok(())
    }

    /// Number of entries collected so far
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entry was collected
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over the collected entries
    pub fn iter(&self) -> std::slice::Iter<'_, Entry> {
        self.entries.iter()
    }

    /// Iterate mutably, for corrections made before the table is returned
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Entry> {
        self.entries.iter_mut()
    }

    /// Get an entry for correction
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Entry> {
        self.entries.get_mut(index)
    }

    /// The collected entries
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Take the collected entries out of the table
    pub fn into_entries(self) -> Vec<Entry> {
        self.entries
    }
}

impl IntoIterator for EntryTable {
    type Item = Entry;
    type IntoIter = std::vec::IntoIter<Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a EntryTable {
    type Item = &'a Entry;
    type IntoIter = std::slice::Iter<'a, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    use crate::codec::{CodecId, Codecs};
    use crate::entry::EntryTable;
    use crate::error::{Capability, Error, Result};
    use crate::source::Source;

    fn lengths(table: &EntryTable) -> Vec<u64> {
        table.iter().map(|e| e.length()).collect()
    }

    #[traced_test]
    #[test]
    fn infer_lengths_from_offsets() -> Result<()> {
        let source = Source::from_bytes("offsets.dat", vec![0u8; 300]);
        let mut table = EntryTable::new(source, 3);
        for offset in [0, 100, 200] {
            table.add_unnamed(offset, 0)?;
        }

        table.infer_missing_lengths(300)?;
        assert_eq!(lengths(&table), vec![100, 100, 100]);

        Ok(())
    }

    #[test]
    fn infer_lengths_keeps_directory_order() -> Result<()> {
        let source = Source::from_bytes("offsets.dat", vec![0u8; 64]);
        let mut table = EntryTable::new(source, 3);
        for offset in [40, 8, 20] {
            table.add_unnamed(offset, 0)?;
        }

        table.infer_missing_lengths(60)?;
        assert_eq!(lengths(&table), vec![20, 12, 20]);
        assert_eq!(table.entries()[0].name(), "entry_00000");
        assert_eq!(table.entries()[0].offset(), 40);

        Ok(())
    }

    #[test]
    fn infer_lengths_rejects_shared_offsets() -> Result<()> {
        let source = Source::from_bytes("offsets.dat", vec![0u8; 300]);
        let mut table = EntryTable::new(source, 3);
        for offset in [0, 100, 100] {
            table.add_unnamed(offset, 0)?;
        }

        assert!(matches!(
            table.infer_missing_lengths(300),
            Err(Error::InconsistentDirectory(_))
        ));
        assert_eq!(lengths(&table), vec![0, 0, 0]);

        Ok(())
    }

    #[test]
    fn infer_lengths_rejects_offsets_past_the_end() -> Result<()> {
        let source = Source::from_bytes("offsets.dat", vec![0u8; 300]);
        let mut table = EntryTable::new(source, 2);
        table.add_unnamed(0, 0)?;
        table.add_unnamed(250, 0)?;

        assert!(matches!(
            table.infer_missing_lengths(200),
            Err(Error::InconsistentDirectory(_))
        ));
        assert!(table.infer_missing_lengths(301).is_err());

        Ok(())
    }

    #[test]
    fn push_enforces_bounds() -> Result<()> {
        let source = Source::from_bytes("small.bin", vec![0u8; 16]);
        let mut table = EntryTable::new(source, usize::MAX);

        table.add("a", 0, 16)?;
        assert!(matches!(
            table.add("b", 8, 9),
            Err(Error::InvalidLength { value: 9, limit: Some(8) })
        ));
        assert!(table.add("c", 17, 0).is_err());
        assert_eq!(table.len(), 1);

        let entry = table.get_mut(0).unwrap();
        assert!(entry.set_span(4, 13).is_err());
        entry.set_span(4, 12)?;
        assert_eq!((entry.offset(), entry.length()), (4, 12));

        table.truncate(0);
        assert!(table.is_empty());

        Ok(())
    }

    #[test]
    fn read_requires_registered_codec() -> Result<()> {
        #[rustfmt::skip]
        let source = Source::from_bytes("packed.bin", vec![
            0x78u8, 0x9C, 0xF3, 0x48, 0xCD, 0xC9, 0xC9, 0x57, 0x08, 0xCF,
            0x2F, 0xCA, 0x49, 0x01, 0x00, 0x18, 0x0B, 0x04, 0x1D,
        ]);
        let mut table = EntryTable::new(source, 1);
        let entry = table.add("hello.txt", 0, 19)?;
        *entry = entry.clone().with_codec(CodecId::Zlib, 11);

        let entry = &table.entries()[0];
        assert_eq!(entry.size(), 11);
        assert_eq!(entry.read_raw()?.len(), 19);
        assert_eq!(entry.read(&Codecs::with_defaults())?, b"Hello World");
        assert!(matches!(
            entry.read(&Codecs::empty()),
            Err(Error::MissingCapability(Capability::Decompress(CodecId::Zlib)))
        ));

        Ok(())
    }
}
