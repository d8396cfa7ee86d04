//! A parsed container, frozen once its directory has been fully read

use std::sync::Arc;

use indexmap::IndexMap;

use crate::{
    codec::Codecs,
    descriptor::FormatDescriptor,
    entry::Entry,
    error::{Error, FileNotFoundError, Result},
    source::Source,
};

/// The entries of one container, in directory order
///
/// ```
/// use gamearc_engine::{Archive, Codecs, Registry, Source};
///
/// fn dump(registry: &Registry, source: std::sync::Arc<Source>) -> gamearc_engine::error::Result<()> {
///     let archive = registry.open(&source)?;
///
///     for entry in archive.iter() {
///         let bytes = entry.read(&Codecs::with_defaults())?;
///         println!("{}: {} bytes", entry.name(), bytes.len());
///     }
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Archive {
    descriptor: &'static FormatDescriptor,
    source: Arc<Source>,
    entries: Box<[Entry]>,
    names: IndexMap<Box<str>, usize>,
}

impl Archive {
    /// Freeze `entries` parsed from `source`.
    ///
    /// When several entries share a name, lookups by name find the first of them.
    pub fn new(
        descriptor: &'static FormatDescriptor,
        source: Arc<Source>,
        entries: Vec<Entry>,
    ) -> Archive {
        let mut names = IndexMap::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            names.entry(entry.name().into()).or_insert(index);
        }

        Archive {
            descriptor,
            source,
            entries: entries.into_boxed_slice(),
            names,
        }
    }

    /// Identity of the format the archive was parsed as
    pub fn descriptor(&self) -> &'static FormatDescriptor {
        self.descriptor
    }

    /// Tag of the format the archive was parsed as
    pub fn format(&self) -> &'static str {
        self.descriptor.tag
    }

    /// The container the entries point into
    pub fn source(&self) -> &Arc<Source> {
        &self.source
    }

    /// Number of entries contained in this archive.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether this archive contains no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in directory order
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Iterate over the entries in directory order
    pub fn iter(&self) -> std::slice::Iter<'_, Entry> {
        self.entries.iter()
    }

    /// Returns an iterator over all the entry names in this archive.
    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(Entry::name)
    }

    /// Get the index of an entry by name, if it's present.
    #[inline(always)]
    pub fn index_for_name(&self, name: &str) -> Option<usize> {
        self.names.get(name).copied()
    }

    /// Get the name of an entry, if it's present.
    #[inline(always)]
    pub fn name_for_index(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(Entry::name)
    }

    /// Get a contained entry by index
    pub fn by_index(&self, index: usize) -> Result<&Entry> {
        self.entries
            .get(index)
            .ok_or(Error::FileNotFound(FileNotFoundError::Index(index)))
    }

    /// Search for an entry by name
    pub fn by_name(&self, name: &str) -> Result<&Entry> {
        let Some(index) = self.index_for_name(name) else {
            return Err(Error::FileNotFound(FileNotFoundError::Name(
                name.to_owned(),
            )));
        };
        self.by_index(index)
    }

    /// Read the contents of the entry at `index`.
    pub fn read(&self, index: usize, codecs: &Codecs) -> Result<Vec<u8>> {
        self.by_index(index)?.read(codecs)
    }

    /// Total size of the entries once read, if it can be known.
    pub fn decompressed_size(&self) -> Option<u128> {
        let mut total = 0u128;
        for entry in self.entries.iter() {
            total = total.checked_add(entry.size() as u128)?;
        }
        Some(total)
    }
}

impl<'a> IntoIterator for &'a Archive {
    type Item = &'a Entry;
    type IntoIter = std::slice::Iter<'a, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
