//! Picking a format for an unlabeled file and running it

use std::{fmt, io::Write, sync::Arc};

use bon::Builder;
use tracing::{debug, instrument, warn};

use crate::{
    archive::Archive,
    codec::Codecs,
    descriptor::FormatDescriptor,
    entry::{Entry, EntryTable},
    error::{Capability, Error, Result},
    plugin::FormatPlugin,
    score::ConfidenceScore,
    source::Source,
    validate::Limits,
};

/// Default lowest score a format needs to be picked by [`Registry::identify`]
pub const DEFAULT_MIN_CONFIDENCE: u8 = 30;

/// Number of leading payload bytes handed to [`FormatPlugin::guess_extension`]
pub const HEADER_PROBE_LENGTH: u64 = 16;

/// Tunables for identification and extraction
///
/// ```
/// use gamearc_engine::registry::DispatchOptions;
///
/// let options = DispatchOptions::builder().min_confidence(50).build();
/// assert_eq!(options.limits.max_file_count, 4_000_000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Builder)]
pub struct DispatchOptions {
    /// Scores below this value never identify a format
    #[builder(default = DEFAULT_MIN_CONFIDENCE)]
    pub min_confidence: u8,

    /// Ceilings handed to every extraction
    #[builder(default)]
    pub limits: Limits,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        DispatchOptions::builder().build()
    }
}

/// A format together with the score it gave a file
#[derive(Clone)]
pub struct Candidate {
    /// The scoring format
    pub plugin: Arc<dyn FormatPlugin>,
    /// How well the file matched it
    pub score: ConfidenceScore,
}

impl Candidate {
    /// Tag of the scoring format
    pub fn tag(&self) -> &'static str {
        self.plugin.descriptor().tag
    }
}

impl fmt::Debug for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Candidate({}, {})", self.tag(), self.score)
    }
}

/// An ordered set of formats
///
/// Registration order matters: when two formats give a file the same score, the one
/// registered first wins.
#[derive(Clone, Default)]
pub struct Registry {
    plugins: Vec<Arc<dyn FormatPlugin>>,
    options: DispatchOptions,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field(
                "plugins",
                &self.descriptors().map(|d| d.tag).collect::<Vec<_>>(),
            )
            .field("options", &self.options)
            .finish()
    }
}

impl Registry {
    /// An empty registry with default options
    pub fn new() -> Registry {
        Registry::default()
    }

    /// An empty registry with custom options
    pub fn with_options(options: DispatchOptions) -> Registry {
        Registry {
            plugins: Vec::new(),
            options,
        }
    }

    /// Add `plugin` after the formats already registered.
    ///
    /// A plugin with an already registered tag takes over that tag's position.
    pub fn register(&mut self, plugin: impl FormatPlugin + 'static) -> &mut Registry {
        self.register_arc(Arc::new(plugin))
    }

    /// Add an already shared plugin, see [`Registry::register`].
    pub fn register_arc(&mut self, plugin: Arc<dyn FormatPlugin>) -> &mut Registry {
        let tag = plugin.descriptor().tag;
        match self
            .plugins
            .iter_mut()
            .find(|existing| existing.descriptor().tag == tag)
        {
            Some(existing) => {
                warn!(tag, "replacing registered format");
                *existing = plugin;
            }
            None => self.plugins.push(plugin),
        }
        self
    }

    /// Consuming form of [`Registry::register`]
    pub fn with(mut self, plugin: impl FormatPlugin + 'static) -> Registry {
        self.register(plugin);
        self
    }

    /// Options used by identification and extraction
    pub fn options(&self) -> &DispatchOptions {
        &self.options
    }

    /// Registered formats in registration order
    pub fn plugins(&self) -> &[Arc<dyn FormatPlugin>] {
        &self.plugins
    }

    /// Descriptors of the registered formats in registration order
    pub fn descriptors(&self) -> impl Iterator<Item = &'static FormatDescriptor> + '_ {
        self.plugins.iter().map(|plugin| plugin.descriptor())
    }

    /// Find a format by tag, ignoring case
    pub fn by_tag(&self, tag: &str) -> Option<&Arc<dyn FormatPlugin>> {
        self.plugins
            .iter()
            .find(|plugin| plugin.descriptor().tag.eq_ignore_ascii_case(tag))
    }

    /// Formats listing `extension`, with or without its leading dot
    pub fn by_extension<'a>(
        &'a self,
        extension: &'a str,
    ) -> impl Iterator<Item = &'a Arc<dyn FormatPlugin>> + 'a {
        let extension = extension.trim_start_matches('.');
        self.plugins.iter().filter(move |plugin| {
            plugin
                .descriptor()
                .extensions
                .iter()
                .any(|candidate| candidate.eq_ignore_ascii_case(extension))
        })
    }

    /// Score `source` against every format, best match first.
    ///
    /// The sort is stable, so equal scores keep registration order.
    #[instrument(skip_all, fields(source = source.name()))]
    pub fn rank(&self, source: &Source) -> Vec<Candidate> {
        let mut cursor = source.lock();

        let mut candidates: Vec<Candidate> = self
            .plugins
            .iter()
            .map(|plugin| Candidate {
                plugin: Arc::clone(plugin),
                score: plugin.score(&mut cursor),
            })
            .collect();
        candidates.sort_by(|a, b| b.score.cmp(&a.score));

        debug!(?candidates, "ranked formats");
        candidates
    }

    /// The best matching format, if it scores at least the configured floor.
    pub fn identify(&self, source: &Source) -> Option<Arc<dyn FormatPlugin>> {
        self.rank(source)
            .into_iter()
            .next()
            .filter(|candidate| candidate.score.value() >= self.options.min_confidence)
            .map(|candidate| candidate.plugin)
    }

    /// Parse `source` as the format registered under `tag`.
    pub fn extract(&self, source: &Arc<Source>, tag: &str) -> Result<Archive> {
        let plugin = self
            .by_tag(tag)
            .ok_or_else(|| Error::UnknownFormat(tag.to_owned()))?;
        self.extract_with(plugin.as_ref(), source)
    }

    /// Parse `source` with `plugin`, then resolve names of entries stored without one.
    #[instrument(skip_all, fields(format = plugin.descriptor().tag, source = source.name()), err)]
    pub fn extract_with(&self, plugin: &dyn FormatPlugin, source: &Arc<Source>) -> Result<Archive> {
        let mut table = plugin.extract(source, &self.options.limits)?;
        resolve_names(plugin, &mut table)?;

        debug!(entries = table.len(), "extracted");
        Ok(Archive::new(
            plugin.descriptor(),
            Arc::clone(source),
            table.into_entries(),
        ))
    }

    /// Identify `source` and parse it.
    ///
    /// When the best format fails to parse the file, the next candidates above the floor
    /// are tried in rank order. If they all fail the error of the best one is returned.
    #[instrument(skip_all, fields(source = source.name()))]
    pub fn open(&self, source: &Arc<Source>) -> Result<Archive> {
        let mut first_error = None;

        for candidate in self
            .rank(source)
            .into_iter()
            .take_while(|candidate| candidate.score.value() >= self.options.min_confidence)
        {
            match self.extract_with(candidate.plugin.as_ref(), source) {
                Ok(archive) => return Ok(archive),
                Err(error) => {
                    debug!(format = candidate.tag(), %error, "falling through");
                    first_error.get_or_insert(error);
                }
            }
        }

        Err(first_error.unwrap_or(Error::UnrecognizedFormat))
    }

    /// Write `entries` as a new container of the format registered under `tag`.
    #[instrument(skip(self, entries, codecs, destination), fields(entries = entries.len()), err)]
    pub fn pack(
        &self,
        tag: &str,
        entries: &[Entry],
        codecs: &Codecs,
        destination: &mut dyn Write,
    ) -> Result<()> {
        let plugin = self
            .by_tag(tag)
            .ok_or_else(|| Error::UnknownFormat(tag.to_owned()))?;

        let descriptor = plugin.descriptor();
        if !descriptor.capabilities.write {
            return Err(Error::MissingCapability(Capability::Pack(descriptor.tag)));
        }
        plugin.pack(entries, codecs, destination)
    }
}

/// Append a guessed extension to entries whose names were synthesized.
///
/// Compressed payloads are left alone since their leading bytes say nothing about the
/// contents.
fn resolve_names(plugin: &dyn FormatPlugin, table: &mut EntryTable) -> Result<()> {
    for entry in table.iter_mut() {
        if entry.has_stored_name() || entry.decompressor().is_some() {
            continue;
        }

        let probe = entry
            .source()
            .read_at(entry.offset(), entry.length().min(HEADER_PROBE_LENGTH))?;
        if let Some(extension) = plugin.guess_extension(entry, &probe) {
            let name = format!("{}.{extension}", entry.name());
            entry.set_name(name);
        }
    }
    Ok(())
}
