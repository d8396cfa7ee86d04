//! The contract every container format implements

use std::{io::Write, sync::Arc};

use tracing::trace;

use crate::{
    codec::Codecs,
    cursor::ByteCursor,
    descriptor::FormatDescriptor,
    entry::{Entry, EntryTable},
    error::{Capability, Error, Result},
    score::ConfidenceScore,
    sniff,
    source::Source,
    validate::Limits,
};

/// A reader, and optionally a writer, for one container format.
///
/// Plugins hold no per-call state: every method takes `&self` and keeps its running
/// counters in locals, so a single instance can serve any number of extractions.
///
/// An extraction walks a fixed sequence of steps: read the header, loop over the
/// directory, then optionally resolve names and infer lengths. Any failure along the way
/// aborts the whole walk and no partial table is handed out.
pub trait FormatPlugin: Send + Sync {
    /// Static identity of the format
    fn descriptor(&self) -> &'static FormatDescriptor;

    /// Run the format's checks against a stream positioned at its start.
    ///
    /// Implementations add [`ConfidenceScore::MAGIC`] for a signature,
    /// [`ConfidenceScore::EXTENSION`] for a known extension and [`ConfidenceScore::FIELD`]
    /// per plausible secondary field. Errors are allowed and count as no match.
    fn probe(&self, cursor: &mut ByteCursor) -> Result<ConfidenceScore>;

    /// How well the stream matches this format.
    ///
    /// The cursor is rewound before probing and its position restored afterwards. Probe
    /// errors are logged and scored as zero, they never reach the caller.
    fn score(&self, cursor: &mut ByteCursor) -> ConfidenceScore {
        let saved = cursor.tell();

        let score = match cursor.seek(0).and_then(|_| self.probe(cursor)) {
            Ok(score) => score,
            Err(error) => {
                trace!(format = self.descriptor().tag, %error, "probe failed");
                ConfidenceScore::ZERO
            }
        };

        if let Err(error) = cursor.seek(saved) {
            trace!(format = self.descriptor().tag, %error, "unable to restore cursor");
        }
        score
    }

    /// Parse the directory of `source` into a table of entries.
    fn extract(&self, source: &Arc<Source>, limits: &Limits) -> Result<EntryTable>;

    /// Serialize `entries` as a new container into `destination`.
    ///
    /// Every payload is read through the entry's own source. Formats that cannot be
    /// written keep the default, which fails with [`Error::MissingCapability`].
    fn pack(&self, entries: &[Entry], codecs: &Codecs, destination: &mut dyn Write) -> Result<()> {
        let _ = (entries, codecs, destination);
        Err(Error::MissingCapability(Capability::Pack(
            self.descriptor().tag,
        )))
    }

    /// Suggest an extension for an entry without a stored name from its first bytes.
    fn guess_extension(&self, entry: &Entry, header_probe: &[u8]) -> Option<&'static str> {
        let _ = entry;
        sniff::guess_extension(header_probe)
    }
}
