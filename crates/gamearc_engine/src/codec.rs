//! Pluggable compression capabilities.
//!
//! Entries only record *which* codec their payload needs. The routines themselves are
//! looked up by [`CodecId`] in a [`Codecs`] set supplied by the caller, so an archive can be
//! listed even when none of its codecs are available.

use std::{
    collections::HashMap,
    fmt,
    io::{Read, Write},
    sync::Arc,
};

use flate2::{
    read::{DeflateDecoder, ZlibDecoder},
    write::{DeflateEncoder, ZlibEncoder},
    Compression,
};
use tracing::instrument;

use crate::error::{Capability, Error, Result};

/// Names the algorithm needed to expand an entry's payload
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[non_exhaustive]
pub enum CodecId {
    /// Deflate with a zlib header and adler32 trailer
    Zlib,
    /// Raw deflate stream
    Deflate,
    /// LZMA variants
    Lzma,
    /// LZO1x
    Lzo,
    /// Byte-oriented LZSS variants
    Lzss,
    /// Run-length encodings
    Rle,
}

impl CodecId {
    /// Short lowercase name
    pub fn name(self) -> &'static str {
        match self {
            CodecId::Zlib => "zlib",
            CodecId::Deflate => "deflate",
            CodecId::Lzma => "lzma",
            CodecId::Lzo => "lzo",
            CodecId::Lzss => "lzss",
            CodecId::Rle => "rle",
        }
    }
}

impl fmt::Display for CodecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A compression routine registered under a [`CodecId`]
pub trait Codec: Send + Sync {
    /// The algorithm this codec implements
    fn id(&self) -> CodecId;

    /// Expand `input`, which is expected to produce `expected_len` bytes.
    ///
    /// Implementations should stop reading output shortly past `expected_len` so a corrupt
    /// stream cannot expand without bound.
    fn decompress(&self, input: &[u8], expected_len: u64) -> Result<Vec<u8>>;

    /// Compress `input`. Codecs that can only expand keep the default.
    fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        let _ = input;
        Err(Error::MissingCapability(Capability::Compress(self.id())))
    }
}

fn read_bounded(mut reader: impl Read, expected_len: u64) -> Result<Vec<u8>> {
    let capacity = usize::try_from(expected_len).map_err(|_| Error::InvalidLength {
        value: expected_len as i128,
        limit: None,
    })?;

    let mut output = Vec::with_capacity(capacity.min(64 * 1024 * 1024));
    reader
        .by_ref()
        .take(expected_len.saturating_add(1))
        .read_to_end(&mut output)?;
    Ok(output)
}

/// zlib wrapped deflate backed by `flate2`
#[derive(Debug, Clone, Copy)]
pub struct ZlibCodec {
    level: Compression,
}

impl ZlibCodec {
    /// Create the codec, compressing at `level`
    pub fn new(level: Compression) -> ZlibCodec {
        ZlibCodec { level }
    }
}

impl Default for ZlibCodec {
    fn default() -> Self {
        ZlibCodec::new(Compression::default())
    }
}

impl Codec for ZlibCodec {
    fn id(&self) -> CodecId {
        CodecId::Zlib
    }

    #[instrument(skip(self, input), fields(size = input.len()), err)]
    fn decompress(&self, input: &[u8], expected_len: u64) -> Result<Vec<u8>> {
        read_bounded(ZlibDecoder::new(input), expected_len)
    }

    #[instrument(skip(self, input), fields(size = input.len()), err)]
    fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(Vec::new(), self.level);
        encoder.write_all(input)?;
        Ok(encoder.finish()?)
    }
}

/// Raw deflate backed by `flate2`
#[derive(Debug, Clone, Copy)]
pub struct DeflateCodec {
    level: Compression,
}

impl DeflateCodec {
    /// Create the codec, compressing at `level`
    pub fn new(level: Compression) -> DeflateCodec {
        DeflateCodec { level }
    }
}

impl Default for DeflateCodec {
    fn default() -> Self {
        DeflateCodec::new(Compression::default())
    }
}

impl Codec for DeflateCodec {
    fn id(&self) -> CodecId {
        CodecId::Deflate
    }

    #[instrument(skip(self, input), fields(size = input.len()), err)]
    fn decompress(&self, input: &[u8], expected_len: u64) -> Result<Vec<u8>> {
        read_bounded(DeflateDecoder::new(input), expected_len)
    }

    #[instrument(skip(self, input), fields(size = input.len()), err)]
    fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = DeflateEncoder::new(Vec::new(), self.level);
        encoder.write_all(input)?;
        Ok(encoder.finish()?)
    }
}

/// The set of codecs available to a caller
///
/// ```
/// use gamearc_engine::codec::{CodecId, Codecs};
///
/// let codecs = Codecs::with_defaults();
/// assert!(codecs.contains(CodecId::Zlib));
/// assert!(!codecs.contains(CodecId::Lzo));
/// assert!(!Codecs::empty().contains(CodecId::Zlib));
/// ```
#[derive(Clone, Default)]
pub struct Codecs {
    codecs: HashMap<CodecId, Arc<dyn Codec>>,
}

impl fmt::Debug for Codecs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self.codecs.keys().collect();
        ids.sort();
        f.debug_tuple("Codecs").field(&ids).finish()
    }
}

impl Codecs {
    /// A set without any codec
    pub fn empty() -> Codecs {
        Codecs::default()
    }

    /// A set with the bundled zlib and raw deflate codecs
    pub fn with_defaults() -> Codecs {
        let mut codecs = Codecs::empty();
        codecs
            .register(ZlibCodec::default())
            .register(DeflateCodec::default());
        codecs
    }

    /// Register `codec`, replacing any codec with the same id
    pub fn register(&mut self, codec: impl Codec + 'static) -> &mut Codecs {
        self.codecs.insert(codec.id(), Arc::new(codec));
        self
    }

    /// Whether a codec is registered for `id`
    pub fn contains(&self, id: CodecId) -> bool {
        self.codecs.contains_key(&id)
    }

    /// Look up the codec registered for `id`
    pub fn get(&self, id: CodecId) -> Option<&Arc<dyn Codec>> {
        self.codecs.get(&id)
    }

    /// Expand `input` with the codec for `id`, checking the produced length.
    pub fn decompress(&self, id: CodecId, input: &[u8], expected_len: u64) -> Result<Vec<u8>> {
        let codec = self
            .get(id)
            .ok_or(Error::MissingCapability(Capability::Decompress(id)))?;

        let output = codec.decompress(input, expected_len)?;
        if output.len() as u64 != expected_len {
            return Err(Error::SizeMismatch {
                expected: expected_len,
                actual: output.len() as u64,
            });
        }
        Ok(output)
    }

    /// Compress `input` with the codec for `id`.
    pub fn compress(&self, id: CodecId, input: &[u8]) -> Result<Vec<u8>> {
        self.get(id)
            .ok_or(Error::MissingCapability(Capability::Compress(id)))?
            .compress(input)
    }
}
