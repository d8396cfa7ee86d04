//! Block compression and decompression handling.

use std::io::{self, Read, Seek, Write};

use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};
use gamearc_engine::{
    error::{Error, Result},
    CodecId,
};
use tracing::{instrument, warn};

/// Identifies the storage format used to compress a block inside the TRE file
///
/// When creating TRE files, the method for the records and names is chosen via
/// [`crate::tre::TreOptions`].
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum CompressionMethod {
    /// Stores the data as it is
    None = 0,

    /// Compress the data using Zlib
    #[default]
    Zlib = 2,
}

impl TryFrom<u32> for CompressionMethod {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            0 => Ok(CompressionMethod::None),
            2 => Ok(CompressionMethod::Zlib),
            tag => {
                warn!(tag, "unknown tre compression method");
                Err(Error::UnsupportedEntryType { format: "tre", tag })
            }
        }
    }
}

impl From<CompressionMethod> for u32 {
    fn from(value: CompressionMethod) -> Self {
        value as u32
    }
}

impl CompressionMethod {
    /// Codec an entry stored with this method needs
    pub fn codec(self) -> Option<CodecId> {
        match self {
            CompressionMethod::None => None,
            CompressionMethod::Zlib => Some(CodecId::Zlib),
        }
    }
}

pub(crate) enum TreBlockReader<'a, R: Read + Seek> {
    Raw(io::Take<&'a mut R>),
    Compressed(Box<ZlibDecoder<io::Take<&'a mut R>>>),
}

impl<'a, R: Read + Seek> TreBlockReader<'a, R> {
    #[instrument(skip(reader))]
    pub fn new(
        reader: &'a mut R,
        start: u64,
        limit: u64,
        compression: CompressionMethod,
    ) -> Result<Self> {
        reader.seek(io::SeekFrom::Start(start))?;

        let limit_reader = reader.by_ref().take(limit);
        Ok(match compression {
            CompressionMethod::None => TreBlockReader::Raw(limit_reader),
            CompressionMethod::Zlib => {
                TreBlockReader::Compressed(Box::new(ZlibDecoder::new(limit_reader)))
            }
        })
    }

    /// Read the whole block, which must expand to exactly `expected` bytes.
    #[instrument(skip(self), err)]
    pub fn read_exactly(mut self, expected: u64) -> Result<Vec<u8>> {
        let mut block = Vec::new();
        self.by_ref()
            .take(expected.saturating_add(1))
            .read_to_end(&mut block)?;

        if block.len() as u64 != expected {
            return Err(Error::InconsistentDirectory(format!(
                "tre block holds {} bytes, {expected} expected",
                block.len()
            )));
        }
        Ok(block)
    }
}

impl<R: Read + Seek> Read for TreBlockReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            TreBlockReader::Raw(r) => r.read(buf),
            TreBlockReader::Compressed(r) => r.read(buf),
        }
    }
}

pub(crate) enum TreBlockWriter {
    Raw(Vec<u8>),
    Compressed(Box<ZlibEncoder<Vec<u8>>>),
}

impl TreBlockWriter {
    pub fn new(compression: CompressionMethod) -> Self {
        match compression {
            CompressionMethod::None => TreBlockWriter::Raw(Vec::new()),
            CompressionMethod::Zlib => TreBlockWriter::Compressed(Box::new(ZlibEncoder::new(
                Vec::new(),
                Compression::default(),
            ))),
        }
    }

    #[instrument(skip(self), err)]
    pub fn finalize(self) -> io::Result<Vec<u8>> {
        match self {
            TreBlockWriter::Raw(r) => Ok(r),
            TreBlockWriter::Compressed(r) => r.finish(),
        }
    }

    pub fn total_in(&self) -> u64 {
        match self {
            TreBlockWriter::Raw(r) => r.len() as u64,
            TreBlockWriter::Compressed(r) => r.total_in(),
        }
    }
}

impl Write for TreBlockWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            TreBlockWriter::Raw(r) => r.write(buf),
            TreBlockWriter::Compressed(r) => r.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            TreBlockWriter::Raw(r) => r.flush(),
            TreBlockWriter::Compressed(r) => r.flush(),
        }
    }
}

#[cfg(test)]
mod test {
    use std::io::{Cursor, Write};

    use pretty_assertions::assert_eq;

    use crate::tre::compression::{CompressionMethod, TreBlockReader, TreBlockWriter};
    use gamearc_engine::error::{Error, Result};

    #[test]
    fn compression_tags() {
        assert_eq!(CompressionMethod::try_from(0).unwrap(), CompressionMethod::None);
        assert_eq!(CompressionMethod::try_from(2).unwrap(), CompressionMethod::Zlib);
        assert!(matches!(
            CompressionMethod::try_from(1),
            Err(Error::UnsupportedEntryType { format: "tre", tag: 1 })
        ));
        assert_eq!(u32::from(CompressionMethod::Zlib), 2);
    }

    #[test]
    fn compressed_block_round_trip() -> Result<()> {
        let mut writer = TreBlockWriter::new(CompressionMethod::Zlib);
        writer.write_all(b"name.txt\0other.txt\0")?;
        assert_eq!(writer.total_in(), 19);
        let block = writer.finalize()?;

        let mut input = Cursor::new([vec![0xEE; 4], block.clone()].concat());
        let reader =
            TreBlockReader::new(&mut input, 4, block.len() as u64, CompressionMethod::Zlib)?;
        assert_eq!(reader.read_exactly(19)?, b"name.txt\0other.txt\0");

        let reader =
            TreBlockReader::new(&mut input, 4, block.len() as u64, CompressionMethod::Zlib)?;
        assert!(matches!(
            reader.read_exactly(20),
            Err(Error::InconsistentDirectory(_))
        ));

        Ok(())
    }
}
