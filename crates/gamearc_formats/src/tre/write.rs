//! Streaming writer for TRE archives

use binrw::{io::NoSeek, BinWrite};
use bon::Builder;
use byteorder::WriteBytesExt;
use gamearc_engine::error::Result;
use md5::{Digest, Md5};
use std::io::{self, Write};
use tracing::{instrument, Level};

use crate::{binrw_error, to_u32};
use crate::tre::compression::{CompressionMethod, TreBlockWriter};
use crate::tre::types::{TreHeader, TreRecord, HEADER_SIZE};

const CRC: crc::Crc<u32> = crc::Crc::<u32>::new(&crc::CRC_32_BZIP2);

/// How the record and name blocks of a new archive are stored
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Builder)]
pub struct TreOptions {
    /// Storage of the record block, zlib unless asked otherwise
    #[builder(default)]
    pub record_compression: CompressionMethod,

    /// Storage of the name block, zlib unless asked otherwise
    #[builder(default)]
    pub name_compression: CompressionMethod,
}

/// Builds a TRE archive in memory and emits it to `inner` once finished.
///
/// Payloads, records, names and hashes are buffered separately because the header, which
/// comes first, records the sizes of all of them.
///
/// Nothing reaches `inner` before [`TreWriter::finish`], so the whole archive is held in
/// memory while it is built. Packing a large tree needs about as much memory as the
/// archive it produces.
///
/// ```
/// # fn doit() -> gamearc_engine::error::Result<()>
/// # {
/// use std::io::Write;
/// use gamearc_formats::tre::{CompressionMethod, TreOptions, TreWriter};
///
/// let mut tre = TreWriter::new(Vec::new(), TreOptions::builder()
///            .name_compression(CompressionMethod::None)
///            .record_compression(CompressionMethod::None)
///            .build());
///
/// tre.start_file("hello_world.txt", CompressionMethod::None)?;
/// tre.write_all(b"Hello, World!")?;
///
/// let bytes = tre.finish()?;
/// assert_eq!(&bytes[..8], b"EERT5000");
///
/// # Ok(())
/// # }
/// # doit().unwrap();
/// ```
pub struct TreWriter<W: Write> {
    inner: W,
    record_block: TreBlockWriter,
    payload_block: Vec<u8>,
    name_block: TreBlockWriter,
    hash_block: Vec<u8>,
    open_payload: Option<TreBlockWriter>,
    name_offset: u32,
    header: TreHeader,
    record: TreRecord,
}

impl<W: Write> TreWriter<W> {
    /// Create an empty archive. Call [`TreWriter::start_file`] before writing any bytes.
    pub fn new(inner: W, options: TreOptions) -> TreWriter<W> {
        TreWriter {
            inner,
            record_block: TreBlockWriter::new(options.record_compression),
            payload_block: Vec::new(),
            name_block: TreBlockWriter::new(options.name_compression),
            hash_block: Vec::new(),
            open_payload: None,
            name_offset: 0,
            header: TreHeader {
                record_method: options.record_compression.into(),
                name_method: options.name_compression.into(),
                ..Default::default()
            },
            record: TreRecord::default(),
        }
    }

    /// Whether [`Write`] calls currently go to a payload
    pub const fn is_writing_file(&self) -> bool {
        self.open_payload.is_some()
    }

    /// Start a new file with the requested compression.
    ///
    /// Bytes written afterwards are compressed with `compression` until the next file starts.
    #[instrument(skip(self), err)]
    pub fn start_file(&mut self, name: &str, compression: CompressionMethod) -> Result<()> {
        self.begin_record(name, compression)?;
        self.open_payload = Some(TreBlockWriter::new(compression));
        Ok(())
    }

    /// Add a file whose payload is already stored as `compression` expects.
    ///
    /// `stored` is copied byte for byte; `uncompressed` is the size it expands to.
    #[instrument(skip(self, stored), fields(size = stored.len()), err)]
    pub fn add_raw_file(
        &mut self,
        name: &str,
        compression: CompressionMethod,
        stored: &[u8],
        uncompressed: u64,
    ) -> Result<()> {
        self.begin_record(name, compression)?;
        self.commit_record(stored, uncompressed)
    }

    fn begin_record(&mut self, name: &str, compression: CompressionMethod) -> Result<()> {
        self.close_payload()?;

        self.header.record_count += 1;
        self.name_block.write_all(name.as_bytes())?;
        self.name_block.write_u8(0)?;

        self.record.method = compression.into();
        self.record.name_crc = CRC.checksum(name.as_bytes());

        self.record.offset = to_u32(HEADER_SIZE + self.payload_block.len() as u64)?;
        self.record.name_offset = self.name_offset;

        self.name_offset = to_u32(self.name_block.total_in())?;

        Ok(())
    }

    fn close_payload(&mut self) -> Result<()> {
        let Some(payload) = self.open_payload.take() else {
            return Ok(());
        };

        let expanded = payload.total_in();
        let stored = payload.finalize()?;
        self.commit_record(&stored, expanded)
    }

    fn commit_record(&mut self, stored: &[u8], uncompressed: u64) -> Result<()> {
        self.record.expanded_size = to_u32(uncompressed)?;
        self.record.stored_size = to_u32(stored.len() as u64)?;

        self.record
            .write(&mut NoSeek::new(&mut self.record_block))
            .map_err(|e| binrw_error("tre", e))?;

        self.payload_block.extend_from_slice(stored);

        let mut hasher = Md5::new();
        hasher.update(stored);
        self.hash_block.extend_from_slice(&hasher.finalize());

        Ok(())
    }

    /// Close the open payload, emit the whole archive and hand back the destination.
    #[instrument(skip(self), err)]
    pub fn finish(mut self) -> Result<W> {
        self.close_payload()?;

        self.header.record_offset = to_u32(HEADER_SIZE + self.payload_block.len() as u64)?;

        let record_block = self.record_block.finalize()?;
        self.header.record_block_size = to_u32(record_block.len() as u64)?;

        self.header.name_block_expanded = to_u32(self.name_block.total_in())?;
        let name_block = self.name_block.finalize()?;
        self.header.name_block_size = to_u32(name_block.len() as u64)?;

        self.header
            .write(&mut NoSeek::new(&mut self.inner))
            .map_err(|e| binrw_error("tre", e))?;
        self.inner.write_all(&self.payload_block)?;
        self.inner.write_all(&record_block)?;
        self.inner.write_all(&name_block)?;
        self.inner.write_all(&self.hash_block)?;

        Ok(self.inner)
    }
}

impl<W: Write> Write for TreWriter<W> {
    #[instrument(skip_all, err, ret(level = Level::TRACE), fields(size=buf.len()) )]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.open_payload.as_mut() {
            Some(block) => block.write(buf),
            None => Err(io::Error::new(
                io::ErrorKind::Other,
                "start_file must be called before writing",
            )),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
