//! Bounds-checked binary reading over files and in-memory buffers
//!

use byteorder::ByteOrder;
use std::{
    fmt::{self, Debug},
    fs::File,
    io::{self, BufReader, Cursor, Read, Seek, SeekFrom},
    path::Path,
};

use crate::error::{Error, Result};

const DEFAULT_READ_BUFFER: usize = 8 * 1024;

/// Any seekable byte stream a [`ByteCursor`] can be built on
pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

/// Width of the length field in front of a length-prefixed string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthPrefix {
    /// One byte
    U8,
    /// Two bytes in the requested byte order
    U16,
    /// Four bytes in the requested byte order
    U32,
}

/// A seekable reader that knows the length of its stream.
///
/// Every read either yields exactly the requested bytes or fails with
/// [`Error::TruncatedRead`], and the check happens before anything is allocated.
/// Seeking past the end fails with [`Error::SeekOutOfBounds`] instead of clamping.
///
/// Multi-byte integers are read with an explicit [`ByteOrder`]; there is no default byte
/// order stored on the cursor.
///
/// ```
/// use byteorder::{BigEndian, LittleEndian};
/// use gamearc_engine::ByteCursor;
///
/// # fn doit() -> gamearc_engine::error::Result<()> {
/// let mut cursor = ByteCursor::from_bytes(vec![0x01u8, 0x00, 0x00, 0x01]);
/// assert_eq!(cursor.read_u16::<LittleEndian>()?, 1);
/// assert_eq!(cursor.read_u16::<BigEndian>()?, 1);
/// assert!(cursor.read_u8().is_err());
/// # Ok(())
/// # }
/// # doit().unwrap();
/// ```
///
/// After a failed read the position is undefined, callers must [`ByteCursor::seek`] before
/// reading again.
pub struct ByteCursor {
    inner: BufReader<Box<dyn ReadSeek>>,
    pos: u64,
    len: u64,
    name: Option<Box<str>>,
}

impl Debug for ByteCursor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ByteCursor")
            .field("name", &self.name)
            .field("pos", &self.pos)
            .field("len", &self.len)
            .finish()
    }
}

impl ByteCursor {
    /// Wrap a seekable stream, measuring its length.
    pub fn new(reader: impl ReadSeek + 'static) -> Result<ByteCursor> {
        let mut reader: Box<dyn ReadSeek> = Box::new(reader);
        let len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;

        Ok(ByteCursor {
            inner: BufReader::with_capacity(DEFAULT_READ_BUFFER, reader),
            pos: 0,
            len,
            name: None,
        })
    }

    /// Wrap an in-memory buffer.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> ByteCursor {
        let bytes = bytes.into();
        let len = bytes.len() as u64;
        let reader: Box<dyn ReadSeek> = Box::new(Cursor::new(bytes));

        ByteCursor {
            inner: BufReader::with_capacity(DEFAULT_READ_BUFFER, reader),
            pos: 0,
            len,
            name: None,
        }
    }

    /// Open a file, remembering its file name for extension checks.
    pub fn open(path: impl AsRef<Path>) -> Result<ByteCursor> {
        let path = path.as_ref();
        let cursor = ByteCursor::new(File::open(path)?)?;

        Ok(match path.file_name() {
            Some(name) => cursor.with_name(name.to_string_lossy()),
            None => cursor,
        })
    }

    /// Attach the name of the underlying file.
    pub fn with_name(mut self, name: impl Into<String>) -> ByteCursor {
        self.name = Some(name.into().into_boxed_str());
        self
    }

    /// Name of the underlying file, if one is known
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Rebuild the internal read buffer with `size` bytes of capacity.
    ///
    /// This is a performance hint and never changes what is read.
    pub fn with_read_buffer_hint(self, size: usize) -> Result<ByteCursor> {
        let ByteCursor {
            inner,
            pos,
            len,
            name,
        } = self;

        // Buffered bytes are dropped by `into_inner`, so the stream is re-positioned.
        let mut reader = inner.into_inner();
        reader.seek(SeekFrom::Start(pos))?;

        Ok(ByteCursor {
            inner: BufReader::with_capacity(size.max(1), reader),
            pos,
            len,
            name,
        })
    }

    /// Total length of the stream
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether the stream holds no bytes at all
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current absolute position
    pub fn tell(&self) -> u64 {
        self.pos
    }

    /// Bytes between the current position and the end of the stream
    pub fn remaining(&self) -> u64 {
        self.len.saturating_sub(self.pos)
    }

    /// Fail with [`Error::TruncatedRead`] unless `count` more bytes can be read.
    pub fn require(&self, count: u64) -> Result<()> {
        if count > self.remaining() {
            return Err(Error::TruncatedRead {
                offset: self.pos,
                requested: count,
                available: self.remaining(),
            });
        }
        Ok(())
    }

    /// Move to an absolute position. Seeking exactly to the end is allowed.
    pub fn seek(&mut self, offset: u64) -> Result<u64> {
        if offset > self.len {
            return Err(Error::SeekOutOfBounds {
                target: offset as i128,
                size: self.len,
            });
        }

        match i64::try_from(offset as i128 - self.pos as i128) {
            Ok(delta) => self.inner.seek_relative(delta)?,
            Err(_) => {
                self.inner.seek(SeekFrom::Start(offset))?;
            }
        }
        self.pos = offset;

        Ok(offset)
    }

    /// Move relative to the current position.
    pub fn seek_relative(&mut self, delta: i64) -> Result<u64> {
        let target = self.pos as i128 + delta as i128;
        if target < 0 || target > self.len as i128 {
            return Err(Error::SeekOutOfBounds {
                target,
                size: self.len,
            });
        }

        self.inner.seek_relative(delta)?;
        self.pos = target as u64;

        Ok(self.pos)
    }

    /// Skip `count` bytes forward.
    pub fn skip(&mut self, count: u64) -> Result<u64> {
        let delta = i64::try_from(count).map_err(|_| Error::SeekOutOfBounds {
            target: self.pos as i128 + count as i128,
            size: self.len,
        })?;
        self.seek_relative(delta)
    }

    fn read_into(&mut self, buf: &mut [u8]) -> Result<()> {
        self.require(buf.len() as u64)?;

        if let Err(err) = self.inner.read_exact(buf) {
            let offset = self.pos;
            self.pos = self.inner.stream_position()?;
            return Err(match err.kind() {
                io::ErrorKind::UnexpectedEof => Error::TruncatedRead {
                    offset,
                    requested: buf.len() as u64,
                    available: self.len.saturating_sub(offset),
                },
                _ => Error::IOError(err),
            });
        }
        self.pos += buf.len() as u64;

        Ok(())
    }

    /// Read exactly `count` bytes.
    pub fn read_bytes(&mut self, count: u64) -> Result<Vec<u8>> {
        self.require(count)?;

        let mut buffer = vec![0u8; count as usize];
        self.read_into(&mut buffer)?;
        Ok(buffer)
    }

    /// Read a fixed number of bytes into an array, typically a signature.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buffer = [0u8; N];
        self.read_into(&mut buffer)?;
        Ok(buffer)
    }

    /// Read `count` bytes and restore the position afterwards.
    pub fn peek_bytes(&mut self, count: u64) -> Result<Vec<u8>> {
        let start = self.pos;
        let bytes = self.read_bytes(count)?;
        self.seek(start)?;
        Ok(bytes)
    }

    /// Read one byte
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Read an unsigned 16-bit integer in the byte order `E`
    pub fn read_u16<E: ByteOrder>(&mut self) -> Result<u16> {
        Ok(E::read_u16(&self.read_array::<2>()?))
    }

    /// Read an unsigned 24-bit integer in the byte order `E`
    pub fn read_u24<E: ByteOrder>(&mut self) -> Result<u32> {
        Ok(E::read_u24(&self.read_array::<3>()?))
    }

    /// Read an unsigned 32-bit integer in the byte order `E`
    pub fn read_u32<E: ByteOrder>(&mut self) -> Result<u32> {
        Ok(E::read_u32(&self.read_array::<4>()?))
    }

    /// Read an unsigned 64-bit integer in the byte order `E`
    pub fn read_u64<E: ByteOrder>(&mut self) -> Result<u64> {
        Ok(E::read_u64(&self.read_array::<8>()?))
    }

    /// Read a `count` byte string field, cut at the first NUL.
    ///
    /// Invalid UTF-8 is replaced rather than rejected, mirroring how the names are displayed.
    pub fn read_fixed_string(&mut self, count: u64) -> Result<String> {
        let raw = self.read_bytes(count)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
    }

    /// Read bytes up to and including a NUL terminator, returning the bytes before it.
    ///
    /// Fails with [`Error::TruncatedRead`] when the stream ends first and with
    /// [`Error::InvalidName`] when `max_len` bytes pass without a terminator.
    pub fn read_null_terminated_string(&mut self, max_len: Option<usize>) -> Result<String> {
        let mut raw = Vec::new();
        loop {
            if max_len.is_some_and(|max| raw.len() >= max) {
                return Err(Error::InvalidName {
                    name: String::from_utf8_lossy(&raw).into_owned(),
                    reason: "missing NUL terminator",
                });
            }

            match self.read_u8()? {
                0 => break,
                byte => raw.push(byte),
            }
        }
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }

    /// Read a string preceded by its byte length. Trailing NULs are dropped.
    pub fn read_length_prefixed_string<E: ByteOrder>(
        &mut self,
        prefix: LengthPrefix,
    ) -> Result<String> {
        let count = match prefix {
            LengthPrefix::U8 => self.read_u8()? as u64,
            LengthPrefix::U16 => self.read_u16::<E>()? as u64,
            LengthPrefix::U32 => self.read_u32::<E>()? as u64,
        };

        let raw = self.read_bytes(count)?;
        let end = raw.iter().rposition(|&b| b != 0).map_or(0, |last| last + 1);
        Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
    }
}

impl Read for ByteCursor {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.inner.read(buf)?;
        self.pos += read as u64;
        Ok(read)
    }
}

impl Seek for ByteCursor {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => offset as i128,
            SeekFrom::End(delta) => self.len as i128 + delta as i128,
            SeekFrom::Current(delta) => self.pos as i128 + delta as i128,
        };

        if target < 0 || target > self.len as i128 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                Error::SeekOutOfBounds {
                    target,
                    size: self.len,
                },
            ));
        }

        ByteCursor::seek(self, target as u64).map_err(io::Error::other)
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        Ok(self.pos)
    }
}

#[cfg(test)]
mod test {
    use byteorder::{BigEndian, LittleEndian};
    use pretty_assertions::assert_eq;

    use crate::cursor::{ByteCursor, LengthPrefix};
    use crate::error::{Error, Result};

    #[test]
    fn read_integers_in_both_byte_orders() -> Result<()> {
        #[rustfmt::skip]
        let mut cursor = ByteCursor::from_bytes(vec![
            0x2Du8, 0x38, 0xAA, 0x55,
            0x55, 0xAA, 0x38, 0x2D,
            0x01, 0x02, 0x03,
            0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01,
        ]);

        assert_eq!(cursor.read_u32::<LittleEndian>()?, 0x55AA382D);
        assert_eq!(cursor.read_u32::<BigEndian>()?, 0x55AA382D);
        assert_eq!(cursor.read_u24::<BigEndian>()?, 0x010203);
        assert_eq!(cursor.read_u64::<LittleEndian>()?, 0x0102030405060708);
        assert_eq!(cursor.remaining(), 0);

        Ok(())
    }

    #[test]
    fn truncated_read_is_reported_before_allocating() {
        let mut cursor = ByteCursor::from_bytes(vec![0u8; 4]);

        match cursor.read_bytes(u64::MAX) {
            Err(Error::TruncatedRead {
                offset,
                requested,
                available,
            }) => {
                assert_eq!(offset, 0);
                assert_eq!(requested, u64::MAX);
                assert_eq!(available, 4);
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn seek_is_bounded_by_stream_length() -> Result<()> {
        let mut cursor = ByteCursor::from_bytes(vec![0u8; 16]);

        assert_eq!(cursor.seek(16)?, 16);
        assert!(matches!(
            cursor.seek(17),
            Err(Error::SeekOutOfBounds { target: 17, size: 16 })
        ));
        assert!(matches!(
            cursor.seek_relative(-17),
            Err(Error::SeekOutOfBounds { target: -1, size: 16 })
        ));

        cursor.seek(4)?;
        cursor.skip(8)?;
        assert_eq!(cursor.tell(), 12);
        assert_eq!(cursor.remaining(), 4);
        assert!(cursor.skip(5).is_err());

        Ok(())
    }

    #[test]
    fn read_strings() -> Result<()> {
        #[rustfmt::skip]
        let mut cursor = ByteCursor::from_bytes(vec![
            b'a', b'b', b'c', 0x00, 0xFF, 0xFF,
            b'n', b'a', b'm', b'e', 0x00,
            0x03, b'x', b'y', 0x00,
            0x00, 0x02, b'h', b'i',
        ]);

        assert_eq!(cursor.read_fixed_string(6)?, "abc");
        assert_eq!(cursor.read_null_terminated_string(Some(16))?, "name");
        assert_eq!(
            cursor.read_length_prefixed_string::<LittleEndian>(LengthPrefix::U8)?,
            "xy"
        );
        assert_eq!(
            cursor.read_length_prefixed_string::<BigEndian>(LengthPrefix::U16)?,
            "hi"
        );

        Ok(())
    }

    #[test]
    fn unterminated_strings_fail() -> Result<()> {
        let mut cursor = ByteCursor::from_bytes(b"abcdef".to_vec());
        assert!(matches!(
            cursor.read_null_terminated_string(Some(3)),
            Err(Error::InvalidName { .. })
        ));

        cursor.seek(0)?;
        assert!(matches!(
            cursor.read_null_terminated_string(None),
            Err(Error::TruncatedRead { .. })
        ));

        Ok(())
    }

    #[test]
    fn buffer_hint_keeps_position() -> Result<()> {
        let mut cursor = ByteCursor::from_bytes((0u8..=255).collect::<Vec<_>>());
        cursor.seek(100)?;
        assert_eq!(cursor.read_u8()?, 100);

        let mut cursor = cursor.with_read_buffer_hint(3)?;
        assert_eq!(cursor.tell(), 101);
        assert_eq!(cursor.read_bytes(4)?, vec![101, 102, 103, 104]);
        assert_eq!(cursor.peek_bytes(2)?, vec![105, 106]);
        assert_eq!(cursor.read_u8()?, 105);

        Ok(())
    }

    #[test]
    fn io_traits_follow_position() -> Result<()> {
        use std::io::{Read, Seek, SeekFrom};

        let mut cursor = ByteCursor::from_bytes(b"0123456789".to_vec());
        Seek::seek(&mut cursor, SeekFrom::End(-3))?;

        let mut rest = String::new();
        cursor.read_to_string(&mut rest)?;
        assert_eq!(rest, "789");
        assert_eq!(cursor.tell(), 10);
        assert!(Seek::seek(&mut cursor, SeekFrom::Current(1)).is_err());

        Ok(())
    }
}
