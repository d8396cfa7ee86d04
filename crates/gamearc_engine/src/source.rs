//! Shared handle to the bytes backing a container

use std::{
    fmt,
    path::Path,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use crate::{cursor::ByteCursor, error::Result, validate::check_span};

/// A container file or buffer shared by every entry parsed from it.
///
/// The cursor sits behind a mutex. Each payload read is a single seek followed by a read
/// under the lock, so entries sharing a source may be read from several threads.
pub struct Source {
    name: Box<str>,
    size: u64,
    cursor: Mutex<ByteCursor>,
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Source({:?}, {} bytes)", self.name, self.size)
    }
}

impl Source {
    /// Share an existing cursor. Its name, if any, becomes the source name.
    pub fn new(cursor: ByteCursor) -> Arc<Source> {
        Arc::new(Source {
            name: cursor.name().unwrap_or("<memory>").into(),
            size: cursor.len(),
            cursor: Mutex::new(cursor),
        })
    }

    /// Open a file on disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Arc<Source>> {
        Ok(Source::new(ByteCursor::open(path)?))
    }

    /// Share an in-memory buffer under `name`.
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Arc<Source> {
        Source::new(ByteCursor::from_bytes(bytes).with_name(name))
    }

    /// Name of the file the bytes came from
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size of the source in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Lock the cursor for a sequence of reads.
    ///
    /// The cursor position is undefined when the lock is taken; callers seek first. A panic
    /// while the lock was held cannot leave the bytes in a bad state, so poisoning is
    /// ignored.
    pub fn lock(&self) -> MutexGuard<'_, ByteCursor> {
        self.cursor.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read `length` bytes starting at `offset`.
    pub fn read_at(&self, offset: u64, length: u64) -> Result<Vec<u8>> {
        check_span(offset, length, self.size)?;

        let mut cursor = self.lock();
        cursor.seek(offset)?;
        cursor.read_bytes(length)
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;
    use std::thread;

    use crate::error::Result;
    use crate::source::Source;

    #[test]
    fn read_at_is_bounds_checked() -> Result<()> {
        let source = Source::from_bytes("test.bin", b"0123456789".to_vec());

        assert_eq!(source.name(), "test.bin");
        assert_eq!(source.size(), 10);
        assert_eq!(source.read_at(2, 3)?, b"234");
        assert_eq!(source.read_at(10, 0)?, b"");
        assert!(source.read_at(8, 3).is_err());

        Ok(())
    }

    #[test]
    fn concurrent_reads_do_not_interfere() {
        let source = Source::from_bytes("test.bin", (0u8..=255).collect::<Vec<_>>());

        let handles: Vec<_> = (0u64..8)
            .map(|i| {
                let source = Arc::clone(&source);
                thread::spawn(move || {
                    for _ in 0..100 {
                        let bytes = source.read_at(i * 32, 32).unwrap();
                        assert_eq!(bytes[0] as u64, i * 32);
                        assert_eq!(bytes[31] as u64, i * 32 + 31);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }
}
