use std::io::{self, Read};

use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng};

/// Source of fresh random bytes for new records.
///
/// Behaves like [`std::io::Read`]: a call may fill only part of the buffer,
/// and `Ok(0)` means the source is exhausted.
pub trait EntropySource: Send {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, EntropyError>;
}

/// Fill exactly `len` bytes, reading repeatedly until the buffer is full or
/// the source runs dry.
pub fn draw(source: &mut dyn EntropySource, len: usize) -> Result<Vec<u8>, EntropyError> {
    let mut buf = vec![0u8; len];
    let mut filled = 0;
    while filled < len {
        match source.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    if filled < len {
        return Err(EntropyError::ShortRead {
            expected: len,
            actual: filled,
        });
    }
    Ok(buf)
}

/// Operating system CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, EntropyError> {
        OsRng
            .try_fill_bytes(buf)
            .map_err(|e| EntropyError::Io(io::Error::new(io::ErrorKind::Other, e.to_string())))?;
        Ok(buf.len())
    }
}

/// Deterministic stream from a fixed seed. For demos and tests only.
pub struct SeededEntropy(StdRng);

impl SeededEntropy {
    pub fn new(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

impl EntropySource for SeededEntropy {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, EntropyError> {
        self.0.fill_bytes(buf);
        Ok(buf.len())
    }
}

/// Adapter for any byte reader, such as a hardware RNG device file.
pub struct ReaderEntropy<R>(R);

impl<R: Read + Send> ReaderEntropy<R> {
    pub fn new(reader: R) -> Self {
        Self(reader)
    }
}

impl<R: Read + Send> EntropySource for ReaderEntropy<R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, EntropyError> {
        loop {
            match self.0.read(buf) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => return other.map_err(EntropyError::Io),
            }
        }
    }
}

/// Errors from entropy sources.
#[derive(Debug, thiserror::Error)]
pub enum EntropyError {
    #[error("entropy source returned {actual} of {expected} bytes")]
    ShortRead { expected: usize, actual: usize },

    #[error("entropy source I/O error: {0}")]
    Io(#[from] io::Error),
}
