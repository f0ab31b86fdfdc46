//! Bounded-memory copying from a reader to an output sink.

use crate::error::{Error, Result};
use std::io::{ErrorKind, Read, Write};

/// Size of the single buffer used while streaming object content.
pub const STREAM_CHUNK_SIZE: usize = 8 * 1024;

/// Copy `reader` into `sink` one fixed-size chunk at a time.
///
/// Read failures surface as [`Error::Io`], write failures as
/// [`Error::Output`]; whatever was written before a failure stays written.
pub fn copy_chunked<R: Read + ?Sized, W: Write + ?Sized>(
    reader: &mut R,
    sink: &mut W,
) -> Result<u64> {
    let mut buf = [0u8; STREAM_CHUNK_SIZE];
    let mut total = 0u64;

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::Io { source: e }),
        };
        sink.write_all(&buf[..n]).map_err(Error::output)?;
        total += n as u64;
    }

    sink.flush().map_err(Error::output)?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor};

    /// Records the largest single write it sees.
    struct MaxWrite {
        data: Vec<u8>,
        largest: usize,
    }

    impl Write for MaxWrite {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.largest = self.largest.max(buf.len());
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_copy_in_bounded_chunks() {
        let data: Vec<u8> = (0..STREAM_CHUNK_SIZE * 5 + 17).map(|i| i as u8).collect();
        let mut sink = MaxWrite {
            data: Vec::new(),
            largest: 0,
        };

        let copied = copy_chunked(&mut Cursor::new(&data), &mut sink).unwrap();
        assert_eq!(copied, data.len() as u64);
        assert_eq!(sink.data, data);
        assert!(sink.largest <= STREAM_CHUNK_SIZE);
    }

    #[test]
    fn test_empty_reader() {
        let mut sink = Vec::new();
        assert_eq!(copy_chunked(&mut io::empty(), &mut sink).unwrap(), 0);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_write_failure_is_output_error() {
        let err = copy_chunked(&mut Cursor::new(b"data"), &mut BrokenPipe).unwrap_err();
        assert!(matches!(err, Error::Output { .. }));
    }
}
