//! Read-through duplication of a byte stream.

use std::io::{self, Read, Write};

/// A reader that copies every byte it hands out into a writer.
///
/// Each successful `read` of `n` bytes writes exactly those `n` bytes to the
/// writer before returning, so the writer always holds a prefix of what the
/// consumer has seen. A write failure is reported as a read failure and
/// [`TeeReader::write_failed`] is set so callers can tell the two apart.
#[derive(Debug)]
pub struct TeeReader<R, W> {
    reader: R,
    writer: W,
    write_failed: bool,
}

impl<R: Read, W: Write> TeeReader<R, W> {
    /// Wraps `reader`, copying into `writer`.
    #[must_use]
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            write_failed: false,
        }
    }

    /// Whether the last failed read was caused by the writer.
    #[must_use]
    pub fn write_failed(&self) -> bool {
        self.write_failed
    }

    /// Returns the reader and writer.
    pub fn into_inner(self) -> (R, W) {
        (self.reader, self.writer)
    }
}

impl<R: Read, W: Write> Read for TeeReader<R, W> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.reader.read(buf)?;
        if n > 0
            && let Err(e) = self.writer.write_all(&buf[..n])
        {
            self.write_failed = true;
            return Err(e);
        }
        Ok(n)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Accepts `capacity` bytes, then fails.
    struct Full {
        written: Vec<u8>,
        capacity: usize,
    }

    impl Write for Full {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let room = self.capacity - self.written.len();
            if room == 0 {
                return Err(io::Error::new(io::ErrorKind::StorageFull, "disk full"));
            }
            let n = room.min(buf.len());
            self.written.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_tee_copies_everything_read() {
        let mut tee = TeeReader::new(&b"<html>hello</html>"[..], Vec::new());
        let mut seen = String::new();
        tee.read_to_string(&mut seen).unwrap();

        let (_, written) = tee.into_inner();
        assert_eq!(seen, "<html>hello</html>");
        assert_eq!(written, seen.as_bytes());
    }

    #[test]
    fn test_tee_partial_reads_write_exactly_once() {
        let data = b"0123456789";
        let mut tee = TeeReader::new(&data[..], Vec::new());
        let mut buf = [0u8; 3];

        assert_eq!(tee.read(&mut buf).unwrap(), 3);
        assert_eq!(tee.read(&mut buf).unwrap(), 3);
        let (_, written) = tee.into_inner();
        assert_eq!(written, b"012345");
    }

    #[test]
    fn test_tee_stops_when_consumer_stops() {
        let mut tee = TeeReader::new(&b"abcdef"[..], Vec::new());
        let mut buf = [0u8; 2];
        tee.read_exact(&mut buf).unwrap();

        let (mut rest, written) = tee.into_inner();
        assert_eq!(written, b"ab");
        let mut remaining = Vec::new();
        rest.read_to_end(&mut remaining).unwrap();
        assert_eq!(remaining, b"cdef");
    }

    #[test]
    fn test_tee_write_failure_surfaces_as_read_error() {
        let sink = Full {
            written: Vec::new(),
            capacity: 4,
        };
        let mut tee = TeeReader::new(&b"abcdefgh"[..], sink);
        let mut buf = [0u8; 8];

        let err = tee.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::StorageFull);
        assert!(tee.write_failed());
    }

    #[test]
    fn test_tee_read_failure_is_not_a_write_failure() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            }
        }

        let mut tee = TeeReader::new(Broken, Vec::new());
        let err = tee.read(&mut [0u8; 4]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
        assert!(!tee.write_failed());
    }
}
