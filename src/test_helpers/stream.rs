use std::collections::VecDeque;
use std::io::{self, Read};

/// Response body that hands out one chunk per `read` call,
/// like a connection delivering data in bursts.
pub struct ChunkedReader {
    chunks: VecDeque<Vec<u8>>,
    error: Option<io::ErrorKind>,
}

impl ChunkedReader {
    pub fn new<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        Self {
            chunks: chunks.into_iter().map(|c| c.as_ref().to_vec()).collect(),
            error: None,
        }
    }

    /// Fail with `kind` after the chunks run out instead of ending cleanly.
    pub fn fail_with(mut self, kind: io::ErrorKind) -> Self {
        self.error = Some(kind);
        self
    }
}

impl Read for ChunkedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(mut chunk) = self.chunks.pop_front() else {
            return match self.error.take() {
                Some(kind) => Err(io::Error::new(kind, "connection dropped")),
                None => Ok(0),
            };
        };

        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            self.chunks.push_front(chunk.split_off(n));
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunked_reader_delivers_in_order() {
        let mut reader = ChunkedReader::new(vec!["ab", "cde"]);
        let mut buf = [0u8; 8];

        assert_eq!(reader.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"ab");
        assert_eq!(reader.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], b"cde");
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_chunked_reader_error_after_chunks() {
        let mut reader = ChunkedReader::new(vec!["ab"]).fail_with(io::ErrorKind::ConnectionReset);
        let mut buf = [0u8; 8];

        assert_eq!(reader.read(&mut buf).unwrap(), 2);
        assert_eq!(
            reader.read(&mut buf).unwrap_err().kind(),
            io::ErrorKind::ConnectionReset
        );
    }
}
