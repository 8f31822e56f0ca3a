//! Pull-based line splitter over any byte source.
//!
//! The reader owns one fixed-size buffer and tracks the unconsumed region
//! `[consumed, filled)`. Every call first compacts that region to the start
//! of the buffer, so bytes left over from a previous `read` are never lost
//! and the tail is always free for the next one.
//!
//! `\n` and `\r` both end a line. A terminator immediately followed by the
//! *other* terminator byte (`\r\n` or `\n\r`) counts as a single break, even
//! when the pair is split across two reads. Two identical terminators in a
//! row produce an empty line.

use std::io::{self, ErrorKind, Read};

use thiserror::Error;

/// Buffer size used for manifests and standard input, matching `PATH_MAX`.
pub const DEFAULT_CAPACITY: usize = 4096;

#[derive(Debug, Error)]
pub enum LineError {
    #[error("read failed")]
    Io(#[from] io::Error),
    #[error("line {line} is too long (lines must be shorter than {capacity} bytes)")]
    TooLong { line: usize, capacity: usize },
}

pub struct LineReader<R> {
    source: R,
    buf: Box<[u8]>,
    consumed: usize,
    filled: usize,
    /// Terminator that is swallowed if it is the next byte to arrive.
    pair: Option<u8>,
    lines: usize,
    eof: bool,
}

impl<R: Read> LineReader<R> {
    pub fn new(source: R) -> Self {
        Self::with_capacity(DEFAULT_CAPACITY, source)
    }

    pub fn with_capacity(capacity: usize, source: R) -> Self {
        Self {
            source,
            buf: vec![0u8; capacity.max(1)].into_boxed_slice(),
            consumed: 0,
            filled: 0,
            pair: None,
            lines: 0,
            eof: false,
        }
    }

    /// Returns the next line without its terminator, or `None` once the
    /// source is exhausted and no partial line is pending.
    pub fn next_line(&mut self) -> Result<Option<&[u8]>, LineError> {
        self.compact();
        let mut scanned = self.consumed;

        loop {
            if self.consumed < self.filled {
                if let Some(expected) = self.pair.take() {
                    if self.buf[self.consumed] == expected {
                        self.consumed += 1;
                        scanned = self.consumed;
                    }
                }
            }

            let found = self.buf[scanned..self.filled]
                .iter()
                .position(|&byte| is_terminator(byte));
            if let Some(offset) = found {
                let start = self.consumed;
                let end = scanned + offset;
                let partner = partner_of(self.buf[end]);
                let mut next = end + 1;
                if next < self.filled {
                    if self.buf[next] == partner {
                        next += 1;
                    }
                } else {
                    self.pair = Some(partner);
                }
                self.consumed = next;
                self.lines += 1;
                return Ok(Some(&self.buf[start..end]));
            }
            scanned = self.filled;

            if self.filled == self.buf.len() {
                if self.consumed == 0 {
                    return Err(LineError::TooLong {
                        line: self.lines + 1,
                        capacity: self.buf.len(),
                    });
                }
                scanned -= self.consumed;
                self.compact();
            }

            if self.fill()? == 0 {
                self.pair = None;
                if self.consumed == self.filled {
                    return Ok(None);
                }
                let start = self.consumed;
                let end = self.filled;
                self.consumed = end;
                self.lines += 1;
                return Ok(Some(&self.buf[start..end]));
            }
        }
    }

    /// Number of lines returned so far.
    pub fn lines_read(&self) -> usize {
        self.lines
    }

    fn compact(&mut self) {
        if self.consumed == 0 {
            return;
        }
        self.buf.copy_within(self.consumed..self.filled, 0);
        self.filled -= self.consumed;
        self.consumed = 0;
    }

    fn fill(&mut self) -> io::Result<usize> {
        if self.eof {
            return Ok(0);
        }
        loop {
            match self.source.read(&mut self.buf[self.filled..]) {
                Ok(0) => {
                    self.eof = true;
                    return Ok(0);
                }
                Ok(read) => {
                    self.filled += read;
                    return Ok(read);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
    }
}

fn is_terminator(byte: u8) -> bool {
    byte == b'\n' || byte == b'\r'
}

fn partner_of(terminator: u8) -> u8 {
    if terminator == b'\n' { b'\r' } else { b'\n' }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Cursor;

    /// Hands out at most one chunk size per `read`, cycling through `sizes`.
    struct Chunked {
        data: Vec<u8>,
        pos: usize,
        sizes: Vec<usize>,
        call: usize,
    }

    impl Chunked {
        fn new(data: &[u8], sizes: &[usize]) -> Self {
            Self {
                data: data.to_vec(),
                pos: 0,
                sizes: sizes.to_vec(),
                call: 0,
            }
        }
    }

    impl Read for Chunked {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let size = self.sizes[self.call % self.sizes.len()].max(1);
            self.call += 1;
            let remaining = self.data.len() - self.pos;
            let n = size.min(remaining).min(buf.len());
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    struct Failing;

    impl Read for Failing {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("disk on fire"))
        }
    }

    struct InterruptedOnce {
        inner: Cursor<Vec<u8>>,
        interrupted: bool,
    }

    impl Read for InterruptedOnce {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(io::Error::from(ErrorKind::Interrupted));
            }
            self.inner.read(buf)
        }
    }

    fn drain<R: Read>(mut reader: LineReader<R>) -> Result<Vec<Vec<u8>>, LineError> {
        let mut out = Vec::new();
        while let Some(line) = reader.next_line()? {
            out.push(line.to_vec());
        }
        Ok(out)
    }

    fn lines(data: &[u8]) -> Vec<Vec<u8>> {
        drain(LineReader::new(Cursor::new(data.to_vec()))).expect("lines")
    }

    fn owned(expected: &[&str]) -> Vec<Vec<u8>> {
        expected.iter().map(|s| s.as_bytes().to_vec()).collect()
    }

    #[test]
    fn splits_on_lf_cr_and_crlf() {
        assert_eq!(lines(b"a\nb\rc\r\nd\n"), owned(&["a", "b", "c", "d"]));
    }

    #[test]
    fn lfcr_counts_as_one_break() {
        assert_eq!(lines(b"a\n\rb\n"), owned(&["a", "b"]));
    }

    #[test]
    fn repeated_terminator_yields_empty_line() {
        assert_eq!(lines(b"a\n\nb\n"), owned(&["a", "", "b"]));
        assert_eq!(lines(b"a\r\rb"), owned(&["a", "", "b"]));
        assert_eq!(lines(b"\n"), owned(&[""]));
    }

    #[test]
    fn final_line_without_terminator_is_returned() {
        assert_eq!(lines(b"one\ntwo"), owned(&["one", "two"]));
    }

    #[test]
    fn empty_stream_ends_immediately() {
        let mut reader = LineReader::new(Cursor::new(Vec::new()));
        assert!(reader.next_line().expect("read").is_none());
        assert!(reader.next_line().expect("read").is_none());
    }

    #[test]
    fn crlf_split_across_reads_is_one_break() {
        let reader = LineReader::new(Chunked::new(b"a\r\nb\r\n", &[2, 1]));
        assert_eq!(drain(reader).expect("lines"), owned(&["a", "b"]));
    }

    #[test]
    fn small_buffer_compacts_between_lines() {
        let reader = LineReader::with_capacity(4, Chunked::new(b"ab\ncd\nefg\nh", &[3]));
        assert_eq!(drain(reader).expect("lines"), owned(&["ab", "cd", "efg", "h"]));
    }

    #[test]
    fn line_filling_the_buffer_is_rejected() {
        let mut reader = LineReader::with_capacity(4, Cursor::new(b"ok\nabcd\n".to_vec()));
        assert_eq!(reader.next_line().expect("first line"), Some(&b"ok"[..]));
        match reader.next_line() {
            Err(LineError::TooLong { line, capacity }) => {
                assert_eq!(line, 2);
                assert_eq!(capacity, 4);
            }
            other => panic!("expected TooLong, got {other:?}"),
        }
    }

    #[test]
    fn read_errors_surface() {
        let mut reader = LineReader::new(Failing);
        assert!(matches!(reader.next_line(), Err(LineError::Io(_))));
    }

    #[test]
    fn interrupted_reads_are_retried() {
        let source = InterruptedOnce {
            inner: Cursor::new(b"x\n".to_vec()),
            interrupted: false,
        };
        assert_eq!(drain(LineReader::new(source)).expect("lines"), owned(&["x"]));
    }

    #[test]
    fn counts_returned_lines() {
        let mut reader = LineReader::new(Cursor::new(b"a\nb\n".to_vec()));
        while reader.next_line().expect("read").is_some() {}
        assert_eq!(reader.lines_read(), 2);
    }

    fn outcome<R: Read>(reader: LineReader<R>) -> (Vec<Vec<u8>>, bool) {
        let mut reader = reader;
        let mut out = Vec::new();
        loop {
            match reader.next_line() {
                Ok(Some(line)) => out.push(line.to_vec()),
                Ok(None) => return (out, false),
                Err(_) => return (out, true),
            }
        }
    }

    proptest! {
        #[test]
        fn chunking_does_not_change_lines(
            data in proptest::collection::vec(
                prop_oneof![Just(b'a'), Just(b'b'), Just(b'\n'), Just(b'\r')],
                0..64,
            ),
            sizes in proptest::collection::vec(1usize..9, 1..6),
        ) {
            let whole = outcome(LineReader::with_capacity(128, Cursor::new(data.clone())));
            let chunked = outcome(LineReader::with_capacity(128, Chunked::new(&data, &sizes)));
            prop_assert_eq!(whole, chunked);
        }

        #[test]
        fn chunking_does_not_change_limits(
            data in proptest::collection::vec(
                prop_oneof![Just(b'a'), Just(b'\n'), Just(b'\r')],
                0..48,
            ),
            sizes in proptest::collection::vec(1usize..5, 1..4),
        ) {
            let whole = outcome(LineReader::with_capacity(6, Cursor::new(data.clone())));
            let chunked = outcome(LineReader::with_capacity(6, Chunked::new(&data, &sizes)));
            prop_assert_eq!(whole, chunked);
        }
    }
}
