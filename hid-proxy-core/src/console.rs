//! Line-oriented text writer for the debug console.
//!
//! The console sits on a CDC-ACM port read by plain serial terminals, so
//! every `\n` goes out as `\r\n`. The sink underneath never blocks: bytes it
//! cannot take are counted and dropped.

use core::fmt;

/// Non-blocking byte sink under a [`LineWriter`].
pub trait ByteSink {
    /// Take as many leading bytes of `bytes` as fit now; return the count.
    fn try_write(&mut self, bytes: &[u8]) -> usize;

    /// `count` bytes were dropped because the sink was full.
    fn dropped(&mut self, count: usize);
}

/// [`fmt::Write`] adapter that sends `\n` as `\r\n` into a [`ByteSink`].
///
/// Once the sink fills up, the rest of the current `write_str` is dropped
/// rather than resumed midway, so a line is never spliced with a later one.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineWriter<S>(pub S);

impl<S: ByteSink> LineWriter<S> {
    /// The underlying sink.
    pub fn sink(&self) -> &S {
        &self.0
    }

    /// Push `bytes`; returns `false` if any were dropped.
    fn push(&mut self, bytes: &[u8]) -> bool {
        let mut rest = bytes;
        while !rest.is_empty() {
            let n = self.0.try_write(rest).min(rest.len());
            if n == 0 {
                self.0.dropped(rest.len());
                return false;
            }
            rest = &rest[n..];
        }
        true
    }
}

impl<S: ByteSink> fmt::Write for LineWriter<S> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let mut open = true;
        for (i, line) in s.split('\n').enumerate() {
            let eol: &[u8] = if i == 0 { b"" } else { b"\r\n" };
            if open {
                open = self.push(eol) && self.push(line.as_bytes());
            } else {
                self.0.dropped(eol.len() + line.len());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use core::fmt::Write;
    use std::vec::Vec;

    // Accepts up to `room` bytes, at most `chunk` per call
    struct MockSink {
        out: Vec<u8>,
        room: usize,
        chunk: usize,
        dropped: usize,
    }

    impl MockSink {
        fn with_room(room: usize) -> Self {
            Self {
                out: Vec::new(),
                room,
                chunk: usize::MAX,
                dropped: 0,
            }
        }
    }

    impl ByteSink for MockSink {
        fn try_write(&mut self, bytes: &[u8]) -> usize {
            let n = bytes.len().min(self.room).min(self.chunk);
            self.out.extend_from_slice(&bytes[..n]);
            self.room -= n;
            n
        }

        fn dropped(&mut self, count: usize) {
            self.dropped += count;
        }
    }

    #[test]
    fn test_every_line_feed_becomes_crlf() {
        let mut w = LineWriter(MockSink::with_room(64));
        write!(w, "a\nbc\n\nd").unwrap();
        assert_eq!(w.sink().out, b"a\r\nbc\r\n\r\nd");
        assert_eq!(w.sink().dropped, 0);
    }

    #[test]
    fn test_trailing_line_feed() {
        let mut w = LineWriter(MockSink::with_room(64));
        writeln!(w, "USB HID proxy").unwrap();
        assert_eq!(w.sink().out, b"USB HID proxy\r\n");
    }

    #[test]
    fn test_empty_string() {
        let mut w = LineWriter(MockSink::with_room(64));
        w.write_str("").unwrap();
        assert!(w.sink().out.is_empty());
        assert_eq!(w.sink().dropped, 0);
    }

    #[test]
    fn test_partial_writes_resumed() {
        let mut sink = MockSink::with_room(64);
        sink.chunk = 3;
        let mut w = LineWriter(sink);
        w.write_str("02 00 04 \n").unwrap();
        assert_eq!(w.sink().out, b"02 00 04 \r\n");
    }

    #[test]
    fn test_full_sink_drops_rest_of_write() {
        let mut w = LineWriter(MockSink::with_room(4));
        // Never fails even when nothing fits
        w.write_str("abcdef\ngh").unwrap();

        assert_eq!(w.sink().out, b"abcd");
        // "ef" plus "\r\n" plus "gh"
        assert_eq!(w.sink().dropped, 6);

        w.write_str("\n").unwrap();
        assert_eq!(w.sink().dropped, 8);
    }
}
