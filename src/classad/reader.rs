//! Line tokenizer and batch reader for long-format ClassAd output.

use std::io::{self, BufRead};
use std::mem;

use thiserror::Error;

use super::{Attribute, ClassAd};
use crate::core::QueryError;

/// Default upper bound on a single line, in bytes. Requirements expressions
/// can be long, so this is far above typical terminal widths.
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

/// Default number of undelivered records a stream may hold before the
/// producer blocks.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 16;

/// Malformed input found while tokenizing ClassAd text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A non-blank line without a `=` separator.
    #[error("invalid classad attribute on line {line}: \"{text}\"")]
    MissingSeparator {
        /// 1-based line number.
        line: usize,
        /// The offending line.
        text: String,
    },
    /// A line longer than the configured maximum.
    #[error("line {line} is {len} bytes, exceeding the {limit} byte limit")]
    LineTooLong {
        /// 1-based line number.
        line: usize,
        /// Length of the line in bytes.
        len: usize,
        /// Configured maximum.
        limit: usize,
    },
}

/// Parser settings shared by the batch and streaming entry points.
///
/// ```
/// use htcondor_query::classad::ClassAdReader;
///
/// let text = b"Name = \"slot1@host\"\nCpus = 8\n\nName = \"slot2@host\"\nCpus = 4\n";
/// let ads = ClassAdReader::new().parse_bytes(text).unwrap();
/// assert_eq!(ads.len(), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassAdReader {
    max_line_bytes: usize,
    channel_capacity: usize,
}

impl Default for ClassAdReader {
    fn default() -> Self {
        Self {
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl ClassAdReader {
    /// Reader with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum accepted line length in bytes (at least 1).
    #[must_use]
    pub fn with_max_line_bytes(mut self, max_line_bytes: usize) -> Self {
        self.max_line_bytes = max_line_bytes.max(1);
        self
    }

    /// Set the record channel capacity used by streams (at least 1).
    #[must_use]
    pub fn with_channel_capacity(mut self, channel_capacity: usize) -> Self {
        self.channel_capacity = channel_capacity.max(1);
        self
    }

    /// Maximum accepted line length in bytes.
    #[must_use]
    pub const fn max_line_bytes(&self) -> usize {
        self.max_line_bytes
    }

    /// Record channel capacity used by streams.
    #[must_use]
    pub const fn channel_capacity(&self) -> usize {
        self.channel_capacity
    }

    /// Read every record until end of input.
    ///
    /// The first malformed line or read failure aborts the read; no partial
    /// set of records is returned.
    ///
    /// # Errors
    ///
    /// [`QueryError::Parse`] for malformed or oversized lines and
    /// [`QueryError::Io`] when the reader fails.
    pub fn read_all<R: BufRead>(&self, mut reader: R) -> Result<Vec<ClassAd>, QueryError> {
        let mut scanner = LineScanner::new(self.max_line_bytes);
        let mut builder = AdBuilder::default();
        let mut ads = Vec::new();
        while let Some(line) = next_line(&mut reader, &mut scanner)? {
            if let Some(ad) = builder.push(line)? {
                ads.push(ad);
            }
        }
        ads.extend(builder.finish());
        Ok(ads)
    }

    /// Parse a complete in-memory response, e.g. a cached tool output.
    ///
    /// # Errors
    ///
    /// Same as [`ClassAdReader::read_all`].
    pub fn parse_bytes(&self, bytes: &[u8]) -> Result<Vec<ClassAd>, QueryError> {
        self.read_all(bytes)
    }
}

/// One line pulled off the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Line {
    Text(String),
    TooLong { len: usize, limit: usize },
}

/// Accumulates the bytes of one line, keeping at most `limit + 1` of them so
/// oversized lines are detected without buffering them whole.
#[derive(Debug)]
pub(crate) struct LineScanner {
    buf: Vec<u8>,
    limit: usize,
    seen: usize,
    pending: bool,
}

impl LineScanner {
    pub(crate) const fn new(limit: usize) -> Self {
        Self {
            buf: Vec::new(),
            limit,
            seen: 0,
            pending: false,
        }
    }

    /// Consume bytes from `available`. Returns how many were used and whether
    /// a newline ended the current line.
    pub(crate) fn feed(&mut self, available: &[u8]) -> (usize, bool) {
        self.pending = true;
        match memchr::memchr(b'\n', available) {
            Some(i) => {
                self.append(&available[..i]);
                (i + 1, true)
            }
            None => {
                self.append(available);
                (available.len(), false)
            }
        }
    }

    fn append(&mut self, bytes: &[u8]) {
        self.seen += bytes.len();
        let room = (self.limit + 1).saturating_sub(self.buf.len());
        self.buf.extend_from_slice(&bytes[..bytes.len().min(room)]);
    }

    /// Finish the current line. `None` means nothing was read since the last
    /// line, i.e. end of input.
    pub(crate) fn take(&mut self) -> Option<Line> {
        if !mem::replace(&mut self.pending, false) {
            return None;
        }
        if self.buf.last() == Some(&b'\r') && self.seen == self.buf.len() {
            self.buf.pop();
            self.seen -= 1;
        }
        let len = mem::take(&mut self.seen);
        let bytes = mem::take(&mut self.buf);
        if len > self.limit {
            return Some(Line::TooLong {
                len,
                limit: self.limit,
            });
        }
        Some(Line::Text(String::from_utf8_lossy(&bytes).into_owned()))
    }
}

pub(crate) fn next_line<R: BufRead>(
    reader: &mut R,
    scanner: &mut LineScanner,
) -> io::Result<Option<Line>> {
    loop {
        let (used, complete) = {
            let available = match reader.fill_buf() {
                Ok(available) => available,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            if available.is_empty() {
                return Ok(scanner.take());
            }
            scanner.feed(available)
        };
        reader.consume(used);
        if complete {
            return Ok(scanner.take());
        }
    }
}

/// Groups `key = value` lines into records. Shared by every delivery mode.
#[derive(Debug, Default)]
pub(crate) struct AdBuilder {
    current: ClassAd,
    line: usize,
}

impl AdBuilder {
    /// Feed one line. Returns a record when a blank line closes a non-empty one.
    pub(crate) fn push(&mut self, line: Line) -> Result<Option<ClassAd>, ParseError> {
        self.line += 1;
        let text = match line {
            Line::Text(text) => text,
            Line::TooLong { len, limit } => {
                return Err(ParseError::LineTooLong {
                    line: self.line,
                    len,
                    limit,
                })
            }
        };
        if text.trim().is_empty() {
            return Ok(self.close());
        }
        let Some((key, value)) = text.split_once('=') else {
            return Err(ParseError::MissingSeparator {
                line: self.line,
                text,
            });
        };
        let key = key.trim_matches(|c: char| c.is_whitespace() || c == '"');
        self.current.insert(key, Attribute::parse(value));
        Ok(None)
    }

    fn close(&mut self) -> Option<ClassAd> {
        if self.current.is_empty() {
            None
        } else {
            Some(mem::take(&mut self.current))
        }
    }

    /// Flush the trailing record at end of input.
    pub(crate) fn finish(mut self) -> Option<ClassAd> {
        self.close()
    }
}
