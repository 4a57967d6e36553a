//! Line reader that keeps line terminators.
//!
//! The batch grammar is defined over CRLF-terminated lines, but bodies are
//! byte-exact: a body's `Content-Length` counts its terminators, and the
//! terminator in front of a boundary delimiter belongs to the delimiter, not
//! to the body. [`LineReader`] therefore yields every line together with the
//! terminator it was read with.

use crate::error::Result;
use bytes::{Bytes, BytesMut};
use std::io::Read;

/// How a line ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    CrLf,
    Lf,
    Cr,
    /// Last line of the input, without terminator.
    None,
}

impl LineEnding {
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            LineEnding::CrLf => b"\r\n",
            LineEnding::Lf => b"\n",
            LineEnding::Cr => b"\r",
            LineEnding::None => b"",
        }
    }
}

/// One line of a batch body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    content: Bytes,
    ending: LineEnding,
    number: usize,
}

impl RawLine {
    pub fn new(content: impl Into<Bytes>, ending: LineEnding, number: usize) -> Self {
        RawLine {
            content: content.into(),
            ending,
            number,
        }
    }

    /// Line content without its terminator.
    pub fn content(&self) -> &Bytes {
        &self.content
    }

    pub fn ending(&self) -> LineEnding {
        self.ending
    }

    /// 1-based position in the input.
    pub fn number(&self) -> usize {
        self.number
    }

    /// Length including the terminator.
    pub fn len(&self) -> usize {
        self.content.len() + self.ending.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Content as text; invalid UTF-8 is replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.content).into_owned()
    }

    /// Whether the content is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.content.iter().all(u8::is_ascii_whitespace)
    }

    /// The same line without its terminator.
    pub(crate) fn without_ending(&self) -> RawLine {
        RawLine {
            content: self.content.clone(),
            ending: LineEnding::None,
            number: self.number,
        }
    }

    pub(crate) fn write_to(&self, buffer: &mut BytesMut) {
        buffer.extend_from_slice(&self.content);
        buffer.extend_from_slice(self.ending.as_bytes());
    }
}

/// Splits a byte buffer into [`RawLine`]s.
///
/// Recognizes `\r\n`, `\n` and a bare `\r`.
///
/// # Examples
///
/// ```
/// use odata_batch_axum::parser::{LineEnding, LineReader};
///
/// let lines: Vec<_> = LineReader::new("GET People HTTP/1.1\r\n\r\nbody").collect();
/// assert_eq!(lines.len(), 3);
/// assert_eq!(lines[0].ending(), LineEnding::CrLf);
/// assert_eq!(lines[2].ending(), LineEnding::None);
/// assert_eq!(lines[2].number(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct LineReader {
    buffer: Bytes,
    position: usize,
    line_number: usize,
}

impl LineReader {
    pub fn new(input: impl Into<Bytes>) -> Self {
        LineReader {
            buffer: input.into(),
            position: 0,
            line_number: 0,
        }
    }

    /// Read `source` to its end and wrap the result.
    ///
    /// # Errors
    ///
    /// Propagates the I/O error of the source.
    pub fn from_reader(mut source: impl Read) -> Result<Self> {
        let mut data = Vec::new();
        source.read_to_end(&mut data)?;
        Ok(Self::new(data))
    }
}

impl Iterator for LineReader {
    type Item = RawLine;

    fn next(&mut self) -> Option<RawLine> {
        if self.position >= self.buffer.len() {
            return None;
        }

        let rest = &self.buffer[self.position..];
        let (content_len, ending) = match rest.iter().position(|b| *b == b'\r' || *b == b'\n') {
            Some(i) if rest[i] == b'\n' => (i, LineEnding::Lf),
            Some(i) if rest.get(i + 1) == Some(&b'\n') => (i, LineEnding::CrLf),
            Some(i) => (i, LineEnding::Cr),
            None => (rest.len(), LineEnding::None),
        };

        let start = self.position;
        let content = self.buffer.slice(start..start + content_len);
        self.position = start + content_len + ending.as_bytes().len();
        self.line_number += 1;

        Some(RawLine::new(content, ending, self.line_number))
    }
}

/// Concatenate lines back into bytes.
pub fn join_lines(lines: &[RawLine]) -> Bytes {
    let mut buffer = BytesMut::with_capacity(lines.iter().map(RawLine::len).sum());
    for line in lines {
        line.write_to(&mut buffer);
    }
    buffer.freeze()
}
