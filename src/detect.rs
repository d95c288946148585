//! Guessing what kind of file a stream holds.
//!
//! [`detect_binary`] looks for bytes that never occur in text files.
//! [`detect_text_kind`] classifies the first non-empty lines of a text file to
//! decide between a dictionary file and a plain table.
//!
//! Both functions restore the stream position, so the caller can go on to read
//! the stream from where it was.
//!
//! ```rust
//! use dictfile::detect::{detect_text_kind, TextKind};
//! use std::io::Cursor;
//!
//! let dict = Cursor::new("name\tprobe\nrate\t10\n//scan\nmode\tfast\n///\n");
//! assert_eq!(detect_text_kind(&mut dict.clone()).unwrap(), TextKind::Dict);
//!
//! let table = Cursor::new("1 2 3\n4 5 6\n7 8 9\n1 2 3\n4 5 6\n");
//! assert_eq!(detect_text_kind(&mut table.clone()).unwrap(), TextKind::Table);
//! ```

use crate::format::{is_table_end, is_table_start};
use crate::literal::is_numeric_token;
use crate::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};

/// Number of bytes inspected by [`detect_binary`].
pub const BINARY_SAMPLE_SIZE: usize = 4096;

/// Number of non-empty lines inspected by [`detect_text_kind`].
pub const TEXT_SAMPLE_LINES: usize = 20;

static DICT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*[^\s#/][^\s/]*(/[^\s/]+)*\s+\S").expect("valid regex")
});

static ROW_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*,\s*|\s+").expect("valid regex"));

/// Returns `true` if `sample` contains a byte that does not occur in text.
///
/// Text bytes are BEL, BS, TAB, LF, FF, CR, ESC and everything from space
/// upwards except DEL.
///
/// ```rust
/// use dictfile::detect::is_binary;
///
/// assert!(!is_binary(b"a\t1\r\n"));
/// assert!(is_binary(&[0x00, 0x01, 0x02]));
/// ```
#[must_use]
pub fn is_binary(sample: &[u8]) -> bool {
    sample
        .iter()
        .any(|&b| !matches!(b, 7 | 8 | 9 | 10 | 12 | 13 | 27 | 0x20..=0x7E | 0x80..=0xFF))
}

/// Reads up to [`BINARY_SAMPLE_SIZE`] bytes and checks them with [`is_binary`].
pub fn detect_binary<R: Read + Seek>(stream: &mut R) -> Result<bool> {
    let start = stream.stream_position()?;
    let mut sample = Vec::with_capacity(BINARY_SAMPLE_SIZE);
    stream.by_ref().take(BINARY_SAMPLE_SIZE as u64).read_to_end(&mut sample)?;
    stream.seek(SeekFrom::Start(start))?;
    let binary = is_binary(&sample);
    tracing::debug!(bytes = sample.len(), binary, "detected binary content");
    Ok(binary)
}

/// Outcome of [`detect_text_kind`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextKind {
    Dict,
    Table,
    /// Too little recognizable data; callers should fail fast.
    Unrecognized,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LineClass {
    Comment,
    Marker,
    DictEntry,
    NumericRow,
    Unrecognized,
}

fn classify(line: &str) -> LineClass {
    if line.starts_with('#') {
        if is_table_start(line) || is_table_end(line) {
            return LineClass::Marker;
        }
        return LineClass::Comment;
    }
    if ROW_SPLIT.split(line).all(is_numeric_token) {
        return LineClass::NumericRow;
    }
    if line.starts_with("//") || DICT_LINE.is_match(line) {
        return LineClass::DictEntry;
    }
    LineClass::Unrecognized
}

/// Decides between dictionary and table from per-class line counts.
fn decide(markers: usize, dict_lines: usize, numeric_lines: usize, unrecognized: usize) -> TextKind {
    let data = dict_lines + numeric_lines;
    if markers > 0 && data > 2 {
        TextKind::Dict
    } else if data < 5 && data < 2 * unrecognized {
        TextKind::Unrecognized
    } else if dict_lines > numeric_lines {
        TextKind::Dict
    } else {
        TextKind::Table
    }
}

/// Classifies up to [`TEXT_SAMPLE_LINES`] non-empty lines.
pub fn detect_text_kind<R: Read + Seek>(stream: &mut R) -> Result<TextKind> {
    let start = stream.stream_position()?;
    let (mut markers, mut dict_lines, mut numeric_lines, mut unrecognized) = (0, 0, 0, 0);
    {
        let mut reader = BufReader::new(stream.by_ref());
        let mut seen = 0;
        let mut buf = Vec::new();
        while seen < TEXT_SAMPLE_LINES {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            let text = String::from_utf8_lossy(&buf);
            let line = text.trim();
            if line.is_empty() {
                continue;
            }
            seen += 1;
            match classify(line) {
                LineClass::Comment => {}
                LineClass::Marker => markers += 1,
                LineClass::DictEntry => dict_lines += 1,
                LineClass::NumericRow => numeric_lines += 1,
                LineClass::Unrecognized => unrecognized += 1,
            }
        }
    }
    stream.seek(SeekFrom::Start(start))?;
    let kind = decide(markers, dict_lines, numeric_lines, unrecognized);
    tracing::debug!(markers, dict_lines, numeric_lines, unrecognized, ?kind, "detected text kind");
    Ok(kind)
}
