//! The dictionary file format.
//!
//! A dictionary file is line oriented UTF-8 text. Each line is one of:
//!
//! | Line                         | Meaning                                         |
//! |------------------------------|-------------------------------------------------|
//! | `path<TAB>value`             | entry: `value` stored at `path`                 |
//! | `path`                       | key of the inline table block that follows      |
//! | `# text`                     | free-text comment                               |
//! | `# table start`              | opens an inline table block                     |
//! | `# table end`                | closes it                                       |
//! | `//name`                     | pushes `name` onto the root-key stack           |
//! | `///`                        | pops one root-key level                         |
//! | `# Saved on 2024/01/31 12:00:00` | creation time                               |
//!
//! Paths are `/`-separated segments. Inside a segment `\\`, `\s` (space), `\t`,
//! `\n`, `\r`, `\/`, `\#` and `\uXXXX` are escapes, so a key never contains raw
//! whitespace and never starts with `#`. The effective path of an entry is the
//! root-key stack followed by its own path:
//!
//! ```text
//! //scan
//! rate	10
//! ///
//! name	probe
//! ```
//!
//! defines `scan/rate` and `name`.
//!
//! Values use the literal syntax of [`crate::literal`]. Inline table blocks
//! hold delimited rows (tabs, commas or runs of spaces) and may start with a
//! column-name comment:
//!
//! ```text
//! trace	table
//! # table start
//! # time	amp
//! 0.0	1.5
//! 0.1	1.7
//! # table end
//! ```
//!
//! Values that need more than one line (tables stored elsewhere, arrays, nested
//! containers) are written as *branches*: sub-entries whose `__type__` field
//! names the entry kind. See [`crate::entry`].

use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;

pub(crate) const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

static TABLE_START: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^#+\s*(table\s+(start|begin)|(start|begin)\s+table|table)[\s#]*$")
        .expect("table start pattern is valid")
});

static TABLE_END: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^#+\s*(table\s+(end|finish)|(end|finish)\s+table|end)[\s#]*$")
        .expect("table end pattern is valid")
});

static TIMESTAMP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^#\s*Saved on (\d{4}/\d{2}/\d{2} \d{2}:\d{2}:\d{2})\s*$")
        .expect("timestamp pattern is valid")
});

/// Returns `true` if a trimmed line opens an inline table block.
///
/// ```rust
/// use dictfile::format::is_table_start;
///
/// assert!(is_table_start("# table start"));
/// assert!(is_table_start("## Begin Table ##"));
/// assert!(!is_table_start("# table of results"));
/// ```
#[must_use]
pub fn is_table_start(line: &str) -> bool {
    TABLE_START.is_match(line)
}

/// Returns `true` if a trimmed line closes an inline table block.
#[must_use]
pub fn is_table_end(line: &str) -> bool {
    TABLE_END.is_match(line)
}

/// Extracts the creation time from a `# Saved on ...` line.
#[must_use]
pub fn parse_timestamp(line: &str) -> Option<NaiveDateTime> {
    let caps = TIMESTAMP.captures(line)?;
    NaiveDateTime::parse_from_str(&caps[1], TIMESTAMP_FORMAT).ok()
}

/// Returns `true` if a trimmed line is any of the marker comments.
#[must_use]
pub fn is_marker(line: &str) -> bool {
    is_table_start(line) || is_table_end(line) || TIMESTAMP.is_match(line)
}
