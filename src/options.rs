//! Configuration options for reading and writing dictionary files.
//!
//! - [`ReadOptions`]: key normalization, duplicate-key policy and entry parsers
//! - [`WriteOptions`]: table representation, delimiters, trailing metadata and
//!   entry builders
//!
//! ## Examples
//!
//! ```rust
//! use dictfile::{CasePolicy, DuplicatePolicy, ReadOptions, TableFormat, WriteOptions};
//!
//! let read = ReadOptions::new()
//!     .with_case(CasePolicy::Lower)
//!     .with_duplicates(DuplicatePolicy::Overwrite);
//! assert_eq!(read.case, CasePolicy::Lower);
//!
//! let write = WriteOptions::new()
//!     .with_table_format(TableFormat::Binary)
//!     .with_timestamp(false);
//! assert!(!write.write_timestamp);
//! ```

use crate::entry::{EntryBuilder, EntryParser, EntryRegistry};
use crate::table_codec::Packing;
use std::sync::Arc;

/// Case normalization applied to every path segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CasePolicy {
    #[default]
    Sensitive,
    Lower,
    Upper,
}

impl CasePolicy {
    /// Normalizes one path segment. Applying it twice is the same as applying it once.
    #[must_use]
    pub fn apply(&self, segment: &str) -> String {
        match self {
            CasePolicy::Sensitive => segment.to_string(),
            CasePolicy::Lower => segment.to_lowercase(),
            CasePolicy::Upper => segment.to_uppercase(),
        }
    }
}

/// What to do when a path is defined twice in one file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Fail with [`Error::DuplicateKey`](crate::Error::DuplicateKey).
    #[default]
    Strict,
    /// Keep the last definition.
    Overwrite,
}

/// Where tables are stored when written.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TableFormat {
    /// A delimited block inside the dictionary file.
    #[default]
    Inline,
    /// A delimited text sibling file.
    Text,
    /// A raw binary sibling file described by a preamble.
    Binary,
}

impl TableFormat {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            TableFormat::Inline => "inline",
            TableFormat::Text => "text",
            TableFormat::Binary => "binary",
        }
    }
}

/// Delimiter between table cells on write. Reading accepts any of them.
///
/// # Examples
///
/// ```rust
/// use dictfile::Delimiter;
///
/// assert_eq!(Delimiter::Tab.as_str(), "\t");
/// assert_eq!(Delimiter::Comma.as_str(), ", ");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Delimiter {
    #[default]
    Tab,
    Comma,
    Space,
}

impl Delimiter {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Delimiter::Tab => "\t",
            Delimiter::Comma => ", ",
            Delimiter::Space => " ",
        }
    }
}

/// What to do with a value no entry builder claims.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum UnsupportedPolicy {
    /// Fail with [`Error::UnsupportedValue`](crate::Error::UnsupportedValue).
    #[default]
    Error,
    /// Write the value's `Display` form as a string.
    Stringify,
}

/// Options for reading dictionary files.
#[derive(Clone, Debug)]
pub struct ReadOptions {
    pub case: CasePolicy,
    pub separator: char,
    pub duplicates: DuplicatePolicy,
    /// Convert entry branches back into typed values after reading.
    pub parse_entries: bool,
    pub registry: EntryRegistry,
    pub parsers: Vec<Arc<dyn EntryParser>>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        ReadOptions {
            case: CasePolicy::default(),
            separator: '/',
            duplicates: DuplicatePolicy::default(),
            parse_entries: true,
            registry: EntryRegistry::default(),
            parsers: Vec::new(),
        }
    }
}

impl ReadOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_case(mut self, case: CasePolicy) -> Self {
        self.case = case;
        self
    }

    #[must_use]
    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    #[must_use]
    pub fn with_duplicates(mut self, duplicates: DuplicatePolicy) -> Self {
        self.duplicates = duplicates;
        self
    }

    /// Leaves entry branches as raw sub-dictionaries.
    #[must_use]
    pub fn raw_entries(mut self) -> Self {
        self.parse_entries = false;
        self
    }

    /// Replaces the default entry registry.
    #[must_use]
    pub fn with_registry(mut self, registry: EntryRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Adds a parser that is consulted before the registry.
    #[must_use]
    pub fn with_parser(mut self, parser: Arc<dyn EntryParser>) -> Self {
        self.parsers.push(parser);
        self
    }
}

/// Options for writing dictionary files.
#[derive(Clone, Debug)]
pub struct WriteOptions {
    pub table_format: TableFormat,
    pub delimiter: Delimiter,
    pub packing: Packing,
    pub write_comments: bool,
    pub write_timestamp: bool,
    pub unsupported: UnsupportedPolicy,
    pub registry: EntryRegistry,
    pub builders: Vec<Arc<dyn EntryBuilder>>,
}

impl Default for WriteOptions {
    fn default() -> Self {
        WriteOptions {
            table_format: TableFormat::default(),
            delimiter: Delimiter::default(),
            packing: Packing::default(),
            write_comments: true,
            write_timestamp: true,
            unsupported: UnsupportedPolicy::default(),
            registry: EntryRegistry::default(),
            builders: Vec::new(),
        }
    }
}

impl WriteOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_table_format(mut self, table_format: TableFormat) -> Self {
        self.table_format = table_format;
        self
    }

    #[must_use]
    pub fn with_delimiter(mut self, delimiter: Delimiter) -> Self {
        self.delimiter = delimiter;
        self
    }

    #[must_use]
    pub fn with_packing(mut self, packing: Packing) -> Self {
        self.packing = packing;
        self
    }

    #[must_use]
    pub fn with_comments(mut self, write_comments: bool) -> Self {
        self.write_comments = write_comments;
        self
    }

    #[must_use]
    pub fn with_timestamp(mut self, write_timestamp: bool) -> Self {
        self.write_timestamp = write_timestamp;
        self
    }

    #[must_use]
    pub fn with_unsupported(mut self, unsupported: UnsupportedPolicy) -> Self {
        self.unsupported = unsupported;
        self
    }

    #[must_use]
    pub fn with_registry(mut self, registry: EntryRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Adds a builder that is consulted before the registry.
    #[must_use]
    pub fn with_builder(mut self, builder: Arc<dyn EntryBuilder>) -> Self {
        self.builders.push(builder);
        self
    }
}
