//! Error types for dictionary files and their storage locations.
//!
//! Every failure is synchronous and surfaces unchanged at the top-level
//! read/write call.
//!
//! ## Error Categories
//!
//! - **Storage misuse**: opening a name twice, closing a name that is not open,
//!   asking a single-file location for anything but its default name
//! - **Format errors**: unparsable lines, unterminated table blocks, malformed
//!   escapes, external payloads whose size does not match their preamble
//! - **Duplicate keys**: a repeated path while reading in strict mode
//! - **Unsupported values**: no entry builder claims a value being written
//! - **Missing fields**: an entry branch lacks a field its parser requires
//!
//! ## Examples
//!
//! ```rust
//! use dictfile::{from_str, Error};
//!
//! let result = from_str("a\t1\na\t2\n");
//! assert!(matches!(result, Err(Error::DuplicateKey { .. })));
//! ```

use std::fmt;
use std::io;
use thiserror::Error;

/// Misuse of a storage [`Location`](crate::location::Location).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageMisuse {
    /// The same normalized name was opened twice without a close in between.
    #[error("'{0}' is already open")]
    AlreadyOpen(String),

    /// A name was closed (or written to) without being opened first.
    #[error("'{0}' is not open")]
    NotOpen(String),

    /// The endpoint does not accept the name: a non-default name for a single
    /// file, or a name that would step outside the location.
    #[error("illegal name '{0}' for this location")]
    IllegalName(String),

    /// An external entry needs a location, but the call was made on a bare stream.
    #[error("entry at '{0}' is stored externally and needs a storage location")]
    NoLocation(String),
}

/// Represents all possible errors raised while reading or writing dictionary files.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// IO error during reading or writing
    #[error("IO error: {0}")]
    Io(String),

    /// Storage location used incorrectly
    #[error("Storage misuse: {0}")]
    Storage(#[from] StorageMisuse),

    /// Unparsable line in a dictionary file
    #[error("Syntax error at line {line}: {msg}{context}")]
    Syntax {
        line: usize,
        msg: String,
        context: String,
    },

    /// Malformed data outside of line parsing (escapes, external payloads)
    #[error("Format error: {0}")]
    Format(String),

    /// Repeated path while reading in strict mode
    #[error("Duplicate key '{path}' at line {line}")]
    DuplicateKey { path: String, line: usize },

    /// No entry builder claims a value that has to be written
    #[error("Unsupported value at '{path}': {msg}")]
    UnsupportedValue { path: String, msg: String },

    /// An entry branch lacks a field its parser requires
    #[error("Missing field '{field}' in '{kind}' entry")]
    MissingField { kind: String, field: String },

    /// A dictionary path runs through a leaf value
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Custom error
    #[error("Error: {0}")]
    Custom(String),
}

impl Error {
    /// Creates a syntax error pointing at a line of the input.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dictfile::Error;
    ///
    /// let err = Error::syntax(10, "unterminated table block");
    /// assert!(err.to_string().contains("line 10"));
    /// ```
    pub fn syntax(line: usize, msg: &str) -> Self {
        Error::Syntax {
            line,
            msg: msg.to_string(),
            context: String::new(),
        }
    }

    /// Creates a syntax error that quotes the offending line.
    pub fn syntax_with_context(line: usize, msg: &str, context: &str) -> Self {
        Error::Syntax {
            line,
            msg: msg.to_string(),
            context: format!("\n  {}", context),
        }
    }

    /// Creates a format error without line information.
    pub fn format<T: fmt::Display>(msg: T) -> Self {
        Error::Format(msg.to_string())
    }

    pub fn duplicate_key(path: &str, line: usize) -> Self {
        Error::DuplicateKey {
            path: path.to_string(),
            line,
        }
    }

    pub fn unsupported_value(path: &str, msg: &str) -> Self {
        Error::UnsupportedValue {
            path: path.to_string(),
            msg: msg.to_string(),
        }
    }

    /// Creates a missing-field error for an entry branch of the given kind.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dictfile::Error;
    ///
    /// let err = Error::missing_field("table", "file_path");
    /// assert_eq!(err.to_string(), "Missing field 'file_path' in 'table' entry");
    /// ```
    pub fn missing_field(kind: &str, field: &str) -> Self {
        Error::MissingField {
            kind: kind.to_string(),
            field: field.to_string(),
        }
    }

    pub fn invalid_path(msg: &str) -> Self {
        Error::InvalidPath(msg.to_string())
    }

    /// Creates a custom error with a display message.
    pub fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Custom(msg.to_string())
    }

    /// Creates an I/O error for file reading/writing failures.
    pub fn io(msg: &str) -> Self {
        Error::Io(msg.to_string())
    }

    /// Returns `true` for the format-error category (syntax and payload errors).
    #[must_use]
    pub fn is_format_error(&self) -> bool {
        matches!(self, Error::Syntax { .. } | Error::Format(_))
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl serde::ser::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Custom(msg.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
