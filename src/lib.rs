//! # dictfile
//!
//! Human-readable hierarchical dictionary files.
//!
//! A dictionary file stores an ordered tree of values as one `path<TAB>value`
//! line per leaf. Values that do not fit on a line are written as *entries*:
//! small branches with a `__type__` discriminator, optionally pointing at sibling
//! files (text or binary tables, arrays, raw bytes) kept next to the main file.
//!
//! ## Key Features
//!
//! - **Readable**: one line per value, `#` comments, inline table blocks
//! - **Ordered**: insertion order is kept on write and read
//! - **Pluggable**: an explicit [`EntryRegistry`] decides how non-trivial values
//!   are stored; callers add their own kinds per call
//! - **Storage agnostic**: sibling artifacts go through a [`Location`](location::Location),
//!   which maps names to files
//!
//! ## Quick Start
//!
//! ```rust
//! use dictfile::{dict, from_str, to_string_with_options, Value, WriteOptions};
//!
//! let data = dict! {
//!     "name" => "probe",
//!     "scan/rate" => 10,
//!     "scan/window" => 0.5,
//! };
//!
//! let options = WriteOptions::new().with_timestamp(false);
//! let text = to_string_with_options(&data, &options).unwrap();
//! assert_eq!(text, "name\tprobe\nscan/rate\t10\nscan/window\t0.5\n");
//!
//! let file = from_str(&text).unwrap();
//! assert_eq!(file.data.get("scan/rate"), Some(&Value::from(10)));
//! ```
//!
//! ### Tables
//!
//! ```rust
//! use dictfile::{from_str, to_string_with_options, Dictionary, Table, Value, WriteOptions};
//!
//! let mut data = Dictionary::new();
//! let table = Table::from_f64_rows(&[vec![0.0, 1.5], vec![0.1, 1.7]]).with_columns(["t", "amp"]);
//! data.set("trace", Value::Table(table.clone()));
//!
//! let text = to_string_with_options(&data, &WriteOptions::new().with_timestamp(false)).unwrap();
//! let back = from_str(&text).unwrap();
//! assert_eq!(back.data.get("trace").and_then(Value::as_table), Some(&table));
//! ```
//!
//! Tables written with [`TableFormat::Text`] or [`TableFormat::Binary`] go to
//! sibling files; use [`save_file`] and [`load_file`] for those.

pub mod de;
pub mod detect;
pub mod dictionary;
pub mod entry;
pub mod error;
pub mod format;
pub mod literal;
pub mod location;
mod macros;
pub mod options;
pub mod ser;
pub mod table_codec;
pub mod value;

pub use dictionary::{Dictionary, KeyPolicy, PathLike};
pub use entry::{EntryBuilder, EntryKind, EntryParser, EntryRegistry};
pub use error::{Error, Result, StorageMisuse};
pub use options::{
    CasePolicy, Delimiter, DuplicatePolicy, ReadOptions, TableFormat, UnsupportedPolicy,
    WriteOptions,
};
pub use ser::to_value;
pub use value::{ArrayData, Dtype, NdArray, Number, Table, Value};

use chrono::NaiveDateTime;
use detect::{detect_binary, detect_text_kind, TextKind};
use location::{DataKind, Location, LocationFile, LocationName, OpenMode, PrefixedFileLocation};
use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::Path;
use table_codec::{ColumnSpec, DtypePolicy, TableCodec, TextTableCodec};

/// A dictionary together with the file-level metadata read or written with it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DictFile {
    pub data: Dictionary,
    /// Free-text comments, in file order.
    pub comments: Vec<String>,
    /// Time recorded in the `# Saved on` line.
    pub creation_time: Option<NaiveDateTime>,
}

impl DictFile {
    #[must_use]
    pub fn new(data: Dictionary) -> Self {
        DictFile {
            data,
            ..DictFile::default()
        }
    }

    #[must_use]
    pub fn with_comments<I, S>(mut self, comments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.comments = comments.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_creation_time(mut self, creation_time: NaiveDateTime) -> Self {
        self.creation_time = Some(creation_time);
        self
    }

    /// Renders the file, comments and timestamp included.
    ///
    /// # Errors
    ///
    /// Fails like [`to_string_with_options`].
    pub fn write_to_string(&self, options: &WriteOptions) -> Result<String> {
        ser::write_document(&self.data, &self.comments, self.creation_time, options, None)
    }
}

impl From<Dictionary> for DictFile {
    fn from(data: Dictionary) -> Self {
        DictFile::new(data)
    }
}

/// What [`load_generic`] found in a file.
#[derive(Clone, Debug, PartialEq)]
pub enum LoadedFile {
    Dict(DictFile),
    Table(Table),
}

/// Writes a dictionary with default options.
///
/// # Errors
///
/// Returns [`Error::UnsupportedValue`] for values no builder claims, and
/// [`StorageMisuse::NoLocation`] for entries that need sibling files.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn to_string(data: &Dictionary) -> Result<String> {
    to_string_with_options(data, &WriteOptions::default())
}

/// Writes a dictionary with custom options.
///
/// # Examples
///
/// ```rust
/// use dictfile::{to_string_with_options, Delimiter, Table, TableFormat, Value, WriteOptions, dict};
///
/// let data = dict!("t" => Table::from_f64_rows(&[vec![1.0, 2.0]]));
/// let options = WriteOptions::new()
///     .with_table_format(TableFormat::Inline)
///     .with_delimiter(Delimiter::Comma)
///     .with_timestamp(false);
/// let text = to_string_with_options(&data, &options).unwrap();
/// assert_eq!(
///     text,
///     "t/__type__\ttable\nt/format\tinline\nt/data\ttable\n# table start\n1.0, 2.0\n# table end\n"
/// );
/// ```
///
/// # Errors
///
/// See [`to_string`].
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn to_string_with_options(data: &Dictionary, options: &WriteOptions) -> Result<String> {
    ser::write_document(data, &[], None, options, None)
}

/// Writes a dictionary to a stream.
///
/// # Errors
///
/// Fails like [`to_string`], or if writing to the stream fails.
pub fn to_writer<W: io::Write>(writer: W, data: &Dictionary) -> Result<()> {
    to_writer_with_options(writer, data, &WriteOptions::default())
}

/// Writes a dictionary to a stream with custom options.
///
/// # Errors
///
/// Fails like [`to_string`], or if writing to the stream fails.
pub fn to_writer_with_options<W: io::Write>(
    mut writer: W,
    data: &Dictionary,
    options: &WriteOptions,
) -> Result<()> {
    let text = to_string_with_options(data, options)?;
    writer.write_all(text.as_bytes())?;
    Ok(())
}

/// Reads a dictionary file from text.
///
/// # Examples
///
/// ```rust
/// use dictfile::{from_str, Value};
///
/// let file = from_str("# calibration run\n//g\nk\tv\n///\nk2\t[1, 2]\n").unwrap();
/// assert_eq!(file.data.get("g/k"), Some(&Value::from("v")));
/// assert_eq!(file.comments, vec!["calibration run"]);
/// ```
///
/// # Errors
///
/// Returns [`Error::Syntax`] for unparsable lines, [`Error::DuplicateKey`] for
/// repeated paths, and [`StorageMisuse::NoLocation`] for entries stored in
/// sibling files.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn from_str(text: &str) -> Result<DictFile> {
    from_str_with_options(text, &ReadOptions::default())
}

/// Reads a dictionary file from text with custom options.
///
/// # Errors
///
/// See [`from_str`].
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn from_str_with_options(text: &str, options: &ReadOptions) -> Result<DictFile> {
    de::read_document(text, options, None)
}

/// Reads a dictionary file from a stream.
///
/// # Errors
///
/// Fails like [`from_str`], or if the stream is not valid UTF-8.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn from_reader<R: io::Read>(reader: R) -> Result<DictFile> {
    from_reader_with_options(reader, &ReadOptions::default())
}

/// Reads a dictionary file from a stream with custom options.
///
/// # Errors
///
/// See [`from_reader`].
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn from_reader_with_options<R: io::Read>(mut reader: R, options: &ReadOptions) -> Result<DictFile> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    from_str_with_options(&text, options)
}

/// Reads the artifact `name` of `location`, resolving sibling entries through it.
///
/// # Errors
///
/// Storage errors from the location, plus everything [`from_str`] reports.
pub fn load_dict(
    location: &mut dyn Location,
    name: &LocationName,
    options: &ReadOptions,
) -> Result<DictFile> {
    let mut text = String::new();
    {
        let mut file = LocationFile::open(location, name.clone(), OpenMode::Read, DataKind::Text)?;
        file.read_to_string(&mut text)?;
        file.close()?;
    }
    tracing::debug!(name = %name, bytes = text.len(), "loaded dictionary");
    de::read_document(&text, options, Some(location))
}

/// Writes `file` as the artifact `name` of `location`.
///
/// Sibling artifacts are written first; the main artifact only once everything
/// rendered successfully.
///
/// # Errors
///
/// Storage errors from the location, plus everything [`to_string`] reports.
pub fn save_dict(
    location: &mut dyn Location,
    name: &LocationName,
    file: &DictFile,
    options: &WriteOptions,
) -> Result<()> {
    let text = ser::write_document(
        &file.data,
        &file.comments,
        file.creation_time,
        options,
        Some(&mut *location),
    )?;
    let mut out = LocationFile::open(location, name.clone(), OpenMode::Write, DataKind::Text)?;
    out.write_all(text.as_bytes())?;
    out.close()?;
    tracing::debug!(name = %name, bytes = text.len(), "saved dictionary");
    Ok(())
}

/// Reads a dictionary file whose sibling artifacts share its stem as prefix.
///
/// # Errors
///
/// See [`load_dict`].
pub fn load_file(path: impl AsRef<Path>, options: &ReadOptions) -> Result<DictFile> {
    let mut location = PrefixedFileLocation::new(path);
    load_dict(&mut location, &LocationName::default(), options)
}

/// Writes a dictionary file, placing sibling artifacts next to it.
///
/// For `dir/run.dict`, an external table at `scan/trace` lands in
/// `dir/run_scan_trace.dat`.
///
/// # Examples
///
/// ```rust
/// use dictfile::{load_file, save_file, DictFile, ReadOptions, Table, TableFormat, Value, WriteOptions, dict};
///
/// let dir = tempfile::tempdir().unwrap();
/// let path = dir.path().join("run.dict");
/// let table = Table::from_f64_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]);
/// let file = DictFile::new(dict!("trace" => table.clone()));
///
/// save_file(&path, &file, &WriteOptions::new().with_table_format(TableFormat::Binary)).unwrap();
/// assert!(dir.path().join("run_trace.bin").exists());
///
/// let back = load_file(&path, &ReadOptions::default()).unwrap();
/// assert_eq!(back.data.get("trace").and_then(Value::as_table).map(Table::shape), Some((2, 2)));
/// ```
///
/// # Errors
///
/// See [`save_dict`].
pub fn save_file(path: impl AsRef<Path>, file: &DictFile, options: &WriteOptions) -> Result<()> {
    let mut location = PrefixedFileLocation::new(path);
    save_dict(&mut location, &LocationName::default(), file, options)
}

/// Loads a file that is either a dictionary file or a plain delimited table.
///
/// # Errors
///
/// Returns [`Error::Format`] for binary content and for text that is neither a
/// dictionary nor a table.
pub fn load_generic(path: impl AsRef<Path>, options: &ReadOptions) -> Result<LoadedFile> {
    let path = path.as_ref();
    let mut stream = BufReader::new(File::open(path)?);
    if detect_binary(&mut stream)? {
        return Err(Error::format(format!(
            "'{}' holds binary data, not a dictionary or table",
            path.display()
        )));
    }
    match detect_text_kind(&mut stream)? {
        TextKind::Dict => {
            drop(stream);
            load_file(path, options).map(LoadedFile::Dict)
        }
        TextKind::Table => {
            let data = TextTableCodec::default().read_table(
                &mut stream,
                &ColumnSpec::Any,
                DtypePolicy::Infer,
            )?;
            if !data.corrupted.is_empty() {
                tracing::warn!(path = %path.display(), rows = ?data.corrupted, "skipped corrupted rows");
            }
            let mut table = Table::new(data.rows);
            if !data.columns.is_empty() {
                table = table.with_columns(data.columns);
            }
            Ok(LoadedFile::Table(table))
        }
        TextKind::Unrecognized => Err(Error::format(format!(
            "'{}' is neither a dictionary nor a table",
            path.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Probe {
        name: String,
        gain: f64,
        channels: Vec<u32>,
    }

    fn no_timestamp() -> WriteOptions {
        WriteOptions::new().with_timestamp(false)
    }

    #[test]
    fn test_round_trip_primitives() {
        let data = dict! {
            "flag" => true,
            "count" => 3,
            "ratio" => 0.25,
            "label" => "two words",
            "nested/deep/value" => "x",
        };
        let text = to_string_with_options(&data, &no_timestamp()).unwrap();
        assert_eq!(from_str(&text).unwrap().data, data);
    }

    #[test]
    fn test_serde_struct_round_trip() {
        let probe = Probe {
            name: "p1".to_string(),
            gain: 2.5,
            channels: vec![1, 2, 3],
        };
        let value = to_value(&probe).unwrap();
        let mut data = Dictionary::new();
        data.set("probe", value.clone());

        let text = to_string_with_options(&data, &no_timestamp()).unwrap();
        assert!(text.contains("probe/channels\t[1, 2, 3]\n"));
        assert_eq!(from_str(&text).unwrap().data.get("probe"), Some(&value));
    }

    #[test]
    fn test_comments_and_timestamp() {
        let ts = NaiveDateTime::parse_from_str("2024/01/31 12:00:00", "%Y/%m/%d %H:%M:%S").unwrap();
        let file = DictFile::new(dict!("a" => 1))
            .with_comments(["first", "second line"])
            .with_creation_time(ts);
        let text = file.write_to_string(&WriteOptions::default()).unwrap();
        assert!(text.ends_with("# Saved on 2024/01/31 12:00:00\n"));

        let back = from_str(&text).unwrap();
        assert_eq!(back, file);
    }

    #[test]
    fn test_writer_and_reader() {
        let data = dict!("a" => 1);
        let mut buffer = Vec::new();
        to_writer_with_options(&mut buffer, &data, &no_timestamp()).unwrap();
        assert_eq!(buffer, b"a\t1\n");
        assert_eq!(from_reader(buffer.as_slice()).unwrap().data, data);
    }

    #[test]
    fn test_external_table_needs_location() {
        let data = dict!("t" => Table::from_f64_rows(&[vec![1.0]]));
        let options = no_timestamp().with_table_format(TableFormat::Text);
        let err = to_string_with_options(&data, &options).unwrap_err();
        assert!(matches!(err, Error::Storage(StorageMisuse::NoLocation(_))));
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.dict");
        let table = Table::from_f64_rows(&[vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]])
            .with_columns(["x", "y"]);
        let file = DictFile::new(dict!("scan/trace" => table.clone(), "name" => "probe"));
        let options = no_timestamp().with_table_format(TableFormat::Text);

        save_file(&path, &file, &options).unwrap();
        assert!(dir.path().join("run_scan_trace.dat").exists());

        let back = load_file(&path, &ReadOptions::default()).unwrap();
        assert_eq!(back.data.get("scan/trace").and_then(Value::as_table), Some(&table));
        assert_eq!(back.data.get("name"), Some(&Value::from("probe")));
    }

    #[test]
    fn test_load_generic() {
        let dir = tempfile::tempdir().unwrap();

        let dict_path = dir.path().join("settings.dict");
        std::fs::write(&dict_path, "a\t1\nb\t2\nc/d\t3\ne\tfour\nf\t5\n").unwrap();
        match load_generic(&dict_path, &ReadOptions::default()).unwrap() {
            LoadedFile::Dict(file) => assert_eq!(file.data.get("c/d"), Some(&Value::from(3))),
            other => panic!("expected a dictionary, got {:?}", other),
        }

        let table_path = dir.path().join("points.txt");
        let rows: String = (0..10).map(|i| format!("{}\t{}\n", i, i * 2)).collect();
        std::fs::write(&table_path, rows).unwrap();
        match load_generic(&table_path, &ReadOptions::default()).unwrap() {
            LoadedFile::Table(table) => assert_eq!(table.shape(), (10, 2)),
            other => panic!("expected a table, got {:?}", other),
        }

        let binary_path = dir.path().join("blob.bin");
        std::fs::write(&binary_path, [0u8, 1, 2, 3]).unwrap();
        assert!(load_generic(&binary_path, &ReadOptions::default())
            .unwrap_err()
            .is_format_error());

        let prose_path = dir.path().join("notes.txt");
        std::fs::write(&prose_path, "Hello,\n\nnothing_here\n...\n").unwrap();
        assert!(load_generic(&prose_path, &ReadOptions::default())
            .unwrap_err()
            .is_format_error());
    }
}
