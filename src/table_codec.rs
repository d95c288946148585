//! Reading and writing table payloads stored outside the dictionary file.
//!
//! Two codecs are provided:
//!
//! - [`TextTableCodec`]: delimited rows with an optional `# name\tname` header
//! - [`BinaryTableCodec`]: raw little-endian numbers described by a
//!   [`BinaryPreamble`] that is stored in the dictionary next to the file name
//!
//! ```rust
//! use dictfile::table_codec::{ColumnSpec, DtypePolicy, TableCodec, TextTableCodec};
//! use dictfile::{Delimiter, Value};
//!
//! let codec = TextTableCodec::new(Delimiter::Tab);
//! let rows = vec![vec![Value::from(1), Value::from(2.5)]];
//! let mut buf = Vec::new();
//! codec.write_table(&mut buf, &rows, &["x".to_string(), "y".to_string()]).unwrap();
//! assert_eq!(String::from_utf8(buf.clone()).unwrap(), "# x\ty\n1\t2.5\n");
//!
//! let data = codec.read_table(&mut buf.as_slice(), &ColumnSpec::Any, DtypePolicy::Infer).unwrap();
//! assert_eq!(data.columns, vec!["x", "y"]);
//! assert_eq!(data.rows, rows);
//! ```

use crate::literal::{is_numeric_token, parse_cell, split_row, unescape_text, write_cell};
use crate::{Delimiter, Dictionary, Dtype, Error, Number, Result, Value};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Element order of a binary table payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Packing {
    /// Row after row.
    #[default]
    Flatten,
    /// Column after column.
    Transposed,
}

impl Packing {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Packing::Flatten => "flatten",
            Packing::Transposed => "transposed",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "flatten" => Some(Packing::Flatten),
            "transposed" => Some(Packing::Transposed),
            _ => None,
        }
    }
}

/// Rows read back from a table payload.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct TableData {
    pub rows: Vec<Vec<Value>>,
    pub columns: Vec<String>,
    /// 1-based line numbers of rows that were skipped because they did not parse.
    pub corrupted: Vec<usize>,
}

/// What the reader knows about the columns ahead of time.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum ColumnSpec {
    /// Take the width from the first row.
    #[default]
    Any,
    Count(usize),
    Names(Vec<String>),
}

impl ColumnSpec {
    fn width(&self) -> Option<usize> {
        match self {
            ColumnSpec::Any => None,
            ColumnSpec::Count(n) => Some(*n),
            ColumnSpec::Names(names) => Some(names.len()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DtypePolicy {
    /// Keep each cell as parsed.
    #[default]
    Infer,
    /// Force every cell to a float; rows with non-numeric cells are corrupted.
    Float,
}

pub trait TableCodec {
    fn read_table(
        &self,
        reader: &mut dyn Read,
        columns: &ColumnSpec,
        dtype: DtypePolicy,
    ) -> Result<TableData>;

    fn write_table(&self, writer: &mut dyn Write, rows: &[Vec<Value>], columns: &[String])
        -> Result<()>;
}

/// Delimited text rows.
#[derive(Clone, Copy, Debug, Default)]
pub struct TextTableCodec {
    pub delimiter: Delimiter,
}

impl TextTableCodec {
    #[must_use]
    pub const fn new(delimiter: Delimiter) -> Self {
        TextTableCodec { delimiter }
    }
}

/// Parses a comment as a column header, unless it looks like data.
pub(crate) fn header_names(comment: &str) -> Result<Option<Vec<String>>> {
    let tokens = split_row(comment)?;
    if tokens.is_empty() || tokens.iter().all(|t| is_numeric_token(t)) {
        return Ok(None);
    }
    let names = tokens
        .iter()
        .map(|token| match parse_cell(token)? {
            Value::String(s) => Ok(s),
            other => Ok(other.to_string()),
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Some(names))
}

fn to_float(value: Value) -> Option<Value> {
    match value {
        Value::Number(Number::Integer(i)) => Some(Value::from(i as f64)),
        Value::Number(_) => Some(value),
        Value::String(s) if s.is_empty() => Some(Value::from(f64::NAN)),
        _ => None,
    }
}

impl TableCodec for TextTableCodec {
    fn read_table(
        &self,
        reader: &mut dyn Read,
        columns: &ColumnSpec,
        dtype: DtypePolicy,
    ) -> Result<TableData> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;

        let mut data = TableData::default();
        let mut header: Option<Vec<String>> = None;
        let mut width = columns.width();

        for (index, line) in text.lines().enumerate() {
            let line_num = index + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Some(comment) = trimmed.strip_prefix('#') {
                if data.rows.is_empty() && header.is_none() {
                    header = header_names(&unescape_text(comment.trim())?)?;
                }
                continue;
            }

            let parsed = split_row(trimmed).and_then(|cells| {
                cells.iter().map(|cell| parse_cell(cell)).collect::<Result<Vec<_>>>()
            });
            let row = match (parsed, dtype) {
                (Ok(row), DtypePolicy::Infer) => Some(row),
                (Ok(row), DtypePolicy::Float) => row.into_iter().map(to_float).collect(),
                (Err(_), _) => None,
            };
            match row {
                Some(row) if width.map_or(true, |w| w == row.len()) => {
                    width.get_or_insert(row.len());
                    data.rows.push(row);
                }
                _ => {
                    tracing::debug!(line = line_num, "skipping corrupted table row");
                    data.corrupted.push(line_num);
                }
            }
        }

        if !data.corrupted.is_empty() {
            tracing::warn!(count = data.corrupted.len(), "table rows skipped while reading");
        }

        data.columns = match (columns, header) {
            (ColumnSpec::Names(names), _) => names.clone(),
            (_, Some(names)) if width.map_or(true, |w| w == names.len()) => names,
            _ => Vec::new(),
        };
        Ok(data)
    }

    fn write_table(
        &self,
        writer: &mut dyn Write,
        rows: &[Vec<Value>],
        columns: &[String],
    ) -> Result<()> {
        let mut output = String::new();
        if !columns.is_empty() {
            output.push_str("# ");
            write_row(&mut output, columns.iter().map(|c| Value::String(c.clone())), self.delimiter)?;
        }
        for row in rows {
            write_row(&mut output, row.iter().cloned(), self.delimiter)?;
        }
        writer.write_all(output.as_bytes())?;
        Ok(())
    }
}

/// Writes one delimited row, terminated by a newline.
pub(crate) fn write_row<I>(output: &mut String, cells: I, delimiter: Delimiter) -> Result<()>
where
    I: IntoIterator<Item = Value>,
{
    for (i, cell) in cells.into_iter().enumerate() {
        if i > 0 {
            output.push_str(delimiter.as_str());
        }
        write_cell(output, &cell)?;
    }
    output.push('\n');
    Ok(())
}

/// Shape and element type of a binary table payload.
///
/// # Examples
///
/// ```rust
/// use dictfile::table_codec::{BinaryPreamble, Packing};
/// use dictfile::Table;
///
/// let table = Table::from_f64_rows(&[vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]);
/// let preamble = BinaryPreamble::for_table(&table, Packing::Flatten).unwrap();
/// assert_eq!((preamble.nrows, preamble.ncols), (3, 2));
///
/// let dict = preamble.to_dict();
/// assert_eq!(dict.get("packing").and_then(|v| v.as_str()), Some("flatten"));
/// assert_eq!(BinaryPreamble::from_dict(&dict).unwrap(), preamble);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BinaryPreamble {
    pub dtype: Dtype,
    pub nrows: usize,
    pub ncols: usize,
    pub packing: Packing,
}

impl BinaryPreamble {
    /// Describes a numeric table; `None` if any cell is not a number.
    #[must_use]
    pub fn for_table(table: &crate::Table, packing: Packing) -> Option<Self> {
        let dtype = Dtype::infer(table.rows.iter().flatten())?;
        let (nrows, ncols) = table.shape();
        Some(BinaryPreamble {
            dtype,
            nrows,
            ncols,
            packing,
        })
    }

    /// Number of stored cells; a format error if the declared shape overflows.
    pub fn cell_count(&self) -> Result<usize> {
        self.nrows.checked_mul(self.ncols).ok_or_else(|| {
            Error::format(format!(
                "shape mismatch: {}x{} cells overflow",
                self.nrows, self.ncols
            ))
        })
    }

    pub fn byte_len(&self) -> Result<usize> {
        self.cell_count()?
            .checked_mul(self.dtype.item_size())
            .ok_or_else(|| {
                Error::format(format!(
                    "shape mismatch: {}x{} {} overflows the payload size",
                    self.nrows,
                    self.ncols,
                    self.dtype.tag()
                ))
            })
    }

    #[must_use]
    pub fn to_dict(&self) -> Dictionary {
        let mut dict = Dictionary::new();
        dict.set("dtype", Value::from(self.dtype.tag()));
        dict.set("nrows", Value::from(self.nrows));
        dict.set("ncols", Value::from(self.ncols));
        dict.set("packing", Value::from(self.packing.as_str()));
        dict
    }

    pub fn from_dict(dict: &Dictionary) -> Result<Self> {
        let field = |name: &str| {
            dict.get(name)
                .ok_or_else(|| Error::missing_field("table", &format!("preamble/{}", name)))
        };
        let count = |name: &str| -> Result<usize> {
            field(name)?
                .as_i64()
                .and_then(|n| usize::try_from(n).ok())
                .ok_or_else(|| Error::format(format!("preamble field '{}' is not a count", name)))
        };
        let dtype_tag = field("dtype")?
            .as_str()
            .ok_or_else(|| Error::format("preamble dtype is not a string"))?;
        let dtype = Dtype::from_tag(dtype_tag)
            .ok_or_else(|| Error::format(format!("unknown dtype '{}'", dtype_tag)))?;
        let packing = match dict.get("packing") {
            None => Packing::default(),
            Some(value) => value
                .as_str()
                .and_then(Packing::from_name)
                .ok_or_else(|| Error::format(format!("unknown packing '{}'", value)))?,
        };
        let preamble = BinaryPreamble {
            dtype,
            nrows: count("nrows")?,
            ncols: count("ncols")?,
            packing,
        };
        preamble.byte_len()?;
        Ok(preamble)
    }
}

/// Raw little-endian numbers laid out according to a [`BinaryPreamble`].
#[derive(Clone, Copy, Debug)]
pub struct BinaryTableCodec {
    pub preamble: BinaryPreamble,
}

impl BinaryTableCodec {
    #[must_use]
    pub const fn new(preamble: BinaryPreamble) -> Self {
        BinaryTableCodec { preamble }
    }

    /// Index into row-major cells for the n-th stored element.
    fn cell_index(&self, n: usize) -> (usize, usize) {
        let BinaryPreamble { nrows, ncols, packing, .. } = self.preamble;
        match packing {
            Packing::Flatten => (n / ncols.max(1), n % ncols.max(1)),
            Packing::Transposed => (n % nrows.max(1), n / nrows.max(1)),
        }
    }
}

/// Writes one number with the given element type.
pub(crate) fn write_number(writer: &mut dyn Write, dtype: Dtype, value: &Value) -> Result<()> {
    let number = match value {
        Value::Number(n) => n,
        other => {
            return Err(Error::unsupported_value(
                "<binary payload>",
                &format!("{} cannot be stored as {}", other.kind_name(), dtype.tag()),
            ))
        }
    };
    match dtype {
        Dtype::Int64 => {
            let i = number
                .as_i64()
                .ok_or_else(|| Error::format(format!("{} is not an integer", number)))?;
            writer.write_i64::<LittleEndian>(i)?;
        }
        Dtype::Float64 => writer.write_f64::<LittleEndian>(number.as_f64())?,
        Dtype::Complex128 => {
            let (re, im) = number.as_complex();
            writer.write_f64::<LittleEndian>(re)?;
            writer.write_f64::<LittleEndian>(im)?;
        }
    }
    Ok(())
}

/// Reads one number with the given element type.
pub(crate) fn read_number(reader: &mut dyn Read, dtype: Dtype) -> Result<Number> {
    Ok(match dtype {
        Dtype::Int64 => Number::Integer(reader.read_i64::<LittleEndian>()?),
        Dtype::Float64 => Number::Float(reader.read_f64::<LittleEndian>()?),
        Dtype::Complex128 => {
            let re = reader.read_f64::<LittleEndian>()?;
            let im = reader.read_f64::<LittleEndian>()?;
            Number::Complex(re, im)
        }
    })
}

impl TableCodec for BinaryTableCodec {
    fn read_table(
        &self,
        reader: &mut dyn Read,
        columns: &ColumnSpec,
        dtype: DtypePolicy,
    ) -> Result<TableData> {
        let preamble = self.preamble;
        if let Some(width) = columns.width() {
            if width != preamble.ncols {
                return Err(Error::format(format!(
                    "expected {} columns, preamble declares {}",
                    width, preamble.ncols
                )));
            }
        }

        let byte_len = preamble.byte_len()?;
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        if bytes.len() != byte_len {
            return Err(Error::format(format!(
                "shape mismatch: preamble declares {}x{} {} ({} bytes), payload has {} bytes",
                preamble.nrows,
                preamble.ncols,
                preamble.dtype.tag(),
                byte_len,
                bytes.len()
            )));
        }

        let mut rows = Vec::new();
        rows.try_reserve_exact(preamble.nrows).map_err(|_| {
            Error::format(format!("shape mismatch: cannot hold {} rows", preamble.nrows))
        })?;
        rows.resize(preamble.nrows, vec![Value::Null; preamble.ncols]);
        let mut cursor = bytes.as_slice();
        for n in 0..preamble.cell_count()? {
            let number = read_number(&mut cursor, preamble.dtype)?;
            let (r, c) = self.cell_index(n);
            rows[r][c] = match (dtype, number) {
                (DtypePolicy::Float, Number::Integer(i)) => Value::from(i as f64),
                (_, number) => Value::Number(number),
            };
        }

        Ok(TableData {
            rows,
            columns: match columns {
                ColumnSpec::Names(names) => names.clone(),
                _ => Vec::new(),
            },
            corrupted: Vec::new(),
        })
    }

    fn write_table(
        &self,
        writer: &mut dyn Write,
        rows: &[Vec<Value>],
        _columns: &[String],
    ) -> Result<()> {
        let preamble = self.preamble;
        if rows.len() != preamble.nrows || rows.iter().any(|row| row.len() != preamble.ncols) {
            return Err(Error::format(format!(
                "shape mismatch: table does not match preamble {}x{}",
                preamble.nrows, preamble.ncols
            )));
        }
        let mut buf = Vec::with_capacity(preamble.byte_len()?);
        for n in 0..preamble.cell_count()? {
            let (r, c) = self.cell_index(n);
            write_number(&mut buf, preamble.dtype, &rows[r][c])?;
        }
        writer.write_all(&buf)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Table;

    fn sample() -> Table {
        Table::from_f64_rows(&[vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]])
    }

    #[test]
    fn test_text_reads_mixed_delimiters() {
        let input = "# a, b\n1, 2\n3\t4\n\n5   6\n";
        let data = TextTableCodec::default()
            .read_table(&mut input.as_bytes(), &ColumnSpec::Any, DtypePolicy::Infer)
            .unwrap();
        assert_eq!(data.columns, vec!["a", "b"]);
        assert_eq!(data.rows.len(), 3);
        assert_eq!(data.rows[2], vec![Value::from(5), Value::from(6)]);
    }

    #[test]
    fn test_text_skips_corrupted_rows() {
        let input = "1\t2\n3\n4\t5\n";
        let data = TextTableCodec::default()
            .read_table(&mut input.as_bytes(), &ColumnSpec::Any, DtypePolicy::Infer)
            .unwrap();
        assert_eq!(data.rows.len(), 2);
        assert_eq!(data.corrupted, vec![2]);
    }

    #[test]
    fn test_text_float_policy() {
        let input = "1\t2\nx\t3\n";
        let data = TextTableCodec::default()
            .read_table(&mut input.as_bytes(), &ColumnSpec::Count(2), DtypePolicy::Float)
            .unwrap();
        assert_eq!(data.rows, vec![vec![Value::from(1.0), Value::from(2.0)]]);
        assert_eq!(data.corrupted, vec![2]);
    }

    #[test]
    fn test_numeric_comment_is_not_a_header() {
        let input = "# 1 2\n1\t2\n";
        let data = TextTableCodec::default()
            .read_table(&mut input.as_bytes(), &ColumnSpec::Any, DtypePolicy::Infer)
            .unwrap();
        assert!(data.columns.is_empty());
    }

    #[test]
    fn test_binary_layout() {
        let table = sample();
        for packing in [Packing::Flatten, Packing::Transposed] {
            let preamble = BinaryPreamble::for_table(&table, packing).unwrap();
            let codec = BinaryTableCodec::new(preamble);
            let mut buf = Vec::new();
            codec.write_table(&mut buf, &table.rows, &[]).unwrap();
            assert_eq!(buf.len(), 6 * 8);

            let first_after = f64::from_le_bytes(buf[8..16].try_into().unwrap());
            let expected = if packing == Packing::Flatten { 2.0 } else { 3.0 };
            assert_eq!(first_after, expected);

            let data = codec
                .read_table(&mut buf.as_slice(), &ColumnSpec::Any, DtypePolicy::Infer)
                .unwrap();
            assert_eq!(data.rows, table.rows);
        }
    }

    #[test]
    fn test_binary_size_mismatch() {
        let preamble = BinaryPreamble::for_table(&sample(), Packing::Flatten).unwrap();
        let codec = BinaryTableCodec::new(preamble);
        let short = vec![0u8; 40];
        let err = codec
            .read_table(&mut short.as_slice(), &ColumnSpec::Any, DtypePolicy::Infer)
            .unwrap_err();
        assert!(err.is_format_error());
        assert!(err.to_string().contains("shape mismatch"));
    }

    #[test]
    fn test_preamble_missing_field() {
        let mut dict = BinaryPreamble::for_table(&sample(), Packing::Flatten)
            .unwrap()
            .to_dict();
        dict.remove("nrows");
        assert!(matches!(
            BinaryPreamble::from_dict(&dict),
            Err(Error::MissingField { ref field, .. }) if field == "preamble/nrows"
        ));
    }

    #[test]
    fn test_overflowing_preamble_is_format_error() {
        let mut dict = BinaryPreamble::for_table(&sample(), Packing::Flatten)
            .unwrap()
            .to_dict();
        dict.set("nrows", Value::from(i64::MAX));
        dict.set("ncols", Value::from(8));
        let err = BinaryPreamble::from_dict(&dict).unwrap_err();
        assert!(err.is_format_error());

        let huge = BinaryPreamble {
            dtype: Dtype::Int64,
            nrows: 1 << 61,
            ncols: 8,
            packing: Packing::Flatten,
        };
        let err = BinaryTableCodec::new(huge)
            .read_table(&mut [].as_slice(), &ColumnSpec::Any, DtypePolicy::Infer)
            .unwrap_err();
        assert!(err.to_string().contains("shape mismatch"));
    }

    #[test]
    fn test_zero_width_preamble_with_huge_row_count() {
        let preamble = BinaryPreamble {
            dtype: Dtype::Float64,
            nrows: usize::MAX,
            ncols: 0,
            packing: Packing::Flatten,
        };
        let err = BinaryTableCodec::new(preamble)
            .read_table(&mut [].as_slice(), &ColumnSpec::Any, DtypePolicy::Infer)
            .unwrap_err();
        assert!(err.is_format_error());
    }

    #[test]
    fn test_binary_rejects_strings() {
        let rows = vec![vec![Value::from("x")]];
        let preamble = BinaryPreamble {
            dtype: Dtype::Float64,
            nrows: 1,
            ncols: 1,
            packing: Packing::Flatten,
        };
        assert!(BinaryTableCodec::new(preamble)
            .write_table(&mut Vec::new(), &rows, &[])
            .is_err());
    }
}
