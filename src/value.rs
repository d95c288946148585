//! Dynamic value representation for dictionary leaves.
//!
//! ## Core Types
//!
//! - [`Value`]: any leaf of a [`Dictionary`](crate::Dictionary), from scalars to
//!   tables, numeric arrays and nested containers
//! - [`Number`]: integer, float or complex numbers
//! - [`Table`]: rows of scalar cells with optional column names
//! - [`NdArray`]: a multi-dimensional numeric array stored row-major
//!
//! ## Creating Values
//!
//! ```rust
//! use dictfile::{Number, Value};
//!
//! let flag = Value::from(true);
//! let count = Value::from(42);
//! let name = Value::from("probe");
//! assert_eq!(count, Value::Number(Number::Integer(42)));
//! assert!(flag.is_primitive() && name.is_primitive());
//! ```

use crate::Dictionary;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A dynamically-typed dictionary leaf.
///
/// Scalars (`Null`, `Bool`, `Number`, `String`) and containers holding only
/// scalars are written on a single line. Everything else is handed to the entry
/// builders when written.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    /// Mapping with arbitrary keys, kept in insertion order.
    Map(Vec<(Value, Value)>),
    Dict(Dictionary),
    Table(Table),
    /// A table written verbatim as a delimited block inside the dictionary file.
    InlineTable(Table),
    Array(NdArray),
    Bytes(Vec<u8>),
}

/// A numeric value.
///
/// # Examples
///
/// ```rust
/// use dictfile::Number;
///
/// assert_eq!(Number::Integer(42).as_f64(), 42.0);
/// assert_eq!(Number::Float(42.0).as_i64(), Some(42));
/// assert!(Number::Complex(1.0, 2.0).is_complex());
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Number {
    Integer(i64),
    Float(f64),
    Complex(f64, f64),
}

impl Number {
    #[inline]
    #[must_use]
    pub const fn is_integer(&self) -> bool {
        matches!(self, Number::Integer(_))
    }

    #[inline]
    #[must_use]
    pub const fn is_complex(&self) -> bool {
        matches!(self, Number::Complex(..))
    }

    /// Converts this number to an `i64` if it is integral.
    ///
    /// Floats with no fractional part convert; complex numbers never do.
    #[inline]
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Number::Integer(i) => Some(*i),
            Number::Float(f) => {
                if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                    Some(*f as i64)
                } else {
                    None
                }
            }
            Number::Complex(..) => None,
        }
    }

    /// Converts this number to an `f64`, taking the real part of complex numbers.
    #[inline]
    #[must_use]
    pub fn as_f64(&self) -> f64 {
        match self {
            Number::Integer(i) => *i as f64,
            Number::Float(f) => *f,
            Number::Complex(re, _) => *re,
        }
    }

    /// Returns the number as a `(re, im)` pair.
    #[inline]
    #[must_use]
    pub fn as_complex(&self) -> (f64, f64) {
        match self {
            Number::Complex(re, im) => (*re, *im),
            other => (other.as_f64(), 0.0),
        }
    }
}

/// Floats always carry a decimal point or an exponent so they read back as floats.
impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Integer(i) => write!(f, "{}", i),
            Number::Float(fl) => write!(f, "{:?}", fl),
            Number::Complex(re, im) => {
                let sign = if im.is_sign_negative() { '-' } else { '+' };
                write!(f, "({:?}{}{:?}j)", re, sign, im.abs())
            }
        }
    }
}

/// Rows of scalar cells with optional column metadata.
///
/// `index_columns` marks how many leading columns form the row index, and
/// `column_groups` (when non-empty) holds a second, outer level of column names
/// parallel to `columns`.
///
/// # Examples
///
/// ```rust
/// use dictfile::{Table, Value};
///
/// let table = Table::new(vec![
///     vec![Value::from(1), Value::from(2.5)],
///     vec![Value::from(2), Value::from(3.5)],
/// ])
/// .with_columns(["idx", "amp"]);
/// assert_eq!(table.shape(), (2, 2));
/// assert!(table.is_numeric());
/// ```
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Table {
    pub columns: Vec<String>,
    pub column_groups: Vec<String>,
    pub index_columns: usize,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    #[must_use]
    pub fn new(rows: Vec<Vec<Value>>) -> Self {
        Table {
            rows,
            ..Default::default()
        }
    }

    /// Builds a table from rows of floats.
    #[must_use]
    pub fn from_f64_rows(rows: &[Vec<f64>]) -> Self {
        Table::new(
            rows.iter()
                .map(|row| row.iter().map(|&x| Value::from(x)).collect())
                .collect(),
        )
    }

    #[must_use]
    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_column_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.column_groups = groups.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_index_columns(mut self, count: usize) -> Self {
        self.index_columns = count;
        self
    }

    /// Returns `(rows, columns)`; an empty table takes its width from the column names.
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        let ncols = self
            .rows
            .first()
            .map(Vec::len)
            .unwrap_or(self.columns.len());
        (self.rows.len(), ncols)
    }

    /// Returns `true` if every cell is a number.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        self.rows
            .iter()
            .all(|row| row.iter().all(Value::is_number))
    }

    /// Returns `true` if the table carries no metadata beyond plain column names.
    #[must_use]
    pub fn is_plain(&self) -> bool {
        self.index_columns == 0 && self.column_groups.is_empty()
    }

    #[must_use]
    pub fn column(&self, index: usize) -> Vec<&Value> {
        self.rows.iter().filter_map(|row| row.get(index)).collect()
    }
}

/// Element type of a binary payload, tagged numpy-style.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dtype {
    Int64,
    Float64,
    Complex128,
}

impl Dtype {
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Dtype::Int64 => "<i8",
            Dtype::Float64 => "<f8",
            Dtype::Complex128 => "<c16",
        }
    }

    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "<i8" => Some(Dtype::Int64),
            "<f8" => Some(Dtype::Float64),
            "<c16" => Some(Dtype::Complex128),
            _ => None,
        }
    }

    /// Size of one element in bytes.
    #[must_use]
    pub const fn item_size(&self) -> usize {
        match self {
            Dtype::Int64 | Dtype::Float64 => 8,
            Dtype::Complex128 => 16,
        }
    }

    /// The narrowest dtype able to hold every number in `values`.
    pub fn infer<'a, I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let mut dtype = Dtype::Int64;
        for value in values {
            match value {
                Value::Number(Number::Integer(_)) => {}
                Value::Number(Number::Float(_)) => {
                    if dtype == Dtype::Int64 {
                        dtype = Dtype::Float64;
                    }
                }
                Value::Number(Number::Complex(..)) => dtype = Dtype::Complex128,
                _ => return None,
            }
        }
        Some(dtype)
    }
}

/// Flat storage of an [`NdArray`].
#[derive(Clone, Debug, PartialEq)]
pub enum ArrayData {
    Int64(Vec<i64>),
    Float64(Vec<f64>),
    Complex128(Vec<(f64, f64)>),
}

impl ArrayData {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            ArrayData::Int64(v) => v.len(),
            ArrayData::Float64(v) => v.len(),
            ArrayData::Complex128(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub const fn dtype(&self) -> Dtype {
        match self {
            ArrayData::Int64(_) => Dtype::Int64,
            ArrayData::Float64(_) => Dtype::Float64,
            ArrayData::Complex128(_) => Dtype::Complex128,
        }
    }
}

/// A multi-dimensional numeric array, stored row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct NdArray {
    pub shape: Vec<usize>,
    pub data: ArrayData,
}

impl NdArray {
    /// Creates an array, checking that `data` fills `shape` exactly.
    pub fn new(shape: Vec<usize>, data: ArrayData) -> crate::Result<Self> {
        let expected = shape.iter().try_fold(1usize, |acc, &dim| acc.checked_mul(dim));
        if expected != Some(data.len()) {
            return Err(crate::Error::format(match expected {
                Some(expected) => format!(
                    "array of shape {:?} needs {} elements, got {}",
                    shape,
                    expected,
                    data.len()
                ),
                None => format!("array of shape {:?} overflows", shape),
            }));
        }
        Ok(NdArray { shape, data })
    }

    #[must_use]
    pub fn from_f64(shape: Vec<usize>, data: Vec<f64>) -> Option<Self> {
        NdArray::new(shape, ArrayData::Float64(data)).ok()
    }

    #[must_use]
    pub fn dtype(&self) -> Dtype {
        self.data.dtype()
    }
}

impl Value {
    #[inline]
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    #[inline]
    #[must_use]
    pub const fn is_number(&self) -> bool {
        matches!(self, Value::Number(_))
    }

    #[inline]
    #[must_use]
    pub const fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    #[inline]
    #[must_use]
    pub const fn is_dict(&self) -> bool {
        matches!(self, Value::Dict(_))
    }

    /// Returns `true` for null, booleans, numbers and strings.
    #[inline]
    #[must_use]
    pub const fn is_primitive(&self) -> bool {
        matches!(
            self,
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_)
        )
    }

    #[inline]
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// If the value is a string, returns a reference to it. Otherwise returns `None`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dictfile::Value;
    ///
    /// assert_eq!(Value::from("hello").as_str(), Some("hello"));
    /// assert_eq!(Value::from(42).as_str(), None);
    /// ```
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(n.as_f64()),
            _ => None,
        }
    }

    /// Returns the elements of a list or a tuple.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) | Value::Tuple(items) => Some(items),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_dict(&self) -> Option<&Dictionary> {
        match self {
            Value::Dict(dict) => Some(dict),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_dict_mut(&mut self) -> Option<&mut Dictionary> {
        match self {
            Value::Dict(dict) => Some(dict),
            _ => None,
        }
    }

    /// Returns the table of a `Table` or an `InlineTable` value.
    #[inline]
    #[must_use]
    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Value::Table(table) | Value::InlineTable(table) => Some(table),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_array(&self) -> Option<&NdArray> {
        match self {
            Value::Array(array) => Some(array),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Short name of the variant, used in error messages.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Map(_) => "map",
            Value::Dict(_) => "dict",
            Value::Table(_) => "table",
            Value::InlineTable(_) => "inline table",
            Value::Array(_) => "array",
            Value::Bytes(_) => "bytes",
        }
    }
}

/// Best-effort text form, used when a value has to be stringified.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "None"),
            Value::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::List(items) => {
                write!(f, "[{}]", join_display(items))
            }
            Value::Tuple(items) => {
                write!(f, "({})", join_display(items))
            }
            Value::Map(entries) => {
                let parts: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v))
                    .collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
            Value::Dict(dict) => write!(f, "Dictionary({} keys)", dict.len()),
            Value::Table(table) | Value::InlineTable(table) => {
                let (nrows, ncols) = table.shape();
                write!(f, "Table[{}x{}]", nrows, ncols)
            }
            Value::Array(array) => write!(f, "NdArray{:?}<{}>", array.shape, array.dtype().tag()),
            Value::Bytes(bytes) => write!(f, "Bytes[{}]", bytes.len()),
        }
    }
}

fn join_display(items: &[Value]) -> String {
    items
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::{SerializeMap, SerializeSeq, SerializeStruct};

        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(Number::Integer(i)) => serializer.serialize_i64(*i),
            Value::Number(Number::Float(f)) => serializer.serialize_f64(*f),
            Value::Number(Number::Complex(re, im)) => (re, im).serialize(serializer),
            Value::String(s) => serializer.serialize_str(s),
            Value::List(items) | Value::Tuple(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for element in items {
                    seq.serialize_element(element)?;
                }
                seq.end()
            }
            Value::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            Value::Dict(dict) => dict.serialize(serializer),
            Value::Table(table) | Value::InlineTable(table) => {
                let mut state = serializer.serialize_struct("Table", 2)?;
                state.serialize_field("columns", &table.columns)?;
                state.serialize_field("rows", &table.rows)?;
                state.end()
            }
            Value::Array(array) => {
                let mut state = serializer.serialize_struct("NdArray", 3)?;
                state.serialize_field("shape", &array.shape)?;
                state.serialize_field("dtype", array.dtype().tag())?;
                match &array.data {
                    ArrayData::Int64(v) => state.serialize_field("data", v)?,
                    ArrayData::Float64(v) => state.serialize_field("data", v)?,
                    ArrayData::Complex128(v) => state.serialize_field("data", v)?,
                }
                state.end()
            }
            Value::Bytes(bytes) => serializer.serialize_bytes(bytes),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::{self, Visitor};

        struct ValueVisitor;

        impl<'de> Visitor<'de> for ValueVisitor {
            type Value = Value;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("any dictionary value")
            }

            fn visit_bool<E>(self, value: bool) -> Result<Self::Value, E> {
                Ok(Value::Bool(value))
            }

            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E> {
                Ok(Value::Number(Number::Integer(value)))
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E> {
                if value <= i64::MAX as u64 {
                    Ok(Value::Number(Number::Integer(value as i64)))
                } else {
                    Ok(Value::Number(Number::Float(value as f64)))
                }
            }

            fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E> {
                Ok(Value::Number(Number::Float(value)))
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E> {
                Ok(Value::String(value.to_string()))
            }

            fn visit_string<E>(self, value: String) -> Result<Self::Value, E> {
                Ok(Value::String(value))
            }

            fn visit_bytes<E>(self, value: &[u8]) -> Result<Self::Value, E> {
                Ok(Value::Bytes(value.to_vec()))
            }

            fn visit_unit<E>(self) -> Result<Self::Value, E> {
                Ok(Value::Null)
            }

            fn visit_none<E>(self) -> Result<Self::Value, E> {
                Ok(Value::Null)
            }

            fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
            where
                D: Deserializer<'de>,
            {
                Deserialize::deserialize(deserializer)
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: de::SeqAccess<'de>,
            {
                let mut vec = Vec::new();
                while let Some(elem) = seq.next_element()? {
                    vec.push(elem);
                }
                Ok(Value::List(vec))
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: de::MapAccess<'de>,
            {
                let mut dict = Dictionary::new();
                while let Some((key, value)) = map.next_entry::<String, Value>()? {
                    dict.insert_key(&key, value);
                }
                Ok(Value::Dict(dict))
            }
        }

        deserializer.deserialize_any(ValueVisitor)
    }
}

impl TryFrom<Value> for i64 {
    type Error = crate::Error;

    fn try_from(value: Value) -> crate::Result<Self> {
        match value {
            Value::Number(n) => n.as_i64().ok_or_else(|| {
                crate::Error::custom(format!("cannot convert {} to i64", n))
            }),
            _ => Err(crate::Error::custom(format!(
                "expected integer, found {}",
                value.kind_name()
            ))),
        }
    }
}

impl TryFrom<Value> for f64 {
    type Error = crate::Error;

    fn try_from(value: Value) -> crate::Result<Self> {
        match value {
            Value::Number(Number::Complex(..)) => Err(crate::Error::custom(
                "cannot convert a complex number to f64",
            )),
            Value::Number(n) => Ok(n.as_f64()),
            _ => Err(crate::Error::custom(format!(
                "expected number, found {}",
                value.kind_name()
            ))),
        }
    }
}

impl TryFrom<Value> for bool {
    type Error = crate::Error;

    fn try_from(value: Value) -> crate::Result<Self> {
        match value {
            Value::Bool(b) => Ok(b),
            _ => Err(crate::Error::custom(format!(
                "expected bool, found {}",
                value.kind_name()
            ))),
        }
    }
}

impl TryFrom<Value> for String {
    type Error = crate::Error;

    fn try_from(value: Value) -> crate::Result<Self> {
        match value {
            Value::String(s) => Ok(s),
            _ => Err(crate::Error::custom(format!(
                "expected string, found {}",
                value.kind_name()
            ))),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(Number::Integer(value as i64))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(Number::Integer(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Number(Number::Integer(value as i64))
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        if value <= i64::MAX as usize {
            Value::Number(Number::Integer(value as i64))
        } else {
            Value::Number(Number::Float(value as f64))
        }
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Number(Number::Float(value as f64))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(Number::Float(value))
    }
}

impl From<Number> for Value {
    fn from(value: Number) -> Self {
        Value::Number(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl From<Dictionary> for Value {
    fn from(value: Dictionary) -> Self {
        Value::Dict(value)
    }
}

impl From<Table> for Value {
    fn from(value: Table) -> Self {
        Value::Table(value)
    }
}

impl From<NdArray> for Value {
    fn from(value: NdArray) -> Self {
        Value::Array(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tryfrom_i64() {
        let value = Value::Number(Number::Float(42.0));
        let result: i64 = TryFrom::try_from(value).unwrap();
        assert_eq!(result, 42);

        assert!(i64::try_from(Value::from(42.5)).is_err());
        assert!(i64::try_from(Value::from("test")).is_err());
    }

    #[test]
    fn test_tryfrom_f64_rejects_complex() {
        assert_eq!(f64::try_from(Value::from(3)).unwrap(), 3.0);
        assert!(f64::try_from(Value::Number(Number::Complex(1.0, 1.0))).is_err());
    }

    #[test]
    fn test_float_display_reads_as_float() {
        assert_eq!(Number::Float(1.0).to_string(), "1.0");
        assert_eq!(Number::Float(1e20).to_string(), "1e20");
        assert_eq!(Number::Float(f64::INFINITY).to_string(), "inf");
        assert_eq!(Number::Complex(1.0, -2.5).to_string(), "(1.0-2.5j)");
    }

    #[test]
    fn test_dtype_inference() {
        let ints = [Value::from(1), Value::from(2)];
        assert_eq!(Dtype::infer(&ints), Some(Dtype::Int64));

        let mixed = [Value::from(1), Value::from(2.5)];
        assert_eq!(Dtype::infer(&mixed), Some(Dtype::Float64));

        let complex = [Value::from(1.5), Value::Number(Number::Complex(0.0, 1.0))];
        assert_eq!(Dtype::infer(&complex), Some(Dtype::Complex128));

        let text = [Value::from(1), Value::from("x")];
        assert_eq!(Dtype::infer(&text), None);
    }

    #[test]
    fn test_table_shape() {
        let empty = Table::default().with_columns(["a", "b", "c"]);
        assert_eq!(empty.shape(), (0, 3));

        let table = Table::from_f64_rows(&[vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]);
        assert_eq!(table.shape(), (3, 2));
        assert_eq!(table.column(1), vec![&Value::from(2.0), &Value::from(4.0), &Value::from(6.0)]);
    }

    #[test]
    fn test_ndarray_shape_check() {
        assert!(NdArray::from_f64(vec![2, 3], vec![0.0; 6]).is_some());
        assert!(NdArray::new(vec![2, 3], ArrayData::Int64(vec![1; 5])).is_err());
        assert!(NdArray::new(vec![usize::MAX, 2], ArrayData::Int64(vec![])).is_err());
    }

    #[test]
    fn test_display_stringifies_containers() {
        let value = Value::Tuple(vec![Value::from(1), Value::Null, Value::from(true)]);
        assert_eq!(value.to_string(), "(1, None, True)");
    }
}
