//! Writing dictionary files.
//!
//! The [`Writer`] walks a dictionary depth-first in insertion order. Leaves
//! that fit on one line become `path<TAB>value` lines; inline tables become
//! delimited blocks; everything else is handed to the entry builders, whose
//! branches are written in place of the value.
//!
//! This module also provides [`to_value`], which turns any `Serialize` type
//! into a [`Value`].
//!
//! ```rust
//! use dictfile::{to_string_with_options, Dictionary, Value, WriteOptions};
//!
//! let mut dict = Dictionary::new();
//! dict.set("a", Value::from(1));
//! dict.set("b/c", Value::from(2));
//!
//! let options = WriteOptions::new().with_timestamp(false);
//! assert_eq!(to_string_with_options(&dict, &options).unwrap(), "a\t1\nb/c\t2\n");
//! ```

use crate::entry::{find_builder, EntryContext, EntrySettings};
use crate::format::{is_marker, TIMESTAMP_FORMAT};
use crate::literal::{escape_comment, escape_key, is_inline, write_quoted, write_value};
use crate::location::Location;
use crate::table_codec::write_row;
use crate::{Dictionary, Error, Number, Result, Table, UnsupportedPolicy, Value, WriteOptions};
use chrono::{Local, NaiveDateTime};
use serde::{ser, Serialize};

/// Line writer for the dictionary file format.
pub struct Writer<'o> {
    output: String,
    options: &'o WriteOptions,
}

impl<'o> Writer<'o> {
    #[must_use]
    pub fn new(options: &'o WriteOptions) -> Self {
        Writer {
            output: String::with_capacity(256),
            options,
        }
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.output
    }

    /// Context for builders called while writing.
    #[must_use]
    pub fn settings(&self) -> EntrySettings {
        EntrySettings {
            table_format: self.options.table_format,
            delimiter: self.options.delimiter,
            packing: self.options.packing,
        }
    }

    /// Writes every leaf of `dict` below the path already in `ctx`.
    pub fn write_dict(&mut self, dict: &Dictionary, ctx: &mut EntryContext<'_>) -> Result<()> {
        for (key, value) in dict {
            ctx.path.push(key.clone());
            let result = self.write_leaf(value, ctx);
            ctx.path.pop();
            result?;
        }
        Ok(())
    }

    fn write_leaf(&mut self, value: &Value, ctx: &mut EntryContext<'_>) -> Result<()> {
        match value {
            Value::Dict(sub) => self.write_dict(sub, ctx),
            Value::InlineTable(table) => self.write_inline_table(&ctx.path, table),
            leaf if is_inline(leaf) => self.write_entry(&ctx.path, leaf),
            other => self.dispatch(other, ctx),
        }
    }

    fn dispatch(&mut self, value: &Value, ctx: &mut EntryContext<'_>) -> Result<()> {
        let options = self.options;
        match find_builder(&options.builders, &options.registry, value, ctx) {
            Some(builder) => {
                tracing::trace!(path = %ctx.path_string(), builder = ?builder, "building entry branch");
                let branch = builder.to_branch(value, ctx)?;
                self.write_dict(&branch, ctx)
            }
            None => match options.unsupported {
                UnsupportedPolicy::Error => Err(Error::unsupported_value(
                    &ctx.path_string(),
                    &format!("no entry builder claims a {} value", value.kind_name()),
                )),
                UnsupportedPolicy::Stringify => {
                    tracing::debug!(path = %ctx.path_string(), kind = value.kind_name(), "stringifying unclaimed value");
                    self.write_entry(&ctx.path, &Value::String(value.to_string()))
                }
            },
        }
    }

    fn write_entry(&mut self, path: &[String], value: &Value) -> Result<()> {
        self.output.push_str(&escape_key(path).map_err(|err| with_path(err, path))?);
        self.output.push('\t');
        write_value(&mut self.output, value);
        self.output.push('\n');
        Ok(())
    }

    /// A block holds rows and column names only; index and group metadata need a table entry.
    fn write_inline_table(&mut self, path: &[String], table: &Table) -> Result<()> {
        if !table.is_plain() {
            return Err(Error::unsupported_value(
                &path.join("/"),
                "inline block cannot carry index columns or column groups; store it as a table",
            ));
        }
        let delimiter = self.options.delimiter;
        self.output.push_str(&escape_key(path).map_err(|err| with_path(err, path))?);
        self.output.push_str("\ttable\n# table start\n");
        if !table.columns.is_empty() {
            let mut header = String::from("# ");
            write_row(&mut header, table.columns.iter().map(|c| Value::from(c.as_str())), delimiter)?;
            if is_marker(header.trim()) {
                header = String::from("# ");
                write_quoted(&mut header, &table.columns[0]);
                let rest = table.columns[1..].iter().map(|c| Value::from(c.as_str()));
                let mut tail = String::new();
                write_row(&mut tail, rest, delimiter)?;
                if table.columns.len() > 1 {
                    header.push_str(delimiter.as_str());
                }
                header.push_str(&tail);
            }
            self.output.push_str(&header);
        }
        for row in &table.rows {
            write_row(&mut self.output, row.iter().cloned(), delimiter)
                .map_err(|err| with_path(err, path))?;
        }
        self.output.push_str("# table end\n");
        Ok(())
    }

    /// Appends free-text comments and the creation time, as enabled in the options.
    pub fn write_trailer(&mut self, comments: &[String], creation_time: Option<NaiveDateTime>) {
        if self.options.write_comments {
            for comment in comments {
                let text = escape_comment(comment);
                let mut line = if text.is_empty() {
                    "#".to_string()
                } else {
                    format!("# {}", text)
                };
                if is_marker(line.trim()) {
                    let mut chars = text.chars();
                    if let Some(first) = chars.next() {
                        line = format!("# \\u{:04x}{}", first as u32, chars.as_str());
                    }
                }
                self.output.push_str(&line);
                self.output.push('\n');
            }
        }
        if self.options.write_timestamp {
            let time = creation_time.unwrap_or_else(|| Local::now().naive_local());
            self.output.push_str("# Saved on ");
            self.output.push_str(&time.format(TIMESTAMP_FORMAT).to_string());
            self.output.push('\n');
        }
    }
}

fn with_path(err: Error, path: &[String]) -> Error {
    match err {
        Error::UnsupportedValue { msg, .. } => Error::unsupported_value(&path.join("/"), &msg),
        other => other,
    }
}

/// Renders a whole document.
pub(crate) fn write_document(
    data: &Dictionary,
    comments: &[String],
    creation_time: Option<NaiveDateTime>,
    options: &WriteOptions,
    location: Option<&mut dyn Location>,
) -> Result<String> {
    let mut writer = Writer::new(options);
    let mut ctx = EntryContext::new(writer.settings(), location);
    writer.write_dict(data, &mut ctx)?;
    writer.write_trailer(comments, creation_time);
    Ok(writer.into_inner())
}

/// Converts any `Serialize` type into a [`Value`].
///
/// Structs and string-keyed maps become dictionaries, other maps become
/// [`Value::Map`], sequences become lists and tuples become tuples.
///
/// # Examples
///
/// ```rust
/// use dictfile::{to_value, Value};
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Probe { name: String, gain: f64 }
///
/// let value = to_value(&Probe { name: "p1".into(), gain: 2.0 }).unwrap();
/// let dict = value.as_dict().unwrap();
/// assert_eq!(dict.get("gain"), Some(&Value::from(2.0)));
/// ```
pub fn to_value<T: Serialize + ?Sized>(value: &T) -> Result<Value> {
    value.serialize(ValueSerializer)
}

/// Serializer producing [`Value`]s.
pub struct ValueSerializer;

pub struct SerializeVec {
    vec: Vec<Value>,
    tuple: bool,
}

pub struct SerializeMap {
    entries: Vec<(Value, Value)>,
    current_key: Option<Value>,
}

impl ser::Serializer for ValueSerializer {
    type Ok = Value;
    type Error = Error;

    type SerializeSeq = SerializeVec;
    type SerializeTuple = SerializeVec;
    type SerializeTupleStruct = SerializeVec;
    type SerializeTupleVariant = SerializeVec;
    type SerializeMap = SerializeMap;
    type SerializeStruct = SerializeMap;
    type SerializeStructVariant = SerializeMap;

    fn serialize_bool(self, v: bool) -> Result<Value> {
        Ok(Value::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Value> {
        Ok(Value::Number(Number::Integer(v as i64)))
    }

    fn serialize_i16(self, v: i16) -> Result<Value> {
        Ok(Value::Number(Number::Integer(v as i64)))
    }

    fn serialize_i32(self, v: i32) -> Result<Value> {
        Ok(Value::Number(Number::Integer(v as i64)))
    }

    fn serialize_i64(self, v: i64) -> Result<Value> {
        Ok(Value::Number(Number::Integer(v)))
    }

    fn serialize_u8(self, v: u8) -> Result<Value> {
        Ok(Value::Number(Number::Integer(v as i64)))
    }

    fn serialize_u16(self, v: u16) -> Result<Value> {
        Ok(Value::Number(Number::Integer(v as i64)))
    }

    fn serialize_u32(self, v: u32) -> Result<Value> {
        Ok(Value::Number(Number::Integer(v as i64)))
    }

    fn serialize_u64(self, v: u64) -> Result<Value> {
        if v <= i64::MAX as u64 {
            Ok(Value::Number(Number::Integer(v as i64)))
        } else {
            Ok(Value::Number(Number::Float(v as f64)))
        }
    }

    fn serialize_f32(self, v: f32) -> Result<Value> {
        Ok(Value::Number(Number::Float(v as f64)))
    }

    fn serialize_f64(self, v: f64) -> Result<Value> {
        Ok(Value::Number(Number::Float(v)))
    }

    fn serialize_char(self, v: char) -> Result<Value> {
        Ok(Value::String(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Value> {
        Ok(Value::String(v.to_string()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Value> {
        Ok(Value::Bytes(v.to_vec()))
    }

    fn serialize_none(self) -> Result<Value> {
        Ok(Value::Null)
    }

    fn serialize_some<T>(self, value: &T) -> Result<Value>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Value> {
        Ok(Value::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Value> {
        Ok(Value::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Value> {
        Ok(Value::String(variant.to_string()))
    }

    fn serialize_newtype_struct<T>(self, _name: &'static str, value: &T) -> Result<Value>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<Value>
    where
        T: ?Sized + Serialize,
    {
        Err(Error::unsupported_value("<serde>", "newtype variants"))
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<SerializeVec> {
        Ok(SerializeVec::new(false))
    }

    fn serialize_tuple(self, _len: usize) -> Result<SerializeVec> {
        Ok(SerializeVec::new(true))
    }

    fn serialize_tuple_struct(self, _name: &'static str, _len: usize) -> Result<SerializeVec> {
        Ok(SerializeVec::new(true))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<SerializeVec> {
        Err(Error::unsupported_value("<serde>", "tuple variants"))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<SerializeMap> {
        Ok(SerializeMap::new())
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<SerializeMap> {
        Ok(SerializeMap::new())
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<SerializeMap> {
        Err(Error::unsupported_value("<serde>", "struct variants"))
    }
}

impl SerializeVec {
    fn new(tuple: bool) -> Self {
        SerializeVec {
            vec: Vec::new(),
            tuple,
        }
    }

    fn finish(self) -> Value {
        if self.tuple {
            Value::Tuple(self.vec)
        } else {
            Value::List(self.vec)
        }
    }
}

impl SerializeMap {
    fn new() -> Self {
        SerializeMap {
            entries: Vec::new(),
            current_key: None,
        }
    }

    /// String keys give a dictionary; any other key keeps the pairs as a map.
    fn finish(self) -> Value {
        if self.entries.iter().all(|(k, _)| k.is_string()) {
            let mut dict = Dictionary::new();
            for (key, value) in self.entries {
                if let Value::String(key) = key {
                    dict.insert_key(&key, value);
                }
            }
            Value::Dict(dict)
        } else {
            Value::Map(self.entries)
        }
    }
}

impl ser::SerializeSeq for SerializeVec {
    type Ok = Value;
    type Error = Error;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.vec.push(to_value(value)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(self.finish())
    }
}

impl ser::SerializeTuple for SerializeVec {
    type Ok = Value;
    type Error = Error;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.vec.push(to_value(value)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(self.finish())
    }
}

impl ser::SerializeTupleStruct for SerializeVec {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.vec.push(to_value(value)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(self.finish())
    }
}

impl ser::SerializeTupleVariant for SerializeVec {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.vec.push(to_value(value)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(self.finish())
    }
}

impl ser::SerializeMap for SerializeMap {
    type Ok = Value;
    type Error = Error;

    fn serialize_key<T>(&mut self, key: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.current_key = Some(to_value(key)?);
        Ok(())
    }

    fn serialize_value<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        let key = self
            .current_key
            .take()
            .ok_or_else(|| Error::custom("serialize_value called without serialize_key"))?;
        self.entries.push((key, to_value(value)?));
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(self.finish())
    }
}

impl ser::SerializeStruct for SerializeMap {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.entries.push((Value::from(key), to_value(value)?));
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(self.finish())
    }
}

impl ser::SerializeStructVariant for SerializeMap {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.entries.push((Value::from(key), to_value(value)?));
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(self.finish())
    }
}
