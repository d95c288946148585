//! Opaque payloads written whole to a sibling file.

use super::{EntryContext, TYPE_KEY};
use crate::location::{DataKind, LocationFile, LocationName, NameStart, OpenMode};
use crate::table_codec::{read_number, write_number};
use crate::{ArrayData, Dictionary, Dtype, Error, NdArray, Number, Result, Value};
use indexmap::IndexMap;
use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;

pub(super) const DISCRIMINATOR: &str = "blob";
pub(super) const BLOB_TYPE_KEY: &str = "blob_type";

const FILE_KEY: &str = "file_path";
const PREAMBLE_KEY: &str = "preamble";

/// Writes and reads one kind of payload.
///
/// The preamble returned by [`write_blob`](BlobCodec::write_blob) is stored in
/// the dictionary and handed back to [`read_blob`](BlobCodec::read_blob).
pub trait BlobCodec: fmt::Debug + Send + Sync {
    fn type_tag(&self) -> &str;

    fn claims(&self, value: &Value) -> bool;

    fn extension(&self) -> &str {
        "bin"
    }

    fn write_blob(&self, value: &Value, writer: &mut dyn Write) -> Result<Dictionary>;

    fn read_blob(&self, preamble: &Dictionary, reader: &mut dyn Read) -> Result<Value>;
}

/// Blob codecs keyed by type tag, in registration order.
#[derive(Clone, Debug)]
pub struct BlobCodecs {
    codecs: IndexMap<String, Arc<dyn BlobCodec>>,
}

impl Default for BlobCodecs {
    fn default() -> Self {
        let mut codecs = BlobCodecs::empty();
        codecs.register(Arc::new(NdArrayCodec));
        codecs.register(Arc::new(BytesCodec));
        codecs
    }
}

impl BlobCodecs {
    #[must_use]
    pub fn empty() -> Self {
        BlobCodecs {
            codecs: IndexMap::new(),
        }
    }

    /// Registers a codec, replacing any codec with the same tag.
    pub fn register(&mut self, codec: Arc<dyn BlobCodec>) {
        self.codecs.insert(codec.type_tag().to_string(), codec);
    }

    #[must_use]
    pub fn get(&self, tag: &str) -> Option<&Arc<dyn BlobCodec>> {
        self.codecs.get(tag)
    }

    #[must_use]
    pub fn claiming(&self, value: &Value) -> Option<&Arc<dyn BlobCodec>> {
        self.codecs.values().find(|codec| codec.claims(value))
    }
}

pub(super) fn to_branch(
    codecs: &BlobCodecs,
    value: &Value,
    ctx: &mut EntryContext<'_>,
) -> Result<Dictionary> {
    let codec = codecs.claiming(value).ok_or_else(|| {
        Error::unsupported_value(&ctx.path_string(), "no blob codec claims this value")
    })?;
    let prefix = ctx.sibling_prefix("blob", codec.extension());
    let location = ctx.location()?;
    let name = location.generate_new_name(&prefix, NameStart::PrefixFirst)?;
    let mut file = LocationFile::open(location, name.clone(), OpenMode::Write, DataKind::Binary)?;
    let preamble = codec.write_blob(value, &mut file)?;
    file.close()?;
    tracing::debug!(path = %ctx.path_string(), file = %name, blob_type = codec.type_tag(), "wrote blob");

    let mut branch = Dictionary::new();
    branch.set(TYPE_KEY, Value::from(DISCRIMINATOR));
    branch.set(BLOB_TYPE_KEY, Value::from(codec.type_tag()));
    branch.set(FILE_KEY, Value::from(name.to_string()));
    branch.set(PREAMBLE_KEY, Value::Dict(preamble));
    Ok(branch)
}

pub(super) fn from_branch(
    codecs: &BlobCodecs,
    branch: &Dictionary,
    ctx: &mut EntryContext<'_>,
) -> Result<Value> {
    let tag = branch
        .get(BLOB_TYPE_KEY)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::missing_field(DISCRIMINATOR, BLOB_TYPE_KEY))?;
    let codec = codecs
        .get(tag)
        .ok_or_else(|| Error::format(format!("no blob codec registered for '{}'", tag)))?;
    let file_path = branch
        .get(FILE_KEY)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::missing_field(DISCRIMINATOR, FILE_KEY))?;
    let empty = Dictionary::new();
    let preamble = branch.branch(PREAMBLE_KEY).unwrap_or(&empty);

    let location = ctx.location()?;
    let mut file = LocationFile::open(
        location,
        LocationName::parse(file_path),
        OpenMode::Read,
        DataKind::Binary,
    )?;
    let value = codec.read_blob(preamble, &mut file)?;
    file.close()?;
    Ok(value)
}

fn preamble_field<'d>(preamble: &'d Dictionary, blob_type: &str, field: &str) -> Result<&'d Value> {
    preamble
        .get(field)
        .ok_or_else(|| Error::missing_field(blob_type, &format!("preamble/{}", field)))
}

/// Multi-dimensional numeric arrays, stored row-major little-endian.
#[derive(Clone, Copy, Debug, Default)]
pub struct NdArrayCodec;

impl BlobCodec for NdArrayCodec {
    fn type_tag(&self) -> &str {
        "ndarray"
    }

    fn claims(&self, value: &Value) -> bool {
        matches!(value, Value::Array(_))
    }

    fn write_blob(&self, value: &Value, writer: &mut dyn Write) -> Result<Dictionary> {
        let array = value
            .as_array()
            .ok_or_else(|| Error::unsupported_value("<blob>", "expected an array"))?;
        let dtype = array.dtype();
        let mut buf = Vec::with_capacity(array.data.len() * dtype.item_size());
        match &array.data {
            ArrayData::Int64(v) => {
                for &x in v {
                    write_number(&mut buf, dtype, &Value::Number(Number::Integer(x)))?;
                }
            }
            ArrayData::Float64(v) => {
                for &x in v {
                    write_number(&mut buf, dtype, &Value::Number(Number::Float(x)))?;
                }
            }
            ArrayData::Complex128(v) => {
                for &(re, im) in v {
                    write_number(&mut buf, dtype, &Value::Number(Number::Complex(re, im)))?;
                }
            }
        }
        writer.write_all(&buf)?;

        let mut preamble = Dictionary::new();
        preamble.set("dtype", Value::from(dtype.tag()));
        preamble.set(
            "shape",
            Value::List(array.shape.iter().map(|&n| Value::from(n)).collect()),
        );
        preamble.set("order", Value::from("C"));
        Ok(preamble)
    }

    fn read_blob(&self, preamble: &Dictionary, reader: &mut dyn Read) -> Result<Value> {
        let tag = self.type_tag();
        let dtype_tag = preamble_field(preamble, tag, "dtype")?
            .as_str()
            .ok_or_else(|| Error::format("ndarray dtype is not a string"))?;
        let dtype = Dtype::from_tag(dtype_tag)
            .ok_or_else(|| Error::format(format!("unknown dtype '{}'", dtype_tag)))?;
        let shape = preamble_field(preamble, tag, "shape")?
            .as_slice()
            .ok_or_else(|| Error::format("ndarray shape is not a list"))?
            .iter()
            .map(|dim| {
                dim.as_i64()
                    .and_then(|n| usize::try_from(n).ok())
                    .ok_or_else(|| Error::format(format!("invalid dimension {}", dim)))
            })
            .collect::<Result<Vec<_>>>()?;
        if let Some(order) = preamble.get("order").and_then(Value::as_str) {
            if order != "C" {
                return Err(Error::format(format!("unsupported array order '{}'", order)));
            }
        }

        let (count, byte_len) = shape
            .iter()
            .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
            .and_then(|count| Some((count, count.checked_mul(dtype.item_size())?)))
            .ok_or_else(|| {
                Error::format(format!("shape mismatch: {:?} {} overflows", shape, dtype.tag()))
            })?;
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        if bytes.len() != byte_len {
            return Err(Error::format(format!(
                "shape mismatch: {:?} {} needs {} bytes, payload has {}",
                shape,
                dtype.tag(),
                byte_len,
                bytes.len()
            )));
        }

        let mut cursor = bytes.as_slice();
        let mut numbers = Vec::with_capacity(count);
        for _ in 0..count {
            numbers.push(read_number(&mut cursor, dtype)?);
        }
        let data = match dtype {
            Dtype::Int64 => ArrayData::Int64(numbers.iter().filter_map(Number::as_i64).collect()),
            Dtype::Float64 => ArrayData::Float64(numbers.iter().map(Number::as_f64).collect()),
            Dtype::Complex128 => {
                ArrayData::Complex128(numbers.iter().map(Number::as_complex).collect())
            }
        };
        Ok(Value::Array(NdArray::new(shape, data)?))
    }
}

/// Raw byte strings.
#[derive(Clone, Copy, Debug, Default)]
pub struct BytesCodec;

impl BlobCodec for BytesCodec {
    fn type_tag(&self) -> &str {
        "bytes"
    }

    fn claims(&self, value: &Value) -> bool {
        matches!(value, Value::Bytes(_))
    }

    fn write_blob(&self, value: &Value, writer: &mut dyn Write) -> Result<Dictionary> {
        let bytes = value
            .as_bytes()
            .ok_or_else(|| Error::unsupported_value("<blob>", "expected bytes"))?;
        writer.write_all(bytes)?;
        let mut preamble = Dictionary::new();
        preamble.set("length", Value::from(bytes.len()));
        Ok(preamble)
    }

    fn read_blob(&self, preamble: &Dictionary, reader: &mut dyn Read) -> Result<Value> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        if let Some(length) = preamble.get("length").and_then(Value::as_i64) {
            if usize::try_from(length).ok() != Some(bytes.len()) {
                return Err(Error::format(format!(
                    "shape mismatch: expected {} bytes, payload has {}",
                    length,
                    bytes.len()
                )));
            }
        }
        Ok(Value::Bytes(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ndarray_codec() {
        let array = NdArray::new(vec![2, 2, 1], ArrayData::Int64(vec![1, -2, 3, 4])).unwrap();
        let value = Value::Array(array);
        let mut buf = Vec::new();
        let preamble = NdArrayCodec.write_blob(&value, &mut buf).unwrap();
        assert_eq!(buf.len(), 32);
        assert_eq!(preamble.get("dtype").and_then(Value::as_str), Some("<i8"));
        assert_eq!(NdArrayCodec.read_blob(&preamble, &mut buf.as_slice()).unwrap(), value);

        assert!(NdArrayCodec.read_blob(&preamble, &mut &buf[..24]).is_err());
    }

    #[test]
    fn test_bytes_codec_length_check() {
        let value = Value::Bytes(vec![0, 1, 2, 255]);
        let mut buf = Vec::new();
        let preamble = BytesCodec.write_blob(&value, &mut buf).unwrap();
        assert_eq!(BytesCodec.read_blob(&preamble, &mut buf.as_slice()).unwrap(), value);
        let err = BytesCodec.read_blob(&preamble, &mut &buf[..2]).unwrap_err();
        assert!(err.is_format_error());
    }

    #[test]
    fn test_registry_lookup() {
        let codecs = BlobCodecs::default();
        assert!(codecs.get("ndarray").is_some());
        assert!(codecs.claiming(&Value::Bytes(vec![])).is_some());
        assert!(codecs.claiming(&Value::from(1)).is_none());
    }
}
