//! Conversion between typed values and the branches that represent them on disk.
//!
//! A value that does not fit on one line is handed to an [`EntryBuilder`],
//! which turns it into a *branch*: a sub-dictionary whose leaves are plain
//! entries and whose `__type__` field names the kind that produced it. On read,
//! every sub-dictionary is offered to the [`EntryParser`]s, and the first one
//! that recognizes it rebuilds the typed value.
//!
//! The built-in kinds are the variants of [`EntryKind`]. Consumers add their own
//! kinds by implementing the two traits and registering them, either per call
//! ([`WriteOptions::with_builder`](crate::WriteOptions::with_builder),
//! [`ReadOptions::with_parser`](crate::ReadOptions::with_parser)) or in an
//! [`EntryRegistry`]. Dispatch is first match wins: per-call entries, then the
//! registry in order.
//!
//! ```rust
//! use dictfile::{from_str, to_string_with_options, Dictionary, Value, WriteOptions};
//!
//! let mut dict = Dictionary::new();
//! dict.set("levels", Value::List(vec![Value::from(1), Value::List(vec![Value::from(2)])]));
//!
//! let text = to_string_with_options(&dict, &WriteOptions::new().with_timestamp(false)).unwrap();
//! assert!(text.contains("levels/__type__\texpanded\n"));
//! assert_eq!(from_str(&text).unwrap().data, dict);
//! ```

mod blob;
mod container;
mod table;

pub use blob::{BlobCodec, BlobCodecs, BytesCodec, NdArrayCodec};
pub use table::TableStorage;

use crate::location::{Location, LocationName};
use crate::table_codec::Packing;
use crate::{Delimiter, Dictionary, Result, StorageMisuse, TableFormat, Value};
use std::fmt;
use std::sync::Arc;

/// Branch field holding the discriminator.
pub const TYPE_KEY: &str = "__type__";

/// Write settings visible to builders.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EntrySettings {
    pub table_format: TableFormat,
    pub delimiter: Delimiter,
    pub packing: Packing,
}

/// What a builder or parser knows about the entry it is handling.
pub struct EntryContext<'a> {
    /// Full path of the entry inside the dictionary being read or written.
    pub path: Vec<String>,
    pub settings: EntrySettings,
    location: Option<&'a mut dyn Location>,
}

impl<'a> EntryContext<'a> {
    pub fn new(settings: EntrySettings, location: Option<&'a mut dyn Location>) -> Self {
        EntryContext {
            path: Vec::new(),
            settings,
            location,
        }
    }

    #[must_use]
    pub fn path_string(&self) -> String {
        self.path.join("/")
    }

    /// Sibling name derived from the entry path: `a/b` becomes `a_b.<ext>`.
    ///
    /// Separators and dots inside segments become `_`, so the name never leaves
    /// the location's directory.
    #[must_use]
    pub fn sibling_prefix(&self, fallback: &str, ext: &str) -> LocationName {
        let stem = self
            .path
            .iter()
            .map(|segment| segment.replace(['/', '\\', '.'], "_"))
            .collect::<Vec<_>>()
            .join("_");
        let stem = if stem.is_empty() { fallback.to_string() } else { stem };
        LocationName::new([stem], Some(ext))
    }

    #[must_use]
    pub fn has_location(&self) -> bool {
        self.location.is_some()
    }

    /// The storage location, for entries written to sibling artifacts.
    pub fn location(&mut self) -> Result<&mut dyn Location> {
        let path = self.path_string();
        match &mut self.location {
            Some(location) => Ok(&mut **location),
            None => Err(StorageMisuse::NoLocation(path).into()),
        }
    }
}

impl fmt::Debug for EntryContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryContext")
            .field("path", &self.path)
            .field("settings", &self.settings)
            .field("location", &self.location)
            .finish()
    }
}

/// Turns in-memory values into branches.
pub trait EntryBuilder: fmt::Debug + Send + Sync {
    fn is_value_mine(&self, value: &Value, ctx: &EntryContext<'_>) -> bool;

    /// Builds a fresh branch for `value`. The caller's dictionary is never touched.
    fn to_branch(&self, value: &Value, ctx: &mut EntryContext<'_>) -> Result<Dictionary>;
}

/// Turns branches back into in-memory values.
pub trait EntryParser: fmt::Debug + Send + Sync {
    /// Value of the `__type__` field this parser handles.
    fn discriminator(&self) -> &str;

    /// Optional secondary `(field, value)` that must also match.
    fn subtype(&self) -> Option<(&str, &str)> {
        None
    }

    fn is_branch_mine(&self, branch: &Dictionary) -> bool {
        let field_is = |field: &str, expected: &str| {
            branch.get(field).and_then(Value::as_str) == Some(expected)
        };
        field_is(TYPE_KEY, self.discriminator())
            && self
                .subtype()
                .map_or(true, |(field, expected)| field_is(field, expected))
    }

    fn from_branch(&self, branch: &Dictionary, ctx: &mut EntryContext<'_>) -> Result<Value>;
}

/// The built-in entry kinds.
#[derive(Clone, Debug)]
pub enum EntryKind {
    /// Table written as a delimited block inside the dictionary file.
    InlineTable,
    /// Table written to a sibling file.
    ExternalTable(TableStorage),
    /// Typed payload written whole to a sibling file by a registered codec.
    ExternalBlob(BlobCodecs),
    /// List, tuple or map expanded into numbered sub-branches.
    ExpandedContainer,
}

impl EntryBuilder for EntryKind {
    fn is_value_mine(&self, value: &Value, ctx: &EntryContext<'_>) -> bool {
        match self {
            EntryKind::InlineTable => table::inline_claims(value, &ctx.settings),
            EntryKind::ExternalTable(storage) => storage.claims(value, &ctx.settings),
            EntryKind::ExternalBlob(codecs) => codecs.claiming(value).is_some(),
            EntryKind::ExpandedContainer => {
                matches!(value, Value::List(_) | Value::Tuple(_) | Value::Map(_))
            }
        }
    }

    fn to_branch(&self, value: &Value, ctx: &mut EntryContext<'_>) -> Result<Dictionary> {
        match self {
            EntryKind::InlineTable => table::inline_to_branch(value, ctx),
            EntryKind::ExternalTable(storage) => storage.to_branch(value, ctx),
            EntryKind::ExternalBlob(codecs) => blob::to_branch(codecs, value, ctx),
            EntryKind::ExpandedContainer => container::expand(value, ctx),
        }
    }
}

impl EntryParser for EntryKind {
    fn discriminator(&self) -> &str {
        match self {
            EntryKind::InlineTable | EntryKind::ExternalTable(_) => table::DISCRIMINATOR,
            EntryKind::ExternalBlob(_) => blob::DISCRIMINATOR,
            EntryKind::ExpandedContainer => container::DISCRIMINATOR,
        }
    }

    fn subtype(&self) -> Option<(&str, &str)> {
        match self {
            EntryKind::InlineTable => Some((table::FORMAT_KEY, "inline")),
            EntryKind::ExternalTable(storage) => Some((table::FORMAT_KEY, storage.as_str())),
            EntryKind::ExternalBlob(_) | EntryKind::ExpandedContainer => None,
        }
    }

    fn is_branch_mine(&self, branch: &Dictionary) -> bool {
        let discriminated = branch.get(TYPE_KEY).and_then(Value::as_str) == Some(self.discriminator());
        match self {
            EntryKind::ExternalBlob(codecs) => {
                discriminated
                    && branch
                        .get(blob::BLOB_TYPE_KEY)
                        .and_then(Value::as_str)
                        .map_or(false, |tag| codecs.get(tag).is_some())
            }
            _ => {
                discriminated
                    && self.subtype().map_or(true, |(field, expected)| {
                        branch.get(field).and_then(Value::as_str) == Some(expected)
                    })
            }
        }
    }

    fn from_branch(&self, branch: &Dictionary, ctx: &mut EntryContext<'_>) -> Result<Value> {
        match self {
            EntryKind::InlineTable => table::inline_from_branch(branch),
            EntryKind::ExternalTable(storage) => storage.from_branch(branch, ctx),
            EntryKind::ExternalBlob(codecs) => blob::from_branch(codecs, branch, ctx),
            EntryKind::ExpandedContainer => container::collapse(branch),
        }
    }
}

/// An ordered list of builders and parsers, consulted first match wins.
///
/// The default registry holds the built-in kinds in this order: inline table,
/// external text table, external binary table, external blob, expanded container.
///
/// # Examples
///
/// ```rust
/// use dictfile::entry::{EntryKind, EntryRegistry};
/// use std::sync::Arc;
///
/// let mut registry = EntryRegistry::empty();
/// registry.register_kind(Arc::new(EntryKind::ExpandedContainer));
/// assert_eq!(registry.builders().len(), 1);
/// assert_eq!(EntryRegistry::default().parsers().len(), 5);
/// ```
#[derive(Clone, Debug)]
pub struct EntryRegistry {
    builders: Vec<Arc<dyn EntryBuilder>>,
    parsers: Vec<Arc<dyn EntryParser>>,
}

impl Default for EntryRegistry {
    fn default() -> Self {
        let mut registry = EntryRegistry::empty();
        for kind in [
            EntryKind::InlineTable,
            EntryKind::ExternalTable(TableStorage::Text),
            EntryKind::ExternalTable(TableStorage::Binary),
            EntryKind::ExternalBlob(BlobCodecs::default()),
            EntryKind::ExpandedContainer,
        ] {
            registry.register_kind(Arc::new(kind));
        }
        registry
    }
}

impl EntryRegistry {
    #[must_use]
    pub fn empty() -> Self {
        EntryRegistry {
            builders: Vec::new(),
            parsers: Vec::new(),
        }
    }

    pub fn push_builder(&mut self, builder: Arc<dyn EntryBuilder>) {
        self.builders.push(builder);
    }

    pub fn push_parser(&mut self, parser: Arc<dyn EntryParser>) {
        self.parsers.push(parser);
    }

    /// Registers a kind that both builds and parses.
    pub fn register_kind<K>(&mut self, kind: Arc<K>)
    where
        K: EntryBuilder + EntryParser + 'static,
    {
        self.builders.push(kind.clone());
        self.parsers.push(kind);
    }

    #[must_use]
    pub fn builders(&self) -> &[Arc<dyn EntryBuilder>] {
        &self.builders
    }

    #[must_use]
    pub fn parsers(&self) -> &[Arc<dyn EntryParser>] {
        &self.parsers
    }
}

/// First builder claiming `value`: `extra` in order, then the registry.
pub(crate) fn find_builder<'r>(
    extra: &'r [Arc<dyn EntryBuilder>],
    registry: &'r EntryRegistry,
    value: &Value,
    ctx: &EntryContext<'_>,
) -> Option<&'r Arc<dyn EntryBuilder>> {
    extra
        .iter()
        .chain(registry.builders())
        .find(|builder| builder.is_value_mine(value, ctx))
}

/// First parser recognizing `branch`: `extra` in order, then the registry.
pub(crate) fn find_parser<'r>(
    extra: &'r [Arc<dyn EntryParser>],
    registry: &'r EntryRegistry,
    branch: &Dictionary,
) -> Option<&'r Arc<dyn EntryParser>> {
    extra
        .iter()
        .chain(registry.parsers())
        .find(|parser| parser.is_branch_mine(branch))
}

/// Replaces every recognized branch below `dict` with its parsed value.
///
/// Children are resolved before their parents, so a container branch sees its
/// elements already rebuilt. Unrecognized branches stay as they are.
pub(crate) fn resolve_branches(
    dict: &mut Dictionary,
    extra: &[Arc<dyn EntryParser>],
    registry: &EntryRegistry,
    ctx: &mut EntryContext<'_>,
) -> Result<()> {
    for (key, value) in dict.iter_mut() {
        let Value::Dict(branch) = &mut *value else {
            continue;
        };
        ctx.path.push(key.clone());
        resolve_branches(branch, extra, registry, ctx)?;
        if let Some(parser) = find_parser(extra, registry, branch) {
            tracing::trace!(path = %ctx.path_string(), parser = ?parser, "parsing entry branch");
            let parsed = parser.from_branch(branch, ctx)?;
            *value = parsed;
        }
        ctx.path.pop();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Table;

    fn ctx(table_format: TableFormat) -> EntryContext<'static> {
        EntryContext::new(
            EntrySettings {
                table_format,
                ..Default::default()
            },
            None,
        )
    }

    #[test]
    fn test_builder_precedence() {
        let registry = EntryRegistry::default();
        let table = Value::Table(Table::from_f64_rows(&[vec![1.0]]));

        let builder = find_builder(&[], &registry, &table, &ctx(TableFormat::Binary)).unwrap();
        assert!(format!("{:?}", builder).contains("Binary"));

        let builder = find_builder(&[], &registry, &table, &ctx(TableFormat::Inline)).unwrap();
        assert!(format!("{:?}", builder).contains("InlineTable"));

        let extra: Vec<Arc<dyn EntryBuilder>> = vec![Arc::new(EntryKind::ExpandedContainer)];
        let list = Value::List(vec![Value::List(vec![])]);
        let empty = EntryRegistry::empty();
        let builder = find_builder(&extra, &empty, &list, &ctx(TableFormat::Inline));
        assert!(builder.is_some());
    }

    #[test]
    fn test_binary_falls_back_to_text_for_strings() {
        let registry = EntryRegistry::default();
        let table = Value::Table(Table::new(vec![vec![Value::from("a")]]));
        let builder = find_builder(&[], &registry, &table, &ctx(TableFormat::Binary)).unwrap();
        assert!(format!("{:?}", builder).contains("Text"));
    }

    #[test]
    fn test_external_without_location_fails() {
        let table = Value::Table(Table::from_f64_rows(&[vec![1.0]]));
        let mut ctx = ctx(TableFormat::Text);
        ctx.path = vec!["t".to_string()];
        let err = EntryKind::ExternalTable(TableStorage::Text)
            .to_branch(&table, &mut ctx)
            .unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Storage(StorageMisuse::NoLocation(ref path)) if path == "t"
        ));
    }

    #[test]
    fn test_branch_matching() {
        let mut branch = Dictionary::new();
        branch.set(TYPE_KEY, Value::from("table"));
        branch.set("format", Value::from("text"));
        assert!(EntryKind::ExternalTable(TableStorage::Text).is_branch_mine(&branch));
        assert!(!EntryKind::ExternalTable(TableStorage::Binary).is_branch_mine(&branch));
        assert!(!EntryKind::InlineTable.is_branch_mine(&branch));

        let mut blob = Dictionary::new();
        blob.set(TYPE_KEY, Value::from("blob"));
        blob.set("blob_type", Value::from("unknown"));
        assert!(!EntryKind::ExternalBlob(BlobCodecs::default()).is_branch_mine(&blob));
    }

    #[test]
    fn test_unrecognized_branch_is_kept() {
        let mut dict = Dictionary::new();
        dict.set("x/__type__", Value::from("mystery"));
        dict.set("x/field", Value::from(1));
        let before = dict.clone();
        resolve_branches(&mut dict, &[], &EntryRegistry::default(), &mut ctx(TableFormat::Inline))
            .unwrap();
        assert_eq!(dict, before);
    }
}
