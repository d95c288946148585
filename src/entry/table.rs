//! Inline and external table entries.

use super::{EntryContext, EntrySettings, TYPE_KEY};
use crate::location::{DataKind, LocationFile, LocationName, NameStart, OpenMode};
use crate::table_codec::{
    BinaryPreamble, BinaryTableCodec, ColumnSpec, DtypePolicy, TableCodec, TextTableCodec,
};
use crate::{Dictionary, Error, Result, Table, TableFormat, Value};

pub(super) const DISCRIMINATOR: &str = "table";
pub(super) const FORMAT_KEY: &str = "format";

const DATA_KEY: &str = "data";
const FILE_KEY: &str = "file_path";
const COLUMNS_KEY: &str = "columns";
const INDEX_KEY: &str = "index_columns";
const GROUPS_KEY: &str = "column_groups";
const PREAMBLE_KEY: &str = "preamble";

/// How an external table's sibling file is encoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TableStorage {
    Text,
    Binary,
}

impl TableStorage {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            TableStorage::Text => "text",
            TableStorage::Binary => "binary",
        }
    }

    const fn extension(&self) -> &'static str {
        match self {
            TableStorage::Text => "dat",
            TableStorage::Binary => "bin",
        }
    }

    /// Text takes non-numeric tables when binary storage was requested.
    pub(super) fn claims(&self, value: &Value, settings: &EntrySettings) -> bool {
        let Value::Table(table) = value else {
            return false;
        };
        match (self, settings.table_format) {
            (TableStorage::Text, TableFormat::Text) => true,
            (TableStorage::Text, TableFormat::Binary) => !table.is_numeric(),
            (TableStorage::Binary, TableFormat::Binary) => table.is_numeric(),
            _ => false,
        }
    }

    pub(super) fn to_branch(&self, value: &Value, ctx: &mut EntryContext<'_>) -> Result<Dictionary> {
        let table = expect_table(value, ctx)?;
        let preamble = match self {
            TableStorage::Text => None,
            TableStorage::Binary => Some(
                BinaryPreamble::for_table(table, ctx.settings.packing).ok_or_else(|| {
                    Error::unsupported_value(&ctx.path_string(), "binary tables must be numeric")
                })?,
            ),
        };

        let prefix = ctx.sibling_prefix("table", self.extension());
        let delimiter = ctx.settings.delimiter;
        let location = ctx.location()?;
        let name = location.generate_new_name(&prefix, NameStart::PrefixFirst)?;
        let kind = match self {
            TableStorage::Text => DataKind::Text,
            TableStorage::Binary => DataKind::Binary,
        };
        let mut file = LocationFile::open(location, name.clone(), OpenMode::Write, kind)?;
        match preamble {
            Some(preamble) => BinaryTableCodec::new(preamble).write_table(&mut file, &table.rows, &table.columns)?,
            None => TextTableCodec::new(delimiter).write_table(&mut file, &table.rows, &table.columns)?,
        }
        file.close()?;
        tracing::debug!(path = %ctx.path_string(), file = %name, storage = self.as_str(), "wrote external table");

        let mut branch = Dictionary::new();
        branch.set(TYPE_KEY, Value::from(DISCRIMINATOR));
        branch.set(FORMAT_KEY, Value::from(self.as_str()));
        branch.set(FILE_KEY, Value::from(name.to_string()));
        if !table.columns.is_empty() {
            branch.set(COLUMNS_KEY, string_list(&table.columns));
        }
        set_layout(&mut branch, table);
        if let Some(preamble) = preamble {
            branch.set(PREAMBLE_KEY, Value::Dict(preamble.to_dict()));
        }
        Ok(branch)
    }

    pub(super) fn from_branch(&self, branch: &Dictionary, ctx: &mut EntryContext<'_>) -> Result<Value> {
        let file_path = branch
            .get(FILE_KEY)
            .and_then(Value::as_str)
            .ok_or_else(|| Error::missing_field(DISCRIMINATOR, FILE_KEY))?;
        let name = LocationName::parse(file_path);
        let columns = match branch.get(COLUMNS_KEY) {
            Some(value) => ColumnSpec::Names(strings(value)?),
            None => ColumnSpec::Any,
        };
        let preamble = match self {
            TableStorage::Text => None,
            TableStorage::Binary => {
                let dict = branch
                    .branch(PREAMBLE_KEY)
                    .ok_or_else(|| Error::missing_field(DISCRIMINATOR, PREAMBLE_KEY))?;
                Some(BinaryPreamble::from_dict(dict)?)
            }
        };

        let path = ctx.path_string();
        let delimiter = ctx.settings.delimiter;
        let location = ctx.location()?;
        let kind = match self {
            TableStorage::Text => DataKind::Text,
            TableStorage::Binary => DataKind::Binary,
        };
        let mut file = LocationFile::open(location, name, OpenMode::Read, kind)?;
        let data = match preamble {
            Some(preamble) => {
                BinaryTableCodec::new(preamble).read_table(&mut file, &columns, DtypePolicy::Infer)?
            }
            None => TextTableCodec::new(delimiter).read_table(&mut file, &columns, DtypePolicy::Infer)?,
        };
        file.close()?;
        if !data.corrupted.is_empty() {
            tracing::warn!(path = %path, rows = ?data.corrupted, "external table has corrupted rows");
        }

        let mut table = Table::new(data.rows).with_columns(data.columns);
        read_layout(&mut table, branch)?;
        Ok(Value::Table(table))
    }
}

fn expect_table<'v>(value: &'v Value, ctx: &EntryContext<'_>) -> Result<&'v Table> {
    value
        .as_table()
        .ok_or_else(|| Error::unsupported_value(&ctx.path_string(), "expected a table"))
}

fn string_list(items: &[String]) -> Value {
    Value::List(items.iter().map(|s| Value::from(s.as_str())).collect())
}

fn strings(value: &Value) -> Result<Vec<String>> {
    value
        .as_slice()
        .ok_or_else(|| Error::format(format!("expected a list of names, got {}", value)))?
        .iter()
        .map(|item| match item {
            Value::String(s) => Ok(s.clone()),
            other => Ok(other.to_string()),
        })
        .collect()
}

fn set_layout(branch: &mut Dictionary, table: &Table) {
    if table.index_columns > 0 {
        branch.set(INDEX_KEY, Value::from(table.index_columns));
    }
    if !table.column_groups.is_empty() {
        branch.set(GROUPS_KEY, string_list(&table.column_groups));
    }
}

fn read_layout(table: &mut Table, branch: &Dictionary) -> Result<()> {
    if let Some(value) = branch.get(INDEX_KEY) {
        table.index_columns = value
            .as_i64()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| Error::format(format!("invalid index column count {}", value)))?;
    }
    if let Some(value) = branch.get(GROUPS_KEY) {
        table.column_groups = strings(value)?;
    }
    Ok(())
}

pub(super) fn inline_claims(value: &Value, settings: &EntrySettings) -> bool {
    matches!(value, Value::Table(_)) && settings.table_format == TableFormat::Inline
}

/// The block keeps rows and column names; index and group metadata live beside it.
pub(super) fn inline_to_branch(value: &Value, ctx: &mut EntryContext<'_>) -> Result<Dictionary> {
    let table = expect_table(value, ctx)?;
    let block = Table {
        index_columns: 0,
        column_groups: Vec::new(),
        ..table.clone()
    };
    let mut branch = Dictionary::new();
    branch.set(TYPE_KEY, Value::from(DISCRIMINATOR));
    branch.set(FORMAT_KEY, Value::from("inline"));
    branch.set(DATA_KEY, Value::InlineTable(block));
    set_layout(&mut branch, table);
    Ok(branch)
}

pub(super) fn inline_from_branch(branch: &Dictionary) -> Result<Value> {
    let mut table = branch
        .get(DATA_KEY)
        .and_then(Value::as_table)
        .cloned()
        .ok_or_else(|| Error::missing_field(DISCRIMINATOR, DATA_KEY))?;
    read_layout(&mut table, branch)?;
    Ok(Value::Table(table))
}
