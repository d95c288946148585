//! Lists, tuples and maps too complex for one line.
//!
//! Elements become numbered sub-entries `0`, `1`, ...; map entries become
//! `<i>/k` and `<i>/v` pairs. Each element is dispatched again when written, so
//! a list of tables expands into a list of table branches.
//!
//! The element count is stored as `length`, since elements that write no lines
//! (an empty dictionary) leave no numbered key behind.

use super::{EntryContext, TYPE_KEY};
use crate::{Dictionary, Error, Result, Value};

pub(super) const DISCRIMINATOR: &str = "expanded";

const KIND_KEY: &str = "container_type";
const LENGTH_KEY: &str = "length";

pub(super) fn expand(value: &Value, ctx: &mut EntryContext<'_>) -> Result<Dictionary> {
    let mut branch = Dictionary::new();
    branch.set(TYPE_KEY, Value::from(DISCRIMINATOR));
    match value {
        Value::List(items) | Value::Tuple(items) => {
            let kind = if matches!(value, Value::List(_)) { "list" } else { "tuple" };
            branch.set(KIND_KEY, Value::from(kind));
            branch.set(LENGTH_KEY, Value::from(items.len()));
            for (i, item) in items.iter().enumerate() {
                branch.insert_key(&i.to_string(), item.clone());
            }
        }
        Value::Map(entries) => {
            branch.set(KIND_KEY, Value::from("map"));
            branch.set(LENGTH_KEY, Value::from(entries.len()));
            for (i, (k, v)) in entries.iter().enumerate() {
                let index = i.to_string();
                branch.set([index.as_str(), "k"], k.clone());
                branch.set([index.as_str(), "v"], v.clone());
            }
        }
        other => {
            return Err(Error::unsupported_value(
                &ctx.path_string(),
                &format!("cannot expand {} value", other.kind_name()),
            ))
        }
    }
    Ok(branch)
}

/// Element `i`, or an empty dictionary if nothing was written for it.
fn element(branch: &Dictionary, index: usize) -> Value {
    branch
        .get(index.to_string())
        .cloned()
        .unwrap_or_else(|| Value::Dict(Dictionary::with_policy(branch.policy())))
}

pub(super) fn collapse(branch: &Dictionary) -> Result<Value> {
    let kind = branch
        .get(KIND_KEY)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::missing_field(DISCRIMINATOR, KIND_KEY))?;
    let count = element_count(branch)?;
    let mut elements = Vec::new();
    elements
        .try_reserve_exact(count)
        .map_err(|_| Error::format(format!("container length {} is too large", count)))?;
    elements.extend((0..count).map(|i| element(branch, i)));

    match kind {
        "list" => Ok(Value::List(elements)),
        "tuple" => Ok(Value::Tuple(elements)),
        "map" => {
            let entries = elements
                .into_iter()
                .enumerate()
                .map(|(i, pair)| match pair {
                    Value::Dict(pair) => {
                        let part = |field: &str| {
                            pair.get(field)
                                .cloned()
                                .unwrap_or_else(|| Value::Dict(Dictionary::with_policy(pair.policy())))
                        };
                        Ok((part("k"), part("v")))
                    }
                    other => Err(Error::format(format!(
                        "map entry {} is a {}, expected a k/v branch",
                        i,
                        other.kind_name()
                    ))),
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::Map(entries))
        }
        other => Err(Error::format(format!("unknown container type '{}'", other))),
    }
}

/// The stored `length`, or one past the highest numbered key for branches without it.
fn element_count(branch: &Dictionary) -> Result<usize> {
    let written = branch
        .keys()
        .filter_map(|key| key.parse::<usize>().ok())
        .max()
        .map_or(0, |max| max + 1);
    let Some(value) = branch.get(LENGTH_KEY) else {
        return Ok(written);
    };
    let length = value
        .as_i64()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| Error::format(format!("invalid container length {}", value)))?;
    if length < written {
        return Err(Error::format(format!(
            "container length {} is shorter than its {} elements",
            length, written
        )));
    }
    Ok(length)
}
