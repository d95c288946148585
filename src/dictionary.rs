//! Hierarchical, path-addressed container.
//!
//! [`Dictionary`] maps structured paths (sequences of segments) to [`Value`]s.
//! Nested levels are themselves dictionaries stored as [`Value::Dict`], and every
//! level keeps insertion order through [`IndexMap`].
//!
//! Paths are given either as separator-joined strings (`"scan/trace"`) or as
//! sequences of segments (`["scan", "trace"]`). Segments given as a sequence are
//! not split again, so they may contain the separator. Each segment is
//! normalized with the dictionary's [`KeyPolicy`].
//!
//! ## Examples
//!
//! ```rust
//! use dictfile::{Dictionary, Value};
//!
//! let mut dict = Dictionary::new();
//! dict.insert("scan/rate", Value::from(10)).unwrap();
//! dict.insert(["scan", "name"], Value::from("fast")).unwrap();
//!
//! assert_eq!(dict.get("scan/rate").and_then(Value::as_i64), Some(10));
//! assert_eq!(dict.branch("scan").map(|b| b.len()), Some(2));
//! ```

use crate::options::CasePolicy;
use crate::{Error, Result, Value};
use indexmap::IndexMap;
use serde::{Serialize, Serializer};

/// How path strings are split and segments normalized.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyPolicy {
    pub case: CasePolicy,
    pub separator: char,
}

impl Default for KeyPolicy {
    fn default() -> Self {
        KeyPolicy {
            case: CasePolicy::Sensitive,
            separator: '/',
        }
    }
}

/// Anything that can be turned into a sequence of path segments.
pub trait PathLike {
    fn push_segments(&self, separator: char, out: &mut Vec<String>);
}

impl PathLike for str {
    fn push_segments(&self, separator: char, out: &mut Vec<String>) {
        out.extend(
            self.split(separator)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        );
    }
}

impl PathLike for String {
    fn push_segments(&self, separator: char, out: &mut Vec<String>) {
        self.as_str().push_segments(separator, out);
    }
}

impl<T: PathLike + ?Sized> PathLike for &T {
    fn push_segments(&self, separator: char, out: &mut Vec<String>) {
        (**self).push_segments(separator, out);
    }
}

/// Already split segments: each element is one segment, separators included.
impl<T: AsRef<str>> PathLike for [T] {
    fn push_segments(&self, _separator: char, out: &mut Vec<String>) {
        out.extend(
            self.iter()
                .map(AsRef::as_ref)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        );
    }
}

impl<T: AsRef<str>> PathLike for Vec<T> {
    fn push_segments(&self, separator: char, out: &mut Vec<String>) {
        self.as_slice().push_segments(separator, out);
    }
}

impl<T: AsRef<str>, const N: usize> PathLike for [T; N] {
    fn push_segments(&self, separator: char, out: &mut Vec<String>) {
        self.as_slice().push_segments(separator, out);
    }
}

/// An ordered mapping from structured paths to values.
///
/// Sub-dictionaries returned by [`branch_mut`](Dictionary::branch_mut) are views
/// into the same storage: changes made through them show up in the parent.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dictionary {
    entries: IndexMap<String, Value>,
    policy: KeyPolicy,
}

impl Dictionary {
    /// Creates an empty, case-sensitive dictionary using `/` as separator.
    #[must_use]
    pub fn new() -> Self {
        Dictionary::default()
    }

    #[must_use]
    pub fn with_policy(policy: KeyPolicy) -> Self {
        Dictionary {
            entries: IndexMap::new(),
            policy,
        }
    }

    #[must_use]
    pub fn policy(&self) -> KeyPolicy {
        self.policy
    }

    /// Splits and normalizes a path under this dictionary's policy.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dictfile::{CasePolicy, Dictionary, KeyPolicy};
    ///
    /// let dict = Dictionary::with_policy(KeyPolicy { case: CasePolicy::Lower, separator: '/' });
    /// let path = dict.normalize_path("Scan//Trace/");
    /// assert_eq!(path, vec!["scan", "trace"]);
    /// assert_eq!(dict.normalize_path(&path), path);
    /// ```
    #[must_use]
    pub fn normalize_path(&self, path: impl PathLike) -> Vec<String> {
        let mut raw = Vec::new();
        path.push_segments(self.policy.separator, &mut raw);
        raw.iter().map(|s| self.policy.case.apply(s)).collect()
    }

    #[must_use]
    pub fn get(&self, path: impl PathLike) -> Option<&Value> {
        let segments = self.normalize_path(path);
        let (last, parents) = segments.split_last()?;
        let mut dict = self;
        for segment in parents {
            dict = dict.entries.get(segment)?.as_dict()?;
        }
        dict.entries.get(last)
    }

    pub fn get_mut(&mut self, path: impl PathLike) -> Option<&mut Value> {
        let segments = self.normalize_path(path);
        let (last, parents) = segments.split_last()?;
        let mut dict = self;
        for segment in parents {
            dict = dict.entries.get_mut(segment)?.as_dict_mut()?;
        }
        dict.entries.get_mut(last)
    }

    #[must_use]
    pub fn contains(&self, path: impl PathLike) -> bool {
        self.get(path).is_some()
    }

    /// Inserts a value, creating intermediate levels as needed.
    ///
    /// Returns the previous value at the path. Fails if an intermediate segment
    /// holds a non-dictionary value or the path is empty.
    pub fn insert(&mut self, path: impl PathLike, value: Value) -> Result<Option<Value>> {
        let segments = self.normalize_path(path);
        let (last, parents) = segments
            .split_last()
            .ok_or_else(|| Error::invalid_path("empty path"))?;
        let policy = self.policy;
        let mut dict = self;
        for (depth, segment) in parents.iter().enumerate() {
            let entry = dict
                .entries
                .entry(segment.clone())
                .or_insert_with(|| Value::Dict(Dictionary::with_policy(policy)));
            dict = match entry {
                Value::Dict(sub) => sub,
                other => {
                    return Err(Error::invalid_path(&format!(
                        "'{}' holds a {} value",
                        segments[..=depth].join("/"),
                        other.kind_name()
                    )))
                }
            };
        }
        Ok(dict.entries.insert(last.clone(), adopt(value, policy)))
    }

    /// Inserts a value, replacing any leaf that stands in the way.
    ///
    /// An empty path leaves the dictionary unchanged.
    pub fn set(&mut self, path: impl PathLike, value: Value) -> Option<Value> {
        let segments = self.normalize_path(path);
        let (last, parents) = segments.split_last()?;
        let policy = self.policy;
        let mut dict = self;
        for segment in parents {
            let entry = dict
                .entries
                .entry(segment.clone())
                .or_insert_with(|| Value::Dict(Dictionary::with_policy(policy)));
            if !entry.is_dict() {
                *entry = Value::Dict(Dictionary::with_policy(policy));
            }
            dict = entry.as_dict_mut()?;
        }
        dict.entries.insert(last.clone(), adopt(value, policy))
    }

    /// Inserts under a single key without splitting it on the separator.
    pub fn insert_key(&mut self, key: &str, value: Value) -> Option<Value> {
        let key = self.policy.case.apply(key);
        let policy = self.policy;
        self.entries.insert(key, adopt(value, policy))
    }

    /// Removes the value at a path, keeping the order of the remaining entries.
    pub fn remove(&mut self, path: impl PathLike) -> Option<Value> {
        let segments = self.normalize_path(path);
        let (last, parents) = segments.split_last()?;
        let mut dict = self;
        for segment in parents {
            dict = dict.entries.get_mut(segment)?.as_dict_mut()?;
        }
        dict.entries.shift_remove(last)
    }

    /// Returns the sub-dictionary rooted at `path`; the empty path yields `self`.
    #[must_use]
    pub fn branch(&self, path: impl PathLike) -> Option<&Dictionary> {
        let segments = self.normalize_path(path);
        if segments.is_empty() {
            return Some(self);
        }
        self.get(&segments)?.as_dict()
    }

    /// Mutable branch pointer: edits through it change this dictionary.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dictfile::{Dictionary, Value};
    ///
    /// let mut dict = Dictionary::new();
    /// dict.insert("scan/rate", Value::from(10)).unwrap();
    /// if let Some(scan) = dict.branch_mut("scan") {
    ///     scan.insert("rate", Value::from(20)).unwrap();
    /// }
    /// assert_eq!(dict.get("scan/rate").and_then(Value::as_i64), Some(20));
    /// ```
    pub fn branch_mut(&mut self, path: impl PathLike) -> Option<&mut Dictionary> {
        let segments = self.normalize_path(path);
        if segments.is_empty() {
            return Some(self);
        }
        self.get_mut(&segments)?.as_dict_mut()
    }

    /// All leaves in depth-first insertion order, with their full paths.
    ///
    /// Sub-dictionaries are descended into; empty ones contribute nothing.
    #[must_use]
    pub fn leaves(&self) -> Vec<(Vec<String>, &Value)> {
        let mut out = Vec::new();
        self.collect_leaves(&mut Vec::new(), &mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, prefix: &mut Vec<String>, out: &mut Vec<(Vec<String>, &'a Value)>) {
        for (key, value) in &self.entries {
            prefix.push(key.clone());
            match value {
                Value::Dict(sub) => sub.collect_leaves(prefix, out),
                leaf => out.push((prefix.clone(), leaf)),
            }
            prefix.pop();
        }
    }

    /// Number of top-level entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> indexmap::map::Keys<'_, String, Value> {
        self.entries.keys()
    }

    pub fn values(&self) -> indexmap::map::Values<'_, String, Value> {
        self.entries.values()
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, String, Value> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> indexmap::map::IterMut<'_, String, Value> {
        self.entries.iter_mut()
    }

    fn rekeyed(self, policy: KeyPolicy) -> Dictionary {
        let mut out = Dictionary::with_policy(policy);
        for (key, value) in self.entries {
            out.entries.insert(policy.case.apply(&key), adopt(value, policy));
        }
        out
    }
}

/// Re-keys nested dictionaries so they follow the policy of their new parent.
fn adopt(value: Value, policy: KeyPolicy) -> Value {
    match value {
        Value::Dict(dict) => Value::Dict(dict.rekeyed(policy)),
        other => other,
    }
}

impl Serialize for Dictionary {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl IntoIterator for Dictionary {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a Dictionary {
    type Item = (&'a String, &'a Value);
    type IntoIter = indexmap::map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lower() -> KeyPolicy {
        KeyPolicy {
            case: CasePolicy::Lower,
            separator: '/',
        }
    }

    #[test]
    fn test_insert_and_get_nested() {
        let mut dict = Dictionary::new();
        dict.insert("a", Value::from(1)).unwrap();
        dict.insert("b/c", Value::from(2)).unwrap();
        assert_eq!(dict.get("a"), Some(&Value::from(1)));
        assert_eq!(dict.get(["b", "c"]), Some(&Value::from(2)));
        assert!(dict.get("b").unwrap().is_dict());
        assert!(dict.get("b/c/d").is_none());
    }

    #[test]
    fn test_insert_through_leaf_fails() {
        let mut dict = Dictionary::new();
        dict.insert("a", Value::from(1)).unwrap();
        let err = dict.insert("a/b", Value::from(2)).unwrap_err();
        assert!(matches!(err, Error::InvalidPath(_)));

        // `set` replaces the leaf instead
        dict.set("a/b", Value::from(2));
        assert_eq!(dict.get("a/b"), Some(&Value::from(2)));
    }

    #[test]
    fn test_insert_returns_previous_and_keeps_order() {
        let mut dict = Dictionary::new();
        dict.insert("x", Value::from(1)).unwrap();
        dict.insert("y", Value::from(2)).unwrap();
        let old = dict.insert("x", Value::from(3)).unwrap();
        assert_eq!(old, Some(Value::from(1)));
        let keys: Vec<_> = dict.keys().cloned().collect();
        assert_eq!(keys, vec!["x", "y"]);
    }

    #[test]
    fn test_case_policy_normalizes_lookups() {
        let mut dict = Dictionary::with_policy(lower());
        dict.insert("Scan/Rate", Value::from(5)).unwrap();
        assert_eq!(dict.get("SCAN/rate"), Some(&Value::from(5)));
        let keys: Vec<_> = dict.keys().cloned().collect();
        assert_eq!(keys, vec!["scan"]);
    }

    #[test]
    fn test_inserted_subdict_adopts_policy() {
        let mut inner = Dictionary::new();
        inner.insert("Upper", Value::from(1)).unwrap();
        let mut dict = Dictionary::with_policy(lower());
        dict.insert("Sub", Value::Dict(inner)).unwrap();
        assert_eq!(dict.get("sub/upper"), Some(&Value::from(1)));
        assert_eq!(dict.branch("sub").unwrap().policy(), lower());
    }

    #[test]
    fn test_custom_separator() {
        let policy = KeyPolicy {
            case: CasePolicy::Sensitive,
            separator: '.',
        };
        let mut dict = Dictionary::with_policy(policy);
        dict.insert("a.b", Value::from(1)).unwrap();
        assert_eq!(dict.get(["a", "b"]), Some(&Value::from(1)));
        assert!(dict.get("a/b").is_none());
    }

    #[test]
    fn test_branch_pointer_aliases_storage() {
        let mut dict = Dictionary::new();
        dict.insert("g/k", Value::from("v")).unwrap();
        {
            let branch = dict.branch_mut("g").unwrap();
            branch.insert("k2", Value::from(2)).unwrap();
            branch.remove("k");
        }
        assert!(dict.get("g/k").is_none());
        assert_eq!(dict.get("g/k2"), Some(&Value::from(2)));
        assert!(std::ptr::eq(dict.branch("").unwrap(), &dict));
    }

    #[test]
    fn test_leaves_depth_first() {
        let mut dict = Dictionary::new();
        dict.insert("a", Value::from(1)).unwrap();
        dict.insert("b/c", Value::from(2)).unwrap();
        dict.insert("b/d/e", Value::from(3)).unwrap();
        dict.insert("f", Value::Dict(Dictionary::new())).unwrap();
        dict.insert("g", Value::from(4)).unwrap();

        let paths: Vec<String> = dict
            .leaves()
            .into_iter()
            .map(|(path, _)| path.join("/"))
            .collect();
        assert_eq!(paths, vec!["a", "b/c", "b/d/e", "g"]);
    }

    #[test]
    fn test_insert_key_does_not_split() {
        let mut dict = Dictionary::new();
        dict.insert_key("a/b", Value::from(1));
        assert_eq!(dict.len(), 1);
        assert!(dict.get("a/b").is_none());
        assert_eq!(dict.get(["a/b"]), Some(&Value::from(1)));
        assert_eq!(dict.iter().next().map(|(k, _)| k.as_str()), Some("a/b"));
    }
}
