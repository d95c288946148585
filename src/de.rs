//! Reading dictionary files.
//!
//! The [`Reader`] is a line-at-a-time state machine with two states: top level
//! and inside an inline table block. It keeps an explicit stack of root-key
//! prefixes pushed by `//name` lines and popped by `///`.
//!
//! Most users should use [`from_str`](crate::from_str) or
//! [`load_file`](crate::load_file), which also turn entry branches back into
//! typed values.
//!
//! ```rust
//! use dictfile::de::Reader;
//! use dictfile::{ReadOptions, Value};
//!
//! let options = ReadOptions::default();
//! let mut reader = Reader::new(&options);
//! for line in ["//g", "k\tv", "///", "k2\tv2"] {
//!     reader.feed_line(line).unwrap();
//! }
//! let file = reader.finish().unwrap();
//! assert_eq!(file.data.get("g/k"), Some(&Value::from("v")));
//! assert_eq!(file.data.get("k2"), Some(&Value::from("v2")));
//! ```

use crate::entry::{resolve_branches, EntryContext, EntrySettings};
use crate::format::{is_table_end, is_table_start, parse_timestamp};
use crate::literal::{parse_cell, parse_key, parse_value, split_row, unescape_text};
use crate::location::Location;
use crate::table_codec::header_names;
use crate::{
    DictFile, Dictionary, DuplicatePolicy, Error, KeyPolicy, ReadOptions, Result, Table, Value,
};
use chrono::NaiveDateTime;

/// A key waiting for its inline table block.
#[derive(Debug)]
struct PendingKey {
    path: Vec<String>,
    line: usize,
    /// Value to store if no block follows (`key<TAB>table` on its own).
    fallback: Option<Value>,
}

#[derive(Debug)]
struct TableBlock {
    target: Vec<String>,
    /// The key was named right before the block, so it is a fresh definition.
    from_pending: bool,
    start_line: usize,
    columns: Option<Vec<String>>,
    rows: Vec<Vec<Value>>,
}

#[derive(Debug)]
enum ReaderState {
    TopLevel,
    InTable(TableBlock),
}

/// Incremental reader for the dictionary file format.
#[derive(Debug)]
pub struct Reader<'o> {
    options: &'o ReadOptions,
    data: Dictionary,
    comments: Vec<String>,
    creation_time: Option<NaiveDateTime>,
    roots: Vec<Vec<String>>,
    last_key: Option<Vec<String>>,
    pending: Option<PendingKey>,
    state: ReaderState,
    line: usize,
}

impl<'o> Reader<'o> {
    #[must_use]
    pub fn new(options: &'o ReadOptions) -> Self {
        Reader {
            options,
            data: Dictionary::with_policy(KeyPolicy {
                case: options.case,
                separator: options.separator,
            }),
            comments: Vec::new(),
            creation_time: None,
            roots: Vec::new(),
            last_key: None,
            pending: None,
            state: ReaderState::TopLevel,
            line: 0,
        }
    }

    /// Processes the next line of input (without its line terminator).
    pub fn feed_line(&mut self, line: &str) -> Result<()> {
        self.line += 1;
        let trimmed = line.trim();
        if matches!(self.state, ReaderState::InTable(_)) {
            self.table_line(trimmed)
        } else {
            self.top_level_line(trimmed)
        }
    }

    /// Ends the input. Entry branches are left as raw sub-dictionaries.
    pub fn finish(mut self) -> Result<DictFile> {
        if let ReaderState::InTable(block) = &self.state {
            return Err(Error::syntax(block.start_line, "unterminated table block"));
        }
        self.flush_pending()?;
        tracing::debug!(
            entries = self.data.len(),
            comments = self.comments.len(),
            lines = self.line,
            "read dictionary"
        );
        Ok(DictFile {
            data: self.data,
            comments: self.comments,
            creation_time: self.creation_time,
        })
    }

    fn top_level_line(&mut self, line: &str) -> Result<()> {
        if line.is_empty() {
            return Ok(());
        }
        if line.starts_with('#') {
            return self.comment_line(line);
        }
        if line == "///" {
            self.flush_pending()?;
            if self.roots.pop().is_none() {
                return Err(Error::syntax_with_context(
                    self.line,
                    "root key pop without a matching push",
                    line,
                ));
            }
            tracing::trace!(depth = self.roots.len(), "popped root key");
            return Ok(());
        }
        if let Some(name) = line.strip_prefix("//") {
            self.flush_pending()?;
            let segments = self.key_segments(name.trim(), line)?;
            tracing::trace!(root = %segments.join("/"), "pushed root key");
            self.roots.push(segments);
            return Ok(());
        }
        self.entry_line(line)
    }

    fn comment_line(&mut self, line: &str) -> Result<()> {
        if is_table_end(line) {
            return Err(Error::syntax_with_context(
                self.line,
                "table end marker outside a table block",
                line,
            ));
        }
        if is_table_start(line) {
            let (target, from_pending) = match self.pending.take() {
                Some(pending) => (pending.path, true),
                None => match &self.last_key {
                    Some(key) => (key.clone(), false),
                    None => {
                        return Err(Error::syntax(self.line, "table block without a preceding key"))
                    }
                },
            };
            self.state = ReaderState::InTable(TableBlock {
                target,
                from_pending,
                start_line: self.line,
                columns: None,
                rows: Vec::new(),
            });
            return Ok(());
        }
        if let Some(time) = parse_timestamp(line) {
            self.creation_time = Some(time);
            return Ok(());
        }
        let text = self.comment_text(line)?;
        self.comments.push(text);
        Ok(())
    }

    fn comment_text(&self, line: &str) -> Result<String> {
        let body = line.strip_prefix('#').unwrap_or(line);
        let body = body.strip_prefix(' ').unwrap_or(body);
        unescape_text(body).map_err(|err| Error::syntax_with_context(self.line, &err.to_string(), line))
    }

    fn key_segments(&self, key: &str, line: &str) -> Result<Vec<String>> {
        let segments =
            parse_key(key).map_err(|err| Error::syntax_with_context(self.line, &err.to_string(), line))?;
        if segments.is_empty() {
            return Err(Error::syntax_with_context(self.line, "empty key", line));
        }
        Ok(segments)
    }

    fn entry_line(&mut self, line: &str) -> Result<()> {
        self.flush_pending()?;
        let (key, rest) = match line.find(char::is_whitespace) {
            Some(pos) => (&line[..pos], line[pos..].trim()),
            None => (line, ""),
        };
        let segments = self.key_segments(key, line)?;
        let mut full: Vec<String> = self.roots.concat();
        full.extend(segments);
        let path = self.data.normalize_path(&full);

        match rest {
            "" | "table" => {
                self.pending = Some(PendingKey {
                    path: path.clone(),
                    line: self.line,
                    fallback: (rest == "table").then(|| Value::from("table")),
                });
            }
            _ => {
                let value = parse_value(rest)
                    .map_err(|err| Error::syntax_with_context(self.line, &err.to_string(), line))?;
                self.store(&path, value, self.line)?;
            }
        }
        self.last_key = Some(path);
        Ok(())
    }

    fn flush_pending(&mut self) -> Result<()> {
        let Some(pending) = self.pending.take() else {
            return Ok(());
        };
        match pending.fallback {
            Some(value) => self.store(&pending.path, value, pending.line),
            None => Err(Error::syntax(pending.line, "key without a value or table block")),
        }
    }

    fn store(&mut self, path: &[String], value: Value, line: usize) -> Result<()> {
        match self.options.duplicates {
            DuplicatePolicy::Strict => {
                if self.data.contains(path) {
                    return Err(Error::duplicate_key(&path.join("/"), line));
                }
                self.data.insert(path, value)?;
            }
            DuplicatePolicy::Overwrite => {
                self.data.set(path, value);
            }
        }
        Ok(())
    }

    fn table_line(&mut self, line: &str) -> Result<()> {
        if line.is_empty() {
            return Ok(());
        }
        if is_table_end(line) {
            let ReaderState::InTable(block) =
                std::mem::replace(&mut self.state, ReaderState::TopLevel)
            else {
                return Ok(());
            };
            let table = Table {
                columns: block.columns.unwrap_or_default(),
                rows: block.rows,
                ..Table::default()
            };
            let value = Value::InlineTable(table);
            if block.from_pending {
                self.store(&block.target, value, block.start_line)?;
            } else {
                self.data.set(&block.target, value);
            }
            self.last_key = Some(block.target);
            return Ok(());
        }

        let line_num = self.line;
        if line.starts_with('#') {
            let text = self.comment_text(line)?;
            let ReaderState::InTable(block) = &mut self.state else {
                return Ok(());
            };
            if block.rows.is_empty() && block.columns.is_none() {
                if let Some(names) = header_names(&text)? {
                    block.columns = Some(names);
                    return Ok(());
                }
            }
            self.comments.push(text);
            return Ok(());
        }

        let row = split_row(line)
            .and_then(|cells| cells.iter().map(|cell| parse_cell(cell)).collect::<Result<Vec<_>>>())
            .map_err(|err| Error::syntax_with_context(line_num, &err.to_string(), line))?;
        if let ReaderState::InTable(block) = &mut self.state {
            block.rows.push(row);
        }
        Ok(())
    }
}

/// Reads a whole document and, if enabled, parses entry branches.
pub(crate) fn read_document(
    input: &str,
    options: &ReadOptions,
    location: Option<&mut dyn Location>,
) -> Result<DictFile> {
    let mut reader = Reader::new(options);
    for line in input.lines() {
        reader.feed_line(line)?;
    }
    let mut file = reader.finish()?;
    if options.parse_entries {
        let mut ctx = EntryContext::new(EntrySettings::default(), location);
        resolve_branches(&mut file.data, &options.parsers, &options.registry, &mut ctx)?;
    }
    Ok(file)
}
