//! One-line value literals, key escaping and table-row tokenizing.
//!
//! Values that fit on one line are written in a small literal syntax:
//!
//! ```text
//! None  True  False  42  -1.5  1e-09  inf  nan  (1.0+2.0j)
//! "quoted \"string\"\n"  bare string  [1, 2]  ("a", 2)  (1,)  {"k": 1}
//! ```
//!
//! A string is written bare when the bare text reads back as the same string,
//! otherwise it is double-quoted with backslash escapes. Inside containers,
//! strings are always quoted.

use crate::{Error, Number, Result, Value};

/// Cursor over a literal, in the style of a single-pass recursive-descent parser.
struct LiteralParser<'a> {
    input: &'a str,
    position: usize,
}

impl<'a> LiteralParser<'a> {
    fn new(input: &'a str) -> Self {
        LiteralParser { input, position: 0 }
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    fn next_char(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.position += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek_char() {
            if ch.is_whitespace() {
                self.next_char();
            } else {
                break;
            }
        }
    }

    fn at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    fn error(&self, msg: &str) -> Error {
        Error::format(format!("{} at offset {} in '{}'", msg, self.position, self.input))
    }

    fn parse_value(&mut self) -> Result<Value> {
        self.skip_whitespace();
        match self.peek_char() {
            Some('"') => self.parse_string().map(Value::String),
            Some('[') => {
                self.next_char();
                let (items, _) = self.parse_items(']')?;
                Ok(Value::List(items))
            }
            Some('(') => {
                self.next_char();
                let (mut items, trailing_comma) = self.parse_items(')')?;
                // a parenthesized lone number is a complex literal, not a tuple
                if items.len() == 1 && !trailing_comma && items[0].is_number() {
                    Ok(items.remove(0))
                } else {
                    Ok(Value::Tuple(items))
                }
            }
            Some('{') => {
                self.next_char();
                self.parse_map()
            }
            Some(_) => self.parse_scalar(),
            None => Err(self.error("expected a value")),
        }
    }

    /// Parses comma-separated items up to `close`; reports a trailing comma.
    fn parse_items(&mut self, close: char) -> Result<(Vec<Value>, bool)> {
        let mut items = Vec::new();
        let mut trailing_comma = false;
        loop {
            self.skip_whitespace();
            if self.peek_char() == Some(close) {
                self.next_char();
                return Ok((items, trailing_comma));
            }
            items.push(self.parse_value()?);
            self.skip_whitespace();
            match self.next_char() {
                Some(',') => trailing_comma = true,
                Some(ch) if ch == close => return Ok((items, false)),
                _ => return Err(self.error(&format!("expected ',' or '{}'", close))),
            }
        }
    }

    fn parse_map(&mut self) -> Result<Value> {
        let mut entries = Vec::new();
        loop {
            self.skip_whitespace();
            if self.peek_char() == Some('}') {
                self.next_char();
                return Ok(Value::Map(entries));
            }
            let key = self.parse_value()?;
            self.skip_whitespace();
            if self.next_char() != Some(':') {
                return Err(self.error("expected ':' after map key"));
            }
            let value = self.parse_value()?;
            entries.push((key, value));
            self.skip_whitespace();
            match self.next_char() {
                Some(',') => {}
                Some('}') => return Ok(Value::Map(entries)),
                _ => return Err(self.error("expected ',' or '}'")),
            }
        }
    }

    fn parse_string(&mut self) -> Result<String> {
        if self.next_char() != Some('"') {
            return Err(self.error("expected '\"'"));
        }
        let mut result = String::new();
        while let Some(ch) = self.next_char() {
            match ch {
                '"' => return Ok(result),
                '\\' => match self.next_char() {
                    Some('\\') => result.push('\\'),
                    Some('"') => result.push('"'),
                    Some('n') => result.push('\n'),
                    Some('r') => result.push('\r'),
                    Some('t') => result.push('\t'),
                    Some('b') => result.push('\u{0008}'),
                    Some('f') => result.push('\u{000C}'),
                    Some('0') => result.push('\0'),
                    Some('u') => result.push(self.parse_unicode_escape()?),
                    Some(other) => {
                        return Err(self.error(&format!("invalid escape sequence '\\{}'", other)))
                    }
                    None => return Err(self.error("unexpected end of input in string")),
                },
                other => result.push(other),
            }
        }
        Err(self.error("unterminated string"))
    }

    fn parse_unicode_escape(&mut self) -> Result<char> {
        let mut hex = String::with_capacity(4);
        for _ in 0..4 {
            match self.next_char() {
                Some(ch) if ch.is_ascii_hexdigit() => hex.push(ch),
                _ => {
                    return Err(self.error(
                        "invalid unicode escape sequence (expected 4 hex digits)",
                    ))
                }
            }
        }
        let code_point =
            u32::from_str_radix(&hex, 16).map_err(|_| self.error("invalid hex in unicode escape"))?;
        char::from_u32(code_point).ok_or_else(|| self.error("invalid unicode code point"))
    }

    fn parse_scalar(&mut self) -> Result<Value> {
        let start = self.position;
        while let Some(ch) = self.peek_char() {
            if ch.is_whitespace() || matches!(ch, ',' | ']' | ')' | '}' | ':') {
                break;
            }
            self.next_char();
        }
        let token = &self.input[start..self.position];
        parse_scalar_token(token).ok_or_else(|| self.error(&format!("unrecognized literal '{}'", token)))
    }
}

/// Parses a bare scalar token: `None`, booleans, integers, floats, complex numbers.
fn parse_scalar_token(token: &str) -> Option<Value> {
    match token {
        "" => None,
        "None" | "null" => Some(Value::Null),
        "True" | "true" => Some(Value::Bool(true)),
        "False" | "false" => Some(Value::Bool(false)),
        _ => parse_number(token).map(Value::Number),
    }
}

/// Parses an integer, float or complex number.
///
/// # Examples
///
/// ```rust
/// use dictfile::literal::parse_number;
/// use dictfile::Number;
///
/// assert_eq!(parse_number("42"), Some(Number::Integer(42)));
/// assert_eq!(parse_number("1e3"), Some(Number::Float(1000.0)));
/// assert_eq!(parse_number("1-2j"), Some(Number::Complex(1.0, -2.0)));
/// assert_eq!(parse_number("abc"), None);
/// ```
#[must_use]
pub fn parse_number(token: &str) -> Option<Number> {
    if let Ok(i) = token.parse::<i64>() {
        return Some(Number::Integer(i));
    }
    if let Ok(f) = token.parse::<f64>() {
        return Some(Number::Float(f));
    }
    parse_complex(token)
}

fn parse_complex(token: &str) -> Option<Number> {
    let body = token
        .strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
        .unwrap_or(token);
    let body = body.strip_suffix('j').or_else(|| body.strip_suffix('J'))?;
    let bytes = body.as_bytes();
    let split = (1..bytes.len())
        .rev()
        .find(|&i| matches!(bytes[i], b'+' | b'-') && !matches!(bytes[i - 1], b'e' | b'E'));
    match split {
        Some(i) => {
            let re = body[..i].parse::<f64>().ok()?;
            let im = body[i..].parse::<f64>().ok()?;
            Some(Number::Complex(re, im))
        }
        None => {
            let im = body.parse::<f64>().ok()?;
            Some(Number::Complex(0.0, im))
        }
    }
}

/// Returns `true` if every token of a numeric table row is a number or a
/// missing/special value (`""`, `nan`, `inf`, `+inf`, `-inf`).
#[must_use]
pub fn is_numeric_token(token: &str) -> bool {
    let lower = token.to_ascii_lowercase();
    matches!(lower.as_str(), "" | "nan" | "inf" | "+inf" | "-inf") || parse_number(token).is_some()
}

/// Parses a complete literal; the whole text must be consumed.
pub fn parse_literal(text: &str) -> Result<Value> {
    let mut parser = LiteralParser::new(text);
    let value = parser.parse_value()?;
    parser.skip_whitespace();
    if parser.at_end() {
        Ok(value)
    } else {
        Err(parser.error("trailing characters after value"))
    }
}

/// Parses the value part of an entry line.
///
/// Text that is not a literal is taken as a bare string. Text starting with a
/// double quote must be a well-formed quoted string.
///
/// # Examples
///
/// ```rust
/// use dictfile::literal::parse_value;
/// use dictfile::Value;
///
/// assert_eq!(parse_value("12").unwrap(), Value::from(12));
/// assert_eq!(parse_value("hello world").unwrap(), Value::from("hello world"));
/// assert_eq!(parse_value("\"12\"").unwrap(), Value::from("12"));
/// assert!(parse_value("\"bad \\q escape\"").is_err());
/// ```
pub fn parse_value(text: &str) -> Result<Value> {
    let text = text.trim();
    if text.starts_with('"') {
        let mut parser = LiteralParser::new(text);
        let value = parser.parse_string()?;
        if !parser.at_end() {
            return Err(parser.error("trailing characters after quoted string"));
        }
        return Ok(Value::String(value));
    }
    Ok(parse_literal(text).unwrap_or_else(|_| Value::String(text.to_string())))
}

/// Parses one table cell; bare non-literal text becomes a string.
pub fn parse_cell(token: &str) -> Result<Value> {
    parse_value(token)
}

/// Returns `true` if `s` cannot be written bare as an entry value.
#[must_use]
pub fn needs_quotes(s: &str) -> bool {
    s.is_empty()
        || s.trim() != s
        || s.starts_with('"')
        || s.chars().any(char::is_control)
        || s == "table"
        || parse_literal(s).is_ok()
}

/// Returns `true` if `s` cannot be written bare as a table cell.
#[must_use]
pub fn cell_needs_quotes(s: &str) -> bool {
    needs_quotes(s) || s.contains(|c: char| c.is_whitespace() || c == ',' || c == '#')
}

/// Writes a string in quotes, escaping quotes, backslashes and control characters.
pub fn write_quoted(output: &mut String, s: &str) {
    output.push('"');
    for ch in s.chars() {
        match ch {
            '"' => output.push_str("\\\""),
            '\\' => output.push_str("\\\\"),
            '\n' => output.push_str("\\n"),
            '\r' => output.push_str("\\r"),
            '\t' => output.push_str("\\t"),
            '\u{0008}' => output.push_str("\\b"),
            '\u{000C}' => output.push_str("\\f"),
            '\0' => output.push_str("\\0"),
            c if c.is_control() => output.push_str(&format!("\\u{:04x}", c as u32)),
            _ => output.push(ch),
        }
    }
    output.push('"');
}

/// Returns `true` for values that fit on one line: scalars and containers of scalars.
#[must_use]
pub fn is_inline(value: &Value) -> bool {
    match value {
        Value::List(items) | Value::Tuple(items) => items.iter().all(Value::is_primitive),
        Value::Map(entries) => entries
            .iter()
            .all(|(k, v)| k.is_primitive() && v.is_primitive()),
        other => other.is_primitive(),
    }
}

/// Writes an entry value. The value must satisfy [`is_inline`].
pub fn write_value(output: &mut String, value: &Value) {
    match value {
        Value::String(s) if !needs_quotes(s) => output.push_str(s),
        other => write_element(output, other),
    }
}

/// Writes a table cell. Only scalars are representable.
pub fn write_cell(output: &mut String, value: &Value) -> Result<()> {
    match value {
        Value::String(s) if !cell_needs_quotes(s) => output.push_str(s),
        Value::String(s) => write_quoted(output, s),
        other if other.is_primitive() => write_element(output, other),
        other => {
            return Err(Error::unsupported_value(
                "<table cell>",
                &format!("{} values cannot be table cells", other.kind_name()),
            ))
        }
    }
    Ok(())
}

fn write_element(output: &mut String, value: &Value) {
    match value {
        Value::Null => output.push_str("None"),
        Value::Bool(b) => output.push_str(if *b { "True" } else { "False" }),
        Value::Number(n) => output.push_str(&n.to_string()),
        Value::String(s) => write_quoted(output, s),
        Value::List(items) => {
            output.push('[');
            write_elements(output, items);
            output.push(']');
        }
        Value::Tuple(items) => {
            output.push('(');
            write_elements(output, items);
            if items.len() == 1 {
                output.push(',');
            }
            output.push(')');
        }
        Value::Map(entries) => {
            output.push('{');
            for (i, (k, v)) in entries.iter().enumerate() {
                if i > 0 {
                    output.push_str(", ");
                }
                write_element(output, k);
                output.push_str(": ");
                write_element(output, v);
            }
            output.push('}');
        }
        other => write_quoted(output, &other.to_string()),
    }
}

fn write_elements(output: &mut String, items: &[Value]) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            output.push_str(", ");
        }
        write_element(output, item);
    }
}

/// Escapes one key segment so it survives whitespace splitting and `/` joining.
pub fn escape_key_segment(segment: &str) -> Result<String> {
    if segment.is_empty() {
        return Err(Error::unsupported_value("<key>", "empty key segment"));
    }
    let mut out = String::with_capacity(segment.len());
    for ch in segment.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            ' ' => out.push_str("\\s"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '/' => out.push_str("\\/"),
            '#' => out.push_str("\\#"),
            c if c.is_whitespace() || c.is_control() => {
                out.push_str(&format!("\\u{:04x}", c as u32))
            }
            c => out.push(c),
        }
    }
    Ok(out)
}

/// Escapes and joins a full key path.
pub fn escape_key(path: &[String]) -> Result<String> {
    let parts = path
        .iter()
        .map(|segment| escape_key_segment(segment))
        .collect::<Result<Vec<_>>>()?;
    Ok(parts.join("/"))
}

/// Splits an escaped key on unescaped `/` and unescapes each segment.
///
/// # Examples
///
/// ```rust
/// use dictfile::literal::{escape_key, parse_key};
///
/// let path = vec!["a b".to_string(), "c/d".to_string()];
/// let text = escape_key(&path).unwrap();
/// assert_eq!(text, "a\\sb/c\\/d");
/// assert_eq!(parse_key(&text).unwrap(), path);
/// ```
pub fn parse_key(text: &str) -> Result<Vec<String>> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '/' => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
            }
            '\\' => current.push(unescape_char(&mut chars, text)?),
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }
    Ok(segments)
}

/// Escapes free text for a comment line.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

/// Like [`escape_text`], but also escapes trailing whitespace, which readers trim.
#[must_use]
pub fn escape_comment(text: &str) -> String {
    let body = text.trim_end();
    let mut out = escape_text(body);
    for ch in text[body.len()..].chars() {
        match ch {
            ' ' => out.push_str("\\s"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push_str(&format!("\\u{:04x}", c as u32)),
        }
    }
    out
}

/// Reverses [`escape_text`]; malformed escapes fail.
pub fn unescape_text(text: &str) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => out.push(unescape_char(&mut chars, text)?),
            c => out.push(c),
        }
    }
    Ok(out)
}

fn unescape_char(chars: &mut std::str::Chars<'_>, text: &str) -> Result<char> {
    let malformed = |what: &str| Error::format(format!("malformed escape {} in '{}'", what, text));
    match chars.next() {
        Some('\\') => Ok('\\'),
        Some('s') => Ok(' '),
        Some('t') => Ok('\t'),
        Some('n') => Ok('\n'),
        Some('r') => Ok('\r'),
        Some('/') => Ok('/'),
        Some('#') => Ok('#'),
        Some('u') => {
            let hex: String = chars.by_ref().take(4).collect();
            if hex.len() != 4 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(malformed("'\\u'"));
            }
            u32::from_str_radix(&hex, 16)
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| malformed(&format!("'\\u{}'", hex)))
        }
        Some(other) => Err(malformed(&format!("'\\{}'", other))),
        None => Err(malformed("at end of text")),
    }
}

/// Splits a table row into raw cell tokens.
///
/// Cells are separated by tabs, runs of spaces, or a comma with optional
/// surrounding whitespace. Quoted cells may contain any of these.
pub fn split_row(line: &str) -> Result<Vec<String>> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut chars = line.trim().chars().peekable();
    let mut pending_cell = false;

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                current.push('"');
                let mut closed = false;
                while let Some(inner) = chars.next() {
                    current.push(inner);
                    match inner {
                        '\\' => {
                            if let Some(escaped) = chars.next() {
                                current.push(escaped);
                            }
                        }
                        '"' => {
                            closed = true;
                            break;
                        }
                        _ => {}
                    }
                }
                if !closed {
                    return Err(Error::format(format!("unterminated quoted cell in '{}'", line)));
                }
                pending_cell = true;
            }
            c if c.is_whitespace() || c == ',' => {
                let mut saw_comma = c == ',';
                while let Some(&next) = chars.peek() {
                    if next == ',' && !saw_comma {
                        saw_comma = true;
                        chars.next();
                    } else if next.is_whitespace() {
                        chars.next();
                    } else {
                        break;
                    }
                }
                cells.push(std::mem::take(&mut current));
                pending_cell = saw_comma;
            }
            c => {
                current.push(c);
                pending_cell = true;
            }
        }
    }
    if pending_cell || !current.is_empty() {
        cells.push(current);
    }
    Ok(cells)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(value: &Value) -> Value {
        let mut out = String::new();
        write_value(&mut out, value);
        parse_value(&out).unwrap()
    }

    #[test]
    fn test_scalars() {
        assert_eq!(parse_value("None").unwrap(), Value::Null);
        assert_eq!(parse_value("True").unwrap(), Value::Bool(true));
        assert_eq!(parse_value("-7").unwrap(), Value::from(-7));
        assert_eq!(parse_value("2.5").unwrap(), Value::from(2.5));
        assert_eq!(
            parse_value("(1.5+2.0j)").unwrap(),
            Value::Number(Number::Complex(1.5, 2.0))
        );
        match parse_value("nan").unwrap() {
            Value::Number(Number::Float(f)) => assert!(f.is_nan()),
            other => panic!("expected NaN, got {:?}", other),
        }
    }

    #[test]
    fn test_containers() {
        assert_eq!(
            parse_value("[1, \"a\", None]").unwrap(),
            Value::List(vec![Value::from(1), Value::from("a"), Value::Null])
        );
        assert_eq!(
            parse_value("(1,)").unwrap(),
            Value::Tuple(vec![Value::from(1)])
        );
        assert_eq!(parse_value("()").unwrap(), Value::Tuple(vec![]));
        assert_eq!(
            parse_value("{\"k\": 1, 2: False}").unwrap(),
            Value::Map(vec![
                (Value::from("k"), Value::from(1)),
                (Value::from(2), Value::Bool(false)),
            ])
        );
    }

    #[test]
    fn test_bare_text_is_a_string() {
        assert_eq!(parse_value("[note] text").unwrap(), Value::from("[note] text"));
        assert_eq!(parse_value("1 2 3").unwrap(), Value::from("1 2 3"));
        assert_eq!(parse_value("C:\\data").unwrap(), Value::from("C:\\data"));
    }

    #[test]
    fn test_strings_round_trip() {
        for s in ["plain", "", " padded ", "12", "True", "table", "\"q\"", "tab\there", "[1]", "é ü"] {
            assert_eq!(round_trip(&Value::from(s)), Value::from(s), "string {:?}", s);
        }
    }

    #[test]
    fn test_numbers_round_trip() {
        for n in [0.1, 1.0, -0.0, 1e300, 1e-300, f64::INFINITY, f64::NEG_INFINITY] {
            assert_eq!(round_trip(&Value::from(n)), Value::from(n));
        }
        let c = Value::Number(Number::Complex(-1.0, -0.5));
        assert_eq!(round_trip(&c), c);
        let t = Value::Tuple(vec![Value::Number(Number::Complex(0.0, 1.0))]);
        assert_eq!(round_trip(&t), t);
    }

    #[test]
    fn test_comment_escapes_trailing_whitespace() {
        assert_eq!(escape_comment("note  "), "note\\s\\s");
        assert_eq!(escape_comment(" lead"), " lead");
        assert_eq!(escape_comment("tab\t"), "tab\\t");
        assert_eq!(escape_comment("wide\u{3000}"), "wide\\u3000");
        for text in ["note  ", "a\tb \n", "\u{3000}"] {
            assert_eq!(unescape_text(&escape_comment(text)).unwrap(), text);
        }
    }

    #[test]
    fn test_malformed_escape_fails() {
        assert!(parse_value("\"abc\\x\"").is_err());
        assert!(parse_value("\"abc").is_err());
        assert!(parse_key("a\\q").is_err());
        assert!(unescape_text("trailing \\").is_err());
    }

    #[test]
    fn test_key_escaping() {
        let path = vec!["#hash".to_string(), "tab\tkey".to_string(), "back\\slash".to_string()];
        let text = escape_key(&path).unwrap();
        assert!(!text.contains(char::is_whitespace));
        assert!(!text.starts_with('#'));
        assert_eq!(parse_key(&text).unwrap(), path);
        assert!(escape_key(&["".to_string()]).is_err());
    }

    #[test]
    fn test_split_row() {
        assert_eq!(split_row("1\t2\t3").unwrap(), vec!["1", "2", "3"]);
        assert_eq!(split_row("1, 2 ,3").unwrap(), vec!["1", "2", "3"]);
        assert_eq!(split_row("1   2").unwrap(), vec!["1", "2"]);
        assert_eq!(split_row("1,,3").unwrap(), vec!["1", "", "3"]);
        assert_eq!(
            split_row("\"a b\"\t\"c,\\\"d\"").unwrap(),
            vec!["\"a b\"", "\"c,\\\"d\""]
        );
        assert!(split_row("\"open").is_err());
    }

    #[test]
    fn test_numeric_tokens() {
        for token in ["1", "-2.5e3", "", "nan", "+inf", "-INF", "1+2j", "3j"] {
            assert!(is_numeric_token(token), "token {:?}", token);
        }
        for token in ["abc", "1.2.3", "j", "key"] {
            assert!(!is_numeric_token(token), "token {:?}", token);
        }
    }

    #[test]
    fn test_cells() {
        let mut out = String::new();
        write_cell(&mut out, &Value::from("a b")).unwrap();
        assert_eq!(out, "\"a b\"");
        assert!(write_cell(&mut String::new(), &Value::List(vec![])).is_err());
        assert_eq!(parse_cell("\"a b\"").unwrap(), Value::from("a b"));
    }
}
