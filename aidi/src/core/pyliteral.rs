//! Python literal notation: parse the dictionary a generated program prints,
//! and render values the way Python's `repr` would.
//!
//! Supported literals: dicts, lists, tuples, strings (single, double and
//! triple quoted, with `r`/`u`/`b` prefixes and implicit concatenation),
//! integers, floats, `True`, `False` and `None`. Tuples decode to arrays.

use serde_json::{Map, Number, Value};
use thiserror::Error;

/// Nesting limit for containers; deeper input is rejected rather than parsed.
const MAX_DEPTH: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at offset {offset}")]
pub struct LiteralError {
    pub message: String,
    pub offset: usize,
}

/// Parse a complete Python literal. Surrounding whitespace is ignored; any
/// other trailing text is an error.
pub fn parse(text: &str) -> Result<Value, LiteralError> {
    let mut parser = Parser {
        src: text.as_bytes(),
        text,
        pos: 0,
        depth: 0,
    };
    let value = parser.value()?;
    parser.skip_ws();
    if parser.pos != parser.src.len() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(value)
}

/// Python `repr` of a JSON value.
pub fn repr(value: &Value) -> String {
    let mut out = String::new();
    write_repr(value, &mut out);
    out
}

/// Like [`repr`], except top-level strings are shown without quotes, the way
/// an f-string interpolates them.
pub fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => repr(other),
    }
}

fn write_repr(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("None"),
        Value::Bool(true) => out.push_str("True"),
        Value::Bool(false) => out.push_str("False"),
        Value::Number(n) => out.push_str(&number_repr(n)),
        Value::String(s) => out.push_str(&string_repr(s)),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_repr(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            out.push('{');
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(&string_repr(key));
                out.push_str(": ");
                write_repr(item, out);
            }
            out.push('}');
        }
    }
}

fn number_repr(n: &Number) -> String {
    if !n.is_f64() {
        return n.to_string();
    }
    let Some(f) = n.as_f64() else {
        return n.to_string();
    };
    if f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{f:.1}")
    } else {
        format!("{f}")
    }
}

fn string_repr(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

struct Parser<'a> {
    src: &'a [u8],
    text: &'a str,
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn error(&self, message: impl Into<String>) -> LiteralError {
        LiteralError {
            message: message.into(),
            offset: self.pos,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while let Some(b) = self.peek() {
            match b {
                b' ' | b'\t' | b'\n' | b'\r' => self.pos += 1,
                b'#' => {
                    while let Some(c) = self.peek() {
                        if c == b'\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
    }

    fn eat(&mut self, byte: u8) -> bool {
        self.skip_ws();
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn value(&mut self) -> Result<Value, LiteralError> {
        self.skip_ws();
        match self.peek() {
            None => Err(self.error("unexpected end of input")),
            Some(b'{') => self.nested(Self::dict),
            Some(b'[') => self.nested(|p| {
                p.sequence(b'[', b']')
                    .map(|(items, _)| Value::Array(items))
            }),
            Some(b'(') => self.nested(Self::tuple),
            Some(b'\'' | b'"') => self.strings(),
            Some(b'-' | b'+' | b'.' | b'0'..=b'9') => self.number(),
            Some(b) if b.is_ascii_alphabetic() || b == b'_' => self.word(),
            Some(_) => Err(self.error("unexpected character")),
        }
    }

    fn nested(
        &mut self,
        inner: impl FnOnce(&mut Self) -> Result<Value, LiteralError>,
    ) -> Result<Value, LiteralError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error("nesting too deep"));
        }
        let value = inner(self);
        self.depth -= 1;
        value
    }

    fn dict(&mut self) -> Result<Value, LiteralError> {
        self.pos += 1;
        let mut map = Map::new();
        loop {
            if self.eat(b'}') {
                return Ok(Value::Object(map));
            }
            let key = match self.value()? {
                Value::String(s) => s,
                Value::Object(_) | Value::Array(_) => {
                    return Err(self.error("unhashable dict key"));
                }
                other => repr(&other),
            };
            if !self.eat(b':') {
                return Err(self.error("expected ':' after dict key"));
            }
            let item = self.value()?;
            map.insert(key, item);
            if self.eat(b',') {
                continue;
            }
            if self.eat(b'}') {
                return Ok(Value::Object(map));
            }
            return Err(self.error("expected ',' or '}' in dict"));
        }
    }

    fn tuple(&mut self) -> Result<Value, LiteralError> {
        let (mut items, trailing_comma) = self.sequence(b'(', b')')?;
        if items.len() == 1 && !trailing_comma {
            return Ok(items.remove(0));
        }
        Ok(Value::Array(items))
    }

    /// Comma separated values between `open` and `close`; also reports
    /// whether the last item was followed by a comma.
    fn sequence(&mut self, open: u8, close: u8) -> Result<(Vec<Value>, bool), LiteralError> {
        debug_assert_eq!(self.peek(), Some(open));
        self.pos += 1;
        let mut items = Vec::new();
        let mut trailing_comma = false;
        loop {
            if self.eat(close) {
                return Ok((items, trailing_comma));
            }
            items.push(self.value()?);
            trailing_comma = self.eat(b',');
            if !trailing_comma {
                if self.eat(close) {
                    return Ok((items, false));
                }
                return Err(self.error(format!("expected ',' or '{}'", close as char)));
            }
        }
    }

    fn word(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_alphanumeric() || b == b'_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        let word = &self.text[start..self.pos];
        match word {
            "True" => Ok(Value::Bool(true)),
            "False" => Ok(Value::Bool(false)),
            "None" => Ok(Value::Null),
            _ if matches!(self.peek(), Some(b'\'' | b'"')) && is_string_prefix(word) => {
                self.pos = start;
                self.strings()
            }
            _ => {
                self.pos = start;
                Err(self.error(format!("unsupported name '{word}'")))
            }
        }
    }

    /// One or more adjacent string literals, concatenated.
    fn strings(&mut self) -> Result<Value, LiteralError> {
        let mut joined = self.string()?;
        loop {
            let save = self.pos;
            self.skip_ws();
            if self.starts_string() {
                joined.push_str(&self.string()?);
            } else {
                self.pos = save;
                return Ok(Value::String(joined));
            }
        }
    }

    fn starts_string(&self) -> bool {
        let rest = &self.src[self.pos..];
        let prefix_len = rest
            .iter()
            .take_while(|b| b.is_ascii_alphabetic())
            .count();
        let prefix = &self.text[self.pos..self.pos + prefix_len];
        matches!(rest.get(prefix_len), Some(b'\'' | b'"'))
            && (prefix_len == 0 || is_string_prefix(prefix))
    }

    fn string(&mut self) -> Result<String, LiteralError> {
        let mut raw = false;
        while let Some(b) = self.peek() {
            match b {
                b'r' | b'R' => raw = true,
                b'u' | b'U' | b'b' | b'B' => {}
                _ => break,
            }
            self.pos += 1;
        }
        let Some(quote) = self.peek() else {
            return Err(self.error("expected string"));
        };
        let triple = self.src[self.pos..].starts_with(&[quote, quote, quote]);
        self.pos += if triple { 3 } else { 1 };

        let mut out = String::new();
        loop {
            let Some(b) = self.peek() else {
                return Err(self.error("unterminated string"));
            };
            if b == quote {
                if !triple {
                    self.pos += 1;
                    return Ok(out);
                }
                if self.src[self.pos..].starts_with(&[quote, quote, quote]) {
                    self.pos += 3;
                    return Ok(out);
                }
            }
            if b == b'\n' && !triple {
                return Err(self.error("newline in single-quoted string"));
            }
            if b == b'\\' {
                if raw {
                    out.push('\\');
                    self.pos += 1;
                    if let Some(next) = self.next_char() {
                        out.push(next);
                    }
                } else {
                    self.pos += 1;
                    self.escape(&mut out)?;
                }
                continue;
            }
            if let Some(ch) = self.next_char() {
                out.push(ch);
            }
        }
    }

    fn next_char(&mut self) -> Option<char> {
        let ch = self.text[self.pos..].chars().next()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn escape(&mut self, out: &mut String) -> Result<(), LiteralError> {
        let Some(b) = self.peek() else {
            return Err(self.error("unterminated escape"));
        };
        self.pos += 1;
        match b {
            b'\n' => {}
            b'\\' => out.push('\\'),
            b'\'' => out.push('\''),
            b'"' => out.push('"'),
            b'n' => out.push('\n'),
            b'r' => out.push('\r'),
            b't' => out.push('\t'),
            b'a' => out.push('\u{07}'),
            b'b' => out.push('\u{08}'),
            b'f' => out.push('\u{0c}'),
            b'v' => out.push('\u{0b}'),
            b'0'..=b'7' => {
                let start = self.pos - 1;
                while self.pos - start < 3 && matches!(self.peek(), Some(b'0'..=b'7')) {
                    self.pos += 1;
                }
                let code = u32::from_str_radix(&self.text[start..self.pos], 8)
                    .map_err(|_| self.error("invalid octal escape"))?;
                out.push(char::from_u32(code).ok_or_else(|| self.error("invalid octal escape"))?);
            }
            b'x' => out.push(self.hex_escape(2)?),
            b'u' => out.push(self.hex_escape(4)?),
            b'U' => out.push(self.hex_escape(8)?),
            _ => {
                // Unknown escapes are kept verbatim.
                out.push('\\');
                self.pos -= 1;
                if let Some(ch) = self.next_char() {
                    out.push(ch);
                }
            }
        }
        Ok(())
    }

    fn hex_escape(&mut self, digits: usize) -> Result<char, LiteralError> {
        let end = self.pos + digits;
        let hex = self
            .text
            .get(self.pos..end)
            .ok_or_else(|| self.error("truncated hex escape"))?;
        let code = u32::from_str_radix(hex, 16).map_err(|_| self.error("invalid hex escape"))?;
        let ch = char::from_u32(code).ok_or_else(|| self.error("invalid code point"))?;
        self.pos = end;
        Ok(ch)
    }

    fn number(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        if matches!(self.peek(), Some(b'-' | b'+')) {
            self.pos += 1;
        }
        let mut is_float = false;
        while let Some(b) = self.peek() {
            match b {
                b'0'..=b'9' | b'_' => self.pos += 1,
                b'.' => {
                    is_float = true;
                    self.pos += 1;
                }
                b'e' | b'E' => {
                    is_float = true;
                    self.pos += 1;
                    if matches!(self.peek(), Some(b'-' | b'+')) {
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
        let literal: String = self.text[start..self.pos]
            .chars()
            .filter(|c| *c != '_' && *c != '+')
            .collect();
        if literal.is_empty() || literal == "-" {
            return Err(self.error("invalid number"));
        }
        if !is_float {
            if let Ok(n) = literal.parse::<i64>() {
                return Ok(Value::Number(n.into()));
            }
            if let Ok(n) = literal.parse::<u64>() {
                return Ok(Value::Number(n.into()));
            }
        }
        let float = literal
            .parse::<f64>()
            .map_err(|_| self.error(format!("invalid number '{literal}'")))?;
        Number::from_f64(float)
            .map(Value::Number)
            .ok_or_else(|| self.error("non-finite number"))
    }
}

fn is_string_prefix(word: &str) -> bool {
    matches!(
        word.to_ascii_lowercase().as_str(),
        "r" | "u" | "b" | "br" | "rb"
    )
}
