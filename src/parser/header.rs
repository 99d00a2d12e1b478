//! Header block parsing: record splitting with folding, malformed-line
//! recovery, and the multi-valued [`HeaderStore`].

use std::fmt;

use tracing::debug;

use crate::parser::encoded_word::decode_encoded_words;

/// Header names accepted by the malformed-line recovery when the colon is
/// missing (`"Subject Hello"`).
const RECOVERABLE_NAMES: &[&str] = &["subject", "from", "to", "cc", "bcc", "date", "reply-to"];

/// The value of a header that may appear more than once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    /// The header appeared once.
    Single(String),
    /// The header appeared two or more times, in source order.
    Multiple(Vec<String>),
}

impl HeaderValue {
    /// The first (or only) value.
    pub fn first(&self) -> &str {
        match self {
            Self::Single(v) => v,
            Self::Multiple(vs) => vs.first().map_or("", String::as_str),
        }
    }

    /// All values as a slice, in source order.
    pub fn as_slice(&self) -> &[String] {
        match self {
            Self::Single(v) => std::slice::from_ref(v),
            Self::Multiple(vs) => vs,
        }
    }

    /// Number of occurrences.
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Always `false`; a stored header has at least one value.
    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }

    /// `true` if the header appeared more than once.
    pub fn is_multiple(&self) -> bool {
        matches!(self, Self::Multiple(_))
    }

    /// Join all values with `sep`.
    pub fn join(&self, sep: &str) -> String {
        self.as_slice().join(sep)
    }

    /// Apply `f` to every value, keeping the shape.
    pub fn map(self, mut f: impl FnMut(&str) -> String) -> Self {
        match self {
            Self::Single(v) => Self::Single(f(&v)),
            Self::Multiple(vs) => Self::Multiple(vs.iter().map(|v| f(v)).collect()),
        }
    }

    /// Add another occurrence, promoting `Single` to `Multiple`.
    fn push(&mut self, value: String) {
        match self {
            Self::Single(existing) => {
                let first = std::mem::take(existing);
                *self = Self::Multiple(vec![first, value]);
            }
            Self::Multiple(vs) => vs.push(value),
        }
    }
}

impl fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.join(", "))
    }
}

/// Case-insensitive, multi-valued header table of one MIME part.
///
/// Names are stored trimmed and lower-cased, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderStore {
    entries: Vec<(String, HeaderValue)>,
}

impl HeaderStore {
    /// Parse a raw header block (everything before the blank line).
    pub fn parse(raw: &[u8]) -> Self {
        Self::from_text(&decode_header_bytes(raw))
    }

    /// Parse an already-decoded header block.
    pub fn from_text(text: &str) -> Self {
        let mut store = Self::default();
        for record in split_records(text) {
            match parse_record(record).or_else(|| recover_malformed(record)) {
                Some((name, value)) => store.append(name, value),
                None if record.trim().is_empty() => {}
                None => debug!(line = record.trim(), "Dropping malformed header line"),
            }
        }
        store
    }

    /// Raw value of a header.
    pub fn get(&self, name: &str) -> Option<&HeaderValue> {
        let name = name.trim().to_lowercase();
        self.entries
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v)
    }

    /// First raw value of a header.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.get(name).map(HeaderValue::first)
    }

    /// `true` if the header is present.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Look up a header with optional RFC 2047 decoding and unfolding.
    pub fn lookup(&self, name: &str, decode: bool, strip_breaks: bool) -> Option<HeaderValue> {
        let mut value = self.get(name)?.clone();
        if decode {
            value = value.map(decode_encoded_words);
        }
        if strip_breaks {
            value = value.map(strip_line_breaks);
        }
        Some(value)
    }

    /// Number of distinct header names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if no header was parsed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(name, value)` in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    fn append(&mut self, name: String, value: String) {
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some((_, existing)) => existing.push(value),
            None => self.entries.push((name, HeaderValue::Single(value))),
        }
    }
}

/// Decode raw header bytes to a string.
///
/// Tries UTF-8 first, then falls back to windows-1252 (which accepts every byte).
pub fn decode_header_bytes(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Split a header block into records.
///
/// A record ends at a `\n` that is followed by a non-whitespace character,
/// so folded continuation lines stay with their header.
pub fn split_records(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut records = Vec::new();
    let mut start = 0;

    for i in 0..bytes.len() {
        if bytes[i] == b'\n' {
            if let Some(next) = bytes.get(i + 1) {
                if !next.is_ascii_whitespace() {
                    records.push(&text[start..i]);
                    start = i + 1;
                }
            }
        }
    }
    records.push(&text[start..]);
    records
}

/// Remove folding: every line break followed by one whitespace character.
pub fn strip_line_breaks(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\r' if chars.peek() == Some(&'\n') => {
                let mut ahead = chars.clone();
                ahead.next();
                if ahead.peek().is_some_and(|c| c.is_whitespace()) {
                    chars.next();
                    chars.next();
                } else {
                    out.push(c);
                }
            }
            '\n' if chars.peek().is_some_and(|c| c.is_whitespace()) => {
                chars.next();
            }
            _ => out.push(c),
        }
    }
    out
}

/// `Name: value` → `("name", "value")`.
fn parse_record(record: &str) -> Option<(String, String)> {
    let (name, value) = record.split_once(':')?;
    Some((name.trim().to_lowercase(), value.trim().to_string()))
}

/// Accept `"Subject Hello"` style lines for a handful of well-known headers.
fn recover_malformed(record: &str) -> Option<(String, String)> {
    let line = record.trim();
    let lower = line.to_ascii_lowercase();

    for name in RECOVERABLE_NAMES {
        let Some(after) = lower.strip_prefix(name) else {
            continue;
        };
        if !after.starts_with(char::is_whitespace) {
            continue;
        }
        let value = line[name.len()..].lines().next().unwrap_or("").trim();
        if value.is_empty() {
            return None;
        }
        debug!(header = name, "Recovered header line without a colon");
        return Some(((*name).to_string(), value.to_string()));
    }
    None
}
