//! Display-name / address splitting for `From`, `To`, `Cc`, `Bcc` and
//! `Reply-To` values.
//!
//! This is a pragmatic splitter, not an RFC 5322 address-list grammar:
//! quoted names and angle brackets are honoured, comments and groups are not.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One mailbox from an address header.
///
/// - `"Juan García <juan@ejemplo.com>"` → name `Juan García`, email `juan@ejemplo.com`
/// - `"user@example.com"` → no name, email `user@example.com`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mailbox {
    pub name: Option<String>,
    pub email: String,
}

impl Mailbox {
    /// Split one mailbox. Returns `None` for blank input.
    ///
    /// Text that has neither angle brackets nor an `@` is kept as the email,
    /// so nothing the sender wrote is lost.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        if let (Some(open), Some(close)) = (trimmed.rfind('<'), trimmed.rfind('>')) {
            if close > open {
                let email = trimmed[open + 1..close].trim().to_string();
                let name = unquote(&trimmed[..open]);
                return Some(Self {
                    name: (!name.is_empty()).then_some(name),
                    email,
                });
            }
        }

        Some(Self {
            name: None,
            email: trimmed.to_string(),
        })
    }

    /// Split a comma-separated list, ignoring commas inside quotes and
    /// angle brackets: `"Last, First" <a@b.com>, other@c.com`.
    pub fn parse_list(raw: &str) -> Vec<Self> {
        let mut mailboxes = Vec::new();
        let mut start = 0;
        let mut in_quotes = false;
        let mut in_angle = false;
        let mut escaped = false;

        for (i, ch) in raw.char_indices() {
            if escaped {
                escaped = false;
                continue;
            }
            match ch {
                '\\' if in_quotes => escaped = true,
                '"' => in_quotes = !in_quotes,
                '<' if !in_quotes => in_angle = true,
                '>' if !in_quotes => in_angle = false,
                ',' if !in_quotes && !in_angle => {
                    mailboxes.extend(Self::parse(&raw[start..i]));
                    start = i + 1;
                }
                _ => {}
            }
        }
        mailboxes.extend(Self::parse(&raw[start..]));
        mailboxes
    }

    /// The display name, or the email when there is none.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.email)
    }
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name} <{}>", self.email),
            None => f.write_str(&self.email),
        }
    }
}

/// Trim, drop surrounding double quotes and resolve `\"` escapes.
fn unquote(s: &str) -> String {
    let trimmed = s.trim();
    match trimmed
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
    {
        Some(inner) => inner.replace("\\\"", "\"").trim().to_string(),
        None => trimmed.to_string(),
    }
}
