//! [`EmlMessage`]: convenience accessors over a parsed MIME tree.
//!
//! The tree itself lives in [`crate::parser::part`]; everything here is a
//! read-only view that walks it.

use std::fmt;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::error::{EmlError, Result};
use crate::model::address::Mailbox;
use crate::model::attachment::Attachment;
use crate::parser::date::parse_date;
use crate::parser::header::HeaderValue;
use crate::parser::part::{ParseOptions, PartBody, PartNode};
use crate::render::{html_to_text, text_to_html};

/// Whether a message came in or went out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// The message has at least one `Received` header.
    Received,
    /// No `Received` header: a draft or a copy from the sent folder.
    Sent,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Received => f.write_str("received"),
            Self::Sent => f.write_str("sent"),
        }
    }
}

/// Produces the URL that replaces a `cid:` reference in HTML.
pub trait CidResolver {
    /// Return the replacement for `image`, or `None` to leave its
    /// references untouched.
    ///
    /// # Errors
    ///
    /// Implementations that write files report I/O failures here.
    fn resolve(&mut self, image: &Attachment) -> Result<Option<String>>;
}

/// Embeds inline images as `data:` URLs.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataUrlResolver;

impl CidResolver for DataUrlResolver {
    fn resolve(&mut self, image: &Attachment) -> Result<Option<String>> {
        let content_type = image.content_type.as_deref().unwrap_or("image/png");
        Ok(Some(format!(
            "data:{content_type};base64,{}",
            STANDARD.encode(&image.content)
        )))
    }
}

/// Serializable overview of a message, used by `show --json`.
#[derive(Debug, Clone, Serialize)]
pub struct MessageSummary {
    pub subject: Option<String>,
    pub from: Option<Mailbox>,
    pub to: Vec<Mailbox>,
    pub cc: Vec<Mailbox>,
    pub date: Option<DateTime<Utc>>,
    pub direction: Direction,
    pub text: Option<String>,
    pub attachments: Vec<Attachment>,
    pub inline_images: Vec<Attachment>,
}

/// A parsed `.eml` message.
#[derive(Debug)]
pub struct EmlMessage {
    root: PartNode,
}

impl EmlMessage {
    /// Parse raw message bytes with default options.
    ///
    /// # Errors
    ///
    /// Fails only when the top-level part declares a multipart body that
    /// cannot be split; see [`PartNode::parse`].
    pub fn parse(raw: &[u8]) -> Result<Self> {
        Self::parse_with(raw, &ParseOptions::default())
    }

    /// Parse raw message bytes with explicit options.
    ///
    /// # Errors
    ///
    /// Same as [`EmlMessage::parse`].
    pub fn parse_with(raw: &[u8], options: &ParseOptions) -> Result<Self> {
        let root = PartNode::parse_with(raw, options)?;
        debug!(
            bytes = raw.len(),
            parts = root.walk().count(),
            "Parsed message"
        );
        Ok(Self { root })
    }

    /// Read and parse an `.eml` file with default options.
    ///
    /// # Errors
    ///
    /// [`EmlError::FileNotFound`] or [`EmlError::Io`] when the file cannot be
    /// read, otherwise the same as [`EmlMessage::parse`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_file_with(path, &ParseOptions::default())
    }

    /// Read and parse an `.eml` file with explicit options.
    ///
    /// # Errors
    ///
    /// Same as [`EmlMessage::from_file`].
    pub fn from_file_with(path: impl AsRef<Path>, options: &ParseOptions) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EmlError::FileNotFound(path.to_path_buf())
            } else {
                EmlError::io(path, e)
            }
        })?;
        Self::parse_with(&data, options)
    }

    /// The root of the MIME tree.
    pub fn root(&self) -> &PartNode {
        &self.root
    }

    /// A top-level header, RFC 2047-decoded and unfolded.
    pub fn header(&self, name: &str) -> Option<HeaderValue> {
        self.root.get_header(name, true, true)
    }

    fn joined(&self, name: &str) -> Option<String> {
        self.header(name).map(|v| v.join(", "))
    }

    pub fn subject(&self) -> Option<String> {
        self.joined("subject")
    }

    pub fn from(&self) -> Option<String> {
        self.joined("from")
    }

    pub fn to(&self) -> Option<String> {
        self.joined("to")
    }

    pub fn cc(&self) -> Option<String> {
        self.joined("cc")
    }

    pub fn bcc(&self) -> Option<String> {
        self.joined("bcc")
    }

    pub fn reply_to(&self) -> Option<String> {
        self.joined("reply-to")
    }

    /// First mailbox of `From`.
    pub fn from_mailbox(&self) -> Option<Mailbox> {
        self.mailboxes("from").into_iter().next()
    }

    pub fn to_mailboxes(&self) -> Vec<Mailbox> {
        self.mailboxes("to")
    }

    pub fn cc_mailboxes(&self) -> Vec<Mailbox> {
        self.mailboxes("cc")
    }

    pub fn bcc_mailboxes(&self) -> Vec<Mailbox> {
        self.mailboxes("bcc")
    }

    pub fn reply_to_mailboxes(&self) -> Vec<Mailbox> {
        self.mailboxes("reply-to")
    }

    fn mailboxes(&self, name: &str) -> Vec<Mailbox> {
        self.header(name)
            .map(|v| v.as_slice().iter().flat_map(|s| Mailbox::parse_list(s)).collect())
            .unwrap_or_default()
    }

    /// The `Date` header in UTC. `None` when absent or unparsable.
    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.root.headers().first("date").and_then(parse_date)
    }

    pub fn direction(&self) -> Direction {
        if self.root.headers().contains("received") {
            Direction::Received
        } else {
            Direction::Sent
        }
    }

    /// Downloadable attachments, in tree order. Inline images are excluded.
    pub fn attachments(&self) -> Vec<Attachment> {
        self.root
            .walk()
            .filter(|part| is_listed_attachment(part))
            .map(|part| to_attachment(part, false))
            .collect()
    }

    /// Images referenced from HTML by `Content-ID`, in tree order.
    pub fn inline_images(&self) -> Vec<Attachment> {
        self.root
            .walk()
            .filter(|part| part.is_inline_image() && part.body().is_some())
            .map(|part| to_attachment(part, true))
            .collect()
    }

    /// Plain-text body.
    ///
    /// Falls back to the HTML body converted to text, then to the body of a
    /// single-part message.
    pub fn text(&self) -> Option<String> {
        if let Some(text) = self.body_of("plain").and_then(non_empty_trimmed) {
            return Some(text);
        }
        if let Some(html) = self.body_of("html") {
            let text = html_to_text(&html);
            if !text.is_empty() {
                return Some(text);
            }
        }
        self.root
            .body()
            .map(PartBody::to_text_lossy)
            .and_then(non_empty_trimmed)
    }

    /// HTML body, falling back to the plain-text body with `<br />` line
    /// breaks.
    pub fn html(&self) -> Option<String> {
        if let Some(html) = self.body_of("html").and_then(non_empty_trimmed) {
            return Some(html);
        }
        self.body_of("plain")
            .and_then(non_empty_trimmed)
            .map(|text| text_to_html(&text))
    }

    /// [`EmlMessage::html`] with every `cid:<content-id>` reference replaced
    /// by what `resolver` returns for the matching inline image.
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by the resolver.
    pub fn html_with_inline_images(&self, resolver: &mut dyn CidResolver) -> Result<Option<String>> {
        let Some(mut html) = self.html() else {
            return Ok(None);
        };

        for image in self.inline_images() {
            let Some(content_id) = image.content_id.as_deref().filter(|id| !id.is_empty()) else {
                continue;
            };
            if let Some(url) = resolver.resolve(&image)? {
                html = replace_ignore_case(&html, &format!("cid:{content_id}"), &url);
            }
        }
        Ok(Some(html))
    }

    /// Overview for serialization.
    pub fn summary(&self) -> MessageSummary {
        MessageSummary {
            subject: self.subject(),
            from: self.from_mailbox(),
            to: self.to_mailboxes(),
            cc: self.cc_mailboxes(),
            date: self.date(),
            direction: self.direction(),
            text: self.text(),
            attachments: self.attachments(),
            inline_images: self.inline_images(),
        }
    }

    /// Body of the first `text/<sub_type>` leaf that is not an attachment.
    fn body_of(&self, sub_type: &str) -> Option<String> {
        self.root
            .walk()
            .filter(|part| part.content_type().matches("text", Some(sub_type)))
            .find(|part| !part.is_attachment())
            .and_then(PartNode::body)
            .map(PartBody::to_text_lossy)
    }
}

/// A leaf that should be offered for download.
fn is_listed_attachment(part: &PartNode) -> bool {
    if part.body().is_none() || part.is_container() || part.is_inline_image() {
        return false;
    }
    let by_disposition = part
        .headers()
        .first("content-disposition")
        .is_some_and(|d| d.to_ascii_lowercase().contains("attachment"));
    let described = !part.content_type().is_empty() || part.filename().is_some();
    by_disposition || (part.is_attachment() && described)
}

fn to_attachment(part: &PartNode, is_inline: bool) -> Attachment {
    Attachment {
        filename: part.filename(),
        content_type: part.mime_type(),
        content_id: part.content_id(),
        is_inline,
        content: part
            .body()
            .map(|body| body.as_bytes().to_vec())
            .unwrap_or_default(),
    }
}

fn non_empty_trimmed(text: String) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Replace every ASCII-case-insensitive occurrence of `needle`.
fn replace_ignore_case(haystack: &str, needle: &str, replacement: &str) -> String {
    if needle.is_empty() {
        return haystack.to_string();
    }
    let lower_haystack = haystack.to_ascii_lowercase();
    let lower_needle = needle.to_ascii_lowercase();

    let mut out = String::with_capacity(haystack.len());
    let mut pos = 0;
    while let Some(found) = lower_haystack[pos..].find(&lower_needle) {
        let start = pos + found;
        out.push_str(&haystack[pos..start]);
        out.push_str(replacement);
        pos = start + needle.len();
    }
    out.push_str(&haystack[pos..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE: &[u8] = b"Subject: Test Email\n\
        From: Sender <sender@example.com>\n\
        To: recipient@example.com\n\
        Date: Mon, 1 Jan 2024 10:00:00 +0000\n\
        Content-Type: text/plain\n\
        \n\
        This is a test email body.\n";

    #[test]
    fn test_simple_accessors() {
        let msg = EmlMessage::parse(SIMPLE).unwrap();
        assert_eq!(msg.subject().as_deref(), Some("Test Email"));
        assert_eq!(msg.to().as_deref(), Some("recipient@example.com"));
        assert_eq!(msg.text().as_deref(), Some("This is a test email body."));
        assert_eq!(msg.direction(), Direction::Sent);
        let from = msg.from_mailbox().unwrap();
        assert_eq!(from.name.as_deref(), Some("Sender"));
        assert_eq!(from.email, "sender@example.com");
        assert_eq!(msg.date().unwrap().to_rfc3339(), "2024-01-01T10:00:00+00:00");
    }

    #[test]
    fn test_html_falls_back_to_text() {
        let msg = EmlMessage::parse(b"Content-Type: text/plain\n\nline 1\nline 2\n").unwrap();
        assert_eq!(msg.html().as_deref(), Some("line 1<br />line 2"));
    }

    #[test]
    fn test_text_falls_back_to_html() {
        let msg = EmlMessage::parse(b"Content-Type: text/html\n\n<body><p>Hi &amp; bye</p></body>").unwrap();
        assert_eq!(msg.text().as_deref(), Some("Hi & bye"));
    }

    #[test]
    fn test_text_from_untyped_body() {
        let msg = EmlMessage::parse(b"From: a@b.c\n\nBody only email.\n").unwrap();
        assert_eq!(msg.text().as_deref(), Some("Body only email."));
        assert!(msg.attachments().is_empty());
    }

    #[test]
    fn test_empty_message() {
        let msg = EmlMessage::parse(b"").unwrap();
        assert!(msg.subject().is_none());
        assert!(msg.text().is_none());
        assert!(msg.html().is_none());
        assert!(msg.date().is_none());
        assert!(msg.attachments().is_empty());
    }

    #[test]
    fn test_received_direction() {
        let msg = EmlMessage::parse(b"Received: from mx.example.com\nSubject: x\n\nbody").unwrap();
        assert_eq!(msg.direction(), Direction::Received);
        assert_eq!(msg.direction().to_string(), "received");
    }

    #[test]
    fn test_encoded_subject_and_folded_to() {
        let raw = b"Subject: =?UTF-8?B?VGVzdCBTdWJqZWN0?=\nTo: a@b.com,\n c@d.com\n\nx";
        let msg = EmlMessage::parse(raw).unwrap();
        assert_eq!(msg.subject().as_deref(), Some("Test Subject"));
        let to: Vec<String> = msg.to_mailboxes().into_iter().map(|m| m.email).collect();
        assert_eq!(to, vec!["a@b.com", "c@d.com"]);
    }

    #[test]
    fn test_data_url_resolver() {
        let raw = b"Content-Type: multipart/related; boundary=R\n\n\
            --R\nContent-Type: text/html\n\n<img src=\"CID:pic@x\">\n\
            --R\nContent-Type: image/gif\nContent-ID: <pic@x>\nContent-Transfer-Encoding: base64\n\nR0lG\n\
            --R--\n";
        let msg = EmlMessage::parse(raw).unwrap();
        let html = msg
            .html_with_inline_images(&mut DataUrlResolver)
            .unwrap()
            .unwrap();
        assert_eq!(html, "<img src=\"data:image/gif;base64,R0lG\">");
    }

    #[test]
    fn test_replace_ignore_case() {
        assert_eq!(replace_ignore_case("a CID:x b cid:X", "cid:x", "Y"), "a Y b Y");
        assert_eq!(replace_ignore_case("none", "cid:x", "Y"), "none");
    }
}
