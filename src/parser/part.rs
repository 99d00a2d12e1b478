//! The MIME part tree.
//!
//! A [`PartNode`] is built once from an immutable byte slice. Multipart
//! bodies are split at their boundary and every section is parsed
//! recursively; a section that fails to parse is dropped and recorded in
//! [`PartNode::discarded`] while its siblings carry on. Only a broken
//! multipart declaration on the node itself is fatal.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{EmlError, Result};
use crate::parser::decode::{
    decode_charset, decode_content, decode_transfer, is_iso_2022_jp, TransferEncoding,
};
use crate::parser::encoded_word::decode_encoded_words;
use crate::parser::header::{HeaderStore, HeaderValue};
use crate::parser::repair::{LiteralIso2022Jp, TextRepair};

/// Default cap on boundary occurrences scanned per multipart body.
pub const DEFAULT_MAX_BOUNDARIES: usize = 1000;

/// Default cap on MIME nesting depth.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Line-ending convention of a byte slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    /// Only bare `\n`.
    Unix,
    /// Only `\r\n`.
    Windows,
    /// Both kinds.
    Mixed,
    /// No line breaks at all.
    Unknown,
}

impl LineEnding {
    /// Count bare `\n` against `\r\n`.
    pub fn detect(raw: &[u8]) -> Self {
        let total = raw.iter().filter(|&&b| b == b'\n').count();
        let windows = raw.windows(2).filter(|w| w == b"\r\n").count();
        let unix = total - windows;

        match (unix > 0, windows > 0) {
            (true, true) => Self::Mixed,
            (true, false) => Self::Unix,
            (false, true) => Self::Windows,
            (false, false) => Self::Unknown,
        }
    }

    /// The blank-line separator between headers and body.
    pub fn separator(self) -> &'static [u8] {
        match self {
            Self::Unix => b"\n\n",
            _ => b"\r\n\r\n",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unix => "unix",
            Self::Windows => "windows",
            Self::Mixed => "mixed",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for LineEnding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Split a part at its first blank line.
///
/// Without a separator there is no header block and the whole slice is body.
pub fn split_header_body(raw: &[u8], line_ending: LineEnding) -> (Option<&[u8]>, &[u8]) {
    let separator = line_ending.separator();
    match find_bytes(raw, separator, 0) {
        Some(pos) => (Some(&raw[..pos]), &raw[pos + separator.len()..]),
        None => (None, raw),
    }
}

/// A resolved `Content-Type` header.
///
/// All fields are `None` when the header is absent or does not look like
/// `media/sub`. Media and sub-type are lower-cased.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentType {
    pub media_type: Option<String>,
    pub sub_type: Option<String>,
    /// Everything after the type, trimmed, `None` when empty.
    pub args: Option<String>,
}

impl ContentType {
    /// Parse `media/sub[;] args`.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        let media_len = value.bytes().take_while(|&b| is_type_byte(b)).count();
        let Some(rest) = value[media_len..].strip_prefix('/') else {
            return Self::default();
        };
        let sub_len = rest.bytes().take_while(|&b| is_type_byte(b)).count();
        if media_len == 0 || sub_len == 0 {
            return Self::default();
        }

        let args = rest[sub_len..].strip_prefix(';').unwrap_or(&rest[sub_len..]).trim();
        Self {
            media_type: Some(value[..media_len].to_ascii_lowercase()),
            sub_type: Some(rest[..sub_len].to_ascii_lowercase()),
            args: (!args.is_empty()).then(|| args.to_string()),
        }
    }

    /// `true` if nothing could be resolved.
    pub fn is_empty(&self) -> bool {
        self.media_type.is_none()
    }

    /// `"media/sub"`, when both halves are known.
    pub fn mime_type(&self) -> Option<String> {
        Some(format!("{}/{}", self.media_type.as_ref()?, self.sub_type.as_ref()?))
    }

    /// Match against a media type and an optional sub-type, ignoring case.
    pub fn matches(&self, media_type: &str, sub_type: Option<&str>) -> bool {
        let eq = |have: &Option<String>, want: &str| {
            have.as_deref().is_some_and(|h| h.eq_ignore_ascii_case(want))
        };
        eq(&self.media_type, media_type) && sub_type.map_or(true, |s| eq(&self.sub_type, s))
    }

    pub fn is_multipart(&self) -> bool {
        self.media_type.as_deref() == Some("multipart")
    }

    /// The `boundary` parameter. Quotes and whitespace are not part of it.
    pub fn boundary(&self) -> Option<String> {
        let value = param_value(self.args.as_deref()?, "boundary")?;
        value.split_whitespace().next().map(str::to_string)
    }

    /// The `charset` parameter.
    pub fn charset(&self) -> Option<String> {
        let value = param_value(self.args.as_deref()?, "charset")?;
        value.split_whitespace().next().map(str::to_string)
    }
}

fn is_type_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'+' | b'_')
}

/// Find `name=value` in a header value, case-insensitively.
///
/// A quoted value runs to the closing quote, a bare one to `;` or the end of
/// the line. The name must not be the tail of a longer word, so `name` does
/// not match inside `filename`. RFC 2231 `name*=charset''value` is decoded.
pub fn param_value(header: &str, name: &str) -> Option<String> {
    let lower = header.to_ascii_lowercase();
    let name = name.to_ascii_lowercase();
    let mut from = 0;

    while let Some(found) = lower[from..].find(&name) {
        let start = from + found;
        let after = start + name.len();
        from = after;

        let preceded_by_word = lower[..start]
            .bytes()
            .next_back()
            .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        if preceded_by_word {
            continue;
        }

        let rest = &header[after..];
        if let Some(value) = rest.trim_start().strip_prefix('=') {
            return Some(read_param_value(value)).filter(|v| !v.is_empty());
        }
        if let Some(value) = rest.strip_prefix("*=") {
            return decode_rfc2231(&read_param_value(value));
        }
    }
    None
}

fn read_param_value(value: &str) -> String {
    let value = value.trim_start_matches([' ', '\t']);
    if let Some(quoted) = value.strip_prefix('"') {
        let end = quoted.find(['"', '\n']).unwrap_or(quoted.len());
        return quoted[..end].to_string();
    }
    let end = value.find([';', '\r', '\n']).unwrap_or(value.len());
    value[..end].trim().to_string()
}

/// `utf-8''na%C3%AFve.txt` → `naïve.txt`
fn decode_rfc2231(value: &str) -> Option<String> {
    let mut pieces = value.splitn(3, '\'');
    let (charset, encoded) = match (pieces.next(), pieces.next(), pieces.next()) {
        (Some(charset), Some(_lang), Some(encoded)) => (charset, encoded),
        _ => ("utf-8", value),
    };

    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let hex = bytes
            .get(i + 1..i + 3)
            .and_then(|h| std::str::from_utf8(h).ok())
            .and_then(|h| u8::from_str_radix(h, 16).ok());
        match (bytes[i], hex) {
            (b'%', Some(byte)) => {
                out.push(byte);
                i += 3;
            }
            (b, _) => {
                out.push(b);
                i += 1;
            }
        }
    }

    let charset = if charset.is_empty() { "utf-8" } else { charset };
    let text = decode_charset(&out, charset).text;
    (!text.is_empty()).then_some(text)
}

/// Decoded body of a leaf part.
#[derive(Clone, PartialEq, Eq)]
pub enum PartBody {
    /// A `text/*` part decoded to Unicode.
    Text(String),
    /// Anything else, transfer-decoded only.
    Binary(Vec<u8>),
}

impl PartBody {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }

    /// Text as-is, binary decoded as UTF-8 with replacement characters.
    pub fn to_text_lossy(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Binary(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

impl fmt::Debug for PartBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Binary(bytes) => write!(f, "Binary({} bytes)", bytes.len()),
        }
    }
}

/// A sub-part that could not be parsed and was left out of the tree.
#[derive(Debug)]
pub struct DiscardedPart {
    /// Position of the section among the boundary-delimited sections.
    pub index: usize,
    pub error: EmlError,
}

/// Knobs for [`PartNode::parse_with`].
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Boundary occurrences scanned per multipart body.
    pub max_boundaries: usize,
    /// Deepest nesting level accepted; deeper sections are discarded.
    pub max_depth: usize,
    /// Fix-up applied to ISO-2022-JP text leaves.
    pub repair: Arc<dyn TextRepair>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_boundaries: DEFAULT_MAX_BOUNDARIES,
            max_depth: DEFAULT_MAX_DEPTH,
            repair: Arc::new(LiteralIso2022Jp::new()),
        }
    }
}

impl ParseOptions {
    /// Replace the text repair strategy.
    pub fn with_repair(mut self, repair: impl TextRepair + 'static) -> Self {
        self.repair = Arc::new(repair);
        self
    }
}

/// One node of the MIME tree: either a leaf with a body or a multipart
/// container with children.
#[derive(Debug)]
pub struct PartNode {
    headers: HeaderStore,
    content_type: ContentType,
    body: Option<PartBody>,
    children: Vec<PartNode>,
    discarded: Vec<DiscardedPart>,
    line_ending: LineEnding,
}

impl PartNode {
    /// Parse with default options.
    ///
    /// # Errors
    ///
    /// [`EmlError::MissingBoundary`] or [`EmlError::UnterminatedMultipart`]
    /// when this part declares a multipart body it cannot split.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        Self::parse_with(raw, &ParseOptions::default())
    }

    /// Parse with explicit options.
    ///
    /// # Errors
    ///
    /// Same as [`PartNode::parse`].
    pub fn parse_with(raw: &[u8], options: &ParseOptions) -> Result<Self> {
        Self::build(raw, options, 0)
    }

    fn build(raw: &[u8], options: &ParseOptions, depth: usize) -> Result<Self> {
        if depth > options.max_depth {
            return Err(EmlError::NestingTooDeep {
                depth: options.max_depth,
            });
        }

        let line_ending = LineEnding::detect(raw);
        let (header_raw, body_raw) = split_header_body(raw, line_ending);
        let headers = header_raw.map(HeaderStore::parse).unwrap_or_default();
        let content_type = headers
            .first("content-type")
            .map(ContentType::parse)
            .unwrap_or_default();

        let mut node = Self {
            headers,
            content_type,
            body: None,
            children: Vec::new(),
            discarded: Vec::new(),
            line_ending,
        };

        if node.has_attachment_disposition() {
            node.body = node.binary_body(body_raw);
        } else {
            match node.content_type.media_type.as_deref() {
                Some("multipart") => node.split_multipart(body_raw, options, depth)?,
                Some("text") => node.body = node.text_body(body_raw, options),
                _ => node.body = node.binary_body(body_raw),
            }
        }

        Ok(node)
    }

    fn split_multipart(&mut self, body: &[u8], options: &ParseOptions, depth: usize) -> Result<()> {
        let boundary = self.content_type.boundary().ok_or(EmlError::MissingBoundary)?;
        let delimiter = format!("--{boundary}");
        let terminator = format!("--{boundary}--");

        let Some(end) = find_bytes(body, terminator.as_bytes(), 0) else {
            return Err(EmlError::UnterminatedMultipart { boundary });
        };
        let content = &body[..end + terminator.len()];

        let mut positions = Vec::new();
        let mut from = 0;
        while positions.len() < options.max_boundaries {
            let Some(pos) = find_bytes(content, delimiter.as_bytes(), from) else {
                break;
            };
            positions.push(pos);
            from = pos + delimiter.len();
        }
        if positions.len() == options.max_boundaries {
            warn!(
                boundary = %boundary,
                cap = options.max_boundaries,
                "Boundary cap reached, ignoring the remaining sections"
            );
        }

        for (index, pair) in positions.windows(2).enumerate() {
            let section = &content[pair[0] + delimiter.len()..pair[1]];
            if section.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            match Self::build(section, options, depth + 1) {
                Ok(child) => self.children.push(child),
                Err(error) => {
                    warn!(index, depth = depth + 1, error = %error, "Dropping malformed MIME part");
                    self.discarded.push(DiscardedPart { index, error });
                }
            }
        }

        debug!(
            boundary = %boundary,
            children = self.children.len(),
            discarded = self.discarded.len(),
            "Split multipart body"
        );
        Ok(())
    }

    fn text_body(&self, raw: &[u8], options: &ParseOptions) -> Option<PartBody> {
        if raw.is_empty() {
            return None;
        }
        let charset = self
            .content_type
            .charset()
            .unwrap_or_else(|| "utf-8".to_string());
        let bytes = decode_transfer(raw, &self.transfer_encoding());
        let text = decode_charset(&bytes, &charset).text;

        let text = if is_iso_2022_jp(&charset) {
            options.repair.repair(&text).into_owned()
        } else {
            text
        };
        Some(PartBody::Text(text))
    }

    /// Text parts sent as attachments are re-encoded to UTF-8 when their
    /// charset allows it.
    fn binary_body(&self, raw: &[u8]) -> Option<PartBody> {
        if raw.is_empty() {
            return None;
        }
        let charset = self
            .content_type
            .charset()
            .filter(|_| self.content_type.media_type.as_deref() == Some("text"));
        Some(PartBody::Binary(decode_content(
            raw,
            &self.transfer_encoding(),
            charset.as_deref(),
        )))
    }

    fn has_attachment_disposition(&self) -> bool {
        self.headers
            .first("content-disposition")
            .is_some_and(|d| d.to_ascii_lowercase().contains("attachment"))
    }

    // ── Queries ─────────────────────────────────────────────────

    /// All headers of this part.
    pub fn headers(&self) -> &HeaderStore {
        &self.headers
    }

    /// Raw header value, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&HeaderValue> {
        self.headers.get(name)
    }

    /// Header value with optional RFC 2047 decoding and unfolding.
    pub fn get_header(&self, name: &str, decode: bool, strip_line_breaks: bool) -> Option<HeaderValue> {
        self.headers.lookup(name, decode, strip_line_breaks)
    }

    pub fn content_type(&self) -> &ContentType {
        &self.content_type
    }

    /// `"media/sub"` of this part.
    pub fn mime_type(&self) -> Option<String> {
        self.content_type.mime_type()
    }

    /// The `Content-Transfer-Encoding` of this part (`binary` when absent).
    pub fn transfer_encoding(&self) -> TransferEncoding {
        TransferEncoding::from_header(self.headers.first("content-transfer-encoding"))
    }

    /// `Content-Disposition` says attachment, or the media type is neither
    /// multipart nor text (unknown types included).
    pub fn is_attachment(&self) -> bool {
        self.has_attachment_disposition()
            || !matches!(
                self.content_type.media_type.as_deref(),
                Some("multipart") | Some("text")
            )
    }

    /// An image marked inline or carrying a `Content-ID`.
    pub fn is_inline_image(&self) -> bool {
        let inline = self
            .headers
            .first("content-disposition")
            .is_some_and(|d| d.to_ascii_lowercase().contains("inline"));
        let has_id = self.headers.contains("content-id");
        (inline || has_id) && self.content_type.media_type.as_deref() == Some("image")
    }

    /// `true` for multipart nodes.
    pub fn is_container(&self) -> bool {
        self.content_type.is_multipart() && !self.has_attachment_disposition()
    }

    /// File name from `Content-Disposition`, then `Content-Type`, then one
    /// derived from the `Content-ID` of an inline image.
    pub fn filename(&self) -> Option<String> {
        let from_header = |header: &str, param: &str| {
            self.headers
                .first(header)
                .and_then(|value| param_value(value, param))
                .map(|name| decode_encoded_words(&name))
        };

        if let Some(name) = from_header("content-disposition", "filename") {
            return Some(name);
        }
        if let Some(name) = from_header("content-type", "name") {
            return Some(name);
        }

        if self.is_inline_image() {
            let id = self.headers.first("content-id")?;
            let cleaned: String = id.chars().filter(|c| !matches!(c, '<' | '>' | '@')).collect();
            let ext = self.content_type.sub_type.as_deref().unwrap_or("img");
            return Some(format!("{cleaned}.{ext}"));
        }
        None
    }

    /// `Content-ID` without its angle brackets.
    pub fn content_id(&self) -> Option<String> {
        let id = self.headers.first("content-id")?;
        Some(id.trim().trim_matches(['<', '>']).to_string())
    }

    /// Decoded body; `None` for containers and empty bodies.
    pub fn body(&self) -> Option<&PartBody> {
        self.body.as_ref()
    }

    pub fn children(&self) -> &[PartNode] {
        &self.children
    }

    /// Sub-parts that failed to parse.
    pub fn discarded(&self) -> &[DiscardedPart] {
        &self.discarded
    }

    pub fn line_ending(&self) -> LineEnding {
        self.line_ending
    }

    /// Pre-order traversal over this node and every descendant.
    pub fn walk(&self) -> Walk<'_> {
        Walk { stack: vec![self] }
    }

    /// First node in pre-order whose content type matches. Without a
    /// sub-type only the media type is compared.
    pub fn find_first_by_content_type(&self, media_type: &str, sub_type: Option<&str>) -> Option<&PartNode> {
        self.walk()
            .find(|node| node.content_type.matches(media_type, sub_type))
    }
}

/// Pre-order iterator returned by [`PartNode::walk`].
pub struct Walk<'a> {
    stack: Vec<&'a PartNode>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a PartNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// Position of `needle` in `haystack` at or after `from`.
fn find_bytes(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::repair::NoRepair;

    fn two_part(boundary: &str) -> Vec<u8> {
        format!(
            "Subject: Multipart Test\n\
             Content-Type: multipart/mixed; boundary=\"{boundary}\"\n\
             \n\
             --{boundary}\n\
             Content-Type: text/plain\n\
             \n\
             Plain text content.\n\
             --{boundary}\n\
             Content-Type: text/html\n\
             \n\
             <p>HTML content.</p>\n\
             --{boundary}--\n"
        )
        .into_bytes()
    }

    fn text_of(node: &PartNode) -> &str {
        node.body().and_then(PartBody::as_text).unwrap()
    }

    // ─── Line endings and splitting ───

    #[test]
    fn test_line_ending_detection() {
        assert_eq!(LineEnding::detect(b"a\nb\n"), LineEnding::Unix);
        assert_eq!(LineEnding::detect(b"a\r\nb\r\n"), LineEnding::Windows);
        assert_eq!(LineEnding::detect(b"a\r\nb\n"), LineEnding::Mixed);
        assert_eq!(LineEnding::detect(b"abc"), LineEnding::Unknown);
    }

    #[test]
    fn test_split_without_separator() {
        let (headers, body) = split_header_body(b"just a body", LineEnding::Unknown);
        assert!(headers.is_none());
        assert_eq!(body, b"just a body");
    }

    #[test]
    fn test_split_windows() {
        let (headers, body) = split_header_body(b"A: 1\r\n\r\nbody", LineEnding::Windows);
        assert_eq!(headers, Some(&b"A: 1"[..]));
        assert_eq!(body, b"body");
    }

    #[test]
    fn test_split_mixed_uses_crlf_separator() {
        // Unix header block, CRLF body: no "\r\n\r\n", so it is all body.
        let raw = b"Subject: Mixed\nContent-Type: text/plain\n\nline one\r\nline two\r\n";
        assert_eq!(LineEnding::detect(raw), LineEnding::Mixed);
        let (headers, body) = split_header_body(raw, LineEnding::Mixed);
        assert!(headers.is_none());
        assert_eq!(body, &raw[..]);

        let node = PartNode::parse(raw).unwrap();
        assert_eq!(node.line_ending(), LineEnding::Mixed);
        assert!(node.headers().is_empty());
        assert_eq!(node.body().unwrap().as_bytes(), &raw[..]);
    }

    #[test]
    fn test_split_mixed_at_first_crlf_blank_line() {
        let raw = b"Subject: A\nX-Tag: y\r\n\r\nbody\n";
        let node = PartNode::parse(raw).unwrap();
        assert_eq!(node.line_ending(), LineEnding::Mixed);
        assert_eq!(node.headers().first("subject"), Some("A"));
        assert_eq!(node.headers().first("x-tag"), Some("y"));
        assert_eq!(node.body().unwrap().as_bytes(), b"body\n");
    }

    // ─── Content type ───

    #[test]
    fn test_content_type_parse() {
        let ct = ContentType::parse("Text/HTML; charset=utf-8");
        assert_eq!(ct.media_type.as_deref(), Some("text"));
        assert_eq!(ct.sub_type.as_deref(), Some("html"));
        assert_eq!(ct.args.as_deref(), Some("charset=utf-8"));
        assert_eq!(ct.mime_type().as_deref(), Some("text/html"));
    }

    #[test]
    fn test_content_type_unparsable() {
        assert!(ContentType::parse("garbage").is_empty());
        assert!(ContentType::parse("/plain").is_empty());
        assert!(ContentType::parse("").is_empty());
        assert_eq!(ContentType::parse("text/plain").args, None);
    }

    #[test]
    fn test_boundary_quoted_and_bare() {
        let quoted = ContentType::parse("multipart/mixed; boundary=\"abc 123\"");
        assert_eq!(quoted.boundary().as_deref(), Some("abc"));
        let bare = ContentType::parse("multipart/mixed;\n\tBOUNDARY=----=_Part_1; x=y");
        assert_eq!(bare.boundary().as_deref(), Some("----=_Part_1"));
    }

    #[test]
    fn test_charset_param() {
        let ct = ContentType::parse("text/plain; charset=\"ISO-8859-1\"; format=flowed");
        assert_eq!(ct.charset().as_deref(), Some("ISO-8859-1"));
    }

    #[test]
    fn test_param_value_respects_word_boundary() {
        let cd = "attachment; filename=\"report.pdf\"";
        assert_eq!(param_value(cd, "filename").as_deref(), Some("report.pdf"));
        assert_eq!(param_value(cd, "name"), None);
    }

    #[test]
    fn test_param_value_rfc2231() {
        let cd = "attachment; filename*=utf-8''na%C3%AFve%20file.txt";
        assert_eq!(param_value(cd, "filename").as_deref(), Some("naïve file.txt"));
    }

    // ─── Tree construction ───

    #[test]
    fn test_two_part_multipart() {
        let node = PartNode::parse(&two_part("B")).unwrap();
        assert!(node.body().is_none());
        assert_eq!(node.children().len(), 2);
        assert_eq!(text_of(&node.children()[0]).trim(), "Plain text content.");
        assert_eq!(text_of(&node.children()[1]).trim(), "<p>HTML content.</p>");
        assert!(node.discarded().is_empty());
    }

    #[test]
    fn test_missing_boundary_is_fatal() {
        let raw = b"Content-Type: multipart/mixed\n\nbody";
        assert!(matches!(PartNode::parse(raw), Err(EmlError::MissingBoundary)));
    }

    #[test]
    fn test_unterminated_multipart_is_fatal() {
        let raw = b"Content-Type: multipart/mixed; boundary=B\n\n--B\nContent-Type: text/plain\n\nhi\n";
        match PartNode::parse(raw) {
            Err(EmlError::UnterminatedMultipart { boundary }) => assert_eq!(boundary, "B"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_broken_child_is_discarded() {
        let raw = b"Content-Type: multipart/mixed; boundary=OUT\n\n\
            --OUT\nContent-Type: multipart/alternative\n\nno boundary here\n\
            --OUT\nContent-Type: text/plain\n\nsurvivor\n\
            --OUT--\n";
        let node = PartNode::parse(raw).unwrap();
        assert_eq!(node.children().len(), 1);
        assert_eq!(text_of(&node.children()[0]).trim(), "survivor");
        assert_eq!(node.discarded().len(), 1);
        assert_eq!(node.discarded()[0].index, 0);
        assert!(matches!(node.discarded()[0].error, EmlError::MissingBoundary));
    }

    #[test]
    fn test_whitespace_sections_skipped() {
        let raw = b"Content-Type: multipart/mixed; boundary=B\n\n--B\n\n--B\nContent-Type: text/plain\n\nx\n--B--";
        let node = PartNode::parse(raw).unwrap();
        assert_eq!(node.children().len(), 1);
        assert!(node.discarded().is_empty());
    }

    #[test]
    fn test_trailing_garbage_after_terminator_ignored() {
        let mut raw = two_part("B");
        raw.extend_from_slice(b"--B\nContent-Type: text/plain\n\nafter the end\n");
        let node = PartNode::parse(&raw).unwrap();
        assert_eq!(node.children().len(), 2);
    }

    #[test]
    fn test_depth_cap() {
        let raw = b"Content-Type: multipart/mixed; boundary=A\n\n\
            --A\nContent-Type: multipart/mixed; boundary=C\n\n\
            --C\nContent-Type: text/plain\n\ndeep\n--C--\n\
            --A--\n";
        let options = ParseOptions {
            max_depth: 1,
            ..ParseOptions::default()
        };
        let node = PartNode::parse_with(raw, &options).unwrap();
        let inner = &node.children()[0];
        assert!(inner.children().is_empty());
        assert!(matches!(
            inner.discarded()[0].error,
            EmlError::NestingTooDeep { depth: 1 }
        ));

        let unbounded = PartNode::parse(raw).unwrap();
        assert_eq!(unbounded.children()[0].children().len(), 1);
    }

    #[test]
    fn test_boundary_cap() {
        let mut raw = String::from("Content-Type: multipart/mixed; boundary=B\n\n");
        for i in 0..5 {
            raw.push_str(&format!("--B\nContent-Type: text/plain\n\npart {i}\n"));
        }
        raw.push_str("--B--\n");
        let options = ParseOptions {
            max_boundaries: 3,
            ..ParseOptions::default()
        };
        let node = PartNode::parse_with(raw.as_bytes(), &options).unwrap();
        assert_eq!(node.children().len(), 2);
    }

    #[test]
    fn test_crlf_message() {
        let raw = b"Subject: Hi\r\nContent-Type: multipart/mixed; boundary=X\r\n\r\n\
            --X\r\nContent-Type: text/plain\r\n\r\nwindows body\r\n--X--\r\n";
        let node = PartNode::parse(raw).unwrap();
        assert_eq!(node.line_ending(), LineEnding::Windows);
        assert_eq!(node.children().len(), 1);
        assert_eq!(text_of(&node.children()[0]), "windows body\r\n");
    }

    #[test]
    fn test_empty_input() {
        let node = PartNode::parse(b"").unwrap();
        assert!(node.headers().is_empty());
        assert!(node.body().is_none());
        assert!(node.children().is_empty());
    }

    // ─── Leaves ───

    #[test]
    fn test_base64_binary_leaf() {
        let raw = b"Content-Type: application/octet-stream\nContent-Transfer-Encoding: base64\n\nSGVsbG8gV29ybGQ=\n";
        let node = PartNode::parse(raw).unwrap();
        assert_eq!(node.body().unwrap().as_bytes(), b"Hello World");
    }

    #[test]
    fn test_quoted_printable_leaf() {
        let raw = b"Content-Transfer-Encoding: quoted-printable\n\nHello=20World=21";
        let node = PartNode::parse(raw).unwrap();
        assert_eq!(node.body().unwrap().as_bytes(), b"Hello World!");
    }

    #[test]
    fn test_latin1_text_leaf() {
        let raw = b"Content-Type: text/plain; charset=iso-8859-1\n\ncaf\xe9";
        let node = PartNode::parse(raw).unwrap();
        assert_eq!(text_of(&node), "caf\u{e9}");
    }

    #[test]
    fn test_iso_2022_jp_leaf_with_repair() {
        let raw = b"Content-Type: text/plain; charset=ISO-2022-JP\n\n\x1b$B$3$s$K$A$O\x1b(B $B7r9/(B";
        let node = PartNode::parse(raw).unwrap();
        assert_eq!(text_of(&node), "こんにちは 健康");

        let options = ParseOptions::default().with_repair(NoRepair);
        let plain = PartNode::parse_with(raw, &options).unwrap();
        assert_eq!(text_of(&plain), "こんにちは $B7r9/(B");
    }

    #[test]
    fn test_attachment_disposition_forces_binary() {
        let raw = b"Content-Type: text/plain\nContent-Disposition: attachment; filename=\"notes.txt\"\n\nhello";
        let node = PartNode::parse(raw).unwrap();
        assert!(matches!(node.body(), Some(PartBody::Binary(_))));
        assert!(node.is_attachment());
        assert_eq!(node.filename().as_deref(), Some("notes.txt"));
    }

    #[test]
    fn test_text_attachment_transcoded_to_utf8() {
        let raw = b"Content-Type: text/plain; charset=iso-8859-1\n\
            Content-Disposition: attachment; filename=\"notes.txt\"\n\
            Content-Transfer-Encoding: quoted-printable\n\ncaf=E9";
        let node = PartNode::parse(raw).unwrap();
        assert_eq!(node.body().unwrap().as_bytes(), "café".as_bytes());
    }

    #[test]
    fn test_text_attachment_with_invalid_bytes_kept() {
        let raw = b"Content-Type: text/plain; charset=shift_jis\n\
            Content-Disposition: attachment\n\nok \x81\x20 end";
        let node = PartNode::parse(raw).unwrap();
        assert_eq!(node.body().unwrap().as_bytes(), b"ok \x81\x20 end");
    }

    #[test]
    fn test_unknown_charset_text_falls_back_to_utf8() {
        let mut raw = b"Content-Type: text/plain; charset=x-unknown\n\n".to_vec();
        raw.extend_from_slice("José — fine é".as_bytes());
        raw.push(0x80);
        let node = PartNode::parse(&raw).unwrap();
        assert_eq!(text_of(&node), "José — fine é\u{FFFD}");
    }

    // ─── Classification ───

    #[test]
    fn test_pdf_attachment() {
        let raw = b"Content-Type: application/pdf\n\
            Content-Disposition: attachment; filename=\"document.pdf\"\n\
            Content-Transfer-Encoding: base64\n\nJVBERi0xLjQ=\n";
        let node = PartNode::parse(raw).unwrap();
        assert!(node.is_attachment());
        assert!(!node.is_inline_image());
        assert_eq!(node.filename().as_deref(), Some("document.pdf"));
        assert!(!node.body().unwrap().is_empty());
    }

    #[test]
    fn test_inline_image_by_content_id() {
        let raw = b"Content-Type: image/png\nContent-ID: <image1@example.com>\nContent-Transfer-Encoding: base64\n\niVBORw0KGgo=\n";
        let node = PartNode::parse(raw).unwrap();
        assert!(node.is_inline_image());
        assert_eq!(node.content_id().as_deref(), Some("image1@example.com"));
        assert_eq!(node.filename().as_deref(), Some("image1example.com.png"));
    }

    #[test]
    fn test_text_part_is_not_attachment() {
        let node = PartNode::parse(b"Content-Type: text/plain\n\nhi").unwrap();
        assert!(!node.is_attachment());
        let unknown = PartNode::parse(b"no headers at all").unwrap();
        assert!(unknown.is_attachment());
    }

    #[test]
    fn test_encoded_filename() {
        let raw = b"Content-Type: application/pdf; name=\"=?UTF-8?B?aW5mb3JtZS5wZGY=?=\"\n\nx";
        let node = PartNode::parse(raw).unwrap();
        assert_eq!(node.filename().as_deref(), Some("informe.pdf"));
    }

    // ─── Queries ───

    #[test]
    fn test_find_first_by_content_type() {
        let node = PartNode::parse(&two_part("B")).unwrap();
        let html = node.find_first_by_content_type("text", Some("html")).unwrap();
        assert_eq!(text_of(html).trim(), "<p>HTML content.</p>");
        let first_text = node.find_first_by_content_type("text", None).unwrap();
        assert_eq!(first_text.mime_type().as_deref(), Some("text/plain"));
        assert!(node.find_first_by_content_type("image", None).is_none());
        assert!(node.find_first_by_content_type("multipart", None).is_some());
    }

    #[test]
    fn test_walk_is_preorder() {
        let raw = b"Content-Type: multipart/mixed; boundary=A\n\n\
            --A\nContent-Type: multipart/alternative; boundary=C\n\n\
            --C\nContent-Type: text/plain\n\none\n\
            --C\nContent-Type: text/html\n\ntwo\n--C--\n\
            --A\nContent-Type: image/gif\n\nthree\n\
            --A--\n";
        let node = PartNode::parse(raw).unwrap();
        let types: Vec<String> = node.walk().filter_map(PartNode::mime_type).collect();
        assert_eq!(
            types,
            vec![
                "multipart/mixed",
                "multipart/alternative",
                "text/plain",
                "text/html",
                "image/gif"
            ]
        );
    }

    #[test]
    fn test_get_header_multiple_received() {
        let raw = b"Received: from server1.example.com\nReceived: from server2.example.com\n\nbody";
        let node = PartNode::parse(raw).unwrap();
        match node.get_header("Received", true, true) {
            Some(HeaderValue::Multiple(values)) => {
                assert_eq!(values.len(), 2);
                assert!(values[0].contains("server1"));
                assert!(values[1].contains("server2"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
