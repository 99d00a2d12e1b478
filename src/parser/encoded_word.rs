//! RFC 2047 encoded-word decoding for header values.
//!
//! A token looks like `=?charset?encoding?text?=`. Each token is decoded on
//! its own, using its own charset, and spliced back where it was found.

use tracing::debug;

use crate::error::{EmlError, Result};
use crate::parser::decode::{decode_base64, decode_charset, decode_quoted_printable, QpMode};

/// Decode all encoded words in a header value.
///
/// Text outside encoded words is kept verbatim, whitespace included.
/// A token with an unknown encoding letter is left as it was.
///
/// Example: `"Re: =?UTF-8?B?SG9sYQ==?="` → `"Re: Hola"`
pub fn decode_encoded_words(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut remaining = input;

    while let Some(start) = remaining.find("=?") {
        result.push_str(&remaining[..start]);
        let after_start = &remaining[start + 2..];

        match scan_word(after_start) {
            Some(word) => {
                match decode_word(word.charset, word.encoding, word.text) {
                    Ok(text) => result.push_str(&text),
                    Err(e) => {
                        debug!(error = %e, "Leaving encoded word undecoded");
                        result.push_str(&remaining[start..start + 2 + word.consumed]);
                    }
                }
                remaining = &after_start[word.consumed..];
            }
            None => {
                result.push_str("=?");
                remaining = after_start;
            }
        }
    }

    result.push_str(remaining);
    result
}

/// Decode one encoded word from its three components.
///
/// # Errors
///
/// Returns [`EmlError::UnknownWordEncoding`] unless `encoding` is `B` or `Q`
/// (in either case).
pub fn decode_word(charset: &str, encoding: &str, text: &str) -> Result<String> {
    let bytes = match encoding {
        "B" | "b" => decode_base64(text.as_bytes()),
        "Q" | "q" => decode_quoted_printable(text.as_bytes(), QpMode::EncodedWord),
        other => return Err(EmlError::UnknownWordEncoding(other.to_string())),
    };
    Ok(decode_charset(&bytes, charset).text)
}

/// The pieces of a syntactically valid encoded word.
struct ScannedWord<'a> {
    charset: &'a str,
    encoding: &'a str,
    text: &'a str,
    /// Bytes consumed from the input *after* the opening `=?`.
    consumed: usize,
}

/// Match `charset?X?text?=` at the start of `s`.
///
/// The charset is `[0-9A-Za-z_:-]+`, the encoding a single ASCII letter and
/// the text runs to the first `?=` on the same line.
fn scan_word(s: &str) -> Option<ScannedWord<'_>> {
    let charset_len = s
        .bytes()
        .take_while(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b':'))
        .count();
    if charset_len == 0 {
        return None;
    }
    let charset = &s[..charset_len];

    let rest = s[charset_len..].strip_prefix('?')?;
    let encoding = rest.get(..1)?;
    if !encoding.bytes().all(|b| b.is_ascii_alphabetic()) {
        return None;
    }
    let rest = rest[1..].strip_prefix('?')?;

    let end = rest.find("?=")?;
    let text = &rest[..end];
    if text.contains('\n') {
        return None;
    }

    Some(ScannedWord {
        charset,
        encoding,
        text,
        consumed: charset_len + 1 + 1 + 1 + end + 2,
    })
}
