//! Content decoding: transfer encodings (base64, quoted-printable) and charsets.
//!
//! Every function here is total. A payload that cannot be decoded comes back
//! as the raw bytes, and a charset that cannot be honoured falls back through
//! a fixed chain that ends in UTF-8 with replacement characters.

use std::fmt;

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use encoding_rs::{Encoding, ISO_2022_JP, UTF_8};
use tracing::debug;

/// Base64 engine that tolerates missing padding and stray trailing bits,
/// which real-world mailers produce routinely.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// ISO-2022-JP labels tried in strict mode before settling for replacement.
/// Senders mislabel the exact variant, so the whole family is attempted.
const ISO_2022_JP_VARIANTS: &[&str] = &[
    "iso-2022-jp",
    "iso-2022-jp-1",
    "iso-2022-jp-2",
    "iso-2022-jp-3",
    "iso-2022-jp-2004",
    "csiso2022jp",
];

/// Value of a `Content-Transfer-Encoding` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    SevenBit,
    /// 8-bit text.
    EightBit,
    /// Raw binary, also the default when the header is absent.
    Binary,
    /// Base64 (RFC 2045 §6.8).
    Base64,
    /// Quoted-Printable (RFC 2045 §6.7).
    QuotedPrintable,
    /// Anything else. Passed through untouched.
    Other(String),
}

impl TransferEncoding {
    /// Parse a header value, case-insensitively.
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        match trimmed.to_ascii_uppercase().as_str() {
            "7BIT" => Self::SevenBit,
            "8BIT" => Self::EightBit,
            "BINARY" | "" => Self::Binary,
            "BASE64" => Self::Base64,
            "QUOTED-PRINTABLE" => Self::QuotedPrintable,
            _ => Self::Other(trimmed.to_string()),
        }
    }

    /// Resolve an optional header value; absence means `BINARY`.
    pub fn from_header(value: Option<&str>) -> Self {
        value.map_or(Self::Binary, Self::parse)
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::EightBit => write!(f, "8bit"),
            Self::Binary => write!(f, "binary"),
            Self::Base64 => write!(f, "base64"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
            Self::Other(name) => write!(f, "{name}"),
        }
    }
}

/// Which quoted-printable dialect to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QpMode {
    /// RFC 2045 body encoding.
    Body,
    /// RFC 2047 `Q` encoding: `_` stands for a space.
    EncodedWord,
}

/// Which step of the charset fallback chain produced a text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStep {
    /// The declared charset decoded the bytes without errors.
    Strict,
    /// The declared charset needed replacement characters.
    Replacement,
    /// The declared charset was unknown; the bytes were valid UTF-8.
    Utf8Fallback,
    /// The declared charset was unknown; UTF-8 needed replacement characters.
    Utf8Replacement,
}

/// Text produced by [`decode_charset`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    /// The decoded text.
    pub text: String,
    /// How the text was obtained.
    pub step: DecodeStep,
    /// Name of the encoding that was finally used.
    pub encoding: &'static str,
}

impl DecodedText {
    /// `true` when something was lost or guessed along the way.
    pub fn is_degraded(&self) -> bool {
        self.step != DecodeStep::Strict
    }
}

/// Undo a transfer encoding.
pub fn decode_transfer(raw: &[u8], encoding: &TransferEncoding) -> Vec<u8> {
    match encoding {
        TransferEncoding::Base64 => decode_base64(raw),
        TransferEncoding::QuotedPrintable => decode_quoted_printable(raw, QpMode::Body),
        TransferEncoding::SevenBit
        | TransferEncoding::EightBit
        | TransferEncoding::Binary
        | TransferEncoding::Other(_) => raw.to_vec(),
    }
}

/// Undo a transfer encoding and, when `charset` names a known non-UTF-8
/// charset, re-encode the result as UTF-8 bytes.
///
/// An unknown charset leaves the transfer-decoded bytes unmodified.
pub fn decode_content(raw: &[u8], encoding: &TransferEncoding, charset: Option<&str>) -> Vec<u8> {
    let decoded = decode_transfer(raw, encoding);
    match charset {
        Some(label) => transcode_to_utf8(decoded, label),
        None => decoded,
    }
}

/// Decode base64, ignoring whitespace and other non-alphabet bytes.
///
/// Returns the original payload when it is not valid base64.
pub fn decode_base64(raw: &[u8]) -> Vec<u8> {
    let cleaned: Vec<u8> = raw
        .iter()
        .copied()
        .filter(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'='))
        .collect();

    match LENIENT_BASE64.decode(&cleaned) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(error = %e, len = raw.len(), "Invalid base64 payload, keeping raw bytes");
            raw.to_vec()
        }
    }
}

/// Decode quoted-printable in the given dialect.
///
/// Returns the original payload when decoding fails.
pub fn decode_quoted_printable(raw: &[u8], mode: QpMode) -> Vec<u8> {
    let input: Vec<u8> = match mode {
        QpMode::Body => raw.to_vec(),
        QpMode::EncodedWord => raw
            .iter()
            .map(|&b| if b == b'_' { b' ' } else { b })
            .collect(),
    };

    match quoted_printable::decode(&input, quoted_printable::ParseMode::Robust) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(error = %e, "Invalid quoted-printable payload, keeping raw bytes");
            input
        }
    }
}

/// Look up a charset label. Unknown labels yield `None`.
pub fn resolve_charset(label: &str) -> Option<&'static Encoding> {
    let label = label.trim().trim_matches('"');
    Encoding::for_label(label.as_bytes()).or_else(|| {
        // Numbered ISO-2022-JP variants are not WHATWG labels, but the base
        // decoder handles the common subset.
        is_iso_2022_jp(label).then_some(ISO_2022_JP)
    })
}

/// `true` if the label belongs to the ISO-2022-JP family.
pub fn is_iso_2022_jp(label: &str) -> bool {
    label.to_ascii_lowercase().contains("iso-2022-jp")
}

/// Decode bytes under a declared charset. Never fails.
///
/// Chain: declared charset (strict) → declared charset with replacement
/// characters. An unknown label goes to UTF-8 (strict), then UTF-8 with
/// replacement characters.
/// The ISO-2022-JP family tries every known variant strictly first.
pub fn decode_charset(bytes: &[u8], charset: &str) -> DecodedText {
    let decoded = if is_iso_2022_jp(charset) {
        decode_iso_2022_jp(bytes)
    } else {
        match resolve_charset(charset) {
            Some(encoding) => decode_known(bytes, encoding),
            None => decode_unknown(bytes),
        }
    };

    if decoded.is_degraded() {
        debug!(
            charset,
            used = decoded.encoding,
            step = ?decoded.step,
            "Charset decoding degraded"
        );
    }
    decoded
}

/// Re-encode bytes from `charset` to UTF-8.
///
/// UTF-8 input, unknown charsets and bytes that are not valid in `charset`
/// are returned unchanged.
pub fn transcode_to_utf8(bytes: Vec<u8>, charset: &str) -> Vec<u8> {
    let Some(encoding) = resolve_charset(charset).filter(|&e| e != UTF_8) else {
        return bytes;
    };
    match encoding.decode_without_bom_handling_and_without_replacement(&bytes) {
        Some(text) => text.into_owned().into_bytes(),
        None => {
            debug!(charset, len = bytes.len(), "Bytes not valid in charset, keeping them as is");
            bytes
        }
    }
}

fn decode_known(bytes: &[u8], encoding: &'static Encoding) -> DecodedText {
    if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(bytes) {
        return DecodedText {
            text: text.into_owned(),
            step: DecodeStep::Strict,
            encoding: encoding.name(),
        };
    }
    let (text, _) = encoding.decode_without_bom_handling(bytes);
    DecodedText {
        text: text.into_owned(),
        step: DecodeStep::Replacement,
        encoding: encoding.name(),
    }
}

fn decode_unknown(bytes: &[u8]) -> DecodedText {
    match std::str::from_utf8(bytes) {
        Ok(text) => DecodedText {
            text: text.to_string(),
            step: DecodeStep::Utf8Fallback,
            encoding: UTF_8.name(),
        },
        Err(_) => {
            let (text, _) = UTF_8.decode_without_bom_handling(bytes);
            DecodedText {
                text: text.into_owned(),
                step: DecodeStep::Utf8Replacement,
                encoding: UTF_8.name(),
            }
        }
    }
}

fn decode_iso_2022_jp(bytes: &[u8]) -> DecodedText {
    let mut tried: Vec<&'static Encoding> = Vec::new();
    for label in ISO_2022_JP_VARIANTS {
        let Some(encoding) = Encoding::for_label(label.as_bytes()) else {
            continue;
        };
        if tried.contains(&encoding) {
            continue;
        }
        tried.push(encoding);
        if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(bytes) {
            return DecodedText {
                text: text.into_owned(),
                step: DecodeStep::Strict,
                encoding: encoding.name(),
            };
        }
    }
    let (text, _) = ISO_2022_JP.decode_without_bom_handling(bytes);
    DecodedText {
        text: text.into_owned(),
        step: DecodeStep::Replacement,
        encoding: ISO_2022_JP.name(),
    }
}
