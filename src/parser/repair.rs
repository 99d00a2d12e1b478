//! Best-effort repair of decoded text.
//!
//! Some Japanese mailers strip the ESC bytes from ISO-2022-JP text, leaving
//! literal runs such as `$B7r9/(B` in the body. [`LiteralIso2022Jp`] puts
//! them back together: first from a table of known sequences, then by
//! re-inserting the escape bytes and decoding. Anything it cannot recover is
//! left as it was. This is a heuristic; swap in [`NoRepair`] to disable it.

use std::borrow::Cow;
use std::fmt;

use encoding_rs::ISO_2022_JP;

/// A post-decoding text fix-up applied to text leaves.
pub trait TextRepair: fmt::Debug + Send + Sync {
    /// Return the repaired text, borrowing when nothing changed.
    fn repair<'a>(&self, text: &'a str) -> Cow<'a, str>;
}

/// Leaves text untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRepair;

impl TextRepair for NoRepair {
    fn repair<'a>(&self, text: &'a str) -> Cow<'a, str> {
        Cow::Borrowed(text)
    }
}

/// Common literal sequences and their intended text.
pub const KNOWN_SEQUENCES: &[(&str, &str)] = &[
    ("$B7r9/(B", "健康"),
    ("$BJ]81(B", "保険"),
    ("$BAH9g(B", "組合"),
    ("$B$+$i(B", "から"),
    ("$B$N(B", "の"),
    ("$B$*(B", "お"),
    ("$BCN$i$;(B", "知らせ"),
    ("$B!c(B", "『"),
    ("$B!d(B", "』"),
    ("$BH/(B", "発"),
    ("$BBh(B", "第"),
    ("$B9f(B", "号"),
    ("$BG/(B", "年"),
    ("$B7n(B", "月"),
    ("$BF|(B", "日"),
    ("$BG/EY(B", "年度"),
    ("$BJ]7r(B", "保健"),
    ("$B;v6H(B", "事業"),
    ("$B@)EY(B", "制度"),
    ("$BJQ99(B", "変更"),
    ("$B$K$D$$$F(B", "について"),
    ("$B40F$(B", "ご案"),
    ("$BFb(B", "内"),
    ("$BHoJ]81<T(B", "被保険者"),
    ("$B3F0L(B", "各位"),
    ("$BF|K\\(B", "日本"),
    ("$B%R%e!<%l%C%H(B", "ヒューレット"),
    ("$B%Q%C%+!<%I(B", "パッカード"),
    ("$B>B1[(B", "常務"),
    ("$B1`;R(B", "理事"),
    ("$BM}M3(B", "理由"),
    ("$BIiC4(B", "負担"),
    ("$B7Z8:(B", "軽減"),
    ("$B<u?G(B", "受診"),
    ("$B5!2q(B", "機会"),
    ("$B3HBg(B", "拡大"),
    ("$BAa4|(B", "早期"),
    ("$B<#NE(B", "治療"),
    ("$B40<#(B", "完治"),
    ("$B8+9~(B", "見込"),
    ("$BIB5$(B", "病気"),
    ("$BH/8+(B", "発見"),
    ("$B$?$a(B", "ため"),
    ("$BGQ;_(B", "廃止"),
    ("$BMxMQ(B", "利用"),
    ("$BJd=u(B", "補助"),
    ("$BM}2r(B", "理解"),
    ("$B46(NO(B", "ご協力"),
    ("$B$h$m$7$/(B", "よろしく"),
    ("$B$*4j$$(B", "お願い"),
    ("$B?=$7>e$2(B", "申し上げ"),
    ("$BLd$$9g$o$;(B", "お問い合わせ"),
    ("$B@h(B", "先"),
];

/// Recovers literal ISO-2022-JP escape runs.
///
/// Table entries are atomic replacements applied in order, before the generic
/// pass. A table entry that happens to be the tail of a longer unmapped run
/// is still replaced, which leaves the head of that run for the generic pass
/// (where it usually stays untouched).
#[derive(Debug, Clone)]
pub struct LiteralIso2022Jp {
    table: Vec<(String, String)>,
    generic: bool,
}

impl Default for LiteralIso2022Jp {
    fn default() -> Self {
        Self::new()
    }
}

impl LiteralIso2022Jp {
    /// Built-in table plus the generic pass.
    pub fn new() -> Self {
        Self::with_table(
            KNOWN_SEQUENCES
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string())),
        )
    }

    /// Custom table plus the generic pass.
    pub fn with_table(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            table: entries.into_iter().collect(),
            generic: true,
        }
    }

    /// Enable or disable the generic re-decoding pass.
    pub fn generic(mut self, enabled: bool) -> Self {
        self.generic = enabled;
        self
    }

    /// Number of table entries.
    pub fn table_len(&self) -> usize {
        self.table.len()
    }
}

impl TextRepair for LiteralIso2022Jp {
    fn repair<'a>(&self, text: &'a str) -> Cow<'a, str> {
        if !text.contains("$B") {
            return Cow::Borrowed(text);
        }

        let mut result = text.to_string();
        for (sequence, replacement) in &self.table {
            if result.contains(sequence.as_str()) {
                result = result.replace(sequence.as_str(), replacement);
            }
        }

        if self.generic {
            result = replace_runs(&result, "(B");
            result = replace_runs(&result, "$(B");
        }

        if result == text {
            Cow::Borrowed(text)
        } else {
            Cow::Owned(result)
        }
    }
}

/// Replace every `$B<content><terminator>` run, where `content` holds no
/// byte equal to the terminator's first byte.
fn replace_runs(text: &str, terminator: &str) -> String {
    let stop = terminator.as_bytes()[0];
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("$B") {
        let content_start = start + 2;
        let matched = rest[content_start..]
            .bytes()
            .position(|b| b == stop)
            .map(|p| content_start + p)
            .filter(|&end| rest[end..].starts_with(terminator));

        match matched {
            Some(end) => {
                out.push_str(&rest[..start]);
                let run = &rest[start..end + terminator.len()];
                match decode_run(&rest[content_start..end]) {
                    Some(decoded) => out.push_str(&decoded),
                    None => out.push_str(run),
                }
                rest = &rest[end + terminator.len()..];
            }
            None => {
                // Not a run at this position; keep the `$` and look further.
                out.push_str(&rest[..start + 1]);
                rest = &rest[start + 1..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// Decode the content of a literal run as JIS X 0208, dropping bytes that
/// do not decode. `None` when nothing usable comes out.
fn decode_run(content: &str) -> Option<String> {
    if !content.is_ascii() {
        return None;
    }
    let mut bytes = Vec::with_capacity(content.len() + 6);
    bytes.extend_from_slice(b"\x1b$B");
    bytes.extend_from_slice(content.as_bytes());
    bytes.extend_from_slice(b"\x1b(B");

    let (decoded, _) = ISO_2022_JP.decode_without_bom_handling(&bytes);
    let cleaned: String = decoded.chars().filter(|&c| c != '\u{FFFD}').collect();
    (!cleaned.is_empty()).then_some(cleaned)
}
