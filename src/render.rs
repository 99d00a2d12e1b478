//! Minimal HTML ↔ plain text conversions used by the message façade.
//!
//! These are fallbacks for messages that only carry one of the two bodies.
//! No layout is attempted.

/// Convert HTML to plain text.
///
/// - Drops `<style>` and `<script>` blocks
/// - Keeps only the `<body>` contents when there is a body element
/// - Strips all remaining tags and decodes entities
/// - Collapses whitespace-only lines between paragraphs into one blank line
pub fn html_to_text(html: &str) -> String {
    let without_blocks = remove_tag_block(&remove_tag_block(html, "style"), "script");
    let body = body_contents(&without_blocks).unwrap_or(&without_blocks);

    let mut stripped = String::with_capacity(body.len());
    let mut in_tag = false;
    for ch in body.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => stripped.push(ch),
            _ => {}
        }
    }

    collapse_blank_lines(&decode_entities(&stripped))
        .trim()
        .to_string()
}

/// Convert plain text to HTML by turning line feeds into `<br />`.
pub fn text_to_html(text: &str) -> String {
    text.replace('\n', "<br />")
}

/// Remove every `<tag …>…</tag>` block, case-insensitively. An unclosed
/// block runs to the end of the input.
fn remove_tag_block(html: &str, tag: &str) -> String {
    let lower = html.to_ascii_lowercase();
    let open = format!("<{tag}");
    let close = format!("</{tag}>");

    let mut result = String::with_capacity(html.len());
    let mut pos = 0;
    while let Some(found) = lower[pos..].find(&open) {
        let start = pos + found;
        result.push_str(&html[pos..start]);
        match lower[start..].find(&close) {
            Some(end) => pos = start + end + close.len(),
            None => return result,
        }
    }
    result.push_str(&html[pos..]);
    result
}

/// Inner HTML of the `<body>` element, if there is one.
fn body_contents(html: &str) -> Option<&str> {
    let lower = html.to_ascii_lowercase();
    let mut from = 0;
    let open = loop {
        let found = from + lower[from..].find("<body")?;
        let next = lower.as_bytes().get(found + 5).copied();
        if matches!(next, Some(b'>' | b' ' | b'\t' | b'\r' | b'\n' | b'/')) {
            break found;
        }
        from = found + 5;
    };
    let content_start = open + lower[open..].find('>')? + 1;
    let content_end = content_start + lower[content_start..].find("</body>")?;
    Some(&html[content_start..content_end])
}

/// Decode named and numeric character references.
fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let candidate = &rest[amp..];
        let decoded = candidate
            .find(';')
            .filter(|&semi| semi <= 10)
            .and_then(|semi| decode_entity(&candidate[1..semi]).map(|c| (c, semi)));
        match decoded {
            Some((ch, semi)) => {
                out.push(ch);
                rest = &candidate[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &candidate[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        return char::from_u32(code);
    }
    let ch = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "copy" => '©',
        "reg" => '®',
        "hellip" => '…',
        "mdash" => '—',
        "ndash" => '–',
        "laquo" => '«',
        "raquo" => '»',
        "euro" => '€',
        _ => return None,
    };
    Some(ch)
}

/// Replace every `line break, whitespace run, line break` with `\n\n`.
/// Two adjacent line breaks with nothing between them are left alone.
fn collapse_blank_lines(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    let mut i = 0;

    while i < bytes.len() {
        let first_end = match (bytes[i], bytes.get(i + 1)) {
            (b'\n', _) => i + 1,
            (b'\r', Some(b'\n')) => i + 2,
            _ => {
                i += 1;
                continue;
            }
        };

        let mut j = first_end;
        let mut last_newline = None;
        while j < bytes.len() && bytes[j].is_ascii_whitespace() {
            if bytes[j] == b'\n' {
                last_newline = Some(j);
            }
            j += 1;
        }

        match last_newline {
            Some(k) if k > first_end => {
                out.push_str(&text[copied..i]);
                out.push_str("\n\n");
                copied = k + 1;
                i = k + 1;
            }
            _ => i = first_end,
        }
    }
    out.push_str(&text[copied..]);
    out
}
