//! Save attachments to a directory.

use std::path::{Path, PathBuf};

use crate::model::attachment::Attachment;

/// Longest file name written when the caller does not choose one.
pub const DEFAULT_MAX_FILENAME_LEN: usize = 150;

/// Write every attachment in `attachments` into `output_dir`.
///
/// File names are sanitized and never overwrite an existing file. Parts
/// without a name are saved as `attachment_<n>.<subtype>`. A failure on one
/// attachment is logged and the rest are still written.
pub fn save_attachments(
    attachments: &[Attachment],
    output_dir: &Path,
    max_filename_len: usize,
) -> anyhow::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)?;
    let mut paths = Vec::with_capacity(attachments.len());

    for (i, att) in attachments.iter().enumerate() {
        let name = attachment_filename(att, i + 1, max_filename_len);
        let path = unique_path(&output_dir.join(&name));
        match std::fs::write(&path, &att.content) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), size = att.size(), "Saved attachment");
                paths.push(path);
            }
            Err(e) => {
                tracing::warn!(
                    filename = %name,
                    error = %e,
                    "Failed to save attachment"
                );
            }
        }
    }

    Ok(paths)
}

/// File name for the `n`-th attachment (1-based).
pub fn attachment_filename(att: &Attachment, n: usize, max_len: usize) -> String {
    match att.filename.as_deref() {
        Some(name) if !name.trim().is_empty() => sanitize_filename_part(name, max_len),
        _ => format!("attachment_{n}.{}", att.subtype().unwrap_or("bin")),
    }
}

/// Sanitize a string for use in filenames.
///
/// Replaces path separators and other unsafe characters with `_`, refuses
/// names made only of dots, and truncates to `max_len` characters.
pub fn sanitize_filename_part(s: &str, max_len: usize) -> String {
    let sanitized: String = s
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '.' | '_' | '@' | ' ' | '(' | ')') {
                c
            } else {
                '_'
            }
        })
        .take(max_len)
        .collect();

    if sanitized.trim_matches('.').trim().is_empty() {
        "unknown".to_string()
    } else {
        sanitized
    }
}

/// If `path` already exists, append a counter to make it unique.
pub fn unique_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("file");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let parent = path.parent().unwrap_or(Path::new("."));

    for i in 1..1000 {
        let candidate = if ext.is_empty() {
            parent.join(format!("{stem}_{i}"))
        } else {
            parent.join(format!("{stem}_{i}.{ext}"))
        };
        if !candidate.exists() {
            return candidate;
        }
    }

    parent.join(format!("{stem}_dup.{ext}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attachment(filename: Option<&str>, content_type: &str) -> Attachment {
        Attachment {
            filename: filename.map(str::to_string),
            content_type: Some(content_type.to_string()),
            content_id: None,
            is_inline: false,
            content: b"data".to_vec(),
        }
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename_part("report 2024.pdf", 50), "report 2024.pdf");
        assert_eq!(sanitize_filename_part("../../etc/passwd", 50), ".._.._etc_passwd");
        assert_eq!(sanitize_filename_part("a/b\\c:d*e", 20), "a_b_c_d_e");
        assert_eq!(sanitize_filename_part("..", 20), "unknown");
        assert_eq!(sanitize_filename_part("", 20), "unknown");
        assert_eq!(sanitize_filename_part("abcdef", 3), "abc");
    }

    #[test]
    fn test_unnamed_attachment_filename() {
        let att = attachment(None, "application/pdf");
        assert_eq!(attachment_filename(&att, 2, 50), "attachment_2.pdf");
    }

    #[test]
    fn test_save_attachments_deduplicates() {
        let dir = tempfile::tempdir().unwrap();
        let atts = vec![
            attachment(Some("same.txt"), "text/plain"),
            attachment(Some("same.txt"), "text/plain"),
        ];
        let paths = save_attachments(&atts, dir.path(), DEFAULT_MAX_FILENAME_LEN).unwrap();
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].file_name().unwrap(), "same.txt");
        assert_eq!(paths[1].file_name().unwrap(), "same_1.txt");
        assert_eq!(std::fs::read(&paths[1]).unwrap(), b"data");
    }
}
