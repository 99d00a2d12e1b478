//! Save inline images next to an exported HTML body.

use std::path::{Path, PathBuf};

use crate::error::{EmlError, Result};
use crate::message::CidResolver;
use crate::model::attachment::Attachment;

use super::attachment::{sanitize_filename_part, unique_path, DEFAULT_MAX_FILENAME_LEN};

/// Writes every resolved image into a directory and substitutes the file
/// name for its `cid:` reference.
#[derive(Debug)]
pub struct SaveToDirResolver {
    dir: PathBuf,
    max_filename_len: usize,
    saved: Vec<PathBuf>,
}

impl SaveToDirResolver {
    /// Save into `dir`, which is created on first use.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_filename_len: DEFAULT_MAX_FILENAME_LEN,
            saved: Vec::new(),
        }
    }

    /// Cap the length of written file names.
    pub fn with_max_filename_len(mut self, max_len: usize) -> Self {
        self.max_filename_len = max_len;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Paths written so far.
    pub fn saved(&self) -> &[PathBuf] {
        &self.saved
    }
}

impl CidResolver for SaveToDirResolver {
    fn resolve(&mut self, image: &Attachment) -> Result<Option<String>> {
        let name = match (&image.filename, &image.content_id) {
            (Some(filename), _) => filename.clone(),
            (None, Some(cid)) => format!("image_{cid}.png"),
            (None, None) => return Ok(None),
        };

        std::fs::create_dir_all(&self.dir).map_err(|e| EmlError::io(&self.dir, e))?;
        let path = unique_path(&self.dir.join(sanitize_filename_part(&name, self.max_filename_len)));
        std::fs::write(&path, &image.content).map_err(|e| EmlError::io(&path, e))?;
        tracing::debug!(path = %path.display(), "Saved inline image");

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| EmlError::Export(format!("no file name in {}", path.display())))?;
        self.saved.push(path);
        Ok(Some(file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(filename: Option<&str>, cid: &str) -> Attachment {
        Attachment {
            filename: filename.map(str::to_string),
            content_type: Some("image/png".to_string()),
            content_id: Some(cid.to_string()),
            is_inline: true,
            content: vec![0x89, b'P', b'N', b'G'],
        }
    }

    #[test]
    fn test_writes_named_image() {
        let dir = tempfile::tempdir().unwrap();
        let mut resolver = SaveToDirResolver::new(dir.path().join("img"));
        let url = resolver.resolve(&image(Some("logo.png"), "logo@x")).unwrap();
        assert_eq!(url.as_deref(), Some("logo.png"));
        assert_eq!(
            std::fs::read(dir.path().join("img/logo.png")).unwrap(),
            vec![0x89, b'P', b'N', b'G']
        );
        assert_eq!(resolver.saved().len(), 1);
    }

    #[test]
    fn test_unnamed_image_uses_content_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut resolver = SaveToDirResolver::new(dir.path());
        let url = resolver.resolve(&image(None, "abc")).unwrap();
        assert_eq!(url.as_deref(), Some("image_abc.png"));
    }
}
