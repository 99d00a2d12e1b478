//! Attachments and inline images collected from a message.

use serde::{Deserialize, Serialize};

/// A leaf part offered as a file: a regular attachment or an inline image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// File name from the headers, if any.
    pub filename: Option<String>,

    /// MIME type (`"application/pdf"`), if the part declared one.
    pub content_type: Option<String>,

    /// Content-ID without angle brackets, for parts referenced from HTML.
    pub content_id: Option<String>,

    /// `true` for inline images.
    pub is_inline: bool,

    /// Decoded payload. Text parts are stored as UTF-8.
    #[serde(skip)]
    pub content: Vec<u8>,
}

impl Attachment {
    /// Size of the decoded payload in bytes.
    pub fn size(&self) -> usize {
        self.content.len()
    }

    /// Sub-type of the MIME type (`"pdf"` for `application/pdf`).
    pub fn subtype(&self) -> Option<&str> {
        self.content_type
            .as_deref()
            .and_then(|ct| ct.split_once('/'))
            .map(|(_, sub)| sub)
    }
}
