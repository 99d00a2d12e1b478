//! Writing message content to disk: attachments and inline images.

pub mod attachment;
pub mod inline;

pub use attachment::{sanitize_filename_part, save_attachments, unique_path};
pub use inline::SaveToDirResolver;
