//! Email parsing: the MIME part tree, header decoding, and content decoding.

pub mod date;
pub mod decode;
pub mod encoded_word;
pub mod header;
pub mod part;
pub mod repair;
