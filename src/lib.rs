//! `emlShell` — a tolerant parser and inspector for `.eml` files.
//!
//! This crate provides the core library for turning raw RFC 2822 / MIME
//! bytes into a tree of parts, decoding charsets, transfer encodings and
//! encoded words, and extracting bodies, attachments and inline images.

pub mod config;
pub mod error;
pub mod export;
pub mod message;
pub mod model;
pub mod parser;
pub mod render;

pub use message::EmlMessage;
pub use parser::part::{ParseOptions, PartNode};
