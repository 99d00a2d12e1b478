//! Data model shared by the façade, the exporters and the CLI: addresses and attachments.

pub mod address;
pub mod attachment;
