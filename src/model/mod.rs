//! Core data model types: payloads, tokens, stored parts and the document tree.

pub mod attachment;
pub mod document;
pub mod payload;
pub mod token;
