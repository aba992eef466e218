//! `xopack` — XOP/MTOM and swaRef attachment extraction for XML.
//!
//! The marshaller walks a [`model::document::Document`] and offers each
//! binary value to an [`attachment::AttachmentSink`]. The sink decides
//! whether the value stays inline as base64 or moves into a separate MIME
//! part referenced by a `cid:` token. The [`package`] module writes and
//! reads the resulting `multipart/related` packages.

pub mod attachment;
pub mod config;
pub mod error;
pub mod export;
pub mod marshal;
pub mod model;
pub mod package;
pub mod parser;
pub mod store;
