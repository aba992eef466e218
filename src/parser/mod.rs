//! Input parsing: XML documents with binary elements, and MIME packages.

pub mod mime;
pub mod xml;
