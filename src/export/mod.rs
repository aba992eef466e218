//! Export functionality: package parts to files.

pub mod attachment;
