//! In-memory part store used to assemble a MIME package after marshalling.

use tracing::debug;

use crate::error::AttachmentError;
use crate::model::attachment::AttachmentPart;

use super::PartStore;

/// Keeps parts in insertion order, optionally bounded in total size.
#[derive(Debug, Default)]
pub struct MemoryStore {
    parts: Vec<AttachmentPart>,
    total_bytes: u64,
    max_total_bytes: Option<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject parts once `max_total_bytes` would be exceeded.
    pub fn with_limit(max_total_bytes: u64) -> Self {
        Self {
            max_total_bytes: Some(max_total_bytes),
            ..Self::default()
        }
    }

    pub fn parts(&self) -> &[AttachmentPart] {
        &self.parts
    }

    pub fn into_parts(self) -> Vec<AttachmentPart> {
        self.parts
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Look up a part by content-id (with or without angle brackets).
    pub fn get(&self, content_id: &str) -> Option<&AttachmentPart> {
        let bare = crate::model::token::strip_angle_brackets(content_id);
        self.parts.iter().find(|p| p.content_id == bare)
    }
}

impl PartStore for MemoryStore {
    fn put(&mut self, part: AttachmentPart) -> Result<(), AttachmentError> {
        let new_total = self.total_bytes + part.size();
        if let Some(limit) = self.max_total_bytes {
            if new_total > limit {
                return Err(AttachmentError::Rejected(format!(
                    "store limit of {limit} bytes exceeded by part '{}'",
                    part.content_id
                )));
            }
        }
        debug!(
            content_id = %part.content_id,
            size = part.size(),
            "Stored part in memory"
        );
        self.total_bytes = new_total;
        self.parts.push(part);
        Ok(())
    }

    fn len(&self) -> usize {
        self.parts.len()
    }
}
