//! Attachment stores: where externalized parts live once a sink issues a token.

pub mod directory;
pub mod memory;

use crate::error::AttachmentError;
use crate::model::attachment::AttachmentPart;

pub use directory::DirectoryStore;
pub use memory::MemoryStore;

/// Durable home for externalized parts.
///
/// [`put`](PartStore::put) must not return until the part is retrievable
/// by its content-id: the token handed to the marshaller is only valid
/// once the store has accepted the bytes.
pub trait PartStore {
    fn put(&mut self, part: AttachmentPart) -> Result<(), AttachmentError>;

    /// Number of parts stored so far.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
