//! File-backed part store: one file per part plus a JSON manifest.
//!
//! Each part is flushed and synced before `put` returns, so a token handed
//! to the marshaller always points at a file that exists on disk.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::AttachmentError;
use crate::export::attachment::{part_filename, unique_path};
use crate::model::attachment::{sha256_hex, AttachmentPart, PartOrigin};

/// Name of the manifest written by [`DirectoryStore::write_manifest`].
pub const MANIFEST_FILE: &str = "manifest.json";

/// Manifest record for one stored part.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StoredPart {
    pub content_id: String,
    pub content_type: String,
    pub element: Option<String>,
    pub origin: PartOrigin,
    /// File name relative to the store directory.
    pub file: String,
    pub size: u64,
    pub sha256: String,
}

/// Writes parts into a directory.
#[derive(Debug)]
pub struct DirectoryStore {
    dir: PathBuf,
    entries: Vec<StoredPart>,
}

impl DirectoryStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl AsRef<Path>) -> crate::error::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|e| crate::error::Error::io(&dir, e))?;
        Ok(Self {
            dir,
            entries: Vec::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn entries(&self) -> &[StoredPart] {
        &self.entries
    }

    /// Path of the file holding `content_id`, if stored.
    pub fn path_of(&self, content_id: &str) -> Option<PathBuf> {
        let bare = crate::model::token::strip_angle_brackets(content_id);
        self.entries
            .iter()
            .find(|e| e.content_id == bare)
            .map(|e| self.dir.join(&e.file))
    }

    /// Write `manifest.json` describing every stored part.
    pub fn write_manifest(&self) -> crate::error::Result<PathBuf> {
        let path = self.dir.join(MANIFEST_FILE);
        let json = serde_json::to_vec_pretty(&self.entries)
            .map_err(|e| crate::error::Error::io(&path, std::io::Error::other(e)))?;
        std::fs::write(&path, json).map_err(|e| crate::error::Error::io(&path, e))?;
        info!(path = %path.display(), parts = self.entries.len(), "Wrote part manifest");
        Ok(path)
    }
}

impl super::PartStore for DirectoryStore {
    fn put(&mut self, part: AttachmentPart) -> Result<(), AttachmentError> {
        let filename = part_filename(&part.content_id, &part.content_type);
        let path = unique_path(&self.dir.join(filename));

        let mut file = File::create(&path).map_err(|e| AttachmentError::store(&path, e))?;
        file.write_all(&part.data)
            .map_err(|e| AttachmentError::store(&path, e))?;
        file.sync_all().map_err(|e| AttachmentError::store(&path, e))?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        debug!(
            content_id = %part.content_id,
            path = %path.display(),
            size = part.size(),
            "Stored part on disk"
        );

        self.entries.push(StoredPart {
            sha256: sha256_hex(&part.data),
            size: part.size(),
            content_id: part.content_id,
            content_type: part.content_type,
            element: part.element,
            origin: part.origin,
            file: file_name,
        });
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
