//! Attachment parts registered with a package store.
//!
//! A part is created by a sink when it externalizes content and is owned
//! by the store from then on.

/// How a part's bytes are written inside the MIME package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferEncoding {
    /// Raw octets (the usual choice for MTOM).
    #[default]
    Binary,
    /// Base64 with 76-character lines.
    Base64,
}

impl TransferEncoding {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Binary => "binary",
            Self::Base64 => "base64",
        }
    }
}

/// Which convention caused the part to be externalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartOrigin {
    Xop,
    SwaRef,
}

/// A binary part held by a store, keyed by its content-id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentPart {
    /// Content-ID without angle brackets or `cid:` scheme.
    pub content_id: String,

    /// MIME content type (e.g. `"image/jpeg"`, `"application/pdf"`).
    pub content_type: String,

    /// Local name of the element that held the data (`None` for swaRef).
    pub element: Option<String>,

    pub origin: PartOrigin,

    pub data: Vec<u8>,
}

impl AttachmentPart {
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Lowercase hex SHA-256 of `data`, used for part digests in manifests
/// and `inspect` output.
pub fn sha256_hex(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex_empty() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_transfer_encoding_names() {
        assert_eq!(TransferEncoding::Binary.as_str(), "binary");
        assert_eq!(TransferEncoding::Base64.as_str(), "base64");
    }
}
