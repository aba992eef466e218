//! Reference tokens embedded in place of externalized content.

use std::fmt;

use crate::error::AttachmentError;

/// URI scheme prefix for content-id references (RFC 2392).
pub const CID_SCHEME: &str = "cid:";

/// Opaque, non-empty reference to an externalized part.
///
/// Issued by a sink, embedded as text in the serialized document, and
/// resolved later by whoever reads the package. The layer only guarantees
/// non-emptiness; tokens from [`TokenRegistry`](crate::attachment::registry::TokenRegistry)
/// are always `cid:` URIs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReferenceToken(String);

impl ReferenceToken {
    /// Wrap an already-formed URI.
    pub fn new(uri: impl Into<String>) -> Result<Self, AttachmentError> {
        let uri = uri.into();
        if uri.trim().is_empty() {
            return Err(AttachmentError::EmptyToken);
        }
        Ok(Self(uri))
    }

    /// Build a `cid:` token from a bare content-id (`<...>` brackets allowed).
    pub fn from_content_id(content_id: &str) -> Result<Self, AttachmentError> {
        let bare = strip_angle_brackets(content_id);
        if bare.is_empty() {
            return Err(AttachmentError::EmptyToken);
        }
        Ok(Self(format!("{CID_SCHEME}{bare}")))
    }

    /// Wrap a URI the caller has already validated as non-empty.
    pub(crate) fn from_trusted(uri: String) -> Self {
        debug_assert!(!uri.is_empty());
        Self(uri)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The content-id this token points to, without the `cid:` scheme.
    ///
    /// Returns `None` for tokens that are not `cid:` URIs.
    pub fn content_id(&self) -> Option<&str> {
        strip_cid_scheme(&self.0)
    }
}

impl fmt::Display for ReferenceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ReferenceToken {
    type Error = AttachmentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ReferenceToken> for String {
    fn from(token: ReferenceToken) -> Self {
        token.0
    }
}

/// Strip a case-insensitive `cid:` scheme, returning the content-id.
pub fn strip_cid_scheme(uri: &str) -> Option<&str> {
    let uri = uri.trim();
    match uri.get(..CID_SCHEME.len()) {
        Some(scheme) if scheme.eq_ignore_ascii_case(CID_SCHEME) => Some(&uri[CID_SCHEME.len()..]),
        _ => None,
    }
}

/// Remove surrounding `<` `>` from a `Content-ID` header value.
pub fn strip_angle_brackets(value: &str) -> &str {
    let value = value.trim();
    value
        .strip_prefix('<')
        .and_then(|v| v.strip_suffix('>'))
        .unwrap_or(value)
}
