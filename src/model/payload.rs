//! Binary payloads offered to an attachment sink.
//!
//! A payload is built by the marshaller at the moment a binary field is
//! visited and dropped as soon as the sink has decided. Sinks must copy
//! the bytes if they keep them.

use std::borrow::Cow;

use crate::error::AttachmentError;

/// MIME type used when the content type of a payload is not known.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// One candidate for XOP externalization.
#[derive(Debug, Clone)]
pub struct BinaryPayload<'a> {
    data: Cow<'a, [u8]>,
    content_type: Cow<'a, str>,
    element_namespace: &'a str,
    element_local_name: &'a str,
}

impl<'a> BinaryPayload<'a> {
    /// Build a payload over the whole of `data`.
    ///
    /// `element_namespace` may be empty; `element_local_name` may not.
    pub fn new(
        data: impl Into<Cow<'a, [u8]>>,
        element_namespace: &'a str,
        element_local_name: &'a str,
    ) -> Result<Self, AttachmentError> {
        if element_local_name.is_empty() {
            return Err(AttachmentError::EmptyLocalName);
        }
        Ok(Self {
            data: data.into(),
            content_type: Cow::Borrowed(DEFAULT_CONTENT_TYPE),
            element_namespace,
            element_local_name,
        })
    }

    /// Build a zero-copy payload over `buffer[offset..offset + length]`.
    pub fn from_view(
        buffer: &'a [u8],
        offset: usize,
        length: usize,
        element_namespace: &'a str,
        element_local_name: &'a str,
    ) -> Result<Self, AttachmentError> {
        let view = checked_view(buffer, offset, length)?;
        Self::new(view, element_namespace, element_local_name)
    }

    /// Set the declared MIME type. An empty string keeps the default.
    pub fn with_content_type(mut self, content_type: impl Into<Cow<'a, str>>) -> Self {
        let content_type = content_type.into();
        if !content_type.trim().is_empty() {
            self.content_type = content_type;
        }
        self
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Namespace URI of the enclosing element (possibly empty).
    pub fn element_namespace(&self) -> &str {
        self.element_namespace
    }

    /// Local name of the enclosing element (never empty).
    pub fn element_local_name(&self) -> &str {
        self.element_local_name
    }
}

/// Content for the swaRef convention, which always externalizes and has no
/// element context.
#[derive(Debug, Clone)]
pub struct SwaRefPayload<'a> {
    data: Cow<'a, [u8]>,
    content_type: Cow<'a, str>,
}

impl<'a> SwaRefPayload<'a> {
    pub fn new(data: impl Into<Cow<'a, [u8]>>) -> Self {
        Self {
            data: data.into(),
            content_type: Cow::Borrowed(DEFAULT_CONTENT_TYPE),
        }
    }

    /// Set the declared MIME type. An empty string keeps the default.
    pub fn with_content_type(mut self, content_type: impl Into<Cow<'a, str>>) -> Self {
        let content_type = content_type.into();
        if !content_type.trim().is_empty() {
            self.content_type = content_type;
        }
        self
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }
}

/// Validate an `(offset, length)` window over `buffer`.
fn checked_view(buffer: &[u8], offset: usize, length: usize) -> Result<&[u8], AttachmentError> {
    let invalid = || AttachmentError::InvalidView {
        offset,
        length,
        buffer_len: buffer.len(),
    };
    let end = offset.checked_add(length).ok_or_else(invalid)?;
    buffer.get(offset..end).ok_or_else(invalid)
}
