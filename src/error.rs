//! Centralized error types for xopack.

use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single attachment consultation.
///
/// Raised by [`AttachmentSink`](crate::attachment::AttachmentSink)
/// implementations. The marshaller decides whether it aborts the pass.
#[derive(Error, Debug)]
pub enum AttachmentError {
    /// The `(offset, length)` view does not fit inside the buffer.
    #[error("Invalid payload view: offset {offset} + length {length} exceeds buffer of {buffer_len} bytes")]
    InvalidView {
        offset: usize,
        length: usize,
        buffer_len: usize,
    },

    /// Binary payloads must name their enclosing element.
    #[error("Enclosing element local name must not be empty")]
    EmptyLocalName,

    /// A sink produced an empty reference token.
    #[error("Reference token must not be empty")]
    EmptyToken,

    /// A content-id was issued twice within the same pass.
    #[error("Content-ID '{0}' was already issued in this pass")]
    DuplicateToken(String),

    /// The sink has no external store to register content with.
    #[error("Sink has no attachment store; content cannot be externalized")]
    NoStore,

    /// The external store failed to persist a part.
    #[error("Attachment store I/O error at '{path}': {source}")]
    Store {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The store refused the content for a store-specific reason.
    #[error("Attachment rejected: {0}")]
    Rejected(String),
}

impl AttachmentError {
    /// Create a `Store` variant from a path and an `io::Error`.
    pub fn store(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Store {
            path: path.into(),
            source,
        }
    }
}

/// The document already contains an `xop:Include` element.
///
/// Only the marshaller may produce XOP placeholders while optimizing, so a
/// pre-existing one makes the output ambiguous. Always fatal to the pass.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Document contains a pre-existing {{{namespace}}}{local_name} element at {path}")]
pub struct StructuralViolation {
    /// Namespace URI of the offending element.
    pub namespace: String,
    /// Local name of the offending element.
    pub local_name: String,
    /// Slash-separated path of local names from the root.
    pub path: String,
}

/// All errors produced by the xopack library.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified file does not exist.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// A sink consultation failed.
    #[error(transparent)]
    Attachment(#[from] AttachmentError),

    /// The document cannot be marshalled in XOP mode.
    #[error(transparent)]
    Structural(#[from] StructuralViolation),

    /// Input XML could not be parsed.
    #[error("XML parse error: {0}")]
    XmlRead(#[from] xml::reader::Error),

    /// Input XML is well-formed but unusable (no root element, for instance).
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// Output XML could not be written.
    #[error("XML write error: {0}")]
    XmlWrite(#[from] xml::writer::Error),

    /// Inline binary content is not valid base64.
    #[error("Invalid base64 content in <{element}>: {source}")]
    Base64 {
        element: String,
        source: base64::DecodeError,
    },

    /// A MIME package could not be parsed or is incomplete.
    #[error("MIME package error: {0}")]
    MimeError(String),

    /// An `xop:Include` references a part that the package does not contain.
    #[error("Unresolved attachment reference: {0}")]
    UnresolvedReference(String),

    /// The model nests deeper than the configured limit.
    #[error("Document exceeds maximum nesting depth of {0}")]
    TooDeep(usize),

    /// The caller cancelled the pass between payload visits.
    #[error("Operation cancelled by user")]
    Cancelled,
}

/// Convenience alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Helper to convert a bare `std::io::Error` together with a path.
impl Error {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Allow `?` on `std::io::Error` when no path context is available
/// (writing to a caller-supplied sink, for instance).
impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<stream>"),
            source,
        }
    }
}
