//! The attachment sink contract between a marshaller and a MIME package
//! processor.
//!
//! A marshaller reads [`AttachmentSink::is_externalization_active`] once per
//! pass and caches it. When it is `true`, every `xs:base64Binary` value is
//! offered with [`AttachmentSink::offer_content`]; the sink either stores
//! the bytes as a separate part and returns a `cid:` token, or asks for the
//! value to be inlined. swaRef values always go through
//! [`AttachmentSink::offer_swaref_content`], whatever the mode.
//!
//! Sinks are not required to be thread-safe. Wrap one in
//! [`shared::SharedSink`] to share it between concurrent passes.

pub mod guard;
pub mod noop;
pub mod policy;
pub mod registry;
pub mod shared;
pub mod sink;

use std::fmt;
use std::str::FromStr;

use crate::error::AttachmentError;
use crate::model::payload::{BinaryPayload, SwaRefPayload};
use crate::model::token::ReferenceToken;

pub use noop::NoopSink;
pub use shared::SharedSink;
pub use sink::PackageSink;

/// Whether a sink attempts XOP externalization at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SinkMode {
    /// Every binary value is inlined; the sink is never consulted for XOP.
    #[default]
    InlineOnly,
    /// Binary values are offered to the sink one by one.
    XopOptimizing,
}

impl SinkMode {
    pub fn from_active(active: bool) -> Self {
        if active {
            Self::XopOptimizing
        } else {
            Self::InlineOnly
        }
    }

    pub fn is_active(self) -> bool {
        self == Self::XopOptimizing
    }
}

impl fmt::Display for SinkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InlineOnly => "inline-only",
            Self::XopOptimizing => "xop-optimizing",
        })
    }
}

impl FromStr for SinkMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inline" | "inline-only" => Ok(Self::InlineOnly),
            "xop" | "mtom" | "xop-optimizing" => Ok(Self::XopOptimizing),
            other => Err(format!(
                "unknown sink mode '{other}' (expected 'inline' or 'xop')"
            )),
        }
    }
}

/// Outcome of offering one binary payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalizationDecision {
    /// The content now lives in a separate part; emit an `xop:Include`
    /// referencing this token and nothing else.
    Token(ReferenceToken),
    /// Inline the content as base64 text.
    Inline,
}

impl ExternalizationDecision {
    pub fn token(&self) -> Option<&ReferenceToken> {
        match self {
            Self::Token(t) => Some(t),
            Self::Inline => None,
        }
    }
}

/// Decides, per binary payload, whether it is externalized into a package
/// part and performs the registration.
pub trait AttachmentSink {
    /// `true` when the surrounding package is an XOP package.
    ///
    /// Must return the same value for every call within one pass.
    fn is_externalization_active(&self) -> bool;

    /// Consider `payload` for storage as a separate part.
    ///
    /// Returning a token means the bytes are already registered with the
    /// sink's store under that token. Only called when
    /// [`is_externalization_active`](Self::is_externalization_active) is `true`.
    fn offer_content(
        &mut self,
        payload: &BinaryPayload<'_>,
    ) -> Result<ExternalizationDecision, AttachmentError>;

    /// Store `payload` as a part and return its token.
    ///
    /// swaRef has no inline form: failure to store is an error, never an
    /// empty token.
    fn offer_swaref_content(
        &mut self,
        payload: &SwaRefPayload<'_>,
    ) -> Result<ReferenceToken, AttachmentError>;

    fn mode(&self) -> SinkMode {
        SinkMode::from_active(self.is_externalization_active())
    }
}

impl<S: AttachmentSink + ?Sized> AttachmentSink for Box<S> {
    fn is_externalization_active(&self) -> bool {
        (**self).is_externalization_active()
    }

    fn offer_content(
        &mut self,
        payload: &BinaryPayload<'_>,
    ) -> Result<ExternalizationDecision, AttachmentError> {
        (**self).offer_content(payload)
    }

    fn offer_swaref_content(
        &mut self,
        payload: &SwaRefPayload<'_>,
    ) -> Result<ReferenceToken, AttachmentError> {
        (**self).offer_swaref_content(payload)
    }
}
