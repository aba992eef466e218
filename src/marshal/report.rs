//! Per-pass statistics returned by the marshaller.

use crate::attachment::SinkMode;
use crate::model::token::ReferenceToken;

/// What happened to the binary values of one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct MarshalReport {
    /// Mode read from the sink at the start of the pass.
    pub mode: SinkMode,
    /// Binary values replaced by `xop:Include`.
    pub externalized: usize,
    pub externalized_bytes: u64,
    /// Binary values written as base64 text.
    pub inlined: usize,
    pub inlined_bytes: u64,
    /// swaRef values attached.
    pub swaref: usize,
    pub swaref_bytes: u64,
    /// Inlined only because the sink failed to store them.
    pub fallbacks: usize,
    /// Every token issued in the pass, in document order.
    pub tokens: Vec<ReferenceToken>,
}

impl MarshalReport {
    /// The root part must be labelled `application/xop+xml`: XOP was
    /// active and at least one value was externalized.
    pub fn is_xop_package(&self) -> bool {
        self.mode.is_active() && self.externalized > 0
    }

    /// The output references parts outside the document.
    pub fn has_attachments(&self) -> bool {
        self.externalized > 0 || self.swaref > 0
    }
}
