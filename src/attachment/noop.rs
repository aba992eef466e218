//! The default sink: never externalizes anything.

use crate::error::AttachmentError;
use crate::model::payload::{BinaryPayload, SwaRefPayload};
use crate::model::token::ReferenceToken;

use super::{AttachmentSink, ExternalizationDecision, SinkMode};

/// Sink with no store behind it.
///
/// Reports [`SinkMode::InlineOnly`] unless built with [`NoopSink::with_mode`].
/// Even in XOP mode every offer is answered with
/// [`ExternalizationDecision::Inline`]. swaRef content cannot be inlined, so
/// [`offer_swaref_content`](AttachmentSink::offer_swaref_content) fails with
/// [`AttachmentError::NoStore`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink {
    mode: SinkMode,
}

impl NoopSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mode: SinkMode) -> Self {
        Self { mode }
    }
}

impl AttachmentSink for NoopSink {
    fn is_externalization_active(&self) -> bool {
        self.mode.is_active()
    }

    fn offer_content(
        &mut self,
        _payload: &BinaryPayload<'_>,
    ) -> Result<ExternalizationDecision, AttachmentError> {
        Ok(ExternalizationDecision::Inline)
    }

    fn offer_swaref_content(
        &mut self,
        _payload: &SwaRefPayload<'_>,
    ) -> Result<ReferenceToken, AttachmentError> {
        Err(AttachmentError::NoStore)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_inline_only() {
        let sink = NoopSink::new();
        assert!(!sink.is_externalization_active());
        assert_eq!(sink.mode(), SinkMode::InlineOnly);
    }

    #[test]
    fn test_xop_mode_still_inlines() {
        let mut sink = NoopSink::with_mode(SinkMode::XopOptimizing);
        assert!(sink.is_externalization_active());
        let payload = BinaryPayload::new(&b""[..], "", "data").unwrap();
        assert_eq!(
            sink.offer_content(&payload).unwrap(),
            ExternalizationDecision::Inline
        );
    }

    #[test]
    fn test_swaref_fails_without_store() {
        let mut sink = NoopSink::new();
        let err = sink
            .offer_swaref_content(&SwaRefPayload::new(vec![1u8; 4]))
            .unwrap_err();
        assert!(matches!(err, AttachmentError::NoStore));
    }
}
