//! Store-backed sink used by the MIME package processor.

use tracing::debug;

use crate::error::AttachmentError;
use crate::model::attachment::{AttachmentPart, PartOrigin};
use crate::model::payload::{BinaryPayload, SwaRefPayload};
use crate::model::token::ReferenceToken;
use crate::store::PartStore;

use super::policy::ExternalizationPolicy;
use super::registry::{TokenRegistry, DEFAULT_CID_DOMAIN};
use super::{AttachmentSink, ExternalizationDecision, SinkMode};

/// Externalizes payloads into a [`PartStore`].
///
/// The mode can only change through `&mut self`, so it cannot change while a
/// marshaller is borrowing the sink for a pass.
#[derive(Debug)]
pub struct PackageSink<S: PartStore> {
    mode: SinkMode,
    policy: ExternalizationPolicy,
    registry: TokenRegistry,
    store: S,
}

impl<S: PartStore> PackageSink<S> {
    pub fn new(mode: SinkMode, store: S) -> Self {
        Self {
            mode,
            policy: ExternalizationPolicy::default(),
            registry: TokenRegistry::new(DEFAULT_CID_DOMAIN),
            store,
        }
    }

    pub fn with_policy(mut self, policy: ExternalizationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Use `domain` as the right-hand side of generated content-ids.
    pub fn with_cid_domain(mut self, domain: &str) -> Self {
        self.registry = TokenRegistry::new(domain);
        self
    }

    pub fn set_mode(&mut self, mode: SinkMode) {
        self.mode = mode;
    }

    pub fn policy(&self) -> &ExternalizationPolicy {
        &self.policy
    }

    pub fn registry(&self) -> &TokenRegistry {
        &self.registry
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Issue a token and register `part` under it.
    fn register(
        &mut self,
        origin: PartOrigin,
        element: Option<&str>,
        content_type: &str,
        data: &[u8],
    ) -> Result<ReferenceToken, AttachmentError> {
        let token = self.registry.issue();
        let content_id = token
            .content_id()
            .ok_or(AttachmentError::EmptyToken)?
            .to_string();
        self.store.put(AttachmentPart {
            content_id,
            content_type: content_type.to_string(),
            element: element.map(str::to_string),
            origin,
            data: data.to_vec(),
        })?;
        Ok(token)
    }
}

impl<S: PartStore> AttachmentSink for PackageSink<S> {
    fn is_externalization_active(&self) -> bool {
        self.mode.is_active()
    }

    fn offer_content(
        &mut self,
        payload: &BinaryPayload<'_>,
    ) -> Result<ExternalizationDecision, AttachmentError> {
        if !self.mode.is_active() || !self.policy.should_externalize(payload) {
            debug!(
                element = payload.element_local_name(),
                size = payload.len(),
                "Inlining payload"
            );
            return Ok(ExternalizationDecision::Inline);
        }

        let token = self.register(
            PartOrigin::Xop,
            Some(payload.element_local_name()),
            payload.content_type(),
            payload.data(),
        )?;
        debug!(
            element = payload.element_local_name(),
            size = payload.len(),
            token = %token,
            "Externalized payload"
        );
        Ok(ExternalizationDecision::Token(token))
    }

    fn offer_swaref_content(
        &mut self,
        payload: &SwaRefPayload<'_>,
    ) -> Result<ReferenceToken, AttachmentError> {
        let token = self.register(
            PartOrigin::SwaRef,
            None,
            payload.content_type(),
            payload.data(),
        )?;
        debug!(size = payload.len(), token = %token, "Attached swaRef content");
        Ok(token)
    }
}
