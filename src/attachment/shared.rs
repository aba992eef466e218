//! Sharing one sink between concurrent marshalling passes.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::AttachmentError;
use crate::model::payload::{BinaryPayload, SwaRefPayload};
use crate::model::token::ReferenceToken;

use super::{AttachmentSink, ExternalizationDecision};

/// Cloneable handle that serializes access to an inner sink.
///
/// Each pass gets its own clone. Consultations from different passes are
/// applied one at a time, so the inner registry and store never see
/// interleaved registrations. The lock is held for the duration of one
/// consultation, including any blocking I/O in the store.
#[derive(Debug, Default)]
pub struct SharedSink<S> {
    inner: Arc<Mutex<S>>,
}

impl<S> Clone for SharedSink<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: AttachmentSink> SharedSink<S> {
    pub fn new(sink: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(sink)),
        }
    }

    /// Run `f` with exclusive access to the inner sink.
    pub fn with<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        let mut guard = self.lock();
        f(&mut *guard)
    }

    /// Recover the inner sink once every other handle has been dropped.
    pub fn try_into_inner(self) -> Result<S, Self> {
        match Arc::try_unwrap(self.inner) {
            Ok(mutex) => Ok(mutex.into_inner().unwrap_or_else(|p| p.into_inner())),
            Err(inner) => Err(Self { inner }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, S> {
        // A panic in another pass leaves the sink usable; registrations are
        // complete or absent
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl<S: AttachmentSink> AttachmentSink for SharedSink<S> {
    fn is_externalization_active(&self) -> bool {
        self.lock().is_externalization_active()
    }

    fn offer_content(
        &mut self,
        payload: &BinaryPayload<'_>,
    ) -> Result<ExternalizationDecision, AttachmentError> {
        self.lock().offer_content(payload)
    }

    fn offer_swaref_content(
        &mut self,
        payload: &SwaRefPayload<'_>,
    ) -> Result<ReferenceToken, AttachmentError> {
        self.lock().offer_swaref_content(payload)
    }
}
