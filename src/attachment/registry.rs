//! Content-ID bookkeeping for one serialization pass.
//!
//! Generated ids look like `<seq>.<nonce>@<domain>`: the sequence number
//! makes them unique within a registry, the random nonce makes them unique
//! across registries. Ids claimed explicitly by a store are checked against
//! everything already issued.

use std::collections::HashSet;

use uuid::Uuid;

use crate::error::AttachmentError;
use crate::model::token::{strip_angle_brackets, ReferenceToken, CID_SCHEME};

/// Domain used when none (or an unusable one) is configured.
pub const DEFAULT_CID_DOMAIN: &str = "xopack.local";

/// Issues `cid:` tokens that never collide within a pass.
#[derive(Debug)]
pub struct TokenRegistry {
    domain: String,
    nonce: String,
    next: u64,
    issued: HashSet<String>,
}

impl TokenRegistry {
    pub fn new(domain: &str) -> Self {
        Self {
            domain: sanitize_domain(domain),
            nonce: Uuid::new_v4().simple().to_string(),
            next: 0,
            issued: HashSet::new(),
        }
    }

    /// Issue a fresh token.
    pub fn issue(&mut self) -> ReferenceToken {
        loop {
            let content_id = format!("{}.{}@{}", self.next, self.nonce, self.domain);
            self.next += 1;
            // A claimed id may already occupy this slot
            if self.issued.insert(content_id.clone()) {
                return ReferenceToken::from_trusted(format!("{CID_SCHEME}{content_id}"));
            }
        }
    }

    /// Reserve a caller-chosen content-id.
    pub fn claim(&mut self, content_id: &str) -> Result<ReferenceToken, AttachmentError> {
        let bare = strip_angle_brackets(content_id);
        let token = ReferenceToken::from_content_id(bare)?;
        if !self.issued.insert(bare.to_string()) {
            return Err(AttachmentError::DuplicateToken(bare.to_string()));
        }
        Ok(token)
    }

    pub fn contains(&self, content_id: &str) -> bool {
        self.issued.contains(strip_angle_brackets(content_id))
    }

    pub fn issued_count(&self) -> usize {
        self.issued.len()
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Forget all issued ids and draw a new nonce.
    pub fn reset(&mut self) {
        self.issued.clear();
        self.next = 0;
        self.nonce = Uuid::new_v4().simple().to_string();
    }
}

impl Default for TokenRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_CID_DOMAIN)
    }
}

/// Keep only characters valid in a dot-atom domain.
fn sanitize_domain(domain: &str) -> String {
    let cleaned: String = domain
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '.')
        .collect();
    let cleaned = cleaned.trim_matches('.');
    if cleaned.is_empty() {
        DEFAULT_CID_DOMAIN.to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issued_tokens_are_unique() {
        let mut reg = TokenRegistry::default();
        let tokens: HashSet<ReferenceToken> = (0..500).map(|_| reg.issue()).collect();
        assert_eq!(tokens.len(), 500);
        assert_eq!(reg.issued_count(), 500);
        assert!(tokens.iter().all(|t| t.as_str().starts_with("cid:")));
    }

    #[test]
    fn test_registries_do_not_collide() {
        let mut a = TokenRegistry::default();
        let mut b = TokenRegistry::default();
        assert_ne!(a.issue(), b.issue());
    }

    #[test]
    fn test_claim_rejects_duplicates() {
        let mut reg = TokenRegistry::default();
        let t = reg.claim("<part1@example.org>").unwrap();
        assert_eq!(t.as_str(), "cid:part1@example.org");
        let err = reg.claim("part1@example.org").unwrap_err();
        assert!(matches!(err, AttachmentError::DuplicateToken(id) if id == "part1@example.org"));
    }

    #[test]
    fn test_issue_skips_claimed_slot() {
        let mut reg = TokenRegistry::new("example.org");
        let nonce = reg.nonce.clone();
        reg.claim(&format!("0.{nonce}@example.org")).unwrap();
        let issued = reg.issue();
        assert_eq!(issued.content_id(), Some(format!("1.{nonce}@example.org").as_str()));
    }

    #[test]
    fn test_domain_sanitized() {
        assert_eq!(TokenRegistry::new("bad domain!").domain(), "baddomain");
        assert_eq!(TokenRegistry::new("  ").domain(), DEFAULT_CID_DOMAIN);
    }

    #[test]
    fn test_reset_clears_issued() {
        let mut reg = TokenRegistry::default();
        reg.issue();
        reg.reset();
        assert_eq!(reg.issued_count(), 0);
    }
}
