//! Which payloads are worth a separate MIME part.

use crate::model::payload::BinaryPayload;

/// Per-payload externalization rules for [`PackageSink`](super::PackageSink).
///
/// A payload is externalized when it is at least `min_size` bytes long, its
/// content type is not listed in `inline_content_types` (`type/*` wildcards
/// allowed, parameters ignored), and its enclosing element's local name is
/// not listed in `inline_elements`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalizationPolicy {
    pub min_size: usize,
    pub inline_content_types: Vec<String>,
    pub inline_elements: Vec<String>,
}

impl ExternalizationPolicy {
    /// Externalize every payload.
    pub fn always() -> Self {
        Self::default()
    }

    /// Externalize payloads of at least `min_size` bytes.
    pub fn with_min_size(min_size: usize) -> Self {
        Self {
            min_size,
            ..Self::default()
        }
    }

    pub fn should_externalize(&self, payload: &BinaryPayload<'_>) -> bool {
        if payload.len() < self.min_size {
            return false;
        }
        if self
            .inline_elements
            .iter()
            .any(|e| e == payload.element_local_name())
        {
            return false;
        }
        !self
            .inline_content_types
            .iter()
            .any(|pattern| content_type_matches(pattern, payload.content_type()))
    }
}

/// Case-insensitive media type match, ignoring parameters.
fn content_type_matches(pattern: &str, content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    let pattern = pattern.trim().to_ascii_lowercase();

    match pattern.strip_suffix("/*") {
        Some(main) => essence
            .split_once('/')
            .is_some_and(|(ty, _)| ty == main),
        None => pattern == essence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload<'a>(data: &'a [u8], ct: &'a str, local: &'a str) -> BinaryPayload<'a> {
        BinaryPayload::new(data, "", local)
            .unwrap()
            .with_content_type(ct)
    }

    #[test]
    fn test_threshold() {
        let policy = ExternalizationPolicy::with_min_size(4);
        assert!(!policy.should_externalize(&payload(b"abc", "image/png", "p")));
        assert!(policy.should_externalize(&payload(b"abcd", "image/png", "p")));
    }

    #[test]
    fn test_always_externalizes_empty() {
        let policy = ExternalizationPolicy::always();
        assert!(policy.should_externalize(&payload(b"", "image/png", "p")));
    }

    #[test]
    fn test_inline_content_types() {
        let policy = ExternalizationPolicy {
            inline_content_types: vec!["text/*".into(), "application/json".into()],
            ..ExternalizationPolicy::always()
        };
        assert!(!policy.should_externalize(&payload(b"x", "text/plain; charset=utf-8", "p")));
        assert!(!policy.should_externalize(&payload(b"x", "Application/JSON", "p")));
        assert!(policy.should_externalize(&payload(b"x", "image/jpeg", "p")));
    }

    #[test]
    fn test_inline_elements() {
        let policy = ExternalizationPolicy {
            inline_elements: vec!["thumbnail".into()],
            ..ExternalizationPolicy::always()
        };
        assert!(!policy.should_externalize(&payload(b"x", "image/png", "thumbnail")));
        assert!(policy.should_externalize(&payload(b"x", "image/png", "photo")));
    }
}
