//! Structural pre-check for XOP passes.
//!
//! Step 1 of XOP package creation: the original infoset must not contain an
//! `{http://www.w3.org/2004/08/xop/include}Include` element. While
//! optimizing, the marshaller is the only producer of such elements.

use tracing::debug;

use crate::error::StructuralViolation;
use crate::model::document::{Document, Element, Node, PlaceholderScan, XOP_INCLUDE, XOP_NAMESPACE};

use super::SinkMode;

/// Check that `root` can be marshalled in `mode`.
///
/// Inline-only passes always succeed, whatever the model contains. XOP
/// passes fail on the first `xop:Include` in document order.
pub fn check_compatible(mode: SinkMode, root: &Element) -> Result<(), StructuralViolation> {
    if !mode.is_active() {
        return Ok(());
    }
    match find_placeholder(root) {
        Some(path) => Err(violation(path)),
        None => Ok(()),
    }
}

/// Like [`check_compatible`], but trusts the scan recorded by the model
/// builder when there is one.
pub fn check_document(mode: SinkMode, document: &Document) -> Result<(), StructuralViolation> {
    if !mode.is_active() {
        return Ok(());
    }
    match document.placeholder_scan() {
        PlaceholderScan::Absent => Ok(()),
        PlaceholderScan::Found(path) => Err(violation(path.clone())),
        PlaceholderScan::Unknown => {
            debug!("No precomputed placeholder scan, walking document");
            check_compatible(mode, document.root())
        }
    }
}

/// Depth-first, document-order search. Returns the slash path of the first
/// placeholder element.
fn find_placeholder(root: &Element) -> Option<String> {
    let mut stack: Vec<(&Element, String)> = vec![(root, format!("/{}", root.name.local_name))];

    while let Some((element, path)) = stack.pop() {
        if element.name.is_xop_include() {
            return Some(path);
        }
        // Reverse so the first child is popped first
        for child in element.children.iter().rev() {
            if let Node::Element(child) = child {
                let child_path = format!("{path}/{}", child.name.local_name);
                stack.push((child, child_path));
            }
        }
    }
    None
}

fn violation(path: String) -> StructuralViolation {
    StructuralViolation {
        namespace: XOP_NAMESPACE.to_string(),
        local_name: XOP_INCLUDE.to_string(),
        path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::document::QName;

    fn include() -> Element {
        Element::new(QName::new(XOP_NAMESPACE, XOP_INCLUDE).with_prefix("xop"))
            .with_attribute(QName::local("href"), "cid:x@y")
    }

    #[test]
    fn test_inline_only_always_succeeds() {
        let root = Element::new(QName::local("a")).with_child(include());
        assert!(check_compatible(SinkMode::InlineOnly, &root).is_ok());
    }

    #[test]
    fn test_xop_rejects_nested_include() {
        let root = Element::new(QName::local("Envelope")).with_child(
            Element::new(QName::local("Body"))
                .with_child(Element::new(QName::local("first")))
                .with_child(Element::new(QName::local("photo")).with_child(include())),
        );
        let err = check_compatible(SinkMode::XopOptimizing, &root).unwrap_err();
        assert_eq!(err.namespace, XOP_NAMESPACE);
        assert_eq!(err.local_name, "Include");
        assert_eq!(err.path, "/Envelope/Body/photo/Include");
    }

    #[test]
    fn test_reports_first_in_document_order() {
        let root = Element::new(QName::local("r"))
            .with_child(Element::new(QName::local("a")).with_child(include()))
            .with_child(include());
        let err = check_compatible(SinkMode::XopOptimizing, &root).unwrap_err();
        assert_eq!(err.path, "/r/a/Include");
    }

    #[test]
    fn test_unqualified_include_is_allowed() {
        let root = Element::new(QName::local("r")).with_child(Element::new(QName::local("Include")));
        assert!(check_compatible(SinkMode::XopOptimizing, &root).is_ok());
    }

    #[test]
    fn test_precomputed_scan_is_trusted() {
        let doc = Document::with_placeholder_scan(
            Element::new(QName::local("r")),
            PlaceholderScan::Found("/r/x/Include".into()),
        );
        let err = check_document(SinkMode::XopOptimizing, &doc).unwrap_err();
        assert_eq!(err.path, "/r/x/Include");
        assert!(check_document(SinkMode::InlineOnly, &doc).is_ok());
    }
}
