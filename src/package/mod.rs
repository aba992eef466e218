//! MIME packages: the container an XOP document travels in.
//!
//! ```text
//! multipart/related; type="application/xop+xml"; start="<root>"
//! ├── root part     application/xop+xml   the document, with xop:Include
//! ├── attachment    image/png             Content-ID: <0.nonce@domain>
//! └── attachment    ...
//! ```

pub mod writer;

use std::borrow::Cow;
use std::io::Cursor;

use base64::Engine;
use xml::attribute::Attribute;
use xml::name::Name;
use xml::namespace::NS_NO_PREFIX;
use xml::reader::{EventReader, ParserConfig, XmlEvent as ReadEvent};
use xml::writer::{EmitterConfig, XmlEvent as WriteEvent};

use crate::error::{Error, Result};
use crate::model::document::{XOP_INCLUDE, XOP_NAMESPACE};
use crate::model::token::{strip_angle_brackets, strip_cid_scheme};

pub use writer::{write_package, PackageSummary};

/// A part of a parsed package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagePart {
    /// Content-ID without angle brackets.
    pub content_id: String,
    /// Lowercased `type/subtype`.
    pub content_type: String,
    pub data: Vec<u8>,
}

/// A parsed MIME package.
#[derive(Debug, Clone)]
pub struct Package {
    /// Top-level media type, normally `multipart/related`.
    pub content_type: String,
    /// The root is an XOP infoset (`application/xop+xml`).
    pub is_xop: bool,
    pub root_content_id: String,
    pub root_content_type: String,
    /// Serialized root document.
    pub root: Vec<u8>,
    /// Every part except the root, in package order.
    pub parts: Vec<PackagePart>,
}

impl Package {
    /// Parse a package from raw bytes.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        crate::parser::mime::parse_package(raw)
    }

    /// Find the part a reference points at.
    ///
    /// Accepts `cid:` URIs (percent-encoded or not), `<id>` and bare ids.
    pub fn resolve(&self, reference: &str) -> Option<&PackagePart> {
        let id = strip_cid_scheme(reference).unwrap_or(reference);
        let id = strip_angle_brackets(id);
        self.find(id).or_else(|| {
            let decoded = percent_decode(id)?;
            self.find(&decoded)
        })
    }

    fn find(&self, content_id: &str) -> Option<&PackagePart> {
        self.parts.iter().find(|p| p.content_id == content_id)
    }

    /// Total bytes held in attachment parts.
    pub fn attachment_bytes(&self) -> u64 {
        self.parts.iter().map(|p| p.data.len() as u64).sum()
    }

    /// Rebuild the original document by replacing every `xop:Include` with
    /// the base64 text of the part it references.
    ///
    /// Fails with [`Error::UnresolvedReference`] when a reference has no part.
    pub fn reconstruct(&self) -> Result<Vec<u8>> {
        let reader = EventReader::new_with_config(
            Cursor::new(&self.root),
            ParserConfig::new().ignore_comments(false),
        );
        let mut out = Vec::with_capacity(self.root.len() + self.attachment_bytes() as usize);
        let mut writer = EmitterConfig::new()
            .write_document_declaration(false)
            .create_writer(&mut out);

        // Depth inside an xop:Include being replaced
        let mut skipping = 0usize;
        // Default namespace in scope for each open element
        let mut defaults: Vec<String> = Vec::new();

        for event in reader {
            let event = event?;
            if skipping > 0 {
                match event {
                    ReadEvent::StartElement { .. } => skipping += 1,
                    ReadEvent::EndElement { .. } => skipping -= 1,
                    _ => {}
                }
                continue;
            }

            if let ReadEvent::StartElement {
                name, attributes, ..
            } = &event
            {
                if name.namespace.as_deref() == Some(XOP_NAMESPACE) && name.local_name == XOP_INCLUDE {
                    let href = attributes
                        .iter()
                        .find(|a| a.name.local_name == "href" && a.name.namespace.is_none())
                        .map(|a| a.value.as_str())
                        .unwrap_or("");
                    let part = self
                        .resolve(href)
                        .ok_or_else(|| Error::UnresolvedReference(href.to_string()))?;
                    let encoded = base64::engine::general_purpose::STANDARD.encode(&part.data);
                    writer.write(WriteEvent::characters(&encoded))?;
                    skipping = 1;
                    continue;
                }
            }

            match &event {
                ReadEvent::StartElement { namespace, .. } => {
                    let default = namespace.get(NS_NO_PREFIX).unwrap_or("").to_string();
                    let undeclare = default.is_empty()
                        && defaults.last().is_some_and(|parent| !parent.is_empty());
                    defaults.push(default);
                    if let Some(WriteEvent::StartElement {
                        name,
                        attributes,
                        namespace,
                    }) = event.as_writer_event()
                    {
                        let mut attributes = attributes.into_owned();
                        if undeclare {
                            attributes.push(Attribute {
                                name: Name::local("xmlns"),
                                value: "",
                            });
                        }
                        writer.write(WriteEvent::StartElement {
                            name,
                            attributes: Cow::Owned(attributes),
                            namespace,
                        })?;
                    }
                    continue;
                }
                ReadEvent::EndElement { .. } => {
                    defaults.pop();
                }
                _ => {}
            }

            if let Some(write_event) = event.as_writer_event() {
                writer.write(write_event)?;
            }
        }

        drop(writer);
        Ok(out)
    }
}

/// Decode `%XX` escapes. Returns `None` when nothing was escaped or the
/// result is not UTF-8.
fn percent_decode(s: &str) -> Option<String> {
    if !s.contains('%') {
        return None;
    }
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok()?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::document::{BinaryField, Node};
    use crate::parser::xml::{parse_document, BinaryElements};

    fn package(root: &str, parts: Vec<PackagePart>) -> Package {
        Package {
            content_type: "multipart/related".into(),
            is_xop: true,
            root_content_id: "root@x".into(),
            root_content_type: "application/xop+xml".into(),
            root: root.as_bytes().to_vec(),
            parts,
        }
    }

    fn part(id: &str, data: &[u8]) -> PackagePart {
        PackagePart {
            content_id: id.into(),
            content_type: "application/octet-stream".into(),
            data: data.to_vec(),
        }
    }

    #[test]
    fn test_resolve_forms() {
        let pkg = package("<r/>", vec![part("a b@x", b"1"), part("plain@x", b"2")]);
        assert_eq!(pkg.resolve("cid:plain@x").unwrap().data, b"2");
        assert_eq!(pkg.resolve("<plain@x>").unwrap().data, b"2");
        assert_eq!(pkg.resolve("plain@x").unwrap().data, b"2");
        assert_eq!(pkg.resolve("cid:a%20b@x").unwrap().data, b"1");
        assert!(pkg.resolve("cid:missing@x").is_none());
    }

    #[test]
    fn test_reconstruct_inlines_parts() {
        let root = format!(
            r#"<doc xmlns:xop="{XOP_NAMESPACE}"><photo><xop:Include href="cid:img@x"/></photo><name>cat</name></doc>"#
        );
        let pkg = package(&root, vec![part("img@x", b"hello")]);
        let xml = String::from_utf8(pkg.reconstruct().unwrap()).unwrap();
        assert!(xml.contains(">aGVsbG8=</photo>"), "{xml}");
        assert!(xml.contains(">cat</name>"));
        assert!(!xml.contains("Include"));
    }

    #[test]
    fn test_reconstruct_keeps_default_namespace_undeclaration() {
        let root = format!(
            r#"<doc xmlns="urn:a" xmlns:xop="{XOP_NAMESPACE}"><bare xmlns=""><photo><xop:Include href="cid:img@x"/></photo></bare></doc>"#
        );
        let pkg = package(&root, vec![part("img@x", b"hello")]);
        let xml = pkg.reconstruct().unwrap();

        let elements = BinaryElements {
            xop: vec!["photo".into()],
            swaref: Vec::new(),
        };
        let doc = parse_document(xml.as_slice(), &elements).unwrap();
        assert_eq!(doc.root().name.namespace, "urn:a");
        let bare = doc.root().child_elements().next().unwrap();
        assert!(bare.name.is("", "bare"), "{:?}", bare.name);
        let photo = bare.child_elements().next().unwrap();
        assert!(photo.name.is("", "photo"), "{:?}", photo.name);
        assert_eq!(
            photo.children,
            vec![Node::Binary(BinaryField::new(b"hello".to_vec()))]
        );
    }

    #[test]
    fn test_reconstruct_unresolved() {
        let root = format!(r#"<doc><xop:Include xmlns:xop="{XOP_NAMESPACE}" href="cid:gone@x"/></doc>"#);
        let pkg = package(&root, Vec::new());
        let err = pkg.reconstruct().unwrap_err();
        assert!(matches!(err, Error::UnresolvedReference(href) if href == "cid:gone@x"));
    }

    #[test]
    fn test_percent_decode() {
        assert_eq!(percent_decode("a%40b").as_deref(), Some("a@b"));
        assert_eq!(percent_decode("plain"), None);
        assert_eq!(percent_decode("bad%zz"), None);
    }
}
