//! XML input: build a [`Document`] from text, decoding binary elements.
//!
//! Which elements carry `xs:base64Binary` (or swaRef) content is not
//! knowable from the XML alone, so the caller names them in
//! [`BinaryElements`]. Their base64 text becomes [`Node::Binary`] /
//! [`Node::SwaRef`] values ready for the marshaller.
//!
//! While parsing, the builder also records the first
//! `xop:Include` element it sees so the structural guard does not need a
//! second walk.

use std::io::Read;

use base64::Engine;
use tracing::debug;
use xml::name::OwnedName;
use xml::reader::{EventReader, ParserConfig, XmlEvent};

use crate::error::{Error, Result};
use crate::model::document::{
    Attribute, BinaryField, Document, Element, Node, PlaceholderScan, QName,
};

/// Element names whose text content is binary.
///
/// Entries are either a bare local name (`photo`) or Clark notation
/// (`{urn:example}photo`).
#[derive(Debug, Clone, Default)]
pub struct BinaryElements {
    pub xop: Vec<String>,
    pub swaref: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryKind {
    Xop,
    SwaRef,
}

impl BinaryElements {
    fn kind_of(&self, name: &QName) -> Option<BinaryKind> {
        if self.xop.iter().any(|p| name_matches(p, name)) {
            Some(BinaryKind::Xop)
        } else if self.swaref.iter().any(|p| name_matches(p, name)) {
            Some(BinaryKind::SwaRef)
        } else {
            None
        }
    }
}

fn name_matches(pattern: &str, name: &QName) -> bool {
    match pattern.strip_prefix('{').and_then(|rest| rest.split_once('}')) {
        Some((ns, local)) => name.is(ns, local),
        None => pattern == name.local_name,
    }
}

/// An element under construction.
struct Frame {
    element: Element,
    path: String,
    binary: Option<BinaryKind>,
}

/// Parse an XML document.
///
/// Text keeps its whitespace. Runs that are only whitespace are formatting
/// and are dropped.
pub fn parse_document<R: Read>(reader: R, binary: &BinaryElements) -> Result<Document> {
    let config = ParserConfig::new()
        .trim_whitespace(false)
        .whitespace_to_characters(false)
        .ignore_comments(true)
        .cdata_to_characters(true);
    let parser = EventReader::new_with_config(reader, config);

    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<Element> = None;
    let mut scan = PlaceholderScan::Absent;

    for event in parser {
        match event? {
            XmlEvent::StartElement {
                name, attributes, ..
            } => {
                let qname = to_qname(name);
                let path = match stack.last() {
                    Some(parent) => format!("{}/{}", parent.path, qname.local_name),
                    None => format!("/{}", qname.local_name),
                };
                if qname.is_xop_include() && scan == PlaceholderScan::Absent {
                    debug!(path = %path, "Found pre-existing xop:Include");
                    scan = PlaceholderScan::Found(path.clone());
                }

                let mut element = Element::new(qname);
                element.attributes = attributes
                    .into_iter()
                    .map(|a| Attribute {
                        name: to_qname(a.name),
                        value: a.value,
                    })
                    .collect();
                let binary_kind = binary.kind_of(&element.name);

                stack.push(Frame {
                    element,
                    path,
                    binary: binary_kind,
                });
            }
            XmlEvent::Characters(text) => {
                if let Some(frame) = stack.last_mut() {
                    frame.element.children.push(Node::Text(text));
                }
            }
            XmlEvent::EndElement { .. } => {
                let Some(frame) = stack.pop() else {
                    return Err(Error::InvalidDocument("unbalanced end element".into()));
                };
                let element = finish_frame(frame)?;
                match stack.last_mut() {
                    Some(parent) => parent.element.children.push(Node::Element(element)),
                    None => root = Some(element),
                }
            }
            _ => {}
        }
    }

    let root = root.ok_or_else(|| Error::InvalidDocument("no root element".into()))?;
    Ok(Document::with_placeholder_scan(root, scan))
}

/// Turn the base64 text of a binary element into a binary node, unless the
/// element holds child elements (an `xop:Include`, typically), in which case
/// its content is kept as written.
fn finish_frame(frame: Frame) -> Result<Element> {
    let Frame {
        mut element,
        binary,
        ..
    } = frame;

    let Some(kind) = binary else {
        return Ok(element);
    };
    if element.child_elements().next().is_some() {
        return Ok(element);
    }

    let compact: String = std::mem::take(&mut element.children)
        .into_iter()
        .filter_map(|node| match node {
            Node::Text(text) => Some(text),
            _ => None,
        })
        .flat_map(|text| text.chars().filter(|c| !c.is_ascii_whitespace()).collect::<Vec<_>>())
        .collect();
    let data = base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map_err(|source| Error::Base64 {
            element: element.name.local_name.clone(),
            source,
        })?;
    let field = BinaryField::new(data);
    element.children.push(match kind {
        BinaryKind::Xop => Node::Binary(field),
        BinaryKind::SwaRef => Node::SwaRef(field),
    });
    Ok(element)
}

fn to_qname(name: OwnedName) -> QName {
    QName {
        namespace: name.namespace.unwrap_or_default(),
        local_name: name.local_name,
        prefix: name.prefix,
    }
}
