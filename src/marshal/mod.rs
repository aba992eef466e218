//! Streaming XML marshaller that drives the attachment protocol.
//!
//! One call to [`Marshaller::marshal`] is one serialization pass:
//!
//! 1. Read the sink mode once and cache it.
//! 2. Run the structural guard; a violation aborts before any output.
//! 3. Walk the document depth-first. Each `xs:base64Binary` value is
//!    offered to the sink when the cached mode is active and written as
//!    an `xop:Include` or as base64 text. Each swaRef value is always
//!    attached and its token written as text.
//!
//! Output is streamed. If the pass fails half-way the writer holds a
//! partial document that must be discarded.

pub mod report;

use std::io::Write;

use base64::Engine;
use tracing::{debug, info, warn};
use xml::writer::{EmitterConfig, EventWriter, XmlEvent};

use crate::attachment::{guard, AttachmentSink, ExternalizationDecision, SinkMode};
use crate::config::MarshalConfig;
use crate::error::{Error, Result};
use crate::model::document::{
    BinaryField, Document, Element, Node, QName, XMIME_NAMESPACE, XOP_INCLUDE, XOP_NAMESPACE,
};
use crate::model::payload::{BinaryPayload, SwaRefPayload, DEFAULT_CONTENT_TYPE};
use crate::model::token::ReferenceToken;

pub use report::MarshalReport;

/// Prefix used for the `xop:Include` placeholder.
pub const XOP_PREFIX: &str = "xop";

/// Called before each binary visit with the number of values visited so far.
/// Returns `false` to cancel the pass.
pub type Progress<'a> = &'a dyn Fn(usize) -> bool;

/// Serializes [`Document`]s, consulting an [`AttachmentSink`] for binary
/// content.
pub struct Marshaller<'s, S: AttachmentSink + ?Sized> {
    sink: &'s mut S,
    config: MarshalConfig,
}

/// State of one pass.
struct Pass<'p> {
    active: bool,
    report: MarshalReport,
    visited: usize,
    progress: Option<Progress<'p>>,
}

impl<'s, S: AttachmentSink + ?Sized> Marshaller<'s, S> {
    pub fn new(sink: &'s mut S, config: MarshalConfig) -> Self {
        Self { sink, config }
    }

    /// Marshal `document` into `out`.
    pub fn marshal<W: Write>(&mut self, document: &Document, out: W) -> Result<MarshalReport> {
        self.marshal_with_progress(document, out, None)
    }

    /// Marshal `document`, checking `progress` between binary visits.
    pub fn marshal_with_progress<W: Write>(
        &mut self,
        document: &Document,
        out: W,
        progress: Option<Progress<'_>>,
    ) -> Result<MarshalReport> {
        let active = self.sink.is_externalization_active();
        let mode = SinkMode::from_active(active);
        guard::check_document(mode, document)?;

        let mut writer = EmitterConfig::new()
            .perform_indent(self.config.indent)
            .write_document_declaration(self.config.write_declaration)
            .create_writer(out);

        let mut pass = Pass {
            active,
            report: MarshalReport {
                mode,
                ..MarshalReport::default()
            },
            visited: 0,
            progress,
        };

        self.write_element(&mut writer, document.root(), "", 0, &mut pass)?;

        let report = pass.report;
        info!(
            mode = %report.mode,
            externalized = report.externalized,
            inlined = report.inlined,
            swaref = report.swaref,
            fallbacks = report.fallbacks,
            "Marshalled document"
        );
        Ok(report)
    }

    fn write_element<W: Write>(
        &mut self,
        writer: &mut EventWriter<W>,
        element: &Element,
        inherited_default_ns: &str,
        depth: usize,
        pass: &mut Pass<'_>,
    ) -> Result<()> {
        if depth >= self.config.max_depth {
            return Err(Error::TooDeep(self.config.max_depth));
        }

        let name = qualified_name(&element.name);
        let attr_names: Vec<(String, Option<String>)> = element
            .attributes
            .iter()
            .enumerate()
            .map(|(i, a)| attribute_name(&a.name, i))
            .collect();

        let mut start = XmlEvent::start_element(name.as_str());
        let mut default_ns = inherited_default_ns;
        match &element.name.prefix {
            Some(prefix) if !element.name.namespace.is_empty() => {
                start = start.ns(prefix.as_str(), element.name.namespace.as_str());
            }
            _ => {
                if element.name.namespace != inherited_default_ns {
                    start = start.default_ns(element.name.namespace.as_str());
                    // xml-rs never writes an empty default declaration itself
                    if element.name.namespace.is_empty() {
                        start = start.attr("xmlns", "");
                    }
                }
                default_ns = element.name.namespace.as_str();
            }
        }
        for (attr, (attr_name, prefix)) in element.attributes.iter().zip(&attr_names) {
            if let Some(prefix) = prefix {
                start = start.ns(prefix.as_str(), attr.name.namespace.as_str());
            }
            start = start.attr(attr_name.as_str(), attr.value.as_str());
        }
        writer.write(start)?;

        for child in &element.children {
            match child {
                Node::Element(child) => {
                    self.write_element(writer, child, default_ns, depth + 1, pass)?;
                }
                Node::Text(text) => writer.write(XmlEvent::characters(text))?,
                Node::Binary(field) => {
                    check_progress(pass)?;
                    self.write_binary(writer, element, field, pass)?;
                }
                Node::SwaRef(field) => {
                    check_progress(pass)?;
                    self.write_swaref(writer, element, field, pass)?;
                }
            }
        }

        writer.write(XmlEvent::end_element())?;
        Ok(())
    }

    fn write_binary<W: Write>(
        &mut self,
        writer: &mut EventWriter<W>,
        element: &Element,
        field: &BinaryField,
        pass: &mut Pass<'_>,
    ) -> Result<()> {
        if !pass.active {
            return write_inline(writer, field, pass);
        }

        let payload = BinaryPayload::new(
            field.data.as_slice(),
            &element.name.namespace,
            &element.name.local_name,
        )?
        .with_content_type(content_type_for(element, field));

        match self.sink.offer_content(&payload) {
            Ok(ExternalizationDecision::Token(token)) => {
                write_include(writer, &token)?;
                pass.report.externalized += 1;
                pass.report.externalized_bytes += field.data.len() as u64;
                pass.report.tokens.push(token);
                Ok(())
            }
            Ok(ExternalizationDecision::Inline) => write_inline(writer, field, pass),
            Err(e) if self.config.inline_on_attachment_error => {
                warn!(
                    element = %element.name.local_name,
                    error = %e,
                    "Attachment store failed, inlining content"
                );
                pass.report.fallbacks += 1;
                write_inline(writer, field, pass)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn write_swaref<W: Write>(
        &mut self,
        writer: &mut EventWriter<W>,
        element: &Element,
        field: &BinaryField,
        pass: &mut Pass<'_>,
    ) -> Result<()> {
        let payload = SwaRefPayload::new(field.data.as_slice())
            .with_content_type(content_type_for(element, field));
        // Store failures are always fatal here
        let token = self.sink.offer_swaref_content(&payload)?;
        writer.write(XmlEvent::characters(token.as_str()))?;
        debug!(element = %element.name.local_name, token = %token, "Wrote swaRef");
        pass.report.swaref += 1;
        pass.report.swaref_bytes += field.data.len() as u64;
        pass.report.tokens.push(token);
        Ok(())
    }
}

/// Marshal into a fresh buffer. Nothing is returned unless the whole pass
/// succeeds.
pub fn marshal_to_vec<S: AttachmentSink + ?Sized>(
    sink: &mut S,
    document: &Document,
    config: &MarshalConfig,
) -> Result<(Vec<u8>, MarshalReport)> {
    let mut buf = Vec::new();
    let report = Marshaller::new(sink, config.clone()).marshal(document, &mut buf)?;
    Ok((buf, report))
}

fn check_progress(pass: &mut Pass<'_>) -> Result<()> {
    if let Some(progress) = pass.progress {
        if !progress(pass.visited) {
            return Err(Error::Cancelled);
        }
    }
    pass.visited += 1;
    Ok(())
}

fn write_inline<W: Write>(
    writer: &mut EventWriter<W>,
    field: &BinaryField,
    pass: &mut Pass<'_>,
) -> Result<()> {
    if !field.data.is_empty() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&field.data);
        writer.write(XmlEvent::characters(&encoded))?;
    }
    pass.report.inlined += 1;
    pass.report.inlined_bytes += field.data.len() as u64;
    Ok(())
}

fn write_include<W: Write>(writer: &mut EventWriter<W>, token: &ReferenceToken) -> Result<()> {
    let name = format!("{XOP_PREFIX}:{XOP_INCLUDE}");
    writer.write(
        XmlEvent::start_element(name.as_str())
            .ns(XOP_PREFIX, XOP_NAMESPACE)
            .attr("href", token.as_str()),
    )?;
    writer.write(XmlEvent::end_element())?;
    Ok(())
}

/// Field content type, else the enclosing element's `xmime:contentType`,
/// else `application/octet-stream`.
fn content_type_for<'a>(element: &'a Element, field: &'a BinaryField) -> &'a str {
    field
        .content_type
        .as_deref()
        .or_else(|| element.xmime_content_type())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
}

fn qualified_name(name: &QName) -> String {
    match &name.prefix {
        Some(prefix) if !name.namespace.is_empty() => format!("{prefix}:{}", name.local_name),
        _ => name.local_name.clone(),
    }
}

/// Written name of an attribute and the prefix it needs declared, if any.
///
/// Namespaced attributes always need a prefix; one is invented when the
/// model has none.
fn attribute_name(name: &QName, index: usize) -> (String, Option<String>) {
    if name.namespace.is_empty() {
        return (name.local_name.clone(), None);
    }
    let prefix = match &name.prefix {
        Some(p) => p.clone(),
        None if name.namespace == XMIME_NAMESPACE => "xmime".to_string(),
        None => format!("ns{index}"),
    };
    (format!("{prefix}:{}", name.local_name), Some(prefix))
}
