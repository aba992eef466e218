//! MIME package parsing: split a `multipart/related` package into its root
//! document and attachment parts.

use base64::Engine;
use mail_parser::decoders::quoted_printable::quoted_printable_decode;
use mail_parser::{Encoding, MessagePart, MessageParser, MimeHeaders, PartType};

use crate::error::{Error, Result};
use crate::model::token::strip_angle_brackets;
use crate::package::{Package, PackagePart};

/// Parse a complete MIME package (headers + body).
///
/// The root part is the one named by the `start` parameter of the
/// top-level `Content-Type`, or the first part when there is none.
pub fn parse_package(raw: &[u8]) -> Result<Package> {
    let raw = skip_bom(raw);
    let message = MessageParser::default()
        .parse(raw)
        .ok_or_else(|| Error::MimeError("Failed to parse MIME package".into()))?;

    let top = message
        .parts
        .first()
        .ok_or_else(|| Error::MimeError("Package has no parts".into()))?;

    let top_type = top
        .content_type()
        .ok_or_else(|| Error::MimeError("Package has no Content-Type".into()))?;
    let essence = content_type_string(top_type);
    if !essence.starts_with("multipart/") {
        return Err(Error::MimeError(format!(
            "Expected a multipart package, found '{essence}'"
        )));
    }
    let start = top_type
        .attribute("start")
        .map(|s| strip_angle_brackets(s).to_string());
    let type_param = top_type.attribute("type").map(|s| s.to_ascii_lowercase());

    let mut parts: Vec<PackagePart> = Vec::new();
    for part in message.parts.iter().skip(1) {
        if matches!(part.body, PartType::Multipart(_)) {
            continue;
        }
        let content_type = part
            .content_type()
            .map(content_type_string)
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let content_id = part
            .content_id()
            .map(|id| strip_angle_brackets(id).to_string())
            .unwrap_or_default();
        let data = part_body(raw, part)?;
        parts.push(PackagePart {
            content_id,
            content_type,
            data,
        });
    }

    let root_index = match &start {
        Some(start) => parts
            .iter()
            .position(|p| &p.content_id == start)
            .ok_or_else(|| {
                Error::MimeError(format!("Root part '<{start}>' not found in package"))
            })?,
        None if parts.is_empty() => {
            return Err(Error::MimeError("Package has no root part".into()));
        }
        None => 0,
    };
    let root = parts.remove(root_index);

    let is_xop = type_param.as_deref() == Some("application/xop+xml")
        || root.content_type.starts_with("application/xop+xml");

    tracing::debug!(
        parts = parts.len(),
        xop = is_xop,
        root = %root.content_id,
        "Parsed MIME package"
    );

    Ok(Package {
        content_type: essence,
        is_xop,
        root_content_id: root.content_id,
        root_content_type: root.content_type,
        root: root.data,
        parts,
    })
}

/// Octets of a part body with only the transfer encoding undone.
///
/// Cut from the raw input: `contents()` decodes `text/*` bodies through
/// their charset.
fn part_body(raw: &[u8], part: &MessagePart<'_>) -> Result<Vec<u8>> {
    let body = raw
        .get(part.raw_body_offset()..part.raw_end_offset())
        .ok_or_else(|| Error::MimeError("Part body lies outside the package".into()))?;

    match part.encoding {
        Encoding::None => Ok(body.to_vec()),
        Encoding::Base64 => {
            let compact: Vec<u8> = body
                .iter()
                .copied()
                .filter(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'='))
                .collect();
            base64::engine::general_purpose::STANDARD
                .decode(&compact)
                .map_err(|e| Error::MimeError(format!("Invalid base64 part body: {e}")))
        }
        Encoding::QuotedPrintable => quoted_printable_decode(body)
            .ok_or_else(|| Error::MimeError("Invalid quoted-printable part body".into())),
    }
}

/// Render a parsed content type as `type/subtype`, lowercased.
fn content_type_string(ct: &mail_parser::ContentType) -> String {
    let main = ct.ctype();
    match ct.subtype() {
        Some(sub) => format!("{main}/{sub}").to_ascii_lowercase(),
        None => main.to_ascii_lowercase(),
    }
}

/// Skip a UTF-8 BOM some tools prepend to saved packages.
fn skip_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data)
}
