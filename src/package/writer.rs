//! Write a `multipart/related` package from a marshalled root document and
//! the parts its sink collected.

use std::io::Write;

use base64::Engine;
use tracing::{debug, info};

use crate::attachment::registry::DEFAULT_CID_DOMAIN;
use crate::config::PackageConfig;
use crate::error::Result;
use crate::marshal::MarshalReport;
use crate::model::attachment::{AttachmentPart, TransferEncoding};

const CRLF: &str = "\r\n";
const XOP_MEDIA_TYPE: &str = "application/xop+xml";
const BASE64_LINE: usize = 76;

/// What [`write_package`] produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSummary {
    pub boundary: String,
    /// Content-ID of the root part, without angle brackets.
    pub root_content_id: String,
    /// Full value of the top-level `Content-Type` header.
    pub content_type: String,
    /// Number of attachment parts written.
    pub parts: usize,
    pub bytes_written: u64,
}

/// Write a MIME package: headers, the root part, then every attachment
/// part in the order given.
///
/// The root part is labelled `application/xop+xml` only when `report`
/// says the document carries XOP placeholders.
pub fn write_package<W: Write>(
    root_xml: &[u8],
    report: &MarshalReport,
    parts: &[AttachmentPart],
    config: &PackageConfig,
    out: W,
) -> Result<PackageSummary> {
    let mut out = CountingWriter::new(out);
    let xop = report.is_xop_package();
    let boundary = choose_boundary(root_xml, parts);
    let root_content_id = format!("root.{}@{DEFAULT_CID_DOMAIN}", uuid::Uuid::new_v4().simple());

    let content_type = if xop {
        format!(
            "multipart/related; boundary=\"{boundary}\"; type=\"{XOP_MEDIA_TYPE}\"; \
             start=\"<{root_content_id}>\"; start-info=\"{}\"",
            config.start_info
        )
    } else {
        format!(
            "multipart/related; boundary=\"{boundary}\"; type=\"text/xml\"; \
             start=\"<{root_content_id}>\""
        )
    };

    write!(out, "MIME-Version: 1.0{CRLF}")?;
    write!(out, "Date: {}{CRLF}", chrono::Utc::now().to_rfc2822())?;
    write!(out, "Content-Type: {content_type}{CRLF}{CRLF}")?;

    // Root part
    write!(out, "--{boundary}{CRLF}")?;
    if xop {
        write!(
            out,
            "Content-Type: {XOP_MEDIA_TYPE}; charset=UTF-8; type=\"{}\"{CRLF}",
            config.start_info
        )?;
    } else {
        write!(out, "Content-Type: text/xml; charset=UTF-8{CRLF}")?;
    }
    write!(out, "Content-Transfer-Encoding: 8bit{CRLF}")?;
    write!(out, "Content-ID: <{root_content_id}>{CRLF}{CRLF}")?;
    out.write_all(root_xml)?;
    write!(out, "{CRLF}")?;

    for part in parts {
        write!(out, "--{boundary}{CRLF}")?;
        write!(out, "Content-Type: {}{CRLF}", part.content_type)?;
        write!(
            out,
            "Content-Transfer-Encoding: {}{CRLF}",
            config.transfer_encoding.as_str()
        )?;
        write!(out, "Content-ID: <{}>{CRLF}{CRLF}", part.content_id)?;
        match config.transfer_encoding {
            TransferEncoding::Binary => out.write_all(&part.data)?,
            TransferEncoding::Base64 => write_base64_lines(&mut out, &part.data)?,
        }
        write!(out, "{CRLF}")?;
        debug!(
            content_id = %part.content_id,
            size = part.data.len(),
            "Wrote attachment part"
        );
    }
    write!(out, "--{boundary}--{CRLF}")?;
    out.flush()?;

    let summary = PackageSummary {
        boundary,
        root_content_id,
        content_type,
        parts: parts.len(),
        bytes_written: out.count,
    };
    info!(
        parts = summary.parts,
        xop,
        bytes = summary.bytes_written,
        "Wrote MIME package"
    );
    Ok(summary)
}

/// Pick a boundary that occurs in none of the bodies.
fn choose_boundary(root_xml: &[u8], parts: &[AttachmentPart]) -> String {
    loop {
        let candidate = format!("MIMEBoundary_{}", uuid::Uuid::new_v4().simple());
        let needle = candidate.as_bytes();
        let clash = contains(root_xml, needle) || parts.iter().any(|p| contains(&p.data, needle));
        if !clash {
            return candidate;
        }
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.len() >= needle.len() && haystack.windows(needle.len()).any(|w| w == needle)
}

fn write_base64_lines<W: Write>(out: &mut W, data: &[u8]) -> std::io::Result<()> {
    let encoded = base64::engine::general_purpose::STANDARD.encode(data);
    let mut lines = encoded.as_bytes().chunks(BASE64_LINE).peekable();
    while let Some(line) = lines.next() {
        out.write_all(line)?;
        if lines.peek().is_some() {
            out.write_all(CRLF.as_bytes())?;
        }
    }
    Ok(())
}

/// Counts bytes passed through to the inner writer.
struct CountingWriter<W> {
    inner: W,
    count: u64,
}

impl<W: Write> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, count: 0 }
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachment::SinkMode;
    use crate::model::attachment::PartOrigin;
    use crate::package::Package;

    fn part(id: &str, content_type: &str, data: &[u8]) -> AttachmentPart {
        AttachmentPart {
            content_id: id.into(),
            content_type: content_type.into(),
            element: Some("photo".into()),
            origin: PartOrigin::Xop,
            data: data.to_vec(),
        }
    }

    fn xop_report() -> MarshalReport {
        MarshalReport {
            mode: SinkMode::XopOptimizing,
            externalized: 1,
            ..MarshalReport::default()
        }
    }

    #[test]
    fn test_xop_package_roundtrip() {
        let root = br#"<doc><xop:Include xmlns:xop="http://www.w3.org/2004/08/xop/include" href="cid:0.a@x"/></doc>"#;
        let data: Vec<u8> = (0u8..=255).collect();
        let parts = vec![part("0.a@x", "image/png", &data)];

        let mut buf = Vec::new();
        let summary =
            write_package(root, &xop_report(), &parts, &PackageConfig::default(), &mut buf)
                .unwrap();
        assert_eq!(summary.bytes_written, buf.len() as u64);
        assert_eq!(summary.parts, 1);
        assert!(summary.content_type.contains("type=\"application/xop+xml\""));

        let pkg = Package::parse(&buf).unwrap();
        assert!(pkg.is_xop);
        assert_eq!(pkg.root_content_id, summary.root_content_id);
        assert_eq!(pkg.root_content_type, "application/xop+xml");
        assert_eq!(pkg.root, root.to_vec());
        assert_eq!(pkg.resolve("cid:0.a@x").unwrap().data, data);
    }

    #[test]
    fn test_base64_transfer_encoding() {
        let data = vec![0xABu8; 200];
        let config = PackageConfig {
            transfer_encoding: TransferEncoding::Base64,
            ..PackageConfig::default()
        };
        let mut buf = Vec::new();
        write_package(
            b"<doc/>",
            &xop_report(),
            &[part("p@x", "application/octet-stream", &data)],
            &config,
            &mut buf,
        )
        .unwrap();

        let text = String::from_utf8_lossy(&buf);
        assert!(text.contains("Content-Transfer-Encoding: base64"));
        assert!(text.lines().all(|l| l.len() <= 998));

        let pkg = Package::parse(&buf).unwrap();
        assert_eq!(pkg.parts[0].data, data);
    }

    #[test]
    fn test_text_part_octets_survive_roundtrip() {
        let data = [0xFF, 0xFE, 0x80, b'a', b'\r', b'\n', b'b', b'\n'];
        for transfer_encoding in [TransferEncoding::Binary, TransferEncoding::Base64] {
            let config = PackageConfig {
                transfer_encoding,
                ..PackageConfig::default()
            };
            let mut buf = Vec::new();
            write_package(
                b"<doc/>",
                &xop_report(),
                &[part("notes@x", "text/plain", &data)],
                &config,
                &mut buf,
            )
            .unwrap();

            let pkg = Package::parse(&buf).unwrap();
            let parsed = pkg.resolve("cid:notes@x").unwrap();
            assert_eq!(parsed.content_type, "text/plain");
            assert_eq!(parsed.data, data, "{transfer_encoding:?}");
        }
    }

    #[test]
    fn test_swaref_only_root_is_plain_xml() {
        let report = MarshalReport {
            mode: SinkMode::XopOptimizing,
            swaref: 1,
            ..MarshalReport::default()
        };
        let mut buf = Vec::new();
        write_package(
            b"<doc>cid:s@x</doc>",
            &report,
            &[part("s@x", "text/plain", b"hi")],
            &PackageConfig::default(),
            &mut buf,
        )
        .unwrap();

        let text = String::from_utf8_lossy(&buf);
        assert!(!text.contains("application/xop+xml"));
        let pkg = Package::parse(&buf).unwrap();
        assert!(!pkg.is_xop);
        assert_eq!(pkg.root_content_type, "text/xml");
    }

    #[test]
    fn test_base64_lines_wrap() {
        let mut out = Vec::new();
        write_base64_lines(&mut out, &[0u8; 120]).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.split("\r\n").collect();
        assert_eq!(lines.len(), 3);
        assert!(lines.iter().all(|l| l.len() <= BASE64_LINE));
    }

    #[test]
    fn test_contains() {
        assert!(contains(b"abcdef", b"cde"));
        assert!(!contains(b"ab", b"abc"));
    }
}
