//! Integration tests for the full pipeline: XML in, MIME package out, and
//! back again.

use assert_fs::prelude::*;
use predicates::prelude::*;

use xopack::attachment::policy::ExternalizationPolicy;
use xopack::attachment::{NoopSink, PackageSink, SharedSink, SinkMode};
use xopack::config::{MarshalConfig, PackageConfig};
use xopack::error::Error;
use xopack::marshal::marshal_to_vec;
use xopack::model::attachment::TransferEncoding;
use xopack::model::document::{
    BinaryField, Document, Element, Node, PlaceholderScan, QName, XOP_INCLUDE, XOP_NAMESPACE,
};
use xopack::package::{write_package, Package};
use xopack::parser::xml::{parse_document, BinaryElements};
use xopack::store::directory::{StoredPart, MANIFEST_FILE};
use xopack::store::{DirectoryStore, MemoryStore};

const UPLOAD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<m:upload xmlns:m="urn:example:media" xmlns:xmime="http://www.w3.org/2005/05/xmlmime">
  <m:title>Holiday</m:title>
  <m:photo xmime:contentType="image/png">iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z8BQDwAEhQGAhKmMIQAAAABJRU5ErkJggg==</m:photo>
  <m:thumb>AAEC</m:thumb>
  <m:receipt>SGVsbG8sIHJlY2VpcHQh</m:receipt>
</m:upload>"#;

fn elements() -> BinaryElements {
    BinaryElements {
        xop: vec!["photo".into(), "thumb".into()],
        swaref: vec!["{urn:example:media}receipt".into()],
    }
}

fn binary_values(doc: &Document) -> Vec<Vec<u8>> {
    let mut values = Vec::new();
    for element in doc.root().child_elements() {
        for child in &element.children {
            if let Node::Binary(field) = child {
                values.push(field.data.clone());
            }
        }
    }
    values
}

// ─── XML → package → XML ────────────────────────────────────────────

#[test]
fn test_package_roundtrip_restores_binary_content() {
    let doc = parse_document(UPLOAD.as_bytes(), &elements()).unwrap();
    assert_eq!(doc.placeholder_scan(), &PlaceholderScan::Absent);
    let original = binary_values(&doc);
    assert_eq!(original.len(), 2);

    let mut sink = PackageSink::new(SinkMode::XopOptimizing, MemoryStore::new())
        .with_policy(ExternalizationPolicy::with_min_size(16));
    let (xml, report) = marshal_to_vec(&mut sink, &doc, &MarshalConfig::default()).unwrap();
    assert_eq!(report.externalized, 1, "only the photo is large enough");
    assert_eq!(report.inlined, 1);
    assert_eq!(report.swaref, 1);

    let parts = sink.into_store().into_parts();
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0].content_type, "image/png");

    let mut raw = Vec::new();
    let summary =
        write_package(&xml, &report, &parts, &PackageConfig::default(), &mut raw).unwrap();
    assert_eq!(summary.parts, 2);

    let package = Package::parse(&raw).unwrap();
    assert!(package.is_xop);
    assert_eq!(package.root, xml);
    assert_eq!(package.parts.len(), 2);
    for token in &report.tokens {
        assert!(package.resolve(token.as_str()).is_some(), "{token}");
    }

    // The swaRef element keeps its token; XOP content comes back inline.
    let rebuilt = package.reconstruct().unwrap();
    let rebuilt_text = String::from_utf8(rebuilt.clone()).unwrap();
    assert!(!rebuilt_text.contains("Include"), "{rebuilt_text}");
    assert!(rebuilt_text.contains(report.tokens[1].as_str()));

    let again = parse_document(
        rebuilt.as_slice(),
        &BinaryElements {
            xop: vec!["photo".into(), "thumb".into()],
            swaref: Vec::new(),
        },
    )
    .unwrap();
    assert_eq!(binary_values(&again), original);
}

#[test]
fn test_base64_package_roundtrip() {
    let doc = parse_document(UPLOAD.as_bytes(), &elements()).unwrap();
    let mut sink = PackageSink::new(SinkMode::XopOptimizing, MemoryStore::new())
        .with_policy(ExternalizationPolicy::always());
    let (xml, report) = marshal_to_vec(&mut sink, &doc, &MarshalConfig::default()).unwrap();
    let parts = sink.into_store().into_parts();

    let config = PackageConfig {
        transfer_encoding: TransferEncoding::Base64,
        ..PackageConfig::default()
    };
    let mut raw = Vec::new();
    write_package(&xml, &report, &parts, &config, &mut raw).unwrap();

    let package = Package::parse(&raw).unwrap();
    for part in &parts {
        let parsed = package.resolve(&part.content_id).unwrap();
        assert_eq!(parsed.data, part.data);
    }
}

#[test]
fn test_existing_include_rejected_after_parse() {
    let xml = r#"<r xmlns:xop="http://www.w3.org/2004/08/xop/include"><photo><xop:Include href="cid:x@y"/></photo></r>"#;
    let doc = parse_document(xml.as_bytes(), &elements()).unwrap();
    let mut sink = PackageSink::new(SinkMode::XopOptimizing, MemoryStore::new());

    let err = marshal_to_vec(&mut sink, &doc, &MarshalConfig::default()).unwrap_err();
    assert!(
        err.to_string().contains("/r/photo/Include"),
        "unexpected error: {err}"
    );
}

#[test]
fn test_include_added_after_parse_is_rejected() {
    let mut doc = parse_document("<r><a>x</a></r>".as_bytes(), &elements()).unwrap();
    assert_eq!(doc.placeholder_scan(), &PlaceholderScan::Absent);

    doc.root_mut().children.push(Node::Element(
        Element::new(QName::new(XOP_NAMESPACE, XOP_INCLUDE).with_prefix("xop"))
            .with_attribute(QName::local("href"), "cid:pre@x"),
    ));

    let mut sink = PackageSink::new(SinkMode::XopOptimizing, MemoryStore::new());
    let err = marshal_to_vec(&mut sink, &doc, &MarshalConfig::default()).unwrap_err();
    let Error::Structural(violation) = err else {
        panic!("expected a structural violation, got {err:?}");
    };
    assert_eq!(violation.path, "/r/Include");
}

// ─── Namespaces and octets survive the trip ─────────────────────────

#[test]
fn test_marshal_preserves_default_namespace_undeclaration() {
    let xml = r#"<r xmlns="urn:a"><b xmlns=""><photo>AQI=</photo></b><c>t</c></r>"#;
    let binary = BinaryElements {
        xop: vec!["photo".into()],
        swaref: Vec::new(),
    };
    let doc = parse_document(xml.as_bytes(), &binary).unwrap();

    let (out, _) = marshal_to_vec(&mut NoopSink::new(), &doc, &MarshalConfig::default()).unwrap();
    let again = parse_document(out.as_slice(), &binary).unwrap();

    assert_eq!(doc, again, "{}", String::from_utf8_lossy(&out));
    let b = again.root().child_elements().next().unwrap();
    assert_eq!(b.name.namespace, "");
}

#[test]
fn test_text_payload_bytes_survive_package() {
    let data = vec![0xFF, 0xFE, 0x80, b'a', b'\r', b'\n', b'b', b'\n'];
    let doc = Document::new(
        Element::new(QName::local("r")).with_child(
            Element::new(QName::local("notes"))
                .with_binary(BinaryField::new(data.clone()).with_content_type("text/plain")),
        ),
    );
    let mut sink = PackageSink::new(SinkMode::XopOptimizing, MemoryStore::new())
        .with_policy(ExternalizationPolicy::always());
    let (xml, report) = marshal_to_vec(&mut sink, &doc, &MarshalConfig::default()).unwrap();
    let parts = sink.into_store().into_parts();

    let mut raw = Vec::new();
    write_package(&xml, &report, &parts, &PackageConfig::default(), &mut raw).unwrap();
    let package = Package::parse(&raw).unwrap();

    assert_eq!(package.resolve(report.tokens[0].as_str()).unwrap().data, data);
    let rebuilt = parse_document(
        package.reconstruct().unwrap().as_slice(),
        &BinaryElements {
            xop: vec!["notes".into()],
            swaref: Vec::new(),
        },
    )
    .unwrap();
    assert_eq!(binary_values(&rebuilt), vec![data]);
}

// ─── Directory-backed store ─────────────────────────────────────────

#[test]
fn test_directory_store_pass_writes_parts_and_manifest() {
    let temp = assert_fs::TempDir::new().unwrap();
    let parts_dir = temp.child("parts");

    let doc = parse_document(UPLOAD.as_bytes(), &elements()).unwrap();
    let store = DirectoryStore::open(parts_dir.path()).unwrap();
    let mut sink = PackageSink::new(SinkMode::XopOptimizing, store)
        .with_policy(ExternalizationPolicy::always())
        .with_cid_domain("media.example");
    let (_, report) = marshal_to_vec(&mut sink, &doc, &MarshalConfig::default()).unwrap();
    assert_eq!(report.tokens.len(), 3);
    assert!(report
        .tokens
        .iter()
        .all(|t| t.as_str().ends_with("@media.example")));

    let store = sink.into_store();
    store.write_manifest().unwrap();

    parts_dir
        .child(MANIFEST_FILE)
        .assert(predicate::str::contains("image/png"));
    let manifest: Vec<StoredPart> = serde_json::from_slice(
        &std::fs::read(parts_dir.child(MANIFEST_FILE).path()).unwrap(),
    )
    .unwrap();
    assert_eq!(manifest.len(), 3);
    for entry in &manifest {
        parts_dir.child(&entry.file).assert(predicate::path::is_file());
    }
}

// ─── One sink shared by concurrent passes ───────────────────────────

#[test]
fn test_shared_sink_across_threads() {
    let shared = SharedSink::new(
        PackageSink::new(SinkMode::XopOptimizing, MemoryStore::new())
            .with_policy(ExternalizationPolicy::always()),
    );

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let mut sink = shared.clone();
            std::thread::spawn(move || {
                let doc = parse_document(UPLOAD.as_bytes(), &elements()).unwrap();
                let (_, report) =
                    marshal_to_vec(&mut sink, &doc, &MarshalConfig::default()).unwrap();
                report.tokens
            })
        })
        .collect();

    let mut tokens = Vec::new();
    for handle in handles {
        tokens.extend(handle.join().unwrap());
    }
    let unique: std::collections::HashSet<_> = tokens.iter().collect();
    assert_eq!(tokens.len(), 12);
    assert_eq!(unique.len(), 12);
    assert_eq!(shared.with(|s| s.store().parts().len()), 12);
}
