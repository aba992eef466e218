use criterion::{criterion_group, criterion_main, Criterion};

use xopack::attachment::policy::ExternalizationPolicy;
use xopack::attachment::{NoopSink, PackageSink, SinkMode};
use xopack::config::{MarshalConfig, PackageConfig};
use xopack::marshal::marshal_to_vec;
use xopack::model::document::{BinaryField, Document, Element, QName};
use xopack::package::{write_package, Package};
use xopack::store::MemoryStore;

fn sample_document() -> Document {
    let root = (0..64u32).fold(Element::new(QName::new("urn:bench", "batch")), |root, i| {
        root.with_child(
            Element::new(QName::new("urn:bench", "item"))
                .with_attribute(QName::local("id"), i.to_string())
                .with_binary(BinaryField::new(vec![(i % 251) as u8; 16 * 1024])),
        )
    });
    Document::new(root)
}

fn bench_marshal_inline(c: &mut Criterion) {
    let doc = sample_document();
    let config = MarshalConfig::default();

    c.bench_function("marshal_inline_1mb", |b| {
        b.iter(|| marshal_to_vec(&mut NoopSink::new(), &doc, &config).unwrap())
    });
}

fn bench_marshal_xop(c: &mut Criterion) {
    let doc = sample_document();
    let config = MarshalConfig::default();

    c.bench_function("marshal_xop_1mb", |b| {
        b.iter(|| {
            let mut sink = PackageSink::new(SinkMode::XopOptimizing, MemoryStore::new())
                .with_policy(ExternalizationPolicy::always());
            marshal_to_vec(&mut sink, &doc, &config).unwrap()
        })
    });
}

fn bench_package_roundtrip(c: &mut Criterion) {
    let doc = sample_document();
    let mut sink = PackageSink::new(SinkMode::XopOptimizing, MemoryStore::new())
        .with_policy(ExternalizationPolicy::always());
    let (xml, report) = marshal_to_vec(&mut sink, &doc, &MarshalConfig::default()).unwrap();
    let parts = sink.into_store().into_parts();

    c.bench_function("package_write_parse_1mb", |b| {
        b.iter(|| {
            let mut raw = Vec::new();
            write_package(&xml, &report, &parts, &PackageConfig::default(), &mut raw).unwrap();
            Package::parse(&raw).unwrap().parts.len()
        })
    });
}

criterion_group!(
    benches,
    bench_marshal_inline,
    bench_marshal_xop,
    bench_package_roundtrip
);
criterion_main!(benches);
