//! Entity stream decoder benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use entistream_bench::{stream, uncompressed_stream};
use entistream_codec::{parse_entities, EntityStreamParser, Expander, NamespaceRegistry};

/// Benchmark decoding whole streams of various sizes.
fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    for count in [10usize, 100, 1000].iter() {
        let bytes = stream(*count, 4);
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(BenchmarkId::new("entities", count), &bytes, |b, bytes| {
            b.iter(|| {
                let entities = parse_entities(black_box(bytes)).unwrap();
                black_box(entities);
            });
        });
    }

    // Wide entities
    let bytes = stream(100, 32);
    group.throughput(Throughput::Bytes(bytes.len() as u64));
    group.bench_function("wide_props_32", |b| {
        b.iter(|| {
            let entities = parse_entities(black_box(&bytes)).unwrap();
            black_box(entities);
        });
    });

    group.finish();
}

/// Benchmark decoding with a callback instead of collecting.
fn bench_streaming(c: &mut Criterion) {
    let mut group = c.benchmark_group("stream");

    let bytes = stream(1000, 4);
    group.throughput(Throughput::Elements(1000));
    group.bench_function("count_only", |b| {
        b.iter(|| {
            let mut parser = EntityStreamParser::new();
            let mut count = 0usize;
            parser
                .parse_stream(black_box(bytes.as_slice()), |_| {
                    count += 1;
                    Ok::<_, entistream_codec::CodecError>(())
                })
                .unwrap();
            black_box(count);
        });
    });

    let bytes = uncompressed_stream(1000);
    group.bench_function("compress_full_uris", |b| {
        b.iter(|| {
            let entities = parse_entities(black_box(&bytes)).unwrap();
            black_box(entities);
        });
    });

    group.finish();
}

/// Benchmark namespace compression and expansion.
fn bench_namespaces(c: &mut Criterion) {
    let mut group = c.benchmark_group("namespaces");

    let uris: Vec<String> = (0..1000)
        .map(|i| format!("http://data.example.io/ns{}/item-{i}", i % 32))
        .collect();

    group.bench_function("compress_1000", |b| {
        b.iter(|| {
            let mut registry = NamespaceRegistry::new();
            for uri in &uris {
                black_box(registry.compress(black_box(uri)).unwrap());
            }
        });
    });

    let mut registry = NamespaceRegistry::new();
    let compressed: Vec<String> = uris.iter().map(|u| registry.compress(u).unwrap()).collect();
    let expander = Expander::new(registry.to_map());
    group.bench_function("expand_1000", |b| {
        b.iter(|| {
            for id in &compressed {
                black_box(expander.expand_str(black_box(id)));
            }
        });
    });

    group.finish();
}

criterion_group!(benches, bench_decode, bench_streaming, bench_namespaces);
criterion_main!(benches);
