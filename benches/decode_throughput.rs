//! Benchmarks for the per-frame hot path
//!
//! Run with: cargo bench

use canlog_rs::config::LogFormat;
use canlog_rs::schema::{Schema, SchemaDecoder};
use canlog_rs::session::format::encode_line;
use canlog_rs::types::RawFrame;
use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;

const SCHEMA: &str = r#"
    [[messages]]
    id = 0x521
    name = "Result_I"
    dlc = 6

    [[messages.signals]]
    name = "mux_id"
    start_bit = 7
    length = 8
    byte_order = "big_endian"
    choices = { "0" = "Current" }

    [[messages.signals]]
    name = "counter"
    start_bit = 8
    length = 4

    [[messages.signals]]
    name = "current"
    start_bit = 23
    length = 32
    byte_order = "big_endian"
    signed = true
    scale = 0.001
"#;

fn decoder() -> SchemaDecoder {
    SchemaDecoder::new(Arc::new(
        Schema::from_toml_str(SCHEMA).expect("bench schema"),
    ))
}

fn frames(count: usize) -> Vec<RawFrame> {
    (0..count)
        .map(|i| {
            let mut payload = vec![0x00, (i % 16) as u8];
            payload.extend_from_slice(&(i as i32 - 5000).to_be_bytes());
            RawFrame::new(0x521, &payload)
        })
        .collect()
}

fn bench_decode(c: &mut Criterion) {
    let decoder = decoder();
    let mut group = c.benchmark_group("decode");

    for size in [1usize, 100, 1000].iter() {
        let batch = frames(*size);
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &batch, |b, batch| {
            b.iter(|| {
                let ts = Utc::now();
                for frame in batch {
                    black_box(decoder.decode(black_box(frame), ts).ok());
                }
            });
        });
    }

    group.bench_function("unknown_identifier", |b| {
        let frame = RawFrame::new(0x7FF, &[0; 8]);
        b.iter(|| black_box(decoder.decode(black_box(&frame), Utc::now()).is_err()));
    });

    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let decoder = decoder();
    let record = decoder
        .decode(&frames(1)[0], Utc::now())
        .expect("bench frame decodes");
    let mut group = c.benchmark_group("encode_line");

    group.bench_function("key_value", |b| {
        b.iter(|| black_box(encode_line(LogFormat::KeyValue, black_box(&record))));
    });
    group.bench_function("json_lines", |b| {
        b.iter(|| black_box(encode_line(LogFormat::JsonLines, black_box(&record))));
    });

    group.finish();
}

criterion_group!(benches, bench_decode, bench_encode);
criterion_main!(benches);
