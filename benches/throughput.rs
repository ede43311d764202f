//! Benchmark suite for encode/decode and container throughput
//!
//! This benchmark measures:
//! - Single-value encoding and decoding of a nested record
//! - Container write and read throughput per codec
//! - Container write throughput per block size
//!
//! # Configuration
//!
//! Benchmark behavior can be configured via environment variables:
//!
//! - `BENCH_SAMPLE_SIZE`: Number of samples to collect (default: 100)
//! - `BENCH_MEASUREMENT_TIME`: Measurement time in seconds (default: 5)
//! - `BENCH_RECORDS`: Records per container file (default: 50000)
//!
//! # Examples
//!
//! ```bash
//! BENCH_SAMPLE_SIZE=20 BENCH_RECORDS=10000 cargo bench
//! ```

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::time::Duration;

use tarmac::api::{from_bytes, to_bytes};
use tarmac::{parse_schema, AvroSchema, AvroValue, AvroWriter, Codec, RecordReader, WriterConfig};

const SCHEMA: &str = r#"{
    "type": "record",
    "name": "Reading",
    "fields": [
        {"name": "station", "type": "string"},
        {"name": "time", "type": {"type": "long", "logicalType": "timestamp-millis"}},
        {"name": "temp", "type": "double"},
        {"name": "flags", "type": {"type": "array", "items": "int"}},
        {"name": "note", "type": ["null", "string"], "default": null}
    ]
}"#;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            eprintln!("Warning: Invalid {} value: {}", key, raw);
            default
        }),
        Err(_) => default,
    }
}

/// Configure Criterion based on environment variables
fn configure_criterion() -> Criterion {
    Criterion::default()
        .sample_size(env_or("BENCH_SAMPLE_SIZE", 100))
        .measurement_time(Duration::from_secs(env_or("BENCH_MEASUREMENT_TIME", 5)))
}

fn schema() -> AvroSchema {
    parse_schema(SCHEMA).unwrap()
}

fn reading(i: i64) -> AvroValue {
    let note = if i % 3 == 0 {
        AvroValue::Null
    } else {
        AvroValue::from(format!("note {}", i))
    };
    AvroValue::record([
        ("station", AvroValue::from(format!("station-{}", i % 97))),
        ("time", AvroValue::TimestampMillis(1_600_000_000_000 + i * 1_000)),
        ("temp", AvroValue::Double(15.0 + (i % 200) as f64 / 10.0)),
        (
            "flags",
            AvroValue::Array((0..(i % 4) as i32).map(AvroValue::Int).collect()),
        ),
        ("note", note),
    ])
}

fn write_file(records: &[AvroValue], codec: Codec, block_size: Option<usize>) -> Vec<u8> {
    let mut config = WriterConfig::new().with_codec(codec);
    if let Some(bytes) = block_size {
        config = config.with_block_size_bytes(bytes);
    }
    let mut writer = AvroWriter::new(Vec::new(), schema(), config).unwrap();
    writer.append_block(records).unwrap();
    writer.close().unwrap()
}

fn enabled_codecs() -> Vec<Codec> {
    [Codec::Null, Codec::Deflate, Codec::Zstd, Codec::Bzip2, Codec::Xz]
        .into_iter()
        .filter(Codec::is_enabled)
        .collect()
}

/// Benchmark encoding and decoding a single record
fn bench_value_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("value_codec");
    let schema = schema();
    let value = reading(7);
    let bytes = to_bytes(&value, &schema).unwrap();
    group.throughput(Throughput::Bytes(bytes.len() as u64));

    group.bench_function("encode", |b| {
        b.iter(|| to_bytes(black_box(&value), &schema).unwrap())
    });
    group.bench_function("decode", |b| {
        b.iter(|| from_bytes(black_box(&bytes), &schema).unwrap())
    });
    group.finish();
}

/// Benchmark container write and read with different codecs
fn bench_codecs(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec_throughput");
    let count = env_or("BENCH_RECORDS", 50_000i64);
    let records: Vec<_> = (0..count).map(reading).collect();
    group.throughput(Throughput::Elements(records.len() as u64));

    for codec in enabled_codecs() {
        let file = write_file(&records, codec, Some(64 * 1024));

        group.bench_with_input(BenchmarkId::new("write", codec.name()), &codec, |b, &codec| {
            b.iter(|| write_file(&records, codec, Some(64 * 1024)))
        });
        group.bench_with_input(BenchmarkId::new("read", codec.name()), &file, |b, file| {
            b.iter(|| {
                let reader = RecordReader::new(&file[..]).unwrap();
                reader.map(|r| black_box(r.unwrap())).count()
            })
        });
    }
    group.finish();
}

/// Benchmark container writes with different block sizes
fn bench_block_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("block_size_throughput");
    let count = env_or("BENCH_RECORDS", 50_000i64);
    let records: Vec<_> = (0..count).map(reading).collect();
    group.throughput(Throughput::Elements(records.len() as u64));

    for block_size in [4 * 1024, 64 * 1024, 1024 * 1024] {
        group.bench_with_input(
            BenchmarkId::new("write", block_size),
            &block_size,
            |b, &block_size| b.iter(|| write_file(&records, Codec::Null, Some(block_size))),
        );
    }
    group.finish();
}

criterion_group! {
    name = benches;
    config = configure_criterion();
    targets = bench_value_codec, bench_codecs, bench_block_sizes
}

criterion_main!(benches);
