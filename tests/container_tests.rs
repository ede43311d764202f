//! Integration tests for object container files.
//!
//! Files are produced with `AvroWriter` and read back through the block,
//! record and table layers, including corrupted inputs in both error modes.

use tarmac::codec::Codec;
use tarmac::error::{ReadErrorKind, ReaderError, WriterError};
use tarmac::reader::{AvroHeader, BlockReader, ReaderConfig, RecordReader, AVRO_MAGIC};
use tarmac::schema::{parse_schema, AvroSchema};
use tarmac::value::AvroValue;
use tarmac::writer::{AvroWriter, WriterConfig};

fn user_schema() -> AvroSchema {
    parse_schema(
        r#"{"type":"record","name":"User","fields":[
            {"name":"id","type":"int"},
            {"name":"name","type":"string"}
        ]}"#,
    )
    .unwrap()
}

fn user(id: i32, name: &str) -> AvroValue {
    AvroValue::record([("id", AvroValue::Int(id)), ("name", AvroValue::from(name))])
}

fn enabled_codecs() -> Vec<Codec> {
    [Codec::Null, Codec::Deflate, Codec::Zstd, Codec::Bzip2, Codec::Xz]
        .into_iter()
        .filter(Codec::is_enabled)
        .collect()
}

/// One block per value, null codec.
fn one_long_per_block(values: &[i64]) -> Vec<u8> {
    let mut writer = AvroWriter::new(Vec::new(), AvroSchema::Long, WriterConfig::new()).unwrap();
    for v in values {
        writer.append(&AvroValue::Long(*v)).unwrap();
        writer.flush_block().unwrap();
    }
    writer.close().unwrap()
}

fn header_len(schema: AvroSchema, config: WriterConfig) -> usize {
    AvroWriter::new(Vec::new(), schema, config)
        .unwrap()
        .close()
        .unwrap()
        .len()
}

// =============================================================================
// Layout
// =============================================================================

#[test]
fn test_single_record_file_layout() {
    let mut writer = AvroWriter::new(Vec::new(), user_schema(), WriterConfig::new()).unwrap();
    writer.append(&user(1, "a")).unwrap();
    let bytes = writer.close().unwrap();

    assert_eq!(&bytes[..4], &AVRO_MAGIC[..]);
    let header = AvroHeader::parse(&bytes).unwrap();
    assert!(header.get_metadata("avro.schema").is_some());
    assert_eq!(header.codec, Codec::Null);
    assert_eq!(header.schema, user_schema());
    assert_eq!(&bytes[bytes.len() - 16..], &header.sync_marker[..]);

    let mut blocks = BlockReader::new(&bytes[..]).unwrap();
    let block = blocks.next_block().unwrap().unwrap();
    assert_eq!(block.record_count, 1);
    assert!(blocks.next_block().unwrap().is_none());

    let records: Vec<_> = RecordReader::new(&bytes[..])
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(records, vec![user(1, "a")]);
}

#[test]
fn test_every_block_ends_with_the_header_sync_marker() {
    let bytes = one_long_per_block(&[1, 2, 3]);
    let header = AvroHeader::parse(&bytes).unwrap();
    let start = header.header_size as usize;
    // count, size, one payload byte, marker
    for i in 0..3 {
        let marker_at = start + i * 19 + 3;
        assert_eq!(&bytes[marker_at..marker_at + 16], &header.sync_marker[..]);
    }
    assert_eq!(bytes.len(), start + 3 * 19);
}

#[test]
fn test_sync_markers_differ_between_files() {
    let a = AvroHeader::parse(&one_long_per_block(&[])).unwrap();
    let b = AvroHeader::parse(&one_long_per_block(&[])).unwrap();
    assert_ne!(a.sync_marker, b.sync_marker);
}

#[test]
fn test_empty_file_has_no_blocks() {
    let bytes = one_long_per_block(&[]);
    let mut reader = RecordReader::new(&bytes[..]).unwrap();
    assert!(reader.next().is_none());
    assert_eq!(reader.schema(), &AvroSchema::Long);
}

#[test]
fn test_user_metadata_round_trips() {
    let config = WriterConfig::new()
        .with_metadata("origin", "unit")
        .with_metadata("blob", vec![0u8, 255]);
    let mut writer = AvroWriter::new(Vec::new(), AvroSchema::Long, config).unwrap();
    writer.append(&AvroValue::Long(9)).unwrap();
    let bytes = writer.close().unwrap();

    let header = AvroHeader::parse(&bytes).unwrap();
    assert_eq!(header.get_metadata_string("origin"), Some("unit"));
    assert_eq!(header.get_metadata("blob"), Some(&[0u8, 255][..]));
    let mut user: Vec<_> = header.user_metadata().map(|(k, _)| k.to_string()).collect();
    user.sort();
    assert_eq!(user, vec!["blob", "origin"]);
}

#[test]
fn test_reserved_metadata_key_is_rejected_before_writing() {
    let mut sink = Vec::new();
    let config = WriterConfig::new().with_metadata("avro.codec", "null");
    let result = AvroWriter::new(&mut sink, AvroSchema::Long, config);
    assert!(matches!(result, Err(WriterError::Configuration(_))));
    drop(result);
    assert!(sink.is_empty());
}

// =============================================================================
// Codecs
// =============================================================================

#[test]
fn test_round_trip_with_every_enabled_codec() {
    let records: Vec<_> = (0..500).map(|i| user(i, &format!("user-{}", i % 7))).collect();
    for codec in enabled_codecs() {
        let config = WriterConfig::new()
            .with_codec(codec)
            .with_block_size_bytes(1024);
        let mut writer = AvroWriter::new(Vec::new(), user_schema(), config).unwrap();
        for r in &records {
            writer.append(r).unwrap();
        }
        let bytes = writer.close().unwrap();

        let header = AvroHeader::parse(&bytes).unwrap();
        assert_eq!(header.codec, codec);
        if codec == Codec::Null {
            assert!(header.get_metadata("avro.codec").is_none());
        } else {
            assert_eq!(header.get_metadata_string("avro.codec"), Some(codec.name()));
        }

        let mut blocks = BlockReader::new(&bytes[..]).unwrap();
        let mut block_count = 0;
        while blocks.next_block().unwrap().is_some() {
            block_count += 1;
        }
        assert!(block_count > 1, "{} wrote a single block", codec.name());

        let decoded: Vec<_> = RecordReader::new(&bytes[..])
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(decoded, records, "codec {}", codec.name());
    }
}

#[cfg(feature = "deflate")]
#[test]
fn test_garbage_deflate_payload_is_a_codec_error() {
    let config = WriterConfig::new().with_codec(Codec::Deflate);
    let start = header_len(AvroSchema::Long, config.clone());
    let mut writer = AvroWriter::new(Vec::new(), AvroSchema::Long, config).unwrap();
    writer.append(&AvroValue::Long(1)).unwrap();
    let mut bytes = writer.close().unwrap();

    // Replace the compressed payload with a reserved block type
    let payload_len = bytes.len() - start - 2 - 16;
    for b in &mut bytes[start + 2..start + 2 + payload_len] {
        *b = 0xFF;
    }
    let results: Vec<_> = RecordReader::new(&bytes[..]).unwrap().collect();
    assert_eq!(results.len(), 1);
    assert!(matches!(results[0], Err(ReaderError::Codec(_))));
}

// =============================================================================
// Corruption
// =============================================================================

#[test]
fn test_strict_mode_reports_sync_mismatch_after_good_records() {
    let mut bytes = one_long_per_block(&[1, 2, 3, 4]);
    let start = header_len(AvroSchema::Long, WriterConfig::new());
    bytes[start + 19 + 3] ^= 0xFF;

    let mut reader = RecordReader::new(&bytes[..]).unwrap();
    assert_eq!(reader.next().unwrap().unwrap(), AvroValue::Long(1));
    assert!(matches!(
        reader.next(),
        Some(Err(ReaderError::SyncMismatch { block_index: 1, .. }))
    ));
    assert!(reader.next().is_none());
}

#[test]
fn test_skip_mode_resynchronises_on_the_next_marker() {
    let mut bytes = one_long_per_block(&[1, 2, 3, 4]);
    let start = header_len(AvroSchema::Long, WriterConfig::new());
    bytes[start + 19 + 3] ^= 0xFF;

    let mut reader =
        RecordReader::with_config(&bytes[..], ReaderConfig::new().skip_errors()).unwrap();
    let values: Vec<_> = reader.by_ref().collect::<Result<_, _>>().unwrap();
    // Block 1 is dropped; the scan lands on block 2's marker
    assert_eq!(values, vec![AvroValue::Long(1), AvroValue::Long(4)]);
    let errors = reader.into_errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, ReadErrorKind::SyncMismatch);
    assert_eq!(errors[0].block_index, 1);
}

#[test]
fn test_truncated_file_is_an_error() {
    let bytes = one_long_per_block(&[1, 2]);
    let cut = &bytes[..bytes.len() - 5];
    let results: Vec<_> = RecordReader::new(cut).unwrap().collect();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].as_ref().unwrap(), &AvroValue::Long(1));
    assert!(matches!(results[1], Err(ReaderError::TruncatedBlock { .. })));
}

#[test]
fn test_not_an_avro_file() {
    let result = RecordReader::new(&b"PAR1 definitely not avro"[..]);
    assert!(matches!(result, Err(ReaderError::InvalidMagic(_))));
}

// =============================================================================
// Schemas
// =============================================================================

#[test]
fn test_recursive_schema_round_trip() {
    let schema = parse_schema(
        r#"{"type":"record","name":"Node","fields":[
            {"name":"value","type":"long"},
            {"name":"next","type":["null","Node"]}
        ]}"#,
    )
    .unwrap();
    let list = AvroValue::record([
        ("value", AvroValue::Long(1)),
        (
            "next",
            AvroValue::Union(
                1,
                Box::new(AvroValue::record([
                    ("value", AvroValue::Long(2)),
                    ("next", AvroValue::Union(0, Box::new(AvroValue::Null))),
                ])),
            ),
        ),
    ]);

    let mut writer = AvroWriter::new(Vec::new(), schema.clone(), WriterConfig::new()).unwrap();
    writer.append(&list).unwrap();
    let bytes = writer.close().unwrap();

    let mut reader = RecordReader::new(&bytes[..]).unwrap();
    assert_eq!(reader.schema(), &schema);
    assert_eq!(reader.next().unwrap().unwrap(), list);
}

#[test]
fn test_logical_types_survive_the_container() {
    let schema = parse_schema(
        r#"{"type":"record","name":"Event","fields":[
            {"name":"at","type":{"type":"long","logicalType":"timestamp-micros"}},
            {"name":"day","type":{"type":"int","logicalType":"date"}},
            {"name":"amount","type":{"type":"bytes","logicalType":"decimal","precision":9,"scale":2}},
            {"name":"key","type":{"type":"string","logicalType":"uuid"}}
        ]}"#,
    )
    .unwrap();
    let event = AvroValue::record([
        ("at", AvroValue::TimestampMicros(1_700_000_000_000_000)),
        ("day", AvroValue::Date(19_000)),
        ("amount", AvroValue::decimal_from_i128(-12_345, 9, 2)),
        (
            "key",
            AvroValue::Uuid("67e55044-10b1-426f-9247-bb680e5fe0c8".to_string()),
        ),
    ]);

    let mut writer = AvroWriter::new(Vec::new(), schema, WriterConfig::new()).unwrap();
    writer.append(&event).unwrap();
    let bytes = writer.close().unwrap();

    let decoded = RecordReader::new(&bytes[..]).unwrap().next().unwrap().unwrap();
    assert_eq!(decoded, event);
    assert_eq!(
        decoded.field("amount").unwrap().decimal_to_string().as_deref(),
        Some("-123.45")
    );
}
