//! Container header serialization

use crate::codec::Codec;
use crate::reader::header::{AVRO_MAGIC, CODEC_KEY, SCHEMA_KEY};
use crate::reader::varint::write_zigzag;
use crate::schema::AvroSchema;

/// Serialize a container header.
///
/// Entries are written as one metadata block in this order: `avro.schema`,
/// `avro.codec` (only when not null), then `metadata` as given.
pub fn encode_header(
    schema: &AvroSchema,
    codec: Codec,
    metadata: &[(String, Vec<u8>)],
    sync_marker: &[u8; 16],
) -> Vec<u8> {
    let schema_json = schema.to_json();
    let mut entries: Vec<(&str, &[u8])> = vec![(SCHEMA_KEY, schema_json.as_bytes())];
    if codec != Codec::Null {
        entries.push((CODEC_KEY, codec.name().as_bytes()));
    }
    entries.extend(metadata.iter().map(|(k, v)| (k.as_str(), v.as_slice())));

    let mut out = Vec::with_capacity(64 + schema_json.len());
    out.extend_from_slice(&AVRO_MAGIC);
    write_zigzag(&mut out, entries.len() as i64);
    for (key, value) in entries {
        write_zigzag(&mut out, key.len() as i64);
        out.extend_from_slice(key.as_bytes());
        write_zigzag(&mut out, value.len() as i64);
        out.extend_from_slice(value);
    }
    out.push(0);
    out.extend_from_slice(sync_marker);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::header::AvroHeader;

    #[test]
    fn test_header_round_trip() {
        let schema = AvroSchema::Array(Box::new(AvroSchema::String));
        let metadata = vec![("origin".to_string(), b"unit".to_vec())];
        let bytes = encode_header(&schema, Codec::Null, &metadata, &[9; 16]);

        let header = AvroHeader::parse(&bytes).unwrap();
        assert_eq!(header.schema, schema);
        assert_eq!(header.codec, Codec::Null);
        assert_eq!(header.sync_marker, [9; 16]);
        assert_eq!(header.get_metadata("origin"), Some(&b"unit"[..]));
        assert!(header.get_metadata("avro.codec").is_none());
    }

    #[test]
    fn test_schema_entry_comes_first() {
        let bytes = encode_header(&AvroSchema::Int, Codec::Null, &[], &[0; 16]);
        // magic, one entry, key length 11
        assert_eq!(&bytes[..6], &[b'O', b'b', b'j', 1, 0x02, 0x16]);
        assert_eq!(&bytes[6..17], b"avro.schema");
    }

    #[cfg(feature = "deflate")]
    #[test]
    fn test_codec_entry_written_when_not_null() {
        let bytes = encode_header(&AvroSchema::Int, Codec::Deflate, &[], &[0; 16]);
        let header = AvroHeader::parse(&bytes).unwrap();
        assert_eq!(header.get_metadata_string("avro.codec"), Some("deflate"));
        assert_eq!(header.codec, Codec::Deflate);
    }
}
