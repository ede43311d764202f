//! Compression codec support for Avro blocks
//!
//! Every block payload in an object container file is passed through the
//! codec named by the `avro.codec` header entry. Codecs other than `null`
//! are compiled in through cargo features of the same name.

use crate::error::CodecError;

#[cfg(any(
    feature = "deflate",
    feature = "zstd",
    feature = "bzip2",
    feature = "xz"
))]
use std::io::{Read, Write};

/// Compression codec used within Avro blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Codec {
    /// No compression (passthrough)
    #[default]
    Null,
    /// Raw DEFLATE (RFC 1951)
    Deflate,
    /// Zstandard compression
    Zstd,
    /// Bzip2 compression
    Bzip2,
    /// XZ/LZMA compression
    Xz,
}

impl Codec {
    /// All codecs known to this crate, enabled or not.
    pub const ALL: [Codec; 5] = [
        Codec::Null,
        Codec::Deflate,
        Codec::Zstd,
        Codec::Bzip2,
        Codec::Xz,
    ];

    /// Parse a codec from its name as found in Avro metadata.
    ///
    /// `zstandard` and `zstd` both select [`Codec::Zstd`]. Any other name,
    /// including `snappy`, is rejected.
    ///
    /// # Examples
    /// ```
    /// use tarmac::codec::Codec;
    ///
    /// assert_eq!(Codec::from_name("deflate").unwrap(), Codec::Deflate);
    /// assert!(Codec::from_name("lz4").is_err());
    /// ```
    pub fn from_name(name: &str) -> Result<Self, CodecError> {
        match name {
            "null" => Ok(Codec::Null),
            "deflate" => Ok(Codec::Deflate),
            "zstd" | "zstandard" => Ok(Codec::Zstd),
            "bzip2" => Ok(Codec::Bzip2),
            "xz" => Ok(Codec::Xz),
            unknown => Err(CodecError::UnsupportedCodec(format!(
                "Unknown codec '{}'. Supported codecs: null, deflate, zstd/zstandard, bzip2, xz",
                unknown
            ))),
        }
    }

    /// Canonical name written to the `avro.codec` header entry.
    pub fn name(&self) -> &'static str {
        match self {
            Codec::Null => "null",
            Codec::Deflate => "deflate",
            Codec::Zstd => "zstandard",
            Codec::Bzip2 => "bzip2",
            Codec::Xz => "xz",
        }
    }

    /// Whether this build can compress and decompress with the codec.
    pub fn is_enabled(&self) -> bool {
        match self {
            Codec::Null => true,
            Codec::Deflate => cfg!(feature = "deflate"),
            Codec::Zstd => cfg!(feature = "zstd"),
            Codec::Bzip2 => cfg!(feature = "bzip2"),
            Codec::Xz => cfg!(feature = "xz"),
        }
    }

    /// Fail with `UnsupportedCodec` unless the codec was compiled in.
    pub fn ensure_enabled(&self) -> Result<(), CodecError> {
        if self.is_enabled() {
            Ok(())
        } else {
            Err(disabled(*self))
        }
    }

    /// Compress a block payload.
    pub fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        match self {
            Codec::Null => Ok(data.to_vec()),
            #[cfg(feature = "deflate")]
            Codec::Deflate => deflate::compress(data),
            #[cfg(feature = "zstd")]
            Codec::Zstd => zstandard::compress(data),
            #[cfg(feature = "bzip2")]
            Codec::Bzip2 => bzip::compress(data),
            #[cfg(feature = "xz")]
            Codec::Xz => xz::compress(data),
            #[allow(unreachable_patterns)]
            other => Err(disabled(*other)),
        }
    }

    /// Decompress a block payload.
    pub fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        match self {
            Codec::Null => Ok(data.to_vec()),
            #[cfg(feature = "deflate")]
            Codec::Deflate => deflate::decompress(data),
            #[cfg(feature = "zstd")]
            Codec::Zstd => zstandard::decompress(data),
            #[cfg(feature = "bzip2")]
            Codec::Bzip2 => bzip::decompress(data),
            #[cfg(feature = "xz")]
            Codec::Xz => xz::decompress(data),
            #[allow(unreachable_patterns)]
            other => Err(disabled(*other)),
        }
    }
}

impl std::str::FromStr for Codec {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Codec::from_name(s)
    }
}

impl std::fmt::Display for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

fn disabled(codec: Codec) -> CodecError {
    CodecError::UnsupportedCodec(format!(
        "{} codec not enabled. Enable the '{}' feature.",
        codec.name(),
        match codec {
            Codec::Zstd => "zstd",
            other => other.name(),
        }
    ))
}

#[cfg(any(
    feature = "deflate",
    feature = "zstd",
    feature = "bzip2",
    feature = "xz"
))]
fn read_all<R: Read>(mut decoder: R, label: &str) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| CodecError::DecompressionError(format!("{} decompression failed: {}", label, e)))?;
    Ok(out)
}

#[cfg(any(
    feature = "deflate",
    feature = "zstd",
    feature = "bzip2",
    feature = "xz"
))]
fn compress_err(label: &str, e: std::io::Error) -> CodecError {
    CodecError::CompressionError(format!("{} compression failed: {}", label, e))
}

#[cfg(feature = "deflate")]
mod deflate {
    use super::*;
    use flate2::read::DeflateDecoder;
    use flate2::write::DeflateEncoder;
    use flate2::Compression;

    pub(super) fn compress(data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).map_err(|e| compress_err("Deflate", e))?;
        encoder.finish().map_err(|e| compress_err("Deflate", e))
    }

    pub(super) fn decompress(data: &[u8]) -> Result<Vec<u8>, CodecError> {
        if data.is_empty() {
            return Ok(Vec::new());
        }
        read_all(DeflateDecoder::new(data), "Deflate")
    }
}

#[cfg(feature = "zstd")]
mod zstandard {
    use super::*;

    const LEVEL: i32 = 3;

    pub(super) fn compress(data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut encoder =
            zstd::Encoder::new(Vec::new(), LEVEL).map_err(|e| compress_err("Zstd", e))?;
        encoder.write_all(data).map_err(|e| compress_err("Zstd", e))?;
        encoder.finish().map_err(|e| compress_err("Zstd", e))
    }

    pub(super) fn decompress(data: &[u8]) -> Result<Vec<u8>, CodecError> {
        if data.is_empty() {
            return Ok(Vec::new());
        }
        let decoder = zstd::Decoder::new(data).map_err(|e| {
            CodecError::DecompressionError(format!("Zstd decoder initialization failed: {}", e))
        })?;
        read_all(decoder, "Zstd")
    }
}

#[cfg(feature = "bzip2")]
mod bzip {
    use super::*;
    use bzip2::read::BzDecoder;
    use bzip2::write::BzEncoder;
    use bzip2::Compression;

    pub(super) fn compress(data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut encoder = BzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).map_err(|e| compress_err("Bzip2", e))?;
        encoder.finish().map_err(|e| compress_err("Bzip2", e))
    }

    pub(super) fn decompress(data: &[u8]) -> Result<Vec<u8>, CodecError> {
        if data.is_empty() {
            return Ok(Vec::new());
        }
        read_all(BzDecoder::new(data), "Bzip2")
    }
}

#[cfg(feature = "xz")]
mod xz {
    use super::*;
    use xz2::read::XzDecoder;
    use xz2::write::XzEncoder;

    const PRESET: u32 = 6;

    pub(super) fn compress(data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut encoder = XzEncoder::new(Vec::new(), PRESET);
        encoder.write_all(data).map_err(|e| compress_err("Xz", e))?;
        encoder.finish().map_err(|e| compress_err("Xz", e))
    }

    pub(super) fn decompress(data: &[u8]) -> Result<Vec<u8>, CodecError> {
        if data.is_empty() {
            return Ok(Vec::new());
        }
        read_all(XzDecoder::new(data), "Xz")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_payload() -> Vec<u8> {
        let mut data = Vec::new();
        for i in 0..500u32 {
            data.extend_from_slice(format!("record-{}|", i % 17).as_bytes());
        }
        data
    }

    #[test]
    fn test_from_name_known_codecs() {
        assert_eq!(Codec::from_name("null").unwrap(), Codec::Null);
        assert_eq!(Codec::from_name("deflate").unwrap(), Codec::Deflate);
        assert_eq!(Codec::from_name("bzip2").unwrap(), Codec::Bzip2);
        assert_eq!(Codec::from_name("xz").unwrap(), Codec::Xz);
    }

    #[test]
    fn test_from_name_zstd_aliases() {
        assert_eq!(Codec::from_name("zstd").unwrap(), Codec::Zstd);
        assert_eq!(Codec::from_name("zstandard").unwrap(), Codec::Zstd);
    }

    #[test]
    fn test_from_name_rejects_snappy() {
        let err = Codec::from_name("snappy").unwrap_err();
        assert!(matches!(err, CodecError::UnsupportedCodec(_)));
        assert!(err.to_string().contains("snappy"));
    }

    #[test]
    fn test_from_name_is_case_sensitive() {
        assert!(Codec::from_name("NULL").is_err());
        assert!(Codec::from_name("").is_err());
    }

    #[test]
    fn test_name_round_trips_through_from_name() {
        for codec in Codec::ALL {
            assert_eq!(Codec::from_name(codec.name()).unwrap(), codec);
        }
    }

    #[test]
    fn test_default_is_null() {
        assert_eq!(Codec::default(), Codec::Null);
        assert_eq!(Codec::default().to_string(), "null");
    }

    #[test]
    fn test_parse_via_from_str() {
        let codec: Codec = "xz".parse().unwrap();
        assert_eq!(codec, Codec::Xz);
    }

    #[test]
    fn test_null_is_passthrough() {
        let data = b"untouched".to_vec();
        assert_eq!(Codec::Null.compress(&data).unwrap(), data);
        assert_eq!(Codec::Null.decompress(&data).unwrap(), data);
    }

    #[test]
    fn test_enabled_codecs_round_trip() {
        let data = sample_payload();
        for codec in Codec::ALL.into_iter().filter(Codec::is_enabled) {
            let compressed = codec.compress(&data).unwrap();
            let restored = codec.decompress(&compressed).unwrap();
            assert_eq!(restored, data, "round trip failed for {}", codec);
        }
    }

    #[test]
    fn test_enabled_codecs_handle_empty_payload() {
        for codec in Codec::ALL.into_iter().filter(Codec::is_enabled) {
            let compressed = codec.compress(&[]).unwrap();
            assert!(codec.decompress(&compressed).unwrap().is_empty());
            assert!(codec.decompress(&[]).unwrap().is_empty());
        }
    }

    #[cfg(feature = "deflate")]
    mod deflate_tests {
        use super::*;

        #[test]
        fn test_deflate_shrinks_repetitive_data() {
            let data = sample_payload();
            let compressed = Codec::Deflate.compress(&data).unwrap();
            assert!(compressed.len() < data.len());
        }

        #[test]
        fn test_deflate_rejects_garbage() {
            let result = Codec::Deflate.decompress(&[0xFF, 0xFF, 0xFF, 0xFF]);
            assert!(matches!(result, Err(CodecError::DecompressionError(_))));
        }
    }

    #[cfg(feature = "zstd")]
    mod zstd_tests {
        use super::*;

        #[test]
        fn test_zstd_frame_magic() {
            let compressed = Codec::Zstd.compress(b"hello").unwrap();
            assert_eq!(&compressed[..4], &[0x28, 0xB5, 0x2F, 0xFD]);
        }

        #[test]
        fn test_zstd_rejects_garbage() {
            let result = Codec::Zstd.decompress(b"not a zstd frame");
            assert!(matches!(result, Err(CodecError::DecompressionError(_))));
        }
    }

    #[cfg(feature = "bzip2")]
    mod bzip2_tests {
        use super::*;

        #[test]
        fn test_bzip2_stream_header() {
            let compressed = Codec::Bzip2.compress(b"hello").unwrap();
            assert_eq!(&compressed[..3], b"BZh");
        }

        #[test]
        fn test_bzip2_rejects_garbage() {
            let result = Codec::Bzip2.decompress(b"BZh9 definitely not bzip2");
            assert!(matches!(result, Err(CodecError::DecompressionError(_))));
        }
    }

    #[cfg(feature = "xz")]
    mod xz_tests {
        use super::*;

        #[test]
        fn test_xz_stream_header() {
            let compressed = Codec::Xz.compress(b"hello").unwrap();
            assert_eq!(&compressed[..6], &[0xFD, b'7', b'z', b'X', b'Z', 0x00]);
        }

        #[test]
        fn test_xz_rejects_garbage() {
            let result = Codec::Xz.decompress(b"not xz data at all");
            assert!(matches!(result, Err(CodecError::DecompressionError(_))));
        }
    }
}
