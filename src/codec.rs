//! Wire Decoder: hub payloads arrive as base64-encoded, raw-DEFLATE-compressed
//! UTF-8 text. This is the same encoding observed on SignalR hubs that push
//! compressed order-book deltas (e.g. Bittrex's `uE`/`QE` methods), so the
//! decode step is a single pure function with no state of its own.

use std::io::Read;

use flate2::read::DeflateDecoder;

pub type Result<T> = std::result::Result<T, DecodeError>;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid deflate stream: {0}")]
    Inflate(#[from] std::io::Error),

    #[error("decoded payload is not valid utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Decodes a hub wire payload: base64 decode, then raw DEFLATE inflate
/// (no zlib/gzip header), then UTF-8 decode.
pub fn decode(wire: &str) -> Result<String> {
    use base64::Engine;

    let compressed = base64::engine::general_purpose::STANDARD.decode(wire)?;

    let mut decoder = DeflateDecoder::new(&compressed[..]);
    let mut decoded = Vec::new();
    decoder.read_to_end(&mut decoded)?;

    Ok(String::from_utf8(decoded)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn deflate(text: &str) -> String {
        use base64::Engine;
        let mut encoder = flate2::write::DeflateEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        let compressed = encoder.finish().unwrap();
        base64::engine::general_purpose::STANDARD.encode(compressed)
    }

    #[test]
    fn decode_round_trips_through_base64_and_deflate() {
        let wire = deflate(r#"{"x":1}"#);
        assert_eq!(decode(&wire).unwrap(), r#"{"x":1}"#);
    }

    #[test]
    fn malformed_base64_raises_decode_error() {
        let err = decode("not-valid-base64!!!").unwrap_err();
        assert!(matches!(err, DecodeError::Base64(_)));
    }

    #[test]
    fn valid_base64_but_non_deflate_bytes_raises_inflate_error() {
        use base64::Engine;
        // 0xFF's low 3 bits (BFINAL=1, BTYPE=0b11) select the reserved DEFLATE
        // block type, which is rejected immediately by any conforming inflater.
        let wire = base64::engine::general_purpose::STANDARD.encode([0xFFu8; 8]);
        let err = decode(&wire).unwrap_err();
        assert!(matches!(err, DecodeError::Inflate(_)));
    }
}
