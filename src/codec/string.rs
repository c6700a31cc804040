// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! UTF-8 string codec.

use super::{Codec, CodecError};

/// Maps `String` values to their UTF-8 bytes.
///
/// Decoding is strict: payloads that are not valid UTF-8 are rejected
/// rather than replaced with substitution characters.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringCodec;

impl Codec<String> for StringCodec {
    fn encode(&self, value: &String) -> Vec<u8> {
        value.as_bytes().to_vec()
    }

    fn decode(&self, bytes: &[u8]) -> Result<String, CodecError> {
        Ok(String::from_utf8(bytes.to_vec())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let codec = StringCodec;
        let value = "hello, snapshot".to_string();
        let bytes = codec.encode(&value);
        assert_eq!(codec.decode(&bytes).unwrap(), value);
    }

    #[test]
    fn test_empty_string() {
        let codec = StringCodec;
        let bytes = codec.encode(&String::new());
        assert!(bytes.is_empty());
        assert_eq!(codec.decode(&bytes).unwrap(), "");
    }

    #[test]
    fn test_multibyte_round_trip() {
        let codec = StringCodec;
        let value = "键值存储 🗄".to_string();
        let bytes = codec.encode(&value);
        assert_eq!(codec.decode(&bytes).unwrap(), value);
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let codec = StringCodec;
        let result = codec.decode(&[0xff, 0xfe, 0xfd]);
        assert!(matches!(result, Err(CodecError::InvalidUtf8(_))));
    }
}
