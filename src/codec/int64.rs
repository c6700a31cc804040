// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Fixed-width 64-bit integer codec.

use super::{Codec, CodecError};

/// Maps `i64` values to a fixed 8-byte little-endian representation.
///
/// Little-endian is the native order of every targeted host; the choice is
/// fixed here so that snapshots written on one machine decode identically
/// on another. Decoding tolerates short payloads of up to 8 bytes by
/// zero-extending the missing high bytes; longer payloads are rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct I64Codec;

impl Codec<i64> for I64Codec {
    fn encode(&self, value: &i64) -> Vec<u8> {
        value.to_le_bytes().to_vec()
    }

    fn decode(&self, bytes: &[u8]) -> Result<i64, CodecError> {
        if bytes.len() > 8 {
            return Err(CodecError::PayloadTooLong { len: bytes.len() });
        }
        let mut value = 0i64;
        for (i, b) in bytes.iter().enumerate() {
            value |= (*b as i64) << (8 * i);
        }
        Ok(value)
    }
}
