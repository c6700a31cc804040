// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Codec error types.

/// Errors that can occur while decoding a byte payload.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("payload is not valid utf-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("integer payload too long: {len} bytes (max 8)")]
    PayloadTooLong { len: usize },
}
