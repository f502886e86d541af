// ABOUTME: Parser for base64 `data:` URIs embedded in event payloads
// ABOUTME: Splits the media type from the payload and decodes the bytes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use relay_core::constants::sanitizer::DEFAULT_MEDIA_TYPE;

const DATA_SCHEME: &str = "data:";

/// A decoded `data:` URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedDataUri {
    /// Media type declared before the `;base64` marker
    pub media_type: String,
    /// Decoded payload
    pub bytes: Vec<u8>,
}

/// Cheap prefix check, no decoding
#[must_use]
pub fn is_data_uri(value: &str) -> bool {
    let trimmed = value.trim_start();
    trimmed
        .get(..DATA_SCHEME.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(DATA_SCHEME))
}

/// Split a base64 `data:` URI into media type and encoded payload.
///
/// Returns `None` for anything that is not a `data:` URI or that does not
/// carry the `;base64` marker. Percent-encoded data URIs are not handled.
#[must_use]
pub fn split_base64_data_uri(value: &str) -> Option<(&str, &str)> {
    let trimmed = value.trim();
    if !is_data_uri(trimmed) {
        return None;
    }
    let (header, payload) = trimmed.get(DATA_SCHEME.len()..)?.split_once(',')?;

    let mut params = header.split(';');
    let media_type = params.next().unwrap_or_default().trim();
    if !params.any(|param| param.trim().eq_ignore_ascii_case("base64")) {
        return None;
    }

    Some((media_type, payload.trim()))
}

/// Decode a base64 `data:` URI.
///
/// An empty media type falls back to `application/octet-stream`. Invalid base64
/// or an empty payload yields `None`.
#[must_use]
pub fn decode_data_uri(value: &str) -> Option<DecodedDataUri> {
    let (media_type, payload) = split_base64_data_uri(value)?;
    let bytes = STANDARD.decode(payload).ok()?;
    if bytes.is_empty() {
        return None;
    }
    let media_type = if media_type.is_empty() {
        DEFAULT_MEDIA_TYPE.to_owned()
    } else {
        media_type.to_owned()
    };
    Some(DecodedDataUri { media_type, bytes })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_plain_text() {
        let decoded = decode_data_uri("data:text/plain;base64,aGVsbG8=").unwrap();
        assert_eq!(decoded.media_type, "text/plain");
        assert_eq!(decoded.bytes, b"hello");
    }

    #[test]
    fn test_media_type_parameters_are_skipped() {
        let decoded = decode_data_uri("data:text/html;charset=utf-8;base64,PGI+aGk8L2I+").unwrap();
        assert_eq!(decoded.media_type, "text/html");
        assert_eq!(decoded.bytes, b"<b>hi</b>");
    }

    #[test]
    fn test_missing_media_type_defaults() {
        let decoded = decode_data_uri("data:;base64,AAEC").unwrap();
        assert_eq!(decoded.media_type, DEFAULT_MEDIA_TYPE);
    }

    #[test]
    fn test_non_base64_rejected() {
        assert!(decode_data_uri("data:text/plain,hello").is_none());
        assert!(decode_data_uri("https://example.com/a.png").is_none());
        assert!(decode_data_uri("data:text/plain;base64,!!!").is_none());
        assert!(decode_data_uri("data:text/plain;base64,").is_none());
    }

    #[test]
    fn test_scheme_is_case_insensitive() {
        assert!(is_data_uri("DATA:image/png;base64,AA=="));
        assert!(!is_data_uri("dat"));
    }
}
