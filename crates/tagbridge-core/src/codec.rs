//! Byte sequence ↔ lowercase hex string codec.
//!
//! Every memory bank, select mask, tag command and tag response crosses the
//! caller boundary as hex text. Encoding always yields lowercase; decoding
//! accepts either case.

use crate::error::CoreError;

/// Encode bytes as lowercase hex.
pub fn to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Encode an optional byte sequence. Absent input stays absent.
pub fn encode_hex(bytes: Option<&[u8]>) -> Option<String> {
    bytes.map(to_hex)
}

/// Decode a hex string into bytes.
///
/// Fails with [`CoreError::MalformedEncoding`] on odd length or on any
/// character outside `[0-9a-fA-F]`.
pub fn decode_hex(s: &str) -> Result<Vec<u8>, CoreError> {
    hex::decode(s).map_err(|e| CoreError::malformed(format!("{e} in \"{s}\"")))
}

/// Decode optional hex text; absent or empty text decodes to `None`.
pub fn decode_optional_hex(s: Option<&str>) -> Result<Option<Vec<u8>>, CoreError> {
    match s {
        None | Some("") => Ok(None),
        Some(text) => decode_hex(text).map(Some),
    }
}
