//! # PulseDB Codec
//!
//! CBOR encoding of typed document bodies for PulseDB.
//!
//! Stores treat document bodies as opaque bytes. This crate turns any
//! `serde` type into those bytes and back, so the typed document model
//! round-trips through every store without an untyped intermediate.
//!
//! ## Usage
//!
//! ```
//! use pulsedb_codec::{decode, encode};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, PartialEq, Serialize, Deserialize)]
//! struct Beat {
//!     serial: String,
//!     uptime: u64,
//! }
//!
//! let beat = Beat { serial: "A1".into(), uptime: 42 };
//! let bytes = encode(&beat).unwrap();
//! let decoded: Beat = decode(&bytes).unwrap();
//! assert_eq!(beat, decoded);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;

pub use error::{CodecError, CodecResult};

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes `value` to CBOR bytes.
///
/// # Errors
///
/// Returns `EncodingFailed` if `value` cannot be serialized.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> CodecResult<Bytes> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(value, &mut buf)
        .map_err(|err| CodecError::encoding_failed(err.to_string()))?;
    Ok(Bytes::from(buf))
}

/// Decodes a value of type `T` from CBOR bytes.
///
/// # Errors
///
/// Returns `Empty` for an empty buffer and `DecodingFailed` if the bytes
/// are not a valid encoding of `T`.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<T> {
    if bytes.is_empty() {
        return Err(CodecError::Empty);
    }
    ciborium::de::from_reader(bytes).map_err(|err| CodecError::decoding_failed(err.to_string()))
}
