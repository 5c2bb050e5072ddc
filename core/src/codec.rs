//! Pluggable JSON encode/decode strategy.
//!
//! A `Codec` converts between wire bytes and `serde_json::Value`. Typed
//! values are produced by the client, which deserializes the decoded value
//! into the requested type. Keeping the codec on `Value` keeps the trait
//! object-safe so it can be swapped at runtime with `ApiClient::set_codec`.
//!
//! Timestamp handling lives in [`crate::time::TimeValue`]'s serde impls and
//! therefore applies under any codec that produces plain JSON values.

use serde_json::Value;

use crate::error::{DecodeError, EncodeError};

/// Converts request values to bytes and response bytes to values.
///
/// A codec controls only the byte layer and whatever rewriting it does on the
/// `Value` it returns. It cannot change the typed shape a response is decoded
/// into, nor the timestamp policy: both are fixed by the target type's serde
/// impls, applied by `ApiClient::decode_typed` after `decode` returns. A codec
/// that wants to accept another timestamp layout must rewrite those strings
/// into the wire format inside the decoded `Value`.
pub trait Codec: Send + Sync {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, EncodeError>;

    fn decode(&self, bytes: &[u8]) -> Result<Value, DecodeError>;
}

/// Compact `serde_json` encoding. An empty body decodes as `null`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, EncodeError> {
        Ok(serde_json::to_vec(value)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, DecodeError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Pretty-printed encoding, handy when wire debugging is on.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrettyJsonCodec;

impl Codec for PrettyJsonCodec {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, EncodeError> {
        Ok(serde_json::to_vec_pretty(value)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, DecodeError> {
        JsonCodec.decode(bytes)
    }
}
