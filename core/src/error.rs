//! Error types for the Argo API client.
//!
//! # Design
//! Failures fall into four disjoint kinds. `Transport` means no response was
//! received at all. `Api` means the server answered with a status the
//! operation did not expect; it carries the full response for debugging.
//! `Decode` covers bodies that do not match the expected shape, including
//! malformed timestamps. `Encode` covers request payloads that could not be
//! turned into bytes. Nothing is retried.

use std::fmt;

use thiserror::Error;

/// Top-level error returned by `ApiClient` and `WorkflowApi` operations.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Encode(#[from] EncodeError),
}

impl ClientError {
    /// The HTTP status, when the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api(e) => Some(e.status),
            _ => None,
        }
    }
}

/// Broad classification of a network-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Connection refused, host not found, or similar.
    Connect,
    Tls,
    Timeout,
    /// The response body was larger than the endpoint allows.
    BodyTooLarge,
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransportErrorKind::Connect => "connection failed",
            TransportErrorKind::Tls => "tls failure",
            TransportErrorKind::Timeout => "timed out",
            TransportErrorKind::BodyTooLarge => "response body too large",
            TransportErrorKind::Other => "transport failure",
        };
        f.write_str(s)
    }
}

/// No HTTP response was received.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// The server responded with a status other than the one expected.
#[derive(Debug, Error)]
#[error("unexpected HTTP status {status} (expected {expected}): {}", String::from_utf8_lossy(.body))]
pub struct ApiError {
    pub status: u16,
    pub expected: u16,
    pub body: Vec<u8>,
    pub headers: Vec<(String, String)>,
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// The response body (or a value inside it) did not match the expected shape.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid JSON body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid timestamp {input:?}: {reason}")]
    TimestampShape { input: String, reason: &'static str },

    #[error("invalid timestamp {input:?}: {source}")]
    Timestamp {
        input: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("timestamp {input:?} is out of range")]
    TimestampOutOfRange { input: String },
}

/// A request payload could not be encoded.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("failed to serialize request body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("request body must be a JSON object to carry type metadata, got {found}")]
    NotAnObject { found: &'static str },

    #[error("timestamp of {nanos}ns is outside the representable date range")]
    TimestampOutOfRange { nanos: i64 },
}
