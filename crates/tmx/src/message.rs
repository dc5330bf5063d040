// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Message model for the dispatch fabric.
//!
//! Defines the encoding tags understood by the router, the owned work/
//! completion items that cross the SPSC channel boundaries, and the decoded
//! [`RoutedMessage`] handed to receive handlers. Outgoing messages travel as
//! a JSON envelope (`{"header": ..., "payload": ...}`) whose payload is a
//! hex string for binary content and a plain string or JSON value otherwise.

use serde::{Deserialize, Serialize};

// =======================================================================
// Encoding tags (external bus vocabulary)
// =======================================================================

/// ASN.1 UPER, hex-encoded on the wire. Default for binary content.
pub const ENCODING_ASN1_UPER: &str = "asn.1-uper/hexstring";
/// ASN.1 BER, hex-encoded on the wire.
pub const ENCODING_ASN1_BER: &str = "asn.1-ber/hexstring";
/// Raw unencoded bytes, hex-encoded on the wire. Never run through decoders.
pub const ENCODING_BYTEARRAY: &str = "bytearray/hexstring";
/// JSON string message; may carry a full envelope or a bare payload.
pub const ENCODING_JSON: &str = "json";
/// Literal string message. Default for an empty encoding tag.
pub const ENCODING_STRING: &str = "string";
/// XML string message, treated as opaque text.
pub const ENCODING_XML: &str = "xmlstring";

/// True when the encoding tag marks hex-encoded binary content.
///
/// All binary encodings end in `hexstring` (suffix match, as the bus
/// vocabulary allows arbitrary `<codec>/hexstring` tags).
pub fn is_hex_encoded(encoding: &str) -> bool {
    !encoding.is_empty() && encoding.ends_with("hexstring")
}

// =======================================================================
// Hex codec
// =======================================================================

/// Decode a hex string into bytes. Returns None on odd length or any
/// non-hex character.
pub fn hex_decode(s: &str) -> Option<Vec<u8>> {
    let s = s.trim();
    if s.len() % 2 != 0 {
        return None;
    }

    let mut out = Vec::with_capacity(s.len() / 2);
    let bytes = s.as_bytes();
    for pair in bytes.chunks_exact(2) {
        let hi = (pair[0] as char).to_digit(16)?;
        let lo = (pair[1] as char).to_digit(16)?;
        out.push(((hi << 4) | lo) as u8);
    }
    Some(out)
}

/// Encode bytes as a lowercase hex string.
pub fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        // write! to a String cannot fail
        let _ = write!(out, "{:02x}", b);
    }
    out
}

// =======================================================================
// Channel items
// =======================================================================

/// One unit of inbound work, created at admission time.
///
/// Owned by exactly one component at a time: the producer builds it, the
/// inbound ring transfers it, the worker consumes it. The byte buffer is
/// copied from the caller at admission so the caller's buffer may be freed
/// immediately after `incoming` returns.
#[derive(Debug)]
pub struct WorkItem {
    /// Stream group identifier (0 = no sticky affinity requested).
    pub group: u8,
    /// Unique identifier within the group (0 = none).
    pub id: u8,
    /// Arrival timestamp in milliseconds, 0 if unknown.
    pub timestamp_ms: u64,
    /// Encoding tag; empty means [`ENCODING_STRING`].
    pub encoding: String,
    /// Owned payload bytes.
    pub payload: Vec<u8>,
}

/// Record a worker emits after processing one [`WorkItem`], consumed by the
/// output collector.
///
/// Invariant: every work item popped from an inbound ring produces exactly
/// one completion, even when decode fails - the collector relies on this to
/// release the affinity entry for (group, id).
#[derive(Debug)]
pub struct Completion {
    pub group: u8,
    pub id: u8,
    /// Serialized outgoing envelope to broadcast, if any. Present only for
    /// items staged by the deferred outgoing path; decode completions never
    /// carry a payload.
    pub outgoing: Option<Vec<u8>>,
}

// =======================================================================
// Routed messages
// =======================================================================

/// Message type for J2735 payloads recognized by a revision decoder.
pub const TYPE_J2735: &str = "J2735";
/// Message type for RTCM correction payloads.
pub const TYPE_RTCM: &str = "RTCM";
/// Message type when no decoder recognized the content.
pub const TYPE_UNKNOWN: &str = "Unknown";

/// Envelope header carried by every routed message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHeader {
    /// Message type, e.g. `J2735`, `RTCM` or `Unknown`.
    #[serde(rename = "type", default)]
    pub msg_type: String,
    /// Message subtype, e.g. `bsm` or `RTCM3`.
    #[serde(default)]
    pub subtype: String,
    /// Encoding tag of the original content.
    #[serde(default)]
    pub encoding: String,
    /// Timestamp in milliseconds, 0 if unknown.
    #[serde(rename = "timestamp", default)]
    pub timestamp_ms: u64,
}

/// Decoded payload representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Recognized protocol message: frame id plus the original bytes.
    /// The codec layer treats the frame contents as opaque.
    Typed { msg_id: u16, bytes: Vec<u8> },
    /// Unrecognized binary content.
    Raw(Vec<u8>),
    /// Plain (or XML) string content.
    Text(String),
    /// Structured JSON content.
    Json(serde_json::Value),
}

/// A fully decoded in-memory message, handed to the receive handler exactly
/// once and serialized to a JSON envelope for broadcast.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedMessage {
    pub header: MessageHeader,
    pub payload: Payload,
}

impl RoutedMessage {
    /// Message recognized by a protocol decoder.
    pub fn typed(
        msg_type: &str,
        subtype: &str,
        encoding: &str,
        msg_id: u16,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            header: MessageHeader {
                msg_type: msg_type.to_string(),
                subtype: subtype.to_string(),
                encoding: encoding.to_string(),
                timestamp_ms: 0,
            },
            payload: Payload::Typed { msg_id, bytes },
        }
    }

    /// Unrecognized binary content carried as-is.
    pub fn raw(encoding: &str, bytes: Vec<u8>) -> Self {
        Self {
            header: MessageHeader {
                msg_type: TYPE_UNKNOWN.to_string(),
                subtype: TYPE_UNKNOWN.to_string(),
                encoding: encoding.to_string(),
                timestamp_ms: 0,
            },
            payload: Payload::Raw(bytes),
        }
    }

    /// Plain string content.
    pub fn text(encoding: &str, contents: String) -> Self {
        Self {
            header: MessageHeader {
                msg_type: TYPE_UNKNOWN.to_string(),
                subtype: TYPE_UNKNOWN.to_string(),
                encoding: encoding.to_string(),
                timestamp_ms: 0,
            },
            payload: Payload::Text(contents),
        }
    }

    /// Opaque JSON payload (no envelope header was present).
    pub fn json(value: serde_json::Value) -> Self {
        Self {
            header: MessageHeader {
                msg_type: TYPE_UNKNOWN.to_string(),
                subtype: TYPE_UNKNOWN.to_string(),
                encoding: ENCODING_JSON.to_string(),
                timestamp_ms: 0,
            },
            payload: Payload::Json(value),
        }
    }

    /// Build the JSON envelope: `{"header": {...}, "payload": ...}`.
    ///
    /// Binary payloads are hex-encoded so the envelope is always valid UTF-8.
    pub fn to_envelope(&self) -> serde_json::Value {
        let payload = match &self.payload {
            Payload::Typed { bytes, .. } => serde_json::Value::String(hex_encode(bytes)),
            Payload::Raw(bytes) => serde_json::Value::String(hex_encode(bytes)),
            Payload::Text(s) => serde_json::Value::String(s.clone()),
            Payload::Json(v) => v.clone(),
        };

        // MessageHeader serialization cannot fail (plain strings + integer)
        let header = serde_json::to_value(&self.header)
            .unwrap_or(serde_json::Value::Null);

        serde_json::json!({ "header": header, "payload": payload })
    }

    /// Serialize the envelope to bytes for the broadcast sink.
    pub fn to_json_bytes(&self) -> Vec<u8> {
        self.to_envelope().to_string().into_bytes()
    }

    /// Parse a JSON envelope back into a routed message.
    ///
    /// Returns None when the value is not an object or the `payload` field
    /// is absent - callers treat that as "not an envelope" and fall back to
    /// an opaque JSON payload.
    pub fn from_envelope(value: &serde_json::Value) -> Option<Self> {
        let obj = value.as_object()?;
        let payload_value = obj.get("payload")?;

        let header: MessageHeader = obj
            .get("header")
            .and_then(|h| serde_json::from_value(h.clone()).ok())
            .unwrap_or(MessageHeader {
                msg_type: TYPE_UNKNOWN.to_string(),
                subtype: TYPE_UNKNOWN.to_string(),
                encoding: ENCODING_JSON.to_string(),
                timestamp_ms: 0,
            });

        let payload = match payload_value {
            serde_json::Value::String(s) => {
                if is_hex_encoded(&header.encoding) {
                    match hex_decode(s) {
                        Some(bytes) => Payload::Raw(bytes),
                        None => Payload::Text(s.clone()),
                    }
                } else {
                    Payload::Text(s.clone())
                }
            }
            other => Payload::Json(other.clone()),
        };

        Some(Self { header, payload })
    }
}
