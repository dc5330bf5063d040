// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Protocol decoder registry.
//!
//! Binary payloads are offered to an ordered list of decoders, newest
//! protocol revision first, until one recognizes the byte preamble. The
//! actual ASN.1 frame contents stay opaque - a decoder only validates the
//! frame shape and tags the message so downstream handlers know what they
//! got. A panicking decoder is contained and skipped; it never kills the
//! worker thread.

mod j2735;
mod rtcm;

pub use j2735::{J2735Decoder, J2735Revision};
pub use rtcm::RtcmDecoder;

use crate::message::RoutedMessage;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Capability to recognize one protocol family from a byte preamble.
///
/// # Thread Safety
/// Implementations must be Send + Sync: `try_decode` is invoked from worker
/// threads.
pub trait ProtocolDecoder: Send + Sync {
    /// Decoder name for logs, e.g. `J2735_R2016`.
    fn name(&self) -> &str;

    /// Attempt to recognize `bytes`. Returns None when the preamble does not
    /// match this protocol; the registry then tries the next (older) decoder.
    fn try_decode(&self, bytes: &[u8]) -> Option<RoutedMessage>;
}

/// Ordered decoder list, tried newest-to-oldest.
pub struct DecoderRegistry {
    decoders: Vec<Box<dyn ProtocolDecoder>>,
}

impl DecoderRegistry {
    /// Empty registry (binary content always falls back to raw bytes).
    pub fn new() -> Self {
        Self {
            decoders: Vec::new(),
        }
    }

    /// Registry with the built-in decoders: J2735 revisions newest first,
    /// then RTCM.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(J2735Decoder::new(J2735Revision::R2016)));
        registry.register(Box::new(J2735Decoder::new(J2735Revision::R63)));
        registry.register(Box::new(J2735Decoder::new(J2735Revision::R41)));
        registry.register(Box::new(RtcmDecoder::new()));
        registry
    }

    /// Append a decoder at the end of the fallback order.
    pub fn register(&mut self, decoder: Box<dyn ProtocolDecoder>) {
        self.decoders.push(decoder);
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// Offer `bytes` to each decoder in order; first match wins.
    ///
    /// A panic inside a decoder is caught, logged, and treated as "no
    /// match" so one buggy decoder cannot take down a worker.
    pub fn decode(&self, bytes: &[u8]) -> Option<RoutedMessage> {
        for decoder in &self.decoders {
            match catch_unwind(AssertUnwindSafe(|| decoder.try_decode(bytes))) {
                Ok(Some(msg)) => {
                    log::debug!(
                        "[Codec] {} recognized {} bytes as {}/{}",
                        decoder.name(),
                        bytes.len(),
                        msg.header.msg_type,
                        msg.header.subtype
                    );
                    return Some(msg);
                }
                Ok(None) => {}
                Err(_) => {
                    log::warn!(
                        "[Codec] decoder {} panicked on {} byte payload, skipping",
                        decoder.name(),
                        bytes.len()
                    );
                }
            }
        }
        None
    }
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Payload, TYPE_J2735, TYPE_RTCM};

    struct PanickingDecoder;

    impl ProtocolDecoder for PanickingDecoder {
        fn name(&self) -> &str {
            "panicking"
        }

        fn try_decode(&self, _bytes: &[u8]) -> Option<RoutedMessage> {
            panic!("intentional test panic");
        }
    }

    #[test]
    fn test_defaults_recognize_bsm_frame() {
        let registry = DecoderRegistry::with_defaults();
        // 0x0014 = basicSafetyMessage in the 2016 numbering
        let bytes = vec![0x00, 0x14, 0x25, 0x1d, 0x59, 0x02];

        let msg = registry.decode(&bytes).expect("BSM frame should decode");
        assert_eq!(msg.header.msg_type, TYPE_J2735);
        assert_eq!(msg.header.subtype, "basicSafetyMessage");
        assert!(matches!(msg.payload, Payload::Typed { msg_id: 20, .. }));
    }

    #[test]
    fn test_newest_revision_wins() {
        let registry = DecoderRegistry::with_defaults();
        // Frame id 18 (mapData) is valid in both R63 and R2016; the listed
        // order must attribute it to the newest revision.
        let bytes = vec![0x00, 0x12, 0x10, 0x20];

        let msg = registry.decode(&bytes).expect("MAP frame should decode");
        assert_eq!(
            msg.header.subtype, "mapData",
            "subtype comes from the frame id"
        );
    }

    #[test]
    fn test_rtcm_preamble() {
        let registry = DecoderRegistry::with_defaults();
        // RTCM3 preamble 0xD3, 6-bit reserved zero, then message number 1005
        let bytes = vec![0xd3, 0x00, 0x13, 0x3e, 0xd0, 0x00];

        let msg = registry.decode(&bytes).expect("RTCM frame should decode");
        assert_eq!(msg.header.msg_type, TYPE_RTCM);
        assert_eq!(msg.header.subtype, "RTCM3");
    }

    #[test]
    fn test_unknown_preamble_falls_through() {
        let registry = DecoderRegistry::with_defaults();
        assert!(registry.decode(&[0xff, 0xff, 0xff]).is_none());
        assert!(registry.decode(&[]).is_none());
    }

    #[test]
    fn test_panicking_decoder_is_contained() {
        let mut registry = DecoderRegistry::new();
        registry.register(Box::new(PanickingDecoder));
        registry.register(Box::new(RtcmDecoder::new()));

        // Panic in the first decoder must not prevent the second from matching
        let bytes = vec![0xd3, 0x00, 0x13, 0x3e, 0xd0, 0x00];
        let msg = registry.decode(&bytes).expect("RTCM decoder still runs");
        assert_eq!(msg.header.msg_type, TYPE_RTCM);
    }
}
