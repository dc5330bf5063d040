// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RTCM 3.x frame recognizer.
//!
//! RTCM3 frames start with the 0xD3 preamble, 6 reserved zero bits, and a
//! 10-bit payload length; the 12-bit message number follows the 3-byte
//! header. Correction payloads stay opaque.

use super::ProtocolDecoder;
use crate::message::{RoutedMessage, ENCODING_BYTEARRAY, TYPE_RTCM};

const RTCM3_PREAMBLE: u8 = 0xd3;

pub struct RtcmDecoder;

impl RtcmDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RtcmDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolDecoder for RtcmDecoder {
    fn name(&self) -> &str {
        "RTCM3"
    }

    fn try_decode(&self, bytes: &[u8]) -> Option<RoutedMessage> {
        // Header + at least the message number bits
        if bytes.len() < 5 {
            return None;
        }
        if bytes[0] != RTCM3_PREAMBLE || bytes[1] & 0xfc != 0 {
            return None;
        }

        // Message number: top 12 bits after the 3-byte header
        let msg_number = (u16::from(bytes[3]) << 4) | (u16::from(bytes[4]) >> 4);

        Some(RoutedMessage::typed(
            TYPE_RTCM,
            "RTCM3",
            ENCODING_BYTEARRAY,
            msg_number,
            bytes.to_vec(),
        ))
    }
}
