// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SAE J2735 frame recognizers, one per supported revision.
//!
//! A recognizer reads the leading message-frame identifier and checks it
//! against the id space of its revision. The frame body is opaque - real
//! ASN.1 decoding is an external capability; what the fabric needs is the
//! message type tag and the original bytes.

use super::ProtocolDecoder;
use crate::message::{RoutedMessage, ENCODING_ASN1_UPER, TYPE_J2735};

/// Supported J2735 revisions, oldest to newest. The default registry
/// registers them newest first so current traffic is matched on the first
/// attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum J2735Revision {
    /// 2009 revision (BER-era numbering, DSRCmsgID 1..17).
    R41,
    /// 2015 revision (message frame ids 18..31).
    R63,
    /// 2016 revision (same id space as R63, current frame layout).
    R2016,
}

impl J2735Revision {
    pub fn name(self) -> &'static str {
        match self {
            J2735Revision::R41 => "J2735_R41",
            J2735Revision::R63 => "J2735_R63",
            J2735Revision::R2016 => "J2735_R2016",
        }
    }

    /// Message name for a frame id in this revision, or None when the id is
    /// outside the revision's id space.
    fn msg_name(self, id: u16) -> Option<&'static str> {
        match self {
            // DSRCmsgID numbering used before the 2015 re-issue
            J2735Revision::R41 => match id {
                1 => Some("alaCarte"),
                2 => Some("basicSafetyMessage"),
                3 => Some("basicSafetyMessageVerbose"),
                4 => Some("commonSafetyRequest"),
                5 => Some("emergencyVehicleAlert"),
                6 => Some("intersectionCollision"),
                7 => Some("mapData"),
                8 => Some("nmeaCorrections"),
                9 => Some("probeDataManagement"),
                10 => Some("probeVehicleData"),
                11 => Some("roadSideAlert"),
                12 => Some("rtcmCorrections"),
                13 => Some("signalPhaseAndTimingMessage"),
                14 => Some("signalRequestMessage"),
                15 => Some("signalStatusMessage"),
                16 => Some("travelerInformation"),
                _ => None,
            },
            // MessageFrame ids shared by the 2015/2016 revisions
            J2735Revision::R63 | J2735Revision::R2016 => match id {
                18 => Some("mapData"),
                19 => Some("signalPhaseAndTimingMessage"),
                20 => Some("basicSafetyMessage"),
                21 => Some("commonSafetyRequest"),
                22 => Some("emergencyVehicleAlert"),
                23 => Some("intersectionCollision"),
                24 => Some("nmeaCorrections"),
                25 => Some("probeDataManagement"),
                26 => Some("probeVehicleData"),
                27 => Some("roadSideAlert"),
                28 => Some("rtcmCorrections"),
                29 => Some("signalRequestMessage"),
                30 => Some("signalStatusMessage"),
                31 => Some("travelerInformation"),
                _ => None,
            },
        }
    }
}

/// Frame recognizer for one J2735 revision.
pub struct J2735Decoder {
    revision: J2735Revision,
}

impl J2735Decoder {
    pub fn new(revision: J2735Revision) -> Self {
        Self { revision }
    }
}

impl ProtocolDecoder for J2735Decoder {
    fn name(&self) -> &str {
        self.revision.name()
    }

    fn try_decode(&self, bytes: &[u8]) -> Option<RoutedMessage> {
        if bytes.len() < 2 {
            return None;
        }

        let msg_id = u16::from_be_bytes([bytes[0], bytes[1]]);
        let name = self.revision.msg_name(msg_id)?;

        Some(RoutedMessage::typed(
            TYPE_J2735,
            name,
            ENCODING_ASN1_UPER,
            msg_id,
            bytes.to_vec(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_r2016_recognizes_spat() {
        let decoder = J2735Decoder::new(J2735Revision::R2016);
        let msg = decoder
            .try_decode(&[0x00, 0x13, 0x01, 0x02])
            .expect("SPaT frame id 19");
        assert_eq!(msg.header.subtype, "signalPhaseAndTimingMessage");
    }

    #[test]
    fn test_r2016_rejects_legacy_ids() {
        let decoder = J2735Decoder::new(J2735Revision::R2016);
        // id 2 was BSM in R41 but is outside the 2016 id space
        assert!(decoder.try_decode(&[0x00, 0x02, 0x01]).is_none());
    }

    #[test]
    fn test_r41_recognizes_legacy_bsm() {
        let decoder = J2735Decoder::new(J2735Revision::R41);
        let msg = decoder
            .try_decode(&[0x00, 0x02, 0x01])
            .expect("legacy BSM id 2");
        assert_eq!(msg.header.subtype, "basicSafetyMessage");
    }

    #[test]
    fn test_short_input_rejected() {
        let decoder = J2735Decoder::new(J2735Revision::R2016);
        assert!(decoder.try_decode(&[0x00]).is_none());
        assert!(decoder.try_decode(&[]).is_none());
    }
}
