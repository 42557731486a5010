//! RTP payload-type records and the RFC 3551 static payload-type table.

use serde::{Deserialize, Serialize};

/// A payload type as assembled from `m=` format lists, `a=rtpmap`,
/// `a=fmtp` and `a=rtcp-fb` lines, or from the static table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RtpPayloadType {
    pub payload_type: u8,
    /// Encoding name only (e.g. "PCMU")
    pub encoding: String,
    /// Full `encoding/clock[/params]` string as given or synthesized
    pub encoding_with_params: String,
    pub clock_rate: u32,
    pub channels: u32,
    /// Raw encoding parameters after the second `/`, if any
    pub encoding_parameters: String,
    /// Raw `a=fmtp` parameter string
    pub format_parameters: String,
    /// `a=rtcp-fb` values attached to this payload type
    pub rtcp_fb: Vec<String>,
    /// Packetization time in ms, 0 when unset
    pub ptime: u32,
}

struct StaticPayloadType {
    payload_type: u8,
    encoding: &'static str,
    encoding_with_params: &'static str,
    clock_rate: u32,
    channels: u32,
    ptime: u32,
}

macro_rules! static_pt {
    ($pt:expr, $enc:literal, $full:literal, $rate:expr, $ch:expr, $ptime:expr) => {
        StaticPayloadType {
            payload_type: $pt,
            encoding: $enc,
            encoding_with_params: $full,
            clock_rate: $rate,
            channels: $ch,
            ptime: $ptime,
        }
    };
}

/// Audio/video assignments from RFC 3551 section 6.
static RFC_PAYLOAD_TYPES: &[StaticPayloadType] = &[
    static_pt!(0, "PCMU", "PCMU/8000", 8000, 1, 20),
    static_pt!(3, "GSM", "GSM/8000", 8000, 1, 20),
    static_pt!(4, "G723", "G723/8000", 8000, 1, 30),
    static_pt!(5, "DVI4", "DVI4/8000", 8000, 1, 20),
    static_pt!(6, "DVI4", "DVI4/16000", 16000, 1, 20),
    static_pt!(7, "LPC", "LPC/8000", 8000, 1, 20),
    static_pt!(8, "PCMA", "PCMA/8000", 8000, 1, 20),
    static_pt!(9, "G722", "G722/8000", 8000, 1, 20),
    static_pt!(10, "L16", "L16/44100/2", 44100, 2, 20),
    static_pt!(11, "L16", "L16/44100", 44100, 1, 20),
    static_pt!(12, "QCELP", "QCELP/8000", 8000, 1, 20),
    static_pt!(13, "CN", "CN/8000", 8000, 1, 0),
    static_pt!(14, "MPA", "MPA/90000", 90000, 1, 0),
    static_pt!(15, "G728", "G728/8000", 8000, 1, 20),
    static_pt!(16, "DVI4", "DVI4/11025", 11025, 1, 20),
    static_pt!(17, "DVI4", "DVI4/22050", 22050, 1, 20),
    static_pt!(18, "G729", "G729/8000", 8000, 1, 20),
    static_pt!(25, "CelB", "CelB/90000", 90000, 1, 0),
    static_pt!(26, "JPEG", "JPEG/90000", 90000, 1, 0),
    static_pt!(28, "nv", "nv/90000", 90000, 1, 0),
    static_pt!(31, "H261", "H261/90000", 90000, 1, 0),
    static_pt!(32, "MPV", "MPV/90000", 90000, 1, 0),
    static_pt!(33, "MP2T", "MP2T/90000", 90000, 1, 0),
    static_pt!(34, "H263", "H263/90000", 90000, 1, 0),
];

/// Looks up the static RFC assignment for a payload type number.
pub fn rtp_get_rfc_payload_type(pt: u8) -> Option<RtpPayloadType> {
    RFC_PAYLOAD_TYPES
        .iter()
        .find(|p| p.payload_type == pt)
        .map(|p| RtpPayloadType {
            payload_type: p.payload_type,
            encoding: p.encoding.to_string(),
            encoding_with_params: p.encoding_with_params.to_string(),
            clock_rate: p.clock_rate,
            channels: p.channels,
            encoding_parameters: if p.channels > 1 {
                p.channels.to_string()
            } else {
                String::new()
            },
            format_parameters: String::new(),
            rtcp_fb: Vec::new(),
            ptime: p.ptime,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_pcmu() {
        let pt = rtp_get_rfc_payload_type(0).unwrap();
        assert_eq!(pt.encoding, "PCMU");
        assert_eq!(pt.encoding_with_params, "PCMU/8000");
        assert_eq!(pt.clock_rate, 8000);
        assert_eq!(pt.ptime, 20);
    }

    #[test]
    fn test_static_l16_stereo() {
        let pt = rtp_get_rfc_payload_type(10).unwrap();
        assert_eq!(pt.channels, 2);
        assert_eq!(pt.encoding_parameters, "2");
    }

    #[test]
    fn test_dynamic_range_unassigned() {
        assert!(rtp_get_rfc_payload_type(96).is_none());
        assert!(rtp_get_rfc_payload_type(127).is_none());
    }
}
