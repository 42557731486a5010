//! Transport protocol descriptors for `m=` lines.
//!
//! Each descriptor links to its SRTP/plain-RTP counterparts so the stream
//! extractor can perform the OSRTP upgrade (RFC 8643) and the rewriter can
//! synthesize rejected plain-RTP sections for legacy OSRTP pairs. The
//! OSRTP variants share the plain wire name but are marked secure.

use serde::{Deserialize, Serialize};

/// Identity of a transport protocol descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolId {
    RtpAvp,
    RtpSavp,
    RtpAvpf,
    RtpSavpf,
    UdpTlsRtpSavp,
    UdpTlsRtpSavpf,
    Udptl,
    RtpAvpOsrtp,
    RtpAvpfOsrtp,
}

/// Static description of one transport protocol.
#[derive(Debug, PartialEq, Eq)]
pub struct TransportProtocol {
    pub id: ProtocolId,
    /// Token as it appears in the `m=` line
    pub name: &'static str,
    /// Carries RTP
    pub rtp: bool,
    /// Carries SRTP
    pub srtp: bool,
    /// AVPF feedback profile
    pub avpf: bool,
    /// OSRTP-capable upgrade target (same wire name, secure)
    pub osrtp_variant: Option<ProtocolId>,
    /// Plain-RTP counterpart of a secure protocol
    pub rtp_variant: Option<ProtocolId>,
}

macro_rules! proto {
    ($id:ident, $name:literal, rtp: $rtp:expr, srtp: $srtp:expr, avpf: $avpf:expr,
     osrtp: $osrtp:expr, plain: $plain:expr) => {
        TransportProtocol {
            id: ProtocolId::$id,
            name: $name,
            rtp: $rtp,
            srtp: $srtp,
            avpf: $avpf,
            osrtp_variant: $osrtp,
            rtp_variant: $plain,
        }
    };
}

/// Name lookup scans in order, so the plain descriptors must precede the
/// OSRTP variants that share their wire name.
static TRANSPORT_PROTOCOLS: &[TransportProtocol] = &[
    proto!(RtpAvp, "RTP/AVP", rtp: true, srtp: false, avpf: false,
        osrtp: Some(ProtocolId::RtpAvpOsrtp), plain: None),
    proto!(RtpSavp, "RTP/SAVP", rtp: true, srtp: true, avpf: false,
        osrtp: None, plain: Some(ProtocolId::RtpAvp)),
    proto!(RtpAvpf, "RTP/AVPF", rtp: true, srtp: false, avpf: true,
        osrtp: Some(ProtocolId::RtpAvpfOsrtp), plain: None),
    proto!(RtpSavpf, "RTP/SAVPF", rtp: true, srtp: true, avpf: true,
        osrtp: None, plain: Some(ProtocolId::RtpAvpf)),
    proto!(UdpTlsRtpSavp, "UDP/TLS/RTP/SAVP", rtp: true, srtp: true, avpf: false,
        osrtp: None, plain: Some(ProtocolId::RtpAvp)),
    proto!(UdpTlsRtpSavpf, "UDP/TLS/RTP/SAVPF", rtp: true, srtp: true, avpf: true,
        osrtp: None, plain: Some(ProtocolId::RtpAvpf)),
    proto!(Udptl, "udptl", rtp: false, srtp: false, avpf: false,
        osrtp: None, plain: None),
    proto!(RtpAvpOsrtp, "RTP/AVP", rtp: true, srtp: true, avpf: false,
        osrtp: None, plain: Some(ProtocolId::RtpAvp)),
    proto!(RtpAvpfOsrtp, "RTP/AVPF", rtp: true, srtp: true, avpf: true,
        osrtp: None, plain: Some(ProtocolId::RtpAvpf)),
];

/// Resolves a descriptor by identity.
pub fn protocol(id: ProtocolId) -> &'static TransportProtocol {
    TRANSPORT_PROTOCOLS
        .iter()
        .find(|p| p.id == id)
        .expect("protocol table covers all ids")
}

/// Looks up a transport token from an `m=` line. Case-insensitive;
/// unknown tokens yield `None` and the media is treated as opaque.
pub fn transport_protocol(name: &str) -> Option<&'static TransportProtocol> {
    TRANSPORT_PROTOCOLS
        .iter()
        .find(|p| p.name.eq_ignore_ascii_case(name))
}

/// Whether the media behind a (possibly unknown) protocol is RTP.
pub fn proto_is_rtp(proto: Option<&'static TransportProtocol>) -> bool {
    proto.map(|p| p.rtp).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_lookup_prefers_plain() {
        let p = transport_protocol("RTP/AVP").unwrap();
        assert_eq!(p.id, ProtocolId::RtpAvp);
        assert!(!p.srtp);
    }

    #[test]
    fn test_osrtp_upgrade_chain() {
        let plain = transport_protocol("RTP/AVP").unwrap();
        let osrtp = protocol(plain.osrtp_variant.unwrap());
        assert_eq!(osrtp.name, "RTP/AVP");
        assert!(osrtp.srtp);
        assert_eq!(osrtp.rtp_variant, Some(ProtocolId::RtpAvp));
    }

    #[test]
    fn test_savp_plain_variant() {
        let savp = transport_protocol("RTP/SAVP").unwrap();
        assert!(savp.srtp);
        assert_eq!(protocol(savp.rtp_variant.unwrap()).name, "RTP/AVP");
    }

    #[test]
    fn test_udptl_not_rtp() {
        let p = transport_protocol("udptl").unwrap();
        assert!(!p.rtp);
        assert!(!proto_is_rtp(Some(p)));
    }

    #[test]
    fn test_unknown_transport() {
        assert!(transport_protocol("TCP/MRCPv2").is_none());
        assert!(!proto_is_rtp(None));
    }
}
