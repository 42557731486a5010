//! Stream parameter extraction.
//!
//! Folds parsed sessions into per-media [`StreamParams`] for the call
//! engine: transport endpoints, reconciled codec lists, ICE credentials
//! and candidates, DTLS fingerprints, SDES keys, T.38 options and the
//! negotiation flag bits. Everything is deep-copied out of the parse
//! tree; stream params do not reference the input buffer.

use std::collections::HashMap;
use std::net::IpAddr;

use tracing::warn;

use crate::crypto::{Fingerprint, SdesParams};
use crate::error::{Error, Result};
use crate::flags::SdpFlags;
use crate::ice::{is_trickle_ice_address, IceCandidate};
use crate::media::{Endpoint, MediaType, OtherAttribute};
use crate::protocol::{proto_is_rtp, protocol, TransportProtocol};
use crate::rtp::{rtp_get_rfc_payload_type, RtpPayloadType};
use crate::sdp::attributes::{
    attr_get_m_s, AttrId, AttrPayload, Attributes, SdpAttrType, T38UdpEc,
};
use crate::sdp::parser::{SdpMedia, SdpSession, SdpSessions};
use crate::sdp::span::AddressFamily;

/// T.38 options harvested from a fax media section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct T38Options {
    pub version: i32,
    pub min_ec_entries: i32,
    pub max_ec_entries: i32,
    pub fec_span: i32,
    pub max_datagram: i32,
    pub max_ifp: i32,
    pub fill_bit_removal: bool,
    pub transcoding_mmr: bool,
    pub transcoding_jbig: bool,
    pub local_tcf: bool,
}

/// Flag bits of one extracted stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpFlags {
    pub send: bool,
    pub recv: bool,
    pub ice: bool,
    pub ice_lite_peer: bool,
    pub trickle_ice: bool,
    pub rtcp_mux: bool,
    /// RTCP endpoint is RTP port + 1, derived at use time
    pub implicit_rtcp: bool,
    pub setup_active: bool,
    pub setup_passive: bool,
    pub legacy_osrtp: bool,
    pub legacy_osrtp_rev: bool,
    pub rtcp_fb: bool,
    pub asymmetric: bool,
    pub unidirectional: bool,
    pub strict_source: bool,
    pub media_handover: bool,
}

/// Everything the call engine needs to know about one media stream.
#[derive(Debug, Clone, Default)]
pub struct StreamParams {
    /// 1-based stream index across the whole body
    pub index: usize,
    pub media_sdp_id: usize,
    pub rtp_endpoint: Option<Endpoint>,
    pub rtcp_endpoint: Option<Endpoint>,
    pub consecutive_ports: u32,
    pub num_ports: u32,
    pub protocol_str: String,
    pub protocol: Option<&'static TransportProtocol>,
    pub media_type: String,
    pub type_id: MediaType,
    pub format_str: String,
    /// Reconciled codec list in `m=` line order
    pub codecs: Vec<RtpPayloadType>,
    pub ptime: u32,
    pub ice_ufrag: String,
    pub ice_pwd: String,
    pub ice_candidates: Vec<IceCandidate>,
    pub fingerprint: Option<Fingerprint>,
    pub tls_id: String,
    pub sdes_params: Vec<SdesParams>,
    pub t38_options: T38Options,
    pub media_id: String,
    /// Unrecognized attributes, carried for passthrough
    pub attributes: Vec<OtherAttribute>,
    pub direction: [Option<String>; 2],
    pub desired_family: Option<AddressFamily>,
    /// b=AS / b=RR / b=RS of the media section, -1 unset
    pub media_session_as: i32,
    pub media_session_rr: i32,
    pub media_session_rs: i32,
    pub flags: SpFlags,
}

fn extract_err(msg: &str) -> Error {
    warn!("Failed to extract streams from SDP: {}", msg);
    Error::StreamExtraction(msg.to_string())
}

/// Resolves the transport endpoint for a media line following the
/// trust-address rules: signaling source first unless addresses inside
/// the SDP are trusted, then the explicit address, then media-level and
/// session-level connections.
fn fill_endpoint(
    media: &SdpMedia,
    session: &SdpSession,
    flags: &mut SdpFlags,
    address: Option<IpAddr>,
    port: u16,
) -> Option<Endpoint> {
    let address = if !flags.trust_address {
        if flags.parsed_received_from.is_none() {
            let literal = flags.received_from_address.as_deref()?;
            let parsed = match flags.received_from_family {
                Some(family) => {
                    crate::sdp::span::parse_typed_address(family.rfc_name(), literal)?
                }
                None => crate::sdp::span::parse_address_any(literal)?,
            };
            flags.parsed_received_from = Some(parsed);
        }
        flags.parsed_received_from?
    } else if let Some(addr) = address.filter(|a| !a.is_unspecified()) {
        addr
    } else if media.connection.parsed {
        media.connection.address.parsed?
    } else if session.connection.parsed {
        session.connection.address.parsed?
    } else {
        return None;
    };

    Some(Endpoint { address, port })
}

/// Builds the codec list from the `m=` format list overlaid with rtpmap,
/// fmtp and rtcp-fb attributes, falling back to the static RFC table.
fn rtp_payload_types(
    sp: &mut StreamParams,
    media: &SdpMedia,
    src: &str,
) -> std::result::Result<(), ()> {
    if !proto_is_rtp(sp.protocol) {
        return Ok(());
    }

    let mut ht_rtpmap: HashMap<u8, &RtpPayloadType> = HashMap::new();
    for attr in media.attributes.get_all(AttrId::Rtpmap) {
        if let AttrPayload::Rtpmap(r) = &attr.payload {
            ht_rtpmap.insert(r.payload_type, &r.pt);
        }
    }

    let mut ht_fmtp: HashMap<i32, &str> = HashMap::new();
    for attr in media.attributes.get_all(AttrId::Fmtp) {
        if let AttrPayload::Fmtp(f) = &attr.payload {
            ht_fmtp.insert(f.payload_type, f.format_parms.slice(src));
        }
    }

    let mut ht_rtcp_fb: HashMap<i32, Vec<String>> = HashMap::new();
    for attr in media.attributes.get_all(AttrId::RtcpFb) {
        if let AttrPayload::RtcpFb(fb) = &attr.payload {
            if fb.payload_type == -1 {
                continue;
            }
            ht_rtcp_fb
                .entry(fb.payload_type)
                .or_default()
                .push(fb.value.slice(src).to_string());
        }
    }

    for fmt in &media.format_list {
        let i: u32 = fmt.slice(src).parse().map_err(|_| ())?;
        if i > 127 {
            return Err(());
        }
        let i = i as u8;

        // prefer the rtpmap definition, then the static RFC assignment,
        // else leave it a bare number
        let ptrfc = rtp_get_rfc_payload_type(i);
        let mut pt = match ht_rtpmap.get(&i) {
            Some(ptl) => (*ptl).clone(),
            None => match &ptrfc {
                Some(p) => p.clone(),
                None => RtpPayloadType {
                    payload_type: i,
                    ..Default::default()
                },
            },
        };

        pt.format_parameters = ht_fmtp.get(&(i as i32)).map(|s| s.to_string()).unwrap_or_default();
        if let Some(fb) = ht_rtcp_fb.remove(&(i as i32)) {
            pt.rtcp_fb = fb;
        }

        if sp.ptime != 0 {
            pt.ptime = sp.ptime;
        } else if pt.ptime == 0 {
            if let Some(p) = &ptrfc {
                pt.ptime = p.ptime;
            }
        }

        sp.codecs.push(pt);
    }

    Ok(())
}

fn sdp_ice(sp: &mut StreamParams, media: &SdpMedia, session: &SdpSession, src: &str) {
    let Some(attr) = attr_get_m_s(&media.attributes, &session.attributes, AttrId::IceUfrag) else {
        return;
    };
    sp.ice_ufrag = attr.value_str(src).unwrap_or("").to_string();

    sp.flags.ice = true;

    for attr in media.attributes.get_all(AttrId::Candidate) {
        if let AttrPayload::Candidate(c) = &attr.payload {
            if let Some(cand) = &c.parsed {
                sp.ice_candidates.push(cand.clone());
            }
        }
    }

    if let Some(attr) = attr_get_m_s(&media.attributes, &session.attributes, AttrId::IceOptions) {
        if attr.value_str(src).unwrap_or("").contains("trickle") {
            sp.flags.trickle_ice = true;
        }
    } else if sp.rtp_endpoint.map(|ep| is_trickle_ice_address(&ep)).unwrap_or(false) {
        sp.flags.trickle_ice = true;
    }

    if attr_get_m_s(&media.attributes, &session.attributes, AttrId::IceLite).is_some() {
        sp.flags.ice_lite_peer = true;
    }

    if let Some(attr) = attr_get_m_s(&media.attributes, &session.attributes, AttrId::IcePwd) {
        sp.ice_pwd = attr.value_str(src).unwrap_or("").to_string();
    }
}

fn sdp_t38(sp: &mut StreamParams, media: &SdpMedia, src: &str) {
    let to = &mut sp.t38_options;
    let attrs = &media.attributes;

    if let Some(attr) = attrs.get(AttrId::T38FaxVersion) {
        if let AttrPayload::Int(i) = attr.payload {
            to.version = i;
        }
    }

    match attrs.get(AttrId::T38FaxUdpEc).map(|a| &a.payload) {
        Some(AttrPayload::T38UdpEc(T38UdpEc::Redundancy)) => {
            to.max_ec_entries = 3;
            to.min_ec_entries = 3;
        }
        Some(AttrPayload::T38UdpEc(T38UdpEc::Fec)) => {
            to.max_ec_entries = 3;
            to.min_ec_entries = 3;
            to.fec_span = 3;
        }
        Some(_) => (),
        // no EC specified: same defaults as redundancy
        None => {
            to.max_ec_entries = 3;
            to.min_ec_entries = 3;
        }
    }

    if let Some(attr) = attrs.get(AttrId::T38FaxUdpEcDepth) {
        if let AttrPayload::T38EcDepth { minred, maxred } = attr.payload {
            to.min_ec_entries = minred;
            to.max_ec_entries = maxred;
        }
    }

    if let Some(attr) = attrs.get(AttrId::T38FaxUdpFecMaxSpan) {
        if let AttrPayload::Int(i) = attr.payload {
            to.fec_span = i;
        }
    }

    if let Some(attr) = attrs.get(AttrId::T38FaxMaxDatagram) {
        if let AttrPayload::Int(i) = attr.payload {
            to.max_datagram = i;
        }
    }

    if let Some(attr) = attrs.get(AttrId::T38FaxMaxIfp) {
        if let AttrPayload::Int(i) = attr.payload {
            to.max_ifp = i;
        }
    }

    // a bare attribute or any value other than "0" sets the flag
    let flag_set = |attrs: &Attributes, id: AttrId| -> bool {
        attrs
            .get(id)
            .map(|a| a.value_str(src).map(|v| v != "0").unwrap_or(true))
            .unwrap_or(false)
    };
    to.fill_bit_removal = flag_set(attrs, AttrId::T38FaxFillBitRemoval);
    to.transcoding_mmr = flag_set(attrs, AttrId::T38FaxTranscodingMmr);
    to.transcoding_jbig = flag_set(attrs, AttrId::T38FaxTranscodingJbig);

    if let Some(attr) = attrs.get(AttrId::T38FaxRateManagement) {
        if let AttrPayload::T38RateManagement(rm) = attr.payload {
            to.local_tcf = rm == crate::sdp::attributes::T38RateManagement::LocalTcf;
        }
    }
}

/// Collapses legacy (pre-RFC 8643) OSRTP offer pairs: two consecutive
/// media sections of the same type, one RTP and one SRTP, are reduced to
/// a single stream. Returns `true` when the current stream is to be
/// discarded.
fn legacy_osrtp_accept(
    sp: &mut StreamParams,
    streams: &mut Vec<StreamParams>,
    session: &mut SdpSession,
    media_idx: usize,
    flags: &SdpFlags,
    num: &mut usize,
) -> bool {
    if streams.is_empty() {
        return false;
    }
    if media_idx == 0 {
        return false;
    }
    if !flags.osrtp_accept_legacy {
        return false;
    }

    // protocols must be known RTP pairs of matching type
    let (Some(proto), Some(last_proto)) = (sp.protocol, streams.last().and_then(|l| l.protocol))
    else {
        return false;
    };
    if sp.type_id != streams.last().map(|l| l.type_id).unwrap_or(MediaType::Unknown) {
        return false;
    }
    if !proto.rtp || !last_proto.rtp {
        return false;
    }

    let sp_port = sp.rtp_endpoint.map(|e| e.port).unwrap_or(0);
    let last_port = streams
        .last()
        .and_then(|l| l.rtp_endpoint)
        .map(|e| e.port)
        .unwrap_or(0);

    if proto.srtp && !last_proto.srtp {
        // non-rejected SRTP following RTP: drop the RTP section
        if sp_port != 0 {
            streams.pop();
            sp.flags.legacy_osrtp = true;
            session.media[media_idx - 1].legacy_osrtp = true;
            sp.index -= 1;
            *num -= 1;
            return false;
        }

        // rejected SRTP with a live RTP counterpart: throw the SRTP away
        if last_port != 0 {
            session.media[media_idx].legacy_osrtp = true;
            return true;
        }
    } else if !proto.srtp && last_proto.srtp {
        // reversed order: keep the SRTP section if it's live
        if last_port != 0 {
            let last = streams.last_mut().expect("streams not empty");
            last.flags.legacy_osrtp = true;
            last.flags.legacy_osrtp_rev = true;
            session.media[media_idx].legacy_osrtp = true;
            return true;
        }
    }

    false
}

fn other_attributes(attrs: &Attributes, src: &str) -> Vec<OtherAttribute> {
    attrs
        .get_all(AttrId::Other)
        .map(|attr| OtherAttribute {
            name: attr.name_str(src).to_string(),
            value: attr.value_str(src).unwrap_or("").to_string(),
            typ: match attr.payload {
                AttrPayload::Other(t) => t,
                _ => SdpAttrType::Unknown,
            },
        })
        .collect()
}

/// Extracts one [`StreamParams`] per media section of every session.
///
/// Session-level metadata (origin, name, timing, bandwidth, uninterpreted
/// attributes) is captured onto the flags for the create path. Media
/// sections swallowed by the legacy OSRTP collapse are marked in the
/// session tree so the rewriter skips them.
pub fn sdp_streams(
    sessions: &mut SdpSessions,
    src: &str,
    flags: &mut SdpFlags,
) -> Result<Vec<StreamParams>> {
    let mut streams: Vec<StreamParams> = Vec::new();
    let mut num = 0usize;

    for session_idx in 0..sessions.sessions.len() {
        {
            let session = &sessions.sessions[session_idx];

            // carry session-level values for later use by the create path
            flags
                .session_attributes
                .extend(other_attributes(&session.attributes, src));
            // only the first session's origin seeds the version tracking
            if flags.session_sdp_orig.is_none() && session.origin.parsed {
                flags.session_sdp_orig = Some(origin_to_owned(&session.origin, src));
            }
            flags.session_sdp_name = session.session_name.slice(src).to_string();
            flags.session_rr = session.bandwidth_rr;
            flags.session_rs = session.bandwidth_rs;
            flags.session_timing = session.session_timing.slice(src).to_string();
        }

        for media_idx in 0..sessions.sessions[session_idx].media.len() {
            let session = &sessions.sessions[session_idx];
            let media = &session.media[media_idx];

            num += 1;
            let mut sp = StreamParams {
                index: num,
                media_sdp_id: media.media_sdp_id,
                media_session_as: -1,
                media_session_rr: -1,
                media_session_rs: -1,
                ..Default::default()
            };

            if !flags.fragment {
                sp.rtp_endpoint = Some(
                    fill_endpoint(media, session, flags, None, media.port_num)
                        .ok_or_else(|| extract_err("No address info found for stream"))?,
                );
            }

            sdp_ice(&mut sp, media, session, src);
            if sp.flags.ice {
                // ignore the signaling source address when ICE is in use
                flags.trust_address = true;
            }

            sp.consecutive_ports = media.port_count;
            sp.num_ports = sp.consecutive_ports * 2;
            sp.protocol_str = media.transport.slice(src).to_string();
            sp.protocol = crate::protocol::transport_protocol(sp.protocol_str.as_str());
            sp.media_type = media.media_type_str.slice(src).to_string();
            sp.type_id = media.media_type_id;
            sp.direction = flags.direction.clone();
            sp.desired_family = flags.address_family;
            sp.flags.asymmetric = flags.asymmetric;
            sp.flags.unidirectional = flags.unidirectional;
            sp.flags.strict_source = flags.strict_source;
            sp.flags.media_handover = flags.media_handover;

            sp.media_session_as = media.bandwidth_as;
            sp.media_session_rr = media.bandwidth_rr;
            sp.media_session_rs = media.bandwidth_rs;

            if let Some(attr) = media.attributes.get(AttrId::Ptime) {
                if let Some(v) = attr.value_str(src) {
                    sp.ptime = v.parse().unwrap_or(0);
                }
            }

            sp.format_str = media.formats.slice(src).to_string();
            if rtp_payload_types(&mut sp, media, src).is_err() {
                return Err(extract_err("Invalid RTP payload types"));
            }

            for attr in media.attributes.get_all(AttrId::Crypto) {
                if let AttrPayload::Crypto(c) = &attr.payload {
                    sp.sdes_params.push(SdesParams {
                        tag: c.tag,
                        suite: c.suite,
                        master_key: c.master_key.clone(),
                        master_salt: c.salt.clone(),
                        mki: c.mki.clone(),
                        unencrypted_srtp: c.unencrypted_srtp,
                        unencrypted_srtcp: c.unencrypted_srtcp,
                        unauthenticated_srtp: c.unauthenticated_srtp,
                    });
                }
            }

            sp.attributes = other_attributes(&media.attributes, src);

            sp.flags.send = true;
            sp.flags.recv = true;
            if attr_get_m_s(&media.attributes, &session.attributes, AttrId::Recvonly).is_some() {
                sp.flags.send = false;
            } else if attr_get_m_s(&media.attributes, &session.attributes, AttrId::Sendonly)
                .is_some()
            {
                sp.flags.recv = false;
            } else if attr_get_m_s(&media.attributes, &session.attributes, AttrId::Inactive)
                .is_some()
            {
                sp.flags.send = false;
                sp.flags.recv = false;
            }

            if let Some(attr) = attr_get_m_s(&media.attributes, &session.attributes, AttrId::Setup)
            {
                if let AttrPayload::Setup(setup) = attr.payload {
                    use crate::sdp::attributes::SetupValue;
                    if setup == SetupValue::ActPass || setup == SetupValue::Active {
                        sp.flags.setup_active = true;
                    }
                    if setup == SetupValue::ActPass || setup == SetupValue::Passive {
                        sp.flags.setup_passive = true;
                    }
                }
            }

            if let Some(attr) =
                attr_get_m_s(&media.attributes, &session.attributes, AttrId::Fingerprint)
            {
                if let AttrPayload::Fingerprint(fp) = &attr.payload {
                    sp.fingerprint = Some(Fingerprint {
                        hash_func: fp.hash_func,
                        digest: fp.digest.clone(),
                    });
                }
            }

            if let Some(attr) = attr_get_m_s(&media.attributes, &session.attributes, AttrId::TlsId)
            {
                sp.tls_id = attr.value_str(src).unwrap_or("").to_string();
            }

            // OSRTP (RFC 8643): plain RTP with keying material present
            // upgrades to the secure variant
            if let Some(proto) = sp.protocol {
                if proto.rtp && !proto.srtp {
                    if let Some(osrtp) = proto.osrtp_variant {
                        if sp.fingerprint.is_some() || !sp.sdes_params.is_empty() {
                            sp.protocol = Some(protocol(osrtp));
                        }
                    }
                }
            }

            {
                let session = &mut sessions.sessions[session_idx];
                if legacy_osrtp_accept(&mut sp, &mut streams, session, media_idx, flags, &mut num)
                {
                    continue;
                }
            }

            let session = &sessions.sessions[session_idx];
            let media = &session.media[media_idx];

            if let Some(attr) = media.attributes.get(AttrId::Mid) {
                sp.media_id = attr.value_str(src).unwrap_or("").to_string();
            }

            // be ignorant about the contents
            if media.attributes.has(AttrId::RtcpFb) {
                sp.flags.rtcp_fb = true;
            }

            sdp_t38(&mut sp, media, src);

            // determine the RTCP endpoint
            if media.attributes.has(AttrId::RtcpMux) {
                sp.flags.rtcp_mux = true;
            }

            let rtcp_attr = media.attributes.get(AttrId::Rtcp).and_then(|a| {
                if let AttrPayload::Rtcp(r) = &a.payload {
                    Some(*r)
                } else {
                    None
                }
            });
            match rtcp_attr {
                None => sp.flags.implicit_rtcp = true,
                Some(_) if media.port_count != 1 => sp.flags.implicit_rtcp = true,
                Some(rtcp) => {
                    let rtp_ep = sp.rtp_endpoint.unwrap_or(Endpoint {
                        address: AddressFamily::V4.unspecified(),
                        port: 0,
                    });
                    if rtcp.port_num == rtp_ep.port && !is_trickle_ice_address(&rtp_ep) {
                        sp.flags.rtcp_mux = true;
                    } else {
                        sp.rtcp_endpoint = Some(
                            fill_endpoint(media, session, flags, rtcp.address, rtcp.port_num)
                                .ok_or_else(|| extract_err("Invalid RTCP attribute"))?,
                        );
                    }
                }
            }

            streams.push(sp);
        }
    }

    Ok(streams)
}

fn origin_to_owned(origin: &crate::sdp::parser::Origin, src: &str) -> crate::media::SdpOrigin {
    crate::media::SdpOrigin {
        username: origin.username.slice(src).to_string(),
        session_id: origin.session_id.slice(src).to_string(),
        version_num: origin.version_num,
        address_type: origin.address.address_type.slice(src).to_string(),
        address: origin.address.address.slice(src).to_string(),
    }
}
