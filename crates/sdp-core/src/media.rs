//! Call-side media state consumed by the SDP rewriter.
//!
//! The call engine owns the monologue graph; the rewriter only reads (and
//! in a few places updates) the parts modeled here: per-media negotiation
//! state, allocated local sockets, ICE agent credentials and DTLS
//! certificate fingerprints. The caller is expected to hold its call-level
//! write lock while a rewrite or create operation runs.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::crypto::{DtlsHashFunc, Fingerprint, SdesParams};
use crate::ice::IceCandidate;
use crate::protocol::TransportProtocol;
use crate::rtp::RtpPayloadType;
use crate::sdp::attributes::SdpAttrType;
use crate::sdp::span::AddressFamily;

/// Media type of an `m=` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MediaType {
    /// No media type; also addresses the global (session) level in
    /// manipulation directives
    #[default]
    Unknown,
    Audio,
    Video,
    Image,
    Message,
    Other,
}

impl MediaType {
    pub fn from_token(s: &str) -> Self {
        if s.eq_ignore_ascii_case("audio") {
            MediaType::Audio
        } else if s.eq_ignore_ascii_case("video") {
            MediaType::Video
        } else if s.eq_ignore_ascii_case("image") {
            MediaType::Image
        } else if s.eq_ignore_ascii_case("message") {
            MediaType::Message
        } else {
            MediaType::Other
        }
    }
}

/// A transport address, one side of a media flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub address: IpAddr,
    pub port: u16,
}

/// Owned copy of an `o=` line, cached on the monologue across rewrites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdpOrigin {
    pub username: String,
    pub session_id: String,
    pub version_num: u64,
    pub address_type: String,
    pub address: String,
}

/// An uninterpreted attribute carried through the relay verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtherAttribute {
    pub name: String,
    pub value: String,
    pub typ: SdpAttrType,
}

/// One local socket, bound on one local interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSock {
    pub local_address: IpAddr,
    pub local_port: u16,
    /// Address written into outgoing SDP (may differ behind NAT)
    pub advertised_address: IpAddr,
    /// ICE foundation shared by all candidates from this interface
    pub ice_foundation: String,
    /// Interface index, used as the ICE local preference
    pub unique_id: u32,
}

/// One component (RTP or RTCP) of a media flow, with the sockets
/// allocated for it across local interfaces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketStream {
    /// ICE component id: 1 for RTP, 2 for RTCP
    pub component: u32,
    pub sockets: Vec<StreamSock>,
    /// Index of the selected socket, `None` until one was chosen
    pub selected: Option<usize>,
    /// Index of the RTCP sibling stream within the media's stream list
    pub rtcp_sibling: Option<usize>,
    /// Remote address as advertised in the peer's SDP
    pub advertised_endpoint: Option<Endpoint>,
}

impl PacketStream {
    pub fn selected_sock(&self) -> Option<&StreamSock> {
        self.selected.and_then(|i| self.sockets.get(i))
    }
}

/// Local ICE agent state, as far as SDP emission needs it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IceAgentState {
    pub ufrag: String,
    pub pwd: String,
    /// Negotiation finished; only the selected pair is advertised
    pub completed: bool,
    pub controlling: bool,
    /// Nominated remote candidates, for `a=remote-candidates`
    pub remote_candidates: Vec<IceCandidate>,
}

/// Local DTLS certificate, reduced to its fingerprints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DtlsCert {
    pub fingerprints: Vec<Fingerprint>,
}

/// Negotiation flag bits of one call media.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaFlags {
    pub send: bool,
    pub recv: bool,
    /// Media is passed through untouched (no re-encryption, no ICE)
    pub passthru: bool,
    pub ice: bool,
    pub ice_lite_self: bool,
    pub trickle_ice: bool,
    pub rtcp_mux: bool,
    pub dtls: bool,
    pub sdes: bool,
    pub setup_active: bool,
    pub setup_passive: bool,
    pub legacy_osrtp: bool,
    pub legacy_osrtp_rev: bool,
    /// Sink-and-generator media: all incoming attributes are dropped
    pub generator: bool,
}

/// One media line of the call, paired 1:1 with the SDP sections being
/// rewritten.
#[derive(Debug, Clone, Default)]
pub struct CallMedia {
    /// Media type token to write into the `m=` line; empty keeps the
    /// original
    pub type_str: String,
    pub type_id: MediaType,
    pub protocol: Option<&'static TransportProtocol>,
    /// Raw transport token, kept for unknown protocols
    pub protocol_str: String,
    /// Raw format list, used when the codec store is empty
    pub format_str: String,
    /// Codec store in preference order
    pub codecs: Vec<RtpPayloadType>,
    pub ptime: u32,
    pub media_id: String,
    pub label: String,
    pub flags: MediaFlags,
    pub streams: Vec<PacketStream>,
    pub ice_agent: Option<IceAgentState>,
    /// SDES parameter sets to offer/answer with
    pub sdes_out: Vec<SdesParams>,
    /// Peer's fingerprint from the incoming SDP
    pub fingerprint: Option<Fingerprint>,
    /// Hash function chosen for our own fingerprint; sticky across
    /// rewrites once picked
    pub fp_hash_func: Option<&'static DtlsHashFunc>,
    /// tls-id of the active DTLS connection, if any
    pub dtls_tls_id: Option<Vec<u8>>,
    /// Uninterpreted attributes of the subscription source, re-emitted
    /// into our output
    pub sdp_attributes: Vec<OtherAttribute>,
    /// Bandwidth values of the subscription source (b=AS/RR/RS), -1 unset
    pub bandwidth_as: i32,
    pub bandwidth_rr: i32,
    pub bandwidth_rs: i32,
    /// Advertised endpoint of the subscription source, kept verbatim for
    /// MESSAGE media and force-relay operation
    pub subscription_endpoint: Option<Endpoint>,
    pub desired_family: Option<AddressFamily>,
}

impl CallMedia {
    pub fn new(type_id: MediaType) -> Self {
        CallMedia {
            type_id,
            bandwidth_as: -1,
            bandwidth_rr: -1,
            bandwidth_rs: -1,
            ..Default::default()
        }
    }

    /// First (RTP) packet stream, if any.
    pub fn first_stream(&self) -> Option<&PacketStream> {
        self.streams.first()
    }
}

/// One signaling party of a call, owning the media lines facing it.
#[derive(Debug, Clone, Default)]
pub struct Monologue {
    pub medias: Vec<CallMedia>,
    /// Origin of the first SDP ever received from this party
    pub session_sdp_orig: Option<SdpOrigin>,
    /// Origin last sent towards this party, version cache included
    pub session_last_sdp_orig: Option<SdpOrigin>,
    /// Session name stored on first rewrite, reused afterwards
    pub sdp_session_name: Option<String>,
    pub sdp_session_timing: Option<String>,
    /// Session-level b=RR/RS of the source, -1 unset
    pub sdp_session_rr: i32,
    pub sdp_session_rs: i32,
    /// Byte-exact copy of the previous outgoing SDP, for version checks
    pub last_out_sdp: Option<String>,
    /// Session-level uninterpreted attributes of the source
    pub sdp_attributes: Vec<OtherAttribute>,
    pub dtls_cert: Option<DtlsCert>,
}

impl Monologue {
    pub fn new() -> Self {
        Monologue {
            sdp_session_rr: -1,
            sdp_session_rs: -1,
            ..Default::default()
        }
    }
}
