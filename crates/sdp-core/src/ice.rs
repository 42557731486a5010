//! ICE candidate model and priority arithmetic (RFC 5245 / RFC 8839).
//!
//! The ICE agent state machine itself lives outside this crate; what is
//! modeled here is the candidate data carried through SDP and the priority
//! formulas the rewriter needs when it emits candidates of its own.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::media::Endpoint;

/// Candidate transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SocketType {
    Udp,
    Tcp,
}

impl SocketType {
    pub fn from_token(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("UDP") {
            Some(SocketType::Udp)
        } else if s.eq_ignore_ascii_case("TCP") {
            Some(SocketType::Tcp)
        } else {
            None
        }
    }
}

/// Candidate type per RFC 5245 section 4.1.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IceCandidateType {
    Host,
    Srflx,
    Prflx,
    Relay,
}

impl IceCandidateType {
    pub fn from_token(s: &str) -> Option<Self> {
        match s {
            "host" => Some(IceCandidateType::Host),
            "srflx" => Some(IceCandidateType::Srflx),
            "prflx" => Some(IceCandidateType::Prflx),
            "relay" => Some(IceCandidateType::Relay),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IceCandidateType::Host => "host",
            IceCandidateType::Srflx => "srflx",
            IceCandidateType::Prflx => "prflx",
            IceCandidateType::Relay => "relay",
        }
    }

    /// Whether candidates of this type carry `raddr`/`rport`.
    pub fn has_related(&self) -> bool {
        !matches!(self, IceCandidateType::Host)
    }
}

/// A single ICE candidate, parsed from or destined for an `a=candidate`
/// line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub foundation: String,
    pub component_id: u32,
    pub transport: SocketType,
    pub priority: u32,
    pub endpoint: Endpoint,
    pub typ: IceCandidateType,
    pub related: Option<Endpoint>,
    /// Per-candidate ufrag from the extended attribute syntax
    pub ufrag: Option<String>,
}

/// RFC 5245 recommended type preference.
pub fn ice_type_preference(typ: IceCandidateType) -> u32 {
    match typ {
        IceCandidateType::Host => 126,
        IceCandidateType::Prflx => 110,
        IceCandidateType::Srflx => 100,
        IceCandidateType::Relay => 0,
    }
}

/// Candidate priority from type preference, local preference and
/// component id (RFC 5245 section 4.1.2.1).
pub fn ice_priority_pref(type_pref: u32, local_pref: u32, component: u32) -> u32 {
    (type_pref << 24) | (local_pref << 8) | (256 - component)
}

/// Type preference recovered from a priority value.
pub fn ice_type_pref_from_prio(prio: u32) -> u32 {
    prio >> 24
}

/// Local preference recovered from a priority value.
pub fn ice_local_pref_from_prio(prio: u32) -> u32 {
    (prio >> 8) & 0xffff
}

/// Whether an endpoint is the trickle-ICE placeholder: the unspecified
/// address with the discard port.
pub fn is_trickle_ice_address(ep: &Endpoint) -> bool {
    ep.address.is_unspecified() && ep.port == 9
}

/// Convenience for tests and the rewriter: a host candidate on a local
/// address.
pub fn host_candidate(foundation: &str, component_id: u32, address: IpAddr, port: u16) -> IceCandidate {
    let type_pref = ice_type_preference(IceCandidateType::Host);
    IceCandidate {
        foundation: foundation.to_string(),
        component_id,
        transport: SocketType::Udp,
        priority: ice_priority_pref(type_pref, 65535, component_id),
        endpoint: Endpoint { address, port },
        typ: IceCandidateType::Host,
        related: None,
        ufrag: None,
    }
}
