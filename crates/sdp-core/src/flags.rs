//! Per-operation flags controlling parsing, extraction and rewriting.
//!
//! This mirrors the dictionary of options a controlling application hands
//! to the relay along with each SDP body. Everything is plain data; the
//! flags struct also accumulates a few values captured during stream
//! extraction (origin, session name, timing) that the create path reuses.

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::media::{MediaType, OtherAttribute, SdpOrigin};
use crate::sdp::span::AddressFamily;

/// How to treat ICE attributes during a rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IceOption {
    #[default]
    Default,
    Remove,
    Force,
    ForceRelay,
}

/// The signaling operation an SDP body belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OpMode {
    #[default]
    Offer,
    Answer,
    Publish,
    Subscribe,
    Request,
    Other,
}

/// Attribute manipulation directives for one session level.
///
/// Names are matched case-insensitively against an attribute's key
/// (`rtpmap:0`), name (`rtpmap`) and full line value, in that order.
#[derive(Debug, Clone, Default)]
pub struct SdpManipulations {
    add: Vec<String>,
    remove: HashSet<String>,
    substitute: HashMap<String, String>,
}

impl SdpManipulations {
    /// Queues an attribute body (without `a=`) for injection.
    pub fn add_command(&mut self, body: impl Into<String>) {
        self.add.push(body.into());
    }

    /// Registers a removal directive.
    pub fn remove_command(&mut self, name: impl AsRef<str>) {
        self.remove.insert(name.as_ref().to_ascii_lowercase());
    }

    /// Registers a substitution directive.
    pub fn subst_command(&mut self, from: impl AsRef<str>, to: impl Into<String>) {
        self.substitute
            .insert(from.as_ref().to_ascii_lowercase(), to.into());
    }

    pub fn add_commands(&self) -> &[String] {
        &self.add
    }

    pub fn matches_remove(&self, name: &str) -> bool {
        if name.is_empty() {
            return false;
        }
        self.remove.contains(&name.to_ascii_lowercase())
    }

    pub fn lookup_subst(&self, name: &str) -> Option<&str> {
        if name.is_empty() {
            return None;
        }
        self.substitute
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty() && self.substitute.is_empty()
    }
}

/// All options for one parse/extract/rewrite cycle.
#[derive(Debug, Clone, Default)]
pub struct SdpFlags {
    /// Body is a trickle-ICE SDP fragment, not a full session
    pub fragment: bool,
    /// Trust addresses inside the SDP rather than the signaling source
    pub trust_address: bool,
    pub asymmetric: bool,
    pub unidirectional: bool,
    pub strict_source: bool,
    pub media_handover: bool,
    /// Pass direction attributes through instead of regenerating them
    pub original_sendrecv: bool,
    pub osrtp_accept_legacy: bool,
    pub osrtp_offer_legacy: bool,
    pub siprec: bool,
    /// Tag outgoing SDP with our instance id and detect loops
    pub loop_protect: bool,
    pub no_rtcp_attr: bool,
    /// Emit `a=rtcp` with the full address, not just the port
    pub full_rtcp_attr: bool,
    pub rtcp_mux_require: bool,
    pub strip_extmap: bool,
    pub replace_username: bool,
    pub replace_origin: bool,
    pub replace_origin_full: bool,
    pub replace_sess_name: bool,
    pub replace_sdp_version: bool,
    pub force_inc_sdp_ver: bool,
    /// Keep base64 padding on emitted SDES keys
    pub sdes_pad: bool,
    /// Emit the default key lifetime on SDES keys
    pub sdes_lifetime: bool,
    /// Strict parsing: reject bodies with stray blank lines
    pub reject_invalid_sdp: bool,

    pub ice_option: IceOption,
    pub opmode: OpMode,

    pub address_family: Option<AddressFamily>,
    /// Interface direction pair (receiving side, sending side)
    pub direction: [Option<String>; 2],
    /// Override for all advertised addresses
    pub media_address: Option<String>,
    pub parsed_media_address: Option<IpAddr>,
    /// Signaling source address, used when `trust_address` is unset
    pub received_from_address: Option<String>,
    pub received_from_family: Option<AddressFamily>,
    pub parsed_received_from: Option<IpAddr>,

    manipulations: HashMap<MediaType, SdpManipulations>,

    // Captured by stream extraction for later use by the create path.
    /// Session-level uninterpreted attributes of the parsed body
    pub session_attributes: Vec<OtherAttribute>,
    /// Origin of the first parsed session
    pub session_sdp_orig: Option<SdpOrigin>,
    pub session_sdp_name: String,
    pub session_timing: String,
    pub session_rr: i32,
    pub session_rs: i32,
}

impl SdpFlags {
    pub fn new() -> Self {
        SdpFlags {
            session_rr: -1,
            session_rs: -1,
            ..Default::default()
        }
    }

    /// Manipulation directives for a media type level; `MediaType::Unknown`
    /// addresses the global (session) level.
    pub fn manipulations(&self, media_type: MediaType) -> Option<&SdpManipulations> {
        self.manipulations.get(&media_type)
    }

    /// Mutable access for building up directives, creating the level on
    /// first use.
    pub fn manipulations_mut(&mut self, media_type: MediaType) -> &mut SdpManipulations {
        self.manipulations.entry(media_type).or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manipulations_case_insensitive() {
        let mut m = SdpManipulations::default();
        m.remove_command("Rtpmap:0");
        assert!(m.matches_remove("rtpmap:0"));
        assert!(m.matches_remove("RTPMAP:0"));
        assert!(!m.matches_remove("rtpmap:8"));
        assert!(!m.matches_remove(""));
    }

    #[test]
    fn test_subst_lookup() {
        let mut m = SdpManipulations::default();
        m.subst_command("ptime", "ptime:30");
        assert_eq!(m.lookup_subst("PTIME"), Some("ptime:30"));
        assert_eq!(m.lookup_subst("maxptime"), None);
    }

    #[test]
    fn test_flags_levels() {
        let mut flags = SdpFlags::new();
        flags
            .manipulations_mut(MediaType::Audio)
            .remove_command("crypto");
        assert!(flags.manipulations(MediaType::Audio).is_some());
        assert!(flags.manipulations(MediaType::Video).is_none());
        assert!(flags.manipulations(MediaType::Unknown).is_none());
    }
}
