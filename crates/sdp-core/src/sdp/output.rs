//! Attribute emission and from-scratch SDP generation.
//!
//! Everything here writes synthesized lines (always `\r\n` terminated)
//! into an output buffer. Each appended attribute passes through the
//! manipulation engine, so remove/substitute directives apply to
//! generated attributes the same way they apply to copied ones.

use base64::engine::general_purpose::STANDARD as B64_STANDARD;
use base64::Engine;
use tracing::error;

use crate::error::{Error, Result};
use crate::flags::{IceOption, OpMode, SdpFlags};
use crate::ice::{
    ice_local_pref_from_prio, ice_priority_pref, ice_type_pref_from_prio, ice_type_preference,
    IceCandidateType,
};
use crate::media::{CallMedia, DtlsCert, MediaType, Monologue, PacketStream, StreamSock};
use crate::protocol::proto_is_rtp;
use crate::sdp::attributes::{AttrId, AttrPayload, SdpAttrType};
use crate::sdp::manipulations::{manipulate_remove, manipulations_subst};
use crate::sdp::parser::SdpMedia;
use crate::sdp::span::AddressFamily;

/// Software identifier used as the default session name of generated SDP.
pub const SOFTWARE_ID: &str = "rtpbridge";

/// Appends `a=<name>[<sep><value>]\r\n`, subject to remove/substitute
/// directives matched against both the bare name and the complete
/// rendered attribute.
fn generic_append_attr(
    out: &mut String,
    name: &str,
    sep: char,
    value: Option<&str>,
    flags: &SdpFlags,
    media_type: MediaType,
) {
    let manips = flags.manipulations(media_type);

    let attr_subst = manipulations_subst(manips, name);

    if manipulate_remove(manips, name) {
        return;
    }

    out.push_str("a=");

    match attr_subst {
        Some(subst) => out.push_str(subst),
        None => {
            let attr_start = out.len();
            out.push_str(name);

            if let Some(value) = value.filter(|v| !v.is_empty()) {
                out.push(sep);
                out.push_str(value);

                // the complete attribute string may be targeted as well
                let complete = out[attr_start..].to_string();
                if manipulate_remove(manips, &complete) {
                    out.truncate(attr_start - 2);
                    return;
                }
                if let Some(subst) = manipulations_subst(manips, &complete) {
                    out.truncate(attr_start);
                    out.push_str(subst);
                }
            }
        }
    }

    out.push_str("\r\n");
}

/// `a=<name>:<value>` (or a bare flag when `value` is `None`).
pub(crate) fn append_attr(
    out: &mut String,
    name: &str,
    value: Option<&str>,
    flags: &SdpFlags,
    media_type: MediaType,
) {
    generic_append_attr(out, name, ':', value, flags, media_type);
}

/// `a=<name>:<tag> <value>`.
pub(crate) fn append_tagged_attr(
    out: &mut String,
    name: &str,
    tag: &str,
    value: &str,
    flags: &SdpFlags,
    media_type: MediaType,
) {
    if manipulate_remove(flags.manipulations(media_type), name) {
        return;
    }
    let tagged = format!("{}:{}", name, tag);
    generic_append_attr(out, &tagged, ' ', Some(value), flags, media_type);
}

/// `a=<name>:<tag> <value>` with a numeric tag.
pub(crate) fn append_int_tagged_attr(
    out: &mut String,
    name: &str,
    tag: u32,
    value: Option<&str>,
    flags: &SdpFlags,
    media_type: MediaType,
) {
    if manipulate_remove(flags.manipulations(media_type), name) {
        return;
    }
    let tagged = format!("{}:{}", name, tag);
    generic_append_attr(out, &tagged, ' ', value, flags, media_type);
}

/// `a=<name>:<int>`.
pub(crate) fn append_attr_int(
    out: &mut String,
    name: &str,
    value: u32,
    flags: &SdpFlags,
    media_type: MediaType,
) {
    append_int_tagged_attr(out, name, value, None, flags, media_type);
}

/// Direction attribute for a media's current send/recv state.
pub(crate) fn sdp_get_sendrecv(media: &CallMedia) -> &'static str {
    match (media.flags.send, media.flags.recv) {
        (true, true) => "sendrecv",
        (true, false) => "sendonly",
        (false, true) => "recvonly",
        (false, false) => "inactive",
    }
}

/// Space-separated payload type numbers in preference order, or the raw
/// format string for non-RTP protocols.
pub(crate) fn print_codec_list(out: &mut String, media: &CallMedia) {
    if !proto_is_rtp(media.protocol) {
        out.push_str(&media.format_str);
        return;
    }
    // empty codec store: legacy protocol or usage error, emit nothing
    for (i, pt) in media.codecs.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&pt.payload_type.to_string());
    }
}

/// rtpmap/fmtp/rtcp-fb lines for every codec in preference order.
fn insert_codec_parameters(out: &mut String, media: &CallMedia, flags: &SdpFlags) {
    for pt in &media.codecs {
        if pt.encoding_with_params.is_empty() {
            continue;
        }

        append_int_tagged_attr(
            out,
            "rtpmap",
            pt.payload_type as u32,
            Some(&pt.encoding_with_params),
            flags,
            media.type_id,
        );

        if !pt.format_parameters.is_empty() {
            append_int_tagged_attr(
                out,
                "fmtp",
                pt.payload_type as u32,
                Some(&pt.format_parameters),
                flags,
                media.type_id,
            );
        }

        for fb in &pt.rtcp_fb {
            append_int_tagged_attr(
                out,
                "rtcp-fb",
                pt.payload_type as u32,
                Some(fb),
                flags,
                media.type_id,
            );
        }
    }
}

/// Uninterpreted attributes carried over from the subscription source.
fn insert_carried_attributes(out: &mut String, media: &CallMedia, flags: &SdpFlags) {
    for attr in &media.sdp_attributes {
        if attr.typ == SdpAttrType::Extmap && flags.strip_extmap && !media.flags.passthru {
            continue;
        }
        let value = if attr.value.is_empty() {
            None
        } else {
            Some(attr.value.as_str())
        };
        append_attr(out, &attr.name, value, flags, media.type_id);
    }
}

/// The address written into synthesized lines for a stream: the media
/// address override if set, else the selected socket's advertised
/// address; on-hold zero addresses are preserved when requested.
pub(crate) fn stream_address(
    sock: &StreamSock,
    ps: &PacketStream,
    flags: &SdpFlags,
    keep_unspec: bool,
) -> std::net::IpAddr {
    if let Some(addr) = flags.parsed_media_address {
        return addr;
    }
    if keep_unspec
        && ps
            .advertised_endpoint
            .map(|e| e.address.is_unspecified())
            .unwrap_or(false)
    {
        return AddressFamily::of(&sock.advertised_address).unspecified();
    }
    sock.advertised_address
}

fn insert_ice_address(out: &mut String, sock: &StreamSock, ps: &PacketStream, flags: &SdpFlags) {
    let addr = stream_address(sock, ps, flags, false);
    out.push_str(&addr.to_string());
    out.push_str(&format!(" {}", sock.local_port));
}

fn insert_raddr_rport(out: &mut String, sock: &StreamSock, ps: &PacketStream, flags: &SdpFlags) {
    out.push_str(" raddr ");
    let addr = stream_address(sock, ps, flags, false);
    out.push_str(&addr.to_string());
    out.push_str(" rport ");
    out.push_str(&sock.local_port.to_string());
}

/// Derives candidate preferences that slot just below the peer's own
/// candidates, used in passthrough mode to keep our priorities distinct
/// but comparable.
fn new_priority(media: Option<&SdpMedia>, typ: IceCandidateType) -> (u32, u32) {
    let mut tpref = ice_type_preference(typ);
    let mut lpref = 0u32;
    let mut prio = ice_priority_pref(tpref, lpref, 1);

    let Some(media) = media else {
        return (tpref, lpref);
    };

    for attr in media.attributes.get_all(AttrId::Candidate) {
        let AttrPayload::Candidate(c) = &attr.payload else {
            continue;
        };
        let Some(cand) = &c.parsed else {
            continue;
        };
        if cand.priority <= prio && cand.typ == typ && cand.component_id == 1 {
            tpref = ice_type_pref_from_prio(cand.priority);
            lpref = ice_local_pref_from_prio(cand.priority);
            if lpref > 0 {
                lpref -= 1;
            } else {
                // out of room below the peer's local preference
                if tpref > 0 {
                    tpref -= 1;
                }
                lpref = 65535;
            }
            prio = ice_priority_pref(tpref, lpref, 1);
        }
    }

    (tpref, lpref)
}

fn insert_candidate(
    out: &mut String,
    sock: &StreamSock,
    ps: &PacketStream,
    type_pref: u32,
    local_pref: Option<u32>,
    typ: IceCandidateType,
    flags: &SdpFlags,
    media_type: MediaType,
) {
    let local_pref = local_pref.unwrap_or(sock.unique_id);
    let priority = ice_priority_pref(type_pref, local_pref, ps.component);

    let mut value = String::new();
    value.push_str(&format!("{} UDP {} ", ps.component, priority));
    insert_ice_address(&mut value, sock, ps, flags);
    value.push_str(" typ ");
    value.push_str(typ.as_str());
    // raddr and rport are required for non-host candidates, rfc5245
    // section 15.1
    if typ != IceCandidateType::Host {
        insert_raddr_rport(&mut value, sock, ps, flags);
    }

    append_tagged_attr(out, "candidate", &sock.ice_foundation, &value, flags, media_type);
}

fn insert_sock_candidates(
    out: &mut String,
    ps: &PacketStream,
    type_pref: u32,
    mut local_pref: Option<u32>,
    typ: IceCandidateType,
    flags: &SdpFlags,
    media_type: MediaType,
) {
    for sock in &ps.sockets {
        insert_candidate(out, sock, ps, type_pref, local_pref, typ, flags, media_type);
        if let Some(lp) = local_pref.as_mut() {
            *lp += 1;
        }
    }
}

fn insert_candidates(
    out: &mut String,
    media: &CallMedia,
    rtp: &PacketStream,
    rtcp: Option<&PacketStream>,
    flags: &SdpFlags,
    sdp_media: Option<&SdpMedia>,
) {
    let media_type = media.type_id;

    let cand_type = if flags.ice_option == IceOption::ForceRelay {
        IceCandidateType::Relay
    } else {
        IceCandidateType::Host
    };

    let (type_pref, local_pref) = if media.flags.passthru && sdp_media.is_some() {
        let (t, l) = new_priority(sdp_media, cand_type);
        (t, Some(l))
    } else {
        (ice_type_preference(cand_type), None)
    };

    if let Some(ag) = media.ice_agent.as_ref().filter(|ag| ag.completed) {
        // past negotiation only the selected pair is advertised
        let Some(sock) = rtp.selected_sock() else {
            return;
        };
        insert_candidate(
            out,
            sock,
            rtp,
            type_pref,
            Some(sock.unique_id),
            cand_type,
            flags,
            media_type,
        );
        if let Some(rtcp) = rtcp {
            if let Some(rtcp_sock) = rtcp.selected_sock() {
                insert_candidate(
                    out,
                    rtcp_sock,
                    rtcp,
                    type_pref,
                    Some(sock.unique_id),
                    cand_type,
                    flags,
                    media_type,
                );
            }
        }

        if flags.opmode == OpMode::Offer && ag.controlling {
            let mut value = String::new();
            for (i, cand) in ag.remote_candidates.iter().enumerate() {
                if i > 0 {
                    value.push(' ');
                }
                value.push_str(&format!(
                    "{} {} {}",
                    cand.component_id, cand.endpoint.address, cand.endpoint.port
                ));
            }
            append_attr(out, "remote-candidates", Some(&value), flags, media_type);
        }
        return;
    }

    insert_sock_candidates(out, rtp, type_pref, local_pref, cand_type, flags, media_type);

    if let Some(rtcp) = rtcp {
        insert_sock_candidates(out, rtcp, type_pref, local_pref, cand_type, flags, media_type);
    }
}

/// `a=setup`, `a=fingerprint` and `a=tls-id` for DTLS-SRTP. Picks and
/// remembers the hash function: the previously chosen one, else the
/// peer's, else the first the certificate offers.
fn insert_dtls(
    out: &mut String,
    media: &mut CallMedia,
    dtls_cert: Option<&DtlsCert>,
    flags: &SdpFlags,
) {
    let Some(proto) = media.protocol else {
        return;
    };
    if !proto.srtp {
        return;
    }
    let Some(cert) = dtls_cert else {
        return;
    };
    if !media.flags.dtls || media.flags.passthru || cert.fingerprints.is_empty() {
        return;
    }

    let hf = media
        .fp_hash_func
        .or_else(|| media.fingerprint.as_ref().map(|f| f.hash_func));

    let fp = match hf {
        None => &cert.fingerprints[0],
        Some(h) => cert
            .fingerprints
            .iter()
            .find(|fp| fp.hash_func.name.eq_ignore_ascii_case(h.name))
            .unwrap_or(&cert.fingerprints[0]),
    };
    media.fp_hash_func = Some(fp.hash_func);

    let setup = if media.flags.setup_passive && media.flags.setup_active {
        "actpass"
    } else if media.flags.setup_passive {
        "passive"
    } else if media.flags.setup_active {
        "active"
    } else {
        "holdconn"
    };
    append_attr(out, "setup", Some(setup), flags, media.type_id);

    let mut value = String::new();
    value.push_str(fp.hash_func.name);
    value.push(' ');
    for (i, b) in fp.digest.iter().enumerate() {
        if i > 0 {
            value.push(':');
        }
        value.push_str(&format!("{:02X}", b));
    }
    append_attr(out, "fingerprint", Some(&value), flags, media.type_id);

    if let Some(tls_id) = &media.dtls_tls_id {
        let mut value = String::new();
        for b in tls_id {
            value.push_str(&format!("{:02x}", b));
        }
        append_attr(out, "tls-id", Some(&value), flags, media.type_id);
    }
}

/// One `a=crypto` line per outgoing SDES parameter set.
fn insert_crypto(out: &mut String, media: &CallMedia, flags: &SdpFlags) {
    let Some(proto) = media.protocol else {
        return;
    };
    if !proto.srtp {
        return;
    }
    if !media.flags.sdes || media.flags.passthru {
        return;
    }

    for cps in &media.sdes_out {
        let mut key_salt = Vec::with_capacity(cps.master_key.len() + cps.master_salt.len());
        key_salt.extend_from_slice(&cps.master_key);
        key_salt.extend_from_slice(&cps.master_salt);
        let mut b64 = B64_STANDARD.encode(&key_salt);
        if !flags.sdes_pad {
            // truncate trailing padding
            while b64.ends_with('=') {
                b64.pop();
            }
        }

        let mut value = String::new();
        value.push_str(cps.suite.name);
        value.push_str(" inline:");
        value.push_str(&b64);

        if flags.sdes_lifetime {
            value.push_str("|2^31");
        }
        if !cps.mki.is_empty() {
            let mut mki_value = 0u64;
            for (i, b) in cps.mki.iter().rev().take(8).enumerate() {
                mki_value |= (*b as u64) << (i * 8);
            }
            value.push_str(&format!("|{}:{}", mki_value, cps.mki.len()));
        }
        if cps.unencrypted_srtp {
            value.push_str(" UNENCRYPTED_SRTP");
        }
        if cps.unencrypted_srtcp {
            value.push_str(" UNENCRYPTED_SRTCP");
        }
        if cps.unauthenticated_srtp {
            value.push_str(" UNAUTHENTICATED_SRTP");
        }

        append_int_tagged_attr(out, "crypto", cps.tag, Some(&value), flags, media.type_id);
    }
}

fn insert_rtcp_attr(
    out: &mut String,
    ps: &PacketStream,
    flags: &SdpFlags,
    media_type: MediaType,
) {
    if flags.no_rtcp_attr {
        return;
    }
    let Some(sock) = ps.selected_sock() else {
        return;
    };
    let mut value = sock.local_port.to_string();
    if flags.full_rtcp_attr {
        let addr = stream_address(sock, ps, flags, false);
        value.push_str(&format!(
            " IN {} {}",
            AddressFamily::of(&addr).rfc_name(),
            addr
        ));
    }
    append_attr(out, "rtcp", Some(&value), flags, media_type);
}

/// Emits `a=rtcp` / `a=rtcp-mux` as appropriate and returns the RTCP
/// sibling stream that still needs its own candidates, if any.
fn print_rtcp(
    out: &mut String,
    media: &CallMedia,
    rtp_idx: usize,
    flags: &SdpFlags,
    sdp_media: Option<&SdpMedia>,
) -> Option<usize> {
    let media_type = sdp_media.map(|m| m.media_type_id).unwrap_or(MediaType::Unknown);
    let ps = media.streams.get(rtp_idx)?;

    let mut ps_rtcp = None;
    if let Some(sib) = ps.rtcp_sibling {
        if media.streams.get(sib).is_none() {
            return None;
        }
        ps_rtcp = Some(sib);
    }

    if !proto_is_rtp(media.protocol) {
        return None;
    }

    let mux_now = media.flags.rtcp_mux
        && (flags.opmode == OpMode::Answer
            || flags.opmode == OpMode::Publish
            || ((flags.opmode == OpMode::Offer || flags.opmode == OpMode::Request)
                && flags.rtcp_mux_require)
            || flags.opmode == OpMode::Other);

    if mux_now {
        insert_rtcp_attr(out, ps, flags, media_type);
        append_attr(out, "rtcp-mux", None, flags, media.type_id);
        return None;
    }

    if let Some(rtcp_idx) = ps_rtcp {
        if flags.ice_option != IceOption::ForceRelay {
            insert_rtcp_attr(out, &media.streams[rtcp_idx], flags, media_type);
            if media.flags.rtcp_mux {
                append_attr(out, "rtcp-mux", None, flags, media.type_id);
            }
        }
    }

    ps_rtcp
}

/// Session-level lines synthesized after the copied session header.
pub(crate) fn print_sdp_session_section(out: &mut String, flags: &SdpFlags, media: &CallMedia) {
    if flags.loop_protect {
        append_attr(
            out,
            "rtpengine",
            Some(crate::sdp::instance_id()),
            flags,
            MediaType::Unknown,
        );
    }
    if media.flags.ice && media.flags.ice_lite_self {
        append_attr(out, "ice-lite", None, flags, MediaType::Unknown);
    }
}

/// The synthesized attribute block of one media section, shared between
/// the replace and create paths.
pub(crate) fn print_sdp_media_section(
    out: &mut String,
    media: &mut CallMedia,
    dtls_cert: Option<&DtlsCert>,
    sdp_media: Option<&SdpMedia>,
    flags: &SdpFlags,
    rtp_idx: usize,
    is_active: bool,
    force_end_of_ice: bool,
) {
    if !media.media_id.is_empty() {
        append_attr(out, "mid", Some(media.media_id.as_str()), flags, media.type_id);
    }
    if !media.label.is_empty() && flags.siprec {
        append_attr(out, "label", Some(media.label.as_str()), flags, media.type_id);
    }

    if is_active {
        if proto_is_rtp(media.protocol) {
            insert_codec_parameters(out, media, flags);
        }

        insert_carried_attributes(out, media, flags);

        if !flags.original_sendrecv {
            append_attr(out, sdp_get_sendrecv(media), None, flags, media.type_id);
        }

        let ps_rtcp = print_rtcp(out, media, rtp_idx, flags, sdp_media);

        if proto_is_rtp(media.protocol) {
            insert_crypto(out, media, flags);
            insert_dtls(out, media, dtls_cert, flags);

            if media.ptime != 0 {
                append_attr_int(out, "ptime", media.ptime, flags, media.type_id);
            }
        }

        if media.flags.ice {
            if let Some(ag) = &media.ice_agent {
                append_attr(out, "ice-ufrag", Some(ag.ufrag.as_str()), flags, media.type_id);
                append_attr(out, "ice-pwd", Some(ag.pwd.as_str()), flags, media.type_id);
            }
        }

        if media.flags.trickle_ice && media.ice_agent.is_some() {
            append_attr(out, "ice-options", Some("trickle"), flags, media.type_id);
        }

        if media.flags.ice {
            if let Some(rtp) = media.streams.get(rtp_idx) {
                let rtcp = ps_rtcp.and_then(|i| media.streams.get(i));
                insert_candidates(out, media, rtp, rtcp, flags, sdp_media);
            }
        }
    }

    if (media.flags.trickle_ice && media.ice_agent.is_some()) || force_end_of_ice {
        append_attr(out, "end-of-candidates", None, flags, media.type_id);
    }
}

fn create_err(msg: &str) -> Error {
    error!("Failed to create SDP: {}", msg);
    Error::SdpCreate(msg.to_string())
}

fn add_origin(out: &mut String, monologue: &Monologue, first_sock: &StreamSock, flags: &SdpFlags) -> Result<()> {
    let orig = monologue
        .session_sdp_orig
        .as_ref()
        .ok_or_else(|| create_err("No session origin"))?;
    let last = monologue.session_last_sdp_orig.as_ref();

    let username = match last {
        Some(last) if flags.replace_username || flags.replace_origin_full => &last.username,
        _ => &orig.username,
    };
    let session_id = match last {
        Some(last) if flags.replace_origin_full => &last.session_id,
        _ => &orig.session_id,
    };
    let version = match last {
        Some(last) if flags.replace_origin_full => last.version_num,
        _ => orig.version_num,
    };

    let (addr_type, address) = if flags.replace_origin || flags.replace_origin_full {
        let addr = first_sock.advertised_address;
        (
            AddressFamily::of(&addr).rfc_name().to_string(),
            addr.to_string(),
        )
    } else {
        (orig.address_type.clone(), orig.address.clone())
    };

    out.push_str(&format!(
        "o={} {} {} IN {} {}\r\n",
        username, session_id, version, addr_type, address
    ));
    Ok(())
}

fn add_media_connection(out: &mut String, media: &CallMedia, rtp_sock: &StreamSock, flags: &SdpFlags) {
    // keep the original media connection for message media / force relay
    if (media.type_id == MediaType::Message || flags.ice_option == IceOption::ForceRelay)
        && media.subscription_endpoint.is_some()
    {
        let ep = media.subscription_endpoint.expect("checked above");
        let family = media
            .desired_family
            .unwrap_or_else(|| AddressFamily::of(&ep.address));
        out.push_str(&format!("c=IN {} {}\r\n", family.rfc_name(), ep.address));
        return;
    }

    let addr = flags
        .parsed_media_address
        .unwrap_or(rtp_sock.advertised_address);
    out.push_str(&format!(
        "c=IN {} {}\r\n",
        AddressFamily::of(&addr).rfc_name(),
        addr
    ));
}

/// Generates a complete SDP body from the call state, without an input
/// body to rewrite.
pub fn sdp_create(monologue: &mut Monologue, flags: &SdpFlags) -> Result<String> {
    if monologue.medias.is_empty() {
        return Err(create_err("Need at least one media"));
    }

    let first_sock = {
        let media = &monologue.medias[0];
        let ps = media
            .first_stream()
            .ok_or_else(|| create_err("No media stream"))?;
        ps.selected_sock()
            .ok_or_else(|| create_err("No packet stream"))?
            .clone()
    };

    let mut out = String::from("v=0\r\n");

    add_origin(&mut out, monologue, &first_sock, flags)?;

    let session_name = monologue
        .sdp_session_name
        .as_deref()
        .unwrap_or(SOFTWARE_ID);
    out.push_str(&format!("s={}\r\n", session_name));

    // session-level bandwidth; zero is meaningful (disables RTCP)
    if monologue.sdp_session_rr >= 0 {
        out.push_str(&format!("b=RR:{}\r\n", monologue.sdp_session_rr));
    }
    if monologue.sdp_session_rs >= 0 {
        out.push_str(&format!("b=RS:{}\r\n", monologue.sdp_session_rs));
    }

    let timing = monologue.sdp_session_timing.as_deref().unwrap_or("0 0");
    out.push_str(&format!("t={}\r\n", timing));

    for attr in &monologue.sdp_attributes {
        if attr.typ == SdpAttrType::Extmap && flags.strip_extmap {
            continue;
        }
        let value = if attr.value.is_empty() {
            None
        } else {
            Some(attr.value.as_str())
        };
        append_attr(&mut out, &attr.name, value, flags, MediaType::Unknown);
    }

    let dtls_cert = monologue.dtls_cert.clone();

    for media in &mut monologue.medias {
        if media.streams.is_empty() {
            return Err(create_err("Zero length media stream"));
        }
        let rtp_sock = {
            let ps = &media.streams[0];
            ps.selected_sock()
                .ok_or_else(|| create_err("No selected socket"))?
                .clone()
        };

        if media.protocol.is_none() && media.protocol_str.is_empty() {
            return Err(create_err("Unknown media protocol"));
        }
        let proto_name = media
            .protocol
            .map(|p| p.name.to_string())
            .unwrap_or_else(|| media.protocol_str.clone());
        out.push_str(&format!(
            "m={} {} {} ",
            media.type_str, rtp_sock.local_port, proto_name
        ));
        print_codec_list(&mut out, media);
        out.push_str("\r\n");

        add_media_connection(&mut out, media, &rtp_sock, flags);

        // per-media bandwidth from the subscription source
        if media.bandwidth_as >= 0 {
            out.push_str(&format!("b=AS:{}\r\n", media.bandwidth_as));
        }
        if media.bandwidth_rr >= 0 {
            out.push_str(&format!("b=RR:{}\r\n", media.bandwidth_rr));
        }
        if media.bandwidth_rs >= 0 {
            out.push_str(&format!("b=RS:{}\r\n", media.bandwidth_rs));
        }

        print_sdp_media_section(
            &mut out,
            media,
            dtls_cert.as_ref(),
            None,
            flags,
            0,
            true,
            false,
        );
    }

    Ok(out)
}
