//! In-place SDP rewriting and output version reconciliation.
//!
//! The replace path walks the parsed session tree in input order, keeping
//! untouched bytes identical, substituting the relay's own addresses,
//! ports, transports and security parameters, and appending the
//! synthesized attribute blocks. The version reconciler restamps `o=`
//! version numbers afterwards, bumping them only when the output
//! actually changed since the last rewrite towards the same party.

use tracing::{error, warn};

use crate::error::{Error, Result};
use crate::flags::{IceOption, OpMode, SdpFlags};
use crate::media::{CallMedia, DtlsCert, MediaType, Monologue, PacketStream};
use crate::protocol::{protocol, TransportProtocol};
use crate::sdp::attributes::{AttrId, AttrPayload, Attributes, GroupSemantics};
use crate::sdp::chopper::SdpChopper;
use crate::sdp::manipulations::{
    manipulate_remove_attr, manipulations_add, manipulations_subst_attr,
};
use crate::sdp::output::{print_codec_list, print_sdp_media_section, print_sdp_session_section, stream_address};
use crate::sdp::parser::{SdpMedia, SdpSession, SdpSessions};
use crate::sdp::span::{parse_address_any, AddressFamily, NetworkAddress, Span};

fn rewrite_err(msg: &str) -> Error {
    error!("Error rewriting SDP: {}", msg);
    Error::SdpRewrite(msg.to_string())
}

fn replace_media_type(
    chop: &mut SdpChopper<'_>,
    media: &SdpMedia,
    call_media: &CallMedia,
) -> Result<()> {
    if call_media.type_str.is_empty() {
        return Ok(());
    }
    chop.copy_up_to(media.media_type_str)?;
    chop.append(&call_media.type_str);
    chop.skip_over(media.media_type_str)
}

fn replace_media_port(
    chop: &mut SdpChopper<'_>,
    media: &SdpMedia,
    ps: &PacketStream,
) -> Result<()> {
    if media.port_num == 0 {
        return Ok(());
    }
    chop.copy_up_to(media.port)?;
    let port = ps.selected_sock().map(|s| s.local_port).unwrap_or(0);
    chop.append(&port.to_string());
    chop.skip_over(media.port)
}

fn replace_consecutive_port_count(
    chop: &mut SdpChopper<'_>,
    media: &SdpMedia,
    call_media: &CallMedia,
    ps: &PacketStream,
) -> Result<()> {
    if media.port_count == 1 || ps.selected.is_none() {
        return Ok(());
    }

    let base = ps.selected_sock().map(|s| s.local_port).unwrap_or(0);
    for cons in 1..media.port_count {
        let next_port = call_media
            .streams
            .get(cons as usize)
            .and_then(|p| p.selected_sock())
            .map(|s| s.local_port);
        if next_port != Some(base.wrapping_add(cons as u16)) {
            warn!("Failed to handle consecutive ports");
            return Ok(());
        }
    }

    chop.append(&format!("/{}", media.port_count));
    Ok(())
}

fn replace_transport_protocol(
    chop: &mut SdpChopper<'_>,
    media: &SdpMedia,
    call_media: &CallMedia,
) -> Result<()> {
    let Some(proto) = call_media.protocol else {
        return Ok(());
    };
    chop.copy_up_to(media.transport)?;
    chop.append(proto.name);
    chop.skip_over(media.transport)
}

fn replace_codec_list(
    chop: &mut SdpChopper<'_>,
    media: &SdpMedia,
    call_media: &CallMedia,
) -> Result<()> {
    chop.copy_up_to(media.formats)?;
    chop.skip_over(media.formats)?;
    print_codec_list(chop.output_mut(), call_media);
    Ok(())
}

/// Rewrites the `<addrtype> <address>` part of an address triple to the
/// relay's advertised address (or the configured media address).
fn replace_network_address(
    chop: &mut SdpChopper<'_>,
    address: &NetworkAddress,
    ps: &PacketStream,
    flags: &mut SdpFlags,
    keep_unspec: bool,
) -> Result<()> {
    chop.copy_up_to(address.address_type)?;

    if flags.parsed_media_address.is_none() {
        if let Some(media_address) = flags.media_address.as_deref() {
            flags.parsed_media_address = parse_address_any(media_address);
        }
    }

    let sock = ps
        .selected_sock()
        .or_else(|| ps.sockets.first())
        .ok_or_else(|| rewrite_err("no usable local socket"))?;
    let addr = stream_address(sock, ps, flags, keep_unspec);
    chop.append(&format!(
        "{} {}",
        AddressFamily::of(&addr).rfc_name(),
        addr
    ));

    chop.skip_over(address.address)
}

/// Inserts a copy of the session-level `c=` line into a media section
/// that has none of its own.
fn synth_session_connection(
    chop: &mut SdpChopper<'_>,
    session: &SdpSession,
    media: &SdpMedia,
) -> Result<()> {
    if !session.connection.parsed {
        return Err(rewrite_err("failed to generate connection line"));
    }

    match media.c_line_pos {
        Some(pos) => chop.copy_up_to(Span::new(pos, pos))?,
        None => chop.copy_remainder(),
    }

    chop.append("c=");
    chop.append(session.connection.s.slice(chop.input()));
    chop.append("\r\n");
    Ok(())
}

fn attr_is_relay_candidate(attr: &crate::sdp::attributes::SdpAttribute, src: &str) -> bool {
    if let AttrPayload::Candidate(c) = &attr.payload {
        if let Some(ts) = c.type_str {
            return ts.slice(src).eq_ignore_ascii_case("relay");
        }
    }
    false
}

fn strip_attr(chop: &mut SdpChopper<'_>, attr: &crate::sdp::attributes::SdpAttribute) -> Result<()> {
    chop.copy_up_to(attr.full_line)?;
    chop.skip_over(attr.full_line)
}

/// Filters the session-level attributes of the input.
fn process_session_attributes(
    chop: &mut SdpChopper<'_>,
    attrs: &Attributes,
    flags: &SdpFlags,
) -> Result<()> {
    let src = chop.input();
    let ice_strips = matches!(
        flags.ice_option,
        IceOption::Remove | IceOption::Force | IceOption::Default
    );

    for attr in attrs.iter() {
        let manips = flags.manipulations(MediaType::Unknown);

        let strip = match attr.id {
            AttrId::Ice
            | AttrId::IceUfrag
            | AttrId::IcePwd
            | AttrId::IceOptions
            | AttrId::IceLite => ice_strips,

            AttrId::Candidate => {
                if flags.ice_option == IceOption::ForceRelay {
                    attr_is_relay_candidate(attr, src)
                } else {
                    ice_strips
                }
            }

            AttrId::Fingerprint | AttrId::Setup | AttrId::TlsId | AttrId::Ignore => true,

            AttrId::Inactive | AttrId::Sendonly | AttrId::Recvonly | AttrId::Sendrecv => {
                !flags.original_sendrecv
            }

            AttrId::Group => attr.payload == AttrPayload::Group(GroupSemantics::Bundle),

            _ => false,
        };

        if strip || manipulate_remove_attr(manips, attr, src) {
            strip_attr(chop, attr)?;
            continue;
        }

        if let Some(subst) = manipulations_subst_attr(manips, attr, src) {
            let subst = subst.to_string();
            strip_attr(chop, attr)?;
            chop.append(&format!("a={}\r\n", subst));
        }
    }

    Ok(())
}

/// Filters the media-level attributes of the input.
fn process_media_attributes(
    chop: &mut SdpChopper<'_>,
    sdp: &SdpMedia,
    flags: &SdpFlags,
    media: &CallMedia,
) -> Result<()> {
    let src = chop.input();
    let ice_strips = matches!(
        flags.ice_option,
        IceOption::Remove | IceOption::Force | IceOption::Default
    );

    for attr in sdp.attributes.iter() {
        // sink-and-generator media emits its own clean SDP
        if media.flags.generator {
            strip_attr(chop, attr)?;
            continue;
        }

        let manips = flags.manipulations(sdp.media_type_id);

        let mut strip = match attr.id {
            AttrId::Ice
            | AttrId::IceUfrag
            | AttrId::IcePwd
            | AttrId::IceOptions
            | AttrId::IceLite => !media.flags.passthru && ice_strips,

            AttrId::Candidate => {
                if flags.ice_option == IceOption::ForceRelay {
                    attr_is_relay_candidate(attr, src)
                } else {
                    !media.flags.passthru && ice_strips
                }
            }

            // end-of-candidates and mid are re-inserted from call state
            AttrId::Ignore | AttrId::EndOfCandidates | AttrId::Mid => true,

            AttrId::Inactive | AttrId::Sendonly | AttrId::Recvonly | AttrId::Sendrecv => {
                !flags.original_sendrecv
            }

            // unknown attributes are re-added from the subscription
            AttrId::Other => true,

            _ => false,
        };

        // leave everything else alone if the protocol is unsupported
        if !strip && media.protocol.is_some() {
            strip = match attr.id {
                AttrId::Rtcp | AttrId::RtcpMux => flags.ice_option != IceOption::ForceRelay,

                AttrId::Rtpmap | AttrId::Fmtp => !media.codecs.is_empty(),

                AttrId::Ptime => media.ptime != 0,

                AttrId::RtcpFb => match &attr.payload {
                    // wildcard entries are left alone
                    AttrPayload::RtcpFb(fb) if fb.payload_type == -1 => false,
                    _ => !media.codecs.is_empty(),
                },

                AttrId::Crypto | AttrId::Fingerprint | AttrId::Setup | AttrId::TlsId => {
                    !media.flags.passthru
                }

                _ => false,
            };
        }

        if strip || manipulate_remove_attr(manips, attr, src) {
            strip_attr(chop, attr)?;
            continue;
        }

        if let Some(subst) = manipulations_subst_attr(manips, attr, src) {
            let subst = subst.to_string();
            strip_attr(chop, attr)?;
            chop.append(&format!("a={}\r\n", subst));
        }
    }

    Ok(())
}

fn replace_sdp_media_section(
    chop: &mut SdpChopper<'_>,
    call_media: &mut CallMedia,
    dtls_cert: Option<&DtlsCert>,
    session: &SdpSession,
    sdp_media: &SdpMedia,
    flags: &mut SdpFlags,
    keep_zero_address: bool,
) -> Result<()> {
    let ps = call_media
        .streams
        .first()
        .cloned()
        .ok_or_else(|| rewrite_err("no matching media stream"))?;

    let force_end_of_ice = sdp_media.attributes.has(AttrId::EndOfCandidates);
    let mut is_active = true;

    if flags.ice_option != IceOption::ForceRelay && call_media.type_id != MediaType::Message {
        replace_media_type(chop, sdp_media, call_media)
            .map_err(|_| rewrite_err("failed to replace media type"))?;
        replace_media_port(chop, sdp_media, &ps)
            .map_err(|_| rewrite_err("failed to replace media port"))?;
        replace_consecutive_port_count(chop, sdp_media, call_media, &ps)
            .map_err(|_| rewrite_err("failed to replace media port count"))?;
        replace_transport_protocol(chop, sdp_media, call_media)
            .map_err(|_| rewrite_err("failed to replace media protocol"))?;
        replace_codec_list(chop, sdp_media, call_media)
            .map_err(|_| rewrite_err("failed to replace media formats"))?;

        if sdp_media.connection.parsed {
            replace_network_address(
                chop,
                &sdp_media.connection.address,
                &ps,
                flags,
                keep_zero_address,
            )
            .map_err(|_| rewrite_err("failed to replace media network address"))?;
        }
    } else if call_media.type_id == MediaType::Message {
        if !sdp_media.connection.parsed {
            synth_session_connection(chop, session, sdp_media)?;
        }
        // leave everything else untouched
        print_sdp_media_section(
            chop.output_mut(),
            call_media,
            dtls_cert,
            Some(sdp_media),
            flags,
            0,
            false,
            force_end_of_ice,
        );
        return Ok(());
    }

    process_media_attributes(chop, sdp_media, flags, call_media)
        .map_err(|_| rewrite_err("failed to process media attributes"))?;

    chop.copy_up_to_end_of(sdp_media.s)?;

    if sdp_media.port_num == 0 || ps.selected.is_none() {
        is_active = false;
    }

    print_sdp_media_section(
        chop.output_mut(),
        call_media,
        dtls_cert,
        Some(sdp_media),
        flags,
        0,
        is_active,
        force_end_of_ice,
    );
    Ok(())
}

fn legacy_rejected_m_line(chop: &mut SdpChopper<'_>, call_media: &CallMedia, prtp: &TransportProtocol) {
    chop.append("m=");
    chop.append(&call_media.type_str);
    chop.append(" 0 ");
    chop.append(prtp.name);
    chop.append(" ");
    chop.append(&call_media.format_str);
    chop.append("\r\n");
}

/// Rewrites a parsed SDP body in place, guided by the monologue's media
/// state. The caller holds the call write lock; the monologue's cached
/// session name, hash function choices and output version are updated as
/// side effects.
pub fn sdp_replace(
    chop: &mut SdpChopper<'_>,
    sessions: &mut SdpSessions,
    monologue: &mut Monologue,
    flags: &mut SdpFlags,
) -> Result<()> {
    let src = chop.input();
    let dtls_cert = monologue.dtls_cert.clone();
    let mut media_index = 0usize;

    for session_idx in 0..sessions.sessions.len() {
        let session = &mut sessions.sessions[session_idx];

        // look for the first usable (non-rejected, non-empty) packet
        // stream to determine session-level attributes
        let mut usable: Option<usize> = None;
        for ix in media_index..monologue.medias.len() {
            let cm = &monologue.medias[ix];
            let Some(ps) = cm.streams.first() else {
                continue;
            };
            if ps.selected.is_some() {
                usable = Some(ix);
                break;
            }
        }
        let sel_media_idx = usable.ok_or_else(|| rewrite_err("no usable session media stream"))?;
        let ps = monologue.medias[sel_media_idx].streams[0].clone();

        if session.origin.parsed {
            // keep the username (and optionally session id) stable
            // towards this endpoint
            if let Some(last) = &monologue.session_last_sdp_orig {
                if flags.replace_username || flags.replace_origin_full {
                    chop.copy_up_to(session.origin.username)
                        .map_err(|_| rewrite_err("error while processing o= line"))?;
                    chop.append(&last.username);
                    chop.skip_over(session.origin.username)?;
                }
                if flags.replace_origin_full {
                    chop.copy_up_to(session.origin.session_id)
                        .map_err(|_| rewrite_err("error while processing o= line"))?;
                    chop.append(&last.session_id);
                    chop.skip_over(session.origin.session_id)?;
                }
            }

            // record where the version string lands in the output for
            // later restamping
            chop.copy_up_to(session.origin.version_str)
                .map_err(|_| rewrite_err("error while processing o= line"))?;
            session.origin.version_output_pos = chop.output_len();
            session.origin.version_output_len = session.origin.version_str.len();

            if let Some(last) = monologue.session_last_sdp_orig.as_mut() {
                if last.version_num == u64::MAX {
                    last.version_num = rand::random::<u32>() as u64;
                }
            }

            if (flags.replace_origin || flags.replace_origin_full)
                && flags.ice_option != IceOption::ForceRelay
            {
                replace_network_address(chop, &session.origin.address, &ps, flags, false)
                    .map_err(|_| rewrite_err("failed to replace network address"))?;
            }
        }

        if monologue.sdp_session_name.is_none() {
            monologue.sdp_session_name = Some(session.session_name.slice(src).to_string());
        } else if flags.replace_sess_name {
            chop.copy_up_to(session.session_name)
                .map_err(|_| rewrite_err("error while processing s= line"))?;
            let name = monologue.sdp_session_name.clone().unwrap_or_default();
            chop.append(&name);
            chop.skip_over(session.session_name)?;
        }

        let media_has_ice = monologue.medias[sel_media_idx].flags.ice;
        let keep_zero_address = !media_has_ice;

        // unconditionally replace the session connection if present
        if session.connection.parsed && flags.ice_option != IceOption::ForceRelay {
            replace_network_address(chop, &session.connection.address, &ps, flags, keep_zero_address)
                .map_err(|_| rewrite_err("failed to replace network address"))?;
        }

        if !monologue.medias[sel_media_idx].flags.passthru {
            process_session_attributes(chop, &session.attributes, flags)
                .map_err(|_| rewrite_err("failed to process session attributes"))?;
        }

        chop.copy_up_to_end_of(session.s)?;

        print_sdp_session_section(chop.output_mut(), flags, &monologue.medias[sel_media_idx]);

        manipulations_add(chop, flags.manipulations(MediaType::Unknown));

        let session = &sessions.sessions[session_idx];
        for sdp_media in &session.media {
            // skip over received dummy SDP sections
            if sdp_media.legacy_osrtp {
                chop.skip_over(sdp_media.s)?;
                continue;
            }

            let call_media = monologue
                .medias
                .get_mut(media_index)
                .ok_or_else(|| rewrite_err("no matching media"))?;
            if call_media.streams.is_empty() {
                return Err(rewrite_err("no matching media stream"));
            }

            // the plain-RTP counterpart of a secure protocol, needed for
            // the legacy OSRTP dances
            let prtp = call_media
                .protocol
                .filter(|p| p.srtp)
                .and_then(|p| p.rtp_variant)
                .map(protocol);

            if let Some(prtp) = prtp {
                if call_media.flags.legacy_osrtp && !call_media.flags.legacy_osrtp_rev {
                    // generate a rejected m= line for accepted legacy OSRTP
                    legacy_rejected_m_line(chop, call_media, prtp);
                } else if flags.osrtp_offer_legacy && flags.opmode == OpMode::Offer {
                    // duplicate plain-RTP media section for a legacy OSRTP
                    // offer: render the section once with the downgraded
                    // protocol, rewind the input and render it again for
                    // real
                    let checkpoint = chop.checkpoint();
                    let real_protocol = call_media.protocol;
                    call_media.protocol = Some(prtp);
                    let res = replace_sdp_media_section(
                        chop,
                        call_media,
                        dtls_cert.as_ref(),
                        session,
                        sdp_media,
                        flags,
                        keep_zero_address,
                    );
                    chop.restore(checkpoint);
                    call_media.protocol = real_protocol;
                    res?;
                }
            }

            let call_media = monologue
                .medias
                .get_mut(media_index)
                .expect("checked above");
            replace_sdp_media_section(
                chop,
                call_media,
                dtls_cert.as_ref(),
                session,
                sdp_media,
                flags,
                keep_zero_address,
            )?;

            if let Some(prtp) = prtp {
                if call_media.flags.legacy_osrtp && call_media.flags.legacy_osrtp_rev {
                    legacy_rejected_m_line(chop, call_media, prtp);
                }
            }

            manipulations_add(chop, flags.manipulations(sdp_media.media_type_id));

            media_index += 1;
        }
    }

    chop.copy_remainder();

    // the version gets bumped when the output changed since the previous
    // rewrite, or unconditionally when forced
    if flags.replace_sdp_version || flags.replace_origin_full {
        sdp_version_check(chop, sessions, monologue, flags.force_inc_sdp_ver);
    }

    Ok(())
}

/// Stamps the cached version number into every session's `o=` line of
/// the current output.
fn sdp_version_replace(chop: &mut SdpChopper<'_>, sessions: &mut SdpSessions, version_num: u64) {
    let version_str = version_num.to_string();
    // start from the top
    chop.reset_offset();

    for session in &mut sessions.sessions {
        if !session.origin.parsed {
            continue;
        }
        // update unconditionally to keep position tracking intact
        chop.replace_at(
            &mut session.origin.version_output_pos,
            &mut session.origin.version_output_len,
            &version_str,
        );
    }
}

fn sdp_version_check(
    chop: &mut SdpChopper<'_>,
    sessions: &mut SdpSessions,
    monologue: &mut Monologue,
    force_increase: bool,
) {
    // all sessions share the single cached version number
    let Some(version_num) = monologue
        .session_last_sdp_orig
        .as_ref()
        .map(|o| o.version_num)
    else {
        return;
    };

    sdp_version_replace(chop, sessions, version_num);

    if !force_increase {
        match &monologue.last_out_sdp {
            None => {
                monologue.last_out_sdp = Some(chop.output().to_string());
                return;
            }
            Some(last) if last == chop.output() => return,
            Some(_) => (),
        }
    }

    // mismatch detected: increment, restamp, store a new copy
    let orig = monologue
        .session_last_sdp_orig
        .as_mut()
        .expect("checked above");
    orig.version_num += 1;
    let version_num = orig.version_num;
    sdp_version_replace(chop, sessions, version_num);
    monologue.last_out_sdp = Some(chop.output().to_string());
}
