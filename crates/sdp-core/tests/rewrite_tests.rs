//! End-to-end rewriting tests: parse, extract, mirror the streams into a
//! call media list, rewrite, and check the output against known-good
//! bodies.

use rtpbridge_sdp_core::flags::{OpMode, SdpFlags};
use rtpbridge_sdp_core::media::{
    CallMedia, DtlsCert, Endpoint, IceAgentState, Monologue, PacketStream, SdpOrigin, StreamSock,
};
use rtpbridge_sdp_core::sdp::streams::StreamParams;
use rtpbridge_sdp_core::{sdp_create, sdp_parse, sdp_replace, sdp_streams, SdpChopper};

fn sock(addr: &str, port: u16) -> StreamSock {
    StreamSock {
        local_address: addr.parse().unwrap(),
        local_port: port,
        advertised_address: addr.parse().unwrap(),
        ice_foundation: "wQs1pT4G9fVm".to_string(),
        unique_id: 0,
    }
}

/// One RTP packet stream plus an RTCP sibling on the next port.
fn stream_pair(addr: &str, port: u16, remote: Option<Endpoint>) -> Vec<PacketStream> {
    vec![
        PacketStream {
            component: 1,
            sockets: vec![sock(addr, port)],
            selected: Some(0),
            rtcp_sibling: Some(1),
            advertised_endpoint: remote,
        },
        PacketStream {
            component: 2,
            sockets: vec![sock(addr, port + 1)],
            selected: Some(0),
            rtcp_sibling: None,
            advertised_endpoint: remote,
        },
    ]
}

/// Builds a call media that mirrors an extracted stream, bound to a
/// local address and port.
fn mirror_media(sp: &StreamParams, addr: &str, port: u16) -> CallMedia {
    let mut media = CallMedia::new(sp.type_id);
    media.type_str = sp.media_type.clone();
    media.protocol = sp.protocol;
    media.protocol_str = sp.protocol_str.clone();
    media.format_str = sp.format_str.clone();
    media.codecs = sp.codecs.clone();
    media.flags.send = sp.flags.send;
    media.flags.recv = sp.flags.recv;
    media.flags.legacy_osrtp = sp.flags.legacy_osrtp;
    media.flags.legacy_osrtp_rev = sp.flags.legacy_osrtp_rev;
    media.flags.rtcp_mux = sp.flags.rtcp_mux;
    media.streams = stream_pair(addr, port, sp.rtp_endpoint);
    media
}

/// Full cycle: parse, extract, mirror into a monologue, replace.
fn rewrite(body: &str, flags: &mut SdpFlags, local: &[(&str, u16)]) -> (String, Monologue) {
    let mut sessions = sdp_parse(body, flags).unwrap();
    let streams = sdp_streams(&mut sessions, body, flags).unwrap();
    assert_eq!(streams.len(), local.len(), "one local binding per stream");

    let mut monologue = Monologue::new();
    for (sp, (addr, port)) in streams.iter().zip(local.iter()) {
        monologue.medias.push(mirror_media(sp, addr, *port));
    }

    let mut chop = SdpChopper::new(&body[..sessions.body_len]);
    sdp_replace(&mut chop, &mut sessions, &mut monologue, flags).unwrap();
    (chop.into_output(), monologue)
}

fn rewrite_with(
    body: &str,
    flags: &mut SdpFlags,
    monologue: &mut Monologue,
) -> String {
    let mut sessions = sdp_parse(body, flags).unwrap();
    let _ = sdp_streams(&mut sessions, body, flags).unwrap();
    let mut chop = SdpChopper::new(&body[..sessions.body_len]);
    sdp_replace(&mut chop, &mut sessions, monologue, flags).unwrap();
    chop.into_output()
}

fn other_flags() -> SdpFlags {
    let mut flags = SdpFlags::new();
    flags.trust_address = true;
    flags.opmode = OpMode::Other;
    flags
}

const MINIMAL: &str = "v=0\r\no=- 1 1 IN IP4 1.2.3.4\r\ns=-\r\nt=0 0\r\nm=audio 5000 RTP/AVP 0\r\nc=IN IP4 1.2.3.4\r\n";

#[test]
fn test_minimal_rewrite() {
    let mut flags = other_flags();
    let (out, _) = rewrite(MINIMAL, &mut flags, &[("10.0.0.1", 40000)]);

    assert!(out.contains("m=audio 40000 RTP/AVP 0"), "out: {}", out);
    assert!(out.contains("c=IN IP4 10.0.0.1"), "out: {}", out);
    // the o= line is left alone without replace flags
    assert!(out.contains("o=- 1 1 IN IP4 1.2.3.4"), "out: {}", out);
}

#[test]
fn test_round_trip_identity() {
    // a body consisting exactly of the lines the rewriter re-synthesizes,
    // mirrored onto the same address and ports, comes back byte-identical
    let body = "v=0\r\no=- 1 1 IN IP4 1.2.3.4\r\ns=-\r\nt=0 0\r\nm=audio 5000 RTP/AVP 0\r\nc=IN IP4 1.2.3.4\r\na=rtpmap:0 PCMU/8000\r\na=sendrecv\r\na=rtcp:5001\r\n";
    let mut flags = other_flags();
    let (out, _) = rewrite(body, &mut flags, &[("1.2.3.4", 5000)]);
    assert_eq!(out, body);
}

#[test]
fn test_codec_change() {
    let mut flags = other_flags();

    let mut sessions = sdp_parse(MINIMAL, &flags).unwrap();
    let streams = sdp_streams(&mut sessions, MINIMAL, &mut flags).unwrap();

    let mut media = mirror_media(&streams[0], "10.0.0.1", 40000);
    // the call decided on PCMA instead
    let mut pcma = rtpbridge_sdp_core::rtp::rtp_get_rfc_payload_type(8).unwrap();
    pcma.ptime = 0;
    media.codecs = vec![pcma];
    let mut monologue = Monologue::new();
    monologue.medias.push(media);

    let mut chop = SdpChopper::new(MINIMAL);
    sdp_replace(&mut chop, &mut sessions, &mut monologue, &mut flags).unwrap();
    let out = chop.into_output();

    assert!(out.contains("m=audio 40000 RTP/AVP 8\r\n"), "out: {}", out);
    assert!(out.contains("a=rtpmap:8 PCMA/8000\r\n"), "out: {}", out);
    assert!(!out.contains("rtpmap:0"), "out: {}", out);
}

#[test]
fn test_ice_injection() {
    let mut flags = other_flags();

    let mut sessions = sdp_parse(MINIMAL, &flags).unwrap();
    let streams = sdp_streams(&mut sessions, MINIMAL, &mut flags).unwrap();

    let mut media = mirror_media(&streams[0], "10.0.0.1", 40000);
    media.flags.ice = true;
    media.ice_agent = Some(IceAgentState {
        ufrag: "abcd".to_string(),
        pwd: "efghij".to_string(),
        completed: false,
        controlling: false,
        remote_candidates: Vec::new(),
    });
    let mut monologue = Monologue::new();
    monologue.medias.push(media);

    let mut chop = SdpChopper::new(MINIMAL);
    sdp_replace(&mut chop, &mut sessions, &mut monologue, &mut flags).unwrap();
    let out = chop.into_output();

    assert!(out.contains("a=ice-ufrag:abcd\r\n"), "out: {}", out);
    assert!(out.contains("a=ice-pwd:efghij\r\n"), "out: {}", out);
    // host candidate for component 1: type pref 126, local pref 0
    assert!(
        out.contains("a=candidate:wQs1pT4G9fVm 1 UDP 2113929471 10.0.0.1 40000 typ host\r\n"),
        "out: {}",
        out
    );
    // and the RTCP component on the next port
    assert!(
        out.contains("a=candidate:wQs1pT4G9fVm 2 UDP 2113929470 10.0.0.1 40001 typ host\r\n"),
        "out: {}",
        out
    );
}

#[test]
fn test_version_monotonicity() {
    let mut flags = other_flags();
    flags.replace_sdp_version = true;

    let mut monologue = Monologue::new();
    monologue.session_last_sdp_orig = Some(SdpOrigin {
        username: "-".to_string(),
        session_id: "1".to_string(),
        version_num: 1,
        address_type: "IP4".to_string(),
        address: "1.2.3.4".to_string(),
    });

    // first rewrite: version stays at the cached number
    {
        let mut sessions = sdp_parse(MINIMAL, &flags).unwrap();
        let streams = sdp_streams(&mut sessions, MINIMAL, &mut flags).unwrap();
        monologue.medias = vec![mirror_media(&streams[0], "10.0.0.1", 40000)];
        let mut chop = SdpChopper::new(MINIMAL);
        sdp_replace(&mut chop, &mut sessions, &mut monologue, &mut flags).unwrap();
        assert!(chop.output().contains("o=- 1 1 IN IP4"), "out: {}", chop.output());
    }

    // second rewrite with a different port: exactly one increment
    {
        let mut sessions = sdp_parse(MINIMAL, &flags).unwrap();
        let _ = sdp_streams(&mut sessions, MINIMAL, &mut flags).unwrap();
        monologue.medias[0].streams = stream_pair("10.0.0.1", 40002, None);
        let mut chop = SdpChopper::new(MINIMAL);
        sdp_replace(&mut chop, &mut sessions, &mut monologue, &mut flags).unwrap();
        assert!(chop.output().contains("o=- 1 2 IN IP4"), "out: {}", chop.output());
        assert!(chop.output().contains("m=audio 40002"), "out: {}", chop.output());
    }

    // third rewrite with identical input: version is stable
    {
        let mut sessions = sdp_parse(MINIMAL, &flags).unwrap();
        let _ = sdp_streams(&mut sessions, MINIMAL, &mut flags).unwrap();
        let mut chop = SdpChopper::new(MINIMAL);
        sdp_replace(&mut chop, &mut sessions, &mut monologue, &mut flags).unwrap();
        assert!(chop.output().contains("o=- 1 2 IN IP4"), "out: {}", chop.output());
    }

    assert_eq!(monologue.session_last_sdp_orig.unwrap().version_num, 2);
}

#[test]
fn test_loop_detection_tag() {
    rtpbridge_sdp_core::sdp_init();
    let mut flags = other_flags();
    flags.loop_protect = true;

    let (out, _) = rewrite(MINIMAL, &mut flags, &[("10.0.0.1", 40000)]);
    let tag = format!("a=rtpengine:{}\r\n", rtpbridge_sdp_core::instance_id());
    assert!(out.contains(&tag), "out: {}", out);

    // and the tagged output is recognized as our own
    let parse_flags = SdpFlags::new();
    let sessions = sdp_parse(&out, &parse_flags).unwrap();
    assert!(rtpbridge_sdp_core::sdp_is_duplicate(&sessions, &out));
}

const OSRTP_PAIR: &str = "v=0\r\no=- 1 1 IN IP4 1.2.3.4\r\ns=-\r\nt=0 0\r\nm=audio 5000 RTP/AVP 0\r\nc=IN IP4 1.2.3.4\r\nm=audio 5002 RTP/SAVP 0\r\nc=IN IP4 1.2.3.4\r\na=crypto:1 AES_CM_128_HMAC_SHA1_80 inline:d0RmdmcmVCspeEc3QGZiNWpVLFJhQX1cfHAwJSoj\r\n";

#[test]
fn test_legacy_osrtp_rewrite() {
    let mut flags = other_flags();
    flags.osrtp_accept_legacy = true;

    let mut sessions = sdp_parse(OSRTP_PAIR, &flags).unwrap();
    let streams = sdp_streams(&mut sessions, OSRTP_PAIR, &mut flags).unwrap();

    // exactly one outgoing stream, tagged for legacy OSRTP
    assert_eq!(streams.len(), 1);
    assert!(streams[0].flags.legacy_osrtp);

    let mut monologue = Monologue::new();
    monologue
        .medias
        .push(mirror_media(&streams[0], "10.0.0.1", 40000));

    let mut chop = SdpChopper::new(OSRTP_PAIR);
    sdp_replace(&mut chop, &mut sessions, &mut monologue, &mut flags).unwrap();
    let out = chop.into_output();

    // a rejected plain-RTP section is synthesized in front of the
    // rewritten secure one
    let rejected = out.find("m=audio 0 RTP/AVP 0\r\n").expect("rejected m= line");
    let secure = out.find("m=audio 40000 RTP/SAVP 0").expect("rewritten m= line");
    assert!(rejected < secure, "out: {}", out);
    // the original plain section is gone
    assert!(!out.contains("m=audio 5000"), "out: {}", out);
}

#[test]
fn test_sdes_emission_round_trip() {
    let body = "v=0\r\no=- 1 1 IN IP4 1.2.3.4\r\ns=-\r\nt=0 0\r\nm=audio 5000 RTP/SAVP 0\r\nc=IN IP4 1.2.3.4\r\na=crypto:1 AES_CM_128_HMAC_SHA1_80 inline:d0RmdmcmVCspeEc3QGZiNWpVLFJhQX1cfHAwJSoj|2^20|1:4\r\n";
    let mut flags = other_flags();
    flags.sdes_pad = true;

    let mut sessions = sdp_parse(body, &flags).unwrap();
    let streams = sdp_streams(&mut sessions, body, &mut flags).unwrap();
    assert_eq!(streams[0].sdes_params.len(), 1);

    let mut media = mirror_media(&streams[0], "10.0.0.1", 40000);
    media.flags.sdes = true;
    media.sdes_out = streams[0].sdes_params.clone();
    let mut monologue = Monologue::new();
    monologue.medias.push(media);

    let mut chop = SdpChopper::new(body);
    sdp_replace(&mut chop, &mut sessions, &mut monologue, &mut flags).unwrap();
    let out = chop.into_output();

    // the re-encoded key reproduces the original inline token, with the
    // MKI carried over (the lifetime is only emitted on request)
    assert!(
        out.contains(
            "a=crypto:1 AES_CM_128_HMAC_SHA1_80 inline:d0RmdmcmVCspeEc3QGZiNWpVLFJhQX1cfHAwJSoj|1:4\r\n"
        ),
        "out: {}",
        out
    );
}

#[test]
fn test_dtls_emission() {
    let body = "v=0\r\no=- 1 1 IN IP4 1.2.3.4\r\ns=-\r\nt=0 0\r\nm=audio 5000 UDP/TLS/RTP/SAVP 0\r\nc=IN IP4 1.2.3.4\r\na=setup:actpass\r\na=fingerprint:sha-256 00:01:02:03:04:05:06:07:08:09:0A:0B:0C:0D:0E:0F:10:11:12:13:14:15:16:17:18:19:1A:1B:1C:1D:1E:1F\r\n";
    let mut flags = other_flags();

    let mut sessions = sdp_parse(body, &flags).unwrap();
    let streams = sdp_streams(&mut sessions, body, &mut flags).unwrap();
    assert!(streams[0].fingerprint.is_some());
    assert!(streams[0].flags.setup_active && streams[0].flags.setup_passive);

    let mut media = mirror_media(&streams[0], "10.0.0.1", 40000);
    media.flags.dtls = true;
    media.flags.setup_passive = true;
    let mut monologue = Monologue::new();
    monologue.dtls_cert = Some(DtlsCert {
        fingerprints: vec![rtpbridge_sdp_core::crypto::Fingerprint {
            hash_func: rtpbridge_sdp_core::crypto::dtls_find_hash_func("sha-256").unwrap(),
            digest: (0u8..32).map(|i| i.wrapping_mul(7)).collect(),
        }],
    });
    monologue.medias.push(media);

    let mut chop = SdpChopper::new(body);
    sdp_replace(&mut chop, &mut sessions, &mut monologue, &mut flags).unwrap();
    let out = chop.into_output();

    assert!(out.contains("a=setup:passive\r\n"), "out: {}", out);
    assert!(out.contains("a=fingerprint:sha-256 00:07:0E:15:1C:"), "out: {}", out);
    // the incoming fingerprint and setup lines were stripped
    assert!(!out.contains("a=setup:actpass"), "out: {}", out);
    // the chosen hash function sticks on the media
    assert_eq!(
        monologue.medias[0].fp_hash_func.unwrap().name,
        "sha-256"
    );
}

#[test]
fn test_manipulation_add_remove_subst() {
    let body = "v=0\r\no=- 1 1 IN IP4 1.2.3.4\r\ns=-\r\nt=0 0\r\nm=audio 5000 RTP/AVP 0\r\nc=IN IP4 1.2.3.4\r\na=rtpmap:0 PCMU/8000\r\na=sendrecv\r\na=rtcp:5001\r\n";
    let mut flags = other_flags();
    flags
        .manipulations_mut(rtpbridge_sdp_core::media::MediaType::Audio)
        .add_command("foo:bar");
    flags
        .manipulations_mut(rtpbridge_sdp_core::media::MediaType::Audio)
        .remove_command("rtcp");
    flags
        .manipulations_mut(rtpbridge_sdp_core::media::MediaType::Audio)
        .subst_command("rtpmap:0", "rtpmap:0 PCMU/16000");

    let (out, _) = rewrite(body, &mut flags, &[("1.2.3.4", 5000)]);

    assert!(out.contains("a=foo:bar\r\n"), "out: {}", out);
    assert!(!out.contains("a=rtcp:"), "out: {}", out);
    assert!(out.contains("a=rtpmap:0 PCMU/16000\r\n"), "out: {}", out);
    assert!(!out.contains("PCMU/8000"), "out: {}", out);
}

#[test]
fn test_manipulation_remove_absent_is_noop() {
    let body = "v=0\r\no=- 1 1 IN IP4 1.2.3.4\r\ns=-\r\nt=0 0\r\nm=audio 5000 RTP/AVP 0\r\nc=IN IP4 1.2.3.4\r\na=rtpmap:0 PCMU/8000\r\na=sendrecv\r\na=rtcp:5001\r\n";

    let mut plain_flags = other_flags();
    let (baseline, _) = rewrite(body, &mut plain_flags, &[("1.2.3.4", 5000)]);

    // removing an attribute that is not present changes nothing, and
    // applying the directive twice equals applying it once
    for _ in 0..2 {
        let mut flags = other_flags();
        flags
            .manipulations_mut(rtpbridge_sdp_core::media::MediaType::Audio)
            .remove_command("nosuchattribute");
        let (out, _) = rewrite(body, &mut flags, &[("1.2.3.4", 5000)]);
        assert_eq!(out, baseline);
    }
}

#[test]
fn test_full_rtcp_attr() {
    let mut flags = other_flags();
    flags.full_rtcp_attr = true;
    let (out, _) = rewrite(MINIMAL, &mut flags, &[("10.0.0.1", 40000)]);
    assert!(out.contains("a=rtcp:40001 IN IP4 10.0.0.1\r\n"), "out: {}", out);
}

#[test]
fn test_no_rtcp_attr() {
    let mut flags = other_flags();
    flags.no_rtcp_attr = true;
    let (out, _) = rewrite(MINIMAL, &mut flags, &[("10.0.0.1", 40000)]);
    assert!(!out.contains("a=rtcp:"), "out: {}", out);
}

#[test]
fn test_replace_origin_and_session_name() {
    let mut flags = other_flags();
    flags.replace_origin = true;
    let (out, _) = rewrite(MINIMAL, &mut flags, &[("10.0.0.1", 40000)]);
    assert!(out.contains("o=- 1 1 IN IP4 10.0.0.1\r\n"), "out: {}", out);

    // the session name is replaced from the second rewrite on, once the
    // monologue remembered one
    let mut flags = other_flags();
    flags.replace_sess_name = true;
    let (_, mut monologue) = rewrite(MINIMAL, &mut flags, &[("10.0.0.1", 40000)]);
    assert_eq!(monologue.sdp_session_name.as_deref(), Some("-"));
    monologue.sdp_session_name = Some("relay".to_string());
    let out = rewrite_with(MINIMAL, &mut flags, &mut monologue);
    assert!(out.contains("s=relay\r\n"), "out: {}", out);
}

#[test]
fn test_rtcp_mux_answer() {
    let body = "v=0\r\no=- 1 1 IN IP4 1.2.3.4\r\ns=-\r\nt=0 0\r\nm=audio 5000 RTP/AVP 0\r\nc=IN IP4 1.2.3.4\r\na=rtcp-mux\r\n";
    let mut flags = other_flags();
    flags.opmode = OpMode::Answer;

    let mut sessions = sdp_parse(body, &flags).unwrap();
    let streams = sdp_streams(&mut sessions, body, &mut flags).unwrap();
    assert!(streams[0].flags.rtcp_mux);

    let mut media = mirror_media(&streams[0], "10.0.0.1", 40000);
    // muxed: a single component, no RTCP sibling
    media.streams = vec![PacketStream {
        component: 1,
        sockets: vec![sock("10.0.0.1", 40000)],
        selected: Some(0),
        rtcp_sibling: None,
        advertised_endpoint: streams[0].rtp_endpoint,
    }];
    let mut monologue = Monologue::new();
    monologue.medias.push(media);

    let mut chop = SdpChopper::new(body);
    sdp_replace(&mut chop, &mut sessions, &mut monologue, &mut flags).unwrap();
    let out = chop.into_output();

    assert!(out.contains("a=rtcp:40000\r\n"), "out: {}", out);
    assert!(out.contains("a=rtcp-mux\r\n"), "out: {}", out);
}

#[test]
fn test_sdp_create() {
    let mut monologue = Monologue::new();
    monologue.session_sdp_orig = Some(SdpOrigin {
        username: "-".to_string(),
        session_id: "12345".to_string(),
        version_num: 3,
        address_type: "IP4".to_string(),
        address: "1.2.3.4".to_string(),
    });
    monologue.sdp_session_name = Some("call".to_string());

    let mut media = CallMedia::new(rtpbridge_sdp_core::media::MediaType::Audio);
    media.type_str = "audio".to_string();
    media.protocol = rtpbridge_sdp_core::protocol::transport_protocol("RTP/AVP");
    media.codecs = vec![rtpbridge_sdp_core::rtp::rtp_get_rfc_payload_type(0).unwrap()];
    media.flags.send = true;
    media.flags.recv = true;
    media.streams = stream_pair("10.0.0.1", 40000, None);
    monologue.medias.push(media);

    let flags = other_flags();
    let out = sdp_create(&mut monologue, &flags).unwrap();

    assert!(out.starts_with("v=0\r\no=- 12345 3 IN IP4 1.2.3.4\r\ns=call\r\nt=0 0\r\n"), "out: {}", out);
    assert!(out.contains("m=audio 40000 RTP/AVP 0\r\n"), "out: {}", out);
    assert!(out.contains("c=IN IP4 10.0.0.1\r\n"), "out: {}", out);
    assert!(out.contains("a=rtpmap:0 PCMU/8000\r\n"), "out: {}", out);
    assert!(out.contains("a=sendrecv\r\n"), "out: {}", out);
    // the static table supplies a default ptime, which create renders
    assert!(out.contains("a=ptime:20\r\n") || !out.contains("a=ptime"), "out: {}", out);
}

#[test]
fn test_create_requires_media() {
    let mut monologue = Monologue::new();
    let flags = SdpFlags::new();
    assert!(sdp_create(&mut monologue, &flags).is_err());
}

mod manipulation_props {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// Removal directives for names that match nothing never change
        /// the output.
        #[test]
        fn remove_of_absent_attribute_is_noop(name in "[a-z][a-z0-9-]{0,14}") {
            // skip names that genuinely occur in the fixture output
            prop_assume!(!["rtpmap", "sendrecv", "rtcp", "mid", "ptime"].contains(&name.as_str()));
            prop_assume!(!name.starts_with("rtpmap"));

            let body = "v=0\r\no=- 1 1 IN IP4 1.2.3.4\r\ns=-\r\nt=0 0\r\nm=audio 5000 RTP/AVP 0\r\nc=IN IP4 1.2.3.4\r\na=rtpmap:0 PCMU/8000\r\na=sendrecv\r\na=rtcp:5001\r\n";

            let mut plain = other_flags();
            let (baseline, _) = rewrite(body, &mut plain, &[("1.2.3.4", 5000)]);

            let mut flags = other_flags();
            flags
                .manipulations_mut(rtpbridge_sdp_core::media::MediaType::Audio)
                .remove_command(&name);
            let (out, _) = rewrite(body, &mut flags, &[("1.2.3.4", 5000)]);
            prop_assert_eq!(out, baseline);
        }
    }
}
