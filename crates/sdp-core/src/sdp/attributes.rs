//! SDP attribute parsing.
//!
//! Recognizes the closed vocabulary of `a=` lines the relay acts upon and
//! produces a tagged payload per attribute. Attributes with semantic
//! errors are downgraded to [`AttrId::Ignore`]: they stay in the parsed
//! list (so positions remain intact for the rewriter) but are stripped
//! from any output. Unknown attribute names become [`AttrId::Other`] and
//! are carried through verbatim.
//!
//! References: RFC 4566 (SDP), RFC 8839 (ICE), RFC 4568 (SDES),
//! RFC 8122 (fingerprints), T.38 Annex D.

use std::collections::HashMap;

use base64::alphabet;
use base64::engine::general_purpose::GeneralPurposeConfig;
use base64::engine::{DecodePaddingMode, GeneralPurpose};
use base64::Engine;
use nom::{
    bytes::complete::take_while1,
    character::complete::{digit1, space1},
    combinator::{map_res, opt},
    sequence::{preceded, terminated, tuple},
    IResult,
};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::crypto::{crypto_find_suite, dtls_find_hash_func, CryptoSuite, DtlsHashFunc};
use crate::error::{Error, Result};
use crate::ice::{IceCandidate, IceCandidateType, SocketType};
use crate::media::Endpoint;
use crate::rtp::RtpPayloadType;
use crate::sdp::span::{parse_address_any, NetworkAddress, Scanner, Span};

/// Base64 decoding for SDES keys is deliberately lenient: keys may arrive
/// with or without trailing padding.
const B64_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Identity of a recognized attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AttrId {
    #[default]
    Other,
    Rtcp,
    Candidate,
    /// `ice-mismatch` and `remote-candidates`
    Ice,
    IceLite,
    IceOptions,
    IceUfrag,
    IcePwd,
    Crypto,
    Inactive,
    Sendrecv,
    Sendonly,
    Recvonly,
    RtcpMux,
    Group,
    Mid,
    Fingerprint,
    Setup,
    Rtpmap,
    Fmtp,
    /// Semantically broken attribute, kept but never emitted
    Ignore,
    Rtpengine,
    Ptime,
    RtcpFb,
    T38FaxVersion,
    T38FaxUdpEc,
    T38FaxUdpEcDepth,
    T38FaxUdpFecMaxSpan,
    T38FaxMaxDatagram,
    T38FaxMaxIfp,
    T38FaxFillBitRemoval,
    T38FaxTranscodingMmr,
    T38FaxTranscodingJbig,
    T38FaxRateManagement,
    T38MaxBitRate,
    T38FaxMaxBuffer,
    Xg726BitOrder,
    MaxPtime,
    Direction,
    Label,
    TlsId,
    EndOfCandidates,
}

/// Coarse classification of uninterpreted attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SdpAttrType {
    #[default]
    Unknown,
    Extmap,
}

/// `a=rtcp:<port> [IN IP4|IP6 <addr>]` (RFC 3605)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtcpAttr {
    pub port_num: u16,
    pub address: Option<std::net::IpAddr>,
}

/// `a=candidate:...`; the type token is kept as a span so force-relay
/// filtering can look at it even for otherwise unparseable candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateAttr {
    pub type_str: Option<Span>,
    /// `None` when the transport or candidate type is unsupported
    pub parsed: Option<IceCandidate>,
}

/// `a=crypto:...` (RFC 4568)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CryptoAttr {
    pub tag: u32,
    pub suite: &'static CryptoSuite,
    pub master_key: Vec<u8>,
    pub salt: Vec<u8>,
    /// Key lifetime, 0 when not present
    pub lifetime: u64,
    /// MKI value, big-endian in its full wire length; empty when absent
    pub mki: Vec<u8>,
    pub unencrypted_srtcp: bool,
    pub unencrypted_srtp: bool,
    pub unauthenticated_srtp: bool,
}

/// `a=group:` semantics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupSemantics {
    Other,
    Bundle,
}

/// `a=fingerprint:<hash> <digest>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintAttr {
    pub hash_func: &'static DtlsHashFunc,
    pub digest: Vec<u8>,
}

/// `a=setup:` role (RFC 5763)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SetupValue {
    #[default]
    Unknown,
    ActPass,
    Active,
    Passive,
    HoldConn,
}

/// `a=rtpmap:<pt> <encoding>/<clock>[/<params>]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpmapAttr {
    pub payload_type: u8,
    pub pt: RtpPayloadType,
}

/// `a=rtcp-fb:<pt|*> <value>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtcpFbAttr {
    /// -1 for the `*` wildcard
    pub payload_type: i32,
    pub value: Span,
}

/// `a=fmtp:<pt> <params>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FmtpAttr {
    pub payload_type: i32,
    pub format_parms: Span,
}

/// `a=T38FaxUdpEC:` error correction mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum T38UdpEc {
    #[default]
    Unknown,
    NoEc,
    Redundancy,
    Fec,
}

/// `a=T38FaxRateManagement:`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum T38RateManagement {
    #[default]
    Unknown,
    LocalTcf,
    TransferredTcf,
}

/// Parsed payload of an attribute, discriminated by [`AttrId`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AttrPayload {
    #[default]
    None,
    Rtcp(RtcpAttr),
    Candidate(CandidateAttr),
    Crypto(Box<CryptoAttr>),
    Group(GroupSemantics),
    Fingerprint(FingerprintAttr),
    Setup(SetupValue),
    Rtpmap(Box<RtpmapAttr>),
    RtcpFb(RtcpFbAttr),
    Fmtp(FmtpAttr),
    T38UdpEc(T38UdpEc),
    T38EcDepth {
        minred: i32,
        maxred: i32,
    },
    T38RateManagement(T38RateManagement),
    Int(i32),
    Other(SdpAttrType),
}

/// One parsed `a=` line.
///
/// All spans reference the SDP input buffer. Example `a=rtpmap:8 PCMA/8000`:
/// `name` is `rtpmap`, `value` is `8 PCMA/8000`, `key` is `rtpmap:8` and
/// `param` is `PCMA/8000`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SdpAttribute {
    /// Complete line including `a=` and the trailing newline
    pub full_line: Span,
    /// Everything after `a=`, without the newline
    pub line_value: Span,
    pub name: Span,
    pub value: Option<Span>,
    pub key: Option<Span>,
    pub param: Option<Span>,
    pub id: AttrId,
    pub payload: AttrPayload,
}

impl SdpAttribute {
    pub fn name_str<'a>(&self, src: &'a str) -> &'a str {
        self.name.slice(src)
    }

    pub fn value_str<'a>(&self, src: &'a str) -> Option<&'a str> {
        self.value.map(|v| v.slice(src))
    }

    pub fn key_str<'a>(&self, src: &'a str) -> Option<&'a str> {
        self.key.map(|k| k.slice(src))
    }

    pub fn line_value_str<'a>(&self, src: &'a str) -> &'a str {
        self.line_value.slice(src)
    }
}

/// Ordered attribute set of a session or media section.
///
/// Keeps source order (the list) and indexed views by attribute id. The
/// first-of-id and ordered-by-id views are always consistent with the
/// list.
#[derive(Debug, Clone, Default)]
pub struct Attributes {
    list: Vec<SdpAttribute>,
    by_id: HashMap<AttrId, Vec<usize>>,
}

impl Attributes {
    pub fn new() -> Self {
        Attributes::default()
    }

    pub fn insert(&mut self, attr: SdpAttribute) {
        let idx = self.list.len();
        self.by_id.entry(attr.id).or_default().push(idx);
        self.list.push(attr);
    }

    /// First attribute with the given id, in source order.
    pub fn get(&self, id: AttrId) -> Option<&SdpAttribute> {
        self.by_id
            .get(&id)
            .and_then(|v| v.first())
            .map(|&i| &self.list[i])
    }

    /// All attributes with the given id, in source order.
    pub fn get_all(&self, id: AttrId) -> impl Iterator<Item = &SdpAttribute> {
        self.by_id
            .get(&id)
            .into_iter()
            .flat_map(|v| v.iter())
            .map(move |&i| &self.list[i])
    }

    pub fn has(&self, id: AttrId) -> bool {
        self.by_id.contains_key(&id)
    }

    /// Source-order iteration over all attributes.
    pub fn iter(&self) -> impl Iterator<Item = &SdpAttribute> {
        self.list.iter()
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }
}

/// Media-then-session attribute lookup.
pub fn attr_get_m_s<'a>(
    media_attrs: &'a Attributes,
    session_attrs: &'a Attributes,
    id: AttrId,
) -> Option<&'a SdpAttribute> {
    media_attrs.get(id).or_else(|| session_attrs.get(id))
}

fn str_to_i(s: &str, def: i32) -> i32 {
    s.parse().unwrap_or(def)
}

fn token(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| !c.is_whitespace())(input)
}

/// nom parser for the `a=rtcp` value: `<port> [<net> <type> <addr>]`.
fn rtcp_value_parser(input: &str) -> IResult<&str, (u32, Option<(&str, &str, &str)>)> {
    tuple((
        map_res(digit1, |s: &str| s.parse::<u32>()),
        opt(preceded(
            space1,
            tuple((terminated(token, space1), terminated(token, space1), token)),
        )),
    ))(input)
}

fn parse_rtcp(src: &str, value: Option<Span>) -> Option<RtcpAttr> {
    let value = value?;
    let (_, (port, addr)) = rtcp_value_parser(value.slice(src)).ok()?;
    if port == 0 || port > 0xffff {
        return None;
    }
    let address = match addr {
        None => None,
        Some((net, typ, addr)) => {
            if !net.eq_ignore_ascii_case("IN") {
                return None;
            }
            Some(crate::sdp::span::parse_typed_address(typ, addr)?)
        }
    };
    Some(RtcpAttr {
        port_num: port as u16,
        address,
    })
}

/// Candidate value parsing shared between attribute dispatch and the
/// standalone entry point. `Err` is a hard syntax error; `Ok` with
/// `parsed == None` means the candidate is well-formed but uses an
/// unsupported transport or type.
fn parse_candidate_value(src: &str, value: Span, extended: bool) -> std::result::Result<CandidateAttr, ()> {
    let mut sc = Scanner::new(src, value);

    let foundation = sc.token().ok_or(())?;
    let component = sc.token().ok_or(())?;
    let transport = sc.token().ok_or(())?;
    let priority = sc.token().ok_or(())?;
    let address = sc.token().ok_or(())?;
    let port = sc.token().ok_or(())?;
    let typ_kw = sc.token().ok_or(())?;
    let type_str = sc.token().ok_or(())?;

    let unparsed = CandidateAttr {
        type_str: Some(type_str),
        parsed: None,
    };

    let component_id: u32 = component.slice(src).parse().map_err(|_| ())?;

    let Some(transport) = SocketType::from_token(transport.slice(src)) else {
        return Ok(unparsed);
    };

    let priority: u32 = priority.slice(src).parse().map_err(|_| ())?;

    let Some(address) = parse_address_any(address.slice(src)) else {
        return Ok(unparsed);
    };

    let port: u16 = port.slice(src).parse().map_err(|_| ())?;

    if typ_kw.slice(src) != "typ" {
        return Err(());
    }

    let Some(typ) = IceCandidateType::from_token(type_str.slice(src)) else {
        return Ok(unparsed);
    };

    let mut related = None;
    if typ.has_related() {
        let raddr_kw = sc.token().ok_or(())?;
        let raddr = sc.token().ok_or(())?;
        let rport_kw = sc.token().ok_or(())?;
        let rport = sc.token().ok_or(())?;

        if raddr_kw.slice(src) != "raddr" || rport_kw.slice(src) != "rport" {
            return Err(());
        }
        let Some(raddr) = parse_address_any(raddr.slice(src)) else {
            return Ok(unparsed);
        };
        let rport: u16 = rport.slice(src).parse().map_err(|_| ())?;
        related = Some(Endpoint {
            address: raddr,
            port: rport,
        });
    }

    let mut ufrag = None;
    if extended {
        while let (Some(field), Some(val)) = (sc.token(), sc.token()) {
            if field.slice(src) == "ufrag" {
                ufrag = Some(val.slice(src).to_string());
            }
        }
    }

    Ok(CandidateAttr {
        type_str: Some(type_str),
        parsed: Some(IceCandidate {
            foundation: foundation.slice(src).to_string(),
            component_id,
            transport,
            priority,
            endpoint: Endpoint { address, port },
            typ,
            related,
            ufrag,
        }),
    })
}

/// Result of parsing a standalone candidate line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateParse {
    Parsed(IceCandidate),
    /// Syntactically fine, but the transport or type is not supported
    Unsupported,
}

/// Parses a bare `candidate:` value (without `a=`), including the
/// extended key/value syntax used by trickle-ICE fragments.
pub fn sdp_parse_candidate(s: &str) -> Result<CandidateParse> {
    let span = Span::new(0, s.len());
    match parse_candidate_value(s, span, true) {
        Err(()) => Err(Error::InvalidCandidate(s.to_string())),
        Ok(CandidateAttr { parsed: None, .. }) => Ok(CandidateParse::Unsupported),
        Ok(CandidateAttr {
            parsed: Some(cand), ..
        }) => Ok(CandidateParse::Parsed(cand)),
    }
}

fn parse_crypto(src: &str, value: Span) -> std::result::Result<CryptoAttr, &'static str> {
    let mut sc = Scanner::new(src, value);

    let tag_str = sc.token().ok_or("missing tag")?;
    let suite_str = sc.token().ok_or("missing crypto suite")?;
    let key_params = sc.token().ok_or("missing key parameters")?;

    let tag: u32 = tag_str.slice(src).parse().map_err(|_| "invalid 'tag'")?;

    let suite = crypto_find_suite(suite_str.slice(src)).ok_or("unknown crypto suite")?;
    let salt_key_len = suite.master_key_len + suite.master_salt_len;
    let enc_salt_key_len = (salt_key_len * 4).div_ceil(3);

    let key_params_str = key_params.slice(src);
    // offsets below slice by byte position
    if !key_params_str.is_ascii() {
        return Err("invalid key parameter syntax");
    }
    if key_params_str.len() < 7 + enc_salt_key_len {
        return Err("invalid key parameter length");
    }
    if !key_params_str[..7].eq_ignore_ascii_case("inline:") {
        return Err("unknown key method");
    }

    let key_b64 = &key_params_str[7..7 + enc_salt_key_len];
    let decoded = B64_LENIENT
        .decode(key_b64)
        .map_err(|_| "invalid base64 encoding")?;
    if decoded.len() != salt_key_len {
        return Err("invalid base64 encoding");
    }
    let master_key = decoded[..suite.master_key_len].to_vec();
    let salt = decoded[suite.master_key_len..].to_vec();

    // past the key, skipping any base64 padding the sender included
    let mut rem = &key_params_str[7 + enc_salt_key_len..];
    match enc_salt_key_len % 4 {
        2 => rem = rem.strip_prefix("==").unwrap_or(rem),
        3 => rem = rem.strip_prefix('=').unwrap_or(rem),
        _ => (),
    }

    let mut lifetime_str: Option<&str> = None;
    let mut mki_str: Option<&str> = None;
    if rem.len() >= 2 {
        let rest = rem.strip_prefix('|').ok_or("invalid key parameter syntax")?;
        match rest.find('|') {
            None => {
                if rest.contains(':') {
                    mki_str = Some(rest);
                } else {
                    lifetime_str = Some(rest);
                }
            }
            Some(i) => {
                lifetime_str = Some(&rest[..i]);
                mki_str = Some(&rest[i + 1..]);
            }
        }
    }

    let mut lifetime = 0u64;
    if let Some(lt) = lifetime_str {
        if lt.len() >= 3 && lt.starts_with("2^") {
            let exp: u64 = lt[2..].parse().unwrap_or(0);
            if exp == 0 || exp >= 64 {
                return Err("invalid key lifetime");
            }
            lifetime = 1u64 << exp;
        } else {
            lifetime = lt.parse().unwrap_or(0);
        }
        if lifetime == 0 || lifetime > suite.srtp_lifetime {
            return Err("invalid key lifetime");
        }
    }

    let mut mki = Vec::new();
    if let Some(mk) = mki_str {
        let colon = mk.find(':').ok_or("invalid MKI specification")?;
        let mki_value: u32 = mk[..colon].parse().map_err(|_| "invalid MKI specification")?;
        let mki_len: usize = mk[colon + 1..]
            .parse()
            .map_err(|_| "invalid MKI specification")?;
        if mki_len > 256 {
            return Err("MKI too long");
        }
        mki = vec![0u8; mki_len];
        let be = mki_value.to_be_bytes();
        if mki_len >= 4 {
            mki[mki_len - 4..].copy_from_slice(&be);
        } else {
            mki.copy_from_slice(&be[4 - mki_len..]);
        }
    }

    let mut out = CryptoAttr {
        tag,
        suite,
        master_key,
        salt,
        lifetime,
        mki,
        unencrypted_srtcp: false,
        unencrypted_srtp: false,
        unauthenticated_srtp: false,
    };

    while let Some(p) = sc.token() {
        match p.slice(src) {
            "UNENCRYPTED_SRTCP" => out.unencrypted_srtcp = true,
            "UNENCRYPTED_SRTP" => out.unencrypted_srtp = true,
            "UNAUTHENTICATED_SRTP" => out.unauthenticated_srtp = true,
            _ => (),
        }
    }

    Ok(out)
}

fn parse_fingerprint(src: &str, value: Span) -> Option<FingerprintAttr> {
    let mut sc = Scanner::new(src, value);
    let hash_str = sc.token()?;
    let fp_str = sc.token()?;

    let hash_func = dtls_find_hash_func(hash_str.slice(src))?;

    let mut digest = Vec::with_capacity(hash_func.num_bytes);
    for part in fp_str.slice(src).split(':') {
        if part.len() != 2 {
            return None;
        }
        digest.push(u8::from_str_radix(part, 16).ok()?);
    }
    if digest.len() != hash_func.num_bytes {
        return None;
    }

    Some(FingerprintAttr { hash_func, digest })
}

fn parse_setup(src: &str, value: Option<Span>) -> SetupValue {
    match value.map(|v| v.slice(src)) {
        Some("actpass") => SetupValue::ActPass,
        Some("active") => SetupValue::Active,
        Some("passive") => SetupValue::Passive,
        Some("holdconn") => SetupValue::HoldConn,
        _ => SetupValue::Unknown,
    }
}

fn parse_rtpmap(src: &str, value: Span) -> Option<RtpmapAttr> {
    let mut sc = Scanner::new(src, value);
    let pt_str = sc.token()?;
    let encoding_str = sc.token()?;

    let payload_type: u8 = pt_str.slice(src).parse().ok()?;

    let full = encoding_str.slice(src);
    let slash = full.find('/')?;
    let encoding = &full[..slash];
    let mut clock_str = &full[slash + 1..];

    let mut channels = 1u32;
    let mut encoding_parameters = String::new();
    if let Some(slash2) = clock_str.find('/') {
        encoding_parameters = clock_str[slash2 + 1..].to_string();
        clock_str = &clock_str[..slash2];
        if !encoding_parameters.is_empty() {
            if let Ok(ch) = encoding_parameters.parse::<u32>() {
                if ch != 0 {
                    channels = ch;
                }
            }
        }
    }

    if clock_str.is_empty() {
        return None;
    }
    let clock_rate: u32 = clock_str.parse().ok()?;

    Some(RtpmapAttr {
        payload_type,
        pt: RtpPayloadType {
            payload_type,
            encoding: encoding.to_string(),
            encoding_with_params: full.to_string(),
            clock_rate,
            channels,
            encoding_parameters,
            format_parameters: String::new(),
            rtcp_fb: Vec::new(),
            ptime: 0,
        },
    })
}

fn parse_rtcp_fb(src: &str, value: Span) -> Option<RtcpFbAttr> {
    let mut sc = Scanner::new(src, value);
    let pt_str = sc.token()?;
    let rest = sc.rest();

    let payload_type = if pt_str.slice(src) == "*" {
        -1
    } else {
        let pt = str_to_i(pt_str.slice(src), -1);
        if pt == -1 {
            return None;
        }
        pt
    };

    Some(RtcpFbAttr {
        payload_type,
        value: rest,
    })
}

fn parse_fmtp(src: &str, value: Span) -> Option<FmtpAttr> {
    let mut sc = Scanner::new(src, value);
    let pt_str = sc.token()?;
    let rest = sc.rest();

    let payload_type = str_to_i(pt_str.slice(src), -1);
    if payload_type == -1 {
        return None;
    }

    Some(FmtpAttr {
        payload_type,
        format_parms: rest,
    })
}

fn parse_t38_udp_ec(src: &str, value: Option<Span>) -> T38UdpEc {
    match value.map(|v| v.slice(src)) {
        Some("t38UDPNoEC") => T38UdpEc::NoEc,
        Some("t38UDPRedundancy") => T38UdpEc::Redundancy,
        Some("t38UDPFEC") => T38UdpEc::Fec,
        _ => T38UdpEc::Unknown,
    }
}

fn parse_t38_rate_management(src: &str, value: Option<Span>) -> T38RateManagement {
    match value.map(|v| v.slice(src)) {
        Some("localTFC") => T38RateManagement::LocalTcf,
        Some("transferredTCF") => T38RateManagement::TransferredTcf,
        _ => T38RateManagement::Unknown,
    }
}

fn parse_t38_ec_depth(src: &str, value: Option<Span>) -> AttrPayload {
    let Some(value) = value else {
        return AttrPayload::T38EcDepth {
            minred: 0,
            maxred: -1,
        };
    };
    let mut sc = Scanner::new(src, value);
    let minred = sc
        .token()
        .map(|t| str_to_i(t.slice(src), 0))
        .unwrap_or(0);
    let maxred = str_to_i(sc.rest().slice(src), -1);
    AttrPayload::T38EcDepth { minred, maxred }
}

fn parse_int_attr(src: &str, value: Option<Span>, def: i32) -> AttrPayload {
    AttrPayload::Int(value.map(|v| str_to_i(v.slice(src), def)).unwrap_or(def))
}

/// Parses one `a=` line into an attribute record.
///
/// `full_line` covers `a=...` including the newline; `line_value` is the
/// text after `a=`. Semantic failures downgrade the attribute to
/// [`AttrId::Ignore`] rather than failing the parse.
pub fn parse_attribute(src: &str, full_line: Span, line_value: Span) -> SdpAttribute {
    let mut attr = SdpAttribute {
        full_line,
        line_value,
        name: line_value,
        value: None,
        key: None,
        param: None,
        id: AttrId::Other,
        payload: AttrPayload::None,
    };

    let lv = line_value.slice(src);
    if let Some(colon) = lv.find(':') {
        attr.name = Span::new(line_value.start, line_value.start + colon);
        let value = Span::new(line_value.start + colon + 1, line_value.end);
        attr.value = Some(value);

        let value_text = value.slice(src);
        if let Some(space) = value_text.find(' ') {
            attr.key = Some(Span::new(line_value.start, value.start + space));
            let param = Span::new(value.start + space + 1, value.end);
            if !param.is_empty() {
                attr.param = Some(param);
            }
        } else {
            attr.key = Some(line_value);
        }
    }

    let name = attr.name.slice(src);
    let value = attr.value;

    match name {
        "mid" => attr.id = AttrId::Mid,
        "rtcp" => match parse_rtcp(src, value) {
            Some(rtcp) => {
                attr.id = AttrId::Rtcp;
                attr.payload = AttrPayload::Rtcp(rtcp);
            }
            None => {
                warn!("Failed to parse a=rtcp attribute, ignoring");
                attr.id = AttrId::Ignore;
            }
        },
        "fmtp" => match value.and_then(|v| parse_fmtp(src, v)) {
            Some(fmtp) => {
                attr.id = AttrId::Fmtp;
                attr.payload = AttrPayload::Fmtp(fmtp);
            }
            None => {
                warn!("Failed to parse a=fmtp attribute, ignoring");
                attr.id = AttrId::Ignore;
            }
        },
        "group" => {
            attr.id = AttrId::Group;
            let semantics = match value.map(|v| v.slice(src)) {
                Some(v) if v.starts_with("BUNDLE ") => GroupSemantics::Bundle,
                _ => GroupSemantics::Other,
            };
            attr.payload = AttrPayload::Group(semantics);
        }
        "setup" => {
            attr.id = AttrId::Setup;
            attr.payload = AttrPayload::Setup(parse_setup(src, value));
        }
        "ptime" => attr.id = AttrId::Ptime,
        "crypto" => match value.map(|v| parse_crypto(src, v)) {
            Some(Ok(crypto)) => {
                attr.id = AttrId::Crypto;
                attr.payload = AttrPayload::Crypto(Box::new(crypto));
            }
            Some(Err(err)) => {
                error!("Failed to parse a=crypto attribute, ignoring: {}", err);
                attr.id = AttrId::Ignore;
            }
            None => {
                error!("Failed to parse a=crypto attribute, ignoring: no value");
                attr.id = AttrId::Ignore;
            }
        },
        "extmap" => attr.payload = AttrPayload::Other(SdpAttrType::Extmap),
        "rtpmap" => match value.and_then(|v| parse_rtpmap(src, v)) {
            Some(rtpmap) => {
                attr.id = AttrId::Rtpmap;
                attr.payload = AttrPayload::Rtpmap(Box::new(rtpmap));
            }
            None => {
                warn!("Failed to parse a=rtpmap attribute, ignoring");
                attr.id = AttrId::Ignore;
            }
        },
        "ice-pwd" => attr.id = AttrId::IcePwd,
        "ice-lite" => attr.id = AttrId::IceLite,
        "inactive" => attr.id = AttrId::Inactive,
        "sendrecv" => attr.id = AttrId::Sendrecv,
        "sendonly" => attr.id = AttrId::Sendonly,
        "recvonly" => attr.id = AttrId::Recvonly,
        "rtcp-mux" => attr.id = AttrId::RtcpMux,
        "candidate" => match value.map(|v| parse_candidate_value(src, v, false)) {
            Some(Ok(cand)) => {
                attr.id = AttrId::Candidate;
                attr.payload = AttrPayload::Candidate(cand);
            }
            _ => {
                warn!("Failed to parse a=candidate attribute, ignoring");
                attr.id = AttrId::Ignore;
            }
        },
        "ice-ufrag" => attr.id = AttrId::IceUfrag,
        "rtpengine" => attr.id = AttrId::Rtpengine,
        "ice-options" => attr.id = AttrId::IceOptions,
        "fingerprint" => match value.and_then(|v| parse_fingerprint(src, v)) {
            Some(fp) => {
                attr.id = AttrId::Fingerprint;
                attr.payload = AttrPayload::Fingerprint(fp);
            }
            None => {
                warn!("Failed to parse a=fingerprint attribute, ignoring");
                attr.id = AttrId::Ignore;
            }
        },
        "tls-id" => attr.id = AttrId::TlsId,
        "ice-mismatch" => attr.id = AttrId::Ice,
        "remote-candidates" => attr.id = AttrId::Ice,
        "end-of-candidates" => attr.id = AttrId::EndOfCandidates,
        "rtcp-fb" => match value.and_then(|v| parse_rtcp_fb(src, v)) {
            Some(fb) => {
                attr.id = AttrId::RtcpFb;
                attr.payload = AttrPayload::RtcpFb(fb);
            }
            None => {
                warn!("Failed to parse a=rtcp-fb attribute, ignoring");
                attr.id = AttrId::Ignore;
            }
        },
        "T38FaxVersion" => {
            attr.id = AttrId::T38FaxVersion;
            attr.payload = parse_int_attr(src, value, -1);
        }
        "T38FaxUdpEC" => {
            attr.id = AttrId::T38FaxUdpEc;
            attr.payload = AttrPayload::T38UdpEc(parse_t38_udp_ec(src, value));
        }
        "T38FaxUdpECDepth" => {
            attr.id = AttrId::T38FaxUdpEcDepth;
            attr.payload = parse_t38_ec_depth(src, value);
        }
        "T38FaxUdpFECMaxSpan" => {
            attr.id = AttrId::T38FaxUdpFecMaxSpan;
            attr.payload = parse_int_attr(src, value, 0);
        }
        "T38FaxMaxDatagram" => {
            attr.id = AttrId::T38FaxMaxDatagram;
            attr.payload = parse_int_attr(src, value, -1);
        }
        "T38FaxMaxIFP" => {
            attr.id = AttrId::T38FaxMaxIfp;
            attr.payload = parse_int_attr(src, value, -1);
        }
        "T38FaxFillBitRemoval" => attr.id = AttrId::T38FaxFillBitRemoval,
        "T38FaxTranscodingMMR" => attr.id = AttrId::T38FaxTranscodingMmr,
        "T38FaxTranscodingJBIG" => attr.id = AttrId::T38FaxTranscodingJbig,
        "T38FaxRateManagement" => {
            attr.id = AttrId::T38FaxRateManagement;
            attr.payload = AttrPayload::T38RateManagement(parse_t38_rate_management(src, value));
        }
        "T38MaxBitRate" => attr.id = AttrId::T38MaxBitRate,
        "T38FaxMaxBuffer" => attr.id = AttrId::T38FaxMaxBuffer,
        "xg726bitorder" => attr.id = AttrId::Xg726BitOrder,
        "maxptime" => attr.id = AttrId::MaxPtime,
        "label" => attr.id = AttrId::Label,
        "direction" => attr.id = AttrId::Direction,
        _ => attr.payload = AttrPayload::Other(SdpAttrType::Unknown),
    }

    attr
}
