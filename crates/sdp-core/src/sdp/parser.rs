//! SDP session parsing (RFC 4566).
//!
//! Builds a tree of sessions, media sections and attributes over the raw
//! body. All text is kept as spans into the input so the rewriter can
//! reproduce untouched regions byte for byte; section extents and the
//! insertion anchor for synthesized `c=` lines are recorded along the way.

use nom::{
    bytes::complete::{tag, take_until},
    character::complete::digit1,
    IResult,
};
use tracing::warn;

use crate::error::{Error, Result};
use crate::flags::SdpFlags;
use crate::media::MediaType;
use crate::sdp::attributes::{parse_attribute, AttrId, Attributes};
use crate::sdp::span::{fallback_origin_address, NetworkAddress, Scanner, Span};

/// Parsed `o=` line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Origin {
    pub username: Span,
    pub session_id: Span,
    pub version_str: Span,
    pub version_num: u64,
    pub address: NetworkAddress,
    pub parsed: bool,
    /// Offset of the version string in the rewritten output, recorded
    /// during a rewrite for later in-place restamping
    pub version_output_pos: usize,
    /// Current length of the version string in the rewritten output
    pub version_output_len: usize,
}

/// Parsed `c=` line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Connection {
    /// The whole line value, for verbatim re-insertion
    pub s: Span,
    pub address: NetworkAddress,
    pub parsed: bool,
}

/// One `m=` section.
#[derive(Debug, Default)]
pub struct SdpMedia {
    /// Entire section including the `m=` line and all following lines
    pub s: Span,
    pub media_type_str: Span,
    pub media_type_id: MediaType,
    pub port: Span,
    pub port_num: u16,
    pub port_count: u32,
    pub transport: Span,
    /// Space-separated format list
    pub formats: Span,
    pub format_list: Vec<Span>,
    pub connection: Connection,
    /// Offset of the first `b=`/`a=`/`k=` line (or the next `m=`), where a
    /// synthesized `c=` line belongs
    pub c_line_pos: Option<usize>,
    /// b=AS / b=RR / b=RS, -1 when absent
    pub bandwidth_as: i32,
    pub bandwidth_rr: i32,
    pub bandwidth_rs: i32,
    pub attributes: Attributes,
    /// Index of this media across all sessions of the body
    pub media_sdp_id: usize,
    /// Section belongs to a collapsed legacy OSRTP pair and must be
    /// skipped by the rewriter
    pub legacy_osrtp: bool,
}

/// One SDP session (`v=` block).
#[derive(Debug, Default)]
pub struct SdpSession {
    /// Session header extent: `v=` up to the first `m=` line
    pub s: Span,
    pub origin: Origin,
    pub session_name: Span,
    pub session_timing: Span,
    pub connection: Connection,
    /// Session-level b=RR / b=RS, -1 when absent
    pub bandwidth_rr: i32,
    pub bandwidth_rs: i32,
    pub attributes: Attributes,
    pub media: Vec<SdpMedia>,
}

/// All sessions of one SDP body.
#[derive(Debug, Default)]
pub struct SdpSessions {
    pub sessions: Vec<SdpSession>,
    /// Effective body length; shorter than the input when parsing stopped
    /// at a stray blank line
    pub body_len: usize,
}

impl SdpSessions {
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// nom parser for `b=` values: `<bwtype>:<bandwidth>`.
fn bandwidth_value_parser(input: &str) -> IResult<&str, (&str, i32)> {
    let (input, bw_type) = take_until(":")(input)?;
    let (input, _) = tag(":")(input)?;
    let (input, bw_value) = digit1(input)?;
    let bw_value = bw_value.parse().unwrap_or(0);
    Ok((input, (bw_type, bw_value)))
}

fn parse_origin(src: &str, value: Span, output: &mut Origin) -> std::result::Result<(), ()> {
    if output.parsed {
        return Err(());
    }

    let mut sc = Scanner::new(src, value);
    output.username = sc.token().ok_or(())?;
    output.session_id = sc.token().ok_or(())?;
    output.version_str = sc.token().ok_or(())?;

    let mut address = NetworkAddress::extract(&mut sc, src).ok_or(())?;
    // keep a placeholder for unparseable origin addresses so the session
    // remains usable
    if address.parsed.is_none() {
        address.parsed = Some(fallback_origin_address());
    }
    output.address = address;

    output.version_num = leading_u64(output.version_str.slice(src));
    output.parsed = true;
    Ok(())
}

fn parse_connection(src: &str, value: Span, output: &mut Connection) -> std::result::Result<(), ()> {
    if output.parsed {
        return Err(());
    }

    output.s = value;

    let mut sc = Scanner::new(src, value);
    let address = NetworkAddress::extract(&mut sc, src).ok_or(())?;
    if address.parsed.is_none() {
        return Err(());
    }
    output.address = address;

    output.parsed = true;
    Ok(())
}

fn parse_media(src: &str, value: Span, output: &mut SdpMedia) -> std::result::Result<(), ()> {
    let mut sc = Scanner::new(src, value);
    output.media_type_str = sc.token().ok_or(())?;
    output.port = sc.token().ok_or(())?;
    output.transport = sc.token().ok_or(())?;
    output.formats = sc.rest();

    output.media_type_id = MediaType::from_token(output.media_type_str.slice(src));

    let port_str = output.port.slice(src);
    let (port_part, count_part) = match port_str.find('/') {
        Some(i) => (&port_str[..i], Some(&port_str[i + 1..])),
        None => (port_str, None),
    };
    let port_num: u32 = port_part.parse().map_err(|_| ())?;
    if port_num > 0xffff {
        return Err(());
    }
    output.port_num = port_num as u16;

    output.port_count = match count_part {
        Some(c) => {
            let count: u32 = c.parse().map_err(|_| ())?;
            if count == 0 || count > 10 {
                return Err(());
            }
            count
        }
        None => 1,
    };

    let mut fsc = Scanner::new(src, output.formats);
    while let Some(fmt) = fsc.token() {
        output.format_list.push(fmt);
    }

    Ok(())
}

fn new_session(start: usize) -> SdpSession {
    SdpSession {
        s: Span::new(start, start),
        bandwidth_rr: -1,
        bandwidth_rs: -1,
        ..Default::default()
    }
}

/// Parses an SDP body into its sessions.
///
/// The body must start with `v=0` unless `flags.fragment` is set, in which
/// case an empty session is synthesized to host trickle-ICE attributes.
/// Parsing stops at a bare empty line unless `flags.reject_invalid_sdp`
/// is set; the effective length is recorded on the result.
pub fn sdp_parse(body: &str, flags: &SdpFlags) -> Result<SdpSessions> {
    let bytes = body.as_bytes();
    let end = body.len();

    let mut out = SdpSessions {
        sessions: Vec::new(),
        body_len: end,
    };

    let mut media_sdp_id = 0usize;
    let mut pos = 0usize;

    let fail = |pos: usize, msg: &str| -> Result<SdpSessions> {
        warn!("Error parsing SDP at offset {}: {}", pos, msg);
        Err(Error::parsing(pos, msg))
    };

    while pos + 1 < end {
        if !flags.reject_invalid_sdp && (bytes[pos] == b'\n' || bytes[pos] == b'\r') {
            out.body_len = pos;
            break;
        }
        if bytes[pos + 1] != b'=' {
            return fail(pos, "Missing '=' sign");
        }

        let value_start = pos + 2;
        let (line_end, next_line) = match body[value_start..].find('\n') {
            // assume missing LF at end of body
            None => (end, None),
            Some(i) => {
                let nl = value_start + i;
                let le = if nl > value_start && bytes[nl - 1] == b'\r' {
                    nl - 1
                } else {
                    nl
                };
                (le, Some(nl + 1))
            }
        };
        let value = Span::new(value_start, line_end);

        let line_type = bytes[pos];

        if out.sessions.is_empty() && line_type != b'v' {
            if !flags.fragment {
                return fail(pos, "SDP doesn't start with a session definition");
            }
            // trickle-ICE fragment: synthesize a session, then process the
            // line normally
            out.sessions.push(new_session(pos));
        }

        match line_type {
            b'v' => {
                if value.len() != 1 || bytes[value_start] != b'0' {
                    return fail(pos, "Error in v= line");
                }
                out.sessions.push(new_session(pos));
            }

            b'o' => {
                let session = out.sessions.last_mut().expect("session exists");
                if !session.media.is_empty() {
                    return fail(pos, "o= line found within media section");
                }
                if parse_origin(body, value, &mut session.origin).is_err() {
                    return fail(pos, "Error parsing o= line");
                }
            }

            b'm' => {
                let session = out.sessions.last_mut().expect("session exists");
                if let Some(prev) = session.media.last_mut() {
                    if prev.c_line_pos.is_none() {
                        prev.c_line_pos = Some(pos);
                    }
                }
                let mut media = SdpMedia {
                    s: Span::new(pos, pos),
                    bandwidth_as: -1,
                    bandwidth_rr: -1,
                    bandwidth_rs: -1,
                    media_sdp_id,
                    ..Default::default()
                };
                media_sdp_id += 1;
                if parse_media(body, value, &mut media).is_err() {
                    return fail(pos, "Error parsing m= line");
                }
                session.media.push(media);
            }

            b'c' => {
                let session = out.sessions.last_mut().expect("session exists");
                let conn = match session.media.last_mut() {
                    Some(media) => &mut media.connection,
                    None => &mut session.connection,
                };
                if parse_connection(body, value, conn).is_err() {
                    return fail(pos, "Error parsing c= line");
                }
            }

            b'a' => {
                let session = out.sessions.last_mut().expect("session exists");
                if let Some(media) = session.media.last_mut() {
                    if media.c_line_pos.is_none() {
                        media.c_line_pos = Some(pos);
                    }
                }
                let full_line = Span::new(pos, next_line.unwrap_or(line_end));
                let attr = parse_attribute(body, full_line, value);
                let attrs = match session.media.last_mut() {
                    Some(media) => &mut media.attributes,
                    None => &mut session.attributes,
                };
                attrs.insert(attr);
            }

            b'b' => {
                let session = out.sessions.last_mut().expect("session exists");
                if let Some(media) = session.media.last_mut() {
                    if media.c_line_pos.is_none() {
                        media.c_line_pos = Some(pos);
                    }
                }
                // shortest valid form is "RR:0"
                if value.len() >= 4 {
                    if let Ok((_, (bw_type, bw_value))) = bandwidth_value_parser(value.slice(body))
                    {
                        let media = session.media.last_mut();
                        match bw_type {
                            // AS only supported per media
                            "AS" => {
                                if let Some(m) = media {
                                    m.bandwidth_as = bw_value;
                                }
                            }
                            "RR" => match media {
                                Some(m) => m.bandwidth_rr = bw_value,
                                None => session.bandwidth_rr = bw_value,
                            },
                            "RS" => match media {
                                Some(m) => m.bandwidth_rs = bw_value,
                                None => session.bandwidth_rs = bw_value,
                            },
                            _ => (),
                        }
                    }
                }
            }

            b'k' => {
                let session = out.sessions.last_mut().expect("session exists");
                if let Some(media) = session.media.last_mut() {
                    if media.c_line_pos.is_none() {
                        media.c_line_pos = Some(pos);
                    }
                }
            }

            b's' => {
                let session = out.sessions.last_mut().expect("session exists");
                if !session.media.is_empty() {
                    return fail(pos, "s= line found within media section");
                }
                session.session_name = value;
            }

            b't' => {
                let session = out.sessions.last_mut().expect("session exists");
                if !session.media.is_empty() {
                    return fail(pos, "t= line found within media section");
                }
                session.session_timing = value;
            }

            b'i' | b'u' | b'e' | b'p' | b'r' | b'z' => (),

            _ => {
                return fail(pos, "Unknown SDP line type found");
            }
        }

        // extend the current section to cover this line including its
        // terminator
        let section_end = next_line.unwrap_or(end);
        let session = out.sessions.last_mut().expect("session exists");
        match session.media.last_mut() {
            Some(media) => media.s.end = section_end,
            None => session.s.end = section_end,
        }

        match next_line {
            Some(n) => pos = n,
            None => break,
        }
    }

    Ok(out)
}

fn leading_u64(s: &str) -> u64 {
    let digits: &str = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(i) => &s[..i],
        None => s,
    };
    digits.parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = "v=0\r\no=- 1 1 IN IP4 1.2.3.4\r\ns=-\r\nt=0 0\r\nm=audio 5000 RTP/AVP 0\r\nc=IN IP4 1.2.3.4\r\n";

    #[test]
    fn test_parse_minimal() {
        let flags = SdpFlags::new();
        let parsed = sdp_parse(MINIMAL, &flags).unwrap();
        assert_eq!(parsed.sessions.len(), 1);

        let session = &parsed.sessions[0];
        assert!(session.origin.parsed);
        assert_eq!(session.origin.username.slice(MINIMAL), "-");
        assert_eq!(session.origin.version_str.slice(MINIMAL), "1");
        assert_eq!(session.origin.version_num, 1);
        assert_eq!(session.session_name.slice(MINIMAL), "-");
        assert_eq!(session.session_timing.slice(MINIMAL), "0 0");
        // session header ends at the m= line
        assert_eq!(session.s.slice(MINIMAL), "v=0\r\no=- 1 1 IN IP4 1.2.3.4\r\ns=-\r\nt=0 0\r\n");

        assert_eq!(session.media.len(), 1);
        let media = &session.media[0];
        assert_eq!(media.media_type_str.slice(MINIMAL), "audio");
        assert_eq!(media.media_type_id, MediaType::Audio);
        assert_eq!(media.port_num, 5000);
        assert_eq!(media.port_count, 1);
        assert_eq!(media.transport.slice(MINIMAL), "RTP/AVP");
        assert_eq!(media.formats.slice(MINIMAL), "0");
        assert_eq!(media.format_list.len(), 1);
        assert!(media.connection.parsed);
        // media section runs to the end of the body
        assert_eq!(media.s.end, MINIMAL.len());
    }

    #[test]
    fn test_must_start_with_v() {
        let flags = SdpFlags::new();
        assert!(matches!(
            sdp_parse("o=- 1 1 IN IP4 1.2.3.4\r\n", &flags),
            Err(Error::SdpParsing { .. })
        ));
    }

    #[test]
    fn test_v_must_be_zero() {
        let flags = SdpFlags::new();
        assert!(sdp_parse("v=1\r\n", &flags).is_err());
    }

    #[test]
    fn test_fragment_mode_keeps_attributes() {
        let mut flags = SdpFlags::new();
        flags.fragment = true;
        let body = "a=ice-ufrag:abcd\r\na=end-of-candidates\r\n";
        let parsed = sdp_parse(body, &flags).unwrap();
        assert_eq!(parsed.sessions.len(), 1);
        let session = &parsed.sessions[0];
        assert!(session.attributes.has(AttrId::IceUfrag));
        assert!(session.attributes.has(AttrId::EndOfCandidates));
    }

    #[test]
    fn test_missing_equals_fatal() {
        let flags = SdpFlags::new();
        let err = sdp_parse("v=0\r\nbogus line\r\n", &flags).unwrap_err();
        match err {
            Error::SdpParsing { offset, .. } => assert_eq!(offset, 5),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_o_inside_media_fatal() {
        let flags = SdpFlags::new();
        let body = "v=0\r\no=- 1 1 IN IP4 1.2.3.4\r\ns=-\r\nt=0 0\r\nm=audio 5000 RTP/AVP 0\r\no=- 2 2 IN IP4 1.2.3.4\r\n";
        assert!(sdp_parse(body, &flags).is_err());
    }

    #[test]
    fn test_blank_line_truncates() {
        let flags = SdpFlags::new();
        let body = "v=0\r\no=- 1 1 IN IP4 1.2.3.4\r\ns=-\r\nt=0 0\r\n\r\ngarbage";
        let parsed = sdp_parse(body, &flags).unwrap();
        assert_eq!(parsed.sessions.len(), 1);
        assert!(parsed.body_len < body.len());
        assert_eq!(&body[..parsed.body_len], "v=0\r\no=- 1 1 IN IP4 1.2.3.4\r\ns=-\r\nt=0 0\r\n");
    }

    #[test]
    fn test_blank_line_strict_mode() {
        let mut flags = SdpFlags::new();
        flags.reject_invalid_sdp = true;
        let body = "v=0\r\no=- 1 1 IN IP4 1.2.3.4\r\ns=-\r\nt=0 0\r\n\r\ngarbage";
        assert!(sdp_parse(body, &flags).is_err());
    }

    #[test]
    fn test_port_count() {
        let flags = SdpFlags::new();
        let body = "v=0\r\no=- 1 1 IN IP4 1.2.3.4\r\ns=-\r\nt=0 0\r\nm=audio 5000/2 RTP/AVP 0 8\r\n";
        let parsed = sdp_parse(body, &flags).unwrap();
        let media = &parsed.sessions[0].media[0];
        assert_eq!(media.port_num, 5000);
        assert_eq!(media.port_count, 2);
        assert_eq!(media.format_list.len(), 2);
    }

    #[test]
    fn test_port_count_limit() {
        let flags = SdpFlags::new();
        let body = "v=0\r\no=- 1 1 IN IP4 1.2.3.4\r\ns=-\r\nt=0 0\r\nm=audio 5000/11 RTP/AVP 0\r\n";
        assert!(sdp_parse(body, &flags).is_err());
    }

    #[test]
    fn test_bandwidth_lines() {
        let flags = SdpFlags::new();
        let body = "v=0\r\no=- 1 1 IN IP4 1.2.3.4\r\ns=-\r\nt=0 0\r\nb=RR:800\r\nb=RS:1200\r\nm=audio 5000 RTP/AVP 0\r\nb=AS:128\r\n";
        let parsed = sdp_parse(body, &flags).unwrap();
        let session = &parsed.sessions[0];
        assert_eq!(session.bandwidth_rr, 800);
        assert_eq!(session.bandwidth_rs, 1200);
        let media = &session.media[0];
        assert_eq!(media.bandwidth_as, 128);
        assert_eq!(media.bandwidth_rr, -1);
    }

    #[test]
    fn test_c_line_pos_anchor() {
        let flags = SdpFlags::new();
        let body = "v=0\r\no=- 1 1 IN IP4 1.2.3.4\r\ns=-\r\nt=0 0\r\nc=IN IP4 1.2.3.4\r\nm=audio 5000 RTP/AVP 0\r\na=sendrecv\r\n";
        let parsed = sdp_parse(body, &flags).unwrap();
        let media = &parsed.sessions[0].media[0];
        // the a= line is where a synthesized c= would go
        let a_pos = body.find("a=sendrecv").unwrap();
        assert_eq!(media.c_line_pos, Some(a_pos));
    }

    #[test]
    fn test_media_without_attrs_has_no_anchor() {
        let flags = SdpFlags::new();
        let parsed = sdp_parse(MINIMAL, &flags).unwrap();
        // only a c= line follows the m= line, which is no anchor
        assert_eq!(parsed.sessions[0].media[0].c_line_pos, None);
    }

    #[test]
    fn test_tolerated_line_types() {
        let flags = SdpFlags::new();
        let body = "v=0\r\no=- 1 1 IN IP4 1.2.3.4\r\ns=-\r\ni=info\r\nu=http://example.com\r\ne=a@b.c\r\np=+1234\r\nt=0 0\r\nz=0 0\r\nm=audio 5000 RTP/AVP 0\r\n";
        assert!(sdp_parse(body, &flags).is_ok());
    }

    #[test]
    fn test_lf_only_line_endings() {
        let flags = SdpFlags::new();
        let body = "v=0\no=- 1 1 IN IP4 1.2.3.4\ns=-\nt=0 0\nm=audio 5000 RTP/AVP 0\nc=IN IP4 1.2.3.4\n";
        let parsed = sdp_parse(body, &flags).unwrap();
        assert_eq!(parsed.sessions[0].media.len(), 1);
        assert_eq!(parsed.sessions[0].origin.username.slice(body), "-");
    }

    #[test]
    fn test_second_session() {
        let flags = SdpFlags::new();
        let body = "v=0\r\no=- 1 1 IN IP4 1.2.3.4\r\ns=-\r\nt=0 0\r\nm=audio 5000 RTP/AVP 0\r\nc=IN IP4 1.2.3.4\r\nv=0\r\no=- 2 2 IN IP4 5.6.7.8\r\ns=-\r\nt=0 0\r\nm=audio 6000 RTP/AVP 8\r\nc=IN IP4 5.6.7.8\r\n";
        let parsed = sdp_parse(body, &flags).unwrap();
        assert_eq!(parsed.sessions.len(), 2);
        assert_eq!(parsed.sessions[1].media[0].port_num, 6000);
        // media ids number across sessions
        assert_eq!(parsed.sessions[0].media[0].media_sdp_id, 0);
        assert_eq!(parsed.sessions[1].media[0].media_sdp_id, 1);
    }
}
