//! Byte-slice primitives for positional SDP parsing.
//!
//! The rewriting engine edits the original body in place, so every parsed
//! piece of text is tracked as a byte range (`Span`) into the input buffer
//! rather than as an owned copy. Owned copies are made only when values
//! leave the lifetime of the parsed session tree (stream parameters).

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use serde::{Deserialize, Serialize};

/// A byte range into the SDP input buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end);
        Span { start, end }
    }

    /// Span covering `sub`, which must be a subslice of `base`.
    pub fn of(base: &str, sub: &str) -> Self {
        let start = sub.as_ptr() as usize - base.as_ptr() as usize;
        Span::new(start, start + sub.len())
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Resolves the span against the buffer it was carved from.
    pub fn slice<'a>(&self, src: &'a str) -> &'a str {
        &src[self.start..self.end]
    }
}

/// Splits a span into separator-delimited tokens, like repeated calls to a
/// one-character `split`. Runs of the separator are collapsed.
#[derive(Debug, Clone)]
pub struct Scanner<'a> {
    src: &'a str,
    sep: u8,
    pos: usize,
    end: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(src: &'a str, span: Span) -> Self {
        Scanner {
            src,
            sep: b' ',
            pos: span.start,
            end: span.end,
        }
    }

    /// Next token as a span, or `None` when the input is exhausted.
    pub fn token(&mut self) -> Option<Span> {
        let bytes = self.src.as_bytes();
        while self.pos < self.end && bytes[self.pos] == self.sep {
            self.pos += 1;
        }
        if self.pos >= self.end {
            return None;
        }
        let start = self.pos;
        while self.pos < self.end && bytes[self.pos] != self.sep {
            self.pos += 1;
        }
        Some(Span::new(start, self.pos))
    }

    /// Next token resolved to text.
    pub fn token_str(&mut self) -> Option<&'a str> {
        self.token().map(|t| t.slice(self.src))
    }

    /// Everything not yet consumed, with leading separators trimmed.
    pub fn rest(&self) -> Span {
        let bytes = self.src.as_bytes();
        let mut pos = self.pos;
        while pos < self.end && bytes[pos] == self.sep {
            pos += 1;
        }
        Span::new(pos, self.end)
    }
}

/// Address family as it appears on the wire (`IP4` / `IP6`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressFamily {
    V4,
    V6,
}

impl AddressFamily {
    /// RFC 4566 address type token.
    pub fn rfc_name(&self) -> &'static str {
        match self {
            AddressFamily::V4 => "IP4",
            AddressFamily::V6 => "IP6",
        }
    }

    pub fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => AddressFamily::V4,
            IpAddr::V6(_) => AddressFamily::V6,
        }
    }

    /// The all-zeroes address of this family.
    pub fn unspecified(&self) -> IpAddr {
        match self {
            AddressFamily::V4 => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            AddressFamily::V6 => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        }
    }

    pub fn from_rfc_name(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("IP4") {
            Some(AddressFamily::V4)
        } else if s.eq_ignore_ascii_case("IP6") {
            Some(AddressFamily::V6)
        } else {
            None
        }
    }
}

/// Parses an address literal of either family.
pub fn parse_address_any(s: &str) -> Option<IpAddr> {
    s.parse().ok()
}

/// Parses an address literal constrained by the `IP4`/`IP6` type token.
pub fn parse_typed_address(addr_type: &str, s: &str) -> Option<IpAddr> {
    let family = AddressFamily::from_rfc_name(addr_type)?;
    let addr: IpAddr = s.parse().ok()?;
    if AddressFamily::of(&addr) != family {
        return None;
    }
    Some(addr)
}

/// The `<nettype> <addrtype> <address>` triple as found in `o=`, `c=` and
/// `a=rtcp` values, with the literal tokens kept as spans for rewriting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkAddress {
    pub network_type: Span,
    pub address_type: Span,
    pub address: Span,
    /// Parsed literal; `None` when the literal was not a valid address.
    pub parsed: Option<IpAddr>,
}

impl NetworkAddress {
    /// Extracts the address triple from a scanner. Returns `None` only
    /// when tokens are missing; a wrong network type or an unparseable
    /// literal yields `parsed == None` and the caller decides whether
    /// that is fatal.
    pub fn extract(sc: &mut Scanner<'_>, src: &str) -> Option<NetworkAddress> {
        let network_type = sc.token()?;
        let address_type = sc.token()?;
        let address = sc.token()?;
        let parsed = if network_type.slice(src).eq_ignore_ascii_case("IN") {
            parse_typed_address(address_type.slice(src), address.slice(src))
        } else {
            None
        };
        Some(NetworkAddress {
            network_type,
            address_type,
            address,
            parsed,
        })
    }
}

/// The placeholder address recorded when an `o=` line carries an
/// unparseable literal: a parsed-looking, non-unspecified IPv4 value.
pub(crate) fn fallback_origin_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(0, 0, 0, 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_of_subslice() {
        let base = "m=audio 5000 RTP/AVP 0";
        let sub = &base[2..7];
        let span = Span::of(base, sub);
        assert_eq!(span, Span::new(2, 7));
        assert_eq!(span.slice(base), "audio");
    }

    #[test]
    fn test_scanner_tokens() {
        let src = "x 1  UDP 2130706431 ";
        let mut sc = Scanner::new(src, Span::new(2, src.len()));
        assert_eq!(sc.token_str(), Some("1"));
        assert_eq!(sc.token_str(), Some("UDP"));
        assert_eq!(sc.token_str(), Some("2130706431"));
        assert_eq!(sc.token_str(), None);
    }

    #[test]
    fn test_scanner_rest() {
        let src = "rtcp-fb:96 nack pli";
        let mut sc = Scanner::new(src, Span::new(8, src.len()));
        assert_eq!(sc.token_str(), Some("96"));
        assert_eq!(sc.rest().slice(src), "nack pli");
    }

    #[test]
    fn test_network_address_extract() {
        let src = "IN IP4 192.168.1.1";
        let mut sc = Scanner::new(src, Span::new(0, src.len()));
        let addr = NetworkAddress::extract(&mut sc, src).unwrap();
        assert_eq!(addr.parsed, Some("192.168.1.1".parse().unwrap()));
        assert_eq!(addr.address_type.slice(src), "IP4");
    }

    #[test]
    fn test_network_address_bad_nettype_unparsed() {
        let src = "XX IP4 192.168.1.1";
        let mut sc = Scanner::new(src, Span::new(0, src.len()));
        let addr = NetworkAddress::extract(&mut sc, src).unwrap();
        assert_eq!(addr.parsed, None);
    }

    #[test]
    fn test_network_address_missing_tokens() {
        let src = "IN IP4";
        let mut sc = Scanner::new(src, Span::new(0, src.len()));
        assert!(NetworkAddress::extract(&mut sc, src).is_none());
    }

    #[test]
    fn test_typed_address_family_mismatch() {
        assert!(parse_typed_address("IP4", "::1").is_none());
        assert!(parse_typed_address("IP6", "::1").is_some());
    }
}
