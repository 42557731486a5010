//! # rtpbridge-sdp-core
//!
//! SDP offer/answer rewriting engine for the rtpbridge media relay.
//!
//! This crate ingests SDP bodies from a signaling party, extracts the
//! per-media stream parameters the relay needs, and emits rewritten SDP
//! reflecting the relay's own endpoints, codecs, security parameters and
//! ICE candidates, while keeping every untouched byte of the input
//! intact.
//!
//! ## Overview
//!
//! - **Parsing**: [`sdp_parse`] builds a session tree over the raw body;
//!   all parsed text is tracked as byte ranges into the input.
//! - **Extraction**: [`sdp_streams`] folds the tree into
//!   [`StreamParams`](sdp::streams::StreamParams) per media section:
//!   endpoints, codecs, ICE credentials and candidates, DTLS
//!   fingerprints, SDES keys, T.38 options.
//! - **Rewriting**: [`sdp_replace`] edits the original body in place
//!   through an [`SdpChopper`](sdp::chopper::SdpChopper); [`sdp_create`]
//!   synthesizes a body from scratch.
//! - **Versioning**: repeated rewrites towards the same party keep the
//!   `o=` version stable and bump it exactly when the body changes.
//! - **Loop detection**: outgoing bodies can be tagged with a process
//!   instance id and recognized by [`sdp_is_duplicate`] when they come
//!   back around.
//!
//! ## Example
//!
//! ```
//! use rtpbridge_sdp_core::flags::SdpFlags;
//! use rtpbridge_sdp_core::{sdp_parse, sdp_streams};
//!
//! let body = "v=0\r\no=- 1 1 IN IP4 1.2.3.4\r\ns=-\r\nt=0 0\r\n\
//!             m=audio 5000 RTP/AVP 0\r\nc=IN IP4 1.2.3.4\r\n";
//! let mut flags = SdpFlags::new();
//! flags.trust_address = true;
//!
//! let mut sessions = sdp_parse(body, &flags).unwrap();
//! let streams = sdp_streams(&mut sessions, body, &mut flags).unwrap();
//! assert_eq!(streams[0].rtp_endpoint.unwrap().port, 5000);
//! ```
//!
//! # References
//! - [RFC 4566: Session Description Protocol](https://tools.ietf.org/html/rfc4566)
//! - [RFC 8839: SDP Offer/Answer for ICE](https://tools.ietf.org/html/rfc8839)
//! - [RFC 4568: SDP Security Descriptions](https://tools.ietf.org/html/rfc4568)
//! - [RFC 5763: DTLS-SRTP Framework](https://tools.ietf.org/html/rfc5763)
//! - [RFC 8643: Opportunistic SRTP](https://tools.ietf.org/html/rfc8643)

pub mod crypto;
pub mod error;
pub mod flags;
pub mod ice;
pub mod media;
pub mod protocol;
pub mod rtp;
pub mod sdp;

pub use error::{Error, Result};

pub use sdp::attributes::{sdp_parse_candidate, CandidateParse};
pub use sdp::chopper::SdpChopper;
pub use sdp::output::{sdp_create, SOFTWARE_ID};
pub use sdp::parser::{sdp_parse, SdpSessions};
pub use sdp::rewrite::sdp_replace;
pub use sdp::streams::{sdp_streams, StreamParams};
pub use sdp::{instance_id, sdp_init, sdp_is_duplicate};
