//! SDP offer/answer rewriting engine.
//!
//! The pipeline is: [`parser::sdp_parse`] builds the session tree,
//! [`streams::sdp_streams`] extracts per-media stream parameters for the
//! call engine, and [`rewrite::sdp_replace`] (or [`output::sdp_create`])
//! emits the SDP sent onwards. [`chopper::SdpChopper`] keeps untouched
//! input regions byte-identical through a rewrite.

pub mod attributes;
pub mod chopper;
pub mod manipulations;
pub mod output;
pub mod parser;
pub mod rewrite;
pub mod span;
pub mod streams;

use std::sync::OnceLock;

use rand::RngCore;

use crate::sdp::attributes::AttrId;
use crate::sdp::parser::SdpSessions;

static INSTANCE_ID: OnceLock<String> = OnceLock::new();

fn generate_instance_id() -> String {
    let mut bytes = [0u8; 6];
    rand::thread_rng().fill_bytes(&mut bytes);
    let mut id = String::with_capacity(12);
    for b in bytes {
        id.push_str(&format!("{:02x}", b));
    }
    id
}

/// Seeds the process-wide instance id: 12 hex characters of randomness,
/// stamped into outgoing SDP under loop protection and checked by
/// [`sdp_is_duplicate`]. Idempotent; later calls keep the first id.
pub fn sdp_init() {
    INSTANCE_ID.get_or_init(generate_instance_id);
}

/// The process-wide instance id. Initializes it on first use.
pub fn instance_id() -> &'static str {
    INSTANCE_ID.get_or_init(generate_instance_id)
}

/// Whether a parsed body is one of our own looped back: every session
/// must carry an `a=rtpengine:` attribute with our instance id. `src` is
/// the body the sessions were parsed from.
pub fn sdp_is_duplicate(sessions: &SdpSessions, src: &str) -> bool {
    let own_id = instance_id();
    for session in &sessions.sessions {
        let mut any = false;
        let mut matched = false;
        for attr in session.attributes.get_all(AttrId::Rtpengine) {
            any = true;
            if attr.value_str(src) == Some(own_id) {
                matched = true;
                break;
            }
        }
        if !any || !matched {
            return false;
        }
    }
    true
}
