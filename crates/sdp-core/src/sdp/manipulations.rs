//! Runtime side of the attribute manipulation engine.
//!
//! The directive sets themselves live on the flags
//! ([`crate::flags::SdpManipulations`]); this module applies them to
//! parsed attributes and to synthesized output. Matching precedence on an
//! attribute is key (`rtpmap:0`), then name (`rtpmap`), then the entire
//! line value; the first hit wins.

use tracing::debug;

use crate::flags::SdpManipulations;
use crate::sdp::attributes::SdpAttribute;
use crate::sdp::chopper::SdpChopper;

/// Whether a removal directive exists for `attr_name`.
pub fn manipulate_remove(manips: Option<&SdpManipulations>, attr_name: &str) -> bool {
    let Some(manips) = manips else {
        return false;
    };
    if attr_name.is_empty() {
        return false;
    }
    if manips.matches_remove(attr_name) {
        debug!(
            "Cannot insert: '{}' because prevented by SDP manipulations (remove)",
            attr_name
        );
        return true;
    }
    false
}

/// Removal check against an attribute's key, name and full line value.
pub fn manipulate_remove_attr(
    manips: Option<&SdpManipulations>,
    attr: &SdpAttribute,
    src: &str,
) -> bool {
    if manipulate_remove(manips, attr.key_str(src).unwrap_or("")) {
        return true;
    }
    if manipulate_remove(manips, attr.name_str(src)) {
        return true;
    }
    if manipulate_remove(manips, attr.line_value_str(src)) {
        return true;
    }
    false
}

/// Substitution lookup for `attr_name`.
pub fn manipulations_subst<'m>(
    manips: Option<&'m SdpManipulations>,
    attr_name: &str,
) -> Option<&'m str> {
    let manips = manips?;
    let subst = manips.lookup_subst(attr_name)?;
    debug!(
        "Substituting '{}' with '{}' due to SDP manipulations",
        attr_name, subst
    );
    Some(subst)
}

/// Substitution lookup against an attribute's key, name and line value.
pub fn manipulations_subst_attr<'m>(
    manips: Option<&'m SdpManipulations>,
    attr: &SdpAttribute,
    src: &str,
) -> Option<&'m str> {
    if let Some(s) = manipulations_subst(manips, attr.key_str(src).unwrap_or("")) {
        return Some(s);
    }
    if let Some(s) = manipulations_subst(manips, attr.name_str(src)) {
        return Some(s);
    }
    manipulations_subst(manips, attr.line_value_str(src))
}

/// Emits all `add` directives of a session level into the output.
pub fn manipulations_add(chop: &mut SdpChopper<'_>, manips: Option<&SdpManipulations>) {
    let Some(manips) = manips else {
        return;
    };
    for attr_value in manips.add_commands() {
        chop.append("a=");
        chop.append(attr_value);
        chop.append("\r\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdp::attributes::parse_attribute;
    use crate::sdp::span::Span;

    fn attr(line_value: &str) -> (String, SdpAttribute) {
        let src = format!("a={}\r\n", line_value);
        let full = Span::new(0, src.len());
        let lv = Span::new(2, 2 + line_value.len());
        let a = parse_attribute(&src, full, lv);
        (src, a)
    }

    #[test]
    fn test_match_precedence() {
        let mut manips = SdpManipulations::default();
        manips.remove_command("rtpmap:0");

        let (src, a) = attr("rtpmap:0 PCMU/8000");
        assert!(manipulate_remove_attr(Some(&manips), &a, &src));

        let (src, a) = attr("rtpmap:8 PCMA/8000");
        assert!(!manipulate_remove_attr(Some(&manips), &a, &src));
    }

    #[test]
    fn test_match_by_name() {
        let mut manips = SdpManipulations::default();
        manips.remove_command("ptime");
        let (src, a) = attr("ptime:20");
        assert!(manipulate_remove_attr(Some(&manips), &a, &src));
    }

    #[test]
    fn test_match_by_line_value() {
        let mut manips = SdpManipulations::default();
        manips.remove_command("sendrecv");
        let (src, a) = attr("sendrecv");
        assert!(manipulate_remove_attr(Some(&manips), &a, &src));
    }

    #[test]
    fn test_subst_precedence_key_first() {
        let mut manips = SdpManipulations::default();
        manips.subst_command("ptime:20", "ptime:30");
        manips.subst_command("ptime", "ptime:40");

        let (src, a) = attr("ptime:20");
        assert_eq!(
            manipulations_subst_attr(Some(&manips), &a, &src),
            Some("ptime:30")
        );

        let (src, a) = attr("ptime:10");
        assert_eq!(
            manipulations_subst_attr(Some(&manips), &a, &src),
            Some("ptime:40")
        );
    }

    #[test]
    fn test_add_commands_render() {
        let mut manips = SdpManipulations::default();
        manips.add_command("foo:bar");
        manips.add_command("baz");

        let input = "";
        let mut chop = SdpChopper::new(input);
        manipulations_add(&mut chop, Some(&manips));
        assert_eq!(chop.output(), "a=foo:bar\r\na=baz\r\n");
    }

    #[test]
    fn test_no_manipulations_is_noop() {
        let (src, a) = attr("sendrecv");
        assert!(!manipulate_remove_attr(None, &a, &src));
        assert_eq!(manipulations_subst_attr(None, &a, &src), None);
    }
}
