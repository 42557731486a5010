//! Positional editor over an SDP input buffer.
//!
//! The rewriter walks the input strictly forward, copying untouched
//! regions verbatim, skipping replaced regions and appending substitutes.
//! A second pass may overwrite remembered output positions in place (the
//! `o=` version restamping); the `offset` accumulator keeps those
//! positions valid across length-changing overwrites.

use tracing::warn;

use crate::error::{Error, Result};
use crate::sdp::span::Span;

/// Saved input-side state of a chopper, see [`SdpChopper::checkpoint`].
#[derive(Debug, Clone, Copy)]
pub struct ChopperCheckpoint {
    position: usize,
    offset: isize,
}

#[derive(Debug)]
pub struct SdpChopper<'a> {
    input: &'a str,
    output: String,
    /// Input byte offset up to which everything was copied or skipped
    position: usize,
    /// Cumulative length delta applied by in-place overwrites
    offset: isize,
}

impl<'a> SdpChopper<'a> {
    pub fn new(input: &'a str) -> Self {
        SdpChopper {
            input,
            output: String::new(),
            position: 0,
            offset: 0,
        }
    }

    pub fn input(&self) -> &'a str {
        self.input
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn output_len(&self) -> usize {
        self.output.len()
    }

    /// Consumes the chopper, returning the rewritten body.
    pub fn into_output(self) -> String {
        self.output
    }

    fn copy_up_to_offset(&mut self, off: usize) -> Result<()> {
        if off > self.input.len() {
            return Err(Error::SdpRewrite("position outside of input".to_string()));
        }
        if off < self.position {
            warn!("Malformed SDP, cannot rewrite");
            return Err(Error::SdpRewrite("position moves backwards".to_string()));
        }
        self.output.push_str(&self.input[self.position..off]);
        self.position = off;
        Ok(())
    }

    /// Copies input up to the start of `span` and stops there.
    pub fn copy_up_to(&mut self, span: Span) -> Result<()> {
        self.copy_up_to_offset(span.start)
    }

    /// Copies input up to and including `span`.
    pub fn copy_up_to_end_of(&mut self, span: Span) -> Result<()> {
        self.copy_up_to_offset(span.end)
    }

    /// Copies everything left of the input.
    pub fn copy_remainder(&mut self) {
        // cannot move backwards from within the input
        let _ = self.copy_up_to_offset(self.input.len());
    }

    /// Advances the read position past `span` without emitting it.
    pub fn skip_over(&mut self, span: Span) -> Result<()> {
        if span.end < self.position {
            warn!("Malformed SDP, cannot rewrite");
            return Err(Error::SdpRewrite("position moves backwards".to_string()));
        }
        self.position = span.end;
        Ok(())
    }

    /// Appends literal text to the output.
    pub fn append(&mut self, s: &str) {
        self.output.push_str(s);
    }

    /// Mutable access for the emission helpers that build attribute lines
    /// directly into the output.
    pub fn output_mut(&mut self) -> &mut String {
        &mut self.output
    }

    /// Resets the overwrite offset accumulator; call before a fresh
    /// in-place overwrite pass over remembered positions.
    pub fn reset_offset(&mut self) {
        self.offset = 0;
    }

    /// Remembers the current read position. Emitted output is not part of
    /// the checkpoint: restoring rewinds only the input side, so a region
    /// can be rendered twice.
    pub fn checkpoint(&self) -> ChopperCheckpoint {
        ChopperCheckpoint {
            position: self.position,
            offset: self.offset,
        }
    }

    pub fn restore(&mut self, cp: ChopperCheckpoint) {
        self.position = cp.position;
        self.offset = cp.offset;
    }

    /// Overwrites `old_len` bytes at the remembered output position
    /// `old_pos` with `repl`, growing or shrinking the output as needed.
    /// Both the position and length are updated in place so a later pass
    /// can overwrite the same spot again.
    pub fn replace_at(&mut self, old_pos: &mut usize, old_len: &mut usize, repl: &str) {
        // adjust for offsets created within this pass
        *old_pos = (*old_pos as isize + self.offset) as usize;
        let end = *old_pos + *old_len;
        self.output.replace_range(*old_pos..end, repl);
        self.offset += repl.len() as isize - *old_len as isize;
        *old_len = repl.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_and_skip() {
        let input = "m=audio 5000 RTP/AVP 0\r\n";
        let mut chop = SdpChopper::new(input);
        let port = Span::of(input, &input[8..12]);

        chop.copy_up_to(port).unwrap();
        chop.append("40000");
        chop.skip_over(port).unwrap();
        chop.copy_remainder();

        assert_eq!(chop.output(), "m=audio 40000 RTP/AVP 0\r\n");
    }

    #[test]
    fn test_backwards_position_fails() {
        let input = "v=0\r\ns=-\r\n";
        let mut chop = SdpChopper::new(input);
        let late = Span::new(5, 8);
        let early = Span::new(0, 3);

        chop.copy_up_to_end_of(late).unwrap();
        assert!(chop.copy_up_to(early).is_err());
    }

    #[test]
    fn test_replace_at_growing() {
        let input = "o=- 1 1 IN IP4 1.2.3.4\r\n";
        let mut chop = SdpChopper::new(input);
        chop.copy_remainder();

        // version string "1" at output offset 6
        let mut pos = 6usize;
        let mut len = 1usize;
        chop.reset_offset();
        chop.replace_at(&mut pos, &mut len, "12345");
        assert_eq!(chop.output(), "o=- 1 12345 IN IP4 1.2.3.4\r\n");
        assert_eq!(len, 5);

        // a second overwrite through the updated position/length
        chop.reset_offset();
        chop.replace_at(&mut pos, &mut len, "2");
        assert_eq!(chop.output(), "o=- 1 2 IN IP4 1.2.3.4\r\n");
        assert_eq!(len, 1);
    }

    #[test]
    fn test_replace_at_tracks_offsets_across_positions() {
        let input = "a 1 b 2\n";
        let mut chop = SdpChopper::new(input);
        chop.copy_remainder();

        let mut pos1 = 2usize;
        let mut len1 = 1usize;
        let mut pos2 = 6usize;
        let mut len2 = 1usize;

        chop.reset_offset();
        chop.replace_at(&mut pos1, &mut len1, "100");
        // pos2 was remembered before the first overwrite grew the output
        chop.replace_at(&mut pos2, &mut len2, "200");
        assert_eq!(chop.output(), "a 100 b 200\n");
        assert_eq!(pos2, 8);
    }
}
