//! NUL-terminated framing.
//!
//! Every message on either channel is its text followed by one `\0` byte.
//! Peers typing at a terminal send bare lines instead; a decoder that sees
//! such a line first switches to [`Framing::Line`] for the rest of the
//! connection.

use crate::error::{ProtocolError, ProtocolResult};
use bytes::{Buf, BytesMut};

/// Frame terminator.
pub const TERMINATOR: u8 = 0;

/// Default upper bound for a single frame.
pub const DEFAULT_MAX_FRAME: usize = 1024 * 1024;

/// Appends the terminator to `text`.
pub fn encode_frame(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() + 1);
    out.extend_from_slice(text.as_bytes());
    out.push(TERMINATOR);
    out
}

/// How a peer ends its messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// Each message ends with a NUL byte.
    Nul,
    /// Whatever is buffered once it ends in a newline is one message.
    Line,
}

/// Splits a byte stream into frames.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: BytesMut,
    max_frame: usize,
    framing: Option<Framing>,
}

impl FrameDecoder {
    /// Creates a decoder with the default frame limit.
    pub fn new() -> Self {
        Self::with_max_frame(DEFAULT_MAX_FRAME)
    }

    /// Creates a decoder with a custom frame limit.
    pub fn with_max_frame(max_frame: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            max_frame,
            framing: None,
        }
    }

    /// Feeds bytes read from the socket.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Bytes buffered but not yet returned as a frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// The framing detected so far, if any frame has been decoded.
    pub fn framing(&self) -> Option<Framing> {
        self.framing
    }

    /// Returns the next complete frame, if any.
    ///
    /// A NUL always ends a frame. In line mode a buffer ending in a newline
    /// is a frame as well.
    pub fn next_frame(&mut self) -> ProtocolResult<Option<String>> {
        if let Some(end) = self.buffer.iter().position(|b| *b == TERMINATOR) {
            self.framing.get_or_insert(Framing::Nul);
            let frame = self.buffer.split_to(end);
            self.buffer.advance(1);
            return decode(&frame).map(Some);
        }
        if self.framing == Some(Framing::Line) && self.buffer.ends_with(b"\n") {
            let frame = self.buffer.split();
            return decode(&frame).map(Some);
        }
        if self.buffer.len() > self.max_frame {
            return Err(ProtocolError::FrameTooLarge {
                size: self.buffer.len(),
                max: self.max_frame,
            });
        }
        Ok(None)
    }

    /// True while the framing is undecided and the buffer holds a line
    /// that no NUL has ended yet.
    pub fn pending_line(&self) -> bool {
        self.framing.is_none() && self.buffer.ends_with(b"\n")
    }

    /// Takes a pending line as a frame and switches to line mode.
    ///
    /// Callers use this once no terminator followed the line in time.
    pub fn take_line(&mut self) -> ProtocolResult<Option<String>> {
        if !self.pending_line() {
            return Ok(None);
        }
        self.framing = Some(Framing::Line);
        let frame = self.buffer.split();
        decode(&frame).map(Some)
    }
}

fn decode(frame: &[u8]) -> ProtocolResult<String> {
    String::from_utf8(frame.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn splits_on_terminator() {
        let mut decoder = FrameDecoder::new();
        decoder.extend(b"og s:/a\0wa s:");
        assert_eq!(decoder.next_frame().unwrap().as_deref(), Some("og s:/a"));
        assert_eq!(decoder.next_frame().unwrap(), None);
        decoder.extend(b"/b\0");
        assert_eq!(decoder.next_frame().unwrap().as_deref(), Some("wa s:/b"));
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn empty_frames_are_frames() {
        let mut decoder = FrameDecoder::new();
        decoder.extend(b"\0");
        assert_eq!(decoder.next_frame().unwrap().as_deref(), Some(""));
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let mut decoder = FrameDecoder::with_max_frame(4);
        decoder.extend(b"abcdef");
        assert!(matches!(
            decoder.next_frame(),
            Err(ProtocolError::FrameTooLarge { size: 6, max: 4 })
        ));
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let mut decoder = FrameDecoder::new();
        decoder.extend(&[0xff, 0xfe, 0]);
        assert_eq!(decoder.next_frame(), Err(ProtocolError::InvalidUtf8));
    }

    #[test]
    fn nul_frame_decides_framing() {
        let mut decoder = FrameDecoder::new();
        decoder.extend(b"og s:/a\r\n");
        assert!(decoder.pending_line());
        decoder.extend(b"\0");
        assert_eq!(decoder.next_frame().unwrap().as_deref(), Some("og s:/a\r\n"));
        assert_eq!(decoder.framing(), Some(Framing::Nul));

        decoder.extend(b"og s:/b\r\n");
        assert!(!decoder.pending_line());
        assert_eq!(decoder.take_line().unwrap(), None);
        assert_eq!(decoder.next_frame().unwrap(), None);
    }

    #[test]
    fn bare_lines_switch_to_line_mode() {
        let mut decoder = FrameDecoder::new();
        decoder.extend(b"hey o tool h1 admin secret");
        assert!(!decoder.pending_line());
        decoder.extend(b"\r\n");
        assert_eq!(
            decoder.take_line().unwrap().as_deref(),
            Some("hey o tool h1 admin secret\r\n")
        );
        assert_eq!(decoder.framing(), Some(Framing::Line));

        decoder.extend(b"os i:/a=1\ni:/b=2\n");
        assert_eq!(
            decoder.next_frame().unwrap().as_deref(),
            Some("os i:/a=1\ni:/b=2\n")
        );
        decoder.extend(b"og i:/a");
        assert_eq!(decoder.next_frame().unwrap(), None);
        decoder.extend(b"\0");
        assert_eq!(decoder.next_frame().unwrap().as_deref(), Some("og i:/a"));
    }

    proptest! {
        #[test]
        fn frames_survive_arbitrary_chunking(
            texts in proptest::collection::vec("[a-zA-Z0-9 :/=;\r\n]{0,40}", 1..6),
            split in 1usize..16,
        ) {
            let wire: Vec<u8> = texts.iter().flat_map(|t| encode_frame(t)).collect();
            let mut decoder = FrameDecoder::new();
            let mut out = Vec::new();
            for chunk in wire.chunks(split) {
                decoder.extend(chunk);
                while let Some(frame) = decoder.next_frame().unwrap() {
                    out.push(frame);
                }
            }
            prop_assert_eq!(out, texts);
        }
    }
}
