//! Newline frame codec.
//!
//! Wire format:
//! ```text
//! ┌──────────────────────────────┬────┐
//! │ UTF-8 JSON object (N bytes)  │ \n │
//! └──────────────────────────────┴────┘
//! ```
//!
//! The decoder accumulates incoming bytes and yields complete lines.
//! This handles partial reads gracefully — a single stream read may
//! return part of a line, or several lines back to back.

use heapless::Vec;

/// Frame delimiter shared by both directions.
pub const DELIMITER: u8 = b'\n';

/// Maximum frame length in bytes, delimiter excluded (protects against
/// memory exhaustion from a peer that never sends a newline).
pub const MAX_FRAME_LEN: usize = 4096;

/// Framing failure for one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// The line exceeded [`MAX_FRAME_LEN`] and was dropped.
    TooLong,
}

/// Decoder state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecoderState {
    /// Appending bytes to the current line.
    Collecting,
    /// Current line overflowed; skipping until the next delimiter.
    Discarding,
}

/// Streaming line decoder.
pub struct LineDecoder {
    state: DecoderState,
    line: Vec<u8, MAX_FRAME_LEN>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self {
            state: DecoderState::Collecting,
            line: Vec::new(),
        }
    }

    /// Feed bytes into the decoder.
    ///
    /// `on_frame` is called once per completed line, in arrival order,
    /// with surrounding whitespace (including a `\r` before the
    /// delimiter) trimmed.  Blank lines are skipped.  Bytes after the
    /// last delimiter stay buffered for the next call.
    pub fn feed(&mut self, data: &[u8], mut on_frame: impl FnMut(Result<&[u8], FrameError>)) {
        let mut rest = data;

        while !rest.is_empty() {
            match rest.iter().position(|&b| b == DELIMITER) {
                Some(pos) => {
                    self.absorb(&rest[..pos]);
                    self.finish_line(&mut on_frame);
                    rest = &rest[pos + 1..];
                }
                None => {
                    self.absorb(rest);
                    break;
                }
            }
        }
    }

    /// Number of bytes waiting for a delimiter.
    pub fn pending(&self) -> usize {
        self.line.len()
    }

    /// Reset decoder state (e.g. at the start of a new session).
    pub fn reset(&mut self) {
        self.state = DecoderState::Collecting;
        self.line.clear();
    }

    fn absorb(&mut self, segment: &[u8]) {
        if self.state == DecoderState::Discarding {
            return;
        }
        if self.line.extend_from_slice(segment).is_err() {
            self.line.clear();
            self.state = DecoderState::Discarding;
        }
    }

    fn finish_line(&mut self, on_frame: &mut impl FnMut(Result<&[u8], FrameError>)) {
        match self.state {
            DecoderState::Discarding => {
                self.state = DecoderState::Collecting;
                on_frame(Err(FrameError::TooLong));
            }
            DecoderState::Collecting => {
                let frame = self.line.trim_ascii();
                if !frame.is_empty() {
                    on_frame(Ok(frame));
                }
                self.line.clear();
            }
        }
    }
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Terminate `payload` with the delimiter.
///
/// Returns `None` if the payload already contains a delimiter or is
/// longer than [`MAX_FRAME_LEN`]; either would be misframed by the peer.
pub fn encode_frame(payload: &[u8]) -> Option<std::vec::Vec<u8>> {
    if payload.len() > MAX_FRAME_LEN || payload.contains(&DELIMITER) {
        return None;
    }
    let mut out = std::vec::Vec::with_capacity(payload.len() + 1);
    out.extend_from_slice(payload);
    out.push(DELIMITER);
    Some(out)
}
