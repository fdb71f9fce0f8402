//! Length-prefix frame codec.
//!
//! Wire format:
//! ```text
//! ┌────────────┬──────────────────────────┐
//! │ Length (4B)│ Payload (N B)            │
//! │ LE u32     │                          │
//! └────────────┴──────────────────────────┘
//! ```
//!
//! Used for RPC requests/responses (JSON payload) and for storage journal
//! records (postcard payload).  The decoder accumulates incoming bytes and
//! yields complete frames, so a single read may carry part of the header,
//! part of the payload, or several frames back to back.

use core::fmt;

/// Frame header size (4-byte little-endian length).
pub const HEADER_SIZE: usize = 4;

/// Default inbound payload limit (protects against memory exhaustion).
pub const DEFAULT_MAX_FRAME: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Header announced a zero-length payload.
    Empty,
    /// Header announced a payload above the decoder's limit.
    TooLarge { len: usize, max: usize },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty frame"),
            Self::TooLarge { len, max } => write!(f, "frame of {} bytes exceeds {}", len, max),
        }
    }
}

impl std::error::Error for FrameError {}

/// Decoder state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecoderState {
    /// Waiting for header bytes.
    ReadingHeader,
    /// Header received, reading payload.
    ReadingPayload { expected: usize },
}

/// Streaming frame decoder.
pub struct FrameDecoder {
    state: DecoderState,
    buf: Vec<u8>,
    max_frame: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME)
    }
}

impl FrameDecoder {
    pub fn new(max_frame: usize) -> Self {
        Self {
            state: DecoderState::ReadingHeader,
            buf: Vec::new(),
            max_frame,
        }
    }

    /// Append raw bytes from the transport.
    pub fn feed(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Pop the next complete frame payload, if one is buffered.
    ///
    /// On [`FrameError`] the decoder has already reset itself and dropped
    /// everything buffered; the stream cannot be resynchronised.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>, FrameError> {
        loop {
            match self.state {
                DecoderState::ReadingHeader => {
                    if self.buf.len() < HEADER_SIZE {
                        return Ok(None);
                    }
                    let mut header = [0u8; HEADER_SIZE];
                    header.copy_from_slice(&self.buf[..HEADER_SIZE]);
                    let expected = u32::from_le_bytes(header) as usize;

                    if expected == 0 {
                        self.reset();
                        return Err(FrameError::Empty);
                    }
                    if expected > self.max_frame {
                        self.reset();
                        return Err(FrameError::TooLarge {
                            len: expected,
                            max: self.max_frame,
                        });
                    }
                    self.buf.drain(..HEADER_SIZE);
                    self.state = DecoderState::ReadingPayload { expected };
                }

                DecoderState::ReadingPayload { expected } => {
                    if self.buf.len() < expected {
                        return Ok(None);
                    }
                    let payload: Vec<u8> = self.buf.drain(..expected).collect();
                    self.state = DecoderState::ReadingHeader;
                    return Ok(Some(payload));
                }
            }
        }
    }

    /// Bytes fed but not yet returned as a frame, including a header
    /// already consumed for the frame in progress.
    pub fn pending(&self) -> usize {
        match self.state {
            DecoderState::ReadingHeader => self.buf.len(),
            DecoderState::ReadingPayload { .. } => HEADER_SIZE + self.buf.len(),
        }
    }

    /// Reset decoder state (e.g. after a transport reconnect).
    pub fn reset(&mut self) {
        self.state = DecoderState::ReadingHeader;
        self.buf.clear();
    }
}

/// Append `[LE-u32 length][payload]` to `out`.
///
/// Returns `None` for an empty payload or one too large for the header.
pub fn encode_frame(payload: &[u8], out: &mut Vec<u8>) -> Option<usize> {
    if payload.is_empty() {
        return None;
    }
    let len = u32::try_from(payload.len()).ok()?;
    out.reserve(HEADER_SIZE + payload.len());
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(payload);
    Some(HEADER_SIZE + payload.len())
}
