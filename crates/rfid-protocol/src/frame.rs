//! Frame model and streaming frame assembly
//!
//! Every reader family shares the same decode state machine; what differs is
//! the [`FrameLayout`]: which byte starts a frame, how long the header is,
//! where the length lives and how integrity is checked.
//!
//! ```text
//! Searching → ReadHeader → ReadLength → ReadPayload → Validate
//!     ↑            │            │                        │
//!     └── drop 1 ──┴────────────┘     consume frame ─────┘
//! ```
//!
//! Bytes preceding a start marker are dropped silently. A header that fails
//! its structural checks drops the start byte and resumes searching. A fully
//! buffered frame that fails validation is consumed whole, so the decoder
//! never back-tracks into a frame it has already rejected.

use tracing::{debug, trace, warn};

use crate::error::ParseError;
use crate::ReaderFamily;

/// Which side of the link emitted a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    /// Command sent by the host
    HostToReader,
    /// Response or notification sent by the reader
    ReaderToHost,
}

/// One complete, integrity-checked protocol message
///
/// Frames are only built by [`FrameLayout::validate`], after the checksum or
/// CRC has been verified.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Frame {
    /// Reader family whose layout produced this frame
    pub family: ReaderFamily,
    /// Origin of the frame
    ///
    /// HYB506 frames carry no marker for this and always decode as
    /// [`Direction::ReaderToHost`].
    pub direction: Direction,
    /// R200 message type, or the reader address for CF600/HYB506
    pub header: u8,
    /// Command code (16-bit for CF600, 8-bit otherwise)
    pub command: u16,
    /// Payload bytes, excluding header and integrity fields
    pub payload: Vec<u8>,
    /// Checksum or CRC carried by the frame
    pub integrity: u16,
}

impl Frame {
    /// Whether this is an R200 keep-alive emitted during continuous inventory
    pub fn is_heartbeat(&self) -> bool {
        self.family.r200_flavor().is_some()
            && self.header == crate::r200::TYPE_RESPONSE
            && self.command == u16::from(crate::r200::CMD_HEARTBEAT)
    }
}

/// Outcome of a single decode step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeStep {
    /// A validated frame, and how many buffered bytes it occupied
    Frame { frame: Frame, consumed: usize },
    /// Not enough bytes buffered yet; nothing was consumed
    Incomplete,
    /// Bytes were discarded to regain synchronisation
    Resync { error: ParseError, consumed: usize },
}

/// States of the frame assembler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeState {
    /// Scanning for a start marker
    Searching,
    /// Start marker found, waiting for the fixed header
    ReadHeader,
    /// Header checked, extracting the declared length
    ReadLength,
    /// Waiting until the whole declared frame is buffered
    ReadPayload { frame_len: usize },
    /// Whole frame buffered, checking integrity
    Validate { frame_len: usize },
}

/// Wire layout of one reader family
pub trait FrameLayout: Send + Sync {
    /// Family this layout decodes and encodes
    fn family(&self) -> ReaderFamily;

    /// Whether `byte` can begin a frame
    fn is_start(&self, byte: u8) -> bool;

    /// Bytes from the start of a frame through its length field
    fn header_len(&self) -> usize;

    /// Structural checks on the header bytes
    fn check_header(&self, header: &[u8]) -> Result<(), ParseError>;

    /// Total frame length (markers and integrity included) declared by the header
    fn frame_len(&self, header: &[u8]) -> Result<usize, ParseError>;

    /// Check integrity of a complete frame and extract its fields
    fn validate(&self, frame: &[u8]) -> Result<Frame, ParseError>;

    /// Largest payload one frame can carry
    fn max_payload(&self) -> usize;

    /// Encode a frame with an explicit header byte (message type or address)
    ///
    /// `payload` must not exceed [`max_payload`](Self::max_payload).
    fn encode_frame(&self, header: u8, command: u16, payload: &[u8]) -> Vec<u8>;

    /// Encode a host-to-reader command
    fn encode(&self, command: u16, payload: &[u8]) -> Vec<u8>;
}

/// Streaming frame assembler for one family
///
/// Owns the accumulation buffer of a single connection. Emitted frames own
/// copies of their payloads; nothing aliases the buffer.
pub struct FrameDecoder<L> {
    layout: L,
    buffer: Vec<u8>,
    state: DecodeState,
}

impl<L: FrameLayout> FrameDecoder<L> {
    /// Create a decoder for the given layout
    pub fn new(layout: L) -> Self {
        Self {
            layout,
            buffer: Vec::with_capacity(64),
            state: DecodeState::Searching,
        }
    }

    /// The layout driving this decoder
    pub fn layout(&self) -> &L {
        &self.layout
    }

    /// Current state of the assembler
    pub fn state(&self) -> DecodeState {
        self.state
    }

    /// Number of bytes waiting in the accumulation buffer
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Append inbound bytes
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Advance the state machine as far as the buffered bytes allow
    pub fn step(&mut self) -> DecodeStep {
        loop {
            match self.state {
                DecodeState::Searching => {
                    match self.buffer.iter().position(|&b| self.layout.is_start(b)) {
                        Some(pos) => {
                            if pos > 0 {
                                trace!("Dropping {} bytes before start marker", pos);
                                self.buffer.drain(..pos);
                            }
                            self.state = DecodeState::ReadHeader;
                        }
                        None => {
                            if !self.buffer.is_empty() {
                                trace!("Dropping {} bytes with no start marker", self.buffer.len());
                                self.buffer.clear();
                            }
                            return DecodeStep::Incomplete;
                        }
                    }
                }
                DecodeState::ReadHeader => {
                    let header_len = self.layout.header_len();
                    if self.buffer.len() < header_len {
                        return DecodeStep::Incomplete;
                    }
                    if let Err(error) = self.layout.check_header(&self.buffer[..header_len]) {
                        return self.resync(error, 1);
                    }
                    self.state = DecodeState::ReadLength;
                }
                DecodeState::ReadLength => {
                    let header_len = self.layout.header_len();
                    match self.layout.frame_len(&self.buffer[..header_len]) {
                        Ok(frame_len) => self.state = DecodeState::ReadPayload { frame_len },
                        Err(error) => return self.resync(error, 1),
                    }
                }
                DecodeState::ReadPayload { frame_len } => {
                    if self.buffer.len() < frame_len {
                        return DecodeStep::Incomplete;
                    }
                    self.state = DecodeState::Validate { frame_len };
                }
                DecodeState::Validate { frame_len } => {
                    let raw: Vec<u8> = self.buffer.drain(..frame_len).collect();
                    self.state = DecodeState::Searching;

                    return match self.layout.validate(&raw) {
                        Ok(frame) => {
                            debug!(
                                "{} frame: header 0x{:02X}, command 0x{:02X}, {} payload bytes",
                                self.layout.family().name(),
                                frame.header,
                                frame.command,
                                frame.payload.len()
                            );
                            DecodeStep::Frame {
                                frame,
                                consumed: frame_len,
                            }
                        }
                        Err(error) => {
                            warn!(
                                "Discarding corrupt {} frame: {} ({:02X?})",
                                self.layout.family().name(),
                                error,
                                raw
                            );
                            DecodeStep::Resync {
                                error,
                                consumed: frame_len,
                            }
                        }
                    };
                }
            }
        }
    }

    /// Extract the next valid frame, skipping over anything corrupt
    pub fn next_frame(&mut self) -> Option<Frame> {
        loop {
            match self.step() {
                DecodeStep::Frame { frame, .. } => return Some(frame),
                DecodeStep::Incomplete => return None,
                DecodeStep::Resync { .. } => continue,
            }
        }
    }

    /// Clear the accumulation buffer and restart the search
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = DecodeState::Searching;
    }

    fn resync(&mut self, error: ParseError, consumed: usize) -> DecodeStep {
        debug!(
            "{} protocol violation, dropping {} byte(s): {}",
            self.layout.family().name(),
            consumed,
            error
        );
        self.buffer.drain(..consumed.min(self.buffer.len()));
        self.state = DecodeState::Searching;
        DecodeStep::Resync { error, consumed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::r200::{Flavor, R200Layout};

    fn decoder() -> FrameDecoder<R200Layout> {
        FrameDecoder::new(R200Layout::new(Flavor::Aadd))
    }

    #[test]
    fn test_state_waits_for_header() {
        let mut dec = decoder();
        dec.push_bytes(&[0x00, 0xAA, 0x01]);
        assert_eq!(dec.step(), DecodeStep::Incomplete);
        assert_eq!(dec.state(), DecodeState::ReadHeader);
        // Garbage before the marker is gone
        assert_eq!(dec.buffered(), 2);
    }

    #[test]
    fn test_state_waits_for_payload() {
        let mut dec = decoder();
        dec.push_bytes(&[0xAA, 0x01, 0x03, 0x00, 0x02, 0x00]);
        assert_eq!(dec.step(), DecodeStep::Incomplete);
        assert_eq!(dec.state(), DecodeState::ReadPayload { frame_len: 9 });
    }

    #[test]
    fn test_garbage_only_is_dropped() {
        let mut dec = decoder();
        dec.push_bytes(&[0x01, 0x02, 0x03]);
        assert_eq!(dec.step(), DecodeStep::Incomplete);
        assert_eq!(dec.buffered(), 0);
        assert_eq!(dec.state(), DecodeState::Searching);
    }

    #[test]
    fn test_bad_header_drops_one_byte() {
        let mut dec = decoder();
        // 0x07 is not a valid R200 message type
        dec.push_bytes(&[0xAA, 0x07, 0x03, 0x00, 0x00]);
        let step = dec.step();
        assert!(matches!(
            step,
            DecodeStep::Resync {
                error: ParseError::UnexpectedHeader { kind: 0x07, .. },
                consumed: 1
            }
        ));
        assert_eq!(dec.buffered(), 4);
    }

    #[test]
    fn test_corrupt_frame_consumes_declared_length() {
        let mut dec = decoder();
        // AA 00 22 00 00 [23] DD - checksum should be 0x22
        dec.push_bytes(&[0xAA, 0x00, 0x22, 0x00, 0x00, 0x23, 0xDD, 0xAA]);
        let step = dec.step();
        assert!(matches!(
            step,
            DecodeStep::Resync {
                error: ParseError::ChecksumMismatch { .. },
                consumed: 7
            }
        ));
        assert_eq!(dec.buffered(), 1);
    }

    #[test]
    fn test_heartbeat_recognised() {
        let mut dec = decoder();
        let bytes = R200Layout::new(Flavor::Aadd).encode_frame(0x01, 0xFF, &[0x15]);
        dec.push_bytes(&bytes);
        let frame = dec.next_frame().unwrap();
        assert!(frame.is_heartbeat());
    }
}
