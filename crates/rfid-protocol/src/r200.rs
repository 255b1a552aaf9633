//! R200 Protocol Implementation
//!
//! R200 modules (and the many M100-based readers sharing their firmware) use
//! a marker-delimited binary frame with a big-endian payload length and an
//! additive checksum.
//!
//! # Frame Format
//! ```text
//! AA [type] [cmd] [len_hi] [len_lo] [payload...] [chk] DD
//! ```
//!
//! - `AA`/`DD`: start and end markers (`BB`/`7E` in the BB7E flavor)
//! - `type`: 0x00 command (host → reader), 0x01 response, 0x02 notification
//! - `cmd`: command code
//! - `len`: payload length, big-endian
//! - `chk`: sum of `type` through the last payload byte, modulo 256

use crate::checksum;
use crate::error::{ParseError, ProtocolError};
use crate::frame::{Direction, Frame, FrameLayout};
use crate::gen2::{LockPayload, MemBank, SelectParams};
use crate::{ReaderCommand, ReaderFamily};

/// Message type: command from host
pub const TYPE_COMMAND: u8 = 0x00;
/// Message type: response from reader
pub const TYPE_RESPONSE: u8 = 0x01;
/// Message type: unsolicited notification (inventory results)
pub const TYPE_NOTIFICATION: u8 = 0x02;

/// Module information query
pub const CMD_MODULE_INFO: u8 = 0x03;
/// Firmware/hardware version query
pub const CMD_FIRMWARE: u8 = 0x07;
/// Read the current select parameters
pub const CMD_GET_SELECT: u8 = 0x0B;
/// Set the select parameters
pub const CMD_SET_SELECT: u8 = 0x0C;
/// Set select mode
pub const CMD_SET_SELECT_MODE: u8 = 0x12;
/// Single inventory round
pub const CMD_SINGLE_INVENTORY: u8 = 0x22;
/// Repeated inventory rounds
pub const CMD_MULTI_INVENTORY: u8 = 0x27;
/// Stop repeated inventory
pub const CMD_STOP_MULTI: u8 = 0x28;
/// Read tag memory
pub const CMD_READ: u8 = 0x39;
/// Write tag memory
pub const CMD_WRITE: u8 = 0x49;
/// Lock tag memory
pub const CMD_LOCK: u8 = 0x82;
/// Dense reader mode
pub const CMD_DENSE_READER_MODE: u8 = 0xF5;
/// Keep-alive/status frame emitted during continuous inventory
pub const CMD_HEARTBEAT: u8 = 0xFF;

/// Header bytes through the length field
const HEADER_LEN: usize = 5;

/// Checksum byte plus end marker
const TRAILER_LEN: usize = 2;

/// Largest payload accepted while decoding
pub const MAX_PAYLOAD: usize = 1024;

/// Start/end marker pair of an R200 reader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Flavor {
    /// `AA ... DD`
    Aadd,
    /// `BB ... 7E`
    Bb7e,
}

impl Flavor {
    /// Start marker byte
    pub fn start(&self) -> u8 {
        match self {
            Flavor::Aadd => 0xAA,
            Flavor::Bb7e => 0xBB,
        }
    }

    /// End marker byte
    pub fn end(&self) -> u8 {
        match self {
            Flavor::Aadd => 0xDD,
            Flavor::Bb7e => 0x7E,
        }
    }

    /// Reader family for this flavor
    pub fn family(&self) -> ReaderFamily {
        match self {
            Flavor::Aadd => ReaderFamily::R200Aadd,
            Flavor::Bb7e => ReaderFamily::R200Bb7e,
        }
    }
}

/// R200 wire layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct R200Layout {
    flavor: Flavor,
}

impl R200Layout {
    /// Create a layout for the given marker flavor
    pub const fn new(flavor: Flavor) -> Self {
        Self { flavor }
    }

    /// Marker flavor in use
    pub fn flavor(&self) -> Flavor {
        self.flavor
    }
}

impl FrameLayout for R200Layout {
    fn family(&self) -> ReaderFamily {
        self.flavor.family()
    }

    fn is_start(&self, byte: u8) -> bool {
        byte == self.flavor.start()
    }

    fn header_len(&self) -> usize {
        HEADER_LEN
    }

    fn check_header(&self, header: &[u8]) -> Result<(), ParseError> {
        match header[1] {
            TYPE_COMMAND | TYPE_RESPONSE | TYPE_NOTIFICATION => Ok(()),
            kind => Err(ParseError::UnexpectedHeader {
                kind,
                command: header[2],
            }),
        }
    }

    fn frame_len(&self, header: &[u8]) -> Result<usize, ParseError> {
        let declared = usize::from(u16::from_be_bytes([header[3], header[4]]));
        if declared > MAX_PAYLOAD {
            return Err(ParseError::LengthOutOfRange {
                declared,
                max: MAX_PAYLOAD,
            });
        }
        Ok(HEADER_LEN + declared + TRAILER_LEN)
    }

    fn validate(&self, frame: &[u8]) -> Result<Frame, ParseError> {
        if frame.len() < HEADER_LEN + TRAILER_LEN {
            return Err(ParseError::Incomplete {
                needed: HEADER_LEN + TRAILER_LEN - frame.len(),
            });
        }

        let end = frame[frame.len() - 1];
        if end != self.flavor.end() {
            return Err(ParseError::BadEndMarker {
                expected: self.flavor.end(),
                actual: end,
            });
        }

        let carried = frame[frame.len() - 2];
        let computed = checksum::additive(&frame[1..frame.len() - 2]);
        if carried != computed {
            return Err(ParseError::ChecksumMismatch {
                expected: computed,
                actual: carried,
            });
        }

        let kind = frame[1];
        Ok(Frame {
            family: self.family(),
            direction: if kind == TYPE_COMMAND {
                Direction::HostToReader
            } else {
                Direction::ReaderToHost
            },
            header: kind,
            command: u16::from(frame[2]),
            payload: frame[HEADER_LEN..frame.len() - TRAILER_LEN].to_vec(),
            integrity: u16::from(carried),
        })
    }

    fn max_payload(&self) -> usize {
        MAX_PAYLOAD
    }

    fn encode_frame(&self, header: u8, command: u16, payload: &[u8]) -> Vec<u8> {
        debug_assert!(command <= 0xFF, "R200 command codes are one byte");
        debug_assert!(payload.len() <= MAX_PAYLOAD);

        let len = payload.len() as u16;
        let mut frame = Vec::with_capacity(HEADER_LEN + payload.len() + TRAILER_LEN);
        frame.push(self.flavor.start());
        frame.push(header);
        frame.push(command as u8);
        frame.extend_from_slice(&len.to_be_bytes());
        frame.extend_from_slice(payload);
        frame.push(checksum::additive(&frame[1..]));
        frame.push(self.flavor.end());
        frame
    }

    fn encode(&self, command: u16, payload: &[u8]) -> Vec<u8> {
        self.encode_frame(TYPE_COMMAND, command, payload)
    }
}

fn command(code: u8, payload: Vec<u8>) -> ReaderCommand {
    ReaderCommand::new(u16::from(code), payload)
}

/// Query module information (hardware version string)
pub fn module_info() -> ReaderCommand {
    command(CMD_MODULE_INFO, vec![0x00])
}

/// Query firmware version
pub fn firmware() -> ReaderCommand {
    command(CMD_FIRMWARE, vec![0x01])
}

/// Run one inventory round
pub fn single_inventory() -> ReaderCommand {
    command(CMD_SINGLE_INVENTORY, Vec::new())
}

/// Run `count` inventory rounds, streaming notifications
pub fn multi_inventory(count: u16) -> ReaderCommand {
    let [hi, lo] = count.to_be_bytes();
    command(CMD_MULTI_INVENTORY, vec![0x22, hi, lo])
}

/// Stop a running multi inventory
pub fn stop_multi_inventory() -> ReaderCommand {
    command(CMD_STOP_MULTI, Vec::new())
}

/// Query the select parameters
pub fn get_select() -> ReaderCommand {
    command(CMD_GET_SELECT, Vec::new())
}

/// Set the select parameters used before tag operations
pub fn set_select(params: &SelectParams) -> ReaderCommand {
    command(CMD_SET_SELECT, params.to_payload())
}

/// Set select mode (0x00 always, 0x01 never, 0x02 for tag operations only)
pub fn set_select_mode(mode: u8) -> ReaderCommand {
    command(CMD_SET_SELECT_MODE, vec![mode])
}

/// Enable dense reader mode
pub fn dense_reader_mode() -> ReaderCommand {
    command(CMD_DENSE_READER_MODE, vec![0x01])
}

/// Read `word_count` 16-bit words from `bank` starting at `word_offset`
pub fn read(
    bank: MemBank,
    word_offset: u16,
    word_count: u16,
    access_password: [u8; 4],
) -> ReaderCommand {
    let mut payload = Vec::with_capacity(9);
    payload.extend_from_slice(&access_password);
    payload.push(bank as u8);
    payload.extend_from_slice(&word_offset.to_be_bytes());
    payload.extend_from_slice(&word_count.to_be_bytes());
    command(CMD_READ, payload)
}

/// Write `data` to `bank` starting at `word_offset`
///
/// `data` must be a whole number of 16-bit words.
pub fn write(
    bank: MemBank,
    word_offset: u16,
    data: &[u8],
    access_password: [u8; 4],
) -> Result<ReaderCommand, ProtocolError> {
    if data.is_empty() || data.len() % 2 != 0 {
        return Err(ProtocolError::InvalidParameter(format!(
            "write data must be a non-empty whole number of words, got {} bytes",
            data.len()
        )));
    }
    let word_count = u16::try_from(data.len() / 2).map_err(|_| {
        ProtocolError::InvalidParameter(format!("write data too long: {} bytes", data.len()))
    })?;

    let mut payload = Vec::with_capacity(9 + data.len());
    payload.extend_from_slice(&access_password);
    payload.push(bank as u8);
    payload.extend_from_slice(&word_offset.to_be_bytes());
    payload.extend_from_slice(&word_count.to_be_bytes());
    payload.extend_from_slice(data);
    if payload.len() > MAX_PAYLOAD {
        return Err(ProtocolError::InvalidParameter(format!(
            "write command too long: {} payload bytes",
            payload.len()
        )));
    }
    Ok(command(CMD_WRITE, payload))
}

/// Apply a lock payload
pub fn lock(lock: LockPayload, access_password: [u8; 4]) -> ReaderCommand {
    let mut payload = Vec::with_capacity(7);
    payload.extend_from_slice(&access_password);
    payload.extend_from_slice(&lock.to_bytes());
    command(CMD_LOCK, payload)
}

/// Detection probe: module info query in the given flavor
pub fn probe_command(flavor: Flavor) -> Vec<u8> {
    module_info().encode(&R200Layout::new(flavor))
}

/// Whether a frame answers the module info query
pub fn is_module_info_response(frame: &Frame) -> bool {
    frame.header == TYPE_RESPONSE && frame.command == u16::from(CMD_MODULE_INFO)
}

/// Extract the ASCII text of a module info payload
///
/// The first payload byte is the info type; the rest is text. Non-ASCII
/// bytes and padding are dropped.
pub fn module_info_text(payload: &[u8]) -> Option<String> {
    let text: String = payload
        .get(1..)?
        .iter()
        .filter(|b| b.is_ascii() && **b != 0)
        .map(|&b| char::from(b))
        .collect();
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
