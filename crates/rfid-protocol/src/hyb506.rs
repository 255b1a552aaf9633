//! HYB506 Protocol Implementation
//!
//! Hyintech HYB506 ("UHFReader06") frames carry no markers: the first byte
//! is the number of bytes that follow it.
//!
//! # Frame Format
//! ```text
//! [len] [addr] [cmd] [payload...] [crc_lo] [crc_hi]
//! ```
//!
//! - `len`: 4 + payload length (the frame is `len + 1` bytes long)
//! - `addr`: reader address, 0x00 by default
//! - `crc`: [`checksum::crc16_hyb506`] of all preceding bytes, little-endian
//!
//! Responses put a status byte at the start of the payload.

use crate::checksum;
use crate::error::{ParseError, ProtocolError};
use crate::frame::{Direction, Frame, FrameLayout};
use crate::gen2::MemBank;
use crate::{ReaderCommand, ReaderFamily};

/// Default reader address
pub const DEFAULT_ADDRESS: u8 = 0x00;

/// Smallest legal length byte (address, command and CRC)
pub const MIN_LEN: u8 = 4;

/// Largest payload the one-byte length field can describe
pub const MAX_PAYLOAD: usize = (u8::MAX - MIN_LEN) as usize;

/// Tag inventory
pub const CMD_INVENTORY: u8 = 0x01;
/// Write tag memory
pub const CMD_WRITE: u8 = 0x03;
/// Reader information, used as the detection probe
pub const CMD_READER_INFO: u8 = 0x21;
/// LED and buzzer control
pub const CMD_LED_BUZZER: u8 = 0x33;

/// Status byte of a successful response
pub const STATUS_OK: u8 = 0x00;

const HEADER_LEN: usize = 3;
const CRC_LEN: usize = 2;

/// HYB506 wire layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hyb506Layout {
    address: u8,
}

impl Hyb506Layout {
    /// Layout addressing the reader at [`DEFAULT_ADDRESS`]
    pub fn new() -> Self {
        Self::with_address(DEFAULT_ADDRESS)
    }

    /// Layout addressing a specific reader
    pub fn with_address(address: u8) -> Self {
        Self { address }
    }

    pub fn address(&self) -> u8 {
        self.address
    }
}

impl Default for Hyb506Layout {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameLayout for Hyb506Layout {
    fn family(&self) -> ReaderFamily {
        ReaderFamily::Hyb506
    }

    fn is_start(&self, byte: u8) -> bool {
        byte >= MIN_LEN
    }

    fn header_len(&self) -> usize {
        HEADER_LEN
    }

    fn check_header(&self, header: &[u8]) -> Result<(), ParseError> {
        if header[0] < MIN_LEN {
            return Err(ParseError::InvalidFrame(format!(
                "length byte 0x{:02X} below minimum",
                header[0]
            )));
        }
        // Without markers the address is all that tells a length byte from noise
        if header[1] != self.address {
            return Err(ParseError::InvalidFrame(format!(
                "address 0x{:02X}, expected 0x{:02X}",
                header[1], self.address
            )));
        }
        Ok(())
    }

    fn frame_len(&self, header: &[u8]) -> Result<usize, ParseError> {
        Ok(usize::from(header[0]) + 1)
    }

    fn validate(&self, frame: &[u8]) -> Result<Frame, ParseError> {
        if frame.len() < HEADER_LEN + CRC_LEN {
            return Err(ParseError::Incomplete {
                needed: HEADER_LEN + CRC_LEN - frame.len(),
            });
        }

        let body = &frame[..frame.len() - CRC_LEN];
        let carried = u16::from_le_bytes([frame[frame.len() - 2], frame[frame.len() - 1]]);
        let computed = checksum::crc16_hyb506(body);
        if carried != computed {
            return Err(ParseError::CrcMismatch {
                expected: computed,
                actual: carried,
            });
        }

        Ok(Frame {
            family: ReaderFamily::Hyb506,
            direction: Direction::ReaderToHost,
            header: frame[1],
            command: u16::from(frame[2]),
            payload: body[HEADER_LEN..].to_vec(),
            integrity: carried,
        })
    }

    fn max_payload(&self) -> usize {
        MAX_PAYLOAD
    }

    fn encode_frame(&self, header: u8, command: u16, payload: &[u8]) -> Vec<u8> {
        debug_assert!(command <= 0xFF, "HYB506 command codes are one byte");
        debug_assert!(payload.len() <= MAX_PAYLOAD);

        let mut frame = Vec::with_capacity(HEADER_LEN + payload.len() + CRC_LEN);
        frame.push(MIN_LEN + payload.len() as u8);
        frame.push(header);
        frame.push(command as u8);
        frame.extend_from_slice(payload);
        let crc = checksum::crc16_hyb506(&frame);
        frame.extend_from_slice(&crc.to_le_bytes());
        frame
    }

    fn encode(&self, command: u16, payload: &[u8]) -> Vec<u8> {
        self.encode_frame(self.address, command, payload)
    }
}

/// Query reader information
pub fn reader_info() -> ReaderCommand {
    ReaderCommand::new(u16::from(CMD_READER_INFO), Vec::new())
}

/// Run an inventory round
pub fn inventory() -> ReaderCommand {
    ReaderCommand::new(u16::from(CMD_INVENTORY), Vec::new())
}

/// Flash the LED and sound the buzzer `times` times
///
/// `active` and `silent` are the on and off periods in units of 50 ms.
pub fn led_buzzer(active: u8, silent: u8, times: u8) -> ReaderCommand {
    ReaderCommand::new(u16::from(CMD_LED_BUZZER), vec![active, silent, times])
}

/// Write `data` to `bank` at `word_offset` of the tag whose EPC is `epc`
///
/// Both `data` and `epc` must be whole 16-bit words.
pub fn write(
    bank: MemBank,
    word_offset: u8,
    data: &[u8],
    epc: &[u8],
    access_password: [u8; 4],
) -> Result<ReaderCommand, ProtocolError> {
    let words = |what: &str, bytes: &[u8]| -> Result<u8, ProtocolError> {
        if bytes.len() % 2 != 0 {
            return Err(ProtocolError::InvalidParameter(format!(
                "{} must be whole words, got {} bytes",
                what,
                bytes.len()
            )));
        }
        u8::try_from(bytes.len() / 2).map_err(|_| {
            ProtocolError::InvalidParameter(format!("{} too long: {} bytes", what, bytes.len()))
        })
    };
    if data.is_empty() {
        return Err(ProtocolError::InvalidParameter("no write data".into()));
    }
    let write_words = words("write data", data)?;
    let epc_words = words("EPC", epc)?;

    let mut payload = Vec::with_capacity(10 + data.len() + epc.len());
    payload.push(write_words);
    payload.push(epc_words);
    payload.extend_from_slice(epc);
    payload.push(bank as u8);
    payload.push(word_offset);
    payload.extend_from_slice(data);
    payload.extend_from_slice(&access_password);
    // Mask address and length: match on the whole EPC
    payload.push(0x00);
    payload.push(epc.len() as u8);

    if payload.len() > MAX_PAYLOAD {
        return Err(ProtocolError::InvalidParameter(format!(
            "write command too long: {} payload bytes",
            payload.len()
        )));
    }
    Ok(ReaderCommand::new(u16::from(CMD_WRITE), payload))
}

/// Detection probe: reader info query at the default address
pub fn probe_command() -> Vec<u8> {
    reader_info().encode(&Hyb506Layout::new())
}

/// Decoded reader information response
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReaderInfo {
    pub version_major: u8,
    pub version_minor: u8,
    pub reader_type: u8,
    pub protocols: u8,
    pub max_frequency: u8,
    pub min_frequency: u8,
    pub power_dbm: u8,
    /// Inventory scan time in units of 100 ms
    pub scan_time: u8,
}

impl ReaderInfo {
    /// Parse the payload of a reader info response
    pub fn parse(payload: &[u8]) -> Result<Self, ParseError> {
        if payload.len() < 9 {
            return Err(ParseError::InvalidPayload(format!(
                "reader info needs 9 bytes, got {}",
                payload.len()
            )));
        }
        if payload[0] != STATUS_OK {
            return Err(ParseError::InvalidPayload(format!(
                "reader info status 0x{:02X}",
                payload[0]
            )));
        }

        Ok(Self {
            version_major: payload[1],
            version_minor: payload[2],
            reader_type: payload[3],
            protocols: payload[4],
            max_frequency: payload[5],
            min_frequency: payload[6],
            power_dbm: payload[7],
            scan_time: payload[8],
        })
    }

    /// Firmware version as `major.minor`
    pub fn firmware_version(&self) -> String {
        format!("{}.{}", self.version_major, self.version_minor)
    }
}
