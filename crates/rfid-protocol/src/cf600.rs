//! CF600 Protocol Implementation
//!
//! Chafon CF600 ("UHF Prime") readers frame every message behind a `CF` head
//! byte and close it with a CRC-16 over everything before it.
//!
//! # Frame Format
//! ```text
//! CF [addr] [cmd_hi] [cmd_lo] [len] [payload...] [crc_hi] [crc_lo]
//! ```
//!
//! - `addr`: reader address, 0xFF broadcast for host commands
//! - `cmd`: 16-bit command code, big-endian
//! - `len`: payload length
//! - `crc`: [`checksum::crc16_cf600`] of all preceding bytes, big-endian

use crate::checksum;
use crate::error::ParseError;
use crate::frame::{Direction, Frame, FrameLayout};
use crate::{ReaderCommand, ReaderFamily};

/// Head byte of every frame
pub const HEAD: u8 = 0xCF;

/// Address used by host commands
pub const BROADCAST_ADDR: u8 = 0xFF;

/// Start inventory for a number of seconds
pub const CMD_INVENTORY: u16 = 0x0001;
/// Module initialisation, used as the detection probe
pub const CMD_MODULE_INIT: u16 = 0x0050;
/// Device information query
pub const CMD_DEVICE_INFO: u16 = 0x0070;

/// Status byte of a successful response
pub const STATUS_OK: u8 = 0x00;

/// Largest payload the one-byte length field can describe
pub const MAX_PAYLOAD: usize = u8::MAX as usize;

const HEADER_LEN: usize = 5;
const CRC_LEN: usize = 2;

/// CF600 wire layout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cf600Layout;

impl Cf600Layout {
    pub fn new() -> Self {
        Self
    }
}

impl FrameLayout for Cf600Layout {
    fn family(&self) -> ReaderFamily {
        ReaderFamily::Cf600
    }

    fn is_start(&self, byte: u8) -> bool {
        byte == HEAD
    }

    fn header_len(&self) -> usize {
        HEADER_LEN
    }

    fn check_header(&self, _header: &[u8]) -> Result<(), ParseError> {
        Ok(())
    }

    fn frame_len(&self, header: &[u8]) -> Result<usize, ParseError> {
        Ok(HEADER_LEN + usize::from(header[4]) + CRC_LEN)
    }

    fn validate(&self, frame: &[u8]) -> Result<Frame, ParseError> {
        if frame.len() < HEADER_LEN + CRC_LEN {
            return Err(ParseError::Incomplete {
                needed: HEADER_LEN + CRC_LEN - frame.len(),
            });
        }

        let body = &frame[..frame.len() - CRC_LEN];
        let carried = u16::from_be_bytes([frame[frame.len() - 2], frame[frame.len() - 1]]);
        let computed = checksum::crc16_cf600(body);
        if carried != computed {
            return Err(ParseError::CrcMismatch {
                expected: computed,
                actual: carried,
            });
        }

        Ok(Frame {
            family: ReaderFamily::Cf600,
            direction: if frame[1] == BROADCAST_ADDR {
                Direction::HostToReader
            } else {
                Direction::ReaderToHost
            },
            header: frame[1],
            command: u16::from_be_bytes([frame[2], frame[3]]),
            payload: body[HEADER_LEN..].to_vec(),
            integrity: carried,
        })
    }

    fn max_payload(&self) -> usize {
        MAX_PAYLOAD
    }

    fn encode_frame(&self, header: u8, command: u16, payload: &[u8]) -> Vec<u8> {
        debug_assert!(payload.len() <= MAX_PAYLOAD);

        let mut frame = Vec::with_capacity(HEADER_LEN + payload.len() + CRC_LEN);
        frame.push(HEAD);
        frame.push(header);
        frame.extend_from_slice(&command.to_be_bytes());
        frame.push(payload.len() as u8);
        frame.extend_from_slice(payload);
        let crc = checksum::crc16_cf600(&frame);
        frame.extend_from_slice(&crc.to_be_bytes());
        frame
    }

    fn encode(&self, command: u16, payload: &[u8]) -> Vec<u8> {
        self.encode_frame(BROADCAST_ADDR, command, payload)
    }
}

/// Initialise the RF module
pub fn module_init() -> ReaderCommand {
    ReaderCommand::new(CMD_MODULE_INIT, Vec::new())
}

/// Query device information
pub fn device_info() -> ReaderCommand {
    ReaderCommand::new(CMD_DEVICE_INFO, Vec::new())
}

/// Run an inventory for `seconds`
pub fn inventory(seconds: u32) -> ReaderCommand {
    let mut payload = Vec::with_capacity(5);
    payload.push(0x00);
    payload.extend_from_slice(&seconds.to_be_bytes());
    ReaderCommand::new(CMD_INVENTORY, payload)
}

/// Detection probe: module init
pub fn probe_command() -> Vec<u8> {
    module_init().encode(&Cf600Layout)
}

/// Status byte of a response, if any
pub fn status(frame: &Frame) -> Option<u8> {
    frame.payload.first().copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{DecodeStep, FrameDecoder};

    #[test]
    fn test_probe_command() {
        assert_eq!(
            probe_command(),
            vec![0xCF, 0xFF, 0x00, 0x50, 0x00, 0x07, 0x26]
        );
    }

    #[test]
    fn test_inventory_payload() {
        let bytes = inventory(5).encode(&Cf600Layout);
        assert_eq!(
            &bytes[..10],
            &[0xCF, 0xFF, 0x00, 0x01, 0x05, 0x00, 0x00, 0x00, 0x00, 0x05]
        );
    }

    #[test]
    fn test_decode_module_init_reply() {
        let mut dec = FrameDecoder::new(Cf600Layout);
        dec.push_bytes(&[0xCF, 0x01, 0x00, 0x50, 0x01, 0x00, 0xA3, 0xF5]);

        let frame = dec.next_frame().unwrap();
        assert_eq!(frame.header, 0x01);
        assert_eq!(frame.command, CMD_MODULE_INIT);
        assert_eq!(frame.payload, vec![0x00]);
        assert_eq!(frame.integrity, 0xA3F5);
        assert_eq!(status(&frame), Some(STATUS_OK));
    }

    #[test]
    fn test_direction_follows_address() {
        let mut dec = FrameDecoder::new(Cf600Layout);
        dec.push_bytes(&probe_command());
        dec.push_bytes(&[0xCF, 0x01, 0x00, 0x50, 0x01, 0x00, 0xA3, 0xF5]);

        assert_eq!(dec.next_frame().unwrap().direction, Direction::HostToReader);
        assert_eq!(dec.next_frame().unwrap().direction, Direction::ReaderToHost);
    }

    #[test]
    fn test_crc_mismatch() {
        let mut dec = FrameDecoder::new(Cf600Layout);
        dec.push_bytes(&[0xCF, 0x01, 0x00, 0x50, 0x01, 0x00, 0xF5, 0xA3]);
        assert!(matches!(
            dec.step(),
            DecodeStep::Resync {
                error: ParseError::CrcMismatch {
                    expected: 0xA3F5,
                    actual: 0xF5A3
                },
                consumed: 8
            }
        ));
    }

    #[test]
    fn test_split_reply() {
        let mut dec = FrameDecoder::new(Cf600Layout);
        dec.push_bytes(&[0x11, 0xCF, 0x01, 0x00]);
        assert!(dec.next_frame().is_none());
        dec.push_bytes(&[0x50, 0x01, 0x00, 0xA3]);
        assert!(dec.next_frame().is_none());
        dec.push_bytes(&[0xF5]);
        assert_eq!(dec.next_frame().unwrap().command, CMD_MODULE_INIT);
    }
}
