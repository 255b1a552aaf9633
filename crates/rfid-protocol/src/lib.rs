//! RFID Reader Protocol Library
//!
//! This crate provides framing, integrity checks and command encoding for
//! three families of UHF RFID reader modules:
//!
//! - **R200** (AADD and BB7E flavors): marker-delimited frames with a 16-bit
//!   length and an additive checksum
//! - **CF600**: `CF`-headed frames with a 16-bit command code and a
//!   big-endian CRC-16
//! - **HYB506**: length-prefixed frames with a little-endian CRC-16
//!
//! # Architecture
//!
//! Each family provides:
//! - A [`FrameLayout`] describing its wire format
//! - Command builders returning [`ReaderCommand`]s
//! - Helpers recognising its detection probe reply
//!
//! A single [`FrameDecoder`] state machine drives every layout, handling
//! partial data, leading garbage and corrupt frames.
//!
//! # Example
//!
//! ```rust
//! use rfid_protocol::{create_codec, ReaderFamily};
//!
//! let mut codec = create_codec(ReaderFamily::R200Aadd);
//! codec.push_bytes(&[
//!     0xAA, 0x01, 0x03, 0x00, 0x10, 0x00, 0x4D, 0x31, 0x30, 0x30, 0x20, 0x32,
//!     0x36, 0x64, 0x42, 0x6D, 0x20, 0x56, 0x31, 0x2E, 0x30, 0x92, 0xDD,
//! ]);
//!
//! let frame = codec.next_frame().unwrap();
//! assert_eq!(frame.command, 0x03);
//! assert_eq!(
//!     rfid_protocol::r200::module_info_text(&frame.payload).as_deref(),
//!     Some("M100 26dBm V1.0")
//! );
//! ```

pub mod cf600;
pub mod checksum;
pub mod error;
pub mod frame;
pub mod gen2;
pub mod hyb506;
pub mod r200;
pub mod tag;

use std::fmt;
use std::str::FromStr;

pub use error::{ParseError, ProtocolError};
pub use frame::{DecodeState, DecodeStep, Direction, Frame, FrameDecoder, FrameLayout};
pub use gen2::{LockBank, LockMode, LockPayload, MemBank, SelectParams};
pub use tag::{ReadResult, TagRead};

use cf600::Cf600Layout;
use hyb506::Hyb506Layout;
use r200::{Flavor, R200Layout};

/// Identifies which reader protocol a module speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum ReaderFamily {
    /// R200 with `AA`/`DD` markers
    R200Aadd,
    /// R200 with `BB`/`7E` markers
    R200Bb7e,
    /// Chafon CF600
    Cf600,
    /// Hyintech HYB506
    Hyb506,
}

impl ReaderFamily {
    /// Every supported family, in detection order
    pub const ALL: [ReaderFamily; 4] = [
        ReaderFamily::R200Aadd,
        ReaderFamily::R200Bb7e,
        ReaderFamily::Cf600,
        ReaderFamily::Hyb506,
    ];

    /// Returns a human-readable name for the family
    pub fn name(&self) -> &'static str {
        match self {
            ReaderFamily::R200Aadd => "R200 (AADD)",
            ReaderFamily::R200Bb7e => "R200 (BB7E)",
            ReaderFamily::Cf600 => "CF600",
            ReaderFamily::Hyb506 => "HYB506",
        }
    }

    /// Short identifier accepted by [`FromStr`]
    pub fn id(&self) -> &'static str {
        match self {
            ReaderFamily::R200Aadd => "r200-aadd",
            ReaderFamily::R200Bb7e => "r200-bb7e",
            ReaderFamily::Cf600 => "cf600",
            ReaderFamily::Hyb506 => "hyb506",
        }
    }

    /// Marker flavor, for the R200 families
    pub fn r200_flavor(&self) -> Option<Flavor> {
        match self {
            ReaderFamily::R200Aadd => Some(Flavor::Aadd),
            ReaderFamily::R200Bb7e => Some(Flavor::Bb7e),
            ReaderFamily::Cf600 | ReaderFamily::Hyb506 => None,
        }
    }
}

impl fmt::Display for ReaderFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ReaderFamily {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "r200" | "r200-aadd" | "aadd" => Ok(ReaderFamily::R200Aadd),
            "r200-bb7e" | "bb7e" => Ok(ReaderFamily::R200Bb7e),
            "cf600" => Ok(ReaderFamily::Cf600),
            "hyb506" => Ok(ReaderFamily::Hyb506),
            other => Err(ProtocolError::InvalidParameter(format!(
                "unknown reader family '{}'",
                other
            ))),
        }
    }
}

/// A command code and its payload, independent of framing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderCommand {
    pub code: u16,
    pub payload: Vec<u8>,
}

impl ReaderCommand {
    pub fn new(code: u16, payload: Vec<u8>) -> Self {
        Self { code, payload }
    }

    /// Encode to wire bytes using the given layout
    ///
    /// For the fixed-size commands built by this crate. Use
    /// [`try_encode`](Self::try_encode) when the payload comes from elsewhere.
    pub fn encode<L: FrameLayout + ?Sized>(&self, layout: &L) -> Vec<u8> {
        layout.encode(self.code, &self.payload)
    }

    /// Encode to wire bytes, rejecting payloads the layout cannot frame
    pub fn try_encode<L: FrameLayout + ?Sized>(
        &self,
        layout: &L,
    ) -> Result<Vec<u8>, ProtocolError> {
        if self.payload.len() > layout.max_payload() {
            return Err(ProtocolError::InvalidParameter(format!(
                "{} payload of {} bytes exceeds {}",
                layout.family(),
                self.payload.len(),
                layout.max_payload()
            )));
        }
        Ok(self.encode(layout))
    }
}

/// Object-safe codec for one family
///
/// Lets sessions and detectors hold `Box<dyn ReaderCodec>` regardless of the
/// concrete layout.
pub trait ReaderCodec: Send + Sync {
    /// Family this codec speaks
    fn family(&self) -> ReaderFamily;

    /// Encode a host command
    fn encode(&self, command: &ReaderCommand) -> Result<Vec<u8>, ProtocolError>;

    /// Push raw bytes into the codec's buffer
    fn push_bytes(&mut self, data: &[u8]);

    /// Advance the decode state machine one step
    fn step(&mut self) -> DecodeStep;

    /// Try to extract the next valid frame from the buffer
    fn next_frame(&mut self) -> Option<Frame>;

    /// Clear the internal buffer
    fn clear(&mut self);
}

impl<L: FrameLayout> ReaderCodec for FrameDecoder<L> {
    fn family(&self) -> ReaderFamily {
        self.layout().family()
    }

    fn encode(&self, command: &ReaderCommand) -> Result<Vec<u8>, ProtocolError> {
        command.try_encode(self.layout())
    }

    fn push_bytes(&mut self, data: &[u8]) {
        FrameDecoder::push_bytes(self, data);
    }

    fn step(&mut self) -> DecodeStep {
        FrameDecoder::step(self)
    }

    fn next_frame(&mut self) -> Option<Frame> {
        FrameDecoder::next_frame(self)
    }

    fn clear(&mut self) {
        FrameDecoder::clear(self);
    }
}

/// Create a codec for the given family
pub fn create_codec(family: ReaderFamily) -> Box<dyn ReaderCodec> {
    match family {
        ReaderFamily::R200Aadd => Box::new(FrameDecoder::new(R200Layout::new(Flavor::Aadd))),
        ReaderFamily::R200Bb7e => Box::new(FrameDecoder::new(R200Layout::new(Flavor::Bb7e))),
        ReaderFamily::Cf600 => Box::new(FrameDecoder::new(Cf600Layout::new())),
        ReaderFamily::Hyb506 => Box::new(FrameDecoder::new(Hyb506Layout::new())),
    }
}

/// Encode a command for the given family
pub fn encode_command(
    family: ReaderFamily,
    command: &ReaderCommand,
) -> Result<Vec<u8>, ProtocolError> {
    match family {
        ReaderFamily::R200Aadd => command.try_encode(&R200Layout::new(Flavor::Aadd)),
        ReaderFamily::R200Bb7e => command.try_encode(&R200Layout::new(Flavor::Bb7e)),
        ReaderFamily::Cf600 => command.try_encode(&Cf600Layout::new()),
        ReaderFamily::Hyb506 => command.try_encode(&Hyb506Layout::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_round_trips_through_id() {
        for family in ReaderFamily::ALL {
            assert_eq!(family.id().parse::<ReaderFamily>().unwrap(), family);
        }
        assert_eq!("R200".parse::<ReaderFamily>().unwrap(), ReaderFamily::R200Aadd);
        assert!("m6e".parse::<ReaderFamily>().is_err());
    }

    #[test]
    fn test_codec_family() {
        for family in ReaderFamily::ALL {
            assert_eq!(create_codec(family).family(), family);
        }
    }

    #[test]
    fn test_encode_command_matches_codec() {
        let cmd = r200::single_inventory();
        for family in ReaderFamily::ALL {
            assert_eq!(
                encode_command(family, &cmd).unwrap(),
                create_codec(family).encode(&cmd).unwrap()
            );
        }
    }

    #[test]
    fn test_oversized_payload_is_rejected() {
        let cmd = ReaderCommand::new(0x21, vec![0u8; 300]);
        for family in [ReaderFamily::Cf600, ReaderFamily::Hyb506] {
            assert!(matches!(
                create_codec(family).encode(&cmd),
                Err(ProtocolError::InvalidParameter(_))
            ));
        }
        assert!(create_codec(ReaderFamily::R200Aadd).encode(&cmd).is_ok());

        let hyb = ReaderCommand::new(0x21, vec![0u8; hyb506::MAX_PAYLOAD]);
        let bytes = encode_command(ReaderFamily::Hyb506, &hyb).unwrap();
        assert_eq!(bytes[0], 0xFF);
    }

    #[test]
    fn test_dyn_codec_recovers_after_corruption() {
        let mut codec = create_codec(ReaderFamily::Cf600);
        codec.push_bytes(&[0xCF, 0x01, 0x00, 0x50, 0x01, 0x00, 0x00, 0x00]);
        codec.push_bytes(&[0xCF, 0x01, 0x00, 0x50, 0x01, 0x00, 0xA3, 0xF5]);
        let frame = codec.next_frame().unwrap();
        assert_eq!(frame.command, cf600::CMD_MODULE_INIT);
    }
}
