//! Tag data carried in R200 inventory notifications and read responses

use std::fmt::Write;

use crate::error::ParseError;

/// One tag seen during an inventory round
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TagRead {
    /// Received signal strength in dBm
    pub rssi: i8,
    /// Protocol-control word
    pub pc: u16,
    pub epc: Vec<u8>,
    pub epc_crc: u16,
}

impl TagRead {
    /// Parse an inventory notification payload: RSSI, PC, EPC, CRC
    pub fn parse(payload: &[u8]) -> Result<Self, ParseError> {
        if payload.len() < 5 {
            return Err(ParseError::InvalidPayload(format!(
                "inventory notification needs at least 5 bytes, got {}",
                payload.len()
            )));
        }
        let crc_at = payload.len() - 2;

        Ok(Self {
            rssi: payload[0] as i8,
            pc: u16::from_be_bytes([payload[1], payload[2]]),
            epc: payload[3..crc_at].to_vec(),
            epc_crc: u16::from_be_bytes([payload[crc_at], payload[crc_at + 1]]),
        })
    }

    /// EPC as lowercase hex
    pub fn epc_hex(&self) -> String {
        hex(&self.epc)
    }
}

/// Tag memory returned by a read command
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReadResult {
    pub pc: u16,
    pub epc: Vec<u8>,
    pub data: Vec<u8>,
}

impl ReadResult {
    /// Parse a read response payload: UL, PC, EPC, then the requested words
    ///
    /// UL counts the PC and EPC bytes.
    pub fn parse(payload: &[u8]) -> Result<Self, ParseError> {
        let ul = usize::from(*payload.first().ok_or_else(|| {
            ParseError::InvalidPayload("empty read response".into())
        })?);
        if ul < 2 || payload.len() < 1 + ul {
            return Err(ParseError::InvalidPayload(format!(
                "read response declares {} PC/EPC bytes but carries {}",
                ul,
                payload.len().saturating_sub(1)
            )));
        }

        Ok(Self {
            pc: u16::from_be_bytes([payload[1], payload[2]]),
            epc: payload[3..1 + ul].to_vec(),
            data: payload[1 + ul..].to_vec(),
        })
    }

    pub fn epc_hex(&self) -> String {
        hex(&self.epc)
    }

    pub fn data_hex(&self) -> String {
        hex(&self.data)
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
        let _ = write!(s, "{:02x}", b);
        s
    })
}
