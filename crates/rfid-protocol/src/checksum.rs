//! Integrity algorithms used by the three reader families
//!
//! - **R200**: additive 8-bit checksum over everything between the start
//!   marker and the checksum byte
//! - **CF600**: reflected CRC-16 (preset 0xFFFF, polynomial 0x8408), written
//!   big-endian on the wire
//! - **HYB506**: the same reflected CRC expressed with the unshifted constant
//!   0x10810 applied before the shift, written little-endian on the wire
//!
//! All functions are pure and operate on the bytes exactly as they appear on
//! the wire.

/// CRC preset shared by CF600 and HYB506
pub const CRC_PRESET: u16 = 0xFFFF;

/// Reflected CCITT polynomial used by CF600
pub const CF600_POLYNOMIAL: u16 = 0x8408;

/// HYB506 constant, applied to the 17-bit register before shifting
pub const HYB506_POLYNOMIAL: u32 = 0x1_0810;

/// Sum of all bytes, modulo 256
///
/// # Examples
///
/// ```
/// use rfid_protocol::checksum;
///
/// // AA [00 22 00 00] 22 DD
/// assert_eq!(checksum::additive(&[0x00, 0x22, 0x00, 0x00]), 0x22);
/// ```
pub fn additive(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// CRC-16 as used by Chafon CF600 readers
///
/// # Examples
///
/// ```
/// use rfid_protocol::checksum;
///
/// let crc = checksum::crc16_cf600(&[0xCF, 0xFF, 0x00, 0x50, 0x00]);
/// assert_eq!(crc.to_be_bytes(), [0x07, 0x26]);
/// ```
pub fn crc16_cf600(data: &[u8]) -> u16 {
    let mut crc = CRC_PRESET;

    for &byte in data {
        crc ^= u16::from(byte);
        for _ in 0..8 {
            if crc & 0x0001 != 0 {
                crc = (crc >> 1) ^ CF600_POLYNOMIAL;
            } else {
                crc >>= 1;
            }
        }
    }

    crc
}

/// CRC-16 as used by HYB506 (UHFReader06) readers
///
/// The register is widened to 32 bits so the 17-bit constant can be XORed in
/// before the shift. The result is bit-identical to [`crc16_cf600`]; the two
/// families differ only in the order the CRC bytes go on the wire.
pub fn crc16_hyb506(data: &[u8]) -> u16 {
    let mut crc = u32::from(CRC_PRESET);

    for &byte in data {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc ^= HYB506_POLYNOMIAL;
            }
            crc >>= 1;
        }
    }

    (crc & 0xFFFF) as u16
}
