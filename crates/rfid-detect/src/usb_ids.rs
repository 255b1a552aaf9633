//! USB Vendor/Product ID database for serial bridges found on reader boards
//!
//! Reader modules are sold on carrier boards with one of a handful of
//! USB-to-UART chips; a port backed by one of them is worth probing.

/// USB Vendor ID / Product ID pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsbId {
    pub vid: u16,
    pub pid: u16,
}

impl UsbId {
    pub const fn new(vid: u16, pid: u16) -> Self {
        Self { vid, pid }
    }
}

/// FTDI (Future Technology Devices International)
pub mod ftdi {
    use super::UsbId;

    pub const VID: u16 = 0x0403;

    pub const FT232R: UsbId = UsbId::new(VID, 0x6001);
    pub const FT231X: UsbId = UsbId::new(VID, 0x6015);

    pub const ALL_PIDS: &[u16] = &[0x6001, 0x6010, 0x6011, 0x6014, 0x6015];
}

/// Silicon Labs CP210x
pub mod cp210x {
    use super::UsbId;

    pub const VID: u16 = 0x10C4;

    pub const CP2102: UsbId = UsbId::new(VID, 0xEA60);

    pub const ALL_PIDS: &[u16] = &[0xEA60, 0xEA70, 0xEA71];
}

/// WCH CH340/CH341, the usual bridge on R200 carrier boards
pub mod ch340 {
    use super::UsbId;

    pub const VID: u16 = 0x1A86;

    pub const CH340: UsbId = UsbId::new(VID, 0x7523);
    pub const CH341: UsbId = UsbId::new(VID, 0x5523);
    pub const CH9102: UsbId = UsbId::new(VID, 0x55D4);

    pub const ALL_PIDS: &[u16] = &[0x7523, 0x5523, 0x55D4];
}

/// Prolific PL2303
pub mod prolific {
    use super::UsbId;

    pub const VID: u16 = 0x067B;

    pub const PL2303: UsbId = UsbId::new(VID, 0x2303);

    pub const ALL_PIDS: &[u16] = &[0x2303];
}

/// Check if a VID/PID is a known serial bridge
pub fn is_known_serial_adapter(vid: u16, pid: u16) -> bool {
    match vid {
        ftdi::VID => ftdi::ALL_PIDS.contains(&pid),
        cp210x::VID => cp210x::ALL_PIDS.contains(&pid),
        ch340::VID => ch340::ALL_PIDS.contains(&pid),
        prolific::VID => prolific::ALL_PIDS.contains(&pid),
        _ => false,
    }
}

/// Get adapter type name from VID
pub fn adapter_name(vid: u16) -> Option<&'static str> {
    match vid {
        ftdi::VID => Some("FTDI"),
        cp210x::VID => Some("CP210x"),
        ch340::VID => Some("CH340"),
        prolific::VID => Some("PL2303"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_adapters() {
        assert!(is_known_serial_adapter(ch340::CH340.vid, ch340::CH340.pid));
        assert!(is_known_serial_adapter(ftdi::FT232R.vid, ftdi::FT232R.pid));
        assert!(is_known_serial_adapter(cp210x::CP2102.vid, cp210x::CP2102.pid));
        assert!(!is_known_serial_adapter(ch340::VID, 0x0001));
        assert!(!is_known_serial_adapter(0x0C26, 0x0036));
    }

    #[test]
    fn test_adapter_name() {
        assert_eq!(adapter_name(prolific::PL2303.vid), Some("PL2303"));
        assert_eq!(adapter_name(0xFFFF), None);
    }
}
