//! Serial port scanner
//!
//! This module provides serial port enumeration and picks the ports worth
//! probing for a reader.

use serialport::{available_ports, SerialPortType};
use tracing::{debug, info};

use crate::error::DetectError;
use crate::usb_ids;

/// Ports where reader boards usually show up, probed first when present
pub const COMMON_READER_PORTS: &[&str] = &[
    "/dev/ttyUSB0",
    "/dev/ttyUSB1",
    "/dev/ttyS0",
    "/dev/ttyS1",
    "/dev/ttyACM0",
    "/dev/ttyACM1",
];

/// Description keywords marking a port as a likely serial bridge
const PLAUSIBLE_KEYWORDS: &[&str] = &["usb", "serial", "uart", "ftdi", "cp210", "ch340"];

/// Information about a serial port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialPortInfo {
    /// Port name (e.g., /dev/ttyUSB0, COM3)
    pub port: String,
    /// Whether the port is USB-backed
    pub is_usb: bool,
    /// USB Vendor ID (if USB)
    pub vid: Option<u16>,
    /// USB Product ID (if USB)
    pub pid: Option<u16>,
    /// USB serial number (if available)
    pub serial_number: Option<String>,
    /// USB manufacturer string
    pub manufacturer: Option<String>,
    /// USB product string
    pub product: Option<String>,
}

impl SerialPortInfo {
    /// Create from serialport crate's port info
    fn from_serialport(name: String, port_type: &SerialPortType) -> Self {
        match port_type {
            SerialPortType::UsbPort(usb) => Self {
                port: name,
                is_usb: true,
                vid: Some(usb.vid),
                pid: Some(usb.pid),
                serial_number: usb.serial_number.clone(),
                manufacturer: usb.manufacturer.clone(),
                product: usb.product.clone(),
            },
            _ => Self::plain(name),
        }
    }

    /// A port without USB metadata
    pub fn plain(name: impl Into<String>) -> Self {
        Self {
            port: name.into(),
            is_usb: false,
            vid: None,
            pid: None,
            serial_number: None,
            manufacturer: None,
            product: None,
        }
    }

    /// Human-readable description built from the USB strings
    ///
    /// Falls back to the bridge chip named by the vendor ID when the device
    /// reports no strings.
    pub fn description(&self) -> String {
        let strings = [self.manufacturer.as_deref(), self.product.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        if !strings.is_empty() {
            return strings;
        }
        self.vid
            .and_then(usb_ids::adapter_name)
            .map(|name| format!("{} adapter", name))
            .unwrap_or_default()
    }

    /// Whether a reader could plausibly sit behind this port
    pub fn is_plausible(&self) -> bool {
        if self.is_usb {
            return true;
        }
        if let (Some(vid), Some(pid)) = (self.vid, self.pid) {
            if usb_ids::is_known_serial_adapter(vid, pid) {
                return true;
            }
        }
        let description = self.description().to_lowercase();
        PLAUSIBLE_KEYWORDS.iter().any(|k| description.contains(k))
    }
}

/// Serial port scanner configuration
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Skip ports matching these patterns
    pub skip_patterns: Vec<String>,
    /// Ports listed first, in this order, when present
    pub preferred_ports: Vec<String>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            skip_patterns: vec![
                // Bluetooth ports on macOS
                "Bluetooth".to_string(),
                // Debug/logging ports
                "debug".to_string(),
            ],
            preferred_ports: COMMON_READER_PORTS.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// Serial port scanner
pub struct PortScanner {
    config: ScannerConfig,
}

impl PortScanner {
    /// Create a new scanner with default configuration
    pub fn new() -> Self {
        Self::with_config(ScannerConfig::default())
    }

    /// Create a scanner with custom configuration
    pub fn with_config(config: ScannerConfig) -> Self {
        Self { config }
    }

    /// Enumerate all available serial ports
    pub fn enumerate_ports(&self) -> Result<Vec<SerialPortInfo>, DetectError> {
        info!("Enumerating serial ports...");
        let ports = available_ports().map_err(|e| DetectError::EnumerationFailed(e.to_string()))?;

        let result: Vec<_> = ports
            .into_iter()
            .map(|p| SerialPortInfo::from_serialport(p.port_name, &p.port_type))
            .filter(|p| !self.should_skip_port(p))
            .collect();

        if result.is_empty() {
            info!("No serial ports found");
        } else {
            info!("Found {} serial port(s)", result.len());
            for port in &result {
                let desc = port.description();
                info!(
                    "  {} - {}",
                    port.port,
                    if desc.is_empty() { "Unknown" } else { &desc }
                );
            }
        }

        Ok(result)
    }

    /// Ports worth probing for a reader, preferred ports first
    pub fn plausible_ports(&self) -> Result<Vec<String>, DetectError> {
        let ports = self.enumerate_ports()?;
        Ok(self.select_plausible(&ports))
    }

    /// Order and filter already-enumerated ports
    ///
    /// Preferred ports come first in configured order; every other port is
    /// kept only if [`SerialPortInfo::is_plausible`].
    pub fn select_plausible(&self, ports: &[SerialPortInfo]) -> Vec<String> {
        let mut selected: Vec<String> = self
            .config
            .preferred_ports
            .iter()
            .filter(|name| ports.iter().any(|p| &p.port == *name))
            .cloned()
            .collect();

        for port in ports {
            if selected.contains(&port.port) {
                continue;
            }
            if port.is_plausible() {
                selected.push(port.port.clone());
            } else {
                debug!("Skipping {}: not a likely reader port", port.port);
            }
        }

        selected
    }

    /// Check if a port should be skipped
    fn should_skip_port(&self, port: &SerialPortInfo) -> bool {
        self.config
            .skip_patterns
            .iter()
            .any(|pattern| port.port.contains(pattern))
    }
}

impl Default for PortScanner {
    fn default() -> Self {
        Self::new()
    }
}
